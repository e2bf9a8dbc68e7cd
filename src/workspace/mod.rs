//! The restricted directory every instruction operates on.
//!
//! A [`Workspace`] is built once at startup from configuration and shared
//! read-only by all connections. Each executor resolves the caller's raw
//! filepath through the sandbox itself, so a resolved path never outlives
//! the request that produced it.

mod files;
mod runner;

use std::path::Path;
use std::time::Duration;

use anyhow::Result;
use tracing::info;

use crate::config::WorkspaceConfig;
use crate::security::Sandbox;

#[derive(Debug, Clone)]
pub struct Workspace {
    sandbox: Sandbox,
    run_timeout: Duration,
    backup_on_modify: bool,
}

impl Workspace {
    /// Open a workspace with the default run timeout (30s) and backups enabled
    pub fn open(root: impl AsRef<Path>) -> Result<Self> {
        let sandbox = Sandbox::new(root)?;
        info!("Workspace initialized with root: {}", sandbox.root().display());
        Ok(Self {
            sandbox,
            run_timeout: Duration::from_secs(30),
            backup_on_modify: true,
        })
    }

    pub fn from_config(config: &WorkspaceConfig) -> Result<Self> {
        Ok(Self::open(&config.root)?
            .with_run_timeout(Duration::from_secs(config.run_timeout_secs))
            .with_backups(config.backup_on_modify))
    }

    pub fn with_run_timeout(mut self, timeout: Duration) -> Self {
        self.run_timeout = timeout;
        self
    }

    pub fn with_backups(mut self, enabled: bool) -> Self {
        self.backup_on_modify = enabled;
        self
    }

    pub fn root(&self) -> &Path {
        self.sandbox.root()
    }
}
