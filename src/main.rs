mod browser;
mod cmd_parser;
mod config;
mod error;
mod protocol;
mod security;
mod server;
mod workspace;

use std::path::PathBuf;
use std::sync::Arc;

use anyhow::{Context, Result};
use tokio::net::TcpListener;
use tracing::{info, warn};

use browser::{BrowserSession, DisabledBrowser, TabManager};
use config::{load_config, BackendConfig};
use security::SecureExecutor;
use server::AppState;
use workspace::Workspace;

#[tokio::main]
async fn main() -> Result<()> {
    let mut args = std::env::args().skip(1);
    if let Some(flag) = args.next() {
        if flag == "--init-config" {
            return init_config(args.next().map(PathBuf::from));
        }
        anyhow::bail!("Unknown argument: {} (expected --init-config [path])", flag);
    }

    let config = load_config()?;

    tracing_subscriber::fmt()
        .with_max_level(config.log_level())
        .with_target(false)
        .with_thread_ids(false)
        .with_ansi(true)
        .init();

    info!("CodeMate backend starting...");

    let workspace = Workspace::from_config(&config.workspace).with_context(|| {
        format!(
            "Failed to open workspace root: {}",
            config.workspace.root.display()
        )
    })?;

    let browser: Arc<dyn BrowserSession> = if config.browser.enabled {
        Arc::new(TabManager::new(&config.browser)?)
    } else {
        Arc::new(DisabledBrowser)
    };

    let (browser_ok, message) = browser.initialize().await;
    if browser_ok {
        info!("Browser initialization: {}", message);
    } else {
        warn!("Browser initialization: {}", message);
    }

    let address = config.bind_address();
    let listener = TcpListener::bind(&address)
        .await
        .with_context(|| format!("Failed to bind {}", address))?;

    let state = AppState::new(SecureExecutor::new(workspace), Arc::clone(&browser));
    let served = server::serve(listener, state, shutdown_signal()).await;

    browser.close().await;
    info!("CodeMate backend stopped");
    served
}

fn init_config(path: Option<PathBuf>) -> Result<()> {
    let path = match path {
        Some(path) => path,
        None => BackendConfig::default_path()?,
    };

    BackendConfig::default().save(&path)?;
    println!("Wrote default configuration to {}", path.display());
    Ok(())
}

async fn shutdown_signal() {
    if let Err(e) = tokio::signal::ctrl_c().await {
        warn!("Failed to listen for shutdown signal: {}", e);
        std::future::pending::<()>().await;
    }
    info!("Shutdown signal received");
}
