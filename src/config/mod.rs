use std::collections::BTreeMap;
use std::path::{Path, PathBuf};

use anyhow::{bail, Context, Result};
use serde::{Deserialize, Serialize};

/// Environment variable naming an explicit config file
pub const CONFIG_PATH_VAR: &str = "CODEMATE_CONFIG";

/// Main configuration structure
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct BackendConfig {
    /// Listener settings
    pub server: ServerConfig,

    /// Sandbox settings
    pub workspace: WorkspaceConfig,

    /// Browser tab collaborator
    pub browser: BrowserConfig,

    pub logging: LoggingConfig,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ServerConfig {
    pub host: String,
    pub port: u16,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct WorkspaceConfig {
    /// Directory every instruction is confined to
    pub root: PathBuf,

    /// Wall-clock limit for `$run`
    pub run_timeout_secs: u64,

    /// Keep a `.bak` copy of files before `$modify` overwrites them
    pub backup_on_modify: bool,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct BrowserConfig {
    pub enabled: bool,

    /// Per-tab navigation timeout
    pub navigation_timeout_secs: u64,

    /// Assistant name -> start page
    pub tabs: BTreeMap<String, String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct LoggingConfig {
    /// One of trace, debug, info, warn, error
    pub level: String,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            host: "0.0.0.0".to_string(),
            port: 8080,
        }
    }
}

impl Default for WorkspaceConfig {
    fn default() -> Self {
        Self {
            root: PathBuf::from("."),
            run_timeout_secs: 30,
            backup_on_modify: true,
        }
    }
}

impl Default for BrowserConfig {
    fn default() -> Self {
        let tabs = [
            ("Gemini", "https://gemini.google.com"),
            ("Claude", "https://claude.ai"),
            ("ChatGPT", "https://chat.openai.com"),
        ]
        .into_iter()
        .map(|(name, url)| (name.to_string(), url.to_string()))
        .collect();

        Self {
            enabled: true,
            navigation_timeout_secs: 10,
            tabs,
        }
    }
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: "info".to_string(),
        }
    }
}

impl BackendConfig {
    /// Load configuration from file
    pub fn load(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path)
            .with_context(|| format!("Failed to read config file: {}", path.display()))?;

        toml::from_str(&content)
            .with_context(|| format!("Failed to parse config file: {}", path.display()))
    }

    /// Save configuration to file
    pub fn save(&self, path: &Path) -> Result<()> {
        let content = toml::to_string_pretty(self).context("Failed to serialize config")?;

        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent).with_context(|| {
                format!("Failed to create config directory: {}", parent.display())
            })?;
        }

        std::fs::write(path, content)
            .with_context(|| format!("Failed to write config file: {}", path.display()))?;

        Ok(())
    }

    /// Get the default configuration path
    pub fn default_path() -> Result<PathBuf> {
        let home = dirs::home_dir().ok_or_else(|| anyhow::anyhow!("Could not find home directory"))?;
        Ok(home.join(".codemate").join("config.toml"))
    }

    /// Apply environment overrides. `lookup` is `std::env::var` in production.
    pub fn merge_env<F>(&mut self, lookup: F) -> Result<()>
    where
        F: Fn(&str) -> Option<String>,
    {
        if let Some(root) = lookup("WORKSPACE_ROOT") {
            self.workspace.root = PathBuf::from(root);
        }
        if let Some(host) = lookup("HOST") {
            self.server.host = host;
        }
        if let Some(port) = lookup("PORT") {
            self.server.port = port
                .parse()
                .with_context(|| format!("Invalid PORT value: {}", port))?;
        }
        if let Some(timeout) = lookup("RUN_TIMEOUT_SECS") {
            self.workspace.run_timeout_secs = timeout
                .parse()
                .with_context(|| format!("Invalid RUN_TIMEOUT_SECS value: {}", timeout))?;
        }
        if let Some(enabled) = lookup("BROWSER_ENABLED") {
            self.browser.enabled = enabled
                .parse()
                .with_context(|| format!("Invalid BROWSER_ENABLED value: {}", enabled))?;
        }
        if let Some(level) = lookup("LOG_LEVEL") {
            self.logging.level = level;
        }

        self.check()
    }

    fn check(&self) -> Result<()> {
        if self.workspace.run_timeout_secs == 0 {
            bail!("run_timeout_secs must be greater than zero");
        }
        if self.logging.level.parse::<tracing::Level>().is_err() {
            bail!("Unknown log level: {}", self.logging.level);
        }
        Ok(())
    }

    pub fn log_level(&self) -> tracing::Level {
        self.logging.level.parse().unwrap_or(tracing::Level::INFO)
    }

    pub fn bind_address(&self) -> String {
        format!("{}:{}", self.server.host, self.server.port)
    }
}

/// Resolve configuration the way the server starts up: `.env`, then an
/// optional TOML file, then environment overrides.
pub fn load_config() -> Result<BackendConfig> {
    dotenv::dotenv().ok();

    let explicit = std::env::var(CONFIG_PATH_VAR).ok().map(PathBuf::from);
    let mut config = match explicit {
        Some(path) => BackendConfig::load(&path)?,
        None => match BackendConfig::default_path() {
            Ok(path) if path.exists() => BackendConfig::load(&path)?,
            _ => BackendConfig::default(),
        },
    };

    config.merge_env(|key| std::env::var(key).ok())?;
    Ok(config)
}
