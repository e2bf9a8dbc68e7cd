// Browser tab collaborator: keeps one session per AI assistant and reports health

use std::collections::BTreeMap;
use std::time::Duration;

use anyhow::Result;
use async_trait::async_trait;
use reqwest::Client;
use tokio::sync::RwLock;
use tracing::{info, warn};

use crate::config::BrowserConfig;

/// Lifecycle the server drives at startup, on `/health` and at shutdown.
///
/// Each call answers with `(ok, message)`; the message is shown verbatim in
/// the health report.
#[async_trait]
pub trait BrowserSession: Send + Sync {
    async fn initialize(&self) -> (bool, String);

    async fn health_check(&self) -> (bool, String);

    async fn close(&self);
}

#[derive(Debug, Default)]
struct TabState {
    running: bool,
    /// Assistant name -> final URL of the loaded tab
    open: BTreeMap<String, String>,
}

/// Opens one tab per configured assistant by navigating an HTTP session to its start page.
pub struct TabManager {
    client: Client,
    tabs: BTreeMap<String, String>,
    state: RwLock<TabState>,
}

impl TabManager {
    pub fn new(config: &BrowserConfig) -> Result<Self> {
        let client = Client::builder()
            .timeout(Duration::from_secs(config.navigation_timeout_secs))
            .build()?;

        Ok(Self {
            client,
            tabs: config.tabs.clone(),
            state: RwLock::new(TabState::default()),
        })
    }

    async fn open_tab(&self, url: &str) -> Result<String> {
        let response = self.client.get(url).send().await?;
        Ok(response.url().to_string())
    }
}

#[async_trait]
impl BrowserSession for TabManager {
    async fn initialize(&self) -> (bool, String) {
        let mut opened = BTreeMap::new();

        for (assistant, url) in &self.tabs {
            // One unreachable assistant must not keep the others from loading
            match self.open_tab(url).await {
                Ok(landed) => {
                    info!("Initialized {} tab ({})", assistant, landed);
                    opened.insert(assistant.clone(), landed);
                }
                Err(e) => warn!("Failed to initialize {} tab: {}", assistant, e),
            }
        }

        let mut state = self.state.write().await;
        state.open = opened;
        state.running = true;

        info!("Browser manager initialized successfully");
        (true, "Browser initialized with AI tabs".to_string())
    }

    async fn health_check(&self) -> (bool, String) {
        let state = self.state.read().await;
        tab_health(&state)
    }

    async fn close(&self) {
        let mut state = self.state.write().await;
        state.open.clear();
        state.running = false;
        info!("Browser closed");
    }
}

fn tab_health(state: &TabState) -> (bool, String) {
    if !state.running {
        return (false, "Browser not initialized".to_string());
    }
    if state.open.is_empty() {
        return (false, "No active browser pages".to_string());
    }

    let active: Vec<&str> = state.open.keys().map(String::as_str).collect();
    (true, format!("Active tabs: {}", active.join(", ")))
}

/// Stand-in used when the browser is turned off in configuration
#[derive(Debug, Default)]
pub struct DisabledBrowser;

#[async_trait]
impl BrowserSession for DisabledBrowser {
    async fn initialize(&self) -> (bool, String) {
        (false, "Browser disabled".to_string())
    }

    async fn health_check(&self) -> (bool, String) {
        (false, "Browser disabled".to_string())
    }

    async fn close(&self) {}
}
