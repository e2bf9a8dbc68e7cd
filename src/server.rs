use std::future::Future;
use std::sync::Arc;

use axum::{
    extract::{
        ws::{Message, WebSocket, WebSocketUpgrade},
        State,
    },
    response::{IntoResponse, Json},
    routing::get,
    Router,
};
use serde_json::{json, Value};
use tokio::net::TcpListener;
use tower_http::cors::CorsLayer;
use tracing::{debug, error, info, info_span, warn, Instrument};
use uuid::Uuid;

use crate::browser::BrowserSession;
use crate::protocol::{InboundMessage, ResponseEnvelope};
use crate::security::SecureExecutor;

#[derive(Clone)]
pub struct AppState {
    pub executor: SecureExecutor,
    pub browser: Arc<dyn BrowserSession>,
}

impl AppState {
    pub fn new(executor: SecureExecutor, browser: Arc<dyn BrowserSession>) -> Self {
        Self { executor, browser }
    }
}

pub fn router(state: AppState) -> Router {
    Router::new()
        .route("/health", get(health_check))
        .route("/ws", get(ws_upgrade))
        .layer(CorsLayer::permissive())
        .with_state(state)
}

/// Serve until `shutdown` resolves
pub async fn serve<F>(listener: TcpListener, state: AppState, shutdown: F) -> anyhow::Result<()>
where
    F: Future<Output = ()> + Send + 'static,
{
    if let Ok(addr) = listener.local_addr() {
        info!("CodeMate backend listening on {}", addr);
    }

    axum::serve(listener, router(state))
        .with_graceful_shutdown(shutdown)
        .await?;
    Ok(())
}

async fn health_check(State(state): State<AppState>) -> Json<Value> {
    let (browser_ok, browser) = state.browser.health_check().await;

    Json(json!({
        "status": if browser_ok { "ok" } else { "degraded" },
        "browser": browser,
        "workspace_root": state.executor.workspace().root().display().to_string(),
    }))
}

async fn ws_upgrade(ws: WebSocketUpgrade, State(state): State<AppState>) -> impl IntoResponse {
    let span = info_span!("ws", connection = %Uuid::new_v4());
    ws.on_upgrade(move |socket| handle_socket(socket, state).instrument(span))
}

/// One connection: frames are handled strictly one after another, so replies
/// go out in the order instructions arrived.
async fn handle_socket(mut socket: WebSocket, state: AppState) {
    info!("WebSocket client connected");

    while let Some(message) = socket.recv().await {
        let message = match message {
            Ok(msg) => msg,
            Err(e) => {
                warn!("WebSocket receive error: {}", e);
                break;
            }
        };

        let text = match message {
            Message::Text(text) => text,
            Message::Close(_) => break,
            // Pings are answered by axum; binary frames carry no instructions
            Message::Binary(_) | Message::Ping(_) | Message::Pong(_) => continue,
        };

        let reply = handle_frame(&state.executor, &text).await;
        if !reply.is_success() {
            debug!("Replying with error: {}", reply.message);
        }
        let payload = match serde_json::to_string(&reply) {
            Ok(payload) => payload,
            Err(e) => {
                error!("Failed to encode reply: {}", e);
                continue;
            }
        };

        if let Err(e) = socket.send(Message::Text(payload)).await {
            warn!("WebSocket send error: {}", e);
            break;
        }
    }

    info!("WebSocket client disconnected");
}

/// Turn one text frame into exactly one reply
pub async fn handle_frame(executor: &SecureExecutor, text: &str) -> ResponseEnvelope {
    let inbound: InboundMessage = match serde_json::from_str(text) {
        Ok(inbound) => inbound,
        Err(e) => {
            warn!("Invalid JSON frame: {}", e);
            return ResponseEnvelope::error("Invalid JSON format");
        }
    };

    let assistant = inbound.assistant.trim();
    let instruction = inbound.instruction.trim();
    info!("Received: {} -> {}", assistant, instruction);

    if assistant.is_empty() || instruction.is_empty() {
        return ResponseEnvelope::error("Missing 'assistant' or 'instruction' field");
    }

    executor.handle_instruction(assistant, instruction).await
}
