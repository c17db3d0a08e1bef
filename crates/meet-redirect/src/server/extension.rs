use axum::extract::ws::{Message, WebSocket};
use axum::extract::{State, WebSocketUpgrade};
use axum::response::IntoResponse;
use axum::Json;
use futures_util::{SinkExt, StreamExt};
use serde::Serialize;
use std::sync::Arc;
use tokio::sync::mpsc;

use crate::server::ServerState;

#[derive(Serialize)]
pub struct ExtensionStatus {
    pub connected: bool,
}

pub(crate) async fn ws_handler(
    State(state): State<Arc<ServerState>>,
    ws: WebSocketUpgrade,
) -> impl IntoResponse {
    ws.on_upgrade(move |socket| handle_socket(state, socket))
}

async fn handle_socket(state: Arc<ServerState>, socket: WebSocket) {
    let (mut ws_sink, mut ws_stream) = socket.split();

    // Outgoing commands from the bridge.
    let (tx, mut rx) = mpsc::unbounded_channel::<String>();

    let generation = state.browser.on_connect(tx).await;

    let write_task = async move {
        while let Some(msg) = rx.recv().await {
            if ws_sink.send(Message::Text(msg)).await.is_err() {
                break;
            }
        }
    };

    // Responses complete pending commands; browser events go to the service.
    let bridge = state.browser.clone();
    let redirect = state.redirect.clone();
    let read_task = async move {
        while let Some(Ok(msg)) = ws_stream.next().await {
            match msg {
                Message::Text(text) => {
                    if let Some(event) = bridge.on_message(&text).await {
                        if let Err(error) = redirect.submit(event) {
                            tracing::warn!("dropping browser event: {error}");
                            break;
                        }
                    }
                }
                Message::Close(_) => break,
                _ => {}
            }
        }
    };

    tokio::select! {
        _ = write_task => {},
        _ = read_task => {},
    }

    state.browser.on_disconnect(generation).await;
}

pub(crate) async fn status(State(state): State<Arc<ServerState>>) -> Json<ExtensionStatus> {
    Json(ExtensionStatus {
        connected: state.browser.is_connected().await,
    })
}
