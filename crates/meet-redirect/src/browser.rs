use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use serde::Deserialize;
use serde_json::{json, Value};
use tokio::sync::{mpsc, Mutex, Notify, RwLock};

use crate::error::{CoreError, CoreResult};
use crate::events::HostEvent;
use crate::host::{Host, TabId, WindowId, WindowInfo, WindowKind};

const NOT_CONNECTED: &str = "browser extension not connected";

/// Manages the WebSocket connection to the companion browser extension and
/// request/response matching for host calls.
pub struct BrowserBridge {
    connection: RwLock<ConnectionState>,
    pending: Mutex<HashMap<String, PendingRequest>>,
    timeout: Duration,
}

struct ConnectionState {
    sender: Option<mpsc::UnboundedSender<String>>,
    generation: u64,
}

struct PendingRequest {
    result: Option<Result<Value, String>>,
    notify: Arc<Notify>,
}

impl BrowserBridge {
    pub fn new(timeout: Duration) -> Self {
        Self {
            connection: RwLock::new(ConnectionState {
                sender: None,
                generation: 0,
            }),
            pending: Mutex::new(HashMap::new()),
            timeout,
        }
    }

    /// Send a command to the extension and wait for its response.
    pub async fn send_command(&self, method: &str, params: Value) -> CoreResult<Value> {
        let id = uuid::Uuid::new_v4().to_string();
        let message = json!({
            "id": id,
            "method": method,
            "params": params,
        });

        // Encoded before registration; a failure here leaves no pending entry.
        let text = serde_json::to_string(&message)
            .map_err(|e| CoreError::Internal(format!("failed to serialize command: {e}")))?;

        let notify = Arc::new(Notify::new());

        // Register before sending so a fast reply is never lost.
        {
            let mut pending = self.pending.lock().await;
            pending.insert(
                id.clone(),
                PendingRequest {
                    result: None,
                    notify: notify.clone(),
                },
            );
        }

        {
            let conn = self.connection.read().await;
            let sent = match &conn.sender {
                Some(sender) => sender.send(text).is_ok(),
                None => false,
            };
            if !sent {
                self.pending.lock().await.remove(&id);
                return Err(CoreError::Host(NOT_CONNECTED.to_string()));
            }
        }

        let result = tokio::time::timeout(self.timeout, notify.notified()).await;

        let mut pending = self.pending.lock().await;
        match pending.remove(&id) {
            Some(_) if result.is_err() => {
                Err(CoreError::Host(format!("browser command '{method}' timed out")))
            }
            Some(req) => req
                .result
                .unwrap_or_else(|| Err("no response received".to_string()))
                .map_err(CoreError::Host),
            None => Err(CoreError::Host("request was cancelled".to_string())),
        }
    }

    /// Called when the extension connects. Returns the connection generation.
    pub async fn on_connect(&self, sender: mpsc::UnboundedSender<String>) -> u64 {
        self.fail_pending().await;

        let mut conn = self.connection.write().await;
        conn.generation += 1;
        conn.sender = Some(sender);
        let gen = conn.generation;
        tracing::info!("browser extension connected (generation {gen})");
        gen
    }

    /// Only clears the sender if the generation matches, so a stale
    /// disconnect never clobbers a newer connection.
    pub async fn on_disconnect(&self, generation: u64) {
        let mut conn = self.connection.write().await;
        if conn.generation == generation {
            conn.sender = None;
            tracing::info!("browser extension disconnected (generation {generation})");
            drop(conn);
            self.fail_pending().await;
        }
    }

    /// Handles a message from the extension. Responses complete a pending
    /// command; browser events are decoded and returned to the caller.
    pub async fn on_message(&self, text: &str) -> Option<HostEvent> {
        let msg: Value = match serde_json::from_str(text) {
            Ok(v) => v,
            Err(e) => {
                tracing::warn!("invalid message from browser extension: {e}");
                return None;
            }
        };

        if msg.get("event").is_some() {
            return match serde_json::from_value::<HostEvent>(msg) {
                Ok(event) => Some(event),
                Err(e) => {
                    tracing::warn!("unrecognised browser event: {e}");
                    None
                }
            };
        }

        let Some(id) = msg.get("id").and_then(|v| v.as_str()).map(str::to_string) else {
            tracing::warn!("browser extension message has neither 'id' nor 'event'");
            return None;
        };

        let result = if let Some(error) = msg.get("error") {
            Err(error
                .as_str()
                .unwrap_or("unknown browser error")
                .to_string())
        } else {
            Ok(msg.get("result").cloned().unwrap_or(Value::Null))
        };

        let mut pending = self.pending.lock().await;
        if let Some(req) = pending.get_mut(&id) {
            req.result = Some(result);
            req.notify.notify_one();
        } else {
            tracing::warn!("received response for unknown request id: {id}");
        }
        None
    }

    pub async fn is_connected(&self) -> bool {
        self.connection.read().await.sender.is_some()
    }

    async fn fail_pending(&self) {
        let mut pending = self.pending.lock().await;
        for (_, req) in pending.drain() {
            req.notify.notify_one();
        }
    }
}

/// [`Host`] implementation that forwards every call over the bridge.
pub struct BridgeHost {
    bridge: Arc<BrowserBridge>,
}

#[derive(Deserialize)]
struct CreatedWindow {
    id: WindowId,
}

impl BridgeHost {
    pub fn new(bridge: Arc<BrowserBridge>) -> Self {
        Self { bridge }
    }
}

#[async_trait]
impl Host for BridgeHost {
    fn id(&self) -> &str {
        "browser-extension"
    }

    async fn query_windows(&self, kinds: &[WindowKind]) -> CoreResult<Vec<WindowInfo>> {
        let result = self
            .bridge
            .send_command("windows.getAll", json!({ "populate": true, "windowTypes": kinds }))
            .await?;
        serde_json::from_value(result)
            .map_err(|e| CoreError::Host(format!("malformed window list: {e}")))
    }

    async fn create_window(&self, url: &str, kind: WindowKind) -> CoreResult<WindowId> {
        let result = self
            .bridge
            .send_command("windows.create", json!({ "url": url, "type": kind }))
            .await?;
        let created: CreatedWindow = serde_json::from_value(result)
            .map_err(|e| CoreError::Host(format!("malformed created window: {e}")))?;
        Ok(created.id)
    }

    async fn focus_window(&self, window: WindowId) -> CoreResult<()> {
        self.bridge
            .send_command("windows.focus", json!({ "windowId": window }))
            .await
            .map(|_| ())
    }

    async fn stop_tab_load(&self, tab: TabId) -> CoreResult<()> {
        self.bridge
            .send_command("tabs.stop", json!({ "tabId": tab }))
            .await
            .map(|_| ())
    }

    async fn close_tab(&self, tab: TabId) -> CoreResult<()> {
        self.bridge
            .send_command("tabs.remove", json!({ "tabId": tab }))
            .await
            .map(|_| ())
    }
}
