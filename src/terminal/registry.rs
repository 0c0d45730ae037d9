// Client session registry and event routing

use crate::events::{ClientEvent, SessionEvent};
use crate::fleet::poller::Fleet;
use crate::terminal::bridge::SessionBridge;
use std::collections::HashMap;
use std::sync::Arc;
use tokio::sync::{mpsc, Mutex};

struct SessionEntry {
    bridge: Arc<Mutex<SessionBridge>>,
    outbound: mpsc::UnboundedSender<SessionEvent>,
}

/// Maps client-session ids to their bridges.
///
/// Entries live exactly as long as the client connection; disconnecting
/// closes any active channel. Events for unregistered clients are
/// dropped, not errors.
pub struct SessionRegistry {
    fleet: Arc<Fleet>,
    sessions: Mutex<HashMap<String, Arc<SessionEntry>>>,
}

impl SessionRegistry {
    pub fn new(fleet: Arc<Fleet>) -> Self {
        Self {
            fleet,
            sessions: Mutex::new(HashMap::new()),
        }
    }

    /// Register a bridge for a freshly connected client
    pub async fn connect(&self, client_id: &str, outbound: mpsc::UnboundedSender<SessionEvent>) {
        tracing::debug!("Client [{}] connected", client_id);
        let entry = Arc::new(SessionEntry {
            bridge: Arc::new(Mutex::new(SessionBridge::new(outbound.clone()))),
            outbound,
        });
        self.sessions
            .lock()
            .await
            .insert(client_id.to_string(), entry);
    }

    /// Tear down a disconnecting client's bridge, closing any active
    /// channel.
    pub async fn disconnect(&self, client_id: &str) {
        tracing::debug!("Client [{}] disconnected", client_id);
        let removed = self.sessions.lock().await.remove(client_id);
        if let Some(entry) = removed {
            entry.bridge.lock().await.close().await;
        }
    }

    pub async fn session_count(&self) -> usize {
        self.sessions.lock().await.len()
    }

    /// Route one client event to its bridge
    pub async fn handle_event(&self, client_id: &str, event: ClientEvent) {
        let entry = self.sessions.lock().await.get(client_id).cloned();
        let Some(entry) = entry else {
            tracing::debug!("Dropping event for unregistered client [{}]", client_id);
            return;
        };

        match event {
            ClientEvent::StartCommand {
                hostname,
                username: _,
                cmd,
                cmd_args,
            } => {
                tracing::debug!(
                    "Client [{}] - start_command on '{}': {} {}",
                    client_id,
                    hostname,
                    cmd,
                    cmd_args
                );
                let Some(host) = self.fleet.host(&hostname) else {
                    tracing::warn!("start_command for unknown host '{}'", hostname);
                    let _ = entry
                        .outbound
                        .send(SessionEvent::TaskFinished {
                            reason: format!("unknown host '{}'", hostname),
                        });
                    return;
                };
                entry
                    .bridge
                    .lock()
                    .await
                    .open_with_command(host.as_ref(), &cmd, &cmd_args)
                    .await;
            }
            ClientEvent::PtyInput { input } => {
                entry.bridge.lock().await.send_input(input.as_bytes());
            }
            ClientEvent::Resize { rows, cols } => {
                tracing::debug!("Client [{}] - resize: {:?}x{:?}", client_id, rows, cols);
                entry.bridge.lock().await.resize(rows, cols);
            }
        }
    }
}
