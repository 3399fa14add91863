//! # A2A Bridge
//!
//! Runs an agent's message handler on its own task, fed by a bounded
//! channel. A handler panic is reported as `Delivery::Failed` and the loop
//! keeps running. The bus stays the single place that orders messages; `forward`
//! moves an agent's queued messages into its loop in priority/timestamp
//! order.
//!
//! ## Architecture
//!
//! ```text
//! MessageBus                        Agent Loop Task
//!     │                                    │
//!     ├─── forward(agent) ───────────────▶ │
//!     │        (bounded mpsc)              ├── handler(message)
//!     │ ◀──── Delivery::Handled ───────────┤
//!     │ ◀──── Delivery::Failed ────────────┘  (caller re-queues)
//! ```

use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tokio::sync::mpsc;
use tokio::task::JoinHandle;

use super::a2a_protocol::{invoke_handler, Message, MessageBus, MessageHandler};

/// Progress reported by an agent loop for each message it consumes
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum Delivery {
    Handled {
        agent: String,
        message_id: String,
    },
    /// Carries the message back so the caller can retry it
    Failed {
        agent: String,
        message: Message,
        error: String,
    },
}

/// Handle for a running agent loop
pub struct AgentLoopHandle {
    pub agent: String,
    /// Channel feeding the loop
    pub message_tx: mpsc::Sender<Message>,
    /// Handle to the spawned task
    pub task_handle: JoinHandle<()>,
}

/// Spawn a single-consumer loop that runs `handler` for each message
pub fn spawn_agent_loop(
    agent: &str,
    handler: Arc<dyn MessageHandler>,
    capacity: usize,
    progress_tx: mpsc::Sender<Delivery>,
) -> AgentLoopHandle {
    let (message_tx, mut message_rx) = mpsc::channel::<Message>(capacity.max(1));
    let name = agent.to_string();

    let task_handle = tokio::spawn(async move {
        while let Some(message) = message_rx.recv().await {
            let delivery = match invoke_handler(handler.as_ref(), &message) {
                Ok(()) => Delivery::Handled {
                    agent: name.clone(),
                    message_id: message.message_id,
                },
                Err(e) => {
                    tracing::warn!("Agent loop {} failed on {}: {}", name, message.message_id, e);
                    Delivery::Failed {
                        agent: name.clone(),
                        message,
                        error: e.to_string(),
                    }
                }
            };
            let _ = progress_tx.send(delivery).await;
        }
        tracing::debug!("Agent loop {} stopped", name);
    });

    AgentLoopHandle {
        agent: agent.to_string(),
        message_tx,
        task_handle,
    }
}

impl MessageBus {
    /// Move every message queued for `handle.agent` into its loop.
    ///
    /// Stops early if the loop has shut down; the undelivered message goes
    /// back on the bus.
    pub async fn forward(&self, handle: &AgentLoopHandle) -> usize {
        let mut forwarded = 0;
        while let Some(message) = self.receive(&handle.agent) {
            if let Err(mpsc::error::SendError(message)) = handle.message_tx.send(message).await {
                tracing::warn!("Agent loop {} is closed, re-queueing", handle.agent);
                self.send(message);
                break;
            }
            forwarded += 1;
        }
        forwarded
    }
}
