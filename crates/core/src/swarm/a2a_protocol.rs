//! # A2A Protocol
//!
//! In-process, priority-ordered message queue between pipeline agents.
//!
//! Ordering contract: messages are kept sorted by
//! `(priority != high, timestamp)`, so every high-priority message comes
//! before every medium one and ties go to the earliest timestamp. Messages
//! with equal keys keep their send order.
//!
//! Delivery is fire-and-forget. `process_messages` claims the messages it
//! will deliver under the queue lock, so a message is handled at most once
//! per successful delivery even with overlapping passes. Failures go back to
//! their ordered position for a later pass and are reported in the returned
//! `ProcessReport`. A panicking handler counts as a failure.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::panic::{catch_unwind, AssertUnwindSafe};
use std::sync::{Arc, Mutex, MutexGuard, RwLock};
use uuid::Uuid;

use crate::error::HandlerError;
use crate::models::Priority;

/// A message addressed to one agent
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Message {
    pub message_id: String,
    pub session_id: String,
    pub from_agent: String,
    pub to_agent: String,
    pub message_type: String,
    #[serde(default)]
    pub payload: serde_json::Value,
    pub timestamp: DateTime<Utc>,
    #[serde(default)]
    pub priority: Priority,
}

impl Message {
    pub fn new(
        session_id: &str,
        from_agent: &str,
        to_agent: &str,
        message_type: &str,
        payload: serde_json::Value,
    ) -> Self {
        Self {
            message_id: Uuid::new_v4().to_string(),
            session_id: session_id.to_string(),
            from_agent: from_agent.to_string(),
            to_agent: to_agent.to_string(),
            message_type: message_type.to_string(),
            payload,
            timestamp: Utc::now(),
            priority: Priority::Medium,
        }
    }

    pub fn with_priority(mut self, priority: Priority) -> Self {
        self.priority = priority;
        self
    }

    pub fn with_timestamp(mut self, timestamp: DateTime<Utc>) -> Self {
        self.timestamp = timestamp;
        self
    }

    fn sort_key(&self) -> (bool, DateTime<Utc>) {
        (!self.priority.is_high(), self.timestamp)
    }
}

/// Handler invoked for messages addressed to one agent
pub trait MessageHandler: Send + Sync {
    fn handle(&self, message: &Message) -> Result<(), HandlerError>;
}

impl<F> MessageHandler for F
where
    F: Fn(&Message) -> Result<(), HandlerError> + Send + Sync,
{
    fn handle(&self, message: &Message) -> Result<(), HandlerError> {
        self(message)
    }
}

/// Run `handler`, turning a panic into a `HandlerError`
pub fn invoke_handler(
    handler: &dyn MessageHandler,
    message: &Message,
) -> Result<(), HandlerError> {
    catch_unwind(AssertUnwindSafe(|| handler.handle(message))).unwrap_or_else(|panic| {
        let reason = panic
            .downcast_ref::<&str>()
            .map(|s| s.to_string())
            .or_else(|| panic.downcast_ref::<String>().cloned())
            .unwrap_or_else(|| "unknown panic".to_string());
        Err(HandlerError::new(
            &message.to_agent,
            format!("handler panicked: {}", reason),
        ))
    })
}

fn insert_ordered(queue: &mut Vec<Message>, message: Message) {
    let key = message.sort_key();
    let at = queue.partition_point(|queued| queued.sort_key() <= key);
    queue.insert(at, message);
}

/// Outcome of one `process_messages` pass
#[derive(Debug, Default)]
pub struct ProcessReport {
    /// Ids of messages handled and removed
    pub delivered: Vec<String>,
    /// Messages whose handler failed; they remain queued
    pub failed: Vec<(String, HandlerError)>,
    /// Messages skipped because their agent has no handler
    pub unhandled: usize,
}

/// The shared message queue plus handler table
#[derive(Default)]
pub struct MessageBus {
    queue: Mutex<Vec<Message>>,
    handlers: RwLock<HashMap<String, Arc<dyn MessageHandler>>>,
}

impl MessageBus {
    pub fn new() -> Self {
        Self::default()
    }

    fn queue(&self) -> MutexGuard<'_, Vec<Message>> {
        self.queue.lock().unwrap_or_else(|e| e.into_inner())
    }

    /// Enqueue a message at its ordered position
    pub fn send(&self, message: Message) {
        tracing::debug!(
            "A2A {} -> {} ({}, {})",
            message.from_agent,
            message.to_agent,
            message.message_type,
            message.priority
        );
        insert_ordered(&mut self.queue(), message);
    }

    /// Pop the first queued message addressed to `agent`
    pub fn receive(&self, agent: &str) -> Option<Message> {
        let mut queue = self.queue();
        let index = queue.iter().position(|m| m.to_agent == agent)?;
        Some(queue.remove(index))
    }

    /// Register the handler for `agent`, replacing any earlier one
    pub fn register_handler<F>(&self, agent: &str, handler: F)
    where
        F: Fn(&Message) -> Result<(), HandlerError> + Send + Sync + 'static,
    {
        let mut handlers = self.handlers.write().unwrap_or_else(|e| e.into_inner());
        if handlers
            .insert(agent.to_string(), Arc::new(handler))
            .is_some()
        {
            tracing::debug!("Replaced A2A handler for {}", agent);
        }
    }

    /// The handler registered for `agent`, if any
    pub fn handler(&self, agent: &str) -> Option<Arc<dyn MessageHandler>> {
        self.handlers
            .read()
            .unwrap_or_else(|e| e.into_inner())
            .get(agent)
            .cloned()
    }

    pub fn has_handler(&self, agent: &str) -> bool {
        self.handlers
            .read()
            .unwrap_or_else(|e| e.into_inner())
            .contains_key(agent)
    }

    /// Deliver every queued message that has a handler.
    ///
    /// Deliverable messages are taken off the queue under the lock before
    /// any handler runs. Handlers run without the lock held and may send new
    /// messages, which are left for the next pass.
    pub fn process_messages(&self) -> ProcessReport {
        let handlers: HashMap<String, Arc<dyn MessageHandler>> = self
            .handlers
            .read()
            .unwrap_or_else(|e| e.into_inner())
            .clone();

        let mut report = ProcessReport::default();
        let claimed: Vec<Message> = {
            let mut queue = self.queue();
            let (claimed, kept): (Vec<Message>, Vec<Message>) = queue
                .drain(..)
                .partition(|m| handlers.contains_key(&m.to_agent));
            report.unhandled = kept.len();
            *queue = kept;
            claimed
        };

        let mut retry = Vec::new();
        for message in claimed {
            let Some(handler) = handlers.get(&message.to_agent) else {
                continue;
            };
            match invoke_handler(handler.as_ref(), &message) {
                Ok(()) => report.delivered.push(message.message_id),
                Err(e) => {
                    tracing::warn!("Error processing message {}: {}", message.message_id, e);
                    report.failed.push((message.message_id.clone(), e));
                    retry.push(message);
                }
            }
        }

        if !retry.is_empty() {
            let mut queue = self.queue();
            for message in retry {
                insert_ordered(&mut queue, message);
            }
        }
        report
    }

    pub fn len(&self) -> usize {
        self.queue().len()
    }

    pub fn is_empty(&self) -> bool {
        self.queue().is_empty()
    }

    /// Number of queued messages addressed to `agent`
    pub fn pending_for(&self, agent: &str) -> usize {
        self.queue().iter().filter(|m| m.to_agent == agent).count()
    }
}

impl std::fmt::Debug for MessageBus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("MessageBus")
            .field("queued", &self.len())
            .finish_non_exhaustive()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;
    use std::sync::atomic::{AtomicUsize, Ordering};

    fn at(secs: i64) -> DateTime<Utc> {
        Utc.timestamp_opt(secs, 0).single().unwrap()
    }

    fn msg(id: &str, to: &str, priority: Priority, secs: i64) -> Message {
        let mut m = Message::new("s", "test", to, "note", serde_json::json!({}))
            .with_priority(priority)
            .with_timestamp(at(secs));
        m.message_id = id.to_string();
        m
    }

    #[test]
    fn test_priority_then_timestamp_order() {
        let bus = MessageBus::new();
        bus.send(msg("M1", "evaluator", Priority::Medium, 10));
        bus.send(msg("M2", "evaluator", Priority::High, 20));
        bus.send(msg("M3", "evaluator", Priority::High, 5));

        let drained: Vec<String> = std::iter::from_fn(|| bus.receive("evaluator"))
            .map(|m| m.message_id)
            .collect();
        assert_eq!(drained, vec!["M3", "M2", "M1"]);
    }

    #[test]
    fn test_equal_keys_keep_send_order() {
        let bus = MessageBus::new();
        bus.send(msg("a", "planner", Priority::Medium, 7));
        bus.send(msg("b", "planner", Priority::Medium, 7));
        assert_eq!(bus.receive("planner").unwrap().message_id, "a");
        assert_eq!(bus.receive("planner").unwrap().message_id, "b");
    }

    #[test]
    fn test_receive_filters_by_agent() {
        let bus = MessageBus::new();
        bus.send(msg("p", "planner", Priority::High, 1));
        bus.send(msg("w", "worker", Priority::Medium, 2));

        assert_eq!(bus.receive("worker").unwrap().message_id, "w");
        assert!(bus.receive("worker").is_none());
        assert_eq!(bus.len(), 1);
    }

    #[test]
    fn test_handler_replacement() {
        let bus = MessageBus::new();
        let first = Arc::new(AtomicUsize::new(0));
        let second = Arc::new(AtomicUsize::new(0));

        let counter = first.clone();
        bus.register_handler("planner", move |_: &Message| {
            counter.fetch_add(1, Ordering::SeqCst);
            Ok(())
        });
        let counter = second.clone();
        bus.register_handler("planner", move |_: &Message| {
            counter.fetch_add(1, Ordering::SeqCst);
            Ok(())
        });

        bus.send(msg("x", "planner", Priority::Medium, 1));
        bus.process_messages();
        assert_eq!(first.load(Ordering::SeqCst), 0);
        assert_eq!(second.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn test_failed_and_unhandled_messages_stay_queued() {
        let bus = MessageBus::new();
        bus.register_handler("planner", |_: &Message| Ok(()));
        bus.register_handler("worker", |m: &Message| {
            Err(HandlerError::new(&m.to_agent, "worker offline"))
        });

        bus.send(msg("ok", "planner", Priority::Medium, 1));
        bus.send(msg("bad", "worker", Priority::High, 2));
        bus.send(msg("orphan", "nobody", Priority::Medium, 3));

        let report = bus.process_messages();
        assert_eq!(report.delivered, vec!["ok"]);
        assert_eq!(report.failed.len(), 1);
        assert_eq!(report.failed[0].0, "bad");
        assert_eq!(report.failed[0].1.reason, "worker offline");
        assert_eq!(report.unhandled, 1);

        assert_eq!(bus.len(), 2);
        assert_eq!(bus.pending_for("worker"), 1);
        assert_eq!(bus.pending_for("nobody"), 1);
    }

    #[test]
    fn test_handler_may_send_during_processing() {
        let bus = Arc::new(MessageBus::new());
        let inner = bus.clone();
        bus.register_handler("planner", move |m: &Message| {
            inner.send(Message::new(
                &m.session_id,
                "planner",
                "worker",
                "plan_ready",
                serde_json::Value::Null,
            ));
            Ok(())
        });

        bus.send(msg("ctx", "planner", Priority::Medium, 1));
        let report = bus.process_messages();
        assert_eq!(report.delivered.len(), 1);
        assert_eq!(bus.pending_for("worker"), 1);
        assert_eq!(bus.pending_for("planner"), 0);
    }

    #[test]
    fn test_overlapping_passes_deliver_once() {
        let bus = MessageBus::new();
        let calls = Arc::new(AtomicUsize::new(0));
        let counter = calls.clone();
        bus.register_handler("evaluator", move |_: &Message| {
            counter.fetch_add(1, Ordering::SeqCst);
            std::thread::sleep(std::time::Duration::from_millis(100));
            Ok(())
        });
        bus.send(msg("once", "evaluator", Priority::High, 1));

        let (a, b) = std::thread::scope(|scope| {
            let first = scope.spawn(|| bus.process_messages());
            let second = scope.spawn(|| bus.process_messages());
            (first.join().unwrap(), second.join().unwrap())
        });

        assert_eq!(calls.load(Ordering::SeqCst), 1);
        assert_eq!(a.delivered.len() + b.delivered.len(), 1);
        assert!(bus.is_empty());
    }

    #[test]
    fn test_receive_cannot_take_a_claimed_message() {
        let bus = Arc::new(MessageBus::new());
        let inner = bus.clone();
        let stolen = Arc::new(Mutex::new(None));
        let slot = stolen.clone();
        bus.register_handler("planner", move |_: &Message| {
            *slot.lock().unwrap() = Some(inner.receive("planner"));
            Ok(())
        });
        bus.send(msg("mine", "planner", Priority::Medium, 1));

        let report = bus.process_messages();
        assert_eq!(report.delivered, vec!["mine"]);
        assert_eq!(*stolen.lock().unwrap(), Some(None));
    }

    #[test]
    fn test_failed_message_returns_to_ordered_position() {
        let bus = MessageBus::new();
        bus.register_handler("worker", |m: &Message| {
            Err(HandlerError::new(&m.to_agent, "busy"))
        });
        bus.send(msg("late", "worker", Priority::Medium, 9));
        bus.send(msg("early", "worker", Priority::High, 5));

        let report = bus.process_messages();
        assert_eq!(report.failed.len(), 2);
        assert_eq!(bus.receive("worker").unwrap().message_id, "early");
        assert_eq!(bus.receive("worker").unwrap().message_id, "late");
    }

    #[test]
    fn test_panicking_handler_is_reported_and_retained() {
        let bus = MessageBus::new();
        bus.register_handler("planner", |_: &Message| -> Result<(), HandlerError> {
            panic!("planner blew up")
        });
        bus.register_handler("worker", |_: &Message| Ok(()));
        bus.send(msg("boom", "planner", Priority::High, 1));
        bus.send(msg("fine", "worker", Priority::Medium, 2));

        let report = bus.process_messages();
        assert_eq!(report.delivered, vec!["fine"]);
        assert_eq!(report.failed.len(), 1);
        assert_eq!(report.failed[0].1.agent, "planner");
        assert!(report.failed[0].1.reason.contains("planner blew up"));
        assert_eq!(bus.pending_for("planner"), 1);
    }

    #[tokio::test]
    async fn test_concurrent_senders_keep_order() {
        let bus = Arc::new(MessageBus::new());
        let mut handles = Vec::new();
        for i in 0..20i64 {
            let bus = bus.clone();
            handles.push(tokio::spawn(async move {
                let priority = if i % 2 == 0 { Priority::High } else { Priority::Medium };
                bus.send(msg(&format!("m{}", i), "evaluator", priority, 100 - i));
            }));
        }
        for handle in handles {
            handle.await.unwrap();
        }

        let drained: Vec<Message> = std::iter::from_fn(|| bus.receive("evaluator")).collect();
        assert_eq!(drained.len(), 20);
        for pair in drained.windows(2) {
            assert!(pair[0].sort_key() <= pair[1].sort_key());
        }
    }
}
