//! # Swarm Coordinator
//!
//! Drives one request end-to-end:
//!
//! ```text
//! session ─▶ analyze + plan ─▶ {domain workers, concurrent} ─▶ evaluate ─▶ response
//! ```
//!
//! Stage handoffs are also announced on the A2A bus (`context_ready`,
//! `plan_ready`, `results_ready`). Nothing waits on those messages; they
//! are drained at the end of the request.

use serde_json::json;
use std::sync::Arc;
use std::time::Instant;
use tokio::sync::mpsc;

use crate::config::ReliefConfig;
use crate::error::HandlerError;
use crate::models::Coordinates;
use crate::skills::{
    worker_agent_name, EvaluationResult, EvaluatorSkill, Plan, PlannerSkill, WorkerPool,
    WorkerResult,
};
use crate::state::{InteractionRecord, SessionStore, SessionUpdate};
use crate::tools::ResourceLookup;

use super::a2a_bridge::{spawn_agent_loop, AgentLoopHandle, Delivery};
use super::a2a_protocol::{Message, MessageBus};
use super::events::{PipelineEvent, PipelineEventKind};
use super::pipeline::Pipeline;

pub const COORDINATOR_AGENT: &str = "coordinator";
pub const ANALYZER_AGENT: &str = "context_analyzer";
pub const PLANNER_AGENT: &str = "planner";
pub const WORKER_AGENT: &str = "worker";
pub const EVALUATOR_AGENT: &str = "evaluator";

/// The request coordinator
pub struct Coordinator {
    config: ReliefConfig,
    store: Arc<SessionStore>,
    planner: PlannerSkill,
    workers: WorkerPool,
    evaluator: EvaluatorSkill,
    bus: Arc<MessageBus>,
    event_tx: Option<mpsc::Sender<PipelineEvent>>,
    agent_loops: Vec<AgentLoopHandle>,
}

impl Coordinator {
    /// Create a coordinator with one worker per enabled domain
    pub fn new(
        config: ReliefConfig,
        store: Arc<SessionStore>,
        lookup: Arc<dyn ResourceLookup>,
    ) -> Self {
        let workers = WorkerPool::for_domains(
            &config.enabled_domains,
            lookup,
            store.clone(),
            config.cache_ttl(),
        );
        let bus = Arc::new(MessageBus::new());
        register_default_handlers(&bus, &store);

        Self {
            planner: PlannerSkill::new(store.clone()),
            evaluator: EvaluatorSkill::from_config(&config),
            workers,
            bus,
            store,
            config,
            event_tx: None,
            agent_loops: Vec::new(),
        }
    }

    /// Set event channel for streaming events
    pub fn with_event_channel(mut self, tx: mpsc::Sender<PipelineEvent>) -> Self {
        self.event_tx = Some(tx);
        self
    }

    /// Move the named agents' handlers onto their own loop tasks.
    ///
    /// Failed deliveries are put back on the bus. Must be called inside a
    /// tokio runtime.
    pub fn with_agent_loops(mut self, agents: &[&str]) -> Self {
        let (progress_tx, mut progress_rx) = mpsc::channel::<Delivery>(self.config.bus_capacity);

        for agent in agents {
            match self.bus.handler(agent) {
                Some(handler) => self.agent_loops.push(spawn_agent_loop(
                    agent,
                    handler,
                    self.config.bus_capacity,
                    progress_tx.clone(),
                )),
                None => tracing::warn!("No handler registered for {}, loop not started", agent),
            }
        }

        let bus = self.bus.clone();
        tokio::spawn(async move {
            while let Some(delivery) = progress_rx.recv().await {
                match delivery {
                    Delivery::Handled { agent, message_id } => {
                        tracing::debug!("{} handled {}", agent, message_id);
                    }
                    Delivery::Failed { message, .. } => bus.send(message),
                }
            }
        });
        self
    }

    pub fn store(&self) -> &Arc<SessionStore> {
        &self.store
    }

    pub fn bus(&self) -> &Arc<MessageBus> {
        &self.bus
    }

    pub fn config(&self) -> &ReliefConfig {
        &self.config
    }

    /// Emit an event
    async fn emit(&self, event: PipelineEvent) {
        tracing::debug!(
            kind = ?event.kind,
            agent = %event.agent,
            session_id = %event.session_id,
            "Pipeline event"
        );
        if let Some(tx) = &self.event_tx {
            let _ = tx.send(event).await;
        }
    }

    /// Answer one request.
    ///
    /// A known `session_id` is reused; an unknown one is replaced by a fresh
    /// session. Never fails: the worst outcome is the fallback response.
    #[tracing::instrument(skip(self, coordinates), fields(input_preview = %text.chars().take(50).collect::<String>()))]
    pub async fn handle_request(
        &self,
        text: &str,
        session_id: Option<&str>,
        coordinates: Option<Coordinates>,
    ) -> EvaluationResult {
        let started = Instant::now();
        let mut pipeline = Pipeline::new();
        let session_id = self.resolve_session(text, session_id);

        self.record(
            &session_id,
            InteractionRecord::new(COORDINATOR_AGENT, "request_started")
                .with_details(json!({ "user_input": text })),
        );
        self.emit(
            PipelineEvent::new(PipelineEventKind::RequestStarted, COORDINATOR_AGENT, &session_id)
                .with_data(json!({ "user_input": text, "stage": pipeline.stage })),
        )
        .await;

        // ANALYZE + PLAN
        pipeline.advance();
        self.emit(PipelineEvent::new(
            PipelineEventKind::AgentStarted,
            ANALYZER_AGENT,
            &session_id,
        ))
        .await;
        let planned = self.planner.plan_request(text, &session_id, coordinates);
        let (context, plan) = (planned.context, planned.plan);
        let session_id = plan.session_id.clone();

        self.emit(
            PipelineEvent::new(PipelineEventKind::AgentCompleted, ANALYZER_AGENT, &session_id)
                .with_data(json!({
                    "urgency": context.urgency,
                    "disaster_type": context.disaster_type,
                    "needs": context.needs,
                    "area": context.location.area,
                })),
        )
        .await;
        self.notify(&plan, ANALYZER_AGENT, PLANNER_AGENT, "context_ready", json!(context));

        pipeline.advance();
        self.emit(
            PipelineEvent::new(PipelineEventKind::AgentCompleted, PLANNER_AGENT, &session_id)
                .with_data(json!({
                    "resource_types": plan.resource_types,
                    "priority": plan.priority,
                })),
        )
        .await;
        self.notify(&plan, PLANNER_AGENT, WORKER_AGENT, "plan_ready", json!(plan));

        // DISPATCH
        pipeline.advance();
        for domain in &plan.resource_types {
            self.emit(PipelineEvent::new(
                PipelineEventKind::AgentStarted,
                &worker_agent_name(*domain),
                &session_id,
            ))
            .await;
        }
        let results = self.workers.dispatch(&plan).await;
        self.report_results(&session_id, &results).await;
        if results.iter().all(|r| !r.is_success()) {
            pipeline.fail();
        }
        self.notify(
            &plan,
            WORKER_AGENT,
            EVALUATOR_AGENT,
            "results_ready",
            json!({
                "domains": results.iter().map(|r| r.domain).collect::<Vec<_>>(),
                "item_counts": results.iter().map(|r| r.items.len()).collect::<Vec<_>>(),
            }),
        );

        // EVALUATE
        pipeline.advance();
        let evaluation = self.evaluator.evaluate(&results, &plan);
        self.emit(
            PipelineEvent::new(PipelineEventKind::AgentCompleted, EVALUATOR_AGENT, &session_id)
                .with_data(json!({
                    "resource_count": evaluation.resource_count,
                    "confidence": evaluation.evaluation_confidence,
                })),
        )
        .await;
        pipeline.advance();
        debug_assert!(pipeline.is_complete());

        self.drain_bus().await;

        let duration_ms = started.elapsed().as_millis() as u64;
        self.record(
            &session_id,
            InteractionRecord::new(COORDINATOR_AGENT, "request_completed").with_details(json!({
                "resource_count": evaluation.resource_count,
                "confidence": evaluation.evaluation_confidence,
            })),
        );
        self.emit(
            PipelineEvent::new(
                PipelineEventKind::RequestCompleted,
                COORDINATOR_AGENT,
                &session_id,
            )
            .with_data(json!({
                "duration_ms": duration_ms,
                "resource_count": evaluation.resource_count,
                "confidence": evaluation.evaluation_confidence,
                "stage": pipeline.stage,
                "success": pipeline.is_success(),
            })),
        )
        .await;

        if pipeline.is_success() {
            tracing::info!(
                session_id = %session_id,
                duration_ms,
                resource_count = evaluation.resource_count,
                confidence = evaluation.evaluation_confidence,
                "Request handled"
            );
        } else {
            tracing::warn!(
                session_id = %session_id,
                duration_ms,
                stage = %pipeline.stage,
                "Every worker failed, answered with fallback"
            );
        }
        evaluation
    }

    /// Evict idle sessions and stale cache entries
    pub fn sweep(&self) -> (usize, usize) {
        let sessions = self.store.evict_idle(self.config.session_idle());
        let cached = self.store.purge_cache();
        if sessions + cached > 0 {
            tracing::info!("Swept {} sessions and {} cache entries", sessions, cached);
        }
        (sessions, cached)
    }

    fn resolve_session(&self, text: &str, requested: Option<&str>) -> String {
        if let Some(id) = requested {
            if self
                .store
                .update(id, SessionUpdate::new().user_input(text))
            {
                return id.to_string();
            }
            tracing::warn!("Session {} not found, creating a new one", id);
        }
        self.store.create(text)
    }

    fn record(&self, session_id: &str, record: InteractionRecord) {
        self.store
            .update(session_id, SessionUpdate::new().interaction(record));
    }

    async fn report_results(&self, session_id: &str, results: &[WorkerResult]) {
        for result in results {
            let agent = worker_agent_name(result.domain);
            let event = match &result.failure {
                None => PipelineEvent::new(PipelineEventKind::AgentCompleted, &agent, session_id)
                    .with_data(json!({
                        "items": result.items.len(),
                        "confidence": result.confidence,
                    })),
                Some(failure) => {
                    PipelineEvent::new(PipelineEventKind::AgentFailed, &agent, session_id)
                        .with_data(json!({ "failure": failure }))
                }
            };
            self.emit(event).await;
        }

        let summary: Vec<serde_json::Value> = results
            .iter()
            .map(|r| {
                json!({
                    "domain": r.domain,
                    "items": r.items.len(),
                    "confidence": r.confidence,
                    "failure": r.failure,
                })
            })
            .collect();
        self.record(
            session_id,
            InteractionRecord::new("worker_pool", "results_collected")
                .with_details(json!(summary)),
        );
    }

    fn notify(
        &self,
        plan: &Plan,
        from: &str,
        to: &str,
        message_type: &str,
        payload: serde_json::Value,
    ) {
        self.bus.send(
            Message::new(&plan.session_id, from, to, message_type, payload)
                .with_priority(plan.priority),
        );
    }

    async fn drain_bus(&self) {
        for handle in &self.agent_loops {
            self.bus.forward(handle).await;
        }
        let report = self.bus.process_messages();
        if !report.failed.is_empty() || report.unhandled > 0 {
            tracing::warn!(
                delivered = report.delivered.len(),
                failed = report.failed.len(),
                unhandled = report.unhandled,
                "A2A messages left on the bus"
            );
        }
    }
}

/// Log-and-record handlers for the three pipeline agents
fn register_default_handlers(bus: &MessageBus, store: &Arc<SessionStore>) {
    let expected = [
        (PLANNER_AGENT, "context_ready"),
        (WORKER_AGENT, "plan_ready"),
        (EVALUATOR_AGENT, "results_ready"),
    ];

    for (agent, message_type) in expected {
        let store = store.clone();
        bus.register_handler(agent, move |message: &Message| {
            if message.message_type != message_type {
                return Err(HandlerError::new(
                    agent,
                    format!("unexpected message type '{}'", message.message_type),
                ));
            }

            let record = InteractionRecord::new(agent, "message_received").with_details(json!({
                "message_id": message.message_id,
                "message_type": message.message_type,
                "from_agent": message.from_agent,
                "priority": message.priority,
            }));
            if !store.update(&message.session_id, SessionUpdate::new().interaction(record)) {
                tracing::debug!(
                    "Session {} gone, dropping {}",
                    message.session_id,
                    message.message_id
                );
            }
            Ok(())
        });
    }
}
