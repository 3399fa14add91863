//! # Swarm Orchestration
//!
//! Coordinates the request pipeline for Relief.
//!
//! ## Pipeline Flow
//!
//! ```text
//! Request → Context Analyzer → Planner → {Shelter, Food, Medical, Government} → Evaluator
//! ```

pub mod a2a_bridge;
pub mod a2a_protocol;
pub mod coordinator;
pub mod events;
pub mod pipeline;

pub use a2a_bridge::{spawn_agent_loop, AgentLoopHandle, Delivery};
pub use a2a_protocol::{invoke_handler, Message, MessageBus, MessageHandler, ProcessReport};
pub use coordinator::{
    Coordinator, ANALYZER_AGENT, COORDINATOR_AGENT, EVALUATOR_AGENT, PLANNER_AGENT, WORKER_AGENT,
};
pub use events::{PipelineEvent, PipelineEventKind};
pub use pipeline::{Pipeline, PipelineStage};
