//! # Relief Skills
//!
//! The three request-handling stages driven by the coordinator.
//!
//! ## Flow
//!
//! ```text
//! PlannerSkill ──▶ WorkerPool (one DomainWorker per domain) ──▶ EvaluatorSkill
//!     Plan              Vec<WorkerResult>                        EvaluationResult
//! ```
//!
//! - `PlannerSkill` - Analyze the request and decide which domains to query
//! - `DomainWorker` / `WorkerPool` - Concurrent per-domain resource lookup
//! - `EvaluatorSkill` - Prioritize, validate and compose the answer

// Planning
pub mod planner_skill;

// Runtime Skills
pub mod worker_skill;

// Aggregation
pub mod evaluator_skill;

// Re-exports for convenience
pub use evaluator_skill::{EvaluationResult, EvaluatorSkill, MapResource};
pub use planner_skill::{Plan, PlannedRequest, PlannerSkill};
pub use worker_skill::{worker_agent_name, DomainWorker, WorkerFailure, WorkerPool, WorkerResult};
