//! # Relief Core
//!
//! The disaster-relief request pipeline: context analysis, planning,
//! concurrent per-domain resource lookup and evaluation, plus the session
//! store and A2A message bus that support them.
//!
//! ## Architecture
//!
//! - `context/` - Keyword/pattern reading of request text
//! - `skills/` - Planner, domain workers and evaluator
//! - `state/` - Session store and TTL cache
//! - `swarm/` - Coordinator, A2A bus, pipeline stages and events
//! - `tools/` - Resource lookup collaborator and the static catalog
//!
//! ## Usage
//!
//! ```rust,ignore
//! use relief_core::{Coordinator, ReliefConfig, SessionStore, StaticCatalog};
//! use std::sync::Arc;
//!
//! let coordinator = Coordinator::new(
//!     ReliefConfig::default(),
//!     Arc::new(SessionStore::new()),
//!     Arc::new(StaticCatalog::new()),
//! );
//! let result = coordinator.handle_request("Need shelter downtown", None, None).await;
//! println!("{}", result.final_response);
//! ```

pub mod config;
pub mod context;
pub mod error;
pub mod models;
pub mod skills;
pub mod state;
pub mod swarm;
pub mod tools;

pub use config::ReliefConfig;
pub use error::{HandlerError, LookupError, ReliefError};
pub use skills::EvaluationResult;
pub use state::SessionStore;
pub use swarm::Coordinator;
pub use tools::{ResourceLookup, StaticCatalog};
