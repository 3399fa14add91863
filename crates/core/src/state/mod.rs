//! # State
//!
//! In-memory session state and the TTL result cache.
//! No durability: everything here lives for the lifetime of the process.

pub mod cache;
pub mod session;

pub use cache::TtlCache;
pub use session::{InteractionRecord, Session, SessionStore, SessionUpdate};
