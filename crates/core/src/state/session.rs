//! # Session Store
//!
//! Per-request session state plus an independent TTL result cache.
//! Constructed once at process start and shared (behind an `Arc`) with the
//! coordinator and every stage that needs it.
//!
//! Sessions live in a `DashMap`: reads and writes to one session id are
//! serialized by its shard lock, while unrelated ids proceed in parallel.

use chrono::{DateTime, Utc};
use dashmap::DashMap;
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use std::time::Duration;
use uuid::Uuid;

use super::cache::TtlCache;
use crate::context::location::{extract_location, LocationDescriptor};
use crate::models::{DisasterType, NeedCategory, Priority};

/// One entry in a session's interaction log
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct InteractionRecord {
    pub timestamp: DateTime<Utc>,
    /// Agent that produced the record
    pub agent: String,
    pub action: String,
    #[serde(default)]
    pub details: serde_json::Value,
}

impl InteractionRecord {
    pub fn new(agent: &str, action: &str) -> Self {
        Self {
            timestamp: Utc::now(),
            agent: agent.to_string(),
            action: action.to_string(),
            details: serde_json::Value::Null,
        }
    }

    pub fn with_details(mut self, details: serde_json::Value) -> Self {
        self.details = details;
        self
    }
}

/// State kept for a single request
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Session {
    pub session_id: String,
    pub created_at: DateTime<Utc>,
    pub user_input: String,
    pub location: LocationDescriptor,
    #[serde(default)]
    pub urgency: Option<Priority>,
    #[serde(default)]
    pub disaster_type: Option<DisasterType>,
    #[serde(default)]
    pub needs: Vec<NeedCategory>,
    #[serde(default)]
    pub interactions: Vec<InteractionRecord>,
    pub last_accessed: DateTime<Utc>,
}

/// Partial update merged into an existing session
#[derive(Debug, Clone, Default)]
pub struct SessionUpdate {
    pub user_input: Option<String>,
    pub location: Option<LocationDescriptor>,
    pub urgency: Option<Priority>,
    pub disaster_type: Option<DisasterType>,
    pub needs: Option<Vec<NeedCategory>>,
    /// Appended to the interaction log in order
    pub interactions: Vec<InteractionRecord>,
}

impl SessionUpdate {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn user_input(mut self, input: impl Into<String>) -> Self {
        self.user_input = Some(input.into());
        self
    }

    pub fn location(mut self, location: LocationDescriptor) -> Self {
        self.location = Some(location);
        self
    }

    pub fn urgency(mut self, urgency: Priority) -> Self {
        self.urgency = Some(urgency);
        self
    }

    pub fn disaster_type(mut self, disaster_type: DisasterType) -> Self {
        self.disaster_type = Some(disaster_type);
        self
    }

    pub fn needs(mut self, needs: Vec<NeedCategory>) -> Self {
        self.needs = Some(needs);
        self
    }

    pub fn interaction(mut self, record: InteractionRecord) -> Self {
        self.interactions.push(record);
        self
    }

    fn apply(self, session: &mut Session) {
        if let Some(input) = self.user_input {
            session.user_input = input;
        }
        if let Some(location) = self.location {
            session.location = location;
        }
        if let Some(urgency) = self.urgency {
            session.urgency = Some(urgency);
        }
        if let Some(disaster_type) = self.disaster_type {
            session.disaster_type = Some(disaster_type);
        }
        if let Some(needs) = self.needs {
            session.needs = needs;
        }
        session.interactions.extend(self.interactions);
    }
}

/// Process-wide session map and result cache
#[derive(Debug, Default)]
pub struct SessionStore {
    sessions: DashMap<String, Session>,
    cache: TtlCache<serde_json::Value>,
}

impl SessionStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Create a session for `input` and return its fresh id
    pub fn create(&self, input: &str) -> String {
        let session_id = Uuid::new_v4().to_string();
        let now = Utc::now();

        let session = Session {
            session_id: session_id.clone(),
            created_at: now,
            user_input: input.to_string(),
            location: extract_location(input, None),
            urgency: None,
            disaster_type: None,
            needs: Vec::new(),
            interactions: Vec::new(),
            last_accessed: now,
        };

        self.sessions.insert(session_id.clone(), session);
        tracing::debug!(session_id = %session_id, "Session created");
        session_id
    }

    /// Fetch a snapshot of a session, refreshing its last-accessed time
    pub fn get(&self, session_id: &str) -> Option<Session> {
        let mut entry = self.sessions.get_mut(session_id)?;
        entry.last_accessed = Utc::now();
        Some(entry.clone())
    }

    /// Merge `update` into a session. Returns false when the id is unknown.
    pub fn update(&self, session_id: &str, update: SessionUpdate) -> bool {
        match self.sessions.get_mut(session_id) {
            Some(mut entry) => {
                update.apply(&mut entry);
                entry.last_accessed = Utc::now();
                true
            }
            None => false,
        }
    }

    /// Remove sessions not accessed within `max_idle`
    pub fn evict_idle(&self, max_idle: Duration) -> usize {
        let max_idle = chrono::Duration::from_std(max_idle).unwrap_or(chrono::Duration::MAX);
        let cutoff = Utc::now()
            .checked_sub_signed(max_idle)
            .unwrap_or(DateTime::<Utc>::MIN_UTC);

        let before = self.sessions.len();
        self.sessions
            .retain(|_, session| session.last_accessed > cutoff);
        let evicted = before.saturating_sub(self.sessions.len());
        if evicted > 0 {
            tracing::info!("Evicted {} idle sessions", evicted);
        }
        evicted
    }

    pub fn len(&self) -> usize {
        self.sessions.len()
    }

    pub fn is_empty(&self) -> bool {
        self.sessions.is_empty()
    }

    /// Cache any serializable value under `key` for `ttl`
    pub fn cache_result<T: Serialize>(
        &self,
        key: &str,
        data: &T,
        ttl: Duration,
    ) -> Result<(), serde_json::Error> {
        let value = serde_json::to_value(data)?;
        self.cache.insert(key, value, ttl);
        Ok(())
    }

    /// Read back a cached value; stale or mistyped entries read as absent
    pub fn get_cached<T: DeserializeOwned>(&self, key: &str) -> Option<T> {
        let value = self.cache.get(key)?;
        match serde_json::from_value(value) {
            Ok(data) => Some(data),
            Err(e) => {
                tracing::warn!("Cached entry '{}' has unexpected shape: {}", key, e);
                None
            }
        }
    }

    /// Drop stale cache entries
    pub fn purge_cache(&self) -> usize {
        self.cache.purge_expired()
    }
}
