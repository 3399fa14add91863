//! # Context Analyzer
//!
//! Turns raw request text into a structured `Context`: urgency, disaster
//! type, needs and a coarse location. Deterministic and side-effect free;
//! the planner is the one that writes the derived fields back to the
//! session store (see `Context::session_update`).

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use super::keywords::{classify_disaster, classify_urgency, match_needs, DEFAULT_NEEDS};
use super::location::{extract_location, LocationDescriptor};
use crate::models::{Coordinates, DisasterType, NeedCategory, Priority};
use crate::state::{InteractionRecord, SessionUpdate};

/// Structured reading of one request
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Context {
    pub session_id: String,
    pub urgency: Priority,
    pub disaster_type: DisasterType,
    /// Ordered, duplicate-free need categories
    pub needs: Vec<NeedCategory>,
    /// True when no need keyword matched and `needs` holds the default set
    pub needs_defaulted: bool,
    pub location: LocationDescriptor,
    pub timestamp: DateTime<Utc>,
}

impl Context {
    /// Fields the analyzer derived, as a session update
    pub fn session_update(&self) -> SessionUpdate {
        SessionUpdate::new()
            .location(self.location.clone())
            .urgency(self.urgency)
            .disaster_type(self.disaster_type)
            .needs(self.needs.clone())
            .interaction(
                InteractionRecord::new("context_analyzer", "context_analyzed").with_details(
                    serde_json::json!({
                        "urgency": self.urgency,
                        "disaster_type": self.disaster_type,
                        "needs": self.needs,
                        "area": self.location.area,
                    }),
                ),
            )
    }
}

/// Keyword/pattern based context analyzer
#[derive(Debug, Clone, Copy, Default)]
pub struct ContextAnalyzer;

impl ContextAnalyzer {
    pub fn new() -> Self {
        Self
    }

    pub fn analyze(
        &self,
        session_id: &str,
        text: &str,
        coordinates: Option<Coordinates>,
    ) -> Context {
        let matched = match_needs(text);
        let needs_defaulted = matched.is_empty();
        let needs = if needs_defaulted {
            DEFAULT_NEEDS.to_vec()
        } else {
            matched
        };

        let context = Context {
            session_id: session_id.to_string(),
            urgency: classify_urgency(text),
            disaster_type: classify_disaster(text),
            needs,
            needs_defaulted,
            location: extract_location(text, coordinates),
            timestamp: Utc::now(),
        };

        tracing::debug!(
            session_id = %session_id,
            urgency = %context.urgency,
            disaster = %context.disaster_type,
            area = %context.location.area,
            "Context analyzed"
        );
        context
    }
}
