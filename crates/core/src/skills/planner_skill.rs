//! # Planner Skill
//!
//! Combines the context analyzer's reading of a request with session state
//! into an immutable `Plan`: which domains to query, at what priority, and
//! under which location constraints.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::sync::Arc;

use crate::context::{Context, ContextAnalyzer};
use crate::models::{Coordinates, LocationConstraints, Priority, ResourceDomain};
use crate::state::{InteractionRecord, SessionStore};

/// Structured intent consumed by workers and the evaluator
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Plan {
    pub session_id: String,
    pub user_input: String,
    /// Non-empty, duplicate-free, in need order
    pub resource_types: Vec<ResourceDomain>,
    pub priority: Priority,
    pub location_constraints: LocationConstraints,
    pub user_coordinates: Option<Coordinates>,
    pub timestamp: DateTime<Utc>,
}

/// Context and the plan derived from it
#[derive(Debug, Clone)]
pub struct PlannedRequest {
    pub context: Context,
    pub plan: Plan,
}

/// Planner backed by the shared session store
pub struct PlannerSkill {
    analyzer: ContextAnalyzer,
    store: Arc<SessionStore>,
}

impl PlannerSkill {
    pub fn new(store: Arc<SessionStore>) -> Self {
        Self {
            analyzer: ContextAnalyzer::new(),
            store,
        }
    }

    /// Build a plan for `text` under `session_id`
    pub fn create_plan(
        &self,
        text: &str,
        session_id: &str,
        coordinates: Option<Coordinates>,
    ) -> Plan {
        self.plan_request(text, session_id, coordinates).plan
    }

    /// Analyze, record the derived fields on the session, and plan.
    ///
    /// An unknown session id is replaced by a fresh session; the returned
    /// plan carries whichever id was actually used.
    pub fn plan_request(
        &self,
        text: &str,
        session_id: &str,
        coordinates: Option<Coordinates>,
    ) -> PlannedRequest {
        let session_id = match self.store.get(session_id) {
            Some(session) => session.session_id,
            None => {
                let fresh = self.store.create(text);
                tracing::warn!(
                    "Session {} not found, continuing with new session {}",
                    session_id,
                    fresh
                );
                fresh
            }
        };

        let context = self.analyzer.analyze(&session_id, text, coordinates);
        let plan = Self::build_plan(&context, text);

        self.store.update(
            &session_id,
            context.session_update().interaction(
                InteractionRecord::new("planner", "plan_created").with_details(
                    serde_json::json!({
                        "resource_types": plan.resource_types,
                        "priority": plan.priority,
                    }),
                ),
            ),
        );

        tracing::info!(
            session_id = %session_id,
            priority = %plan.priority,
            domains = ?plan.resource_types,
            "Plan created"
        );

        PlannedRequest { context, plan }
    }

    /// Pure context-to-plan transformation
    pub fn build_plan(context: &Context, text: &str) -> Plan {
        Plan {
            session_id: context.session_id.clone(),
            user_input: text.to_string(),
            resource_types: resource_types(context),
            priority: context.urgency,
            location_constraints: context.location.constraints(context.urgency),
            user_coordinates: context.location.coordinates,
            timestamp: context.timestamp,
        }
    }
}

/// Needs collapsed onto the domain enumeration; all four when none matched
fn resource_types(context: &Context) -> Vec<ResourceDomain> {
    if context.needs_defaulted {
        return ResourceDomain::all();
    }

    let mut domains = Vec::with_capacity(context.needs.len());
    for need in &context.needs {
        let domain = need.domain();
        if !domains.contains(&domain) {
            domains.push(domain);
        }
    }

    if domains.is_empty() {
        ResourceDomain::all()
    } else {
        domains
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn planner() -> (PlannerSkill, Arc<SessionStore>) {
        let store = Arc::new(SessionStore::new());
        (PlannerSkill::new(store.clone()), store)
    }

    #[test]
    fn test_no_domain_keyword_uses_all_four() {
        let (planner, store) = planner();
        for text in ["what should I do?", "Emergency, please!", "the storm hit us"] {
            let id = store.create(text);
            let plan = planner.create_plan(text, &id, None);
            assert_eq!(plan.resource_types, ResourceDomain::all(), "{}", text);
        }
    }

    #[test]
    fn test_medical_only() {
        let (planner, store) = planner();
        let text = "Where can I find medical help?";
        let id = store.create(text);
        let plan = planner.create_plan(text, &id, None);
        assert_eq!(plan.resource_types, vec![ResourceDomain::Medical]);
        assert_eq!(plan.priority, Priority::Medium);
    }

    #[test]
    fn test_assistance_collapses_to_government() {
        let (planner, store) = planner();
        let text = "How do I apply for government assistance?";
        let id = store.create(text);
        let plan = planner.create_plan(text, &id, None);
        assert_eq!(plan.resource_types, vec![ResourceDomain::Government]);
    }

    #[test]
    fn test_priority_agrees_with_context_urgency() {
        let (planner, store) = planner();
        for text in [
            "Emergency shelter needed now!",
            "I need shelter and food after the hurricane",
            "Medical assistance needed urgently",
            "critical: out of water",
            "Where can I find food and water?",
        ] {
            let id = store.create(text);
            let planned = planner.plan_request(text, &id, None);
            assert_eq!(planned.plan.priority, planned.context.urgency, "{}", text);
            assert_eq!(planned.plan.location_constraints.urgency, planned.plan.priority);
        }
    }

    #[test]
    fn test_urgent_request_is_high() {
        let (planner, store) = planner();
        let text = "Emergency shelter needed now!";
        let id = store.create(text);
        let plan = planner.create_plan(text, &id, None);
        assert_eq!(plan.priority, Priority::High);
        assert_eq!(plan.resource_types, vec![ResourceDomain::Shelter]);
    }

    #[test]
    fn test_unknown_session_is_recreated() {
        let (planner, store) = planner();
        let plan = planner.create_plan("food please", "missing-id", None);
        assert_ne!(plan.session_id, "missing-id");
        let session = store.get(&plan.session_id).unwrap();
        assert_eq!(session.needs.len(), 1);
    }

    #[test]
    fn test_session_updated_with_context() {
        let (planner, store) = planner();
        let text = "hurt near the east end, tornado";
        let id = store.create(text);
        planner.create_plan(text, &id, Some(Coordinates::new(1.0, 2.0)));

        let session = store.get(&id).unwrap();
        assert_eq!(session.location.area, "eastside");
        assert_eq!(session.location.coordinates, Some(Coordinates::new(1.0, 2.0)));
        let agents: Vec<&str> = session.interactions.iter().map(|r| r.agent.as_str()).collect();
        assert_eq!(agents, vec!["context_analyzer", "planner"]);
    }

    #[test]
    fn test_coordinates_pass_through() {
        let (planner, store) = planner();
        let id = store.create("food");
        let coords = Coordinates::new(29.7, -95.3);
        let plan = planner.create_plan("food", &id, Some(coords));
        assert_eq!(plan.user_coordinates, Some(coords));
    }
}
