//! End-to-end pipeline behavior against a scripted resource lookup.

use async_trait::async_trait;
use std::sync::{Arc, Mutex};
use std::time::Duration;
use tokio::sync::Barrier;

use relief_core::models::{Coordinates, LocationConstraints, Priority, ResourceDomain, ResourceItem};
use relief_core::skills::PlannerSkill;
use relief_core::swarm::{Message, MessageBus};
use relief_core::{Coordinator, LookupError, ReliefConfig, ResourceLookup, SessionStore};

/// Answers every domain with two items and remembers what it was asked
#[derive(Default)]
struct ScriptedLookup {
    asked: Mutex<Vec<ResourceDomain>>,
    failing: Option<ResourceDomain>,
    barrier: Option<Barrier>,
}

impl ScriptedLookup {
    fn failing(domain: ResourceDomain) -> Self {
        Self {
            failing: Some(domain),
            ..Default::default()
        }
    }

    fn gated(parties: usize) -> Self {
        Self {
            barrier: Some(Barrier::new(parties)),
            ..Default::default()
        }
    }

    fn asked(&self) -> Vec<ResourceDomain> {
        let mut asked = self.asked.lock().unwrap().clone();
        asked.sort_by_key(|d| d.as_str());
        asked
    }
}

#[async_trait]
impl ResourceLookup for ScriptedLookup {
    async fn lookup(
        &self,
        domain: ResourceDomain,
        _constraints: &LocationConstraints,
    ) -> Result<Vec<ResourceItem>, LookupError> {
        self.asked.lock().unwrap().push(domain);
        if let Some(barrier) = &self.barrier {
            barrier.wait().await;
        }
        if self.failing == Some(domain) {
            return Err(LookupError::Timeout(3000));
        }
        Ok(vec![
            ResourceItem::new(format!("{} one", domain.display_name()), "first")
                .verified()
                .with_coordinates(29.7, -95.3),
            ResourceItem::new(format!("{} two", domain.display_name()), "second").verified(),
        ])
    }
}

fn coordinator_with(lookup: Arc<ScriptedLookup>, config: ReliefConfig) -> Coordinator {
    Coordinator::new(config, Arc::new(SessionStore::new()), lookup)
}

fn sorted(mut domains: Vec<ResourceDomain>) -> Vec<ResourceDomain> {
    domains.sort_by_key(|d| d.as_str());
    domains
}

#[tokio::test]
async fn no_domain_keyword_queries_all_four() {
    let lookup = Arc::new(ScriptedLookup::default());
    let coordinator = coordinator_with(lookup.clone(), ReliefConfig::default());

    let result = coordinator
        .handle_request("Emergency, please help us now!", None, None)
        .await;

    assert_eq!(lookup.asked(), sorted(ResourceDomain::all()));
    assert_eq!(result.resource_count, 4);
    let response = &result.final_response;
    let medical = response.find("Medical Resources:").unwrap();
    let shelter = response.find("Shelter Resources:").unwrap();
    assert!(medical < shelter, "high priority puts medical first");
}

#[tokio::test]
async fn urgent_shelter_request_is_high_priority_and_scoped() {
    let store = Arc::new(SessionStore::new());
    let planner = PlannerSkill::new(store.clone());
    let text = "Emergency shelter needed now!";
    let id = store.create(text);
    let plan = planner.create_plan(text, &id, None);
    assert_eq!(plan.priority, Priority::High);
    assert_eq!(plan.resource_types, vec![ResourceDomain::Shelter]);

    let lookup = Arc::new(ScriptedLookup::default());
    let coordinator = coordinator_with(lookup.clone(), ReliefConfig::default());
    coordinator.handle_request(text, None, None).await;
    assert_eq!(lookup.asked(), vec![ResourceDomain::Shelter]);
}

#[tokio::test]
async fn medical_question_yields_only_medical_section() {
    let lookup = Arc::new(ScriptedLookup::default());
    let coordinator = coordinator_with(lookup.clone(), ReliefConfig::default());

    let result = coordinator
        .handle_request("Where can I find medical help?", None, None)
        .await;

    assert_eq!(lookup.asked(), vec![ResourceDomain::Medical]);
    assert_eq!(result.resource_count, 1);
    assert_eq!(result.final_response.matches("Resources:").count(), 1);
    assert!(result.final_response.contains("Medical Resources:"));
    assert!(result.final_response.contains("• Medical one: first"));
    assert_eq!(result.map_resources.len(), 1);
}

#[tokio::test]
async fn low_confidence_results_are_excluded() {
    let lookup = Arc::new(ScriptedLookup::default());
    let config = ReliefConfig {
        confidence_threshold: 0.85,
        ..ReliefConfig::default()
    };
    let coordinator = coordinator_with(lookup, config);

    let result = coordinator
        .handle_request("what should I do?", None, None)
        .await;

    // shelter (0.85) and food (0.80) sit at or below the threshold
    assert_eq!(result.resource_count, 2);
    assert!((result.evaluation_confidence - 0.925).abs() < 1e-6);
    assert!(!result.final_response.contains("Shelter Resources:"));
    assert!(!result.final_response.contains("Food Resources:"));
}

#[tokio::test]
async fn failing_domain_does_not_abort_others() {
    let lookup = Arc::new(ScriptedLookup::failing(ResourceDomain::Food));
    let coordinator = coordinator_with(lookup, ReliefConfig::default());

    let result = coordinator
        .handle_request("I need shelter and food after the hurricane", None, None)
        .await;

    assert_eq!(result.resource_count, 1);
    assert!(result.final_response.contains("Shelter Resources:"));
    assert!(!result.final_response.contains("Food Resources:"));
    assert!((result.evaluation_confidence - 0.85).abs() < 1e-6);
}

#[tokio::test]
async fn everything_failing_returns_fallback() {
    let lookup = Arc::new(ScriptedLookup::failing(ResourceDomain::Medical));
    let coordinator = coordinator_with(lookup, ReliefConfig::default());

    let result = coordinator
        .handle_request("Where can I find medical help?", None, None)
        .await;

    assert_eq!(result.resource_count, 0);
    assert_eq!(result.evaluation_confidence, 0.0);
    assert!(result
        .final_response
        .starts_with("I'm sorry, but I couldn't find any available resources in your area."));
}

#[tokio::test]
async fn workers_run_concurrently() {
    // every lookup waits until all four are in flight
    let lookup = Arc::new(ScriptedLookup::gated(4));
    let coordinator = coordinator_with(lookup.clone(), ReliefConfig::default());

    let result = tokio::time::timeout(
        Duration::from_secs(5),
        coordinator.handle_request("what should I do?", None, None),
    )
    .await
    .expect("sequential dispatch would never pass the barrier");

    assert_eq!(result.resource_count, 4);
}

#[tokio::test]
async fn identical_input_gives_identical_response() {
    let a = coordinator_with(Arc::new(ScriptedLookup::default()), ReliefConfig::default());
    let b = coordinator_with(Arc::new(ScriptedLookup::default()), ReliefConfig::default());
    let text = "Need food and a doctor near the west side";

    let first = a.handle_request(text, None, None).await;
    let second = b.handle_request(text, None, None).await;

    assert_ne!(first.session_id, second.session_id);
    assert_eq!(first.final_response, second.final_response);
    assert_eq!(first.evaluation_confidence, second.evaluation_confidence);
}

/// Answers with items named after the caller's coordinates
struct NearbyLookup;

#[async_trait]
impl ResourceLookup for NearbyLookup {
    async fn lookup(
        &self,
        domain: ResourceDomain,
        constraints: &LocationConstraints,
    ) -> Result<Vec<ResourceItem>, LookupError> {
        let c = constraints.coordinates.unwrap_or(Coordinates::new(0.0, 0.0));
        Ok(vec![ResourceItem::new(
            format!("{} near {},{}", domain, c.lat, c.lon),
            "x",
        )
        .verified()])
    }
}

#[tokio::test]
async fn callers_at_different_coordinates_get_their_own_results() {
    let coordinator = Coordinator::new(
        ReliefConfig::default(),
        Arc::new(SessionStore::new()),
        Arc::new(NearbyLookup),
    );

    let first = coordinator
        .handle_request("hungry", None, Some(Coordinates::new(10.0, 10.0)))
        .await;
    let second = coordinator
        .handle_request("hungry", None, Some(Coordinates::new(-33.0, 151.0)))
        .await;

    assert!(first.final_response.contains("• food near 10,10: x"));
    assert!(second.final_response.contains("• food near -33,151: x"));
}

#[test]
fn session_round_trip() {
    let store = SessionStore::new();
    let id = store.create("Need shelter for my dog");
    let session = store.get(&id).unwrap();

    assert_eq!(session.user_input, "Need shelter for my dog");
    assert!(session.last_accessed >= session.created_at);
    assert!(session.location.needs_pets);
}

#[test]
fn handle_request_from_blocking_context() {
    let coordinator = coordinator_with(Arc::new(ScriptedLookup::default()), ReliefConfig::default());
    let result = tokio_test::block_on(coordinator.handle_request("hungry", None, None));

    assert!(result.final_response.contains("Food Resources:"));
    let session = coordinator.store().get(&result.session_id).unwrap();
    assert_eq!(session.user_input, "hungry");
}

#[test]
fn bus_delivers_high_priority_first() {
    use chrono::TimeZone;

    let at = |secs| chrono::Utc.timestamp_opt(secs, 0).single().unwrap();
    let bus = MessageBus::new();
    for (id, priority, secs) in [
        ("M1", Priority::Medium, 10),
        ("M2", Priority::High, 20),
        ("M3", Priority::High, 5),
    ] {
        let mut message = Message::new("s", "planner", "worker", "plan_ready", serde_json::json!({}))
            .with_priority(priority)
            .with_timestamp(at(secs));
        message.message_id = id.to_string();
        bus.send(message);
    }

    let order: Vec<String> = std::iter::from_fn(|| bus.receive("worker"))
        .map(|m| m.message_id)
        .collect();
    assert_eq!(order, vec!["M3", "M2", "M1"]);
}
