//! # Evaluator Skill
//!
//! Aggregates worker results into the final answer:
//!
//! 1. **prioritize**: stable, domain-grouped reorder by the plan's priority
//! 2. **validate**: drop results at or below the confidence threshold
//! 3. **compose**: one section per domain, then a closing notice
//!
//! Aggregate confidence is the mean over validated results (0.0 if none).

use serde::{Deserialize, Serialize};

use super::planner_skill::Plan;
use super::worker_skill::WorkerResult;
use crate::config::ReliefConfig;
use crate::models::{Priority, ResourceDomain, ResourceItem};

const RESPONSE_HEADER: &str = "Here are the available resources I found:";

const CLOSING_NOTICE: &str =
    "\nPlease verify this information with official sources as conditions may change rapidly.";

const FALLBACK_RESPONSE: &str = "I'm sorry, but I couldn't find any available resources in your area. Please try emergency services or check official government channels.\n\nEmergency contacts:\n• Emergency services: 911\n• FEMA: 1-800-621-3362\n• American Red Cross: 1-800-733-2767";

/// A surfaced resource that can be placed on a map
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct MapResource {
    pub domain: ResourceDomain,
    pub name: String,
    pub lat: f64,
    pub lon: f64,
}

/// Terminal artifact of one request
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EvaluationResult {
    pub session_id: String,
    pub final_response: String,
    /// Number of results that passed validation
    pub resource_count: usize,
    pub evaluation_confidence: f32,
    #[serde(default)]
    pub map_resources: Vec<MapResource>,
}

/// Domain order used when composing a response
pub fn priority_order(priority: Priority) -> [ResourceDomain; 4] {
    match priority {
        Priority::High => [
            ResourceDomain::Medical,
            ResourceDomain::Shelter,
            ResourceDomain::Food,
            ResourceDomain::Government,
        ],
        Priority::Medium => [
            ResourceDomain::Shelter,
            ResourceDomain::Medical,
            ResourceDomain::Food,
            ResourceDomain::Government,
        ],
    }
}

#[derive(Debug, Clone)]
pub struct EvaluatorSkill {
    confidence_threshold: f32,
    max_items: usize,
}

impl Default for EvaluatorSkill {
    fn default() -> Self {
        Self::from_config(&ReliefConfig::default())
    }
}

impl EvaluatorSkill {
    pub fn new(confidence_threshold: f32, max_items: usize) -> Self {
        Self {
            confidence_threshold,
            max_items,
        }
    }

    pub fn from_config(config: &ReliefConfig) -> Self {
        Self::new(config.confidence_threshold, config.max_items_per_section)
    }

    pub fn evaluate(&self, results: &[WorkerResult], plan: &Plan) -> EvaluationResult {
        let prioritized = prioritize(results, plan.priority);
        let validated = self.validate(prioritized);

        let evaluation = EvaluationResult {
            session_id: plan.session_id.clone(),
            final_response: self.compose(&validated),
            resource_count: validated.len(),
            evaluation_confidence: aggregate_confidence(&validated),
            map_resources: self.map_resources(&validated),
        };

        tracing::info!(
            session_id = %plan.session_id,
            resource_count = evaluation.resource_count,
            confidence = evaluation.evaluation_confidence,
            "Evaluation complete"
        );
        evaluation
    }

    /// Keep results strictly above the threshold
    pub fn validate<'a>(&self, results: Vec<&'a WorkerResult>) -> Vec<&'a WorkerResult> {
        results
            .into_iter()
            .filter(|r| {
                let keep = r.confidence.value() > self.confidence_threshold;
                if !keep {
                    tracing::debug!(
                        "Dropping {} result with confidence {:.2}",
                        r.domain,
                        r.confidence.value()
                    );
                }
                keep
            })
            .collect()
    }

    /// Render the response text; the fallback when nothing has items
    pub fn compose(&self, validated: &[&WorkerResult]) -> String {
        if validated.iter().all(|r| r.items.is_empty()) {
            return FALLBACK_RESPONSE.to_string();
        }

        let mut parts = vec![RESPONSE_HEADER.to_string()];
        for result in validated.iter().filter(|r| !r.items.is_empty()) {
            parts.push(format!("\n{} Resources:", result.domain.display_name()));
            for item in result.items.iter().take(self.max_items) {
                parts.push(format_item(result.domain, item));
            }
        }
        parts.push(CLOSING_NOTICE.to_string());
        parts.join("\n")
    }

    fn map_resources(&self, validated: &[&WorkerResult]) -> Vec<MapResource> {
        validated
            .iter()
            .flat_map(|r| {
                r.items.iter().take(self.max_items).filter_map(|item| {
                    item.coordinates.map(|c| MapResource {
                        domain: r.domain,
                        name: item.name.clone(),
                        lat: c.lat,
                        lon: c.lon,
                    })
                })
            })
            .collect()
    }
}

/// Reorder by domain priority, keeping at most one result per domain
pub fn prioritize(results: &[WorkerResult], priority: Priority) -> Vec<&WorkerResult> {
    priority_order(priority)
        .iter()
        .filter_map(|domain| results.iter().find(|r| r.domain == *domain))
        .collect()
}

pub fn aggregate_confidence(validated: &[&WorkerResult]) -> f32 {
    if validated.is_empty() {
        return 0.0;
    }
    let total: f32 = validated.iter().map(|r| r.confidence.value()).sum();
    total / validated.len() as f32
}

fn format_item(domain: ResourceDomain, item: &ResourceItem) -> String {
    let mut line = format!("• {}: {}", item.name, item.description);
    if domain == ResourceDomain::Shelter && item.pet_friendly {
        line.push_str(" (pets welcome)");
    }
    if matches!(domain, ResourceDomain::Shelter | ResourceDomain::Medical) {
        if let Some(contact) = &item.contact {
            line.push_str(&format!(" - Contact: {}", contact));
        }
    }
    if !item.verified {
        line.push_str(" (unverified)");
    }
    line
}
