//! # Domain Workers
//!
//! One `DomainWorker` per resource domain. A worker reads the shared `Plan`,
//! narrows the location constraints for its domain and asks the lookup
//! collaborator for records. Failures stay inside the worker: they come
//! back as an empty result with zero confidence.
//!
//! `WorkerPool` fans a plan out to every requested worker on a `JoinSet`
//! and gathers the results in plan order.
//!
//! ```text
//! Plan ─┬─▶ shelter worker ──▶ WorkerResult
//!       ├─▶ food worker    ──▶ WorkerResult
//!       ├─▶ medical worker ──▶ WorkerResult
//!       └─▶ gov worker     ──▶ WorkerResult
//!                               (joined before evaluation)
//! ```

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::str::FromStr;
use std::sync::Arc;
use std::time::Duration;
use tokio::task::JoinSet;

use super::planner_skill::Plan;
use crate::context::classify_disaster;
use crate::context::keywords::mentions_pets;
use crate::error::ReliefError;
use crate::models::{Confidence, DisasterType, LocationConstraints, ResourceDomain, ResourceItem};
use crate::state::SessionStore;
use crate::tools::ResourceLookup;

/// Why a worker produced no records
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum WorkerFailure {
    /// The plan named a domain with no registered worker
    UnknownWorker { domain: String },
    /// The collaborator failed or the worker task died
    Lookup { reason: String },
}

impl std::fmt::Display for WorkerFailure {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            WorkerFailure::UnknownWorker { domain } => write!(f, "Unknown worker type: {}", domain),
            WorkerFailure::Lookup { reason } => write!(f, "Lookup failed: {}", reason),
        }
    }
}

/// Output of one worker invocation
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct WorkerResult {
    pub domain: ResourceDomain,
    pub items: Vec<ResourceItem>,
    pub confidence: Confidence,
    pub timestamp: DateTime<Utc>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub failure: Option<WorkerFailure>,
}

impl WorkerResult {
    pub fn success(domain: ResourceDomain, items: Vec<ResourceItem>) -> Self {
        Self {
            domain,
            items,
            confidence: domain.base_confidence(),
            timestamp: Utc::now(),
            failure: None,
        }
    }

    pub fn failed(domain: ResourceDomain, failure: WorkerFailure) -> Self {
        Self {
            domain,
            items: Vec::new(),
            confidence: Confidence::ZERO,
            timestamp: Utc::now(),
            failure: Some(failure),
        }
    }

    pub fn is_success(&self) -> bool {
        self.failure.is_none()
    }
}

/// Agent name used in events and A2A messages
pub fn worker_agent_name(domain: ResourceDomain) -> String {
    format!("{}_worker", domain.as_str())
}

/// Worker bound to one resource domain
pub struct DomainWorker {
    domain: ResourceDomain,
    lookup: Arc<dyn ResourceLookup>,
    cache: Option<(Arc<SessionStore>, Duration)>,
}

impl DomainWorker {
    pub fn new(domain: ResourceDomain, lookup: Arc<dyn ResourceLookup>) -> Self {
        Self {
            domain,
            lookup,
            cache: None,
        }
    }

    /// Build from a free-text tag; unknown tags are rejected here, not per call
    pub fn from_tag(tag: &str, lookup: Arc<dyn ResourceLookup>) -> Result<Self, ReliefError> {
        let domain = ResourceDomain::from_str(tag)?;
        Ok(Self::new(domain, lookup))
    }

    /// Cache successful lookups in the session store's TTL cache
    pub fn with_cache(mut self, store: Arc<SessionStore>, ttl: Duration) -> Self {
        self.cache = Some((store, ttl));
        self
    }

    pub fn domain(&self) -> ResourceDomain {
        self.domain
    }

    /// Look up records for this worker's domain
    pub async fn execute(&self, plan: &Plan) -> WorkerResult {
        let constraints = self.constraints_for(plan);
        let disaster = classify_disaster(&plan.user_input);
        let key = self.cache_key(&constraints, disaster);

        if let Some((store, _)) = &self.cache {
            if let Some(items) = store.get_cached::<Vec<ResourceItem>>(&key) {
                tracing::debug!("Cache hit for {}", key);
                return WorkerResult::success(self.domain, items);
            }
        }

        let lookup = match self.domain {
            ResourceDomain::Government => {
                self.lookup.lookup_government(disaster, &constraints).await
            }
            domain => self.lookup.lookup(domain, &constraints).await,
        };

        match lookup {
            Ok(items) => {
                tracing::debug!(
                    domain = %self.domain,
                    count = items.len(),
                    area = %constraints.area,
                    "Lookup completed"
                );
                if let Some((store, ttl)) = &self.cache {
                    if let Err(e) = store.cache_result(&key, &items, *ttl) {
                        tracing::warn!("Failed to cache {}: {}", key, e);
                    }
                }
                WorkerResult::success(self.domain, items)
            }
            Err(e) => {
                tracing::warn!("{} lookup failed: {}", self.domain, e);
                WorkerResult::failed(
                    self.domain,
                    WorkerFailure::Lookup {
                        reason: e.to_string(),
                    },
                )
            }
        }
    }

    /// Everything the collaborator sees goes into the key
    fn cache_key(&self, constraints: &LocationConstraints, disaster: DisasterType) -> String {
        let point = match constraints.coordinates {
            Some(c) => format!("{:.5},{:.5}", c.lat, c.lon),
            None => "none".to_string(),
        };
        format!(
            "lookup:{}:{}:{}:{}:{}:{}",
            self.domain.as_str(),
            constraints.area,
            constraints.needs_pets,
            constraints.urgency,
            point,
            if self.domain == ResourceDomain::Government {
                disaster.as_str()
            } else {
                "any"
            }
        )
    }

    fn constraints_for(&self, plan: &Plan) -> LocationConstraints {
        let mut constraints = plan.location_constraints.clone();
        constraints.urgency = plan.priority;
        if self.domain == ResourceDomain::Shelter {
            constraints.needs_pets = mentions_pets(&plan.user_input);
        }
        constraints
    }
}

/// Table of registered workers, one per domain
#[derive(Default)]
pub struct WorkerPool {
    workers: HashMap<ResourceDomain, Arc<DomainWorker>>,
}

impl WorkerPool {
    pub fn new() -> Self {
        Self::default()
    }

    /// One worker per domain, all sharing the lookup and the result cache
    pub fn for_domains(
        domains: &[ResourceDomain],
        lookup: Arc<dyn ResourceLookup>,
        store: Arc<SessionStore>,
        cache_ttl: Duration,
    ) -> Self {
        let mut pool = Self::new();
        for domain in domains {
            pool.register(
                DomainWorker::new(*domain, lookup.clone()).with_cache(store.clone(), cache_ttl),
            );
        }
        pool
    }

    /// Register a worker, replacing any previous one for its domain
    pub fn register(&mut self, worker: DomainWorker) {
        self.workers.insert(worker.domain(), Arc::new(worker));
    }

    pub fn contains(&self, domain: ResourceDomain) -> bool {
        self.workers.contains_key(&domain)
    }

    pub fn len(&self) -> usize {
        self.workers.len()
    }

    pub fn is_empty(&self) -> bool {
        self.workers.is_empty()
    }

    /// Run every worker the plan names concurrently and wait for all of them.
    ///
    /// Results come back in `plan.resource_types` order, one per domain.
    pub async fn dispatch(&self, plan: &Plan) -> Vec<WorkerResult> {
        let domains = plan.resource_types.clone();
        let shared = Arc::new(plan.clone());
        let mut slots: Vec<Option<WorkerResult>> = vec![None; domains.len()];
        let mut join_set = JoinSet::new();

        // SCATTER
        for (index, domain) in domains.iter().enumerate() {
            let Some(worker) = self.workers.get(domain).cloned() else {
                tracing::warn!("No worker registered for {}", domain);
                slots[index] = Some(WorkerResult::failed(
                    *domain,
                    WorkerFailure::UnknownWorker {
                        domain: domain.as_str().to_string(),
                    },
                ));
                continue;
            };
            let plan = shared.clone();
            join_set.spawn(async move { (index, worker.execute(&plan).await) });
        }

        // GATHER
        while let Some(joined) = join_set.join_next().await {
            match joined {
                Ok((index, result)) => slots[index] = Some(result),
                Err(e) => tracing::warn!("Worker task panicked: {}", e),
            }
        }

        slots
            .into_iter()
            .zip(domains)
            .map(|(slot, domain)| {
                slot.unwrap_or_else(|| {
                    WorkerResult::failed(
                        domain,
                        WorkerFailure::Lookup {
                            reason: "worker task panicked".to_string(),
                        },
                    )
                })
            })
            .collect()
    }
}
