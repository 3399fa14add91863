//! # Resource Lookup
//!
//! The collaborator seam between domain workers and whatever actually knows
//! where shelters, food points and clinics are (POI search, agency feeds,
//! a static catalog). Workers only ever see this trait.

use async_trait::async_trait;

use crate::error::LookupError;
use crate::models::{DisasterType, LocationConstraints, ResourceDomain, ResourceItem};

/// Domain-scoped resource search
#[async_trait]
pub trait ResourceLookup: Send + Sync {
    /// Records for `domain` near the given constraints
    async fn lookup(
        &self,
        domain: ResourceDomain,
        constraints: &LocationConstraints,
    ) -> Result<Vec<ResourceItem>, LookupError>;

    /// Government aid instructions specific to a disaster type
    async fn lookup_government(
        &self,
        disaster: DisasterType,
        constraints: &LocationConstraints,
    ) -> Result<Vec<ResourceItem>, LookupError> {
        tracing::debug!("No disaster-specific lookup for {}, using generic", disaster);
        self.lookup(ResourceDomain::Government, constraints).await
    }
}
