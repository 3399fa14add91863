//! # Static Catalog
//!
//! In-process `ResourceLookup` backed by a fixed table of relief resources.
//! Used by the CLI and as the default provider when no live source is
//! configured.

use async_trait::async_trait;

use super::lookup::ResourceLookup;
use crate::error::LookupError;
use crate::models::{DisasterType, LocationConstraints, ResourceDomain, ResourceItem};

/// Fixed resource tables
#[derive(Debug, Clone)]
pub struct StaticCatalog {
    shelters: Vec<ResourceItem>,
    food: Vec<ResourceItem>,
    medical: Vec<ResourceItem>,
    government: Vec<ResourceItem>,
}

impl Default for StaticCatalog {
    fn default() -> Self {
        Self {
            shelters: vec![
                ResourceItem::new(
                    "Central High School Shelter",
                    "Emergency shelter with capacity for 200 people",
                )
                .with_area("downtown")
                .with_contact("555-0101")
                .with_coordinates(29.7604, -95.3698)
                .verified(),
                ResourceItem::new("Community Center", "Shelter with basic amenities and food")
                    .with_area("northside")
                    .with_contact("555-0102")
                    .with_coordinates(29.8012, -95.3715)
                    .verified(),
                ResourceItem::new("Red Cross Shelter", "Medical staff available, pet-friendly")
                    .with_area("eastside")
                    .with_contact("1-800-733-2767")
                    .with_coordinates(29.7589, -95.3201)
                    .verified()
                    .pet_friendly(),
            ],
            food: vec![
                ResourceItem::new(
                    "Food Distribution Center",
                    "Daily meals and water distribution",
                )
                .with_area("central")
                .with_coordinates(29.7499, -95.3584)
                .verified(),
                ResourceItem::new("Mobile Kitchen Unit", "Hot meals available 24/7")
                    .with_area("downtown")
                    .with_coordinates(29.7633, -95.3632),
                ResourceItem::new("Community Church", "Food pantry and bottled water")
                    .with_area("westside")
                    .with_contact("555-0133")
                    .with_coordinates(29.7402, -95.4601)
                    .verified(),
            ],
            medical: vec![
                ResourceItem::new("Field Hospital", "Emergency medical care and supplies")
                    .with_area("central")
                    .with_contact("911")
                    .with_coordinates(29.7521, -95.3610)
                    .verified(),
                ResourceItem::new("Mobile Medical Unit", "Basic first aid and medication")
                    .with_area("downtown")
                    .with_coordinates(29.7611, -95.3655),
                ResourceItem::new("Urgent Care Center", "Extended hours for emergency cases")
                    .with_area("northside")
                    .with_contact("555-0144")
                    .with_coordinates(29.8050, -95.3802)
                    .verified(),
            ],
            government: vec![
                ResourceItem::new(
                    "FEMA Assistance",
                    "Apply online at disasterassistance.gov or call 1-800-621-FEMA",
                )
                .with_contact("1-800-621-3362")
                .verified(),
                ResourceItem::new(
                    "Disaster Relief",
                    "Emergency funding and support programs available",
                )
                .verified(),
                ResourceItem::new(
                    "Emergency Housing",
                    "Temporary housing assistance programs",
                )
                .verified(),
            ],
        }
    }
}

impl StaticCatalog {
    pub fn new() -> Self {
        Self::default()
    }

    fn table(&self, domain: ResourceDomain) -> &[ResourceItem] {
        match domain {
            ResourceDomain::Shelter => &self.shelters,
            ResourceDomain::Food => &self.food,
            ResourceDomain::Medical => &self.medical,
            ResourceDomain::Government => &self.government,
        }
    }

    /// Items in the requested area first; pet-friendly shelters first when needed
    fn rank(
        &self,
        domain: ResourceDomain,
        constraints: &LocationConstraints,
    ) -> Vec<ResourceItem> {
        let mut items = self.table(domain).to_vec();
        let pets_first = domain == ResourceDomain::Shelter && constraints.needs_pets;
        items.sort_by_key(|item| {
            let pet_rank = if pets_first && !item.pet_friendly { 1 } else { 0 };
            let area_rank = if item.area.as_deref() == Some(constraints.area.as_str()) {
                0
            } else {
                1
            };
            (pet_rank, area_rank)
        });
        items
    }
}

/// Leading guidance entry for a specific disaster
fn disaster_guidance(disaster: DisasterType) -> Option<ResourceItem> {
    let (name, description) = match disaster {
        DisasterType::Hurricane => (
            "Hurricane Recovery",
            "Avoid floodwater, document property damage with photos, and register with FEMA within 60 days",
        ),
        DisasterType::Earthquake => (
            "Earthquake Recovery",
            "Expect aftershocks; have structures inspected before re-entry and report gas leaks to the utility",
        ),
        DisasterType::Wildfire => (
            "Wildfire Recovery",
            "Return only when officials declare the area safe; N95 masks are distributed at relief centers",
        ),
        DisasterType::Tornado => (
            "Tornado Recovery",
            "Stay clear of downed power lines and report structural damage to the county emergency office",
        ),
        DisasterType::General => return None,
    };
    Some(ResourceItem::new(name, description).verified())
}

#[async_trait]
impl ResourceLookup for StaticCatalog {
    async fn lookup(
        &self,
        domain: ResourceDomain,
        constraints: &LocationConstraints,
    ) -> Result<Vec<ResourceItem>, LookupError> {
        Ok(self.rank(domain, constraints))
    }

    async fn lookup_government(
        &self,
        disaster: DisasterType,
        constraints: &LocationConstraints,
    ) -> Result<Vec<ResourceItem>, LookupError> {
        let mut items: Vec<ResourceItem> = disaster_guidance(disaster).into_iter().collect();
        items.extend(self.rank(ResourceDomain::Government, constraints));
        Ok(items)
    }
}
