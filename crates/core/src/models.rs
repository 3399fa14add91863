//! # Relief Models
//!
//! Closed vocabularies shared by every pipeline stage.
//! Free-text tags from callers are parsed into these enums once, at the
//! boundary, so the stages never dispatch on strings.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

use crate::error::ReliefError;

/// Resource domain served by a dedicated worker
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash)]
#[serde(rename_all = "lowercase")]
pub enum ResourceDomain {
    Shelter,
    Food,
    Medical,
    Government,
}

impl ResourceDomain {
    /// Get all domains, in canonical order
    pub fn all() -> Vec<ResourceDomain> {
        vec![
            ResourceDomain::Shelter,
            ResourceDomain::Food,
            ResourceDomain::Medical,
            ResourceDomain::Government,
        ]
    }

    /// Lowercase tag used in cache keys and wire payloads
    pub fn as_str(&self) -> &'static str {
        match self {
            ResourceDomain::Shelter => "shelter",
            ResourceDomain::Food => "food",
            ResourceDomain::Medical => "medical",
            ResourceDomain::Government => "government",
        }
    }

    /// Section title used in composed responses
    pub fn display_name(&self) -> &'static str {
        match self {
            ResourceDomain::Shelter => "Shelter",
            ResourceDomain::Food => "Food",
            ResourceDomain::Medical => "Medical",
            ResourceDomain::Government => "Government",
        }
    }

    /// Fixed source-reliability score for this domain's data provider
    pub fn base_confidence(&self) -> Confidence {
        match self {
            ResourceDomain::Shelter => Confidence::new(0.85),
            ResourceDomain::Food => Confidence::new(0.80),
            ResourceDomain::Medical => Confidence::new(0.90),
            ResourceDomain::Government => Confidence::new(0.95),
        }
    }
}

impl fmt::Display for ResourceDomain {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for ResourceDomain {
    type Err = ReliefError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "shelter" => Ok(ResourceDomain::Shelter),
            "food" => Ok(ResourceDomain::Food),
            "medical" => Ok(ResourceDomain::Medical),
            "government" => Ok(ResourceDomain::Government),
            other => Err(ReliefError::UnknownDomain(other.to_string())),
        }
    }
}

/// Request priority (also the urgency level of a context)
#[derive(Debug, Clone, Copy, Serialize, Deserialize, Default, PartialEq, Eq, Hash)]
#[serde(rename_all = "lowercase")]
pub enum Priority {
    High,
    #[default]
    Medium,
}

impl Priority {
    pub fn is_high(&self) -> bool {
        matches!(self, Priority::High)
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Priority::High => "high",
            Priority::Medium => "medium",
        }
    }
}

impl fmt::Display for Priority {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Disaster classification inferred from request text
#[derive(Debug, Clone, Copy, Serialize, Deserialize, Default, PartialEq, Eq, Hash)]
#[serde(rename_all = "lowercase")]
pub enum DisasterType {
    Hurricane,
    Earthquake,
    Wildfire,
    Tornado,
    #[default]
    General,
}

impl DisasterType {
    pub fn as_str(&self) -> &'static str {
        match self {
            DisasterType::Hurricane => "hurricane",
            DisasterType::Earthquake => "earthquake",
            DisasterType::Wildfire => "wildfire",
            DisasterType::Tornado => "tornado",
            DisasterType::General => "general",
        }
    }
}

impl fmt::Display for DisasterType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Free-text need category extracted by the context analyzer
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash)]
#[serde(rename_all = "lowercase")]
pub enum NeedCategory {
    Shelter,
    Food,
    Medical,
    Assistance,
}

impl NeedCategory {
    pub fn as_str(&self) -> &'static str {
        match self {
            NeedCategory::Shelter => "shelter",
            NeedCategory::Food => "food",
            NeedCategory::Medical => "medical",
            NeedCategory::Assistance => "assistance",
        }
    }

    /// Collapse onto the worker domain enumeration
    pub fn domain(&self) -> ResourceDomain {
        match self {
            NeedCategory::Shelter => ResourceDomain::Shelter,
            NeedCategory::Food => ResourceDomain::Food,
            NeedCategory::Medical => ResourceDomain::Medical,
            NeedCategory::Assistance => ResourceDomain::Government,
        }
    }
}

/// WGS84 point supplied by the caller or attached to a resource
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq)]
pub struct Coordinates {
    pub lat: f64,
    pub lon: f64,
}

impl Coordinates {
    pub fn new(lat: f64, lon: f64) -> Self {
        Self { lat, lon }
    }
}

/// Confidence score, always within [0, 1]
#[derive(Debug, Clone, Copy, Serialize, Deserialize, Default, PartialEq, PartialOrd)]
#[serde(from = "f32", into = "f32")]
pub struct Confidence(f32);

impl Confidence {
    pub const ZERO: Confidence = Confidence(0.0);

    /// Clamp into range; NaN collapses to zero
    pub fn new(value: f32) -> Self {
        if value.is_nan() {
            return Self::ZERO;
        }
        Self(value.clamp(0.0, 1.0))
    }

    pub fn value(&self) -> f32 {
        self.0
    }
}

impl From<f32> for Confidence {
    fn from(value: f32) -> Self {
        Confidence::new(value)
    }
}

impl From<Confidence> for f32 {
    fn from(value: Confidence) -> Self {
        value.0
    }
}

/// A record returned by a resource lookup collaborator
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct ResourceItem {
    pub name: String,
    pub description: String,
    /// Area tag the resource serves, if known
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub area: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub contact: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub coordinates: Option<Coordinates>,
    #[serde(default)]
    pub verified: bool,
    #[serde(default)]
    pub pet_friendly: bool,
}

impl ResourceItem {
    pub fn new(name: impl Into<String>, description: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            description: description.into(),
            area: None,
            contact: None,
            coordinates: None,
            verified: false,
            pet_friendly: false,
        }
    }

    pub fn with_area(mut self, area: impl Into<String>) -> Self {
        self.area = Some(area.into());
        self
    }

    pub fn with_contact(mut self, contact: impl Into<String>) -> Self {
        self.contact = Some(contact.into());
        self
    }

    pub fn with_coordinates(mut self, lat: f64, lon: f64) -> Self {
        self.coordinates = Some(Coordinates::new(lat, lon));
        self
    }

    pub fn verified(mut self) -> Self {
        self.verified = true;
        self
    }

    pub fn pet_friendly(mut self) -> Self {
        self.pet_friendly = true;
        self
    }
}

/// Location constraints handed to workers and collaborators
#[derive(Debug, Clone, Serialize, Deserialize, Default, PartialEq)]
pub struct LocationConstraints {
    /// Known area tag
    pub area: String,
    /// Phrase the area was derived from, if any
    #[serde(default)]
    pub matched_phrase: Option<String>,
    #[serde(default)]
    pub coordinates: Option<Coordinates>,
    #[serde(default)]
    pub needs_pets: bool,
    #[serde(default)]
    pub urgency: Priority,
}
