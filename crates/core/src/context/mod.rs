//! # Context Engineering
//!
//! Keyword and pattern based reading of request text. No language model is
//! involved: every classifier is a fixed table compiled into a regex.

pub mod analyzer;
pub mod keywords;
pub mod location;

pub use analyzer::{Context, ContextAnalyzer};
pub use keywords::{classify_disaster, classify_urgency};
pub use location::{extract_location, LocationDescriptor, DEFAULT_AREA};
