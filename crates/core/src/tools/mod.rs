//! # Lookup Tools
//!
//! Deterministic collaborators the domain workers call out to.
//!
//! ## Modules
//!
//! - `lookup` - The `ResourceLookup` trait every provider implements
//! - `catalog` - Static in-process catalog used as the default provider

pub mod catalog;
pub mod lookup;

pub use catalog::StaticCatalog;
pub use lookup::ResourceLookup;
