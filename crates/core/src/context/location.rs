//! # Location Extraction
//!
//! Maps free text onto a coarse area tag.
//!
//! ```text
//! 1. direct: a known area name appears verbatim          ("shelter downtown")
//! 2. phrase: in/at/near/around/by <phrase>                ("near the north end")
//!            located/location/from <phrase>               ("located in east harbor")
//!            <word>side                                   ("over on the westside")
//!    the phrase is mapped back to an area by its words
//! 3. default: "central"
//! ```

use once_cell::sync::Lazy;
use regex::Regex;
use serde::{Deserialize, Serialize};

use super::keywords::mentions_pets;
use crate::models::{Coordinates, LocationConstraints, Priority};

/// Area used when nothing in the text points elsewhere
pub const DEFAULT_AREA: &str = "central";

/// Coarse location derived from request text and optional coordinates
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct LocationDescriptor {
    pub area: String,
    /// Raw phrase the area was derived from; `None` when defaulted
    #[serde(default)]
    pub matched_phrase: Option<String>,
    #[serde(default)]
    pub coordinates: Option<Coordinates>,
    #[serde(default)]
    pub needs_pets: bool,
}

impl Default for LocationDescriptor {
    fn default() -> Self {
        Self {
            area: DEFAULT_AREA.to_string(),
            matched_phrase: None,
            coordinates: None,
            needs_pets: false,
        }
    }
}

impl LocationDescriptor {
    /// Constraints handed to workers, stamped with the request urgency
    pub fn constraints(&self, urgency: Priority) -> LocationConstraints {
        LocationConstraints {
            area: self.area.clone(),
            matched_phrase: self.matched_phrase.clone(),
            coordinates: self.coordinates,
            needs_pets: self.needs_pets,
            urgency,
        }
    }
}

/// (area tag, names that identify it verbatim, word stems used for phrases)
const AREAS: &[(&str, &[&str], &[&str])] = &[
    (
        "downtown",
        &["downtown"],
        &["downtown", "city center", "city centre", "town center"],
    ),
    ("northside", &["northside", "north side"], &["north"]),
    ("southside", &["southside", "south side"], &["south"]),
    ("eastside", &["eastside", "east side"], &["east"]),
    ("westside", &["westside", "west side"], &["west"]),
    (
        "central",
        &["central", "midtown"],
        &["central", "center", "centre", "midtown", "middle"],
    ),
];

static PHRASE_PATTERNS: Lazy<Vec<Regex>> = Lazy::new(|| {
    [
        r"(?i)\b(?:in|at|near|around|by)\s+(?:the\s+)?([a-z]+(?:\s+[a-z]+){0,2})",
        r"(?i)\b(?:located|location|from)\s*:?\s+(?:(?:in|at|the)\s+)*([a-z]+(?:\s+[a-z]+){0,2})",
        r"(?i)\b([a-z]+side)\b",
    ]
    .iter()
    .map(|p| Regex::new(p).expect("location pattern is a valid regex"))
    .collect()
});

/// Extract a location descriptor. Pure; never fails.
pub fn extract_location(text: &str, coordinates: Option<Coordinates>) -> LocationDescriptor {
    let lowered = text.to_lowercase();
    let (area, matched_phrase) = match direct_match(&lowered).or_else(|| phrase_match(&lowered)) {
        Some((area, phrase)) => (area.to_string(), Some(phrase)),
        None => (DEFAULT_AREA.to_string(), None),
    };

    LocationDescriptor {
        area,
        matched_phrase,
        coordinates,
        needs_pets: mentions_pets(text),
    }
}

fn direct_match(lowered: &str) -> Option<(&'static str, String)> {
    AREAS.iter().find_map(|(area, names, _)| {
        names
            .iter()
            .find(|name| lowered.contains(*name))
            .map(|name| (*area, name.to_string()))
    })
}

fn phrase_match(lowered: &str) -> Option<(&'static str, String)> {
    for pattern in PHRASE_PATTERNS.iter() {
        for caps in pattern.captures_iter(lowered) {
            let Some(phrase) = caps.get(1) else {
                continue;
            };
            let phrase = phrase.as_str().trim();
            if let Some(area) = area_for_phrase(phrase) {
                return Some((area, phrase.to_string()));
            }
        }
    }
    None
}

/// Map a phrase to an area when one of its words starts with an area stem
fn area_for_phrase(phrase: &str) -> Option<&'static str> {
    AREAS.iter().find_map(|(area, _, stems)| {
        stems
            .iter()
            .any(|stem| phrase_mentions(phrase, stem))
            .then_some(*area)
    })
}

fn phrase_mentions(phrase: &str, stem: &str) -> bool {
    if stem.contains(' ') {
        phrase.contains(stem)
    } else {
        phrase.split_whitespace().any(|word| word.starts_with(stem))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_direct_match() {
        let loc = extract_location("Need shelter DOWNTOWN please", None);
        assert_eq!(loc.area, "downtown");
        assert_eq!(loc.matched_phrase.as_deref(), Some("downtown"));
    }

    #[test]
    fn test_direct_match_two_words() {
        let loc = extract_location("We're on the north side of the river", None);
        assert_eq!(loc.area, "northside");
    }

    #[test]
    fn test_preposition_phrase() {
        let loc = extract_location("I'm stuck near the north end", None);
        assert_eq!(loc.area, "northside");
        assert_eq!(loc.matched_phrase.as_deref(), Some("north end"));
    }

    #[test]
    fn test_located_phrase() {
        let loc = extract_location("located: east harbor, need water", None);
        assert_eq!(loc.area, "eastside");
    }

    #[test]
    fn test_side_word_without_stem() {
        // "bayside" is captured but names no known area
        let loc = extract_location("we are over on the far bayside", None);
        assert_eq!(loc.area, DEFAULT_AREA);
        assert!(loc.matched_phrase.is_none());
    }

    #[test]
    fn test_word_start_only() {
        // "least" must not read as east
        let loc = extract_location("need at least some water", None);
        assert_eq!(loc.area, DEFAULT_AREA);
        assert!(loc.matched_phrase.is_none());
    }

    #[test]
    fn test_default_and_coordinates() {
        let coords = Coordinates::new(29.76, -95.37);
        let loc = extract_location("need help", Some(coords));
        assert_eq!(loc.area, DEFAULT_AREA);
        assert_eq!(loc.coordinates, Some(coords));
    }

    #[test]
    fn test_pet_flag() {
        assert!(extract_location("shelter for me and my dog", None).needs_pets);
        assert!(!extract_location("shelter for me", None).needs_pets);
    }

    #[test]
    fn test_constraints_carry_urgency() {
        let loc = extract_location("downtown", None);
        let constraints = loc.constraints(Priority::High);
        assert_eq!(constraints.area, "downtown");
        assert_eq!(constraints.urgency, Priority::High);
    }
}
