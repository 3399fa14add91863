//! # Keyword Tables
//!
//! Fixed vocabularies behind urgency, disaster and need classification.
//! Every table is compiled once into a case-insensitive regex anchored at a
//! word start, so "urgently" counts as urgent but "said" never counts as aid.

use once_cell::sync::Lazy;
use regex::Regex;

use crate::models::{DisasterType, NeedCategory, Priority};

/// A tagged set of keywords compiled into one matcher
pub struct KeywordGroup<T> {
    pub tag: T,
    matcher: Regex,
}

impl<T: Copy> KeywordGroup<T> {
    /// Keywords match at a word start ("flood" matches "flooded")
    fn prefixes(tag: T, words: &[&str]) -> Self {
        Self {
            tag,
            matcher: compile(words, false),
        }
    }

    /// Keywords must match whole words ("cat" does not match "catastrophe")
    fn whole_words(tag: T, words: &[&str]) -> Self {
        Self {
            tag,
            matcher: compile(words, true),
        }
    }

    pub fn matches(&self, text: &str) -> bool {
        self.matcher.is_match(text)
    }
}

fn compile(words: &[&str], whole: bool) -> Regex {
    let alternatives = words
        .iter()
        .map(|w| regex::escape(w))
        .collect::<Vec<_>>()
        .join("|");
    let pattern = if whole {
        format!(r"(?i)\b(?:{})\b", alternatives)
    } else {
        format!(r"(?i)\b(?:{})", alternatives)
    };
    Regex::new(&pattern).expect("escaped keyword alternation is a valid regex")
}

static URGENCY: Lazy<[KeywordGroup<Priority>; 2]> = Lazy::new(|| {
    [
        KeywordGroup::prefixes(
            Priority::High,
            &["emergency", "urgent", "right now", "immediately", "critical"],
        ),
        KeywordGroup::whole_words(Priority::High, &["now"]),
    ]
});

/// Order matters: the first matching group wins.
static DISASTERS: Lazy<Vec<KeywordGroup<DisasterType>>> = Lazy::new(|| {
    vec![
        KeywordGroup::prefixes(DisasterType::Hurricane, &["hurricane", "storm", "flood"]),
        KeywordGroup::prefixes(DisasterType::Earthquake, &["earthquake", "tremor", "shake"]),
        KeywordGroup::prefixes(DisasterType::Wildfire, &["fire", "wildfire", "smoke"]),
        KeywordGroup::prefixes(DisasterType::Tornado, &["tornado", "twister"]),
    ]
});

static NEEDS: Lazy<Vec<KeywordGroup<NeedCategory>>> = Lazy::new(|| {
    vec![
        KeywordGroup::prefixes(
            NeedCategory::Shelter,
            &["shelter", "place to stay", "housing", "home"],
        ),
        KeywordGroup::prefixes(
            NeedCategory::Food,
            &["food", "hungry", "eat", "water", "thirsty"],
        ),
        KeywordGroup::prefixes(
            NeedCategory::Medical,
            &["medical", "doctor", "hospital", "medicine", "hurt", "injured", "injury"],
        ),
        KeywordGroup::whole_words(
            NeedCategory::Assistance,
            &["aid", "assistance", "fema", "government"],
        ),
    ]
});

static PETS: Lazy<KeywordGroup<bool>> = Lazy::new(|| {
    KeywordGroup::whole_words(
        true,
        &[
            "pet", "pets", "dog", "dogs", "cat", "cats", "animal", "animals", "puppy", "kitten",
        ],
    )
});

/// Needs assumed when the text names none
pub const DEFAULT_NEEDS: [NeedCategory; 3] =
    [NeedCategory::Shelter, NeedCategory::Food, NeedCategory::Medical];

/// The single urgency classifier used by every stage
pub fn classify_urgency(text: &str) -> Priority {
    if URGENCY.iter().any(|group| group.matches(text)) {
        Priority::High
    } else {
        Priority::Medium
    }
}

/// First matching disaster group, else `General`
pub fn classify_disaster(text: &str) -> DisasterType {
    DISASTERS
        .iter()
        .find(|group| group.matches(text))
        .map(|group| group.tag)
        .unwrap_or_default()
}

/// Every need group mentioned in `text`, in table order (possibly empty)
pub fn match_needs(text: &str) -> Vec<NeedCategory> {
    NEEDS
        .iter()
        .filter(|group| group.matches(text))
        .map(|group| group.tag)
        .collect()
}

pub fn mentions_pets(text: &str) -> bool {
    PETS.matches(text)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_urgency_terms() {
        for text in [
            "EMERGENCY at my house",
            "medical assistance needed urgently",
            "we need water right now",
            "come immediately",
            "critical injuries",
            "shelter needed now!",
        ] {
            assert_eq!(classify_urgency(text), Priority::High, "{}", text);
        }
    }

    #[test]
    fn test_non_urgent_text() {
        assert_eq!(classify_urgency("Where can I find medical help?"), Priority::Medium);
        assert_eq!(classify_urgency("I know where the shelter is"), Priority::Medium);
    }

    #[test]
    fn test_disaster_first_match_wins() {
        // "flood" (hurricane group) precedes "fire" (wildfire group)
        assert_eq!(classify_disaster("fire after the flood"), DisasterType::Hurricane);
        assert_eq!(classify_disaster("the ground keeps shaking, tremors"), DisasterType::Earthquake);
        assert_eq!(classify_disaster("smoke everywhere"), DisasterType::Wildfire);
        assert_eq!(classify_disaster("a twister hit"), DisasterType::Tornado);
        assert_eq!(classify_disaster("power is out"), DisasterType::General);
    }

    #[test]
    fn test_needs_all_groups_independent() {
        let needs = match_needs("I'm hungry, hurt and need housing and FEMA aid");
        assert_eq!(
            needs,
            vec![
                NeedCategory::Shelter,
                NeedCategory::Food,
                NeedCategory::Medical,
                NeedCategory::Assistance
            ]
        );
    }

    #[test]
    fn test_needs_word_start_only() {
        assert!(match_needs("she said she was afraid").is_empty());
        assert!(match_needs("Where can I find medical help?")
            .iter()
            .all(|n| *n == NeedCategory::Medical));
    }

    #[test]
    fn test_pet_detection() {
        assert!(mentions_pets("I have two dogs"));
        assert!(mentions_pets("my cat is with me"));
        assert!(!mentions_pets("a catastrophic storm"));
    }
}
