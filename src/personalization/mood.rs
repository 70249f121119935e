//! Mood filters
//!
//! A mood is a soft boost: candidates whose tags intersect the mood's tag set
//! receive the mood factor, everything else still scores without it.

use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;
use std::fmt;
use std::str::FromStr;

use crate::errors::AppError;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Mood {
    Comfort,
    Healthy,
    Adventurous,
    Quick,
    Indulgent,
    Light,
}

impl Mood {
    pub const ALL: [Mood; 6] = [
        Mood::Comfort,
        Mood::Healthy,
        Mood::Adventurous,
        Mood::Quick,
        Mood::Indulgent,
        Mood::Light,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            Mood::Comfort => "comfort",
            Mood::Healthy => "healthy",
            Mood::Adventurous => "adventurous",
            Mood::Quick => "quick",
            Mood::Indulgent => "indulgent",
            Mood::Light => "light",
        }
    }

    /// Recipe tags that satisfy this mood
    pub fn tags(&self) -> &'static [&'static str] {
        match self {
            Mood::Comfort => &["comfort", "comfort-food", "hearty", "warm", "soup", "stew", "baked"],
            Mood::Healthy => &["healthy", "low-fat", "low-carb", "vegan", "vegetarian", "high-protein"],
            Mood::Adventurous => &["adventurous", "exotic", "fusion", "spicy", "street-food"],
            Mood::Quick => &["quick", "easy", "30-minutes", "one-pot", "no-cook", "weeknight"],
            Mood::Indulgent => &["indulgent", "dessert", "rich", "cheesy", "fried", "decadent"],
            Mood::Light => &["light", "salad", "fresh", "low-calorie", "raw", "broth"],
        }
    }

    /// Whether any of `tags` belongs to this mood's tag set
    pub fn matches(&self, tags: &BTreeSet<String>) -> bool {
        self.tags().iter().any(|t| tags.contains(*t))
    }
}

impl fmt::Display for Mood {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Mood {
    type Err = AppError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let needle = s.trim().to_lowercase();
        Mood::ALL
            .iter()
            .copied()
            .find(|m| m.as_str() == needle)
            .ok_or_else(|| AppError::InvalidMood(s.to_string()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_known_moods() {
        for mood in Mood::ALL {
            assert_eq!(mood.as_str().parse::<Mood>().unwrap(), mood);
        }
        assert_eq!(" Comfort ".parse::<Mood>().unwrap(), Mood::Comfort);
    }

    #[test]
    fn test_unknown_mood_rejected() {
        let err = "grumpy".parse::<Mood>().unwrap_err();
        assert_eq!(err.code(), "INVALID_MOOD");
    }

    #[test]
    fn test_matches_on_tag_intersection() {
        let tags: BTreeSet<String> = ["soup".to_string(), "italian".to_string()].into();
        assert!(Mood::Comfort.matches(&tags));
        assert!(!Mood::Light.matches(&tags));
    }
}
