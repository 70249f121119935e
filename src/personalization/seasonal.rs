//! Seasonal context
//!
//! Maps a calendar month to the produce that is in season. Matching is
//! word-based and tolerant of simple plurals, so "cherry tomatoes" is in
//! season whenever "tomatoes" is.

use chrono::{Datelike, Month};
use serde::Serialize;

use crate::clock::Clock;
use crate::errors::{AppError, Result};

const JANUARY: &[&str] = &["citrus", "winter squash", "cabbage", "kale"];
const SPRING: &[&str] = &["asparagus", "artichokes", "spring onions", "peas"];
const MAY: &[&str] = &["strawberries", "asparagus", "spring greens", "radishes"];
const JUNE: &[&str] = &["berries", "tomatoes", "zucchini", "corn"];
const JULY: &[&str] = &["berries", "tomatoes", "zucchini", "corn", "stone fruits"];
const AUGUST: &[&str] = &["tomatoes", "corn", "stone fruits", "melons"];
const AUTUMN: &[&str] = &["apples", "pears", "winter squash", "root vegetables"];
const NOVEMBER: &[&str] = &["winter squash", "root vegetables", "cranberries", "pomegranates"];
const DECEMBER: &[&str] = &["winter squash", "root vegetables", "citrus", "pomegranates"];

/// The month a recommendation request is evaluated in
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SeasonalContext {
    month: Month,
}

/// Serializable view of one month's produce
#[derive(Debug, Clone, Serialize)]
pub struct SeasonalSuggestions {
    pub month: u32,
    pub month_name: &'static str,
    pub ingredients: Vec<&'static str>,
}

impl SeasonalContext {
    /// `month` is 1-based (1 = January)
    pub fn new(month: u32) -> Result<Self> {
        if !(1..=12).contains(&month) {
            return Err(AppError::InvalidInput {
                field: "month".to_string(),
                reason: format!("month must be between 1 and 12, got {month}"),
            });
        }
        let month = Month::try_from(month as u8).map_err(|_| AppError::InvalidInput {
            field: "month".to_string(),
            reason: format!("month must be between 1 and 12, got {month}"),
        })?;
        Ok(Self { month })
    }

    /// Parse a month name such as "march" or "Mar"
    pub fn from_name(name: &str) -> Result<Self> {
        name.trim()
            .parse::<Month>()
            .map(|month| Self { month })
            .map_err(|_| AppError::InvalidInput {
                field: "month".to_string(),
                reason: format!("unknown month '{name}'"),
            })
    }

    pub fn current(clock: &dyn Clock) -> Self {
        Self::from_month(clock.now().month())
    }

    fn from_month(number: u32) -> Self {
        // chrono's `month()` is always 1..=12
        let month = Month::try_from(number as u8).unwrap_or(Month::January);
        Self { month }
    }

    pub fn month(&self) -> Month {
        self.month
    }

    /// Month number used as the seasonal bucket in cache keys
    pub fn bucket(&self) -> u32 {
        self.month.number_from_month()
    }

    pub fn in_season_ingredients(&self) -> &'static [&'static str] {
        match self.month {
            Month::January | Month::February => JANUARY,
            Month::March | Month::April => SPRING,
            Month::May => MAY,
            Month::June => JUNE,
            Month::July => JULY,
            Month::August => AUGUST,
            Month::September | Month::October => AUTUMN,
            Month::November => NOVEMBER,
            Month::December => DECEMBER,
        }
    }

    pub fn is_in_season(&self, ingredient: &str) -> bool {
        let candidate = format!(" {} ", stem_phrase(ingredient));
        if candidate.trim().is_empty() {
            return false;
        }
        self.in_season_ingredients()
            .iter()
            .any(|produce| candidate.contains(&format!(" {} ", stem_phrase(produce))))
    }

    pub fn suggestions(&self) -> SeasonalSuggestions {
        SeasonalSuggestions {
            month: self.bucket(),
            month_name: self.month.name(),
            ingredients: self.in_season_ingredients().to_vec(),
        }
    }
}

/// Lowercase, split on whitespace and reduce each word to a singular stem
fn stem_phrase(phrase: &str) -> String {
    phrase
        .to_lowercase()
        .split_whitespace()
        .map(stem_word)
        .collect::<Vec<_>>()
        .join(" ")
}

fn stem_word(word: &str) -> String {
    if let Some(base) = word.strip_suffix("ies") {
        if !base.is_empty() {
            return format!("{base}y");
        }
    }
    for suffix in ["oes", "shes", "ches", "xes"] {
        if word.ends_with(suffix) {
            return word[..word.len() - 2].to_string();
        }
    }
    if word.len() > 3 && word.ends_with('s') && !word.ends_with("ss") && !word.ends_with("us") {
        return word[..word.len() - 1].to_string();
    }
    word.to_string()
}
