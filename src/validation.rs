//! Input validation at the request boundary
//! Rejects malformed identifiers and out-of-range paging before anything reaches the core

use anyhow::{anyhow, Result};

use crate::constants::MAX_RECOMMENDATION_LIMIT;

/// Maximum lengths for identifiers
pub const MAX_USER_ID_LENGTH: usize = 128;
pub const MAX_RECIPE_ID_LENGTH: usize = 128;
pub const MAX_TAG_LENGTH: usize = 64;

/// Validate user_id
pub fn validate_user_id(user_id: &str) -> Result<()> {
    if user_id.is_empty() {
        return Err(anyhow!("user_id cannot be empty"));
    }

    if user_id.len() > MAX_USER_ID_LENGTH {
        return Err(anyhow!(
            "user_id too long: {} chars (max: {})",
            user_id.len(),
            MAX_USER_ID_LENGTH
        ));
    }

    // Only allow alphanumeric, dash, underscore, @ and dot. ':' is excluded
    // because user ids scope cache keys.
    if !user_id
        .chars()
        .all(|c| c.is_alphanumeric() || c == '-' || c == '_' || c == '@' || c == '.')
    {
        return Err(anyhow!(
            "user_id contains invalid characters (allowed: alphanumeric, -, _, @, .)"
        ));
    }

    Ok(())
}

/// Validate recipe_id
pub fn validate_recipe_id(recipe_id: &str) -> Result<()> {
    let trimmed = recipe_id.trim();
    if trimmed.is_empty() {
        return Err(anyhow!("recipe_id cannot be empty"));
    }

    if trimmed.len() > MAX_RECIPE_ID_LENGTH {
        return Err(anyhow!(
            "recipe_id too long: {} chars (max: {})",
            trimmed.len(),
            MAX_RECIPE_ID_LENGTH
        ));
    }

    if trimmed.chars().any(|c| c.is_control()) {
        return Err(anyhow!("recipe_id contains control characters"));
    }

    Ok(())
}

/// Validate a requested page size. Returns it as `usize` on success.
pub fn validate_limit(limit: i64) -> Result<usize> {
    if limit <= 0 {
        return Err(anyhow!("limit must be positive, got {limit}"));
    }

    if limit > MAX_RECOMMENDATION_LIMIT as i64 {
        return Err(anyhow!(
            "limit too large: {} (max: {})",
            limit,
            MAX_RECOMMENDATION_LIMIT
        ));
    }

    Ok(limit as usize)
}

/// Validate a calendar month number (1 = January)
pub fn validate_month(month: u32) -> Result<u32> {
    if !(1..=12).contains(&month) {
        return Err(anyhow!("month must be between 1 and 12, got {month}"));
    }
    Ok(month)
}

/// Validate a dietary or descriptive tag
pub fn validate_tag(tag: &str) -> Result<()> {
    let trimmed = tag.trim();
    if trimmed.is_empty() {
        return Err(anyhow!("tag cannot be empty"));
    }

    if trimmed.len() > MAX_TAG_LENGTH {
        return Err(anyhow!(
            "tag too long: {} chars (max: {})",
            trimmed.len(),
            MAX_TAG_LENGTH
        ));
    }

    Ok(())
}
