//! Usecase (tenant scope) identifiers.

use once_cell::sync::Lazy;
use regex::Regex;

use crate::error::{Error, Result};

static USECASE_ID: Lazy<Regex> = Lazy::new(|| Regex::new(r"^[A-Za-z0-9_]+$").unwrap());

/// Check that `id` is a well-formed usecase id: letters, digits and
/// underscores only.
pub fn validate_usecase_id(id: &str) -> Result<()> {
    if id.trim().is_empty() {
        return Err(Error::InvalidInput("usecase id must not be empty".into()));
    }
    if !USECASE_ID.is_match(id) {
        return Err(Error::InvalidInput(format!(
            "invalid usecase id '{}': use only letters, numbers, and underscores",
            id
        )));
    }
    Ok(())
}
