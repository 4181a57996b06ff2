//! Player name validation and generation
//!
//! A session is always created on behalf of a named player. Names typed by
//! the player are cleaned and checked for length and content; a player who
//! leaves the name empty gets a generated guest name.

use heck::ToTitleCase;
use rustrict::CensorStr;
use serde::Serialize;
use thiserror::Error;

use crate::constants::player::{GENERATED_NAME_WORDS, MAX_NAME_LENGTH};

/// Errors that can occur during name validation
#[derive(Error, Serialize, Debug, Clone, Copy, PartialEq, Eq)]
pub enum Error {
    /// The name is empty or contains only whitespace
    #[error("name cannot be empty")]
    Empty,
    /// The name contains inappropriate content
    #[error("name is inappropriate")]
    Sinful,
    /// The name exceeds the maximum allowed length
    #[error("name is too long")]
    TooLong,
}

/// Generates a random, title-cased guest name such as "Brave Otter"
pub fn guest_name() -> String {
    loop {
        if let Some(name) = petname::petname(GENERATED_NAME_WORDS, " ") {
            return name.to_title_case();
        }
    }
}

/// Validates and cleans a player supplied name
///
/// # Errors
///
/// * `Error::TooLong` - Name exceeds 30 bytes
/// * `Error::Empty` - Name is empty after trimming whitespace
/// * `Error::Sinful` - Name contains inappropriate content
pub fn clean_name(name: &str) -> Result<String, Error> {
    if name.len() > MAX_NAME_LENGTH {
        return Err(Error::TooLong);
    }
    let name = rustrict::trim_whitespace(name);
    if name.is_empty() {
        return Err(Error::Empty);
    }
    if name.is_inappropriate() {
        return Err(Error::Sinful);
    }
    Ok(name.to_owned())
}

/// Resolves the name a session is played under
///
/// A missing or blank name falls back to a generated guest name.
///
/// # Errors
///
/// Propagates the validation errors of [`clean_name`] for a non-blank name.
pub fn resolve_player(name: Option<&str>) -> Result<String, Error> {
    match name {
        Some(name) if !name.trim().is_empty() => clean_name(name),
        _ => Ok(guest_name()),
    }
}
