//! Entity trait - common interface for addressable plan records

use chrono::{DateTime, Utc};
use serde::{de::DeserializeOwned, Serialize};

use crate::core::error::{HaccpError, Result};
use crate::core::identity::{EntityId, EntityPrefix};

/// Common trait for records that can be looked up by id or title
pub trait Entity: Serialize + DeserializeOwned {
    /// The record type prefix (e.g., "HAZ", "CCP")
    const PREFIX: EntityPrefix;

    /// Get the record's unique ID
    fn id(&self) -> &EntityId;

    /// Get a short human label for the record
    fn title(&self) -> String;

    /// Get the creation timestamp
    fn created(&self) -> DateTime<Utc>;
}

/// Resolve a user query to exactly one record.
///
/// The query matches a full id, an id prefix (e.g. `HAZ-01J8`), or a
/// case-insensitive fragment of the title. Ambiguous queries are rejected
/// rather than guessed.
pub fn resolve<'a, T: Entity>(items: &'a [T], query: &str) -> Result<&'a T> {
    let needle = query.trim();
    if let Some(exact) = items.iter().find(|item| item.id().to_string() == needle) {
        return Ok(exact);
    }

    let upper = needle.to_uppercase();
    let lower = needle.to_lowercase();
    let matches: Vec<&T> = items
        .iter()
        .filter(|item| {
            item.id().to_string().starts_with(&upper)
                || item.title().to_lowercase().contains(&lower)
        })
        .collect();

    match matches.len() {
        0 => Err(HaccpError::not_found_query(T::PREFIX, needle)),
        1 => Ok(matches[0]),
        n => Err(HaccpError::Validation(format!(
            "'{}' matches {} {} records; be more specific",
            needle,
            n,
            T::PREFIX.kind()
        ))),
    }
}
