//! Entity references shared by subscriptions and refresh requests

use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// A domain object (course, session, user, enrollment, ...) identified by
/// its type and id.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct EntityRef {
    #[serde(rename = "type")]
    pub entity_type: String,
    #[serde(rename = "id")]
    pub entity_id: String,
}

impl EntityRef {
    pub fn new(entity_type: impl Into<String>, entity_id: impl Into<String>) -> Self {
        Self {
            entity_type: entity_type.into(),
            entity_id: entity_id.into(),
        }
    }
}

/// Formats as `<type>:<id>`
impl fmt::Display for EntityRef {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}:{}", self.entity_type, self.entity_id)
    }
}

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("Invalid entity reference: {0}. Expected format: <type>:<id>")]
pub struct ParseEntityError(pub String);

/// Parses `<type>:<id>`; the id may itself contain `:`.
impl FromStr for EntityRef {
    type Err = ParseEntityError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.split_once(':') {
            Some((entity_type, entity_id)) if !entity_type.is_empty() && !entity_id.is_empty() => {
                Ok(EntityRef::new(entity_type, entity_id))
            }
            _ => Err(ParseEntityError(s.to_string())),
        }
    }
}
