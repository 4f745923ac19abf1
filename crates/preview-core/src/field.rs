//! Configuration field identifiers.
//!
//! Field ids use the bracketed form `base[segment][segment]...`, e.g.
//! `rest_resource[pages][4][title]`. The base selects the binding kind;
//! the segments address a value inside the bound resource.

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

/// Base name of fields bound to REST resources.
pub const REST_RESOURCE_BASE: &str = "rest_resource";

/// Error parsing a field identifier.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum FieldIdError {
    #[error("field id is empty")]
    Empty,

    #[error("field id '{0}' has an empty base name")]
    EmptyBase(String),

    #[error("field id '{0}' has an empty segment")]
    EmptySegment(String),

    #[error("field id '{0}' has unbalanced brackets")]
    Unbalanced(String),
}

/// A parsed configuration field identifier.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct FieldId {
    base: String,
    segments: Vec<String>,
}

impl FieldId {
    /// Parse a field identifier.
    pub fn parse(raw: &str) -> Result<Self, FieldIdError> {
        if raw.is_empty() {
            return Err(FieldIdError::Empty);
        }

        let (base, mut rest) = match raw.find('[') {
            Some(idx) => (&raw[..idx], &raw[idx..]),
            None => (raw, ""),
        };
        if base.is_empty() {
            return Err(FieldIdError::EmptyBase(raw.to_string()));
        }
        if base.contains(']') {
            return Err(FieldIdError::Unbalanced(raw.to_string()));
        }

        let mut segments = Vec::new();
        while !rest.is_empty() {
            let inner = rest
                .strip_prefix('[')
                .ok_or_else(|| FieldIdError::Unbalanced(raw.to_string()))?;
            let close = inner
                .find(']')
                .ok_or_else(|| FieldIdError::Unbalanced(raw.to_string()))?;
            let segment = &inner[..close];
            if segment.contains('[') {
                return Err(FieldIdError::Unbalanced(raw.to_string()));
            }
            if segment.is_empty() {
                return Err(FieldIdError::EmptySegment(raw.to_string()));
            }
            segments.push(segment.to_string());
            rest = &inner[close + 1..];
        }

        Ok(Self {
            base: base.to_string(),
            segments,
        })
    }

    /// Base name (the part before the first bracket).
    pub fn base(&self) -> &str {
        &self.base
    }

    /// Bracketed segments in order.
    pub fn segments(&self) -> &[String] {
        &self.segments
    }

    /// Check if this field is bound to a REST resource. A bare
    /// `rest_resource` without segments is not.
    pub fn is_rest_resource(&self) -> bool {
        self.base == REST_RESOURCE_BASE && !self.segments.is_empty()
    }
}

impl fmt::Display for FieldId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.base)?;
        for segment in &self.segments {
            write!(f, "[{}]", segment)?;
        }
        Ok(())
    }
}

impl FromStr for FieldId {
    type Err = FieldIdError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::parse(s)
    }
}

impl TryFrom<String> for FieldId {
    type Error = FieldIdError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        Self::parse(&value)
    }
}

impl From<FieldId> for String {
    fn from(id: FieldId) -> Self {
        id.to_string()
    }
}
