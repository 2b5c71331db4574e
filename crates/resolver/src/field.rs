use cascade_protocol::OptionId;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

use crate::error::CascadeError;

/// Identifier slots known to the engine.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum FieldName {
    Distrito,
    Seccion,
    Circuito,
    Mesa,
}

impl FieldName {
    /// Canonical dependency order
    pub const ALL: [FieldName; 4] = [
        FieldName::Distrito,
        FieldName::Seccion,
        FieldName::Circuito,
        FieldName::Mesa,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            FieldName::Distrito => "distrito",
            FieldName::Seccion => "seccion",
            FieldName::Circuito => "circuito",
            FieldName::Mesa => "mesa",
        }
    }
}

impl fmt::Display for FieldName {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for FieldName {
    type Err = CascadeError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "distrito" => Ok(FieldName::Distrito),
            "seccion" => Ok(FieldName::Seccion),
            "circuito" => Ok(FieldName::Circuito),
            "mesa" => Ok(FieldName::Mesa),
            other => Err(CascadeError::UnknownField(other.to_string())),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FieldStatus {
    /// Nothing searched yet
    Empty,
    /// A lookup for the current input is in flight
    Pending,
    Resolved,
    Ambiguous,
    /// Searched, zero matches
    NotFound,
    /// Input rejected before any lookup
    Invalid,
    /// The lookup collaborator could not be reached
    NetworkError,
}

impl FieldStatus {
    /// Whether the presentation layer should show an error indicator.
    pub fn is_error(&self) -> bool {
        matches!(
            self,
            FieldStatus::Ambiguous
                | FieldStatus::NotFound
                | FieldStatus::Invalid
                | FieldStatus::NetworkError
        )
    }
}

/// Current state of one field in the cascade.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FieldState {
    pub name: FieldName,
    pub raw_input: String,
    /// `None` until the field resolves to exactly one match
    pub resolved_id: Option<OptionId>,
    pub display_text: String,
    pub status: FieldStatus,
}

impl FieldState {
    pub fn empty(name: FieldName) -> Self {
        Self {
            name,
            raw_input: String::new(),
            resolved_id: None,
            display_text: String::new(),
            status: FieldStatus::Empty,
        }
    }

    pub fn resolved(
        name: FieldName,
        id: OptionId,
        display_text: impl Into<String>,
        raw_input: impl Into<String>,
    ) -> Self {
        Self {
            name,
            raw_input: raw_input.into(),
            resolved_id: Some(id),
            display_text: display_text.into(),
            status: FieldStatus::Resolved,
        }
    }

    /// Unresolved state carrying the user's text.
    pub fn unresolved(name: FieldName, raw_input: impl Into<String>, status: FieldStatus) -> Self {
        Self {
            name,
            raw_input: raw_input.into(),
            resolved_id: None,
            display_text: String::new(),
            status,
        }
    }

    /// Lookup in flight for `raw_input`. The previous resolution is kept so
    /// descendants keep seeing it until a result arrives.
    pub fn pending(&self, raw_input: impl Into<String>) -> Self {
        Self {
            name: self.name,
            raw_input: raw_input.into(),
            resolved_id: self.resolved_id.clone(),
            display_text: self.display_text.clone(),
            status: FieldStatus::Pending,
        }
    }

    pub fn is_resolved(&self) -> bool {
        self.status == FieldStatus::Resolved
    }

    pub fn is_empty(&self) -> bool {
        self.status == FieldStatus::Empty
    }

    pub fn holds_invariants(&self) -> bool {
        match self.status {
            FieldStatus::Resolved => self
                .resolved_id
                .as_ref()
                .is_some_and(|id| !id.is_blank() && !self.display_text.is_empty()),
            FieldStatus::Empty => self.resolved_id.is_none() && self.raw_input.is_empty(),
            FieldStatus::Pending => true,
            _ => self.resolved_id.is_none(),
        }
    }
}
