//! Wire contract between the cascade engine and the lookup collaborator.
//!
//! ```text
//! GET <base>?q=<query>&forward=<json-map>   user typed text
//! GET <base>?forward=<json-map>             identifier-only re-query
//! GET <base>?ident=<id>                     re-hydrate a stored id
//!   -> { "results": [ { "id", "text", "selected_text" } ] }
//!
//! GET <options-url>?parent_id=<id>          autocomplete option list
//!   -> { "options": [ { "value", "text" } ] }
//! ```

use anyhow::Result;
use schemars::JsonSchema;
use serde::{Deserialize, Serialize};
use std::fmt;

pub mod forward;

pub use forward::{reverse_flag_key, ForwardContext};

/// Canonical identifier of a lookup match.
///
/// Endpoints send ids as JSON numbers or strings; both are kept as an opaque string.
#[derive(Debug, Serialize, Deserialize, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, JsonSchema)]
#[serde(from = "RawOptionId", into = "String")]
pub struct OptionId(String);

#[derive(Debug, Serialize, Deserialize, Clone, JsonSchema)]
#[serde(untagged)]
enum RawOptionId {
    Text(String),
    Signed(i64),
    Unsigned(u64),
}

impl From<RawOptionId> for OptionId {
    fn from(raw: RawOptionId) -> Self {
        match raw {
            RawOptionId::Text(value) => Self(value),
            RawOptionId::Signed(value) => Self(value.to_string()),
            RawOptionId::Unsigned(value) => Self(value.to_string()),
        }
    }
}

impl From<OptionId> for String {
    fn from(id: OptionId) -> Self {
        id.0
    }
}

impl From<&str> for OptionId {
    fn from(value: &str) -> Self {
        Self(value.to_string())
    }
}

impl From<String> for OptionId {
    fn from(value: String) -> Self {
        Self(value)
    }
}

impl OptionId {
    pub fn as_str(&self) -> &str {
        &self.0
    }

    pub fn is_blank(&self) -> bool {
        self.0.trim().is_empty()
    }
}

impl fmt::Display for OptionId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// One candidate match returned by the lookup service.
#[derive(Debug, Serialize, Deserialize, Clone, PartialEq, Eq, JsonSchema)]
pub struct LookupOption {
    pub id: OptionId,
    pub text: String,
    /// Text written back into the input once this option is chosen.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub selected_text: Option<String>,
}

impl LookupOption {
    pub fn new(id: impl Into<OptionId>, text: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            text: text.into(),
            selected_text: None,
        }
    }

    pub fn with_selected_text(mut self, selected: impl Into<String>) -> Self {
        self.selected_text = Some(selected.into());
        self
    }

    pub fn selected_text(&self) -> &str {
        self.selected_text.as_deref().unwrap_or(&self.text)
    }
}

#[derive(Debug, Serialize, Deserialize, Clone, Default, PartialEq, Eq, JsonSchema)]
pub struct LookupResponse {
    #[serde(default)]
    pub results: Vec<LookupOption>,
}

/// Shape of a single lookup.
#[derive(Debug, Serialize, Deserialize, Clone, PartialEq, Eq, JsonSchema)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum LookupKind {
    Query { q: String },
    Infer,
    Ident { id: OptionId },
}

#[derive(Debug, Serialize, Deserialize, Clone, PartialEq, Eq, JsonSchema)]
pub struct LookupRequest {
    #[serde(flatten)]
    pub kind: LookupKind,
    #[serde(default)]
    pub forward: ForwardContext,
}

impl LookupRequest {
    pub fn query(q: impl Into<String>, forward: ForwardContext) -> Self {
        Self {
            kind: LookupKind::Query { q: q.into() },
            forward,
        }
    }

    pub fn infer(forward: ForwardContext) -> Self {
        Self {
            kind: LookupKind::Infer,
            forward,
        }
    }

    pub fn ident(id: OptionId) -> Self {
        Self {
            kind: LookupKind::Ident { id },
            forward: ForwardContext::new(),
        }
    }

    /// Query-string parameters in the order the endpoint documents them.
    pub fn query_pairs(&self) -> Result<Vec<(&'static str, String)>> {
        let pairs = match &self.kind {
            LookupKind::Query { q } => vec![("q", q.clone()), ("forward", self.forward.to_json()?)],
            LookupKind::Infer => vec![("forward", self.forward.to_json()?)],
            LookupKind::Ident { id } => vec![("ident", id.to_string())],
        };
        Ok(pairs)
    }

    /// Unencoded `k=v&k=v` rendering; stable for identical requests.
    pub fn canonical(&self) -> Result<String> {
        Ok(self
            .query_pairs()?
            .into_iter()
            .map(|(k, v)| format!("{k}={v}"))
            .collect::<Vec<_>>()
            .join("&"))
    }
}

/// Entry of an autocomplete option list.
#[derive(Debug, Serialize, Deserialize, Clone, PartialEq, Eq, JsonSchema)]
pub struct ListedOption {
    pub value: OptionId,
    pub text: String,
}

impl ListedOption {
    pub fn new(value: impl Into<OptionId>, text: impl Into<String>) -> Self {
        Self {
            value: value.into(),
            text: text.into(),
        }
    }
}

#[derive(Debug, Serialize, Deserialize, Clone, Default, PartialEq, Eq, JsonSchema)]
pub struct OptionListResponse {
    #[serde(default)]
    pub options: Vec<ListedOption>,
}

pub fn lookup_response_schema() -> Result<serde_json::Value> {
    serde_json::to_value(schemars::schema_for!(LookupResponse)).map_err(Into::into)
}

pub fn option_list_schema() -> Result<serde_json::Value> {
    serde_json::to_value(schemars::schema_for!(OptionListResponse)).map_err(Into::into)
}

pub fn serialize_json<T: Serialize>(value: &T) -> Result<String> {
    serde_json::to_string(value).map_err(Into::into)
}
