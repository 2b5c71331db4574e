use anyhow::Result;
use schemars::JsonSchema;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

use crate::OptionId;

/// Ancestor values sent along with a lookup to constrain its results.
///
/// Keys are kept in a `BTreeMap` so the serialized `forward` parameter is
/// byte-for-byte reproducible for the same set of values.
#[derive(Debug, Serialize, Deserialize, Clone, Default, PartialEq, Eq, JsonSchema)]
#[serde(transparent)]
pub struct ForwardContext(BTreeMap<String, String>);

impl ForwardContext {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn insert(&mut self, field: &str, id: &OptionId) {
        self.0.insert(field.to_string(), id.as_str().to_string());
    }

    /// Flag the request as a reverse inference from `field`
    /// (`mesa` becomes `desdeMesa=1`).
    pub fn mark_reverse(&mut self, field: &str) {
        self.0.insert(reverse_flag_key(field), "1".to_string());
    }

    pub fn get(&self, field: &str) -> Option<&str> {
        self.0.get(field).map(String::as_str)
    }

    pub fn contains(&self, field: &str) -> bool {
        self.0.contains_key(field)
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &str)> {
        self.0.iter().map(|(k, v)| (k.as_str(), v.as_str()))
    }

    pub fn to_json(&self) -> Result<String> {
        serde_json::to_string(&self.0).map_err(Into::into)
    }
}

impl<K: Into<String>, V: Into<String>> FromIterator<(K, V)> for ForwardContext {
    fn from_iter<T: IntoIterator<Item = (K, V)>>(iter: T) -> Self {
        Self(iter.into_iter().map(|(k, v)| (k.into(), v.into())).collect())
    }
}

pub fn reverse_flag_key(field: &str) -> String {
    let mut chars = field.chars();
    match chars.next() {
        Some(first) => format!("desde{}{}", first.to_uppercase(), chars.as_str()),
        None => "desde".to_string(),
    }
}
