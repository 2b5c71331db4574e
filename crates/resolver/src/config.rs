use serde::{Deserialize, Serialize};
use std::collections::HashSet;
use std::path::Path;
use std::time::Duration;

use crate::chain::{CascadeChain, FieldSpec, Gate};
use crate::controller::ControllerOptions;
use crate::error::{CascadeError, Result};
use crate::field::FieldName;

/// Configuration of one cascade form
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct CascadeConfig {
    /// Prefix joined with every relative endpoint
    pub base_url: String,

    /// Re-query empty descendants after a field resolves
    pub autofill: bool,

    /// Re-query empty ancestors after a field resolves
    pub reverse_autofill: bool,

    /// Quiet period after the last keystroke before a lookup is issued
    pub debounce_ms: u64,

    /// Per-request timeout of the HTTP lookup client
    pub request_timeout_ms: u64,

    /// Fields in dependency order
    pub fields: Vec<FieldConfig>,

    /// Visibility rules
    pub gates: Vec<Gate>,

    /// Autocomplete pickers, parent before child
    pub pickers: Vec<PickerConfig>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FieldConfig {
    pub name: FieldName,
    /// Search endpoint, absolute or relative to `base_url`
    pub endpoint: String,
    #[serde(default)]
    pub numeric: bool,
    #[serde(default)]
    pub required: bool,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PickerConfig {
    pub field_id: String,
    /// Option-list endpoint, filtered by `parent_id` once the parent is chosen
    pub options_url: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub parent: Option<String>,
}

impl Default for CascadeConfig {
    fn default() -> Self {
        Self {
            base_url: "http://localhost:8000".to_string(),
            fields: vec![
                FieldConfig::new(FieldName::Distrito, "/elecciones/select/distritos/"),
                FieldConfig::new(FieldName::Seccion, "/elecciones/select/secciones/"),
                FieldConfig::new(FieldName::Circuito, "/elecciones/select/circuitos/"),
                FieldConfig::new(FieldName::Mesa, "/elecciones/select/mesas/").numeric(true),
            ],
            gates: vec![
                Gate::new(FieldName::Seccion, FieldName::Distrito, &["Buenos Aires"]),
                Gate::new(FieldName::Circuito, FieldName::Distrito, &["Buenos Aires"]),
            ],
            autofill: true,
            reverse_autofill: true,
            debounce_ms: 300,
            request_timeout_ms: 10_000,
            pickers: vec![
                PickerConfig::new("distrito", "/fiscales/distritos", None),
                PickerConfig::new("seccion", "/fiscales/secciones", Some("distrito")),
                PickerConfig::new("circuito", "/fiscales/circuitos", Some("seccion")),
                PickerConfig::new("mesa", "/fiscales/mesas", Some("circuito")),
            ],
        }
    }
}

impl FieldConfig {
    pub fn new(name: FieldName, endpoint: impl Into<String>) -> Self {
        Self {
            name,
            endpoint: endpoint.into(),
            numeric: false,
            required: false,
        }
    }

    pub fn numeric(mut self, numeric: bool) -> Self {
        self.numeric = numeric;
        self
    }
}

impl PickerConfig {
    pub fn new(field_id: &str, options_url: &str, parent: Option<&str>) -> Self {
        Self {
            field_id: field_id.to_string(),
            options_url: options_url.to_string(),
            parent: parent.map(str::to_string),
        }
    }
}

impl CascadeConfig {
    /// Every field always applies (forms outside the gated district).
    pub fn ungated() -> Self {
        Self {
            gates: Vec::new(),
            ..Default::default()
        }
    }

    /// No automatic re-queries; lookups only happen on typed input.
    pub fn manual_only() -> Self {
        Self {
            autofill: false,
            reverse_autofill: false,
            ..Default::default()
        }
    }

    pub fn load(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        log::info!("Loading cascade config from {}", path.display());
        let raw = std::fs::read_to_string(path)?;
        Self::from_toml(&raw)
    }

    pub fn from_toml(raw: &str) -> Result<Self> {
        let config: Self = toml::from_str(raw)?;
        config.validate()?;
        Ok(config)
    }

    pub fn to_toml(&self) -> Result<String> {
        toml::to_string_pretty(self).map_err(|e| CascadeError::invalid_config(e.to_string()))
    }

    pub fn validate(&self) -> Result<()> {
        if self.fields.is_empty() {
            return Err(CascadeError::EmptyChain);
        }

        for field in &self.fields {
            if field.endpoint.trim().is_empty() {
                return Err(CascadeError::invalid_config(format!(
                    "field {} has no endpoint",
                    field.name
                )));
            }
        }

        if self.request_timeout_ms == 0 {
            return Err(CascadeError::invalid_config("request_timeout_ms must be > 0"));
        }

        let mut picker_ids = HashSet::new();
        for picker in &self.pickers {
            if let Some(parent) = &picker.parent {
                if !picker_ids.contains(parent.as_str()) {
                    return Err(CascadeError::invalid_config(format!(
                        "picker {} must come after its parent {}",
                        picker.field_id, parent
                    )));
                }
            }
            if !picker_ids.insert(picker.field_id.as_str()) {
                return Err(CascadeError::invalid_config(format!(
                    "picker {} is declared twice",
                    picker.field_id
                )));
            }
        }

        self.chain().map(|_| ())
    }

    pub fn chain(&self) -> Result<CascadeChain> {
        let specs = self
            .fields
            .iter()
            .map(|field| {
                FieldSpec::new(field.name)
                    .numeric(field.numeric)
                    .required(field.required)
            })
            .collect();
        CascadeChain::new(specs, self.gates.clone())
    }

    pub fn controller_options(&self) -> ControllerOptions {
        ControllerOptions {
            autofill: self.autofill,
            reverse_autofill: self.reverse_autofill,
        }
    }

    pub fn debounce(&self) -> Duration {
        Duration::from_millis(self.debounce_ms)
    }

    pub fn request_timeout(&self) -> Duration {
        Duration::from_millis(self.request_timeout_ms)
    }

    /// Absolute search URL for `name`.
    pub fn endpoint_url(&self, name: FieldName) -> Option<String> {
        self.fields
            .iter()
            .find(|field| field.name == name)
            .map(|field| join_url(&self.base_url, &field.endpoint))
    }

    pub fn picker_url(&self, field_id: &str) -> Option<String> {
        self.pickers
            .iter()
            .find(|picker| picker.field_id == field_id)
            .map(|picker| join_url(&self.base_url, &picker.options_url))
    }
}

pub fn join_url(base: &str, endpoint: &str) -> String {
    if endpoint.starts_with("http://") || endpoint.starts_with("https://") {
        return endpoint.to_string();
    }
    format!(
        "{}/{}",
        base.trim_end_matches('/'),
        endpoint.trim_start_matches('/')
    )
}
