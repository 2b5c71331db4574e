use serde::{Deserialize, Serialize};
use std::collections::HashSet;

use crate::error::{CascadeError, Result};
use crate::field::FieldName;

/// Per-field behaviour inside a chain.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FieldSpec {
    pub name: FieldName,
    /// Only digits are accepted; anything else is `Invalid`
    #[serde(default)]
    pub numeric: bool,
    #[serde(default)]
    pub required: bool,
}

impl FieldSpec {
    pub fn new(name: FieldName) -> Self {
        Self {
            name,
            numeric: false,
            required: false,
        }
    }

    pub fn numeric(mut self, numeric: bool) -> Self {
        self.numeric = numeric;
        self
    }

    pub fn required(mut self, required: bool) -> Self {
        self.required = required;
        self
    }
}

/// Visibility rule: `field` only applies while `ancestor` displays one of `display_in`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Gate {
    pub field: FieldName,
    pub ancestor: FieldName,
    pub display_in: Vec<String>,
}

impl Gate {
    pub fn new(field: FieldName, ancestor: FieldName, display_in: &[&str]) -> Self {
        Self {
            field,
            ancestor,
            display_in: display_in.iter().map(|s| s.to_string()).collect(),
        }
    }

    pub fn admits(&self, ancestor_display: &str) -> bool {
        let display = ancestor_display.trim();
        self.display_in.iter().any(|allowed| allowed.trim() == display)
    }
}

/// Ordered, acyclic dependency list of fields.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CascadeChain {
    specs: Vec<FieldSpec>,
    gates: Vec<Gate>,
}

impl CascadeChain {
    pub fn new(specs: Vec<FieldSpec>, gates: Vec<Gate>) -> Result<Self> {
        if specs.is_empty() {
            return Err(CascadeError::EmptyChain);
        }

        let mut seen = HashSet::new();
        for spec in &specs {
            if !seen.insert(spec.name) {
                return Err(CascadeError::DuplicateField(spec.name));
            }
        }

        let chain = Self {
            specs,
            gates: Vec::new(),
        };
        for gate in &gates {
            let field_pos = chain
                .position(gate.field)
                .ok_or_else(|| CascadeError::UnknownField(gate.field.to_string()))?;
            let ancestor_pos = chain
                .position(gate.ancestor)
                .ok_or_else(|| CascadeError::UnknownField(gate.ancestor.to_string()))?;
            if ancestor_pos >= field_pos {
                return Err(CascadeError::InvalidGate {
                    field: gate.field,
                    ancestor: gate.ancestor,
                });
            }
        }

        Ok(Self { gates, ..chain })
    }

    /// `distrito < seccion < circuito < mesa`; section and circuit only
    /// apply inside Buenos Aires, table codes are numeric.
    pub fn canonical() -> Self {
        Self {
            specs: vec![
                FieldSpec::new(FieldName::Distrito),
                FieldSpec::new(FieldName::Seccion),
                FieldSpec::new(FieldName::Circuito),
                FieldSpec::new(FieldName::Mesa).numeric(true),
            ],
            gates: vec![
                Gate::new(FieldName::Seccion, FieldName::Distrito, &["Buenos Aires"]),
                Gate::new(FieldName::Circuito, FieldName::Distrito, &["Buenos Aires"]),
            ],
        }
    }

    pub fn len(&self) -> usize {
        self.specs.len()
    }

    pub fn is_empty(&self) -> bool {
        self.specs.is_empty()
    }

    pub fn specs(&self) -> &[FieldSpec] {
        &self.specs
    }

    pub fn spec(&self, index: usize) -> &FieldSpec {
        &self.specs[index]
    }

    pub fn gates(&self) -> &[Gate] {
        &self.gates
    }

    pub fn position(&self, name: FieldName) -> Option<usize> {
        self.specs.iter().position(|spec| spec.name == name)
    }

    pub fn names(&self) -> impl Iterator<Item = FieldName> + '_ {
        self.specs.iter().map(|spec| spec.name)
    }

    pub fn gates_for(&self, name: FieldName) -> impl Iterator<Item = &Gate> {
        self.gates.iter().filter(move |gate| gate.field == name)
    }
}
