//! Description-to-id pickers for single-level fields with a parent/child
//! option hierarchy (distrito → seccion → circuito → mesa).
//!
//! The adapter keeps the typed text, the paired hidden id and the
//! validation pattern/message of one input. Choosing a description in a
//! parent refreshes the child's options for the new parent and clears every
//! deeper picker.

use async_trait::async_trait;
use cascade_protocol::{ListedOption, OptionId};
use regex::Regex;
use std::collections::BTreeMap;
use std::sync::Arc;

use crate::config::CascadeConfig;
use crate::error::{AutocompleteError, LookupError};
use crate::fuzzy::DescriptionMatcher;

/// Option-list collaborator (`GET <url>?parent_id=<id>`).
#[async_trait]
pub trait OptionSource: Send + Sync {
    async fn fetch_options(
        &self,
        url: &str,
        parent_id: Option<&OptionId>,
    ) -> std::result::Result<Vec<ListedOption>, LookupError>;
}

/// Description → id mapping with its reverse.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ValuesMap {
    by_text: BTreeMap<String, OptionId>,
    by_id: BTreeMap<OptionId, String>,
}

impl ValuesMap {
    /// Entries with a blank value are placeholders and are skipped.
    pub fn from_options(options: &[ListedOption]) -> Self {
        let mut map = Self::default();
        for option in options.iter().filter(|option| !option.value.is_blank()) {
            map.by_text.insert(option.text.clone(), option.value.clone());
            map.by_id.insert(option.value.clone(), option.text.clone());
        }
        map
    }

    pub fn id_for(&self, text: &str) -> Option<&OptionId> {
        self.by_text.get(text)
    }

    pub fn text_for(&self, id: &OptionId) -> Option<&str> {
        self.by_id.get(id).map(String::as_str)
    }

    pub fn descriptions(&self) -> impl Iterator<Item = &str> {
        self.by_text.keys().map(String::as_str)
    }

    pub fn len(&self) -> usize {
        self.by_text.len()
    }

    pub fn is_empty(&self) -> bool {
        self.by_text.is_empty()
    }

    /// `a|b|c` with every description regex-escaped.
    pub fn validation_pattern(&self) -> String {
        self.descriptions()
            .map(regex::escape)
            .collect::<Vec<_>>()
            .join("|")
    }

    pub fn validation_message(&self) -> String {
        format!(
            "Valores posibles: {}",
            self.descriptions().collect::<Vec<_>>().join(", ")
        )
    }
}

pub struct AutocompleteAdapter {
    field_id: String,
    data_url: Option<String>,
    values: ValuesMap,
    validator: Regex,
    input_text: String,
    hidden_value: Option<OptionId>,
    child: Option<Box<AutocompleteAdapter>>,
    source: Arc<dyn OptionSource>,
    matcher: DescriptionMatcher,
}

impl AutocompleteAdapter {
    /// Build from the JSON endpoint at `data_url` (unfiltered list).
    pub async fn init(
        field_id: impl Into<String>,
        data_url: impl Into<String>,
        child: Option<AutocompleteAdapter>,
        source: Arc<dyn OptionSource>,
    ) -> std::result::Result<Self, AutocompleteError> {
        let field_id = field_id.into();
        let data_url = data_url.into();
        let options = source.fetch_options(&data_url, None).await?;
        log::debug!("Loaded {} option(s) for {field_id}", options.len());
        Self::from_options(field_id, Some(data_url), &options, child, source)
    }

    /// Build the configured picker line, root first. Every picker loads its
    /// unfiltered list; children are narrowed once a parent is selected.
    pub async fn from_config(
        config: &CascadeConfig,
        source: Arc<dyn OptionSource>,
    ) -> std::result::Result<Option<Self>, AutocompleteError> {
        let mut built: Option<(Option<String>, AutocompleteAdapter)> = None;
        for picker in config.pickers.iter().rev() {
            let child = match built.take() {
                Some((Some(parent), child)) if parent == picker.field_id => Some(child),
                Some((_, child)) => {
                    return Err(AutocompleteError::InvalidChain(format!(
                        "{} is not the parent of {}",
                        picker.field_id,
                        child.field_id()
                    )))
                }
                None => None,
            };
            let url = config
                .picker_url(&picker.field_id)
                .unwrap_or_else(|| picker.options_url.clone());
            let adapter = Self::init(&picker.field_id, url, child, Arc::clone(&source)).await?;
            built = Some((picker.parent.clone(), adapter));
        }
        Ok(built.map(|(_, root)| root))
    }

    /// Build from a static option list. `data_url` is still needed when a
    /// parent must refresh this picker.
    pub fn from_options(
        field_id: impl Into<String>,
        data_url: Option<String>,
        options: &[ListedOption],
        child: Option<AutocompleteAdapter>,
        source: Arc<dyn OptionSource>,
    ) -> std::result::Result<Self, AutocompleteError> {
        let values = ValuesMap::from_options(options);
        let validator = compile_validator(&values)?;
        Ok(Self {
            field_id: field_id.into(),
            data_url,
            values,
            validator,
            input_text: String::new(),
            hidden_value: None,
            child: child.map(Box::new),
            source,
            matcher: DescriptionMatcher::new(),
        })
    }

    pub fn field_id(&self) -> &str {
        &self.field_id
    }

    /// Id of the visible text input paired with the hidden field.
    pub fn input_id(&self) -> String {
        format!("{}-autocomplete", self.field_id)
    }

    pub fn input_text(&self) -> &str {
        &self.input_text
    }

    pub fn hidden_value(&self) -> Option<&OptionId> {
        self.hidden_value.as_ref()
    }

    pub fn values(&self) -> &ValuesMap {
        &self.values
    }

    pub fn child(&self) -> Option<&AutocompleteAdapter> {
        self.child.as_deref()
    }

    pub fn child_mut(&mut self) -> Option<&mut AutocompleteAdapter> {
        self.child.as_deref_mut()
    }

    pub fn validation_pattern(&self) -> String {
        self.values.validation_pattern()
    }

    pub fn validation_message(&self) -> String {
        self.values.validation_message()
    }

    /// Whether `text` satisfies the input's validation pattern.
    pub fn validates(&self, text: &str) -> bool {
        self.validator.is_match(text)
    }

    pub fn type_text(&mut self, text: impl Into<String>) {
        self.input_text = text.into();
    }

    /// Descriptions matching the typed text, best first.
    pub fn suggest(&mut self, limit: usize) -> Vec<String> {
        let descriptions: Vec<&str> = self.values.descriptions().collect();
        self.matcher
            .rank(&self.input_text, &descriptions, limit)
            .into_iter()
            .map(|(idx, _)| descriptions[idx].to_string())
            .collect()
    }

    /// Change event: copy the id of the typed text into the hidden field.
    /// Unmapped text leaves the hidden value untouched.
    pub fn commit(&mut self) -> std::result::Result<&OptionId, AutocompleteError> {
        let Some(id) = self.values.id_for(&self.input_text).cloned() else {
            log::debug!(
                "{}: {:?} is not a known option; keeping previous value",
                self.field_id,
                self.input_text
            );
            return Err(AutocompleteError::UnmappedText(self.input_text.clone()));
        };
        Ok(self.hidden_value.insert(id))
    }

    /// A description was picked from the dropdown. The child list is
    /// refetched first; on failure neither picker changes.
    pub async fn select(&mut self, text: &str) -> std::result::Result<(), AutocompleteError> {
        let Some(id) = self.values.id_for(text).cloned() else {
            return Err(AutocompleteError::UnmappedText(text.to_string()));
        };

        let child_url = self.child.as_ref().and_then(|child| child.data_url.clone());
        let refreshed = match child_url {
            Some(url) => Some(self.source.fetch_options(&url, Some(&id)).await?),
            None => None,
        };

        if let Some(child) = self.child.as_deref_mut() {
            if let Some(options) = &refreshed {
                log::debug!(
                    "{} refreshed with {} option(s) for parent {id}",
                    child.field_id,
                    options.len()
                );
                child.replace_options(options)?;
            }
            child.clear();
        }
        self.input_text = text.to_string();
        self.hidden_value = Some(id);
        Ok(())
    }

    /// Clear this picker and every picker below it.
    pub fn clear(&mut self) {
        self.input_text.clear();
        self.hidden_value = None;
        if let Some(child) = self.child.as_deref_mut() {
            child.clear();
        }
    }

    fn replace_options(&mut self, options: &[ListedOption]) -> std::result::Result<(), AutocompleteError> {
        let values = ValuesMap::from_options(options);
        self.validator = compile_validator(&values)?;
        self.values = values;
        Ok(())
    }
}

impl std::fmt::Debug for AutocompleteAdapter {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("AutocompleteAdapter")
            .field("field_id", &self.field_id)
            .field("data_url", &self.data_url)
            .field("values", &self.values.len())
            .field("input_text", &self.input_text)
            .field("hidden_value", &self.hidden_value)
            .field("child", &self.child)
            .finish_non_exhaustive()
    }
}

fn compile_validator(values: &ValuesMap) -> std::result::Result<Regex, regex::Error> {
    Regex::new(&format!("^(?:{})$", values.validation_pattern()))
}
