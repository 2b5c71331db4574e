//! The 0/1/N-match policy applied to every lookup result.

use crate::field::{FieldState, FieldStatus};
use crate::option_set::OptionSet;
use cascade_protocol::LookupOption;

/// Typed input after trimming and numeric canonicalization.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum NormalizedInput {
    Blank,
    Query(String),
    /// Non-digit text in a field that only accepts numbers
    Invalid(String),
}

/// Trim the input and strip leading zeros from all-digit codes (`"007"` → `"7"`).
pub fn normalize_input(raw: &str, numeric: bool) -> NormalizedInput {
    let trimmed = raw.trim();
    if trimmed.is_empty() {
        return NormalizedInput::Blank;
    }

    if trimmed.chars().all(|c| c.is_ascii_digit()) {
        let stripped = trimmed.trim_start_matches('0');
        let canonical = if stripped.is_empty() { "0" } else { stripped };
        return NormalizedInput::Query(canonical.to_string());
    }

    if numeric {
        NormalizedInput::Invalid(trimmed.to_string())
    } else {
        NormalizedInput::Query(trimmed.to_string())
    }
}

#[derive(Debug, Clone, Copy, Default)]
pub struct FieldResolver {
    required: bool,
}

impl FieldResolver {
    pub fn new() -> Self {
        Self::default()
    }

    /// Zero matches on a blank input count as `NotFound` for required fields.
    pub fn required(mut self, required: bool) -> Self {
        self.required = required;
        self
    }

    /// Decide the next state of `field` for `raw_input` given the option set
    /// of the latest lookup. `raw_input` must already be trimmed.
    pub fn resolve(&self, field: &FieldState, raw_input: &str, options: OptionSet) -> FieldState {
        match options.len() {
            0 => {
                if raw_input.is_empty() && !self.required {
                    FieldState::empty(field.name)
                } else {
                    FieldState::unresolved(field.name, raw_input, FieldStatus::NotFound)
                }
            }
            1 => match options.into_unique() {
                Some(option) => match display_text(&option) {
                    Some(display) if !option.id.is_blank() => {
                        let selected = option.selected_text().to_string();
                        FieldState::resolved(field.name, option.id, display, selected)
                    }
                    _ => {
                        log::warn!("Discarding unusable match for {}: {option:?}", field.name);
                        FieldState::unresolved(field.name, raw_input, FieldStatus::NotFound)
                    }
                },
                None => FieldState::unresolved(field.name, raw_input, FieldStatus::Ambiguous),
            },
            _ => FieldState::unresolved(field.name, raw_input, FieldStatus::Ambiguous),
        }
    }

    /// State for a lookup whose transport failed.
    pub fn resolve_network_error(&self, field: &FieldState, raw_input: &str) -> FieldState {
        FieldState::unresolved(field.name, raw_input, FieldStatus::NetworkError)
    }
}

/// Label shown for a match: its text, else its selected text. `None` when both are blank.
fn display_text(option: &LookupOption) -> Option<String> {
    [Some(option.text.as_str()), option.selected_text.as_deref()]
        .into_iter()
        .flatten()
        .map(str::trim)
        .find(|text| !text.is_empty())
        .map(str::to_string)
}

/// Resolve with the default (non-required) policy.
pub fn resolve(field: &FieldState, raw_input: &str, options: OptionSet) -> FieldState {
    FieldResolver::new().resolve(field, raw_input, options)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::field::FieldName;
    use cascade_protocol::OptionId;
    use pretty_assertions::assert_eq;
    use proptest::prelude::*;

    fn option(id: &str, text: &str) -> LookupOption {
        LookupOption::new(id, text).with_selected_text(id)
    }

    #[test]
    fn single_match_canonicalizes_raw_input() {
        let field = FieldState::empty(FieldName::Distrito);
        let options = OptionSet::new(vec![
            LookupOption::new("2", "Buenos Aires").with_selected_text("2 - Buenos Aires"),
        ]);

        let state = resolve(&field, "buenos", options);
        assert_eq!(state.status, FieldStatus::Resolved);
        assert_eq!(state.resolved_id, Some(OptionId::from("2")));
        assert_eq!(state.display_text, "Buenos Aires");
        assert_eq!(state.raw_input, "2 - Buenos Aires");
    }

    #[test]
    fn missing_selected_text_falls_back_to_text() {
        let field = FieldState::empty(FieldName::Seccion);
        let state = resolve(&field, "3", OptionSet::new(vec![LookupOption::new("3", "Sección 3")]));
        assert_eq!(state.raw_input, "Sección 3");
    }

    #[test]
    fn single_match_without_label_or_id_is_not_found() {
        let field = FieldState::empty(FieldName::Mesa);

        let state = resolve(&field, "45", OptionSet::new(vec![LookupOption::new("4501", "")]));
        assert_eq!(state.status, FieldStatus::NotFound);
        assert_eq!(state.raw_input, "45");
        assert!(state.holds_invariants());

        let state = resolve(&field, "45", OptionSet::new(vec![LookupOption::new(" ", "Mesa 45")]));
        assert_eq!(state.status, FieldStatus::NotFound);
        assert!(state.holds_invariants());
    }

    #[test]
    fn blank_text_falls_back_to_selected_text_for_display() {
        let field = FieldState::empty(FieldName::Mesa);
        let option = LookupOption::new("4501", " ").with_selected_text("45");
        let state = resolve(&field, "45", OptionSet::new(vec![option]));
        assert_eq!(state.status, FieldStatus::Resolved);
        assert_eq!(state.display_text, "45");
        assert!(state.holds_invariants());
    }

    #[test]
    fn blank_input_without_matches_is_empty_unless_required() {
        let field = FieldState::empty(FieldName::Mesa);
        assert_eq!(resolve(&field, "", OptionSet::empty()), FieldState::empty(FieldName::Mesa));

        let required = FieldResolver::new().required(true);
        let state = required.resolve(&field, "", OptionSet::empty());
        assert_eq!(state.status, FieldStatus::NotFound);
    }

    #[test]
    fn network_error_clears_resolution() {
        let field = FieldState::resolved(FieldName::Mesa, OptionId::from("9"), "Mesa 9", "9");
        let state = FieldResolver::new().resolve_network_error(&field, "10");
        assert_eq!(state.status, FieldStatus::NetworkError);
        assert_eq!(state.resolved_id, None);
        assert_eq!(state.raw_input, "10");
    }

    #[test]
    fn normalize_strips_leading_zeros_and_flags_non_numeric() {
        assert_eq!(normalize_input("  007 ", true), NormalizedInput::Query("7".to_string()));
        assert_eq!(normalize_input("000", false), NormalizedInput::Query("0".to_string()));
        assert_eq!(normalize_input("   ", true), NormalizedInput::Blank);
        assert_eq!(normalize_input("12a", true), NormalizedInput::Invalid("12a".to_string()));
        assert_eq!(
            normalize_input(" La Plata ", false),
            NormalizedInput::Query("La Plata".to_string())
        );
    }

    proptest! {
        #[test]
        fn proptest_single_option_always_resolves(id in "[0-9]{1,6}", text in "[A-Za-z][A-Za-z ]{0,23}", raw in "[A-Za-z0-9]{0,12}") {
            let field = FieldState::empty(FieldName::Circuito);
            let state = resolve(&field, &raw, OptionSet::new(vec![LookupOption::new(id.as_str(), text.as_str())]));
            prop_assert_eq!(state.status, FieldStatus::Resolved);
            prop_assert_eq!(state.resolved_id, Some(OptionId::from(id.as_str())));
            prop_assert_eq!(state.display_text, text.trim());
        }

        #[test]
        fn proptest_no_options_with_input_is_not_found(raw in "[A-Za-z0-9]{1,12}") {
            let field = FieldState::empty(FieldName::Mesa);
            let state = resolve(&field, &raw, OptionSet::empty());
            prop_assert_eq!(state.status, FieldStatus::NotFound);
            prop_assert_eq!(state.resolved_id, None);
            prop_assert!(state.display_text.is_empty());
        }

        #[test]
        fn proptest_many_options_are_ambiguous(ids in proptest::collection::vec("[0-9]{1,4}", 2..8), raw in "[0-9]{0,4}") {
            let field = FieldState::empty(FieldName::Seccion);
            let options: OptionSet = ids.iter().map(|id| option(id, "x")).collect();
            let state = resolve(&field, &raw, options);
            prop_assert_eq!(state.status, FieldStatus::Ambiguous);
            prop_assert_eq!(state.resolved_id, None);
        }

        #[test]
        fn proptest_re_resolving_same_match_is_idempotent(id in "[0-9]{1,6}", text in "[A-Za-z]{1,16}") {
            let field = FieldState::empty(FieldName::Distrito);
            let first = resolve(&field, &id, OptionSet::new(vec![option(&id, &text)]));
            let again = resolve(&first, &first.raw_input.clone(), OptionSet::new(vec![option(&id, &text)]));
            prop_assert_eq!(first, again);
        }
    }
}
