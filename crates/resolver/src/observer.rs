use serde::Serialize;

use crate::field::{FieldName, FieldState};

/// Why a field changed.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(tag = "cause", rename_all = "snake_case")]
pub enum TransitionCause {
    UserInput,
    LookupResult,
    AutoFill,
    ReverseAutoFill { from: FieldName },
    Hydrate,
    AncestorChanged { ancestor: FieldName },
    Inapplicable,
    FormReset,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct FieldTransition {
    pub field: FieldName,
    pub from: FieldState,
    pub to: FieldState,
    pub cause: TransitionCause,
}

/// Presentation-side collaborator. Receives status transitions and
/// visibility flips; never feeds anything back into the engine.
pub trait FieldObserver: Send {
    fn on_transition(&mut self, transition: &FieldTransition);

    fn on_visibility(&mut self, _field: FieldName, _applicable: bool) {}
}

/// Logs every transition at debug level.
#[derive(Debug, Default)]
pub struct LogObserver;

impl FieldObserver for LogObserver {
    fn on_transition(&mut self, transition: &FieldTransition) {
        log::debug!(
            "{}: {:?} -> {:?} ({:?})",
            transition.field,
            transition.from.status,
            transition.to.status,
            transition.cause
        );
    }

    fn on_visibility(&mut self, field: FieldName, applicable: bool) {
        log::debug!(
            "{field} is now {}",
            if applicable { "applicable" } else { "hidden" }
        );
    }
}
