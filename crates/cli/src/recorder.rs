use cascade_resolver::{FieldObserver, FieldTransition};
use std::sync::{Arc, Mutex};

/// Collects transitions for the `--transitions` output.
#[derive(Clone, Default)]
pub struct TransitionLog(Arc<Mutex<Vec<FieldTransition>>>);

impl TransitionLog {
    pub fn take(&self) -> Vec<FieldTransition> {
        self.0
            .lock()
            .map(|mut recorded| std::mem::take(&mut *recorded))
            .unwrap_or_default()
    }
}

impl FieldObserver for TransitionLog {
    fn on_transition(&mut self, transition: &FieldTransition) {
        if let Ok(mut recorded) = self.0.lock() {
            recorded.push(transition.clone());
        }
    }
}
