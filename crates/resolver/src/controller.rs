//! Cascade controller: owns the field states of one chain, forwards ancestor
//! values on lookups, resets descendants when a resolution changes and
//! issues auto-fill re-queries.
//!
//! Lookups are split into an issue step (`begin_input`, `begin_hydrate`)
//! that returns a [`LookupTicket`] and an apply step (`apply`) that takes the
//! ticket back together with the result. Nothing is borrowed across the
//! lookup itself, so several tickets may be in flight at once; only the
//! latest ticket per field is ever applied.

use cascade_protocol::{ForwardContext, LookupRequest};
use serde::Serialize;
use std::collections::VecDeque;

use crate::chain::CascadeChain;
use crate::error::{CascadeError, Result};
use crate::field::{FieldName, FieldState, FieldStatus};
use crate::lookup::{AutoFill, LookupClient, LookupPurpose, LookupResult, LookupTicket};
use crate::observer::{FieldObserver, FieldTransition, TransitionCause};
use crate::option_set::OptionSet;
use crate::resolver::{normalize_input, FieldResolver, NormalizedInput};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ControllerOptions {
    /// Re-query empty descendants after a field resolves
    pub autofill: bool,
    /// Re-query empty ancestors after a field resolves
    pub reverse_autofill: bool,
}

impl Default for ControllerOptions {
    fn default() -> Self {
        Self {
            autofill: true,
            reverse_autofill: true,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum InputOutcome {
    /// A lookup must be run and its result passed to [`CascadeController::apply`]
    Lookup(LookupTicket),
    /// Input was resolved locally (blank or invalid)
    Settled { follow_ups: Vec<LookupTicket> },
    /// The field is not applicable; nothing changed
    Ignored,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ApplyOutcome {
    /// A newer lookup was issued for the field, or it was reset meanwhile
    Stale,
    Applied { follow_ups: Vec<LookupTicket> },
}

impl ApplyOutcome {
    pub fn follow_ups(self) -> Vec<LookupTicket> {
        match self {
            ApplyOutcome::Stale => Vec::new(),
            ApplyOutcome::Applied { follow_ups } => follow_ups,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct FieldView {
    #[serde(flatten)]
    pub state: FieldState,
    pub applicable: bool,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct CascadeSnapshot {
    pub fields: Vec<FieldView>,
}

impl CascadeSnapshot {
    pub fn get(&self, name: FieldName) -> Option<&FieldView> {
        self.fields.iter().find(|view| view.state.name == name)
    }
}

/// Per-form lookup bookkeeping: the latest issued sequence number of every
/// field plus an epoch that advances on form reset.
#[derive(Debug)]
struct SessionContext {
    epoch: u64,
    next_seq: u64,
    latest: Vec<u64>,
}

impl SessionContext {
    fn new(fields: usize) -> Self {
        Self {
            epoch: 0,
            next_seq: 0,
            latest: vec![0; fields],
        }
    }

    fn issue(&mut self, index: usize) -> u64 {
        self.next_seq += 1;
        self.latest[index] = self.next_seq;
        self.next_seq
    }

    /// Supersede whatever is in flight for `index`.
    fn invalidate(&mut self, index: usize) {
        self.issue(index);
    }

    fn is_current(&self, index: usize, seq: u64, epoch: u64) -> bool {
        epoch == self.epoch && self.latest[index] == seq
    }

    fn reset(&mut self) {
        self.epoch += 1;
        self.latest.iter_mut().for_each(|seq| *seq = 0);
    }
}

pub struct CascadeController {
    chain: CascadeChain,
    fields: Vec<FieldState>,
    applicable: Vec<bool>,
    session: SessionContext,
    options: ControllerOptions,
    observers: Vec<Box<dyn FieldObserver>>,
}

impl CascadeController {
    pub fn new(chain: CascadeChain) -> Self {
        let fields: Vec<FieldState> = chain.names().map(FieldState::empty).collect();
        let session = SessionContext::new(fields.len());
        let mut controller = Self {
            applicable: vec![true; fields.len()],
            chain,
            fields,
            session,
            options: ControllerOptions::default(),
            observers: Vec::new(),
        };
        for index in 0..controller.fields.len() {
            controller.applicable[index] = controller.compute_applicable(index);
        }
        controller
    }

    pub fn with_options(mut self, options: ControllerOptions) -> Self {
        self.options = options;
        self
    }

    pub fn add_observer(&mut self, observer: Box<dyn FieldObserver>) {
        self.observers.push(observer);
    }

    pub fn chain(&self) -> &CascadeChain {
        &self.chain
    }

    pub fn options(&self) -> ControllerOptions {
        self.options
    }

    pub fn fields(&self) -> &[FieldState] {
        &self.fields
    }

    pub fn field(&self, name: FieldName) -> Option<&FieldState> {
        self.chain.position(name).map(|index| &self.fields[index])
    }

    pub fn is_field_applicable(&self, name: FieldName) -> bool {
        self.chain
            .position(name)
            .is_some_and(|index| self.applicable[index])
    }

    /// Resolved ids of applicable fields strictly before `name`.
    pub fn forwarded_context(&self, name: FieldName) -> Option<ForwardContext> {
        self.chain.position(name).map(|index| self.forward_context(index))
    }

    pub fn snapshot(&self) -> CascadeSnapshot {
        CascadeSnapshot {
            fields: self
                .fields
                .iter()
                .zip(&self.applicable)
                .map(|(state, applicable)| FieldView {
                    state: state.clone(),
                    applicable: *applicable,
                })
                .collect(),
        }
    }

    /// Record new user input for `name`. Changing the input alone never
    /// disturbs descendants; only a completed resolution does.
    pub fn begin_input(&mut self, name: FieldName, raw: &str) -> Result<InputOutcome> {
        let index = self.index_of(name)?;
        if !self.applicable[index] {
            log::debug!("Ignoring input for {name}: field is not applicable");
            return Ok(InputOutcome::Ignored);
        }

        let spec = self.chain.spec(index).clone();
        let resolver = FieldResolver::new().required(spec.required);
        let raw = raw.trim();

        match normalize_input(raw, spec.numeric) {
            NormalizedInput::Blank => {
                self.session.invalidate(index);
                let next = resolver.resolve(&self.fields[index], "", OptionSet::empty());
                let follow_ups = self.commit(index, next, TransitionCause::UserInput);
                Ok(InputOutcome::Settled { follow_ups })
            }
            NormalizedInput::Invalid(text) => {
                self.session.invalidate(index);
                let next = FieldState::unresolved(name, text, FieldStatus::Invalid);
                let follow_ups = self.commit(index, next, TransitionCause::UserInput);
                Ok(InputOutcome::Settled { follow_ups })
            }
            NormalizedInput::Query(query) => {
                let pending = self.fields[index].pending(raw);
                self.set_state(index, pending, TransitionCause::UserInput);

                let seq = self.session.issue(index);
                let request = LookupRequest::query(query, self.forward_context(index));
                let purpose = LookupPurpose::UserInput {
                    raw_input: raw.to_string(),
                };
                Ok(InputOutcome::Lookup(self.ticket(index, seq, purpose, request)))
            }
        }
    }

    /// Re-hydrate a stored id (e.g. a form reopened with saved values).
    /// Fields with user input in flight keep that input.
    pub fn begin_hydrate(
        &mut self,
        name: FieldName,
        id: cascade_protocol::OptionId,
    ) -> Result<Option<LookupTicket>> {
        let index = self.index_of(name)?;
        if !self.applicable[index] {
            return Ok(None);
        }
        if self.fields[index].status == FieldStatus::Pending {
            log::debug!("Not hydrating {name}: a lookup for user input is in flight");
            return Ok(None);
        }
        let seq = self.session.issue(index);
        Ok(Some(self.ticket(
            index,
            seq,
            LookupPurpose::Hydrate,
            LookupRequest::ident(id),
        )))
    }

    /// Apply the result of a lookup issued by this controller.
    pub fn apply(&mut self, ticket: LookupTicket, result: LookupResult) -> ApplyOutcome {
        let Some(index) = self.chain.position(ticket.field) else {
            return ApplyOutcome::Stale;
        };
        if !self.session.is_current(index, ticket.seq, ticket.epoch) {
            log::debug!(
                "Discarding stale lookup #{} for {}",
                ticket.seq,
                ticket.field
            );
            return ApplyOutcome::Stale;
        }
        self.session.invalidate(index);
        if !self.applicable[index] {
            return ApplyOutcome::Stale;
        }

        let resolver = FieldResolver::new().required(self.chain.spec(index).required);
        let current = self.fields[index].clone();

        let follow_ups = match ticket.purpose {
            LookupPurpose::UserInput { raw_input } => {
                let next = match result {
                    Ok(options) => resolver.resolve(&current, &raw_input, options),
                    Err(_) => resolver.resolve_network_error(&current, &raw_input),
                };
                self.commit(index, next, TransitionCause::LookupResult)
            }
            LookupPurpose::Hydrate => {
                let next = result
                    .ok()
                    .and_then(OptionSet::into_unique)
                    .map(|option| resolver.resolve(&current, "", OptionSet::new(vec![option])))
                    .filter(FieldState::is_resolved);
                match next {
                    Some(next) => self.commit(index, next, TransitionCause::Hydrate),
                    None => {
                        log::debug!("Stored id for {} did not resolve uniquely", ticket.field);
                        Vec::new()
                    }
                }
            }
            LookupPurpose::AutoFill(direction) => {
                if !current.is_empty() {
                    return ApplyOutcome::Applied {
                        follow_ups: Vec::new(),
                    };
                }
                match result {
                    Ok(options) => {
                        let next = options
                            .into_unique()
                            .map(|option| resolver.resolve(&current, "", OptionSet::new(vec![option])))
                            .filter(FieldState::is_resolved);
                        match next {
                            Some(next) => {
                                let cause = match direction {
                                    AutoFill::Forward => TransitionCause::AutoFill,
                                    AutoFill::Reverse { from } => {
                                        TransitionCause::ReverseAutoFill { from }
                                    }
                                };
                                self.commit(index, next, cause)
                            }
                            None => Vec::new(),
                        }
                    }
                    Err(err) => {
                        log::warn!("Auto-fill for {} skipped: {err}", ticket.field);
                        Vec::new()
                    }
                }
            }
        };

        ApplyOutcome::Applied { follow_ups }
    }

    /// Return every field to `Empty` and drop all in-flight lookups.
    pub fn reset_form(&mut self) {
        self.session.reset();
        for index in 0..self.fields.len() {
            let empty = FieldState::empty(self.chain.spec(index).name);
            self.set_state(index, empty, TransitionCause::FormReset);
        }
        self.refresh_applicability();
    }

    /// Drive one user input to completion, including auto-fill follow-ups.
    pub async fn input(
        &mut self,
        name: FieldName,
        raw: &str,
        client: &LookupClient,
    ) -> Result<FieldState> {
        let tickets = match self.begin_input(name, raw)? {
            InputOutcome::Lookup(ticket) => vec![ticket],
            InputOutcome::Settled { follow_ups } => follow_ups,
            InputOutcome::Ignored => Vec::new(),
        };
        self.drive(tickets, client).await;
        self.state_of(name)
    }

    pub async fn hydrate(
        &mut self,
        name: FieldName,
        id: cascade_protocol::OptionId,
        client: &LookupClient,
    ) -> Result<FieldState> {
        let tickets: Vec<_> = self.begin_hydrate(name, id)?.into_iter().collect();
        self.drive(tickets, client).await;
        self.state_of(name)
    }

    /// Run tickets one at a time, queueing whatever follow-ups they produce.
    pub async fn drive(&mut self, tickets: Vec<LookupTicket>, client: &LookupClient) {
        let mut queue: VecDeque<LookupTicket> = tickets.into();
        while let Some(ticket) = queue.pop_front() {
            let result = client.execute(&ticket).await;
            queue.extend(self.apply(ticket, result).follow_ups());
        }
    }

    fn state_of(&self, name: FieldName) -> Result<FieldState> {
        self.field(name)
            .cloned()
            .ok_or_else(|| CascadeError::UnknownField(name.to_string()))
    }

    fn index_of(&self, name: FieldName) -> Result<usize> {
        self.chain
            .position(name)
            .ok_or_else(|| CascadeError::UnknownField(name.to_string()))
    }

    fn ticket(
        &self,
        index: usize,
        seq: u64,
        purpose: LookupPurpose,
        request: LookupRequest,
    ) -> LookupTicket {
        LookupTicket {
            field: self.chain.spec(index).name,
            seq,
            epoch: self.session.epoch,
            purpose,
            request,
        }
    }

    fn forward_context(&self, index: usize) -> ForwardContext {
        let mut context = ForwardContext::new();
        for ancestor in 0..index {
            if !self.applicable[ancestor] {
                continue;
            }
            if let Some(id) = &self.fields[ancestor].resolved_id {
                context.insert(self.chain.spec(ancestor).name.as_str(), id);
            }
        }
        context
    }

    fn compute_applicable(&self, index: usize) -> bool {
        let name = self.chain.spec(index).name;
        self.chain.gates_for(name).all(|gate| {
            self.chain
                .position(gate.ancestor)
                .is_some_and(|ancestor| gate.admits(&self.fields[ancestor].display_text))
        })
    }

    /// Replace a field state, notifying observers when it actually changed.
    fn set_state(&mut self, index: usize, next: FieldState, cause: TransitionCause) -> bool {
        if self.fields[index] == next {
            return false;
        }
        debug_assert!(next.holds_invariants(), "invalid field state: {next:?}");
        let from = std::mem::replace(&mut self.fields[index], next);
        let transition = FieldTransition {
            field: from.name,
            from,
            to: self.fields[index].clone(),
            cause,
        };
        for observer in &mut self.observers {
            observer.on_transition(&transition);
        }
        true
    }

    fn reset_field(&mut self, index: usize, cause: TransitionCause) {
        self.session.invalidate(index);
        let empty = FieldState::empty(self.chain.spec(index).name);
        self.set_state(index, empty, cause);
    }

    /// Re-evaluate every gate. Returns the fields that just became applicable.
    fn refresh_applicability(&mut self) -> Vec<usize> {
        let mut opened = Vec::new();
        for index in 0..self.fields.len() {
            let applicable = self.compute_applicable(index);
            if applicable == self.applicable[index] {
                continue;
            }
            self.applicable[index] = applicable;
            let name = self.chain.spec(index).name;
            if applicable {
                opened.push(index);
            } else {
                self.reset_field(index, TransitionCause::Inapplicable);
            }
            for observer in &mut self.observers {
                observer.on_visibility(name, applicable);
            }
        }
        opened
    }

    /// Install a completed resolution and propagate it along the chain.
    fn commit(&mut self, index: usize, next: FieldState, cause: TransitionCause) -> Vec<LookupTicket> {
        let name = self.chain.spec(index).name;
        let previous_id = self.fields[index].resolved_id.clone();
        self.set_state(index, next, cause);

        let id_changed = previous_id != self.fields[index].resolved_id;
        // Filling an empty field from a stored id or from below leaves descendants alone.
        let propagates = match cause {
            TransitionCause::UserInput | TransitionCause::LookupResult | TransitionCause::AutoFill => {
                true
            }
            TransitionCause::Hydrate => previous_id.is_some(),
            _ => false,
        };

        if id_changed && propagates {
            for descendant in index + 1..self.fields.len() {
                self.reset_field(descendant, TransitionCause::AncestorChanged { ancestor: name });
            }
        }
        let opened = self.refresh_applicability();

        let mut follow_ups = Vec::new();
        if let TransitionCause::ReverseAutoFill { from } = cause {
            // Ancestors of the origin that this fill made applicable are still worth filling.
            if let Some(origin) = self.chain.position(from) {
                let ancestors: Vec<usize> = opened.into_iter().filter(|i| *i < origin).collect();
                follow_ups.extend(self.reverse_fill(origin, ancestors));
            }
            return follow_ups;
        }
        if !(id_changed && propagates) {
            return follow_ups;
        }
        if !self.fields[index].is_resolved() {
            return follow_ups;
        }

        if self.options.autofill {
            for descendant in index + 1..self.fields.len() {
                if !self.applicable[descendant] || !self.fields[descendant].is_empty() {
                    continue;
                }
                let seq = self.session.issue(descendant);
                let request = LookupRequest::infer(self.forward_context(descendant));
                follow_ups.push(self.ticket(
                    descendant,
                    seq,
                    LookupPurpose::AutoFill(AutoFill::Forward),
                    request,
                ));
            }
        }

        follow_ups.extend(self.reverse_fill(index, (0..index).collect()));
        follow_ups
    }

    /// Re-query the empty, applicable `ancestors` with the resolved id of `origin`.
    fn reverse_fill(&mut self, origin: usize, ancestors: Vec<usize>) -> Vec<LookupTicket> {
        let name = self.chain.spec(origin).name;
        let state = &self.fields[origin];
        let Some(resolved_id) = state
            .resolved_id
            .clone()
            .filter(|_| state.is_resolved() && self.options.reverse_autofill)
        else {
            return Vec::new();
        };

        let mut tickets = Vec::new();
        for ancestor in ancestors {
            if !self.applicable[ancestor] || !self.fields[ancestor].is_empty() {
                continue;
            }
            let mut context = ForwardContext::new();
            context.insert(name.as_str(), &resolved_id);
            context.mark_reverse(name.as_str());
            let seq = self.session.issue(ancestor);
            tickets.push(self.ticket(
                ancestor,
                seq,
                LookupPurpose::AutoFill(AutoFill::Reverse { from: name }),
                LookupRequest::infer(context),
            ));
        }
        tickets
    }
}

impl std::fmt::Debug for CascadeController {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("CascadeController")
            .field("fields", &self.fields)
            .field("applicable", &self.applicable)
            .field("options", &self.options)
            .finish_non_exhaustive()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::chain::{FieldSpec, Gate};
    use cascade_protocol::{LookupOption, OptionId};
    use pretty_assertions::assert_eq;

    fn single(id: &str, text: &str) -> LookupResult {
        Ok(OptionSet::new(vec![LookupOption::new(id, text)]))
    }

    fn lookup_ticket(outcome: InputOutcome) -> LookupTicket {
        match outcome {
            InputOutcome::Lookup(ticket) => ticket,
            other => panic!("expected a lookup, got {other:?}"),
        }
    }

    fn ungated() -> CascadeController {
        let chain = CascadeChain::new(
            FieldName::ALL.iter().map(|name| FieldSpec::new(*name)).collect(),
            Vec::new(),
        )
        .unwrap();
        CascadeController::new(chain).with_options(ControllerOptions {
            autofill: false,
            reverse_autofill: false,
        })
    }

    #[test]
    fn input_marks_field_pending_and_forwards_resolved_ancestors() {
        let mut controller = ungated();
        let ticket = lookup_ticket(controller.begin_input(FieldName::Distrito, " 02 ").unwrap());
        assert_eq!(ticket.request, LookupRequest::query("2", ForwardContext::new()));
        assert_eq!(
            controller.field(FieldName::Distrito).unwrap().status,
            FieldStatus::Pending
        );
        controller.apply(ticket, single("2", "Buenos Aires"));

        let ticket = lookup_ticket(controller.begin_input(FieldName::Circuito, "7").unwrap());
        assert_eq!(ticket.request.forward.get("distrito"), Some("2"));
        assert!(!ticket.request.forward.contains("seccion"));
        assert!(!ticket.request.forward.contains("mesa"));
    }

    #[test]
    fn pending_input_does_not_reset_descendants() {
        let mut controller = ungated();
        let ticket = lookup_ticket(controller.begin_input(FieldName::Distrito, "2").unwrap());
        controller.apply(ticket, single("2", "Buenos Aires"));
        let ticket = lookup_ticket(controller.begin_input(FieldName::Seccion, "3").unwrap());
        controller.apply(ticket, single("3", "Sección 3"));

        let _ = controller.begin_input(FieldName::Distrito, "Cordoba").unwrap();
        let seccion = controller.field(FieldName::Seccion).unwrap();
        assert_eq!(seccion.status, FieldStatus::Resolved);
        assert_eq!(
            controller.forwarded_context(FieldName::Seccion).unwrap().get("distrito"),
            Some("2")
        );
    }

    #[test]
    fn regression_to_ambiguous_resets_descendants() {
        let mut controller = ungated();
        let ticket = lookup_ticket(controller.begin_input(FieldName::Distrito, "2").unwrap());
        controller.apply(ticket, single("2", "Buenos Aires"));
        let ticket = lookup_ticket(controller.begin_input(FieldName::Seccion, "3").unwrap());
        controller.apply(ticket, single("3", "Sección 3"));

        let ticket = lookup_ticket(controller.begin_input(FieldName::Distrito, "B").unwrap());
        let many = Ok(OptionSet::new(vec![
            LookupOption::new("2", "Buenos Aires"),
            LookupOption::new("7", "Buenos Aires Ciudad"),
        ]));
        controller.apply(ticket, many);

        assert_eq!(
            controller.field(FieldName::Distrito).unwrap().status,
            FieldStatus::Ambiguous
        );
        assert_eq!(
            controller.field(FieldName::Seccion).unwrap(),
            &FieldState::empty(FieldName::Seccion)
        );
    }

    #[test]
    fn reset_invalidates_in_flight_descendant_lookups() {
        let mut controller = ungated();
        let mesa = lookup_ticket(controller.begin_input(FieldName::Mesa, "45").unwrap());
        let distrito = lookup_ticket(controller.begin_input(FieldName::Distrito, "2").unwrap());
        controller.apply(distrito, single("2", "Buenos Aires"));

        assert_eq!(controller.apply(mesa, single("45", "Mesa 45")), ApplyOutcome::Stale);
        assert!(controller.field(FieldName::Mesa).unwrap().is_empty());
    }

    #[test]
    fn transport_failure_becomes_network_error_status() {
        let mut controller = ungated();
        let ticket = lookup_ticket(controller.begin_input(FieldName::Mesa, "45").unwrap());
        controller.apply(ticket, Err(crate::error::LookupError::transport("refused")));
        let mesa = controller.field(FieldName::Mesa).unwrap();
        assert_eq!(mesa.status, FieldStatus::NetworkError);
        assert_eq!(mesa.raw_input, "45");
    }

    #[test]
    fn numeric_field_rejects_text_without_lookup() {
        let chain = CascadeChain::new(vec![FieldSpec::new(FieldName::Mesa).numeric(true)], Vec::new()).unwrap();
        let mut controller = CascadeController::new(chain);
        let outcome = controller.begin_input(FieldName::Mesa, "4x").unwrap();
        assert_eq!(outcome, InputOutcome::Settled { follow_ups: Vec::new() });
        assert_eq!(controller.field(FieldName::Mesa).unwrap().status, FieldStatus::Invalid);
    }

    #[test]
    fn form_reset_makes_outstanding_tickets_stale() {
        let mut controller = ungated();
        let ticket = lookup_ticket(controller.begin_input(FieldName::Distrito, "2").unwrap());
        controller.reset_form();
        assert_eq!(controller.apply(ticket, single("2", "Buenos Aires")), ApplyOutcome::Stale);
        assert!(controller.fields().iter().all(FieldState::is_empty));
    }

    #[test]
    fn applying_the_same_ticket_twice_is_stale() {
        let mut controller = ungated();
        let ticket = lookup_ticket(controller.begin_input(FieldName::Mesa, "45").unwrap());
        assert!(matches!(
            controller.apply(ticket.clone(), single("45", "Mesa 45")),
            ApplyOutcome::Applied { .. }
        ));
        assert_eq!(controller.apply(ticket, single("46", "Mesa 46")), ApplyOutcome::Stale);
        assert_eq!(
            controller.field(FieldName::Mesa).unwrap().resolved_id,
            Some(OptionId::from("45"))
        );
    }

    #[test]
    fn gated_field_is_forced_empty_when_gate_closes() {
        let chain = CascadeChain::new(
            vec![FieldSpec::new(FieldName::Distrito), FieldSpec::new(FieldName::Seccion)],
            vec![Gate::new(FieldName::Seccion, FieldName::Distrito, &["Buenos Aires"])],
        )
        .unwrap();
        let mut controller = CascadeController::new(chain).with_options(ControllerOptions {
            autofill: false,
            reverse_autofill: false,
        });
        assert!(!controller.is_field_applicable(FieldName::Seccion));

        let ticket = lookup_ticket(controller.begin_input(FieldName::Distrito, "2").unwrap());
        controller.apply(ticket, single("2", "Buenos Aires"));
        assert!(controller.is_field_applicable(FieldName::Seccion));

        let ticket = lookup_ticket(controller.begin_input(FieldName::Distrito, "4").unwrap());
        controller.apply(ticket, single("4", "Córdoba"));
        assert!(!controller.is_field_applicable(FieldName::Seccion));
        assert_eq!(
            controller.begin_input(FieldName::Seccion, "3").unwrap(),
            InputOutcome::Ignored
        );
    }

    #[test]
    fn hydrating_a_different_id_resets_descendants() {
        let mut controller = ungated();
        let ticket = lookup_ticket(controller.begin_input(FieldName::Distrito, "2").unwrap());
        controller.apply(ticket, single("2", "Buenos Aires"));
        let ticket = lookup_ticket(controller.begin_input(FieldName::Seccion, "3").unwrap());
        controller.apply(ticket, single("3", "Sección 3"));

        let ticket = controller
            .begin_hydrate(FieldName::Distrito, OptionId::from("4"))
            .unwrap()
            .unwrap();
        assert_eq!(ticket.request, LookupRequest::ident(OptionId::from("4")));
        controller.apply(ticket, single("4", "Córdoba"));

        assert_eq!(
            controller.field(FieldName::Distrito).unwrap().resolved_id,
            Some(OptionId::from("4"))
        );
        assert_eq!(
            controller.field(FieldName::Seccion).unwrap(),
            &FieldState::empty(FieldName::Seccion)
        );
    }

    #[test]
    fn hydrate_waits_for_user_input_in_flight() {
        let mut controller = ungated();
        let input = lookup_ticket(controller.begin_input(FieldName::Distrito, "Bue").unwrap());
        assert_eq!(
            controller.begin_hydrate(FieldName::Distrito, OptionId::from("2")).unwrap(),
            None
        );

        assert!(matches!(
            controller.apply(input, single("2", "Buenos Aires")),
            ApplyOutcome::Applied { .. }
        ));
        assert_eq!(
            controller.field(FieldName::Distrito).unwrap().status,
            FieldStatus::Resolved
        );
    }

    #[test]
    fn unusable_hydrate_match_leaves_field_untouched() {
        let mut controller = ungated();
        let ticket = controller
            .begin_hydrate(FieldName::Mesa, OptionId::from("4501"))
            .unwrap()
            .unwrap();
        controller.apply(ticket, single("4501", ""));
        assert!(controller.field(FieldName::Mesa).unwrap().is_empty());
    }

    #[test]
    fn reverse_fill_reaches_ancestors_opened_by_an_earlier_fill() {
        let mut controller = CascadeController::new(CascadeChain::canonical());
        assert!(!controller.is_field_applicable(FieldName::Seccion));

        let ticket = lookup_ticket(controller.begin_input(FieldName::Mesa, "45").unwrap());
        let follow_ups = controller.apply(ticket, single("4501", "Mesa 45")).follow_ups();
        assert_eq!(follow_ups.len(), 1);
        assert_eq!(follow_ups[0].field, FieldName::Distrito);

        let distrito = follow_ups.into_iter().next().unwrap();
        let follow_ups = controller.apply(distrito, single("2", "Buenos Aires")).follow_ups();
        assert!(controller.is_field_applicable(FieldName::Seccion));
        let fields: Vec<FieldName> = follow_ups.iter().map(|ticket| ticket.field).collect();
        assert_eq!(fields, vec![FieldName::Seccion, FieldName::Circuito]);
        for ticket in &follow_ups {
            assert_eq!(
                ticket.purpose,
                LookupPurpose::AutoFill(AutoFill::Reverse { from: FieldName::Mesa })
            );
            assert_eq!(ticket.request.forward.get("mesa"), Some("4501"));
            assert_eq!(ticket.request.forward.get("desdeMesa"), Some("1"));
        }

        let mut replies = vec![single("3", "Sección 3"), single("7", "Circuito 7")].into_iter();
        for ticket in follow_ups {
            let reply = replies.next().unwrap();
            assert_eq!(controller.apply(ticket, reply).follow_ups(), Vec::new());
        }
        for name in FieldName::ALL {
            assert!(controller.field(name).unwrap().is_resolved(), "{name} unresolved");
        }
    }
}
