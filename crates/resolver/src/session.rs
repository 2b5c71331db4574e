//! Event-driven cascade session.
//!
//! A background task owns the [`CascadeController`], debounces keystrokes per
//! field, runs lookups concurrently and applies their results in completion
//! order. The controller's sequence numbers decide which results still
//! count, so a slow answer to an old query never overwrites a newer one.

use cascade_protocol::OptionId;
use std::collections::HashMap;
use std::time::Duration;
use tokio::sync::{mpsc, watch};
use tokio::task::{JoinHandle, JoinSet};
use tokio::time::{self, Instant};

use crate::controller::{CascadeController, CascadeSnapshot, InputOutcome};
use crate::error::{CascadeError, Result};
use crate::field::FieldName;
use crate::lookup::{LookupClient, LookupResult, LookupTicket};

const EVENT_BUFFER: usize = 64;

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum FormEvent {
    /// Keystroke-level input; looked up once the field has been quiet for
    /// the debounce period
    Input { field: FieldName, text: String },
    /// Change/blur: look up pending input for the field right away
    Commit { field: FieldName },
    /// Load a stored id
    Hydrate { field: FieldName, id: OptionId },
    Reset,
}

pub struct SessionHandle {
    events: mpsc::Sender<FormEvent>,
    snapshots: watch::Receiver<CascadeSnapshot>,
    task: JoinHandle<CascadeController>,
}

impl SessionHandle {
    pub async fn send(&self, event: FormEvent) -> Result<()> {
        self.events
            .send(event)
            .await
            .map_err(|_| CascadeError::SessionClosed)
    }

    pub async fn input(&self, field: FieldName, text: impl Into<String>) -> Result<()> {
        self.send(FormEvent::Input {
            field,
            text: text.into(),
        })
        .await
    }

    pub async fn commit(&self, field: FieldName) -> Result<()> {
        self.send(FormEvent::Commit { field }).await
    }

    pub async fn hydrate(&self, field: FieldName, id: OptionId) -> Result<()> {
        self.send(FormEvent::Hydrate { field, id }).await
    }

    pub async fn reset(&self) -> Result<()> {
        self.send(FormEvent::Reset).await
    }

    /// Latest published state of the form.
    pub fn snapshot(&self) -> CascadeSnapshot {
        self.snapshots.borrow().clone()
    }

    pub fn subscribe(&self) -> watch::Receiver<CascadeSnapshot> {
        self.snapshots.clone()
    }

    /// Stop accepting events, finish pending input and in-flight lookups and
    /// hand the controller back.
    pub async fn close(self) -> Result<CascadeController> {
        drop(self.events);
        self.task
            .await
            .map_err(|e| CascadeError::SessionFailed(e.to_string()))
    }
}

/// Start a session task on the current tokio runtime.
pub fn spawn(controller: CascadeController, client: LookupClient, debounce: Duration) -> SessionHandle {
    let (events_tx, events_rx) = mpsc::channel(EVENT_BUFFER);
    let (snapshot_tx, snapshot_rx) = watch::channel(controller.snapshot());
    let task = tokio::spawn(run_session(controller, client, debounce, events_rx, snapshot_tx));
    SessionHandle {
        events: events_tx,
        snapshots: snapshot_rx,
        task,
    }
}

type InFlight = JoinSet<(LookupTicket, LookupResult)>;

struct SessionLoop {
    controller: CascadeController,
    client: LookupClient,
    debounce: Duration,
    pending: HashMap<FieldName, (String, Instant)>,
    in_flight: InFlight,
}

async fn run_session(
    controller: CascadeController,
    client: LookupClient,
    debounce: Duration,
    mut events: mpsc::Receiver<FormEvent>,
    snapshots: watch::Sender<CascadeSnapshot>,
) -> CascadeController {
    let mut session = SessionLoop {
        controller,
        client,
        debounce,
        pending: HashMap::new(),
        in_flight: JoinSet::new(),
    };

    loop {
        let next_deadline = session.next_deadline();

        tokio::select! {
            event = events.recv() => match event {
                Some(event) => session.handle_event(event),
                None => break,
            },
            () = async {
                if let Some(deadline) = next_deadline {
                    time::sleep_until(deadline).await;
                }
            }, if next_deadline.is_some() => {
                session.flush_due(Instant::now());
            }
            Some(joined) = session.in_flight.join_next(), if !session.in_flight.is_empty() => {
                session.handle_joined(joined);
            }
        }

        snapshots.send_replace(session.controller.snapshot());
    }

    log::debug!(
        "Session closing with {} pending input(s) and {} lookup(s) in flight",
        session.pending.len(),
        session.in_flight.len()
    );
    session.flush_all();
    while let Some(joined) = session.in_flight.join_next().await {
        session.handle_joined(joined);
    }
    snapshots.send_replace(session.controller.snapshot());
    session.controller
}

impl SessionLoop {
    fn next_deadline(&self) -> Option<Instant> {
        self.pending.values().map(|(_, deadline)| *deadline).min()
    }

    fn handle_event(&mut self, event: FormEvent) {
        match event {
            FormEvent::Input { field, text } => {
                let deadline = Instant::now() + self.debounce;
                self.pending.insert(field, (text, deadline));
            }
            FormEvent::Commit { field } => {
                if let Some((text, _)) = self.pending.remove(&field) {
                    self.start_input(field, &text);
                }
            }
            FormEvent::Hydrate { field, id } => {
                self.pending.remove(&field);
                match self.controller.begin_hydrate(field, id) {
                    Ok(ticket) => self.spawn_lookups(ticket.into_iter().collect()),
                    Err(err) => log::warn!("Cannot hydrate {field}: {err}"),
                }
            }
            FormEvent::Reset => {
                self.pending.clear();
                self.in_flight.abort_all();
                self.controller.reset_form();
            }
        }
    }

    /// Issue lookups for every field whose quiet period is over, in chain
    /// order.
    fn flush_due(&mut self, now: Instant) {
        let due: Vec<FieldName> = self
            .controller
            .chain()
            .names()
            .filter(|name| {
                self.pending
                    .get(name)
                    .is_some_and(|(_, deadline)| *deadline <= now)
            })
            .collect();
        for field in due {
            if let Some((text, _)) = self.pending.remove(&field) {
                self.start_input(field, &text);
            }
        }
    }

    fn flush_all(&mut self) {
        let fields: Vec<FieldName> = self.controller.chain().names().collect();
        for field in fields {
            if let Some((text, _)) = self.pending.remove(&field) {
                self.start_input(field, &text);
            }
        }
    }

    fn start_input(&mut self, field: FieldName, text: &str) {
        match self.controller.begin_input(field, text) {
            Ok(InputOutcome::Lookup(ticket)) => self.spawn_lookups(vec![ticket]),
            Ok(InputOutcome::Settled { follow_ups }) => self.spawn_lookups(follow_ups),
            Ok(InputOutcome::Ignored) => {}
            Err(err) => log::warn!("Rejected input for {field}: {err}"),
        }
    }

    fn spawn_lookups(&mut self, tickets: Vec<LookupTicket>) {
        for ticket in tickets {
            let client = self.client.clone();
            self.in_flight.spawn(async move {
                let result = client.execute(&ticket).await;
                (ticket, result)
            });
        }
    }

    fn handle_joined(&mut self, joined: std::result::Result<(LookupTicket, LookupResult), tokio::task::JoinError>) {
        match joined {
            Ok((ticket, result)) => {
                let follow_ups = self.controller.apply(ticket, result).follow_ups();
                self.spawn_lookups(follow_ups);
            }
            Err(err) if err.is_cancelled() => {}
            Err(err) => log::warn!("Lookup task failed: {err}"),
        }
    }
}
