//! Canned lookup responses for offline sessions and tests.
//!
//! Entries are keyed by field and the canonical rendering of the request, so
//! the same `(field, query, forward)` triple always gets the same answer.
//! Requests without an entry answer with zero matches.

use async_trait::async_trait;
use cascade_protocol::{ForwardContext, LookupOption, LookupRequest, OptionId};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::path::Path;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Mutex;
use std::time::Duration;

use crate::error::{millis, CascadeError, LookupError, Result};
use crate::field::FieldName;
use crate::lookup::{LookupResult, LookupService};
use crate::option_set::OptionSet;

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FixtureEntry {
    pub field: FieldName,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub q: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub ident: Option<OptionId>,
    #[serde(default)]
    pub forward: ForwardContext,
    #[serde(default)]
    pub results: Vec<LookupOption>,
    /// Simulated response delay
    #[serde(default)]
    pub latency_ms: u64,
    /// Answer with a transport error instead of results
    #[serde(default)]
    pub fail: bool,
}

impl FixtureEntry {
    pub fn request(&self) -> LookupRequest {
        if let Some(id) = &self.ident {
            return LookupRequest::ident(id.clone());
        }
        match &self.q {
            Some(q) if !q.is_empty() => LookupRequest::query(q.clone(), self.forward.clone()),
            _ => LookupRequest::infer(self.forward.clone()),
        }
    }
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct FixtureFile {
    #[serde(default)]
    pub fixtures: Vec<FixtureEntry>,
}

#[derive(Debug, Default)]
pub struct FixtureLookupService {
    entries: HashMap<(FieldName, String), FixtureEntry>,
    calls: AtomicUsize,
    requests: Mutex<Vec<(FieldName, String)>>,
}

impl FixtureLookupService {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn from_entries(entries: Vec<FixtureEntry>) -> Result<Self> {
        let mut service = Self::new();
        for entry in entries {
            service.insert(entry)?;
        }
        Ok(service)
    }

    pub fn load(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        log::info!("Loading lookup fixtures from {}", path.display());
        let raw = std::fs::read_to_string(path)?;
        let file: FixtureFile = serde_json::from_str(&raw)?;
        Self::from_entries(file.fixtures)
    }

    pub fn insert(&mut self, entry: FixtureEntry) -> Result<()> {
        let key = entry
            .request()
            .canonical()
            .map_err(|e| CascadeError::invalid_config(e.to_string()))?;
        self.entries.insert((entry.field, key), entry);
        Ok(())
    }

    /// Register `results` for `request` on `field`.
    pub fn respond(self, field: FieldName, request: LookupRequest, results: Vec<LookupOption>) -> Self {
        self.respond_after(field, request, results, Duration::ZERO)
    }

    pub fn respond_after(
        mut self,
        field: FieldName,
        request: LookupRequest,
        results: Vec<LookupOption>,
        latency: Duration,
    ) -> Self {
        let entry = entry_for(field, request, results, millis(latency), false);
        if let Err(err) = self.insert(entry) {
            log::warn!("Skipping fixture for {field}: {err}");
        }
        self
    }

    pub fn fail(mut self, field: FieldName, request: LookupRequest) -> Self {
        let entry = entry_for(field, request, Vec::new(), 0, true);
        if let Err(err) = self.insert(entry) {
            log::warn!("Skipping fixture for {field}: {err}");
        }
        self
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Number of lookups served so far.
    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }

    /// Served requests, in arrival order.
    pub fn requests(&self) -> Vec<(FieldName, String)> {
        self.requests
            .lock()
            .map(|log| log.clone())
            .unwrap_or_default()
    }
}

fn entry_for(
    field: FieldName,
    request: LookupRequest,
    results: Vec<LookupOption>,
    latency_ms: u64,
    fail: bool,
) -> FixtureEntry {
    let (q, ident) = match request.kind {
        cascade_protocol::LookupKind::Query { q } => (Some(q), None),
        cascade_protocol::LookupKind::Infer => (None, None),
        cascade_protocol::LookupKind::Ident { id } => (None, Some(id)),
    };
    FixtureEntry {
        field,
        q,
        ident,
        forward: request.forward,
        results,
        latency_ms,
        fail,
    }
}

#[async_trait]
impl LookupService for FixtureLookupService {
    async fn lookup(&self, field: FieldName, request: &LookupRequest) -> LookupResult {
        let key = request
            .canonical()
            .map_err(|e| LookupError::decode(e.to_string()))?;
        self.calls.fetch_add(1, Ordering::SeqCst);
        if let Ok(mut log) = self.requests.lock() {
            log.push((field, key.clone()));
        }

        let Some(entry) = self.entries.get(&(field, key)) else {
            return Ok(OptionSet::empty());
        };

        if entry.latency_ms > 0 {
            tokio::time::sleep(Duration::from_millis(entry.latency_ms)).await;
        }
        if entry.fail {
            return Err(LookupError::transport("fixture marked as failing"));
        }
        Ok(OptionSet::new(entry.results.clone()))
    }
}
