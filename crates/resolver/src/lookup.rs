use async_trait::async_trait;
use cascade_protocol::{ForwardContext, LookupRequest};
use std::sync::Arc;

use crate::error::LookupError;
use crate::field::FieldName;
use crate::option_set::OptionSet;

pub type LookupResult = std::result::Result<OptionSet, LookupError>;

/// External search collaborator.
///
/// Implementations must be idempotent for identical `(field, request)` pairs
/// and must not cache across calls.
#[async_trait]
pub trait LookupService: Send + Sync {
    async fn lookup(&self, field: FieldName, request: &LookupRequest) -> LookupResult;
}

/// Direction of an automatic re-query.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AutoFill {
    /// An ancestor resolved; try to settle an empty descendant
    Forward,
    /// A descendant resolved; try to settle an empty ancestor
    Reverse { from: FieldName },
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum LookupPurpose {
    UserInput { raw_input: String },
    AutoFill(AutoFill),
    Hydrate,
}

/// One issued lookup. Must be handed back to the controller together with
/// its result; tickets that are no longer the latest for their field are
/// discarded there.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LookupTicket {
    pub field: FieldName,
    pub seq: u64,
    pub epoch: u64,
    pub purpose: LookupPurpose,
    pub request: LookupRequest,
}

#[derive(Clone)]
pub struct LookupClient {
    service: Arc<dyn LookupService>,
}

impl LookupClient {
    pub fn new(service: Arc<dyn LookupService>) -> Self {
        Self { service }
    }

    pub fn from_service(service: impl LookupService + 'static) -> Self {
        Self::new(Arc::new(service))
    }

    /// Free-text lookup constrained by `forwarded`.
    pub async fn lookup(
        &self,
        field: FieldName,
        query: &str,
        forwarded: &ForwardContext,
    ) -> LookupResult {
        let request = if query.is_empty() {
            LookupRequest::infer(forwarded.clone())
        } else {
            LookupRequest::query(query, forwarded.clone())
        };
        self.send(field, &request).await
    }

    pub async fn execute(&self, ticket: &LookupTicket) -> LookupResult {
        self.send(ticket.field, &ticket.request).await
    }

    async fn send(&self, field: FieldName, request: &LookupRequest) -> LookupResult {
        let rendered = request.canonical().unwrap_or_default();
        log::debug!("Lookup {field}: {rendered}");

        match self.service.lookup(field, request).await {
            Ok(options) => {
                log::debug!("Lookup {field} returned {} option(s)", options.len());
                Ok(options)
            }
            Err(err) => {
                log::warn!("Lookup {field} failed ({rendered}): {err}");
                Err(err)
            }
        }
    }
}

impl std::fmt::Debug for LookupClient {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("LookupClient").finish_non_exhaustive()
    }
}
