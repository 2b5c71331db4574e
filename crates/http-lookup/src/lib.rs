//! HTTP collaborators of the cascade resolver.
//!
//! [`HttpLookupService`] answers field lookups from the per-field search
//! endpoints of a [`CascadeConfig`]; [`HttpOptionSource`] feeds autocomplete
//! pickers from their option-list endpoints.

mod error;

use async_trait::async_trait;
use cascade_protocol::{ListedOption, LookupResponse, OptionId, OptionListResponse};
use cascade_resolver::{
    CascadeConfig, FieldName, LookupError, LookupRequest, LookupResult, LookupService, OptionSet,
    OptionSource,
};
use reqwest::Client;
use std::collections::HashMap;
use std::time::Duration;

pub use error::{HttpLookupError, Result};

fn build_client(timeout: Duration) -> Result<Client> {
    Client::builder()
        .timeout(timeout)
        .user_agent(concat!("mesa-finder/", env!("CARGO_PKG_VERSION")))
        .build()
        .map_err(Into::into)
}

fn map_transport_error(err: reqwest::Error, timeout: Duration) -> LookupError {
    if err.is_timeout() {
        LookupError::timeout(timeout)
    } else if err.is_decode() {
        LookupError::decode(err.to_string())
    } else if let Some(status) = err.status() {
        LookupError::Status {
            status: status.as_u16(),
        }
    } else {
        LookupError::transport(err.to_string())
    }
}

async fn get_json<T: serde::de::DeserializeOwned>(
    client: &Client,
    url: &str,
    query: &[(&str, String)],
    timeout: Duration,
) -> std::result::Result<T, LookupError> {
    let response = client
        .get(url)
        .query(query)
        .send()
        .await
        .map_err(|e| map_transport_error(e, timeout))?;

    let status = response.status();
    if !status.is_success() {
        return Err(LookupError::Status {
            status: status.as_u16(),
        });
    }

    response
        .json::<T>()
        .await
        .map_err(|e| map_transport_error(e, timeout))
}

/// Lookup service backed by the configured search endpoints.
#[derive(Debug, Clone)]
pub struct HttpLookupService {
    client: Client,
    endpoints: HashMap<FieldName, String>,
    timeout: Duration,
}

impl HttpLookupService {
    pub fn new(config: &CascadeConfig) -> Result<Self> {
        config.validate()?;
        let endpoints = config
            .fields
            .iter()
            .filter_map(|field| {
                config
                    .endpoint_url(field.name)
                    .map(|url| (field.name, url))
            })
            .collect();
        let timeout = config.request_timeout();
        Ok(Self {
            client: build_client(timeout)?,
            endpoints,
            timeout,
        })
    }

    pub fn endpoint(&self, field: FieldName) -> Option<&str> {
        self.endpoints.get(&field).map(String::as_str)
    }
}

#[async_trait]
impl LookupService for HttpLookupService {
    async fn lookup(&self, field: FieldName, request: &LookupRequest) -> LookupResult {
        let url = self
            .endpoints
            .get(&field)
            .ok_or_else(|| LookupError::NoEndpoint(field.to_string()))?;
        let query = request
            .query_pairs()
            .map_err(|e| LookupError::decode(e.to_string()))?;

        let response: LookupResponse = get_json(&self.client, url, &query, self.timeout).await?;
        Ok(OptionSet::from(response))
    }
}

/// Option-list source for autocomplete pickers (`?parent_id=`).
#[derive(Debug, Clone)]
pub struct HttpOptionSource {
    client: Client,
    timeout: Duration,
}

impl HttpOptionSource {
    pub fn new(timeout: Duration) -> Result<Self> {
        Ok(Self {
            client: build_client(timeout)?,
            timeout,
        })
    }

    pub fn from_config(config: &CascadeConfig) -> Result<Self> {
        Self::new(config.request_timeout())
    }
}

#[async_trait]
impl OptionSource for HttpOptionSource {
    async fn fetch_options(
        &self,
        url: &str,
        parent_id: Option<&OptionId>,
    ) -> std::result::Result<Vec<ListedOption>, LookupError> {
        let query: Vec<(&str, String)> = parent_id
            .map(|id| vec![("parent_id", id.to_string())])
            .unwrap_or_default();
        log::debug!("Fetching options from {url} ({} filter)", query.len());

        let response: OptionListResponse = get_json(&self.client, url, &query, self.timeout).await?;
        Ok(response.options)
    }
}
