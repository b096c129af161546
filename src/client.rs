use serde_json::Value;
use std::fmt;
use tracing::{debug, warn};

use crate::error::TransportError;

pub const DEFAULT_API_BASE: &str = "https://api.hh.ru";

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Endpoint {
    Employers,
    Vacancies,
}

impl Endpoint {
    pub fn path(&self) -> &'static str {
        match self {
            Endpoint::Employers => "/employers",
            Endpoint::Vacancies => "/vacancies",
        }
    }
}

impl fmt::Display for Endpoint {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.path().trim_start_matches('/'))
    }
}

// --- Source trait ---

/// Something that can hand back one page of raw listing items.
pub trait ListingSource: Sync {
    fn fetch_page(
        &self,
        endpoint: Endpoint,
        params: &[(&'static str, String)],
    ) -> Result<Vec<Value>, TransportError>;
}

// --- hh.ru client ---

#[derive(Debug, Clone)]
pub struct HhClient {
    base_url: String,
    client: reqwest::blocking::Client,
}

impl HhClient {
    pub fn new(base_url: &str, user_agent: &str) -> reqwest::Result<Self> {
        let client = reqwest::blocking::Client::builder()
            .user_agent(user_agent)
            .build()?;
        Ok(Self {
            base_url: base_url.trim_end_matches('/').to_string(),
            client,
        })
    }

    pub fn endpoint_url(&self, endpoint: Endpoint) -> String {
        format!("{}{}", self.base_url, endpoint.path())
    }
}

impl ListingSource for HhClient {
    fn fetch_page(
        &self,
        endpoint: Endpoint,
        params: &[(&'static str, String)],
    ) -> Result<Vec<Value>, TransportError> {
        let url = self.endpoint_url(endpoint);
        debug!(%url, ?params, "fetching page");

        let response = self
            .client
            .get(&url)
            .query(params)
            .send()
            .map_err(|source| TransportError::Request { endpoint, source })?;

        let status = response.status();
        if !status.is_success() {
            return Err(TransportError::Status {
                endpoint,
                status: status.as_u16(),
            });
        }

        let body = response
            .text()
            .map_err(|source| TransportError::Request { endpoint, source })?;

        Ok(items_from_body(endpoint, &body))
    }
}

/// Parses a response body and pulls out its `items`. Anything unparseable
/// counts as an empty page.
pub fn items_from_body(endpoint: Endpoint, body: &str) -> Vec<Value> {
    match serde_json::from_str::<Value>(body) {
        Ok(envelope) => items_from_envelope(endpoint, envelope),
        Err(e) => {
            warn!(%endpoint, error = %e, "response body is not JSON, treating as empty page");
            Vec::new()
        }
    }
}

pub fn items_from_envelope(endpoint: Endpoint, envelope: Value) -> Vec<Value> {
    let Value::Object(mut map) = envelope else {
        warn!(%endpoint, "response envelope is not an object, treating as empty page");
        return Vec::new();
    };

    match map.remove("items") {
        Some(Value::Array(items)) => items,
        Some(_) => {
            warn!(%endpoint, "response 'items' is not an array, treating as empty page");
            Vec::new()
        }
        None => {
            warn!(%endpoint, "response has no 'items', treating as empty page");
            Vec::new()
        }
    }
}
