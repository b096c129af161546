use std::fmt;

use thiserror::Error;

use crate::client::Endpoint;

/// A page fetch that did not produce a response body.
#[derive(Debug, Error)]
pub enum TransportError {
    #[error("{endpoint} responded with status {status}")]
    Status { endpoint: Endpoint, status: u16 },

    #[error("request to {endpoint} failed: {source}")]
    Request {
        endpoint: Endpoint,
        #[source]
        source: reqwest::Error,
    },
}

impl TransportError {
    pub fn status(&self) -> Option<u16> {
        match self {
            TransportError::Status { status, .. } => Some(*status),
            TransportError::Request { source, .. } => source.status().map(|s| s.as_u16()),
        }
    }
}

/// A raw record missing a required field, or carrying one of the wrong shape.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("malformed {entity} record: {reason}")]
pub struct SchemaError {
    pub entity: &'static str,
    pub reason: String,
}

impl SchemaError {
    pub fn company(reason: impl Into<String>) -> Self {
        Self {
            entity: "company",
            reason: reason.into(),
        }
    }

    pub fn vacancy(reason: impl Into<String>) -> Self {
        Self {
            entity: "vacancy",
            reason: reason.into(),
        }
    }
}

/// A vacancy that was not stored because its company is unknown to the store.
///
/// This is a value, not an error: the persistence layer returns it in place of
/// an insert and the caller decides what to do with it.
#[derive(Debug, Clone, PartialEq, Eq, serde::Serialize)]
pub struct IntegrityViolation {
    pub company_external_id: i64,
    pub url: String,
}

impl fmt::Display for IntegrityViolation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "company {} is not in the store, skipped vacancy {}",
            self.company_external_id, self.url
        )
    }
}

#[derive(Debug, Error)]
pub enum StoreError {
    #[error("database pool error: {0}")]
    Pool(#[from] r2d2::Error),

    #[error("database error: {0}")]
    Sqlite(#[from] rusqlite::Error),

    #[error("failed to prepare database directory: {0}")]
    Io(#[from] std::io::Error),

    #[error("database not initialized. Run 'hh-harvest init' first.")]
    NotInitialized,
}

#[derive(Debug, Error)]
pub enum IngestError {
    #[error(transparent)]
    Transport(#[from] TransportError),

    #[error(transparent)]
    Schema(#[from] SchemaError),

    #[error(transparent)]
    Store(#[from] StoreError),
}
