use std::io;

use thiserror::Error;

/// Errors that abort an ingestion run.
#[derive(Debug, Error)]
pub enum ReelError {
    #[error("configuration error: {0}")]
    Config(String),
    #[error("cannot read candidate list {path}: {source}")]
    CandidateList {
        path: String,
        #[source]
        source: io::Error,
    },
    #[error("IO error: {0}")]
    Io(#[from] io::Error),
    #[error("storage error: {0}")]
    Storage(#[from] rusqlite::Error),
    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),
}

/// A failed catalog request. Callers log it and treat the result as empty.
#[derive(Debug, Error)]
pub enum CatalogError {
    #[error("request to {url} failed: {source}")]
    Transport {
        url: String,
        #[source]
        source: reqwest::Error,
    },
    #[error("{url} responded with {status}")]
    Status {
        url: String,
        status: reqwest::StatusCode,
    },
    #[error("could not decode response from {url}: {source}")]
    Decode {
        url: String,
        #[source]
        source: reqwest::Error,
    },
}

/// A record that cannot become a row. The record is skipped, never partially stored.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum DataError {
    #[error("{entity} {id} is missing `{field}`")]
    MissingField {
        entity: &'static str,
        id: u64,
        field: &'static str,
    },
    #[error("{entity} {id} has an invalid `{field}`: {value:?}")]
    InvalidDate {
        entity: &'static str,
        id: u64,
        field: &'static str,
        value: String,
    },
    #[error("invalid id {value:?}")]
    InvalidId { value: String },
}
