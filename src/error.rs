//! Typed errors for the ingestion pipeline and external providers.
//!
//! Ingestion failures carry the natural key of the offending record so a
//! failed batch run names exactly what broke. Provider errors distinguish an
//! explicit error payload from an empty response, which callers (backfill,
//! retrieval, the HTTP server) treat differently from transport failures.

use thiserror::Error;

/// Failure to obtain a CSV feed, either over HTTP or from a local file.
// Implemented by hand because `source` here is the feed location, not an
// error source, and thiserror's derive insists on treating it as one.
#[derive(Debug)]
pub struct FetchError {
    pub feed: String,
    pub source: String,
    pub reason: String,
}

impl std::fmt::Display for FetchError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(
            f,
            "failed to fetch {} feed from {}: {}",
            self.feed, self.source, self.reason
        )
    }
}

impl std::error::Error for FetchError {}

/// A natural-key upsert that could not be completed.
#[derive(Debug, Error)]
pub enum ResolveError {
    /// A food-item token that must not reach the database: empty after
    /// trimming, or 32 characters and longer.
    #[error("invalid food item token: {0:?}")]
    InvalidFood(String),

    /// The record references a truck name with no row in the trucks table.
    /// Only possible when a schedules-feed record names a truck absent from
    /// the trucks feed.
    #[error("unknown truck: {0:?}")]
    UnknownTruck(String),

    /// A constraint violation or other storage failure, tagged with the
    /// entity kind and the natural key of the record being written.
    #[error("failed to upsert {kind} {key:?}: {source}")]
    Storage {
        kind: &'static str,
        key: String,
        #[source]
        source: sqlx::Error,
    },
}

impl ResolveError {
    pub(crate) fn storage(
        kind: &'static str,
        key: impl Into<String>,
    ) -> impl FnOnce(sqlx::Error) -> Self {
        let key = key.into();
        move |source| ResolveError::Storage { kind, key, source }
    }
}

/// Failure from the embedding or chat-completion provider.
#[derive(Debug, Error)]
pub enum ProviderError {
    /// The provider answered with an explicit error payload.
    #[error("provider error {code}: {message}")]
    Api { code: String, message: String },

    /// The provider answered successfully but returned zero vectors or zero
    /// chat choices.
    #[error("provider returned an empty result")]
    Empty,

    /// The response body did not have the expected shape.
    #[error("malformed provider response: {0}")]
    Malformed(String),

    /// Network failure, timeout, or non-retryable HTTP status.
    #[error("provider request failed: {0}")]
    Transport(String),
}

impl From<reqwest::Error> for ProviderError {
    fn from(e: reqwest::Error) -> Self {
        ProviderError::Transport(e.to_string())
    }
}
