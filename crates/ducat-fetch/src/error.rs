//! Retrieval error taxonomy.

use chrono::NaiveDate;
use thiserror::Error;

/// How a failed attempt counts against a host's circuit breaker.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum FailureKind {
    /// Timeout, connection failure or truncated body.
    Network,
    /// The server answered with a 5xx status other than 503.
    Server,
    /// The provider asked us to slow down (429 or 503).
    RateLimited,
}

/// The outcome of a single failed request attempt.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum AttemptError {
    /// The request did not complete within its timeout.
    #[error("request timed out")]
    Timeout,

    /// The connection could not be established.
    #[error("connection failed: {0}")]
    Connect(String),

    /// The provider returned a rate-limit response.
    #[error("rate limited (HTTP {status})")]
    RateLimited {
        /// HTTP status code.
        status: u16,
    },

    /// The provider returned a server error.
    #[error("server error (HTTP {status})")]
    Server {
        /// HTTP status code.
        status: u16,
    },

    /// The provider rejected the request itself.
    #[error("request rejected (HTTP {status})")]
    Client {
        /// HTTP status code.
        status: u16,
    },

    /// The response body could not be read.
    #[error("failed to read response body: {0}")]
    Body(String),
}

impl AttemptError {
    /// Classifies a non-success, non-404 HTTP status.
    #[must_use]
    pub const fn from_status(status: u16) -> Self {
        match status {
            429 | 503 => Self::RateLimited { status },
            500..=599 => Self::Server { status },
            _ => Self::Client { status },
        }
    }

    /// Returns true if repeating the request may succeed.
    #[must_use]
    pub const fn is_retryable(&self) -> bool {
        !matches!(self, Self::Client { .. })
    }

    /// Returns how this failure counts against the host, or `None` if the
    /// host answered normally and only the request was at fault.
    #[must_use]
    pub const fn failure_kind(&self) -> Option<FailureKind> {
        match self {
            Self::Timeout | Self::Connect(_) | Self::Body(_) => Some(FailureKind::Network),
            Self::Server { .. } => Some(FailureKind::Server),
            Self::RateLimited { .. } => Some(FailureKind::RateLimited),
            Self::Client { .. } => None,
        }
    }
}

/// Terminal failure to retrieve one day unit.
///
/// None of these abort a job on their own; the day is recorded as failed and
/// stays eligible for a later resume.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum FetchError {
    /// Every attempt failed.
    #[error("{day}: gave up after {attempts} attempts: {last}")]
    Exhausted {
        /// The day being fetched.
        day: NaiveDate,
        /// Number of attempts made.
        attempts: u32,
        /// The last attempt's error.
        #[source]
        last: AttemptError,
    },

    /// The host's circuit stayed open for every allowed cooldown wait.
    #[error("circuit for {host} stayed open after {waits} cooldown waits")]
    CircuitOpen {
        /// The host whose circuit is open.
        host: String,
        /// Number of cooldown waits performed.
        waits: u32,
    },

    /// The provider rejected the request and retrying cannot help.
    #[error("{day}: {source}")]
    Rejected {
        /// The day being fetched.
        day: NaiveDate,
        /// The rejection.
        source: AttemptError,
    },

    /// Cancellation was requested before the day completed.
    #[error("cancelled")]
    Cancelled,

    /// A blocking decode task panicked or was aborted.
    #[error("decode task failed: {0}")]
    Worker(String),
}
