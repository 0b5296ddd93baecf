//! Error types
//!
//! One enum per concern. None of these are fatal to the process: they fail a
//! single payment, a single query or a single background poll.

use thiserror::Error;

use crate::models::ProcessorProvider;

/// Failures talking to a downstream payment processor.
#[derive(Error, Debug)]
pub enum ProcessorError {
    #[error("{provider} processor is unavailable")]
    Unavailable { provider: ProcessorProvider },

    #[error("invalid status code {status} from {provider} processor")]
    InvalidStatusCode {
        provider: ProcessorProvider,
        status: u16,
    },

    #[error("request to {provider} processor timed out")]
    Timeout { provider: ProcessorProvider },

    #[error("request to {provider} processor failed: {source}")]
    Transport {
        provider: ProcessorProvider,
        #[source]
        source: reqwest::Error,
    },

    #[error("unreadable response from {provider} processor: {source}")]
    Decode {
        provider: ProcessorProvider,
        #[source]
        source: reqwest::Error,
    },
}

impl ProcessorError {
    /// Maps a reqwest failure, keeping timeouts distinguishable.
    pub fn from_reqwest(provider: ProcessorProvider, source: reqwest::Error) -> Self {
        if source.is_timeout() {
            Self::Timeout { provider }
        } else if source.is_decode() {
            Self::Decode { provider, source }
        } else {
            Self::Transport { provider, source }
        }
    }

    pub fn provider(&self) -> ProcessorProvider {
        match self {
            Self::Unavailable { provider }
            | Self::InvalidStatusCode { provider, .. }
            | Self::Timeout { provider }
            | Self::Transport { provider, .. }
            | Self::Decode { provider, .. } => *provider,
        }
    }

    /// HTTP status returned by the processor, when it answered at all.
    pub fn status(&self) -> Option<u16> {
        match self {
            Self::InvalidStatusCode { status, .. } => Some(*status),
            _ => None,
        }
    }
}

#[derive(Error, Debug)]
pub enum StorageError {
    #[error("redis error: {0}")]
    Redis(#[from] redis::RedisError),

    #[error("serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error("partition scan aborted: {0}")]
    ScanAborted(#[from] tokio::task::JoinError),
}

#[derive(Error, Debug, PartialEq, Eq)]
pub enum ValidationError {
    #[error("correlationId is required")]
    MissingCorrelationId,

    #[error("amount must be greater than 0")]
    NonPositiveAmount,
}

#[derive(Error, Debug, PartialEq, Eq)]
pub enum WorkerPoolError {
    #[error("worker pool is closed")]
    Closed,
}

#[derive(Error, Debug, PartialEq, Eq)]
pub enum ConfigError {
    #[error("invalid value for {key}: {value:?}")]
    Invalid { key: &'static str, value: String },

    #[error("timeouts must satisfy payment < summary < health")]
    TimeoutOrdering,
}
