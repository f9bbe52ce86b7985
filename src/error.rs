//! Error taxonomy for the tracking pipeline.
//!
//! Transport and RPC failures abandon a single page fetch or mint, parse
//! failures a single event or store file, and store write failures a single
//! cycle. None of them is fatal to a polling loop.

use std::path::PathBuf;
use thiserror::Error;

pub type TrackerResult<T> = Result<T, TrackerError>;

#[derive(Debug, Error)]
pub enum TrackerError {
    /// Network or endpoint failure
    #[error("transport error: {0}")]
    Transport(#[from] reqwest::Error),

    /// The endpoint answered with a JSON-RPC error or without a result
    #[error("rpc error: {0}")]
    Rpc(String),

    /// Malformed payload or store content
    #[error("parse error in {context}: {source}")]
    Parse {
        context: String,
        #[source]
        source: serde_json::Error,
    },

    #[error("failed to read store {path}: {source}")]
    StoreRead {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("failed to write store {path}: {source}")]
    StoreWrite {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("invalid configuration: {0}")]
    Config(String),
}

impl TrackerError {
    pub fn parse(context: impl Into<String>, source: serde_json::Error) -> Self {
        TrackerError::Parse {
            context: context.into(),
            source,
        }
    }

    /// Whether the failure came from talking to an upstream endpoint.
    pub fn is_transport(&self) -> bool {
        matches!(self, TrackerError::Transport(_) | TrackerError::Rpc(_))
    }
}
