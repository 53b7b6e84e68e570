use std::path::PathBuf;

use thiserror::Error;

/// Failure that ends a download session. Chunk-level problems never surface
/// here; they are folded into the progress bitmap as incomplete chunks.
#[derive(Error, Debug)]
pub enum DownloadError {
    #[error("server does not support range request (probe returned HTTP {status})")]
    UnsupportedRange { status: u16 },

    #[error("max retry reached after {retries} retries\ntry again later or refresh download url")]
    MaxRetryExceeded { retries: u32 },

    #[error("checkpoint {path}: {source}")]
    Checkpoint {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("checkpoint holds {found} chunks but the current plan needs {expected}")]
    CheckpointMismatch { expected: usize, found: usize },

    #[error("server responded with HTTP {status}")]
    Status { status: u16 },

    #[error("file already exists: {path}")]
    FileExists { path: PathBuf },

    #[error(transparent)]
    Transport(#[from] TransportError),

    #[error(transparent)]
    Config(#[from] ConfigError),

    #[error(transparent)]
    Io(#[from] std::io::Error),
}

impl DownloadError {
    pub(crate) fn checkpoint(path: impl Into<PathBuf>, source: std::io::Error) -> Self {
        DownloadError::Checkpoint {
            path: path.into(),
            source,
        }
    }
}

/// Error scoped to a single chunk fetch.
#[derive(Error, Debug)]
pub enum ChunkError {
    #[error(transparent)]
    Transport(#[from] TransportError),

    #[error("unexpected HTTP {0} for ranged request")]
    Status(u16),

    #[error("io: {0}")]
    Io(#[from] std::io::Error),

    #[error("truncated body: expected {expected} bytes, got {received}")]
    Truncated { expected: u64, received: u64 },
}

#[derive(Error, Debug)]
pub enum TransportError {
    #[error("request failed: {0}")]
    Request(#[from] reqwest::Error),

    #[error("cookie file {path}: {source}")]
    Cookies {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("invalid header {0}")]
    Header(String),

    #[error("{0}")]
    Other(String),
}

#[derive(Error, Debug, PartialEq, Eq)]
pub enum ConfigError {
    #[error("thread must be between 1 and {max}, got {got}")]
    Threads { got: usize, max: usize },

    #[error("chunk size must be at least {min} bytes, got {got}")]
    ChunkSize { got: u64, min: u64 },

    #[error("only http, https and socks5 proxy are supported, got {0}")]
    ProxyScheme(String),

    #[error("invalid proxy url: {0}")]
    ProxyUrl(String),
}

pub type Result<T, E = DownloadError> = std::result::Result<T, E>;
