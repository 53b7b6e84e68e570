use std::path::PathBuf;
use std::time::Duration;

use crate::checkpoint;
use crate::error::ConfigError;

pub const DEFAULT_CHUNK_SIZE: u64 = 1024 * 1024;
pub const MIN_CLI_CHUNK_SIZE: u64 = 1024 * 1024;
pub const DEFAULT_THREADS: usize = 4;
pub const MAX_THREADS: usize = 16;
pub const DEFAULT_MAX_RETRY: i64 = 3;
/// A pass stops launching chunks once its failure tally exceeds `threads * FAILURE_FACTOR`.
pub const FAILURE_FACTOR: usize = 5;
pub const DEFAULT_USER_AGENT: &str = concat!("rangedl/", env!("CARGO_PKG_VERSION"));

/// What is being downloaded and where. Fixed once discovery has run.
#[derive(Debug, Clone)]
pub struct Descriptor {
    /// Final URL after redirects.
    pub url: String,
    pub path: PathBuf,
    pub headers: Vec<(String, String)>,
    pub total_size: u64,
}

impl Descriptor {
    pub fn checkpoint_path(&self) -> PathBuf {
        checkpoint::checkpoint_path(&self.path)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RetryLimit {
    Limited(u32),
    Unlimited,
}

impl RetryLimit {
    /// Maps the command-line convention: any negative value means unlimited.
    pub fn from_flag(value: i64) -> Self {
        if value < 0 {
            RetryLimit::Unlimited
        } else {
            RetryLimit::Limited(value.min(u32::MAX as i64) as u32)
        }
    }
}

/// Tuning for a ranged session.
#[derive(Debug, Clone)]
pub struct Setting {
    pub chunk_size: u64,
    pub threads: usize,
    pub max_retry: RetryLimit,
    /// Replace an existing destination (and its checkpoint) instead of failing or resuming.
    pub force: bool,
    pub checkpoint_interval: Duration,
    pub render_interval: Duration,
    /// How long an interrupted pass waits for in-flight chunks before giving up on them.
    pub grace_period: Duration,
}

impl Default for Setting {
    fn default() -> Self {
        Self {
            chunk_size: DEFAULT_CHUNK_SIZE,
            threads: DEFAULT_THREADS,
            max_retry: RetryLimit::from_flag(DEFAULT_MAX_RETRY),
            force: false,
            checkpoint_interval: Duration::from_secs(10),
            render_interval: Duration::from_secs(1),
            grace_period: Duration::from_secs(1),
        }
    }
}

impl Setting {
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.threads == 0 || self.threads > MAX_THREADS {
            return Err(ConfigError::Threads {
                got: self.threads,
                max: MAX_THREADS,
            });
        }
        if self.chunk_size == 0 {
            return Err(ConfigError::ChunkSize {
                got: self.chunk_size,
                min: 1,
            });
        }
        Ok(())
    }

    pub fn failure_ceiling(&self) -> usize {
        self.threads * FAILURE_FACTOR
    }
}

/// HTTP client configuration, built once per session and handed to the transport.
#[derive(Debug, Clone)]
pub struct ClientConfig {
    pub user_agent: String,
    /// `http://`, `https://` or `socks5://` proxy URL.
    pub proxy: Option<String>,
    /// Netscape-format cookies file.
    pub cookies_file: Option<PathBuf>,
    pub http1_only: bool,
}

impl Default for ClientConfig {
    fn default() -> Self {
        Self {
            user_agent: DEFAULT_USER_AGENT.to_string(),
            proxy: None,
            cookies_file: None,
            http1_only: false,
        }
    }
}
