//! Resumable, concurrent chunked downloads over HTTP range requests.
//!
//! A resource is split into fixed-size chunks ([`plan`]), fetched by a
//! bounded pool of tasks ([`engine`]), and tracked in a compressed on-disk
//! bitmap ([`checkpoint`]) so an interrupted transfer picks up where it left
//! off. [`session`] repeats passes until the bitmap is full or the retry
//! budget is spent.

pub mod cancel;
pub mod checkpoint;
pub mod config;
pub mod engine;
pub mod error;
pub mod logging;
pub mod manager;
pub mod plan;
pub mod progress;
pub mod session;
pub mod single;
pub mod state;
pub mod transport;
pub mod utils;

pub use crate::config::{ClientConfig, Descriptor, RetryLimit, Setting};
pub use crate::error::{ChunkError, ConfigError, DownloadError, TransportError};
pub use crate::session::{Outcome, Session};
pub use crate::state::{ProgressState, SharedProgress};
pub use crate::transport::{ReqwestTransport, Transport};
