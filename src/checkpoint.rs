//! On-disk checkpoint: zlib-compressed JSON of the progress bitmap.
//!
//! Written every few seconds during a transfer, so the compressor runs at
//! its fastest level. The file lives next to the destination and is removed
//! once every chunk is complete.

use flate2::read::ZlibDecoder;
use flate2::write::ZlibEncoder;
use flate2::Compression;
use std::io::{Read, Write};
use std::path::{Path, PathBuf};
use std::time::Duration;
use tokio::fs;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tracing::{debug, error};

use crate::error::{DownloadError, Result};
use crate::plan;
use crate::state::{ProgressState, SharedProgress};

pub const CHECKPOINT_SUFFIX: &str = ".rdl";

/// Checkpoint path for a destination file: the destination with `.rdl` appended.
pub fn checkpoint_path(destination: &Path) -> PathBuf {
    let mut name = destination.as_os_str().to_os_string();
    name.push(CHECKPOINT_SUFFIX);
    PathBuf::from(name)
}

/// Loads the checkpoint at `path`, or creates and persists a fresh one.
///
/// A stored checkpoint keeps its own chunk size; its bitmap only makes sense
/// against the plan it was built from. A bitmap whose length disagrees with
/// that plan is rejected, as is any file that fails to decode.
pub async fn load(path: &Path, total_size: u64, chunk_size: u64) -> Result<ProgressState> {
    if !fs::try_exists(path)
        .await
        .map_err(|e| DownloadError::checkpoint(path, e))?
    {
        let state = ProgressState::new(total_size, chunk_size);
        save(&state, path).await?;
        debug!(path = %path.display(), chunks = state.len(), "created checkpoint");
        return Ok(state);
    }

    let raw = fs::read(path)
        .await
        .map_err(|e| DownloadError::checkpoint(path, e))?;
    let state = decode(&raw).map_err(|e| DownloadError::checkpoint(path, e))?;

    if state.chunk_size == 0 {
        return Err(DownloadError::checkpoint(
            path,
            std::io::Error::new(std::io::ErrorKind::InvalidData, "chunk size is zero"),
        ));
    }
    if state.chunk_size != chunk_size {
        tracing::warn!(
            stored = state.chunk_size,
            requested = chunk_size,
            "resuming with the chunk size stored in the checkpoint"
        );
    }
    let expected = plan::chunk_count(total_size, state.chunk_size);
    if state.len() != expected {
        return Err(DownloadError::CheckpointMismatch {
            expected,
            found: state.len(),
        });
    }

    debug!(
        path = %path.display(),
        done = state.completed(),
        chunks = state.len(),
        "loaded checkpoint"
    );
    Ok(state)
}

/// Writes `state` to `path`, replacing any previous checkpoint.
///
/// The bytes land in a sibling temp file first and are renamed over `path`,
/// so a crash mid-write leaves the previous checkpoint intact.
pub async fn save(state: &ProgressState, path: &Path) -> Result<()> {
    let raw = encode(state).map_err(|e| DownloadError::checkpoint(path, e))?;
    let mut tmp = path.as_os_str().to_os_string();
    tmp.push(".tmp");
    let tmp = PathBuf::from(tmp);

    fs::write(&tmp, &raw)
        .await
        .map_err(|e| DownloadError::checkpoint(path, e))?;
    fs::rename(&tmp, path)
        .await
        .map_err(|e| DownloadError::checkpoint(path, e))?;
    Ok(())
}

pub fn is_complete(state: &ProgressState) -> bool {
    state.is_complete()
}

/// Removes the checkpoint after a finished download.
pub async fn delete(path: &Path) -> Result<()> {
    fs::remove_file(path)
        .await
        .map_err(|e| DownloadError::checkpoint(path, e))
}

/// Saves a snapshot of `progress` every `interval` until `stop` fires.
/// Failed saves are logged and retried on the next tick.
pub fn spawn_checkpointer(
    progress: SharedProgress,
    path: PathBuf,
    interval: Duration,
    stop: CancellationToken,
) -> JoinHandle<()> {
    tokio::spawn(async move {
        let mut ticker = tokio::time::interval(interval);
        ticker.tick().await;
        loop {
            tokio::select! {
                _ = ticker.tick() => {
                    let state = progress.snapshot().await;
                    match save(&state, &path).await {
                        Ok(()) => debug!(done = state.completed(), chunks = state.len(), "checkpoint saved"),
                        Err(e) => error!(error = %e, "periodic checkpoint failed"),
                    }
                }
                _ = stop.cancelled() => break,
            }
        }
    })
}

fn encode(state: &ProgressState) -> std::io::Result<Vec<u8>> {
    let json = serde_json::to_vec(state)?;
    let mut encoder = ZlibEncoder::new(Vec::new(), Compression::fast());
    encoder.write_all(&json)?;
    encoder.finish()
}

fn decode(raw: &[u8]) -> std::io::Result<ProgressState> {
    let mut json = Vec::new();
    ZlibDecoder::new(raw).read_to_end(&mut json)?;
    Ok(serde_json::from_slice(&json)?)
}
