//! Session retry controller: repeated engine passes until the bitmap is full,
//! the retry budget runs out, or the session is cancelled.

use std::path::{Path, PathBuf};
use std::sync::Arc;
use tokio::fs::OpenOptions;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

use crate::cancel;
use crate::checkpoint;
use crate::config::{Descriptor, RetryLimit, Setting};
use crate::engine::{Engine, PassReport};
use crate::error::{DownloadError, Result};
use crate::progress::{self, Reporter};
use crate::state::SharedProgress;
use crate::transport::Transport;

/// How a session ended when it did not fail.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Outcome {
    /// Every chunk is on disk and the checkpoint has been removed.
    Completed,
    /// Interrupted; the checkpoint reflects every chunk finished so far.
    Cancelled,
}

pub struct Session<T: Transport> {
    transport: Arc<T>,
    descriptor: Arc<Descriptor>,
    setting: Setting,
    cancel: CancellationToken,
    checkpoint: PathBuf,
}

impl<T: Transport> Session<T> {
    pub fn new(
        transport: Arc<T>,
        descriptor: Descriptor,
        setting: Setting,
        cancel: CancellationToken,
    ) -> Self {
        let checkpoint = descriptor.checkpoint_path();
        Self {
            transport,
            descriptor: Arc::new(descriptor),
            setting,
            cancel,
            checkpoint,
        }
    }

    pub fn checkpoint_path(&self) -> &Path {
        &self.checkpoint
    }

    /// Asks for `bytes=0-<size>`; only `206 Partial Content` counts as range support.
    pub async fn probe(&self) -> Result<()> {
        let range = format!("bytes=0-{}", self.descriptor.total_size);
        let response = self
            .transport
            .get(
                &self.descriptor.url,
                &self.descriptor.headers,
                Some(range.as_str()),
            )
            .await?;
        drop(response.body);
        if response.status != 206 {
            return Err(DownloadError::UnsupportedRange {
                status: response.status,
            });
        }
        Ok(())
    }

    /// Runs passes until done.
    ///
    /// The loop is iterative, so an unlimited retry budget never grows the
    /// stack. Between passes the bitmap is checkpointed.
    pub async fn run(&self) -> Result<Outcome> {
        self.setting.validate()?;
        self.probe().await?;

        // A bitmap is only as good as the file it describes.
        if !tokio::fs::try_exists(&self.descriptor.path).await?
            && tokio::fs::try_exists(&self.checkpoint).await?
        {
            warn!(
                checkpoint = %self.checkpoint.display(),
                "destination missing, starting over"
            );
            checkpoint::delete(&self.checkpoint).await?;
        }

        let state = checkpoint::load(
            &self.checkpoint,
            self.descriptor.total_size,
            self.setting.chunk_size,
        )
        .await?;
        prepare_destination(&self.descriptor.path, self.descriptor.total_size).await?;

        let progress = SharedProgress::new(state);
        let engine = Engine::new(
            self.transport.clone(),
            self.descriptor.clone(),
            self.setting.clone(),
        );

        let mut retry: u32 = 0;
        loop {
            if self.cancel.is_cancelled() {
                cancel::checkpoint_on_cancel(&progress, &self.checkpoint).await?;
                return Ok(Outcome::Cancelled);
            }

            let report = self.pass(&engine, &progress).await;
            debug!(?report, "pass finished");

            if report.cancelled {
                cancel::checkpoint_on_cancel(&progress, &self.checkpoint).await?;
                return Ok(Outcome::Cancelled);
            }

            let state = progress.snapshot().await;
            if checkpoint::is_complete(&state) {
                checkpoint::delete(&self.checkpoint).await?;
                info!(path = %self.descriptor.path.display(), "download complete");
                return Ok(Outcome::Completed);
            }

            checkpoint::save(&state, &self.checkpoint).await?;
            info!(
                done = state.completed(),
                chunks = state.len(),
                "pass left chunks incomplete"
            );

            match self.setting.max_retry {
                RetryLimit::Limited(max) if retry < max => {
                    retry += 1;
                    println!("Retry {retry}");
                }
                RetryLimit::Unlimited => {
                    retry = retry.saturating_add(1);
                    println!("Retry ∞");
                }
                RetryLimit::Limited(_) => {
                    return Err(DownloadError::MaxRetryExceeded { retries: retry });
                }
            }
        }
    }

    /// One engine pass with its renderer and periodic checkpoint writer.
    async fn pass(&self, engine: &Engine<T>, progress: &SharedProgress) -> PassReport {
        let reporter = Arc::new(Reporter::new(self.descriptor.total_size));
        let stop = self.cancel.child_token();

        let renderer =
            progress::spawn_renderer(reporter.clone(), self.setting.render_interval, stop.clone());
        let saver = checkpoint::spawn_checkpointer(
            progress.clone(),
            self.checkpoint.clone(),
            self.setting.checkpoint_interval,
            stop.clone(),
        );

        let report = engine.run_pass(progress, &reporter, &self.cancel).await;

        stop.cancel();
        for handle in [renderer, saver] {
            if let Err(e) = handle.await {
                warn!(error = %e, "background task did not stop cleanly");
            }
        }
        report
    }
}

/// Creates the destination if missing and grows it to `total_size`.
/// Existing bytes are kept; they belong to chunks finished earlier.
async fn prepare_destination(path: &Path, total_size: u64) -> Result<()> {
    let file = OpenOptions::new()
        .create(true)
        .write(true)
        .truncate(false)
        .open(path)
        .await?;
    if file.metadata().await?.len() < total_size {
        file.set_len(total_size).await?;
    }
    Ok(())
}
