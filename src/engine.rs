//! The chunk worker pool: one pass over the progress bitmap.

use std::io::SeekFrom;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use tokio::fs::OpenOptions;
use tokio::io::{AsyncReadExt, AsyncSeekExt, AsyncWriteExt};
use tokio::sync::Semaphore;
use tokio::task::{JoinError, JoinSet};
use tokio_util::io::{InspectReader, StreamReader};
use tokio_util::sync::CancellationToken;
use tracing::{debug, warn};

use crate::config::{Descriptor, Setting};
use crate::error::ChunkError;
use crate::plan::{self, ChunkRange};
use crate::progress::Reporter;
use crate::state::SharedProgress;
use crate::transport::Transport;

/// Tally of one pass.
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub struct PassReport {
    /// Already complete before the pass started; no request made.
    pub skipped: usize,
    pub dispatched: usize,
    pub completed: usize,
    pub failed: usize,
    /// Incomplete chunks never launched, because the failure ceiling was hit
    /// or the pass was cancelled.
    pub held_back: usize,
    /// Chunks still in flight when the grace period ran out.
    pub abandoned: usize,
    pub cancelled: bool,
}

pub struct Engine<T: Transport> {
    transport: Arc<T>,
    descriptor: Arc<Descriptor>,
    setting: Setting,
}

impl<T: Transport> Engine<T> {
    pub fn new(transport: Arc<T>, descriptor: Arc<Descriptor>, setting: Setting) -> Self {
        Self {
            transport,
            descriptor,
            setting,
        }
    }

    /// Attempts every incomplete chunk once, at most `threads` at a time.
    ///
    /// Returns once every launched fetch has finished. If `cancel` fires, no
    /// further chunks are launched and in-flight fetches get the grace
    /// period to finish before they are aborted; aborted chunks stay
    /// incomplete.
    pub async fn run_pass(
        &self,
        progress: &SharedProgress,
        reporter: &Arc<Reporter>,
        cancel: &CancellationToken,
    ) -> PassReport {
        let snapshot = progress.snapshot().await;
        let total_size = self.descriptor.total_size;
        let chunk_size = snapshot.chunk_size;
        let ceiling = self.setting.failure_ceiling();

        let semaphore = Arc::new(Semaphore::new(self.setting.threads));
        let failures = Arc::new(AtomicUsize::new(0));
        let mut tasks = JoinSet::new();
        let mut report = PassReport::default();

        for index in 0..snapshot.len() {
            let range = plan::chunk_range(index, total_size, chunk_size);

            if progress.is_done(index).await {
                reporter.credit(range.len());
                report.skipped += 1;
                continue;
            }
            if cancel.is_cancelled() || failures.load(Ordering::SeqCst) > ceiling {
                report.held_back += 1;
                continue;
            }

            let permit = tokio::select! {
                biased;
                _ = cancel.cancelled() => {
                    report.held_back += 1;
                    continue;
                }
                permit = semaphore.clone().acquire_owned() => match permit {
                    Ok(permit) => permit,
                    Err(_) => break,
                },
            };

            let transport = self.transport.clone();
            let descriptor = self.descriptor.clone();
            let reporter = reporter.clone();
            let progress = progress.clone();
            let failures = failures.clone();

            report.dispatched += 1;
            tasks.spawn(async move {
                let _permit = permit;
                match fetch_chunk(&*transport, &descriptor, range, &reporter).await {
                    Ok(()) => {
                        progress.mark_done(range.index).await;
                        debug!(chunk = range.index, "chunk complete");
                        true
                    }
                    Err(e) => {
                        failures.fetch_add(1, Ordering::SeqCst);
                        warn!(chunk = range.index, range = %range.header_value(), error = %e, "chunk failed");
                        false
                    }
                }
            });
        }

        if report.held_back > 0 && !cancel.is_cancelled() {
            warn!(
                failures = failures.load(Ordering::SeqCst),
                held_back = report.held_back,
                "failure ceiling reached, remaining chunks deferred to next pass"
            );
        }

        loop {
            tokio::select! {
                joined = tasks.join_next() => match joined {
                    Some(joined) => tally(&mut report, joined),
                    None => break,
                },
                _ = cancel.cancelled() => {
                    report.cancelled = true;
                    let grace = self.setting.grace_period;
                    let drained = tokio::time::timeout(grace, async {
                        while let Some(joined) = tasks.join_next().await {
                            tally(&mut report, joined);
                        }
                    })
                    .await;
                    if drained.is_err() {
                        report.abandoned = tasks.len();
                        warn!(abandoned = report.abandoned, "grace period over, abandoning in-flight chunks");
                        tasks.abort_all();
                        while tasks.join_next().await.is_some() {}
                    }
                    break;
                }
            }
        }

        report.cancelled |= cancel.is_cancelled();
        report
    }
}

fn tally(report: &mut PassReport, joined: Result<bool, JoinError>) {
    match joined {
        Ok(true) => report.completed += 1,
        Ok(false) => report.failed += 1,
        Err(e) => {
            report.failed += 1;
            warn!(error = %e, "chunk task did not finish");
        }
    }
}

/// Fetches one chunk and writes it at its offset.
///
/// Returns `Ok` only after the whole range has been written and flushed;
/// the caller marks the chunk done strictly after that.
async fn fetch_chunk<T: Transport>(
    transport: &T,
    descriptor: &Descriptor,
    range: ChunkRange,
    reporter: &Reporter,
) -> Result<(), ChunkError> {
    let header = range.header_value();
    let response = transport
        .get(&descriptor.url, &descriptor.headers, Some(header.as_str()))
        .await?;
    if response.status != 206 {
        return Err(ChunkError::Status(response.status));
    }

    let mut file = OpenOptions::new()
        .write(true)
        .open(&descriptor.path)
        .await?;
    file.seek(SeekFrom::Start(range.start)).await?;

    // Only bytes inside the range are counted; a failed chunk takes its
    // bytes back off the counter.
    let mut counted = 0u64;
    let copied = {
        let limited = StreamReader::new(response.body).take(range.len());
        let mut reader = InspectReader::new(limited, |buf: &[u8]| {
            counted += buf.len() as u64;
            reporter.record(buf.len() as u64);
        });
        match tokio::io::copy(&mut reader, &mut file).await {
            Ok(received) => file.flush().await.map(|()| received),
            Err(e) => Err(e),
        }
    };
    let received = match copied {
        Ok(received) if received == range.len() => return Ok(()),
        Ok(received) => received,
        Err(e) => {
            reporter.retract(counted);
            return Err(e.into());
        }
    };
    reporter.retract(counted);
    Err(ChunkError::Truncated {
        expected: range.len(),
        received,
    })
}
