//! Byte counter fed by chunk writers, plus the periodic renderer that turns it
//! into a percent / throughput / ETA line.

use indicatif::{HumanBytes, HumanDuration, ProgressBar, ProgressDrawTarget, ProgressStyle};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::{Duration, Instant};
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;

/// Thread-safe byte counter for one pass.
///
/// `current` counts bytes known to be on disk (including chunks finished in
/// earlier runs); `written` counts only bytes received since `started`, and
/// is what throughput is computed from.
#[derive(Debug)]
pub struct Reporter {
    total: u64,
    current: AtomicU64,
    written: AtomicU64,
    started: Instant,
}

impl Reporter {
    pub fn new(total: u64) -> Self {
        Self {
            total,
            current: AtomicU64::new(0),
            written: AtomicU64::new(0),
            started: Instant::now(),
        }
    }

    /// Bytes streamed to disk during this run.
    pub fn record(&self, n: u64) {
        self.current.fetch_add(n, Ordering::Relaxed);
        self.written.fetch_add(n, Ordering::Relaxed);
    }

    /// Takes back bytes recorded for a chunk that did not complete.
    pub fn retract(&self, n: u64) {
        self.current.fetch_sub(n, Ordering::Relaxed);
        self.written.fetch_sub(n, Ordering::Relaxed);
    }

    /// Bytes already on disk from an earlier run.
    pub fn credit(&self, n: u64) {
        self.current.fetch_add(n, Ordering::Relaxed);
    }

    pub fn snapshot(&self) -> Snapshot {
        Snapshot {
            total: self.total,
            current: self.current.load(Ordering::Relaxed),
            written: self.written.load(Ordering::Relaxed),
            elapsed: self.started.elapsed(),
        }
    }
}

#[derive(Debug, Clone, Copy)]
pub struct Snapshot {
    pub total: u64,
    pub current: u64,
    pub written: u64,
    pub elapsed: Duration,
}

impl Snapshot {
    pub fn percent(&self) -> f64 {
        if self.total == 0 {
            return 100.0;
        }
        self.current as f64 / self.total as f64 * 100.0
    }

    /// Bytes per second received since the reporter was created.
    pub fn speed(&self) -> f64 {
        let secs = self.elapsed.as_secs_f64();
        if secs <= 0.0 {
            return 0.0;
        }
        self.written as f64 / secs
    }

    pub fn eta(&self) -> Option<Duration> {
        let remaining = self.total.saturating_sub(self.current);
        if remaining == 0 {
            return Some(Duration::ZERO);
        }
        let speed = self.speed();
        if speed <= 0.0 {
            return None;
        }
        Some(Duration::from_secs_f64(remaining as f64 / speed))
    }

    pub fn render(&self) -> String {
        let eta = match self.eta() {
            Some(eta) => HumanDuration(eta).to_string(),
            None => "-".to_string(),
        };
        format!(
            "{} / {} ({:.2}%) | {}/s | ETA {}",
            HumanBytes(self.current),
            HumanBytes(self.total),
            self.percent(),
            HumanBytes(self.speed() as u64),
            eta
        )
    }
}

/// Redraws the progress line every `interval` until `stop` fires, then
/// clears it and prints the elapsed time.
pub fn spawn_renderer(
    reporter: Arc<Reporter>,
    interval: Duration,
    stop: CancellationToken,
) -> JoinHandle<()> {
    tokio::spawn(async move {
        let pb = ProgressBar::with_draw_target(None, ProgressDrawTarget::stderr());
        pb.set_style(ProgressStyle::with_template("{msg}").unwrap_or_else(|_| ProgressStyle::default_spinner()));

        let mut ticker = tokio::time::interval(interval);
        ticker.tick().await;
        loop {
            tokio::select! {
                _ = ticker.tick() => {
                    pb.set_message(reporter.snapshot().render());
                }
                _ = stop.cancelled() => break,
            }
        }

        pb.finish_and_clear();
        let elapsed = Duration::from_secs(reporter.snapshot().elapsed.as_secs());
        eprintln!("Elapsed time: {}", HumanDuration(elapsed));
    })
}
