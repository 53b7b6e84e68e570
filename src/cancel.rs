//! Interruption handling.
//!
//! A signal never exits the process from inside a handler. The listener only
//! fires a [`CancellationToken`]; the session that owns the token stops its
//! workers, writes a final checkpoint and returns [`Outcome::Cancelled`],
//! leaving the exit to the caller.
//!
//! [`Outcome::Cancelled`]: crate::session::Outcome::Cancelled

use anyhow::{Context, Result};
use std::path::Path;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tracing::info;

use crate::checkpoint;
use crate::state::SharedProgress;

/// Resolves on Ctrl-C, or on SIGTERM on unix.
pub async fn shutdown_signal() -> Result<()> {
    let ctrl_c = tokio::signal::ctrl_c();
    tokio::pin!(ctrl_c);

    #[cfg(unix)]
    {
        use tokio::signal::unix::{signal, SignalKind};

        let mut term =
            signal(SignalKind::terminate()).context("failed to install SIGTERM handler")?;
        tokio::select! {
            res = &mut ctrl_c => res.context("failed to listen for Ctrl-C")?,
            _ = term.recv() => {}
        }
        return Ok(());
    }

    #[cfg(not(unix))]
    {
        ctrl_c.await.context("failed to listen for Ctrl-C")
    }
}

/// Cancels `token` when the process is interrupted.
///
/// The listener also exits quietly once `token` is cancelled by anyone else.
pub fn listen(token: CancellationToken) -> JoinHandle<()> {
    tokio::spawn(async move {
        tokio::select! {
            res = shutdown_signal() => {
                match res {
                    Ok(()) => info!("interrupt received, cancelling download"),
                    Err(e) => tracing::error!(error = %e, "signal listener failed; cancelling"),
                }
                token.cancel();
            }
            _ = token.cancelled() => {}
        }
    })
}

/// Final step of an interrupted session: persist the bitmap and say so.
pub async fn checkpoint_on_cancel(progress: &SharedProgress, path: &Path) -> crate::error::Result<()> {
    let state = progress.snapshot().await;
    checkpoint::save(&state, path).await?;
    info!(
        done = state.completed(),
        chunks = state.len(),
        "checkpoint written after cancellation"
    );
    println!("Download canceled");
    Ok(())
}
