//! Straight-through download for servers without range support.
//! No chunks, no checkpoint: an interrupted run starts over next time.

use futures::TryStreamExt;
use std::path::Path;
use std::sync::Arc;
use std::time::Duration;
use tokio::fs::File;
use tokio::io::AsyncWriteExt;
use tokio_util::io::StreamReader;
use tokio_util::sync::CancellationToken;
use tracing::{info, warn};

use crate::config::Descriptor;
use crate::error::{DownloadError, Result};
use crate::progress::{self, Reporter};
use crate::session::Outcome;
use crate::transport::Transport;

pub async fn download<T: Transport>(
    transport: &T,
    descriptor: &Descriptor,
    render_interval: Duration,
    cancel: &CancellationToken,
) -> Result<Outcome> {
    let response = transport
        .get(&descriptor.url, &descriptor.headers, None)
        .await?;
    if !(200..300).contains(&response.status) {
        return Err(DownloadError::Status {
            status: response.status,
        });
    }

    let mut file = File::create(&descriptor.path).await?;
    let reporter = Arc::new(Reporter::new(descriptor.total_size));
    let stop = cancel.child_token();
    let renderer = progress::spawn_renderer(reporter.clone(), render_interval, stop.clone());

    let body = response
        .body
        .inspect_ok(|bytes| reporter.record(bytes.len() as u64));
    let mut reader = StreamReader::new(body);

    let copied = tokio::select! {
        res = tokio::io::copy(&mut reader, &mut file) => Some(res),
        _ = cancel.cancelled() => None,
    };
    stop.cancel();
    if let Err(e) = renderer.await {
        warn!(error = %e, "progress renderer did not stop cleanly");
    }

    let finished = match copied {
        Some(res) => match res {
            Ok(bytes) => file.flush().await.map(|()| Some(bytes)),
            Err(e) => Err(e),
        },
        None => Ok(None),
    };
    drop(file);

    match finished {
        Ok(Some(bytes)) => {
            info!(bytes, path = %descriptor.path.display(), "download complete");
            Ok(Outcome::Completed)
        }
        // Without a checkpoint a partial file would later pass for a finished one.
        Ok(None) => {
            discard_partial(&descriptor.path).await;
            println!("Download canceled");
            Ok(Outcome::Cancelled)
        }
        Err(e) => {
            discard_partial(&descriptor.path).await;
            Err(e.into())
        }
    }
}

async fn discard_partial(path: &Path) {
    if let Err(e) = tokio::fs::remove_file(path).await {
        warn!(path = %path.display(), error = %e, "could not remove partial download");
    }
}
