//! Top-level download flow: discover the resource, settle the destination,
//! then hand off to a ranged session or the single-stream fallback.

use std::path::{Path, PathBuf};
use std::sync::Arc;
use tokio::fs;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

use crate::checkpoint;
use crate::config::{Descriptor, Setting};
use crate::error::{DownloadError, Result};
use crate::session::{Outcome, Session};
use crate::single;
use crate::transport::Transport;
use crate::utils::infer_filename;

#[derive(Debug, Clone)]
pub struct Request {
    pub url: String,
    pub output_dir: PathBuf,
    /// Overrides the name inferred from the response.
    pub file_name: Option<String>,
    pub headers: Vec<(String, String)>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Mode {
    Ranged,
    Single,
}

#[derive(Debug, Clone)]
pub struct Finished {
    pub path: PathBuf,
    pub mode: Mode,
    pub outcome: Outcome,
}

pub async fn download<T: Transport>(
    transport: Arc<T>,
    request: Request,
    setting: Setting,
    cancel: CancellationToken,
) -> Result<Finished> {
    setting.validate()?;

    let discovery = transport.discover(&request.url, &request.headers).await?;
    if !(200..300).contains(&discovery.status) {
        return Err(DownloadError::Status {
            status: discovery.status,
        });
    }
    if discovery.url != request.url {
        debug!(from = %request.url, to = %discovery.url, "following redirect");
    }

    let file_name = match request.file_name {
        Some(name) => name,
        None => infer_filename(&discovery.url, discovery.content_disposition.as_deref()),
    };
    let path = request.output_dir.join(&file_name);
    let total_size = discovery.content_length.unwrap_or(0);

    let descriptor = Descriptor {
        url: discovery.url,
        path: path.clone(),
        headers: request.headers,
        total_size,
    };
    prepare_overwrite(&descriptor.path, &descriptor.checkpoint_path(), setting.force).await?;

    println!("Downloading: {}", file_name);

    let (mode, outcome) = if total_size > 0 && discovery.accept_ranges {
        info!(size = total_size, chunk_size = setting.chunk_size, threads = setting.threads, "ranged download");
        let session = Session::new(transport, descriptor, setting, cancel);
        (Mode::Ranged, session.run().await?)
    } else {
        info!("server does not accept ranges, downloading without resume");
        let outcome =
            single::download(&*transport, &descriptor, setting.render_interval, &cancel).await?;
        (Mode::Single, outcome)
    };

    Ok(Finished {
        path,
        mode,
        outcome,
    })
}

/// Settles an existing destination before a run.
///
/// * no destination: any leftover checkpoint describes bytes that are gone,
///   so it is removed
/// * destination without checkpoint: a finished file, replaced only with `force`
/// * destination with checkpoint: resumed, or both removed with `force`
pub async fn prepare_overwrite(path: &Path, checkpoint_path: &Path, force: bool) -> Result<()> {
    let has_checkpoint = fs::try_exists(checkpoint_path).await?;
    if !fs::try_exists(path).await? {
        if has_checkpoint {
            warn!(
                checkpoint = %checkpoint_path.display(),
                "destination missing, discarding orphaned checkpoint"
            );
            checkpoint::delete(checkpoint_path).await?;
        }
        return Ok(());
    }

    match (has_checkpoint, force) {
        (false, false) => Err(DownloadError::FileExists {
            path: path.to_path_buf(),
        }),
        (false, true) => {
            fs::remove_file(path).await?;
            Ok(())
        }
        (true, false) => Ok(()),
        (true, true) => {
            fs::remove_file(path).await?;
            checkpoint::delete(checkpoint_path).await
        }
    }
}
