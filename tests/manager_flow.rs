//! Discovery, overwrite policy and path selection driven by the scripted transport.

mod common;

use common::fake::FakeServer;
use rangedl::checkpoint;
use rangedl::manager::{self, Mode, Request};
use rangedl::{DownloadError, Outcome, ProgressState, Setting};
use std::path::Path;
use std::sync::Arc;
use std::time::Duration;
use tokio_util::sync::CancellationToken;

const CHUNK: u64 = 1024;
const TOTAL: u64 = 4096;

fn request(dir: &Path) -> Request {
    Request {
        url: "http://fake/files/data.bin".to_string(),
        output_dir: dir.to_path_buf(),
        file_name: None,
        headers: vec![],
    }
}

fn setting(force: bool) -> Setting {
    Setting {
        chunk_size: CHUNK,
        threads: 2,
        force,
        checkpoint_interval: Duration::from_millis(20),
        render_interval: Duration::from_millis(20),
        grace_period: Duration::from_millis(100),
        ..Setting::default()
    }
}

async fn orphaned_checkpoint(dir: &Path) -> std::path::PathBuf {
    let ckpt = checkpoint::checkpoint_path(&dir.join("data.bin"));
    let mut stale = ProgressState::new(TOTAL, CHUNK);
    stale.chunk[0] = true;
    stale.chunk[1] = true;
    checkpoint::save(&stale, &ckpt).await.unwrap();
    ckpt
}

#[tokio::test]
async fn ranged_download_through_fake_transport() {
    let dir = tempfile::tempdir().unwrap();
    let body = common::body(TOTAL as usize);
    let server = Arc::new(FakeServer::new(body.clone()));

    let finished = manager::download(
        server.clone(),
        request(dir.path()),
        setting(false),
        CancellationToken::new(),
    )
    .await
    .unwrap();

    assert_eq!(finished.mode, Mode::Ranged);
    assert_eq!(finished.outcome, Outcome::Completed);
    assert_eq!(finished.path, dir.path().join("data.bin"));
    assert_eq!(std::fs::read(&finished.path).unwrap(), body);
    // discovery + probe + four chunks
    assert_eq!(server.requests().len(), 6);
}

#[tokio::test]
async fn orphaned_checkpoint_is_ignored_with_and_without_force() {
    for force in [false, true] {
        let dir = tempfile::tempdir().unwrap();
        let ckpt = orphaned_checkpoint(dir.path()).await;
        let body = common::body(TOTAL as usize);
        let server = Arc::new(FakeServer::new(body.clone()));

        let finished = manager::download(
            server.clone(),
            request(dir.path()),
            setting(force),
            CancellationToken::new(),
        )
        .await
        .unwrap();

        assert_eq!(finished.outcome, Outcome::Completed, "force = {force}");
        assert_eq!(server.count("bytes=0-1023"), 1, "force = {force}");
        assert_eq!(server.count("bytes=1024-2047"), 1, "force = {force}");
        assert_eq!(std::fs::read(&finished.path).unwrap(), body, "force = {force}");
        assert!(!ckpt.exists());
    }
}

#[tokio::test]
async fn no_range_support_uses_single_stream() {
    let dir = tempfile::tempdir().unwrap();
    let body = common::body(TOTAL as usize);
    let server = Arc::new(FakeServer::new(body.clone()).ignoring_ranges());

    let finished = manager::download(
        server.clone(),
        request(dir.path()),
        setting(false),
        CancellationToken::new(),
    )
    .await
    .unwrap();

    assert_eq!(finished.mode, Mode::Single);
    assert_eq!(std::fs::read(&finished.path).unwrap(), body);
    assert_eq!(server.requests(), vec![None, None]);
}

#[tokio::test]
async fn cancelled_single_stream_leaves_nothing_behind() {
    let dir = tempfile::tempdir().unwrap();
    let server = Arc::new(
        FakeServer::new(common::body(TOTAL as usize))
            .ignoring_ranges()
            .with_delay(Duration::from_secs(30)),
    );
    let cancel = CancellationToken::new();
    let trigger = cancel.clone();
    tokio::spawn(async move {
        tokio::time::sleep(Duration::from_millis(50)).await;
        trigger.cancel();
    });

    let finished = manager::download(server, request(dir.path()), setting(false), cancel)
        .await
        .unwrap();

    assert_eq!(finished.mode, Mode::Single);
    assert_eq!(finished.outcome, Outcome::Cancelled);
    assert!(!finished.path.exists());

    // A rerun is not mistaken for a finished file.
    let body = common::body(TOTAL as usize);
    let healthy = Arc::new(FakeServer::new(body.clone()).ignoring_ranges());
    let again = manager::download(
        healthy,
        request(dir.path()),
        setting(false),
        CancellationToken::new(),
    )
    .await
    .unwrap();
    assert_eq!(again.outcome, Outcome::Completed);
    assert_eq!(std::fs::read(&again.path).unwrap(), body);
}

#[tokio::test]
async fn finished_file_without_force_is_kept() {
    let dir = tempfile::tempdir().unwrap();
    std::fs::write(dir.path().join("data.bin"), b"keep").unwrap();
    let server = Arc::new(FakeServer::new(common::body(TOTAL as usize)));

    let err = manager::download(
        server.clone(),
        request(dir.path()),
        setting(false),
        CancellationToken::new(),
    )
    .await
    .unwrap_err();

    assert!(matches!(err, DownloadError::FileExists { .. }), "{err}");
    assert_eq!(server.requests().len(), 1, "only discovery");
}
