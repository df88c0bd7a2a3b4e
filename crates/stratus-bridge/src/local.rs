// SPDX-License-Identifier: PMPL-1.0-or-later
// Copyright (c) 2026 Jonathan D.A. Jewell (hyperpolymath) <jonathan.jewell@open.ac.uk>
//
// Filesystem-backed storage client for desktop and CI builds.
//
// A directory on disk plays the object store: every bucket is a subdirectory
// of the root and every key a relative path inside it. Each transfer runs on
// its own tokio task and copies in fixed-size chunks, emitting one progress
// callback per chunk. Each transfer writes its own `<key>.<id>.part` file and
// renames it into place on completion, so readers never observe a
// half-written object. Concurrent transfers to one key each commit a whole
// object; the last rename wins.

use std::collections::HashMap;
use std::path::{Component, Path, PathBuf};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex, MutexGuard};
use std::time::Duration;

use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::runtime::Handle;
use tokio::sync::watch;
use tracing::{debug, info, instrument, warn};

use stratus_core::AppConfig;
use stratus_core::error::{Result, StratusError};
use stratus_core::types::TransferId;

use crate::traits::*;

/// Run state signalled from control calls to a copy task.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Control {
    Run,
    Pause,
    Cancel,
}

type Controls = Arc<Mutex<HashMap<TransferId, watch::Sender<Control>>>>;

/// Object store rooted at a local directory.
pub struct LocalStorageClient {
    root: PathBuf,
    chunk_size: usize,
    chunk_delay: Duration,
    events: ClientEventSender,
    next_id: AtomicU64,
    /// Live copy tasks. Entries are removed by the task itself when it exits.
    controls: Controls,
    runtime: Handle,
}

impl LocalStorageClient {
    /// Create a client rooted at `root`, creating the directory if needed.
    ///
    /// Must be called from within a tokio runtime; copy tasks are spawned
    /// onto it.
    pub fn new(root: impl Into<PathBuf>, config: &AppConfig, events: ClientEventSender) -> Result<Self> {
        let runtime = Handle::try_current()
            .map_err(|e| StratusError::Client(format!("no tokio runtime: {e}")))?;
        let root = root.into();
        std::fs::create_dir_all(&root)?;

        info!(root = %root.display(), "local storage client ready");
        Ok(Self {
            root,
            chunk_size: config.chunk_size.max(1),
            chunk_delay: Duration::from_millis(config.chunk_delay_ms),
            events,
            next_id: AtomicU64::new(1),
            controls: Arc::new(Mutex::new(HashMap::new())),
            runtime,
        })
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    /// Create a bucket. Idempotent.
    pub fn create_bucket(&self, bucket: &str) -> Result<PathBuf> {
        validate_bucket(bucket).map_err(StratusError::InvalidArguments)?;
        let dir = self.root.join(bucket);
        std::fs::create_dir_all(&dir)?;
        debug!(bucket, "bucket created");
        Ok(dir)
    }

    /// Number of copy tasks that have not exited yet.
    pub fn active_transfers(&self) -> usize {
        lock(&self.controls).len()
    }

    /// Resolve `bucket`/`key` to a path inside an existing bucket.
    fn object_path(&self, bucket: &str, key: &str) -> Result<PathBuf> {
        validate_bucket(bucket).map_err(StratusError::InitFailed)?;
        validate_key(key).map_err(StratusError::InitFailed)?;

        let bucket_dir = self.root.join(bucket);
        if !bucket_dir.is_dir() {
            return Err(StratusError::InitFailed(format!("bucket '{bucket}' does not exist")));
        }
        Ok(bucket_dir.join(key))
    }

    fn spawn_copy(&self, source: PathBuf, dest: PathBuf) -> TransferId {
        let id = TransferId(self.next_id.fetch_add(1, Ordering::Relaxed));
        let (control_tx, control_rx) = watch::channel(Control::Run);
        // Registered before the task exists so control calls never miss it.
        lock(&self.controls).insert(id, control_tx);

        let job = CopyJob {
            id,
            source,
            dest,
            chunk_size: self.chunk_size,
            chunk_delay: self.chunk_delay,
            events: self.events.clone(),
            control: control_rx,
            controls: Arc::clone(&self.controls),
        };
        let controls = Arc::clone(&self.controls);
        self.runtime.spawn(async move {
            job.run().await;
            lock(&controls).remove(&id);
        });

        id
    }

    fn signal(&self, id: TransferId, control: Control) -> Result<()> {
        let controls = lock(&self.controls);
        let sender = controls
            .get(&id)
            .ok_or_else(|| StratusError::Client(format!("transfer {id} is not active")))?;
        sender.send_replace(control);
        debug!(transfer_id = %id, ?control, "control signalled");
        Ok(())
    }
}

impl StorageClient for LocalStorageClient {
    fn platform_name(&self) -> &str {
        "Local filesystem"
    }
}

impl TransferClient for LocalStorageClient {
    #[instrument(skip(self), fields(path = %local_path.display()))]
    fn start_upload(
        &self,
        local_path: &Path,
        bucket: &str,
        key: &str,
        content_type: Option<&str>,
    ) -> Result<TransferId> {
        if !local_path.is_file() {
            return Err(StratusError::InitFailed(format!(
                "no such file: {}",
                local_path.display()
            )));
        }
        let dest = self.object_path(bucket, key)?;
        let id = self.spawn_copy(local_path.to_path_buf(), dest);
        info!(transfer_id = %id, content_type = content_type.unwrap_or("unspecified"), "upload started");
        Ok(id)
    }

    #[instrument(skip(self), fields(path = %local_path.display()))]
    fn start_download(&self, local_path: &Path, bucket: &str, key: &str) -> Result<TransferId> {
        if local_path.as_os_str().is_empty() {
            return Err(StratusError::InitFailed("empty download path".into()));
        }
        let source = self.object_path(bucket, key)?;
        if !source.is_file() {
            return Err(StratusError::InitFailed(format!("no object '{key}' in bucket '{bucket}'")));
        }
        let id = self.spawn_copy(source, local_path.to_path_buf());
        info!(transfer_id = %id, "download started");
        Ok(id)
    }
}

impl TransferControl for LocalStorageClient {
    fn pause(&self, id: TransferId) -> Result<()> {
        self.signal(id, Control::Pause)
    }

    fn resume(&self, id: TransferId) -> Result<()> {
        self.signal(id, Control::Run)
    }

    fn cancel(&self, id: TransferId) -> Result<()> {
        self.signal(id, Control::Cancel)
    }
}

// ---------------------------------------------------------------------------
// Copy task
// ---------------------------------------------------------------------------

enum CopyOutcome {
    Finished,
    Cancelled,
}

struct CopyJob {
    id: TransferId,
    source: PathBuf,
    dest: PathBuf,
    chunk_size: usize,
    chunk_delay: Duration,
    events: ClientEventSender,
    control: watch::Receiver<Control>,
    controls: Controls,
}

impl CopyJob {
    async fn run(mut self) {
        let partial = partial_path(&self.dest, self.id);
        match self.copy(&partial).await {
            Ok(CopyOutcome::Finished) => {
                debug!(transfer_id = %self.id, "copy finished");
                self.emit(ClientEvent::Completed { id: self.id });
            }
            Ok(CopyOutcome::Cancelled) => {
                debug!(transfer_id = %self.id, "copy cancelled");
                let _ = tokio::fs::remove_file(&partial).await;
            }
            Err(e) => {
                warn!(transfer_id = %self.id, error = %e, "copy failed");
                let _ = tokio::fs::remove_file(&partial).await;
                self.emit(ClientEvent::Failed {
                    id: self.id,
                    message: e.to_string(),
                });
            }
        }
    }

    async fn copy(&mut self, partial: &Path) -> std::io::Result<CopyOutcome> {
        let total = tokio::fs::metadata(&self.source).await?.len();
        let mut reader = tokio::fs::File::open(&self.source).await?;
        if let Some(parent) = self.dest.parent() {
            tokio::fs::create_dir_all(parent).await?;
        }
        let mut writer = tokio::fs::File::create(partial).await?;

        let mut buf = vec![0u8; self.chunk_size];
        let mut done: u64 = 0;
        loop {
            if !self.wait_until_running().await {
                return Ok(CopyOutcome::Cancelled);
            }

            let n = reader.read(&mut buf).await?;
            if n == 0 {
                break;
            }
            writer.write_all(&buf[..n]).await?;
            done += n as u64;

            let fraction = if total == 0 {
                1.0
            } else {
                (done as f64 / total as f64).min(1.0)
            };
            self.emit(ClientEvent::Progress { id: self.id, fraction });

            if !self.chunk_delay.is_zero() {
                tokio::time::sleep(self.chunk_delay).await;
            }
        }

        writer.flush().await?;
        drop(writer);
        if !self.claim_commit() {
            return Ok(CopyOutcome::Cancelled);
        }
        tokio::fs::rename(partial, &self.dest).await?;
        Ok(CopyOutcome::Finished)
    }

    /// Last point at which a cancel is honoured.
    ///
    /// On success the task leaves the control map, so a cancel that arrives
    /// while the object is being committed fails instead of being accepted
    /// and then ignored.
    fn claim_commit(&self) -> bool {
        let mut controls = lock(&self.controls);
        if *self.control.borrow() == Control::Cancel {
            return false;
        }
        controls.remove(&self.id);
        true
    }

    /// Block while paused. Returns `false` once cancelled.
    async fn wait_until_running(&mut self) -> bool {
        loop {
            let control = *self.control.borrow_and_update();
            match control {
                Control::Run => return true,
                Control::Cancel => return false,
                Control::Pause => {
                    if self.control.changed().await.is_err() {
                        return false;
                    }
                }
            }
        }
    }

    fn emit(&self, event: ClientEvent) {
        // The coordinator may already be gone during shutdown.
        if self.events.send(event).is_err() {
            debug!(transfer_id = %self.id, "callback receiver closed");
        }
    }
}

// ---------------------------------------------------------------------------
// Helpers
// ---------------------------------------------------------------------------

fn lock<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
}

fn partial_path(dest: &Path, id: TransferId) -> PathBuf {
    let mut name = dest.file_name().map(|n| n.to_os_string()).unwrap_or_default();
    name.push(format!(".{id}.part"));
    dest.with_file_name(name)
}

fn validate_bucket(bucket: &str) -> std::result::Result<(), String> {
    if bucket.is_empty()
        || bucket == "."
        || bucket == ".."
        || bucket.contains(['/', '\\'])
    {
        return Err(format!("invalid bucket name '{bucket}'"));
    }
    Ok(())
}

fn validate_key(key: &str) -> std::result::Result<(), String> {
    let path = Path::new(key);
    let mut components = path.components().peekable();
    if components.peek().is_none() {
        return Err("empty object key".into());
    }
    if !components.all(|c| matches!(c, Component::Normal(_))) {
        return Err(format!("invalid object key '{key}'"));
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn config(chunk_size: usize) -> AppConfig {
        AppConfig {
            chunk_size,
            ..AppConfig::default()
        }
    }

    async fn wait_idle(client: &LocalStorageClient) {
        for _ in 0..200 {
            if client.active_transfers() == 0 {
                return;
            }
            tokio::time::sleep(Duration::from_millis(5)).await;
        }
        panic!("copy task did not exit");
    }

    #[test]
    fn key_validation() {
        assert!(validate_key("photos/2026/a.png").is_ok());
        assert!(validate_key("").is_err());
        assert!(validate_key("../escape").is_err());
        assert!(validate_key("/absolute").is_err());
        assert!(validate_bucket("bucket1").is_ok());
        assert!(validate_bucket("a/b").is_err());
        assert!(validate_bucket("..").is_err());
    }

    #[test]
    fn partial_path_is_unique_per_transfer() {
        assert_eq!(
            partial_path(Path::new("/store/b/key.png"), TransferId(3)),
            PathBuf::from("/store/b/key.png.3.part")
        );
        assert_ne!(
            partial_path(Path::new("/store/b/key.png"), TransferId(3)),
            partial_path(Path::new("/store/b/key.png"), TransferId(4))
        );
    }

    #[tokio::test]
    async fn upload_copies_bytes_and_reports_progress() {
        let dir = tempfile::tempdir().unwrap();
        let source = dir.path().join("a.bin");
        std::fs::write(&source, vec![7u8; 10]).unwrap();

        let (tx, mut rx) = client_event_channel();
        let client = LocalStorageClient::new(dir.path().join("store"), &config(4), tx).unwrap();
        client.create_bucket("bucket1").unwrap();

        let id = client
            .start_upload(&source, "bucket1", "nested/key1", Some("application/octet-stream"))
            .unwrap();

        let mut fractions = Vec::new();
        loop {
            match rx.recv().await.unwrap() {
                ClientEvent::Progress { id: got, fraction } => {
                    assert_eq!(got, id);
                    fractions.push(fraction);
                }
                ClientEvent::Completed { id: got } => {
                    assert_eq!(got, id);
                    break;
                }
                other => panic!("unexpected event {other:?}"),
            }
        }

        assert_eq!(fractions, vec![0.4, 0.8, 1.0]);
        let stored = std::fs::read(dir.path().join("store/bucket1/nested/key1")).unwrap();
        assert_eq!(stored, vec![7u8; 10]);
    }

    #[tokio::test]
    async fn missing_bucket_is_rejected_at_init() {
        let dir = tempfile::tempdir().unwrap();
        let (tx, _rx) = client_event_channel();
        let client = LocalStorageClient::new(dir.path(), &config(4), tx).unwrap();

        let err = client
            .start_download(&dir.path().join("out"), "nope", "key")
            .unwrap_err();
        assert!(matches!(err, StratusError::InitFailed(_)));
        assert_eq!(client.active_transfers(), 0);
    }

    #[tokio::test]
    async fn missing_source_file_is_rejected_at_init() {
        let dir = tempfile::tempdir().unwrap();
        let (tx, _rx) = client_event_channel();
        let client = LocalStorageClient::new(dir.path(), &config(4), tx).unwrap();
        client.create_bucket("bucket1").unwrap();

        let err = client
            .start_upload(&dir.path().join("missing.png"), "bucket1", "key", None)
            .unwrap_err();
        assert!(matches!(err, StratusError::InitFailed(_)));
    }

    #[tokio::test]
    async fn paused_copy_holds_until_resumed() {
        let dir = tempfile::tempdir().unwrap();
        let (tx, mut rx) = client_event_channel();
        let client = LocalStorageClient::new(dir.path().join("store"), &config(2), tx).unwrap();
        client.create_bucket("bucket1").unwrap();
        std::fs::write(client.root().join("bucket1/key1"), b"abcdef").unwrap();

        let out = dir.path().join("out.bin");
        let id = client.start_download(&out, "bucket1", "key1").unwrap();
        // The task has not run yet on the current-thread runtime.
        client.pause(id).unwrap();

        let idle = tokio::time::timeout(Duration::from_millis(50), rx.recv()).await;
        assert!(idle.is_err(), "no progress while paused");

        client.resume(id).unwrap();
        let mut last = None;
        while let Some(event) = rx.recv().await {
            let done = matches!(event, ClientEvent::Completed { .. });
            last = Some(event);
            if done {
                break;
            }
        }
        assert_eq!(last, Some(ClientEvent::Completed { id }));
        assert_eq!(std::fs::read(&out).unwrap(), b"abcdef");
    }

    #[tokio::test]
    async fn cancelled_copy_leaves_no_object() {
        let dir = tempfile::tempdir().unwrap();
        let source = dir.path().join("a.bin");
        std::fs::write(&source, vec![1u8; 32]).unwrap();

        let (tx, mut rx) = client_event_channel();
        let client = LocalStorageClient::new(dir.path().join("store"), &config(4), tx).unwrap();
        client.create_bucket("bucket1").unwrap();

        let id = client.start_upload(&source, "bucket1", "key1", None).unwrap();
        client.pause(id).unwrap();
        client.cancel(id).unwrap();
        wait_idle(&client).await;

        let dest = client.root().join("bucket1/key1");
        assert!(!dest.exists());
        assert!(!partial_path(&dest, id).exists());
        assert!(rx.try_recv().is_err(), "cancellation emits nothing");
        assert!(client.cancel(id).is_err(), "task is gone after exit");
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 2)]
    async fn concurrent_uploads_to_one_key_commit_whole_objects() {
        let dir = tempfile::tempdir().unwrap();
        let ones = dir.path().join("ones.bin");
        let twos = dir.path().join("twos.bin");
        std::fs::write(&ones, vec![1u8; 4096]).unwrap();
        std::fs::write(&twos, vec![2u8; 4096]).unwrap();

        let (tx, mut rx) = client_event_channel();
        let client = LocalStorageClient::new(dir.path().join("store"), &config(64), tx).unwrap();
        client.create_bucket("bucket1").unwrap();

        let first = client.start_upload(&ones, "bucket1", "key1", None).unwrap();
        let second = client.start_upload(&twos, "bucket1", "key1", None).unwrap();

        let mut completed = Vec::new();
        while completed.len() < 2 {
            match rx.recv().await.unwrap() {
                ClientEvent::Progress { .. } => {}
                ClientEvent::Completed { id } => completed.push(id),
                other => panic!("unexpected event {other:?}"),
            }
        }
        completed.sort();
        assert_eq!(completed, vec![first, second]);
        wait_idle(&client).await;

        let stored = std::fs::read(client.root().join("bucket1/key1")).unwrap();
        assert_eq!(stored.len(), 4096);
        assert!(
            stored.iter().all(|&b| b == 1) || stored.iter().all(|&b| b == 2),
            "stored object mixes both sources"
        );
        let leftovers: Vec<_> = std::fs::read_dir(client.root().join("bucket1"))
            .unwrap()
            .map(|e| e.unwrap().file_name())
            .filter(|n| n.to_string_lossy().ends_with(".part"))
            .collect();
        assert!(leftovers.is_empty(), "partial files left: {leftovers:?}");
    }

    fn finished_job(dir: &Path, id: TransferId, controls: &Controls) -> (CopyJob, watch::Sender<Control>) {
        let (control_tx, control_rx) = watch::channel(Control::Run);
        let (events, _rx) = client_event_channel();
        let job = CopyJob {
            id,
            source: dir.join("src"),
            dest: dir.join("dest"),
            chunk_size: 4,
            chunk_delay: Duration::ZERO,
            events,
            control: control_rx,
            controls: Arc::clone(controls),
        };
        (job, control_tx)
    }

    #[test]
    fn cancel_after_final_chunk_blocks_commit() {
        let dir = tempfile::tempdir().unwrap();
        let controls: Controls = Arc::new(Mutex::new(HashMap::new()));
        let id = TransferId(1);
        let (job, control_tx) = finished_job(dir.path(), id, &controls);
        lock(&controls).insert(id, control_tx);

        // Cancel lands after the last chunk was read.
        lock(&controls).get(&id).unwrap().send_replace(Control::Cancel);
        assert!(!job.claim_commit());
        assert!(lock(&controls).contains_key(&id));
    }

    #[test]
    fn committing_copy_refuses_later_control() {
        let dir = tempfile::tempdir().unwrap();
        let controls: Controls = Arc::new(Mutex::new(HashMap::new()));
        let id = TransferId(2);
        let (job, control_tx) = finished_job(dir.path(), id, &controls);
        lock(&controls).insert(id, control_tx);

        assert!(job.claim_commit());
        assert!(lock(&controls).is_empty(), "committing task leaves the control map");
    }

    #[tokio::test]
    async fn start_returns_before_any_bytes_move() {
        let dir = tempfile::tempdir().unwrap();
        let source = dir.path().join("a.bin");
        std::fs::write(&source, vec![5u8; 64]).unwrap();

        let (tx, mut rx) = client_event_channel();
        let client = LocalStorageClient::new(dir.path().join("store"), &config(8), tx).unwrap();
        client.create_bucket("bucket1").unwrap();

        let id = client.start_upload(&source, "bucket1", "key1", None).unwrap();
        let dest = client.root().join("bucket1/key1");
        assert!(!partial_path(&dest, id).exists());
        assert!(!dest.exists());
        assert!(rx.try_recv().is_err());
        assert_eq!(client.active_transfers(), 1);
    }
}
