// SPDX-License-Identifier: PMPL-1.0-or-later
// Copyright (c) 2026 Jonathan D.A. Jewell (hyperpolymath) <jonathan.jewell@open.ac.uk>
//
// Test helpers: a storage client whose callbacks are driven by the test.

use std::path::Path;
use std::sync::Mutex;
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::Duration;

use stratus_bridge::traits::*;
use stratus_core::error::{Result, StratusError};
use stratus_core::types::TransferId;

/// Storage client that hands out sequential ids, records every call, and
/// emits callbacks only when told to.
pub struct ScriptedClient {
    next_id: AtomicU64,
    reject_next: Mutex<Option<String>>,
    reissue_next: Mutex<Option<TransferId>>,
    calls: Mutex<Vec<String>>,
    events: ClientEventSender,
}

impl ScriptedClient {
    pub fn new(first_id: u64, events: ClientEventSender) -> Self {
        Self {
            next_id: AtomicU64::new(first_id),
            reject_next: Mutex::new(None),
            reissue_next: Mutex::new(None),
            calls: Mutex::new(Vec::new()),
            events,
        }
    }

    /// Make the next start call fail with `InitFailed(message)`.
    pub fn reject_next(&self, message: &str) {
        *self.reject_next.lock().unwrap() = Some(message.to_string());
    }

    /// Make the next start call hand out `id` again instead of a fresh one.
    pub fn reissue_next(&self, id: TransferId) {
        *self.reissue_next.lock().unwrap() = Some(id);
    }

    pub fn calls(&self) -> Vec<String> {
        self.calls.lock().unwrap().clone()
    }

    pub fn progress(&self, id: TransferId, fraction: f64) {
        self.events.send(ClientEvent::Progress { id, fraction }).unwrap();
    }

    pub fn complete(&self, id: TransferId) {
        self.events.send(ClientEvent::Completed { id }).unwrap();
    }

    pub fn fail(&self, id: TransferId, message: &str) {
        self.events
            .send(ClientEvent::Failed {
                id,
                message: message.to_string(),
            })
            .unwrap();
    }

    fn record(&self, call: String) {
        self.calls.lock().unwrap().push(call);
    }

    fn start(&self, call: String) -> Result<TransferId> {
        self.record(call);
        if let Some(message) = self.reject_next.lock().unwrap().take() {
            return Err(StratusError::InitFailed(message));
        }
        if let Some(id) = self.reissue_next.lock().unwrap().take() {
            return Ok(id);
        }
        Ok(TransferId(self.next_id.fetch_add(1, Ordering::Relaxed)))
    }
}

impl StorageClient for ScriptedClient {
    fn platform_name(&self) -> &str {
        "Scripted"
    }
}

impl TransferClient for ScriptedClient {
    fn start_upload(
        &self,
        _local_path: &Path,
        bucket: &str,
        key: &str,
        _content_type: Option<&str>,
    ) -> Result<TransferId> {
        self.start(format!("upload {bucket}/{key}"))
    }

    fn start_download(&self, _local_path: &Path, bucket: &str, key: &str) -> Result<TransferId> {
        self.start(format!("download {bucket}/{key}"))
    }
}

impl TransferControl for ScriptedClient {
    fn pause(&self, id: TransferId) -> Result<()> {
        self.record(format!("pause {id}"));
        Ok(())
    }

    fn resume(&self, id: TransferId) -> Result<()> {
        self.record(format!("resume {id}"));
        Ok(())
    }

    fn cancel(&self, id: TransferId) -> Result<()> {
        self.record(format!("cancel {id}"));
        Ok(())
    }
}

/// Poll `condition` until it holds, giving the callback pump time to run.
pub async fn eventually(mut condition: impl FnMut() -> bool) {
    for _ in 0..200 {
        if condition() {
            return;
        }
        tokio::time::sleep(Duration::from_millis(2)).await;
    }
    panic!("condition not reached");
}
