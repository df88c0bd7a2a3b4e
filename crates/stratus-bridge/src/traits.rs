// SPDX-License-Identifier: PMPL-1.0-or-later
// Copyright (c) 2026 Jonathan D.A. Jewell (hyperpolymath) <jonathan.jewell@open.ac.uk>
//
// Platform-agnostic trait definitions for the external storage client.
//
// The client owns the real transfer engine. Stratus only starts transfers,
// forwards control requests, and consumes the callbacks below.

use std::path::Path;

use stratus_core::error::Result;
use stratus_core::types::TransferId;
use tokio::sync::mpsc;

/// Unified client handle that groups every capability the coordinator needs.
pub trait StorageClient: TransferClient + TransferControl + Send + Sync {
    /// Human-readable backend name (e.g. "Local filesystem", "Android SDK").
    fn platform_name(&self) -> &str;
}

/// Create transfers.
///
/// Both methods must return without waiting for any bytes to move. The
/// coordinator calls them with its registry lock held, from async context:
/// limit the work to cheap local checks (path and bucket metadata) and hand
/// everything else to a worker task. The returned id is assigned by the
/// client and stays stable for the transfer's lifetime. Rejections (bad
/// path, missing bucket, no credentials) are reported as
/// `StratusError::InitFailed`.
pub trait TransferClient {
    fn start_upload(
        &self,
        local_path: &Path,
        bucket: &str,
        key: &str,
        content_type: Option<&str>,
    ) -> Result<TransferId>;

    fn start_download(&self, local_path: &Path, bucket: &str, key: &str) -> Result<TransferId>;
}

/// Control transfers that are already running.
///
/// Cancellation is fire-and-forget: the client sends no confirmation.
pub trait TransferControl {
    fn pause(&self, id: TransferId) -> Result<()>;

    fn resume(&self, id: TransferId) -> Result<()>;

    fn cancel(&self, id: TransferId) -> Result<()>;
}

/// Callback emitted by the storage client from its own worker tasks.
#[derive(Debug, Clone, PartialEq)]
pub enum ClientEvent {
    /// Completion ratio in `[0.0, 1.0]`.
    Progress { id: TransferId, fraction: f64 },
    Completed { id: TransferId },
    Failed { id: TransferId, message: String },
}

impl ClientEvent {
    pub fn id(&self) -> TransferId {
        match self {
            Self::Progress { id, .. } | Self::Completed { id } | Self::Failed { id, .. } => *id,
        }
    }
}

/// Producer half handed to the storage client.
pub type ClientEventSender = mpsc::UnboundedSender<ClientEvent>;

/// Consumer half drained by the transfer coordinator.
pub type ClientEventReceiver = mpsc::UnboundedReceiver<ClientEvent>;

/// Create the callback channel between a storage client and the coordinator.
pub fn client_event_channel() -> (ClientEventSender, ClientEventReceiver) {
    mpsc::unbounded_channel()
}
