// SPDX-License-Identifier: PMPL-1.0-or-later
// Copyright (c) 2026 Jonathan D.A. Jewell (hyperpolymath) <jonathan.jewell@open.ac.uk>

//! Stratus storage client bridge.
//!
//! Defines the seam between the transfer coordinator and whatever client
//! actually moves bytes to and from object storage. On mobile targets that
//! client is the vendor SDK, wired in by the host application; desktop and CI
//! builds get a filesystem-backed object store so the full pipeline runs
//! without network access.

use std::path::PathBuf;
use std::sync::Arc;

use stratus_core::AppConfig;
use stratus_core::error::Result;

pub mod local;
pub mod stub;
pub mod traits;

pub use traits::{
    ClientEvent, ClientEventReceiver, ClientEventSender, StorageClient, TransferClient,
    TransferControl, client_event_channel,
};

/// Build the storage client for the target operating system.
///
/// `storage_root` is only used by the filesystem client. Callbacks are
/// delivered on `events`.
///
/// Must be called from within a tokio runtime.
pub fn storage_client(
    config: &AppConfig,
    storage_root: PathBuf,
    events: ClientEventSender,
) -> Result<Arc<dyn StorageClient>> {
    #[cfg(any(target_os = "ios", target_os = "android"))]
    {
        // The vendor SDK is registered by the host app; nothing to build here.
        let _ = (config, storage_root, events);
        Ok(Arc::new(stub::StubStorageClient))
    }
    #[cfg(not(any(target_os = "ios", target_os = "android")))]
    {
        let client = local::LocalStorageClient::new(storage_root, config, events)?;
        Ok(Arc::new(client))
    }
}
