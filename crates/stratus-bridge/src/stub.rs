// SPDX-License-Identifier: PMPL-1.0-or-later
// Copyright (c) 2026 Jonathan D.A. Jewell (hyperpolymath) <jonathan.jewell@open.ac.uk>
//
// Stub client for builds where no storage backend has been wired in.
//
// Every transfer is rejected at init and every control request fails with
// `PlatformUnavailable`.

use std::path::Path;

use stratus_core::error::{Result, StratusError};
use stratus_core::types::TransferId;

use crate::traits::*;

/// No-op client returned when the host has not provided a vendor SDK.
pub struct StubStorageClient;

impl StorageClient for StubStorageClient {
    fn platform_name(&self) -> &str {
        "Unavailable (stub)"
    }
}

impl TransferClient for StubStorageClient {
    fn start_upload(
        &self,
        _local_path: &Path,
        _bucket: &str,
        _key: &str,
        _content_type: Option<&str>,
    ) -> Result<TransferId> {
        tracing::warn!("TransferClient::start_upload called on stub client");
        Err(StratusError::InitFailed("no storage client available".into()))
    }

    fn start_download(&self, _local_path: &Path, _bucket: &str, _key: &str) -> Result<TransferId> {
        tracing::warn!("TransferClient::start_download called on stub client");
        Err(StratusError::InitFailed("no storage client available".into()))
    }
}

impl TransferControl for StubStorageClient {
    fn pause(&self, _id: TransferId) -> Result<()> {
        Err(StratusError::PlatformUnavailable)
    }

    fn resume(&self, _id: TransferId) -> Result<()> {
        Err(StratusError::PlatformUnavailable)
    }

    fn cancel(&self, _id: TransferId) -> Result<()> {
        Err(StratusError::PlatformUnavailable)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn stub_rejects_every_transfer() {
        let client = StubStorageClient;
        let err = client
            .start_download(Path::new("/tmp/out"), "bucket", "key")
            .unwrap_err();
        assert!(matches!(err, StratusError::InitFailed(_)));
        assert!(matches!(
            client.pause(TransferId(1)),
            Err(StratusError::PlatformUnavailable)
        ));
    }
}
