// SPDX-License-Identifier: PMPL-1.0-or-later
// Copyright (c) 2026 Jonathan D.A. Jewell (hyperpolymath) <jonathan.jewell@open.ac.uk>
//
// Application configuration.

use std::path::PathBuf;

use serde::{Deserialize, Serialize};

/// Persistent bridge settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct AppConfig {
    /// Root directory of the filesystem-backed object store. Each bucket is a
    /// subdirectory. `None` places it under the application data directory.
    pub storage_root: Option<PathBuf>,
    /// Bytes copied per chunk by the filesystem client (one progress tick each).
    pub chunk_size: usize,
    /// Artificial delay between chunks, in milliseconds. Zero disables it.
    pub chunk_delay_ms: u64,
    /// Capacity of the outbound `onTransferStateChanged` queue. Events that
    /// do not fit are dropped.
    pub event_queue_capacity: usize,
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            storage_root: None,
            chunk_size: 64 * 1024,
            chunk_delay_ms: 0,
            event_queue_capacity: 256,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn partial_json_falls_back_to_defaults() {
        let config: AppConfig = serde_json::from_str(r#"{"chunk_size": 1024}"#).unwrap();
        assert_eq!(config.chunk_size, 1024);
        assert_eq!(config.event_queue_capacity, 256);
        assert!(config.storage_root.is_none());
    }
}
