// SPDX-License-Identifier: PMPL-1.0-or-later
// Copyright (c) 2026 Jonathan D.A. Jewell (hyperpolymath) <jonathan.jewell@open.ac.uk>
//
// Central service layer. Builds the storage client and the transfer
// coordinator once at startup and tears them down on shutdown.
//
// The client handle is constructed here and injected into the coordinator;
// nothing in the process reaches for a global client.

use std::path::{Path, PathBuf};
use std::sync::Arc;

use stratus_bridge::stub::StubStorageClient;
use stratus_bridge::{client_event_channel, storage_client};
use stratus_core::AppConfig;
use stratus_core::error::Result;
use stratus_transfer::{EventStream, TransferCoordinator};
use tracing::{error, info, warn};

use super::data_dir;

/// Environment variable overriding the config file location.
pub const CONFIG_ENV: &str = "STRATUS_CONFIG";

const CONFIG_FILE: &str = "config.json";

/// Shared application services.
pub struct AppServices {
    coordinator: Arc<TransferCoordinator>,
    config: AppConfig,
    config_path: PathBuf,
}

impl AppServices {
    /// Initialise all services from the persisted config.  Call once at
    /// startup, inside the tokio runtime.
    pub fn init() -> Result<(Self, EventStream)> {
        let dir = data_dir::data_dir()?;
        info!(path = %dir.display(), "initialising app services");

        let config_path = std::env::var_os(CONFIG_ENV)
            .map(PathBuf::from)
            .unwrap_or_else(|| dir.join(CONFIG_FILE));
        let first_run = !config_path.exists();
        let config = load_config(&config_path).unwrap_or_default();
        let started = Self::with_config(config, config_path)?;

        // Write the defaults out on first run so they can be edited. A
        // malformed file is left alone.
        if first_run {
            if let Err(e) = started.0.save_config() {
                warn!(error = %e, "could not write default config");
            }
        }
        Ok(started)
    }

    /// Initialise services from an explicit config.
    pub fn with_config(config: AppConfig, config_path: PathBuf) -> Result<(Self, EventStream)> {
        let storage_root = match &config.storage_root {
            Some(root) => root.clone(),
            None => data_dir::data_subdir("buckets")?,
        };

        let (callbacks_tx, callbacks_rx) = client_event_channel();
        let client = match storage_client(&config, storage_root, callbacks_tx) {
            Ok(client) => client,
            Err(e) => {
                error!(error = %e, "storage client failed to start, every transfer will be rejected");
                Arc::new(StubStorageClient)
            }
        };

        let (coordinator, events) = TransferCoordinator::new(client, callbacks_rx, &config)?;
        info!(client = coordinator.client_name(), "app services initialised");

        Ok((
            Self {
                coordinator: Arc::new(coordinator),
                config,
                config_path,
            },
            events,
        ))
    }

    pub fn coordinator(&self) -> Arc<TransferCoordinator> {
        Arc::clone(&self.coordinator)
    }

    /// Persist the current config.
    pub fn save_config(&self) -> Result<()> {
        persist_config(&self.config_path, &self.config)
    }

    /// Tear down the coordinator.  Handles still held elsewhere keep it alive
    /// until they are dropped.
    pub fn shutdown(self) {
        match Arc::try_unwrap(self.coordinator) {
            Ok(coordinator) => coordinator.shutdown(),
            Err(_) => warn!("coordinator still shared at shutdown; releasing this handle only"),
        }
    }
}

// -- Config file persistence -------------------------------------------------

fn load_config(path: &Path) -> Option<AppConfig> {
    let data = std::fs::read_to_string(path).ok()?;
    match serde_json::from_str(&data) {
        Ok(config) => Some(config),
        Err(e) => {
            warn!(path = %path.display(), error = %e, "ignoring malformed config file");
            None
        }
    }
}

fn persist_config(path: &Path, config: &AppConfig) -> Result<()> {
    if let Some(parent) = path.parent() {
        std::fs::create_dir_all(parent)?;
    }
    let json = serde_json::to_string_pretty(config)?;
    std::fs::write(path, json)?;
    Ok(())
}
