// SPDX-License-Identifier: PMPL-1.0-or-later
// Copyright (c) 2026 Jonathan D.A. Jewell (hyperpolymath) <jonathan.jewell@open.ac.uk>
//
// Transfer coordinator: the public face of the transfer layer.
//
// Control requests go to the injected storage client; callbacks from the
// client are drained by a single pump task, applied to the registry, and
// relayed to the host for subscribed transfers.  Every registry access,
// including the client calls that must be atomic with a state change, happens
// under one mutex.
//
// Cancellation: the storage client never confirms a cancel, so a transfer is
// marked `Cancelled` as soon as the client accepts the request.  Nothing is
// relayed for a cancellation.

use std::sync::{Arc, Mutex, MutexGuard};

use tokio::runtime::Handle;
use tokio::task::JoinHandle;
use tracing::{debug, info, instrument, warn};

use stratus_bridge::traits::{ClientEvent, ClientEventReceiver, StorageClient};
use stratus_core::AppConfig;
use stratus_core::error::{Result, StratusError};
use stratus_core::types::{
    Direction, DirectionFilter, Transfer, TransferEvent, TransferId, TransferRequest,
    TransferState,
};

use crate::registry::TransferRegistry;
use crate::relay::{EventRelay, EventStream};

/// Accepts start/pause/resume/cancel/subscribe/unsubscribe requests and relays
/// storage-client callbacks.
pub struct TransferCoordinator {
    client: Arc<dyn StorageClient>,
    registry: Arc<Mutex<TransferRegistry>>,
    relay: Arc<EventRelay>,
    pump: JoinHandle<()>,
}

impl TransferCoordinator {
    /// Build a coordinator around `client` and start draining `callbacks`.
    ///
    /// Returns the coordinator and the outbound event stream. Must be called
    /// from within a tokio runtime.
    pub fn new(
        client: Arc<dyn StorageClient>,
        callbacks: ClientEventReceiver,
        config: &AppConfig,
    ) -> Result<(Self, EventStream)> {
        let runtime = Handle::try_current()
            .map_err(|e| StratusError::Client(format!("no tokio runtime: {e}")))?;

        let registry = Arc::new(Mutex::new(TransferRegistry::new()));
        let (relay, stream) = EventRelay::channel(config.event_queue_capacity);
        let relay = Arc::new(relay);

        let pump = runtime.spawn(pump_callbacks(
            callbacks,
            Arc::clone(&registry),
            Arc::clone(&relay),
        ));

        info!(client = client.platform_name(), "transfer coordinator started");
        Ok((
            Self {
                client,
                registry,
                relay,
                pump,
            },
            stream,
        ))
    }

    /// Start an upload or download.
    ///
    /// The transfer is registered as `Pending` before any callback for it can
    /// be applied. A rejection by the storage client is reported as
    /// `InitFailed` and leaves the registry untouched.
    #[instrument(skip(self, request), fields(direction = ?request.direction, bucket = %request.bucket, key = %request.key))]
    pub fn start(&self, request: TransferRequest) -> Result<TransferId> {
        let mut registry = self.registry();

        let started = match request.direction {
            Direction::Upload => self.client.start_upload(
                &request.local_path,
                &request.bucket,
                &request.key,
                request.content_type.as_deref(),
            ),
            Direction::Download => {
                self.client
                    .start_download(&request.local_path, &request.bucket, &request.key)
            }
        };
        let id = started.map_err(|e| {
            warn!(error = %e, "storage client rejected transfer");
            match e {
                StratusError::InitFailed(message) => StratusError::InitFailed(message),
                other => StratusError::InitFailed(other.to_string()),
            }
        })?;

        let transfer = Transfer::new(id, request);
        if let Err(e) = registry.register(transfer.clone()) {
            warn!(transfer_id = %id, error = %e, "storage client reused a live id, overwriting entry");
            registry.replace(transfer);
        }

        info!(transfer_id = %id, "transfer started");
        Ok(id)
    }

    /// Pause a pending or running transfer. `false` if unknown or terminal.
    #[instrument(skip(self))]
    pub fn pause(&self, id: TransferId) -> bool {
        let mut registry = self.registry();
        self.pause_locked(&mut registry, id)
    }

    /// Resume a paused transfer, echoing its id. `None` if unknown or terminal.
    ///
    /// Resuming a transfer that is not paused is a no-op that still echoes.
    #[instrument(skip(self))]
    pub fn resume(&self, id: TransferId) -> Option<TransferId> {
        let mut registry = self.registry();
        self.resume_locked(&mut registry, id)
    }

    /// Cancel a non-terminal transfer. `false` if unknown or already terminal.
    #[instrument(skip(self))]
    pub fn cancel(&self, id: TransferId) -> bool {
        let mut registry = self.registry();
        self.cancel_locked(&mut registry, id)
    }

    /// Attach the listener for `id`. Past events are not replayed.
    #[instrument(skip(self))]
    pub fn subscribe(&self, id: TransferId) -> Option<TransferId> {
        let mut registry = self.registry();
        match registry.update(id, |t| {
            t.subscribed = true;
            t.touch();
        }) {
            Ok(()) => {
                debug!(transfer_id = %id, "listener attached");
                Some(id)
            }
            Err(_) => {
                debug!(transfer_id = %id, "subscribe: unknown transfer");
                None
            }
        }
    }

    /// Detach the listener and drop the registry entry.
    ///
    /// Callbacks that arrive for `id` afterwards are discarded.
    #[instrument(skip(self))]
    pub fn unsubscribe(&self, id: TransferId) -> Option<TransferId> {
        let mut registry = self.registry();
        match registry.remove(id) {
            Some(transfer) => {
                debug!(transfer_id = %id, state = ?transfer.state, "listener detached");
                Some(id)
            }
            None => {
                debug!(transfer_id = %id, "unsubscribe: unknown transfer");
                None
            }
        }
    }

    /// Pause every pending or running transfer matching `filter`.
    ///
    /// Returns the ids that were paused.
    #[instrument(skip(self))]
    pub fn pause_all(&self, filter: DirectionFilter) -> Vec<TransferId> {
        let mut registry = self.registry();
        let candidates = registry.ids_matching(filter, |s| {
            matches!(s, TransferState::Pending | TransferState::InProgress)
        });
        candidates
            .into_iter()
            .filter(|&id| self.pause_locked(&mut registry, id))
            .collect()
    }

    /// Resume every paused transfer matching `filter`.
    ///
    /// Returns the ids that were resumed.
    #[instrument(skip(self))]
    pub fn resume_all(&self, filter: DirectionFilter) -> Vec<TransferId> {
        let mut registry = self.registry();
        let candidates = registry.ids_matching(filter, |s| s == TransferState::Paused);
        candidates
            .into_iter()
            .filter_map(|id| self.resume_locked(&mut registry, id))
            .collect()
    }

    /// Cancel every non-terminal transfer matching `filter`.
    ///
    /// Returns the ids that were cancelled.
    #[instrument(skip(self))]
    pub fn cancel_all(&self, filter: DirectionFilter) -> Vec<TransferId> {
        let mut registry = self.registry();
        let candidates = registry.ids_matching(filter, |s| !s.is_terminal());
        candidates
            .into_iter()
            .filter(|&id| self.cancel_locked(&mut registry, id))
            .collect()
    }

    /// Snapshot of one transfer.
    pub fn transfer(&self, id: TransferId) -> Option<Transfer> {
        self.registry().lookup(id).cloned()
    }

    /// Snapshot of every registered transfer, oldest first.
    pub fn transfers(&self) -> Vec<Transfer> {
        self.registry().snapshot()
    }

    /// Events dropped because the host was not keeping up or had gone away.
    pub fn dropped_events(&self) -> u64 {
        self.relay.dropped()
    }

    pub fn client_name(&self) -> &str {
        self.client.platform_name()
    }

    /// Stop relaying callbacks and release the storage client.
    ///
    /// Transfers already handed to the client are not cancelled.
    pub fn shutdown(self) {
        info!(
            registered = self.registry().len(),
            dropped_events = self.relay.dropped(),
            "transfer coordinator shutting down"
        );
        // Drop aborts the pump.
    }

    // -- Locked helpers ------------------------------------------------------

    fn registry(&self) -> MutexGuard<'_, TransferRegistry> {
        lock(&self.registry)
    }

    fn pause_locked(&self, registry: &mut TransferRegistry, id: TransferId) -> bool {
        let Some(state) = registry.lookup(id).map(|t| t.state) else {
            debug!(transfer_id = %id, "pause: unknown transfer");
            return false;
        };
        match state {
            TransferState::Paused => true,
            s if s.is_terminal() => {
                debug!(transfer_id = %id, state = ?s, "pause: transfer already finished");
                false
            }
            _ => {
                if let Err(e) = self.client.pause(id) {
                    warn!(transfer_id = %id, error = %e, "storage client refused pause");
                    return false;
                }
                set_state(registry, id, TransferState::Paused)
            }
        }
    }

    fn resume_locked(&self, registry: &mut TransferRegistry, id: TransferId) -> Option<TransferId> {
        let Some(state) = registry.lookup(id).map(|t| t.state) else {
            debug!(transfer_id = %id, "resume: unknown transfer");
            return None;
        };
        match state {
            TransferState::Paused => {
                if let Err(e) = self.client.resume(id) {
                    warn!(transfer_id = %id, error = %e, "storage client refused resume");
                    return None;
                }
                set_state(registry, id, TransferState::InProgress).then_some(id)
            }
            s if s.is_terminal() => {
                debug!(transfer_id = %id, state = ?s, "resume: transfer already finished");
                None
            }
            _ => Some(id),
        }
    }

    fn cancel_locked(&self, registry: &mut TransferRegistry, id: TransferId) -> bool {
        let Some(state) = registry.lookup(id).map(|t| t.state) else {
            debug!(transfer_id = %id, "cancel: unknown transfer");
            return false;
        };
        if state.is_terminal() {
            debug!(transfer_id = %id, state = ?state, "cancel: transfer already finished");
            return false;
        }
        if let Err(e) = self.client.cancel(id) {
            warn!(transfer_id = %id, error = %e, "storage client refused cancel");
            return false;
        }
        set_state(registry, id, TransferState::Cancelled)
    }
}

impl Drop for TransferCoordinator {
    fn drop(&mut self) {
        self.pump.abort();
    }
}

// ---------------------------------------------------------------------------
// Callback handling
// ---------------------------------------------------------------------------

/// Drain client callbacks until the client side of the channel closes.
async fn pump_callbacks(
    mut callbacks: ClientEventReceiver,
    registry: Arc<Mutex<TransferRegistry>>,
    relay: Arc<EventRelay>,
) {
    while let Some(event) = callbacks.recv().await {
        apply_client_event(&registry, &relay, event);
    }
    debug!("storage client callback channel closed");
}

/// Apply one callback to the registry and relay the resulting event if the
/// transfer is subscribed.
///
/// Callbacks for unknown or terminal transfers are discarded.
fn apply_client_event(registry: &Mutex<TransferRegistry>, relay: &EventRelay, event: ClientEvent) {
    let id = event.id();
    let mut registry = lock(registry);

    let outcome = registry.update(id, |t| {
        if t.state.is_terminal() {
            return None;
        }
        let relayed = match event {
            ClientEvent::Progress { fraction, .. } => {
                if !fraction.is_nan() {
                    t.progress_fraction = fraction.clamp(0.0, 1.0);
                }
                if t.state == TransferState::Pending {
                    t.state = TransferState::InProgress;
                }
                TransferEvent::progress(id, t.progress_fraction)
            }
            ClientEvent::Completed { .. } => {
                t.state = TransferState::Completed;
                t.progress_fraction = 1.0;
                TransferEvent::completed(id)
            }
            ClientEvent::Failed { message, .. } => {
                t.state = TransferState::Error;
                t.error_message = Some(message);
                TransferEvent::error(id)
            }
        };
        t.touch();
        Some((relayed, t.subscribed, t.error_message.clone()))
    });

    match outcome {
        Err(_) => debug!(transfer_id = %id, "discarding callback for unknown transfer"),
        Ok(None) => debug!(transfer_id = %id, "discarding late callback for finished transfer"),
        Ok(Some((event, true, _))) => {
            relay.forward(event);
        }
        Ok(Some((event, false, error))) => {
            if let Some(error) = error.filter(|_| event.is_terminal()) {
                warn!(transfer_id = %id, error = %error, "transfer failed with no listener attached");
            }
        }
    }
}

fn set_state(registry: &mut TransferRegistry, id: TransferId, state: TransferState) -> bool {
    registry
        .update(id, |t| {
            t.state = state;
            t.touch();
        })
        .is_ok()
}

fn lock<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
}
