// SPDX-License-Identifier: PMPL-1.0-or-later
// Copyright (c) 2026 Jonathan D.A. Jewell (hyperpolymath) <jonathan.jewell@open.ac.uk>
//
// Outbound `onTransferStateChanged` channel.
//
// Delivery is one-way and at-most-once.  Events are pushed onto a bounded
// queue without waiting; if the queue is full or the receiver has gone away
// the event is dropped and counted.  There is no replay.

use std::sync::atomic::{AtomicU64, Ordering};

use tokio::sync::mpsc;
use tokio::sync::mpsc::error::TrySendError;
use tracing::{debug, warn};

use stratus_core::types::TransferEvent;

/// Receiving end handed to the host application.
pub type EventStream = mpsc::Receiver<TransferEvent>;

/// Sending end of the outbound event channel.
pub struct EventRelay {
    outbound: mpsc::Sender<TransferEvent>,
    dropped: AtomicU64,
}

impl EventRelay {
    /// Create a relay with room for `capacity` undelivered events.
    pub fn channel(capacity: usize) -> (Self, EventStream) {
        let (outbound, stream) = mpsc::channel(capacity.max(1));
        let relay = Self {
            outbound,
            dropped: AtomicU64::new(0),
        };
        (relay, stream)
    }

    /// Push one event. Returns `false` if it was dropped.
    pub fn forward(&self, event: TransferEvent) -> bool {
        match self.outbound.try_send(event) {
            Ok(()) => true,
            Err(TrySendError::Full(event)) => {
                self.dropped.fetch_add(1, Ordering::Relaxed);
                warn!(transfer_id = %event.id, state = ?event.transfer_state, "event queue full, dropping event");
                false
            }
            Err(TrySendError::Closed(event)) => {
                self.dropped.fetch_add(1, Ordering::Relaxed);
                debug!(transfer_id = %event.id, "event receiver gone, dropping event");
                false
            }
        }
    }

    /// Number of events dropped since creation.
    pub fn dropped(&self) -> u64 {
        self.dropped.load(Ordering::Relaxed)
    }
}
