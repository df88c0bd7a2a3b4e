// SPDX-License-Identifier: PMPL-1.0-or-later
// Copyright (c) 2026 Jonathan D.A. Jewell (hyperpolymath) <jonathan.jewell@open.ac.uk>
//
// In-memory transfer registry.
//
// The registry is the single owner of every `Transfer`.  It does no locking
// of its own: the coordinator keeps it behind one mutex so that callback
// handling and control operations are serialised.

use std::collections::HashMap;

use tracing::debug;

use stratus_core::error::{Result, StratusError};
use stratus_core::types::{DirectionFilter, Transfer, TransferId, TransferState};

/// Map from transfer id to transfer state.
#[derive(Debug, Default)]
pub struct TransferRegistry {
    transfers: HashMap<TransferId, Transfer>,
}

impl TransferRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Insert a new transfer.
    ///
    /// Fails with `DuplicateTransfer` if the id is already present; the
    /// existing entry is left untouched.
    pub fn register(&mut self, transfer: Transfer) -> Result<()> {
        if self.transfers.contains_key(&transfer.id) {
            return Err(StratusError::DuplicateTransfer(transfer.id));
        }
        debug!(transfer_id = %transfer.id, "transfer registered");
        self.transfers.insert(transfer.id, transfer);
        Ok(())
    }

    /// Insert or overwrite, returning the previous entry.
    pub fn replace(&mut self, transfer: Transfer) -> Option<Transfer> {
        self.transfers.insert(transfer.id, transfer)
    }

    /// Returns `None` for unknown ids.
    pub fn lookup(&self, id: TransferId) -> Option<&Transfer> {
        self.transfers.get(&id)
    }

    /// Remove an entry. No-op if absent.
    pub fn remove(&mut self, id: TransferId) -> Option<Transfer> {
        let removed = self.transfers.remove(&id);
        if removed.is_some() {
            debug!(transfer_id = %id, "transfer removed");
        }
        removed
    }

    /// Apply `mutation` to the entry for `id`.
    ///
    /// Fails with `UnknownTransfer` if absent. The mutation is responsible for
    /// calling `Transfer::touch` when it changes anything.
    pub fn update<R>(&mut self, id: TransferId, mutation: impl FnOnce(&mut Transfer) -> R) -> Result<R> {
        let transfer = self
            .transfers
            .get_mut(&id)
            .ok_or(StratusError::UnknownTransfer(id))?;
        Ok(mutation(transfer))
    }

    /// Ids of transfers whose direction matches `filter` and whose state
    /// satisfies `state`, in ascending id order.
    pub fn ids_matching(
        &self,
        filter: DirectionFilter,
        state: impl Fn(TransferState) -> bool,
    ) -> Vec<TransferId> {
        let mut ids: Vec<TransferId> = self
            .transfers
            .values()
            .filter(|t| filter.matches(t.direction) && state(t.state))
            .map(|t| t.id)
            .collect();
        ids.sort_unstable();
        ids
    }

    /// Clones of every transfer, oldest first.
    pub fn snapshot(&self) -> Vec<Transfer> {
        let mut all: Vec<Transfer> = self.transfers.values().cloned().collect();
        all.sort_by(|a, b| a.created_at.cmp(&b.created_at).then(a.id.cmp(&b.id)));
        all
    }

    pub fn len(&self) -> usize {
        self.transfers.len()
    }

    pub fn is_empty(&self) -> bool {
        self.transfers.is_empty()
    }
}
