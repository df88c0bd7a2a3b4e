// SPDX-License-Identifier: PMPL-1.0-or-later
// Copyright (c) 2026 Jonathan D.A. Jewell (hyperpolymath) <jonathan.jewell@open.ac.uk>
//
// Stratus transfer layer: registry, coordinator and outbound event relay.
// This crate sits between the storage client defined in `stratus-bridge` and
// the host application's method channel.

pub mod coordinator;
pub mod registry;
pub mod relay;

#[cfg(test)]
mod testing;

pub use coordinator::TransferCoordinator;
pub use registry::TransferRegistry;
pub use relay::{EventRelay, EventStream};
