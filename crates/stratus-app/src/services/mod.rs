// SPDX-License-Identifier: PMPL-1.0-or-later
// Copyright (c) 2026 Jonathan D.A. Jewell (hyperpolymath) <jonathan.jewell@open.ac.uk>
//
// Service layer: bridges the host application to the stratus backend crates.
//
// `app_services` owns the storage client and coordinator, `method_channel`
// decodes named calls onto them, and `host` runs the JSON-lines loop.

pub mod app_services;
pub mod data_dir;
pub mod host;
pub mod method_channel;
