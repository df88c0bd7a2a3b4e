// SPDX-License-Identifier: PMPL-1.0-or-later
// Copyright (c) 2026 Jonathan D.A. Jewell (hyperpolymath) <jonathan.jewell@open.ac.uk>
//
// Core domain types for Stratus transfers.

use std::path::PathBuf;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Opaque identifier for a transfer, assigned by the storage client.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct TransferId(pub u64);

impl std::fmt::Display for TransferId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Which way the bytes flow.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum Direction {
    Upload,
    Download,
}

/// Selector for bulk operations.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum DirectionFilter {
    Any,
    Upload,
    Download,
}

impl DirectionFilter {
    pub fn matches(self, direction: Direction) -> bool {
        match self {
            Self::Any => true,
            Self::Upload => direction == Direction::Upload,
            Self::Download => direction == Direction::Download,
        }
    }

    /// Parse the `transferType` keyword used on the method channel.
    pub fn from_keyword(keyword: &str) -> Option<Self> {
        match keyword {
            "ANY" => Some(Self::Any),
            "UPLOAD" => Some(Self::Upload),
            "DOWNLOAD" => Some(Self::Download),
            _ => None,
        }
    }
}

/// Lifecycle states of a transfer.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum TransferState {
    /// Accepted by the storage client, no progress observed yet.
    Pending,
    /// Bytes are moving.
    InProgress,
    /// Suspended by the caller; resumable.
    Paused,
    /// Finished successfully.
    Completed,
    /// The storage client reported a failure.
    Error,
    /// Aborted by the caller.
    Cancelled,
}

impl TransferState {
    /// Terminal states accept no further transitions or events.
    pub fn is_terminal(self) -> bool {
        matches!(self, Self::Completed | Self::Error | Self::Cancelled)
    }
}

/// Everything needed to start a transfer.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TransferRequest {
    pub direction: Direction,
    pub local_path: PathBuf,
    pub bucket: String,
    pub key: String,
    /// Only meaningful for uploads.
    pub content_type: Option<String>,
}

impl TransferRequest {
    pub fn upload(
        local_path: impl Into<PathBuf>,
        bucket: impl Into<String>,
        key: impl Into<String>,
        content_type: Option<String>,
    ) -> Self {
        Self {
            direction: Direction::Upload,
            local_path: local_path.into(),
            bucket: bucket.into(),
            key: key.into(),
            content_type,
        }
    }

    pub fn download(
        local_path: impl Into<PathBuf>,
        bucket: impl Into<String>,
        key: impl Into<String>,
    ) -> Self {
        Self {
            direction: Direction::Download,
            local_path: local_path.into(),
            bucket: bucket.into(),
            key: key.into(),
            content_type: None,
        }
    }
}

/// One in-flight or finished upload/download.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Transfer {
    pub id: TransferId,
    pub direction: Direction,
    pub local_path: PathBuf,
    pub bucket: String,
    pub key: String,
    pub content_type: Option<String>,
    pub state: TransferState,
    /// Last observed completion ratio in `[0.0, 1.0]`.
    pub progress_fraction: f64,
    /// Whether a listener is attached.
    pub subscribed: bool,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
    /// Failure message reported by the storage client, if any.
    pub error_message: Option<String>,
}

impl Transfer {
    /// A freshly accepted transfer, in `Pending` state.
    pub fn new(id: TransferId, request: TransferRequest) -> Self {
        let now = Utc::now();
        Self {
            id,
            direction: request.direction,
            local_path: request.local_path,
            bucket: request.bucket,
            key: request.key,
            content_type: request.content_type,
            state: TransferState::Pending,
            progress_fraction: 0.0,
            subscribed: false,
            created_at: now,
            updated_at: now,
            error_message: None,
        }
    }

    /// Whole-number percentage of the last observed progress.
    pub fn progress_percent(&self) -> i32 {
        percent(self.progress_fraction)
    }

    /// Bump `updated_at` after a mutation.
    pub fn touch(&mut self) {
        self.updated_at = Utc::now();
    }
}

/// Name of the outbound event method on the platform channel.
pub const ON_TRANSFER_STATE_CHANGED: &str = "onTransferStateChanged";

/// Kind of event carried on the outbound channel.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum EventKind {
    ProgressChanged,
    Completed,
    Error,
}

/// Fixed-shape record relayed for every progress tick and terminal outcome.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TransferEvent {
    pub id: TransferId,
    pub transfer_state: EventKind,
    /// `0..=100`, or `-1` for errors.
    pub progress: i32,
}

impl TransferEvent {
    pub fn progress(id: TransferId, fraction: f64) -> Self {
        Self {
            id,
            transfer_state: EventKind::ProgressChanged,
            progress: percent(fraction),
        }
    }

    pub fn completed(id: TransferId) -> Self {
        Self {
            id,
            transfer_state: EventKind::Completed,
            progress: 100,
        }
    }

    pub fn error(id: TransferId) -> Self {
        Self {
            id,
            transfer_state: EventKind::Error,
            progress: -1,
        }
    }

    pub fn is_terminal(&self) -> bool {
        self.transfer_state != EventKind::ProgressChanged
    }
}

/// Convert a completion ratio to a truncated percentage in `0..=100`.
///
/// NaN is treated as no progress. The epsilon keeps ratios such as 0.57
/// from truncating to 56 through float error.
pub fn percent(fraction: f64) -> i32 {
    if fraction.is_nan() {
        return 0;
    }
    ((fraction.clamp(0.0, 1.0) * 100.0 + 1e-9).floor() as i32).min(100)
}
