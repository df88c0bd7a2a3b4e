// SPDX-License-Identifier: PMPL-1.0-or-later
// Copyright (c) 2026 Jonathan D.A. Jewell (hyperpolymath) <jonathan.jewell@open.ac.uk>
//
// Unified error types for Stratus.

use thiserror::Error;

use crate::types::TransferId;

/// Top-level error type for all Stratus operations.
///
/// An unknown transfer id in a control operation is not represented here:
/// the coordinator answers those with a typed negative result instead.
#[derive(Debug, Error)]
pub enum StratusError {
    // -- Transfer lifecycle --
    #[error("transfer initialisation failed: {0}")]
    InitFailed(String),

    #[error("transfer {0} is already registered")]
    DuplicateTransfer(TransferId),

    #[error("transfer {0} is not registered")]
    UnknownTransfer(TransferId),

    // -- Storage client --
    #[error("storage client error: {0}")]
    Client(String),

    #[error("feature not available on this platform")]
    PlatformUnavailable,

    // -- Method channel --
    #[error("invalid arguments: {0}")]
    InvalidArguments(String),

    // -- Configuration / persistence --
    #[error("configuration error: {0}")]
    Config(String),

    #[error("file I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("serialization error: {0}")]
    Serialization(#[from] serde_json::Error),
}

impl StratusError {
    /// Stable error code reported to the host application.
    pub fn code(&self) -> &'static str {
        match self {
            Self::InitFailed(_) => "INIT_FAILED",
            Self::DuplicateTransfer(_) => "DUPLICATE_ID",
            Self::UnknownTransfer(_) => "UNKNOWN_ID",
            Self::Client(_) => "CLIENT_ERROR",
            Self::PlatformUnavailable => "PLATFORM_UNAVAILABLE",
            Self::InvalidArguments(_) => "INVALID_ARGUMENTS",
            Self::Config(_) => "CONFIG_ERROR",
            Self::Io(_) => "IO_ERROR",
            Self::Serialization(_) => "SERIALIZATION_ERROR",
        }
    }
}

/// Alias used throughout the codebase.
pub type Result<T> = std::result::Result<T, StratusError>;
