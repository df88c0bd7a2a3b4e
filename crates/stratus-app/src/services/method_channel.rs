// SPDX-License-Identifier: PMPL-1.0-or-later
// Copyright (c) 2026 Jonathan D.A. Jewell (hyperpolymath) <jonathan.jewell@open.ac.uk>
//
// Named-method dispatch onto the transfer coordinator.
//
// Method names and argument keys follow the platform channel the host app
// already speaks: `upload`/`download` take `pathname`, `bucket`, `bucketKey`
// and (upload only) `contentType`; id-based calls take `{id}`; bulk calls take
// `{transferType: ANY|UPLOAD|DOWNLOAD}`.

use std::sync::Arc;

use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use serde_json::{Value, json};
use tracing::{debug, instrument, warn};

use stratus_core::error::StratusError;
use stratus_core::types::{DirectionFilter, TransferId, TransferRequest};
use stratus_transfer::TransferCoordinator;

/// One incoming call from the host application.
#[derive(Debug, Clone, Deserialize)]
pub struct MethodCall {
    pub method: String,
    #[serde(default)]
    pub arguments: Value,
}

/// Reply to a `MethodCall`.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub enum MethodResponse {
    Success(Value),
    NotImplemented,
    Error { code: String, message: String },
}

impl MethodResponse {
    pub fn error(err: &StratusError) -> Self {
        Self::Error {
            code: err.code().to_string(),
            message: err.to_string(),
        }
    }
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct StartArgs {
    pathname: String,
    bucket: String,
    bucket_key: String,
    #[serde(default)]
    content_type: Option<String>,
}

#[derive(Debug, Deserialize)]
struct IdArgs {
    id: u64,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct TransferTypeArgs {
    transfer_type: String,
}

/// Dispatches method calls by name.
#[derive(Clone)]
pub struct MethodChannel {
    coordinator: Arc<TransferCoordinator>,
}

impl MethodChannel {
    pub fn new(coordinator: Arc<TransferCoordinator>) -> Self {
        Self { coordinator }
    }

    #[instrument(skip(self, call), fields(method = %call.method))]
    pub fn handle(&self, call: &MethodCall) -> MethodResponse {
        let args = &call.arguments;
        let coordinator = &self.coordinator;

        match call.method.as_str() {
            "upload" => self.start(args, true),
            "download" => self.start(args, false),
            "pause" => with_id(args, |id| json!(coordinator.pause(id))),
            "resume" => with_id(args, |id| json!(coordinator.resume(id))),
            "cancel" => with_id(args, |id| json!(coordinator.cancel(id))),
            "startListeningTransferState" => with_id(args, |id| json!(coordinator.subscribe(id))),
            "stopListeningTransferState" => with_id(args, |id| json!(coordinator.unsubscribe(id))),
            "pauseAllWithType" => with_filter(args, |filter| {
                coordinator.pause_all(filter);
                Value::Null
            }),
            "resumeAllWithType" => with_filter(args, |filter| json!(coordinator.resume_all(filter))),
            "cancelAllWithType" => with_filter(args, |filter| {
                coordinator.cancel_all(filter);
                Value::Null
            }),
            other => {
                debug!(method = other, "method not implemented");
                MethodResponse::NotImplemented
            }
        }
    }

    fn start(&self, args: &Value, upload: bool) -> MethodResponse {
        let args: StartArgs = match decode(args) {
            Ok(args) => args,
            Err(e) => return MethodResponse::error(&e),
        };
        let request = if upload {
            TransferRequest::upload(args.pathname, args.bucket, args.bucket_key, args.content_type)
        } else {
            TransferRequest::download(args.pathname, args.bucket, args.bucket_key)
        };

        match self.coordinator.start(request) {
            Ok(id) => MethodResponse::Success(json!(id)),
            Err(e) => {
                warn!(error = %e, "transfer start failed");
                MethodResponse::error(&e)
            }
        }
    }
}

fn decode<T: DeserializeOwned>(args: &Value) -> Result<T, StratusError> {
    T::deserialize(args).map_err(|e| StratusError::InvalidArguments(e.to_string()))
}

fn with_id(args: &Value, op: impl FnOnce(TransferId) -> Value) -> MethodResponse {
    match decode::<IdArgs>(args) {
        Ok(IdArgs { id }) => MethodResponse::Success(op(TransferId(id))),
        Err(e) => MethodResponse::error(&e),
    }
}

fn with_filter(args: &Value, op: impl FnOnce(DirectionFilter) -> Value) -> MethodResponse {
    let args: TransferTypeArgs = match decode(args) {
        Ok(args) => args,
        Err(e) => return MethodResponse::error(&e),
    };
    match DirectionFilter::from_keyword(&args.transfer_type) {
        Some(filter) => MethodResponse::Success(op(filter)),
        None => MethodResponse::NotImplemented,
    }
}
