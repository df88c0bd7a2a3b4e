// SPDX-License-Identifier: PMPL-1.0-or-later
// Copyright (c) 2026 Jonathan D.A. Jewell (hyperpolymath) <jonathan.jewell@open.ac.uk>
//
// JSON-lines host loop.
//
// One method call per input line, one reply per call, and one line per relayed
// `onTransferStateChanged` event.  Replies and events share a single writer
// task so lines never interleave.

use serde::{Deserialize, Serialize};
use serde_json::Value;
use tokio::io::{AsyncBufRead, AsyncBufReadExt, AsyncWrite, AsyncWriteExt};
use tokio::sync::mpsc;
use tracing::{debug, error, info, warn};

use stratus_core::error::{Result, StratusError};
use stratus_core::types::{ON_TRANSFER_STATE_CHANGED, TransferEvent};
use stratus_transfer::EventStream;

use super::app_services::AppServices;
use super::method_channel::{MethodCall, MethodChannel, MethodResponse};

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct Request {
    #[serde(default)]
    call_id: Option<u64>,
    method: String,
    #[serde(default)]
    arguments: Value,
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct Reply<'a> {
    call_id: Option<u64>,
    result: &'a MethodResponse,
}

#[derive(Serialize)]
struct Notification<'a> {
    method: &'static str,
    arguments: &'a TransferEvent,
}

/// Serve method calls from `input` until it closes, writing replies and
/// events to `output`.
///
/// On end of input the coordinator is shut down, events already queued are
/// flushed, and `output` is handed back.
pub async fn run<R, W>(services: AppServices, events: EventStream, input: R, output: W) -> Result<W>
where
    R: AsyncBufRead + Unpin,
    W: AsyncWrite + Unpin + Send + 'static,
{
    let (lines_tx, lines_rx) = mpsc::unbounded_channel();
    let writer = tokio::spawn(write_lines(output, lines_rx));
    let relay = tokio::spawn(relay_events(events, lines_tx.clone()));

    let channel = MethodChannel::new(services.coordinator());
    let mut lines = input.lines();
    let mut handled: u64 = 0;
    loop {
        let line = match lines.next_line().await {
            Ok(Some(line)) => line,
            Ok(None) => break,
            Err(e) => {
                error!(error = %e, "input stream unreadable, stopping");
                break;
            }
        };
        let line = line.trim();
        if line.is_empty() {
            continue;
        }

        let (call_id, result) = dispatch(&channel, line);
        handled += 1;
        let Some(reply) = encode(&Reply {
            call_id,
            result: &result,
        }) else {
            continue;
        };
        if lines_tx.send(reply).is_err() {
            warn!("output closed, stopping");
            break;
        }
    }
    info!(
        handled,
        dropped_events = services.coordinator().dropped_events(),
        "input closed, shutting down"
    );

    // Shutting down the coordinator closes the event stream once the relay
    // has drained it.
    drop(channel);
    services.shutdown();
    if let Err(e) = relay.await {
        warn!(error = %e, "event relay task ended abnormally");
    }
    drop(lines_tx);

    let output = writer
        .await
        .map_err(|e| StratusError::Client(format!("output writer task failed: {e}")))??;
    Ok(output)
}

fn dispatch(channel: &MethodChannel, line: &str) -> (Option<u64>, MethodResponse) {
    match serde_json::from_str::<Request>(line) {
        Ok(request) => {
            debug!(call_id = ?request.call_id, method = %request.method, "method call");
            let call = MethodCall {
                method: request.method,
                arguments: request.arguments,
            };
            (request.call_id, channel.handle(&call))
        }
        Err(e) => {
            warn!(error = %e, "malformed method call");
            let err = StratusError::InvalidArguments(e.to_string());
            (None, MethodResponse::error(&err))
        }
    }
}

async fn relay_events(mut events: EventStream, lines: mpsc::UnboundedSender<String>) {
    while let Some(event) = events.recv().await {
        let notification = Notification {
            method: ON_TRANSFER_STATE_CHANGED,
            arguments: &event,
        };
        let Some(line) = encode(&notification) else {
            continue;
        };
        if lines.send(line).is_err() {
            debug!("output closed, dropping remaining events");
            break;
        }
    }
}

async fn write_lines<W>(mut output: W, mut lines: mpsc::UnboundedReceiver<String>) -> std::io::Result<W>
where
    W: AsyncWrite + Unpin,
{
    while let Some(mut line) = lines.recv().await {
        line.push('\n');
        output.write_all(line.as_bytes()).await?;
        output.flush().await?;
    }
    Ok(output)
}

fn encode<T: Serialize>(value: &T) -> Option<String> {
    match serde_json::to_string(value) {
        Ok(line) => Some(line),
        Err(e) => {
            error!(error = %e, "failed to encode output line");
            None
        }
    }
}
