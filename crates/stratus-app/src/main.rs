// SPDX-License-Identifier: PMPL-1.0-or-later
// Copyright (c) 2026 Jonathan D.A. Jewell (hyperpolymath) <jonathan.jewell@open.ac.uk>
//
// Stratus: object-storage transfer bridge
//
// Entry point. Initialises logging and backend services, then serves the
// method channel over stdin/stdout.  Logs go to stderr so stdout carries only
// channel traffic.

mod services;

use std::process::ExitCode;

use tokio::io::BufReader;

use services::app_services::AppServices;

#[tokio::main]
async fn main() -> ExitCode {
    tracing_subscriber::fmt()
        .with_writer(std::io::stderr)
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info")),
        )
        .init();

    tracing::info!("Stratus starting");

    let (svc, events) = match AppServices::init() {
        Ok(started) => started,
        Err(e) => {
            tracing::error!(error = %e, "backend services failed to start");
            return ExitCode::FAILURE;
        }
    };

    let input = BufReader::new(tokio::io::stdin());
    match services::host::run(svc, events, input, tokio::io::stdout()).await {
        Ok(_) => ExitCode::SUCCESS,
        Err(e) => {
            tracing::error!(error = %e, "host loop failed");
            ExitCode::FAILURE
        }
    }
}
