//! Stdin/stdout JSON bridge for the host command channel.
//!
//! Reads newline-delimited JSON `CommandEnvelope` messages, dispatches each
//! on its own task through [`HostCommandHandler`], and writes
//! `ResponseEnvelope` messages as newline-delimited JSON.  Responses may be
//! written out of order; hosts correlate them by `request_id`.
//!
//! Stdout is exclusively reserved for the JSON protocol; all diagnostic
//! output (tracing, logs) must be routed to stderr.

use std::sync::Arc;
use tokio::io::{AsyncBufRead, AsyncBufReadExt, AsyncWrite, AsyncWriteExt, BufReader, BufWriter};
use tokio::sync::Mutex;
use tokio::task::JoinSet;

use crate::error::{PimError, Result, error_codes};
use crate::host::contract::{CommandEnvelope, CommandName, ResponseEnvelope};
use crate::host::handler::HostCommandHandler;

/// Run the bridge over the process's stdin and stdout until stdin closes or
/// a `runtime.stop` command is received.
pub async fn run_stdio_bridge(handler: HostCommandHandler) -> Result<()> {
    let reader = BufReader::new(tokio::io::stdin());
    let writer = BufWriter::new(tokio::io::stdout());
    run_bridge(handler, reader, writer).await
}

/// Run the bridge over arbitrary line-oriented streams.
///
/// Requests are handled concurrently, so a slow native call for one
/// application never delays responses for another.  On EOF or
/// `runtime.stop` no further lines are read, and in-flight requests are
/// allowed to finish and respond before this returns.
pub async fn run_bridge<R, W>(handler: HostCommandHandler, mut reader: R, writer: W) -> Result<()>
where
    R: AsyncBufRead + Unpin,
    W: AsyncWrite + Unpin + Send + 'static,
{
    let writer = Arc::new(Mutex::new(writer));
    let mut in_flight = JoinSet::new();
    let mut line = String::new();

    loop {
        line.clear();
        let bytes_read = reader
            .read_line(&mut line)
            .await
            .map_err(|e| PimError::Protocol(format!("failed to read command stream: {e}")))?;

        if bytes_read == 0 {
            tracing::info!("command stream closed (EOF); shutting down bridge");
            break;
        }

        let trimmed = line.trim();
        if trimmed.is_empty() {
            continue;
        }

        let envelope = match parse_envelope(trimmed) {
            Ok(env) => env,
            Err(response) => {
                let mut w = writer.lock().await;
                write_response(&mut *w, &response).await?;
                continue;
            }
        };

        if envelope.command == CommandName::RuntimeStop {
            let response = handler.route(&envelope).await;
            let mut w = writer.lock().await;
            write_response(&mut *w, &response).await?;
            tracing::info!("runtime.stop received; shutting down bridge");
            break;
        }

        let handler = handler.clone();
        let writer = Arc::clone(&writer);
        in_flight.spawn(async move {
            let response = handler.route(&envelope).await;
            let mut w = writer.lock().await;
            write_response(&mut *w, &response).await
        });

        // Reap finished requests so the set does not grow unbounded.
        while let Some(done) = in_flight.try_join_next() {
            report_task(done);
        }
    }

    while let Some(done) = in_flight.join_next().await {
        report_task(done);
    }
    Ok(())
}

fn report_task(done: std::result::Result<Result<()>, tokio::task::JoinError>) {
    match done {
        Ok(Ok(())) => {}
        Ok(Err(e)) => tracing::warn!(error = %e, "failed to write response"),
        Err(e) => tracing::error!(error = %e, "request task panicked or was cancelled"),
    }
}

/// Parse one line, or produce the error response to send back.
fn parse_envelope(line: &str) -> std::result::Result<CommandEnvelope, ResponseEnvelope> {
    let value: serde_json::Value = serde_json::from_str(line).map_err(|e| {
        tracing::warn!(error = %e, "failed to parse command envelope");
        ResponseEnvelope::error(
            "parse-error",
            error_codes::PROTOCOL_ERROR,
            format!("failed to parse command envelope: {e}"),
        )
    })?;
    let request_id = value
        .get("request_id")
        .and_then(serde_json::Value::as_str)
        .unwrap_or("parse-error")
        .to_owned();
    serde_json::from_value(value).map_err(|e| {
        tracing::warn!(error = %e, %request_id, "invalid command envelope");
        ResponseEnvelope::error(
            request_id,
            error_codes::PROTOCOL_ERROR,
            format!("invalid command envelope: {e}"),
        )
    })
}

/// Write a single JSON line and flush.
async fn write_response<W: AsyncWrite + Unpin>(
    writer: &mut W,
    response: &ResponseEnvelope,
) -> Result<()> {
    let json = serde_json::to_string(response)
        .map_err(|e| PimError::Protocol(format!("failed to serialize response envelope: {e}")))?;
    writer.write_all(json.as_bytes()).await?;
    writer.write_all(b"\n").await?;
    writer.flush().await?;
    Ok(())
}
