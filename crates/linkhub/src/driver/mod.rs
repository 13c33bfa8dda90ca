//! NDJSON driver loop: one request per input line, one response per request.
//!
//! Unlike a session protocol, requests are independent, so a malformed line or
//! a version mismatch answers with an error and the loop keeps reading.

use crate::bridge::Bridge;
use crate::error::{BridgeError, BridgeResult};
use crate::model::driver::{DriverRequest, DriverResponse, DriverResponseStatus};
use crate::model::PROTOCOL_VERSION;
use serde_json::Value;
use std::io::{self, BufRead, Write};

const UNKNOWN_REQUEST_ID: &str = "unknown";

/// Counts reported when the input stream ends.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct DriverSummary {
    pub requests: u64,
    pub errors: u64,
}

/// Run the driver loop against stdin/stdout until end of input.
pub fn run_driver(bridge: &Bridge) -> BridgeResult<DriverSummary> {
    let stdin = io::stdin();
    let stdout = io::stdout();
    run_driver_with_io(bridge, stdin.lock(), stdout.lock())
}

pub fn run_driver_with_io<R, W>(bridge: &Bridge, input: R, mut output: W) -> BridgeResult<DriverSummary>
where
    R: BufRead,
    W: Write,
{
    let mut summary = DriverSummary::default();
    for line in input.lines() {
        let line = line.map_err(|err| BridgeError::io("failed to read driver input", err))?;
        if line.trim().is_empty() {
            continue;
        }
        let response = handle_line(bridge, &line);
        summary.requests += 1;
        if response.status == DriverResponseStatus::Error {
            summary.errors += 1;
        }
        emit_driver_response(&mut output, &response)?;
    }
    tracing::info!(
        requests = summary.requests,
        errors = summary.errors,
        "driver input closed"
    );
    Ok(summary)
}

/// Answer one request line. Never fails; every problem becomes an error response.
pub fn handle_line(bridge: &Bridge, line: &str) -> DriverResponse {
    let request: DriverRequest = match serde_json::from_str(line) {
        Ok(request) => request,
        Err(err) => {
            tracing::warn!(error = %err, "invalid driver request");
            let error = BridgeError::protocol(
                "invalid json request",
                serde_json::json!({
                    "parse_error": err.to_string(),
                    "received": line.chars().take(200).collect::<String>(),
                    "hint": "request must carry protocol_version, request_id and op {type, payload}"
                }),
            );
            return error_response(salvage_request_id(line), &error);
        }
    };

    if request.protocol_version != PROTOCOL_VERSION {
        let error = BridgeError::protocol_version_mismatch(request.protocol_version, PROTOCOL_VERSION);
        return error_response(request.request_id, &error);
    }

    let op_name = request.op.name();
    tracing::debug!(request_id = %request.request_id, op = op_name, "driver request");
    match bridge.execute(request.op) {
        Ok(result) => DriverResponse {
            protocol_version: PROTOCOL_VERSION,
            request_id: request.request_id,
            status: DriverResponseStatus::Ok,
            result: Some(result),
            error: None,
        },
        Err(err) => {
            tracing::info!(
                request_id = %request.request_id,
                op = op_name,
                code = %err.code,
                "driver request failed"
            );
            error_response(request.request_id, &err)
        }
    }
}

/// A line that parses as JSON but not as a request still echoes its id.
fn salvage_request_id(line: &str) -> String {
    serde_json::from_str::<Value>(line)
        .ok()
        .and_then(|value| {
            value
                .get("request_id")
                .and_then(Value::as_str)
                .map(str::to_string)
        })
        .unwrap_or_else(|| UNKNOWN_REQUEST_ID.to_string())
}

fn error_response(request_id: String, error: &BridgeError) -> DriverResponse {
    DriverResponse {
        protocol_version: PROTOCOL_VERSION,
        request_id,
        status: DriverResponseStatus::Error,
        result: None,
        error: Some(error.to_error_info()),
    }
}

fn emit_driver_response(output: &mut impl Write, response: &DriverResponse) -> BridgeResult<()> {
    let payload = serde_json::to_string(response).map_err(|err| {
        BridgeError::protocol(
            "failed to serialize driver response",
            serde_json::json!({ "source": err.to_string() }),
        )
    })?;
    writeln!(output, "{payload}")
        .map_err(|err| BridgeError::io("failed to write driver response", err))?;
    output
        .flush()
        .map_err(|err| BridgeError::io("failed to flush driver response", err))?;
    Ok(())
}
