//! Decoding of bulk export payloads into JSON records

use crate::domain::{BridgeError, Result};
use base64::{engine::general_purpose, Engine as _};
use serde_json::Value;

/// Records decoded from one payload
#[derive(Debug, Default, Clone, PartialEq)]
pub struct DecodedPayload {
    pub records: Vec<Value>,
    /// Non-empty lines that were not a JSON object
    pub skipped_lines: usize,
}

/// Decodes a base64 NDJSON payload
///
/// Whitespace inside the base64 text (MIME-style line wrapping) is ignored.
/// Each non-blank line must hold one JSON object. Lines that fail to parse
/// are logged and counted in `skipped_lines`; they never fail the payload.
///
/// # Errors
///
/// Returns a serialization error if the payload is not valid base64 or the
/// decoded bytes are not UTF-8.
pub fn decode_payload(payload: &str) -> Result<DecodedPayload> {
    let compact: Vec<u8> = payload
        .bytes()
        .filter(|b| !b.is_ascii_whitespace())
        .collect();
    let bytes = general_purpose::STANDARD
        .decode(compact)
        .map_err(|e| BridgeError::Serialization(format!("Payload is not valid base64: {e}")))?;
    let text = String::from_utf8(bytes)
        .map_err(|e| BridgeError::Serialization(format!("Payload is not UTF-8: {e}")))?;

    Ok(parse_ndjson(&text))
}

/// Parses newline-delimited JSON text, skipping malformed lines
pub fn parse_ndjson(text: &str) -> DecodedPayload {
    let mut decoded = DecodedPayload::default();

    for (index, line) in text.lines().enumerate() {
        let line = line.trim();
        if line.is_empty() {
            continue;
        }

        match serde_json::from_str::<Value>(line) {
            Ok(record @ Value::Object(_)) => decoded.records.push(record),
            Ok(_) => {
                tracing::warn!(line = index + 1, "Skipping NDJSON line that is not an object");
                decoded.skipped_lines += 1;
            }
            Err(e) => {
                tracing::warn!(line = index + 1, error = %e, "Skipping malformed NDJSON line");
                decoded.skipped_lines += 1;
            }
        }
    }

    decoded
}
