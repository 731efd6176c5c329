//! Eventlog append/decode/iterate helpers (spec §3, §4.5 "Eventlog").
//! Pure byte-buffer operations, grounded on the original's
//! `src/common/libkvs/kvs_eventlog.c`: newline-delimited JSON records,
//! validated on append.

use flux_types::{FluxError, FluxResult};
use serde::{Deserialize, Serialize};

const MAX_NAME_LEN: usize = 64;
const MAX_CONTEXT_LEN: usize = 256;

/// One `{timestamp, name, context}` record (spec §3).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EventlogEntry {
    pub timestamp: f64,
    pub name: String,
    pub context: serde_json::Value,
}

impl EventlogEntry {
    /// Validates `name` (≤ 64 chars, no spaces or newlines) and `context`'s
    /// rendered form (≤ 256 chars, no newlines) before construction.
    pub fn new(timestamp: f64, name: impl Into<String>, context: serde_json::Value) -> FluxResult<Self> {
        let name = name.into();
        validate_name(&name)?;
        validate_context(&context)?;
        Ok(Self { timestamp, name, context })
    }
}

fn validate_name(name: &str) -> FluxResult<()> {
    if name.is_empty() || name.len() > MAX_NAME_LEN || name.contains([' ', '\n']) {
        return Err(FluxError::Invalid(format!("invalid eventlog name {name:?}")));
    }
    Ok(())
}

fn validate_context(context: &serde_json::Value) -> FluxResult<()> {
    let rendered = serde_json::to_string(context).map_err(|e| FluxError::Protocol(e.to_string()))?;
    if rendered.len() > MAX_CONTEXT_LEN || rendered.contains('\n') {
        return Err(FluxError::Invalid("eventlog context too large or contains a newline".into()));
    }
    Ok(())
}

/// Appends `entry`'s JSON encoding plus a trailing newline to `buf`.
pub fn append(buf: &mut Vec<u8>, entry: &EventlogEntry) -> FluxResult<()> {
    let line = serde_json::to_vec(entry).map_err(|e| FluxError::Protocol(e.to_string()))?;
    buf.extend_from_slice(&line);
    buf.push(b'\n');
    Ok(())
}

/// Decodes a single newline-delimited JSON line.
pub fn decode(line: &[u8]) -> FluxResult<EventlogEntry> {
    serde_json::from_slice(line).map_err(|e| FluxError::Protocol(e.to_string()))
}

/// Iterates every record in an eventlog buffer in append order.
pub fn iter(buf: &[u8]) -> impl Iterator<Item = FluxResult<EventlogEntry>> + '_ {
    buf.split(|&b| b == b'\n').filter(|l| !l.is_empty()).map(decode)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn append_then_iter_roundtrips_in_order() {
        let mut buf = Vec::new();
        let a = EventlogEntry::new(1.0, "job.submit", serde_json::json!({"id": 1})).unwrap();
        let b = EventlogEntry::new(2.0, "job.start", serde_json::json!({})).unwrap();
        append(&mut buf, &a).unwrap();
        append(&mut buf, &b).unwrap();

        let decoded: Vec<EventlogEntry> = iter(&buf).collect::<FluxResult<_>>().unwrap();
        assert_eq!(decoded, vec![a, b]);
    }

    #[test]
    fn name_with_a_space_is_rejected() {
        assert!(EventlogEntry::new(0.0, "bad name", serde_json::json!({})).is_err());
    }

    #[test]
    fn name_over_64_chars_is_rejected() {
        let name = "x".repeat(65);
        assert!(EventlogEntry::new(0.0, name, serde_json::json!({})).is_err());
    }

    #[test]
    fn oversized_context_is_rejected() {
        let big = serde_json::json!({"data": "x".repeat(300)});
        assert!(EventlogEntry::new(0.0, "job.big", big).is_err());
    }
}
