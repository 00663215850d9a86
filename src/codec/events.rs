//! Line-delimited JSON event stream: one JSON object per line, each
//! carrying at least `t_us` and `type`.

use std::io::{BufRead, Write};

use serde::{Deserialize, Serialize};
use serde_json::Map;

use crate::error::TwinError;

#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct EventRecord {
    pub t_us: u64,
    #[serde(rename = "type")]
    pub type_: String,
    #[serde(flatten)]
    pub extra: Map<String, serde_json::Value>,
}

pub fn write_event_line<W: Write>(w: &mut W, event: &EventRecord) -> Result<(), TwinError> {
    serde_json::to_writer(&mut *w, event)?;
    w.write_all(b"\n")?;
    Ok(())
}

/// Reads every line of a JSONL event stream, skipping blank lines.
/// A malformed line fails the whole read — callers that need partial
/// recovery should split on newlines themselves and call
/// `serde_json::from_str` per line.
pub fn read_events_jsonl<R: BufRead>(r: R) -> Result<Vec<EventRecord>, TwinError> {
    let mut events = Vec::new();
    for line in r.lines() {
        let line = line?;
        let line = line.trim();
        if line.is_empty() {
            continue;
        }
        let event: EventRecord = serde_json::from_str(line)?;
        events.push(event);
    }
    Ok(events)
}
