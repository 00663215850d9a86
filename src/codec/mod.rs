//! Versioned binary TLV timeseries log plus a companion line-delimited
//! JSON event stream.

pub mod events;
pub mod io;
pub mod layout;

pub use events::{read_events_jsonl, write_event_line, EventRecord};
pub use io::{
    read_timeseries, DecodedRecord, FileHeader, Record, TimeseriesData, TimeseriesWriter,
    UnknownRecord,
};
pub use layout::{layout_for, RecordLayout, RECORD_LAYOUTS};
