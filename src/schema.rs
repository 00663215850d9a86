//! Firmware model schema/id and the `meta.json` sidecar structure.
//!
//! Capturing `git_sha`/`git_dirty`/`created_utc`/`session_name` is a job
//! for the CLI/tooling layer (out of this crate's scope); `RunMeta` only
//! describes the shape those callers populate.

use std::collections::HashMap;

use serde::{Deserialize, Serialize};

use crate::codec::layout::{RecordLayout, RECORD_LAYOUTS};
use crate::codec::FileHeader;
use crate::error::TwinError;

pub const FW_MODEL_SCHEMA: u32 = 1;
pub const FW_MODEL_ID: &str = "proc_model_2d_surgev_yawrate_bias";

#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct ProcessParamsMeta {
    pub tau_v: f64,
    pub tau_r: f64,
    pub k_v: f64,
    pub k_r: f64,
}

#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct ScenarioMeta {
    pub name: String,
    pub dt_s: f64,
    pub duration_s: f64,
    pub n_steps: usize,
}

#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct TimeMeta {
    pub t0_us: u64,
    pub t_end_us: u64,
    pub dt_us: u64,
}

/// The decoded-header subset of `meta.json`'s `files.timeseries.bin.header`.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct FileHeaderMeta {
    pub fw_model_schema: u32,
    pub t0_us: u64,
}

impl From<FileHeader> for FileHeaderMeta {
    fn from(h: FileHeader) -> Self {
        Self { fw_model_schema: h.fw_model_schema, t0_us: h.t0_us }
    }
}

/// One row of the record-layout registry, for embedding in `meta.json` so
/// a reader can recognize a file's record types without recompiling
/// against this crate's registry.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct RecordCatalogEntry {
    pub type_id: u16,
    pub name: String,
    pub fields: Vec<String>,
    pub payload_len: usize,
}

impl From<&RecordLayout> for RecordCatalogEntry {
    fn from(l: &RecordLayout) -> Self {
        Self {
            type_id: l.type_id,
            name: l.name.to_string(),
            fields: l.fields.iter().map(|f| f.to_string()).collect(),
            payload_len: l.payload_len,
        }
    }
}

/// The full compile-time record registry, as embedded in `meta.json`.
pub fn record_catalog() -> Vec<RecordCatalogEntry> {
    RECORD_LAYOUTS.iter().map(RecordCatalogEntry::from).collect()
}

#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct TimeseriesBinMeta {
    pub format: String,
    pub header: FileHeaderMeta,
    pub record_catalog: Vec<RecordCatalogEntry>,
    pub record_counts: HashMap<String, usize>,
}

#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct EventsJsonlMeta {
    pub event_count: usize,
}

#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct FilesMeta {
    #[serde(rename = "timeseries.bin")]
    pub timeseries_bin: TimeseriesBinMeta,
    #[serde(rename = "events.jsonl")]
    pub events_jsonl: EventsJsonlMeta,
}

/// `meta.json` sidecar written alongside a timeseries/events pair,
/// describing the run that produced them. `created_utc`, `session_name`,
/// `git_sha`, `git_dirty` are caller-supplied — this crate records neither
/// wall-clock time nor git state.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct RunMeta {
    pub created_utc: String,
    pub session_name: String,
    pub git_sha: Option<String>,
    pub git_dirty: Option<bool>,
    pub fw_model_id: String,
    pub fw_model_schema: u32,
    pub scenario: ScenarioMeta,
    pub process_params: ProcessParamsMeta,
    pub time: TimeMeta,
    pub files: FilesMeta,
}

impl RunMeta {
    pub fn to_json_pretty(&self) -> Result<String, TwinError> {
        Ok(serde_json::to_string_pretty(self)?)
    }

    pub fn from_json(data: &str) -> Result<Self, TwinError> {
        Ok(serde_json::from_str(data)?)
    }
}

/// Checks a decoded file header's schema (and, if both sides name a
/// concrete model id, the model id) against what the caller expects.
/// Schema mismatch is always rejected. Model id mismatch is rejected
/// only when neither side is absent/wildcard.
pub fn check_schema(
    file_schema: u32,
    file_model_id: Option<&str>,
    expected_schema: u32,
    expected_model_id: Option<&str>,
) -> Result<(), TwinError> {
    if file_schema != expected_schema {
        log::warn!(
            "schema: rejecting dataset with fw_model_schema={}, expected {}",
            file_schema,
            expected_schema
        );
        return Err(TwinError::IncompatibleDataset(format!(
            "fw_model_schema mismatch: file has {}, expected {}",
            file_schema, expected_schema
        )));
    }

    let is_wild = |id: &str| id.is_empty() || id == "*";
    if let (Some(file_id), Some(expected_id)) = (file_model_id, expected_model_id) {
        if !is_wild(file_id) && !is_wild(expected_id) && file_id != expected_id {
            log::warn!(
                "schema: rejecting dataset with fw_model_id='{}', expected '{}'",
                file_id,
                expected_id
            );
            return Err(TwinError::IncompatibleDataset(format!(
                "fw_model_id mismatch: file has '{}', expected '{}'",
                file_id, expected_id
            )));
        }
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample_meta() -> RunMeta {
        RunMeta {
            created_utc: "2026-01-01T00:00:00Z".to_string(),
            session_name: "sea_trial_04".to_string(),
            git_sha: Some("abc1234".to_string()),
            git_dirty: Some(false),
            fw_model_id: FW_MODEL_ID.to_string(),
            fw_model_schema: FW_MODEL_SCHEMA,
            scenario: ScenarioMeta { name: "step".to_string(), dt_s: 0.05, duration_s: 10.0, n_steps: 200 },
            process_params: ProcessParamsMeta { tau_v: 2.0, tau_r: 0.8, k_v: 0.8, k_r: 1.2 },
            time: TimeMeta { t0_us: 0, t_end_us: 10_000_000, dt_us: 50_000 },
            files: FilesMeta {
                timeseries_bin: TimeseriesBinMeta {
                    format: "tlv_v1".to_string(),
                    header: FileHeaderMeta { fw_model_schema: FW_MODEL_SCHEMA, t0_us: 0 },
                    record_catalog: record_catalog(),
                    record_counts: HashMap::from([("REC_NAV_SOLUTION".to_string(), 201)]),
                },
                events_jsonl: EventsJsonlMeta { event_count: 3 },
            },
        }
    }

    #[test]
    fn schema_mismatch_always_rejected() {
        assert!(check_schema(2, Some(FW_MODEL_ID), 1, Some(FW_MODEL_ID)).is_err());
    }

    #[test]
    fn matching_model_id_accepted() {
        assert!(check_schema(1, Some(FW_MODEL_ID), 1, Some(FW_MODEL_ID)).is_ok());
    }

    #[test]
    fn mismatched_model_id_rejected() {
        assert!(check_schema(1, Some("other_model"), 1, Some(FW_MODEL_ID)).is_err());
    }

    #[test]
    fn absent_or_wildcard_model_id_is_accepted() {
        assert!(check_schema(1, None, 1, Some(FW_MODEL_ID)).is_ok());
        assert!(check_schema(1, Some(FW_MODEL_ID), 1, None).is_ok());
        assert!(check_schema(1, Some("*"), 1, Some(FW_MODEL_ID)).is_ok());
    }

    #[test]
    fn run_meta_round_trips_through_json_with_dotted_file_keys() {
        let meta = sample_meta();
        let json = meta.to_json_pretty().unwrap();
        assert!(json.contains("\"timeseries.bin\""));
        assert!(json.contains("\"events.jsonl\""));

        let back = RunMeta::from_json(&json).unwrap();
        assert_eq!(back.session_name, meta.session_name);
        assert_eq!(back.files.timeseries_bin.record_catalog.len(), RECORD_LAYOUTS.len());
    }
}
