//! File/record header framing, the 13-variant `Record` payload codec, and
//! the buffer-based decode loop.

use std::collections::HashMap;
use std::io::Write;

use byteorder::{LittleEndian, ReadBytesExt, WriteBytesExt};

use crate::codec::layout::{self, RecordLayout};
use crate::error::TwinError;

const COMPONENT: &str = "codec";

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct FileHeader {
    pub fw_model_schema: u32,
    pub t0_us: u64,
}

impl FileHeader {
    fn write_to<W: Write>(&self, w: &mut W) -> Result<(), TwinError> {
        w.write_all(layout::MAGIC)?;
        w.write_u32::<LittleEndian>(self.fw_model_schema)?;
        w.write_u8(layout::ENDIAN_LITTLE)?;
        w.write_u64::<LittleEndian>(self.t0_us)?;
        w.write_all(&[0u8; 13])?;
        Ok(())
    }

    fn read_from(data: &[u8]) -> Result<Self, TwinError> {
        if data.len() < layout::FILE_HEADER_LEN {
            return Err(TwinError::CorruptHeader(format!(
                "timeseries file too small: {} bytes, expected at least {}",
                data.len(),
                layout::FILE_HEADER_LEN
            )));
        }
        let magic = &data[0..6];
        if magic != layout::MAGIC {
            return Err(TwinError::CorruptHeader(format!(
                "invalid magic: got {:?}, expected {:?}",
                magic, layout::MAGIC
            )));
        }
        let fw_model_schema = (&data[6..10]).read_u32::<LittleEndian>()?;
        let endianness_id = data[10];
        if endianness_id != layout::ENDIAN_LITTLE {
            return Err(TwinError::CorruptHeader(format!(
                "unsupported endianness id: {}",
                endianness_id
            )));
        }
        let t0_us = (&data[11..19]).read_u64::<LittleEndian>()?;
        Ok(FileHeader { fw_model_schema, t0_us })
    }
}

#[derive(Clone, Copy, Debug, PartialEq)]
pub struct UnknownRecord {
    pub t_us: u64,
    pub type_id: u16,
    pub payload_len: u16,
}

/// A decoded payload, one variant per entry in the record registry.
/// Field order matches the on-wire layout.
#[derive(Clone, Copy, Debug, PartialEq)]
pub enum Record {
    NavSolution { x: f32, y: f32, psi: f32, v: f32, r: f32, b_g: f32 },
    GuidanceRef { psi_d: f32, v_d: f32, e_y: f32, e_psi: f32 },
    ActuatorReq { u_s_req: f32, u_d_req: f32, src: u8 },
    ActuatorCmd { u_s_cmd: f32, u_d_cmd: f32 },
    EscOutput { u_l: f32, u_r: f32 },
    MissionState {
        idx: u16,
        active: u8,
        done: u8,
        x0: f32,
        y0: f32,
        x1: f32,
        y1: f32,
        v_seg: f32,
        d_wp: f32,
    },
    MixerFeedback {
        u_s_ach: f32,
        u_d_ach: f32,
        sat_l: u8,
        sat_r: u8,
        sat_any: u8,
        u_l_ach: f32,
        u_r_ach: f32,
    },
    SpeedSchedDebug {
        v_seg: f32,
        v_cap: f32,
        v_d: f32,
        e_psi: f32,
        d_wp: f32,
        dv: f32,
        cap_wp: u8,
        cap_psi: u8,
    },
    SpeedCtrlDebug {
        v_d: f32,
        v_hat: f32,
        e_v: f32,
        u_s_raw: f32,
        u_s_req: f32,
        i_v: f32,
        sat_u_s: u8,
    },
    YawCtrlDebug {
        psi_d: f32,
        psi: f32,
        e_psi: f32,
        r_d: f32,
        r: f32,
        e_r: f32,
        u_d_req: f32,
        sat_u_d: u8,
    },
    EkfDiag {
        p_xx: f32,
        p_yy: f32,
        p_psi: f32,
        p_v: f32,
        p_r: f32,
        p_bg: f32,
        status_flags: u32,
    },
    SensorGnss { x: f32, y: f32, cog: f32, sog: f32, valid: u8 },
    SensorGyro { z_gyro: f32, b_g_est: f32, valid: u8 },
}

impl Record {
    pub fn type_id(&self) -> u16 {
        match self {
            Record::NavSolution { .. } => layout::REC_NAV_SOLUTION,
            Record::GuidanceRef { .. } => layout::REC_GUIDANCE_REF,
            Record::ActuatorReq { .. } => layout::REC_ACTUATOR_REQ,
            Record::ActuatorCmd { .. } => layout::REC_ACTUATOR_CMD,
            Record::EscOutput { .. } => layout::REC_ESC_OUTPUT,
            Record::MissionState { .. } => layout::REC_MISSION_STATE,
            Record::MixerFeedback { .. } => layout::REC_MIXER_FEEDBACK,
            Record::SpeedSchedDebug { .. } => layout::REC_SPEED_SCHED_DEBUG,
            Record::SpeedCtrlDebug { .. } => layout::REC_SPEED_CTRL_DEBUG,
            Record::YawCtrlDebug { .. } => layout::REC_YAW_CTRL_DEBUG,
            Record::EkfDiag { .. } => layout::REC_EKF_DIAG,
            Record::SensorGnss { .. } => layout::REC_SENSOR_GNSS,
            Record::SensorGyro { .. } => layout::REC_SENSOR_GYRO,
        }
    }

    pub fn name(&self) -> &'static str {
        layout::layout_for(self.type_id()).expect("every Record variant has a registry entry").name
    }

    fn encode_payload(&self, buf: &mut Vec<u8>) -> Result<(), TwinError> {
        match *self {
            Record::NavSolution { x, y, psi, v, r, b_g } => {
                for f in [x, y, psi, v, r, b_g] {
                    buf.write_f32::<LittleEndian>(f)?;
                }
            }
            Record::GuidanceRef { psi_d, v_d, e_y, e_psi } => {
                for f in [psi_d, v_d, e_y, e_psi] {
                    buf.write_f32::<LittleEndian>(f)?;
                }
            }
            Record::ActuatorReq { u_s_req, u_d_req, src } => {
                buf.write_f32::<LittleEndian>(u_s_req)?;
                buf.write_f32::<LittleEndian>(u_d_req)?;
                buf.write_u8(src)?;
                buf.write_all(&[0u8; 3])?;
            }
            Record::ActuatorCmd { u_s_cmd, u_d_cmd } => {
                buf.write_f32::<LittleEndian>(u_s_cmd)?;
                buf.write_f32::<LittleEndian>(u_d_cmd)?;
            }
            Record::EscOutput { u_l, u_r } => {
                buf.write_f32::<LittleEndian>(u_l)?;
                buf.write_f32::<LittleEndian>(u_r)?;
            }
            Record::MissionState { idx, active, done, x0, y0, x1, y1, v_seg, d_wp } => {
                buf.write_u16::<LittleEndian>(idx)?;
                buf.write_u8(active)?;
                buf.write_u8(done)?;
                buf.write_all(&[0u8; 4])?;
                for f in [x0, y0, x1, y1, v_seg, d_wp] {
                    buf.write_f32::<LittleEndian>(f)?;
                }
            }
            Record::MixerFeedback { u_s_ach, u_d_ach, sat_l, sat_r, sat_any, u_l_ach, u_r_ach } => {
                buf.write_f32::<LittleEndian>(u_s_ach)?;
                buf.write_f32::<LittleEndian>(u_d_ach)?;
                buf.write_u8(sat_l)?;
                buf.write_u8(sat_r)?;
                buf.write_u8(sat_any)?;
                buf.write_all(&[0u8; 5])?;
                buf.write_f32::<LittleEndian>(u_l_ach)?;
                buf.write_f32::<LittleEndian>(u_r_ach)?;
            }
            Record::SpeedSchedDebug { v_seg, v_cap, v_d, e_psi, d_wp, dv, cap_wp, cap_psi } => {
                for f in [v_seg, v_cap, v_d, e_psi, d_wp, dv] {
                    buf.write_f32::<LittleEndian>(f)?;
                }
                buf.write_u8(cap_wp)?;
                buf.write_u8(cap_psi)?;
                buf.write_all(&[0u8; 2])?;
            }
            Record::SpeedCtrlDebug { v_d, v_hat, e_v, u_s_raw, u_s_req, i_v, sat_u_s } => {
                for f in [v_d, v_hat, e_v, u_s_raw, u_s_req, i_v] {
                    buf.write_f32::<LittleEndian>(f)?;
                }
                buf.write_u8(sat_u_s)?;
                buf.write_all(&[0u8; 3])?;
            }
            Record::YawCtrlDebug { psi_d, psi, e_psi, r_d, r, e_r, u_d_req, sat_u_d } => {
                for f in [psi_d, psi, e_psi, r_d, r, e_r, u_d_req] {
                    buf.write_f32::<LittleEndian>(f)?;
                }
                buf.write_u8(sat_u_d)?;
                buf.write_all(&[0u8; 3])?;
            }
            Record::EkfDiag { p_xx, p_yy, p_psi, p_v, p_r, p_bg, status_flags } => {
                for f in [p_xx, p_yy, p_psi, p_v, p_r, p_bg] {
                    buf.write_f32::<LittleEndian>(f)?;
                }
                buf.write_u32::<LittleEndian>(status_flags)?;
            }
            Record::SensorGnss { x, y, cog, sog, valid } => {
                for f in [x, y, cog, sog] {
                    buf.write_f32::<LittleEndian>(f)?;
                }
                buf.write_u8(valid)?;
                buf.write_all(&[0u8; 3])?;
            }
            Record::SensorGyro { z_gyro, b_g_est, valid } => {
                buf.write_f32::<LittleEndian>(z_gyro)?;
                buf.write_f32::<LittleEndian>(b_g_est)?;
                buf.write_u8(valid)?;
                buf.write_all(&[0u8; 3])?;
            }
        }
        Ok(())
    }

    fn decode_payload(type_id: u16, mut payload: &[u8]) -> Result<Record, TwinError> {
        macro_rules! f32be {
            () => {
                payload.read_f32::<LittleEndian>()?
            };
        }
        macro_rules! skip {
            ($n:expr) => {
                payload = &payload[$n..];
            };
        }
        Ok(match type_id {
            layout::REC_NAV_SOLUTION => Record::NavSolution {
                x: f32be!(),
                y: f32be!(),
                psi: f32be!(),
                v: f32be!(),
                r: f32be!(),
                b_g: f32be!(),
            },
            layout::REC_GUIDANCE_REF => Record::GuidanceRef {
                psi_d: f32be!(),
                v_d: f32be!(),
                e_y: f32be!(),
                e_psi: f32be!(),
            },
            layout::REC_ACTUATOR_REQ => {
                let u_s_req = f32be!();
                let u_d_req = f32be!();
                let src = payload.read_u8()?;
                Record::ActuatorReq { u_s_req, u_d_req, src }
            }
            layout::REC_ACTUATOR_CMD => Record::ActuatorCmd { u_s_cmd: f32be!(), u_d_cmd: f32be!() },
            layout::REC_ESC_OUTPUT => Record::EscOutput { u_l: f32be!(), u_r: f32be!() },
            layout::REC_MISSION_STATE => {
                let idx = payload.read_u16::<LittleEndian>()?;
                let active = payload.read_u8()?;
                let done = payload.read_u8()?;
                skip!(4);
                Record::MissionState {
                    idx,
                    active,
                    done,
                    x0: f32be!(),
                    y0: f32be!(),
                    x1: f32be!(),
                    y1: f32be!(),
                    v_seg: f32be!(),
                    d_wp: f32be!(),
                }
            }
            layout::REC_MIXER_FEEDBACK => {
                let u_s_ach = f32be!();
                let u_d_ach = f32be!();
                let sat_l = payload.read_u8()?;
                let sat_r = payload.read_u8()?;
                let sat_any = payload.read_u8()?;
                skip!(5);
                Record::MixerFeedback {
                    u_s_ach,
                    u_d_ach,
                    sat_l,
                    sat_r,
                    sat_any,
                    u_l_ach: f32be!(),
                    u_r_ach: f32be!(),
                }
            }
            layout::REC_SPEED_SCHED_DEBUG => {
                let v_seg = f32be!();
                let v_cap = f32be!();
                let v_d = f32be!();
                let e_psi = f32be!();
                let d_wp = f32be!();
                let dv = f32be!();
                let cap_wp = payload.read_u8()?;
                let cap_psi = payload.read_u8()?;
                Record::SpeedSchedDebug { v_seg, v_cap, v_d, e_psi, d_wp, dv, cap_wp, cap_psi }
            }
            layout::REC_SPEED_CTRL_DEBUG => {
                let v_d = f32be!();
                let v_hat = f32be!();
                let e_v = f32be!();
                let u_s_raw = f32be!();
                let u_s_req = f32be!();
                let i_v = f32be!();
                let sat_u_s = payload.read_u8()?;
                Record::SpeedCtrlDebug { v_d, v_hat, e_v, u_s_raw, u_s_req, i_v, sat_u_s }
            }
            layout::REC_YAW_CTRL_DEBUG => {
                let psi_d = f32be!();
                let psi = f32be!();
                let e_psi = f32be!();
                let r_d = f32be!();
                let r = f32be!();
                let e_r = f32be!();
                let u_d_req = f32be!();
                let sat_u_d = payload.read_u8()?;
                Record::YawCtrlDebug { psi_d, psi, e_psi, r_d, r, e_r, u_d_req, sat_u_d }
            }
            layout::REC_EKF_DIAG => {
                let p_xx = f32be!();
                let p_yy = f32be!();
                let p_psi = f32be!();
                let p_v = f32be!();
                let p_r = f32be!();
                let p_bg = f32be!();
                let status_flags = payload.read_u32::<LittleEndian>()?;
                Record::EkfDiag { p_xx, p_yy, p_psi, p_v, p_r, p_bg, status_flags }
            }
            layout::REC_SENSOR_GNSS => {
                let x = f32be!();
                let y = f32be!();
                let cog = f32be!();
                let sog = f32be!();
                let valid = payload.read_u8()?;
                Record::SensorGnss { x, y, cog, sog, valid }
            }
            layout::REC_SENSOR_GYRO => {
                let z_gyro = f32be!();
                let b_g_est = f32be!();
                let valid = payload.read_u8()?;
                Record::SensorGyro { z_gyro, b_g_est, valid }
            }
            other => {
                return Err(TwinError::invalid_argument(COMPONENT, format!("unrecognized type id {}", other)))
            }
        })
    }
}

/// A decoded record with its own timestamp (the header carries only
/// `t0_us`; every record is stamped individually).
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct DecodedRecord {
    pub t_us: u64,
    pub record: Record,
}

#[derive(Clone, Debug)]
pub struct TimeseriesData {
    pub header: FileHeader,
    pub records: HashMap<&'static str, Vec<DecodedRecord>>,
    pub record_counts: HashMap<&'static str, usize>,
    pub unknown: Vec<UnknownRecord>,
}

/// Decode options. `strict_payload_len` requires an exact length match
/// for known record types; `keep_unknown` controls whether unrecognized
/// type ids are collected into the side channel or silently dropped.
#[derive(Clone, Copy, Debug)]
pub struct ReadOptions {
    pub strict_payload_len: bool,
    pub keep_unknown: bool,
}

impl Default for ReadOptions {
    fn default() -> Self {
        Self { strict_payload_len: true, keep_unknown: true }
    }
}

/// Decodes a full TLV timeseries buffer per [`ReadOptions`]. Unknown
/// record type ids never abort the read: the record is skipped, and
/// (if `keep_unknown`) recorded in `unknown`.
pub fn read_timeseries(data: &[u8], opts: ReadOptions) -> Result<TimeseriesData, TwinError> {
    let header = FileHeader::read_from(data)?;

    let mut records: HashMap<&'static str, Vec<DecodedRecord>> = HashMap::new();
    let mut record_counts: HashMap<&'static str, usize> = HashMap::new();
    let mut unknown = Vec::new();

    let n = data.len();
    let mut offset = layout::FILE_HEADER_LEN;

    while offset < n {
        if offset + layout::RECORD_HEADER_LEN > n {
            return Err(TwinError::TruncatedHeader { offset });
        }

        let t_us = (&data[offset..offset + 8]).read_u64::<LittleEndian>()?;
        let type_id = (&data[offset + 8..offset + 10]).read_u16::<LittleEndian>()?;
        let payload_len = (&data[offset + 10..offset + 12]).read_u16::<LittleEndian>()?;
        offset += layout::RECORD_HEADER_LEN;

        let payload_end = offset + payload_len as usize;
        if payload_end > n {
            return Err(TwinError::TruncatedPayload {
                type_id,
                offset,
                need: payload_len as usize,
                have: n - offset,
            });
        }

        let layout = layout::layout_for(type_id);
        let layout: &RecordLayout = match layout {
            None => {
                log::warn!(
                    "codec: skipping unknown record type={} at t_us={} ({} payload bytes)",
                    type_id,
                    t_us,
                    payload_len
                );
                if opts.keep_unknown {
                    unknown.push(UnknownRecord { t_us, type_id, payload_len });
                }
                offset = payload_end;
                continue;
            }
            Some(l) => l,
        };

        let expected_len = layout.payload_len;
        if opts.strict_payload_len && payload_len as usize != expected_len {
            return Err(TwinError::PayloadLengthMismatch {
                name: layout.name,
                type_id,
                got: payload_len as usize,
                expected: expected_len,
            });
        }
        if (payload_len as usize) < expected_len {
            return Err(TwinError::PayloadLengthMismatch {
                name: layout.name,
                type_id,
                got: payload_len as usize,
                expected: expected_len,
            });
        }

        let record = Record::decode_payload(type_id, &data[offset..offset + expected_len])?;
        records.entry(layout.name).or_insert_with(Vec::new).push(DecodedRecord { t_us, record });
        *record_counts.entry(layout.name).or_insert(0) += 1;

        offset = payload_end;
    }

    Ok(TimeseriesData { header, records, record_counts, unknown })
}

/// Streaming writer for a TLV timeseries file: writes the header on
/// construction, then one record at a time.
pub struct TimeseriesWriter<W: Write> {
    inner: W,
}

impl<W: Write> TimeseriesWriter<W> {
    pub fn new(mut inner: W, header: FileHeader) -> Result<Self, TwinError> {
        header.write_to(&mut inner)?;
        Ok(Self { inner })
    }

    pub fn write_record(&mut self, t_us: u64, record: &Record) -> Result<(), TwinError> {
        let mut payload = Vec::new();
        record.encode_payload(&mut payload)?;

        self.inner.write_u64::<LittleEndian>(t_us)?;
        self.inner.write_u16::<LittleEndian>(record.type_id())?;
        self.inner.write_u16::<LittleEndian>(payload.len() as u16)?;
        self.inner.write_all(&payload)?;
        Ok(())
    }

    pub fn into_inner(self) -> W {
        self.inner
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample_header() -> FileHeader {
        FileHeader { fw_model_schema: 1, t0_us: 1_000_000 }
    }

    #[test]
    fn round_trips_every_record_kind() {
        let mut buf = Vec::new();
        {
            let mut w = TimeseriesWriter::new(&mut buf, sample_header()).unwrap();
            w.write_record(0, &Record::NavSolution { x: 1.0, y: 2.0, psi: 0.1, v: 0.5, r: -0.2, b_g: 0.01 }).unwrap();
            w.write_record(1000, &Record::SensorGyro { z_gyro: 0.4, b_g_est: 0.01, valid: 1 }).unwrap();
            w.write_record(2000, &Record::EkfDiag {
                p_xx: 1.0, p_yy: 1.0, p_psi: 0.1, p_v: 0.1, p_r: 0.1, p_bg: 0.1, status_flags: 0,
            }).unwrap();
        }

        let data = read_timeseries(&buf, ReadOptions::default()).unwrap();
        assert_eq!(data.header.fw_model_schema, 1);
        assert_eq!(data.record_counts.get("REC_NAV_SOLUTION"), Some(&1));
        assert_eq!(data.record_counts.get("REC_SENSOR_GYRO"), Some(&1));
        assert_eq!(data.record_counts.get("REC_EKF_DIAG"), Some(&1));
        assert!(data.unknown.is_empty());
    }

    #[test]
    fn unknown_record_is_skipped_not_fatal() {
        let mut buf = Vec::new();
        sample_header().write_to(&mut buf).unwrap();
        buf.write_u64::<LittleEndian>(0).unwrap();
        buf.write_u16::<LittleEndian>(999).unwrap();
        buf.write_u16::<LittleEndian>(4).unwrap();
        buf.write_all(b"ABCD").unwrap();

        let data = read_timeseries(&buf, ReadOptions::default()).unwrap();
        assert_eq!(data.unknown.len(), 1);
        assert_eq!(data.unknown[0].type_id, 999);
        assert!(data.record_counts.is_empty());
    }

    #[test]
    fn payload_length_mismatch_is_rejected_in_strict_mode() {
        let mut buf = Vec::new();
        sample_header().write_to(&mut buf).unwrap();
        buf.write_u64::<LittleEndian>(0).unwrap();
        buf.write_u16::<LittleEndian>(layout::REC_NAV_SOLUTION).unwrap();
        buf.write_u16::<LittleEndian>(3).unwrap();
        buf.write_all(&[0u8; 3]).unwrap();

        let err = read_timeseries(&buf, ReadOptions::default()).unwrap_err();
        assert!(matches!(err, TwinError::PayloadLengthMismatch { .. }));
    }

    #[test]
    fn truncated_header_is_rejected() {
        let mut buf = Vec::new();
        sample_header().write_to(&mut buf).unwrap();
        buf.extend_from_slice(&[0u8; 5]); // shorter than a record header
        let err = read_timeseries(&buf, ReadOptions::default()).unwrap_err();
        assert!(matches!(err, TwinError::TruncatedHeader { .. }));
    }

    #[test]
    fn invalid_magic_is_rejected() {
        let mut buf = vec![0u8; layout::FILE_HEADER_LEN];
        buf[0..6].copy_from_slice(b"BOGUS!");
        let err = read_timeseries(&buf, ReadOptions::default()).unwrap_err();
        assert!(matches!(err, TwinError::CorruptHeader(_)));
    }
}
