//! Binary TLV record registry: type ids, field names, and exact payload
//! byte layouts (little-endian, explicit padding) for the 13 known
//! record kinds.

pub const MAGIC: &[u8; 6] = b"USVLOG";
pub const ENDIAN_LITTLE: u8 = 1;

pub const FILE_HEADER_LEN: usize = 32;
pub const RECORD_HEADER_LEN: usize = 12;

pub const REC_NAV_SOLUTION: u16 = 1;
pub const REC_GUIDANCE_REF: u16 = 2;
pub const REC_ACTUATOR_REQ: u16 = 3;
pub const REC_ACTUATOR_CMD: u16 = 4;
pub const REC_ESC_OUTPUT: u16 = 5;
pub const REC_MISSION_STATE: u16 = 6;
pub const REC_MIXER_FEEDBACK: u16 = 7;
pub const REC_SPEED_SCHED_DEBUG: u16 = 8;
pub const REC_SPEED_CTRL_DEBUG: u16 = 9;
pub const REC_YAW_CTRL_DEBUG: u16 = 10;
pub const REC_EKF_DIAG: u16 = 11;
pub const REC_SENSOR_GNSS: u16 = 12;
pub const REC_SENSOR_GYRO: u16 = 13;

/// Static description of one record kind: its type id, name, field
/// names (in on-wire order, `t_us` excluded since it lives in the
/// record header), and fixed payload length.
pub struct RecordLayout {
    pub type_id: u16,
    pub name: &'static str,
    pub fields: &'static [&'static str],
    pub payload_len: usize,
}

pub const RECORD_LAYOUTS: &[RecordLayout] = &[
    RecordLayout {
        type_id: REC_NAV_SOLUTION,
        name: "REC_NAV_SOLUTION",
        fields: &["x", "y", "psi", "v", "r", "b_g"],
        payload_len: 24,
    },
    RecordLayout {
        type_id: REC_GUIDANCE_REF,
        name: "REC_GUIDANCE_REF",
        fields: &["psi_d", "v_d", "e_y", "e_psi"],
        payload_len: 16,
    },
    RecordLayout {
        type_id: REC_ACTUATOR_REQ,
        name: "REC_ACTUATOR_REQ",
        fields: &["u_s_req", "u_d_req", "src"],
        payload_len: 12,
    },
    RecordLayout {
        type_id: REC_ACTUATOR_CMD,
        name: "REC_ACTUATOR_CMD",
        fields: &["u_s_cmd", "u_d_cmd"],
        payload_len: 8,
    },
    RecordLayout {
        type_id: REC_ESC_OUTPUT,
        name: "REC_ESC_OUTPUT",
        fields: &["u_L", "u_R"],
        payload_len: 8,
    },
    RecordLayout {
        type_id: REC_MISSION_STATE,
        name: "REC_MISSION_STATE",
        fields: &["idx", "active", "done", "x0", "y0", "x1", "y1", "v_seg", "d_wp"],
        payload_len: 32,
    },
    RecordLayout {
        type_id: REC_MIXER_FEEDBACK,
        name: "REC_MIXER_FEEDBACK",
        fields: &["u_s_ach", "u_d_ach", "sat_L", "sat_R", "sat_any", "u_L_ach", "u_R_ach"],
        payload_len: 24,
    },
    RecordLayout {
        type_id: REC_SPEED_SCHED_DEBUG,
        name: "REC_SPEED_SCHED_DEBUG",
        fields: &["v_seg", "v_cap", "v_d", "e_psi", "d_wp", "dv", "cap_wp", "cap_psi"],
        payload_len: 28,
    },
    RecordLayout {
        type_id: REC_SPEED_CTRL_DEBUG,
        name: "REC_SPEED_CTRL_DEBUG",
        fields: &["v_d", "v_hat", "e_v", "u_s_raw", "u_s_req", "i_v", "sat_u_s"],
        payload_len: 28,
    },
    RecordLayout {
        type_id: REC_YAW_CTRL_DEBUG,
        name: "REC_YAW_CTRL_DEBUG",
        fields: &["psi_d", "psi", "e_psi", "r_d", "r", "e_r", "u_d_req", "sat_u_d"],
        payload_len: 32,
    },
    RecordLayout {
        type_id: REC_EKF_DIAG,
        name: "REC_EKF_DIAG",
        fields: &["P_xx", "P_yy", "P_psi", "P_v", "P_r", "P_bg", "status_flags"],
        payload_len: 28,
    },
    RecordLayout {
        type_id: REC_SENSOR_GNSS,
        name: "REC_SENSOR_GNSS",
        fields: &["x", "y", "cog", "sog", "valid"],
        payload_len: 20,
    },
    RecordLayout {
        type_id: REC_SENSOR_GYRO,
        name: "REC_SENSOR_GYRO",
        fields: &["z_gyro", "b_g_est", "valid"],
        payload_len: 12,
    },
];

pub fn layout_for(type_id: u16) -> Option<&'static RecordLayout> {
    RECORD_LAYOUTS.iter().find(|l| l.type_id == type_id)
}
