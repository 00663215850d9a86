//! Numerical core for a surface-vessel digital twin: process model, EKF,
//! deterministic forward simulator, and a binary timeseries codec.

pub mod codec;
pub mod contracts;
pub mod ekf;
pub mod error;
pub mod process_model;
pub mod schema;
pub mod simulate;

pub use error::TwinError;
