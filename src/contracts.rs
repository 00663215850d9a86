//! Fixed-arity state/input types and the index conventions shared by the
//! process model, EKF, and simulator.

use nalgebra::{SMatrix, SVector};

use crate::error::TwinError;

pub const STATE_DIM: usize = 6;
pub const INPUT_DIM: usize = 2;

pub const IX_X: usize = 0;
pub const IX_Y: usize = 1;
pub const IX_PSI: usize = 2;
pub const IX_V: usize = 3;
pub const IX_R: usize = 4;
pub const IX_BG: usize = 5;

pub const IU_US: usize = 0;
pub const IU_UD: usize = 1;

pub const STATE_NAMES: [&str; STATE_DIM] = ["x", "y", "psi", "v", "r", "b_g"];
pub const INPUT_NAMES: [&str; INPUT_DIM] = ["u_s", "u_d"];

pub type StateVector = SVector<f64, STATE_DIM>;
pub type StateCovariance = SMatrix<f64, STATE_DIM, STATE_DIM>;
pub type InputVector = SVector<f64, INPUT_DIM>;

/// Checks every component is finite, returning a descriptive error
/// naming the offending component otherwise.
pub fn check_finite_state(x: &StateVector, component: &'static str) -> Result<(), TwinError> {
    for i in 0..STATE_DIM {
        if !x[i].is_finite() {
            return Err(TwinError::invalid_argument(
                component,
                format!("state component {} ({}) is not finite: {}", i, STATE_NAMES[i], x[i]),
            ));
        }
    }
    Ok(())
}

pub fn check_finite_input(u: &InputVector, component: &'static str) -> Result<(), TwinError> {
    for i in 0..INPUT_DIM {
        if !u[i].is_finite() {
            return Err(TwinError::invalid_argument(
                component,
                format!("input component {} ({}) is not finite: {}", i, INPUT_NAMES[i], u[i]),
            ));
        }
    }
    Ok(())
}

pub fn check_finite_covariance(p: &StateCovariance, component: &'static str) -> Result<(), TwinError> {
    for i in 0..STATE_DIM {
        for j in 0..STATE_DIM {
            if !p[(i, j)].is_finite() {
                return Err(TwinError::invalid_argument(
                    component,
                    format!("covariance entry ({}, {}) is not finite: {}", i, j, p[(i, j)]),
                ));
            }
        }
    }
    Ok(())
}
