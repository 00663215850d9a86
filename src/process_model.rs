//! Discrete-time Euler-integrated process model: surge velocity, yaw rate,
//! and a gyro bias carried as a random walk (handled entirely through Q in
//! the EKF — the deterministic step below leaves it unchanged).

use crate::contracts::{InputVector, StateVector, IX_BG, IX_PSI, IX_R, IX_V, IX_X, IX_Y};
use crate::error::TwinError;

const COMPONENT: &str = "process_model";

/// Time constants and input gains for the V1 process model.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct ProcessParams {
    pub tau_v: f64,
    pub tau_r: f64,
    pub k_v: f64,
    pub k_r: f64,
}

impl ProcessParams {
    pub fn new(tau_v: f64, tau_r: f64, k_v: f64, k_r: f64) -> Result<Self, TwinError> {
        if !tau_v.is_finite() || tau_v <= 0.0 {
            return Err(TwinError::invalid_argument(COMPONENT, "params.tau_v must be finite and > 0"));
        }
        if !tau_r.is_finite() || tau_r <= 0.0 {
            return Err(TwinError::invalid_argument(COMPONENT, "params.tau_r must be finite and > 0"));
        }
        if !k_v.is_finite() {
            return Err(TwinError::invalid_argument(COMPONENT, "params.k_v must be finite"));
        }
        if !k_r.is_finite() {
            return Err(TwinError::invalid_argument(COMPONENT, "params.k_r must be finite"));
        }
        Ok(Self { tau_v, tau_r, k_v, k_r })
    }
}

/// Wraps an angle in radians to `[-pi, pi)`.
pub fn wrap_pi(angle_rad: f64) -> f64 {
    (angle_rad + std::f64::consts::PI).rem_euclid(2.0 * std::f64::consts::PI) - std::f64::consts::PI
}

fn process_step_core(x: &StateVector, u: &InputVector, dt: f64, params: &ProcessParams) -> StateVector {
    let px = x[IX_X];
    let py = x[IX_Y];
    let psi = x[IX_PSI];
    let v = x[IX_V];
    let r = x[IX_R];
    let b_g = x[IX_BG];

    // u = [u_s_ach, u_d_ach], the achieved actuation.
    let u_s = u[0];
    let u_d = u[1];

    let (spsi, cpsi) = psi.sin_cos();

    let px_next = px + dt * v * cpsi;
    let py_next = py + dt * v * spsi;
    let psi_next = wrap_pi(psi + dt * r);

    let v_dot = -(1.0 / params.tau_v) * v + params.k_v * u_s;
    let r_dot = -(1.0 / params.tau_r) * r + params.k_r * u_d;

    let v_next = v + dt * v_dot;
    let r_next = r + dt * r_dot;

    let b_g_next = b_g;

    StateVector::new(px_next, py_next, psi_next, v_next, r_next, b_g_next)
}

/// One discrete-time process step. `w`, if given, is additive state noise
/// applied after propagation (used by the simulator; the EKF instead
/// folds process noise into `Q` during `predict`).
pub fn process_step(
    x: &StateVector,
    u: &InputVector,
    dt: f64,
    params: &ProcessParams,
    w: Option<&StateVector>,
) -> Result<StateVector, TwinError> {
    crate::contracts::check_finite_state(x, COMPONENT)?;
    crate::contracts::check_finite_input(u, COMPONENT)?;
    if !dt.is_finite() || dt <= 0.0 {
        return Err(TwinError::invalid_argument(COMPONENT, "dt must be finite and > 0"));
    }

    let mut x_next = process_step_core(x, u, dt, params);

    if let Some(w) = w {
        crate::contracts::check_finite_state(w, COMPONENT)?;
        x_next += w;
        x_next[IX_PSI] = wrap_pi(x_next[IX_PSI]);
    }

    Ok(x_next)
}

/// Analytic Jacobian of the Euler-discretized process model at `x`.
pub fn jacobian_f(
    x: &StateVector,
    dt: f64,
    params: &ProcessParams,
) -> Result<crate::contracts::StateCovariance, TwinError> {
    crate::contracts::check_finite_state(x, COMPONENT)?;
    if !dt.is_finite() || dt <= 0.0 {
        return Err(TwinError::invalid_argument(COMPONENT, "dt must be finite and > 0"));
    }

    let psi = x[IX_PSI];
    let v = x[IX_V];
    let (spsi, cpsi) = psi.sin_cos();

    let mut f = crate::contracts::StateCovariance::identity();
    f[(IX_X, IX_PSI)] = -dt * v * spsi;
    f[(IX_X, IX_V)] = dt * cpsi;
    f[(IX_Y, IX_PSI)] = dt * v * cpsi;
    f[(IX_Y, IX_V)] = dt * spsi;
    f[(IX_PSI, IX_R)] = dt;
    f[(IX_V, IX_V)] = 1.0 - dt / params.tau_v;
    f[(IX_R, IX_R)] = 1.0 - dt / params.tau_r;
    Ok(f)
}
