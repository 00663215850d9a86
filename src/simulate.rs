//! Deterministic forward simulator for the V1 process model: runs
//! `x_{k+1} = f(x_k, u_k, dt)` with optional additive noise and observer
//! callbacks, either driven by a per-step input callback or a precomputed
//! input table.

use rand::SeedableRng;
use rand_distr::Distribution;

use crate::contracts::{InputVector, StateVector, STATE_DIM};
use crate::error::TwinError;
use crate::process_model::{process_step, ProcessParams};

const COMPONENT: &str = "simulate";

/// Injects additive process noise during simulation. The EKF does not use
/// this trait — its process noise is folded into `Q` during `predict`.
pub trait NoiseSource {
    fn sample_state_noise(&mut self) -> StateVector;
}

/// Seeded, per-component independent Gaussian noise source. Reusing a
/// fixed seed reproduces bit-identical trajectories across runs.
pub struct GaussianNoise {
    sigma: StateVector,
    rng: rand_pcg::Pcg64,
}

impl GaussianNoise {
    pub fn new(sigma: StateVector, seed: u64) -> Self {
        Self {
            sigma,
            rng: rand_pcg::Pcg64::seed_from_u64(seed),
        }
    }
}

impl NoiseSource for GaussianNoise {
    fn sample_state_noise(&mut self) -> StateVector {
        let mut w = StateVector::zeros();
        for i in 0..STATE_DIM {
            let sigma = self.sigma[i];
            w[i] = if sigma > 0.0 {
                let dist = rand_distr::Normal::new(0.0, sigma).expect("sigma already checked > 0");
                dist.sample(&mut self.rng)
            } else {
                0.0
            };
        }
        w
    }
}

/// Result of a simulation run: `t` has length `n_steps + 1`, `x` has
/// length `n_steps + 1`, `u` has length `n_steps`.
#[derive(Clone, Debug)]
pub struct SimulationResult {
    pub t: Vec<f64>,
    pub x: Vec<StateVector>,
    pub u: Vec<InputVector>,
}

/// Runs the V1 digital twin forward in time, calling `u_func(k, t_k, x_k)`
/// for each step's input and, optionally, `w_func`/`on_step` callbacks.
pub fn simulate(
    x0: &StateVector,
    dt: f64,
    n_steps: usize,
    params: &ProcessParams,
    t0: f64,
    mut u_func: impl FnMut(usize, f64, &StateVector) -> InputVector,
    mut w_func: Option<&mut dyn FnMut(usize, f64, &StateVector, &InputVector) -> StateVector>,
    mut on_step: Option<&mut dyn FnMut(usize, f64, &StateVector, &InputVector, &StateVector)>,
) -> Result<SimulationResult, TwinError> {
    if !dt.is_finite() || dt <= 0.0 {
        return Err(TwinError::invalid_argument(COMPONENT, "dt must be finite and > 0"));
    }
    crate::contracts::check_finite_state(x0, COMPONENT)?;

    let mut t = Vec::with_capacity(n_steps + 1);
    let mut x = Vec::with_capacity(n_steps + 1);
    let mut u = Vec::with_capacity(n_steps);

    for k in 0..=n_steps {
        t.push(t0 + dt * k as f64);
    }
    x.push(*x0);

    for k in 0..n_steps {
        let tk = t[k];
        let xk = x[k];

        let uk = u_func(k, tk, &xk);
        crate::contracts::check_finite_input(&uk, COMPONENT)?;
        u.push(uk);

        let wk = w_func.as_mut().map(|f| f(k, tk, &xk, &uk));
        let x_next = process_step(&xk, &uk, dt, params, wk.as_ref()).map_err(|e| {
            log::warn!("simulate: step {} at t={} overran the process model: {}", k, tk, e);
            e
        })?;
        x.push(x_next);

        if let Some(cb) = on_step.as_mut() {
            cb(k, tk, &xk, &uk, &x_next);
        }
    }

    Ok(SimulationResult { t, x, u })
}

/// Thin wrapper around [`simulate`] for the common case of a precomputed
/// input table `u[k] = [u_s, u_d]`.
pub fn simulate_with_inputs(
    x0: &StateVector,
    u_in: &[InputVector],
    dt: f64,
    params: &ProcessParams,
    t0: f64,
    w_func: Option<&mut dyn FnMut(usize, f64, &StateVector, &InputVector) -> StateVector>,
    on_step: Option<&mut dyn FnMut(usize, f64, &StateVector, &InputVector, &StateVector)>,
) -> Result<SimulationResult, TwinError> {
    let n_steps = u_in.len();
    simulate(
        x0,
        dt,
        n_steps,
        params,
        t0,
        |k, _t, _x| u_in[k],
        w_func,
        on_step,
    )
}
