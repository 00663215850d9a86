use usv_twin_core::contracts::{InputVector, StateCovariance, StateVector, IX_PSI};
use usv_twin_core::ekf::EkfState;
use usv_twin_core::process_model::ProcessParams;
use usv_twin_core::simulate::{simulate, GaussianNoise, NoiseSource};

fn params() -> ProcessParams {
    ProcessParams::new(2.0, 0.8, 0.8, 1.2).unwrap()
}

#[test]
fn filter_tracks_a_straight_run_within_reasonable_bounds() {
    let p = params();
    let x0 = {
        let mut x = StateVector::zeros();
        x[3] = 1.2;
        x
    };

    let result = simulate(
        &x0,
        0.05,
        200,
        &p,
        0.0,
        |_, _, _| InputVector::new(0.2, 0.0),
        None,
        None,
    )
    .unwrap();

    let mut ekf = EkfState::new(StateVector::zeros(), StateCovariance::identity()).unwrap();
    let q = StateCovariance::from_diagonal_element(1e-5);
    let r_gnss = nalgebra::SMatrix::<f64, 2, 2>::from_diagonal_element(0.05);

    for k in 0..200 {
        let u = InputVector::new(0.2, 0.0);
        ekf.predict(&u, 0.05, &p, &q).unwrap();
        if k % 10 == 0 {
            let truth = result.x[k + 1];
            let z = nalgebra::SVector::<f64, 2>::new(truth[0], truth[1]);
            ekf.update_gnss_xy(&z, &r_gnss).unwrap();
        }
    }

    let truth_final = result.x[200];
    let est_final = ekf.x();
    assert!((truth_final[0] - est_final[0]).abs() < 1.0);
    assert!((truth_final[1] - est_final[1]).abs() < 1.0);
}

#[test]
fn simulate_with_seeded_noise_keeps_heading_wrapped() {
    let p = params();
    let x0 = {
        let mut x = StateVector::zeros();
        x[IX_PSI] = std::f64::consts::PI - 0.01;
        x[4] = 3.0; // large yaw rate to force repeated wraparound
        x
    };
    let sigma = StateVector::zeros();
    let mut noise = GaussianNoise::new(sigma, 7);

    let result = simulate(
        &x0,
        0.1,
        50,
        &p,
        0.0,
        |_, _, _| InputVector::zeros(),
        Some(&mut |_, _, _, _| noise.sample_state_noise()),
        None,
    )
    .unwrap();

    for x in &result.x {
        assert!(x[IX_PSI] >= -std::f64::consts::PI && x[IX_PSI] < std::f64::consts::PI);
    }
}
