//! Temporal convergence of the integrator on a passive membrane
//!
//! A passive soma under a step current has the closed-form response
//! `v(t) = v0 + IR (1 - exp(-t/tau))`; refining dt must drive the sampled
//! trace toward it monotonically.

use cabletree_core::backend::MulticoreBackend;
use cabletree_core::cell::{Cell, Location, MechanismDesc, V_INIT};
use cabletree_core::group::CellGroup;
use cabletree_core::mechanism::MechanismRegistry;
use cabletree_core::types::CellMember;

const SOMA_RADIUS: f64 = 6.30785; // ~500 µm² membrane
const G_DENSITY: f64 = 1e-4; // S/cm²
const AMPLITUDE: f64 = 0.01; // nA
const TFINAL: f64 = 20.0; // ms
const SAMPLE_DT: f64 = 0.5; // ms

fn passive_soma() -> Cell {
    let mut cell = Cell::new(SOMA_RADIUS);
    cell.add_mechanism(
        0,
        MechanismDesc::new("pas").with("g", G_DENSITY).with("e", V_INIT),
    );
    cell.add_stimulus(Location::new(0, 0.5), 0.0, 100.0, AMPLITUDE);
    cell.add_probe(Location::new(0, 0.5));
    cell
}

fn analytic(t: f64) -> f64 {
    let area = 4.0 * std::f64::consts::PI * SOMA_RADIUS * SOMA_RADIUS; // µm²
    let g = G_DENSITY * area * 1e-2; // µS
    let c = 1e-3 * 0.01 * area; // nF
    let tau = c / g; // ms
    V_INIT + AMPLITUDE / g * (1.0 - (-t / tau).exp())
}

fn max_error(dt: f64) -> f64 {
    let probe = CellMember::new(0, 0);
    let mut group =
        CellGroup::<MulticoreBackend>::new(0, &[passive_soma()], &MechanismRegistry::default())
            .unwrap();
    group.attach_sampler(probe, SAMPLE_DT).unwrap();
    group.advance(TFINAL, dt).unwrap();

    group
        .samples(probe)
        .unwrap()
        .iter()
        .map(|&(t, v)| (v - analytic(t)).abs())
        .fold(0.0, f64::max)
}

#[test]
fn halving_dt_halves_the_error_down_to_tolerance() {
    // steps per ms: 20, 40, 100, 200, 400, 1000
    let dts = [0.05, 0.025, 0.01, 0.005, 0.0025, 0.001];
    let errors: Vec<f64> = dts.iter().map(|&dt| max_error(dt)).collect();

    for pair in errors.windows(2) {
        assert!(
            pair[1] < pair[0],
            "errors must decrease monotonically: {:?}",
            errors
        );
    }
    assert!(
        errors[errors.len() - 1] < 1e-3,
        "finest error {} should be below 1e-3 mV",
        errors[errors.len() - 1]
    );
}

#[test]
fn trace_tracks_the_charging_curve() {
    let err = max_error(0.01);
    // already close at the default-scale step
    assert!(err < 0.05, "max error {} mV at dt = 0.01", err);
}
