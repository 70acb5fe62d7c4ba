//! Integration test: multicanonical reweighting flattens the visit
//! histogram on a landscape with a known free-energy profile.

use vacmc::driver::SimulationState;
use vacmc::lattice::SiteLattice;
use vacmc::oracle::NDependentOracle;
use vacmc::params::SamplerParams;

use rand::SeedableRng;
use rand_chacha::ChaCha20Rng;

fn scenario_state() -> SimulationState<NDependentOracle> {
    let params = SamplerParams {
        beta:           1.0,
        mu:             2.5,
        n_min:          95,
        n_max:          100,
        n_sites:        100,
        volume:         100.0,
        bias_interval:  1_000,
        n_max_reweight: 5,
        n_ref:          100,
        ..Default::default()
    };
    let sites = SiteLattice::cubic_sites(5, 5, 4, 1.0);
    let lattice = SiteLattice::full(sites);
    SimulationState::new(params, lattice, NDependentOracle::new(2.0, 0.1)).expect("setup")
}

#[test]
fn test_reweighting_flattens_histogram() {
    let mut rng = ChaCha20Rng::seed_from_u64(0xF1A77E5);
    let mut state = scenario_state();

    // Stage 1: let the controller learn the weights.
    state.run(150_000, &mut rng);
    let summary = state.summary();
    assert!(summary.bias_updates > 50, "only {} refreshes", summary.bias_updates);
    assert!(
        summary.bias_converged,
        "weights did not converge (last shift {:.3e})",
        state.controller.last_max_shift()
    );

    // Stage 2: clean histogram under frozen weights.
    state.begin_production();
    state.run(300_000, &mut rng);

    let flatness = state
        .table
        .flatness()
        .expect("every macrostate should be visited in production");
    assert!(flatness < 5.0, "histogram max/min ratio {flatness:.2} >= 5");

    // Frozen controller must not touch the weights during production.
    let summary = state.summary();
    assert!(summary.bias_frozen);
    assert_eq!(summary.weight_generation, state.table.weight_generation());
}

#[test]
fn test_learned_profile_matches_synthetic_landscape() {
    let mut rng = ChaCha20Rng::seed_from_u64(31337);
    let mut state = scenario_state();

    state.run(100_000, &mut rng);
    state.begin_production();
    state.run(100_000, &mut rng);
    state.publish_free_energies();

    // Deterministic deltas: the estimated per-step free energy must equal
    // the synthetic insertion cost minus the site-count entropy.
    for n in 95..100usize {
        let a_n = state.table.record(n).free_energy;
        let a_up = state.table.record(n + 1).free_energy;
        let (Some((a_n, _)), Some((a_up, _))) = (a_n, a_up) else {
            panic!("profile undefined at pair ({n}, {})", n + 1);
        };
        let ratio = (100.0 - n as f64) / (n as f64 + 1.0);
        let expected = (2.0 + 0.1 * n as f64) - ratio.ln();
        let measured = a_up - a_n;
        assert!(
            (measured - expected).abs() < 1e-6,
            "dA({n} -> {}) = {measured}, expected {expected}",
            n + 1
        );
    }
}
