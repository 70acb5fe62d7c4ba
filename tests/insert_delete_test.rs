//! Unit-test: trial-move acceptance exponent and boundary handling.

use vacmc::lattice::SiteLattice;
use vacmc::macrostate::MacrostateTable;
use vacmc::moves::{InsertDeleteMove, MoveKind, Rejection};
use vacmc::oracle::NDependentOracle;
use vacmc::params::SamplerParams;

use rand::SeedableRng;
use rand_chacha::ChaCha20Rng;

fn params() -> SamplerParams {
    SamplerParams {
        beta: 2.0,
        mu: 1.5,
        n_min: 90,
        n_max: 100,
        n_sites: 100,
        n_ref: 100,
        volume: 100.0,
        ..Default::default()
    }
}

#[test]
fn test_insertion_exponent_matches_formula() {
    let p = SamplerParams { insert_probability: 1.0, ..params() };
    let sites = SiteLattice::cubic_sites(5, 5, 4, 1.0);
    let mut lattice = SiteLattice::with_occupied_count(sites, 96);
    let table = MacrostateTable::new(p.n_min, p.n_max, p.pressure_block);
    let oracle = NDependentOracle::new(2.0, 0.1);
    let mut mover = InsertDeleteMove::new(&p);
    let mut rng = ChaCha20Rng::seed_from_u64(0xBEEF);

    // The synthetic delta depends only on N, so the exponent is exact no
    // matter which site the trial picked.
    let trial = mover.propose(&mut lattice, &table, &oracle, &mut rng);
    assert_eq!(trial.kind, MoveKind::Insertion);

    let delta_e = 2.0 + 0.1 * 96.0;
    let expected = -p.beta * delta_e
        + p.beta * p.mu
        + ((100.0 - 96.0) / 97.0f64).ln();

    assert_eq!(trial.from_n, 96);
    assert!((trial.delta_e.unwrap() - delta_e).abs() < 1e-12);
    assert!(
        (trial.log_acceptance.unwrap() - expected).abs() < 1e-12,
        "log acceptance {} != expected {}",
        trial.log_acceptance.unwrap(),
        expected
    );
}

#[test]
fn test_boundary_rejections_are_counted_separately() {
    let p = params();
    let sites = SiteLattice::cubic_sites(5, 5, 4, 1.0);
    let mut lattice = SiteLattice::full(sites);
    let table = MacrostateTable::new(p.n_min, p.n_max, p.pressure_block);
    // Steep energies so plenty of ordinary rejections happen too.
    let oracle = NDependentOracle::new(5.0, 0.1);
    let mut mover = InsertDeleteMove::new(&p);
    let mut rng = ChaCha20Rng::seed_from_u64(7);

    let mut saw_boundary = 0u64;
    let mut saw_energy = 0u64;
    for _ in 0..20_000 {
        let t = mover.propose(&mut lattice, &table, &oracle, &mut rng);
        match t.rejection {
            Some(Rejection::Boundary) => {
                saw_boundary += 1;
                assert!(t.delta_e.is_none(), "boundary rejection reached the oracle");
            }
            Some(Rejection::Energy) => {
                saw_energy += 1;
                assert!(t.delta_e.is_some());
            }
            None => assert!(t.accepted),
        }
        let n = lattice.n();
        assert!((p.n_min..=p.n_max).contains(&n), "walk left the range: N = {n}");
    }

    let stats = mover.stats;
    assert_eq!(
        stats.insertion.boundary_rejected + stats.deletion.boundary_rejected,
        saw_boundary
    );
    assert_eq!(
        stats.insertion.energy_rejected + stats.deletion.energy_rejected,
        saw_energy
    );
    assert!(saw_boundary > 0, "full lattice should boundary-reject insertions");
}

#[test]
fn test_acceptance_rate_is_plausible_on_flat_landscape() {
    let p = SamplerParams {
        n_min: 90,
        n_max: 100,
        n_sites: 100,
        n_ref: 100,
        ..Default::default()
    };
    let sites = SiteLattice::cubic_sites(5, 5, 4, 1.0);
    let mut lattice = SiteLattice::with_occupied_count(sites, 95);
    let table = MacrostateTable::new(p.n_min, p.n_max, p.pressure_block);
    let oracle = NDependentOracle::new(0.0, 0.0);
    let mut mover = InsertDeleteMove::new(&p);
    let mut rng = ChaCha20Rng::seed_from_u64(0xDEADBEEF);

    let n_steps = 10_000;
    for _ in 0..n_steps {
        mover.propose(&mut lattice, &table, &oracle, &mut rng);
    }

    let acc = mover.stats.total_accepted() as f64 / n_steps as f64;
    assert!(
        (0.01..=0.99).contains(&acc),
        "acceptance rate {acc:.3} is outside plausible range"
    );
}
