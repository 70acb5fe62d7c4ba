//! Staged vacancy free-energy run with replicas and error bars.
//!
//! Stage 1 equilibrates the multicanonical bias weights, stage 2 collects
//! production statistics under frozen weights, then the chemical potential
//! matching the target pressure is solved per replica. Parameters are kept
//! in one `Config` struct so comments never drift out of sync with the
//! executable settings.
//
//  Compile & run:  `cargo run --release --bin vacancy_scan`

use vacmc::driver::SimulationState;
use vacmc::lattice::SiteLattice;
use vacmc::mu_solver::{PressureTarget, SolveOutcome};
use vacmc::oracle::LatticeGasOracle;
use vacmc::params::SamplerParams;

use csv::WriterBuilder;
use indicatif::{ProgressBar, ProgressStyle};
use rand::{RngCore, SeedableRng};
use rand_chacha::ChaCha20Rng;
use rayon::prelude::*;
use std::sync::Mutex;

// -----------------------------------------------------------------------------
// Configuration
// -----------------------------------------------------------------------------
#[derive(Clone, Debug)]
struct Config {
    cell:            (usize, usize, usize),
    spacing:         f64,
    vacancy_span:    usize,
    beta:            f64,
    mu:              f64,
    equil_steps:     u64,
    prod_steps:      u64,
    bias_interval:   u64,
    sample_every:    u64,
    pressure_block:  u64,
    target_pressure: f64,
    pressure_tol:    f64,
    n_rep:           usize,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            cell:            (5, 5, 4),        // 100 sites
            spacing:         1.0,
            vacancy_span:    5,                // sample N in [sites-5, sites]
            beta:            1.0,
            mu:              2.5,
            equil_steps:     200_000,
            prod_steps:      400_000,
            bias_interval:   1_000,
            sample_every:    10,
            pressure_block:  200,
            target_pressure: 0.97,
            pressure_tol:    1e-3,
            n_rep:           4,
        }
    }
}

// -----------------------------------------------------------------------------
// CSV row
// -----------------------------------------------------------------------------
#[derive(Debug)]
struct Row {
    rep:         usize,
    n:           usize,
    visits:      u64,
    bias_weight: f64,
    provisional: bool,
    pressure:    Option<f64>,
    pressure_err: Option<f64>,
    free_energy: Option<f64>,
    free_energy_err: Option<f64>,
}

fn opt(x: Option<f64>) -> String {
    x.map(|v| v.to_string()).unwrap_or_default()
}

// -----------------------------------------------------------------------------
// Main
// -----------------------------------------------------------------------------
fn main() {
    let cfg = Config::default();
    println!("Running vacancy scan with configuration:\n{cfg:#?}");

    let n_sites = cfg.cell.0 * cfg.cell.1 * cfg.cell.2;

    let bar = ProgressBar::new(cfg.n_rep as u64);
    bar.set_style(
        ProgressStyle::with_template(" {bar:40.cyan/blue} {pos}/{len} [{elapsed_precise}]")
            .unwrap(),
    );

    let rows = Mutex::new(Vec::new());
    let mut master = ChaCha20Rng::from_entropy();
    let seeds: Vec<u64> = (0..cfg.n_rep).map(|_| master.next_u64()).collect();

    seeds.par_iter().enumerate().for_each(|(rep, &seed)| {
        let mut rng = ChaCha20Rng::seed_from_u64(seed ^ ((rep as u64) << 32));

        let params = SamplerParams {
            beta:            cfg.beta,
            mu:              cfg.mu,
            n_min:           n_sites - cfg.vacancy_span,
            n_max:           n_sites,
            n_sites,
            volume:          n_sites as f64 * cfg.spacing.powi(3),
            bias_interval:   cfg.bias_interval,
            sample_every:    cfg.sample_every,
            pressure_block:  cfg.pressure_block,
            n_max_reweight:  cfg.vacancy_span,
            n_ref:           n_sites,
            ..Default::default()
        };

        let sites = SiteLattice::cubic_sites(cfg.cell.0, cfg.cell.1, cfg.cell.2, cfg.spacing);
        let lattice = SiteLattice::full(sites);
        let oracle = LatticeGasOracle::new(1.1 * cfg.spacing, -0.4);

        let mut state = SimulationState::new(params, lattice, oracle)
            .expect("configuration rejected at setup");

        // Stage 1: weight equilibration.
        state.run(cfg.equil_steps, &mut rng);

        // Stage 2: production under frozen weights.
        state.begin_production();
        state.run(cfg.prod_steps, &mut rng);

        let outcome = state.solve_mu(PressureTarget {
            pressure: cfg.target_pressure,
            tolerance: cfg.pressure_tol,
        });

        let summary = state.summary();
        match outcome {
            SolveOutcome::Converged(s) => {
                println!(
                    "rep {rep}: mu* = {:.5}, N* = {}, p* = {:.5}, vacancy conc = {:.4}, \
                     flatness = {:?}, converged = {}",
                    s.mu, s.n_star, s.pressure, s.vacancy_concentration,
                    summary.flatness, s.converged
                );
            }
            SolveOutcome::Failed(f) => {
                println!(
                    "rep {rep}: root not bracketed in mu range [{:.4}, {:.4}]; extend the \
                     sampled N range or adjust the target",
                    f.mu_lo, f.mu_hi
                );
            }
        }

        let mut local = Vec::new();
        for row in state.profile() {
            local.push(Row {
                rep,
                n: row.n,
                visits: row.visits,
                bias_weight: row.bias_weight,
                provisional: row.provisional,
                pressure: row.pressure_mean,
                pressure_err: row.pressure_err,
                free_energy: row.free_energy,
                free_energy_err: row.free_energy_err,
            });
        }
        rows.lock().unwrap().extend(local);
        bar.inc(1);
    });
    bar.finish();

    // Sort for deterministic CSV order.
    let mut rows = rows.into_inner().unwrap();
    rows.sort_by(|a, b| a.rep.cmp(&b.rep).then(a.n.cmp(&b.n)));

    let mut wtr = WriterBuilder::new()
        .from_path("vacancy_profile.csv")
        .expect("cannot create vacancy_profile.csv");

    wtr.write_record([
        "rep", "n", "visits", "bias_weight", "provisional",
        "pressure", "pressure_err", "free_energy", "free_energy_err",
    ])
    .unwrap();

    for r in &rows {
        wtr.write_record([
            r.rep.to_string(),
            r.n.to_string(),
            r.visits.to_string(),
            r.bias_weight.to_string(),
            r.provisional.to_string(),
            opt(r.pressure),
            opt(r.pressure_err),
            opt(r.free_energy),
            opt(r.free_energy_err),
        ])
        .unwrap();
    }
    wtr.flush().unwrap();

    println!("Scan complete → vacancy_profile.csv");
}
