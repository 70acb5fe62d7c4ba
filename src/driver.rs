// driver.rs - Sequential simulation driver owning all mutable sampler state

use crate::bias::BiasController;
use crate::lattice::SiteLattice;
use crate::macrostate::MacrostateTable;
use crate::moves::{InsertDeleteMove, MoveStats, Trial};
use crate::mu_solver::{MuRootSolver, PressureTarget, SolveOutcome};
use crate::oracle::EnergyOracle;
use crate::overlap::OverlapEstimator;
use crate::params::SamplerParams;
use crate::report::{profile_rows, ProfileRow, RunSummary};
use anyhow::{ensure, Result};
use rand::Rng;

/// Synchronous observer of resolved trials. The core's own consumers
/// (table, estimator, controller) are wired in directly; listeners exist
/// for external diagnostics only and run after the step is fully applied.
pub trait TrialListener {
    fn on_trial(&mut self, step: u64, trial: &Trial);
}

/// All mutable state of one sampling run, owned in one place and passed
/// by reference to the components that need it. Strictly sequential: one
/// trial, its overlap sample, and any bias refresh happen on a single
/// timeline per step, in that order.
pub struct SimulationState<O: EnergyOracle> {
    params: SamplerParams,
    pub lattice: SiteLattice,
    pub oracle: O,
    pub table: MacrostateTable,
    pub estimator: OverlapEstimator,
    pub controller: BiasController,
    mover: InsertDeleteMove,
    listeners: Vec<Box<dyn TrialListener>>,
    steps_done: u64,
}

impl<O: EnergyOracle> SimulationState<O> {
    pub fn new(params: SamplerParams, lattice: SiteLattice, oracle: O) -> Result<Self> {
        params.validate()?;
        ensure!(
            lattice.n_sites() == params.n_sites,
            "lattice has {} sites but params declare {}",
            lattice.n_sites(),
            params.n_sites
        );
        ensure!(
            (params.n_min..=params.n_max).contains(&lattice.n()),
            "initial particle count {} outside [{}, {}]",
            lattice.n(),
            params.n_min,
            params.n_max
        );

        let table = MacrostateTable::new(params.n_min, params.n_max, params.pressure_block);
        let estimator =
            OverlapEstimator::new(params.beta, params.n_min, params.n_max, params.n_ref, params.n_sites);
        let controller = BiasController::new(&params);
        let mover = InsertDeleteMove::new(&params);

        Ok(Self {
            params,
            lattice,
            oracle,
            table,
            estimator,
            controller,
            mover,
            listeners: Vec::new(),
            steps_done: 0,
        })
    }

    pub fn add_listener(&mut self, listener: Box<dyn TrialListener>) {
        self.listeners.push(listener);
    }

    pub fn params(&self) -> &SamplerParams {
        &self.params
    }

    pub fn steps_done(&self) -> u64 {
        self.steps_done
    }

    pub fn move_stats(&self) -> MoveStats {
        self.mover.stats
    }

    /// One trial move plus its bookkeeping.
    ///
    /// Order within the step is fixed: resolve the trial, record its
    /// overlap sample, count the visit, sample pressure on cadence, and
    /// only then let the bias controller refresh, so the step's sample is
    /// eligible for the refreshed weights.
    pub fn step(&mut self, rng: &mut impl Rng) -> Trial {
        let trial = self.mover.propose(&mut self.lattice, &self.table, &self.oracle, rng);

        if let Some((pair, direction, delta_e)) = trial.overlap_sample() {
            self.estimator.record(pair, direction, delta_e);
        }

        let n = self.lattice.n();
        self.table.record_visit(n);
        self.steps_done += 1;

        if self.steps_done % self.params.sample_every == 0 {
            let p = self.pressure_now();
            self.table.push_pressure(n, p);
        }

        self.controller.maybe_update(&mut self.table, &self.estimator);

        for listener in &mut self.listeners {
            listener.on_trial(self.steps_done, &trial);
        }
        trial
    }

    pub fn run(&mut self, steps: u64, rng: &mut impl Rng) {
        for _ in 0..steps {
            self.step(rng);
        }
    }

    /// Instantaneous pressure from the oracle's virial.
    pub fn pressure_now(&self) -> f64 {
        let n = self.lattice.n() as f64;
        (n * self.params.kt() + self.oracle.virial_of(&self.lattice) / 3.0) / self.params.volume
    }

    /// Transition from weight equilibration to production: freeze the
    /// weights, then clear visits, pressure accumulators, overlap samples
    /// and move counters so production statistics are collected cleanly
    /// under the frozen weights.
    pub fn begin_production(&mut self) {
        self.controller.freeze();
        self.table.reset();
        self.estimator.reset();
        self.mover.stats = MoveStats::default();
        self.steps_done = 0;
        log::info!("production phase started (weights frozen)");
    }

    /// Push the estimator's current free-energy profile into the table.
    pub fn publish_free_energies(&mut self) {
        self.estimator.publish(&mut self.table);
    }

    /// Solve for the chemical potential meeting `target` on the current
    /// profile and pressure averages.
    pub fn solve_mu(&mut self, target: PressureTarget) -> SolveOutcome {
        self.publish_free_energies();
        MuRootSolver::new(self.params.beta).solve(&self.table, &target)
    }

    pub fn profile(&self) -> Vec<ProfileRow> {
        profile_rows(&self.table)
    }

    pub fn summary(&self) -> RunSummary {
        RunSummary {
            total_steps: self.steps_done,
            move_stats: self.mover.stats,
            flatness: self.table.flatness(),
            bias_converged: self.controller.converged(),
            bias_frozen: self.controller.frozen(),
            bias_updates: self.controller.updates_done(),
            weight_generation: self.table.weight_generation(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::oracle::NDependentOracle;
    use rand::SeedableRng;
    use rand_chacha::ChaCha20Rng;

    fn small_state() -> SimulationState<NDependentOracle> {
        let params = SamplerParams {
            n_min: 5,
            n_max: 8,
            n_sites: 8,
            n_ref: 8,
            volume: 8.0,
            ..Default::default()
        };
        let sites = SiteLattice::cubic_sites(2, 2, 2, 1.0);
        let lattice = SiteLattice::full(sites);
        SimulationState::new(params, lattice, NDependentOracle::new(0.5, 0.0)).unwrap()
    }

    #[test]
    fn test_setup_rejects_bad_initial_count() {
        let params = SamplerParams {
            n_min: 7,
            n_max: 8,
            n_sites: 8,
            n_ref: 8,
            ..Default::default()
        };
        let sites = SiteLattice::cubic_sites(2, 2, 2, 1.0);
        let lattice = SiteLattice::with_occupied_count(sites, 3);
        assert!(SimulationState::new(params, lattice, NDependentOracle::new(0.0, 0.0)).is_err());
    }

    #[test]
    fn test_steps_are_counted() {
        let mut state = small_state();
        let mut rng = ChaCha20Rng::seed_from_u64(7);
        state.run(500, &mut rng);
        assert_eq!(state.steps_done(), 500);
        assert_eq!(state.move_stats().total_attempts(), 500);
    }

    #[test]
    fn test_listener_sees_every_trial() {
        struct Counter(std::rc::Rc<std::cell::Cell<u64>>);
        impl TrialListener for Counter {
            fn on_trial(&mut self, _step: u64, _trial: &Trial) {
                self.0.set(self.0.get() + 1);
            }
        }

        let seen = std::rc::Rc::new(std::cell::Cell::new(0));
        let mut state = small_state();
        state.add_listener(Box::new(Counter(seen.clone())));
        let mut rng = ChaCha20Rng::seed_from_u64(11);
        state.run(120, &mut rng);
        assert_eq!(seen.get(), 120);
    }
}
