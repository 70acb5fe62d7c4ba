// moves.rs - Insertion/deletion trial moves over the occupancy axis

use crate::lattice::{SiteChange, SiteLattice};
use crate::macrostate::MacrostateTable;
use crate::oracle::EnergyOracle;
use crate::overlap::Direction;
use crate::params::SamplerParams;
use nalgebra::Vector3;
use rand::Rng;
use rand_distr::{Distribution, UnitSphere};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MoveKind {
    Insertion,
    Deletion,
}

/// Why a trial did not change the configuration. Boundary rejections never
/// reach the energy oracle.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Rejection {
    Boundary,
    Energy,
}

/// Outcome of one trial move, O(1) bookkeeping for the driver.
#[derive(Debug, Clone, Copy)]
pub struct Trial {
    pub kind: MoveKind,
    pub from_n: usize,
    pub accepted: bool,
    pub rejection: Option<Rejection>,
    /// Energy change of the attempted move; `None` for boundary rejections.
    pub delta_e: Option<f64>,
    pub log_acceptance: Option<f64>,
}

impl Trial {
    /// Particle count after the trial resolved.
    pub fn to_n(&self) -> usize {
        if !self.accepted {
            return self.from_n;
        }
        match self.kind {
            MoveKind::Insertion => self.from_n + 1,
            MoveKind::Deletion => self.from_n - 1,
        }
    }

    /// The overlap sample this trial contributes, as
    /// (lower N of the pair, direction, insertion-direction ΔE).
    /// Every trial that reached the energy oracle contributes one,
    /// accepted or not.
    pub fn overlap_sample(&self) -> Option<(usize, Direction, f64)> {
        let de = self.delta_e?;
        match self.kind {
            MoveKind::Insertion => Some((self.from_n, Direction::Forward, de)),
            MoveKind::Deletion => Some((self.from_n - 1, Direction::Reverse, -de)),
        }
    }

    fn boundary(kind: MoveKind, from_n: usize) -> Self {
        Self {
            kind,
            from_n,
            accepted: false,
            rejection: Some(Rejection::Boundary),
            delta_e: None,
            log_acceptance: None,
        }
    }
}

/// Attempt/outcome counters for one move kind.
#[derive(Debug, Default, Clone, Copy)]
pub struct KindStats {
    pub attempts: u64,
    pub accepted: u64,
    pub boundary_rejected: u64,
    pub energy_rejected: u64,
}

impl KindStats {
    pub fn acceptance_rate(&self) -> f64 {
        if self.attempts == 0 {
            0.0
        } else {
            self.accepted as f64 / self.attempts as f64
        }
    }
}

#[derive(Debug, Default, Clone, Copy)]
pub struct MoveStats {
    pub insertion: KindStats,
    pub deletion: KindStats,
}

impl MoveStats {
    pub fn total_attempts(&self) -> u64 {
        self.insertion.attempts + self.deletion.attempts
    }

    pub fn total_accepted(&self) -> u64 {
        self.insertion.accepted + self.deletion.accepted
    }
}

/// Grand-canonical-style trial generator over a finite site set.
///
/// Insertion picks a uniformly random empty site plus a displacement drawn
/// uniformly from the ball of radius `max_insert_distance`; deletion picks
/// a uniformly random occupied site. The acceptance exponent carries the
/// energy delta, the chemical potential, the bias-weight difference
/// between source and destination macrostate, and the log site-count
/// ratio correcting for the discrete proposal sets, so detailed balance
/// holds in the biased ensemble.
#[derive(Debug)]
pub struct InsertDeleteMove {
    beta: f64,
    mu: f64,
    max_insert_distance: f64,
    insert_probability: f64,
    pub stats: MoveStats,
}

impl InsertDeleteMove {
    pub fn new(params: &SamplerParams) -> Self {
        Self {
            beta: params.beta,
            mu: params.mu,
            max_insert_distance: params.max_insert_distance,
            insert_probability: params.insert_probability,
            stats: MoveStats::default(),
        }
    }

    /// One trial move. Mutates the configuration only on acceptance.
    pub fn propose(
        &mut self,
        cfg: &mut SiteLattice,
        table: &MacrostateTable,
        oracle: &impl EnergyOracle,
        rng: &mut impl Rng,
    ) -> Trial {
        if rng.gen_bool(self.insert_probability) {
            self.propose_insertion(cfg, table, oracle, rng)
        } else {
            self.propose_deletion(cfg, table, oracle, rng)
        }
    }

    fn propose_insertion(
        &mut self,
        cfg: &mut SiteLattice,
        table: &MacrostateTable,
        oracle: &impl EnergyOracle,
        rng: &mut impl Rng,
    ) -> Trial {
        let n = cfg.n();
        self.stats.insertion.attempts += 1;

        let site = match (n < table.n_max(), cfg.random_empty(rng)) {
            (true, Some(site)) => site,
            _ => {
                self.stats.insertion.boundary_rejected += 1;
                return Trial::boundary(MoveKind::Insertion, n);
            }
        };

        let offset = random_in_ball(self.max_insert_distance, rng);
        let change = SiteChange::Insert { site, offset };
        let delta_e = oracle.tentative_delta(cfg, &change);

        let empty = (cfg.n_sites() - n) as f64;
        let ln_acc = -self.beta * delta_e
            + self.beta * self.mu
            + (table.bias_weight(n) - table.bias_weight(n + 1))
            + (empty / (n + 1) as f64).ln();

        let accepted = ln_acc >= 0.0 || rng.gen::<f64>() < ln_acc.exp();
        if accepted {
            cfg.apply(&change);
            self.stats.insertion.accepted += 1;
        } else {
            self.stats.insertion.energy_rejected += 1;
        }

        Trial {
            kind: MoveKind::Insertion,
            from_n: n,
            accepted,
            rejection: (!accepted).then_some(Rejection::Energy),
            delta_e: Some(delta_e),
            log_acceptance: Some(ln_acc),
        }
    }

    fn propose_deletion(
        &mut self,
        cfg: &mut SiteLattice,
        table: &MacrostateTable,
        oracle: &impl EnergyOracle,
        rng: &mut impl Rng,
    ) -> Trial {
        let n = cfg.n();
        self.stats.deletion.attempts += 1;

        let site = match (n > table.n_min(), cfg.random_occupied(rng)) {
            (true, Some(site)) => site,
            _ => {
                self.stats.deletion.boundary_rejected += 1;
                return Trial::boundary(MoveKind::Deletion, n);
            }
        };

        let change = SiteChange::Delete { site, offset: cfg.displacement(site) };
        let delta_e = oracle.tentative_delta(cfg, &change);

        let empty_after = (cfg.n_sites() - n + 1) as f64;
        let ln_acc = -self.beta * delta_e
            - self.beta * self.mu
            + (table.bias_weight(n) - table.bias_weight(n - 1))
            + (n as f64 / empty_after).ln();

        let accepted = ln_acc >= 0.0 || rng.gen::<f64>() < ln_acc.exp();
        if accepted {
            cfg.apply(&change);
            self.stats.deletion.accepted += 1;
        } else {
            self.stats.deletion.energy_rejected += 1;
        }

        Trial {
            kind: MoveKind::Deletion,
            from_n: n,
            accepted,
            rejection: (!accepted).then_some(Rejection::Energy),
            delta_e: Some(delta_e),
            log_acceptance: Some(ln_acc),
        }
    }
}

/// Uniform draw from the ball of radius `r_max`.
fn random_in_ball(r_max: f64, rng: &mut impl Rng) -> Vector3<f64> {
    let dir: [f64; 3] = UnitSphere.sample(rng);
    let r = r_max * rng.gen::<f64>().cbrt();
    Vector3::new(dir[0], dir[1], dir[2]) * r
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::oracle::NDependentOracle;
    use rand::SeedableRng;
    use rand_chacha::ChaCha20Rng;

    fn setup(n: usize) -> (SiteLattice, MacrostateTable, NDependentOracle, SamplerParams) {
        let params = SamplerParams {
            n_min: 5,
            n_max: 8,
            n_sites: 8,
            n_ref: 8,
            ..Default::default()
        };
        let sites = SiteLattice::cubic_sites(2, 2, 2, 1.0);
        let lattice = SiteLattice::with_occupied_count(sites, n);
        let table = MacrostateTable::new(params.n_min, params.n_max, params.pressure_block);
        (lattice, table, NDependentOracle::new(0.0, 0.0), params)
    }

    #[test]
    fn test_insertion_at_full_lattice_is_boundary_rejected() {
        let (mut lattice, table, oracle, params) = setup(8);
        let mut mover = InsertDeleteMove::new(&params);
        mover.insert_probability = 1.0;
        let mut rng = ChaCha20Rng::seed_from_u64(1);

        let trial = mover.propose(&mut lattice, &table, &oracle, &mut rng);

        assert!(!trial.accepted);
        assert_eq!(trial.rejection, Some(Rejection::Boundary));
        assert!(trial.delta_e.is_none());
        assert_eq!(mover.stats.insertion.boundary_rejected, 1);
        assert_eq!(lattice.n(), 8);
    }

    #[test]
    fn test_deletion_at_floor_is_boundary_rejected() {
        let (mut lattice, table, oracle, params) = setup(5);
        let mut mover = InsertDeleteMove::new(&params);
        mover.insert_probability = 0.0;
        let mut rng = ChaCha20Rng::seed_from_u64(2);

        let trial = mover.propose(&mut lattice, &table, &oracle, &mut rng);
        assert_eq!(trial.rejection, Some(Rejection::Boundary));
        assert_eq!(lattice.n(), 5);
    }

    #[test]
    fn test_overlap_sample_direction_convention() {
        let (mut lattice, table, _oracle, params) = setup(6);
        let oracle = NDependentOracle::new(2.0, 0.1);
        let mut mover = InsertDeleteMove::new(&params);
        mover.insert_probability = 0.0;
        let mut rng = ChaCha20Rng::seed_from_u64(3);

        // Deletion 6 -> 5: insertion-direction delta for pair (5, 6)
        // is the cost of inserting at N = 5.
        let trial = mover.propose(&mut lattice, &table, &oracle, &mut rng);
        let (pair, dir, de) = trial.overlap_sample().expect("energy was evaluated");
        assert_eq!(pair, 5);
        assert_eq!(dir, Direction::Reverse);
        assert!((de - 2.5).abs() < 1e-12);
    }

    #[test]
    fn test_acceptance_rate_is_plausible() {
        let (mut lattice, table, oracle, params) = setup(6);
        let mut mover = InsertDeleteMove::new(&params);
        let mut rng = ChaCha20Rng::seed_from_u64(0xDEADBEEF);

        for _ in 0..2_000 {
            mover.propose(&mut lattice, &table, &oracle, &mut rng);
        }
        let total = mover.stats.total_attempts();
        let acc = mover.stats.total_accepted() as f64 / total as f64;
        assert!(
            (0.01..=0.99).contains(&acc),
            "acceptance rate {acc:.3} outside plausible range"
        );
    }
}
