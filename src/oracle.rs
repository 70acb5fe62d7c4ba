// oracle.rs - Energy/virial seam consumed by the sampler

use crate::lattice::{SiteChange, SiteLattice};
use nalgebra::Vector3;

/// Opaque energy and virial evaluator.
///
/// The sampler never inspects potential parameters; it only asks for total
/// energy, total virial, and the energy change a proposed occupancy change
/// would cause. `tentative_delta` must not mutate the configuration.
pub trait EnergyOracle {
    fn energy_of(&self, cfg: &SiteLattice) -> f64;
    fn virial_of(&self, cfg: &SiteLattice) -> f64;
    fn tentative_delta(&self, cfg: &SiteLattice, change: &SiteChange) -> f64;
}

/// Synthetic oracle whose insertion energy depends only on the particle
/// count: inserting into a configuration with N particles costs
/// `offset + slope * N`. Deterministic, so overlap estimates have known
/// exact answers.
#[derive(Debug, Clone)]
pub struct NDependentOracle {
    pub offset: f64,
    pub slope: f64,
    /// Virial contributed per particle (kept zero unless a pressure
    /// profile with structure is wanted).
    pub virial_per_particle: f64,
}

impl NDependentOracle {
    pub fn new(offset: f64, slope: f64) -> Self {
        Self { offset, slope, virial_per_particle: 0.0 }
    }

    /// Energy cost of the insertion N -> N+1.
    pub fn insertion_delta(&self, n: usize) -> f64 {
        self.offset + self.slope * n as f64
    }
}

impl EnergyOracle for NDependentOracle {
    fn energy_of(&self, cfg: &SiteLattice) -> f64 {
        (0..cfg.n()).map(|k| self.insertion_delta(k)).sum()
    }

    fn virial_of(&self, cfg: &SiteLattice) -> f64 {
        self.virial_per_particle * cfg.n() as f64
    }

    fn tentative_delta(&self, cfg: &SiteLattice, change: &SiteChange) -> f64 {
        match change {
            SiteChange::Insert { .. } => self.insertion_delta(cfg.n()),
            SiteChange::Delete { .. } => -self.insertion_delta(cfg.n() - 1),
        }
    }
}

/// Minimal interacting model: each unordered pair of particles closer than
/// `cutoff` contributes `pair_energy`. Enough structure to exercise the
/// sampler against a configuration-dependent landscape.
#[derive(Debug, Clone)]
pub struct LatticeGasOracle {
    pub cutoff: f64,
    pub pair_energy: f64,
}

impl LatticeGasOracle {
    pub fn new(cutoff: f64, pair_energy: f64) -> Self {
        Self { cutoff, pair_energy }
    }

    fn neighbors_of(&self, cfg: &SiteLattice, pos: Vector3<f64>, skip: Option<usize>) -> usize {
        let cut2 = self.cutoff * self.cutoff;
        cfg.occupied_sites()
            .iter()
            .filter(|&&s| Some(s) != skip)
            .filter(|&&s| (cfg.position(s) - pos).norm_squared() < cut2)
            .count()
    }
}

impl EnergyOracle for LatticeGasOracle {
    fn energy_of(&self, cfg: &SiteLattice) -> f64 {
        let occ = cfg.occupied_sites();
        let cut2 = self.cutoff * self.cutoff;
        let mut pairs = 0usize;
        for (a, &i) in occ.iter().enumerate() {
            for &j in occ.iter().skip(a + 1) {
                if (cfg.position(i) - cfg.position(j)).norm_squared() < cut2 {
                    pairs += 1;
                }
            }
        }
        pairs as f64 * self.pair_energy
    }

    fn virial_of(&self, _cfg: &SiteLattice) -> f64 {
        // Contact interaction: no force contribution.
        0.0
    }

    fn tentative_delta(&self, cfg: &SiteLattice, change: &SiteChange) -> f64 {
        match *change {
            SiteChange::Insert { site, offset } => {
                let pos = cfg.site_coord(site) + offset;
                self.neighbors_of(cfg, pos, None) as f64 * self.pair_energy
            }
            SiteChange::Delete { site, .. } => {
                let pos = cfg.position(site);
                -(self.neighbors_of(cfg, pos, Some(site)) as f64 * self.pair_energy)
            }
        }
    }
}
