//! Run-time parameters for the occupancy sampler
//! (single source of truth, validated once at setup).

use anyhow::{bail, Result};

/// Parameters shared by the move generator, bias controller and driver.
#[derive(Debug, Clone)]
pub struct SamplerParams {
    /// Inverse temperature 1/kT.
    pub beta: f64,
    /// Chemical potential used during sampling.
    pub mu: f64,
    /// Smallest particle count the walk may visit (hard wall).
    pub n_min: usize,
    /// Largest particle count the walk may visit (hard wall).
    pub n_max: usize,
    /// Total number of lattice sites.
    pub n_sites: usize,
    /// Cell volume, for pressure samples.
    pub volume: f64,
    /// Maximum displacement of an insertion point from its lattice site.
    pub max_insert_distance: f64,
    /// Probability that a trial is an insertion rather than a deletion.
    pub insert_probability: f64,
    /// Trials between bias-weight refreshes.
    pub bias_interval: u64,
    /// Steps between pressure samples.
    pub sample_every: u64,
    /// Raw pressure samples per averaging block.
    pub pressure_block: u64,
    /// Reweight window half-width around the most-visited macrostate.
    pub n_max_reweight: usize,
    /// Weight-shift tolerance below which the bias is considered converged.
    pub bias_tolerance: f64,
    /// Optional per-step free-energy plateau used to extrapolate the
    /// profile beyond the sampled region.
    pub fixed_defect_fe: Option<f64>,
    /// Reference macrostate for the free-energy profile, A(n_ref) = 0.
    pub n_ref: usize,
}

impl Default for SamplerParams {
    fn default() -> Self {
        Self {
            beta:                1.0,
            mu:                  0.0,
            n_min:               100,
            n_max:               108,
            n_sites:             108,
            volume:              108.0,
            max_insert_distance: 0.3,
            insert_probability:  0.5,
            bias_interval:       500,
            sample_every:        10,
            pressure_block:      100,
            n_max_reweight:      5,
            bias_tolerance:      1e-2,
            fixed_defect_fe:     None,
            n_ref:               108,
        }
    }
}

impl SamplerParams {
    /// Reject out-of-contract inputs before any sampling starts.
    /// Everything that can go wrong *during* a run is a data condition,
    /// not an error; only setup mistakes are fatal.
    pub fn validate(&self) -> Result<()> {
        if self.n_min > self.n_max {
            bail!("n_min ({}) exceeds n_max ({})", self.n_min, self.n_max);
        }
        if self.n_max > self.n_sites {
            bail!(
                "n_max ({}) exceeds the number of lattice sites ({})",
                self.n_max,
                self.n_sites
            );
        }
        if !(self.n_min..=self.n_max).contains(&self.n_ref) {
            bail!("n_ref ({}) outside [{}, {}]", self.n_ref, self.n_min, self.n_max);
        }
        if !(self.beta > 0.0) {
            bail!("beta must be positive, got {}", self.beta);
        }
        if !(self.volume > 0.0) {
            bail!("volume must be positive, got {}", self.volume);
        }
        if !(self.max_insert_distance > 0.0) {
            bail!("max_insert_distance must be positive, got {}", self.max_insert_distance);
        }
        if !(0.0..=1.0).contains(&self.insert_probability) {
            bail!("insert_probability must lie in [0, 1], got {}", self.insert_probability);
        }
        if self.bias_interval == 0 || self.sample_every == 0 || self.pressure_block == 0 {
            bail!("bias_interval, sample_every and pressure_block must be nonzero");
        }
        Ok(())
    }

    /// kT in the same units as the energies.
    pub fn kt(&self) -> f64 {
        1.0 / self.beta
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_params_validate() {
        assert!(SamplerParams::default().validate().is_ok());
    }

    #[test]
    fn test_inverted_range_is_fatal() {
        let p = SamplerParams { n_min: 10, n_max: 5, n_ref: 5, ..Default::default() };
        assert!(p.validate().is_err());
    }

    #[test]
    fn test_range_beyond_sites_is_fatal() {
        let p = SamplerParams { n_sites: 100, ..Default::default() };
        assert!(p.validate().is_err());
    }
}
