// bias.rs - Multicanonical weight refresh from the overlap profile

use crate::macrostate::MacrostateTable;
use crate::overlap::OverlapEstimator;
use crate::params::SamplerParams;

/// Periodically recomputes the per-macrostate bias weights so that the
/// biased walk visits every N with comparable frequency.
///
/// Weights are log-scale: w(N) = β·(μ·N − A(N)). Only this controller
/// writes them; acceptance logic reads them. Freezing is an explicit
/// transition triggered by the driver, never automatic.
#[derive(Debug, Clone)]
pub struct BiasController {
    beta: f64,
    mu: f64,
    interval: u64,
    n_max_reweight: usize,
    tolerance: f64,
    fixed_defect_fe: Option<f64>,
    trials_seen: u64,
    updates_done: u64,
    last_max_shift: f64,
    converged: bool,
    frozen: bool,
}

impl BiasController {
    pub fn new(params: &SamplerParams) -> Self {
        Self {
            beta: params.beta,
            mu: params.mu,
            interval: params.bias_interval,
            n_max_reweight: params.n_max_reweight,
            tolerance: params.bias_tolerance,
            fixed_defect_fe: params.fixed_defect_fe,
            trials_seen: 0,
            updates_done: 0,
            last_max_shift: f64::INFINITY,
            converged: false,
            frozen: false,
        }
    }

    /// Count one trial; refresh the weights every `bias_interval` trials.
    /// Returns whether a refresh happened.
    pub fn maybe_update(&mut self, table: &mut MacrostateTable, est: &OverlapEstimator) -> bool {
        if self.frozen {
            return false;
        }
        self.trials_seen += 1;
        if self.trials_seen % self.interval != 0 {
            return false;
        }
        self.refresh(table, est)
    }

    /// Recompute weights from the current free-energy profile.
    ///
    /// Macrostates with a defined estimate inside the reweight window
    /// around the most-visited N get w = β(μN − A). Outside the defined
    /// region, the optional fixed defect free energy extrapolates the
    /// profile at a constant per-step increment; those weights are flagged
    /// provisional. Everything else carries its previous weight forward.
    pub fn refresh(&mut self, table: &mut MacrostateTable, est: &OverlapEstimator) -> bool {
        let profile = est.profile();
        let n_min = table.n_min();

        for (i, fe) in profile.iter().enumerate() {
            table.set_free_energy(n_min + i, *fe);
        }

        let center = table.most_visited();
        let mut max_shift = 0.0f64;
        let mut wrote = false;

        for (i, fe) in profile.iter().enumerate() {
            let n = n_min + i;
            if n.abs_diff(center) > self.n_max_reweight {
                continue;
            }
            if let Some((a, _)) = fe {
                let w = self.weight_for(n, *a);
                max_shift = max_shift.max((w - table.bias_weight(n)).abs());
                table.set_bias_weight(n, w, false);
                wrote = true;
            }
        }

        if let Some(df) = self.fixed_defect_fe {
            wrote |= self.extrapolate(table, &profile, df, &mut max_shift);
        }

        if !wrote {
            return false;
        }

        self.updates_done += 1;
        self.last_max_shift = max_shift;
        self.converged = max_shift < self.tolerance;
        table.bump_weight_generation();
        log::debug!(
            "bias refresh #{}: max weight shift {:.3e}{}",
            self.updates_done,
            max_shift,
            if self.converged { " (converged)" } else { "" }
        );
        true
    }

    /// Extend the profile past the defined region at `df` per step.
    fn extrapolate(
        &self,
        table: &mut MacrostateTable,
        profile: &[Option<(f64, f64)>],
        df: f64,
        max_shift: &mut f64,
    ) -> bool {
        let n_min = table.n_min();
        let mut wrote = false;

        let first = profile.iter().position(|fe| fe.is_some());
        let last = profile.iter().rposition(|fe| fe.is_some());
        let (Some(first), Some(last)) = (first, last) else { return false };

        let (a_lo, _) = profile[first].expect("defined by position()");
        for i in (0..first).rev() {
            let n = n_min + i;
            let a = a_lo - df * (first - i) as f64;
            let w = self.weight_for(n, a);
            *max_shift = max_shift.max((w - table.bias_weight(n)).abs());
            table.set_bias_weight(n, w, true);
            wrote = true;
        }

        let (a_hi, _) = profile[last].expect("defined by rposition()");
        for i in (last + 1)..profile.len() {
            let n = n_min + i;
            let a = a_hi + df * (i - last) as f64;
            let w = self.weight_for(n, a);
            *max_shift = max_shift.max((w - table.bias_weight(n)).abs());
            table.set_bias_weight(n, w, true);
            wrote = true;
        }

        wrote
    }

    fn weight_for(&self, n: usize, a: f64) -> f64 {
        self.beta * (self.mu * n as f64 - a)
    }

    /// Freeze the weights for the production phase. Explicit and
    /// irreversible for the lifetime of this controller.
    pub fn freeze(&mut self) {
        if !self.frozen {
            log::info!(
                "bias weights frozen after {} refreshes (last max shift {:.3e})",
                self.updates_done,
                self.last_max_shift
            );
        }
        self.frozen = true;
    }

    pub fn frozen(&self) -> bool {
        self.frozen
    }

    /// Whether the last refresh moved no weight by more than the
    /// configured tolerance.
    pub fn converged(&self) -> bool {
        self.converged
    }

    pub fn updates_done(&self) -> u64 {
        self.updates_done
    }

    pub fn last_max_shift(&self) -> f64 {
        self.last_max_shift
    }
}
