// overlap.rs - Bennett-style free-energy differences between adjacent macrostates

use crate::macrostate::MacrostateTable;

/// Which ensemble a trial energy was sampled in: `Forward` while the walk
/// was at N (insertion attempts), `Reverse` while it was at N+1 (deletion
/// attempts, stored in the insertion direction).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Direction {
    Forward,
    Reverse,
}

/// Bidirectional energy-delta samples for one adjacent pair (N, N+1).
/// Both collections hold ΔE = E(N+1) − E(N).
#[derive(Debug, Clone, Default)]
pub struct PairSamples {
    pub forward: Vec<f64>,
    pub reverse: Vec<f64>,
}

/// A converged (or capped) Bennett estimate for one pair.
#[derive(Debug, Clone, Copy)]
pub struct PairEstimate {
    /// ΔA(N → N+1).
    pub delta_a: f64,
    pub stderr: f64,
    pub iterations: usize,
    /// False when the fixed point hit the iteration cap; `delta_a` is then
    /// the last iterate, not a converged value.
    pub converged: bool,
}

/// Estimate for a pair, or `Undefined` when data exists in at most one
/// direction. One-sided estimates are biased and are never reported as
/// values.
#[derive(Debug, Clone, Copy)]
pub enum EstimateOutcome {
    Estimate(PairEstimate),
    Undefined,
}

impl EstimateOutcome {
    pub fn value(&self) -> Option<PairEstimate> {
        match *self {
            EstimateOutcome::Estimate(e) => Some(e),
            EstimateOutcome::Undefined => None,
        }
    }
}

/// Accumulates trial energies for every adjacent pair in [n_min, n_max]
/// and combines each pair's two sample sets into a maximum-likelihood
/// estimate of ΔA via the Bennett acceptance-ratio fixed point.
#[derive(Debug, Clone)]
pub struct OverlapEstimator {
    beta: f64,
    n_min: usize,
    n_max: usize,
    n_ref: usize,
    n_sites: usize,
    pairs: Vec<PairSamples>,
    max_iterations: usize,
    tolerance: f64,
}

impl OverlapEstimator {
    pub fn new(beta: f64, n_min: usize, n_max: usize, n_ref: usize, n_sites: usize) -> Self {
        assert!(n_min <= n_max);
        assert!(n_max <= n_sites);
        assert!((n_min..=n_max).contains(&n_ref));
        Self {
            beta,
            n_min,
            n_max,
            n_ref,
            n_sites,
            pairs: vec![PairSamples::default(); n_max - n_min],
            max_iterations: 64,
            tolerance: 1e-10,
        }
    }

    pub fn n_ref(&self) -> usize {
        self.n_ref
    }

    fn pair_idx(&self, lower_n: usize) -> usize {
        debug_assert!(
            lower_n >= self.n_min && lower_n < self.n_max,
            "pair ({lower_n}, {}) outside table range",
            lower_n + 1
        );
        lower_n - self.n_min
    }

    /// Record one trial energy for the pair (lower_n, lower_n + 1).
    /// Accepted and rejected trials are both recorded; the estimator uses
    /// all attempts.
    pub fn record(&mut self, lower_n: usize, direction: Direction, delta_e: f64) {
        let i = self.pair_idx(lower_n);
        match direction {
            Direction::Forward => self.pairs[i].forward.push(delta_e),
            Direction::Reverse => self.pairs[i].reverse.push(delta_e),
        }
    }

    pub fn samples(&self, lower_n: usize) -> &PairSamples {
        &self.pairs[self.pair_idx(lower_n)]
    }

    /// Bennett acceptance-ratio estimate for one pair.
    ///
    /// Solves, by fixed-point iteration in c = β·ΔA,
    ///   Σ_fwd f(m + β·u − c) = Σ_rev f(−m − β·u + c),   f(x) = 1/(1+eˣ),
    /// with m = ln(n_fwd / n_rev). The deterministic case (all samples
    /// equal u) recovers ΔA = u exactly for any sample-count imbalance.
    pub fn estimate(&self, lower_n: usize) -> EstimateOutcome {
        let samples = &self.pairs[self.pair_idx(lower_n)];
        let (n_f, n_r) = (samples.forward.len(), samples.reverse.len());
        if n_f == 0 || n_r == 0 {
            return EstimateOutcome::Undefined;
        }

        let m = (n_f as f64 / n_r as f64).ln();
        let fermi = |x: f64| 1.0 / (1.0 + x.exp());

        // Start from the forward mean, a crude but serviceable guess.
        let mut c = self.beta * samples.forward.iter().sum::<f64>() / n_f as f64;
        let mut iterations = 0;
        let mut converged = false;

        while iterations < self.max_iterations {
            iterations += 1;
            let den: f64 = samples.forward.iter().map(|&u| fermi(m + self.beta * u - c)).sum();
            let num: f64 = samples.reverse.iter().map(|&u| fermi(-m - self.beta * u + c)).sum();
            if den == 0.0 {
                // Forward weights underflowed: c sits far below the data.
                c += 1.0;
                continue;
            }
            if num == 0.0 {
                c -= 1.0;
                continue;
            }
            let shift = (num / den).ln();
            c += shift;
            if shift.abs() < self.tolerance {
                converged = true;
                break;
            }
        }

        if !converged {
            log::debug!(
                "Bennett fixed point for pair ({lower_n}, {}) hit the {}-iteration cap",
                lower_n + 1,
                self.max_iterations
            );
        }

        let stderr = self.bennett_stderr(samples, m, c);
        EstimateOutcome::Estimate(PairEstimate {
            delta_a: c / self.beta,
            stderr,
            iterations,
            converged,
        })
    }

    /// Asymptotic variance of the Bennett estimator evaluated at the
    /// solution, from the second moments of the Fermi weights.
    fn bennett_stderr(&self, samples: &PairSamples, m: f64, c: f64) -> f64 {
        let fermi = |x: f64| 1.0 / (1.0 + x.exp());

        let side = |data: &[f64], arg: &dyn Fn(f64) -> f64| -> f64 {
            let n = data.len() as f64;
            let mut s = 0.0;
            let mut s2 = 0.0;
            for &u in data {
                let f = fermi(arg(u));
                s += f;
                s2 += f * f;
            }
            let mean = s / n;
            let mean2 = s2 / n;
            if mean > 0.0 {
                (mean2 / (mean * mean) - 1.0) / n
            } else {
                f64::INFINITY
            }
        };

        let beta = self.beta;
        let var = side(&samples.forward, &|u| m + beta * u - c)
            + side(&samples.reverse, &|u| -m - beta * u + c);
        var.max(0.0).sqrt() / beta
    }

    /// Full free-energy step for the pair (n, n+1): the Bennett estimate
    /// from raw energy deltas plus the discrete-site mixing entropy
    /// -kT ln((S-n)/(n+1)) from the (S choose N) configuration counts.
    /// Without the entropy term the profile would only be the energetic
    /// part and reweighting from it could never flatten the histogram.
    fn full_step(&self, lower_n: usize) -> Option<(f64, f64)> {
        let e = self.estimate(lower_n).value()?;
        let ratio = (self.n_sites - lower_n) as f64 / (lower_n + 1) as f64;
        Some((e.delta_a - ratio.ln() / self.beta, e.stderr))
    }

    /// Cumulative free-energy profile A(N) over [n_min, n_max], anchored
    /// at A(n_ref) = 0, with errors accumulated in quadrature. A gap in
    /// the pair estimates invalidates every macrostate beyond it (away
    /// from n_ref); those entries are `None`.
    pub fn profile(&self) -> Vec<Option<(f64, f64)>> {
        let len = self.n_max - self.n_min + 1;
        let mut out: Vec<Option<(f64, f64)>> = vec![None; len];
        let ref_i = self.n_ref - self.n_min;
        out[ref_i] = Some((0.0, 0.0));

        // Upward from the reference.
        for n in self.n_ref..self.n_max {
            let i = n - self.n_min;
            let Some((a, err)) = out[i] else { break };
            match self.full_step(n) {
                Some((da, de)) => {
                    out[i + 1] = Some((a + da, (err * err + de * de).sqrt()));
                }
                None => break,
            }
        }

        // Downward from the reference.
        for n in (self.n_min..self.n_ref).rev() {
            let i = n - self.n_min;
            let Some((a, err)) = out[i + 1] else { break };
            match self.full_step(n) {
                Some((da, de)) => {
                    out[i] = Some((a - da, (err * err + de * de).sqrt()));
                }
                None => break,
            }
        }

        out
    }

    /// Publish the current profile into the table's free-energy column.
    pub fn publish(&self, table: &mut MacrostateTable) {
        for (i, fe) in self.profile().into_iter().enumerate() {
            table.set_free_energy(self.n_min + i, fe);
        }
    }

    /// Drop all accumulated samples (used when production statistics must
    /// not mix with equilibration-phase data).
    pub fn reset(&mut self) {
        for p in &mut self.pairs {
            p.forward.clear();
            p.reverse.clear();
        }
    }
}
