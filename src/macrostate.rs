// macrostate.rs - Per-particle-count statistics table

use crate::stats::BlockStats;

/// Statistics for one macrostate N.
///
/// Ownership is partitioned by field: the driver writes `visits` and
/// `pressure`, the bias controller writes `bias_weight` / `provisional`,
/// and the overlap estimator publishes `free_energy`. Nothing else mutates
/// a record.
#[derive(Debug, Clone)]
pub struct MacrostateRecord {
    pub visits: u64,
    pub pressure: BlockStats,
    /// A(N) relative to the reference macrostate, with standard error.
    /// `None` while the estimate chain has a gap.
    pub free_energy: Option<(f64, f64)>,
    bias_weight: f64,
    provisional: bool,
}

impl MacrostateRecord {
    fn new(pressure_block: u64) -> Self {
        Self {
            visits: 0,
            pressure: BlockStats::new(pressure_block),
            free_energy: None,
            bias_weight: 0.0,
            provisional: false,
        }
    }

    pub fn bias_weight(&self) -> f64 {
        self.bias_weight
    }

    /// Whether the current weight came from extrapolation rather than a
    /// defined overlap estimate.
    pub fn provisional(&self) -> bool {
        self.provisional
    }
}

/// Table of macrostate records over the closed range [n_min, n_max],
/// allocated eagerly since the range is fixed at setup.
#[derive(Debug, Clone)]
pub struct MacrostateTable {
    n_min: usize,
    n_max: usize,
    records: Vec<MacrostateRecord>,
    weight_generation: u64,
}

impl MacrostateTable {
    pub fn new(n_min: usize, n_max: usize, pressure_block: u64) -> Self {
        assert!(n_min <= n_max, "n_min {n_min} exceeds n_max {n_max}");
        let records = (n_min..=n_max)
            .map(|_| MacrostateRecord::new(pressure_block))
            .collect();
        Self { n_min, n_max, records, weight_generation: 0 }
    }

    #[inline(always)]
    pub fn n_min(&self) -> usize {
        self.n_min
    }

    #[inline(always)]
    pub fn n_max(&self) -> usize {
        self.n_max
    }

    pub fn in_range(&self, n: usize) -> bool {
        (self.n_min..=self.n_max).contains(&n)
    }

    fn idx(&self, n: usize) -> usize {
        debug_assert!(self.in_range(n), "macrostate {n} outside table range");
        n - self.n_min
    }

    pub fn record(&self, n: usize) -> &MacrostateRecord {
        &self.records[self.idx(n)]
    }

    pub fn record_visit(&mut self, n: usize) {
        let i = self.idx(n);
        self.records[i].visits += 1;
    }

    pub fn push_pressure(&mut self, n: usize, p: f64) {
        let i = self.idx(n);
        self.records[i].pressure.push(p);
    }

    pub fn bias_weight(&self, n: usize) -> f64 {
        self.records[self.idx(n)].bias_weight
    }

    /// Written only by the bias controller.
    pub(crate) fn set_bias_weight(&mut self, n: usize, w: f64, provisional: bool) {
        let i = self.idx(n);
        self.records[i].bias_weight = w;
        self.records[i].provisional = provisional;
    }

    pub(crate) fn bump_weight_generation(&mut self) {
        self.weight_generation += 1;
    }

    /// Incremented once per effective bias refresh, so downstream
    /// consumers can tell which weight profile their data was taken under.
    pub fn weight_generation(&self) -> u64 {
        self.weight_generation
    }

    pub fn set_free_energy(&mut self, n: usize, fe: Option<(f64, f64)>) {
        let i = self.idx(n);
        self.records[i].free_energy = fe;
    }

    /// Iterate (N, record) in increasing N.
    pub fn iter(&self) -> impl Iterator<Item = (usize, &MacrostateRecord)> {
        let n_min = self.n_min;
        self.records.iter().enumerate().map(move |(i, r)| (n_min + i, r))
    }

    pub fn total_visits(&self) -> u64 {
        self.records.iter().map(|r| r.visits).sum()
    }

    /// The N with the highest visit count (ties resolve to the lower N).
    pub fn most_visited(&self) -> usize {
        let mut best = self.n_min;
        let mut best_visits = 0u64;
        for (n, r) in self.iter() {
            if r.visits > best_visits {
                best = n;
                best_visits = r.visits;
            }
        }
        best
    }

    /// max/min visit ratio over the range; `None` while any macrostate is
    /// unvisited.
    pub fn flatness(&self) -> Option<f64> {
        let min = self.records.iter().map(|r| r.visits).min()?;
        if min == 0 {
            return None;
        }
        let max = self.records.iter().map(|r| r.visits).max()?;
        Some(max as f64 / min as f64)
    }

    /// Zero visits and pressure accumulators, keeping bias weights, their
    /// generation counter, and published free energies. This is what makes
    /// multi-stage runs work: equilibrate weights once, then collect clean
    /// statistics under the frozen weights.
    pub fn reset(&mut self) {
        for r in &mut self.records {
            r.visits = 0;
            r.pressure.reset();
        }
    }
}
