// report.rs - Pull-based accessors for external reporting/plotting

use crate::macrostate::MacrostateTable;
use crate::moves::MoveStats;

/// One row of the per-macrostate profile.
#[derive(Debug, Clone, Copy)]
pub struct ProfileRow {
    pub n: usize,
    pub visits: u64,
    pub bias_weight: f64,
    pub provisional: bool,
    pub pressure_mean: Option<f64>,
    pub pressure_err: Option<f64>,
    pub free_energy: Option<f64>,
    pub free_energy_err: Option<f64>,
}

pub fn profile_rows(table: &MacrostateTable) -> Vec<ProfileRow> {
    table
        .iter()
        .map(|(n, r)| ProfileRow {
            n,
            visits: r.visits,
            bias_weight: r.bias_weight(),
            provisional: r.provisional(),
            pressure_mean: r.pressure.mean(),
            pressure_err: r.pressure.error(),
            free_energy: r.free_energy.map(|(a, _)| a),
            free_energy_err: r.free_energy.map(|(_, e)| e),
        })
        .collect()
}

/// Global run diagnostics.
#[derive(Debug, Clone, Copy)]
pub struct RunSummary {
    pub total_steps: u64,
    pub move_stats: MoveStats,
    /// max/min visit ratio, `None` while coverage is incomplete.
    pub flatness: Option<f64>,
    pub bias_converged: bool,
    pub bias_frozen: bool,
    pub bias_updates: u64,
    pub weight_generation: u64,
}
