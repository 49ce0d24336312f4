use std::time::Duration;

use crate::EPSILON;

/// Solver knobs. Built once (CLI overrides applied in `main`) and shared by
/// reference afterwards; nothing mutates it during a solve.
#[derive(Debug, Clone)]
pub struct Parameters {
    /// Comparison tolerance for costs, lengths and primal values.
    pub eps: f64,
    /// Hard cap on the number of columns one pricing call may return.
    pub max_columns_added: usize,
    /// Stop refining the state-space relaxation once this many columns exist.
    pub max_paths_after_search: usize,
    /// Apply dominance when inserting labels.
    pub use_domination: bool,
    /// Also evict stored labels dominated by a newly inserted one.
    pub two_way_domination: bool,
    /// Label only from the source side (disables the halfway join filter).
    pub forward_only: bool,
    /// Label only from the destination side.
    pub backward_only: bool,
    /// Worker count for the branch-and-bound engine.
    pub num_solvers: usize,
    /// Wall-clock limit for the whole search.
    pub time_limit: Duration,
}

impl Default for Parameters {
    fn default() -> Self {
        Parameters {
            eps: EPSILON,
            max_columns_added: 500,
            max_paths_after_search: 100,
            use_domination: true,
            two_way_domination: true,
            forward_only: false,
            backward_only: false,
            num_solvers: num_cpus::get(),
            time_limit: Duration::from_secs(3600),
        }
    }
}
