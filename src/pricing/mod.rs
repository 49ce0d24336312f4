//! Pricing: elementary shortest paths with a length budget, by decremental
//! state-space relaxation over an interleaved bidirectional labeling.
//!
//! Elementarity starts fully relaxed. Each round runs the labeling, and if
//! the best priced route still revisits some vertex, those vertices are
//! promoted to critical (never visitable twice by any label) and the search
//! reruns. Rounds stop once the best route is elementary, enough columns
//! have been collected, or a full retry under the stricter dominance form
//! found nothing at all.

mod labeling;
pub mod state;

use rustc_hash::{FxHashMap, FxHashSet};

use crate::error::TopSolverError;
use crate::graph::Graph;
use crate::params::Parameters;
use crate::route::Route;

use labeling::Labeling;

/// Must-visit-edge duals, sparse over the arc set. Missing arcs price at 0.
#[derive(Debug, Clone, Default)]
pub struct ArcDuals(FxHashMap<(usize, usize), f64>);

impl ArcDuals {
    pub fn get(&self, u: usize, v: usize) -> f64 {
        self.0.get(&(u, v)).copied().unwrap_or(0.0)
    }

    pub fn set(&mut self, u: usize, v: usize, dual: f64) {
        self.0.insert((u, v), dual);
    }
}

/// Dual inputs of one pricing call: the fleet dual, the per-vertex reduced
/// costs (cover dual minus prize, adjusted by must-visit duals) and the
/// must-visit arc duals.
#[derive(Debug, Clone)]
pub struct PricingDuals {
    pub route_dual: f64,
    pub vertex_costs: Vec<f64>,
    pub arc_duals: ArcDuals,
}

#[derive(Debug, Default)]
pub struct PricingStats {
    pub dssr_iterations: usize,
    pub labels_created: usize,
    /// Best priced route of the last round, elementary once the relaxation
    /// has closed.
    pub optimal_route: Option<Route>,
}

/// One pricing problem over a (node-reduced) graph. The solver is
/// single-threaded and owns all of its search state; workers each hold
/// their own.
pub struct PricingSolver<'a> {
    graph: &'a Graph,
    prizes: &'a [f64],
    source: usize,
    destination: usize,
    budget: f64,
    params: &'a Parameters,
    pub stats: PricingStats,
}

impl<'a> PricingSolver<'a> {
    pub fn new(
        graph: &'a Graph,
        prizes: &'a [f64],
        source: usize,
        destination: usize,
        budget: f64,
        params: &'a Parameters,
    ) -> Self {
        PricingSolver {
            graph,
            prizes,
            source,
            destination,
            budget,
            params,
            stats: PricingStats::default(),
        }
    }

    /// Produce elementary routes with reduced cost below `-eps`, at most
    /// `max_columns_added` of them, in discovery order.
    pub fn generate(&mut self, duals: &PricingDuals) -> Result<Vec<Route>, TopSolverError> {
        let n = self.graph.num_vertices();
        let mut is_critical = vec![false; n];
        let mut use_visit_condition = false;
        let mut routes: Vec<Route> = Vec::new();
        let mut seen: FxHashSet<Vec<usize>> = FxHashSet::default();
        self.stats = PricingStats::default();

        loop {
            self.stats.dssr_iterations += 1;
            let mut optimal: Option<Route> = None;
            let mut labeling = Labeling::new(
                self.graph,
                self.prizes,
                self.source,
                self.destination,
                self.budget,
                duals,
                self.params,
                &is_critical,
                use_visit_condition,
            );
            labeling.run(&mut routes, &mut seen, &mut optimal);
            self.stats.labels_created += labeling.arena.len();
            self.stats.optimal_route = optimal.clone();
            log::debug!(
                "pricing round {}: {} labels, {} routes, best rc {:?}",
                self.stats.dssr_iterations,
                labeling.arena.len(),
                routes.len(),
                optimal.as_ref().map(|r| r.reduced_cost),
            );

            if routes.len() >= self.params.max_columns_added {
                break;
            }
            if routes.len() >= self.params.max_paths_after_search {
                break;
            }
            match optimal {
                Some(route) => {
                    let repeated = repeated_vertices(&route.path);
                    if repeated.is_empty() {
                        break;
                    }
                    for v in repeated {
                        if is_critical[v] {
                            return Err(TopSolverError::CyclesWithCriticalVertex(v));
                        }
                        is_critical[v] = true;
                    }
                }
                None => {
                    if use_visit_condition {
                        break;
                    }
                    // one full retry under the stricter dominance form
                    use_visit_condition = true;
                }
            }
        }

        routes.truncate(self.params.max_columns_added);
        Ok(routes)
    }
}

/// Vertices occurring more than once on a path, each reported once.
fn repeated_vertices(path: &[usize]) -> Vec<usize> {
    let mut counts: FxHashMap<usize, usize> = FxHashMap::default();
    for &v in path {
        *counts.entry(v).or_insert(0) += 1;
    }
    let mut repeated: Vec<usize> = counts
        .into_iter()
        .filter(|&(_, c)| c > 1)
        .map(|(v, _)| v)
        .collect();
    repeated.sort_unstable();
    repeated
}
