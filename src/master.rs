//! Restricted set-cover master, solved through an opaque LP/MIP oracle.
//!
//! The formulation over a route pool `R`:
//!
//! ```text
//! max   sum score(r_k) x_k  -  M a
//! s.t.  sum_{k: v in r_k}        x_k      <= 1     for v not in {s, t}
//!       sum_k                    x_k      <= m
//!       sum_{k: v in r_k}        x_k + a  >= 1     for v in mustVisitVertices
//!       sum_{k: (u,v) in r_k}    x_k + a  >= 1     for (u,v) in mustVisitEdges
//!       x_k in [0, 1],  a >= 0
//! ```
//!
//! The slack `a` keeps the model feasible under any restrictions; an optimal
//! `a` above tolerance means the node itself is infeasible.

use highs::{HighsModelStatus, RowProblem, Sense};
use indexmap::IndexMap;

use crate::error::TopSolverError;
use crate::instance::Instance;
use crate::route::Route;

/// Penalty on the auxiliary slack. A tuning constant, far above any
/// achievable prize total.
const AUX_PENALTY: f64 = 1e5;

/// One restricted master to solve: the route pool plus the node-local
/// must-visit restrictions (forbidden entities never reach the master; they
/// are removed from the pricing graph instead).
pub struct MasterProblem<'a> {
    pub instance: &'a Instance,
    pub routes: &'a [Route],
    pub must_visit_vertices: &'a [usize],
    pub must_visit_edges: &'a [(usize, usize)],
    pub as_mip: bool,
}

/// Dual information harvested from an LP solve. Must-visit duals are stored
/// as non-negative magnitudes; the column-generation driver subtracts them.
#[derive(Debug, Clone, Default)]
pub struct MasterDuals {
    /// Dual of the fleet-size row.
    pub route_dual: f64,
    /// Duals of the vertex-cover rows, indexed by vertex (0 for terminals).
    pub vertex_duals: Vec<f64>,
    pub must_visit_vertex_duals: IndexMap<usize, f64>,
    pub must_visit_edge_duals: IndexMap<(usize, usize), f64>,
    /// Reduced costs of the route variables.
    pub route_variable_duals: Vec<f64>,
}

#[derive(Debug, Clone)]
pub struct MasterSolution {
    pub objective: f64,
    /// Primal values aligned with the route pool.
    pub primal: Vec<f64>,
    /// Value of the auxiliary slack; at or above tolerance the node is
    /// infeasible.
    pub aux_value: f64,
    /// Present for LP solves only.
    pub duals: Option<MasterDuals>,
}

/// The one boundary the core uses towards an LP package. Implementations own
/// their backend handle; one oracle value lives per worker and is never
/// shared.
pub trait MasterOracle {
    fn solve(&mut self, problem: &MasterProblem) -> Result<MasterSolution, TopSolverError>;
}

/// `MasterOracle` backed by HiGHS, which exposes the row duals and column
/// reduced costs column generation needs.
#[derive(Debug, Default)]
pub struct HighsOracle;

impl MasterOracle for HighsOracle {
    fn solve(&mut self, problem: &MasterProblem) -> Result<MasterSolution, TopSolverError> {
        let instance = problem.instance;
        let routes = problem.routes;
        let n = instance.graph.num_vertices();

        let mut pb = RowProblem::default();
        let route_vars: Vec<_> = routes
            .iter()
            .map(|r| {
                if problem.as_mip {
                    pb.add_integer_column(r.score, 0.0..=1.0)
                } else {
                    pb.add_column(r.score, 0.0..=1.0)
                }
            })
            .collect();
        let aux = pb.add_column(-AUX_PENALTY, 0.0..);

        // Row order matters: cover rows first (in vertex order), then the
        // fleet row, then must-visit rows. Duals are read back in the same
        // order.
        let mut cover_vertices = Vec::new();
        for v in 0..n {
            if v == instance.source || v == instance.destination {
                continue;
            }
            let factors: Vec<_> = route_vars
                .iter()
                .zip(routes)
                .filter(|(_, r)| r.visits_vertex(v))
                .map(|(&var, _)| (var, 1.0))
                .collect();
            pb.add_row(..=1.0, factors);
            cover_vertices.push(v);
        }

        let fleet: Vec<_> = route_vars.iter().map(|&var| (var, 1.0)).collect();
        pb.add_row(..=instance.num_vehicles as f64, fleet);

        for &v in problem.must_visit_vertices {
            let mut factors: Vec<_> = route_vars
                .iter()
                .zip(routes)
                .filter(|(_, r)| r.visits_vertex(v))
                .map(|(&var, _)| (var, 1.0))
                .collect();
            factors.push((aux, 1.0));
            pb.add_row(1.0.., factors);
        }
        for &(u, v) in problem.must_visit_edges {
            let mut factors: Vec<_> = route_vars
                .iter()
                .zip(routes)
                .filter(|(_, r)| r.visits_arc(u, v))
                .map(|(&var, _)| (var, 1.0))
                .collect();
            factors.push((aux, 1.0));
            pb.add_row(1.0.., factors);
        }

        let mut model = pb.optimise(Sense::Maximise);
        model.set_option("output_flag", false);
        let solved = model.solve();
        match solved.status() {
            HighsModelStatus::Optimal => {}
            HighsModelStatus::Infeasible => return Err(TopSolverError::SetCoverInfeasible),
            status => return Err(TopSolverError::MasterSolve(format!("{status:?}"))),
        }

        let solution = solved.get_solution();
        let columns = solution.columns();
        let primal = columns[..routes.len()].to_vec();
        let aux_value = columns[routes.len()];
        let objective = routes
            .iter()
            .zip(&primal)
            .map(|(r, &x)| r.score * x)
            .sum::<f64>()
            - AUX_PENALTY * aux_value;

        let duals = if problem.as_mip {
            None
        } else {
            let dual_rows = solution.dual_rows();
            let mut vertex_duals = vec![0.0; n];
            let mut rows = dual_rows.iter();
            for &v in &cover_vertices {
                vertex_duals[v] = rows.next().copied().unwrap_or(0.0).abs();
            }
            let route_dual = rows.next().copied().unwrap_or(0.0).abs();
            let must_visit_vertex_duals = problem
                .must_visit_vertices
                .iter()
                .map(|&v| (v, rows.next().copied().unwrap_or(0.0).abs()))
                .collect();
            let must_visit_edge_duals = problem
                .must_visit_edges
                .iter()
                .map(|&e| (e, rows.next().copied().unwrap_or(0.0).abs()))
                .collect();
            let route_variable_duals = solution.dual_columns()[..routes.len()].to_vec();
            Some(MasterDuals {
                route_dual,
                vertex_duals,
                must_visit_vertex_duals,
                must_visit_edge_duals,
                route_variable_duals,
            })
        };

        Ok(MasterSolution { objective, primal, aux_value, duals })
    }
}
