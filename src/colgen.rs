//! Column generation for one branch-and-bound node, and the top-level
//! branch-and-price entry point.

use rustc_hash::FxHashSet;

use crate::bb::{branch_and_bound, NodeSolver, SearchOutcome};
use crate::branching::TopBrancher;
use crate::error::TopSolverError;
use crate::instance::Instance;
use crate::master::{HighsOracle, MasterDuals, MasterOracle, MasterProblem};
use crate::node::BbNode;
use crate::params::Parameters;
use crate::pricing::{ArcDuals, PricingDuals, PricingSolver};
use crate::route::Route;

/// Solves nodes by alternating the restricted master LP with pricing until
/// no negative-reduced-cost column remains, then resolving as a MIP for the
/// node's integer bound. One instance lives per worker; its column pool
/// carries over between the nodes that worker happens to solve.
pub struct ColGenSolver<'a, O: MasterOracle> {
    instance: &'a Instance,
    params: &'a Parameters,
    oracle: O,
    pool: Vec<Route>,
    pool_paths: FxHashSet<Vec<usize>>,
}

impl<'a, O: MasterOracle> ColGenSolver<'a, O> {
    pub fn new(instance: &'a Instance, params: &'a Parameters, oracle: O) -> Self {
        ColGenSolver {
            instance,
            params,
            oracle,
            pool: Vec::new(),
            pool_paths: FxHashSet::default(),
        }
    }

    /// Seed the column pool, e.g. to replay a node deterministically.
    pub fn with_seed_routes(mut self, routes: Vec<Route>) -> Self {
        for route in routes {
            if self.pool_paths.insert(route.path.clone()) {
                self.pool.push(route);
            }
        }
        self
    }

    pub fn solve(&mut self, mut node: BbNode) -> Result<BbNode, TopSolverError> {
        let instance = self.instance;
        let eps = self.params.eps;
        let n = instance.graph.num_vertices();

        // Restrictions must name entities of the original graph; anything
        // already gone from the reduced graph is silently fine.
        for &v in node.must_visit_vertices.iter().chain(&node.forbidden_vertices) {
            if !instance.graph.has_vertex(v) {
                return Err(TopSolverError::MissingVertex(v));
            }
        }
        for &(u, v) in node.must_visit_edges.iter().chain(&node.forbidden_edges) {
            if !instance.graph.has_arc(u, v) {
                return Err(TopSolverError::MissingEdge(u, v));
            }
        }

        let reduced = instance
            .graph
            .reduced(&node.forbidden_vertices, &node.forbidden_edges);
        let mut pricer = PricingSolver::new(
            &reduced,
            &instance.prizes,
            instance.source,
            instance.destination,
            instance.budget,
            self.params,
        );

        let mut routes: Vec<Route> = self
            .pool
            .iter()
            .filter(|r| r.respects(&node.forbidden_vertices, &node.forbidden_edges))
            .cloned()
            .collect();
        let mut known: FxHashSet<Vec<usize>> = routes.iter().map(|r| r.path.clone()).collect();

        let mut rounds = 0usize;
        let (solution, duals, vertex_costs) = loop {
            rounds += 1;
            let solution = self.oracle.solve(&MasterProblem {
                instance,
                routes: &routes,
                must_visit_vertices: &node.must_visit_vertices,
                must_visit_edges: &node.must_visit_edges,
                as_mip: false,
            })?;
            let duals = solution
                .duals
                .clone()
                .ok_or_else(|| TopSolverError::MasterSolve("LP solve without duals".into()))?;

            let mut vertex_costs: Vec<f64> = (0..n)
                .map(|v| duals.vertex_duals[v] - instance.prizes[v])
                .collect();
            for (&v, &dual) in &duals.must_visit_vertex_duals {
                vertex_costs[v] -= dual;
            }
            let mut arc_duals = ArcDuals::default();
            for (&(u, v), &dual) in &duals.must_visit_edge_duals {
                arc_duals.set(u, v, -dual);
            }
            let pricing_duals = PricingDuals {
                route_dual: duals.route_dual,
                vertex_costs,
                arc_duals,
            };

            let priced = pricer.generate(&pricing_duals)?;
            let fresh: Vec<Route> = priced
                .into_iter()
                .filter(|r| known.insert(r.path.clone()))
                .collect();
            log::debug!(
                "node {}: round {rounds}, lp {:.4}, {} columns, {} new",
                node.id,
                solution.objective,
                routes.len(),
                fresh.len(),
            );
            if fresh.is_empty() {
                break (solution, duals, pricing_duals.vertex_costs);
            }
            routes.extend(fresh);
        };

        node.lp_objective = solution.objective;
        node.lp_feasible = solution.aux_value < eps;
        node.lp_integral = node.lp_feasible
            && solution
                .primal
                .iter()
                .all(|&x| x.abs() < eps || (x - 1.0).abs() < eps);
        node.lp_solution = routes
            .iter()
            .zip(&solution.primal)
            .filter(|(_, &x)| x > eps)
            .map(|(r, &x)| (r.clone(), x))
            .collect();
        node.vertex_reduced_costs = Some(vertex_costs);
        node.dual_lp_upper_bound = Some(dual_upper_bound(&duals, instance.num_vehicles));

        if node.lp_feasible {
            let mip = self.oracle.solve(&MasterProblem {
                instance,
                routes: &routes,
                must_visit_vertices: &node.must_visit_vertices,
                must_visit_edges: &node.must_visit_edges,
                as_mip: true,
            })?;
            if mip.aux_value < eps {
                node.mip_objective = mip.objective;
                node.mip_solution = routes
                    .iter()
                    .zip(&mip.primal)
                    .filter(|(_, &x)| x > 0.5)
                    .map(|(r, _)| r.clone())
                    .collect();
            }
        }

        for route in &routes {
            if self.pool_paths.insert(route.path.clone()) {
                self.pool.push(route.clone());
            }
        }

        log::info!(
            "node {}: lp {:.4} ({}feasible{}), mip {:.4}, {} columns after {rounds} rounds",
            node.id,
            node.lp_objective,
            if node.lp_feasible { "" } else { "in" },
            if node.lp_integral { ", integral" } else { "" },
            node.mip_objective,
            routes.len(),
        );
        Ok(node)
    }
}

impl<O: MasterOracle> NodeSolver<BbNode> for ColGenSolver<'_, O> {
    fn solve_node(&mut self, node: BbNode) -> Result<BbNode, TopSolverError> {
        self.solve(node)
    }
}

/// Weak-duality bound on the node LP from the last dual values.
fn dual_upper_bound(duals: &MasterDuals, num_vehicles: usize) -> f64 {
    duals.vertex_duals.iter().sum::<f64>()
        - duals.must_visit_vertex_duals.values().sum::<f64>()
        - duals.must_visit_edge_duals.values().sum::<f64>()
        + duals.route_dual * (num_vehicles as f64 + 1.0)
        + duals
            .route_variable_duals
            .iter()
            .map(|&d| d.max(0.0))
            .sum::<f64>()
}

/// Final result of a branch-and-price run.
#[derive(Debug)]
pub struct TopOutcome {
    pub objective: f64,
    /// Routes of the best integer solution found.
    pub routes: Vec<Route>,
    pub num_created: u64,
    pub num_feasible: u64,
    pub max_parallel_solves: usize,
    pub timed_out: bool,
    /// Dual bound of the root LP.
    pub dual_upper_bound: Option<f64>,
}

/// Solve an instance by branch-and-price: parallel node solves over the
/// column-generation solver, vertex/arc branching, best-bound node order.
pub fn solve_branch_and_price(
    instance: &Instance,
    params: &Parameters,
) -> Result<TopOutcome, TopSolverError> {
    let mut brancher = TopBrancher::new(instance, params.eps);
    let outcome: SearchOutcome<BbNode> = branch_and_bound(
        BbNode::root(),
        |_worker| ColGenSolver::new(instance, params, HighsOracle),
        &mut brancher,
        params.num_solvers,
        Some(params.time_limit),
        params.eps,
    )?;

    let dual_upper_bound = outcome.root.as_ref().and_then(|r| r.dual_lp_upper_bound);
    let routes = match &outcome.incumbent {
        Some(node) if !node.mip_solution.is_empty() => node.mip_solution.clone(),
        Some(node) => node.lp_solution.iter().map(|(r, _)| r.clone()).collect(),
        None => Vec::new(),
    };
    Ok(TopOutcome {
        objective: outcome.objective,
        routes,
        num_created: outcome.num_created,
        num_feasible: outcome.num_feasible,
        max_parallel_solves: outcome.max_parallel_solves,
        timed_out: outcome.timed_out,
        dual_upper_bound,
    })
}
