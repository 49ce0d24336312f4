//! End-to-end scenarios: the generic engine on knapsack relaxations, the
//! pricing engine on hand-built graphs, and full branch-and-price runs on
//! tiny orienteering instances.

use crate::bb::{branch_and_bound, Brancher, NodeSolver, SearchNode};
use crate::colgen::{solve_branch_and_price, ColGenSolver};
use crate::error::TopSolverError;
use crate::graph::Graph;
use crate::instance::Instance;
use crate::master::HighsOracle;
use crate::node::BbNode;
use crate::params::Parameters;
use crate::pricing::{ArcDuals, PricingDuals, PricingSolver};
use crate::route::Route;

const EPS: f64 = 1e-6;

// ---------------------------------------------------------------------------
// The engine alone, driven by a continuous-knapsack node solver with
// first-fractional-variable branching.

#[derive(Debug, Clone)]
struct KnapsackNode {
    id: u64,
    parent_objective: f64,
    fixed: Vec<Option<bool>>,
    lp_feasible: bool,
    lp_integral: bool,
    lp_objective: f64,
    fractional_item: Option<usize>,
}

impl KnapsackNode {
    fn root(num_items: usize) -> Self {
        KnapsackNode {
            id: 0,
            parent_objective: f64::INFINITY,
            fixed: vec![None; num_items],
            lp_feasible: false,
            lp_integral: false,
            lp_objective: 0.0,
            fractional_item: None,
        }
    }
}

impl SearchNode for KnapsackNode {
    fn id(&self) -> u64 {
        self.id
    }
    fn parent_objective(&self) -> f64 {
        self.parent_objective
    }
    fn lp_feasible(&self) -> bool {
        self.lp_feasible
    }
    fn lp_integral(&self) -> bool {
        self.lp_integral
    }
    fn objective(&self) -> f64 {
        self.lp_objective
    }
}

struct KnapsackLp {
    profits: Vec<f64>,
    weights: Vec<f64>,
    capacity: f64,
}

impl NodeSolver<KnapsackNode> for KnapsackLp {
    fn solve_node(&mut self, mut node: KnapsackNode) -> Result<KnapsackNode, TopSolverError> {
        let mut capacity = self.capacity;
        let mut objective = 0.0;
        for (i, fixed) in node.fixed.iter().enumerate() {
            if *fixed == Some(true) {
                capacity -= self.weights[i];
                objective += self.profits[i];
            }
        }
        if capacity < 0.0 {
            node.lp_feasible = false;
            return Ok(node);
        }

        let mut free: Vec<usize> = (0..node.fixed.len())
            .filter(|&i| node.fixed[i].is_none())
            .collect();
        free.sort_by(|&a, &b| {
            let ra = self.profits[a] / self.weights[a];
            let rb = self.profits[b] / self.weights[b];
            rb.total_cmp(&ra)
        });

        node.fractional_item = None;
        for i in free {
            if self.weights[i] <= capacity {
                capacity -= self.weights[i];
                objective += self.profits[i];
            } else if capacity > 0.0 {
                objective += self.profits[i] * capacity / self.weights[i];
                node.fractional_item = Some(i);
                break;
            } else {
                break;
            }
        }
        node.lp_feasible = true;
        node.lp_integral = node.fractional_item.is_none();
        node.lp_objective = objective;
        Ok(node)
    }
}

struct KnapsackBrancher {
    next_id: u64,
}

impl Brancher<KnapsackNode> for KnapsackBrancher {
    fn branch(&mut self, node: &KnapsackNode) -> Result<Vec<KnapsackNode>, TopSolverError> {
        let item = match node.fractional_item {
            Some(item) => item,
            None => return Ok(Vec::new()),
        };
        let mut children = Vec::new();
        for value in [false, true] {
            let mut child = node.clone();
            child.id = self.next_id;
            self.next_id += 1;
            child.parent_objective = node.lp_objective;
            child.fixed[item] = Some(value);
            child.lp_feasible = false;
            child.lp_integral = false;
            child.lp_objective = 0.0;
            child.fractional_item = None;
            children.push(child);
        }
        Ok(children)
    }
}

fn solve_knapsack(
    profits: &[f64],
    weights: &[f64],
    capacity: f64,
    num_solvers: usize,
) -> crate::bb::SearchOutcome<KnapsackNode> {
    let mut brancher = KnapsackBrancher { next_id: 1 };
    branch_and_bound(
        KnapsackNode::root(profits.len()),
        |_| KnapsackLp {
            profits: profits.to_vec(),
            weights: weights.to_vec(),
            capacity,
        },
        &mut brancher,
        num_solvers,
        None,
        EPS,
    )
    .unwrap()
}

#[test]
fn knapsack_single_worker() {
    let outcome = solve_knapsack(&[24.0, 2.0, 20.0, 4.0], &[8.0, 1.0, 5.0, 4.0], 9.0, 1);
    assert!((outcome.objective - 26.0).abs() < EPS);
    assert!(outcome.num_created > 1);
    assert_eq!(outcome.max_parallel_solves, 1);
    assert!(outcome.num_feasible <= outcome.num_created);
    assert!(!outcome.timed_out);
}

#[test]
fn knapsack_five_workers() {
    let outcome = solve_knapsack(&[24.0, 2.0, 20.0, 4.0], &[8.0, 1.0, 5.0, 4.0], 9.0, 5);
    assert!((outcome.objective - 26.0).abs() < EPS);
    assert!(outcome.num_created > 1);
    assert!(outcome.max_parallel_solves > 1);
    assert!(outcome.max_parallel_solves <= 5);
}

#[test]
fn knapsack_second_instance() {
    for num_solvers in [1, 5] {
        let outcome = solve_knapsack(
            &[16.0, 22.0, 12.0, 8.0, 11.0, 19.0],
            &[5.0, 7.0, 4.0, 3.0, 4.0, 6.0],
            14.0,
            num_solvers,
        );
        assert!((outcome.objective - 43.0).abs() < EPS, "{}", outcome.objective);
    }
}

// ---------------------------------------------------------------------------
// Pricing on hand-built graphs.

fn chain_graph(n: usize) -> Graph {
    let mut graph = Graph::new(n);
    for i in 0..n - 1 {
        graph.add_arc(i, i + 1, 1.0);
    }
    graph
}

fn pricing_params(use_domination: bool, two_way_domination: bool) -> Parameters {
    Parameters {
        use_domination,
        two_way_domination,
        ..Parameters::default()
    }
}

fn negated_prize_duals(prizes: &[f64]) -> PricingDuals {
    PricingDuals {
        route_dual: 0.0,
        vertex_costs: prizes.iter().map(|&p| -p).collect(),
        arc_duals: ArcDuals::default(),
    }
}

/// Reduced cost of a path recomputed from first principles.
fn reduced_cost(path: &[usize], duals: &PricingDuals) -> f64 {
    let mut rc = duals.route_dual;
    for pair in path.windows(2) {
        rc += duals.vertex_costs[pair[1]] + duals.arc_duals.get(pair[0], pair[1]);
    }
    rc
}

/// A chain priced at its prizes admits exactly one route, found once no
/// matter which dominance options are on.
#[test]
fn pricing_chain_yields_one_route() {
    let graph = chain_graph(5);
    let prizes = [0.0, 10.0, 10.0, 10.0, 0.0];
    let duals = negated_prize_duals(&prizes);
    for use_domination in [false, true] {
        for two_way_domination in [false, true] {
            let params = pricing_params(use_domination, two_way_domination);
            let mut solver = PricingSolver::new(&graph, &prizes, 0, 4, 4.0, &params);
            let routes = solver.generate(&duals).unwrap();
            assert_eq!(routes.len(), 1);
            let route = &routes[0];
            assert_eq!(route.path, vec![0, 1, 2, 3, 4]);
            assert!((route.reduced_cost + 30.0).abs() < EPS);
            assert!(route.is_elementary);
            assert!(route.length <= 4.0 + EPS);
            assert!((route.reduced_cost - reduced_cost(&route.path, &duals)).abs() < EPS);
        }
    }
}

#[test]
fn pricing_forward_only_matches_bidirectional() {
    let graph = chain_graph(5);
    let prizes = [0.0, 10.0, 10.0, 10.0, 0.0];
    let duals = negated_prize_duals(&prizes);
    for (forward_only, backward_only) in [(true, false), (false, true)] {
        let params = Parameters {
            forward_only,
            backward_only,
            ..Parameters::default()
        };
        let mut solver = PricingSolver::new(&graph, &prizes, 0, 4, 4.0, &params);
        let routes = solver.generate(&duals).unwrap();
        assert_eq!(routes.len(), 1);
        assert_eq!(routes[0].path, vec![0, 1, 2, 3, 4]);
        assert!((routes[0].reduced_cost + 30.0).abs() < EPS);
    }
}

#[test]
fn pricing_respects_column_cap() {
    let graph = chain_graph(5);
    let prizes = [0.0, 10.0, 10.0, 10.0, 0.0];
    let duals = negated_prize_duals(&prizes);
    let params = Parameters {
        max_columns_added: 0,
        ..Parameters::default()
    };
    let mut solver = PricingSolver::new(&graph, &prizes, 0, 4, 4.0, &params);
    assert!(solver.generate(&duals).unwrap().is_empty());
}

#[test]
fn pricing_over_budget_finds_nothing() {
    let graph = chain_graph(5);
    let prizes = [0.0, 10.0, 10.0, 10.0, 0.0];
    let duals = negated_prize_duals(&prizes);
    let params = Parameters::default();
    let mut solver = PricingSolver::new(&graph, &prizes, 0, 4, 3.0, &params);
    assert!(solver.generate(&duals).unwrap().is_empty());
}

/// Dominance settings may thin the label pool but never the best priced
/// route: every configuration must agree on the optimum, and every returned
/// route must price out correctly on its own.
#[test]
fn pricing_configurations_agree_on_the_optimum() {
    let mut graph = Graph::new(5);
    for (u, v, w) in [
        (0, 1, 1.0),
        (0, 2, 2.0),
        (1, 2, 1.0),
        (1, 3, 1.0),
        (2, 3, 1.0),
        (3, 4, 1.0),
        (2, 4, 2.0),
        (1, 4, 3.5),
    ] {
        graph.add_arc(u, v, w);
    }
    let prizes = [0.0, 3.0, 4.0, 6.0, 0.0];
    let duals = negated_prize_duals(&prizes);

    let mut best_costs = Vec::new();
    for use_domination in [false, true] {
        for two_way_domination in [false, true] {
            let params = pricing_params(use_domination, two_way_domination);
            let mut solver = PricingSolver::new(&graph, &prizes, 0, 4, 5.0, &params);
            let routes = solver.generate(&duals).unwrap();
            assert!(!routes.is_empty());
            for route in &routes {
                assert!(route.is_elementary);
                assert!(route.length <= 5.0 + EPS);
                assert!(route.reduced_cost < -EPS);
                assert!((route.reduced_cost - reduced_cost(&route.path, &duals)).abs() < EPS);
            }
            // the best collectable prize is 0 -> 1 -> 2 -> 3 -> 4
            assert!(routes.iter().any(|r| r.path == vec![0, 1, 2, 3, 4]));
            let best = routes
                .iter()
                .map(|r| r.reduced_cost)
                .fold(f64::INFINITY, f64::min);
            best_costs.push(best);
        }
    }
    for &best in &best_costs[1..] {
        assert!((best - best_costs[0]).abs() < EPS);
    }
}

/// Zero-weight arcs tie the halfway rule between adjacent splits; the
/// duplicate join must collapse to a single returned route.
#[test]
fn pricing_zero_weight_arcs_do_not_duplicate_routes() {
    let mut graph = Graph::new(4);
    graph.add_arc(0, 1, 0.0);
    graph.add_arc(1, 2, 1.0);
    graph.add_arc(2, 3, 0.0);
    let prizes = [0.0, 5.0, 5.0, 0.0];
    let duals = negated_prize_duals(&prizes);
    let params = Parameters::default();
    let mut solver = PricingSolver::new(&graph, &prizes, 0, 3, 1.0, &params);
    let routes = solver.generate(&duals).unwrap();
    assert_eq!(routes.len(), 1);
    assert_eq!(routes[0].path, vec![0, 1, 2, 3]);
    assert!((routes[0].reduced_cost + 10.0).abs() < EPS);
}

/// Must-visit-edge duals enter priced routes through the arc they sit on.
#[test]
fn pricing_applies_arc_duals() {
    let graph = chain_graph(3);
    let prizes = [0.0, 4.0, 0.0];
    let mut duals = negated_prize_duals(&prizes);
    duals.arc_duals.set(0, 1, -2.0);
    duals.route_dual = 1.0;
    let params = Parameters::default();
    let mut solver = PricingSolver::new(&graph, &prizes, 0, 2, 2.0, &params);
    let routes = solver.generate(&duals).unwrap();
    assert_eq!(routes.len(), 1);
    // 1 (fleet) - 4 (prize) - 2 (arc dual) = -5
    assert!((routes[0].reduced_cost + 5.0).abs() < EPS);
}

/// The cheapest priced path cycles through vertices 1-2-3, so the first
/// relaxation round closes on a cyclic optimum; promoting the repeated
/// vertices makes the second round elementary.
#[test]
fn dssr_promotes_repeated_vertices() {
    let mut graph = Graph::new(5);
    for (u, v) in [(0, 1), (1, 2), (2, 3), (3, 1), (3, 4), (1, 4)] {
        graph.add_arc(u, v, 1.0);
    }
    let prizes = [0.0, 1.0, 8.0, 8.0, 0.0];
    let duals = negated_prize_duals(&prizes);
    let params = Parameters::default();
    let mut solver = PricingSolver::new(&graph, &prizes, 0, 4, 10.0, &params);
    let routes = solver.generate(&duals).unwrap();

    assert!(solver.stats.dssr_iterations >= 2);
    let optimal = solver.stats.optimal_route.as_ref().unwrap();
    assert!(optimal.is_elementary);
    assert!((optimal.reduced_cost + 17.0).abs() < EPS);
    for route in &routes {
        assert!(route.is_elementary);
        assert!(route.length <= 10.0 + EPS);
        assert_eq!(route.path[0], 0);
        assert_eq!(*route.path.last().unwrap(), 4);
        assert!(route.reduced_cost < -EPS);
        assert!((route.reduced_cost - reduced_cost(&route.path, &duals)).abs() < EPS);
    }
    assert!(routes.iter().any(|r| r.path == vec![0, 1, 2, 3, 4]));
}

// ---------------------------------------------------------------------------
// Full branch-and-price on tiny instances.

fn trivial_instance(budget: f64) -> Instance {
    Instance::from_points(
        &[(0.0, 0.0), (1.0, 0.0), (2.0, 0.0)],
        vec![0.0, 7.0, 0.0],
        1,
        budget,
    )
}

#[test]
fn trivial_top_instance_scores_seven() {
    let params = Parameters {
        num_solvers: 1,
        ..Parameters::default()
    };
    let instance = trivial_instance(10.0);
    let outcome = solve_branch_and_price(&instance, &params).unwrap();
    assert!((outcome.objective - 7.0).abs() < EPS);
    assert_eq!(outcome.routes.len(), 1);
    assert_eq!(outcome.routes[0].path, vec![0, 1, 2]);
    assert_eq!(outcome.max_parallel_solves, 1);
    assert!(outcome.num_feasible <= outcome.num_created);
    // weak duality on the root LP
    let bound = outcome.dual_upper_bound.unwrap();
    assert!(bound >= outcome.objective - EPS);
}

#[test]
fn budget_too_small_yields_empty_solution() {
    let params = Parameters {
        num_solvers: 1,
        ..Parameters::default()
    };
    let instance = trivial_instance(1.0);
    let outcome = solve_branch_and_price(&instance, &params).unwrap();
    assert!(outcome.objective.abs() < EPS);
    assert!(outcome.routes.is_empty());
}

#[test]
fn zero_column_cap_stops_after_first_lp() {
    let params = Parameters {
        num_solvers: 1,
        max_columns_added: 0,
        ..Parameters::default()
    };
    let instance = trivial_instance(10.0);
    let outcome = solve_branch_and_price(&instance, &params).unwrap();
    assert!(outcome.objective.abs() < EPS);
    assert!(outcome.routes.is_empty());
}

#[test]
fn node_resolve_is_deterministic() {
    let instance = trivial_instance(10.0);
    let params = Parameters::default();
    let first = ColGenSolver::new(&instance, &params, HighsOracle)
        .solve(BbNode::root())
        .unwrap();
    let second = ColGenSolver::new(&instance, &params, HighsOracle)
        .solve(BbNode::root())
        .unwrap();
    assert!((first.lp_objective - second.lp_objective).abs() < EPS);
    assert_eq!(first.lp_feasible, second.lp_feasible);
}

#[test]
fn conflicting_restrictions_make_the_node_infeasible() {
    let instance = trivial_instance(10.0);
    let params = Parameters::default();
    let mut node = BbNode::root();
    node.must_visit_vertices.push(1);
    node.forbidden_vertices.push(1);
    let solved = ColGenSolver::new(&instance, &params, HighsOracle)
        .solve(node)
        .unwrap();
    assert!(!solved.lp_feasible);
}

#[test]
fn restrictions_must_name_instance_entities() {
    let instance = trivial_instance(10.0);
    let params = Parameters::default();

    let mut node = BbNode::root();
    node.forbidden_vertices.push(99);
    let err = ColGenSolver::new(&instance, &params, HighsOracle)
        .solve(node)
        .unwrap_err();
    assert!(matches!(err, TopSolverError::MissingVertex(99)));

    let mut node = BbNode::root();
    node.must_visit_edges.push((2, 0));
    let err = ColGenSolver::new(&instance, &params, HighsOracle)
        .solve(node)
        .unwrap_err();
    assert!(matches!(err, TopSolverError::MissingEdge(2, 0)));
}

/// Two vehicles on a diamond: each side carries its own prize, so the MIP
/// should pick both disjoint routes.
#[test]
fn two_vehicles_cover_disjoint_routes() {
    let instance = Instance::from_points(
        &[(0.0, 0.0), (1.0, 1.0), (1.0, -1.0), (2.0, 0.0)],
        vec![0.0, 5.0, 4.0, 0.0],
        2,
        4.0,
    );
    let params = Parameters {
        num_solvers: 2,
        ..Parameters::default()
    };
    let outcome = solve_branch_and_price(&instance, &params).unwrap();
    assert!((outcome.objective - 9.0).abs() < 1e-4, "{}", outcome.objective);
    assert!(outcome.num_feasible <= outcome.num_created);
    let bound = outcome.dual_upper_bound.unwrap();
    assert!(bound >= outcome.objective - EPS);
}

/// The instance text format drives the same result end to end.
#[test]
fn parsed_instance_solves_end_to_end() {
    let text = "n 3\nm 1\nb 10\n0 0 0\n1 0 7\n2 0 0\n";
    let instance: Instance = text.parse().unwrap();
    let params = Parameters {
        num_solvers: 1,
        ..Parameters::default()
    };
    let outcome = solve_branch_and_price(&instance, &params).unwrap();
    assert!((outcome.objective - 7.0).abs() < EPS);

    let enumerated = crate::enumerate::solve_by_enumeration(&instance).unwrap();
    assert!((enumerated.objective - outcome.objective).abs() < EPS);
}

// Run on the bundled instance file, cross-checking both algorithms.
#[test]
fn run_on_test_instance() {
    let text = std::fs::read_to_string("./test_data/tiny.txt").unwrap();
    let instance: Instance = text.parse().unwrap();
    assert_eq!(instance.num_vehicles, 2);

    let params = Parameters {
        num_solvers: 2,
        ..Parameters::default()
    };
    let outcome = solve_branch_and_price(&instance, &params).unwrap();
    let enumerated = crate::enumerate::solve_by_enumeration(&instance).unwrap();
    // one vehicle can sweep all three prize vertices within the budget
    assert!((outcome.objective - 15.0).abs() < 1e-4, "{}", outcome.objective);
    assert!((enumerated.objective - outcome.objective).abs() < 1e-4);
    let total_length: f64 = outcome.routes.iter().map(|r| r.length).sum();
    assert!(outcome.routes.iter().all(|r| r.length <= instance.budget + EPS));
    assert!(total_length <= instance.budget * instance.num_vehicles as f64 + EPS);
}

#[test]
fn sensitivity_removal_changes_the_objective() {
    let instance = trivial_instance(10.0).without_vertices(&[1]);
    let params = Parameters {
        num_solvers: 1,
        ..Parameters::default()
    };
    let outcome = solve_branch_and_price(&instance, &params).unwrap();
    assert!(outcome.objective.abs() < EPS);
}

#[test]
fn seed_routes_do_not_change_the_root_bound() {
    let instance = trivial_instance(10.0);
    let params = Parameters::default();
    let seeded = ColGenSolver::new(&instance, &params, HighsOracle)
        .with_seed_routes(vec![Route::new(vec![0, 2], 0.0, 2.0, 0.0)])
        .solve(BbNode::root())
        .unwrap();
    let plain = ColGenSolver::new(&instance, &params, HighsOracle)
        .solve(BbNode::root())
        .unwrap();
    assert!((seeded.lp_objective - plain.lp_objective).abs() < EPS);
}
