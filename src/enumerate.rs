//! Exhaustive fallback: enumerate every elementary budget-feasible route,
//! then pick the best fleet by one set-cover MIP. Only viable on small
//! instances, but it needs no pricing and makes a handy cross-check.

use crate::error::TopSolverError;
use crate::instance::Instance;
use crate::master::{HighsOracle, MasterOracle, MasterProblem};
use crate::route::Route;

#[derive(Debug)]
pub struct EnumerationOutcome {
    pub objective: f64,
    pub routes: Vec<Route>,
    /// Number of routes enumerated before the MIP picked among them.
    pub num_routes: usize,
}

/// All elementary source-to-destination paths within the budget.
pub fn enumerate_routes(instance: &Instance) -> Vec<Route> {
    let mut routes = Vec::new();
    let mut visited = vec![false; instance.graph.num_vertices()];
    visited[instance.source] = true;
    let mut path = vec![instance.source];
    dfs(instance, &mut path, &mut visited, 0.0, 0.0, &mut routes);
    routes
}

fn dfs(
    instance: &Instance,
    path: &mut Vec<usize>,
    visited: &mut [bool],
    length: f64,
    score: f64,
    routes: &mut Vec<Route>,
) {
    let u = *path.last().unwrap();
    if u == instance.destination {
        routes.push(Route::new(path.clone(), score, length, 0.0));
        return;
    }
    for &(v, w) in instance.graph.out_arcs(u) {
        if visited[v] || length + w > instance.budget {
            continue;
        }
        visited[v] = true;
        path.push(v);
        dfs(instance, path, visited, length + w, score + instance.prizes[v], routes);
        path.pop();
        visited[v] = false;
    }
}

pub fn solve_by_enumeration(instance: &Instance) -> Result<EnumerationOutcome, TopSolverError> {
    let routes = enumerate_routes(instance);
    log::info!("enumerated {} feasible routes", routes.len());

    let solution = HighsOracle.solve(&MasterProblem {
        instance,
        routes: &routes,
        must_visit_vertices: &[],
        must_visit_edges: &[],
        as_mip: true,
    })?;
    let selected = routes
        .iter()
        .zip(&solution.primal)
        .filter(|(_, &x)| x > 0.5)
        .map(|(r, _)| r.clone())
        .collect();
    Ok(EnumerationOutcome {
        objective: solution.objective,
        routes: selected,
        num_routes: routes.len(),
    })
}
