pub mod bb;
pub mod branching;
pub mod colgen;
pub mod enumerate;
pub mod error;
pub mod graph;
pub mod instance;
pub mod master;
pub mod node;
pub mod params;
pub mod pricing;
pub mod route;

#[cfg(test)]
mod test;

pub use bb::{branch_and_bound, Brancher, NodeSolver, SearchNode, SearchOutcome};
pub use colgen::{solve_branch_and_price, ColGenSolver, TopOutcome};
pub use error::TopSolverError;
pub use graph::Graph;
pub use instance::Instance;
pub use node::BbNode;
pub use params::Parameters;
pub use route::Route;

use ordered_float::NotNan;

pub type Cost = NotNan<f64>;

/// Default tolerance used wherever the solver compares fractional quantities.
pub const EPSILON: f64 = 1e-6;
