use thiserror::Error;

/// Fatal conditions the solver can report. Per-node LP infeasibility is not
/// among them: an infeasible node is pruned, not raised.
#[derive(Debug, Error)]
pub enum TopSolverError {
    #[error("set-cover master is infeasible despite the auxiliary slack")]
    SetCoverInfeasible,

    #[error("pricing closed with an optimal route that cycles through critical vertex {0}")]
    CyclesWithCriticalVertex(usize),

    #[error("arc branching requested but no arc flow is fractional")]
    BranchOnNullArc,

    #[error("vertex {0} does not exist in the instance graph")]
    MissingVertex(usize),

    #[error("arc ({0}, {1}) does not exist in the instance graph")]
    MissingEdge(usize, usize),

    #[error("branching requires a solved node carrying vertex reduced costs")]
    NullVertexReducedCosts,

    #[error("LP backend failure: {0}")]
    MasterSolve(String),
}
