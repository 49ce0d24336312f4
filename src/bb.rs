//! Generic parallel branch-and-bound.
//!
//! `num_solvers` workers pull unsolved nodes off one channel and push solved
//! ones onto another. A single processor loop (running on the calling
//! thread) owns every piece of search state: the open queue, the incumbent
//! and the counters. Workers share nothing mutable, so the processor never
//! takes a lock; termination is the classic test of an empty queue with no
//! solve in flight.

use std::cmp::Ordering;
use std::collections::BinaryHeap;
use std::time::{Duration, Instant};

use crossbeam_channel::{unbounded, Receiver, RecvTimeoutError, Sender};
use ordered_float::NotNan;

use crate::error::TopSolverError;

/// What the engine needs to know about a node. Everything else (restriction
/// sets, LP solutions, ...) belongs to the node type.
pub trait SearchNode: Send + Clone {
    fn id(&self) -> u64;
    /// Bound inherited from the parent; the open queue orders on it.
    fn parent_objective(&self) -> f64;
    fn lp_feasible(&self) -> bool;
    fn lp_integral(&self) -> bool;
    fn objective(&self) -> f64;
}

/// Turns an unsolved node into a solved one. Each worker owns exactly one
/// solver (and with it one LP backend handle).
pub trait NodeSolver<N> {
    fn solve_node(&mut self, node: N) -> Result<N, TopSolverError>;
}

/// Expands a solved fractional node into children. Runs on the processor
/// only, so it may keep state (an id counter, say) without synchronization.
pub trait Brancher<N> {
    fn branch(&mut self, node: &N) -> Result<Vec<N>, TopSolverError>;
}

#[derive(Debug)]
pub struct SearchOutcome<N> {
    /// Best integer-feasible node found, if any.
    pub incumbent: Option<N>,
    /// Its objective, or 0 when nothing integer-feasible was found.
    pub objective: f64,
    /// The solved root, kept for bound reporting.
    pub root: Option<N>,
    pub num_created: u64,
    pub num_feasible: u64,
    pub max_parallel_solves: usize,
    pub timed_out: bool,
}

/// Open-queue entry: best (largest) parent bound first, smallest id on ties.
struct OpenEntry<N>(N);

impl<N: SearchNode> OpenEntry<N> {
    fn key(&self) -> (NotNan<f64>, u64) {
        (NotNan::new(self.0.parent_objective()).unwrap_or(NotNan::new(0.0).unwrap()), self.0.id())
    }
}

impl<N: SearchNode> PartialEq for OpenEntry<N> {
    fn eq(&self, other: &Self) -> bool {
        self.key() == other.key()
    }
}

impl<N: SearchNode> Eq for OpenEntry<N> {}

impl<N: SearchNode> PartialOrd for OpenEntry<N> {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl<N: SearchNode> Ord for OpenEntry<N> {
    fn cmp(&self, other: &Self) -> Ordering {
        let (obj_a, id_a) = self.key();
        let (obj_b, id_b) = other.key();
        // max-heap: larger bound wins, then the *older* (smaller) id
        obj_a.cmp(&obj_b).then_with(|| id_b.cmp(&id_a))
    }
}

/// Run the search. `make_solver` is invoked once per worker, on that
/// worker's thread, so solvers never cross threads. Returns when the tree
/// is exhausted, the time limit expires (current incumbent is reported), or
/// a worker hits a fatal error.
pub fn branch_and_bound<N, S, F, B>(
    root: N,
    make_solver: F,
    brancher: &mut B,
    num_solvers: usize,
    time_limit: Option<Duration>,
    eps: f64,
) -> Result<SearchOutcome<N>, TopSolverError>
where
    N: SearchNode,
    S: NodeSolver<N>,
    F: Fn(usize) -> S + Sync,
    B: Brancher<N>,
{
    let num_solvers = num_solvers.max(1);
    let deadline = time_limit.map(|limit| Instant::now() + limit);

    let (unsolved_tx, unsolved_rx) = unbounded::<N>();
    let (solved_tx, solved_rx) = unbounded::<Result<N, TopSolverError>>();

    std::thread::scope(|scope| {
        for worker in 0..num_solvers {
            let rx = unsolved_rx.clone();
            let tx = solved_tx.clone();
            let make_solver = &make_solver;
            scope.spawn(move || {
                let mut solver = make_solver(worker);
                while let Ok(node) = rx.recv() {
                    let solved = solver.solve_node(node);
                    let failed = solved.is_err();
                    if tx.send(solved).is_err() || failed {
                        break;
                    }
                }
            });
        }
        drop(solved_tx);

        // Dropping the unsolved sender on return is what winds the workers
        // down, whether we finish, time out, or abort on an error.
        run_processor(unsolved_tx, solved_rx, root, brancher, num_solvers, deadline, eps)
    })
}

fn run_processor<N, B>(
    unsolved_tx: Sender<N>,
    solved_rx: Receiver<Result<N, TopSolverError>>,
    root: N,
    brancher: &mut B,
    num_solvers: usize,
    deadline: Option<Instant>,
    eps: f64,
) -> Result<SearchOutcome<N>, TopSolverError>
where
    N: SearchNode,
    B: Brancher<N>,
{
    let mut open: BinaryHeap<OpenEntry<N>> = BinaryHeap::new();
    let mut incumbent: Option<N> = None;
    let mut root_node: Option<N> = None;
    let mut num_solving: usize = 1;
    let mut num_created: u64 = 1;
    let mut num_feasible: u64 = 0;
    let mut max_parallel_solves: usize = 1;
    let mut timed_out = false;

    // the root goes out directly, it never sits in the queue
    unsolved_tx
        .send(root)
        .map_err(|_| TopSolverError::MasterSolve("no worker available".into()))?;

    while num_solving > 0 || !open.is_empty() {
        let received = match deadline {
            Some(deadline) => match solved_rx.recv_deadline(deadline) {
                Ok(received) => received,
                Err(RecvTimeoutError::Timeout) => {
                    log::info!("time limit reached with {} open nodes", open.len());
                    timed_out = true;
                    break;
                }
                Err(RecvTimeoutError::Disconnected) => break,
            },
            None => match solved_rx.recv() {
                Ok(received) => received,
                Err(_) => break,
            },
        };
        let node = received?;
        num_solving -= 1;

        if root_node.is_none() {
            root_node = Some(node.clone());
        }

        let beaten = incumbent
            .as_ref()
            .map(|best| best.objective() >= node.objective() - eps)
            .unwrap_or(false);
        if !node.lp_feasible() || beaten {
            log::debug!("pruning node {} (feasible: {})", node.id(), node.lp_feasible());
        } else {
            num_feasible += 1;
            if node.lp_integral() {
                log::info!("new incumbent {} from node {}", node.objective(), node.id());
                incumbent = Some(node);
            } else {
                let children = brancher.branch(&node)?;
                num_created += children.len() as u64;
                for child in children {
                    open.push(OpenEntry(child));
                }
            }
        }

        while num_solving < num_solvers {
            match open.pop() {
                Some(OpenEntry(next)) => {
                    if unsolved_tx.send(next).is_err() {
                        break;
                    }
                    num_solving += 1;
                }
                None => break,
            }
        }
        max_parallel_solves = max_parallel_solves.max(num_solving);
    }

    let objective = incumbent.as_ref().map(|n| n.objective()).unwrap_or(0.0);
    log::info!(
        "search done: objective {objective}, {num_created} nodes created, \
         {num_feasible} feasible, {max_parallel_solves} parallel solves at peak"
    );
    Ok(SearchOutcome {
        incumbent,
        objective,
        root: root_node,
        num_created,
        num_feasible,
        max_parallel_solves,
        timed_out,
    })
}
