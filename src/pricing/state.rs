//! Partial-path labels for the pricing problem.

use fixedbitset::FixedBitSet;
use ordered_float::NotNan;

use crate::Cost;

/// A label of the bidirectional search: a partial path anchored at the
/// source (forward) or destination (backward) with its accumulated reduced
/// cost, score and length, plus the vertex sets dominance and the
/// elementarity machinery need. Labels live in a [`StateArena`] and refer to
/// their parent by index, so a label is cheap to drop even at the end of a
/// long chain.
#[derive(Debug, Clone)]
pub struct State {
    pub forward: bool,
    pub vertex: usize,
    /// Accumulated reduced cost (excluding the fleet dual, added at join).
    pub cost: f64,
    pub score: f64,
    pub length: f64,
    pub parent: Option<usize>,
    /// Vertex of the parent label; used by the two-cycle screens.
    pub pred: Option<usize>,
    /// Critical vertices on the path.
    pub visited_critical: FixedBitSet,
    /// All vertices on the path.
    pub visited_general: FixedBitSet,
    /// Critical vertices no continuation of this label can reach in budget.
    pub unreachable_critical: FixedBitSet,
    pub has_cycle: bool,
    /// Predecessor of the first dominator that did not share this label's
    /// predecessor; a second distinct one truly dominates (two-cycle
    /// removal rule).
    pub dominator_pred: Option<usize>,
    /// Tombstone set when two-way domination evicts the label while a heap
    /// entry still points at it.
    pub dominated: bool,
}

impl State {
    /// Seed label sitting at a terminal vertex. All three vertex sets hold
    /// exactly the terminal bit.
    pub fn terminal(vertex: usize, forward: bool, cost: f64, num_bits: usize) -> State {
        let mut bits = FixedBitSet::with_capacity(num_bits);
        bits.insert(vertex);
        State {
            forward,
            vertex,
            cost,
            score: 0.0,
            length: 0.0,
            parent: None,
            pred: None,
            visited_critical: bits.clone(),
            visited_general: bits.clone(),
            unreachable_critical: bits,
            has_cycle: false,
            dominator_pred: None,
            dominated: false,
        }
    }

    /// Heap key: reduced cost per unit length, 0 for zero-length labels.
    pub fn ratio(&self) -> Cost {
        let r = if self.length == 0.0 { 0.0 } else { self.cost / self.length };
        NotNan::new(r).unwrap()
    }

    pub fn has_common_critical_visits(&self, other: &State) -> bool {
        !self.visited_critical.is_disjoint(&other.visited_critical)
    }

    pub fn has_common_general_visits(&self, other: &State) -> bool {
        !self.visited_general.is_disjoint(&other.visited_general)
    }
}

/// Subset test on the union `visited_critical | unreachable_critical`,
/// word by word. Returns `(is_subset, is_proper_subset)`.
fn combined_subset(a: &State, b: &State) -> (bool, bool) {
    let a_crit = a.visited_critical.as_slice();
    let a_unr = a.unreachable_critical.as_slice();
    let b_crit = b.visited_critical.as_slice();
    let b_unr = b.unreachable_critical.as_slice();
    let mut proper = false;
    for i in 0..a_crit.len() {
        let aw = a_crit[i] | a_unr[i];
        let bw = b_crit[i] | b_unr[i];
        if aw & !bw != 0 {
            return (false, false);
        }
        if bw & !aw != 0 {
            proper = true;
        }
    }
    (true, proper)
}

/// Dominance between two labels at the same vertex and direction: no worse
/// in cost and length, the combined critical/unreachable set contained in
/// the other's, and strictly better somewhere. With `use_visit_condition`
/// the visited-critical set alone must also be contained (the stricter form
/// the DSSR retry switches on).
pub fn dominates(a: &State, b: &State, use_visit_condition: bool, eps: f64) -> bool {
    debug_assert_eq!(a.vertex, b.vertex);
    debug_assert_eq!(a.forward, b.forward);
    if a.cost > b.cost + eps || a.length > b.length + eps {
        return false;
    }
    let (subset, proper) = combined_subset(a, b);
    if !subset {
        return false;
    }
    if use_visit_condition && !a.visited_critical.is_subset(&b.visited_critical) {
        return false;
    }
    a.cost < b.cost - eps || a.length < b.length - eps || proper
}

/// Two-cycle removal rule. Records the dominator's predecessor on the
/// victim and reports whether the victim is now truly dominated: instantly
/// when dominator and victim extend from the same predecessor, otherwise
/// only once dominators with two distinct predecessors have been seen.
pub fn note_dominated(victim: &mut State, dominator_pred: Option<usize>) -> bool {
    if victim.pred == dominator_pred {
        return true;
    }
    match victim.dominator_pred {
        None => {
            victim.dominator_pred = dominator_pred;
            false
        }
        Some(p) => dominator_pred != Some(p),
    }
}

/// Flat storage for all labels of one labeling run.
#[derive(Debug, Default)]
pub struct StateArena {
    pub states: Vec<State>,
}

impl StateArena {
    pub fn push(&mut self, state: State) -> usize {
        self.states.push(state);
        self.states.len() - 1
    }

    pub fn len(&self) -> usize {
        self.states.len()
    }

    /// Vertex sequence of a forward label, source first.
    pub fn path_from_source(&self, id: usize) -> Vec<usize> {
        let mut path = Vec::new();
        let mut cur = Some(id);
        while let Some(i) = cur {
            path.push(self.states[i].vertex);
            cur = self.states[i].parent;
        }
        path.reverse();
        path
    }

    /// Vertex sequence of a backward label, its own vertex first and the
    /// destination last (parents of a backward label lie towards the
    /// destination).
    pub fn path_to_destination(&self, id: usize) -> Vec<usize> {
        let mut path = Vec::new();
        let mut cur = Some(id);
        while let Some(i) = cur {
            path.push(self.states[i].vertex);
            cur = self.states[i].parent;
        }
        path
    }
}

/// Min-heap entry ordered by bang-for-buck ratio, id as tiebreak.
#[derive(Debug, PartialEq, Eq)]
pub struct HeapEntry {
    pub ratio: Cost,
    pub id: usize,
}

impl PartialOrd for HeapEntry {
    fn partial_cmp(&self, other: &Self) -> Option<std::cmp::Ordering> {
        Some(self.cmp(other))
    }
}

impl Ord for HeapEntry {
    fn cmp(&self, other: &Self) -> std::cmp::Ordering {
        // reversed: BinaryHeap is a max-heap and we want the smallest ratio
        other.ratio.cmp(&self.ratio).then_with(|| other.id.cmp(&self.id))
    }
}
