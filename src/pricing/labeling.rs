//! Interleaved bidirectional labeling.
//!
//! Two min-heaps of unprocessed labels, one per direction, are popped in
//! alternation. A popped label first joins against every stored label of the
//! opposite direction one arc away, then extends in its own direction while
//! it is still short of the halfway point. Complete paths only ever arise
//! from joins; the halfway filter makes each path surface from exactly one
//! split.

use std::collections::BinaryHeap;

use rustc_hash::FxHashSet;

use crate::graph::Graph;
use crate::params::Parameters;
use crate::route::Route;

use super::state::{dominates, note_dominated, HeapEntry, State, StateArena};
use super::PricingDuals;

pub(crate) struct Labeling<'a> {
    graph: &'a Graph,
    prizes: &'a [f64],
    source: usize,
    destination: usize,
    budget: f64,
    duals: &'a PricingDuals,
    params: &'a Parameters,
    is_critical: &'a [bool],
    use_visit_condition: bool,
    bidirectional: bool,
    /// Labels longer than this are not extended.
    extend_cap: f64,
    pub(crate) arena: StateArena,
    nd_forward: Vec<Vec<usize>>,
    nd_backward: Vec<Vec<usize>>,
    unprocessed_forward: BinaryHeap<HeapEntry>,
    unprocessed_backward: BinaryHeap<HeapEntry>,
}

impl<'a> Labeling<'a> {
    pub(crate) fn new(
        graph: &'a Graph,
        prizes: &'a [f64],
        source: usize,
        destination: usize,
        budget: f64,
        duals: &'a PricingDuals,
        params: &'a Parameters,
        is_critical: &'a [bool],
        use_visit_condition: bool,
    ) -> Self {
        assert!(
            !(params.forward_only && params.backward_only),
            "at most one labeling direction may be disabled"
        );
        let bidirectional = !params.forward_only && !params.backward_only;
        let extend_cap = if bidirectional {
            budget / 2.0 - params.eps
        } else {
            f64::INFINITY
        };
        let n = graph.num_vertices();
        Labeling {
            graph,
            prizes,
            source,
            destination,
            budget,
            duals,
            params,
            is_critical,
            use_visit_condition,
            bidirectional,
            extend_cap,
            arena: StateArena::default(),
            nd_forward: vec![Vec::new(); n],
            nd_backward: vec![Vec::new(); n],
            unprocessed_forward: BinaryHeap::new(),
            unprocessed_backward: BinaryHeap::new(),
        }
    }

    /// Run the search to exhaustion or to the column cap. Elementary
    /// negative-cost routes land in `routes` (deduplicated through `seen`);
    /// `optimal` tracks the best joined route, elementary or not.
    pub(crate) fn run(
        &mut self,
        routes: &mut Vec<Route>,
        seen: &mut FxHashSet<Vec<usize>>,
        optimal: &mut Option<Route>,
    ) {
        let n = self.graph.num_vertices();

        let fwd_terminal = self.arena.push(State::terminal(self.source, true, 0.0, n));
        self.nd_forward[self.source].push(fwd_terminal);
        let bwd_terminal = self.arena.push(State::terminal(
            self.destination,
            false,
            self.duals.vertex_costs[self.destination],
            n,
        ));
        self.nd_backward[self.destination].push(bwd_terminal);

        if !self.params.backward_only {
            self.extend_state(fwd_terminal);
        }
        if !self.params.forward_only {
            self.extend_state(bwd_terminal);
        }

        let mut forward_turn = true;
        loop {
            if routes.len() >= self.params.max_columns_added {
                return;
            }
            let id = match self.pop_side(forward_turn) {
                Some(id) => id,
                None => match self.pop_side(!forward_turn) {
                    Some(id) => id,
                    None => return,
                },
            };
            forward_turn = !forward_turn;

            self.perform_all_joins(id, routes, seen, optimal);
            if routes.len() >= self.params.max_columns_added {
                return;
            }
            if self.arena.states[id].length < self.extend_cap {
                self.extend_state(id);
            }
        }
    }

    /// Pop the next live label from the given side, skipping tombstones.
    fn pop_side(&mut self, forward: bool) -> Option<usize> {
        let heap = if forward {
            &mut self.unprocessed_forward
        } else {
            &mut self.unprocessed_backward
        };
        while let Some(entry) = heap.pop() {
            if !self.arena.states[entry.id].dominated {
                return Some(entry.id);
            }
        }
        None
    }

    /// Join the popped label against every stored opposite label one arc
    /// away.
    fn perform_all_joins(
        &self,
        id: usize,
        routes: &mut Vec<Route>,
        seen: &mut FxHashSet<Vec<usize>>,
        optimal: &mut Option<Route>,
    ) {
        let state = &self.arena.states[id];
        if state.forward {
            for &(v, w) in self.graph.out_arcs(state.vertex) {
                for &b in &self.nd_backward[v] {
                    if routes.len() >= self.params.max_columns_added {
                        return;
                    }
                    self.try_join(id, b, state.vertex, v, w, routes, seen, optimal);
                }
            }
        } else {
            for &(u, w) in self.graph.in_arcs(state.vertex) {
                for &f in &self.nd_forward[u] {
                    if routes.len() >= self.params.max_columns_added {
                        return;
                    }
                    self.try_join(f, id, u, state.vertex, w, routes, seen, optimal);
                }
            }
        }
    }

    #[allow(clippy::too_many_arguments)]
    fn try_join(
        &self,
        f_id: usize,
        b_id: usize,
        u: usize,
        v: usize,
        arc_len: f64,
        routes: &mut Vec<Route>,
        seen: &mut FxHashSet<Vec<usize>>,
        optimal: &mut Option<Route>,
    ) {
        let f = &self.arena.states[f_id];
        let b = &self.arena.states[b_id];
        debug_assert!(f.forward && !b.forward);

        if f.has_common_critical_visits(b) {
            return;
        }
        let total_len = f.length + arc_len + b.length;
        if total_len > self.budget {
            return;
        }
        if self.bidirectional && !self.halfway_accepts(f, b, arc_len) {
            return;
        }
        let rc = self.duals.route_dual + f.cost + b.cost + self.duals.arc_duals.get(u, v);
        if rc >= -self.params.eps {
            return;
        }

        let mut path = self.arena.path_from_source(f_id);
        path.extend(self.arena.path_to_destination(b_id));
        let route = Route::new(path, f.score + b.score, total_len, rc);

        if !f.has_cycle && !b.has_cycle && !f.has_common_general_visits(b) {
            debug_assert!(route.is_elementary);
            if seen.insert(route.path.clone()) {
                routes.push(route.clone());
            }
        }
        match optimal {
            Some(best) if route.reduced_cost >= best.reduced_cost => {}
            _ => *optimal = Some(route),
        }
    }

    /// Accept a join only at the most balanced split of the path. The
    /// alternative considered is shifting the split one arc along the
    /// shorter side; exact ties go to the decomposition with the shorter
    /// forward prefix.
    fn halfway_accepts(&self, f: &State, b: &State, arc_len: f64) -> bool {
        let eps = self.params.eps;
        let diff = (f.length - b.length).abs();
        if f.length <= b.length {
            match b.parent {
                None => true,
                Some(p) => {
                    let alt = (f.length + arc_len - self.arena.states[p].length).abs();
                    diff <= alt + eps
                }
            }
        } else {
            match f.parent {
                None => true,
                Some(p) => {
                    let alt = (self.arena.states[p].length - (b.length + arc_len)).abs();
                    diff < alt - eps
                }
            }
        }
    }

    /// Extend a label along every arc of its direction.
    fn extend_state(&mut self, id: usize) {
        let (forward, vertex) = {
            let s = &self.arena.states[id];
            (s.forward, s.vertex)
        };
        let arcs: Vec<(usize, f64)> = if forward {
            self.graph.out_arcs(vertex).to_vec()
        } else {
            self.graph.in_arcs(vertex).to_vec()
        };
        for (to, w) in arcs {
            self.extend_to(id, to, w);
        }
    }

    fn extend_to(&mut self, id: usize, to: usize, arc_len: f64) {
        let candidate = {
            let s = &self.arena.states[id];
            // already consumed as a critical vertex
            if s.visited_critical.contains(to) {
                return;
            }
            // immediate backtracking would be a 2-cycle
            if s.pred == Some(to) {
                return;
            }
            let length = s.length + arc_len;
            if length > self.budget {
                return;
            }
            let arc_dual = if s.forward {
                self.duals.arc_duals.get(s.vertex, to)
            } else {
                self.duals.arc_duals.get(to, s.vertex)
            };
            let cost = s.cost + self.duals.vertex_costs[to] + arc_dual;
            let score = s.score + self.prizes[to];

            let mut visited_general = s.visited_general.clone();
            let has_cycle = s.has_cycle || visited_general.contains(to);
            visited_general.insert(to);
            let mut visited_critical = s.visited_critical.clone();
            if self.is_critical[to] {
                visited_critical.insert(to);
            }
            let mut unreachable_critical = s.unreachable_critical.clone();
            let continuations = if s.forward {
                self.graph.out_arcs(to)
            } else {
                self.graph.in_arcs(to)
            };
            for &(x, wx) in continuations {
                if self.is_critical[x] && length + wx > self.budget {
                    unreachable_critical.insert(x);
                }
            }

            State {
                forward: s.forward,
                vertex: to,
                cost,
                score,
                length,
                parent: Some(id),
                pred: Some(s.vertex),
                visited_critical,
                visited_general,
                unreachable_critical,
                has_cycle,
                dominator_pred: None,
                dominated: false,
            }
        };
        self.add_if_non_dominated(candidate);
    }

    fn add_if_non_dominated(&mut self, mut candidate: State) {
        let forward = candidate.forward;
        let vertex = candidate.vertex;
        let eps = self.params.eps;
        let uvc = self.use_visit_condition;

        let list = if forward {
            &mut self.nd_forward[vertex]
        } else {
            &mut self.nd_backward[vertex]
        };

        if self.params.use_domination {
            for &existing in list.iter().rev() {
                let ex = &self.arena.states[existing];
                if dominates(ex, &candidate, uvc, eps) {
                    let dom_pred = ex.pred;
                    if note_dominated(&mut candidate, dom_pred) {
                        return;
                    }
                }
            }
            if self.params.two_way_domination {
                let arena = &mut self.arena;
                list.retain(|&existing| {
                    let ex = &mut arena.states[existing];
                    if dominates(&candidate, ex, uvc, eps)
                        && note_dominated(ex, candidate.pred)
                    {
                        ex.dominated = true;
                        return false;
                    }
                    true
                });
            }
        }

        let id = self.arena.push(candidate);
        list.push(id);
        let ratio = self.arena.states[id].ratio();
        let heap = if forward {
            &mut self.unprocessed_forward
        } else {
            &mut self.unprocessed_backward
        };
        heap.push(HeapEntry { ratio, id });
    }
}
