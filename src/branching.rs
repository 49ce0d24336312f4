//! Vertex-first branching on a fractional LP solution.

use rustc_hash::FxHashMap;

use crate::bb::Brancher;
use crate::error::TopSolverError;
use crate::instance::Instance;
use crate::node::BbNode;

pub struct TopBrancher<'a> {
    instance: &'a Instance,
    eps: f64,
    next_id: u64,
}

impl<'a> TopBrancher<'a> {
    pub fn new(instance: &'a Instance, eps: f64) -> Self {
        TopBrancher { instance, eps, next_id: 1 }
    }

    fn fresh_id(&mut self) -> u64 {
        let id = self.next_id;
        self.next_id += 1;
        id
    }
}

fn fractional(x: f64, eps: f64) -> bool {
    (x - x.round()).abs() > eps
}

impl Brancher<BbNode> for TopBrancher<'_> {
    /// Two children on the fractional vertex with the smallest reduced
    /// cost; failing that, two or three children on a fractional arc. An
    /// integral flow pattern yields no children at all.
    fn branch(&mut self, node: &BbNode) -> Result<Vec<BbNode>, TopSolverError> {
        let reduced_costs = node
            .vertex_reduced_costs
            .as_ref()
            .ok_or(TopSolverError::NullVertexReducedCosts)?;
        let source = self.instance.source;
        let destination = self.instance.destination;

        let n = self.instance.graph.num_vertices();
        let mut vertex_flow = vec![0.0; n];
        let mut arc_flow: FxHashMap<(usize, usize), f64> = FxHashMap::default();
        for (route, weight) in &node.lp_solution {
            for &v in route.interior() {
                vertex_flow[v] += weight;
            }
            for arc in route.path.windows(2) {
                *arc_flow.entry((arc[0], arc[1])).or_insert(0.0) += weight;
            }
        }

        let branch_vertex = (0..n)
            .filter(|&v| v != source && v != destination)
            .filter(|&v| fractional(vertex_flow[v], self.eps))
            .min_by(|&a, &b| reduced_costs[a].total_cmp(&reduced_costs[b]));

        if let Some(v) = branch_vertex {
            log::debug!("branching node {} on vertex {v}", node.id);
            let mut without = node.child(self.fresh_id());
            without.forbidden_vertices.push(v);
            let mut with = node.child(self.fresh_id());
            with.must_visit_vertices.push(v);
            return Ok(vec![without, with]);
        }

        if node.lp_solution.iter().any(|&(_, w)| fractional(w, self.eps)) {
            let (&(u, v), _) = arc_flow
                .iter()
                .filter(|(_, &flow)| fractional(flow, self.eps))
                .min_by(|(arc_a, _), (arc_b, _)| {
                    reduced_costs[arc_a.0]
                        .total_cmp(&reduced_costs[arc_b.0])
                        .then_with(|| arc_a.cmp(arc_b))
                })
                .ok_or(TopSolverError::BranchOnNullArc)?;
            log::debug!("branching node {} on arc ({u}, {v})", node.id);

            // terminals are visited by every route; treat them like
            // must-visit endpoints
            let anchored = u == source
                || v == destination
                || node.must_visit_vertices.contains(&u)
                || node.must_visit_vertices.contains(&v);

            let mut with_arc = node.child(self.fresh_id());
            with_arc.must_visit_edges.push((u, v));
            let mut without_arc = node.child(self.fresh_id());
            without_arc.forbidden_edges.push((u, v));
            if anchored {
                return Ok(vec![with_arc, without_arc]);
            }
            with_arc.must_visit_vertices.push(u);
            without_arc.must_visit_vertices.push(u);
            let mut without_vertex = node.child(self.fresh_id());
            without_vertex.forbidden_vertices.push(u);
            return Ok(vec![without_vertex, with_arc, without_arc]);
        }

        // all flows integral: nothing to split
        log::warn!("node {} has integral flows but was not marked integral", node.id);
        Ok(Vec::new())
    }
}
