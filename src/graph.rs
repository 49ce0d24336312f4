use rustc_hash::FxHashMap;

/// Directed graph with non-negative arc weights over a fixed vertex index
/// space `0..n`. Removing a vertex keeps the index space intact so that
/// prize and dual vectors stay aligned across reduced copies.
#[derive(Debug, Clone)]
pub struct Graph {
    present: Vec<bool>,
    out: Vec<Vec<(usize, f64)>>,
    inn: Vec<Vec<(usize, f64)>>,
    weights: FxHashMap<(usize, usize), f64>,
}

impl Graph {
    pub fn new(num_vertices: usize) -> Self {
        Graph {
            present: vec![true; num_vertices],
            out: vec![Vec::new(); num_vertices],
            inn: vec![Vec::new(); num_vertices],
            weights: FxHashMap::default(),
        }
    }

    /// Size of the vertex index space, removed vertices included.
    pub fn num_vertices(&self) -> usize {
        self.present.len()
    }

    pub fn num_arcs(&self) -> usize {
        self.weights.len()
    }

    pub fn has_vertex(&self, v: usize) -> bool {
        v < self.present.len() && self.present[v]
    }

    pub fn has_arc(&self, u: usize, v: usize) -> bool {
        self.weights.contains_key(&(u, v))
    }

    pub fn arc_weight(&self, u: usize, v: usize) -> Option<f64> {
        self.weights.get(&(u, v)).copied()
    }

    pub fn out_arcs(&self, v: usize) -> &[(usize, f64)] {
        &self.out[v]
    }

    pub fn in_arcs(&self, v: usize) -> &[(usize, f64)] {
        &self.inn[v]
    }

    pub fn add_arc(&mut self, u: usize, v: usize, weight: f64) {
        debug_assert!(u != v, "self-loops are not allowed");
        debug_assert!(weight >= 0.0, "negative arc weight");
        if self.weights.insert((u, v), weight).is_none() {
            self.out[u].push((v, weight));
            self.inn[v].push((u, weight));
        }
    }

    pub fn remove_arc(&mut self, u: usize, v: usize) {
        if self.weights.remove(&(u, v)).is_some() {
            self.out[u].retain(|&(x, _)| x != v);
            self.inn[v].retain(|&(x, _)| x != u);
        }
    }

    pub fn remove_vertex(&mut self, v: usize) {
        if !self.has_vertex(v) {
            return;
        }
        self.present[v] = false;
        let outgoing = std::mem::take(&mut self.out[v]);
        for (x, _) in outgoing {
            self.weights.remove(&(v, x));
            self.inn[x].retain(|&(y, _)| y != v);
        }
        let incoming = std::mem::take(&mut self.inn[v]);
        for (x, _) in incoming {
            self.weights.remove(&(x, v));
            self.out[x].retain(|&(y, _)| y != v);
        }
    }

    /// Copy of this graph with the given vertices and arcs removed.
    /// Entities already absent are ignored; validating them against the
    /// original instance is the caller's job.
    pub fn reduced(&self, forbidden_vertices: &[usize], forbidden_arcs: &[(usize, usize)]) -> Graph {
        let mut graph = self.clone();
        for &v in forbidden_vertices {
            graph.remove_vertex(v);
        }
        for &(u, v) in forbidden_arcs {
            graph.remove_arc(u, v);
        }
        graph
    }
}
