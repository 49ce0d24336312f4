use std::str::FromStr;

use crate::graph::Graph;

/// An immutable Team Orienteering instance: complete Euclidean graph
/// (minus the arcs a single vehicle could never use), per-vertex prizes,
/// fleet size and length budget. Vertex 0 is the source, vertex `n - 1`
/// the destination.
#[derive(Debug, Clone)]
pub struct Instance {
    pub graph: Graph,
    pub prizes: Vec<f64>,
    pub source: usize,
    pub destination: usize,
    pub num_vehicles: usize,
    pub budget: f64,
}

impl Instance {
    /// Build the instance graph from point coordinates. Arcs longer than the
    /// budget are dropped up front, as are self-loops, in-arcs of the source
    /// and out-arcs of the destination.
    pub fn from_points(
        points: &[(f64, f64)],
        prizes: Vec<f64>,
        num_vehicles: usize,
        budget: f64,
    ) -> Self {
        let n = points.len();
        assert!(n >= 2, "an instance needs at least a source and a destination");
        assert_eq!(n, prizes.len());
        let source = 0;
        let destination = n - 1;
        let mut graph = Graph::new(n);
        for i in 0..n {
            for j in 0..n {
                if i == j || i == destination || j == source {
                    continue;
                }
                let (xi, yi) = points[i];
                let (xj, yj) = points[j];
                let d = ((xi - xj).powi(2) + (yi - yj).powi(2)).sqrt();
                if d <= budget {
                    graph.add_arc(i, j, d);
                }
            }
        }
        Instance { graph, prizes, source, destination, num_vehicles, budget }
    }

    /// Sensitivity variant with a different fleet size.
    pub fn with_num_vehicles(&self, num_vehicles: usize) -> Instance {
        let mut instance = self.clone();
        instance.num_vehicles = num_vehicles;
        instance
    }

    /// Sensitivity variant with the given vertices deleted from the graph.
    /// Requests to delete the source or destination are ignored.
    pub fn without_vertices(&self, vertices: &[usize]) -> Instance {
        let mut instance = self.clone();
        for &v in vertices {
            if v == self.source || v == self.destination {
                log::warn!("ignoring removal of terminal vertex {v}");
                continue;
            }
            instance.graph.remove_vertex(v);
        }
        instance
    }
}

impl FromStr for Instance {
    type Err = String;

    /// Text format:
    /// ```text
    /// n  <numVertices>
    /// m  <numVehicles>
    /// b  <budget>
    /// <x> <y> <prize>     (one line per vertex)
    /// ```
    /// Separators are runs of spaces or tabs.
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let mut lines = s.lines().enumerate().filter(|(_, l)| !l.trim().is_empty());

        let mut header = |key: &str| -> Result<f64, String> {
            let (i, line) = lines
                .next()
                .ok_or_else(|| format!("missing header line '{key}'"))?;
            let i = i + 1;
            let mut parts = line.split_whitespace();
            let k = parts.next().ok_or_else(|| format!("empty line {i}"))?;
            if k != key {
                return Err(format!("expected '{key}' on line {i}, found '{k}'"));
            }
            let value = parts
                .next()
                .ok_or_else(|| format!("missing value for '{key}' on line {i}"))?;
            value
                .parse()
                .map_err(|e| format!("invalid value for '{key}' on line {i}: {e}"))
        };

        let n = header("n")? as usize;
        let m = header("m")? as usize;
        let budget = header("b")?;
        if n < 2 {
            return Err(format!("instance needs at least 2 vertices, found {n}"));
        }
        if m == 0 {
            return Err("fleet size must be at least 1".to_string());
        }
        if budget <= 0.0 {
            return Err(format!("budget must be positive, found {budget}"));
        }

        let mut points = Vec::with_capacity(n);
        let mut prizes = Vec::with_capacity(n);
        for _ in 0..n {
            let (i, line) = lines
                .next()
                .ok_or_else(|| format!("expected {n} vertex lines, found {}", points.len()))?;
            let i = i + 1;
            let fields: Vec<f64> = line
                .split_whitespace()
                .map(|t| t.parse().map_err(|e| format!("invalid number on line {i}: {e}")))
                .collect::<Result<_, _>>()?;
            if fields.len() != 3 {
                return Err(format!("expected 'x y prize' on line {i}, found {} fields", fields.len()));
            }
            points.push((fields[0], fields[1]));
            prizes.push(fields[2]);
        }

        Ok(Instance::from_points(&points, prizes, m, budget))
    }
}
