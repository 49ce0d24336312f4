use std::path::PathBuf;
use std::time::{Duration, Instant};

use anyhow::Context;
use serde::Serialize;

use top_solver::enumerate::solve_by_enumeration;
use top_solver::{solve_branch_and_price, Instance, Parameters};

const HELP: &str = "\
usage: top-solver [options]
  -n <name>        instance file name (default: p2.2.a.txt)
  -p <path>        instance folder path
  -o <path>        output KPI file path (YAML; stdout if omitted)
  -t <sec>         time limit in seconds, positive (default: 3600)
  -a <0|1>         algorithm: 0 = enumerate, 1 = branch-and-price (default: 1)
  -f <int>         adjusted fleet size for sensitivity analysis
  -v <int>         vertex to remove for sensitivity analysis (repeatable)
";

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct Kpis<'a> {
    instance: &'a str,
    objective: f64,
    num_created_nodes: u64,
    num_feasible_nodes: u64,
    max_parallel_solves: usize,
    time_seconds: f64,
    #[serde(skip_serializing_if = "Option::is_none")]
    dual_upper_bound: Option<f64>,
}

fn main() -> anyhow::Result<()> {
    env_logger::init();

    let mut args = pico_args::Arguments::from_env();
    if args.contains(["-h", "--help"]) {
        print!("{HELP}");
        return Ok(());
    }
    let name: String = args
        .opt_value_from_str("-n")?
        .unwrap_or_else(|| "p2.2.a.txt".to_string());
    let folder: Option<PathBuf> = args.opt_value_from_str("-p")?;
    let out_file: Option<PathBuf> = args.opt_value_from_str("-o")?;
    let time_limit: u64 = args.opt_value_from_str("-t")?.unwrap_or(3600);
    anyhow::ensure!(time_limit > 0, "time limit must be positive");
    let algorithm: u32 = args.opt_value_from_str("-a")?.unwrap_or(1);
    anyhow::ensure!(algorithm <= 1, "unknown algorithm {algorithm}");
    let fleet_size: Option<usize> = args.opt_value_from_str("-f")?;
    let mut removed_vertices: Vec<usize> = Vec::new();
    while let Some(v) = args.opt_value_from_str("-v")? {
        removed_vertices.push(v);
    }
    let rest = args.finish();
    anyhow::ensure!(rest.is_empty(), "unexpected arguments: {rest:?}");

    let path = match folder {
        Some(folder) => folder.join(&name),
        None => PathBuf::from(&name),
    };
    let text = std::fs::read_to_string(&path)
        .with_context(|| format!("reading instance {}", path.display()))?;
    let mut instance: Instance = text
        .parse()
        .map_err(|e: String| anyhow::anyhow!("parsing {}: {e}", path.display()))?;

    if let Some(m) = fleet_size {
        anyhow::ensure!(m >= 1, "fleet size must be at least 1");
        instance = instance.with_num_vehicles(m);
    }
    if !removed_vertices.is_empty() {
        instance = instance.without_vertices(&removed_vertices);
    }
    log::info!(
        "instance {name}: {} vertices, {} arcs, {} vehicles, budget {}",
        instance.graph.num_vertices(),
        instance.graph.num_arcs(),
        instance.num_vehicles,
        instance.budget,
    );

    let params = Parameters {
        time_limit: Duration::from_secs(time_limit),
        ..Parameters::default()
    };

    let start = Instant::now();
    let kpis = if algorithm == 0 {
        let outcome = solve_by_enumeration(&instance)?;
        for route in &outcome.routes {
            log::info!("route {:?} scores {}", route.path, route.score);
        }
        Kpis {
            instance: &name,
            objective: outcome.objective,
            num_created_nodes: 0,
            num_feasible_nodes: 0,
            max_parallel_solves: 0,
            time_seconds: start.elapsed().as_secs_f64(),
            dual_upper_bound: None,
        }
    } else {
        let outcome = solve_branch_and_price(&instance, &params)?;
        if outcome.timed_out {
            log::warn!("time limit hit; reporting the best incumbent found");
        }
        for route in &outcome.routes {
            log::info!("route {:?} scores {}", route.path, route.score);
        }
        Kpis {
            instance: &name,
            objective: outcome.objective,
            num_created_nodes: outcome.num_created,
            num_feasible_nodes: outcome.num_feasible,
            max_parallel_solves: outcome.max_parallel_solves,
            time_seconds: start.elapsed().as_secs_f64(),
            dual_upper_bound: outcome.dual_upper_bound,
        }
    };

    let yaml = serde_yaml::to_string(&kpis)?;
    match out_file {
        Some(path) => std::fs::write(&path, &yaml)
            .with_context(|| format!("writing {}", path.display()))?,
        None => print!("{yaml}"),
    }
    Ok(())
}
