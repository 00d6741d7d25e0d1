//! Result reporting: summary stats, the key=value result log, and the
//! optional CSV export of per-timestep positions.

use std::fs::File;
use std::io::{BufWriter, Write};
use std::path::{Path, PathBuf};

use anyhow::Result;
use tracing::info;

use hetmapf_core::AgentId;
use hetmapf_pibt::DistTable;
use hetmapf_scenario::Instance;
use hetmapf_search::{
    makespan, makespan_lower_bound, sum_of_costs, sum_of_costs_lower_bound, sum_of_loss, Planner,
    Solution,
};

pub struct RunParams {
    pub map: PathBuf,
    pub output: PathBuf,
    pub seed: u64,
    pub log_short: bool,
    pub rt: bool,
}

pub fn print_stats(ins: &Instance, solution: &Solution, comp_time_ms: u64) {
    if solution.is_empty() {
        return;
    }
    let dist = DistTable::build(ins);
    let ms = makespan(solution);
    let ms_lb = makespan_lower_bound(ins, &dist).max(1);
    let soc = sum_of_costs(ins, solution);
    let soc_lb = sum_of_costs_lower_bound(ins, &dist).max(1);
    info!(
        makespan = ms,
        makespan_ratio = format!("{:.2}", ms as f64 / ms_lb as f64),
        sum_of_costs = soc,
        soc_ratio = format!("{:.2}", soc as f64 / soc_lb as f64),
        sum_of_loss = sum_of_loss(ins, solution),
        comp_time_ms,
        "solved"
    );
}

/// Write the key=value result log, optionally followed by fleet metadata,
/// endpoints, and the per-timestep paths in fleet-graph coordinates.
pub fn write_log(
    ins: &Instance,
    planner: &Planner,
    solution: &Solution,
    params: &RunParams,
    comp_time_ms: u64,
) -> Result<()> {
    let dist = DistTable::build(ins);
    let mut log = BufWriter::new(File::create(&params.output)?);

    let map_name = params
        .map
        .file_name()
        .map(|n| n.to_string_lossy().into_owned())
        .unwrap_or_else(|| params.map.display().to_string());

    writeln!(log, "agents={}", ins.agent_count())?;
    writeln!(log, "map_file={map_name}")?;
    writeln!(log, "solver=hetmapf{}", if params.rt { "-rt" } else { "" })?;
    writeln!(log, "solved={}", u8::from(!solution.is_empty()))?;
    writeln!(log, "soc={}", sum_of_costs(ins, solution))?;
    writeln!(log, "soc_lb={}", sum_of_costs_lower_bound(ins, &dist))?;
    writeln!(log, "makespan={}", makespan(solution))?;
    writeln!(log, "makespan_lb={}", makespan_lower_bound(ins, &dist))?;
    writeln!(log, "sum_of_loss={}", sum_of_loss(ins, solution))?;
    writeln!(log, "comp_time={comp_time_ms}")?;
    writeln!(log, "seed={}", params.seed)?;

    let checkpoints: Vec<String> = planner.checkpoints().iter().map(|c| c.to_string()).collect();
    writeln!(log, "checkpoints={}", checkpoints.join(","))?;
    writeln!(
        log,
        "comp_time_initial_solution={}",
        planner
            .initial_solution_ms()
            .map(|t| t as i64)
            .unwrap_or(-1)
    )?;
    writeln!(
        log,
        "cost_initial_solution={}",
        planner
            .initial_solution_cost()
            .map(|c| c as i64)
            .unwrap_or(-1)
    )?;
    writeln!(log, "search_iteration={}", planner.iterations())?;
    writeln!(log, "num_high_level_node={}", planner.node_count())?;

    if params.log_short {
        return Ok(());
    }

    // Fleet definitions: fid:cs:speed_period:grid_w:grid_h;...
    let fleets: Vec<String> = ins
        .fleets
        .iter()
        .enumerate()
        .map(|(f, fleet)| {
            format!(
                "{f}:{}:{}:{}:{}",
                fleet.cell_size, fleet.speed_period, fleet.graph.width, fleet.graph.height
            )
        })
        .collect();
    writeln!(log, "fleets={}", fleets.join(";"))?;

    let assignment: Vec<String> = ins
        .agents
        .iter()
        .map(|a| a.fleet.index().to_string())
        .collect();
    writeln!(log, "agent_fleet={}", assignment.join(","))?;

    // Endpoints and paths in fleet-graph coordinates.
    let coord = |agent: usize, v: hetmapf_core::VertexId| {
        let vx = ins.fleet_graph(AgentId(agent as u32)).vertex(v);
        format!("({},{})", vx.x, vx.y)
    };

    let starts: String = ins.starts.iter().enumerate().map(|(i, &v)| coord(i, v) + ",").collect();
    writeln!(log, "starts={starts}")?;
    let goals: String = ins.goals.iter().enumerate().map(|(i, &v)| coord(i, v) + ",").collect();
    writeln!(log, "goals={goals}")?;

    writeln!(log, "solution=")?;
    for (t, config) in solution.iter().enumerate() {
        let row: String = config
            .positions
            .iter()
            .enumerate()
            .map(|(i, &v)| coord(i, v) + ",")
            .collect();
        writeln!(log, "{t}:{row}")?;
    }
    Ok(())
}

/// One CSV row per agent per timestep, in base-grid coordinates — the shape
/// downstream analysis notebooks expect.
pub fn write_csv(ins: &Instance, solution: &Solution, path: &Path) -> Result<()> {
    let mut writer = csv::Writer::from_path(path)?;
    writer.write_record(["agent", "t", "x", "y", "cell_size", "kappa"])?;
    for (t, config) in solution.iter().enumerate() {
        for (i, (&v, &kappa)) in config.positions.iter().zip(&config.kappas).enumerate() {
            let agent = AgentId(i as u32);
            let cs = ins.cell_size(agent);
            let vx = ins.fleet_graph(agent).vertex(v);
            writer.write_record([
                i.to_string(),
                t.to_string(),
                (vx.x * cs).to_string(),
                (vx.y * cs).to_string(),
                cs.to_string(),
                kappa.to_string(),
            ])?;
        }
    }
    writer.flush()?;
    Ok(())
}
