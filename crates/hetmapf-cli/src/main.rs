//! `hetmapf` — plan collision-free paths for heterogeneous agent fleets.
//!
//! Two execution modes:
//!
//! - default: full-horizon solve, then write the result log;
//! - `--rt`: incremental execution — search under a per-step node budget,
//!   commit one step, repeat until the goal or the deadline.
//!
//! Run with:
//!   cargo run -p hetmapf-cli --release -- -m map.map -i scenario.scen -t 10

mod report;

use std::path::PathBuf;
use std::time::Duration;

use anyhow::{Context, Result};
use clap::Parser;
use tracing::info;

use hetmapf_scenario::{load_het_scenario, load_homogeneous, Instance};
use hetmapf_search::{validate_solution, Planner, PlannerConfig, Solution};

#[derive(Parser, Debug)]
#[command(name = "hetmapf", version, about = "heterogeneous multi-agent path finder")]
struct Args {
    /// Map file (movingai format).
    #[arg(short, long)]
    map: PathBuf,

    /// Scenario file (heterogeneous or movingai format).
    #[arg(short = 'i', long)]
    scen: PathBuf,

    /// Agent count for movingai scenarios; 0 selects the heterogeneous
    /// loader.
    #[arg(short = 'N', long, default_value_t = 0)]
    num: usize,

    /// RNG seed.
    #[arg(short, long, default_value_t = 0)]
    seed: u64,

    /// Wall-clock limit in seconds.
    #[arg(short, long, default_value_t = 10)]
    time_limit_sec: u64,

    /// Result log path.
    #[arg(short, long, default_value = "result.txt")]
    output: PathBuf,

    /// Abbreviated result log (no per-timestep paths).
    #[arg(short, long)]
    log_short: bool,

    /// Also export the plan as CSV rows (agent, t, x, y).
    #[arg(long)]
    output_csv: Option<PathBuf>,

    /// Swap x/y in heterogeneous scenario coordinates.
    #[arg(long)]
    swap_xy: bool,

    /// Verbosity (-v info, -vv debug, -vvv trace).
    #[arg(short, long, action = clap::ArgAction::Count)]
    verbose: u8,

    // ── Solver knobs ──────────────────────────────────────────────────────
    /// Permanently lock agents that reach their goals.
    #[arg(long)]
    goal_lock: bool,

    /// Stop at the first plan instead of improving until the deadline.
    #[arg(long)]
    no_anytime: bool,

    /// Competing push-generator instances per successor.
    #[arg(long, default_value_t = 1)]
    pibt_num: usize,

    /// Run the competing generators on a thread pool.
    #[arg(long)]
    multi_thread: bool,

    /// Probability of re-inserting the root on rediscovery.
    #[arg(long, default_value_t = 0.0)]
    random_insert_prob1: f64,

    /// Probability of expanding a random frontier node.
    #[arg(long, default_value_t = 0.0)]
    random_insert_prob2: f64,

    /// Best-f recording cadence in milliseconds.
    #[arg(long, default_value_t = 5000)]
    checkpoint_interval_ms: u64,

    /// Lookahead depth floor for the push generator.
    #[arg(long, default_value_t = 2)]
    bfs_depth: u32,

    // ── Incremental mode ──────────────────────────────────────────────────
    /// Incremental execution: commit one step per search budget.
    #[arg(long)]
    rt: bool,

    /// Node-expansion budget per committed step.
    #[arg(long, default_value_t = 100)]
    rt_budget: u64,
}

/// Guard against a stalled incremental run looping forever.
const MAX_COMMITTED_STEPS: usize = 100_000;

fn main() -> Result<()> {
    let args = Args::parse();
    init_logging(args.verbose);

    let mut ins = load_instance(&args)?;
    let dropped = ins.retain_valid_agents();
    if dropped > 0 {
        info!(dropped, "skipped agents with unresolvable endpoints");
    }
    ins.validate().context("instance validation failed")?;

    info!(
        agents = ins.agent_count(),
        fleets = ins.fleets.len(),
        base = format!("{}x{}", ins.base.width, ins.base.height),
        "instance loaded"
    );
    for (f, fleet) in ins.fleets.iter().enumerate() {
        info!(
            fleet = f,
            cell_size = fleet.cell_size,
            speed_period = fleet.speed_period,
            grid = format!("{}x{}", fleet.graph.width, fleet.graph.height),
            vertices = fleet.graph.vertex_count(),
            "fleet"
        );
    }

    let config = PlannerConfig {
        seed: args.seed,
        time_limit: Some(Duration::from_secs(args.time_limit_sec)),
        anytime: !args.no_anytime,
        goal_lock: args.goal_lock,
        pibt_instances: args.pibt_num,
        multi_threaded_pibt: args.multi_thread,
        random_insert_prob1: args.random_insert_prob1,
        random_insert_prob2: args.random_insert_prob2,
        checkpoint_interval_ms: args.checkpoint_interval_ms,
        bfs_depth: args.bfs_depth,
    };
    let mut planner = Planner::new(&ins, config).context("planner rejected the instance")?;

    let (solution, comp_time_ms) = if args.rt {
        run_incremental(&ins, &mut planner, args.rt_budget)
    } else {
        let solution = planner.solve();
        (solution, planner_elapsed(&planner))
    };

    let complete = solution
        .last()
        .is_some_and(|last| ins.is_goal(last));
    if complete {
        validate_solution(&ins, &solution).context("planner emitted an infeasible plan")?;
    } else if solution.is_empty() {
        info!("failed to solve");
    }

    report::print_stats(&ins, &solution, comp_time_ms);
    report::write_log(&ins, &planner, &solution, &args.report_params(), comp_time_ms)
        .with_context(|| format!("writing {}", args.output.display()))?;
    if let Some(csv_path) = &args.output_csv {
        report::write_csv(&ins, &solution, csv_path)
            .with_context(|| format!("writing {}", csv_path.display()))?;
    }
    Ok(())
}

fn load_instance(args: &Args) -> Result<Instance> {
    if args.num > 0 {
        load_homogeneous(&args.scen, &args.map, args.num)
            .with_context(|| format!("loading movingai scenario {}", args.scen.display()))
    } else {
        load_het_scenario(&args.scen, &args.map, args.swap_xy)
            .with_context(|| format!("loading heterogeneous scenario {}", args.scen.display()))
    }
}

/// Search under the per-step budget, commit a step, repeat.
fn run_incremental(ins: &Instance, planner: &mut Planner, budget: u64) -> (Solution, u64) {
    info!(budget, "incremental mode");

    let mut executed = vec![ins.start_config()];
    while executed.len() <= MAX_COMMITTED_STEPS {
        let next = planner.solve_one_step(budget);
        executed.push(next.clone());
        if ins.is_goal(&next) {
            info!(steps = executed.len() - 1, "goal reached");
            return (executed, planner_elapsed(planner));
        }
        if planner_elapsed(planner) >= planner_time_limit_ms(planner) {
            break;
        }
    }
    info!(steps = executed.len() - 1, "stopped before the goal");
    (executed, planner_elapsed(planner))
}

fn planner_elapsed(planner: &Planner) -> u64 {
    planner.elapsed_ms()
}

fn planner_time_limit_ms(planner: &Planner) -> u64 {
    planner.time_limit_ms().unwrap_or(u64::MAX)
}

fn init_logging(verbose: u8) {
    use tracing_subscriber::EnvFilter;
    let default = match verbose {
        0 => "warn",
        1 => "info",
        2 => "debug",
        _ => "trace",
    };
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(false)
        .init();
}

impl Args {
    fn report_params(&self) -> report::RunParams {
        report::RunParams {
            map: self.map.clone(),
            output: self.output.clone(),
            seed: self.seed,
            log_short: self.log_short,
            rt: self.rt,
        }
    }
}
