//! Scenario file loaders.
//!
//! # Heterogeneous format
//!
//! Whitespace-separated records, `#`-prefixed and blank lines ignored.  The
//! first data line decides the format by token count:
//!
//! - **full** (≥ 10 tokens): `agent_id fleet_id cell_size velocity sx sy gx gy gw gh`
//!   — `velocity` is a float; the speed period is `max(1, round(velocity))`.
//! - **compact** (otherwise): `cell_size sx sy gx gy` — speed period defaults
//!   to the cell size.
//!
//! Fleet ids are assigned by ascending cell size regardless of the order the
//! sizes first appear.  Start/goal coordinates are base-grid cells; they map
//! to fleet cells by integer division with the cell size.  `swap_xy`
//! transposes the coordinate pairs for scenario generators that emit
//! row-major pairs.
//!
//! # Homogeneous fallback
//!
//! Classic movingai `.scen` rows
//! (`bucket  map  w  h  sx  sy  gx  gy  optimal`) limited to the first `n`
//! agents, all on a single `cell_size = 1` fleet.

use std::collections::BTreeMap;
use std::fs;
use std::path::Path;

use hetmapf_core::{FleetId, VertexId};
use hetmapf_grid::Graph;
use tracing::debug;

use crate::{AgentSpec, Fleet, Instance, ScenarioError, ScenarioResult};

// ── Heterogeneous format ──────────────────────────────────────────────────────

struct HetRecord {
    cell_size: u32,
    speed_period: u32,
    sx: usize,
    sy: usize,
    gx: usize,
    gy: usize,
}

/// Load a heterogeneous scenario + map from disk.
pub fn load_het_scenario(
    scen_path: impl AsRef<Path>,
    map_path: impl AsRef<Path>,
    swap_xy: bool,
) -> ScenarioResult<Instance> {
    let scen_text = fs::read_to_string(scen_path)?;
    let map_text = fs::read_to_string(map_path)?;
    het_instance_from_str(&scen_text, &map_text, swap_xy)
}

/// Parse a heterogeneous scenario from in-memory text.
pub fn het_instance_from_str(
    scen_text: &str,
    map_text: &str,
    swap_xy: bool,
) -> ScenarioResult<Instance> {
    let base = Graph::from_map_str(map_text)?;

    let mut records = Vec::new();
    // cell_size -> speed period; BTreeMap keys double as the sorted fleet order.
    let mut fleet_periods: BTreeMap<u32, u32> = BTreeMap::new();
    let mut full_format: Option<bool> = None;

    for (lineno, raw_line) in scen_text.lines().enumerate() {
        let line = raw_line.strip_suffix('\r').unwrap_or(raw_line);
        if line.is_empty() || line.starts_with('#') {
            continue;
        }
        let tokens: Vec<&str> = line.split_whitespace().collect();
        let full = *full_format.get_or_insert(tokens.len() >= 10);

        let parse = |idx: usize| -> ScenarioResult<f64> {
            tokens
                .get(idx)
                .and_then(|t| t.parse::<f64>().ok())
                .ok_or_else(|| ScenarioError::Parse {
                    line: lineno + 1,
                    msg: format!("expected numeric field {idx} in {line:?}"),
                })
        };

        let rec = if full {
            let cell_size = parse(2)? as u32;
            let velocity = parse(3)?;
            HetRecord {
                cell_size,
                speed_period: (velocity.round() as u32).max(1),
                sx: parse(4)? as usize,
                sy: parse(5)? as usize,
                gx: parse(6)? as usize,
                gy: parse(7)? as usize,
            }
        } else {
            let cell_size = parse(0)? as u32;
            HetRecord {
                cell_size,
                speed_period: cell_size.max(1),
                sx: parse(1)? as usize,
                sy: parse(2)? as usize,
                gx: parse(3)? as usize,
                gy: parse(4)? as usize,
            }
        };
        fleet_periods.insert(rec.cell_size, rec.speed_period);
        records.push(rec);
    }

    // Fleets by ascending cell size.
    let mut fleets = Vec::with_capacity(fleet_periods.len());
    let mut fleet_by_size: BTreeMap<u32, FleetId> = BTreeMap::new();
    for (&cell_size, &speed_period) in &fleet_periods {
        let id = FleetId(fleets.len() as u16);
        fleets.push(Fleet {
            cell_size,
            speed_period,
            graph: Graph::tiled(&base, cell_size)?,
        });
        fleet_by_size.insert(cell_size, id);
    }

    let mut agents = Vec::with_capacity(records.len());
    let mut starts = Vec::with_capacity(records.len());
    let mut goals = Vec::with_capacity(records.len());
    for rec in &records {
        let fleet_id = fleet_by_size[&rec.cell_size];
        let fleet = &fleets[fleet_id.index()];
        let cs = rec.cell_size as usize;

        let (sx, sy, gx, gy) = if swap_xy {
            (rec.sy, rec.sx, rec.gy, rec.gx)
        } else {
            (rec.sx, rec.sy, rec.gx, rec.gy)
        };

        agents.push(AgentSpec { fleet: fleet_id, cell_size: rec.cell_size });
        starts.push(fleet.graph.at(sx / cs, sy / cs).unwrap_or(VertexId::INVALID));
        goals.push(fleet.graph.at(gx / cs, gy / cs).unwrap_or(VertexId::INVALID));
    }

    debug!(
        agents = agents.len(),
        fleets = fleets.len(),
        "loaded heterogeneous scenario"
    );
    Ok(Instance { base, fleets, agents, starts, goals })
}

// ── Homogeneous fallback ──────────────────────────────────────────────────────

/// Load a classic movingai `.scen` file, limited to the first `n` agents.
pub fn load_homogeneous(
    scen_path: impl AsRef<Path>,
    map_path: impl AsRef<Path>,
    n: usize,
) -> ScenarioResult<Instance> {
    let scen_text = fs::read_to_string(scen_path)?;
    let map_text = fs::read_to_string(map_path)?;
    homogeneous_from_str(&scen_text, &map_text, n)
}

/// Parse a movingai `.scen` from in-memory text.
///
/// Rows that fail to parse (e.g. the `version` header) or whose endpoints
/// fall outside the map are silently skipped, matching the benchmark
/// convention.
pub fn homogeneous_from_str(scen_text: &str, map_text: &str, n: usize) -> ScenarioResult<Instance> {
    let base = Graph::from_map_str(map_text)?;
    let graph = Graph::tiled(&base, 1)?;

    let mut starts = Vec::new();
    let mut goals = Vec::new();
    for raw_line in scen_text.lines() {
        if starts.len() >= n {
            break;
        }
        let line = raw_line.strip_suffix('\r').unwrap_or(raw_line);
        let fields: Vec<&str> = line.split('\t').collect();
        // bucket  map  width  height  sx  sy  gx  gy  optimal
        if fields.len() < 9 || !fields[1].ends_with(".map") {
            continue;
        }
        let coord = |idx: usize| fields[idx].parse::<usize>().ok();
        let (Some(sx), Some(sy), Some(gx), Some(gy)) =
            (coord(4), coord(5), coord(6), coord(7))
        else {
            continue;
        };
        let (Some(s), Some(g)) = (graph.at(sx, sy), graph.at(gx, gy)) else {
            continue;
        };
        starts.push(s);
        goals.push(g);
    }

    let agents = vec![AgentSpec { fleet: FleetId(0), cell_size: 1 }; starts.len()];
    debug!(agents = agents.len(), "loaded homogeneous scenario");
    Ok(Instance {
        base,
        fleets: vec![Fleet { cell_size: 1, speed_period: 1, graph }],
        agents,
        starts,
        goals,
    })
}
