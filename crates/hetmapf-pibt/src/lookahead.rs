//! Bounded best-first lookahead on the (time, fleet-cell) product graph.
//!
//! For one agent, explore a few ticks ahead through the reservation table
//! and project the reached states down to **first steps**: the distinct
//! cells the agent could move to (or stay at) right now, each backed by the
//! cheapest short path found through it.  The push generator iterates these
//! in order instead of raw 1-step neighbors, which lets an agent start a
//! two-tick detour around a parked blocker rather than greedily walking
//! into it.
//!
//! Neighbor expansion order is shuffled per expansion so repeated calls on
//! the same configuration diversify across candidates.

use std::cmp::Reverse;
use std::collections::{BinaryHeap, HashMap, VecDeque};

use hetmapf_core::{AgentId, PlanRng};
use hetmapf_grid::Graph;
use hetmapf_scenario::Instance;
use smallvec::SmallVec;

use crate::{DistTable, Reservation};

/// How many of the agent's recent cells feed the oscillation penalty.
pub const RECENT_WINDOW: usize = 10;

/// A ranked move option for one agent.
#[derive(Clone, Debug)]
pub struct CandidatePath {
    /// Fleet-cell linear indices; `path[0]` is the agent's current cell.
    pub path: Vec<usize>,
    /// `path[1]`, or `path[0]` when the option is to wait in place.
    pub first_step: usize,
    /// Agents currently sitting on cells along the path (ranking signal;
    /// the generator re-derives true blockers from its occupancy bitmap).
    pub blockers: Vec<AgentId>,
    /// Best-first cost of the path's end state.
    pub cost: u32,
}

/// Generate ranked first-step candidates for `agent`.
///
/// `start_cell` must be the agent's actual current fleet cell (the caller
/// fixes the reservation endpoint there first).  `goal_locked`, when
/// present, rejects edges into cells occupied by a locked agent.
#[allow(clippy::too_many_arguments)]
pub fn candidates(
    ins: &Instance,
    dist: &DistTable,
    res: &Reservation,
    agent: AgentId,
    start_cell: usize,
    depth: u32,
    rng: &mut PlanRng,
    recent: &VecDeque<usize>,
    goal_locked: Option<&[bool]>,
) -> Vec<CandidatePath> {
    let fleet_id = ins.agents[agent.index()].fleet;
    let graph = &ins.fleet(fleet_id).graph;

    let node_cost = |cell: usize| -> u32 {
        let v = graph.at_index(cell).expect("candidate cell is passable");
        let d = dist.get(agent, v);
        let nb = res.parked_overlapping(ins, fleet_id, cell, agent).len() as u32;
        let mut cost = d + nb.min(3);
        if nb <= 2 {
            cost += 2 * recent.iter().filter(|&&c| c == cell).count() as u32;
        }
        cost
    };

    // Best-first over (time, cell).
    let mut best_cost: HashMap<(u32, usize), u32> = HashMap::new();
    let mut came_from: HashMap<(u32, usize), (u32, usize)> = HashMap::new();
    let mut heap: BinaryHeap<Reverse<(u32, u32, usize)>> = BinaryHeap::new();

    let start_key = (0u32, start_cell);
    best_cost.insert(start_key, node_cost(start_cell));
    heap.push(Reverse((best_cost[&start_key], 0, start_cell)));

    while let Some(Reverse((cost, time, cell))) = heap.pop() {
        if cost > best_cost[&(time, cell)] {
            continue; // stale heap entry
        }
        if time >= depth {
            continue;
        }

        let v = graph.at_index(cell).expect("expanded cell is passable");
        let mut steps: SmallVec<[usize; 5]> = SmallVec::new();
        steps.push(cell); // stay
        for &u in graph.neighbors(v) {
            steps.push(graph.vertex(u).index);
        }
        rng.shuffle(&mut steps);

        for &next in &steps {
            if res.move_collides(ins, fleet_id, cell, next, time, agent) {
                continue;
            }
            if let Some(locked) = goal_locked {
                let occupied_by_locked = res
                    .occupants(ins, fleet_id, next, time + 1)
                    .iter()
                    .any(|&a| a != agent && locked[a.index()]);
                if occupied_by_locked {
                    continue;
                }
            }

            let key = (time + 1, next);
            let c = node_cost(next);
            if best_cost.get(&key).is_none_or(|&old| c < old) {
                best_cost.insert(key, c);
                came_from.insert(key, (time, cell));
                heap.push(Reverse((c, time + 1, next)));
            }
        }
    }

    project_first_steps(ins, dist, res, agent, start_cell, &best_cost, &came_from, graph)
}

/// Collapse the reached `(time, cell)` states down to one candidate per
/// distinct first step, cheapest end state winning.
#[allow(clippy::too_many_arguments)]
fn project_first_steps(
    ins: &Instance,
    dist: &DistTable,
    res: &Reservation,
    agent: AgentId,
    start_cell: usize,
    best_cost: &HashMap<(u32, usize), u32>,
    came_from: &HashMap<(u32, usize), (u32, usize)>,
    graph: &Graph,
) -> Vec<CandidatePath> {
    let fleet_id = ins.agents[agent.index()].fleet;

    // Deterministic iteration: sort reached states by (cost, time, cell).
    let mut reached: Vec<((u32, usize), u32)> = best_cost
        .iter()
        .filter(|&(&(t, _), _)| t > 0)
        .map(|(&k, &c)| (k, c))
        .collect();
    reached.sort_unstable_by_key(|&((t, cell), c)| (c, t, cell));

    let mut by_first_step: HashMap<usize, CandidatePath> = HashMap::new();
    for ((time, cell), cost) in reached {
        // Reconstruct start → (time, cell).
        let mut path = vec![cell];
        let mut node = (time, cell);
        while let Some(&prev) = came_from.get(&node) {
            path.push(prev.1);
            node = prev;
        }
        if node != (0, start_cell) {
            continue; // unreachable from this call's start (stale table entry)
        }
        path.reverse();
        let first_step = path[1];
        if by_first_step.contains_key(&first_step) {
            continue; // sorted order means the existing entry is cheaper
        }

        let mut blockers: Vec<AgentId> = Vec::new();
        for &c in &path[1..] {
            for a in res.occupants(ins, fleet_id, c, 0) {
                if a != agent && !blockers.contains(&a) {
                    blockers.push(a);
                }
            }
        }
        blockers.sort_unstable();

        by_first_step.insert(first_step, CandidatePath { path, first_step, blockers, cost });
    }

    // The wait-in-place option is always available.
    by_first_step.entry(start_cell).or_insert_with(|| {
        let v = graph.at_index(start_cell).expect("start cell is passable");
        CandidatePath {
            path: vec![start_cell],
            first_step: start_cell,
            blockers: Vec::new(),
            cost: dist.get(agent, v),
        }
    });

    let mut out: Vec<CandidatePath> = by_first_step.into_values().collect();
    out.sort_by_key(|c| {
        let end = *c.path.last().expect("paths are non-empty");
        let end_v = graph.at_index(end).expect("path cells are passable");
        (dist.get(agent, end_v), c.blockers.len(), c.first_step)
    });
    out
}
