//! Space-time reservation table.
//!
//! One `Reservation` lives for exactly one generator call.  It answers
//! collision questions for the lookahead and accumulates constraints as
//! agents are assigned within that call.
//!
//! # Model
//!
//! - `st_map` records explicit occupancy: `(time, base_cell) → agents`.
//!   Reserving a path on one fleet's graph inserts the base cells of every
//!   footprint, so agents on different fleet graphs see each other.
//! - Each agent has an **endpoint**: after its last explicit reservation it
//!   is considered parked at that cell forever.  Only **processed** agents'
//!   endpoints block future timesteps; seeding a configuration transiently
//!   makes everyone visible at `t = 0` without blocking `t >= 1`.
//! - Stale `st_map` entries from an undone push cascade are left in place.
//!   They can only make later queries more conservative, never less, and
//!   removing them would require the reverse bookkeeping this per-call
//!   structure exists to avoid.  Endpoints and the parked index, by
//!   contrast, are always restored on undo via [`Reservation::reset_agent`].

use std::collections::HashMap;

use hetmapf_core::{AgentId, FleetId, HetConfig};
use hetmapf_grid::footprint;
use hetmapf_scenario::Instance;
use smallvec::SmallVec;

/// Pack `(time, base_cell)` into one hash-map key.
#[inline]
fn pack_key(time: u32, base_cell: usize) -> u64 {
    ((time as u64) << 32) | base_cell as u64
}

/// Where an agent is parked after its last explicit reservation.
#[derive(Copy, Clone, Debug)]
pub struct Endpoint {
    /// `FleetId::INVALID` until the agent is first seeded or reserved.
    pub fleet: FleetId,
    /// Fleet-cell linear index (`fleet_width * fy + fx`).
    pub cell: usize,
    pub end_time: u32,
}

impl Endpoint {
    const NONE: Endpoint = Endpoint { fleet: FleetId::INVALID, cell: 0, end_time: 0 };

    #[inline]
    fn is_set(&self) -> bool {
        self.fleet.is_valid()
    }
}

pub struct Reservation {
    /// `(time, base_cell)` → agents explicitly reserved there.
    st_map: HashMap<u64, Vec<AgentId>>,
    endpoints: Vec<Endpoint>,
    /// Reverse index: base cell → agents parked overlapping it.
    parked_at_cell: HashMap<usize, Vec<AgentId>>,
    /// Only processed agents' endpoints block future timesteps.
    processed: Vec<bool>,
}

impl Reservation {
    pub fn new(ins: &Instance) -> Self {
        Self {
            st_map: HashMap::new(),
            endpoints: vec![Endpoint::NONE; ins.agent_count()],
            parked_at_cell: HashMap::new(),
            processed: vec![false; ins.agent_count()],
        }
    }

    #[inline]
    pub fn endpoint(&self, agent: AgentId) -> &Endpoint {
        &self.endpoints[agent.index()]
    }

    #[inline]
    pub fn is_processed(&self, agent: AgentId) -> bool {
        self.processed[agent.index()]
    }

    #[inline]
    pub fn mark_processed(&mut self, agent: AgentId) {
        self.processed[agent.index()] = true;
    }

    // ── Seeding ───────────────────────────────────────────────────────────

    /// Seed a configuration at `t = 0` with every agent parked and
    /// processed — each one blocks all future timesteps until it is
    /// re-reserved elsewhere.
    pub fn seed(&mut self, ins: &Instance, config: &HetConfig) {
        for (i, &v) in config.positions.iter().enumerate() {
            let agent = AgentId(i as u32);
            let fleet = ins.agents[i].fleet;
            let cell = ins.fleet(fleet).graph.vertex(v).index;
            self.reserve_stay(ins, agent, fleet, cell, 0, 0);
        }
    }

    /// Record each agent's current cell at `t = 0` and set its endpoint
    /// there, without marking anyone processed: the lookahead sees current
    /// positions at `t = 0`, but unprocessed agents do not yet block
    /// `t >= 1`.
    pub fn seed_transient(&mut self, ins: &Instance, config: &HetConfig) {
        for (i, &v) in config.positions.iter().enumerate() {
            let agent = AgentId(i as u32);
            let fleet = ins.agents[i].fleet;
            let cell = ins.fleet(fleet).graph.vertex(v).index;
            self.insert_cell(ins, agent, fleet, cell, 0);
            self.endpoints[i] = Endpoint { fleet, cell, end_time: 0 };
        }
    }

    // ── Reservations ──────────────────────────────────────────────────────

    /// Force-reserve a multi-step path; `positions[k]` is occupied at
    /// `start_time + k`.  If the agent had an earlier endpoint, the gap
    /// between its old `end_time` and `start_time` is filled with the old
    /// cell, then the endpoint moves to the path's last cell.  Marks the
    /// agent processed.
    pub fn reserve_path(
        &mut self,
        ins: &Instance,
        agent: AgentId,
        fleet: FleetId,
        start_time: u32,
        positions: &[usize],
    ) {
        let Some(&last) = positions.last() else { return };

        let old = self.endpoints[agent.index()];
        if old.is_set() {
            for t in old.end_time + 1..start_time {
                self.insert_cell(ins, agent, old.fleet, old.cell, t);
            }
        }

        for (k, &cell) in positions.iter().enumerate() {
            self.insert_cell(ins, agent, fleet, cell, start_time + k as u32);
        }

        self.update_parked(ins, agent, old, fleet, last);
        self.endpoints[agent.index()] = Endpoint {
            fleet,
            cell: last,
            end_time: start_time + positions.len() as u32 - 1,
        };
        self.processed[agent.index()] = true;
    }

    /// Reserve the agent staying at `cell` from `start_time` through
    /// `end_time` inclusive.
    pub fn reserve_stay(
        &mut self,
        ins: &Instance,
        agent: AgentId,
        fleet: FleetId,
        cell: usize,
        start_time: u32,
        end_time: u32,
    ) {
        let positions = vec![cell; (end_time - start_time + 1) as usize];
        self.reserve_path(ins, agent, fleet, start_time, &positions);
    }

    /// Overwrite the agent's endpoint and rewire the parked index, leaving
    /// `st_map` untouched.  Used when a failed push cascade is undone and
    /// the agent must be parked back at its source cell.
    pub fn reset_agent(&mut self, ins: &Instance, agent: AgentId, fleet: FleetId, cell: usize) {
        let old = self.endpoints[agent.index()];
        self.update_parked(ins, agent, old, fleet, cell);
        self.endpoints[agent.index()] = Endpoint { fleet, cell, end_time: 0 };
    }

    // ── Queries ───────────────────────────────────────────────────────────

    /// Is `base_cell` occupied at `time` by anyone other than `except`?
    pub fn is_occupied(&self, base_cell: usize, time: u32, except: AgentId) -> bool {
        if let Some(agents) = self.st_map.get(&pack_key(time, base_cell)) {
            if agents.iter().any(|&a| a != except) {
                return true;
            }
        }
        if let Some(agents) = self.parked_at_cell.get(&base_cell) {
            for &a in agents {
                if a == except || !self.processed[a.index()] {
                    continue;
                }
                let ep = &self.endpoints[a.index()];
                if ep.is_set() && ep.end_time < time {
                    return true;
                }
            }
        }
        false
    }

    /// Would `agent` moving `from_cell → to_cell` on `fleet` at `time`
    /// collide?  Checks the vertex conflict (any base cell of `to` occupied
    /// at `time + 1`) and the swap conflict (someone at `to` at `time` who
    /// is also at `from` at `time + 1`).
    pub fn move_collides(
        &self,
        ins: &Instance,
        fleet: FleetId,
        from_cell: usize,
        to_cell: usize,
        time: u32,
        agent: AgentId,
    ) -> bool {
        for bc in self.fleet_to_base(ins, fleet, to_cell) {
            if self.is_occupied(bc, time + 1, agent) {
                return true;
            }
        }

        // Swap: collect others at `to` now...
        let mut at_target: SmallVec<[AgentId; 8]> = SmallVec::new();
        for bc in self.fleet_to_base(ins, fleet, to_cell) {
            if let Some(agents) = self.st_map.get(&pack_key(time, bc)) {
                for &a in agents {
                    if a != agent && !at_target.contains(&a) {
                        at_target.push(a);
                    }
                }
            }
            if let Some(agents) = self.parked_at_cell.get(&bc) {
                for &a in agents {
                    if a == agent || at_target.contains(&a) || !self.processed[a.index()] {
                        continue;
                    }
                    let ep = &self.endpoints[a.index()];
                    if ep.is_set() && ep.end_time < time {
                        at_target.push(a);
                    }
                }
            }
        }
        if at_target.is_empty() {
            return false;
        }

        // ...and see whether any of them lands on `from` next tick.
        // Parked agents never move, so only explicit reservations matter.
        for bc in self.fleet_to_base(ins, fleet, from_cell) {
            if let Some(agents) = self.st_map.get(&pack_key(time + 1, bc)) {
                if agents.iter().any(|a| at_target.contains(a)) {
                    return true;
                }
            }
        }
        false
    }

    /// Everyone occupying any base cell of `cell` at `time` — explicit
    /// reservations plus processed parked agents past their end time.
    /// Deduplicated, in discovery order.
    pub fn occupants(
        &self,
        ins: &Instance,
        fleet: FleetId,
        cell: usize,
        time: u32,
    ) -> SmallVec<[AgentId; 8]> {
        let mut result: SmallVec<[AgentId; 8]> = SmallVec::new();
        for bc in self.fleet_to_base(ins, fleet, cell) {
            if let Some(agents) = self.st_map.get(&pack_key(time, bc)) {
                for &a in agents {
                    if !result.contains(&a) {
                        result.push(a);
                    }
                }
            }
            if let Some(agents) = self.parked_at_cell.get(&bc) {
                for &a in agents {
                    if result.contains(&a) || !self.processed[a.index()] {
                        continue;
                    }
                    let ep = &self.endpoints[a.index()];
                    if ep.is_set() && ep.end_time < time {
                        result.push(a);
                    }
                }
            }
        }
        result
    }

    /// Agents other than `except` whose endpoint footprint overlaps `cell`,
    /// regardless of processing — the "someone is resting here" signal the
    /// lookahead uses for its crowding penalty.
    pub fn parked_overlapping(
        &self,
        ins: &Instance,
        fleet: FleetId,
        cell: usize,
        except: AgentId,
    ) -> SmallVec<[AgentId; 8]> {
        let cells: SmallVec<[usize; 16]> = self.fleet_to_base(ins, fleet, cell).collect();
        let mut result: SmallVec<[AgentId; 8]> = SmallVec::new();
        for (i, ep) in self.endpoints.iter().enumerate() {
            let agent = AgentId(i as u32);
            if agent == except || !ep.is_set() {
                continue;
            }
            let overlaps = self
                .fleet_to_base(ins, ep.fleet, ep.cell)
                .any(|bc| cells.contains(&bc));
            if overlaps {
                result.push(agent);
            }
        }
        result
    }

    // ── Internals ─────────────────────────────────────────────────────────

    #[inline]
    fn fleet_to_base<'a>(
        &self,
        ins: &'a Instance,
        fleet: FleetId,
        cell: usize,
    ) -> impl Iterator<Item = usize> + 'a {
        let f = ins.fleet(fleet);
        footprint::base_cells_of_index(cell, f.graph.width, f.cell_size, ins.base.width)
    }

    fn insert_cell(&mut self, ins: &Instance, agent: AgentId, fleet: FleetId, cell: usize, time: u32) {
        let f = ins.fleet(fleet);
        for bc in footprint::base_cells_of_index(cell, f.graph.width, f.cell_size, ins.base.width) {
            self.st_map.entry(pack_key(time, bc)).or_default().push(agent);
        }
    }

    fn update_parked(
        &mut self,
        ins: &Instance,
        agent: AgentId,
        old: Endpoint,
        new_fleet: FleetId,
        new_cell: usize,
    ) {
        if old.is_set() {
            let cells: SmallVec<[usize; 16]> =
                self.fleet_to_base(ins, old.fleet, old.cell).collect();
            for bc in cells {
                if let Some(agents) = self.parked_at_cell.get_mut(&bc) {
                    agents.retain(|&a| a != agent);
                    if agents.is_empty() {
                        self.parked_at_cell.remove(&bc);
                    }
                }
            }
        }
        let cells: SmallVec<[usize; 16]> = self.fleet_to_base(ins, new_fleet, new_cell).collect();
        for bc in cells {
            self.parked_at_cell.entry(bc).or_default().push(agent);
        }
    }
}
