//! Priority-inheritance push generator.
//!
//! One [`Generator`] call turns a source configuration plus a partial set of
//! hard constraints into a complete, jointly conflict-free successor
//! configuration — or reports failure, which the high-level search treats
//! as a dead end rather than an error.
//!
//! # Phases of one call
//!
//! 1. Snapshot current footprints into the "now" bitmap; seed a fresh
//!    reservation transiently.
//! 2. Honor hard constraints (footprint + swap checked, phases advanced).
//! 3. Goal-lock pre-pass (mode-gated): agents resting on their goal stay
//!    and become permanent obstacles.
//! 4. Speed-gate pre-pass: mid-crossing agents stay with advanced phase.
//! 5. Priority pass: recursive [`push`](Generator) per remaining agent.
//! 6. Sweep pass: one retry for anyone left unassigned; failure here fails
//!    the call.
//! 7. Targeted bitmap cleanup.
//!
//! # The push
//!
//! An agent wanting an occupied cell recursively pushes the occupants away
//! first.  `keep_out` stops a pushed agent from landing on its pusher's
//! destination, `in_chain` breaks push cycles, and a depth budget bounds the
//! cascade; a blocker smaller than its pusher inherits extra depth
//! (`ceil(cs_pusher / cs_blocker)`) so it can escape the larger footprint.
//! Failed cascades are undone completely: assignments, bitmap marks, and
//! reservation endpoints all roll back to the source configuration.

use std::collections::{HashSet, VecDeque};

use hetmapf_core::{AgentId, FleetId, HetConfig, PlanRng, VertexId};
use hetmapf_scenario::Instance;
use smallvec::SmallVec;
use tracing::debug;

use crate::{lookahead, DistTable, Reservation};

const NO_AGENT: u32 = u32::MAX;
const PUSH_MAX_DEPTH: i32 = 6;
const DIAG_EVERY: u64 = 50_000;

/// A successor configuration under construction.  `None` entries are
/// unassigned; pre-filled entries are hard constraints the generator must
/// honor.
#[derive(Clone, Debug)]
pub struct NextConfig {
    pub positions: Vec<Option<VertexId>>,
    pub kappas: Vec<u32>,
}

impl NextConfig {
    pub fn unassigned(n: usize) -> Self {
        Self { positions: vec![None; n], kappas: vec![0; n] }
    }

    /// Pre-fix one agent's next position (a hard constraint).
    pub fn constrain(&mut self, agent: AgentId, v: VertexId) {
        self.positions[agent.index()] = Some(v);
    }

    #[inline]
    pub fn is_assigned(&self, agent: AgentId) -> bool {
        self.positions[agent.index()].is_some()
    }

    /// Finalize into a [`HetConfig`].
    ///
    /// # Panics
    /// Panics if any agent is unassigned — the generator only reports
    /// success with every entry populated, so this is a programmer bug.
    pub fn into_config(self) -> HetConfig {
        let positions = self
            .positions
            .into_iter()
            .enumerate()
            .map(|(i, p)| p.unwrap_or_else(|| panic!("agent {i} unassigned in successor")))
            .collect();
        HetConfig { positions, kappas: self.kappas }
    }
}

/// Per-call failure stage, for the diagnostic counters.
#[derive(Copy, Clone, PartialEq, Eq)]
enum Stage {
    Ok,
    Constraint,
    Pregate,
    Assign,
}

pub struct Generator {
    rng: PlanRng,
    goal_lock: bool,
    /// Minimum lookahead depth; each agent gets `max(this, cell_size)`.
    bfs_depth: u32,
    /// Base-cell occupancy at the current and the next step, `NO_AGENT` when free.
    base_occupied_now: Vec<u32>,
    base_occupied_next: Vec<u32>,
    /// Last few cells each agent occupied, feeding the oscillation penalty.
    recent_cells: Vec<VecDeque<usize>>,
    // Failure-stage counters; persistent sweep failures signal bad parameters.
    calls: u64,
    ok: u64,
    fail_constraint: u64,
    fail_pregate: u64,
    fail_assign: u64,
}

impl Generator {
    pub fn new(ins: &Instance, rng: PlanRng, goal_lock: bool, bfs_depth: u32) -> Self {
        let base_size = ins.base.width * ins.base.height;
        Self {
            rng,
            goal_lock,
            bfs_depth: bfs_depth.max(2),
            base_occupied_now: vec![NO_AGENT; base_size],
            base_occupied_next: vec![NO_AGENT; base_size],
            recent_cells: vec![VecDeque::new(); ins.agent_count()],
            calls: 0,
            ok: 0,
            fail_constraint: 0,
            fail_pregate: 0,
            fail_assign: 0,
        }
    }

    /// Generate a successor for `q_from`, honoring the entries already set
    /// in `q_to`.  On success every entry of `q_to` is populated and the
    /// joint move is free of footprint and swap conflicts.
    pub fn set_new_config(
        &mut self,
        ins: &Instance,
        dist: &DistTable,
        q_from: &HetConfig,
        q_to: &mut NextConfig,
        order: &[AgentId],
    ) -> bool {
        self.calls += 1;
        let stage = self.run_phases(ins, dist, q_from, q_to, order);

        // Targeted cleanup: clear exactly the cells this call marked.
        for i in 0..ins.agent_count() {
            let agent = AgentId(i as u32);
            self.clear_now(ins, agent, q_from.positions[i]);
            if let Some(v) = q_to.positions[i] {
                self.clear_next(ins, agent, v);
            }
        }

        match stage {
            Stage::Ok => self.ok += 1,
            Stage::Constraint => self.fail_constraint += 1,
            Stage::Pregate => self.fail_pregate += 1,
            Stage::Assign => self.fail_assign += 1,
        }
        if self.calls % DIAG_EVERY == 0 {
            debug!(
                calls = self.calls,
                ok = self.ok,
                fail_constraint = self.fail_constraint,
                fail_pregate = self.fail_pregate,
                fail_assign = self.fail_assign,
                "generator stage counters"
            );
        }
        stage == Stage::Ok
    }

    fn run_phases(
        &mut self,
        ins: &Instance,
        dist: &DistTable,
        q_from: &HetConfig,
        q_to: &mut NextConfig,
        order: &[AgentId],
    ) -> Stage {
        let n = ins.agent_count();

        // 1. Occupancy snapshot + transient reservation seed.
        for i in 0..n {
            self.mark_now(ins, AgentId(i as u32), q_from.positions[i]);
        }
        let mut res = Reservation::new(ins);
        res.seed_transient(ins, q_from);

        let goal_locked: Vec<bool> = if self.goal_lock {
            (0..n)
                .map(|i| q_from.positions[i] == ins.goals[i] && q_from.kappas[i] == 0)
                .collect()
        } else {
            vec![false; n]
        };

        // 2. Honor hard constraints.
        for i in 0..n {
            let agent = AgentId(i as u32);
            let Some(target) = q_to.positions[i] else { continue };
            q_to.kappas[i] = phase_rule(
                q_from.kappas[i],
                target != q_from.positions[i],
                ins.speed_period(agent),
            );
            if !self.next_free(ins, agent, target)
                || self.swap_conflict(ins, q_to, agent, q_from.positions[i], target)
            {
                return Stage::Constraint;
            }
            self.mark_next(ins, agent, target);
        }

        // 3. Goal-lock pre-pass: locked agents become permanent obstacles.
        if self.goal_lock {
            for i in 0..n {
                let agent = AgentId(i as u32);
                if q_to.positions[i].is_some() || !goal_locked[i] {
                    continue;
                }
                let stay = q_from.positions[i];
                if !self.next_free(ins, agent, stay) {
                    return Stage::Pregate;
                }
                q_to.positions[i] = Some(stay);
                q_to.kappas[i] = 0;
                self.mark_next(ins, agent, stay);
                let (fleet, cell) = self.fleet_cell(ins, agent, stay);
                res.reserve_stay(ins, agent, fleet, cell, 0, 0);
            }
        }

        // 4. Speed-gate pre-pass: mid-crossing agents must hold in place.
        for i in 0..n {
            let agent = AgentId(i as u32);
            if q_to.positions[i].is_some() || q_from.kappas[i] == 0 {
                continue;
            }
            let stay = q_from.positions[i];
            if !self.next_free(ins, agent, stay) {
                return Stage::Pregate;
            }
            q_to.positions[i] = Some(stay);
            q_to.kappas[i] = (q_from.kappas[i] + 1) % ins.speed_period(agent);
            self.mark_next(ins, agent, stay);
            let (fleet, cell) = self.fleet_cell(ins, agent, stay);
            res.reserve_stay(ins, agent, fleet, cell, 0, 0);
        }

        // 5. Priority pass.
        for &k in order {
            if !q_to.is_assigned(k) {
                let keep_out = HashSet::new();
                let mut in_chain = HashSet::new();
                self.push(
                    ins, dist, q_from, q_to, &mut res, &keep_out, &mut in_chain, &goal_locked,
                    k, PUSH_MAX_DEPTH,
                );
            }
        }

        // 6. Sweep pass: the board changed since the first attempt, so one
        //    retry with fresh push state is worthwhile.
        for i in 0..n {
            let agent = AgentId(i as u32);
            if !q_to.is_assigned(agent) {
                let keep_out = HashSet::new();
                let mut in_chain = HashSet::new();
                self.push(
                    ins, dist, q_from, q_to, &mut res, &keep_out, &mut in_chain, &goal_locked,
                    agent, PUSH_MAX_DEPTH,
                );
                if !q_to.is_assigned(agent) {
                    return Stage::Assign;
                }
            }
        }

        // Remember where everyone ended up, for the oscillation penalty.
        for i in 0..n {
            let agent = AgentId(i as u32);
            if let Some(v) = q_to.positions[i] {
                let (_, cell) = self.fleet_cell(ins, agent, v);
                let recent = &mut self.recent_cells[i];
                recent.push_back(cell);
                if recent.len() > lookahead::RECENT_WINDOW {
                    recent.pop_front();
                }
            }
        }

        Stage::Ok
    }

    // ── Recursive push ────────────────────────────────────────────────────

    #[allow(clippy::too_many_arguments)]
    fn push(
        &mut self,
        ins: &Instance,
        dist: &DistTable,
        q_from: &HetConfig,
        q_to: &mut NextConfig,
        res: &mut Reservation,
        keep_out: &HashSet<usize>,
        in_chain: &mut HashSet<AgentId>,
        goal_locked: &[bool],
        agent: AgentId,
        depth: i32,
    ) -> bool {
        if depth <= 0 || in_chain.contains(&agent) {
            return false;
        }
        if self.goal_lock && goal_locked[agent.index()] {
            return false;
        }

        let i = agent.index();
        let sp = ins.speed_period(agent);
        let cur = q_from.positions[i];
        let (fleet, cur_cell) = self.fleet_cell(ins, agent, cur);

        // Mid-crossing agents can only hold in place.  Normally handled by
        // the pre-pass; this path runs when a cascade reaches one.
        if q_from.kappas[i] > 0 {
            if !self.next_free(ins, agent, cur) {
                return false;
            }
            self.mark_next(ins, agent, cur);
            q_to.positions[i] = Some(cur);
            q_to.kappas[i] = (q_from.kappas[i] + 1) % sp;
            res.reserve_stay(ins, agent, fleet, cur_cell, 0, 0);
            return true;
        }

        in_chain.insert(agent);

        // A failed cascade may have left the endpoint stale; pin it to the
        // agent's real cell before searching.
        res.reset_agent(ins, agent, fleet, cur_cell);
        let cs_i = ins.cell_size(agent);
        let depth_budget = self.bfs_depth.max(cs_i);
        let cands = lookahead::candidates(
            ins,
            dist,
            res,
            agent,
            cur_cell,
            depth_budget,
            &mut self.rng,
            &self.recent_cells[i],
            self.goal_lock.then_some(goal_locked),
        );

        'candidates: for cand in &cands {
            let u = ins
                .fleet(fleet)
                .graph
                .at_index(cand.first_step)
                .expect("lookahead yields passable cells");

            if !self.next_free(ins, agent, u) {
                continue;
            }
            if self.swap_conflict(ins, q_to, agent, cur, u) {
                continue;
            }
            if !keep_out.is_empty() && ins.footprint(agent, u).any(|bc| keep_out.contains(&bc)) {
                continue;
            }

            // Tentative claim — the footprint is deliberately NOT marked
            // yet, so a smaller agent trapped inside this one's footprint
            // can still escape to an adjacent cell during the cascade.
            q_to.positions[i] = Some(u);

            if u != cur {
                let mut blockers: SmallVec<[AgentId; 8]> = SmallVec::new();
                for bc in ins.footprint(agent, u) {
                    let j = self.base_occupied_now[bc];
                    if j != NO_AGENT && j != agent.0 {
                        let j = AgentId(j);
                        if !q_to.is_assigned(j) && !blockers.contains(&j) {
                            blockers.push(j);
                        }
                    }
                }
                blockers.sort_unstable();

                if !blockers.is_empty() {
                    let mut new_keep_out = keep_out.clone();
                    new_keep_out.extend(ins.footprint(agent, u));
                    let saved_chain = in_chain.clone();
                    let unassigned_before: Vec<AgentId> = (0..ins.agent_count() as u32)
                        .map(AgentId)
                        .filter(|&a| !q_to.is_assigned(a))
                        .collect();

                    let mut all_pushed = true;
                    for &j in &blockers {
                        if q_to.is_assigned(j) {
                            continue; // moved by an earlier sub-cascade
                        }
                        let cs_j = ins.cell_size(j);
                        let mut sub_depth = depth - 1;
                        if cs_i > cs_j {
                            // A small blocker needs enough lookahead to walk
                            // clear of a big pusher's footprint.
                            sub_depth = sub_depth.max(cs_i.div_ceil(cs_j) as i32);
                        }
                        if !self.push(
                            ins, dist, q_from, q_to, res, &new_keep_out, in_chain, goal_locked,
                            j, sub_depth,
                        ) {
                            all_pushed = false;
                            break;
                        }
                        if let Some(vj) = q_to.positions[j.index()] {
                            new_keep_out.extend(ins.footprint(j, vj));
                        }
                    }

                    // A sub-cascade may have refilled the target.
                    if all_pushed && !self.next_free(ins, agent, u) {
                        all_pushed = false;
                    }

                    if !all_pushed {
                        for &a in &unassigned_before {
                            if let Some(va) = q_to.positions[a.index()] {
                                self.clear_next(ins, a, va);
                                q_to.positions[a.index()] = None;
                                let (fa, ca) = self.fleet_cell(ins, a, q_from.positions[a.index()]);
                                res.reset_agent(ins, a, fa, ca);
                            }
                        }
                        debug_assert!(
                            unassigned_before.iter().all(|&a| {
                                let (_, ca) = self.fleet_cell(ins, a, q_from.positions[a.index()]);
                                res.endpoint(a).cell == ca
                            }),
                            "undone agent endpoint not at source cell"
                        );
                        *in_chain = saved_chain;
                        q_to.positions[i] = None;
                        continue 'candidates;
                    }
                }
            }

            self.mark_next(ins, agent, u);
            res.reserve_path(ins, agent, fleet, 0, &cand.path);
            q_to.kappas[i] = phase_rule(0, u != cur, sp);
            return true;
        }

        // Exhausted — step out of the chain so the caller can try other
        // candidates, and at least try to hold position.
        in_chain.remove(&agent);
        if self.next_free(ins, agent, cur) {
            self.mark_next(ins, agent, cur);
            q_to.positions[i] = Some(cur);
            q_to.kappas[i] = 0;
        }
        false
    }

    // ── Bitmap helpers ────────────────────────────────────────────────────

    fn mark_now(&mut self, ins: &Instance, agent: AgentId, v: VertexId) {
        for bc in ins.footprint(agent, v) {
            self.base_occupied_now[bc] = agent.0;
        }
    }

    fn clear_now(&mut self, ins: &Instance, agent: AgentId, v: VertexId) {
        for bc in ins.footprint(agent, v) {
            if self.base_occupied_now[bc] == agent.0 {
                self.base_occupied_now[bc] = NO_AGENT;
            }
        }
    }

    fn mark_next(&mut self, ins: &Instance, agent: AgentId, v: VertexId) {
        for bc in ins.footprint(agent, v) {
            self.base_occupied_next[bc] = agent.0;
        }
    }

    fn clear_next(&mut self, ins: &Instance, agent: AgentId, v: VertexId) {
        for bc in ins.footprint(agent, v) {
            if self.base_occupied_next[bc] == agent.0 {
                self.base_occupied_next[bc] = NO_AGENT;
            }
        }
    }

    fn next_free(&self, ins: &Instance, agent: AgentId, v: VertexId) -> bool {
        ins.footprint(agent, v).all(|bc| {
            let owner = self.base_occupied_next[bc];
            owner == NO_AGENT || owner == agent.0
        })
    }

    /// Does `agent` moving `from → to` exchange footprint cells with any
    /// already-assigned agent?
    fn swap_conflict(
        &self,
        ins: &Instance,
        q_to: &NextConfig,
        agent: AgentId,
        from: VertexId,
        to: VertexId,
    ) -> bool {
        let from_cells: SmallVec<[usize; 16]> = ins.footprint(agent, from).collect();

        let mut at_target: SmallVec<[AgentId; 8]> = SmallVec::new();
        for bc in ins.footprint(agent, to) {
            let j = self.base_occupied_now[bc];
            if j != NO_AGENT && j != agent.0 && !at_target.contains(&AgentId(j)) {
                at_target.push(AgentId(j));
            }
        }

        for j in at_target {
            let Some(vj) = q_to.positions[j.index()] else { continue };
            if ins.footprint(j, vj).any(|bc| from_cells.contains(&bc)) {
                return true;
            }
        }
        false
    }

    #[inline]
    fn fleet_cell(&self, ins: &Instance, agent: AgentId, v: VertexId) -> (FleetId, usize) {
        let fleet = ins.agents[agent.index()].fleet;
        (fleet, ins.fleet(fleet).graph.vertex(v).index)
    }
}

/// Speed-phase transition for an assigned agent.
///
/// - mid-crossing (`kappa > 0`): the counter keeps ticking, wrapping at the
///   speed period;
/// - starting a move on a slow fleet: the counter arms at 1;
/// - otherwise the agent is at rest at phase 0.
#[inline]
pub(crate) fn phase_rule(kappa_from: u32, moved: bool, speed_period: u32) -> u32 {
    if kappa_from > 0 {
        (kappa_from + 1) % speed_period
    } else if moved && speed_period > 1 {
        1
    } else {
        0
    }
}
