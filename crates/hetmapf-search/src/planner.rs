//! The planner: initialization, the search loop, cost relaxation, and the
//! incremental (commit-one-step) driver.

use std::collections::{HashMap, VecDeque};

use hetmapf_core::{AgentId, Deadline, HetConfig, PlanRng};
use hetmapf_pibt::{DistTable, Generator, NextConfig};
use hetmapf_scenario::Instance;
use rayon::prelude::*;
use tracing::{debug, info};

use crate::node::{ConstraintNode, HNode, HNodeId};
use crate::{PlannerConfig, SearchError, SearchResult, Solution};

/// Outcome of one bounded search call in incremental mode.
#[derive(Copy, Clone, PartialEq, Eq, Debug)]
pub enum SearchStatus {
    /// Budget spent; OPEN still has frontier nodes.
    Searching,
    /// A goal configuration is known (the search may still be improving it).
    GoalFound,
    /// OPEN exhausted without reaching the goal.
    NoSolution,
}

/// Value recorded at a checkpoint when no plan is known yet.
const CHECKPOINT_NIL: i64 = -1;

pub struct Planner<'i> {
    ins: &'i Instance,
    config: PlannerConfig,
    dist: DistTable,
    rng: PlanRng,
    generators: Vec<Generator>,
    deadline: Deadline,

    // Search state.
    nodes: Vec<HNode>,
    open: VecDeque<HNodeId>,
    explored: HashMap<HetConfig, HNodeId>,
    h_init: Option<HNodeId>,
    h_goal: Option<HNodeId>,

    // Incremental state.
    current_root: Option<HNodeId>,
    latest_generated: Option<HNodeId>,
    search_initialized: bool,

    // Statistics.
    iterations: u64,
    initial_solution_ms: Option<u64>,
    initial_solution_cost: Option<u64>,
    checkpoints: Vec<i64>,
}

impl<'i> Planner<'i> {
    /// Validate the instance, build the distance oracle, and refuse to run
    /// if any agent cannot reach its goal on its own fleet graph.
    pub fn new(ins: &'i Instance, config: PlannerConfig) -> SearchResult<Self> {
        ins.validate()?;

        let dist = DistTable::build(ins);
        for i in 0..ins.agent_count() {
            let agent = AgentId(i as u32);
            if !dist.reachable(agent, ins.starts[i]) {
                return Err(SearchError::Invalid(
                    hetmapf_core::CoreError::UnreachableGoal(agent),
                ));
            }
        }

        let mut rng = PlanRng::new(config.seed);
        let generators = (0..config.pibt_instances.max(1))
            .map(|k| Generator::new(ins, rng.child(k as u64), config.goal_lock, config.bfs_depth))
            .collect();

        let deadline = match config.time_limit {
            Some(limit) => Deadline::after(limit),
            None => Deadline::none(),
        };

        Ok(Self {
            ins,
            dist,
            rng,
            generators,
            deadline,
            config,
            nodes: Vec::new(),
            open: VecDeque::new(),
            explored: HashMap::new(),
            h_init: None,
            h_goal: None,
            current_root: None,
            latest_generated: None,
            search_initialized: false,
            iterations: 0,
            initial_solution_ms: None,
            initial_solution_cost: None,
            checkpoints: Vec::new(),
        })
    }

    // ── Statistics accessors ──────────────────────────────────────────────

    pub fn node_count(&self) -> usize {
        self.nodes.len()
    }

    /// Milliseconds since the planner was constructed.
    pub fn elapsed_ms(&self) -> u64 {
        self.deadline.elapsed_ms()
    }

    /// The configured wall-clock budget, if any.
    pub fn time_limit_ms(&self) -> Option<u64> {
        self.config.time_limit.map(|d| d.as_millis() as u64)
    }

    pub fn iterations(&self) -> u64 {
        self.iterations
    }

    /// Cost of the best known plan, if any.
    pub fn goal_cost(&self) -> Option<u64> {
        self.h_goal.map(|h| self.nodes[h.index()].g)
    }

    pub fn initial_solution_ms(&self) -> Option<u64> {
        self.initial_solution_ms
    }

    pub fn initial_solution_cost(&self) -> Option<u64> {
        self.initial_solution_cost
    }

    /// Best known goal `f` at each checkpoint interval (-1 before the first
    /// plan).
    pub fn checkpoints(&self) -> &[i64] {
        &self.checkpoints
    }

    // ── Full-horizon solve ────────────────────────────────────────────────

    /// Search until goal (non-anytime), OPEN exhaustion, or the deadline,
    /// then backtrack the best plan.  Empty when no plan was found.
    pub fn solve(&mut self) -> Solution {
        info!(agents = self.ins.agent_count(), "search start");
        self.run(u64::MAX);
        self.update_checkpoints();

        match (self.h_goal, self.open.is_empty()) {
            (Some(h), true) => {
                info!(cost = self.nodes[h.index()].g, "solved optimally within the search tree")
            }
            (Some(h), false) => info!(cost = self.nodes[h.index()].g, "solved sub-optimally"),
            (None, true) => info!("no solution"),
            (None, false) => info!("timeout"),
        }
        debug!(
            iterations = self.iterations,
            nodes = self.nodes.len(),
            explored = self.explored.len(),
            "search stats"
        );

        self.backtrack(self.h_goal)
    }

    // ── Incremental driving ───────────────────────────────────────────────

    /// Run at most `budget` iterations (also bounded by the deadline and
    /// OPEN) and report where the search stands.
    pub fn search(&mut self, budget: u64) -> SearchStatus {
        self.run(budget);
        if self.h_goal.is_some() {
            SearchStatus::GoalFound
        } else if self.open.is_empty() {
            SearchStatus::NoSolution
        } else {
            SearchStatus::Searching
        }
    }

    /// The next configuration to commit, stepping from the current root
    /// toward the best known node.
    ///
    /// Prefers the parent-hint chain; if cost relaxation broke it, falls
    /// back to a BFS over the bidirectional neighbor edges.  When neither
    /// yields a forward step, stay in place.
    pub fn extract_next_step(&self) -> HetConfig {
        let root = self.current_root.expect("search initialized before extraction");
        let target = self.h_goal.or(self.latest_generated).unwrap_or(root);
        if target == root {
            return self.nodes[root.index()].config.clone();
        }

        // Parent-hint walk.
        let mut step = target;
        while let Some(parent) = self.nodes[step.index()].parent {
            if parent == root {
                return self.nodes[step.index()].config.clone();
            }
            step = parent;
        }

        // Neighbor-graph BFS from the root.
        let mut came_from: HashMap<HNodeId, HNodeId> = HashMap::new();
        let mut queue = VecDeque::from([root]);
        came_from.insert(root, root);
        while let Some(n) = queue.pop_front() {
            if n == target {
                let mut step = n;
                while came_from[&step] != root {
                    step = came_from[&step];
                }
                return self.nodes[step.index()].config.clone();
            }
            for &m in &self.nodes[n.index()].neighbors {
                came_from.entry(m).or_insert_with(|| {
                    queue.push_back(m);
                    n
                });
            }
        }

        self.nodes[root.index()].config.clone()
    }

    /// Commit `next` as the new root.  Unknown configurations leave the
    /// root unchanged (the caller chose to stay, which is always legal).
    pub fn advance(&mut self, next: &HetConfig) {
        if let Some(&id) = self.explored.get(next) {
            self.current_root = Some(id);
        }
    }

    /// One incremental step: search under `budget`, extract, commit.
    pub fn solve_one_step(&mut self, budget: u64) -> HetConfig {
        self.search(budget);
        let next = self.extract_next_step();
        self.advance(&next);
        next
    }

    /// Drop all search state; the next call starts from the instance's
    /// start configuration again.
    pub fn reset(&mut self) {
        self.nodes.clear();
        self.open.clear();
        self.explored.clear();
        self.h_init = None;
        self.h_goal = None;
        self.current_root = None;
        self.latest_generated = None;
        self.search_initialized = false;
        self.iterations = 0;
        self.initial_solution_ms = None;
        self.initial_solution_cost = None;
        self.checkpoints.clear();
    }

    // ── Search loop ───────────────────────────────────────────────────────

    fn ensure_initialized(&mut self) {
        if self.search_initialized {
            return;
        }
        let start = self.ins.start_config();
        let root = self.create_node(start, None);
        self.open.push_front(root);
        self.h_init = Some(root);
        self.current_root = Some(root);
        self.latest_generated = Some(root);
        self.search_initialized = true;
    }

    fn run(&mut self, budget: u64) {
        self.ensure_initialized();

        let mut spent = 0u64;
        while !self.open.is_empty() && !self.deadline.is_expired() && spent < budget {
            self.iterations += 1;
            spent += 1;
            self.update_checkpoints();

            let mut h = *self.open.front().expect("loop guard");

            // Diversification: occasionally work on a random frontier node
            // once a plan exists.
            if self.h_goal.is_some()
                && self.config.random_insert_prob2 > 0.0
                && self.rng.gen_bool(self.config.random_insert_prob2)
            {
                let idx = self.rng.gen_range(0..self.open.len());
                h = self.open[idx];
            }

            // Prune against the best known plan.
            if let Some(goal) = self.h_goal {
                if self.nodes[h.index()].f >= self.nodes[goal.index()].f {
                    self.open.pop_front();
                    continue;
                }
            }

            // Goal check.
            if self.h_goal.is_none() && self.ins.is_goal(&self.nodes[h.index()].config) {
                self.h_goal = Some(h);
                self.latest_generated = Some(h);
                self.initial_solution_ms = Some(self.deadline.elapsed_ms());
                self.initial_solution_cost = Some(self.nodes[h.index()].g);
                info!(cost = self.nodes[h.index()].g, "initial solution");
                if !self.config.anytime {
                    return;
                }
                continue;
            }

            // Next partial constraint for this node.
            let Some(constraint) = self.nodes[h.index()].pop_constraint(self.ins, &mut self.rng)
            else {
                self.open.pop_front();
                continue;
            };

            // Successor construction (a failed push is a dead end, not an error).
            let Some(successor) = self.generate(h, &constraint) else {
                continue;
            };

            match self.explored.get(&successor) {
                Some(&known) => {
                    self.rewrite(h, known);
                    self.latest_generated = Some(known);
                    let reinsert_root = self.config.random_insert_prob1 > 0.0
                        && self.rng.gen_bool(self.config.random_insert_prob1);
                    if reinsert_root {
                        self.open.push_front(self.h_init.expect("initialized"));
                    } else {
                        self.open.push_front(known);
                    }
                }
                None => {
                    let created = self.create_node(successor, Some(h));
                    self.latest_generated = Some(created);
                    self.open.push_front(created);
                }
            }
        }
    }

    /// Run the k competing generators on `(h, constraint)` and keep the
    /// best-`f` successful successor.
    fn generate(&mut self, h: HNodeId, constraint: &ConstraintNode) -> Option<HetConfig> {
        let n = self.ins.agent_count();
        let node = &self.nodes[h.index()];
        let q_from = &node.config;
        let order = node.order.as_slice();
        let ins = self.ins;
        let dist = &self.dist;

        let attempt = |generator: &mut Generator| -> Option<(HetConfig, u64)> {
            let mut q_to = NextConfig::unassigned(n);
            for (&who, &target) in constraint.who.iter().zip(&constraint.targets) {
                q_to.constrain(who, target);
            }
            if !generator.set_new_config(ins, dist, q_from, &mut q_to, order) {
                return None;
            }
            let successor = q_to.into_config();
            let f = edge_cost(ins, q_from, &successor) + heuristic(ins, dist, &successor);
            Some((successor, f))
        };

        let results: Vec<Option<(HetConfig, u64)>> =
            if self.config.multi_threaded_pibt && self.generators.len() > 1 {
                self.generators.par_iter_mut().map(attempt).collect()
            } else {
                self.generators.iter_mut().map(attempt).collect()
            };

        results
            .into_iter()
            .flatten()
            .min_by_key(|&(_, f)| f)
            .map(|(successor, _)| successor)
    }

    /// Re-link `from → to` and relax `g` over the neighbor graph, rewriting
    /// parents wherever a cheaper route appears.  Improved nodes that still
    /// beat the best plan re-enter OPEN.
    fn rewrite(&mut self, from: HNodeId, to: HNodeId) {
        self.add_edge(from, to);

        let mut queue = VecDeque::from([from]);
        while let Some(n) = queue.pop_front() {
            let neighbors = self.nodes[n.index()].neighbors.clone();
            for m in neighbors {
                let candidate_g = {
                    let (node_n, node_m) = (&self.nodes[n.index()], &self.nodes[m.index()]);
                    node_n.g + edge_cost(self.ins, &node_n.config, &node_m.config)
                };
                if candidate_g < self.nodes[m.index()].g {
                    if Some(m) == self.h_goal {
                        debug!(
                            old = self.nodes[m.index()].g,
                            new = candidate_g,
                            "plan cost improved"
                        );
                    }
                    let node_m = &mut self.nodes[m.index()];
                    node_m.g = candidate_g;
                    node_m.f = candidate_g + node_m.h;
                    node_m.parent = Some(n);
                    queue.push_back(m);
                    if let Some(goal) = self.h_goal {
                        if self.nodes[m.index()].f < self.nodes[goal.index()].f {
                            self.open.push_front(m);
                        }
                    }
                }
            }
        }
    }

    fn create_node(&mut self, config: HetConfig, parent: Option<HNodeId>) -> HNodeId {
        let g = match parent {
            Some(p) => {
                let node_p = &self.nodes[p.index()];
                node_p.g + edge_cost(self.ins, &node_p.config, &config)
            }
            None => 0,
        };
        let h = heuristic(self.ins, &self.dist, &config);

        let node = HNode::new(
            config.clone(),
            self.ins,
            &self.dist,
            parent.map(|p| (&self.nodes[p.index()], p)),
            g,
            h,
        );
        let id = HNodeId(self.nodes.len() as u32);
        self.nodes.push(node);
        if let Some(p) = parent {
            self.add_edge(p, id);
        }
        self.explored.insert(config, id);
        id
    }

    fn add_edge(&mut self, a: HNodeId, b: HNodeId) {
        if !self.nodes[a.index()].neighbors.contains(&b) {
            self.nodes[a.index()].neighbors.push(b);
        }
        if !self.nodes[b.index()].neighbors.contains(&a) {
            self.nodes[b.index()].neighbors.push(a);
        }
    }

    fn backtrack(&self, goal: Option<HNodeId>) -> Solution {
        let mut plan = Vec::new();
        let mut cursor = goal;
        while let Some(id) = cursor {
            let node = &self.nodes[id.index()];
            plan.push(node.config.clone());
            cursor = node.parent;
        }
        plan.reverse();
        plan
    }

    fn update_checkpoints(&mut self) {
        let interval = self.config.checkpoint_interval_ms.max(1);
        while self.deadline.elapsed_ms() >= self.checkpoints.len() as u64 * interval {
            let best = self
                .h_goal
                .map(|h| self.nodes[h.index()].f as i64)
                .unwrap_or(CHECKPOINT_NIL);
            self.checkpoints.push(best);
        }
    }
}

// ── Cost model ────────────────────────────────────────────────────────────────

/// Transition cost: one per agent that is away from its goal at either end
/// of the edge.  Agents parked on their goal at phase 0 ride for free.
pub(crate) fn edge_cost(ins: &Instance, c1: &HetConfig, c2: &HetConfig) -> u64 {
    let mut cost = 0;
    for i in 0..ins.agent_count() {
        let goal = ins.goals[i];
        let settled_before = c1.positions[i] == goal && c1.kappas[i] == 0;
        let settled_after = c2.positions[i] == goal && c2.kappas[i] == 0;
        if !settled_before || !settled_after {
            cost += 1;
        }
    }
    cost
}

/// Admissible-ish remaining cost: each fleet step costs a full speed period
/// of wall-clock ticks, and a non-zero phase still owes its remainder.
pub(crate) fn heuristic(ins: &Instance, dist: &DistTable, config: &HetConfig) -> u64 {
    let mut total = 0u64;
    for i in 0..ins.agent_count() {
        let agent = AgentId(i as u32);
        let d = dist.get(agent, config.positions[i]) as u64;
        let sp = ins.speed_period(agent) as u64;
        total += d * sp + config.kappas[i] as u64;
    }
    total
}
