//! High-level search nodes and the low-level constraint enumerator.
//!
//! Nodes live in an arena (`Vec<HNode>` indexed by [`HNodeId`]) owned by the
//! planner.  Parent pointers are re-assigned when the cost-relaxation sweep
//! finds a cheaper route to a node, so `parent` is a *hint*: step extraction
//! falls back to a BFS over the bidirectional `neighbors` edges whenever the
//! hint chain does not terminate at the current root.

use std::collections::{HashSet, VecDeque};

use hetmapf_core::{AgentId, HetConfig, PlanRng, VertexId};
use hetmapf_pibt::DistTable;
use hetmapf_scenario::Instance;

/// Arena index of a high-level node.
#[derive(Copy, Clone, PartialEq, Eq, Hash, Debug)]
pub struct HNodeId(pub u32);

impl HNodeId {
    #[inline]
    pub fn index(self) -> usize {
        self.0 as usize
    }
}

/// A partial constraint: the first `depth` agents of the owning node's
/// `order` have their next cells fixed.
#[derive(Clone, Debug, Default)]
pub struct ConstraintNode {
    pub depth: usize,
    pub who: Vec<AgentId>,
    pub targets: Vec<VertexId>,
}

impl ConstraintNode {
    fn child(&self, agent: AgentId, target: VertexId) -> Self {
        let mut who = self.who.clone();
        let mut targets = self.targets.clone();
        who.push(agent);
        targets.push(target);
        Self { depth: self.depth + 1, who, targets }
    }
}

/// A high-level search node: one joint configuration plus search metadata.
pub struct HNode {
    pub config: HetConfig,
    /// Quick-extraction hint; may be rewritten by cost relaxation.
    pub parent: Option<HNodeId>,
    /// Bidirectional search-graph edges (parent, children, rediscoveries).
    pub neighbors: Vec<HNodeId>,
    pub g: u64,
    pub h: u64,
    pub f: u64,
    /// PIBT-style dynamic priority per agent.
    pub priorities: Vec<f32>,
    /// Agents sorted by priority descending, ties broken by id.
    pub order: Vec<AgentId>,
    /// Pending partial constraints, expanded lazily FIFO.
    queue: VecDeque<ConstraintNode>,
}

impl HNode {
    pub fn new(
        config: HetConfig,
        ins: &Instance,
        dist: &DistTable,
        parent: Option<(&HNode, HNodeId)>,
        g: u64,
        h: u64,
    ) -> Self {
        let n = config.len();

        let priorities: Vec<f32> = match parent {
            None => (0..n)
                .map(|i| {
                    let agent = AgentId(i as u32);
                    let d = dist.get(agent, config.positions[i]);
                    let sp = ins.speed_period(agent);
                    (d * sp + config.kappas[i]) as f32 / 10_000.0
                })
                .collect(),
            Some((p, _)) => (0..n)
                .map(|i| {
                    let agent = AgentId(i as u32);
                    let away = dist.get(agent, config.positions[i]) != 0 || config.kappas[i] != 0;
                    if away {
                        p.priorities[i] + 1.0
                    } else {
                        p.priorities[i].fract()
                    }
                })
                .collect(),
        };

        let mut order: Vec<AgentId> = (0..n as u32).map(AgentId).collect();
        order.sort_by(|&a, &b| {
            priorities[b.index()]
                .partial_cmp(&priorities[a.index()])
                .unwrap_or(std::cmp::Ordering::Equal)
                .then(a.cmp(&b))
        });

        let mut queue = VecDeque::new();
        queue.push_back(ConstraintNode::default());

        Self {
            config,
            parent: parent.map(|(_, id)| id),
            neighbors: Vec::new(),
            g,
            h,
            f: g + h,
            priorities,
            order,
            queue,
        }
    }

    /// Number of partial constraints still pending.
    pub fn pending_constraints(&self) -> usize {
        self.queue.len()
    }

    /// Pop the next partial constraint and lazily enqueue its children,
    /// geometrically pruned: a child is only viable if the newly fixed
    /// agent's footprint avoids every cell already committed by the
    /// constraint — including the footprints of unconstrained speed-gated
    /// agents, which are guaranteed to stay put.
    ///
    /// Returns `None` once this node's constraint tree is exhausted.
    pub fn pop_constraint(&mut self, ins: &Instance, rng: &mut PlanRng) -> Option<ConstraintNode> {
        let constraint = self.queue.pop_front()?;
        let n = self.config.len();
        if constraint.depth >= n {
            return Some(constraint);
        }

        let i = self.order[constraint.depth];

        let mut occupied: HashSet<usize> = HashSet::new();
        let constrained: HashSet<AgentId> = constraint.who.iter().copied().collect();
        for (&who, &target) in constraint.who.iter().zip(&constraint.targets) {
            occupied.extend(ins.footprint(who, target));
        }
        for a in 0..n {
            let agent = AgentId(a as u32);
            if agent == i || constrained.contains(&agent) || self.config.kappas[a] == 0 {
                continue;
            }
            occupied.extend(ins.footprint(agent, self.config.positions[a]));
        }

        let cur = self.config.positions[i.index()];
        let free = |v: VertexId| ins.footprint(i, v).all(|bc| !occupied.contains(&bc));

        if self.config.kappas[i.index()] > 0 {
            // Mid-crossing: staying is the only legal move.
            if free(cur) {
                self.queue.push_back(constraint.child(i, cur));
            }
        } else {
            let mut cands: Vec<VertexId> = ins.fleet_graph(i).neighbors(cur).to_vec();
            cands.push(cur);
            rng.shuffle(&mut cands);
            for v in cands {
                if free(v) {
                    self.queue.push_back(constraint.child(i, v));
                }
            }
        }

        Some(constraint)
    }
}
