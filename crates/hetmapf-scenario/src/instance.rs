//! The [`Instance`] type and its programmatic builder.

use hetmapf_core::{AgentId, CoreError, CoreResult, FleetId, HetConfig, VertexId};
use hetmapf_grid::{footprint, Graph};
use tracing::debug;

use crate::{ScenarioError, ScenarioResult};

/// One fleet: every agent of a fleet shares a footprint size, a speed
/// period, and a planning graph.
pub struct Fleet {
    /// Footprint side length in base cells (1 = unit agent).
    pub cell_size: u32,
    /// Wall-clock ticks per fleet-graph step (the kappa modulus).
    pub speed_period: u32,
    /// The tiled planning graph this fleet moves on.
    pub graph: Graph,
}

/// Immutable per-agent metadata.
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub struct AgentSpec {
    pub fleet: FleetId,
    pub cell_size: u32,
}

/// A complete planning problem: base grid, fleets, agents, starts, goals.
///
/// Invariants after [`Instance::validate`] passes: every start and goal is a
/// real vertex of its agent's fleet graph, and neither the start nor the
/// goal footprints overlap pairwise on the base grid.
pub struct Instance {
    pub base: Graph,
    pub fleets: Vec<Fleet>,
    pub agents: Vec<AgentSpec>,
    /// Start vertex per agent, on that agent's fleet graph.
    pub starts: Vec<VertexId>,
    /// Goal vertex per agent, on that agent's fleet graph.
    pub goals: Vec<VertexId>,
}

impl Instance {
    // ── Accessors ─────────────────────────────────────────────────────────

    #[inline]
    pub fn agent_count(&self) -> usize {
        self.agents.len()
    }

    #[inline]
    pub fn fleet(&self, id: FleetId) -> &Fleet {
        &self.fleets[id.index()]
    }

    #[inline]
    pub fn fleet_of(&self, agent: AgentId) -> &Fleet {
        &self.fleets[self.agents[agent.index()].fleet.index()]
    }

    #[inline]
    pub fn fleet_graph(&self, agent: AgentId) -> &Graph {
        &self.fleet_of(agent).graph
    }

    #[inline]
    pub fn cell_size(&self, agent: AgentId) -> u32 {
        self.agents[agent.index()].cell_size
    }

    #[inline]
    pub fn speed_period(&self, agent: AgentId) -> u32 {
        self.fleet_of(agent).speed_period
    }

    /// Base cells covered by `agent` standing at fleet vertex `v`.
    #[inline]
    pub fn footprint(&self, agent: AgentId, v: VertexId) -> impl Iterator<Item = usize> + '_ {
        let fleet = self.fleet_of(agent);
        footprint::base_cells_of_vertex(&fleet.graph, v, fleet.cell_size, self.base.width)
    }

    /// The joint start configuration, all phases zero.
    pub fn start_config(&self) -> HetConfig {
        HetConfig::at_phase_zero(self.starts.clone())
    }

    /// `true` iff every agent stands on its goal vertex at phase 0.
    pub fn is_goal(&self, config: &HetConfig) -> bool {
        config
            .positions
            .iter()
            .zip(&config.kappas)
            .zip(&self.goals)
            .all(|((&p, &k), &g)| p == g && k == 0)
    }

    // ── Validation ────────────────────────────────────────────────────────

    /// Drop agents whose start or goal could not be resolved to a fleet
    /// vertex (out of range or on a blocked tile).  Returns the number of
    /// agents removed.
    pub fn retain_valid_agents(&mut self) -> usize {
        let before = self.agents.len();
        let keep: Vec<bool> = self
            .starts
            .iter()
            .zip(&self.goals)
            .map(|(&s, &g)| s.is_valid() && g.is_valid())
            .collect();
        let mut it = keep.iter();
        self.agents.retain(|_| *it.next().unwrap());
        let mut it = keep.iter();
        self.starts.retain(|_| *it.next().unwrap());
        let mut it = keep.iter();
        self.goals.retain(|_| *it.next().unwrap());
        let dropped = before - self.agents.len();
        if dropped > 0 {
            debug!(dropped, "removed agents with unresolvable endpoints");
        }
        dropped
    }

    /// Check the instance invariants: resolvable endpoints and pairwise
    /// disjoint start/goal footprints on the base grid.
    pub fn validate(&self) -> CoreResult<()> {
        for i in 0..self.agent_count() {
            let agent = AgentId(i as u32);
            if !self.starts[i].is_valid() {
                return Err(CoreError::MissingStart(agent));
            }
            if !self.goals[i].is_valid() {
                return Err(CoreError::MissingGoal(agent));
            }
        }
        self.check_disjoint(&self.starts, "start")?;
        self.check_disjoint(&self.goals, "goal")?;
        Ok(())
    }

    fn check_disjoint(&self, config: &[VertexId], what: &'static str) -> CoreResult<()> {
        let mut owner: Vec<Option<AgentId>> = vec![None; self.base.width * self.base.height];
        for (i, &v) in config.iter().enumerate() {
            let agent = AgentId(i as u32);
            for bc in self.footprint(agent, v) {
                if let Some(prev) = owner[bc] {
                    return Err(CoreError::FootprintOverlap(prev, agent, bc, what));
                }
                owner[bc] = Some(agent);
            }
        }
        Ok(())
    }
}

// ── InstanceBuilder ───────────────────────────────────────────────────────────

/// Construct an [`Instance`] in code, then call [`build`](Self::build).
///
/// Coordinates passed to [`agent`](Self::agent) are **fleet-graph**
/// coordinates (base coordinates divided by the fleet's cell size).
///
/// # Example
///
/// ```
/// use hetmapf_grid::Graph;
/// use hetmapf_scenario::InstanceBuilder;
///
/// let base = Graph::from_map_str("height 4\nwidth 4\nmap\n....\n....\n....\n....\n").unwrap();
/// let mut b = InstanceBuilder::new(base);
/// let unit = b.fleet(1, 1);
/// b.agent(unit, (0, 0), (3, 3));
/// let ins = b.build().unwrap();
/// assert_eq!(ins.agent_count(), 1);
/// ```
pub struct InstanceBuilder {
    base: Graph,
    fleets: Vec<(u32, u32)>,
    agents: Vec<RawAgent>,
}

struct RawAgent {
    fleet: FleetId,
    start: (usize, usize),
    goal: (usize, usize),
}

impl InstanceBuilder {
    pub fn new(base: Graph) -> Self {
        Self { base, fleets: Vec::new(), agents: Vec::new() }
    }

    /// Declare a fleet and get its id.  Fleets may share cell sizes here;
    /// the scenario loaders never produce that, but the builder does not
    /// forbid it.
    pub fn fleet(&mut self, cell_size: u32, speed_period: u32) -> FleetId {
        let id = FleetId(self.fleets.len() as u16);
        self.fleets.push((cell_size, speed_period.max(1)));
        id
    }

    /// Add an agent with fleet-graph start and goal coordinates.
    pub fn agent(&mut self, fleet: FleetId, start: (usize, usize), goal: (usize, usize)) -> AgentId {
        let id = AgentId(self.agents.len() as u32);
        self.agents.push(RawAgent { fleet, start, goal });
        id
    }

    /// Tile the fleet graphs, resolve every endpoint, and assemble the
    /// instance.  Unresolvable endpoints become `VertexId::INVALID`;
    /// call [`Instance::validate`] to reject them, or
    /// [`Instance::retain_valid_agents`] to drop them.
    pub fn build(self) -> ScenarioResult<Instance> {
        let mut fleets = Vec::with_capacity(self.fleets.len());
        for &(cell_size, speed_period) in &self.fleets {
            fleets.push(Fleet {
                cell_size,
                speed_period,
                graph: Graph::tiled(&self.base, cell_size)?,
            });
        }

        let mut agents = Vec::with_capacity(self.agents.len());
        let mut starts = Vec::with_capacity(self.agents.len());
        let mut goals = Vec::with_capacity(self.agents.len());
        for raw in &self.agents {
            let fleet = fleets
                .get(raw.fleet.index())
                .ok_or(ScenarioError::UnknownFleet(raw.fleet.index()))?;
            agents.push(AgentSpec { fleet: raw.fleet, cell_size: fleet.cell_size });
            starts.push(
                fleet
                    .graph
                    .at(raw.start.0, raw.start.1)
                    .unwrap_or(VertexId::INVALID),
            );
            goals.push(
                fleet
                    .graph
                    .at(raw.goal.0, raw.goal.1)
                    .unwrap_or(VertexId::INVALID),
            );
        }

        Ok(Instance { base: self.base, fleets, agents, starts, goals })
    }
}
