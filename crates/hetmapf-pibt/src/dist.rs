//! Per-agent distance oracle.
//!
//! For each agent, one BFS on that agent's fleet graph rooted at the goal.
//! Rows are independent, so construction fans out across a Rayon pool and
//! joins before the planner starts; afterwards the table is read-only and
//! freely shared.

use std::collections::VecDeque;

use hetmapf_core::{AgentId, VertexId};
use hetmapf_scenario::Instance;
use rayon::prelude::*;

/// BFS distance from every fleet-graph vertex to each agent's goal.
///
/// Any stored value `>= |V_fleet|` means "unreachable"; use
/// [`DistTable::reachable`] rather than comparing against a magic number.
pub struct DistTable {
    /// `table[agent][vertex] = distance`, indexed by dense vertex id.
    table: Vec<Vec<u32>>,
}

impl DistTable {
    pub fn build(ins: &Instance) -> Self {
        let table = (0..ins.agent_count())
            .into_par_iter()
            .map(|i| bfs_from_goal(ins, AgentId(i as u32)))
            .collect();
        Self { table }
    }

    /// Distance from `v` to `agent`'s goal, in fleet-graph steps.
    #[inline]
    pub fn get(&self, agent: AgentId, v: VertexId) -> u32 {
        let row = &self.table[agent.index()];
        match row.get(v.index()) {
            Some(&d) => d,
            None => row.len() as u32,
        }
    }

    /// `true` iff `agent` can reach its goal from `v`.
    #[inline]
    pub fn reachable(&self, agent: AgentId, v: VertexId) -> bool {
        let row = &self.table[agent.index()];
        self.get(agent, v) < row.len() as u32
    }
}

fn bfs_from_goal(ins: &Instance, agent: AgentId) -> Vec<u32> {
    let graph = ins.fleet_graph(agent);
    let n = graph.vertex_count();
    // n doubles as the unreachable sentinel.
    let mut dist = vec![n as u32; n];

    let goal = ins.goals[agent.index()];
    if !goal.is_valid() {
        return dist;
    }
    dist[goal.index()] = 0;
    let mut queue = VecDeque::from([goal]);
    while let Some(v) = queue.pop_front() {
        let d = dist[v.index()];
        for &u in graph.neighbors(v) {
            if d + 1 < dist[u.index()] {
                dist[u.index()] = d + 1;
                queue.push_back(u);
            }
        }
    }
    dist
}
