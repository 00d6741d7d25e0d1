//! Plan metrics and the feasibility checker.
//!
//! A [`Solution`] is the sequence of committed joint configurations, one per
//! wall-clock tick, starting at the instance's start configuration.

use std::collections::HashSet;

use hetmapf_core::{AgentId, HetConfig};
use hetmapf_pibt::DistTable;
use hetmapf_scenario::Instance;

use crate::{SearchError, SearchResult};

/// Joint configurations per timestep.
pub type Solution = Vec<HetConfig>;

/// Timesteps in the plan (0 for trivial or empty plans).
pub fn makespan(solution: &Solution) -> usize {
    solution.len().saturating_sub(1)
}

/// Single-agent cost: the last timestep at which the agent was not yet
/// settled on its goal.
pub fn path_cost(ins: &Instance, solution: &Solution, agent: AgentId) -> usize {
    let goal = ins.goals[agent.index()];
    solution
        .iter()
        .enumerate()
        .rev()
        .find(|(_, c)| c.positions[agent.index()] != goal || c.kappas[agent.index()] != 0)
        .map(|(t, _)| t + 1)
        .unwrap_or(0)
}

/// Sum of per-agent path costs.
pub fn sum_of_costs(ins: &Instance, solution: &Solution) -> usize {
    (0..ins.agent_count())
        .map(|i| path_cost(ins, solution, AgentId(i as u32)))
        .sum()
}

/// Total loss: one per agent per transition where the agent is away from
/// its settled goal at either end — the quantity the search's edge cost
/// accumulates.  Unlike [`path_cost`], an agent that leaves its goal and
/// comes back pays for the excursion but not for the settled stretch
/// before it.
pub fn sum_of_loss(ins: &Instance, solution: &Solution) -> u64 {
    let mut loss = 0;
    for pair in solution.windows(2) {
        let (from, to) = (&pair[0], &pair[1]);
        for i in 0..ins.agent_count() {
            let goal = ins.goals[i];
            let settled_before = from.positions[i] == goal && from.kappas[i] == 0;
            let settled_after = to.positions[i] == goal && to.kappas[i] == 0;
            if !settled_before || !settled_after {
                loss += 1;
            }
        }
    }
    loss
}

/// Largest single-agent lower bound: distance in fleet steps times the
/// fleet's speed period.
pub fn makespan_lower_bound(ins: &Instance, dist: &DistTable) -> u64 {
    (0..ins.agent_count())
        .map(|i| {
            let agent = AgentId(i as u32);
            dist.get(agent, ins.starts[i]) as u64 * ins.speed_period(agent) as u64
        })
        .max()
        .unwrap_or(0)
}

/// Sum of the per-agent lower bounds.
pub fn sum_of_costs_lower_bound(ins: &Instance, dist: &DistTable) -> u64 {
    (0..ins.agent_count())
        .map(|i| {
            let agent = AgentId(i as u32);
            dist.get(agent, ins.starts[i]) as u64 * ins.speed_period(agent) as u64
        })
        .sum()
}

/// Check every joint-motion invariant over a finished plan:
///
/// - starts at the instance's start configuration,
/// - every move is to the same cell or a fleet-graph neighbor,
/// - footprints stay pairwise disjoint at every timestep,
/// - no two agents exchange footprint cells across a step,
/// - speed phases follow the phase rule,
/// - the final configuration is the goal.
pub fn validate_solution(ins: &Instance, solution: &Solution) -> SearchResult<()> {
    let fail = |msg: String| Err(SearchError::Infeasible(msg));

    let Some(first) = solution.first() else {
        return fail("empty solution".into());
    };
    if *first != ins.start_config() {
        return fail("solution does not start at the start configuration".into());
    }

    for (t, config) in solution.iter().enumerate() {
        let mut seen: HashSet<usize> = HashSet::new();
        for i in 0..ins.agent_count() {
            let agent = AgentId(i as u32);
            for bc in ins.footprint(agent, config.positions[i]) {
                if !seen.insert(bc) {
                    return fail(format!("footprint overlap at t={t}, base cell {bc}"));
                }
            }
        }
    }

    for (t, pair) in solution.windows(2).enumerate() {
        let (from, to) = (&pair[0], &pair[1]);
        for i in 0..ins.agent_count() {
            let agent = AgentId(i as u32);
            let (a, b) = (from.positions[i], to.positions[i]);
            if a != b && !ins.fleet_graph(agent).neighbors(a).contains(&b) {
                return fail(format!("agent {i} teleports at t={t}"));
            }

            let sp = ins.speed_period(agent);
            let expected = if from.kappas[i] > 0 {
                (from.kappas[i] + 1) % sp
            } else if a != b && sp > 1 {
                1
            } else {
                0
            };
            if to.kappas[i] != expected {
                return fail(format!(
                    "agent {i} phase {} at t={} (expected {expected})",
                    to.kappas[i],
                    t + 1
                ));
            }
            if from.kappas[i] > 0 && a != b {
                return fail(format!("agent {i} moved mid-crossing at t={t}"));
            }
        }

        for i in 0..ins.agent_count() {
            for j in i + 1..ins.agent_count() {
                let (ai, aj) = (AgentId(i as u32), AgentId(j as u32));
                let fi: HashSet<usize> = ins.footprint(ai, from.positions[i]).collect();
                let fj: HashSet<usize> = ins.footprint(aj, from.positions[j]).collect();
                let i_into_j = ins.footprint(ai, to.positions[i]).any(|bc| fj.contains(&bc));
                let j_into_i = ins.footprint(aj, to.positions[j]).any(|bc| fi.contains(&bc));
                if i_into_j && j_into_i {
                    return fail(format!("agents {i} and {j} swap at t={t}"));
                }
            }
        }
    }

    let last = solution.last().expect("checked non-empty");
    if !ins.is_goal(last) {
        return fail("solution does not end at the goal configuration".into());
    }
    Ok(())
}
