//! Planner configuration.
//!
//! One value object instead of process-wide flags; changes take effect per
//! planner construction.

use std::time::Duration;

/// Knobs for [`Planner`](crate::Planner).
///
/// | Field                    | Default | Effect                                    |
/// |--------------------------|---------|-------------------------------------------|
/// | `anytime`                | `true`  | keep improving after the first plan       |
/// | `goal_lock`              | `false` | agents at goal become immovable           |
/// | `pibt_instances`         | `1`     | competing generators per successor        |
/// | `multi_threaded_pibt`    | `false` | run the competing generators on Rayon     |
/// | `random_insert_prob1`    | `0.0`   | chance to re-insert the root on rediscovery |
/// | `random_insert_prob2`    | `0.0`   | chance to expand a random OPEN node       |
/// | `checkpoint_interval_ms` | `5000`  | best-f recording cadence                  |
/// | `bfs_depth`              | `2`     | lookahead floor (each agent gets at least its cell size) |
#[derive(Clone, Debug)]
pub struct PlannerConfig {
    pub seed: u64,
    /// Wall-clock budget; `None` runs until OPEN exhausts.
    pub time_limit: Option<Duration>,
    pub anytime: bool,
    pub goal_lock: bool,
    pub pibt_instances: usize,
    pub multi_threaded_pibt: bool,
    pub random_insert_prob1: f64,
    pub random_insert_prob2: f64,
    pub checkpoint_interval_ms: u64,
    pub bfs_depth: u32,
}

impl Default for PlannerConfig {
    fn default() -> Self {
        Self {
            seed: 0,
            time_limit: None,
            anytime: true,
            goal_lock: false,
            pibt_instances: 1,
            multi_threaded_pibt: false,
            random_insert_prob1: 0.0,
            random_insert_prob2: 0.0,
            checkpoint_interval_ms: 5000,
            bfs_depth: 2,
        }
    }
}

impl PlannerConfig {
    /// Convenience: default knobs with a fixed seed.
    pub fn with_seed(seed: u64) -> Self {
        Self { seed, ..Self::default() }
    }
}
