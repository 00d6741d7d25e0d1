//! `hetmapf-scenario` — problem instances for the heterogeneous planner.
//!
//! An [`Instance`] bundles the base grid, one fleet graph per distinct
//! footprint size, and per-agent starts and goals resolved onto the agent's
//! own fleet graph.  Instances come from three places:
//!
//! - [`load_het_scenario`]: the heterogeneous benchmark format (full or
//!   compact records, auto-detected),
//! - [`load_homogeneous`]: classic movingai `.scen` rows, single unit fleet,
//! - [`InstanceBuilder`]: programmatic construction, used heavily in tests.

mod error;
mod instance;
mod loader;


pub use error::{ScenarioError, ScenarioResult};
pub use instance::{AgentSpec, Fleet, Instance, InstanceBuilder};
pub use loader::{
    het_instance_from_str, homogeneous_from_str, load_het_scenario, load_homogeneous,
};
