//! `hetmapf-core` — foundational types for the `hetmapf` planner workspace.
//!
//! This crate is a dependency of every other `hetmapf-*` crate.  It
//! intentionally has no `hetmapf-*` dependencies and minimal external ones
//! (only `rand` and `thiserror`, plus optional `serde`).
//!
//! # What lives here
//!
//! | Module       | Contents                                               |
//! |--------------|--------------------------------------------------------|
//! | [`ids`]      | `AgentId`, `FleetId`, `VertexId`                       |
//! | [`state`]    | `HetConfig` (joint positions + speed phases)           |
//! | [`rng`]      | `PlanRng` (seeded, deterministic)                      |
//! | [`timing`]   | `Deadline`                                             |
//! | [`error`]    | `CoreError`, `CoreResult`                              |
//!
//! # Feature flags
//!
//! | Flag    | Effect                                                      |
//! |---------|-------------------------------------------------------------|
//! | `serde` | Adds `Serialize`/`Deserialize` to the public value types.   |

pub mod error;
pub mod ids;
pub mod rng;
pub mod state;
pub mod timing;


// ── Re-exports ────────────────────────────────────────────────────────────────

pub use error::{CoreError, CoreResult};
pub use ids::{AgentId, FleetId, VertexId};
pub use rng::PlanRng;
pub use state::HetConfig;
pub use timing::Deadline;
