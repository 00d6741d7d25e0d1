//! `hetmapf-grid` — occupancy-grid graphs for heterogeneous fleets.
//!
//! The base grid is the finest occupancy grid and the ground truth for
//! obstacles and collisions.  Each fleet (set of agents sharing a footprint
//! size) plans on a coarser **fleet graph** obtained by non-overlapping
//! tiling of the base grid; [`footprint`] projects fleet cells back down to
//! the base cells they cover, which is how agents on different fleet graphs
//! are checked against each other.

pub mod footprint;
pub mod graph;

mod error;

#[cfg(test)]
mod tests;

pub use error::{GridError, GridResult};
pub use graph::{Graph, Vertex};
