//! `hetmapf-pibt` — the low-level configuration generator.
//!
//! Given a source configuration and a partial set of hard constraints, the
//! [`Generator`] synthesizes a jointly conflict-free successor configuration
//! via priority-inheritance pushing.  Three supporting structures feed it:
//!
//! - [`DistTable`]: per-agent BFS distances to the goal on that agent's
//!   fleet graph (built once, read-only afterwards),
//! - [`Reservation`]: a space-time table created fresh for every generator
//!   call, arbitrating footprint and swap conflicts across fleets,
//! - [`lookahead`]: a bounded best-first search on the (time, fleet-cell)
//!   product graph that ranks candidate first steps for one agent.

pub mod lookahead;

mod dist;
mod generator;
mod reservation;

#[cfg(test)]
mod tests;

pub use dist::DistTable;
pub use generator::{Generator, NextConfig};
pub use lookahead::CandidatePath;
pub use reservation::{Endpoint, Reservation};
