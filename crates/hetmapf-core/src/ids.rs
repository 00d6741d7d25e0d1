//! Index newtypes for agents, fleets, and graph vertices.
//!
//! The planner stores everything in flat vectors, so an id is just a typed
//! position into one of them.  Wrapping the integers keeps an agent index
//! from being handed to a vertex table (and vice versa) without any runtime
//! cost.  There are deliberately no integer conversions beyond
//! [`index`](AgentId::index): constructing an id means you know which table
//! it points into, so construction stays explicit at the call site.
//!
//! Ids reserve their maximum value as [`INVALID`](AgentId::INVALID), used by
//! the scenario loaders for endpoints that failed to resolve.  `Display`
//! prints the bare number — diagnostics compose it as "agent 3" — while
//! `Debug` keeps the type name.

use std::fmt;

macro_rules! id_type {
    ($name:ident, $repr:ty, $doc:literal) => {
        #[doc = $doc]
        #[derive(Copy, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Debug)]
        #[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
        pub struct $name(pub $repr);

        impl $name {
            /// Reserved "unresolved" marker; never a real index.
            pub const INVALID: Self = Self(<$repr>::MAX);

            /// The position this id names, for vector indexing.
            #[inline]
            pub fn index(self) -> usize {
                self.0 as usize
            }

            /// `false` for the [`INVALID`](Self::INVALID) marker.
            #[inline]
            pub fn is_valid(self) -> bool {
                self.0 != <$repr>::MAX
            }
        }

        impl fmt::Display for $name {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                self.0.fmt(f)
            }
        }
    };
}

id_type!(AgentId, u32, "Position of an agent in the instance's agent list.");
id_type!(
    FleetId,
    u16,
    "One fleet per distinct footprint size.  `u16` keeps per-agent metadata small."
);
id_type!(
    VertexId,
    u32,
    "Dense index of a passable vertex, meaningful only with the graph that issued it."
);
