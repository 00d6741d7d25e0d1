//! Deterministic RNG wrapper for the planner.
//!
//! # Determinism strategy
//!
//! Everything random in the planner (candidate shuffles, tie-breakers,
//! random OPEN-list inserts) draws from a `PlanRng` seeded from the run
//! seed.  Independent consumers (e.g. the k competing push generators) get
//! their own child RNGs via [`PlanRng::child`]:
//!
//!   child_seed = next_u64() XOR offset * MIXING_CONSTANT
//!
//! The mixing constant is the 64-bit fractional part of the golden ratio,
//! which spreads consecutive offsets uniformly across the seed space.  Same
//! run seed, same instance, same parameters ⇒ same plan.

use rand::rngs::SmallRng;
use rand::{Rng, SeedableRng};

/// 64-bit fractional golden-ratio constant for seed mixing.
const MIXING_CONSTANT: u64 = 0x9e37_79b9_7f4a_7c15;

/// Seeded RNG owned by one planner component.
///
/// The type is `!Sync` to prevent accidental sharing across threads — each
/// parallel push-generator instance must hold its own.
pub struct PlanRng(SmallRng);

impl PlanRng {
    pub fn new(seed: u64) -> Self {
        PlanRng(SmallRng::seed_from_u64(seed))
    }

    /// Derive a child `PlanRng` with a different seed offset — used to seed
    /// the competing push-generator instances deterministically.
    pub fn child(&mut self, offset: u64) -> PlanRng {
        let child_seed: u64 = self.0.gen::<u64>() ^ offset.wrapping_mul(MIXING_CONSTANT);
        PlanRng(SmallRng::seed_from_u64(child_seed))
    }

    /// Uniform `f32` in `[0, 1)` — the tie-breaker draw.
    #[inline]
    pub fn next_f32(&mut self) -> f32 {
        self.0.gen()
    }

    /// Generate a value uniformly in `range`.
    #[inline]
    pub fn gen_range<T, R>(&mut self, range: R) -> T
    where
        T: rand::distributions::uniform::SampleUniform,
        R: rand::distributions::uniform::SampleRange<T>,
    {
        self.0.gen_range(range)
    }

    /// `true` with probability `p` (clamped to [0, 1]).
    #[inline]
    pub fn gen_bool(&mut self, p: f64) -> bool {
        self.0.gen_bool(p.clamp(0.0, 1.0))
    }

    /// Shuffle a mutable slice in-place (Fisher-Yates).
    #[inline]
    pub fn shuffle<T>(&mut self, slice: &mut [T]) {
        use rand::seq::SliceRandom;
        slice.shuffle(&mut self.0);
    }
}
