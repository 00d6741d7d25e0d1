//! Wall-clock deadline for the anytime search.
//!
//! The high-level loop checks the deadline cooperatively at the top of each
//! iteration; an in-flight successor generation always completes before the
//! deadline is rechecked, so expiry never tears a half-built node.

use std::time::{Duration, Instant};

/// A wall-clock budget measured from construction.
///
/// Cheap to copy around; holds no heap data.
#[derive(Clone, Debug)]
pub struct Deadline {
    start: Instant,
    limit: Option<Duration>,
}

impl Deadline {
    /// A deadline that expires `limit` after now.
    pub fn after(limit: Duration) -> Self {
        Self { start: Instant::now(), limit: Some(limit) }
    }

    /// A deadline that never expires (still tracks elapsed time).
    pub fn none() -> Self {
        Self { start: Instant::now(), limit: None }
    }

    /// `true` once the budget is exhausted.  Always `false` for
    /// [`Deadline::none`].
    #[inline]
    pub fn is_expired(&self) -> bool {
        match self.limit {
            Some(limit) => self.start.elapsed() >= limit,
            None => false,
        }
    }

    /// Milliseconds elapsed since construction.
    #[inline]
    pub fn elapsed_ms(&self) -> u64 {
        self.start.elapsed().as_millis() as u64
    }
}

impl Default for Deadline {
    fn default() -> Self {
        Self::none()
    }
}
