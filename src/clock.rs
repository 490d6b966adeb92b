//! Frame timing: turning raw per-frame callbacks into bounded delta ticks.
//!
//! The presentation loop drives everything from one re-arming callback. The
//! wall-clock gap between two callbacks can be arbitrarily large (tab in the
//! background, debugger pause, window drag), so the clock clamps the delta it
//! hands to the rest of the engine. A scene that integrates `dt` never sees a
//! multi-second jump.

use std::time::{Duration, Instant};

/// Largest frame delta ever reported, regardless of real elapsed time.
pub const MAX_FRAME_DELTA: Duration = Duration::from_millis(200);

/// Delta assumed for the very first tick, before any history exists.
const NOMINAL_FRAME: Duration = Duration::from_micros(16_667);

/// One tick of the presentation loop.
#[derive(Clone, Copy, Debug)]
pub struct FrameTick {
    /// Clamped time since the previous tick, in seconds. Never exceeds 0.2.
    pub delta_seconds: f32,
    /// Monotonic timestamp of this tick.
    pub timestamp: Instant,
}

/// Converts raw per-frame timestamps into [`FrameTick`]s with a bounded delta.
///
/// # Example
///
/// ```
/// use std::time::Instant;
/// use arstage::FrameClock;
///
/// let mut clock = FrameClock::new();
/// let tick = clock.tick(Instant::now());
/// assert!(tick.delta_seconds <= 0.2);
/// ```
pub struct FrameClock {
    last_time: Option<Instant>,
}

impl FrameClock {
    pub fn new() -> Self {
        Self { last_time: None }
    }

    /// Produce the tick for a frame callback arriving at `now`.
    ///
    /// The first call reports a nominal 60 Hz delta. Later calls report the
    /// elapsed time since the previous call, capped at [`MAX_FRAME_DELTA`].
    pub fn tick(&mut self, now: Instant) -> FrameTick {
        let elapsed = match self.last_time {
            Some(last) => now.saturating_duration_since(last),
            None => NOMINAL_FRAME,
        };
        self.last_time = Some(now);

        let delta = elapsed.min(MAX_FRAME_DELTA);
        FrameTick {
            delta_seconds: delta.as_secs_f32(),
            timestamp: now,
        }
    }
}

impl Default for FrameClock {
    fn default() -> Self {
        Self::new()
    }
}
