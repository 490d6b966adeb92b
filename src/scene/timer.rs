//! A countdown scene that hands off to a successor when time runs out.

use super::scene::{Scene, SceneOutcome};

/// Default countdown length in seconds.
const DEFAULT_DURATION: f32 = 3.0;

/// Builder for the scene installed when the countdown expires.
pub type SceneFactory = Box<dyn FnOnce() -> Box<dyn Scene>>;

/// The stock starting scene: counts down, then transitions.
///
/// Accumulates tick deltas; once the accumulated time reaches the configured
/// duration, the next `update` returns the successor built by the factory.
/// [`remaining_time`](Self::remaining_time) clamps at zero so UI reading it
/// never shows a negative countdown.
pub struct TimerScene {
    duration: f32,
    scene_time: f32,
    next: Option<SceneFactory>,
    on_timer_updated: Option<Box<dyn FnMut(f32)>>,
}

impl TimerScene {
    /// Three-second countdown into the scene built by `next`.
    pub fn new(next: SceneFactory) -> Self {
        Self::with_duration(DEFAULT_DURATION, next)
    }

    pub fn with_duration(duration: f32, next: SceneFactory) -> Self {
        Self {
            duration,
            scene_time: 0.0,
            next: Some(next),
            on_timer_updated: None,
        }
    }

    /// Observe the countdown each tick (receives the remaining seconds).
    pub fn on_timer_updated(mut self, callback: impl FnMut(f32) + 'static) -> Self {
        self.on_timer_updated = Some(Box::new(callback));
        self
    }

    /// Seconds left on the countdown, never negative.
    pub fn remaining_time(&self) -> f32 {
        (self.duration - self.scene_time).max(0.0)
    }
}

impl Scene for TimerScene {
    fn update(&mut self, dt: f32) -> SceneOutcome {
        if self.remaining_time() <= 0.0 {
            if let Some(make_next) = self.next.take() {
                return SceneOutcome::TransitionTo(make_next());
            }
            return SceneOutcome::Continue;
        }

        self.scene_time += dt;
        let remaining = self.remaining_time();
        if let Some(callback) = &mut self.on_timer_updated {
            callback(remaining);
        }
        SceneOutcome::Continue
    }

    fn name(&self) -> &str {
        "Timer"
    }
}
