//! Scene contract and outcome types.

/// What a scene's `update` asks the host to do next.
pub enum SceneOutcome {
    /// Stay on the current scene.
    Continue,
    /// Replace the current scene with `next` via the transition protocol.
    TransitionTo(Box<dyn Scene>),
}

/// A unit of interactive behavior with lifecycle hooks.
///
/// Exactly one scene is active at a time, owned by the
/// [`SceneHost`](super::SceneHost). A scene is created by its predecessor's
/// `update` (or installed explicitly) and destroyed when replaced: the host
/// calls `end` on the outgoing scene strictly before `init` on the incoming
/// one. A scene must release every resource it acquired by the time its
/// `end` returns; nothing else will.
///
/// # Example
///
/// ```
/// use arstage::{Scene, SceneOutcome};
///
/// struct Countdown {
///     remaining: f32,
/// }
///
/// impl Scene for Countdown {
///     fn update(&mut self, dt: f32) -> SceneOutcome {
///         self.remaining -= dt;
///         SceneOutcome::Continue
///     }
///
///     fn name(&self) -> &str {
///         "Countdown"
///     }
/// }
/// ```
pub trait Scene {
    /// Called once when this scene becomes active, after the previous
    /// scene's [`end`](Self::end).
    fn init(&mut self) {}

    /// Per-tick logic step. `dt` is the clamped frame delta in seconds.
    fn update(&mut self, dt: f32) -> SceneOutcome;

    /// Per-tick animation step, run by the render hook just before the draw
    /// call. Logic that can change the next scene belongs in
    /// [`update`](Self::update), not here.
    fn animate(&mut self, _dt: f32) {}

    /// Called once when this scene is replaced. Release everything acquired
    /// since `init`, in particular any frame processor this scene
    /// installed.
    fn end(&mut self) {}

    /// Human-readable scene name, used in logs and `on_scene_changed`.
    fn name(&self) -> &str;
}

/// The scene a host runs before anything real is installed. Does nothing.
pub struct EmptyScene;

impl Scene for EmptyScene {
    fn update(&mut self, _dt: f32) -> SceneOutcome {
        SceneOutcome::Continue
    }

    fn name(&self) -> &str {
        "Empty"
    }
}
