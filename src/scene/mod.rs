//! Scene management: the scene contract, the host that owns the active
//! scene, and the stock countdown scene.
//!
//! A scene is a unit of interactive behavior with lifecycle hooks, analogous
//! to a game state. The [`SceneHost`] owns exactly one at a time and runs
//! the transition protocol when a scene asks to be replaced: the outgoing
//! scene's `end` always completes before the incoming scene's `init`.
//!
//! # Example
//!
//! ```
//! use arstage::{EmptyScene, SceneHost, TimerScene};
//!
//! let mut host = SceneHost::new();
//! host.init(Box::new(TimerScene::new(Box::new(|| Box::new(EmptyScene)))));
//!
//! // Drive a few ticks; after 3 accumulated seconds the timer hands off.
//! for _ in 0..200 {
//!     host.update(0.016);
//! }
//! assert_eq!(host.current_name(), "Empty");
//! ```

mod host;
mod scene;
mod timer;

pub use host::SceneHost;
pub use scene::{EmptyScene, Scene, SceneOutcome};
pub use timer::{SceneFactory, TimerScene};
