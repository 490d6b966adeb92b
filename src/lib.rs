//! # arstage
//!
//! **A marker-driven AR presentation engine built around one cooperative
//! frame loop.**
//!
//! arstage coordinates a live camera feed, marker tracking, a rate-limited
//! computer-vision pipeline, and a sequence of interactive scenes. The
//! camera, the marker detector, and the vision runtime are collaborators
//! behind traits; what this crate owns is the control flow between them:
//! ordered per-tick hooks, bounded frame deltas, the scene transition
//! protocol, and the lifetime of every decoded video frame.
//!
//! ## Quick start
//!
//! ```no_run
//! use arstage::*;
//!
//! # fn camera() -> Box<dyn CameraSource> { unimplemented!() }
//! # fn detector() -> Box<dyn MarkerTracker> { unimplemented!() }
//! fn main() -> Result<(), EngineError> {
//!     let mut engine = ArEngine::new(EngineConfig::new().mount("stage"))?;
//!
//!     let vision = engine.attach_vision(Box::new(SoftwareVision::new()));
//!     engine.attach_tracker(camera(), detector());
//!
//!     engine.install_scene(Box::new(TimerScene::new(Box::new(move || {
//!         let _ = &vision; // hand the pipeline to the next scene here
//!         Box::new(EmptyScene)
//!     }))));
//!
//!     engine.run()
//! }
//! ```
//!
//! ## Guarantees
//!
//! - Hooks run in registration order on every tick; the render hook runs
//!   last.
//! - Frame deltas are clamped to 0.2 s, so a stall never becomes a
//!   simulation jump.
//! - A scene's `end` always completes before its successor's `init`.
//! - A panicking scene, frame processor, or delegate callback is contained
//!   and logged; the loop keeps running.
//! - Every decoded vision frame is released exactly once, on every exit
//!   path.

mod backdrop;
mod camera;
mod clock;
mod delegate;
mod engine;
mod error;
mod gpu;
mod limiter;
mod logging;
mod render_loop;
pub mod scene;
mod tracker;
mod vision;

pub use backdrop::Backdrop;
pub use camera::ArCamera;
pub use clock::{FrameClock, FrameTick, MAX_FRAME_DELTA};
pub use delegate::{SharedDelegate, StageDelegate};
pub use engine::{ArEngine, EngineConfig};
pub use error::{EngineError, TrackerError, VisionError};
pub use gpu::GpuContext;
pub use limiter::RateLimiter;
pub use logging::init_logging;
pub use render_loop::{RenderLoop, TickHook};
pub use scene::{EmptyScene, Scene, SceneFactory, SceneHost, SceneOutcome, TimerScene};
pub use tracker::{
    CameraSource, DEFAULT_MIN_CONFIDENCE, Marker, MarkerTracker, SOURCE_SETTLE_DELAY,
    SourceOrientation, TrackerBridge, TrackerConfig, TrackerPhase,
};
pub use vision::{
    CAPTURE_HEIGHT, CAPTURE_WIDTH, FrameProcessor, SoftwareVision, VISION_INTERVAL, VisionImage,
    VisionPipeline, VisionRuntime,
};

// Re-export the math and frame types that appear in the public API.
pub use glam::{Mat4, Quat, Vec2, Vec3, Vec4};
pub use image::RgbaImage;
