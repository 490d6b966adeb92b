//! The engine observer seam.
//!
//! Application code that wants to react to engine events implements
//! [`StageDelegate`] and registers one instance with the engine. Every method
//! has a no-op default, so an implementor only overrides what it cares about.
//! There is exactly one observer slot per engine instance; this is a delegate,
//! not a broadcast bus.

use std::any::Any;
use std::cell::RefCell;
use std::panic::{AssertUnwindSafe, catch_unwind};
use std::rc::Rc;

use image::RgbaImage;

use crate::tracker::Marker;
use crate::vision::VisionImage;

/// Observer callbacks for the presentation loop and its subsystems.
///
/// All methods run on the frame loop's thread, inside a tick. Implementations
/// must be fast; a stalled callback stalls the whole frame.
pub trait StageDelegate {
    /// Called each tick from the render hook, before the draw call.
    fn on_render(&mut self, _dt: f32) {}

    /// Called when the tracker reports a marker at or above the configured
    /// minimum confidence.
    fn on_marker_found(&mut self, _marker: &Marker) {}

    /// Called each tick with the raw camera frame, once tracking is live.
    fn on_frame_captured(&mut self, _frame: &RgbaImage) {}

    /// Called after a scene transition completes, with the incoming scene's
    /// name.
    fn on_scene_changed(&mut self, _scene: &str) {}

    /// Called once, when the vision runtime first reports ready.
    fn on_initialized(&mut self) {}

    /// Preprocessing step applied in place to every decoded vision frame,
    /// before the installed frame processor runs.
    ///
    /// The pipeline keeps ownership of the handle. An implementation that
    /// swaps in a different handle (`std::mem::replace`) takes
    /// responsibility for the one it removed.
    fn preprocess_frame(&mut self, _img: &mut VisionImage) {}
}

/// Shared handle to the single registered delegate.
///
/// The engine and its subsystems all hold clones of this; the frame loop is
/// single-threaded, so `Rc<RefCell<..>>` is the right ownership shape.
pub type SharedDelegate = Rc<RefCell<dyn StageDelegate>>;

/// Run one delegate callback with panic containment.
///
/// A misbehaving observer is logged and skipped; it never halts the frame
/// loop.
pub(crate) fn notify(
    delegate: &SharedDelegate,
    callback: &str,
    f: impl FnOnce(&mut dyn StageDelegate),
) {
    let mut guard = delegate.borrow_mut();
    if let Err(payload) = catch_unwind(AssertUnwindSafe(|| f(&mut *guard))) {
        log::error!(
            "delegate panicked in {}: {}",
            callback,
            panic_message(payload.as_ref())
        );
    }
}

pub(crate) fn panic_message(payload: &(dyn Any + Send)) -> &str {
    if let Some(s) = payload.downcast_ref::<&str>() {
        s
    } else if let Some(s) = payload.downcast_ref::<String>() {
        s
    } else {
        "<non-string panic>"
    }
}
