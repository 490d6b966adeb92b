//! The computer-vision pipeline: rate-limited frame capture, decode, and
//! hand-off to a scene-installed processor.
//!
//! The actual vision runtime (decode and display primitives, readiness
//! signal) is an external collaborator behind [`VisionRuntime`]; the concrete
//! filters are whatever the installed [frame processor](VisionPipeline::set_frame_processor)
//! does. What lives here is the control flow: do nothing until the runtime is
//! ready, throttle the expensive path to twice a second, and guarantee that
//! the decoded frame handle is released exactly once on every exit path,
//! including after a processor panic.

use std::panic::{AssertUnwindSafe, catch_unwind};
use std::time::{Duration, Instant};

use image::{RgbaImage, imageops};

use crate::delegate::{SharedDelegate, StageDelegate, notify};
use crate::error::VisionError;
use crate::limiter::RateLimiter;

/// Minimum spacing between expensive processing passes.
pub const VISION_INTERVAL: Duration = Duration::from_millis(500);

/// Fixed size of the offscreen capture buffer. Smaller trades fidelity for
/// throughput.
pub const CAPTURE_WIDTH: u32 = 1024;
pub const CAPTURE_HEIGHT: u32 = 768;

/// A decoded video frame handle minted by a [`VisionRuntime`].
///
/// Ownership is transient: the processing pass that obtained the handle owns
/// it exclusively and must hand it back to the runtime's
/// [`release`](VisionRuntime::release) exactly once.
pub struct VisionImage {
    id: u64,
    pub pixels: RgbaImage,
}

impl VisionImage {
    pub fn new(id: u64, pixels: RgbaImage) -> Self {
        Self { id, pixels }
    }

    /// Runtime-assigned handle identity.
    pub fn id(&self) -> u64 {
        self.id
    }

    pub fn width(&self) -> u32 {
        self.pixels.width()
    }

    pub fn height(&self) -> u32 {
        self.pixels.height()
    }
}

/// The vision-runtime collaborator. Consumed, never reimplemented, by the
/// pipeline.
pub trait VisionRuntime {
    /// Whether the runtime has finished its asynchronous initialization.
    fn is_ready(&self) -> bool;

    /// Decode the capture surface into a processable image handle.
    fn decode(&mut self, surface: &RgbaImage) -> Result<VisionImage, VisionError>;

    /// Present a processed image on whatever output the runtime drives.
    fn display(&mut self, image: &VisionImage);

    /// Return a handle to the runtime. Every decoded handle must come back
    /// here exactly once.
    fn release(&mut self, image: VisionImage);
}

/// A scene-supplied consumer of decoded frames. Receives the runtime as well
/// so it can call [`VisionRuntime::display`] on its results.
pub type FrameProcessor = Box<dyn FnMut(&mut VisionImage, &mut dyn VisionRuntime)>;

/// Rate-limited glue between captured camera frames and the single installed
/// frame processor.
pub struct VisionPipeline {
    runtime: Box<dyn VisionRuntime>,
    limiter: RateLimiter,
    capture: RgbaImage,
    processor: Option<FrameProcessor>,
    delegate: Option<SharedDelegate>,
    announced_ready: bool,
}

impl VisionPipeline {
    pub fn new(runtime: Box<dyn VisionRuntime>) -> Self {
        Self {
            runtime,
            limiter: RateLimiter::new(VISION_INTERVAL),
            capture: RgbaImage::new(CAPTURE_WIDTH, CAPTURE_HEIGHT),
            processor: None,
            delegate: None,
            announced_ready: false,
        }
    }

    pub fn set_delegate(&mut self, delegate: SharedDelegate) {
        self.delegate = Some(delegate);
    }

    /// Install the frame processor, fully replacing any prior one. There is
    /// exactly one slot; no composition. The scene that installs a processor
    /// owns it and must clear it in its `end`.
    pub fn set_frame_processor(
        &mut self,
        processor: impl FnMut(&mut VisionImage, &mut dyn VisionRuntime) + 'static,
    ) {
        self.processor = Some(Box::new(processor));
    }

    /// Remove the installed processor. Subsequent frames are decoded and
    /// released without side effects.
    pub fn clear_frame_processor(&mut self) {
        self.processor = None;
    }

    /// Feed one camera frame through the pipeline.
    ///
    /// No-op until the runtime reports ready; throttled to one pass per
    /// [`VISION_INTERVAL`] thereafter. Call on every captured frame.
    pub fn process_frame(&mut self, video: &RgbaImage) {
        self.process_frame_at(Instant::now(), video);
    }

    /// [`process_frame`](Self::process_frame) with an explicit timestamp.
    pub fn process_frame_at(&mut self, now: Instant, video: &RgbaImage) {
        if !self.runtime.is_ready() {
            return;
        }
        if !self.announced_ready {
            self.announced_ready = true;
            log::info!("vision runtime ready");
            if let Some(delegate) = &self.delegate {
                notify(delegate, "on_initialized", |d| d.on_initialized());
            }
        }
        if !self.limiter.fire_at(now) {
            return;
        }

        // The capture buffer keeps its fixed size no matter what the camera
        // delivers.
        self.capture = imageops::resize(
            video,
            CAPTURE_WIDTH,
            CAPTURE_HEIGHT,
            imageops::FilterType::Triangle,
        );

        let mut img = match self.runtime.decode(&self.capture) {
            Ok(img) => img,
            Err(err) => {
                log::error!("frame decode failed: {err}");
                return;
            }
        };

        // The pipeline holds the handle for the whole span; the preprocess
        // step works on it in place.
        if let Some(delegate) = &self.delegate {
            notify(delegate, "preprocess_frame", |d| {
                d.preprocess_frame(&mut img)
            });
        }

        if let Some(processor) = &mut self.processor {
            let runtime = self.runtime.as_mut();
            if let Err(_payload) = catch_unwind(AssertUnwindSafe(|| processor(&mut img, runtime))) {
                log::error!("frame processor panicked; frame dropped");
            }
        }

        // Single release point for the handle this pass owns.
        self.runtime.release(img);
    }
}

/// An in-process [`VisionRuntime`] backed by the `image` crate.
///
/// Decode is a copy of the capture surface; display hands the pixels to an
/// optional sink. Useful on its own for pure-software filters and as the
/// default runtime in the demo binary. Tracks outstanding handles so leaks
/// are observable.
pub struct SoftwareVision {
    next_id: u64,
    outstanding: usize,
    sink: Option<Box<dyn FnMut(&RgbaImage)>>,
}

impl SoftwareVision {
    pub fn new() -> Self {
        Self {
            next_id: 0,
            outstanding: 0,
            sink: None,
        }
    }

    /// Route [`display`](VisionRuntime::display) output into `sink`.
    pub fn with_display_sink(mut self, sink: impl FnMut(&RgbaImage) + 'static) -> Self {
        self.sink = Some(Box::new(sink));
        self
    }

    /// Number of decoded handles not yet released.
    pub fn outstanding_handles(&self) -> usize {
        self.outstanding
    }
}

impl Default for SoftwareVision {
    fn default() -> Self {
        Self::new()
    }
}

impl VisionRuntime for SoftwareVision {
    fn is_ready(&self) -> bool {
        // No asynchronous startup: everything is in-process.
        true
    }

    fn decode(&mut self, surface: &RgbaImage) -> Result<VisionImage, VisionError> {
        if surface.width() == 0 || surface.height() == 0 {
            return Err(VisionError::Decode("empty capture surface".to_owned()));
        }
        let id = self.next_id;
        self.next_id += 1;
        self.outstanding += 1;
        Ok(VisionImage::new(id, surface.clone()))
    }

    fn display(&mut self, image: &VisionImage) {
        if let Some(sink) = &mut self.sink {
            sink(&image.pixels);
        }
    }

    fn release(&mut self, _image: VisionImage) {
        self.outstanding = self.outstanding.saturating_sub(1);
    }
}
