//! Bridge between the frame loop and the marker-detection subsystem.
//!
//! The detection algorithm itself is an external collaborator behind the
//! [`MarkerTracker`] trait, as is the camera behind [`CameraSource`]. The
//! bridge owns the startup choreography (wait for the camera, then bring up
//! the tracking context against it) and the per-tick feeding of frames into
//! the tracker. Both startup boundaries are one-shot; until they pass, the
//! tick hook is a no-op.

use std::cell::Cell;
use std::rc::Rc;
use std::time::{Duration, Instant};

use glam::Mat4;
use image::RgbaImage;

use crate::delegate::{SharedDelegate, StageDelegate, notify};
use crate::error::TrackerError;

/// Delay after the camera source comes up before the surface sizes are
/// resynchronized. Camera pipelines report dimensions before the stream has
/// actually settled on them.
pub const SOURCE_SETTLE_DELAY: Duration = Duration::from_millis(2000);

/// Detections below this confidence are dropped unless configured otherwise.
pub const DEFAULT_MIN_CONFIDENCE: f32 = 0.001;

/// A marker detection: camera-relative pose plus detection confidence.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct Marker {
    /// Camera transform implied by the marker (the marker center is the
    /// world origin).
    pub pose: Mat4,
    /// Detection confidence in `0.0..=1.0`.
    pub confidence: f32,
}

/// Intrinsic orientation of the camera stream, derived once from the first
/// reported frame dimensions and cached for the life of the bridge.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum SourceOrientation {
    Landscape,
    Portrait,
}

/// Startup state of the bridge. Per-tick work is gated on `ContextReady`.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub enum TrackerPhase {
    /// Waiting for the camera source to come up.
    #[default]
    Uninit,
    /// Camera is live; tracking context not yet initialized.
    SourceReady,
    /// Tracking context initialized; the bridge ticks for real.
    ContextReady,
}

/// The camera feed collaborator.
pub trait CameraSource {
    /// Whether the source has finished its own asynchronous startup.
    fn is_ready(&self) -> bool;

    /// Intrinsic frame dimensions `(width, height)` in pixels.
    fn dimensions(&self) -> (u32, u32);

    /// The most recent captured frame, if any.
    fn latest_frame(&mut self) -> Option<&RgbaImage>;
}

/// The marker-detection collaborator. Calibration and pattern file formats
/// are owned by the implementation; the bridge treats the paths as opaque
/// configuration.
pub trait MarkerTracker {
    /// Initialize the tracking context against the live camera.
    fn init_context(&mut self, calibration: &str, pattern: &str) -> Result<(), TrackerError>;

    /// Projection matrix the presentation camera must adopt once the
    /// context is up.
    fn projection_matrix(&self) -> Mat4;

    /// Run detection over one frame.
    fn detect(&mut self, frame: &RgbaImage) -> Vec<Marker>;
}

/// Configuration inputs for tracking startup.
#[derive(Clone, Debug)]
pub struct TrackerConfig {
    /// Path to the camera-calibration file (format owned by the tracker).
    pub calibration_path: String,
    /// Path to the marker-pattern file (format owned by the tracker).
    pub pattern_path: String,
    /// Detections below this confidence never reach the delegate.
    pub min_confidence: f32,
}

impl Default for TrackerConfig {
    fn default() -> Self {
        Self {
            calibration_path: "data/camera_para.dat".to_owned(),
            pattern_path: "data/marker.patt".to_owned(),
            min_confidence: DEFAULT_MIN_CONFIDENCE,
        }
    }
}

/// Owns the camera source and tracker, and runs their per-tick update.
pub struct TrackerBridge {
    source: Box<dyn CameraSource>,
    tracker: Box<dyn MarkerTracker>,
    config: TrackerConfig,
    phase: TrackerPhase,
    orientation: Option<SourceOrientation>,
    settle_deadline: Option<Instant>,
    visible: Rc<Cell<bool>>,
    delegate: Option<SharedDelegate>,
    on_settled: Option<Box<dyn FnMut()>>,
    on_context_ready: Option<Box<dyn FnMut(Mat4)>>,
    frame_sink: Option<Box<dyn FnMut(&RgbaImage)>>,
}

impl TrackerBridge {
    pub fn new(
        source: Box<dyn CameraSource>,
        tracker: Box<dyn MarkerTracker>,
        config: TrackerConfig,
    ) -> Self {
        Self {
            source,
            tracker,
            config,
            phase: TrackerPhase::Uninit,
            orientation: None,
            settle_deadline: None,
            visible: Rc::new(Cell::new(false)),
            delegate: None,
            on_settled: None,
            on_context_ready: None,
            frame_sink: None,
        }
    }

    pub fn phase(&self) -> TrackerPhase {
        self.phase
    }

    /// Cached stream orientation; `None` until the source comes up.
    pub fn orientation(&self) -> Option<SourceOrientation> {
        self.orientation
    }

    /// Shared flag flipped true while tracking is live; the render side
    /// reads it to decide whether the AR content is shown.
    pub fn visibility(&self) -> Rc<Cell<bool>> {
        Rc::clone(&self.visible)
    }

    pub fn set_delegate(&mut self, delegate: SharedDelegate) {
        self.delegate = Some(delegate);
    }

    /// One-shot callback fired [`SOURCE_SETTLE_DELAY`] after the camera
    /// comes up, for resynchronizing surface sizes outside the tick path.
    pub fn on_settled(&mut self, callback: impl FnMut() + 'static) {
        self.on_settled = Some(Box::new(callback));
    }

    /// Callback fired once when the tracking context initializes, carrying
    /// the projection matrix the presentation camera must adopt.
    pub fn on_context_ready(&mut self, callback: impl FnMut(Mat4) + 'static) {
        self.on_context_ready = Some(Box::new(callback));
    }

    /// Downstream consumer of every captured frame (the vision pipeline).
    pub fn set_frame_sink(&mut self, sink: impl FnMut(&RgbaImage) + 'static) {
        self.frame_sink = Some(Box::new(sink));
    }

    /// Per-tick update. Registered as a loop hook; no-ops until both the
    /// camera source and the tracking context are ready.
    pub fn tick(&mut self, now: Instant) {
        if self.phase == TrackerPhase::Uninit {
            if !self.source.is_ready() {
                return;
            }
            self.on_source_ready(now);
        }

        if let Some(deadline) = self.settle_deadline {
            if now >= deadline {
                self.settle_deadline = None;
                log::debug!("camera source settled, resynchronizing surface");
                if let Some(settled) = &mut self.on_settled {
                    settled();
                }
            }
        }

        if self.phase != TrackerPhase::ContextReady {
            return;
        }

        let Some(frame) = self.source.latest_frame() else {
            return;
        };

        for marker in self.tracker.detect(frame) {
            if marker.confidence < self.config.min_confidence {
                continue;
            }
            log::debug!("marker found (confidence {:.3})", marker.confidence);
            if let Some(delegate) = &self.delegate {
                notify(delegate, "on_marker_found", |d| d.on_marker_found(&marker));
            }
        }

        self.visible.set(true);

        if let Some(delegate) = &self.delegate {
            notify(delegate, "on_frame_captured", |d| d.on_frame_captured(frame));
        }
        if let Some(sink) = &mut self.frame_sink {
            sink(frame);
        }
    }

    fn on_source_ready(&mut self, now: Instant) {
        let (width, height) = self.source.dimensions();
        let orientation = if width > height {
            SourceOrientation::Landscape
        } else {
            SourceOrientation::Portrait
        };
        log::info!(
            "camera source ready: {}x{} ({:?})",
            width,
            height,
            orientation
        );
        self.orientation = Some(orientation);
        self.settle_deadline = Some(now + SOURCE_SETTLE_DELAY);
        self.phase = TrackerPhase::SourceReady;

        match self
            .tracker
            .init_context(&self.config.calibration_path, &self.config.pattern_path)
        {
            Ok(()) => {
                log::info!("tracking context initialized");
                self.phase = TrackerPhase::ContextReady;
                let projection = self.tracker.projection_matrix();
                if let Some(ready) = &mut self.on_context_ready {
                    ready(projection);
                }
            }
            Err(err) => {
                // Phase stays SourceReady; the tick hook is a no-op forever.
                log::error!("tracking context init failed: {err}");
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::delegate::StageDelegate;
    use std::cell::RefCell;

    struct FakeSource {
        ready: Rc<Cell<bool>>,
        width: u32,
        height: u32,
        frame: Option<RgbaImage>,
    }

    impl CameraSource for FakeSource {
        fn is_ready(&self) -> bool {
            self.ready.get()
        }
        fn dimensions(&self) -> (u32, u32) {
            (self.width, self.height)
        }
        fn latest_frame(&mut self) -> Option<&RgbaImage> {
            self.frame.as_ref()
        }
    }

    struct FakeTracker {
        detections: Vec<Marker>,
        detect_calls: Rc<Cell<usize>>,
        fail_init: bool,
    }

    impl MarkerTracker for FakeTracker {
        fn init_context(&mut self, _calibration: &str, pattern: &str) -> Result<(), TrackerError> {
            if self.fail_init {
                return Err(TrackerError::Pattern {
                    path: pattern.to_owned(),
                    reason: "unreadable".to_owned(),
                });
            }
            Ok(())
        }
        fn projection_matrix(&self) -> Mat4 {
            Mat4::IDENTITY
        }
        fn detect(&mut self, _frame: &RgbaImage) -> Vec<Marker> {
            self.detect_calls.set(self.detect_calls.get() + 1);
            self.detections.clone()
        }
    }

    fn bridge_with(
        ready: bool,
        width: u32,
        height: u32,
        detections: Vec<Marker>,
    ) -> (TrackerBridge, Rc<Cell<usize>>) {
        let detect_calls = Rc::new(Cell::new(0));
        let source = FakeSource {
            ready: Rc::new(Cell::new(ready)),
            width,
            height,
            frame: Some(RgbaImage::new(width, height)),
        };
        let tracker = FakeTracker {
            detections,
            detect_calls: Rc::clone(&detect_calls),
            fail_init: false,
        };
        let bridge = TrackerBridge::new(
            Box::new(source),
            Box::new(tracker),
            TrackerConfig::default(),
        );
        (bridge, detect_calls)
    }

    fn marker(confidence: f32) -> Marker {
        Marker {
            pose: Mat4::IDENTITY,
            confidence,
        }
    }

    #[test]
    fn no_ops_until_source_is_ready() {
        let (mut bridge, detect_calls) = bridge_with(false, 640, 480, vec![marker(1.0)]);
        for _ in 0..5 {
            bridge.tick(Instant::now());
        }
        assert_eq!(bridge.phase(), TrackerPhase::Uninit);
        assert_eq!(detect_calls.get(), 0);
        assert!(!bridge.visibility().get());
    }

    #[test]
    fn ready_source_brings_up_context_and_ticks() {
        let (mut bridge, detect_calls) = bridge_with(true, 640, 480, vec![]);
        bridge.tick(Instant::now());
        assert_eq!(bridge.phase(), TrackerPhase::ContextReady);
        assert_eq!(detect_calls.get(), 1);
        assert!(bridge.visibility().get());
    }

    #[test]
    fn orientation_derived_from_dimensions_and_cached() {
        let (mut bridge, _) = bridge_with(true, 1280, 720, vec![]);
        bridge.tick(Instant::now());
        assert_eq!(bridge.orientation(), Some(SourceOrientation::Landscape));

        let (mut bridge, _) = bridge_with(true, 480, 640, vec![]);
        bridge.tick(Instant::now());
        assert_eq!(bridge.orientation(), Some(SourceOrientation::Portrait));
    }

    #[test]
    fn low_confidence_detections_never_reach_the_delegate() {
        struct Found {
            confidences: Vec<f32>,
        }
        impl StageDelegate for Found {
            fn on_marker_found(&mut self, marker: &Marker) {
                self.confidences.push(marker.confidence);
            }
        }

        let (mut bridge, _) =
            bridge_with(true, 640, 480, vec![marker(0.0001), marker(0.8), marker(0.0)]);
        let found = Rc::new(RefCell::new(Found {
            confidences: Vec::new(),
        }));
        bridge.set_delegate(found.clone());

        bridge.tick(Instant::now());

        assert_eq!(found.borrow().confidences, vec![0.8]);
    }

    #[test]
    fn captured_frames_flow_to_delegate_and_sink() {
        struct Captured {
            frames: usize,
        }
        impl StageDelegate for Captured {
            fn on_frame_captured(&mut self, _frame: &RgbaImage) {
                self.frames += 1;
            }
        }

        let (mut bridge, _) = bridge_with(true, 640, 480, vec![]);
        let captured = Rc::new(RefCell::new(Captured { frames: 0 }));
        bridge.set_delegate(captured.clone());
        let sunk = Rc::new(Cell::new(0));
        let counter = Rc::clone(&sunk);
        bridge.set_frame_sink(move |_| counter.set(counter.get() + 1));

        bridge.tick(Instant::now());
        bridge.tick(Instant::now());

        assert_eq!(captured.borrow().frames, 2);
        assert_eq!(sunk.get(), 2);
    }

    #[test]
    fn delegate_panic_does_not_stop_the_tick() {
        struct Volatile;
        impl StageDelegate for Volatile {
            fn on_marker_found(&mut self, _marker: &Marker) {
                panic!("observer bug");
            }
        }

        let (mut bridge, _) = bridge_with(true, 640, 480, vec![marker(0.9)]);
        bridge.set_delegate(Rc::new(RefCell::new(Volatile)));
        let sunk = Rc::new(Cell::new(0));
        let counter = Rc::clone(&sunk);
        bridge.set_frame_sink(move |_| counter.set(counter.get() + 1));

        bridge.tick(Instant::now());

        // The frame still reaches downstream consumers.
        assert_eq!(sunk.get(), 1);
        assert!(bridge.visibility().get());
    }

    #[test]
    fn settle_callback_fires_once_after_the_delay() {
        let (mut bridge, _) = bridge_with(true, 640, 480, vec![]);
        let settled = Rc::new(Cell::new(0));
        let counter = Rc::clone(&settled);
        bridge.on_settled(move || counter.set(counter.get() + 1));

        let t0 = Instant::now();
        bridge.tick(t0);
        assert_eq!(settled.get(), 0);
        bridge.tick(t0 + Duration::from_millis(1999));
        assert_eq!(settled.get(), 0);
        bridge.tick(t0 + Duration::from_millis(2000));
        assert_eq!(settled.get(), 1);
        bridge.tick(t0 + Duration::from_millis(4000));
        assert_eq!(settled.get(), 1);
    }

    #[test]
    fn context_init_failure_leaves_the_bridge_inert() {
        let detect_calls = Rc::new(Cell::new(0));
        let source = FakeSource {
            ready: Rc::new(Cell::new(true)),
            width: 640,
            height: 480,
            frame: Some(RgbaImage::new(640, 480)),
        };
        let tracker = FakeTracker {
            detections: vec![marker(1.0)],
            detect_calls: Rc::clone(&detect_calls),
            fail_init: true,
        };
        let mut bridge = TrackerBridge::new(
            Box::new(source),
            Box::new(tracker),
            TrackerConfig::default(),
        );

        bridge.tick(Instant::now());
        bridge.tick(Instant::now());

        assert_eq!(bridge.phase(), TrackerPhase::SourceReady);
        assert_eq!(detect_calls.get(), 0);
    }
}
