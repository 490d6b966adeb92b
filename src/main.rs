//! Demo: the full engine wired up with a synthetic camera and a stub
//! pattern detector.
//!
//! The stage starts on a three-second countdown, then switches to a filter
//! scene that installs an edge-detect frame processor, holds it for ten
//! seconds, and hands back to the countdown. The synthetic camera blinks a
//! dark square in and out of the frame so the detector has something to
//! find.

use std::cell::RefCell;
use std::rc::Rc;
use std::time::{Duration, Instant};

use arstage::{
    ArEngine, CameraSource, EngineConfig, Marker, MarkerTracker, Mat4, RgbaImage, Scene,
    SceneOutcome, SoftwareVision, StageDelegate, TimerScene, TrackerError, VisionImage,
    VisionPipeline, VisionRuntime, init_logging,
};

const FEED_WIDTH: u32 = 640;
const FEED_HEIGHT: u32 = 480;

/// Procedural camera feed: a slow gradient wash with a dark square that
/// appears and disappears every couple of seconds.
struct SyntheticCamera {
    started: Instant,
    frame: RgbaImage,
    ticks: u32,
}

impl SyntheticCamera {
    fn new() -> Self {
        Self {
            started: Instant::now(),
            frame: RgbaImage::new(FEED_WIDTH, FEED_HEIGHT),
            ticks: 0,
        }
    }

    fn square_visible(&self) -> bool {
        (self.started.elapsed().as_secs() / 2) % 2 == 0
    }
}

impl CameraSource for SyntheticCamera {
    fn is_ready(&self) -> bool {
        // Pretend the stream takes a moment to come up.
        self.started.elapsed() >= Duration::from_millis(500)
    }

    fn dimensions(&self) -> (u32, u32) {
        (FEED_WIDTH, FEED_HEIGHT)
    }

    fn latest_frame(&mut self) -> Option<&RgbaImage> {
        self.ticks = self.ticks.wrapping_add(1);
        let phase = self.ticks % 255;
        let square = self.square_visible();
        self.frame = RgbaImage::from_fn(FEED_WIDTH, FEED_HEIGHT, |x, y| {
            let in_square = square
                && (FEED_WIDTH / 2 - 40..FEED_WIDTH / 2 + 40).contains(&x)
                && (FEED_HEIGHT / 2 - 40..FEED_HEIGHT / 2 + 40).contains(&y);
            if in_square {
                image::Rgba([10, 10, 10, 255])
            } else {
                let r = ((x * 255) / FEED_WIDTH) as u8;
                let g = ((y * 255) / FEED_HEIGHT) as u8;
                image::Rgba([r, g, phase as u8, 255])
            }
        });
        Some(&self.frame)
    }
}

/// Stub detector: reports a marker whenever the center of the frame is
/// dark, with confidence proportional to how dark it is.
struct PatternDetector;

impl MarkerTracker for PatternDetector {
    fn init_context(&mut self, calibration: &str, pattern: &str) -> Result<(), TrackerError> {
        if calibration.is_empty() {
            return Err(TrackerError::Calibration {
                path: calibration.to_owned(),
                reason: "no calibration file configured".to_owned(),
            });
        }
        if pattern.is_empty() {
            return Err(TrackerError::Pattern {
                path: pattern.to_owned(),
                reason: "no pattern file configured".to_owned(),
            });
        }
        // A real tracker would parse both files here.
        log::info!("detector context: calibration '{calibration}', pattern '{pattern}'");
        Ok(())
    }

    fn projection_matrix(&self) -> Mat4 {
        Mat4::perspective_rh(60f32.to_radians(), 4.0 / 3.0, 0.1, 100.0)
    }

    fn detect(&mut self, frame: &RgbaImage) -> Vec<Marker> {
        let (cx, cy) = (frame.width() / 2, frame.height() / 2);
        let mut total = 0u32;
        let mut samples = 0u32;
        for dy in 0..16 {
            for dx in 0..16 {
                let p = frame.get_pixel(cx - 8 + dx, cy - 8 + dy);
                total += (p[0] as u32 + p[1] as u32 + p[2] as u32) / 3;
                samples += 1;
            }
        }
        let mean = total / samples;
        if mean < 64 {
            vec![Marker {
                pose: Mat4::IDENTITY,
                confidence: 1.0 - mean as f32 / 64.0,
            }]
        } else {
            Vec::new()
        }
    }
}

/// Scene that runs the camera feed through an edge-detect filter for a
/// while, then hands back to the countdown.
struct FilterScene {
    vision: Rc<RefCell<VisionPipeline>>,
    elapsed: f32,
}

impl FilterScene {
    const HOLD_SECONDS: f32 = 10.0;

    fn new(vision: Rc<RefCell<VisionPipeline>>) -> Self {
        Self {
            vision,
            elapsed: 0.0,
        }
    }
}

impl Scene for FilterScene {
    fn init(&mut self) {
        self.vision
            .borrow_mut()
            .set_frame_processor(|img, runtime| {
                edge_detect(img);
                runtime.display(img);
            });
    }

    fn update(&mut self, dt: f32) -> SceneOutcome {
        self.elapsed += dt;
        if self.elapsed >= Self::HOLD_SECONDS {
            return SceneOutcome::TransitionTo(countdown(Rc::clone(&self.vision)));
        }
        SceneOutcome::Continue
    }

    fn end(&mut self) {
        // The processor slot is ours; leaving it installed would leak it
        // into the next scene.
        self.vision.borrow_mut().clear_frame_processor();
    }

    fn name(&self) -> &str {
        "Filter"
    }
}

/// Replace the image with a white-on-black edge map.
fn edge_detect(img: &mut VisionImage) {
    let gray = image::imageops::grayscale(&img.pixels);
    let (width, height) = gray.dimensions();
    let mut edges = RgbaImage::new(width, height);
    for y in 0..height - 1 {
        for x in 0..width - 1 {
            let here = gray.get_pixel(x, y)[0] as i16;
            let right = gray.get_pixel(x + 1, y)[0] as i16;
            let below = gray.get_pixel(x, y + 1)[0] as i16;
            let gradient = (here - right).abs().max((here - below).abs());
            let v = if gradient > 24 { 255 } else { 0 };
            edges.put_pixel(x, y, image::Rgba([v, v, v, 255]));
        }
    }
    img.pixels = edges;
}

fn countdown(vision: Rc<RefCell<VisionPipeline>>) -> Box<dyn Scene> {
    Box::new(
        TimerScene::new(Box::new(move || {
            Box::new(FilterScene::new(vision)) as Box<dyn Scene>
        }))
        .on_timer_updated(|remaining| log::debug!("countdown: {remaining:.1}s")),
    )
}

/// Logs the interesting engine events.
struct DemoDelegate;

impl StageDelegate for DemoDelegate {
    fn on_marker_found(&mut self, marker: &Marker) {
        log::info!("marker found (confidence {:.2})", marker.confidence);
    }

    fn on_scene_changed(&mut self, scene: &str) {
        log::info!("now showing scene '{scene}'");
    }

    fn on_initialized(&mut self) {
        log::info!("vision ready");
    }
}

fn main() -> Result<(), arstage::EngineError> {
    init_logging();

    let mut engine = ArEngine::new(EngineConfig::new().mount("arstage demo"))?;
    engine.set_delegate(Rc::new(RefCell::new(DemoDelegate)));

    let shown = Rc::new(std::cell::Cell::new(0u32));
    let counter = Rc::clone(&shown);
    let runtime = SoftwareVision::new().with_display_sink(move |_| {
        counter.set(counter.get() + 1);
        log::debug!("filter output frame #{}", counter.get());
    });
    let vision = engine.attach_vision(Box::new(runtime));

    engine.attach_tracker(Box::new(SyntheticCamera::new()), Box::new(PatternDetector));
    engine.install_scene(countdown(vision));

    engine.run()
}
