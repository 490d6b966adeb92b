//! The engine shell: winit application plumbing, hook wiring, and the draw
//! call.
//!
//! One `ArEngine` is built at the application's composition root, handed its
//! collaborators (delegate, camera source, tracker, vision runtime, starting
//! scene), and then [`run`](ArEngine::run). From that point everything
//! happens inside the frame loop: logic hooks in registration order (scene
//! update, then tracker update, which feeds the vision pipeline) and finally
//! the render hook, which runs the active scene's animation step, notifies
//! the delegate, and draws.

use std::cell::RefCell;
use std::rc::Rc;
use std::sync::Arc;
use std::time::Instant;

use winit::application::ApplicationHandler;
use winit::event::WindowEvent;
use winit::event_loop::{ActiveEventLoop, ControlFlow, EventLoop};
use winit::window::{Window, WindowAttributes, WindowId};

use crate::backdrop::Backdrop;
use crate::camera::ArCamera;
use crate::delegate::{SharedDelegate, StageDelegate, notify};
use crate::error::EngineError;
use crate::gpu::GpuContext;
use crate::render_loop::RenderLoop;
use crate::scene::{Scene, SceneHost};
use crate::tracker::{CameraSource, MarkerTracker, TrackerBridge, TrackerConfig};
use crate::vision::{VisionPipeline, VisionRuntime};

/// Configuration for the presentation surface and tracking startup.
pub struct EngineConfig {
    /// Identifier of the element hosting the presentation surface. Required;
    /// an empty mount aborts setup.
    pub mount: String,
    pub width: u32,
    pub height: u32,
    pub tracker: TrackerConfig,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            mount: "ar-stage".to_string(),
            width: 1280,
            height: 720,
            tracker: TrackerConfig::default(),
        }
    }
}

impl EngineConfig {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn mount(mut self, mount: impl Into<String>) -> Self {
        self.mount = mount.into();
        self
    }

    pub fn size(mut self, width: u32, height: u32) -> Self {
        self.width = width;
        self.height = height;
        self
    }

    pub fn tracker(mut self, tracker: TrackerConfig) -> Self {
        self.tracker = tracker;
        self
    }
}

/// The presentation engine. Exactly one instance per application; build it
/// at the composition root and pass references explicitly.
pub struct ArEngine {
    config: EngineConfig,
    scene_host: Rc<RefCell<SceneHost>>,
    tracker: Option<Rc<RefCell<TrackerBridge>>>,
    vision: Option<Rc<RefCell<VisionPipeline>>>,
    delegate: Option<SharedDelegate>,
}

impl ArEngine {
    /// Validate the configuration and assemble an engine.
    ///
    /// An empty mount point is a setup error: it is logged, the error is
    /// returned, and nothing was started. The caller's process keeps
    /// running with an inert engine, never a crash.
    pub fn new(config: EngineConfig) -> Result<Self, EngineError> {
        if config.mount.trim().is_empty() {
            log::error!("no mount point configured; engine setup aborted");
            return Err(EngineError::MountMissing);
        }
        Ok(Self {
            config,
            scene_host: Rc::new(RefCell::new(SceneHost::new())),
            tracker: None,
            vision: None,
            delegate: None,
        })
    }

    /// Register the single observer. Propagated to every subsystem when the
    /// loop starts.
    pub fn set_delegate(&mut self, delegate: SharedDelegate) {
        self.delegate = Some(delegate);
    }

    /// The scene host, for installing the starting scene and for explicit
    /// transitions from application code.
    pub fn scene_host(&self) -> Rc<RefCell<SceneHost>> {
        Rc::clone(&self.scene_host)
    }

    /// Install the starting scene.
    pub fn install_scene(&self, scene: Box<dyn Scene>) {
        self.scene_host.borrow_mut().init(scene);
    }

    /// Attach the camera source and marker tracker. Startup is two-phase
    /// and asynchronous; until both phases pass, tracking ticks no-op.
    pub fn attach_tracker(
        &mut self,
        source: Box<dyn CameraSource>,
        tracker: Box<dyn MarkerTracker>,
    ) -> Rc<RefCell<TrackerBridge>> {
        let bridge = Rc::new(RefCell::new(TrackerBridge::new(
            source,
            tracker,
            self.config.tracker.clone(),
        )));
        self.tracker = Some(Rc::clone(&bridge));
        bridge
    }

    /// Attach the vision runtime. Returns the pipeline so scenes can
    /// install and clear frame processors.
    pub fn attach_vision(&mut self, runtime: Box<dyn VisionRuntime>) -> Rc<RefCell<VisionPipeline>> {
        let pipeline = Rc::new(RefCell::new(VisionPipeline::new(runtime)));
        self.vision = Some(Rc::clone(&pipeline));
        pipeline
    }

    /// Run the presentation loop until the window closes.
    pub fn run(self) -> Result<(), EngineError> {
        let event_loop = EventLoop::new()?;
        event_loop.set_control_flow(ControlFlow::Poll);

        let mut app = StageApp::Pending { engine: Some(self) };
        event_loop.run_app(&mut app)?;
        Ok(())
    }
}

enum StageApp {
    Pending {
        engine: Option<ArEngine>,
    },
    Running {
        window: Arc<Window>,
        gpu: Rc<RefCell<GpuContext>>,
        camera: Rc<RefCell<ArCamera>>,
        render_loop: RenderLoop,
    },
}

impl StageApp {
    fn start(engine: ArEngine, event_loop: &ActiveEventLoop) -> Self {
        let ArEngine {
            config,
            scene_host,
            tracker,
            vision,
            delegate,
        } = engine;

        let window_attrs = WindowAttributes::default()
            .with_title(&config.mount)
            .with_inner_size(winit::dpi::LogicalSize::new(config.width, config.height));
        let window = Arc::new(event_loop.create_window(window_attrs).unwrap());

        let gpu = Rc::new(RefCell::new(GpuContext::new(window.clone())));
        let camera = Rc::new(RefCell::new(ArCamera::new(gpu.borrow().aspect())));
        let backdrop = Rc::new(RefCell::new(Backdrop::new(&gpu.borrow())));

        if let Some(delegate) = &delegate {
            scene_host.borrow_mut().set_delegate(Rc::clone(delegate));
            if let Some(tracker) = &tracker {
                tracker.borrow_mut().set_delegate(Rc::clone(delegate));
            }
            if let Some(vision) = &vision {
                vision.borrow_mut().set_delegate(Rc::clone(delegate));
            }
        }

        let mut render_loop = RenderLoop::new();

        // Logic hooks, in the order they must run: scene update first, then
        // tracking (which forwards frames downstream).
        let host = Rc::clone(&scene_host);
        render_loop.add_hook(move |dt| host.borrow_mut().update(dt));

        if let Some(tracker) = &tracker {
            {
                let mut bridge = tracker.borrow_mut();

                let cam = Rc::clone(&camera);
                bridge.on_context_ready(move |projection| {
                    cam.borrow_mut().adopt_projection(projection);
                });

                let resync_window = window.clone();
                let resync_gpu = Rc::clone(&gpu);
                bridge.on_settled(move || {
                    let size = resync_window.inner_size();
                    resync_gpu.borrow_mut().resize(size.width, size.height);
                });

                let sink_backdrop = Rc::clone(&backdrop);
                let sink_gpu = Rc::clone(&gpu);
                let sink_vision = vision.clone();
                bridge.set_frame_sink(move |frame| {
                    sink_backdrop
                        .borrow_mut()
                        .update_frame(&sink_gpu.borrow(), frame);
                    if let Some(vision) = &sink_vision {
                        vision.borrow_mut().process_frame(frame);
                    }
                });
            }

            let bridge = Rc::clone(tracker);
            render_loop.add_hook(move |_dt| bridge.borrow_mut().tick(Instant::now()));
        }

        // The render hook always runs last: scene animation, delegate,
        // draw call.
        let host = Rc::clone(&scene_host);
        let render_gpu = Rc::clone(&gpu);
        let render_backdrop = Rc::clone(&backdrop);
        let render_delegate = delegate.clone();
        render_loop.set_render_hook(move |dt| {
            host.borrow_mut().animate(dt);
            if let Some(delegate) = &render_delegate {
                notify(delegate, "on_render", |d| d.on_render(dt));
            }
            draw(&render_gpu.borrow(), &render_backdrop.borrow());
        });

        log::info!("presentation loop started on '{}'", config.mount);

        StageApp::Running {
            window,
            gpu,
            camera,
            render_loop,
        }
    }
}

impl ApplicationHandler for StageApp {
    fn resumed(&mut self, event_loop: &ActiveEventLoop) {
        if let StageApp::Pending { engine } = self {
            if let Some(engine) = engine.take() {
                *self = StageApp::start(engine, event_loop);
            }
        }
    }

    fn window_event(&mut self, event_loop: &ActiveEventLoop, _id: WindowId, event: WindowEvent) {
        let StageApp::Running {
            window,
            gpu,
            camera,
            render_loop,
            ..
        } = self
        else {
            return;
        };

        match event {
            WindowEvent::CloseRequested => {
                event_loop.exit();
            }
            WindowEvent::Resized(size) => {
                // Outside the tick path: surface and projection stay in sync
                // with the viewport.
                gpu.borrow_mut().resize(size.width, size.height);
                camera.borrow_mut().set_aspect(gpu.borrow().aspect());
            }
            WindowEvent::RedrawRequested => {
                render_loop.tick(Instant::now());
                window.request_redraw();
            }
            _ => {}
        }
    }
}

/// Issue the draw call: clear, backdrop, present.
fn draw(gpu: &GpuContext, backdrop: &Backdrop) {
    let output = match gpu.surface.get_current_texture() {
        Ok(output) => output,
        Err(err) => {
            log::warn!("failed to get surface texture: {err}");
            return;
        }
    };
    let view = output
        .texture
        .create_view(&wgpu::TextureViewDescriptor::default());

    let mut encoder = gpu
        .device
        .create_command_encoder(&wgpu::CommandEncoderDescriptor {
            label: Some("Stage Encoder"),
        });

    {
        let mut render_pass = encoder.begin_render_pass(&wgpu::RenderPassDescriptor {
            label: Some("Stage Pass"),
            color_attachments: &[Some(wgpu::RenderPassColorAttachment {
                view: &view,
                resolve_target: None,
                ops: wgpu::Operations {
                    load: wgpu::LoadOp::Clear(wgpu::Color::BLACK),
                    store: wgpu::StoreOp::Store,
                },
                depth_slice: None,
            })],
            depth_stencil_attachment: None,
            timestamp_writes: None,
            occlusion_query_set: None,
        });

        backdrop.render(gpu, &mut render_pass);
    }

    gpu.queue.submit(std::iter::once(encoder.finish()));
    output.present();
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn empty_mount_point_aborts_setup() {
        let result = ArEngine::new(EngineConfig::new().mount(""));
        assert!(matches!(result, Err(EngineError::MountMissing)));
        let result = ArEngine::new(EngineConfig::new().mount("   "));
        assert!(matches!(result, Err(EngineError::MountMissing)));
    }

    #[test]
    fn default_config_is_accepted() {
        let engine = ArEngine::new(EngineConfig::default()).unwrap();
        assert_eq!(engine.scene_host().borrow().current_name(), "Empty");
    }
}
