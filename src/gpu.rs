//! GPU surface and device management for the presentation window.

use std::sync::Arc;

use winit::window::Window;

/// Core GPU context holding the wgpu resources the backdrop pass draws with.
///
/// Created once when the presentation window comes up and passed by
/// reference afterwards. Fields are public for callers that need the raw
/// wgpu APIs.
pub struct GpuContext {
    pub surface: wgpu::Surface<'static>,
    pub device: wgpu::Device,
    pub queue: wgpu::Queue,
    pub config: wgpu::SurfaceConfiguration,
}

/// The backdrop shows a live camera feed; every queued-up frame of latency
/// is visible as lag between the real scene and the presentation. Prefer
/// mailbox presentation where the platform offers it, otherwise plain vsync.
fn preferred_present_mode(available: &[wgpu::PresentMode]) -> wgpu::PresentMode {
    if available.contains(&wgpu::PresentMode::Mailbox) {
        wgpu::PresentMode::Mailbox
    } else {
        wgpu::PresentMode::Fifo
    }
}

impl GpuContext {
    /// Create a GPU context for a winit window: instance, adapter, device,
    /// queue, and an sRGB surface tuned for low presentation latency.
    ///
    /// # Panics
    ///
    /// Panics if no suitable adapter is found or device creation fails;
    /// there is no presentation without a GPU.
    pub fn new(window: Arc<Window>) -> Self {
        let size = window.inner_size();

        let instance = wgpu::Instance::new(&wgpu::InstanceDescriptor {
            backends: wgpu::Backends::PRIMARY,
            ..Default::default()
        });

        let surface = instance.create_surface(window).unwrap();

        let adapter = pollster::block_on(instance.request_adapter(&wgpu::RequestAdapterOptions {
            power_preference: wgpu::PowerPreference::default(),
            compatible_surface: Some(&surface),
            force_fallback_adapter: false,
        }))
        .expect("Failed to find a suitable GPU adapter");
        log::info!("presenting on adapter '{}'", adapter.get_info().name);

        let (device, queue) = pollster::block_on(adapter.request_device(&wgpu::DeviceDescriptor {
            label: Some("arstage Device"),
            required_features: wgpu::Features::empty(),
            required_limits: wgpu::Limits::default(),
            memory_hints: Default::default(),
            trace: Default::default(),
            experimental_features: Default::default(),
        }))
        .expect("Failed to create device");

        let surface_caps = surface.get_capabilities(&adapter);
        let surface_format = surface_caps
            .formats
            .iter()
            .find(|f| f.is_srgb())
            .copied()
            .unwrap_or(surface_caps.formats[0]);

        let config = wgpu::SurfaceConfiguration {
            usage: wgpu::TextureUsages::RENDER_ATTACHMENT,
            format: surface_format,
            // The window can report a zero size before layout settles.
            width: size.width.max(1),
            height: size.height.max(1),
            present_mode: preferred_present_mode(&surface_caps.present_modes),
            alpha_mode: surface_caps.alpha_modes[0],
            view_formats: vec![],
            desired_maximum_frame_latency: 1,
        };
        surface.configure(&device, &config);

        Self {
            surface,
            device,
            queue,
            config,
        }
    }

    /// Resize the surface. Zero-sized dimensions are ignored (window
    /// minimize produces them and wgpu rejects them).
    pub fn resize(&mut self, width: u32, height: u32) {
        if width > 0 && height > 0 {
            self.config.width = width;
            self.config.height = height;
            self.surface.configure(&self.device, &self.config);
        }
    }

    pub fn width(&self) -> u32 {
        self.config.width
    }

    pub fn height(&self) -> u32 {
        self.config.height
    }

    pub fn aspect(&self) -> f32 {
        self.config.width as f32 / self.config.height as f32
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn prefers_mailbox_presentation_when_available() {
        let modes = [
            wgpu::PresentMode::Fifo,
            wgpu::PresentMode::Mailbox,
            wgpu::PresentMode::Immediate,
        ];
        assert_eq!(preferred_present_mode(&modes), wgpu::PresentMode::Mailbox);
    }

    #[test]
    fn falls_back_to_vsync_presentation() {
        let modes = [wgpu::PresentMode::Fifo, wgpu::PresentMode::FifoRelaxed];
        assert_eq!(preferred_present_mode(&modes), wgpu::PresentMode::Fifo);
    }
}
