// =============================================================================
// VULKAN TRIANGLE RENDERER
// =============================================================================
//
// FRAME FLOW:
// 1. Wait on the frame slot's fence
// 2. Acquire swapchain image
// 3. Submit the pre-recorded command buffer for that image
// 4. Present the rendered image
//
// The window is fixed-size: there is no swapchain recreation.
// =============================================================================

use anyhow::{Context, Result};
use std::fs::OpenOptions;
use std::io::Write;
use std::sync::Arc;
use std::time::Instant;
use triangle_renderer::{Config, Renderer, RendererSettings, ShaderSet, VulkanBackend};
use winit::{
    application::ApplicationHandler,
    event::WindowEvent,
    event_loop::{ActiveEventLoop, EventLoop},
    keyboard::{KeyCode, PhysicalKey},
    window::{Window, WindowAttributes, WindowId},
};

// =============================================================================
// ENTRY POINT
// =============================================================================

fn main() -> Result<()> {
    let config = Config::load();

    init_logging(&config);
    log::info!("Starting Vulkan renderer");
    log::info!("Window: {}x{}", config.window.width, config.window.height);

    let event_loop = EventLoop::new().context("Failed to create event loop")?;
    let mut app = App::new(config);
    event_loop.run_app(&mut app).context("Event loop terminated with an error")?;

    if app.failed {
        anyhow::bail!("Renderer stopped after an error (see log)");
    }
    Ok(())
}

/// Initialize logging, optionally piped into the configured log file
fn init_logging(config: &Config) {
    use env_logger::{Builder, Env, Target};

    let mut builder = Builder::from_env(Env::default().default_filter_or("info"));

    if config.debug.log_to_file {
        match OpenOptions::new()
            .create(true)
            .write(true)
            .truncate(true)
            .open(&config.debug.log_file)
        {
            Ok(mut file) => {
                let _ = writeln!(file, "=== Vulkan Renderer Log ===");
                let _ = writeln!(file, "Started: {:?}", std::time::SystemTime::now());
                let _ = writeln!(file);
                builder.target(Target::Pipe(Box::new(file)));
            }
            Err(e) => eprintln!("Cannot open log file {}: {}", config.debug.log_file, e),
        }
    }

    builder.init();
}

// =============================================================================
// APPLICATION STATE
// =============================================================================

/// Field order matters for Drop: the renderer goes before the window.
struct App {
    config: Config,
    renderer: Option<Renderer<VulkanBackend>>,
    window: Option<Arc<Window>>,
    failed: bool,

    // FPS tracking
    frame_count: u32,
    last_fps_update: Instant,
    last_frame_time: Instant,
}

impl App {
    fn new(config: Config) -> Self {
        let now = Instant::now();
        Self {
            config,
            renderer: None,
            window: None,
            failed: false,
            frame_count: 0,
            last_fps_update: now,
            last_frame_time: now,
        }
    }

    fn init_renderer(&self, window: Arc<Window>) -> Result<Renderer<VulkanBackend>> {
        let shaders = ShaderSet::load(&self.config.shaders.vertex, &self.config.shaders.fragment)
            .context("Failed to load shaders")?;
        let settings = RendererSettings::from_config(&self.config);

        let backend = VulkanBackend::new(window).context("Failed to load Vulkan")?;
        let renderer = Renderer::init(backend, &settings, &shaders)
            .context("Failed to initialize renderer")?;

        log::info!(
            "Rendering on {} at {}x{}, {} images, {:?}",
            renderer.adapter_name(),
            renderer.extent().width,
            renderer.extent().height,
            renderer.image_count(),
            renderer.present_mode()
        );
        Ok(renderer)
    }

    /// Tear down the renderer while the window is still alive
    fn shutdown(&mut self, event_loop: &ActiveEventLoop) {
        if let Some(renderer) = self.renderer.take() {
            renderer.cleanup();
        }
        event_loop.exit();
    }

    fn update_fps(&mut self) {
        if !self.config.debug.show_fps {
            return;
        }

        let now = Instant::now();
        let frame_time = now.duration_since(self.last_frame_time).as_secs_f32();
        self.last_frame_time = now;
        self.frame_count += 1;

        // Update title every second
        let elapsed = now.duration_since(self.last_fps_update).as_secs_f32();
        if elapsed >= 1.0 {
            let fps = self.frame_count as f32 / elapsed;

            if let Some(ref window) = self.window {
                window.set_title(&format!(
                    "{} - {:.0} FPS ({:.2}ms)",
                    self.config.window.title,
                    fps,
                    frame_time * 1000.0
                ));
            }

            self.frame_count = 0;
            self.last_fps_update = now;
        }
    }
}

// =============================================================================
// EVENT HANDLING
// =============================================================================

impl ApplicationHandler for App {
    fn resumed(&mut self, event_loop: &ActiveEventLoop) {
        if self.window.is_some() {
            return;
        }

        let window_attributes = WindowAttributes::default()
            .with_title(&self.config.window.title)
            .with_inner_size(winit::dpi::PhysicalSize::new(
                self.config.window.width,
                self.config.window.height,
            ))
            .with_resizable(false);

        let window = match event_loop.create_window(window_attributes) {
            Ok(w) => Arc::new(w),
            Err(e) => {
                log::error!("Failed to create window: {:?}", e);
                self.failed = true;
                event_loop.exit();
                return;
            }
        };

        match self.init_renderer(window.clone()) {
            Ok(renderer) => self.renderer = Some(renderer),
            Err(e) => {
                log::error!("{:#}", e);
                self.failed = true;
                event_loop.exit();
                return;
            }
        }

        self.window = Some(window);
    }

    fn window_event(&mut self, event_loop: &ActiveEventLoop, _id: WindowId, event: WindowEvent) {
        match event {
            WindowEvent::CloseRequested => {
                log::info!("Close requested, shutting down...");
                self.shutdown(event_loop);
            }

            WindowEvent::RedrawRequested => {
                let Some(renderer) = self.renderer.as_mut() else {
                    return;
                };
                match renderer.draw_frame() {
                    Ok(()) => self.update_fps(),
                    Err(e) => {
                        log::error!("Render error: {}", e);
                        self.failed = true;
                        self.shutdown(event_loop);
                    }
                }
            }

            WindowEvent::KeyboardInput { event, .. } => {
                if event.state.is_pressed()
                    && event.physical_key == PhysicalKey::Code(KeyCode::Escape)
                {
                    log::info!("ESC pressed, exiting...");
                    self.shutdown(event_loop);
                }
            }

            _ => {}
        }
    }

    /// Request continuous redraws
    fn about_to_wait(&mut self, _event_loop: &ActiveEventLoop) {
        if self.renderer.is_some() {
            if let Some(ref window) = self.window {
                window.request_redraw();
            }
        }
    }

    fn exiting(&mut self, _event_loop: &ActiveEventLoop) {
        if let Some(renderer) = self.renderer.take() {
            renderer.cleanup();
        }
    }
}
