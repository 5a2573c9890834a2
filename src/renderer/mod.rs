// Renderer core
//
// Owns every GPU object for one window. Construction runs the fixed
// sequence instance -> surface -> adapter -> device -> swapchain -> render
// pass -> pipeline -> framebuffers -> command pool -> command buffers ->
// recording -> sync objects. Each object lands on a `ResourceStack`, which
// tears everything down in reverse on cleanup, on drop, or when a step fails.

pub mod device;
pub mod frame;
pub mod instance;
pub mod pipeline;
pub mod resources;
pub mod shader;
pub mod swapchain;
pub mod sync;

use ash::vk;

use crate::backend::GpuBackend;
use crate::config::Config;
use crate::error::RendererResult;

use device::{LogicalDevice, SelectedAdapter};
use frame::DrawParams;
use pipeline::{GraphicsPipeline, PipelineConfig};
use resources::ResourceStack;
use shader::ShaderSet;
use swapchain::SwapchainState;
use sync::{FrameLoop, FrameStage, FrameTargets};

/// Renderer inputs taken from the application config
#[derive(Debug, Clone)]
pub struct RendererSettings {
    pub app_name: String,
    pub enable_validation: bool,
    pub clear_color: [f32; 4],
    pub frames_in_flight: usize,
    pub dynamic_viewport: bool,
}

impl Default for RendererSettings {
    fn default() -> Self {
        Self {
            app_name: "Vulkan Renderer".to_string(),
            enable_validation: false,
            clear_color: [0.6, 0.65, 0.4, 1.0],
            frames_in_flight: 2,
            dynamic_viewport: false,
        }
    }
}

impl RendererSettings {
    /// Validation is only ever enabled in debug builds
    pub fn from_config(config: &Config) -> Self {
        Self {
            app_name: config.window.title.clone(),
            enable_validation: cfg!(debug_assertions) && config.debug.validation_layers,
            clear_color: config.graphics.clear_color,
            frames_in_flight: config.graphics.max_frames_in_flight.max(1),
            dynamic_viewport: config.graphics.dynamic_viewport,
        }
    }
}

/// A fully constructed renderer for one presentation target.
///
/// Teardown happens exactly once, through [`Renderer::cleanup`] or on drop.
/// `cleanup` takes the renderer by value, so it cannot be called twice:
///
/// ```compile_fail
/// use triangle_renderer::{GpuBackend, Renderer};
///
/// fn shutdown_twice<B: GpuBackend>(renderer: Renderer<B>) {
///     renderer.cleanup();
///     renderer.cleanup();
/// }
/// ```
pub struct Renderer<B: GpuBackend> {
    backend: B,
    resources: ResourceStack,
    adapter: SelectedAdapter,
    device: LogicalDevice,
    swapchain: SwapchainState,
    render_pass: vk::RenderPass,
    pipeline: GraphicsPipeline,
    framebuffers: Vec<vk::Framebuffer>,
    command_pool: vk::CommandPool,
    targets: FrameTargets,
    frame_loop: FrameLoop,
}

/// Handles produced by a successful construction, before the renderer exists
struct Built {
    adapter: SelectedAdapter,
    device: LogicalDevice,
    swapchain: SwapchainState,
    render_pass: vk::RenderPass,
    pipeline: GraphicsPipeline,
    framebuffers: Vec<vk::Framebuffer>,
    command_pool: vk::CommandPool,
    targets: FrameTargets,
    frame_loop: FrameLoop,
}

impl<B: GpuBackend> Renderer<B> {
    /// Build every GPU object and record the command buffers.
    ///
    /// If any step fails, everything created so far is released in reverse
    /// order before the error is returned.
    pub fn init(
        mut backend: B,
        settings: &RendererSettings,
        shaders: &ShaderSet,
    ) -> RendererResult<Self> {
        log::info!("Initializing renderer '{}'", settings.app_name);

        let mut resources = ResourceStack::new();
        match build(&mut backend, &mut resources, settings, shaders) {
            Ok(built) => {
                log::info!("Renderer ready ({} GPU objects)", resources.len());
                Ok(Self {
                    backend,
                    resources,
                    adapter: built.adapter,
                    device: built.device,
                    swapchain: built.swapchain,
                    render_pass: built.render_pass,
                    pipeline: built.pipeline,
                    framebuffers: built.framebuffers,
                    command_pool: built.command_pool,
                    targets: built.targets,
                    frame_loop: built.frame_loop,
                })
            }
            Err(e) => {
                log::error!("Renderer initialization failed: {}", e);
                resources.release_all(&mut backend);
                Err(e)
            }
        }
    }

    /// Acquire an image, submit its command buffer and present it
    pub fn draw_frame(&mut self) -> RendererResult<()> {
        self.frame_loop
            .draw_frame(&mut self.backend, &self.targets)
            .map(|_| ())
    }

    /// Wait for the device to go idle, then destroy everything in reverse
    /// creation order
    pub fn cleanup(mut self) {
        self.teardown();
    }

    fn teardown(&mut self) {
        if self.resources.is_empty() {
            return;
        }
        log::info!(
            "Cleaning up renderer after {} frames",
            self.frame_loop.frames_rendered()
        );
        self.resources.release_all(&mut self.backend);
        log::info!("Cleanup complete");
    }

    pub fn backend(&self) -> &B {
        &self.backend
    }

    pub fn adapter_name(&self) -> &str {
        &self.adapter.name
    }

    pub fn device(&self) -> &LogicalDevice {
        &self.device
    }

    pub fn extent(&self) -> vk::Extent2D {
        self.swapchain.extent
    }

    pub fn image_count(&self) -> usize {
        self.swapchain.image_count()
    }

    pub fn present_mode(&self) -> vk::PresentModeKHR {
        self.swapchain.present_mode
    }

    pub fn surface_format(&self) -> vk::SurfaceFormatKHR {
        vk::SurfaceFormatKHR {
            format: self.swapchain.format,
            color_space: self.swapchain.color_space,
        }
    }

    pub fn render_pass(&self) -> vk::RenderPass {
        self.render_pass
    }

    pub fn pipeline(&self) -> &GraphicsPipeline {
        &self.pipeline
    }

    pub fn framebuffers(&self) -> &[vk::Framebuffer] {
        &self.framebuffers
    }

    pub fn command_pool(&self) -> vk::CommandPool {
        self.command_pool
    }

    pub fn command_buffers(&self) -> &[vk::CommandBuffer] {
        &self.targets.command_buffers
    }

    pub fn frame_stage(&self) -> FrameStage {
        self.frame_loop.stage()
    }

    pub fn frames_rendered(&self) -> u64 {
        self.frame_loop.frames_rendered()
    }

    /// Number of frame-in-flight sync slots
    pub fn frames_in_flight(&self) -> usize {
        self.frame_loop.slots().len()
    }
}

impl<B: GpuBackend> Drop for Renderer<B> {
    fn drop(&mut self) {
        self.teardown();
    }
}

fn build<B: GpuBackend>(
    backend: &mut B,
    resources: &mut ResourceStack,
    settings: &RendererSettings,
    shaders: &ShaderSet,
) -> RendererResult<Built> {
    let handles = instance::create_instance_and_surface(
        backend,
        resources,
        &settings.app_name,
        settings.enable_validation,
    )?;

    let adapter = device::select_adapter(backend, handles.surface)?;
    let logical_device = device::create_logical_device(backend, resources, &adapter)?;

    let swapchain = swapchain::create_swapchain(
        backend,
        resources,
        &adapter,
        &logical_device,
        handles.surface,
    )?;

    let render_pass = pipeline::create_render_pass(backend, resources, swapchain.format)?;

    let pipeline_config = PipelineConfig {
        dynamic_viewport: settings.dynamic_viewport,
        ..PipelineConfig::for_extent(swapchain.extent)
    };
    let graphics_pipeline = pipeline::create_graphics_pipeline(
        backend,
        resources,
        render_pass,
        &pipeline_config,
        &shaders.vertex,
        &shaders.fragment,
    )?;

    let framebuffers = frame::create_framebuffers(
        backend,
        resources,
        render_pass,
        &swapchain.image_views,
        swapchain.extent,
    )?;

    let command_pool =
        frame::create_command_pool(backend, resources, logical_device.graphics_family)?;
    let command_buffers =
        frame::allocate_command_buffers(backend, command_pool, framebuffers.len())?;

    let draw_params = DrawParams {
        render_pass,
        pipeline: graphics_pipeline.pipeline,
        extent: swapchain.extent,
        clear_color: settings.clear_color,
        dynamic_viewport: settings.dynamic_viewport,
    };
    frame::record_commands(backend, &command_buffers, &framebuffers, &draw_params)?;

    let frame_loop = FrameLoop::new(
        backend,
        resources,
        settings.frames_in_flight,
        swapchain.image_count(),
    )?;

    let targets = FrameTargets {
        swapchain: swapchain.swapchain,
        graphics_queue: logical_device.graphics_queue,
        present_queue: logical_device.present_queue,
        command_buffers,
    };

    Ok(Built {
        adapter,
        device: logical_device,
        swapchain,
        render_pass,
        pipeline: graphics_pipeline,
        framebuffers,
        command_pool,
        targets,
        frame_loop,
    })
}
