// Framebuffers and command buffers
//
// One framebuffer and one primary command buffer per swapchain image. The
// command buffers are recorded once after creation and replayed every frame.

use ash::vk;

use crate::backend::{GpuBackend, GpuResource};
use crate::error::{RendererError, RendererResult};
use crate::renderer::pipeline::{full_scissor, full_viewport};
use crate::renderer::resources::ResourceStack;

/// Vertices drawn per frame; generated by the vertex shader
pub const TRIANGLE_VERTEX_COUNT: u32 = 3;

/// One framebuffer per image view, wrapping that view as the only attachment
pub fn create_framebuffers<B: GpuBackend>(
    backend: &mut B,
    resources: &mut ResourceStack,
    render_pass: vk::RenderPass,
    image_views: &[vk::ImageView],
    extent: vk::Extent2D,
) -> RendererResult<Vec<vk::Framebuffer>> {
    let framebuffers = image_views
        .iter()
        .map(|&image_view| {
            let attachments = [image_view];
            let framebuffer_info = vk::FramebufferCreateInfo::builder()
                .render_pass(render_pass)
                .attachments(&attachments)
                .width(extent.width)
                .height(extent.height)
                .layers(1);

            let framebuffer = backend
                .create_framebuffer(&framebuffer_info)
                .map_err(RendererError::FramebufferCreationFailed)?;
            resources.push(GpuResource::Framebuffer(framebuffer));
            Ok(framebuffer)
        })
        .collect::<RendererResult<Vec<_>>>()?;

    log::info!("Created {} framebuffers", framebuffers.len());
    Ok(framebuffers)
}

/// Pool on the graphics family; buffers are never reset individually
pub fn create_command_pool<B: GpuBackend>(
    backend: &mut B,
    resources: &mut ResourceStack,
    graphics_family: u32,
) -> RendererResult<vk::CommandPool> {
    let pool_info = vk::CommandPoolCreateInfo::builder()
        .flags(vk::CommandPoolCreateFlags::empty())
        .queue_family_index(graphics_family);

    let pool = backend
        .create_command_pool(&pool_info)
        .map_err(RendererError::CommandPoolCreationFailed)?;
    resources.push(GpuResource::CommandPool(pool));
    Ok(pool)
}

/// Allocate `count` primary buffers in one call. They are freed with the pool.
pub fn allocate_command_buffers<B: GpuBackend>(
    backend: &mut B,
    pool: vk::CommandPool,
    count: usize,
) -> RendererResult<Vec<vk::CommandBuffer>> {
    let alloc_info = vk::CommandBufferAllocateInfo::builder()
        .command_pool(pool)
        .level(vk::CommandBufferLevel::PRIMARY)
        .command_buffer_count(count as u32);

    let command_buffers = backend
        .allocate_command_buffers(&alloc_info)
        .map_err(RendererError::CommandBufferAllocationFailed)?;

    log::debug!("Allocated {} command buffers", command_buffers.len());
    Ok(command_buffers)
}

/// What every command buffer draws
#[derive(Debug, Clone, Copy)]
pub struct DrawParams {
    pub render_pass: vk::RenderPass,
    pub pipeline: vk::Pipeline,
    pub extent: vk::Extent2D,
    pub clear_color: [f32; 4],
    /// Pipeline expects viewport and scissor from the command buffer
    pub dynamic_viewport: bool,
}

/// Record the clear + triangle draw into each buffer against its framebuffer.
///
/// Buffers are recorded with SIMULTANEOUS_USE so an image can be resubmitted
/// while a previous submission of the same buffer is still pending.
pub fn record_commands<B: GpuBackend>(
    backend: &mut B,
    command_buffers: &[vk::CommandBuffer],
    framebuffers: &[vk::Framebuffer],
    params: &DrawParams,
) -> RendererResult<()> {
    for (&command_buffer, &framebuffer) in command_buffers.iter().zip(framebuffers) {
        record_one(backend, command_buffer, framebuffer, params)
            .map_err(RendererError::CommandRecordingFailed)?;
    }

    log::info!("Recorded {} command buffers", command_buffers.len());
    Ok(())
}

fn record_one<B: GpuBackend>(
    backend: &mut B,
    command_buffer: vk::CommandBuffer,
    framebuffer: vk::Framebuffer,
    params: &DrawParams,
) -> ash::prelude::VkResult<()> {
    let begin_info = vk::CommandBufferBeginInfo::builder()
        .flags(vk::CommandBufferUsageFlags::SIMULTANEOUS_USE);
    backend.begin_command_buffer(command_buffer, &begin_info)?;

    let clear_values = [vk::ClearValue {
        color: vk::ClearColorValue {
            float32: params.clear_color,
        },
    }];

    let render_pass_info = vk::RenderPassBeginInfo::builder()
        .render_pass(params.render_pass)
        .framebuffer(framebuffer)
        .render_area(full_scissor(params.extent))
        .clear_values(&clear_values);

    backend.cmd_begin_render_pass(command_buffer, &render_pass_info, vk::SubpassContents::INLINE)?;
    backend.cmd_bind_pipeline(command_buffer, vk::PipelineBindPoint::GRAPHICS, params.pipeline)?;

    if params.dynamic_viewport {
        backend.cmd_set_viewport(command_buffer, &[full_viewport(params.extent)])?;
        backend.cmd_set_scissor(command_buffer, &[full_scissor(params.extent)])?;
    }

    backend.cmd_draw(command_buffer, TRIANGLE_VERTEX_COUNT, 1, 0, 0)?;
    backend.cmd_end_render_pass(command_buffer)?;
    backend.end_command_buffer(command_buffer)
}
