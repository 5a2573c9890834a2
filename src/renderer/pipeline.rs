// Render pass and graphics pipeline
//
// The render pass describes a single color attachment that is cleared on
// load and handed to the presentation engine at the end. The pipeline is
// fixed at creation: no vertex buffers, vertices come from the shader.

use ash::vk;

use crate::backend::{GpuBackend, GpuResource};
use crate::error::{RendererError, RendererResult};
use crate::renderer::resources::ResourceStack;

const SHADER_ENTRY_POINT: &std::ffi::CStr = c"main";

/// Fixed-function state baked into the pipeline
#[derive(Debug, Clone, Copy)]
pub struct PipelineConfig {
    pub extent: vk::Extent2D,
    pub topology: vk::PrimitiveTopology,
    pub polygon_mode: vk::PolygonMode,
    pub cull_mode: vk::CullModeFlags,
    pub front_face: vk::FrontFace,
    pub blend_enable: bool,
    /// Leave viewport and scissor to the command buffer
    pub dynamic_viewport: bool,
}

impl PipelineConfig {
    /// Triangle list, filled, back-face culled with clockwise fronts, alpha blended
    pub fn for_extent(extent: vk::Extent2D) -> Self {
        Self {
            extent,
            topology: vk::PrimitiveTopology::TRIANGLE_LIST,
            polygon_mode: vk::PolygonMode::FILL,
            cull_mode: vk::CullModeFlags::BACK,
            front_face: vk::FrontFace::CLOCKWISE,
            blend_enable: true,
            dynamic_viewport: false,
        }
    }

    pub fn viewport(&self) -> vk::Viewport {
        full_viewport(self.extent)
    }

    pub fn scissor(&self) -> vk::Rect2D {
        full_scissor(self.extent)
    }
}

/// Viewport covering the whole extent, depth 0..1
pub fn full_viewport(extent: vk::Extent2D) -> vk::Viewport {
    vk::Viewport {
        x: 0.0,
        y: 0.0,
        width: extent.width as f32,
        height: extent.height as f32,
        min_depth: 0.0,
        max_depth: 1.0,
    }
}

pub fn full_scissor(extent: vk::Extent2D) -> vk::Rect2D {
    vk::Rect2D {
        offset: vk::Offset2D { x: 0, y: 0 },
        extent,
    }
}

/// Color attachment transition UNDEFINED -> PRESENT_SRC_KHR, cleared then stored
pub fn color_attachment(format: vk::Format) -> vk::AttachmentDescription {
    vk::AttachmentDescription::builder()
        .format(format)
        .samples(vk::SampleCountFlags::TYPE_1)
        .load_op(vk::AttachmentLoadOp::CLEAR)
        .store_op(vk::AttachmentStoreOp::STORE)
        .stencil_load_op(vk::AttachmentLoadOp::DONT_CARE)
        .stencil_store_op(vk::AttachmentStoreOp::DONT_CARE)
        .initial_layout(vk::ImageLayout::UNDEFINED)
        .final_layout(vk::ImageLayout::PRESENT_SRC_KHR)
        .build()
}

/// External -> subpass 0 and back, both on color attachment output
pub fn subpass_dependencies() -> [vk::SubpassDependency; 2] {
    let color_access =
        vk::AccessFlags::COLOR_ATTACHMENT_READ | vk::AccessFlags::COLOR_ATTACHMENT_WRITE;

    let into_subpass = vk::SubpassDependency::builder()
        .src_subpass(vk::SUBPASS_EXTERNAL)
        .dst_subpass(0)
        .src_stage_mask(vk::PipelineStageFlags::BOTTOM_OF_PIPE)
        .src_access_mask(vk::AccessFlags::MEMORY_READ)
        .dst_stage_mask(vk::PipelineStageFlags::COLOR_ATTACHMENT_OUTPUT)
        .dst_access_mask(color_access)
        .build();

    let out_of_subpass = vk::SubpassDependency::builder()
        .src_subpass(0)
        .dst_subpass(vk::SUBPASS_EXTERNAL)
        .src_stage_mask(vk::PipelineStageFlags::COLOR_ATTACHMENT_OUTPUT)
        .src_access_mask(color_access)
        .dst_stage_mask(vk::PipelineStageFlags::BOTTOM_OF_PIPE)
        .dst_access_mask(vk::AccessFlags::MEMORY_READ)
        .build();

    [into_subpass, out_of_subpass]
}

pub fn create_render_pass<B: GpuBackend>(
    backend: &mut B,
    resources: &mut ResourceStack,
    format: vk::Format,
) -> RendererResult<vk::RenderPass> {
    let attachments = [color_attachment(format)];

    let color_attachment_ref = [vk::AttachmentReference {
        attachment: 0,
        layout: vk::ImageLayout::COLOR_ATTACHMENT_OPTIMAL,
    }];

    let subpasses = [vk::SubpassDescription::builder()
        .pipeline_bind_point(vk::PipelineBindPoint::GRAPHICS)
        .color_attachments(&color_attachment_ref)
        .build()];

    let dependencies = subpass_dependencies();

    let render_pass_info = vk::RenderPassCreateInfo::builder()
        .attachments(&attachments)
        .subpasses(&subpasses)
        .dependencies(&dependencies);

    let render_pass = backend
        .create_render_pass(&render_pass_info)
        .map_err(RendererError::RenderPassCreationFailed)?;
    resources.push(GpuResource::RenderPass(render_pass));

    log::info!("Render pass created ({:?})", format);
    Ok(render_pass)
}

/// Pipeline handle and its (empty) layout
#[derive(Debug, Clone, Copy)]
pub struct GraphicsPipeline {
    pub pipeline: vk::Pipeline,
    pub layout: vk::PipelineLayout,
}

/// Build the pipeline from SPIR-V words.
///
/// The shader modules only live for the duration of this call, whatever
/// the outcome. Layout and pipeline are pushed onto `resources`.
pub fn create_graphics_pipeline<B: GpuBackend>(
    backend: &mut B,
    resources: &mut ResourceStack,
    render_pass: vk::RenderPass,
    config: &PipelineConfig,
    vertex_spirv: &[u32],
    fragment_spirv: &[u32],
) -> RendererResult<GraphicsPipeline> {
    let vert_module = create_shader_module(backend, vertex_spirv)?;
    let frag_module = match create_shader_module(backend, fragment_spirv) {
        Ok(module) => module,
        Err(e) => {
            backend.destroy(GpuResource::ShaderModule(vert_module));
            return Err(e);
        }
    };

    let result = build_pipeline(backend, resources, render_pass, config, vert_module, frag_module);

    backend.destroy(GpuResource::ShaderModule(frag_module));
    backend.destroy(GpuResource::ShaderModule(vert_module));

    result
}

fn create_shader_module<B: GpuBackend>(
    backend: &mut B,
    code: &[u32],
) -> RendererResult<vk::ShaderModule> {
    let create_info = vk::ShaderModuleCreateInfo::builder().code(code);
    backend
        .create_shader_module(&create_info)
        .map_err(RendererError::PipelineCreationFailed)
}

fn build_pipeline<B: GpuBackend>(
    backend: &mut B,
    resources: &mut ResourceStack,
    render_pass: vk::RenderPass,
    config: &PipelineConfig,
    vert_module: vk::ShaderModule,
    frag_module: vk::ShaderModule,
) -> RendererResult<GraphicsPipeline> {
    let shader_stages = [
        vk::PipelineShaderStageCreateInfo::builder()
            .stage(vk::ShaderStageFlags::VERTEX)
            .module(vert_module)
            .name(SHADER_ENTRY_POINT)
            .build(),
        vk::PipelineShaderStageCreateInfo::builder()
            .stage(vk::ShaderStageFlags::FRAGMENT)
            .module(frag_module)
            .name(SHADER_ENTRY_POINT)
            .build(),
    ];

    // No vertex buffers: positions are generated in the vertex shader
    let vertex_input_info = vk::PipelineVertexInputStateCreateInfo::builder();

    let input_assembly = vk::PipelineInputAssemblyStateCreateInfo::builder()
        .topology(config.topology)
        .primitive_restart_enable(false);

    let viewports = [config.viewport()];
    let scissors = [config.scissor()];
    let viewport_state = vk::PipelineViewportStateCreateInfo::builder()
        .viewports(&viewports)
        .scissors(&scissors);

    let rasterizer = vk::PipelineRasterizationStateCreateInfo::builder()
        .depth_clamp_enable(false)
        .rasterizer_discard_enable(false)
        .polygon_mode(config.polygon_mode)
        .line_width(1.0)
        .cull_mode(config.cull_mode)
        .front_face(config.front_face)
        .depth_bias_enable(false);

    let multisampling = vk::PipelineMultisampleStateCreateInfo::builder()
        .sample_shading_enable(false)
        .rasterization_samples(vk::SampleCountFlags::TYPE_1)
        .min_sample_shading(1.0);

    let color_blend_attachments = [vk::PipelineColorBlendAttachmentState::builder()
        .color_write_mask(vk::ColorComponentFlags::RGBA)
        .blend_enable(config.blend_enable)
        .src_color_blend_factor(vk::BlendFactor::SRC_ALPHA)
        .dst_color_blend_factor(vk::BlendFactor::ONE_MINUS_SRC_ALPHA)
        .color_blend_op(vk::BlendOp::ADD)
        .src_alpha_blend_factor(vk::BlendFactor::ONE)
        .dst_alpha_blend_factor(vk::BlendFactor::ZERO)
        .alpha_blend_op(vk::BlendOp::ADD)
        .build()];

    let color_blending = vk::PipelineColorBlendStateCreateInfo::builder()
        .logic_op_enable(false)
        .logic_op(vk::LogicOp::COPY)
        .attachments(&color_blend_attachments)
        .blend_constants([0.0, 0.0, 0.0, 0.0]);

    let dynamic_states = [vk::DynamicState::VIEWPORT, vk::DynamicState::SCISSOR];
    let dynamic_state =
        vk::PipelineDynamicStateCreateInfo::builder().dynamic_states(&dynamic_states);

    // No descriptor sets or push constants
    let layout_info = vk::PipelineLayoutCreateInfo::builder();
    let layout = backend
        .create_pipeline_layout(&layout_info)
        .map_err(RendererError::PipelineCreationFailed)?;
    resources.push(GpuResource::PipelineLayout(layout));

    let mut pipeline_info = vk::GraphicsPipelineCreateInfo::builder()
        .stages(&shader_stages)
        .vertex_input_state(&vertex_input_info)
        .input_assembly_state(&input_assembly)
        .viewport_state(&viewport_state)
        .rasterization_state(&rasterizer)
        .multisample_state(&multisampling)
        .color_blend_state(&color_blending)
        .layout(layout)
        .render_pass(render_pass)
        .subpass(0)
        .base_pipeline_handle(vk::Pipeline::null())
        .base_pipeline_index(-1);
    if config.dynamic_viewport {
        pipeline_info = pipeline_info.dynamic_state(&dynamic_state);
    }

    let pipeline = backend
        .create_graphics_pipeline(&pipeline_info)
        .map_err(RendererError::PipelineCreationFailed)?;
    resources.push(GpuResource::Pipeline(pipeline));

    log::info!(
        "Graphics pipeline created ({}x{}{})",
        config.extent.width,
        config.extent.height,
        if config.dynamic_viewport { ", dynamic viewport" } else { "" }
    );

    Ok(GraphicsPipeline { pipeline, layout })
}
