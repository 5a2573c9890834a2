//! Recording GPU backend for integration tests.
//!
//! Hands out fresh fake handles, logs every create/destroy/record/submit in
//! order and can be told to fail a specific step.

#![allow(dead_code)]

use ash::prelude::VkResult;
use ash::vk::{self, Handle};
use std::cell::RefCell;
use std::rc::Rc;
use triangle_renderer::{
    GpuBackend, GpuResource, QueueFamilySupport, RendererSettings, ShaderSet,
};

pub const VALIDATION_LAYER: &str = "VK_LAYER_KHRONOS_validation";
pub const DEBUG_UTILS: &str = "VK_EXT_debug_utils";

#[derive(Debug, Clone, PartialEq)]
pub enum Event {
    Create(GpuResource),
    Destroy(GpuResource),
    AllocateCommandBuffers(Vec<vk::CommandBuffer>),
    Record(vk::CommandBuffer, &'static str),
    WaitFences(Vec<vk::Fence>),
    ResetFences(Vec<vk::Fence>),
    Acquire {
        image: u32,
        semaphore: vk::Semaphore,
    },
    Submit {
        command_buffer: vk::CommandBuffer,
        wait: vk::Semaphore,
        wait_stage: vk::PipelineStageFlags,
        signal: vk::Semaphore,
        fence: vk::Fence,
    },
    Present {
        image: u32,
        wait: vk::Semaphore,
    },
    WaitIdle,
}

#[derive(Debug, Clone)]
pub struct MockAdapter {
    pub name: String,
    pub queue_families: Vec<QueueFamilySupport>,
    pub extensions: Vec<String>,
    pub formats: Vec<vk::SurfaceFormatKHR>,
    pub present_modes: Vec<vk::PresentModeKHR>,
}

impl MockAdapter {
    /// One family doing graphics and present, swapchain support, FIFO + MAILBOX
    pub fn suitable(name: &str) -> Self {
        Self {
            name: name.to_string(),
            queue_families: vec![QueueFamilySupport {
                queue_count: 1,
                graphics: true,
                present: true,
            }],
            extensions: vec!["VK_KHR_swapchain".to_string()],
            formats: vec![vk::SurfaceFormatKHR {
                format: vk::Format::B8G8R8A8_UNORM,
                color_space: vk::ColorSpaceKHR::SRGB_NONLINEAR,
            }],
            present_modes: vec![vk::PresentModeKHR::FIFO, vk::PresentModeKHR::MAILBOX],
        }
    }

    pub fn without_swapchain(name: &str) -> Self {
        Self {
            extensions: vec!["VK_KHR_maintenance1".to_string()],
            ..Self::suitable(name)
        }
    }

    pub fn without_present(name: &str) -> Self {
        Self {
            queue_families: vec![QueueFamilySupport {
                queue_count: 4,
                graphics: true,
                present: false,
            }],
            ..Self::suitable(name)
        }
    }

    /// Graphics on family 0, presentation only on family 1
    pub fn split_families(name: &str) -> Self {
        Self {
            queue_families: vec![
                QueueFamilySupport {
                    queue_count: 1,
                    graphics: true,
                    present: false,
                },
                QueueFamilySupport {
                    queue_count: 1,
                    graphics: false,
                    present: true,
                },
            ],
            ..Self::suitable(name)
        }
    }
}

/// Fixed-function state read back from a graphics pipeline create info
#[derive(Debug, Clone, Copy)]
pub struct PipelineState {
    pub stage_count: u32,
    pub vertex_binding_count: u32,
    pub vertex_attribute_count: u32,
    pub topology: vk::PrimitiveTopology,
    pub viewport: Option<vk::Viewport>,
    pub scissor: Option<vk::Rect2D>,
    pub polygon_mode: vk::PolygonMode,
    pub cull_mode: vk::CullModeFlags,
    pub front_face: vk::FrontFace,
    pub blend: Option<vk::PipelineColorBlendAttachmentState>,
    pub dynamic_state_count: u32,
}

impl PipelineState {
    /// # Safety
    /// Every fixed-function state pointer in `info` must be valid; only the
    /// dynamic state may be null.
    unsafe fn read(info: &vk::GraphicsPipelineCreateInfo) -> Self {
        let vertex_input = &*info.p_vertex_input_state;
        let input_assembly = &*info.p_input_assembly_state;
        let viewport_state = &*info.p_viewport_state;
        let rasterization = &*info.p_rasterization_state;
        let color_blend = &*info.p_color_blend_state;
        let dynamic_state_count = if info.p_dynamic_state.is_null() {
            0
        } else {
            (*info.p_dynamic_state).dynamic_state_count
        };

        Self {
            stage_count: info.stage_count,
            vertex_binding_count: vertex_input.vertex_binding_description_count,
            vertex_attribute_count: vertex_input.vertex_attribute_description_count,
            topology: input_assembly.topology,
            viewport: read_array(viewport_state.p_viewports, viewport_state.viewport_count)
                .first()
                .copied(),
            scissor: read_array(viewport_state.p_scissors, viewport_state.scissor_count)
                .first()
                .copied(),
            polygon_mode: rasterization.polygon_mode,
            cull_mode: rasterization.cull_mode,
            front_face: rasterization.front_face,
            blend: read_array(color_blend.p_attachments, color_blend.attachment_count)
                .first()
                .copied(),
            dynamic_state_count,
        }
    }
}

/// Copy `count` items out of a create-info array pointer
///
/// # Safety
/// `ptr` must be null or point to at least `count` items.
unsafe fn read_array<T: Copy>(ptr: *const T, count: u32) -> Vec<T> {
    if ptr.is_null() || count == 0 {
        return Vec::new();
    }
    std::slice::from_raw_parts(ptr, count as usize).to_vec()
}

#[derive(Debug)]
pub struct MockState {
    pub events: Vec<Event>,
    pub next_handle: u64,
    pub next_image: u32,

    pub adapters: Vec<MockAdapter>,
    pub layers: Vec<String>,
    pub instance_extensions: Vec<String>,
    pub capabilities: vk::SurfaceCapabilitiesKHR,
    pub framebuffer_size: vk::Extent2D,
    pub image_count: u32,

    /// `GpuResource::kind()` of the create call that should fail
    pub fail_create: Option<&'static str>,
    pub fail_allocate: Option<vk::Result>,
    pub fail_record: Option<vk::Result>,
    pub fail_fence_wait: Option<vk::Result>,
    pub fail_acquire: Option<vk::Result>,
    pub fail_submit: Option<vk::Result>,
    pub fail_present: Option<vk::Result>,
    pub suboptimal: bool,

    // Captured from create infos
    pub device_queue_families: Vec<u32>,
    pub swapchain_sharing_mode: Option<vk::SharingMode>,
    pub swapchain_min_image_count: u32,
    pub swapchain_present_mode: Option<vk::PresentModeKHR>,
    pub pipeline_has_dynamic_state: Option<bool>,
    pub pipeline: Option<PipelineState>,
    pub render_pass_attachments: Vec<vk::AttachmentDescription>,
    pub render_pass_dependencies: Vec<vk::SubpassDependency>,

    // Captured while recording
    pub begin_flags: Vec<vk::CommandBufferUsageFlags>,
    pub render_areas: Vec<vk::Rect2D>,
    pub clear_colors: Vec<[f32; 4]>,
    pub dynamic_viewports: Vec<vk::Viewport>,
    pub dynamic_scissors: Vec<vk::Rect2D>,
    /// `(vertex_count, instance_count, first_vertex, first_instance)`
    pub draws: Vec<(u32, u32, u32, u32)>,
}

impl Default for MockState {
    fn default() -> Self {
        Self {
            events: Vec::new(),
            next_handle: 0x1000,
            next_image: 0,
            adapters: vec![MockAdapter::suitable("Mock GPU")],
            layers: vec![VALIDATION_LAYER.to_string()],
            instance_extensions: vec![
                "VK_KHR_surface".to_string(),
                "VK_KHR_xcb_surface".to_string(),
                DEBUG_UTILS.to_string(),
            ],
            capabilities: vk::SurfaceCapabilitiesKHR {
                min_image_count: 2,
                max_image_count: 0,
                current_extent: vk::Extent2D {
                    width: 800,
                    height: 600,
                },
                min_image_extent: vk::Extent2D { width: 1, height: 1 },
                max_image_extent: vk::Extent2D {
                    width: 4096,
                    height: 4096,
                },
                max_image_array_layers: 1,
                current_transform: vk::SurfaceTransformFlagsKHR::IDENTITY,
                ..Default::default()
            },
            framebuffer_size: vk::Extent2D {
                width: 800,
                height: 600,
            },
            image_count: 3,
            fail_create: None,
            fail_allocate: None,
            fail_record: None,
            fail_fence_wait: None,
            fail_acquire: None,
            fail_submit: None,
            fail_present: None,
            suboptimal: false,
            device_queue_families: Vec::new(),
            swapchain_sharing_mode: None,
            swapchain_min_image_count: 0,
            swapchain_present_mode: None,
            pipeline_has_dynamic_state: None,
            pipeline: None,
            render_pass_attachments: Vec::new(),
            render_pass_dependencies: Vec::new(),
            begin_flags: Vec::new(),
            render_areas: Vec::new(),
            clear_colors: Vec::new(),
            dynamic_viewports: Vec::new(),
            dynamic_scissors: Vec::new(),
            draws: Vec::new(),
        }
    }
}

impl MockState {
    pub fn created(&self) -> Vec<GpuResource> {
        self.events
            .iter()
            .filter_map(|e| match e {
                Event::Create(r) => Some(*r),
                _ => None,
            })
            .collect()
    }

    pub fn destroyed(&self) -> Vec<GpuResource> {
        self.events
            .iter()
            .filter_map(|e| match e {
                Event::Destroy(r) => Some(*r),
                _ => None,
            })
            .collect()
    }

    pub fn created_kinds(&self) -> Vec<&'static str> {
        self.created().iter().map(|r| r.kind()).collect()
    }

    pub fn count_created(&self, kind: &str) -> usize {
        self.created().iter().filter(|r| r.kind() == kind).count()
    }

    /// Created objects that were never destroyed, or destroyed more than once
    pub fn leaks(&self) -> Vec<GpuResource> {
        let destroyed = self.destroyed();
        self.created()
            .into_iter()
            .filter(|r| destroyed.iter().filter(|d| *d == r).count() != 1)
            .collect()
    }

    pub fn frame_events(&self) -> Vec<Event> {
        self.events
            .iter()
            .filter(|e| {
                matches!(
                    e,
                    Event::WaitFences(_)
                        | Event::ResetFences(_)
                        | Event::Acquire { .. }
                        | Event::Submit { .. }
                        | Event::Present { .. }
                )
            })
            .cloned()
            .collect()
    }
}

pub struct MockBackend {
    pub state: Rc<RefCell<MockState>>,
}

impl MockBackend {
    pub fn new() -> (Self, Rc<RefCell<MockState>>) {
        Self::with_state(MockState::default())
    }

    pub fn with_state(state: MockState) -> (Self, Rc<RefCell<MockState>>) {
        let state = Rc::new(RefCell::new(state));
        (
            Self {
                state: Rc::clone(&state),
            },
            state,
        )
    }

    fn create<H: Handle + Copy>(&mut self, wrap: fn(H) -> GpuResource) -> VkResult<H> {
        let mut state = self.state.borrow_mut();
        state.next_handle += 1;
        let handle = H::from_raw(state.next_handle);
        let resource = wrap(handle);
        if state.fail_create == Some(resource.kind()) {
            return Err(vk::Result::ERROR_OUT_OF_DEVICE_MEMORY);
        }
        state.events.push(Event::Create(resource));
        Ok(handle)
    }

    fn adapter(&self, physical_device: vk::PhysicalDevice) -> MockAdapter {
        let index = (physical_device.as_raw() - 1) as usize;
        self.state.borrow().adapters[index].clone()
    }

    fn record(
        &mut self,
        command_buffer: vk::CommandBuffer,
        command: &'static str,
    ) -> VkResult<()> {
        let mut state = self.state.borrow_mut();
        if let Some(e) = state.fail_record {
            return Err(e);
        }
        state.events.push(Event::Record(command_buffer, command));
        Ok(())
    }
}

impl GpuBackend for MockBackend {
    fn instance_layers(&self) -> VkResult<Vec<String>> {
        Ok(self.state.borrow().layers.clone())
    }

    fn instance_extensions(&self) -> VkResult<Vec<String>> {
        Ok(self.state.borrow().instance_extensions.clone())
    }

    fn surface_extensions(&self) -> VkResult<Vec<String>> {
        Ok(vec!["VK_KHR_surface".to_string(), "VK_KHR_xcb_surface".to_string()])
    }

    fn create_instance(&mut self, _info: &vk::InstanceCreateInfo) -> VkResult<vk::Instance> {
        self.create(GpuResource::Instance)
    }

    fn create_debug_messenger(
        &mut self,
        _info: &vk::DebugUtilsMessengerCreateInfoEXT,
    ) -> VkResult<vk::DebugUtilsMessengerEXT> {
        self.create(GpuResource::DebugMessenger)
    }

    fn create_surface(&mut self) -> VkResult<vk::SurfaceKHR> {
        self.create(GpuResource::Surface)
    }

    fn framebuffer_size(&self) -> vk::Extent2D {
        self.state.borrow().framebuffer_size
    }

    fn enumerate_adapters(&self) -> VkResult<Vec<vk::PhysicalDevice>> {
        let count = self.state.borrow().adapters.len() as u64;
        Ok((1..=count).map(vk::PhysicalDevice::from_raw).collect())
    }

    fn adapter_name(&self, adapter: vk::PhysicalDevice) -> String {
        self.adapter(adapter).name
    }

    fn queue_families(
        &self,
        adapter: vk::PhysicalDevice,
        _surface: vk::SurfaceKHR,
    ) -> VkResult<Vec<QueueFamilySupport>> {
        Ok(self.adapter(adapter).queue_families)
    }

    fn device_extensions(&self, adapter: vk::PhysicalDevice) -> VkResult<Vec<String>> {
        Ok(self.adapter(adapter).extensions)
    }

    fn surface_capabilities(
        &self,
        _adapter: vk::PhysicalDevice,
        _surface: vk::SurfaceKHR,
    ) -> VkResult<vk::SurfaceCapabilitiesKHR> {
        Ok(self.state.borrow().capabilities)
    }

    fn surface_formats(
        &self,
        adapter: vk::PhysicalDevice,
        _surface: vk::SurfaceKHR,
    ) -> VkResult<Vec<vk::SurfaceFormatKHR>> {
        Ok(self.adapter(adapter).formats)
    }

    fn present_modes(
        &self,
        adapter: vk::PhysicalDevice,
        _surface: vk::SurfaceKHR,
    ) -> VkResult<Vec<vk::PresentModeKHR>> {
        Ok(self.adapter(adapter).present_modes)
    }

    fn create_device(
        &mut self,
        _adapter: vk::PhysicalDevice,
        info: &vk::DeviceCreateInfo,
    ) -> VkResult<vk::Device> {
        let queue_infos =
            unsafe { read_array(info.p_queue_create_infos, info.queue_create_info_count) };
        let families = queue_infos.iter().map(|q| q.queue_family_index).collect();
        self.state.borrow_mut().device_queue_families = families;
        self.create(GpuResource::Device)
    }

    fn device_queue(&self, family: u32, _index: u32) -> VkResult<vk::Queue> {
        Ok(vk::Queue::from_raw(0x100 + family as u64))
    }

    fn create_swapchain(
        &mut self,
        info: &vk::SwapchainCreateInfoKHR,
    ) -> VkResult<vk::SwapchainKHR> {
        {
            let mut state = self.state.borrow_mut();
            state.swapchain_sharing_mode = Some(info.image_sharing_mode);
            state.swapchain_min_image_count = info.min_image_count;
            state.swapchain_present_mode = Some(info.present_mode);
        }
        self.create(GpuResource::Swapchain)
    }

    fn swapchain_images(&self, _swapchain: vk::SwapchainKHR) -> VkResult<Vec<vk::Image>> {
        let count = self.state.borrow().image_count as u64;
        Ok((0..count).map(|i| vk::Image::from_raw(0x200 + i)).collect())
    }

    fn create_image_view(&mut self, _info: &vk::ImageViewCreateInfo) -> VkResult<vk::ImageView> {
        self.create(GpuResource::ImageView)
    }

    fn create_render_pass(&mut self, info: &vk::RenderPassCreateInfo) -> VkResult<vk::RenderPass> {
        {
            let mut state = self.state.borrow_mut();
            state.render_pass_attachments =
                unsafe { read_array(info.p_attachments, info.attachment_count) };
            state.render_pass_dependencies =
                unsafe { read_array(info.p_dependencies, info.dependency_count) };
        }
        self.create(GpuResource::RenderPass)
    }

    fn create_shader_module(
        &mut self,
        _info: &vk::ShaderModuleCreateInfo,
    ) -> VkResult<vk::ShaderModule> {
        self.create(GpuResource::ShaderModule)
    }

    fn create_pipeline_layout(
        &mut self,
        _info: &vk::PipelineLayoutCreateInfo,
    ) -> VkResult<vk::PipelineLayout> {
        self.create(GpuResource::PipelineLayout)
    }

    fn create_graphics_pipeline(
        &mut self,
        info: &vk::GraphicsPipelineCreateInfo,
    ) -> VkResult<vk::Pipeline> {
        {
            let mut state = self.state.borrow_mut();
            state.pipeline_has_dynamic_state = Some(!info.p_dynamic_state.is_null());
            state.pipeline = Some(unsafe { PipelineState::read(info) });
        }
        self.create(GpuResource::Pipeline)
    }

    fn create_framebuffer(
        &mut self,
        _info: &vk::FramebufferCreateInfo,
    ) -> VkResult<vk::Framebuffer> {
        self.create(GpuResource::Framebuffer)
    }

    fn create_command_pool(
        &mut self,
        _info: &vk::CommandPoolCreateInfo,
    ) -> VkResult<vk::CommandPool> {
        self.create(GpuResource::CommandPool)
    }

    fn allocate_command_buffers(
        &mut self,
        info: &vk::CommandBufferAllocateInfo,
    ) -> VkResult<Vec<vk::CommandBuffer>> {
        let mut state = self.state.borrow_mut();
        if let Some(e) = state.fail_allocate {
            return Err(e);
        }
        let first = state.next_handle + 1;
        state.next_handle += info.command_buffer_count as u64;
        let buffers: Vec<_> = (0..info.command_buffer_count as u64)
            .map(|i| vk::CommandBuffer::from_raw(first + i))
            .collect();
        state.events.push(Event::AllocateCommandBuffers(buffers.clone()));
        Ok(buffers)
    }

    fn create_semaphore(&mut self, _info: &vk::SemaphoreCreateInfo) -> VkResult<vk::Semaphore> {
        self.create(GpuResource::Semaphore)
    }

    fn create_fence(&mut self, _info: &vk::FenceCreateInfo) -> VkResult<vk::Fence> {
        self.create(GpuResource::Fence)
    }

    fn begin_command_buffer(
        &mut self,
        command_buffer: vk::CommandBuffer,
        info: &vk::CommandBufferBeginInfo,
    ) -> VkResult<()> {
        self.state.borrow_mut().begin_flags.push(info.flags);
        self.record(command_buffer, "begin")
    }

    fn cmd_begin_render_pass(
        &mut self,
        command_buffer: vk::CommandBuffer,
        info: &vk::RenderPassBeginInfo,
        _contents: vk::SubpassContents,
    ) -> VkResult<()> {
        {
            let mut state = self.state.borrow_mut();
            state.render_areas.push(info.render_area);
            if info.clear_value_count == 1 {
                let color = unsafe { (*info.p_clear_values).color.float32 };
                state.clear_colors.push(color);
            }
        }
        self.record(command_buffer, "begin_render_pass")
    }

    fn cmd_bind_pipeline(
        &mut self,
        command_buffer: vk::CommandBuffer,
        _bind_point: vk::PipelineBindPoint,
        _pipeline: vk::Pipeline,
    ) -> VkResult<()> {
        self.record(command_buffer, "bind_pipeline")
    }

    fn cmd_set_viewport(
        &mut self,
        command_buffer: vk::CommandBuffer,
        viewports: &[vk::Viewport],
    ) -> VkResult<()> {
        self.state.borrow_mut().dynamic_viewports.extend_from_slice(viewports);
        self.record(command_buffer, "set_viewport")
    }

    fn cmd_set_scissor(
        &mut self,
        command_buffer: vk::CommandBuffer,
        scissors: &[vk::Rect2D],
    ) -> VkResult<()> {
        self.state.borrow_mut().dynamic_scissors.extend_from_slice(scissors);
        self.record(command_buffer, "set_scissor")
    }

    fn cmd_draw(
        &mut self,
        command_buffer: vk::CommandBuffer,
        vertex_count: u32,
        instance_count: u32,
        first_vertex: u32,
        first_instance: u32,
    ) -> VkResult<()> {
        self.state
            .borrow_mut()
            .draws
            .push((vertex_count, instance_count, first_vertex, first_instance));
        self.record(command_buffer, "draw")
    }

    fn cmd_end_render_pass(&mut self, command_buffer: vk::CommandBuffer) -> VkResult<()> {
        self.record(command_buffer, "end_render_pass")
    }

    fn end_command_buffer(&mut self, command_buffer: vk::CommandBuffer) -> VkResult<()> {
        self.record(command_buffer, "end")
    }

    fn wait_for_fences(&mut self, fences: &[vk::Fence], _timeout: u64) -> VkResult<()> {
        let mut state = self.state.borrow_mut();
        if let Some(e) = state.fail_fence_wait {
            return Err(e);
        }
        state.events.push(Event::WaitFences(fences.to_vec()));
        Ok(())
    }

    fn reset_fences(&mut self, fences: &[vk::Fence]) -> VkResult<()> {
        self.state.borrow_mut().events.push(Event::ResetFences(fences.to_vec()));
        Ok(())
    }

    fn acquire_next_image(
        &mut self,
        _swapchain: vk::SwapchainKHR,
        _timeout: u64,
        semaphore: vk::Semaphore,
    ) -> VkResult<(u32, bool)> {
        let mut state = self.state.borrow_mut();
        if let Some(e) = state.fail_acquire {
            return Err(e);
        }
        let image = state.next_image % state.image_count;
        state.next_image += 1;
        state.events.push(Event::Acquire { image, semaphore });
        Ok((image, state.suboptimal))
    }

    fn queue_submit(
        &mut self,
        _queue: vk::Queue,
        submits: &[vk::SubmitInfo],
        fence: vk::Fence,
    ) -> VkResult<()> {
        let mut state = self.state.borrow_mut();
        if let Some(e) = state.fail_submit {
            return Err(e);
        }
        let submit = &submits[0];
        let (command_buffer, wait, wait_stage, signal) = unsafe {
            (
                *submit.p_command_buffers,
                *submit.p_wait_semaphores,
                *submit.p_wait_dst_stage_mask,
                *submit.p_signal_semaphores,
            )
        };
        state.events.push(Event::Submit {
            command_buffer,
            wait,
            wait_stage,
            signal,
            fence,
        });
        Ok(())
    }

    fn queue_present(&mut self, _queue: vk::Queue, info: &vk::PresentInfoKHR) -> VkResult<bool> {
        let mut state = self.state.borrow_mut();
        if let Some(e) = state.fail_present {
            return Err(e);
        }
        let (image, wait) = unsafe { (*info.p_image_indices, *info.p_wait_semaphores) };
        state.events.push(Event::Present { image, wait });
        Ok(state.suboptimal)
    }

    fn device_wait_idle(&mut self) -> VkResult<()> {
        self.state.borrow_mut().events.push(Event::WaitIdle);
        Ok(())
    }

    fn destroy(&mut self, resource: GpuResource) {
        self.state.borrow_mut().events.push(Event::Destroy(resource));
    }
}

/// Non-empty placeholder code; the mock never inspects it
pub fn shaders() -> ShaderSet {
    ShaderSet::new(vec![0x0723_0203, 0x0001_0000], vec![0x0723_0203, 0x0001_0000])
}

pub fn settings() -> RendererSettings {
    RendererSettings {
        app_name: "Mock".to_string(),
        ..RendererSettings::default()
    }
}
