// GPU backend seam
//
// Every Vulkan call the renderer core makes goes through `GpuBackend`.
// The methods take the same ash create-info structs the driver consumes, so
// the core builds its state exactly as it would against a raw `ash::Device`,
// while tests can swap in a recording backend.

pub mod vulkan;

pub use vulkan::VulkanBackend;

use ash::prelude::VkResult;
use ash::vk;
use ash::vk::Handle;

/// What a single queue family can do for this renderer.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct QueueFamilySupport {
    pub queue_count: u32,
    pub graphics: bool,
    /// Can present to the bound surface
    pub present: bool,
}

/// A long-lived GPU object that must be explicitly destroyed.
///
/// Command buffers are not listed: they are freed with their pool.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum GpuResource {
    Instance(vk::Instance),
    DebugMessenger(vk::DebugUtilsMessengerEXT),
    Surface(vk::SurfaceKHR),
    Device(vk::Device),
    Swapchain(vk::SwapchainKHR),
    ImageView(vk::ImageView),
    RenderPass(vk::RenderPass),
    ShaderModule(vk::ShaderModule),
    PipelineLayout(vk::PipelineLayout),
    Pipeline(vk::Pipeline),
    Framebuffer(vk::Framebuffer),
    CommandPool(vk::CommandPool),
    Semaphore(vk::Semaphore),
    Fence(vk::Fence),
}

impl GpuResource {
    /// Short, stable name of the object type (used in logs)
    pub fn kind(&self) -> &'static str {
        match self {
            Self::Instance(_) => "instance",
            Self::DebugMessenger(_) => "debug_messenger",
            Self::Surface(_) => "surface",
            Self::Device(_) => "device",
            Self::Swapchain(_) => "swapchain",
            Self::ImageView(_) => "image_view",
            Self::RenderPass(_) => "render_pass",
            Self::ShaderModule(_) => "shader_module",
            Self::PipelineLayout(_) => "pipeline_layout",
            Self::Pipeline(_) => "pipeline",
            Self::Framebuffer(_) => "framebuffer",
            Self::CommandPool(_) => "command_pool",
            Self::Semaphore(_) => "semaphore",
            Self::Fence(_) => "fence",
        }
    }

    /// Raw 64-bit handle value
    pub fn raw(&self) -> u64 {
        match *self {
            Self::Instance(h) => h.as_raw(),
            Self::DebugMessenger(h) => h.as_raw(),
            Self::Surface(h) => h.as_raw(),
            Self::Device(h) => h.as_raw(),
            Self::Swapchain(h) => h.as_raw(),
            Self::ImageView(h) => h.as_raw(),
            Self::RenderPass(h) => h.as_raw(),
            Self::ShaderModule(h) => h.as_raw(),
            Self::PipelineLayout(h) => h.as_raw(),
            Self::Pipeline(h) => h.as_raw(),
            Self::Framebuffer(h) => h.as_raw(),
            Self::CommandPool(h) => h.as_raw(),
            Self::Semaphore(h) => h.as_raw(),
            Self::Fence(h) => h.as_raw(),
        }
    }
}

/// The GPU calls the renderer core depends on.
///
/// A backend is bound to one presentation target (window) for its lifetime.
/// Instance- and device-level objects created through it are owned by the
/// caller and handed back through [`GpuBackend::destroy`].
pub trait GpuBackend {
    // ---- instance level ---------------------------------------------------

    /// Names of the instance layers the loader exposes
    fn instance_layers(&self) -> VkResult<Vec<String>>;

    /// Names of the instance extensions the loader exposes
    fn instance_extensions(&self) -> VkResult<Vec<String>>;

    /// Instance extensions the window system needs to create a surface
    fn surface_extensions(&self) -> VkResult<Vec<String>>;

    fn create_instance(&mut self, info: &vk::InstanceCreateInfo) -> VkResult<vk::Instance>;

    fn create_debug_messenger(
        &mut self,
        info: &vk::DebugUtilsMessengerCreateInfoEXT,
    ) -> VkResult<vk::DebugUtilsMessengerEXT>;

    /// Create the presentable surface for the bound window
    fn create_surface(&mut self) -> VkResult<vk::SurfaceKHR>;

    /// Current framebuffer size of the bound window, in pixels
    fn framebuffer_size(&self) -> vk::Extent2D;

    // ---- adapter queries --------------------------------------------------

    fn enumerate_adapters(&self) -> VkResult<Vec<vk::PhysicalDevice>>;

    fn adapter_name(&self, adapter: vk::PhysicalDevice) -> String;

    fn queue_families(
        &self,
        adapter: vk::PhysicalDevice,
        surface: vk::SurfaceKHR,
    ) -> VkResult<Vec<QueueFamilySupport>>;

    fn device_extensions(&self, adapter: vk::PhysicalDevice) -> VkResult<Vec<String>>;

    fn surface_capabilities(
        &self,
        adapter: vk::PhysicalDevice,
        surface: vk::SurfaceKHR,
    ) -> VkResult<vk::SurfaceCapabilitiesKHR>;

    fn surface_formats(
        &self,
        adapter: vk::PhysicalDevice,
        surface: vk::SurfaceKHR,
    ) -> VkResult<Vec<vk::SurfaceFormatKHR>>;

    fn present_modes(
        &self,
        adapter: vk::PhysicalDevice,
        surface: vk::SurfaceKHR,
    ) -> VkResult<Vec<vk::PresentModeKHR>>;

    // ---- device level -----------------------------------------------------

    fn create_device(
        &mut self,
        adapter: vk::PhysicalDevice,
        info: &vk::DeviceCreateInfo,
    ) -> VkResult<vk::Device>;

    fn device_queue(&self, family: u32, index: u32) -> VkResult<vk::Queue>;

    fn create_swapchain(&mut self, info: &vk::SwapchainCreateInfoKHR) -> VkResult<vk::SwapchainKHR>;

    fn swapchain_images(&self, swapchain: vk::SwapchainKHR) -> VkResult<Vec<vk::Image>>;

    fn create_image_view(&mut self, info: &vk::ImageViewCreateInfo) -> VkResult<vk::ImageView>;

    fn create_render_pass(&mut self, info: &vk::RenderPassCreateInfo) -> VkResult<vk::RenderPass>;

    fn create_shader_module(
        &mut self,
        info: &vk::ShaderModuleCreateInfo,
    ) -> VkResult<vk::ShaderModule>;

    fn create_pipeline_layout(
        &mut self,
        info: &vk::PipelineLayoutCreateInfo,
    ) -> VkResult<vk::PipelineLayout>;

    fn create_graphics_pipeline(
        &mut self,
        info: &vk::GraphicsPipelineCreateInfo,
    ) -> VkResult<vk::Pipeline>;

    fn create_framebuffer(&mut self, info: &vk::FramebufferCreateInfo) -> VkResult<vk::Framebuffer>;

    fn create_command_pool(
        &mut self,
        info: &vk::CommandPoolCreateInfo,
    ) -> VkResult<vk::CommandPool>;

    fn allocate_command_buffers(
        &mut self,
        info: &vk::CommandBufferAllocateInfo,
    ) -> VkResult<Vec<vk::CommandBuffer>>;

    fn create_semaphore(&mut self, info: &vk::SemaphoreCreateInfo) -> VkResult<vk::Semaphore>;

    fn create_fence(&mut self, info: &vk::FenceCreateInfo) -> VkResult<vk::Fence>;

    // ---- command recording ------------------------------------------------

    fn begin_command_buffer(
        &mut self,
        command_buffer: vk::CommandBuffer,
        info: &vk::CommandBufferBeginInfo,
    ) -> VkResult<()>;

    fn cmd_begin_render_pass(
        &mut self,
        command_buffer: vk::CommandBuffer,
        info: &vk::RenderPassBeginInfo,
        contents: vk::SubpassContents,
    ) -> VkResult<()>;

    fn cmd_bind_pipeline(
        &mut self,
        command_buffer: vk::CommandBuffer,
        bind_point: vk::PipelineBindPoint,
        pipeline: vk::Pipeline,
    ) -> VkResult<()>;

    fn cmd_set_viewport(
        &mut self,
        command_buffer: vk::CommandBuffer,
        viewports: &[vk::Viewport],
    ) -> VkResult<()>;

    fn cmd_set_scissor(
        &mut self,
        command_buffer: vk::CommandBuffer,
        scissors: &[vk::Rect2D],
    ) -> VkResult<()>;

    fn cmd_draw(
        &mut self,
        command_buffer: vk::CommandBuffer,
        vertex_count: u32,
        instance_count: u32,
        first_vertex: u32,
        first_instance: u32,
    ) -> VkResult<()>;

    fn cmd_end_render_pass(&mut self, command_buffer: vk::CommandBuffer) -> VkResult<()>;

    fn end_command_buffer(&mut self, command_buffer: vk::CommandBuffer) -> VkResult<()>;

    // ---- frame loop -------------------------------------------------------

    fn wait_for_fences(&mut self, fences: &[vk::Fence], timeout: u64) -> VkResult<()>;

    fn reset_fences(&mut self, fences: &[vk::Fence]) -> VkResult<()>;

    /// Returns the image index and whether the swapchain is suboptimal
    fn acquire_next_image(
        &mut self,
        swapchain: vk::SwapchainKHR,
        timeout: u64,
        semaphore: vk::Semaphore,
    ) -> VkResult<(u32, bool)>;

    fn queue_submit(
        &mut self,
        queue: vk::Queue,
        submits: &[vk::SubmitInfo],
        fence: vk::Fence,
    ) -> VkResult<()>;

    /// Returns whether the swapchain is suboptimal
    fn queue_present(&mut self, queue: vk::Queue, info: &vk::PresentInfoKHR) -> VkResult<bool>;

    fn device_wait_idle(&mut self) -> VkResult<()>;

    // ---- teardown ---------------------------------------------------------

    fn destroy(&mut self, resource: GpuResource);
}
