// Vulkan backend - ash implementation of `GpuBackend`
//
// Responsibilities:
// - Load the Vulkan library and keep the instance/device dispatch tables
// - Bind to a winit window (surface creation + framebuffer size)
// - Forward every core call to the driver
//
// Objects are never destroyed implicitly here: the renderer hands each one
// back through `destroy` in reverse creation order.

use ash::extensions::{ext::DebugUtils, khr};
use ash::prelude::VkResult;
use ash::{vk, Entry};
use raw_window_handle::{HasRawDisplayHandle, HasRawWindowHandle};
use std::ffi::{c_char, CStr};
use std::sync::Arc;
use winit::window::Window;

use super::{GpuBackend, GpuResource, QueueFamilySupport};
use crate::error::RendererResult;

/// ash-backed GPU access bound to one window
pub struct VulkanBackend {
    window: Arc<Window>,

    // Dispatch tables, filled in as the renderer creates the objects
    swapchain_loader: Option<khr::Swapchain>,
    device: Option<ash::Device>,
    surface_loader: Option<khr::Surface>,
    debug_utils: Option<DebugUtils>,
    instance: Option<ash::Instance>,
    entry: Entry,
}

impl VulkanBackend {
    /// Load the Vulkan library and bind the backend to `window`
    pub fn new(window: Arc<Window>) -> RendererResult<Self> {
        let entry = unsafe { Entry::load() }?;
        log::debug!("Vulkan library loaded");

        Ok(Self {
            window,
            swapchain_loader: None,
            device: None,
            surface_loader: None,
            debug_utils: None,
            instance: None,
            entry,
        })
    }

    fn instance(&self) -> VkResult<&ash::Instance> {
        self.instance.as_ref().ok_or(vk::Result::ERROR_INITIALIZATION_FAILED)
    }

    fn surface_loader(&self) -> VkResult<&khr::Surface> {
        self.surface_loader.as_ref().ok_or(vk::Result::ERROR_INITIALIZATION_FAILED)
    }

    fn device(&self) -> VkResult<&ash::Device> {
        self.device.as_ref().ok_or(vk::Result::ERROR_INITIALIZATION_FAILED)
    }

    fn swapchain_loader(&self) -> VkResult<&khr::Swapchain> {
        self.swapchain_loader.as_ref().ok_or(vk::Result::ERROR_INITIALIZATION_FAILED)
    }
}

fn name_to_string(name: &[c_char]) -> String {
    unsafe { CStr::from_ptr(name.as_ptr()) }.to_string_lossy().into_owned()
}

impl GpuBackend for VulkanBackend {
    fn instance_layers(&self) -> VkResult<Vec<String>> {
        let layers = self.entry.enumerate_instance_layer_properties()?;
        Ok(layers.iter().map(|l| name_to_string(&l.layer_name)).collect())
    }

    fn instance_extensions(&self) -> VkResult<Vec<String>> {
        let extensions = self.entry.enumerate_instance_extension_properties(None)?;
        Ok(extensions.iter().map(|e| name_to_string(&e.extension_name)).collect())
    }

    fn surface_extensions(&self) -> VkResult<Vec<String>> {
        let names = ash_window::enumerate_required_extensions(self.window.raw_display_handle())?;
        Ok(names
            .iter()
            .map(|&ptr| unsafe { CStr::from_ptr(ptr) }.to_string_lossy().into_owned())
            .collect())
    }

    fn create_instance(&mut self, info: &vk::InstanceCreateInfo) -> VkResult<vk::Instance> {
        let instance = unsafe { self.entry.create_instance(info, None) }?;
        let handle = instance.handle();

        self.surface_loader = Some(khr::Surface::new(&self.entry, &instance));
        self.debug_utils = Some(DebugUtils::new(&self.entry, &instance));
        self.instance = Some(instance);

        Ok(handle)
    }

    fn create_debug_messenger(
        &mut self,
        info: &vk::DebugUtilsMessengerCreateInfoEXT,
    ) -> VkResult<vk::DebugUtilsMessengerEXT> {
        let debug_utils = self.debug_utils.as_ref().ok_or(vk::Result::ERROR_INITIALIZATION_FAILED)?;
        unsafe { debug_utils.create_debug_utils_messenger(info, None) }
    }

    fn create_surface(&mut self) -> VkResult<vk::SurfaceKHR> {
        let instance = self.instance()?;
        unsafe {
            ash_window::create_surface(
                &self.entry,
                instance,
                self.window.raw_display_handle(),
                self.window.raw_window_handle(),
                None,
            )
        }
    }

    fn framebuffer_size(&self) -> vk::Extent2D {
        let size = self.window.inner_size();
        vk::Extent2D {
            width: size.width,
            height: size.height,
        }
    }

    fn enumerate_adapters(&self) -> VkResult<Vec<vk::PhysicalDevice>> {
        unsafe { self.instance()?.enumerate_physical_devices() }
    }

    fn adapter_name(&self, adapter: vk::PhysicalDevice) -> String {
        match self.instance() {
            Ok(instance) => {
                let props = unsafe { instance.get_physical_device_properties(adapter) };
                name_to_string(&props.device_name)
            }
            Err(_) => String::from("<unknown>"),
        }
    }

    fn queue_families(
        &self,
        adapter: vk::PhysicalDevice,
        surface: vk::SurfaceKHR,
    ) -> VkResult<Vec<QueueFamilySupport>> {
        let instance = self.instance()?;
        let surface_loader = self.surface_loader()?;

        let families = unsafe { instance.get_physical_device_queue_family_properties(adapter) };

        families
            .iter()
            .enumerate()
            .map(|(index, props)| {
                let present = unsafe {
                    surface_loader.get_physical_device_surface_support(
                        adapter,
                        index as u32,
                        surface,
                    )
                }?;
                Ok(QueueFamilySupport {
                    queue_count: props.queue_count,
                    graphics: props.queue_flags.contains(vk::QueueFlags::GRAPHICS),
                    present,
                })
            })
            .collect()
    }

    fn device_extensions(&self, adapter: vk::PhysicalDevice) -> VkResult<Vec<String>> {
        let instance = self.instance()?;
        let extensions = unsafe { instance.enumerate_device_extension_properties(adapter) }?;
        Ok(extensions.iter().map(|e| name_to_string(&e.extension_name)).collect())
    }

    fn surface_capabilities(
        &self,
        adapter: vk::PhysicalDevice,
        surface: vk::SurfaceKHR,
    ) -> VkResult<vk::SurfaceCapabilitiesKHR> {
        unsafe {
            self.surface_loader()?
                .get_physical_device_surface_capabilities(adapter, surface)
        }
    }

    fn surface_formats(
        &self,
        adapter: vk::PhysicalDevice,
        surface: vk::SurfaceKHR,
    ) -> VkResult<Vec<vk::SurfaceFormatKHR>> {
        unsafe { self.surface_loader()?.get_physical_device_surface_formats(adapter, surface) }
    }

    fn present_modes(
        &self,
        adapter: vk::PhysicalDevice,
        surface: vk::SurfaceKHR,
    ) -> VkResult<Vec<vk::PresentModeKHR>> {
        unsafe {
            self.surface_loader()?
                .get_physical_device_surface_present_modes(adapter, surface)
        }
    }

    fn create_device(
        &mut self,
        adapter: vk::PhysicalDevice,
        info: &vk::DeviceCreateInfo,
    ) -> VkResult<vk::Device> {
        let (device, swapchain_loader) = {
            let instance = self.instance()?;
            let device = unsafe { instance.create_device(adapter, info, None) }?;
            let loader = khr::Swapchain::new(instance, &device);
            (device, loader)
        };
        let handle = device.handle();

        self.swapchain_loader = Some(swapchain_loader);
        self.device = Some(device);

        Ok(handle)
    }

    fn device_queue(&self, family: u32, index: u32) -> VkResult<vk::Queue> {
        Ok(unsafe { self.device()?.get_device_queue(family, index) })
    }

    fn create_swapchain(
        &mut self,
        info: &vk::SwapchainCreateInfoKHR,
    ) -> VkResult<vk::SwapchainKHR> {
        unsafe { self.swapchain_loader()?.create_swapchain(info, None) }
    }

    fn swapchain_images(&self, swapchain: vk::SwapchainKHR) -> VkResult<Vec<vk::Image>> {
        unsafe { self.swapchain_loader()?.get_swapchain_images(swapchain) }
    }

    fn create_image_view(&mut self, info: &vk::ImageViewCreateInfo) -> VkResult<vk::ImageView> {
        unsafe { self.device()?.create_image_view(info, None) }
    }

    fn create_render_pass(&mut self, info: &vk::RenderPassCreateInfo) -> VkResult<vk::RenderPass> {
        unsafe { self.device()?.create_render_pass(info, None) }
    }

    fn create_shader_module(
        &mut self,
        info: &vk::ShaderModuleCreateInfo,
    ) -> VkResult<vk::ShaderModule> {
        unsafe { self.device()?.create_shader_module(info, None) }
    }

    fn create_pipeline_layout(
        &mut self,
        info: &vk::PipelineLayoutCreateInfo,
    ) -> VkResult<vk::PipelineLayout> {
        unsafe { self.device()?.create_pipeline_layout(info, None) }
    }

    fn create_graphics_pipeline(
        &mut self,
        info: &vk::GraphicsPipelineCreateInfo,
    ) -> VkResult<vk::Pipeline> {
        let device = self.device()?;
        let pipelines = unsafe {
            device
                .create_graphics_pipelines(
                    vk::PipelineCache::null(),
                    std::slice::from_ref(info),
                    None,
                )
                .map_err(|(_, e)| e)?
        };
        pipelines.first().copied().ok_or(vk::Result::ERROR_UNKNOWN)
    }

    fn create_framebuffer(
        &mut self,
        info: &vk::FramebufferCreateInfo,
    ) -> VkResult<vk::Framebuffer> {
        unsafe { self.device()?.create_framebuffer(info, None) }
    }

    fn create_command_pool(
        &mut self,
        info: &vk::CommandPoolCreateInfo,
    ) -> VkResult<vk::CommandPool> {
        unsafe { self.device()?.create_command_pool(info, None) }
    }

    fn allocate_command_buffers(
        &mut self,
        info: &vk::CommandBufferAllocateInfo,
    ) -> VkResult<Vec<vk::CommandBuffer>> {
        unsafe { self.device()?.allocate_command_buffers(info) }
    }

    fn create_semaphore(&mut self, info: &vk::SemaphoreCreateInfo) -> VkResult<vk::Semaphore> {
        unsafe { self.device()?.create_semaphore(info, None) }
    }

    fn create_fence(&mut self, info: &vk::FenceCreateInfo) -> VkResult<vk::Fence> {
        unsafe { self.device()?.create_fence(info, None) }
    }

    fn begin_command_buffer(
        &mut self,
        command_buffer: vk::CommandBuffer,
        info: &vk::CommandBufferBeginInfo,
    ) -> VkResult<()> {
        unsafe { self.device()?.begin_command_buffer(command_buffer, info) }
    }

    fn cmd_begin_render_pass(
        &mut self,
        command_buffer: vk::CommandBuffer,
        info: &vk::RenderPassBeginInfo,
        contents: vk::SubpassContents,
    ) -> VkResult<()> {
        unsafe { self.device()?.cmd_begin_render_pass(command_buffer, info, contents) };
        Ok(())
    }

    fn cmd_bind_pipeline(
        &mut self,
        command_buffer: vk::CommandBuffer,
        bind_point: vk::PipelineBindPoint,
        pipeline: vk::Pipeline,
    ) -> VkResult<()> {
        unsafe { self.device()?.cmd_bind_pipeline(command_buffer, bind_point, pipeline) };
        Ok(())
    }

    fn cmd_set_viewport(
        &mut self,
        command_buffer: vk::CommandBuffer,
        viewports: &[vk::Viewport],
    ) -> VkResult<()> {
        unsafe { self.device()?.cmd_set_viewport(command_buffer, 0, viewports) };
        Ok(())
    }

    fn cmd_set_scissor(
        &mut self,
        command_buffer: vk::CommandBuffer,
        scissors: &[vk::Rect2D],
    ) -> VkResult<()> {
        unsafe { self.device()?.cmd_set_scissor(command_buffer, 0, scissors) };
        Ok(())
    }

    fn cmd_draw(
        &mut self,
        command_buffer: vk::CommandBuffer,
        vertex_count: u32,
        instance_count: u32,
        first_vertex: u32,
        first_instance: u32,
    ) -> VkResult<()> {
        unsafe {
            self.device()?.cmd_draw(
                command_buffer,
                vertex_count,
                instance_count,
                first_vertex,
                first_instance,
            )
        };
        Ok(())
    }

    fn cmd_end_render_pass(&mut self, command_buffer: vk::CommandBuffer) -> VkResult<()> {
        unsafe { self.device()?.cmd_end_render_pass(command_buffer) };
        Ok(())
    }

    fn end_command_buffer(&mut self, command_buffer: vk::CommandBuffer) -> VkResult<()> {
        unsafe { self.device()?.end_command_buffer(command_buffer) }
    }

    fn wait_for_fences(&mut self, fences: &[vk::Fence], timeout: u64) -> VkResult<()> {
        unsafe { self.device()?.wait_for_fences(fences, true, timeout) }
    }

    fn reset_fences(&mut self, fences: &[vk::Fence]) -> VkResult<()> {
        unsafe { self.device()?.reset_fences(fences) }
    }

    fn acquire_next_image(
        &mut self,
        swapchain: vk::SwapchainKHR,
        timeout: u64,
        semaphore: vk::Semaphore,
    ) -> VkResult<(u32, bool)> {
        unsafe {
            self.swapchain_loader()?
                .acquire_next_image(swapchain, timeout, semaphore, vk::Fence::null())
        }
    }

    fn queue_submit(
        &mut self,
        queue: vk::Queue,
        submits: &[vk::SubmitInfo],
        fence: vk::Fence,
    ) -> VkResult<()> {
        unsafe { self.device()?.queue_submit(queue, submits, fence) }
    }

    fn queue_present(&mut self, queue: vk::Queue, info: &vk::PresentInfoKHR) -> VkResult<bool> {
        unsafe { self.swapchain_loader()?.queue_present(queue, info) }
    }

    fn device_wait_idle(&mut self) -> VkResult<()> {
        unsafe { self.device()?.device_wait_idle() }
    }

    fn destroy(&mut self, resource: GpuResource) {
        log::debug!("Destroying {} {:#x}", resource.kind(), resource.raw());

        unsafe {
            match resource {
                GpuResource::Instance(_) => {
                    self.debug_utils = None;
                    self.surface_loader = None;
                    if let Some(instance) = self.instance.take() {
                        instance.destroy_instance(None);
                    }
                }
                GpuResource::DebugMessenger(messenger) => {
                    if let Some(debug_utils) = &self.debug_utils {
                        debug_utils.destroy_debug_utils_messenger(messenger, None);
                    }
                }
                GpuResource::Surface(surface) => {
                    if let Some(loader) = &self.surface_loader {
                        loader.destroy_surface(surface, None);
                    }
                }
                GpuResource::Device(_) => {
                    self.swapchain_loader = None;
                    if let Some(device) = self.device.take() {
                        device.destroy_device(None);
                    }
                }
                GpuResource::Swapchain(swapchain) => {
                    if let Some(loader) = &self.swapchain_loader {
                        loader.destroy_swapchain(swapchain, None);
                    }
                }
                other => {
                    let Some(device) = &self.device else {
                        log::warn!("Device already destroyed, leaking {}", other.kind());
                        return;
                    };
                    match other {
                        GpuResource::ImageView(h) => device.destroy_image_view(h, None),
                        GpuResource::RenderPass(h) => device.destroy_render_pass(h, None),
                        GpuResource::ShaderModule(h) => device.destroy_shader_module(h, None),
                        GpuResource::PipelineLayout(h) => device.destroy_pipeline_layout(h, None),
                        GpuResource::Pipeline(h) => device.destroy_pipeline(h, None),
                        GpuResource::Framebuffer(h) => device.destroy_framebuffer(h, None),
                        GpuResource::CommandPool(h) => device.destroy_command_pool(h, None),
                        GpuResource::Semaphore(h) => device.destroy_semaphore(h, None),
                        GpuResource::Fence(h) => device.destroy_fence(h, None),
                        _ => unreachable!("instance-level objects handled above"),
                    }
                }
            }
        }
    }
}
