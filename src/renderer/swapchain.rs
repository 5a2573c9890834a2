// Swapchain - Window presentation
//
// Negotiates format, present mode, extent and image count with the surface,
// then creates the chain of presentable images and one view per image.
// There is no recreation path: the swapchain lives as long as the renderer.

use ash::vk;

use crate::backend::{GpuBackend, GpuResource};
use crate::error::{RendererError, RendererResult};
use crate::renderer::device::{LogicalDevice, SelectedAdapter};
use crate::renderer::resources::ResourceStack;

/// Format used when the surface has no preference
pub const DEFAULT_SURFACE_FORMAT: vk::SurfaceFormatKHR = vk::SurfaceFormatKHR {
    format: vk::Format::R8G8B8A8_UNORM,
    color_space: vk::ColorSpaceKHR::SRGB_NONLINEAR,
};

/// Swapchain handle plus the properties fixed at creation
#[derive(Debug, Clone)]
pub struct SwapchainState {
    pub swapchain: vk::SwapchainKHR,
    pub images: Vec<vk::Image>,
    pub image_views: Vec<vk::ImageView>,
    pub format: vk::Format,
    pub color_space: vk::ColorSpaceKHR,
    pub present_mode: vk::PresentModeKHR,
    pub extent: vk::Extent2D,
}

impl SwapchainState {
    pub fn image_count(&self) -> usize {
        self.images.len()
    }
}

/// Prefer 8-bit RGBA/BGRA UNORM with sRGB-nonlinear color space.
///
/// A single `UNDEFINED` entry means "anything goes" and yields
/// [`DEFAULT_SURFACE_FORMAT`]; with no match the first entry is used.
pub fn choose_surface_format(formats: &[vk::SurfaceFormatKHR]) -> vk::SurfaceFormatKHR {
    if formats.len() == 1 && formats[0].format == vk::Format::UNDEFINED {
        return DEFAULT_SURFACE_FORMAT;
    }

    formats
        .iter()
        .find(|f| {
            (f.format == vk::Format::R8G8B8A8_UNORM || f.format == vk::Format::B8G8R8A8_UNORM)
                && f.color_space == vk::ColorSpaceKHR::SRGB_NONLINEAR
        })
        .or_else(|| formats.first())
        .copied()
        .unwrap_or(DEFAULT_SURFACE_FORMAT)
}

/// MAILBOX if offered, otherwise FIFO (always supported)
pub fn choose_present_mode(present_modes: &[vk::PresentModeKHR]) -> vk::PresentModeKHR {
    present_modes
        .iter()
        .copied()
        .find(|&mode| mode == vk::PresentModeKHR::MAILBOX)
        .unwrap_or(vk::PresentModeKHR::FIFO)
}

/// The surface's current extent, or the framebuffer size clamped into the
/// surface bounds when the current extent is the `u32::MAX` sentinel
pub fn choose_extent(
    caps: &vk::SurfaceCapabilitiesKHR,
    framebuffer_size: vk::Extent2D,
) -> vk::Extent2D {
    if caps.current_extent.width != u32::MAX {
        return caps.current_extent;
    }

    vk::Extent2D {
        width: framebuffer_size
            .width
            .clamp(caps.min_image_extent.width, caps.max_image_extent.width),
        height: framebuffer_size
            .height
            .clamp(caps.min_image_extent.height, caps.max_image_extent.height),
    }
}

/// One more than the minimum, capped by the maximum (0 = unbounded)
pub fn choose_image_count(caps: &vk::SurfaceCapabilitiesKHR) -> u32 {
    let image_count = caps.min_image_count + 1;
    if caps.max_image_count > 0 && image_count > caps.max_image_count {
        caps.max_image_count
    } else {
        image_count
    }
}

/// CONCURRENT when graphics and present families differ, else EXCLUSIVE.
/// Returns the mode and the family list to declare with it.
pub fn choose_sharing_mode(
    graphics_family: u32,
    present_family: u32,
) -> (vk::SharingMode, Vec<u32>) {
    if graphics_family != present_family {
        (vk::SharingMode::CONCURRENT, vec![graphics_family, present_family])
    } else {
        (vk::SharingMode::EXCLUSIVE, Vec::new())
    }
}

pub fn create_swapchain<B: GpuBackend>(
    backend: &mut B,
    resources: &mut ResourceStack,
    adapter: &SelectedAdapter,
    device: &LogicalDevice,
    surface: vk::SurfaceKHR,
) -> RendererResult<SwapchainState> {
    let physical_device = adapter.physical_device;

    let surface_caps = backend
        .surface_capabilities(physical_device, surface)
        .map_err(RendererError::SwapchainCreationFailed)?;
    let formats = backend
        .surface_formats(physical_device, surface)
        .map_err(RendererError::SwapchainCreationFailed)?;
    let present_modes = backend
        .present_modes(physical_device, surface)
        .map_err(RendererError::SwapchainCreationFailed)?;

    let surface_format = choose_surface_format(&formats);
    let present_mode = choose_present_mode(&present_modes);
    let extent = choose_extent(&surface_caps, backend.framebuffer_size());
    let image_count = choose_image_count(&surface_caps);

    log::info!(
        "Creating swapchain: {}x{}, {:?}/{:?}, {:?}, {} images requested",
        extent.width,
        extent.height,
        surface_format.format,
        surface_format.color_space,
        present_mode,
        image_count
    );

    let (sharing_mode, queue_family_indices) =
        choose_sharing_mode(device.graphics_family, device.present_family);

    let create_info = vk::SwapchainCreateInfoKHR::builder()
        .surface(surface)
        .min_image_count(image_count)
        .image_format(surface_format.format)
        .image_color_space(surface_format.color_space)
        .image_extent(extent)
        .image_array_layers(1)
        .image_usage(vk::ImageUsageFlags::COLOR_ATTACHMENT)
        .image_sharing_mode(sharing_mode)
        .queue_family_indices(&queue_family_indices)
        .pre_transform(surface_caps.current_transform)
        .composite_alpha(vk::CompositeAlphaFlagsKHR::OPAQUE)
        .present_mode(present_mode)
        .clipped(true)
        .old_swapchain(vk::SwapchainKHR::null());

    let swapchain = backend
        .create_swapchain(&create_info)
        .map_err(RendererError::SwapchainCreationFailed)?;
    resources.push(GpuResource::Swapchain(swapchain));

    let images = backend
        .swapchain_images(swapchain)
        .map_err(RendererError::SwapchainCreationFailed)?;

    log::info!("Created swapchain with {} images", images.len());

    let image_views = images
        .iter()
        .map(|&image| {
            let view = create_image_view(
                backend,
                image,
                surface_format.format,
                vk::ImageAspectFlags::COLOR,
            )?;
            resources.push(GpuResource::ImageView(view));
            Ok(view)
        })
        .collect::<RendererResult<Vec<_>>>()?;

    Ok(SwapchainState {
        swapchain,
        images,
        image_views,
        format: surface_format.format,
        color_space: surface_format.color_space,
        present_mode,
        extent,
    })
}

/// 2D view, identity swizzle, one mip level and array layer
fn create_image_view<B: GpuBackend>(
    backend: &mut B,
    image: vk::Image,
    format: vk::Format,
    aspect_flags: vk::ImageAspectFlags,
) -> RendererResult<vk::ImageView> {
    let create_info = vk::ImageViewCreateInfo::builder()
        .image(image)
        .view_type(vk::ImageViewType::TYPE_2D)
        .format(format)
        .components(vk::ComponentMapping {
            r: vk::ComponentSwizzle::IDENTITY,
            g: vk::ComponentSwizzle::IDENTITY,
            b: vk::ComponentSwizzle::IDENTITY,
            a: vk::ComponentSwizzle::IDENTITY,
        })
        .subresource_range(vk::ImageSubresourceRange {
            aspect_mask: aspect_flags,
            base_mip_level: 0,
            level_count: 1,
            base_array_layer: 0,
            layer_count: 1,
        });

    backend
        .create_image_view(&create_info)
        .map_err(RendererError::SwapchainCreationFailed)
}
