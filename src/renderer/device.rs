// Device selection - adapter suitability + logical device creation
//
// Responsibilities:
// - Gather per-adapter capabilities for the bound surface
// - Pick the first suitable adapter in enumeration order (no scoring)
// - Open a logical device with one queue per distinct family

use ash::vk;
use std::collections::BTreeSet;
use std::ffi::CString;

use crate::backend::{GpuBackend, GpuResource, QueueFamilySupport};
use crate::error::{RendererError, RendererResult};
use crate::renderer::resources::ResourceStack;

/// Device extensions every adapter must support
pub const REQUIRED_DEVICE_EXTENSIONS: &[&str] = &["VK_KHR_swapchain"];

/// Graphics and presentation queue family indices (may coincide)
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct QueueFamilyIndices {
    pub graphics: Option<u32>,
    pub present: Option<u32>,
}

impl QueueFamilyIndices {
    pub fn is_complete(&self) -> bool {
        self.graphics.is_some() && self.present.is_some()
    }

    /// Distinct family indices, for queue creation
    pub fn unique(&self) -> BTreeSet<u32> {
        self.graphics.into_iter().chain(self.present).collect()
    }
}

/// Everything suitability depends on, as reported for one adapter
#[derive(Debug, Clone, Default)]
pub struct AdapterCapabilities {
    pub queue_families: Vec<QueueFamilySupport>,
    pub extensions: Vec<String>,
    pub formats: Vec<vk::SurfaceFormatKHR>,
    pub present_modes: Vec<vk::PresentModeKHR>,
}

/// The adapter the renderer runs on, plus what was learned while choosing it
#[derive(Debug, Clone)]
pub struct SelectedAdapter {
    pub physical_device: vk::PhysicalDevice,
    pub name: String,
    pub queue_families: QueueFamilyIndices,
}

/// Logical device and the queues fetched from it
#[derive(Debug, Clone, Copy)]
pub struct LogicalDevice {
    pub device: vk::Device,
    pub graphics_queue: vk::Queue,
    pub present_queue: vk::Queue,
    pub graphics_family: u32,
    pub present_family: u32,
}

/// First graphics family and first present-capable family with queues
pub fn find_queue_families(families: &[QueueFamilySupport]) -> QueueFamilyIndices {
    let mut indices = QueueFamilyIndices::default();

    for (index, family) in families.iter().enumerate() {
        if family.queue_count == 0 {
            continue;
        }
        if family.graphics && indices.graphics.is_none() {
            indices.graphics = Some(index as u32);
        }
        if family.present && indices.present.is_none() {
            indices.present = Some(index as u32);
        }
        if indices.is_complete() {
            break;
        }
    }

    indices
}

pub fn check_device_extension_support(available: &[String], required: &[&str]) -> bool {
    if available.is_empty() {
        log::warn!("Adapter reports no device extensions");
        return false;
    }
    required.iter().all(|&ext| {
        let supported = available.iter().any(|a| a == ext);
        if !supported {
            log::warn!("Adapter does not support {}", ext);
        }
        supported
    })
}

/// Both queue families, every required extension and a usable swapchain
pub fn check_device_suitable(caps: &AdapterCapabilities, required_extensions: &[&str]) -> bool {
    let indices = find_queue_families(&caps.queue_families);
    let extensions_supported =
        check_device_extension_support(&caps.extensions, required_extensions);
    let swapchain_adequate = extensions_supported
        && !caps.formats.is_empty()
        && !caps.present_modes.is_empty();

    indices.is_complete() && extensions_supported && swapchain_adequate
}

/// Query capabilities for one adapter against `surface`.
///
/// Surface formats and present modes are only queried once the swapchain
/// extension is known to be available.
pub fn query_adapter_capabilities<B: GpuBackend>(
    backend: &B,
    adapter: vk::PhysicalDevice,
    surface: vk::SurfaceKHR,
) -> ash::prelude::VkResult<AdapterCapabilities> {
    let queue_families = backend.queue_families(adapter, surface)?;
    let extensions = backend.device_extensions(adapter)?;

    let mut caps = AdapterCapabilities {
        queue_families,
        extensions,
        ..Default::default()
    };

    if check_device_extension_support(&caps.extensions, REQUIRED_DEVICE_EXTENSIONS) {
        caps.formats = backend.surface_formats(adapter, surface)?;
        caps.present_modes = backend.present_modes(adapter, surface)?;
    }

    Ok(caps)
}

/// Enumerate adapters and return the first suitable one
pub fn select_adapter<B: GpuBackend>(
    backend: &B,
    surface: vk::SurfaceKHR,
) -> RendererResult<SelectedAdapter> {
    let adapters = backend
        .enumerate_adapters()
        .map_err(RendererError::AdapterEnumerationFailed)?;

    if adapters.is_empty() {
        log::error!("Can't find GPUs that support Vulkan");
        return Err(RendererError::NoSuitableAdapter);
    }

    log::info!("Found {} adapter(s)", adapters.len());

    for adapter in adapters {
        let name = backend.adapter_name(adapter);
        let caps = match query_adapter_capabilities(backend, adapter, surface) {
            Ok(caps) => caps,
            Err(e) => {
                log::warn!("Skipping adapter {}: capability query failed ({})", name, e);
                continue;
            }
        };

        if check_device_suitable(&caps, REQUIRED_DEVICE_EXTENSIONS) {
            log::info!("Selected GPU: {}", name);
            return Ok(SelectedAdapter {
                physical_device: adapter,
                name,
                queue_families: find_queue_families(&caps.queue_families),
            });
        }

        log::debug!("Adapter {} is not suitable", name);
    }

    Err(RendererError::NoSuitableAdapter)
}

/// Open the logical device with one queue per distinct family, priority 1.0
pub fn create_logical_device<B: GpuBackend>(
    backend: &mut B,
    resources: &mut ResourceStack,
    adapter: &SelectedAdapter,
) -> RendererResult<LogicalDevice> {
    let indices = adapter.queue_families;
    let (Some(graphics_family), Some(present_family)) = (indices.graphics, indices.present) else {
        return Err(RendererError::NoSuitableAdapter);
    };

    let queue_priorities = [1.0_f32];
    let queue_create_infos: Vec<vk::DeviceQueueCreateInfo> = indices
        .unique()
        .into_iter()
        .map(|family| {
            vk::DeviceQueueCreateInfo::builder()
                .queue_family_index(family)
                .queue_priorities(&queue_priorities)
                .build()
        })
        .collect();

    let extension_cstrings: Vec<CString> = REQUIRED_DEVICE_EXTENSIONS
        .iter()
        .filter_map(|&e| CString::new(e).ok())
        .collect();
    let extension_ptrs: Vec<_> = extension_cstrings.iter().map(|c| c.as_ptr()).collect();

    let features = vk::PhysicalDeviceFeatures::default();

    let create_info = vk::DeviceCreateInfo::builder()
        .queue_create_infos(&queue_create_infos)
        .enabled_extension_names(&extension_ptrs)
        .enabled_features(&features);

    let device = backend
        .create_device(adapter.physical_device, &create_info)
        .map_err(RendererError::DeviceCreationFailed)?;
    resources.push(GpuResource::Device(device));

    let graphics_queue = backend
        .device_queue(graphics_family, 0)
        .map_err(RendererError::DeviceCreationFailed)?;
    let present_queue = backend
        .device_queue(present_family, 0)
        .map_err(RendererError::DeviceCreationFailed)?;

    log::info!(
        "Logical device created (graphics family {}, present family {})",
        graphics_family,
        present_family
    );

    Ok(LogicalDevice {
        device,
        graphics_queue,
        present_queue,
        graphics_family,
        present_family,
    })
}
