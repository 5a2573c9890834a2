// Instance, validation and surface setup
//
// Checks layer/extension availability up front, then creates the instance,
// the optional debug messenger and the presentable surface.

use ash::extensions::ext::DebugUtils;
use ash::vk;
use std::ffi::{CStr, CString};

use crate::backend::{GpuBackend, GpuResource};
use crate::error::{RendererError, RendererResult};
use crate::renderer::resources::ResourceStack;

/// Layers enabled when validation is on
pub const VALIDATION_LAYERS: &[&str] = &["VK_LAYER_KHRONOS_validation"];

const ENGINE_NAME: &str = "No Engine";

/// Handles produced by instance setup
#[derive(Debug, Clone, Copy)]
pub struct InstanceHandles {
    pub instance: vk::Instance,
    pub surface: vk::SurfaceKHR,
}

/// Fail with `ValidationLayerUnsupported` naming the first missing layer
pub fn check_validation_layer_support(available: &[String]) -> RendererResult<()> {
    match VALIDATION_LAYERS
        .iter()
        .find(|&&layer| !available.iter().any(|a| a == layer))
    {
        Some(missing) => Err(RendererError::ValidationLayerUnsupported(missing.to_string())),
        None => Ok(()),
    }
}

/// Fail with `RequiredExtensionUnsupported` naming the first missing extension
pub fn check_extension_support(available: &[String], required: &[String]) -> RendererResult<()> {
    for extension in required {
        if !available.iter().any(|a| a == extension) {
            log::warn!("Extension {} is not supported", extension);
            return Err(RendererError::RequiredExtensionUnsupported(extension.clone()));
        }
    }
    Ok(())
}

fn to_cstrings(names: &[String]) -> Vec<CString> {
    // Names come from the driver or static tables and never hold interior NULs
    names
        .iter()
        .filter_map(|n| CString::new(n.as_str()).ok())
        .collect()
}

fn debug_messenger_info() -> vk::DebugUtilsMessengerCreateInfoEXTBuilder<'static> {
    vk::DebugUtilsMessengerCreateInfoEXT::builder()
        .message_severity(
            vk::DebugUtilsMessageSeverityFlagsEXT::VERBOSE
                | vk::DebugUtilsMessageSeverityFlagsEXT::WARNING
                | vk::DebugUtilsMessageSeverityFlagsEXT::ERROR,
        )
        .message_type(
            vk::DebugUtilsMessageTypeFlagsEXT::GENERAL
                | vk::DebugUtilsMessageTypeFlagsEXT::VALIDATION
                | vk::DebugUtilsMessageTypeFlagsEXT::PERFORMANCE,
        )
        .pfn_user_callback(Some(debug_callback))
}

/// Create instance, debug messenger (if `enable_validation`) and surface.
///
/// Every created object is pushed onto `resources`.
pub fn create_instance_and_surface<B: GpuBackend>(
    backend: &mut B,
    resources: &mut ResourceStack,
    app_name: &str,
    enable_validation: bool,
) -> RendererResult<InstanceHandles> {
    log::info!(
        "Creating Vulkan instance ({})",
        if enable_validation { "validation on" } else { "validation off" }
    );

    let layer_names: Vec<String> = if enable_validation {
        let available = backend
            .instance_layers()
            .map_err(RendererError::InstanceCreationFailed)?;
        check_validation_layer_support(&available)?;
        VALIDATION_LAYERS.iter().map(|l| l.to_string()).collect()
    } else {
        Vec::new()
    };

    let mut extension_names = backend
        .surface_extensions()
        .map_err(RendererError::InstanceCreationFailed)?;
    if enable_validation {
        extension_names.push(DebugUtils::name().to_string_lossy().into_owned());
    }

    let available = backend
        .instance_extensions()
        .map_err(RendererError::InstanceCreationFailed)?;
    check_extension_support(&available, &extension_names)?;

    let app_name_cstr = CString::new(app_name).unwrap_or_else(|_| CString::from(c"Vulkan App"));
    let engine_name = CString::new(ENGINE_NAME).unwrap_or_default();

    let app_info = vk::ApplicationInfo::builder()
        .application_name(&app_name_cstr)
        .application_version(vk::make_api_version(0, 1, 0, 0))
        .engine_name(&engine_name)
        .engine_version(vk::make_api_version(0, 1, 0, 0))
        .api_version(vk::API_VERSION_1_0);

    let layer_cstrings = to_cstrings(&layer_names);
    let layer_ptrs: Vec<_> = layer_cstrings.iter().map(|c| c.as_ptr()).collect();
    let extension_cstrings = to_cstrings(&extension_names);
    let extension_ptrs: Vec<_> = extension_cstrings.iter().map(|c| c.as_ptr()).collect();

    // Chained so instance creation and destruction are reported as well
    let mut instance_debug_info = debug_messenger_info();

    let mut create_info = vk::InstanceCreateInfo::builder()
        .application_info(&app_info)
        .enabled_layer_names(&layer_ptrs)
        .enabled_extension_names(&extension_ptrs);
    if enable_validation {
        create_info = create_info.push_next(&mut instance_debug_info);
    }

    let instance = backend
        .create_instance(&create_info)
        .map_err(RendererError::InstanceCreationFailed)?;
    resources.push(GpuResource::Instance(instance));

    if enable_validation {
        let messenger = backend
            .create_debug_messenger(&debug_messenger_info())
            .map_err(RendererError::DebugMessengerCreationFailed)?;
        resources.push(GpuResource::DebugMessenger(messenger));
        log::info!("Successfully created debug callback");
    }

    let surface = backend
        .create_surface()
        .map_err(RendererError::SurfaceCreationFailed)?;
    resources.push(GpuResource::Surface(surface));

    Ok(InstanceHandles { instance, surface })
}

/// Route a driver message to the logger by severity
pub fn forward_validation_message(severity: vk::DebugUtilsMessageSeverityFlagsEXT, message: &str) {
    log::log!(severity_to_level(severity), "[Vulkan] {}", message);
}

fn severity_to_level(severity: vk::DebugUtilsMessageSeverityFlagsEXT) -> log::Level {
    if severity.contains(vk::DebugUtilsMessageSeverityFlagsEXT::ERROR) {
        log::Level::Error
    } else if severity.contains(vk::DebugUtilsMessageSeverityFlagsEXT::WARNING) {
        log::Level::Warn
    } else if severity.contains(vk::DebugUtilsMessageSeverityFlagsEXT::INFO) {
        log::Level::Info
    } else {
        log::Level::Trace
    }
}

// Debug callback for validation layers
unsafe extern "system" fn debug_callback(
    message_severity: vk::DebugUtilsMessageSeverityFlagsEXT,
    _message_type: vk::DebugUtilsMessageTypeFlagsEXT,
    p_callback_data: *const vk::DebugUtilsMessengerCallbackDataEXT,
    _p_user_data: *mut std::ffi::c_void,
) -> vk::Bool32 {
    if p_callback_data.is_null() || (*p_callback_data).p_message.is_null() {
        return vk::FALSE;
    }
    let message = CStr::from_ptr((*p_callback_data).p_message);
    forward_validation_message(message_severity, &message.to_string_lossy());

    vk::FALSE
}
