//! Renderer error types.
//!
//! Every construction step and every frame-loop call reports failure as a
//! [`RendererError`]. Variants that wrap a driver call carry the `vk::Result`
//! the driver returned.

use ash::vk;
use std::path::PathBuf;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum RendererError {
    /// The Vulkan loader could not be found or opened
    #[error("Failed to load Vulkan library: {0}")]
    LoaderUnavailable(#[from] ash::LoadingError),

    #[error("Failed to create Vulkan instance: {0}")]
    InstanceCreationFailed(vk::Result),

    #[error("Validation layer {0} is not available")]
    ValidationLayerUnsupported(String),

    #[error("Required extension {0} is not supported")]
    RequiredExtensionUnsupported(String),

    #[error("Failed to create debug messenger: {0}")]
    DebugMessengerCreationFailed(vk::Result),

    #[error("Failed to create a surface: {0}")]
    SurfaceCreationFailed(vk::Result),

    #[error("Failed to enumerate physical devices: {0}")]
    AdapterEnumerationFailed(vk::Result),

    /// No adapter exposes graphics + present queues, the swapchain extension
    /// and at least one surface format and present mode
    #[error("No suitable GPU found")]
    NoSuitableAdapter,

    #[error("Failed to create logical device: {0}")]
    DeviceCreationFailed(vk::Result),

    #[error("Failed to create swapchain: {0}")]
    SwapchainCreationFailed(vk::Result),

    #[error("Failed to create render pass: {0}")]
    RenderPassCreationFailed(vk::Result),

    /// Shader module, pipeline layout or pipeline creation failed
    #[error("Failed to create graphics pipeline: {0}")]
    PipelineCreationFailed(vk::Result),

    #[error("Failed to create framebuffer: {0}")]
    FramebufferCreationFailed(vk::Result),

    #[error("Failed to create command pool: {0}")]
    CommandPoolCreationFailed(vk::Result),

    #[error("Failed to allocate command buffers: {0}")]
    CommandBufferAllocationFailed(vk::Result),

    #[error("Failed to record command buffer: {0}")]
    CommandRecordingFailed(vk::Result),

    #[error("Failed to create synchronization objects: {0}")]
    SynchronizationObjectCreationFailed(vk::Result),

    #[error("Failed to wait for in-flight fence: {0}")]
    FenceWaitFailed(vk::Result),

    #[error("Failed to acquire swapchain image: {0}")]
    AcquireFailed(vk::Result),

    #[error("Failed to submit command buffer to queue: {0}")]
    SubmitFailed(vk::Result),

    #[error("Failed to present image: {0}")]
    PresentFailed(vk::Result),

    #[error("Failed to load shader {path:?}: {source}")]
    ShaderLoadFailed {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
}

/// Result type alias for renderer operations.
pub type RendererResult<T> = std::result::Result<T, RendererError>;
