//! Vulkan triangle renderer.
//!
//! Builds instance, surface, device, swapchain, render pass, pipeline,
//! framebuffers and pre-recorded command buffers for one window, then runs an
//! acquire -> submit -> present frame loop. All GPU calls go through the
//! [`GpuBackend`] trait; [`VulkanBackend`] is the real driver binding.

pub mod backend;
pub mod config;
pub mod error;
pub mod renderer;

pub use backend::{GpuBackend, GpuResource, QueueFamilySupport, VulkanBackend};
pub use config::Config;
pub use error::{RendererError, RendererResult};
pub use renderer::shader::{load_spirv, ShaderSet};
pub use renderer::sync::FrameStage;
pub use renderer::{Renderer, RendererSettings};
