// Synchronization primitives and the frame loop
//
// Each frame-in-flight slot owns an image-available semaphore, a
// render-finished semaphore and a fence that starts signaled. A per-image
// fence table keeps an image from being resubmitted while an earlier frame
// that targeted it is still executing.

use ash::vk;

use crate::backend::{GpuBackend, GpuResource};
use crate::error::{RendererError, RendererResult};
use crate::renderer::resources::ResourceStack;

/// Frame synchronization - one per frame in flight
#[derive(Debug, Clone, Copy)]
pub struct FrameSync {
    pub image_available: vk::Semaphore,
    pub render_finished: vk::Semaphore,
    pub in_flight_fence: vk::Fence,
}

impl FrameSync {
    pub fn new<B: GpuBackend>(
        backend: &mut B,
        resources: &mut ResourceStack,
    ) -> RendererResult<Self> {
        let semaphore_info = vk::SemaphoreCreateInfo::builder();
        // Start signaled so the first wait on each slot returns immediately
        let fence_info = vk::FenceCreateInfo::builder().flags(vk::FenceCreateFlags::SIGNALED);

        let image_available = backend
            .create_semaphore(&semaphore_info)
            .map_err(RendererError::SynchronizationObjectCreationFailed)?;
        resources.push(GpuResource::Semaphore(image_available));

        let render_finished = backend
            .create_semaphore(&semaphore_info)
            .map_err(RendererError::SynchronizationObjectCreationFailed)?;
        resources.push(GpuResource::Semaphore(render_finished));

        let in_flight_fence = backend
            .create_fence(&fence_info)
            .map_err(RendererError::SynchronizationObjectCreationFailed)?;
        resources.push(GpuResource::Fence(in_flight_fence));

        Ok(Self {
            image_available,
            render_finished,
            in_flight_fence,
        })
    }
}

/// Where the frame loop is, for diagnostics after a failure
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum FrameStage {
    #[default]
    Idle,
    Acquiring,
    Submitting,
    Presenting,
}

/// Everything a frame submission refers to, fixed after init
#[derive(Debug, Clone)]
pub struct FrameTargets {
    pub swapchain: vk::SwapchainKHR,
    pub graphics_queue: vk::Queue,
    pub present_queue: vk::Queue,
    /// Indexed by swapchain image
    pub command_buffers: Vec<vk::CommandBuffer>,
}

/// Drives acquire -> submit -> present over a ring of [`FrameSync`] slots
#[derive(Debug)]
pub struct FrameLoop {
    frames: Vec<FrameSync>,
    /// Fence of the slot that last submitted each image, null if none
    images_in_flight: Vec<vk::Fence>,
    current_frame: usize,
    stage: FrameStage,
    frames_rendered: u64,
    wait_stages: [vk::PipelineStageFlags; 1],
    suboptimal_reported: bool,
    /// First failure, replayed on every later call
    halted: Option<(fn(vk::Result) -> RendererError, vk::Result)>,
}

impl FrameLoop {
    /// Create `frames_in_flight` slots (at least one) for `image_count` images
    pub fn new<B: GpuBackend>(
        backend: &mut B,
        resources: &mut ResourceStack,
        frames_in_flight: usize,
        image_count: usize,
    ) -> RendererResult<Self> {
        let slot_count = frames_in_flight.max(1);
        let frames = (0..slot_count)
            .map(|_| FrameSync::new(backend, resources))
            .collect::<RendererResult<Vec<_>>>()?;

        log::info!("Created {} frame sync slot(s) for {} images", slot_count, image_count);

        Ok(Self {
            frames,
            images_in_flight: vec![vk::Fence::null(); image_count],
            current_frame: 0,
            stage: FrameStage::Idle,
            frames_rendered: 0,
            wait_stages: [vk::PipelineStageFlags::COLOR_ATTACHMENT_OUTPUT],
            suboptimal_reported: false,
            halted: None,
        })
    }

    pub fn stage(&self) -> FrameStage {
        self.stage
    }

    pub fn frames_rendered(&self) -> u64 {
        self.frames_rendered
    }

    pub fn current_frame(&self) -> usize {
        self.current_frame
    }

    pub fn slots(&self) -> &[FrameSync] {
        &self.frames
    }

    pub fn is_halted(&self) -> bool {
        self.halted.is_some()
    }

    /// Render one frame. Returns the index of the image that was presented.
    ///
    /// On error the stage is left where the failure happened and the loop
    /// halts: every later call returns the same error without touching the
    /// GPU, since the slot fence may have been reset and will never signal.
    pub fn draw_frame<B: GpuBackend>(
        &mut self,
        backend: &mut B,
        targets: &FrameTargets,
    ) -> RendererResult<u32> {
        if let Some((error, code)) = self.halted {
            return Err(error(code));
        }

        let sync = self.frames[self.current_frame];

        // Wait until this slot's previous submission has finished
        backend
            .wait_for_fences(&[sync.in_flight_fence], u64::MAX)
            .map_err(|e| self.halt(RendererError::FenceWaitFailed, e))?;

        self.stage = FrameStage::Acquiring;
        let (image_index, suboptimal) = backend
            .acquire_next_image(targets.swapchain, u64::MAX, sync.image_available)
            .map_err(|e| self.halt(RendererError::AcquireFailed, e))?;
        self.note_suboptimal(suboptimal);

        let image = image_index as usize;
        let Some(&command_buffer) = targets.command_buffers.get(image) else {
            return Err(self.halt(RendererError::AcquireFailed, vk::Result::ERROR_UNKNOWN));
        };

        self.stage = FrameStage::Submitting;
        let image_fence = self.images_in_flight[image];
        if image_fence != vk::Fence::null() && image_fence != sync.in_flight_fence {
            backend
                .wait_for_fences(&[image_fence], u64::MAX)
                .map_err(|e| self.halt(RendererError::FenceWaitFailed, e))?;
        }
        self.images_in_flight[image] = sync.in_flight_fence;

        backend
            .reset_fences(&[sync.in_flight_fence])
            .map_err(|e| self.halt(RendererError::FenceWaitFailed, e))?;

        let wait_semaphores = [sync.image_available];
        let signal_semaphores = [sync.render_finished];
        let command_buffers = [command_buffer];

        let wait_stages = self.wait_stages;

        let submit_info = vk::SubmitInfo::builder()
            .wait_semaphores(&wait_semaphores)
            .wait_dst_stage_mask(&wait_stages)
            .command_buffers(&command_buffers)
            .signal_semaphores(&signal_semaphores);

        backend
            .queue_submit(targets.graphics_queue, &[submit_info.build()], sync.in_flight_fence)
            .map_err(|e| self.halt(RendererError::SubmitFailed, e))?;

        self.stage = FrameStage::Presenting;
        let swapchains = [targets.swapchain];
        let image_indices = [image_index];

        let present_info = vk::PresentInfoKHR::builder()
            .wait_semaphores(&signal_semaphores)
            .swapchains(&swapchains)
            .image_indices(&image_indices);

        let suboptimal = backend
            .queue_present(targets.present_queue, &present_info)
            .map_err(|e| self.halt(RendererError::PresentFailed, e))?;
        self.note_suboptimal(suboptimal);

        self.stage = FrameStage::Idle;
        self.frames_rendered += 1;
        self.current_frame = (self.current_frame + 1) % self.frames.len();

        Ok(image_index)
    }

    fn halt(&mut self, error: fn(vk::Result) -> RendererError, code: vk::Result) -> RendererError {
        self.halted = Some((error, code));
        error(code)
    }

    fn note_suboptimal(&mut self, suboptimal: bool) {
        if suboptimal && !self.suboptimal_reported {
            log::warn!("Swapchain is suboptimal for the surface; continuing without recreation");
            self.suboptimal_reported = true;
        }
    }
}
