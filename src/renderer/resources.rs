// Scoped GPU object ownership
//
// Every long-lived object is pushed here right after it is created. Release
// pops them back off, so destruction is always the mirror image of
// construction, on the success path and on a half-finished init alike.

use crate::backend::{GpuBackend, GpuResource};

#[derive(Debug, Default)]
pub struct ResourceStack {
    resources: Vec<GpuResource>,
}

impl ResourceStack {
    pub fn new() -> Self {
        Self::default()
    }

    /// Take ownership of a freshly created object
    pub fn push(&mut self, resource: GpuResource) {
        log::debug!("Created {} {:#x}", resource.kind(), resource.raw());
        self.resources.push(resource);
    }

    pub fn len(&self) -> usize {
        self.resources.len()
    }

    pub fn is_empty(&self) -> bool {
        self.resources.is_empty()
    }

    pub fn owns_device(&self) -> bool {
        self.resources
            .iter()
            .any(|r| matches!(r, GpuResource::Device(_)))
    }

    /// Destroy everything, newest first.
    ///
    /// Blocks on device idle before the first destroy if a device exists, so
    /// no in-flight command can reference a freed object.
    pub fn release_all<B: GpuBackend>(&mut self, backend: &mut B) {
        if self.resources.is_empty() {
            return;
        }

        if self.owns_device() {
            if let Err(e) = backend.device_wait_idle() {
                log::error!("Device wait idle failed during teardown: {}", e);
            }
        }

        log::info!("Releasing {} GPU objects", self.resources.len());
        while let Some(resource) = self.resources.pop() {
            backend.destroy(resource);
        }
    }
}
