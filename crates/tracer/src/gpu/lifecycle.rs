use super::device::{ComputeDevice, GpuResource};

/// Acquisition-ordered record of device resources.
///
/// Resources are released last-acquired-first, and each entry is removed as it
/// is released, so draining twice never frees anything twice.
#[derive(Debug, Default)]
pub struct ReleaseStack {
    entries: Vec<GpuResource>,
}

impl ReleaseStack {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn push(&mut self, resource: GpuResource) {
        self.entries.push(resource);
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn contains(&self, resource: GpuResource) -> bool {
        self.entries.contains(&resource)
    }

    /// Releases one tracked resource out of order. Returns false when the
    /// resource was not tracked, in which case the device is not touched.
    pub fn release_one<D: ComputeDevice + ?Sized>(
        &mut self,
        device: &mut D,
        resource: GpuResource,
    ) -> bool {
        let Some(index) = self.entries.iter().rposition(|entry| *entry == resource) else {
            return false;
        };
        self.entries.remove(index);
        device.release(resource);
        true
    }

    /// Releases everything in reverse acquisition order; returns how many
    /// resources were freed.
    pub fn release_all<D: ComputeDevice + ?Sized>(&mut self, device: &mut D) -> usize {
        let released = self.entries.len();
        while let Some(resource) = self.entries.pop() {
            tracing::trace!(%resource, "releasing");
            device.release(resource);
        }
        released
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::gpu::{ImageFormat, SoftwareDevice};
    use crate::types::Resolution;

    #[test]
    fn drains_in_reverse_order_once() {
        let mut device = SoftwareDevice::new();
        let mut stack = ReleaseStack::new();
        let resolution = Resolution::new(4, 4).unwrap();

        let buffer = device.create_storage_buffer(64).unwrap();
        let image = device.create_image(resolution, ImageFormat::R32Uint).unwrap();
        stack.push(GpuResource::Buffer(buffer));
        stack.push(GpuResource::Image(image));

        assert_eq!(stack.release_all(&mut device), 2);
        assert_eq!(
            device.stats().release_log,
            vec![GpuResource::Image(image), GpuResource::Buffer(buffer)]
        );
        assert_eq!(stack.release_all(&mut device), 0);
        assert_eq!(device.stats().double_releases, 0);
        assert_eq!(device.stats().live_resources, 0);
    }

    #[test]
    fn untracked_resources_are_left_alone() {
        let mut device = SoftwareDevice::new();
        let mut stack = ReleaseStack::new();
        let buffer = device.create_storage_buffer(16).unwrap();

        assert!(!stack.release_one(&mut device, GpuResource::Buffer(buffer)));
        assert_eq!(device.stats().live_resources, 1);

        stack.push(GpuResource::Buffer(buffer));
        assert!(stack.release_one(&mut device, GpuResource::Buffer(buffer)));
        assert!(stack.is_empty());
        assert_eq!(device.stats().live_resources, 0);
    }
}
