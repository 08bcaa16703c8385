//! GPU buffer management.
//!
//! Buffers are sized in instances: `instance_size` bytes, `instance_count`
//! copies, each placed at a stride rounded up to a caller-supplied minimum
//! offset alignment. A per-frame uniform buffer with the device's
//! `min_uniform_buffer_offset_alignment` is the typical client. Memory comes
//! from gpu-allocator; host-visible allocations are persistently mapped.
//!
//! # Example
//!
//! ```no_run
//! use std::sync::Arc;
//! use meshview_rhi::device::Device;
//! use meshview_rhi::buffer::{Buffer, BufferUsage};
//!
//! # fn example(device: Arc<Device>) -> Result<(), meshview_rhi::RhiError> {
//! let vertices: [f32; 6] = [0.0, 0.5, -0.5, -0.5, 0.5, -0.5];
//! let vertex_buffer = Buffer::with_data(
//!     device,
//!     BufferUsage::Vertex,
//!     bytemuck::cast_slice(&vertices),
//! )?;
//! # Ok(())
//! # }
//! ```

use std::sync::Arc;

use ash::vk;
use gpu_allocator::MemoryLocation;
use gpu_allocator::vulkan::{Allocation, AllocationCreateDesc, AllocationScheme};
use tracing::debug;

use crate::device::Device;
use crate::error::{RhiError, RhiResult};

/// Rounds `size` up to the next multiple of `alignment`.
///
/// An alignment of 0 or 1 leaves the size unchanged.
pub fn align_up(size: vk::DeviceSize, alignment: vk::DeviceSize) -> vk::DeviceSize {
    if alignment > 1 {
        (size + alignment - 1) & !(alignment - 1)
    } else {
        size
    }
}

/// Buffer usage type; drives Vulkan usage flags and memory placement.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum BufferUsage {
    /// Vertex buffer, device-local, filled through staging
    Vertex,
    /// Index buffer, device-local, filled through staging
    Index,
    /// Uniform buffer, host-visible for per-frame updates
    Uniform,
    /// Staging buffer, host-visible transfer source
    Staging,
}

impl BufferUsage {
    /// Converts to Vulkan buffer usage flags.
    pub fn to_vk_usage(self) -> vk::BufferUsageFlags {
        match self {
            BufferUsage::Vertex => {
                vk::BufferUsageFlags::VERTEX_BUFFER | vk::BufferUsageFlags::TRANSFER_DST
            }
            BufferUsage::Index => {
                vk::BufferUsageFlags::INDEX_BUFFER | vk::BufferUsageFlags::TRANSFER_DST
            }
            BufferUsage::Uniform => vk::BufferUsageFlags::UNIFORM_BUFFER,
            BufferUsage::Staging => vk::BufferUsageFlags::TRANSFER_SRC,
        }
    }

    /// Returns the memory location for this buffer type.
    pub fn memory_location(self) -> MemoryLocation {
        match self {
            BufferUsage::Vertex | BufferUsage::Index => MemoryLocation::GpuOnly,
            BufferUsage::Uniform | BufferUsage::Staging => MemoryLocation::CpuToGpu,
        }
    }

    /// Returns a human-readable name for the buffer type.
    pub fn name(self) -> &'static str {
        match self {
            BufferUsage::Vertex => "vertex",
            BufferUsage::Index => "index",
            BufferUsage::Uniform => "uniform",
            BufferUsage::Staging => "staging",
        }
    }
}

/// GPU buffer wrapper with managed memory and instance-stride bookkeeping.
///
/// # Thread Safety
///
/// Not internally synchronized; share behind external synchronization.
pub struct Buffer {
    /// Reference to the logical device.
    device: Arc<Device>,
    /// Vulkan buffer handle.
    buffer: vk::Buffer,
    /// GPU memory allocation, taken in Drop.
    allocation: Option<Allocation>,
    /// Size of one instance in bytes.
    instance_size: vk::DeviceSize,
    /// Number of instances.
    instance_count: vk::DeviceSize,
    /// Stride between instances (instance size rounded up).
    alignment_size: vk::DeviceSize,
    /// Total buffer size in bytes.
    buffer_size: vk::DeviceSize,
    /// Buffer usage type.
    usage: BufferUsage,
}

impl Buffer {
    /// Creates a buffer holding `instance_count` instances of
    /// `instance_size` bytes, each aligned to `min_offset_alignment`.
    ///
    /// Pass an alignment of 1 when no offset alignment is required (vertex
    /// and staging buffers); pass the device's minimum uniform offset
    /// alignment when the buffer will be bound with dynamic or per-instance
    /// offsets.
    ///
    /// # Errors
    ///
    /// Returns an error if the computed size is zero or buffer/memory
    /// creation fails.
    pub fn new(
        device: Arc<Device>,
        instance_size: vk::DeviceSize,
        instance_count: vk::DeviceSize,
        usage: BufferUsage,
        min_offset_alignment: vk::DeviceSize,
    ) -> RhiResult<Self> {
        let alignment_size = align_up(instance_size, min_offset_alignment);
        let buffer_size = alignment_size * instance_count;

        if buffer_size == 0 {
            return Err(RhiError::BufferError(
                "Buffer size must be greater than 0".to_string(),
            ));
        }

        let buffer_info = vk::BufferCreateInfo::default()
            .size(buffer_size)
            .usage(usage.to_vk_usage())
            .sharing_mode(vk::SharingMode::EXCLUSIVE);

        let buffer = unsafe { device.handle().create_buffer(&buffer_info, None)? };

        let requirements = unsafe { device.handle().get_buffer_memory_requirements(buffer) };

        let allocation = {
            let mut allocator = device.allocator().lock().unwrap();
            allocator.allocate(&AllocationCreateDesc {
                name: usage.name(),
                requirements,
                location: usage.memory_location(),
                linear: true,
                allocation_scheme: AllocationScheme::GpuAllocatorManaged,
            })?
        };

        unsafe {
            device
                .handle()
                .bind_buffer_memory(buffer, allocation.memory(), allocation.offset())?;
        }

        debug!(
            "Created {} buffer: {} bytes ({} x {}, stride {})",
            usage.name(),
            buffer_size,
            instance_count,
            instance_size,
            alignment_size
        );

        Ok(Self {
            device,
            buffer,
            allocation: Some(allocation),
            instance_size,
            instance_count,
            alignment_size,
            buffer_size,
            usage,
        })
    }

    /// Creates a buffer and fills it with `data`.
    ///
    /// Host-visible usages are written directly; device-local usages go
    /// through a staging buffer and a one-shot copy.
    ///
    /// # Errors
    ///
    /// Returns an error if creation or the upload fails.
    pub fn with_data(device: Arc<Device>, usage: BufferUsage, data: &[u8]) -> RhiResult<Self> {
        let size = data.len() as vk::DeviceSize;
        let buffer = Self::new(device.clone(), size, 1, usage, 1)?;

        match usage.memory_location() {
            MemoryLocation::CpuToGpu => {
                buffer.write_to_buffer(data, 0)?;
                buffer.flush(vk::WHOLE_SIZE, 0)?;
            }
            _ => {
                let staging = Self::new(device.clone(), size, 1, BufferUsage::Staging, 1)?;
                staging.write_to_buffer(data, 0)?;
                staging.flush(vk::WHOLE_SIZE, 0)?;
                device.copy_buffer(staging.handle(), buffer.handle(), size)?;
            }
        }

        Ok(buffer)
    }

    /// Writes `data` at `offset`. The memory must be host-visible.
    ///
    /// # Errors
    ///
    /// Returns an error if the range exceeds the buffer or the memory is
    /// not mapped.
    pub fn write_to_buffer(&self, data: &[u8], offset: vk::DeviceSize) -> RhiResult<()> {
        if data.is_empty() {
            return Ok(());
        }

        let end = offset + data.len() as vk::DeviceSize;
        if end > self.buffer_size {
            return Err(RhiError::BufferError(format!(
                "Write exceeds buffer size: offset {} + data {} > buffer {}",
                offset,
                data.len(),
                self.buffer_size
            )));
        }

        let allocation = self
            .allocation
            .as_ref()
            .ok_or_else(|| RhiError::BufferError("Buffer allocation is gone".to_string()))?;

        let mapped_ptr = allocation
            .mapped_ptr()
            .ok_or_else(|| RhiError::BufferError("Buffer memory is not mapped".to_string()))?;

        unsafe {
            let dst = mapped_ptr.as_ptr().add(offset as usize);
            std::ptr::copy_nonoverlapping(data.as_ptr(), dst as *mut u8, data.len());
        }

        Ok(())
    }

    /// Writes one instance's worth of data at slot `index`.
    ///
    /// # Errors
    ///
    /// Returns an error if the index is out of range or the write fails.
    pub fn write_to_index(&self, data: &[u8], index: vk::DeviceSize) -> RhiResult<()> {
        if index >= self.instance_count {
            return Err(RhiError::BufferError(format!(
                "Instance index {} out of range ({} instances)",
                index, self.instance_count
            )));
        }
        self.write_to_buffer(data, index * self.alignment_size)
    }

    /// Flushes a mapped range so the device sees host writes.
    ///
    /// The range is widened to the device's non-coherent atom size; pass
    /// `vk::WHOLE_SIZE` to flush everything.
    ///
    /// # Errors
    ///
    /// Returns an error if the memory is not mapped or the flush fails.
    pub fn flush(&self, size: vk::DeviceSize, offset: vk::DeviceSize) -> RhiResult<()> {
        let allocation = self
            .allocation
            .as_ref()
            .ok_or_else(|| RhiError::BufferError("Buffer allocation is gone".to_string()))?;

        if allocation.mapped_ptr().is_none() {
            return Err(RhiError::BufferError(
                "Cannot flush unmapped buffer memory".to_string(),
            ));
        }

        let atom = self.device.properties().limits.non_coherent_atom_size;
        let (range_offset, range_size) = if size == vk::WHOLE_SIZE {
            (allocation.offset(), vk::WHOLE_SIZE)
        } else {
            let start = allocation.offset() + offset;
            let aligned_start = start & !(atom - 1);
            let aligned_size = align_up(start + size - aligned_start, atom)
                .min(allocation.offset() + allocation.size() - aligned_start);
            (aligned_start, aligned_size)
        };

        // SAFETY: the allocation is alive and the range lies inside it
        // (modulo atom widening, which Vulkan allows for mapped ranges).
        let range = vk::MappedMemoryRange::default()
            .memory(unsafe { allocation.memory() })
            .offset(range_offset)
            .size(range_size);

        unsafe {
            self.device.handle().flush_mapped_memory_ranges(&[range])?;
        }
        Ok(())
    }

    /// Flushes the instance at slot `index`.
    ///
    /// # Errors
    ///
    /// Returns an error if the index is out of range or the flush fails.
    pub fn flush_index(&self, index: vk::DeviceSize) -> RhiResult<()> {
        if index >= self.instance_count {
            return Err(RhiError::BufferError(format!(
                "Instance index {} out of range ({} instances)",
                index, self.instance_count
            )));
        }
        self.flush(self.alignment_size, index * self.alignment_size)
    }

    /// Descriptor info covering `size` bytes at `offset`.
    pub fn descriptor_info(
        &self,
        size: vk::DeviceSize,
        offset: vk::DeviceSize,
    ) -> vk::DescriptorBufferInfo {
        vk::DescriptorBufferInfo {
            buffer: self.buffer,
            offset,
            range: size,
        }
    }

    /// Descriptor info for the instance at slot `index`.
    pub fn descriptor_info_for_index(&self, index: vk::DeviceSize) -> vk::DescriptorBufferInfo {
        self.descriptor_info(self.instance_size, index * self.alignment_size)
    }

    /// Returns the Vulkan buffer handle.
    #[inline]
    pub fn handle(&self) -> vk::Buffer {
        self.buffer
    }

    /// Returns the total buffer size in bytes.
    #[inline]
    pub fn size(&self) -> vk::DeviceSize {
        self.buffer_size
    }

    /// Returns the size of one instance in bytes.
    #[inline]
    pub fn instance_size(&self) -> vk::DeviceSize {
        self.instance_size
    }

    /// Returns the number of instances.
    #[inline]
    pub fn instance_count(&self) -> vk::DeviceSize {
        self.instance_count
    }

    /// Returns the stride between instances.
    #[inline]
    pub fn alignment_size(&self) -> vk::DeviceSize {
        self.alignment_size
    }

    /// Returns the buffer usage type.
    #[inline]
    pub fn usage(&self) -> BufferUsage {
        self.usage
    }

    /// Whether the buffer memory is host-mapped.
    #[inline]
    pub fn is_mapped(&self) -> bool {
        self.allocation
            .as_ref()
            .is_some_and(|a| a.mapped_ptr().is_some())
    }
}

impl Drop for Buffer {
    fn drop(&mut self) {
        // Free the allocation first, then the buffer
        if let Some(allocation) = self.allocation.take() {
            let mut allocator = self.device.allocator().lock().unwrap();
            if let Err(e) = allocator.free(allocation) {
                tracing::error!("Failed to free buffer allocation: {:?}", e);
            }
        }

        unsafe {
            self.device.handle().destroy_buffer(self.buffer, None);
        }

        debug!("Destroyed {} buffer", self.usage.name());
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_align_up_identity_for_trivial_alignment() {
        assert_eq!(align_up(17, 0), 17);
        assert_eq!(align_up(17, 1), 17);
    }

    #[test]
    fn test_align_up_rounds_to_multiple() {
        assert_eq!(align_up(1, 64), 64);
        assert_eq!(align_up(64, 64), 64);
        assert_eq!(align_up(65, 64), 128);
        assert_eq!(align_up(200, 256), 256);
        assert_eq!(align_up(0, 256), 0);
    }

    #[test]
    fn test_buffer_usage_to_vk_usage() {
        assert!(
            BufferUsage::Vertex
                .to_vk_usage()
                .contains(vk::BufferUsageFlags::VERTEX_BUFFER)
        );
        assert!(
            BufferUsage::Index
                .to_vk_usage()
                .contains(vk::BufferUsageFlags::INDEX_BUFFER)
        );
        assert!(
            BufferUsage::Uniform
                .to_vk_usage()
                .contains(vk::BufferUsageFlags::UNIFORM_BUFFER)
        );
        assert!(
            BufferUsage::Staging
                .to_vk_usage()
                .contains(vk::BufferUsageFlags::TRANSFER_SRC)
        );
    }

    #[test]
    fn test_buffer_usage_memory_location() {
        assert_eq!(
            BufferUsage::Vertex.memory_location(),
            MemoryLocation::GpuOnly
        );
        assert_eq!(
            BufferUsage::Index.memory_location(),
            MemoryLocation::GpuOnly
        );
        assert_eq!(
            BufferUsage::Uniform.memory_location(),
            MemoryLocation::CpuToGpu
        );
        assert_eq!(
            BufferUsage::Staging.memory_location(),
            MemoryLocation::CpuToGpu
        );
    }

    #[test]
    fn test_buffer_usage_name() {
        assert_eq!(BufferUsage::Vertex.name(), "vertex");
        assert_eq!(BufferUsage::Index.name(), "index");
        assert_eq!(BufferUsage::Uniform.name(), "uniform");
        assert_eq!(BufferUsage::Staging.name(), "staging");
    }
}
