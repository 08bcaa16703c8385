//! Vulkan logical device, queues, and upload helpers.
//!
//! The [`Device`] owns the logical device, the graphics and present queues,
//! the gpu-allocator instance, and a transient command pool used for one-shot
//! transfer work (buffer copies, image uploads, layout transitions).
//!
//! # Thread Safety
//!
//! The [`Device`] is shared across the renderer via `Arc`. The allocator is
//! behind a `Mutex`. The one-shot helpers record on the internal transient
//! pool and assume single-threaded use.

use std::mem::ManuallyDrop;
use std::sync::{Arc, Mutex};

use ash::vk;
use gpu_allocator::vulkan::{Allocator, AllocatorCreateDesc};
use tracing::{debug, info};

use crate::error::RhiError;
use crate::instance::Instance;
use crate::physical_device::{PhysicalDeviceInfo, QueueFamilyIndices, REQUIRED_DEVICE_EXTENSIONS};

/// Vulkan logical device wrapper.
pub struct Device {
    /// Vulkan logical device handle.
    device: ash::Device,
    /// Physical device handle.
    physical_device: vk::PhysicalDevice,
    /// Cached physical device properties (limits, name).
    properties: vk::PhysicalDeviceProperties,
    /// GPU memory allocator. ManuallyDrop so Drop can free it before the
    /// logical device goes away.
    allocator: ManuallyDrop<Mutex<Allocator>>,
    /// Graphics queue handle.
    graphics_queue: vk::Queue,
    /// Presentation queue handle.
    present_queue: vk::Queue,
    /// Queue family indices.
    queue_families: QueueFamilyIndices,
    /// Transient command pool for one-shot uploads.
    upload_pool: vk::CommandPool,
    /// Instance handle, kept for format property queries.
    instance: ash::Instance,
}

impl Device {
    /// Creates the logical device with the swapchain extension, sampler
    /// anisotropy, graphics + present queues, the allocator, and a transient
    /// upload pool.
    ///
    /// # Errors
    ///
    /// Returns an error if device creation, allocator initialization, or
    /// pool creation fails.
    pub fn new(
        instance: &Instance,
        physical_device_info: &PhysicalDeviceInfo,
    ) -> Result<Arc<Self>, RhiError> {
        let queue_families = &physical_device_info.queue_families;

        let unique_families = queue_families.unique_families();
        let queue_priorities = [1.0f32];

        let queue_create_infos: Vec<vk::DeviceQueueCreateInfo> = unique_families
            .iter()
            .map(|&family| {
                vk::DeviceQueueCreateInfo::default()
                    .queue_family_index(family)
                    .queue_priorities(&queue_priorities)
            })
            .collect();

        debug!(
            "Creating {} queue(s) for families: {:?}",
            queue_create_infos.len(),
            unique_families
        );

        let features = vk::PhysicalDeviceFeatures::default().sampler_anisotropy(true);

        let extension_names: Vec<*const i8> = REQUIRED_DEVICE_EXTENSIONS
            .iter()
            .map(|ext| ext.as_ptr())
            .collect();

        let create_info = vk::DeviceCreateInfo::default()
            .queue_create_infos(&queue_create_infos)
            .enabled_extension_names(&extension_names)
            .enabled_features(&features);

        let device = unsafe {
            instance
                .handle()
                .create_device(physical_device_info.device, &create_info, None)?
        };

        info!(
            "Logical device created with {} extension(s)",
            REQUIRED_DEVICE_EXTENSIONS.len()
        );

        // is_complete() was checked during selection
        let graphics_family = queue_families
            .graphics_family
            .ok_or(RhiError::NoSuitableGpu)?;
        let present_family = queue_families
            .present_family
            .ok_or(RhiError::NoSuitableGpu)?;

        let graphics_queue = unsafe { device.get_device_queue(graphics_family, 0) };
        let present_queue = unsafe { device.get_device_queue(present_family, 0) };
        debug!(
            "Queues retrieved (graphics family {}, present family {})",
            graphics_family, present_family
        );

        let allocator = Allocator::new(&AllocatorCreateDesc {
            instance: instance.handle().clone(),
            device: device.clone(),
            physical_device: physical_device_info.device,
            debug_settings: Default::default(),
            buffer_device_address: false,
            allocation_sizes: Default::default(),
        })?;

        info!("GPU memory allocator initialized");

        let pool_info = vk::CommandPoolCreateInfo::default()
            .queue_family_index(graphics_family)
            .flags(vk::CommandPoolCreateFlags::TRANSIENT);
        let upload_pool = unsafe { device.create_command_pool(&pool_info, None)? };

        Ok(Arc::new(Self {
            device,
            physical_device: physical_device_info.device,
            properties: physical_device_info.properties,
            allocator: ManuallyDrop::new(Mutex::new(allocator)),
            graphics_queue,
            present_queue,
            queue_families: *queue_families,
            upload_pool,
            instance: instance.handle().clone(),
        }))
    }

    /// Returns the Vulkan logical device handle.
    #[inline]
    pub fn handle(&self) -> &ash::Device {
        &self.device
    }

    /// Returns the physical device handle.
    #[inline]
    pub fn physical_device(&self) -> vk::PhysicalDevice {
        self.physical_device
    }

    /// Returns the cached physical device properties.
    #[inline]
    pub fn properties(&self) -> &vk::PhysicalDeviceProperties {
        &self.properties
    }

    /// Minimum alignment for uniform buffer offsets.
    #[inline]
    pub fn min_uniform_buffer_offset_alignment(&self) -> u64 {
        self.properties.limits.min_uniform_buffer_offset_alignment
    }

    /// Maximum sampler anisotropy supported by the device.
    #[inline]
    pub fn max_sampler_anisotropy(&self) -> f32 {
        self.properties.limits.max_sampler_anisotropy
    }

    /// Returns the graphics queue handle.
    #[inline]
    pub fn graphics_queue(&self) -> vk::Queue {
        self.graphics_queue
    }

    /// Returns the presentation queue handle.
    #[inline]
    pub fn present_queue(&self) -> vk::Queue {
        self.present_queue
    }

    /// Returns the queue family indices.
    #[inline]
    pub fn queue_families(&self) -> &QueueFamilyIndices {
        &self.queue_families
    }

    /// Returns the GPU memory allocator.
    #[inline]
    pub fn allocator(&self) -> &Mutex<Allocator> {
        &self.allocator
    }

    /// Blocks until all queues are idle.
    ///
    /// # Errors
    ///
    /// Returns an error if the wait fails.
    pub fn wait_idle(&self) -> Result<(), RhiError> {
        unsafe { self.device.device_wait_idle()? };
        Ok(())
    }

    /// Finds the first format in `candidates` supporting `features` with the
    /// given tiling.
    ///
    /// # Errors
    ///
    /// Returns [`RhiError::NoSupportedFormat`] if none qualifies.
    pub fn find_supported_format(
        &self,
        candidates: &[vk::Format],
        tiling: vk::ImageTiling,
        features: vk::FormatFeatureFlags,
    ) -> Result<vk::Format, RhiError> {
        for &format in candidates {
            let props = unsafe {
                self.instance
                    .get_physical_device_format_properties(self.physical_device, format)
            };

            let supported = match tiling {
                vk::ImageTiling::LINEAR => props.linear_tiling_features.contains(features),
                vk::ImageTiling::OPTIMAL => props.optimal_tiling_features.contains(features),
                _ => false,
            };

            if supported {
                return Ok(format);
            }
        }

        Err(RhiError::NoSupportedFormat)
    }

    /// Begins a one-shot command buffer on the transient upload pool.
    ///
    /// Pair with [`Device::end_one_shot`].
    ///
    /// # Errors
    ///
    /// Returns an error if allocation or begin fails.
    pub fn begin_one_shot(&self) -> Result<vk::CommandBuffer, RhiError> {
        let alloc_info = vk::CommandBufferAllocateInfo::default()
            .command_pool(self.upload_pool)
            .level(vk::CommandBufferLevel::PRIMARY)
            .command_buffer_count(1);

        let cmd = unsafe { self.device.allocate_command_buffers(&alloc_info)?[0] };

        let begin_info = vk::CommandBufferBeginInfo::default()
            .flags(vk::CommandBufferUsageFlags::ONE_TIME_SUBMIT);
        unsafe { self.device.begin_command_buffer(cmd, &begin_info)? };

        Ok(cmd)
    }

    /// Ends, submits, and waits for a one-shot command buffer, then frees
    /// it.
    ///
    /// # Errors
    ///
    /// Returns an error if end, submit, or the queue wait fails.
    pub fn end_one_shot(&self, cmd: vk::CommandBuffer) -> Result<(), RhiError> {
        unsafe {
            self.device.end_command_buffer(cmd)?;

            let buffers = [cmd];
            let submit_info = vk::SubmitInfo::default().command_buffers(&buffers);
            self.device
                .queue_submit(self.graphics_queue, &[submit_info], vk::Fence::null())?;
            self.device.queue_wait_idle(self.graphics_queue)?;

            self.device.free_command_buffers(self.upload_pool, &buffers);
        }
        Ok(())
    }

    /// Copies `size` bytes between buffers through a one-shot command
    /// buffer.
    ///
    /// # Errors
    ///
    /// Returns an error if recording or submission fails.
    pub fn copy_buffer(
        &self,
        src: vk::Buffer,
        dst: vk::Buffer,
        size: vk::DeviceSize,
    ) -> Result<(), RhiError> {
        let cmd = self.begin_one_shot()?;

        let region = vk::BufferCopy::default().size(size);
        unsafe {
            self.device.cmd_copy_buffer(cmd, src, dst, &[region]);
        }

        self.end_one_shot(cmd)
    }

    /// Copies a buffer into an image, one region per mip level.
    ///
    /// `mip_offsets[i]` is the byte offset of level `i` inside `src`. The
    /// image must already be in `TRANSFER_DST_OPTIMAL`. Mip extents halve
    /// per level with a floor of 1.
    ///
    /// # Errors
    ///
    /// Returns an error if recording or submission fails.
    pub fn copy_buffer_to_image(
        &self,
        src: vk::Buffer,
        image: vk::Image,
        width: u32,
        height: u32,
        mip_offsets: &[vk::DeviceSize],
    ) -> Result<(), RhiError> {
        let cmd = self.begin_one_shot()?;

        let regions: Vec<vk::BufferImageCopy> = mip_offsets
            .iter()
            .enumerate()
            .map(|(level, &offset)| {
                let mip_width = (width >> level).max(1);
                let mip_height = (height >> level).max(1);

                vk::BufferImageCopy::default()
                    .buffer_offset(offset)
                    .image_subresource(
                        vk::ImageSubresourceLayers::default()
                            .aspect_mask(vk::ImageAspectFlags::COLOR)
                            .mip_level(level as u32)
                            .base_array_layer(0)
                            .layer_count(1),
                    )
                    .image_extent(vk::Extent3D {
                        width: mip_width,
                        height: mip_height,
                        depth: 1,
                    })
            })
            .collect();

        unsafe {
            self.device.cmd_copy_buffer_to_image(
                cmd,
                src,
                image,
                vk::ImageLayout::TRANSFER_DST_OPTIMAL,
                &regions,
            );
        }

        self.end_one_shot(cmd)
    }
}

impl Drop for Device {
    fn drop(&mut self) {
        unsafe {
            if let Err(e) = self.device.device_wait_idle() {
                tracing::error!("Failed to wait for device idle during drop: {:?}", e);
            }

            self.device.destroy_command_pool(self.upload_pool, None);

            // The allocator frees its memory blocks against the live device
            ManuallyDrop::drop(&mut self.allocator);

            self.device.destroy_device(None);
        }
        info!("Logical device destroyed");
    }
}

// Safety: ash::Device is Send+Sync, the queue and pool handles are plain
// Copy handles, and the allocator is behind a Mutex.
unsafe impl Send for Device {}
unsafe impl Sync for Device {}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_required_extensions_include_swapchain() {
        assert!(REQUIRED_DEVICE_EXTENSIONS.contains(&ash::khr::swapchain::NAME));
    }

    #[test]
    fn test_device_is_send_sync() {
        fn assert_send_sync<T: Send + Sync>() {}
        assert_send_sync::<Device>();
    }
}
