//! GPU texture uploads and the sampled-texture store.
//!
//! [`TextureStore`] accumulates sampled 2D textures. Each [`load`] call
//! uploads a full mip chain through a staging buffer, transitions the
//! image to `SHADER_READ_ONLY_OPTIMAL`, creates a view and a sampler, and
//! returns the index of the new entry. Entries live until the store is
//! dropped.
//!
//! The store takes decoded pixel data as a [`TextureUpload`]; container
//! parsing (DDS, PNG) happens upstream.
//!
//! [`load`]: TextureStore::load

use std::sync::Arc;

use ash::vk;
use gpu_allocator::vulkan::{Allocation, AllocationCreateDesc, AllocationScheme};
use gpu_allocator::MemoryLocation;
use tracing::{debug, warn};

use crate::buffer::{align_up, Buffer, BufferUsage};
use crate::device::Device;
use crate::error::{RhiError, RhiResult};

/// Pixel format of decoded texture data.
///
/// Covers the block-compressed formats common in DDS files plus plain
/// 8-bit RGBA/BGRA.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum TextureFormat {
    Bc1Unorm,
    Bc1Srgb,
    Bc2Unorm,
    Bc2Srgb,
    Bc3Unorm,
    Bc3Srgb,
    Bc5Unorm,
    Bc5Snorm,
    Rgba8Unorm,
    Rgba8Srgb,
    Bgra8Unorm,
    Bgra8Srgb,
    /// Format the decoder could not identify.
    Unknown,
}

impl TextureFormat {
    /// Maps to the Vulkan image format.
    ///
    /// [`TextureFormat::Unknown`] falls back to `BC1_RGBA_SRGB_BLOCK` with
    /// a warning; the draw will look wrong but stays valid.
    pub fn to_vk(self) -> vk::Format {
        match self {
            TextureFormat::Bc1Unorm => vk::Format::BC1_RGBA_UNORM_BLOCK,
            TextureFormat::Bc1Srgb => vk::Format::BC1_RGBA_SRGB_BLOCK,
            TextureFormat::Bc2Unorm => vk::Format::BC2_UNORM_BLOCK,
            TextureFormat::Bc2Srgb => vk::Format::BC2_SRGB_BLOCK,
            TextureFormat::Bc3Unorm => vk::Format::BC3_UNORM_BLOCK,
            TextureFormat::Bc3Srgb => vk::Format::BC3_SRGB_BLOCK,
            TextureFormat::Bc5Unorm => vk::Format::BC5_UNORM_BLOCK,
            TextureFormat::Bc5Snorm => vk::Format::BC5_SNORM_BLOCK,
            TextureFormat::Rgba8Unorm => vk::Format::R8G8B8A8_UNORM,
            TextureFormat::Rgba8Srgb => vk::Format::R8G8B8A8_SRGB,
            TextureFormat::Bgra8Unorm => vk::Format::B8G8R8A8_UNORM,
            TextureFormat::Bgra8Srgb => vk::Format::B8G8R8A8_SRGB,
            TextureFormat::Unknown => {
                warn!("Unknown texture format, falling back to BC1_RGBA_SRGB_BLOCK");
                vk::Format::BC1_RGBA_SRGB_BLOCK
            }
        }
    }
}

/// One mip level of decoded pixel data.
#[derive(Clone, Copy, Debug)]
pub struct MipLevel<'a> {
    /// Width of this level in pixels.
    pub width: u32,
    /// Height of this level in pixels.
    pub height: u32,
    /// Raw pixel bytes for this level.
    pub data: &'a [u8],
}

/// Decoded texture ready for upload.
///
/// `mips[0]` is the base level; widths must strictly decrease down the
/// chain.
#[derive(Clone, Copy, Debug)]
pub struct TextureUpload<'a> {
    /// Pixel format of every level.
    pub format: TextureFormat,
    /// Mip chain, base level first.
    pub mips: &'a [MipLevel<'a>],
}

impl TextureUpload<'_> {
    /// Validates the mip chain.
    ///
    /// # Errors
    ///
    /// Returns an error if the chain is empty, a level has no data, or
    /// widths do not strictly decrease.
    pub fn validate(&self) -> RhiResult<()> {
        if self.mips.is_empty() {
            return Err(RhiError::TextureError("Empty mip chain".to_string()));
        }

        for (level, mip) in self.mips.iter().enumerate() {
            if mip.data.is_empty() {
                return Err(RhiError::TextureError(format!(
                    "Mip level {} has no data",
                    level
                )));
            }
        }

        for (level, pair) in self.mips.windows(2).enumerate() {
            if pair[1].width >= pair[0].width {
                return Err(RhiError::TextureError(format!(
                    "Mip level {} width {} does not decrease from {}",
                    level + 1,
                    pair[1].width,
                    pair[0].width
                )));
            }
        }

        Ok(())
    }
}

/// One uploaded texture.
struct TextureEntry {
    image: vk::Image,
    allocation: Option<Allocation>,
    view: vk::ImageView,
    sampler: vk::Sampler,
}

/// Accumulating store of sampled GPU textures.
///
/// Textures are appended by [`load`] and referenced by index; nothing is
/// ever evicted while the store is alive.
///
/// [`load`]: TextureStore::load
pub struct TextureStore {
    device: Arc<Device>,
    entries: Vec<TextureEntry>,
}

// Staging offsets for block-compressed levels must sit on a texel block
// boundary; 16 covers every supported format.
const MIP_OFFSET_ALIGNMENT: u64 = 16;

impl TextureStore {
    /// Creates an empty store.
    pub fn new(device: Arc<Device>) -> Self {
        Self {
            device,
            entries: Vec::new(),
        }
    }

    /// Uploads a texture and appends it to the store.
    ///
    /// Returns the index of the new entry. Indices are stable for the
    /// lifetime of the store.
    ///
    /// # Errors
    ///
    /// Returns an error if the mip chain is invalid or any Vulkan call
    /// fails.
    pub fn load(&mut self, upload: &TextureUpload) -> RhiResult<usize> {
        upload.validate()?;

        let format = upload.format.to_vk();
        let base = &upload.mips[0];
        let mip_levels = upload.mips.len() as u32;

        // Pack all levels into one staging buffer
        let mut mip_offsets = Vec::with_capacity(upload.mips.len());
        let mut total_size: vk::DeviceSize = 0;
        for mip in upload.mips {
            let offset = align_up(total_size, MIP_OFFSET_ALIGNMENT);
            mip_offsets.push(offset);
            total_size = offset + mip.data.len() as vk::DeviceSize;
        }

        let staging = Buffer::new(self.device.clone(), total_size, 1, BufferUsage::Staging, 1)?;
        for (mip, &offset) in upload.mips.iter().zip(&mip_offsets) {
            staging.write_to_buffer(mip.data, offset)?;
        }
        staging.flush(vk::WHOLE_SIZE, 0)?;

        let image_info = vk::ImageCreateInfo::default()
            .image_type(vk::ImageType::TYPE_2D)
            .format(format)
            .extent(vk::Extent3D {
                width: base.width,
                height: base.height,
                depth: 1,
            })
            .mip_levels(mip_levels)
            .array_layers(1)
            .samples(vk::SampleCountFlags::TYPE_1)
            .tiling(vk::ImageTiling::OPTIMAL)
            .usage(vk::ImageUsageFlags::TRANSFER_DST | vk::ImageUsageFlags::SAMPLED)
            .sharing_mode(vk::SharingMode::EXCLUSIVE)
            .initial_layout(vk::ImageLayout::UNDEFINED);

        let image = unsafe { self.device.handle().create_image(&image_info, None)? };
        let requirements = unsafe { self.device.handle().get_image_memory_requirements(image) };

        let allocation = self
            .device
            .allocator()
            .lock()
            .map_err(|_| RhiError::TextureError("Allocator lock poisoned".to_string()))?
            .allocate(&AllocationCreateDesc {
                name: "texture",
                requirements,
                location: MemoryLocation::GpuOnly,
                linear: false,
                allocation_scheme: AllocationScheme::GpuAllocatorManaged,
            })?;

        unsafe {
            self.device
                .handle()
                .bind_image_memory(image, allocation.memory(), allocation.offset())?;
        }

        self.transition_layout(
            image,
            mip_levels,
            vk::ImageLayout::UNDEFINED,
            vk::ImageLayout::TRANSFER_DST_OPTIMAL,
        )?;

        self.device.copy_buffer_to_image(
            staging.handle(),
            image,
            base.width,
            base.height,
            &mip_offsets,
        )?;

        self.transition_layout(
            image,
            mip_levels,
            vk::ImageLayout::TRANSFER_DST_OPTIMAL,
            vk::ImageLayout::SHADER_READ_ONLY_OPTIMAL,
        )?;

        let view_info = vk::ImageViewCreateInfo::default()
            .image(image)
            .view_type(vk::ImageViewType::TYPE_2D)
            .format(format)
            .subresource_range(
                vk::ImageSubresourceRange::default()
                    .aspect_mask(vk::ImageAspectFlags::COLOR)
                    .base_mip_level(0)
                    .level_count(mip_levels)
                    .base_array_layer(0)
                    .layer_count(1),
            );
        let view = unsafe { self.device.handle().create_image_view(&view_info, None)? };

        let sampler_info = vk::SamplerCreateInfo::default()
            .mag_filter(vk::Filter::LINEAR)
            .min_filter(vk::Filter::LINEAR)
            .mipmap_mode(vk::SamplerMipmapMode::LINEAR)
            .address_mode_u(vk::SamplerAddressMode::REPEAT)
            .address_mode_v(vk::SamplerAddressMode::REPEAT)
            .address_mode_w(vk::SamplerAddressMode::REPEAT)
            .anisotropy_enable(true)
            .max_anisotropy(self.device.max_sampler_anisotropy().min(16.0))
            .min_lod(0.0)
            .max_lod(mip_levels as f32)
            .border_color(vk::BorderColor::INT_OPAQUE_BLACK);
        let sampler = unsafe { self.device.handle().create_sampler(&sampler_info, None)? };

        self.entries.push(TextureEntry {
            image,
            allocation: Some(allocation),
            view,
            sampler,
        });

        let index = self.entries.len() - 1;
        debug!(
            "Loaded texture {} ({}x{}, {} mip level(s), {:?})",
            index, base.width, base.height, mip_levels, format
        );

        Ok(index)
    }

    /// Number of textures loaded so far.
    #[inline]
    pub fn count(&self) -> usize {
        self.entries.len()
    }

    /// Descriptor image info for the texture at `index`.
    ///
    /// # Panics
    ///
    /// Panics if `index` is out of bounds.
    pub fn image_info(&self, index: usize) -> vk::DescriptorImageInfo {
        let entry = &self.entries[index];
        vk::DescriptorImageInfo::default()
            .image_layout(vk::ImageLayout::SHADER_READ_ONLY_OPTIMAL)
            .image_view(entry.view)
            .sampler(entry.sampler)
    }

    /// Records the two supported layout transitions through a one-shot
    /// command buffer.
    fn transition_layout(
        &self,
        image: vk::Image,
        mip_levels: u32,
        old_layout: vk::ImageLayout,
        new_layout: vk::ImageLayout,
    ) -> RhiResult<()> {
        let (src_access, dst_access, src_stage, dst_stage) = match (old_layout, new_layout) {
            (vk::ImageLayout::UNDEFINED, vk::ImageLayout::TRANSFER_DST_OPTIMAL) => (
                vk::AccessFlags::empty(),
                vk::AccessFlags::TRANSFER_WRITE,
                vk::PipelineStageFlags::TOP_OF_PIPE,
                vk::PipelineStageFlags::TRANSFER,
            ),
            (vk::ImageLayout::TRANSFER_DST_OPTIMAL, vk::ImageLayout::SHADER_READ_ONLY_OPTIMAL) => {
                (
                    vk::AccessFlags::TRANSFER_WRITE,
                    vk::AccessFlags::SHADER_READ,
                    vk::PipelineStageFlags::TRANSFER,
                    vk::PipelineStageFlags::FRAGMENT_SHADER,
                )
            }
            _ => {
                return Err(RhiError::TextureError(format!(
                    "Unsupported layout transition {:?} -> {:?}",
                    old_layout, new_layout
                )))
            }
        };

        let barrier = vk::ImageMemoryBarrier::default()
            .old_layout(old_layout)
            .new_layout(new_layout)
            .src_queue_family_index(vk::QUEUE_FAMILY_IGNORED)
            .dst_queue_family_index(vk::QUEUE_FAMILY_IGNORED)
            .image(image)
            .src_access_mask(src_access)
            .dst_access_mask(dst_access)
            .subresource_range(
                vk::ImageSubresourceRange::default()
                    .aspect_mask(vk::ImageAspectFlags::COLOR)
                    .base_mip_level(0)
                    .level_count(mip_levels)
                    .base_array_layer(0)
                    .layer_count(1),
            );

        let cmd = self.device.begin_one_shot()?;
        unsafe {
            self.device.handle().cmd_pipeline_barrier(
                cmd,
                src_stage,
                dst_stage,
                vk::DependencyFlags::empty(),
                &[],
                &[],
                &[barrier],
            );
        }
        self.device.end_one_shot(cmd)
    }
}

impl Drop for TextureStore {
    fn drop(&mut self) {
        for entry in &mut self.entries {
            unsafe {
                self.device.handle().destroy_sampler(entry.sampler, None);
                self.device.handle().destroy_image_view(entry.view, None);
            }
            if let Some(allocation) = entry.allocation.take() {
                if let Ok(mut allocator) = self.device.allocator().lock() {
                    let _ = allocator.free(allocation);
                }
            }
            unsafe {
                self.device.handle().destroy_image(entry.image, None);
            }
        }
        debug!("Destroyed {} texture(s)", self.entries.len());
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_format_mapping() {
        assert_eq!(
            TextureFormat::Bc3Srgb.to_vk(),
            vk::Format::BC3_SRGB_BLOCK
        );
        assert_eq!(
            TextureFormat::Bc5Snorm.to_vk(),
            vk::Format::BC5_SNORM_BLOCK
        );
        assert_eq!(TextureFormat::Rgba8Srgb.to_vk(), vk::Format::R8G8B8A8_SRGB);
        assert_eq!(TextureFormat::Bgra8Unorm.to_vk(), vk::Format::B8G8R8A8_UNORM);
    }

    #[test]
    fn test_unknown_format_falls_back() {
        assert_eq!(
            TextureFormat::Unknown.to_vk(),
            vk::Format::BC1_RGBA_SRGB_BLOCK
        );
    }

    #[test]
    fn test_validate_accepts_decreasing_chain() {
        let data = [0u8; 16];
        let mips = [
            MipLevel {
                width: 8,
                height: 8,
                data: &data,
            },
            MipLevel {
                width: 4,
                height: 4,
                data: &data,
            },
            MipLevel {
                width: 2,
                height: 2,
                data: &data,
            },
        ];
        let upload = TextureUpload {
            format: TextureFormat::Bc1Srgb,
            mips: &mips,
        };
        assert!(upload.validate().is_ok());
    }

    #[test]
    fn test_validate_rejects_empty_chain() {
        let upload = TextureUpload {
            format: TextureFormat::Bc1Srgb,
            mips: &[],
        };
        assert!(upload.validate().is_err());
    }

    #[test]
    fn test_validate_rejects_non_decreasing_width() {
        let data = [0u8; 16];
        let mips = [
            MipLevel {
                width: 8,
                height: 8,
                data: &data,
            },
            MipLevel {
                width: 8,
                height: 4,
                data: &data,
            },
        ];
        let upload = TextureUpload {
            format: TextureFormat::Bc1Srgb,
            mips: &mips,
        };
        assert!(upload.validate().is_err());
    }

    #[test]
    fn test_validate_rejects_empty_level_data() {
        let data = [0u8; 16];
        let mips = [
            MipLevel {
                width: 8,
                height: 8,
                data: &data,
            },
            MipLevel {
                width: 4,
                height: 4,
                data: &[],
            },
        ];
        let upload = TextureUpload {
            format: TextureFormat::Bc1Srgb,
            mips: &mips,
        };
        assert!(upload.validate().is_err());
    }
}
