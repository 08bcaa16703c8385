//! Descriptor set management for shader resource binding.
//!
//! Three pieces cooperate here:
//! - [`DescriptorSetLayout`], built through [`DescriptorSetLayoutBuilder`],
//!   which records the binding table so writes can be validated later
//! - [`DescriptorPool`], built through [`DescriptorPoolBuilder`]; running
//!   out of pool capacity is a recoverable condition, reported as
//!   `Ok(None)` rather than an error
//! - [`DescriptorWriter`], which batches buffer/image writes against a
//!   layout and either allocates a fresh set or overwrites an existing one
//!
//! # Example
//!
//! ```no_run
//! use std::sync::Arc;
//! use ash::vk;
//! use meshview_rhi::device::Device;
//! use meshview_rhi::descriptor::{
//!     DescriptorPool, DescriptorSetLayout, DescriptorWriter,
//! };
//!
//! # fn example(device: Arc<Device>, info: vk::DescriptorBufferInfo) -> Result<(), meshview_rhi::RhiError> {
//! let layout = DescriptorSetLayout::builder()
//!     .add_binding(
//!         0,
//!         vk::DescriptorType::UNIFORM_BUFFER,
//!         vk::ShaderStageFlags::VERTEX | vk::ShaderStageFlags::FRAGMENT,
//!         1,
//!     )
//!     .build(device.clone())?;
//!
//! let pool = DescriptorPool::builder()
//!     .pool_size(vk::DescriptorType::UNIFORM_BUFFER, 4)
//!     .max_sets(4)
//!     .build(device.clone())?;
//!
//! let set = DescriptorWriter::new(&layout, &pool)
//!     .write_buffer(0, info)
//!     .build()?;
//! # Ok(())
//! # }
//! ```

use std::collections::BTreeMap;
use std::sync::Arc;

use ash::vk;
use tracing::{debug, warn};

use crate::device::Device;
use crate::error::RhiResult;

/// One registered binding slot in a layout.
#[derive(Clone, Copy, Debug)]
struct BindingDesc {
    descriptor_type: vk::DescriptorType,
    stage_flags: vk::ShaderStageFlags,
    count: u32,
}

/// Builder for [`DescriptorSetLayout`].
#[derive(Default)]
pub struct DescriptorSetLayoutBuilder {
    bindings: BTreeMap<u32, BindingDesc>,
}

impl DescriptorSetLayoutBuilder {
    /// Creates an empty builder.
    pub fn new() -> Self {
        Self::default()
    }

    /// Registers a binding slot.
    ///
    /// # Panics
    ///
    /// Panics if `binding` was already registered; reusing a slot is a
    /// programming error, not a runtime condition.
    pub fn add_binding(
        mut self,
        binding: u32,
        descriptor_type: vk::DescriptorType,
        stage_flags: vk::ShaderStageFlags,
        count: u32,
    ) -> Self {
        let previous = self.bindings.insert(
            binding,
            BindingDesc {
                descriptor_type,
                stage_flags,
                count,
            },
        );
        assert!(previous.is_none(), "binding {} already in use", binding);
        self
    }

    /// Number of bindings registered so far.
    #[inline]
    pub fn binding_count(&self) -> usize {
        self.bindings.len()
    }

    /// Creates the layout on the device.
    ///
    /// # Errors
    ///
    /// Returns an error if layout creation fails.
    pub fn build(self, device: Arc<Device>) -> RhiResult<DescriptorSetLayout> {
        let vk_bindings: Vec<vk::DescriptorSetLayoutBinding> = self
            .bindings
            .iter()
            .map(|(&binding, desc)| {
                vk::DescriptorSetLayoutBinding::default()
                    .binding(binding)
                    .descriptor_type(desc.descriptor_type)
                    .descriptor_count(desc.count)
                    .stage_flags(desc.stage_flags)
            })
            .collect();

        let create_info = vk::DescriptorSetLayoutCreateInfo::default().bindings(&vk_bindings);

        let layout = unsafe {
            device
                .handle()
                .create_descriptor_set_layout(&create_info, None)?
        };

        debug!(
            "Created descriptor set layout with {} binding(s)",
            self.bindings.len()
        );

        Ok(DescriptorSetLayout {
            device,
            layout,
            bindings: self.bindings,
        })
    }
}

/// Descriptor set layout wrapper.
///
/// Keeps the binding table around so [`DescriptorWriter`] can validate
/// writes against it.
///
/// # Thread Safety
///
/// Immutable after creation; share via `Arc`.
pub struct DescriptorSetLayout {
    /// Reference to the logical device.
    device: Arc<Device>,
    /// Vulkan descriptor set layout handle.
    layout: vk::DescriptorSetLayout,
    /// Binding table, keyed by slot.
    bindings: BTreeMap<u32, BindingDesc>,
}

impl DescriptorSetLayout {
    /// Starts building a layout.
    pub fn builder() -> DescriptorSetLayoutBuilder {
        DescriptorSetLayoutBuilder::new()
    }

    /// Returns the Vulkan descriptor set layout handle.
    #[inline]
    pub fn handle(&self) -> vk::DescriptorSetLayout {
        self.layout
    }

    /// Whether `binding` is registered in this layout.
    #[inline]
    pub fn has_binding(&self, binding: u32) -> bool {
        self.bindings.contains_key(&binding)
    }

    fn binding(&self, binding: u32) -> Option<&BindingDesc> {
        self.bindings.get(&binding)
    }
}

impl Drop for DescriptorSetLayout {
    fn drop(&mut self) {
        unsafe {
            self.device
                .handle()
                .destroy_descriptor_set_layout(self.layout, None);
        }
        debug!("Destroyed descriptor set layout");
    }
}

/// Builder for [`DescriptorPool`].
#[derive(Default)]
pub struct DescriptorPoolBuilder {
    pool_sizes: Vec<vk::DescriptorPoolSize>,
    max_sets: u32,
    flags: vk::DescriptorPoolCreateFlags,
}

impl DescriptorPoolBuilder {
    /// Creates an empty builder.
    pub fn new() -> Self {
        Self {
            pool_sizes: Vec::new(),
            max_sets: 1,
            flags: vk::DescriptorPoolCreateFlags::empty(),
        }
    }

    /// Adds capacity for `count` descriptors of the given type.
    pub fn pool_size(mut self, ty: vk::DescriptorType, count: u32) -> Self {
        self.pool_sizes
            .push(vk::DescriptorPoolSize::default().ty(ty).descriptor_count(count));
        self
    }

    /// Sets the maximum number of sets allocatable from the pool.
    pub fn max_sets(mut self, max_sets: u32) -> Self {
        self.max_sets = max_sets;
        self
    }

    /// Sets additional pool create flags.
    pub fn flags(mut self, flags: vk::DescriptorPoolCreateFlags) -> Self {
        self.flags = flags;
        self
    }

    /// Creates the pool on the device.
    ///
    /// The `FREE_DESCRIPTOR_SET` flag is always set so individual sets can
    /// be returned.
    ///
    /// # Errors
    ///
    /// Returns an error if pool creation fails.
    pub fn build(self, device: Arc<Device>) -> RhiResult<DescriptorPool> {
        let create_info = vk::DescriptorPoolCreateInfo::default()
            .max_sets(self.max_sets)
            .pool_sizes(&self.pool_sizes)
            .flags(self.flags | vk::DescriptorPoolCreateFlags::FREE_DESCRIPTOR_SET);

        let pool = unsafe { device.handle().create_descriptor_pool(&create_info, None)? };

        debug!(
            "Created descriptor pool: max_sets={}, {} pool size(s)",
            self.max_sets,
            self.pool_sizes.len()
        );

        Ok(DescriptorPool {
            device,
            pool,
            max_sets: self.max_sets,
        })
    }
}

/// Descriptor pool for allocating descriptor sets.
///
/// # Thread Safety
///
/// Pool operations are not thread-safe; synchronize externally.
pub struct DescriptorPool {
    /// Reference to the logical device.
    device: Arc<Device>,
    /// Vulkan descriptor pool handle.
    pool: vk::DescriptorPool,
    /// Maximum number of sets that can be allocated.
    max_sets: u32,
}

impl DescriptorPool {
    /// Starts building a pool.
    pub fn builder() -> DescriptorPoolBuilder {
        DescriptorPoolBuilder::new()
    }

    /// Allocates one descriptor set with the given layout.
    ///
    /// Returns `Ok(None)` when the pool is out of capacity
    /// (`ERROR_OUT_OF_POOL_MEMORY` or `ERROR_FRAGMENTED_POOL`); the caller
    /// can retry against a bigger pool.
    ///
    /// # Errors
    ///
    /// Any other allocation failure is returned as an error.
    pub fn allocate(&self, layout: &DescriptorSetLayout) -> RhiResult<Option<vk::DescriptorSet>> {
        let layouts = [layout.handle()];
        let alloc_info = vk::DescriptorSetAllocateInfo::default()
            .descriptor_pool(self.pool)
            .set_layouts(&layouts);

        match unsafe { self.device.handle().allocate_descriptor_sets(&alloc_info) } {
            Ok(sets) => Ok(Some(sets[0])),
            Err(vk::Result::ERROR_OUT_OF_POOL_MEMORY | vk::Result::ERROR_FRAGMENTED_POOL) => {
                warn!("Descriptor pool exhausted (max_sets={})", self.max_sets);
                Ok(None)
            }
            Err(e) => Err(e.into()),
        }
    }

    /// Frees descriptor sets back to the pool.
    ///
    /// The caller must ensure the sets are not in use by the GPU.
    ///
    /// # Errors
    ///
    /// Returns an error if freeing fails.
    pub fn free(&self, sets: &[vk::DescriptorSet]) -> RhiResult<()> {
        unsafe {
            self.device.handle().free_descriptor_sets(self.pool, sets)?;
        }

        debug!("Freed {} descriptor set(s)", sets.len());
        Ok(())
    }

    /// Resets the pool, reclaiming every allocated set at once.
    ///
    /// The caller must ensure no set from this pool is in use by the GPU.
    ///
    /// # Errors
    ///
    /// Returns an error if the reset fails.
    pub fn reset(&self) -> RhiResult<()> {
        unsafe {
            self.device
                .handle()
                .reset_descriptor_pool(self.pool, vk::DescriptorPoolResetFlags::empty())?;
        }

        debug!("Reset descriptor pool");
        Ok(())
    }

    /// Returns the Vulkan descriptor pool handle.
    #[inline]
    pub fn handle(&self) -> vk::DescriptorPool {
        self.pool
    }

    /// Maximum number of sets allocatable from this pool.
    #[inline]
    pub fn max_sets(&self) -> u32 {
        self.max_sets
    }

    fn device(&self) -> &Device {
        &self.device
    }
}

impl Drop for DescriptorPool {
    fn drop(&mut self) {
        unsafe {
            self.device
                .handle()
                .destroy_descriptor_pool(self.pool, None);
        }
        debug!("Destroyed descriptor pool");
    }
}

/// A pending descriptor write, with its info stored by value so the
/// `WriteDescriptorSet` pointers stay valid while the batch is applied.
enum PendingWrite {
    Buffer(vk::DescriptorBufferInfo),
    Image(vk::DescriptorImageInfo),
}

/// Batches descriptor writes for one set against a layout.
///
/// Writes are validated against the layout's binding table up front, then
/// applied in a single `vkUpdateDescriptorSets` call by [`build`] or
/// [`overwrite`].
///
/// [`build`]: DescriptorWriter::build
/// [`overwrite`]: DescriptorWriter::overwrite
pub struct DescriptorWriter<'a> {
    layout: &'a DescriptorSetLayout,
    pool: &'a DescriptorPool,
    writes: Vec<(u32, vk::DescriptorType, PendingWrite)>,
}

impl<'a> DescriptorWriter<'a> {
    /// Creates a writer for the given layout and pool.
    pub fn new(layout: &'a DescriptorSetLayout, pool: &'a DescriptorPool) -> Self {
        Self {
            layout,
            pool,
            writes: Vec::new(),
        }
    }

    /// Queues a buffer write for `binding`.
    ///
    /// # Panics
    ///
    /// Panics if the layout has no such binding or the binding holds more
    /// than one descriptor.
    pub fn write_buffer(mut self, binding: u32, info: vk::DescriptorBufferInfo) -> Self {
        let desc = self
            .layout
            .binding(binding)
            .unwrap_or_else(|| panic!("layout has no binding {}", binding));
        assert_eq!(
            desc.count, 1,
            "binding {} expects {} descriptors, single write given",
            binding, desc.count
        );

        self.writes
            .push((binding, desc.descriptor_type, PendingWrite::Buffer(info)));
        self
    }

    /// Queues an image write for `binding`.
    ///
    /// # Panics
    ///
    /// Panics if the layout has no such binding or the binding holds more
    /// than one descriptor.
    pub fn write_image(mut self, binding: u32, info: vk::DescriptorImageInfo) -> Self {
        let desc = self
            .layout
            .binding(binding)
            .unwrap_or_else(|| panic!("layout has no binding {}", binding));
        assert_eq!(
            desc.count, 1,
            "binding {} expects {} descriptors, single write given",
            binding, desc.count
        );

        self.writes
            .push((binding, desc.descriptor_type, PendingWrite::Image(info)));
        self
    }

    /// Allocates a set from the pool and applies the queued writes.
    ///
    /// Returns `Ok(None)` when the pool is exhausted.
    ///
    /// # Errors
    ///
    /// Returns an error if allocation fails for another reason.
    pub fn build(self) -> RhiResult<Option<vk::DescriptorSet>> {
        let Some(set) = self.pool.allocate(self.layout)? else {
            return Ok(None);
        };
        self.overwrite(set);
        Ok(Some(set))
    }

    /// Applies the queued writes to an existing set.
    pub fn overwrite(&self, set: vk::DescriptorSet) {
        let vk_writes: Vec<vk::WriteDescriptorSet> = self
            .writes
            .iter()
            .map(|(binding, ty, pending)| {
                let write = vk::WriteDescriptorSet::default()
                    .dst_set(set)
                    .dst_binding(*binding)
                    .dst_array_element(0)
                    .descriptor_type(*ty);

                match pending {
                    PendingWrite::Buffer(info) => write.buffer_info(std::slice::from_ref(info)),
                    PendingWrite::Image(info) => write.image_info(std::slice::from_ref(info)),
                }
            })
            .collect();

        if vk_writes.is_empty() {
            return;
        }

        unsafe {
            self.pool
                .device()
                .handle()
                .update_descriptor_sets(&vk_writes, &[]);
        }

        debug!("Wrote {} descriptor(s)", vk_writes.len());
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_layout_builder_collects_bindings() {
        let builder = DescriptorSetLayout::builder()
            .add_binding(
                0,
                vk::DescriptorType::UNIFORM_BUFFER,
                vk::ShaderStageFlags::VERTEX,
                1,
            )
            .add_binding(
                1,
                vk::DescriptorType::COMBINED_IMAGE_SAMPLER,
                vk::ShaderStageFlags::FRAGMENT,
                1,
            );

        assert_eq!(builder.binding_count(), 2);
    }

    #[test]
    #[should_panic(expected = "binding 0 already in use")]
    fn test_layout_builder_rejects_duplicate_binding() {
        let _ = DescriptorSetLayout::builder()
            .add_binding(
                0,
                vk::DescriptorType::UNIFORM_BUFFER,
                vk::ShaderStageFlags::VERTEX,
                1,
            )
            .add_binding(
                0,
                vk::DescriptorType::COMBINED_IMAGE_SAMPLER,
                vk::ShaderStageFlags::FRAGMENT,
                1,
            );
    }

    #[test]
    fn test_layout_builder_sparse_slots_allowed() {
        // Slots need not be contiguous, only unique
        let builder = DescriptorSetLayout::builder()
            .add_binding(
                0,
                vk::DescriptorType::UNIFORM_BUFFER,
                vk::ShaderStageFlags::VERTEX,
                1,
            )
            .add_binding(
                5,
                vk::DescriptorType::COMBINED_IMAGE_SAMPLER,
                vk::ShaderStageFlags::FRAGMENT,
                1,
            );

        assert_eq!(builder.binding_count(), 2);
    }

    #[test]
    fn test_pool_builder_accumulates_sizes() {
        let builder = DescriptorPool::builder()
            .pool_size(vk::DescriptorType::UNIFORM_BUFFER, 8)
            .pool_size(vk::DescriptorType::COMBINED_IMAGE_SAMPLER, 4)
            .max_sets(8);

        assert_eq!(builder.pool_sizes.len(), 2);
        assert_eq!(builder.max_sets, 8);
    }
}
