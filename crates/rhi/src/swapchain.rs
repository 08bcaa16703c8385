//! Swapchain management.
//!
//! The [`Swapchain`] owns everything needed to put pixels on screen as one
//! bundle: the `VkSwapchainKHR` with its color images and views, one depth
//! image per swapchain image, the render pass, one framebuffer per image,
//! and the frame synchronization objects (semaphore pairs and fences for
//! [`MAX_FRAMES_IN_FLIGHT`] frames, plus a fence slot per image tracking
//! which frame last rendered to it).
//!
//! Two counters drive the protocol and they are independent: the *frame
//! index* (owned by the caller, cycling modulo [`MAX_FRAMES_IN_FLIGHT`])
//! selects the sync objects, while the *image index* (returned by the
//! presentation engine) selects the framebuffer. The swapchain never
//! advances the frame index itself.
//!
//! # Example
//!
//! ```no_run
//! # use meshview_rhi::swapchain::Swapchain;
//! // let mut swapchain = Swapchain::new(&instance, device, surface, extent)?;
//! // let (image_index, _) = swapchain.acquire_next_image(frame_index)?;
//! // ... record into a command buffer targeting swapchain.framebuffer(image_index) ...
//! // let present_result = swapchain.submit_command_buffers(cmd, image_index, frame_index)?;
//! ```

use std::sync::Arc;

use ash::vk;
use gpu_allocator::MemoryLocation;
use gpu_allocator::vulkan::{Allocation, AllocationCreateDesc, AllocationScheme};
use tracing::{debug, info, warn};

use crate::device::Device;
use crate::error::{RhiError, RhiResult};
use crate::instance::Instance;

/// Number of frames that may be recorded while earlier ones execute.
pub const MAX_FRAMES_IN_FLIGHT: usize = 2;

/// Depth formats tried in order of preference.
const DEPTH_FORMAT_CANDIDATES: [vk::Format; 3] = [
    vk::Format::D32_SFLOAT,
    vk::Format::D32_SFLOAT_S8_UINT,
    vk::Format::D24_UNORM_S8_UINT,
];

/// Swapchain surface support details.
#[derive(Debug, Clone)]
pub struct SwapchainSupportDetails {
    /// Surface capabilities (min/max image count, extents, transforms)
    pub capabilities: vk::SurfaceCapabilitiesKHR,
    /// Supported surface formats
    pub formats: Vec<vk::SurfaceFormatKHR>,
    /// Supported present modes
    pub present_modes: Vec<vk::PresentModeKHR>,
}

impl SwapchainSupportDetails {
    /// Queries swapchain support for a physical device and surface.
    ///
    /// # Errors
    ///
    /// Returns an error if any of the queries fail.
    pub fn query(
        physical_device: vk::PhysicalDevice,
        surface: vk::SurfaceKHR,
        surface_loader: &ash::khr::surface::Instance,
    ) -> Result<Self, RhiError> {
        let capabilities = unsafe {
            surface_loader.get_physical_device_surface_capabilities(physical_device, surface)?
        };

        let formats = unsafe {
            surface_loader.get_physical_device_surface_formats(physical_device, surface)?
        };

        let present_modes = unsafe {
            surface_loader.get_physical_device_surface_present_modes(physical_device, surface)?
        };

        debug!(
            "Swapchain support: {} formats, {} present modes, image count: {}-{}",
            formats.len(),
            present_modes.len(),
            capabilities.min_image_count,
            if capabilities.max_image_count == 0 {
                "unlimited".to_string()
            } else {
                capabilities.max_image_count.to_string()
            }
        );

        Ok(Self {
            capabilities,
            formats,
            present_modes,
        })
    }

    /// True if at least one format and one present mode are available.
    #[inline]
    pub fn is_adequate(&self) -> bool {
        !self.formats.is_empty() && !self.present_modes.is_empty()
    }
}

/// Per-image depth attachment resources.
struct DepthResources {
    image: vk::Image,
    allocation: Option<Allocation>,
    view: vk::ImageView,
    sampler: vk::Sampler,
}

/// Vulkan swapchain bundle: images, depth buffers, render pass,
/// framebuffers, and frame synchronization.
///
/// # Thread Safety
///
/// Not thread-safe; drive it from the render thread only.
pub struct Swapchain {
    /// Reference to the logical device
    device: Arc<Device>,
    /// Swapchain extension loader
    swapchain_loader: ash::khr::swapchain::Device,
    /// Swapchain handle
    swapchain: vk::SwapchainKHR,
    /// Swapchain images (owned by the swapchain handle)
    images: Vec<vk::Image>,
    /// Image views for the swapchain images
    image_views: Vec<vk::ImageView>,
    /// Per-image depth resources
    depth: Vec<DepthResources>,
    /// Swapchain color format
    format: vk::Format,
    /// Depth attachment format
    depth_format: vk::Format,
    /// Swapchain extent (resolution)
    extent: vk::Extent2D,
    /// Present mode
    present_mode: vk::PresentModeKHR,
    /// Render pass targeting color + depth
    render_pass: vk::RenderPass,
    /// One framebuffer per swapchain image
    framebuffers: Vec<vk::Framebuffer>,
    /// Per-frame: image acquired semaphores
    image_available: Vec<vk::Semaphore>,
    /// Per-frame: rendering finished semaphores
    render_finished: Vec<vk::Semaphore>,
    /// Per-frame: work-complete fences, created signaled
    in_flight_fences: Vec<vk::Fence>,
    /// Per-image: copy of the fence of the frame last using the image.
    /// Null until the image is first used. Not owned.
    images_in_flight: Vec<vk::Fence>,
}

impl Swapchain {
    /// Creates a new swapchain for the given surface and window extent.
    ///
    /// Selection policy: B8G8R8A8_SRGB + SRGB_NONLINEAR when offered,
    /// MAILBOX present mode with FIFO fallback, min image count + 1.
    ///
    /// # Errors
    ///
    /// Returns an error if surface queries, swapchain creation, or any of
    /// the owned resources (depth, render pass, framebuffers, sync) fail.
    pub fn new(
        instance: &Instance,
        device: Arc<Device>,
        surface: vk::SurfaceKHR,
        window_extent: vk::Extent2D,
    ) -> Result<Self, RhiError> {
        Self::create_internal(
            instance,
            device,
            surface,
            window_extent,
            vk::SwapchainKHR::null(),
        )
    }

    /// Creates a swapchain that replaces `previous`.
    ///
    /// The old handle is passed as `old_swapchain` so the driver can reuse
    /// its resources; `previous` is destroyed once the new swapchain
    /// exists. The caller must check [`Swapchain::is_compatible_with`]
    /// against the old bundle before reusing pipelines built for it.
    ///
    /// # Errors
    ///
    /// Returns an error if creation fails. `previous` is still destroyed.
    pub fn with_previous(
        instance: &Instance,
        device: Arc<Device>,
        surface: vk::SurfaceKHR,
        window_extent: vk::Extent2D,
        previous: Swapchain,
    ) -> Result<Self, RhiError> {
        let result =
            Self::create_internal(instance, device, surface, window_extent, previous.swapchain);
        // Old bundle is retired either way; its Drop destroys the old
        // handle, which is legal once the new swapchain exists (or failed).
        drop(previous);
        result
    }

    fn create_internal(
        instance: &Instance,
        device: Arc<Device>,
        surface: vk::SurfaceKHR,
        window_extent: vk::Extent2D,
        old_swapchain: vk::SwapchainKHR,
    ) -> Result<Self, RhiError> {
        let swapchain_loader = ash::khr::swapchain::Device::new(instance.handle(), device.handle());
        let surface_loader = ash::khr::surface::Instance::new(instance.entry(), instance.handle());

        let support =
            SwapchainSupportDetails::query(device.physical_device(), surface, &surface_loader)?;

        if !support.is_adequate() {
            return Err(RhiError::SwapchainError(
                "Inadequate swapchain support (no formats or present modes)".to_string(),
            ));
        }

        let surface_format = choose_surface_format(&support.formats);
        let present_mode = choose_present_mode(&support.present_modes);
        let extent = choose_extent(
            &support.capabilities,
            window_extent.width,
            window_extent.height,
        );
        let image_count = determine_image_count(&support.capabilities);

        info!(
            "Creating swapchain: {}x{}, format {:?}, present mode {:?}, {} images",
            extent.width, extent.height, surface_format.format, present_mode, image_count
        );

        let queue_families = device.queue_families();
        let graphics_family = queue_families
            .graphics_family
            .ok_or(RhiError::NoSuitableGpu)?;
        let present_family = queue_families
            .present_family
            .ok_or(RhiError::NoSuitableGpu)?;
        let queue_family_indices = [graphics_family, present_family];

        let (sharing_mode, queue_family_indices_slice) = if graphics_family != present_family {
            debug!(
                "CONCURRENT sharing between graphics ({}) and present ({}) families",
                graphics_family, present_family
            );
            (vk::SharingMode::CONCURRENT, queue_family_indices.as_slice())
        } else {
            (vk::SharingMode::EXCLUSIVE, &[][..])
        };

        let create_info = vk::SwapchainCreateInfoKHR::default()
            .surface(surface)
            .min_image_count(image_count)
            .image_format(surface_format.format)
            .image_color_space(surface_format.color_space)
            .image_extent(extent)
            .image_array_layers(1)
            .image_usage(vk::ImageUsageFlags::COLOR_ATTACHMENT)
            .image_sharing_mode(sharing_mode)
            .queue_family_indices(queue_family_indices_slice)
            .pre_transform(support.capabilities.current_transform)
            .composite_alpha(vk::CompositeAlphaFlagsKHR::OPAQUE)
            .present_mode(present_mode)
            .clipped(true)
            .old_swapchain(old_swapchain);

        let swapchain = unsafe { swapchain_loader.create_swapchain(&create_info, None)? };

        let images = unsafe { swapchain_loader.get_swapchain_images(swapchain)? };
        info!("Swapchain created with {} images", images.len());

        let image_views = create_image_views(&device, &images, surface_format.format)?;

        let depth_format = device.find_supported_format(
            &DEPTH_FORMAT_CANDIDATES,
            vk::ImageTiling::OPTIMAL,
            vk::FormatFeatureFlags::DEPTH_STENCIL_ATTACHMENT,
        )?;
        debug!("Depth format: {:?}", depth_format);

        let render_pass = create_render_pass(&device, surface_format.format, depth_format)?;

        let depth = create_depth_resources(&device, images.len(), extent, depth_format)?;

        let framebuffers = create_framebuffers(
            &device,
            render_pass,
            &image_views,
            &depth,
            extent,
        )?;

        let (image_available, render_finished, in_flight_fences) = create_sync_objects(&device)?;
        let images_in_flight = vec![vk::Fence::null(); images.len()];

        Ok(Self {
            device,
            swapchain_loader,
            swapchain,
            images,
            image_views,
            depth,
            format: surface_format.format,
            depth_format,
            extent,
            present_mode,
            render_pass,
            framebuffers,
            image_available,
            render_finished,
            in_flight_fences,
            images_in_flight,
        })
    }

    /// Waits for the given frame's fence, then acquires the next image,
    /// signaling that frame's `image_available` semaphore.
    ///
    /// Returns `(image_index, suboptimal)`.
    ///
    /// # Errors
    ///
    /// Returns the raw Vulkan result; `ERROR_OUT_OF_DATE_KHR` means the
    /// caller should recreate the swapchain.
    ///
    /// # Panics
    ///
    /// Panics if `frame_index >= MAX_FRAMES_IN_FLIGHT`.
    pub fn acquire_next_image(&self, frame_index: usize) -> Result<(u32, bool), vk::Result> {
        assert!(frame_index < MAX_FRAMES_IN_FLIGHT);

        unsafe {
            self.device.handle().wait_for_fences(
                &[self.in_flight_fences[frame_index]],
                true,
                u64::MAX,
            )?;

            self.swapchain_loader.acquire_next_image(
                self.swapchain,
                u64::MAX,
                self.image_available[frame_index],
                vk::Fence::null(),
            )
        }
    }

    /// Submits a recorded command buffer for `image_index` and presents.
    ///
    /// Waits until the image is no longer used by an earlier frame, claims
    /// it for `frame_index`, submits with the frame's semaphores and fence,
    /// and presents. Returns the present result verbatim: `SUCCESS`,
    /// `SUBOPTIMAL_KHR`, or `ERROR_OUT_OF_DATE_KHR` (as an `Ok` value, so
    /// the caller can decide to recreate). Advances no counters.
    ///
    /// # Errors
    ///
    /// Any other Vulkan failure is returned as an error.
    ///
    /// # Panics
    ///
    /// Panics if either index is out of range.
    pub fn submit_command_buffers(
        &mut self,
        command_buffer: vk::CommandBuffer,
        image_index: u32,
        frame_index: usize,
    ) -> RhiResult<vk::Result> {
        assert!(frame_index < MAX_FRAMES_IN_FLIGHT);
        let image_index = image_index as usize;
        assert!(image_index < self.images.len());

        let device = self.device.handle();

        unsafe {
            // A previous frame may still be rendering to this image
            if self.images_in_flight[image_index] != vk::Fence::null() {
                device.wait_for_fences(&[self.images_in_flight[image_index]], true, u64::MAX)?;
            }
            self.images_in_flight[image_index] = self.in_flight_fences[frame_index];

            device.reset_fences(&[self.in_flight_fences[frame_index]])?;

            let wait_semaphores = [self.image_available[frame_index]];
            let wait_stages = [vk::PipelineStageFlags::COLOR_ATTACHMENT_OUTPUT];
            let signal_semaphores = [self.render_finished[frame_index]];
            let command_buffers = [command_buffer];

            let submit_info = vk::SubmitInfo::default()
                .wait_semaphores(&wait_semaphores)
                .wait_dst_stage_mask(&wait_stages)
                .command_buffers(&command_buffers)
                .signal_semaphores(&signal_semaphores);

            device.queue_submit(
                self.device.graphics_queue(),
                &[submit_info],
                self.in_flight_fences[frame_index],
            )?;

            let swapchains = [self.swapchain];
            let image_indices = [image_index as u32];
            let present_info = vk::PresentInfoKHR::default()
                .wait_semaphores(&signal_semaphores)
                .swapchains(&swapchains)
                .image_indices(&image_indices);

            match self
                .swapchain_loader
                .queue_present(self.device.present_queue(), &present_info)
            {
                Ok(false) => Ok(vk::Result::SUCCESS),
                Ok(true) => Ok(vk::Result::SUBOPTIMAL_KHR),
                Err(vk::Result::ERROR_OUT_OF_DATE_KHR) => Ok(vk::Result::ERROR_OUT_OF_DATE_KHR),
                Err(e) => Err(RhiError::from(e)),
            }
        }
    }

    /// True when `other` uses the same color and depth formats, so
    /// pipelines and render passes built against it remain valid.
    #[inline]
    pub fn is_compatible_with(&self, other: &Swapchain) -> bool {
        self.format == other.format && self.depth_format == other.depth_format
    }

    /// Returns the swapchain handle.
    #[inline]
    pub fn handle(&self) -> vk::SwapchainKHR {
        self.swapchain
    }

    /// Returns the swapchain color format.
    #[inline]
    pub fn format(&self) -> vk::Format {
        self.format
    }

    /// Returns the depth attachment format.
    #[inline]
    pub fn depth_format(&self) -> vk::Format {
        self.depth_format
    }

    /// Returns the swapchain extent (resolution).
    #[inline]
    pub fn extent(&self) -> vk::Extent2D {
        self.extent
    }

    /// Width over height of the current extent.
    #[inline]
    pub fn aspect_ratio(&self) -> f32 {
        self.extent.width as f32 / self.extent.height as f32
    }

    /// Returns the present mode.
    #[inline]
    pub fn present_mode(&self) -> vk::PresentModeKHR {
        self.present_mode
    }

    /// Returns the number of swapchain images.
    #[inline]
    pub fn image_count(&self) -> usize {
        self.images.len()
    }

    /// Returns the render pass targeting the swapchain attachments.
    #[inline]
    pub fn render_pass(&self) -> vk::RenderPass {
        self.render_pass
    }

    /// Returns the framebuffer for the given image index.
    ///
    /// # Panics
    ///
    /// Panics if `index` is out of bounds.
    #[inline]
    pub fn framebuffer(&self, index: usize) -> vk::Framebuffer {
        self.framebuffers[index]
    }

    /// Returns the swapchain image at the given index.
    ///
    /// # Panics
    ///
    /// Panics if `index` is out of bounds.
    #[inline]
    pub fn image(&self, index: usize) -> vk::Image {
        self.images[index]
    }

    /// Returns the image view at the given index.
    ///
    /// # Panics
    ///
    /// Panics if `index` is out of bounds.
    #[inline]
    pub fn image_view(&self, index: usize) -> vk::ImageView {
        self.image_views[index]
    }
}

impl Drop for Swapchain {
    fn drop(&mut self) {
        let device = self.device.handle();

        // The owner is responsible for waiting idle before dropping
        unsafe {
            for &fb in &self.framebuffers {
                device.destroy_framebuffer(fb, None);
            }

            for depth in &mut self.depth {
                device.destroy_sampler(depth.sampler, None);
                device.destroy_image_view(depth.view, None);
                device.destroy_image(depth.image, None);
                if let Some(allocation) = depth.allocation.take() {
                    let mut allocator = self.device.allocator().lock().unwrap();
                    if let Err(e) = allocator.free(allocation) {
                        tracing::error!("Failed to free depth allocation: {:?}", e);
                    }
                }
            }

            for &view in &self.image_views {
                device.destroy_image_view(view, None);
            }

            device.destroy_render_pass(self.render_pass, None);

            for i in 0..MAX_FRAMES_IN_FLIGHT {
                device.destroy_semaphore(self.image_available[i], None);
                device.destroy_semaphore(self.render_finished[i], None);
                device.destroy_fence(self.in_flight_fences[i], None);
            }

            self.swapchain_loader
                .destroy_swapchain(self.swapchain, None);
        }

        info!(
            "Swapchain destroyed (was {}x{}, {} images)",
            self.extent.width,
            self.extent.height,
            self.images.len()
        );
    }
}

/// Chooses the surface format, preferring B8G8R8A8_SRGB with the
/// SRGB_NONLINEAR color space and falling back to the first offered.
fn choose_surface_format(formats: &[vk::SurfaceFormatKHR]) -> vk::SurfaceFormatKHR {
    let preferred = formats.iter().find(|f| {
        f.format == vk::Format::B8G8R8A8_SRGB && f.color_space == vk::ColorSpaceKHR::SRGB_NONLINEAR
    });

    if let Some(&format) = preferred {
        debug!("Selected surface format: B8G8R8A8_SRGB with SRGB_NONLINEAR");
        return format;
    }

    warn!(
        "Preferred surface format unavailable, using {:?}",
        formats[0].format
    );
    formats[0]
}

/// Chooses the present mode: MAILBOX when offered, else FIFO (always
/// available per the Vulkan spec).
fn choose_present_mode(present_modes: &[vk::PresentModeKHR]) -> vk::PresentModeKHR {
    if present_modes.contains(&vk::PresentModeKHR::MAILBOX) {
        debug!("Selected MAILBOX present mode");
        return vk::PresentModeKHR::MAILBOX;
    }

    debug!("Selected FIFO present mode (vsync)");
    vk::PresentModeKHR::FIFO
}

/// Chooses the swapchain extent. When the surface fixes the extent
/// (width != u32::MAX) that value is used; otherwise the window extent is
/// clamped to the surface limits.
fn choose_extent(
    capabilities: &vk::SurfaceCapabilitiesKHR,
    width: u32,
    height: u32,
) -> vk::Extent2D {
    if capabilities.current_extent.width != u32::MAX {
        return capabilities.current_extent;
    }

    vk::Extent2D {
        width: width.clamp(
            capabilities.min_image_extent.width,
            capabilities.max_image_extent.width,
        ),
        height: height.clamp(
            capabilities.min_image_extent.height,
            capabilities.max_image_extent.height,
        ),
    }
}

/// One more than the minimum image count, capped by the maximum unless the
/// maximum is 0 (unlimited).
fn determine_image_count(capabilities: &vk::SurfaceCapabilitiesKHR) -> u32 {
    let preferred = capabilities.min_image_count + 1;

    if capabilities.max_image_count > 0 {
        preferred.min(capabilities.max_image_count)
    } else {
        preferred
    }
}

/// Creates color image views for the swapchain images.
fn create_image_views(
    device: &Device,
    images: &[vk::Image],
    format: vk::Format,
) -> Result<Vec<vk::ImageView>, RhiError> {
    let mut image_views = Vec::with_capacity(images.len());

    for (i, &image) in images.iter().enumerate() {
        let create_info = vk::ImageViewCreateInfo::default()
            .image(image)
            .view_type(vk::ImageViewType::TYPE_2D)
            .format(format)
            .subresource_range(
                vk::ImageSubresourceRange::default()
                    .aspect_mask(vk::ImageAspectFlags::COLOR)
                    .base_mip_level(0)
                    .level_count(1)
                    .base_array_layer(0)
                    .layer_count(1),
            );

        let image_view = unsafe {
            device
                .handle()
                .create_image_view(&create_info, None)
                .map_err(|e| {
                    RhiError::SwapchainError(format!("Failed to create image view {}: {:?}", i, e))
                })?
        };

        image_views.push(image_view);
    }

    debug!("Created {} image views", image_views.len());
    Ok(image_views)
}

/// Creates the render pass: color cleared and stored for presentation,
/// depth cleared and discarded.
fn create_render_pass(
    device: &Device,
    color_format: vk::Format,
    depth_format: vk::Format,
) -> Result<vk::RenderPass, RhiError> {
    let color_attachment = vk::AttachmentDescription::default()
        .format(color_format)
        .samples(vk::SampleCountFlags::TYPE_1)
        .load_op(vk::AttachmentLoadOp::CLEAR)
        .store_op(vk::AttachmentStoreOp::STORE)
        .stencil_load_op(vk::AttachmentLoadOp::DONT_CARE)
        .stencil_store_op(vk::AttachmentStoreOp::DONT_CARE)
        .initial_layout(vk::ImageLayout::UNDEFINED)
        .final_layout(vk::ImageLayout::PRESENT_SRC_KHR);

    let depth_attachment = vk::AttachmentDescription::default()
        .format(depth_format)
        .samples(vk::SampleCountFlags::TYPE_1)
        .load_op(vk::AttachmentLoadOp::CLEAR)
        .store_op(vk::AttachmentStoreOp::DONT_CARE)
        .stencil_load_op(vk::AttachmentLoadOp::DONT_CARE)
        .stencil_store_op(vk::AttachmentStoreOp::DONT_CARE)
        .initial_layout(vk::ImageLayout::UNDEFINED)
        .final_layout(vk::ImageLayout::DEPTH_STENCIL_ATTACHMENT_OPTIMAL);

    let color_ref = vk::AttachmentReference {
        attachment: 0,
        layout: vk::ImageLayout::COLOR_ATTACHMENT_OPTIMAL,
    };
    let depth_ref = vk::AttachmentReference {
        attachment: 1,
        layout: vk::ImageLayout::DEPTH_STENCIL_ATTACHMENT_OPTIMAL,
    };

    let color_refs = [color_ref];
    let subpass = vk::SubpassDescription::default()
        .pipeline_bind_point(vk::PipelineBindPoint::GRAPHICS)
        .color_attachments(&color_refs)
        .depth_stencil_attachment(&depth_ref);

    let dependency = vk::SubpassDependency::default()
        .src_subpass(vk::SUBPASS_EXTERNAL)
        .dst_subpass(0)
        .src_stage_mask(
            vk::PipelineStageFlags::COLOR_ATTACHMENT_OUTPUT
                | vk::PipelineStageFlags::EARLY_FRAGMENT_TESTS,
        )
        .src_access_mask(vk::AccessFlags::empty())
        .dst_stage_mask(
            vk::PipelineStageFlags::COLOR_ATTACHMENT_OUTPUT
                | vk::PipelineStageFlags::EARLY_FRAGMENT_TESTS,
        )
        .dst_access_mask(
            vk::AccessFlags::COLOR_ATTACHMENT_WRITE
                | vk::AccessFlags::DEPTH_STENCIL_ATTACHMENT_WRITE,
        );

    let attachments = [color_attachment, depth_attachment];
    let subpasses = [subpass];
    let dependencies = [dependency];

    let create_info = vk::RenderPassCreateInfo::default()
        .attachments(&attachments)
        .subpasses(&subpasses)
        .dependencies(&dependencies);

    let render_pass = unsafe { device.handle().create_render_pass(&create_info, None)? };
    debug!("Render pass created (color {:?}, depth {:?})", color_format, depth_format);

    Ok(render_pass)
}

/// Creates one depth image, view, and sampler per swapchain image.
fn create_depth_resources(
    device: &Arc<Device>,
    count: usize,
    extent: vk::Extent2D,
    depth_format: vk::Format,
) -> Result<Vec<DepthResources>, RhiError> {
    let mut resources = Vec::with_capacity(count);

    for _ in 0..count {
        let image_info = vk::ImageCreateInfo::default()
            .image_type(vk::ImageType::TYPE_2D)
            .format(depth_format)
            .extent(vk::Extent3D {
                width: extent.width,
                height: extent.height,
                depth: 1,
            })
            .mip_levels(1)
            .array_layers(1)
            .samples(vk::SampleCountFlags::TYPE_1)
            .tiling(vk::ImageTiling::OPTIMAL)
            .usage(vk::ImageUsageFlags::DEPTH_STENCIL_ATTACHMENT | vk::ImageUsageFlags::SAMPLED)
            .sharing_mode(vk::SharingMode::EXCLUSIVE)
            .initial_layout(vk::ImageLayout::UNDEFINED);

        let image = unsafe { device.handle().create_image(&image_info, None)? };
        let requirements = unsafe { device.handle().get_image_memory_requirements(image) };

        let allocation = {
            let mut allocator = device.allocator().lock().unwrap();
            allocator.allocate(&AllocationCreateDesc {
                name: "depth",
                requirements,
                location: MemoryLocation::GpuOnly,
                linear: false,
                allocation_scheme: AllocationScheme::GpuAllocatorManaged,
            })?
        };

        unsafe {
            device
                .handle()
                .bind_image_memory(image, allocation.memory(), allocation.offset())?;
        }

        let view_info = vk::ImageViewCreateInfo::default()
            .image(image)
            .view_type(vk::ImageViewType::TYPE_2D)
            .format(depth_format)
            .subresource_range(
                vk::ImageSubresourceRange::default()
                    .aspect_mask(vk::ImageAspectFlags::DEPTH)
                    .base_mip_level(0)
                    .level_count(1)
                    .base_array_layer(0)
                    .layer_count(1),
            );

        let view = unsafe { device.handle().create_image_view(&view_info, None)? };

        let sampler_info = vk::SamplerCreateInfo::default()
            .mag_filter(vk::Filter::LINEAR)
            .min_filter(vk::Filter::LINEAR)
            .address_mode_u(vk::SamplerAddressMode::CLAMP_TO_EDGE)
            .address_mode_v(vk::SamplerAddressMode::CLAMP_TO_EDGE)
            .address_mode_w(vk::SamplerAddressMode::CLAMP_TO_EDGE)
            .mipmap_mode(vk::SamplerMipmapMode::NEAREST);

        let sampler = unsafe { device.handle().create_sampler(&sampler_info, None)? };

        resources.push(DepthResources {
            image,
            allocation: Some(allocation),
            view,
            sampler,
        });
    }

    debug!("Created {} depth buffers ({:?})", count, depth_format);
    Ok(resources)
}

/// Creates one framebuffer per image, attaching color view + depth view.
fn create_framebuffers(
    device: &Device,
    render_pass: vk::RenderPass,
    image_views: &[vk::ImageView],
    depth: &[DepthResources],
    extent: vk::Extent2D,
) -> Result<Vec<vk::Framebuffer>, RhiError> {
    let mut framebuffers = Vec::with_capacity(image_views.len());

    for (view, depth) in image_views.iter().zip(depth) {
        let attachments = [*view, depth.view];

        let create_info = vk::FramebufferCreateInfo::default()
            .render_pass(render_pass)
            .attachments(&attachments)
            .width(extent.width)
            .height(extent.height)
            .layers(1);

        let framebuffer = unsafe { device.handle().create_framebuffer(&create_info, None)? };
        framebuffers.push(framebuffer);
    }

    debug!("Created {} framebuffers", framebuffers.len());
    Ok(framebuffers)
}

/// Creates the per-frame semaphore pairs and signaled fences.
#[allow(clippy::type_complexity)]
fn create_sync_objects(
    device: &Device,
) -> Result<(Vec<vk::Semaphore>, Vec<vk::Semaphore>, Vec<vk::Fence>), RhiError> {
    let semaphore_info = vk::SemaphoreCreateInfo::default();
    // Signaled so the first wait on each frame's fence returns immediately
    let fence_info = vk::FenceCreateInfo::default().flags(vk::FenceCreateFlags::SIGNALED);

    let mut image_available = Vec::with_capacity(MAX_FRAMES_IN_FLIGHT);
    let mut render_finished = Vec::with_capacity(MAX_FRAMES_IN_FLIGHT);
    let mut fences = Vec::with_capacity(MAX_FRAMES_IN_FLIGHT);

    for _ in 0..MAX_FRAMES_IN_FLIGHT {
        unsafe {
            image_available.push(device.handle().create_semaphore(&semaphore_info, None)?);
            render_finished.push(device.handle().create_semaphore(&semaphore_info, None)?);
            fences.push(device.handle().create_fence(&fence_info, None)?);
        }
    }

    Ok((image_available, render_finished, fences))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_two_frames_in_flight() {
        assert_eq!(MAX_FRAMES_IN_FLIGHT, 2);
    }

    #[test]
    fn test_depth_candidates_ordered_by_preference() {
        assert_eq!(DEPTH_FORMAT_CANDIDATES[0], vk::Format::D32_SFLOAT);
        assert_eq!(DEPTH_FORMAT_CANDIDATES.len(), 3);
    }

    #[test]
    fn test_choose_surface_format_prefers_srgb() {
        let formats = vec![
            vk::SurfaceFormatKHR {
                format: vk::Format::R8G8B8A8_UNORM,
                color_space: vk::ColorSpaceKHR::SRGB_NONLINEAR,
            },
            vk::SurfaceFormatKHR {
                format: vk::Format::B8G8R8A8_SRGB,
                color_space: vk::ColorSpaceKHR::SRGB_NONLINEAR,
            },
        ];

        let selected = choose_surface_format(&formats);
        assert_eq!(selected.format, vk::Format::B8G8R8A8_SRGB);
        assert_eq!(selected.color_space, vk::ColorSpaceKHR::SRGB_NONLINEAR);
    }

    #[test]
    fn test_choose_surface_format_falls_back_to_first() {
        let formats = vec![
            vk::SurfaceFormatKHR {
                format: vk::Format::R8G8B8A8_UNORM,
                color_space: vk::ColorSpaceKHR::SRGB_NONLINEAR,
            },
            vk::SurfaceFormatKHR {
                format: vk::Format::B8G8R8A8_UNORM,
                color_space: vk::ColorSpaceKHR::SRGB_NONLINEAR,
            },
        ];

        let selected = choose_surface_format(&formats);
        assert_eq!(selected.format, vk::Format::R8G8B8A8_UNORM);
    }

    #[test]
    fn test_choose_present_mode_prefers_mailbox() {
        let modes = vec![
            vk::PresentModeKHR::FIFO,
            vk::PresentModeKHR::MAILBOX,
            vk::PresentModeKHR::IMMEDIATE,
        ];
        assert_eq!(choose_present_mode(&modes), vk::PresentModeKHR::MAILBOX);
    }

    #[test]
    fn test_choose_present_mode_fallback_to_fifo() {
        let modes = vec![vk::PresentModeKHR::FIFO, vk::PresentModeKHR::IMMEDIATE];
        assert_eq!(choose_present_mode(&modes), vk::PresentModeKHR::FIFO);
    }

    #[test]
    fn test_choose_extent_uses_fixed_surface_extent() {
        let capabilities = vk::SurfaceCapabilitiesKHR {
            current_extent: vk::Extent2D {
                width: 1920,
                height: 1080,
            },
            min_image_extent: vk::Extent2D {
                width: 1,
                height: 1,
            },
            max_image_extent: vk::Extent2D {
                width: 4096,
                height: 4096,
            },
            ..Default::default()
        };

        let extent = choose_extent(&capabilities, 800, 600);
        assert_eq!(extent.width, 1920);
        assert_eq!(extent.height, 1080);
    }

    #[test]
    fn test_choose_extent_clamps_to_limits() {
        let capabilities = vk::SurfaceCapabilitiesKHR {
            current_extent: vk::Extent2D {
                width: u32::MAX,
                height: u32::MAX,
            },
            min_image_extent: vk::Extent2D {
                width: 100,
                height: 100,
            },
            max_image_extent: vk::Extent2D {
                width: 2000,
                height: 2000,
            },
            ..Default::default()
        };

        let too_big = choose_extent(&capabilities, 3000, 3000);
        assert_eq!(too_big.width, 2000);
        assert_eq!(too_big.height, 2000);

        let too_small = choose_extent(&capabilities, 50, 50);
        assert_eq!(too_small.width, 100);
        assert_eq!(too_small.height, 100);

        let in_range = choose_extent(&capabilities, 800, 600);
        assert_eq!(in_range.width, 800);
        assert_eq!(in_range.height, 600);
    }

    #[test]
    fn test_determine_image_count() {
        let capped = vk::SurfaceCapabilitiesKHR {
            min_image_count: 2,
            max_image_count: 3,
            ..Default::default()
        };
        assert_eq!(determine_image_count(&capped), 3);

        let roomy = vk::SurfaceCapabilitiesKHR {
            min_image_count: 2,
            max_image_count: 8,
            ..Default::default()
        };
        assert_eq!(determine_image_count(&roomy), 3);

        let unlimited = vk::SurfaceCapabilitiesKHR {
            min_image_count: 2,
            max_image_count: 0,
            ..Default::default()
        };
        assert_eq!(determine_image_count(&unlimited), 3);

        // min already at max: never exceed the cap
        let tight = vk::SurfaceCapabilitiesKHR {
            min_image_count: 3,
            max_image_count: 3,
            ..Default::default()
        };
        assert_eq!(determine_image_count(&tight), 3);
    }

    #[test]
    fn test_swapchain_support_details_is_adequate() {
        let adequate = SwapchainSupportDetails {
            capabilities: vk::SurfaceCapabilitiesKHR::default(),
            formats: vec![vk::SurfaceFormatKHR::default()],
            present_modes: vec![vk::PresentModeKHR::FIFO],
        };
        assert!(adequate.is_adequate());

        let no_formats = SwapchainSupportDetails {
            capabilities: vk::SurfaceCapabilitiesKHR::default(),
            formats: vec![],
            present_modes: vec![vk::PresentModeKHR::FIFO],
        };
        assert!(!no_formats.is_adequate());
    }
}
