//! Frame orchestration.
//!
//! [`Renderer`] owns the swapchain, the per-frame command buffers, and
//! the frame counter. A frame runs as:
//!
//! ```text
//! begin_frame -> begin_swapchain_render_pass
//!     -> record draws
//! end_swapchain_render_pass -> end_frame
//! ```
//!
//! `begin_frame` may return `Ok(None)` when the swapchain is out of
//! date or the window is minimized; the caller skips the frame body.

use std::mem::ManuallyDrop;
use std::sync::Arc;

use tracing::{debug, info, warn};

use meshview_platform::Window;
use meshview_rhi::device::Device;
use meshview_rhi::instance::Instance;
use meshview_rhi::swapchain::{Swapchain, MAX_FRAMES_IN_FLIGHT};
use meshview_rhi::{vk, RhiError, RhiResult};

/// Clear color for the swapchain color attachment.
const CLEAR_COLOR: [f32; 4] = [0.01, 0.01, 0.01, 1.0];

/// Decides whether the swapchain must be rebuilt after presenting.
///
/// Recreation happens on an out-of-date or suboptimal present, or when
/// the window reported a resize, but never while the window is
/// minimized; a minimized window has a degenerate extent and the next
/// visible frame triggers recreation instead.
fn should_recreate(present_result: vk::Result, window_resized: bool, minimized: bool) -> bool {
    let stale = matches!(
        present_result,
        vk::Result::ERROR_OUT_OF_DATE_KHR | vk::Result::SUBOPTIMAL_KHR
    ) || window_resized;

    stale && !minimized
}

/// Polls `extent` until it reports a usable framebuffer size.
///
/// A zero-sized extent shows up mid-resize on some platforms; a
/// swapchain cannot be built against it.
fn wait_for_valid_extent<F>(mut extent: F) -> vk::Extent2D
where
    F: FnMut() -> vk::Extent2D,
{
    loop {
        let e = extent();
        if e.width > 0 && e.height > 0 {
            return e;
        }
        std::thread::yield_now();
    }
}

/// Swapchain and command buffer orchestrator.
pub struct Renderer {
    device: Arc<Device>,
    surface: vk::SurfaceKHR,
    // ManuallyDrop so Drop can destroy it before the device
    swapchain: ManuallyDrop<Swapchain>,
    command_pool: vk::CommandPool,
    command_buffers: Vec<vk::CommandBuffer>,
    current_image_index: u32,
    current_frame: usize,
    frame_started: bool,
}

impl Renderer {
    /// Creates the renderer with a swapchain sized to the window.
    ///
    /// # Errors
    ///
    /// Returns an error if swapchain or command buffer creation fails.
    pub fn new(
        instance: &Instance,
        device: Arc<Device>,
        surface: vk::SurfaceKHR,
        window: &Window,
    ) -> RhiResult<Self> {
        let swapchain = Swapchain::new(instance, device.clone(), surface, window.extent())?;

        let graphics_family = device
            .queue_families()
            .graphics_family
            .ok_or(RhiError::NoSuitableGpu)?;

        let pool_info = vk::CommandPoolCreateInfo::default()
            .queue_family_index(graphics_family)
            .flags(vk::CommandPoolCreateFlags::RESET_COMMAND_BUFFER);

        let command_pool = unsafe { device.handle().create_command_pool(&pool_info, None)? };

        let alloc_info = vk::CommandBufferAllocateInfo::default()
            .command_pool(command_pool)
            .level(vk::CommandBufferLevel::PRIMARY)
            .command_buffer_count(MAX_FRAMES_IN_FLIGHT as u32);

        let command_buffers = unsafe {
            match device.handle().allocate_command_buffers(&alloc_info) {
                Ok(buffers) => buffers,
                Err(e) => {
                    device.handle().destroy_command_pool(command_pool, None);
                    return Err(e.into());
                }
            }
        };

        info!(
            "Renderer created: {} swapchain images, {} frames in flight",
            swapchain.image_count(),
            MAX_FRAMES_IN_FLIGHT
        );

        Ok(Self {
            device,
            surface,
            swapchain: ManuallyDrop::new(swapchain),
            command_pool,
            command_buffers,
            current_image_index: 0,
            current_frame: 0,
            frame_started: false,
        })
    }

    /// Starts a frame: waits for the frame slot, acquires a swapchain
    /// image, and begins the frame's command buffer.
    ///
    /// Returns `Ok(None)` when no frame can start this iteration: the
    /// window is minimized, or the swapchain was out of date and has
    /// been recreated. The caller skips the frame body and tries again
    /// next iteration.
    ///
    /// # Errors
    ///
    /// Returns an error on any Vulkan failure other than an out-of-date
    /// swapchain.
    ///
    /// # Panics
    ///
    /// Panics if called while a frame is already in progress.
    pub fn begin_frame(
        &mut self,
        instance: &Instance,
        window: &Window,
    ) -> RhiResult<Option<vk::CommandBuffer>> {
        assert!(!self.frame_started, "begin_frame called twice");

        if window.is_minimized() {
            return Ok(None);
        }

        let (image_index, suboptimal) = match self.swapchain.acquire_next_image(self.current_frame)
        {
            Ok(acquired) => acquired,
            Err(vk::Result::ERROR_OUT_OF_DATE_KHR) => {
                debug!("Swapchain out of date on acquire, recreating");
                self.recreate_swapchain(instance, window)?;
                return Ok(None);
            }
            Err(e) => return Err(e.into()),
        };

        if suboptimal {
            // Still usable this frame; present will report it again
            debug!("Swapchain suboptimal on acquire");
        }

        self.current_image_index = image_index;
        self.frame_started = true;

        let command_buffer = self.command_buffers[self.current_frame];
        let begin_info = vk::CommandBufferBeginInfo::default()
            .flags(vk::CommandBufferUsageFlags::ONE_TIME_SUBMIT);

        unsafe {
            self.device
                .handle()
                .begin_command_buffer(command_buffer, &begin_info)?;
        }

        Ok(Some(command_buffer))
    }

    /// Ends the frame: submits the command buffer, presents, handles
    /// swapchain staleness, and advances the frame counter.
    ///
    /// Clears the window's resize flag once recreation has been
    /// handled.
    ///
    /// # Errors
    ///
    /// Returns an error on any Vulkan failure other than swapchain
    /// staleness.
    ///
    /// # Panics
    ///
    /// Panics if called without a frame in progress.
    pub fn end_frame(&mut self, instance: &Instance, window: &mut Window) -> RhiResult<()> {
        assert!(self.frame_started, "end_frame called without begin_frame");

        let command_buffer = self.command_buffers[self.current_frame];
        unsafe {
            self.device.handle().end_command_buffer(command_buffer)?;
        }

        let present_result = self.swapchain.submit_command_buffers(
            command_buffer,
            self.current_image_index,
            self.current_frame,
        )?;

        if should_recreate(present_result, window.was_resized(), window.is_minimized()) {
            self.recreate_swapchain(instance, window)?;
            window.reset_resized();
        }

        self.frame_started = false;
        self.current_frame = (self.current_frame + 1) % MAX_FRAMES_IN_FLIGHT;

        Ok(())
    }

    /// Begins the swapchain render pass on the frame's command buffer,
    /// clearing color and depth, and sets a full-extent viewport and
    /// scissor.
    ///
    /// # Panics
    ///
    /// Panics if no frame is in progress or `command_buffer` is not the
    /// frame's command buffer.
    pub fn begin_swapchain_render_pass(&self, command_buffer: vk::CommandBuffer) {
        assert!(self.frame_started, "no frame in progress");
        assert_eq!(
            command_buffer, self.command_buffers[self.current_frame],
            "command buffer from a different frame"
        );

        let extent = self.swapchain.extent();
        let clear_values = [
            vk::ClearValue {
                color: vk::ClearColorValue {
                    float32: CLEAR_COLOR,
                },
            },
            vk::ClearValue {
                depth_stencil: vk::ClearDepthStencilValue {
                    depth: 1.0,
                    stencil: 0,
                },
            },
        ];

        let render_pass_info = vk::RenderPassBeginInfo::default()
            .render_pass(self.swapchain.render_pass())
            .framebuffer(self.swapchain.framebuffer(self.current_image_index as usize))
            .render_area(vk::Rect2D {
                offset: vk::Offset2D { x: 0, y: 0 },
                extent,
            })
            .clear_values(&clear_values);

        let viewport = vk::Viewport {
            x: 0.0,
            y: 0.0,
            width: extent.width as f32,
            height: extent.height as f32,
            min_depth: 0.0,
            max_depth: 1.0,
        };
        let scissor = vk::Rect2D {
            offset: vk::Offset2D { x: 0, y: 0 },
            extent,
        };

        unsafe {
            self.device.handle().cmd_begin_render_pass(
                command_buffer,
                &render_pass_info,
                vk::SubpassContents::INLINE,
            );
            self.device
                .handle()
                .cmd_set_viewport(command_buffer, 0, &[viewport]);
            self.device
                .handle()
                .cmd_set_scissor(command_buffer, 0, &[scissor]);
        }
    }

    /// Ends the swapchain render pass.
    ///
    /// # Panics
    ///
    /// Panics if no frame is in progress or `command_buffer` is not the
    /// frame's command buffer.
    pub fn end_swapchain_render_pass(&self, command_buffer: vk::CommandBuffer) {
        assert!(self.frame_started, "no frame in progress");
        assert_eq!(
            command_buffer, self.command_buffers[self.current_frame],
            "command buffer from a different frame"
        );

        unsafe {
            self.device.handle().cmd_end_render_pass(command_buffer);
        }
    }

    /// Rebuilds the swapchain at the window's current extent, retiring
    /// the old one.
    ///
    /// # Errors
    ///
    /// Returns an error if recreation fails or the new swapchain's
    /// image formats differ from the old ones, which would invalidate
    /// pipelines built against the render pass.
    fn recreate_swapchain(&mut self, instance: &Instance, window: &Window) -> RhiResult<()> {
        let extent = wait_for_valid_extent(|| window.extent());
        debug!("Recreating swapchain at {}x{}", extent.width, extent.height);

        self.device.wait_idle()?;

        // Old bundle is consumed either way; on failure the renderer is
        // left without a swapchain and the error must be fatal.
        let old = unsafe { ManuallyDrop::take(&mut self.swapchain) };
        let old_format = old.format();
        let old_depth_format = old.depth_format();

        let new = Swapchain::with_previous(instance, self.device.clone(), self.surface, extent, old)?;
        let compatible = new.format() == old_format && new.depth_format() == old_depth_format;
        self.swapchain = ManuallyDrop::new(new);

        if !compatible {
            warn!("Swapchain image format changed during recreation");
            return Err(RhiError::SwapchainError(
                "Swapchain image format has changed".to_string(),
            ));
        }

        Ok(())
    }

    /// The frame's command buffer.
    ///
    /// # Panics
    ///
    /// Panics if no frame is in progress.
    pub fn current_command_buffer(&self) -> vk::CommandBuffer {
        assert!(self.frame_started, "no frame in progress");
        self.command_buffers[self.current_frame]
    }

    /// Frame-in-flight index, in `0..MAX_FRAMES_IN_FLIGHT`.
    ///
    /// # Panics
    ///
    /// Panics if no frame is in progress.
    pub fn frame_index(&self) -> usize {
        assert!(self.frame_started, "no frame in progress");
        self.current_frame
    }

    /// Whether a frame is currently being recorded.
    #[inline]
    pub fn is_frame_in_progress(&self) -> bool {
        self.frame_started
    }

    /// Render pass compatible with the swapchain framebuffers.
    #[inline]
    pub fn render_pass(&self) -> vk::RenderPass {
        self.swapchain.render_pass()
    }

    /// Swapchain width over height.
    #[inline]
    pub fn aspect_ratio(&self) -> f32 {
        self.swapchain.aspect_ratio()
    }
}

impl Drop for Renderer {
    fn drop(&mut self) {
        if let Err(e) = self.device.wait_idle() {
            warn!("Failed to wait for device idle: {}", e);
        }

        unsafe {
            self.device
                .handle()
                .free_command_buffers(self.command_pool, &self.command_buffers);
            self.device
                .handle()
                .destroy_command_pool(self.command_pool, None);
            ManuallyDrop::drop(&mut self.swapchain);
        }

        debug!("Renderer destroyed");
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_recreate_on_out_of_date() {
        assert!(should_recreate(
            vk::Result::ERROR_OUT_OF_DATE_KHR,
            false,
            false
        ));
    }

    #[test]
    fn test_recreate_on_suboptimal() {
        assert!(should_recreate(vk::Result::SUBOPTIMAL_KHR, false, false));
    }

    #[test]
    fn test_recreate_on_resize() {
        assert!(should_recreate(vk::Result::SUCCESS, true, false));
    }

    #[test]
    fn test_no_recreate_on_clean_present() {
        assert!(!should_recreate(vk::Result::SUCCESS, false, false));
    }

    #[test]
    fn test_no_recreate_while_minimized() {
        // A minimized window defers recreation to the next visible frame
        assert!(!should_recreate(
            vk::Result::ERROR_OUT_OF_DATE_KHR,
            false,
            true
        ));
        assert!(!should_recreate(vk::Result::SUCCESS, true, true));
    }

    #[test]
    fn test_waits_out_degenerate_extents() {
        let sizes = [
            vk::Extent2D {
                width: 0,
                height: 0,
            },
            vk::Extent2D {
                width: 800,
                height: 0,
            },
            vk::Extent2D {
                width: 800,
                height: 600,
            },
        ];
        let mut i = 0;
        let extent = wait_for_valid_extent(|| {
            let e = sizes[i];
            i += 1;
            e
        });
        assert_eq!((extent.width, extent.height), (800, 600));
    }

    #[test]
    fn test_valid_extent_returns_immediately() {
        let mut calls = 0;
        wait_for_valid_extent(|| {
            calls += 1;
            vk::Extent2D {
                width: 1,
                height: 1,
            }
        });
        assert_eq!(calls, 1);
    }
}
