//! Per-frame data handed to render systems.

use meshview_rhi::vk;
use meshview_scene::{Camera, GameObjectMap};

/// Everything a render system needs for one frame.
///
/// Borrowed for the duration of the frame body, between `begin_frame`
/// and `end_frame`.
pub struct FrameInfo<'a> {
    /// Frame-in-flight index, in `0..MAX_FRAMES_IN_FLIGHT`.
    pub frame_index: usize,
    /// Seconds since the previous frame.
    pub frame_time: f32,
    /// Command buffer being recorded for this frame.
    pub command_buffer: vk::CommandBuffer,
    /// Camera used for this frame.
    pub camera: &'a Camera,
    /// Global descriptor set for this frame's UBO slot.
    pub global_descriptor_set: vk::DescriptorSet,
    /// Scene objects to draw.
    pub objects: &'a GameObjectMap,
}
