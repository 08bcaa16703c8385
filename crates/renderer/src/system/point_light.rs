//! Point light system.
//!
//! Fills the global UBO's light array each frame and draws an
//! alpha-blended billboard per light.

use std::path::Path;
use std::sync::Arc;

use tracing::warn;

use meshview_rhi::device::Device;
use meshview_rhi::pipeline::{
    ColorBlendAttachment, CullMode, FrontFace, GraphicsPipelineBuilder, Pipeline, PipelineLayout,
};
use meshview_rhi::shader::{Shader, ShaderStage};
use meshview_rhi::{vk, RhiResult};
use meshview_scene::GameObjectMap;

use crate::frame::FrameInfo;
use crate::ubo::{GlobalUbo, PointLightPushConstants, PointLightUniform, MAX_LIGHTS};

const VERTEX_SHADER_PATH: &str = "shaders/spirv/point_light.vert.spv";
const FRAGMENT_SHADER_PATH: &str = "shaders/spirv/point_light.frag.spv";

/// Copies the scene's point lights into the UBO's light array.
///
/// Lights beyond [`MAX_LIGHTS`] are dropped with a warning. Returns the
/// number of lights written.
pub fn fill_light_array(ubo: &mut GlobalUbo, objects: &GameObjectMap) -> usize {
    let mut count = 0;

    for (_, object) in objects.iter() {
        let Some(light) = object.point_light else {
            continue;
        };

        if count >= MAX_LIGHTS {
            warn!("Scene has more than {} point lights, dropping extras", MAX_LIGHTS);
            break;
        }

        ubo.point_lights[count] = PointLightUniform {
            position: object.transform.translation.extend(1.0),
            color: object.color.extend(light.intensity),
        };
        count += 1;
    }

    ubo.num_lights = count as u32;
    count
}

/// Pipeline for drawing light billboards.
pub struct PointLightSystem {
    device: Arc<Device>,
    pipeline: Pipeline,
    pipeline_layout: PipelineLayout,
}

impl PointLightSystem {
    /// Builds the billboard pipeline against the given render pass.
    ///
    /// The pipeline has no vertex input; the vertex shader expands a
    /// quad from `gl_VertexIndex`.
    ///
    /// # Errors
    ///
    /// Returns an error if shader loading or pipeline creation fails.
    pub fn new(
        device: Arc<Device>,
        render_pass: vk::RenderPass,
        global_set_layout: vk::DescriptorSetLayout,
    ) -> RhiResult<Self> {
        let push_constant_range = vk::PushConstantRange::default()
            .stage_flags(vk::ShaderStageFlags::VERTEX | vk::ShaderStageFlags::FRAGMENT)
            .offset(0)
            .size(PointLightPushConstants::SIZE as u32);

        let pipeline_layout = PipelineLayout::new(
            device.clone(),
            &[global_set_layout],
            &[push_constant_range],
        )?;

        let vertex_shader = Shader::from_spirv_file(
            device.clone(),
            Path::new(VERTEX_SHADER_PATH),
            ShaderStage::Vertex,
            "main",
        )?;
        let fragment_shader = Shader::from_spirv_file(
            device.clone(),
            Path::new(FRAGMENT_SHADER_PATH),
            ShaderStage::Fragment,
            "main",
        )?;

        let pipeline = GraphicsPipelineBuilder::new()
            .vertex_shader(&vertex_shader)
            .fragment_shader(&fragment_shader)
            .cull_mode(CullMode::None)
            .front_face(FrontFace::CounterClockwise)
            .depth_test_enable(true)
            .depth_write_enable(false)
            .color_blend_attachment(ColorBlendAttachment::alpha_blend())
            .render_pass(render_pass)
            .build(device.clone(), &pipeline_layout)?;

        Ok(Self {
            device,
            pipeline,
            pipeline_layout,
        })
    }

    /// Fills the UBO's light array from the frame's objects.
    pub fn update(&self, frame: &FrameInfo, ubo: &mut GlobalUbo) {
        fill_light_array(ubo, frame.objects);
    }

    /// Records a 6-vertex billboard draw per point light.
    pub fn render(&self, frame: &FrameInfo) {
        self.pipeline.bind(frame.command_buffer);

        unsafe {
            self.device.handle().cmd_bind_descriptor_sets(
                frame.command_buffer,
                vk::PipelineBindPoint::GRAPHICS,
                self.pipeline_layout.handle(),
                0,
                &[frame.global_descriptor_set],
                &[],
            );
        }

        for (_, object) in frame.objects.iter() {
            let Some(light) = object.point_light else {
                continue;
            };

            let push = PointLightPushConstants {
                position: object.transform.translation.extend(1.0),
                color: object.color.extend(light.intensity),
                radius: object.transform.scale.x,
                _padding: [0.0; 3],
            };

            unsafe {
                self.device.handle().cmd_push_constants(
                    frame.command_buffer,
                    self.pipeline_layout.handle(),
                    vk::ShaderStageFlags::VERTEX | vk::ShaderStageFlags::FRAGMENT,
                    0,
                    bytemuck::bytes_of(&push),
                );
                self.device
                    .handle()
                    .cmd_draw(frame.command_buffer, 6, 1, 0, 0);
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use glam::{Vec3, Vec4};
    use meshview_scene::GameObject;

    #[test]
    fn test_fill_copies_lights() {
        let mut objects = GameObjectMap::with_key();
        objects.insert(GameObject::make_point_light(2.0, 0.1, Vec3::X));
        objects.insert(GameObject::new());

        let mut ubo = GlobalUbo::default();
        let count = fill_light_array(&mut ubo, &objects);

        assert_eq!(count, 1);
        assert_eq!(ubo.num_lights, 1);
        assert_eq!(ubo.point_lights[0].color, Vec4::new(1.0, 0.0, 0.0, 2.0));
    }

    #[test]
    fn test_fill_clamps_to_capacity() {
        let mut objects = GameObjectMap::with_key();
        for _ in 0..(MAX_LIGHTS + 5) {
            objects.insert(GameObject::make_point_light(1.0, 0.1, Vec3::ONE));
        }

        let mut ubo = GlobalUbo::default();
        let count = fill_light_array(&mut ubo, &objects);

        assert_eq!(count, MAX_LIGHTS);
        assert_eq!(ubo.num_lights, MAX_LIGHTS as u32);
    }

    #[test]
    fn test_fill_skips_non_lights() {
        let mut objects = GameObjectMap::with_key();
        objects.insert(GameObject::new());
        objects.insert(GameObject::new());

        let mut ubo = GlobalUbo::default();
        assert_eq!(fill_light_array(&mut ubo, &objects), 0);
        assert_eq!(ubo.num_lights, 0);
    }

    #[test]
    fn test_fill_writes_position_and_radius_source() {
        let mut objects = GameObjectMap::with_key();
        let mut light = GameObject::make_point_light(1.5, 0.2, Vec3::Y);
        light.transform.translation = Vec3::new(1.0, 2.0, 3.0);
        objects.insert(light);

        let mut ubo = GlobalUbo::default();
        fill_light_array(&mut ubo, &objects);

        assert_eq!(ubo.point_lights[0].position, Vec4::new(1.0, 2.0, 3.0, 1.0));
        assert_eq!(ubo.point_lights[0].color.w, 1.5);
    }
}
