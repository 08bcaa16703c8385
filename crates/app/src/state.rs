//! Viewer state: GPU context, scene content, and the per-frame draw.

use std::path::Path;
use std::sync::Arc;

use anyhow::{anyhow, Context, Result};
use glam::{Quat, Vec3};
use tracing::{info, warn};
use winit::event_loop::ActiveEventLoop;

use meshview_core::Timer;
use meshview_platform::{InputState, Surface, Window};
use meshview_renderer::{
    FrameInfo, GlobalUbo, GpuModel, MeshArena, MeshRenderSystem, PointLightSystem, Renderer,
    MAX_FRAMES_IN_FLIGHT,
};
use meshview_resources::{geometry, DecodedImage, ModelData};
use meshview_rhi::buffer::{Buffer, BufferUsage};
use meshview_rhi::descriptor::{
    DescriptorPool, DescriptorSetLayout, DescriptorSetLayoutBuilder, DescriptorWriter,
};
use meshview_rhi::device::Device;
use meshview_rhi::instance::Instance;
use meshview_rhi::physical_device::select_physical_device;
use meshview_rhi::texture::{MipLevel, TextureFormat, TextureStore, TextureUpload};
use meshview_rhi::vk;
use meshview_scene::{Camera, GameObject, GameObjectMap, KeyboardController, Transform};

const TEXTURE_DIR: &str = "assets/textures";

/// Ring of colored point lights placed around the scene.
const LIGHT_COLORS: [Vec3; 6] = [
    Vec3::new(1.0, 0.1, 0.1),
    Vec3::new(0.1, 0.1, 1.0),
    Vec3::new(0.1, 1.0, 0.1),
    Vec3::new(1.0, 1.0, 0.1),
    Vec3::new(0.1, 1.0, 1.0),
    Vec3::new(1.0, 1.0, 1.0),
];

/// Everything the viewer owns, GPU context through scene content.
///
/// Field order matters for drop order: the renderer goes down before
/// the device, and every Vulkan object before the surface and instance.
pub struct ViewerState {
    pub window: Window,
    renderer: Renderer,
    mesh_system: MeshRenderSystem,
    point_light_system: PointLightSystem,
    meshes: MeshArena,
    _textures: TextureStore,
    global_ubo_buffers: Vec<Buffer>,
    global_sets: Vec<vk::DescriptorSet>,
    _descriptor_pool: DescriptorPool,
    _global_set_layout: DescriptorSetLayout,
    _device: Arc<Device>,
    _surface: Surface,
    instance: Instance,

    objects: GameObjectMap,
    camera: Camera,
    camera_transform: Transform,
    controller: KeyboardController,
    timer: Timer,
}

impl ViewerState {
    /// Brings up the whole GPU stack and populates the scene.
    pub fn new(event_loop: &ActiveEventLoop) -> Result<Self> {
        let window = Window::new(event_loop, 1280, 720, "Mesh Viewer")?;

        let instance =
            Instance::new(cfg!(debug_assertions)).context("Failed to create Vulkan instance")?;
        let surface = window.create_surface(instance.entry(), instance.handle())?;

        let physical_device_info =
            select_physical_device(instance.handle(), surface.handle(), surface.loader())?;
        let device = Device::new(&instance, &physical_device_info)?;

        let renderer = Renderer::new(&instance, device.clone(), surface.handle(), &window)?;

        let mut textures = TextureStore::new(device.clone());
        load_textures(&mut textures)?;

        let global_set_layout = DescriptorSetLayoutBuilder::new()
            .add_binding(
                0,
                vk::DescriptorType::UNIFORM_BUFFER,
                vk::ShaderStageFlags::VERTEX | vk::ShaderStageFlags::FRAGMENT,
                1,
            )
            .add_binding(
                1,
                vk::DescriptorType::COMBINED_IMAGE_SAMPLER,
                vk::ShaderStageFlags::FRAGMENT,
                1,
            )
            .build(device.clone())?;

        let descriptor_pool = DescriptorPool::builder()
            .pool_size(
                vk::DescriptorType::UNIFORM_BUFFER,
                MAX_FRAMES_IN_FLIGHT as u32,
            )
            .pool_size(
                vk::DescriptorType::COMBINED_IMAGE_SAMPLER,
                MAX_FRAMES_IN_FLIGHT as u32,
            )
            .max_sets(MAX_FRAMES_IN_FLIGHT as u32)
            .build(device.clone())?;

        let mut global_ubo_buffers = Vec::with_capacity(MAX_FRAMES_IN_FLIGHT);
        let mut global_sets = Vec::with_capacity(MAX_FRAMES_IN_FLIGHT);

        for _ in 0..MAX_FRAMES_IN_FLIGHT {
            let buffer = Buffer::new(
                device.clone(),
                GlobalUbo::SIZE as vk::DeviceSize,
                1,
                BufferUsage::Uniform,
                device.min_uniform_buffer_offset_alignment(),
            )?;

            let set = DescriptorWriter::new(&global_set_layout, &descriptor_pool)
                .write_buffer(0, buffer.descriptor_info_for_index(0))
                .write_image(1, textures.image_info(0))
                .build()?
                .ok_or_else(|| anyhow!("Descriptor pool exhausted during setup"))?;

            global_ubo_buffers.push(buffer);
            global_sets.push(set);
        }

        let mesh_system = MeshRenderSystem::new(
            device.clone(),
            renderer.render_pass(),
            global_set_layout.handle(),
        )?;
        let point_light_system = PointLightSystem::new(
            device.clone(),
            renderer.render_pass(),
            global_set_layout.handle(),
        )?;

        let mut meshes = MeshArena::with_key();
        let mut objects = GameObjectMap::with_key();
        build_scene(&device, &mut meshes, &mut objects)?;

        let mut camera_transform = Transform::default();
        camera_transform.translation = Vec3::new(0.0, -0.6, 2.5);

        info!("Viewer initialized: {} objects, {} models", objects.len(), meshes.len());

        Ok(Self {
            window,
            renderer,
            mesh_system,
            point_light_system,
            meshes,
            _textures: textures,
            global_ubo_buffers,
            global_sets,
            _descriptor_pool: descriptor_pool,
            _global_set_layout: global_set_layout,
            _device: device,
            _surface: surface,
            instance,
            objects,
            camera: Camera::new(),
            camera_transform,
            controller: KeyboardController::new(),
            timer: Timer::new(),
        })
    }

    /// Runs one frame: input, animation, UBO update, and draw.
    pub fn draw(&mut self, input: &InputState) -> Result<()> {
        let dt = self.timer.delta_secs();

        self.controller
            .update(input, dt, &mut self.camera_transform);
        self.camera.set_view_yxz(
            self.camera_transform.translation,
            self.camera_transform.rotation,
        );

        if self.window.is_minimized() {
            return Ok(());
        }

        self.camera.set_perspective_projection(
            50_f32.to_radians(),
            self.renderer.aspect_ratio(),
            0.1,
            100.0,
        );

        // Slowly orbit the light ring
        let orbit = Quat::from_rotation_y(0.5 * dt);
        for (_, object) in self.objects.iter_mut() {
            if object.point_light.is_some() {
                object.transform.translation = orbit * object.transform.translation;
            }
        }

        let Some(command_buffer) = self.renderer.begin_frame(&self.instance, &self.window)? else {
            return Ok(());
        };

        let frame_index = self.renderer.frame_index();
        let frame = FrameInfo {
            frame_index,
            frame_time: dt,
            command_buffer,
            camera: &self.camera,
            global_descriptor_set: self.global_sets[frame_index],
            objects: &self.objects,
        };

        let mut ubo = GlobalUbo {
            projection: self.camera.projection(),
            view: self.camera.view(),
            inverse_view: self.camera.inverse_view(),
            ..GlobalUbo::default()
        };
        self.point_light_system.update(&frame, &mut ubo);

        let buffer = &self.global_ubo_buffers[frame_index];
        buffer.write_to_index(bytemuck::bytes_of(&ubo), 0)?;
        buffer.flush_index(0)?;

        self.renderer.begin_swapchain_render_pass(command_buffer);
        self.mesh_system.render(&frame, &self.meshes);
        self.point_light_system.render(&frame);
        self.renderer.end_swapchain_render_pass(command_buffer);

        self.renderer.end_frame(&self.instance, &mut self.window)?;

        Ok(())
    }
}

/// Loads a fallback texture and any assets found on disk.
///
/// The store always ends up with at least one entry, so descriptor
/// setup can bind index 0 unconditionally.
fn load_textures(textures: &mut TextureStore) -> Result<()> {
    let white = [255u8; 4 * 4 * 4];
    let fallback = TextureUpload {
        format: TextureFormat::Rgba8Unorm,
        mips: &[MipLevel {
            width: 4,
            height: 4,
            data: &white,
        }],
    };
    textures.load(&fallback)?;

    let dir = Path::new(TEXTURE_DIR);
    if !dir.is_dir() {
        return Ok(());
    }

    for entry in std::fs::read_dir(dir)? {
        let path = entry?.path();
        let decoded = match path.extension().and_then(|e| e.to_str()) {
            Some("dds") => DecodedImage::from_dds_file(&path),
            Some("png") | Some("jpg") | Some("jpeg") => DecodedImage::from_image_file(&path),
            _ => continue,
        };

        match decoded {
            Ok(image) => {
                let mips = image.mip_levels();
                let upload = TextureUpload {
                    format: image.format(),
                    mips: &mips,
                };
                let index = textures.load(&upload)?;
                info!("Loaded texture {:?} at slot {}", path, index);
            }
            Err(e) => warn!("Skipping texture {:?}: {}", path, e),
        }
    }

    Ok(())
}

/// Uploads the procedural models and places the demo scene.
fn build_scene(
    device: &Arc<Device>,
    meshes: &mut MeshArena,
    objects: &mut GameObjectMap,
) -> Result<()> {
    let cube = meshes.insert(GpuModel::from_data(
        device.clone(),
        &ModelData::from_mesh(geometry::cube(Vec3::new(0.9, 0.6, 0.2))),
    )?);
    let sphere = meshes.insert(GpuModel::from_data(
        device.clone(),
        &ModelData::from_mesh(geometry::uv_sphere(0.5, 16, 32, Vec3::new(0.2, 0.5, 0.9))),
    )?);
    let floor = meshes.insert(GpuModel::from_data(
        device.clone(),
        &ModelData::from_mesh(geometry::quad(Vec3::new(0.6, 0.6, 0.6))),
    )?);

    let mut cube_object = GameObject::with_model(cube);
    cube_object.transform.translation = Vec3::new(-0.8, 0.0, 0.0);
    cube_object.transform.scale = Vec3::splat(0.6);
    objects.insert(cube_object);

    let mut sphere_object = GameObject::with_model(sphere);
    sphere_object.transform.translation = Vec3::new(0.8, 0.0, 0.0);
    objects.insert(sphere_object);

    let mut floor_object = GameObject::with_model(floor);
    floor_object.transform.translation = Vec3::new(0.0, 0.5, 0.0);
    floor_object.transform.scale = Vec3::new(3.0, 1.0, 3.0);
    objects.insert(floor_object);

    for (i, color) in LIGHT_COLORS.iter().enumerate() {
        let angle = i as f32 * std::f32::consts::TAU / LIGHT_COLORS.len() as f32;
        let mut light = GameObject::make_point_light(0.6, 0.08, *color);
        light.transform.translation = Vec3::new(1.5 * angle.cos(), -0.8, 1.5 * angle.sin());
        objects.insert(light);
    }

    Ok(())
}
