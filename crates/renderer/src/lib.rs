//! Frame orchestration and render systems.
//!
//! The [`Renderer`] drives the swapchain and command buffers through a
//! begin/end frame protocol; render systems in [`system`] record draws
//! inside the frame body using a [`FrameInfo`].

pub mod frame;
pub mod mesh;
pub mod renderer;
pub mod system;
pub mod ubo;

pub use frame::FrameInfo;
pub use mesh::{GpuMesh, GpuModel, MeshArena};
pub use renderer::Renderer;
pub use system::{MeshRenderSystem, PointLightSystem};
pub use ubo::{GlobalUbo, PointLightUniform, MAX_LIGHTS};

pub use meshview_rhi::swapchain::MAX_FRAMES_IN_FLIGHT;
