//! Platform layer for the mesh viewer.
//!
//! This crate provides platform-specific functionality:
//! - Window management via winit (extent, resize and minimize tracking)
//! - Keyboard input state, owned by the app and injected where needed
//! - Vulkan surface creation

mod input;
mod window;

pub use input::{InputState, KeyCode};
pub use window::{Surface, Window, get_required_extensions};
