//! Vulkan abstraction layer (Render Hardware Interface).
//!
//! This crate provides a safe abstraction over Vulkan using the `ash`
//! crate. It handles:
//! - Instance and device creation
//! - Swapchain management, including recreation on resize
//! - Buffer and texture uploads
//! - Descriptor set layouts, pools, and writes
//! - Pipeline creation against a render pass

mod error;

pub mod buffer;
pub mod descriptor;
pub mod device;
pub mod instance;
pub mod physical_device;
pub mod pipeline;
pub mod shader;
pub mod swapchain;
pub mod texture;
pub mod vertex;

pub use error::{RhiError, RhiResult};

// Re-export ash types that users might need
pub use ash::vk;
