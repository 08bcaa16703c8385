//! Resource loading and management.
//!
//! This crate handles CPU-side asset data:
//! - DDS and plain image decoding
//! - Procedural mesh generation
//! - Mesh and model containers

mod error;

pub mod geometry;
pub mod image;
pub mod model;

pub use error::{ResourceError, ResourceResult};
pub use image::{DecodedImage, DecodedMip};
pub use model::{MeshData, ModelData};
