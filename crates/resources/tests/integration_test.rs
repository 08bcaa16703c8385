//! Integration tests for procedural geometry and image decoding.

use std::path::Path;

use glam::Vec3;
use meshview_resources::{geometry, DecodedImage, ModelData};

#[test]
fn test_procedural_shapes_form_valid_models() {
    let shapes = [
        geometry::quad(Vec3::ONE),
        geometry::cube(Vec3::new(0.8, 0.2, 0.2)),
        geometry::uv_sphere(1.0, 16, 24, Vec3::splat(0.5)),
    ];

    for mesh in shapes {
        assert!(!mesh.vertices.is_empty(), "Mesh should have vertices");
        assert!(mesh.is_indexed(), "Procedural meshes are indexed");
        assert!(mesh.triangle_count() > 0);

        let max_index = *mesh.indices.iter().max().unwrap();
        assert!(
            (max_index as usize) < mesh.vertices.len(),
            "Indices must stay in bounds"
        );

        let model = ModelData::from_mesh(mesh);
        let (min, max) = model.bounds().expect("Model should have bounds");
        assert!(min.x < max.x);
        assert!(min.y < max.y);
        assert!(min.z < max.z);
    }
}

#[test]
fn test_load_dds_texture() {
    // Skip if assets are not present (CI may not ship them)
    let path = Path::new("../../assets/textures/stone.dds");
    if !path.exists() {
        println!("Skipping test: texture not found at {:?}", path);
        return;
    }

    let image = DecodedImage::from_dds_file(path).expect("Failed to decode DDS");

    let mips = image.mips();
    assert!(!mips.is_empty(), "DDS should have at least one level");

    for pair in mips.windows(2) {
        assert!(
            pair[1].width < pair[0].width,
            "Mip widths must strictly decrease"
        );
    }

    println!(
        "Decoded {:?}: {}x{}, {} mip level(s)",
        path,
        mips[0].width,
        mips[0].height,
        mips.len()
    );
}
