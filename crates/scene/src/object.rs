//! Game objects and their arena.
//!
//! Objects live in a [`GameObjectMap`], a slotmap whose keys stay valid
//! across removals. A [`MeshId`] points into the renderer's mesh arena;
//! objects without one (lights) simply carry no geometry.

use glam::Vec3;
use slotmap::{new_key_type, SlotMap};

use crate::light::PointLightComponent;
use crate::transform::Transform;

new_key_type! {
    /// Key into the mesh arena.
    pub struct MeshId;
}

new_key_type! {
    /// Key into a [`GameObjectMap`].
    pub struct GameObjectId;
}

/// Arena of game objects.
pub type GameObjectMap = SlotMap<GameObjectId, GameObject>;

/// One object in the scene.
#[derive(Clone, Debug, Default)]
pub struct GameObject {
    /// World transform.
    pub transform: Transform,
    /// Base color, also the light color for point lights.
    pub color: Vec3,
    /// Geometry to draw, if any.
    pub model: Option<MeshId>,
    /// Point light component, if this object emits light.
    pub point_light: Option<PointLightComponent>,
}

impl GameObject {
    /// An empty object at the origin.
    pub fn new() -> Self {
        Self {
            transform: Transform::default(),
            color: Vec3::ONE,
            model: None,
            point_light: None,
        }
    }

    /// An object drawing the given mesh.
    pub fn with_model(model: MeshId) -> Self {
        Self {
            model: Some(model),
            ..Self::new()
        }
    }

    /// A point light with the given intensity, radius, and color.
    ///
    /// The radius is stored in the transform's X scale, which the
    /// billboard renderer reads back.
    pub fn make_point_light(intensity: f32, radius: f32, color: Vec3) -> Self {
        let mut object = Self::new();
        object.color = color;
        object.transform.scale.x = radius;
        object.point_light = Some(PointLightComponent { intensity });
        object
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_map_keys_survive_removal() {
        let mut objects = GameObjectMap::with_key();
        let a = objects.insert(GameObject::new());
        let b = objects.insert(GameObject::new());

        objects.remove(a);
        assert!(objects.get(a).is_none());
        assert!(objects.get(b).is_some());
    }

    #[test]
    fn test_point_light_stores_radius_in_scale() {
        let light = GameObject::make_point_light(2.0, 0.1, Vec3::new(1.0, 0.9, 0.8));
        assert!(light.point_light.is_some());
        assert_eq!(light.transform.scale.x, 0.1);
        assert_eq!(light.color, Vec3::new(1.0, 0.9, 0.8));
        assert!(light.model.is_none());
    }

    #[test]
    fn test_with_model_carries_mesh() {
        let mut meshes: SlotMap<MeshId, ()> = SlotMap::with_key();
        let id = meshes.insert(());
        let object = GameObject::with_model(id);
        assert_eq!(object.model, Some(id));
    }
}
