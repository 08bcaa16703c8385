//! Light components.

/// Marks a game object as a point light.
///
/// The light's color comes from the object's color and its radius from
/// the transform's X scale; the component only carries intensity.
#[derive(Clone, Copy, Debug)]
pub struct PointLightComponent {
    /// Light intensity.
    pub intensity: f32,
}

impl Default for PointLightComponent {
    fn default() -> Self {
        Self { intensity: 1.0 }
    }
}
