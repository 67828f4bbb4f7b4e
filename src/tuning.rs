use std::sync::Arc;

use glam::Vec3;
use parking_lot::RwLock;
use serde::{Deserialize, Serialize};

use crate::scene::{LightKind, Scene};

/// Range of the field-of-view control, degrees.
pub const FOV_RANGE: (f32, f32) = (25.0, 90.0);

/// Snapshot of every user-adjustable parameter.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Tunables {
    pub fov: f32,
    pub roughness: f32,
    pub metallic: f32,
    pub ambient: f32,
    pub shading: u32,
    pub material_color: Vec3,
    pub light_color: Vec3,
    pub light_intensity: f32,
    pub light_kind: LightKind,
}

impl Default for Tunables {
    fn default() -> Self {
        Self::from_scene(&Scene::default())
    }
}

impl Tunables {
    pub fn from_scene(scene: &Scene) -> Self {
        let light = scene.lights.first().copied().unwrap_or_default();
        Self {
            fov: scene.camera.fov.clamp(FOV_RANGE.0, FOV_RANGE.1),
            roughness: scene.material.roughness.clamp(0.0, 1.0),
            metallic: scene.material.metallic.clamp(0.0, 1.0),
            ambient: 0.15,
            shading: scene.material.shading.min(SHADING_VARIANTS - 1),
            material_color: scene.material.color,
            light_color: light.color,
            light_intensity: light.intensity,
            light_kind: light.kind,
        }
    }
}

/// Number of shading variants the renderer implements.
pub const SHADING_VARIANTS: u32 = 3;

/// Shared store for the adjustable parameters, the stand-in for the GUI
/// panel of the original program.
///
/// Cloning shares the underlying state; the frame loop reads one snapshot
/// per tick.
#[derive(Debug, Default)]
pub struct TuningState {
    values: Arc<RwLock<Tunables>>,
}

impl Clone for TuningState {
    fn clone(&self) -> Self {
        Self {
            values: Arc::clone(&self.values),
        }
    }
}

impl TuningState {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn from_scene(scene: &Scene) -> Self {
        Self {
            values: Arc::new(RwLock::new(Tunables::from_scene(scene))),
        }
    }

    /// Returns a copy of the current values.
    pub fn snapshot(&self) -> Tunables {
        *self.values.read()
    }

    pub fn adjust_fov(&self, delta: f32) {
        let mut values = self.values.write();
        values.fov = (values.fov + delta).clamp(FOV_RANGE.0, FOV_RANGE.1);
    }

    pub fn adjust_roughness(&self, delta: f32) {
        let mut values = self.values.write();
        values.roughness = (values.roughness + delta).clamp(0.0, 1.0);
    }

    pub fn adjust_metallic(&self, delta: f32) {
        let mut values = self.values.write();
        values.metallic = (values.metallic + delta).clamp(0.0, 1.0);
    }

    pub fn adjust_ambient(&self, delta: f32) {
        let mut values = self.values.write();
        values.ambient = (values.ambient + delta).clamp(0.0, 1.0);
    }

    pub fn set_shading(&self, shading: u32) {
        self.values.write().shading = shading.min(SHADING_VARIANTS - 1);
    }

    pub fn toggle_light_kind(&self) {
        let mut values = self.values.write();
        values.light_kind = match values.light_kind {
            LightKind::Point => LightKind::Directional,
            LightKind::Directional => LightKind::Point,
        };
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn fov_is_clamped_to_the_slider_range() {
        let state = TuningState::new();
        state.adjust_fov(1000.0);
        assert_eq!(state.snapshot().fov, FOV_RANGE.1);
        state.adjust_fov(-1000.0);
        assert_eq!(state.snapshot().fov, FOV_RANGE.0);
    }

    #[test]
    fn clones_share_the_same_values() {
        let state = TuningState::new();
        let shared = state.clone();
        state.adjust_roughness(0.3);
        assert_eq!(shared.snapshot().roughness, state.snapshot().roughness);
    }

    #[test]
    fn light_kind_toggles_between_the_two_variants() {
        let state = TuningState::new();
        let initial = state.snapshot().light_kind;
        state.toggle_light_kind();
        assert_ne!(state.snapshot().light_kind, initial);
        state.toggle_light_kind();
        assert_eq!(state.snapshot().light_kind, initial);
    }

    #[test]
    fn shading_selector_saturates() {
        let state = TuningState::new();
        state.set_shading(99);
        assert_eq!(state.snapshot().shading, SHADING_VARIANTS - 1);
    }

    #[test]
    fn from_scene_picks_up_the_first_light() {
        let scene = Scene::from_xml(
            "<scene><light><type>directional</type><intensity>3</intensity></light></scene>",
        )
        .unwrap();
        let values = TuningState::from_scene(&scene).snapshot();
        assert_eq!(values.light_kind, LightKind::Directional);
        assert_eq!(values.light_intensity, 3.0);
    }
}
