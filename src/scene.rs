use anyhow::{anyhow, Context, Result};
use glam::Vec3;
use rand::Rng;
use roxmltree::{Document, Node};
use serde::{Deserialize, Serialize};

use crate::math::{sample_hemisphere, MathError};

/// Runtime description of the viewed scene, parsed from the scene XML.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, Default)]
pub struct Scene {
    pub camera: CameraSpec,
    pub lights: Vec<LightSpec>,
    pub material: MaterialSpec,
    pub sky: Sky,
}

impl Scene {
    /// Parses the scene XML. Every element is optional and falls back to the
    /// defaults of the classic single-sphere setup.
    pub fn from_xml(xml: &str) -> Result<Self> {
        let document = Document::parse(xml).context("invalid scene XML")?;
        let mut scene = Scene::default();

        if let Some(node) = document.descendants().find(|n| n.has_tag_name("camera")) {
            scene.camera.position =
                parse_vec3(optional_text(&node, "position"), scene.camera.position)?;
            scene.camera.yaw = parse_f32(optional_text(&node, "yaw"), scene.camera.yaw)?;
            scene.camera.pitch = parse_f32(optional_text(&node, "pitch"), scene.camera.pitch)?;
            scene.camera.fov = parse_f32(optional_text(&node, "fov"), scene.camera.fov)?;
        }

        let mut lights = Vec::new();
        for node in document.descendants().filter(|n| n.has_tag_name("light")) {
            let mut light = LightSpec::default();
            light.kind = match optional_text(&node, "type").as_deref() {
                Some("directional") => LightKind::Directional,
                Some("point") | None => LightKind::Point,
                Some(other) => return Err(anyhow!("unknown light type {other:?}")),
            };
            light.position = parse_vec3(optional_text(&node, "position"), light.position)?;
            light.color = parse_color(optional_text(&node, "color"), light.color)?;
            light.intensity = parse_f32(optional_text(&node, "intensity"), light.intensity)?;
            lights.push(light);
        }
        if !lights.is_empty() {
            scene.lights = lights;
        }

        if let Some(node) = document.descendants().find(|n| n.has_tag_name("material")) {
            scene.material.color = parse_color(optional_text(&node, "color"), scene.material.color)?;
            scene.material.roughness =
                parse_f32(optional_text(&node, "roughness"), scene.material.roughness)?;
            scene.material.metallic =
                parse_f32(optional_text(&node, "metallic"), scene.material.metallic)?;
            scene.material.shading =
                parse_f32(optional_text(&node, "shading"), scene.material.shading as f32)? as u32;
        }

        if let Some(node) = document.descendants().find(|n| n.has_tag_name("sky")) {
            scene.sky.horizon = parse_color(optional_text(&node, "horizon"), scene.sky.horizon)?;
            scene.sky.zenith = parse_color(optional_text(&node, "zenith"), scene.sky.zenith)?;
        }

        Ok(scene)
    }
}

/// Initial camera placement.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct CameraSpec {
    pub position: Vec3,
    pub yaw: f32,
    pub pitch: f32,
    pub fov: f32,
}

impl Default for CameraSpec {
    fn default() -> Self {
        Self {
            position: Vec3::new(0.0, 0.0, 6.0),
            yaw: -90.0,
            pitch: 0.0,
            fov: 45.0,
        }
    }
}

/// Point lights attenuate with distance; directional lights treat `position`
/// as the direction toward the light.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum LightKind {
    Directional,
    Point,
}

impl LightKind {
    /// Encoding used in the light uniform's `w` component.
    pub fn as_uniform(self) -> f32 {
        match self {
            LightKind::Directional => 0.0,
            LightKind::Point => 1.0,
        }
    }
}

/// A single light as described by the scene file.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct LightSpec {
    pub kind: LightKind,
    pub position: Vec3,
    pub color: Vec3,
    pub intensity: f32,
}

impl Default for LightSpec {
    fn default() -> Self {
        Self {
            kind: LightKind::Point,
            position: Vec3::new(2.0, 2.0, 2.0),
            color: Vec3::ONE,
            intensity: 1.0,
        }
    }
}

/// Material of the analytic sphere.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct MaterialSpec {
    pub color: Vec3,
    pub roughness: f32,
    pub metallic: f32,
    /// Shading variant selector: 0 diffuse, 1 metal, 2 normal visualization.
    pub shading: u32,
}

impl Default for MaterialSpec {
    fn default() -> Self {
        Self {
            color: Vec3::new(1.0, 0.1, 0.1),
            roughness: 0.4,
            metallic: 0.1,
            shading: 0,
        }
    }
}

/// Procedural sky gradient standing in for a cube-mapped sky-box.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Sky {
    pub horizon: Vec3,
    pub zenith: Vec3,
}

impl Default for Sky {
    fn default() -> Self {
        Self {
            horizon: Vec3::new(0.3, 0.4, 0.5),
            zenith: Vec3::new(0.1, 0.25, 0.6),
        }
    }
}

impl Sky {
    /// Sky radiance along a unit direction.
    pub fn color(&self, dir: Vec3) -> Vec3 {
        let t = (dir.y * 0.5 + 0.5).clamp(0.0, 1.0);
        self.horizon.lerp(self.zenith, t)
    }

    /// Average sky radiance over sampled directions around `normal`.
    ///
    /// Uploaded once per frame as the ambient irradiance uniform. The draw
    /// inherits the narrowed cone of [`sample_hemisphere`].
    pub fn ambient_estimate<R: Rng + ?Sized>(
        &self,
        rng: &mut R,
        normal: Vec3,
        samples: u32,
    ) -> Result<Vec3, MathError> {
        let samples = samples.max(1);
        let mut total = Vec3::ZERO;
        for _ in 0..samples {
            total += self.color(sample_hemisphere(rng, normal)?);
        }
        Ok(total / samples as f32)
    }
}

fn optional_text(node: &Node<'_, '_>, tag: &str) -> Option<String> {
    node.children()
        .find(|child| child.has_tag_name(tag))
        .and_then(|child| child.text())
        .map(str::trim)
        .filter(|text| !text.is_empty())
        .map(|text| text.to_string())
}

fn parse_vec3(value: Option<String>, default: Vec3) -> Result<Vec3> {
    let Some(value) = value else {
        return Ok(default);
    };
    let mut numbers = value
        .split_whitespace()
        .filter_map(|component| component.parse::<f32>().ok());
    let x = numbers
        .next()
        .ok_or_else(|| anyhow!("vector is missing components"))?;
    let y = numbers
        .next()
        .ok_or_else(|| anyhow!("vector is missing components"))?;
    let z = numbers
        .next()
        .ok_or_else(|| anyhow!("vector is missing components"))?;
    Ok(Vec3::new(x, y, z))
}

fn parse_color(value: Option<String>, default: Vec3) -> Result<Vec3> {
    let rgb = parse_vec3(value, default * 255.0)?;
    Ok(rgb / 255.0)
}

fn parse_f32(value: Option<String>, default: f32) -> Result<f32> {
    match value {
        Some(value) => value
            .parse::<f32>()
            .map_err(|err| anyhow!("failed to parse float: {err}")),
        None => Ok(default),
    }
}
