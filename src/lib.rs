//! Core modules for the rayview interactive ray viewer.
//!
//! The crate exposes the camera, sampling, and scene building blocks as a
//! library so they stay testable without a window or a GPU; the binary wires
//! them to winit and wgpu. The renderer is treated as a sink for per-frame
//! uniform values and owns no scene logic of its own.

pub mod camera;
pub mod input;
pub mod math;
pub mod render;
pub mod scene;
pub mod tuning;

pub use camera::{
    projection_matrix, ray_direction, screen_ray_matrix, Camera, CameraController, FrameInput,
};
pub use input::{InputState, KeyCode, MouseButton, NamedKey};
pub use math::{length, normalize, sample_hemisphere, uniform_random, Basis, MathError};
pub use render::{FrameParams, LightParams, Renderer, SkyParams};
pub use scene::{CameraSpec, LightKind, LightSpec, MaterialSpec, Scene, Sky};
pub use tuning::{Tunables, TuningState};
