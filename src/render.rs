use std::sync::Arc;

use anyhow::{anyhow, Context, Result};
use bytemuck::{bytes_of, Pod, Zeroable};
use glam::{Mat4, Vec3};
use wgpu::util::DeviceExt;
use winit::dpi::PhysicalSize;
use winit::window::{Window, WindowId};

use crate::scene::LightKind;
use crate::tuning::Tunables;

/// Per-frame camera values consumed by the ray pass.
#[derive(Clone, Debug)]
pub struct FrameParams {
    /// Inverse view-projection with the view translation stripped; the
    /// shader uses it to reconstruct a world-space ray per pixel.
    pub inv_view_proj: Mat4,
    pub eye: Vec3,
}

/// Lighting state consumed by the ray pass.
#[derive(Clone, Debug)]
pub struct LightParams {
    pub position: Vec3,
    pub color: Vec3,
    pub intensity: f32,
    pub kind: LightKind,
}

/// Sky gradient plus the CPU-integrated ambient irradiance.
#[derive(Clone, Debug)]
pub struct SkyParams {
    pub horizon: Vec3,
    pub zenith: Vec3,
    pub ambient_radiance: Vec3,
}

/// GPU renderer drawing one fullscreen quad whose fragment shader casts a
/// ray per pixel against the analytic scene.
pub struct Renderer {
    window: Arc<Window>,
    surface: wgpu::Surface<'static>,
    device: wgpu::Device,
    queue: wgpu::Queue,
    config: wgpu::SurfaceConfiguration,
    size: PhysicalSize<u32>,
    pipeline: wgpu::RenderPipeline,
    global_buffer: wgpu::Buffer,
    global_bind_group: wgpu::BindGroup,
    quad: QuadBuffers,
}

impl Renderer {
    /// Initializes the GPU renderer for the provided window.
    pub async fn new(window: Arc<Window>) -> Result<Self> {
        let size = window.inner_size();
        if size.width == 0 || size.height == 0 {
            return Err(anyhow!("window has zero area"));
        }

        let instance = wgpu::Instance::new(&wgpu::InstanceDescriptor {
            backends: wgpu::Backends::PRIMARY,
            flags: wgpu::InstanceFlags::default(),
            memory_budget_thresholds: Default::default(),
            backend_options: Default::default(),
        });
        let surface = instance.create_surface(Arc::clone(&window))?;

        let adapter = instance
            .request_adapter(&wgpu::RequestAdapterOptions {
                power_preference: wgpu::PowerPreference::HighPerformance,
                compatible_surface: Some(&surface),
                force_fallback_adapter: false,
            })
            .await
            .context("failed to acquire GPU adapter")?;

        let device_descriptor = wgpu::DeviceDescriptor {
            label: Some("rayview-device"),
            required_features: wgpu::Features::empty(),
            required_limits: wgpu::Limits::default(),
            experimental_features: Default::default(),
            memory_hints: Default::default(),
            trace: Default::default(),
        };
        let (device, queue) = adapter
            .request_device(&device_descriptor)
            .await
            .context("failed to create GPU device")?;

        let surface_caps = surface.get_capabilities(&adapter);
        let surface_format = surface_caps
            .formats
            .iter()
            .find(|format| format.is_srgb())
            .copied()
            .unwrap_or(surface_caps.formats[0]);

        let config = wgpu::SurfaceConfiguration {
            usage: wgpu::TextureUsages::RENDER_ATTACHMENT,
            format: surface_format,
            width: size.width,
            height: size.height,
            present_mode: surface_caps
                .present_modes
                .iter()
                .copied()
                .find(|mode| {
                    matches!(
                        mode,
                        wgpu::PresentMode::Mailbox | wgpu::PresentMode::Immediate
                    )
                })
                .unwrap_or(wgpu::PresentMode::Fifo),
            desired_maximum_frame_latency: 2,
            alpha_mode: surface_caps.alpha_modes[0],
            view_formats: vec![],
        };
        surface.configure(&device, &config);

        let shader = device.create_shader_module(wgpu::ShaderModuleDescriptor {
            label: Some("ray-pass-shader"),
            source: wgpu::ShaderSource::Wgsl(SHADER.into()),
        });

        let global_layout = device.create_bind_group_layout(&wgpu::BindGroupLayoutDescriptor {
            label: Some("global-bind-layout"),
            entries: &[wgpu::BindGroupLayoutEntry {
                binding: 0,
                visibility: wgpu::ShaderStages::FRAGMENT,
                ty: wgpu::BindingType::Buffer {
                    ty: wgpu::BufferBindingType::Uniform,
                    has_dynamic_offset: false,
                    min_binding_size: Some(
                        std::num::NonZeroU64::new(std::mem::size_of::<GlobalUniform>() as u64)
                            .unwrap(),
                    ),
                },
                count: None,
            }],
        });

        let pipeline_layout = device.create_pipeline_layout(&wgpu::PipelineLayoutDescriptor {
            label: Some("ray-pass-pipeline-layout"),
            bind_group_layouts: &[&global_layout],
            push_constant_ranges: &[],
        });

        let global_buffer = device.create_buffer(&wgpu::BufferDescriptor {
            label: Some("global-uniform"),
            size: std::mem::size_of::<GlobalUniform>() as u64,
            usage: wgpu::BufferUsages::UNIFORM | wgpu::BufferUsages::COPY_DST,
            mapped_at_creation: false,
        });
        let global_bind_group = device.create_bind_group(&wgpu::BindGroupDescriptor {
            label: Some("global-bind-group"),
            layout: &global_layout,
            entries: &[wgpu::BindGroupEntry {
                binding: 0,
                resource: global_buffer.as_entire_binding(),
            }],
        });

        let pipeline = device.create_render_pipeline(&wgpu::RenderPipelineDescriptor {
            label: Some("ray-pass-pipeline"),
            layout: Some(&pipeline_layout),
            vertex: wgpu::VertexState {
                module: &shader,
                entry_point: Some("vs_main"),
                compilation_options: Default::default(),
                buffers: &[wgpu::VertexBufferLayout {
                    array_stride: (2 * std::mem::size_of::<f32>()) as u64,
                    step_mode: wgpu::VertexStepMode::Vertex,
                    attributes: &[wgpu::VertexAttribute {
                        format: wgpu::VertexFormat::Float32x2,
                        offset: 0,
                        shader_location: 0,
                    }],
                }],
            },
            primitive: wgpu::PrimitiveState {
                topology: wgpu::PrimitiveTopology::TriangleList,
                front_face: wgpu::FrontFace::Ccw,
                cull_mode: None,
                polygon_mode: wgpu::PolygonMode::Fill,
                ..Default::default()
            },
            depth_stencil: None,
            multisample: wgpu::MultisampleState::default(),
            fragment: Some(wgpu::FragmentState {
                module: &shader,
                entry_point: Some("fs_main"),
                compilation_options: Default::default(),
                targets: &[Some(wgpu::ColorTargetState {
                    format: surface_format,
                    blend: None,
                    write_mask: wgpu::ColorWrites::ALL,
                })],
            }),
            multiview: None,
            cache: None,
        });

        let quad = QuadBuffers::create(&device);

        Ok(Self {
            window,
            surface,
            device,
            queue,
            config,
            size,
            pipeline,
            global_buffer,
            global_bind_group,
            quad,
        })
    }

    /// Returns the identifier of the window owned by the renderer.
    pub fn window_id(&self) -> WindowId {
        self.window.id()
    }

    /// Exposes the inner window for event handling.
    pub fn window(&self) -> &Window {
        &self.window
    }

    pub fn aspect(&self) -> f32 {
        if self.size.height == 0 {
            1.0
        } else {
            self.size.width as f32 / self.size.height as f32
        }
    }

    /// Resizes the swap chain to match the new dimensions.
    pub fn resize(&mut self, new_size: PhysicalSize<u32>) {
        if new_size.width == 0 || new_size.height == 0 {
            return;
        }
        self.size = new_size;
        self.config.width = new_size.width;
        self.config.height = new_size.height;
        self.surface.configure(&self.device, &self.config);
    }

    /// Uploads the per-frame uniform values before rendering.
    pub fn update_globals(
        &self,
        frame: &FrameParams,
        light: &LightParams,
        tunables: &Tunables,
        sky: &SkyParams,
    ) {
        let uniform = GlobalUniform {
            inv_view_proj: frame.inv_view_proj.to_cols_array_2d(),
            eye: frame.eye.extend(1.0).into(),
            light_position: frame_light_position(light),
            light_color: light.color.extend(light.intensity).into(),
            material_color: tunables.material_color.extend(tunables.shading as f32).into(),
            material_params: [tunables.roughness, tunables.metallic, tunables.ambient, 0.0],
            sky_horizon: sky.horizon.extend(1.0).into(),
            sky_zenith: sky.zenith.extend(1.0).into(),
            ambient_sky: sky.ambient_radiance.extend(1.0).into(),
        };
        self.queue
            .write_buffer(&self.global_buffer, 0, bytes_of(&uniform));
    }

    /// Draws the fullscreen ray pass.
    pub fn render(&mut self) -> Result<(), wgpu::SurfaceError> {
        let output = self.surface.get_current_texture()?;
        let view = output
            .texture
            .create_view(&wgpu::TextureViewDescriptor::default());
        let mut encoder = self
            .device
            .create_command_encoder(&wgpu::CommandEncoderDescriptor {
                label: Some("rayview-encoder"),
            });

        let mut pass = encoder.begin_render_pass(&wgpu::RenderPassDescriptor {
            label: Some("ray-pass"),
            color_attachments: &[Some(wgpu::RenderPassColorAttachment {
                view: &view,
                depth_slice: None,
                resolve_target: None,
                ops: wgpu::Operations {
                    load: wgpu::LoadOp::Clear(wgpu::Color {
                        r: 0.3,
                        g: 0.4,
                        b: 0.5,
                        a: 1.0,
                    }),
                    store: wgpu::StoreOp::Store,
                },
            })],
            depth_stencil_attachment: None,
            timestamp_writes: None,
            occlusion_query_set: None,
        });

        pass.set_pipeline(&self.pipeline);
        pass.set_bind_group(0, &self.global_bind_group, &[]);
        pass.set_vertex_buffer(0, self.quad.vertex.slice(..));
        pass.set_index_buffer(self.quad.index.slice(..), wgpu::IndexFormat::Uint32);
        pass.draw_indexed(0..QUAD_INDICES.len() as u32, 0, 0..1);

        drop(pass); // explicit to satisfy lifetimes on some backends
        self.queue.submit(std::iter::once(encoder.finish()));
        output.present();
        Ok(())
    }
}

fn frame_light_position(light: &LightParams) -> [f32; 4] {
    light.position.extend(light.kind.as_uniform()).into()
}

struct QuadBuffers {
    vertex: wgpu::Buffer,
    index: wgpu::Buffer,
}

impl QuadBuffers {
    fn create(device: &wgpu::Device) -> Self {
        let vertex = device.create_buffer_init(&wgpu::util::BufferInitDescriptor {
            label: Some("fullscreen-quad-vertices"),
            contents: bytemuck::cast_slice(QUAD_VERTICES),
            usage: wgpu::BufferUsages::VERTEX,
        });
        let index = device.create_buffer_init(&wgpu::util::BufferInitDescriptor {
            label: Some("fullscreen-quad-indices"),
            contents: bytemuck::cast_slice(QUAD_INDICES),
            usage: wgpu::BufferUsages::INDEX,
        });
        Self { vertex, index }
    }
}

// NDC corners of the fullscreen quad; the fragment shader turns the
// interpolated coordinate back into a world-space ray.
const QUAD_VERTICES: &[f32] = &[-1.0, -1.0, 1.0, -1.0, 1.0, 1.0, -1.0, 1.0];

const QUAD_INDICES: &[u32] = &[0, 1, 2, 0, 2, 3];

#[repr(C)]
#[derive(Clone, Copy, Pod, Zeroable)]
struct GlobalUniform {
    inv_view_proj: [[f32; 4]; 4],
    eye: [f32; 4],
    // w selects the light kind: 0 directional, 1 point
    light_position: [f32; 4],
    // w carries the intensity
    light_color: [f32; 4],
    // w carries the shading variant index
    material_color: [f32; 4],
    // roughness, metallic, ambient strength, unused
    material_params: [f32; 4],
    sky_horizon: [f32; 4],
    sky_zenith: [f32; 4],
    ambient_sky: [f32; 4],
}

const SHADER: &str = r#"
struct GlobalUniform {
    inv_view_proj: mat4x4<f32>,
    eye: vec4<f32>,
    light_position: vec4<f32>,
    light_color: vec4<f32>,
    material_color: vec4<f32>,
    material_params: vec4<f32>,
    sky_horizon: vec4<f32>,
    sky_zenith: vec4<f32>,
    ambient_sky: vec4<f32>,
}

@group(0) @binding(0)
var<uniform> globals: GlobalUniform;

struct VertexInput {
    @location(0) position: vec2<f32>,
}

struct VertexOutput {
    @builtin(position) position: vec4<f32>,
    @location(0) ndc: vec2<f32>,
}

@vertex
fn vs_main(input: VertexInput) -> VertexOutput {
    var out: VertexOutput;
    out.position = vec4<f32>(input.position, 0.0, 1.0);
    out.ndc = input.position;
    return out;
}

fn sky_color(dir: vec3<f32>) -> vec3<f32> {
    let t = clamp(dir.y * 0.5 + 0.5, 0.0, 1.0);
    return mix(globals.sky_horizon.xyz, globals.sky_zenith.xyz, t);
}

// Nearest positive intersection with the unit sphere at the origin, or -1.
fn sphere_hit(origin: vec3<f32>, dir: vec3<f32>) -> f32 {
    let b = dot(origin, dir);
    let c = dot(origin, origin) - 1.0;
    let disc = b * b - c;
    if disc < 0.0 {
        return -1.0;
    }
    let t = -b - sqrt(disc);
    if t > 0.0 {
        return t;
    }
    return -1.0;
}

@fragment
fn fs_main(input: VertexOutput) -> @location(0) vec4<f32> {
    let far = globals.inv_view_proj * vec4<f32>(input.ndc, 1.0, 1.0);
    let dir = normalize(far.xyz / far.w);
    let eye = globals.eye.xyz;

    let t = sphere_hit(eye, dir);
    if t < 0.0 {
        return vec4<f32>(sky_color(dir), 1.0);
    }

    let p = eye + t * dir;
    let n = normalize(p);

    let shading = u32(globals.material_color.w);
    if shading == 2u {
        return vec4<f32>(n * 0.5 + vec3<f32>(0.5), 1.0);
    }

    var light_dir: vec3<f32>;
    if globals.light_position.w > 0.5 {
        light_dir = normalize(globals.light_position.xyz - p);
    } else {
        light_dir = normalize(globals.light_position.xyz);
    }
    let diffuse = max(dot(n, light_dir), 0.0);
    let intensity = globals.light_color.w;
    let ambient = globals.material_params.z * globals.ambient_sky.xyz;
    let base = globals.material_color.xyz;

    let lit = (ambient + diffuse * intensity * globals.light_color.xyz) * base;
    if shading == 0u {
        return vec4<f32>(lit, 1.0);
    }

    // metal: reflect the view ray into the sky, rougher surfaces fall back
    // toward the ambient estimate
    let reflected = reflect(dir, n);
    let roughness = globals.material_params.x;
    let metallic = globals.material_params.y;
    let mirror = mix(sky_color(reflected), globals.ambient_sky.xyz, roughness);
    let color = mix(lit, mirror * base, metallic);
    return vec4<f32>(color, 1.0);
}
"#;
