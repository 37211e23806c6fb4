use crate::assets::FontAtlas;
use crate::buffer::GrowableBuffer;
use crate::compiler::{OVERLAY_FRAG, OVERLAY_VERT, ShaderBackend, Stage, WgpuBackend};
use crate::draw2d::Vertex;
use crate::error::InitError;
use crate::gpu::GpuContext;

/// Uniforms for the overlay vertex shader.
#[repr(C)]
#[derive(Copy, Clone, bytemuck::Pod, bytemuck::Zeroable)]
struct OverlayUniforms {
    resolution: [f32; 2],
    _padding: [f32; 2],
}

const INITIAL_VERTICES: usize = 4096;

const VERTEX_BUFFERS: &[wgpu::VertexBufferLayout<'static>] = &[Vertex::LAYOUT];

/// Draws a frame's batched overlay quads on top of the image.
///
/// Flat quads and glyph quads share one pipeline; the fragment shader tells
/// them apart by the sign of the UV. Blending expects premultiplied colors.
pub struct OverlayPass {
    pipeline: wgpu::RenderPipeline,
    vertex_buffer: wgpu::Buffer,
    vertex_capacity: usize,
    uniform_buffer: wgpu::Buffer,
    uniform_bind_group: wgpu::BindGroup,
    atlas_bind_group: wgpu::BindGroup,
}

impl OverlayPass {
    /// Build the overlay program. A failure here is fatal: without it no
    /// diagnostics can be shown.
    pub fn new(gpu: &GpuContext, atlas: &FontAtlas) -> Result<Self, InitError> {
        let device = &gpu.device;

        let uniform_buffer = device.create_buffer(&wgpu::BufferDescriptor {
            label: Some("Overlay Uniforms"),
            size: std::mem::size_of::<OverlayUniforms>() as u64,
            usage: wgpu::BufferUsages::UNIFORM | wgpu::BufferUsages::COPY_DST,
            mapped_at_creation: false,
        });

        // Uniform bind group layout (group 0)
        let uniform_bind_group_layout =
            device.create_bind_group_layout(&wgpu::BindGroupLayoutDescriptor {
                label: Some("Overlay Uniform Layout"),
                entries: &[wgpu::BindGroupLayoutEntry {
                    binding: 0,
                    visibility: wgpu::ShaderStages::VERTEX,
                    ty: wgpu::BindingType::Buffer {
                        ty: wgpu::BufferBindingType::Uniform,
                        has_dynamic_offset: false,
                        min_binding_size: None,
                    },
                    count: None,
                }],
            });

        let uniform_bind_group = device.create_bind_group(&wgpu::BindGroupDescriptor {
            label: Some("Overlay Uniform Bind Group"),
            layout: &uniform_bind_group_layout,
            entries: &[wgpu::BindGroupEntry {
                binding: 0,
                resource: uniform_buffer.as_entire_binding(),
            }],
        });

        // Atlas bind group layout (group 1)
        let atlas_bind_group_layout =
            device.create_bind_group_layout(&wgpu::BindGroupLayoutDescriptor {
                label: Some("Overlay Atlas Layout"),
                entries: &[
                    wgpu::BindGroupLayoutEntry {
                        binding: 0,
                        visibility: wgpu::ShaderStages::FRAGMENT,
                        ty: wgpu::BindingType::Texture {
                            sample_type: wgpu::TextureSampleType::Float { filterable: true },
                            view_dimension: wgpu::TextureViewDimension::D2,
                            multisampled: false,
                        },
                        count: None,
                    },
                    wgpu::BindGroupLayoutEntry {
                        binding: 1,
                        visibility: wgpu::ShaderStages::FRAGMENT,
                        ty: wgpu::BindingType::Sampler(wgpu::SamplerBindingType::Filtering),
                        count: None,
                    },
                ],
            });

        let atlas_bind_group = device.create_bind_group(&wgpu::BindGroupDescriptor {
            label: Some("Overlay Atlas Bind Group"),
            layout: &atlas_bind_group_layout,
            entries: &[
                wgpu::BindGroupEntry {
                    binding: 0,
                    resource: wgpu::BindingResource::TextureView(&atlas.view),
                },
                wgpu::BindGroupEntry {
                    binding: 1,
                    resource: wgpu::BindingResource::Sampler(&atlas.sampler),
                },
            ],
        });

        let pipeline_layout = device.create_pipeline_layout(&wgpu::PipelineLayoutDescriptor {
            label: Some("Overlay Pipeline Layout"),
            bind_group_layouts: &[&uniform_bind_group_layout, &atlas_bind_group_layout],
            push_constant_ranges: &[],
        });

        let backend = WgpuBackend::new(device, pipeline_layout, gpu.config.format, "Overlay Pipeline")
            .with_buffers(VERTEX_BUFFERS)
            .with_blend(wgpu::BlendState::PREMULTIPLIED_ALPHA_BLENDING);
        let pipeline = build_program(&backend)?;

        Ok(Self {
            pipeline,
            vertex_buffer: create_vertex_buffer(device, INITIAL_VERTICES),
            vertex_capacity: INITIAL_VERTICES,
            uniform_buffer,
            uniform_bind_group,
            atlas_bind_group,
        })
    }

    /// Upload `vertices` and draw them.
    pub fn render(&mut self, gpu: &GpuContext, render_pass: &mut wgpu::RenderPass, vertices: &[Vertex]) {
        if vertices.is_empty() {
            return;
        }

        if vertices.len() > self.vertex_capacity {
            self.vertex_capacity = vertices.len().next_power_of_two();
            self.vertex_buffer = create_vertex_buffer(&gpu.device, self.vertex_capacity);
            log::debug!("overlay vertex buffer grown to {}", self.vertex_capacity);
        }

        let uniforms = OverlayUniforms {
            resolution: [gpu.width() as f32, gpu.height() as f32],
            _padding: [0.0, 0.0],
        };
        gpu.queue
            .write_buffer(&self.uniform_buffer, 0, bytemuck::cast_slice(&[uniforms]));
        gpu.queue
            .write_buffer(&self.vertex_buffer, 0, bytemuck::cast_slice(vertices));

        render_pass.set_pipeline(&self.pipeline);
        render_pass.set_bind_group(0, &self.uniform_bind_group, &[]);
        render_pass.set_bind_group(1, &self.atlas_bind_group, &[]);
        render_pass.set_vertex_buffer(0, self.vertex_buffer.slice(..));
        render_pass.draw(0..vertices.len() as u32, 0..1);
    }
}

fn build_program(backend: &WgpuBackend) -> Result<wgpu::RenderPipeline, InitError> {
    let mut log = GrowableBuffer::new();
    let fatal = |name, log: &GrowableBuffer<u8>| InitError::BuiltinShader {
        name,
        log: String::from_utf8_lossy(log).into_owned(),
    };

    let vs = backend
        .compile(Stage::Vertex, &[OVERLAY_VERT], &mut log)
        .map_err(|_| fatal("overlay vertex", &log))?;
    let fs = backend
        .compile(Stage::Fragment, &[OVERLAY_FRAG], &mut log)
        .map_err(|_| fatal("overlay fragment", &log))?;
    backend
        .link(&vs, &fs, &mut log)
        .map_err(|_| fatal("overlay", &log))
}

fn create_vertex_buffer(device: &wgpu::Device, vertices: usize) -> wgpu::Buffer {
    device.create_buffer(&wgpu::BufferDescriptor {
        label: Some("Overlay Vertex Buffer"),
        size: (vertices * std::mem::size_of::<Vertex>()) as u64,
        usage: wgpu::BufferUsages::VERTEX | wgpu::BufferUsages::COPY_DST,
        mapped_at_creation: false,
    })
}
