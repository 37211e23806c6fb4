//! Full-window pass that runs the user's image shader.
//!
//! The pass draws a single oversized triangle so every pixel of the window is
//! shaded by the watched `mainImage`. The five injected inputs are uploaded
//! as one uniform block each frame.
//!
//! # GLSL Declaration
//!
//! ```glsl
//! layout(set = 0, binding = 0) uniform Inputs {
//!     vec2 iResolution;
//!     float iTime;
//!     float iTimeDelta;
//!     int iFrame;
//!     vec2 iMouse;
//! };
//! ```

use glam::Vec2;

use crate::compiler::WgpuBackend;
use crate::gpu::GpuContext;

/// Inputs available to every image shader, laid out for std140.
#[repr(C)]
#[derive(Copy, Clone, Debug, Default, PartialEq, bytemuck::Pod, bytemuck::Zeroable)]
pub struct ImageUniforms {
    /// Render target resolution in pixels `[width, height]`.
    pub resolution: [f32; 2],
    /// Elapsed time in seconds since the previewer started.
    pub time: f32,
    /// Duration of the previous frame in seconds.
    pub time_delta: f32,
    /// Number of frames rendered so far.
    pub frame: i32,
    /// `vec2` members are 8-byte aligned.
    pub _padding: f32,
    /// Cursor position in window pixels, `(-1, -1)` before the first move.
    pub mouse: [f32; 2],
}

impl ImageUniforms {
    pub fn new(resolution: Vec2, time: f32, time_delta: f32, frame: i32, mouse: Vec2) -> Self {
        Self {
            resolution: resolution.to_array(),
            time,
            time_delta,
            frame,
            _padding: 0.0,
            mouse: mouse.to_array(),
        }
    }
}

/// Uniform storage and pipeline layout for image programs.
///
/// Programs themselves are built by the [`WgpuBackend`] returned from
/// [`backend`](Self::backend) and owned by the hot-reload controller.
pub struct ImagePass {
    uniform_buffer: wgpu::Buffer,
    bind_group: wgpu::BindGroup,
    pipeline_layout: wgpu::PipelineLayout,
}

impl ImagePass {
    pub fn new(gpu: &GpuContext) -> Self {
        let device = &gpu.device;

        let uniform_buffer = device.create_buffer(&wgpu::BufferDescriptor {
            label: Some("Image Uniforms"),
            size: std::mem::size_of::<ImageUniforms>() as u64,
            usage: wgpu::BufferUsages::UNIFORM | wgpu::BufferUsages::COPY_DST,
            mapped_at_creation: false,
        });

        let bind_group_layout = device.create_bind_group_layout(&wgpu::BindGroupLayoutDescriptor {
            label: Some("Image Bind Group Layout"),
            entries: &[wgpu::BindGroupLayoutEntry {
                binding: 0,
                visibility: wgpu::ShaderStages::VERTEX | wgpu::ShaderStages::FRAGMENT,
                ty: wgpu::BindingType::Buffer {
                    ty: wgpu::BufferBindingType::Uniform,
                    has_dynamic_offset: false,
                    min_binding_size: None,
                },
                count: None,
            }],
        });

        let bind_group = device.create_bind_group(&wgpu::BindGroupDescriptor {
            label: Some("Image Bind Group"),
            layout: &bind_group_layout,
            entries: &[wgpu::BindGroupEntry {
                binding: 0,
                resource: uniform_buffer.as_entire_binding(),
            }],
        });

        let pipeline_layout = device.create_pipeline_layout(&wgpu::PipelineLayoutDescriptor {
            label: Some("Image Pipeline Layout"),
            bind_group_layouts: &[&bind_group_layout],
            push_constant_ranges: &[],
        });

        Self {
            uniform_buffer,
            bind_group,
            pipeline_layout,
        }
    }

    /// Backend that compiles and links image programs for this pass.
    pub fn backend(&self, gpu: &GpuContext) -> WgpuBackend {
        WgpuBackend::new(
            &gpu.device,
            self.pipeline_layout.clone(),
            gpu.config.format,
            "Image Pipeline",
        )
    }

    /// Upload `uniforms` and draw `program` over the whole target.
    pub fn render(
        &self,
        gpu: &GpuContext,
        render_pass: &mut wgpu::RenderPass,
        program: &wgpu::RenderPipeline,
        uniforms: &ImageUniforms,
    ) {
        gpu.queue
            .write_buffer(&self.uniform_buffer, 0, bytemuck::bytes_of(uniforms));

        render_pass.set_pipeline(program);
        render_pass.set_bind_group(0, &self.bind_group, &[]);
        render_pass.draw(0..3, 0..1);
    }
}
