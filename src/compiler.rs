//! GLSL compilation and program linking.
//!
//! Shaders are compiled from an ordered list of source fragments that are
//! concatenated into a single compilation unit. The watched file is never
//! compiled by itself: it is always sandwiched between [`IMAGE_HEADER`], which
//! declares the injected uniforms, and [`IMAGE_FOOTER`], which calls the
//! user's `mainImage`.
//!
//! Compilation goes through the [`ShaderBackend`] trait. [`WgpuBackend`] is the
//! one used for drawing: naga parses and validates the GLSL, then wgpu builds
//! the shader module and render pipeline under validation, internal and
//! out-of-memory error scopes.
//! [`NagaBackend`] stops after naga and checks stage interfaces itself, which
//! makes it usable without a GPU.
//!
//! On failure, both backends replace the contents of the caller's log buffer
//! with the full diagnostic text.

use std::borrow::Cow;
use std::fmt;

use naga::front::glsl;
use naga::valid::{Capabilities, ValidationFlags, Validator};
use thiserror::Error;

use crate::buffer::GrowableBuffer;

/// Declares the uniform block and colour output for the image shader.
pub const IMAGE_HEADER: &str = include_str!("shaders/image_header.glsl");
/// Entry point that forwards to the user's `mainImage`.
pub const IMAGE_FOOTER: &str = include_str!("shaders/image_footer.glsl");
/// Body written to the watched path when it does not exist yet.
pub const FILE_TEMPLATE: &str = include_str!("shaders/template.glsl");
/// Vertex stage shared by every image program.
pub const FULLSCREEN_VERT: &str = include_str!("shaders/fullscreen.vert");
pub const OVERLAY_VERT: &str = include_str!("shaders/overlay.vert");
pub const OVERLAY_FRAG: &str = include_str!("shaders/overlay.frag");

/// The three fragments making up an image shader, in compile order.
pub fn image_source(body: &str) -> [&str; 3] {
    [IMAGE_HEADER, body, IMAGE_FOOTER]
}

/// Pipeline stage a shader is compiled for.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Stage {
    Vertex,
    Fragment,
}

impl Stage {
    fn naga(self) -> naga::ShaderStage {
        match self {
            Stage::Vertex => naga::ShaderStage::Vertex,
            Stage::Fragment => naga::ShaderStage::Fragment,
        }
    }
}

impl fmt::Display for Stage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Stage::Vertex => f.write_str("vertex"),
            Stage::Fragment => f.write_str("fragment"),
        }
    }
}

/// A compile or link failure. The diagnostic text lives in the log buffer
/// handed to the backend.
#[derive(Debug, Error, Clone, Copy, PartialEq, Eq)]
pub enum ShaderError {
    #[error("{stage} shader failed to compile")]
    Compile { stage: Stage },
    #[error("program failed to link")]
    Link,
}

/// Something that can turn GLSL into linked programs.
pub trait ShaderBackend {
    type Shader;
    type Program;

    /// Compile `fragments`, concatenated in order, as one `stage` shader.
    fn compile(
        &self,
        stage: Stage,
        fragments: &[&str],
        log: &mut GrowableBuffer<u8>,
    ) -> Result<Self::Shader, ShaderError>;

    /// Link a vertex and a fragment shader. Both inputs stay owned by the
    /// caller whatever the outcome.
    fn link(
        &self,
        vertex: &Self::Shader,
        fragment: &Self::Shader,
        log: &mut GrowableBuffer<u8>,
    ) -> Result<Self::Program, ShaderError>;
}

/// Replace the log contents with `text`.
fn write_log(log: &mut GrowableBuffer<u8>, text: &str) {
    log.clear();
    log.ensure(text.len());
    log.extend_from_slice(text.as_bytes());
}

/// Parse and validate GLSL with naga.
pub fn compile_glsl(
    stage: Stage,
    fragments: &[&str],
    log: &mut GrowableBuffer<u8>,
) -> Result<naga::Module, ShaderError> {
    let source = fragments.concat();

    let mut frontend = glsl::Frontend::default();
    let module = match frontend.parse(&glsl::Options::from(stage.naga()), &source) {
        Ok(module) => module,
        Err(errors) => {
            write_log(log, &errors.emit_to_string(&source));
            return Err(ShaderError::Compile { stage });
        }
    };

    let mut validator = Validator::new(ValidationFlags::all(), Capabilities::all());
    if let Err(error) = validator.validate(&module) {
        write_log(log, &error.emit_to_string(&source));
        return Err(ShaderError::Compile { stage });
    }

    Ok(module)
}

/// Headless backend: naga only, with interface matching done by hand.
#[derive(Debug, Default, Clone, Copy)]
pub struct NagaBackend;

/// The two validated stages of a [`NagaBackend`] program.
#[derive(Debug)]
pub struct NagaProgram {
    pub vertex: naga::Module,
    pub fragment: naga::Module,
}

impl ShaderBackend for NagaBackend {
    type Shader = naga::Module;
    type Program = NagaProgram;

    fn compile(
        &self,
        stage: Stage,
        fragments: &[&str],
        log: &mut GrowableBuffer<u8>,
    ) -> Result<naga::Module, ShaderError> {
        compile_glsl(stage, fragments, log)
    }

    fn link(
        &self,
        vertex: &naga::Module,
        fragment: &naga::Module,
        log: &mut GrowableBuffer<u8>,
    ) -> Result<NagaProgram, ShaderError> {
        let Some(vs) = entry_point(vertex, naga::ShaderStage::Vertex) else {
            write_log(log, "error: no vertex entry point\n");
            return Err(ShaderError::Link);
        };
        let Some(fs) = entry_point(fragment, naga::ShaderStage::Fragment) else {
            write_log(log, "error: no fragment entry point\n");
            return Err(ShaderError::Link);
        };

        let mut outputs = Vec::new();
        if let Some(result) = &vs.function.result {
            collect_locations(vertex, result.ty, result.binding.as_ref(), &mut outputs);
        }

        let mut inputs = Vec::new();
        for argument in &fs.function.arguments {
            collect_locations(fragment, argument.ty, argument.binding.as_ref(), &mut inputs);
        }

        let missing: Vec<u32> = inputs
            .into_iter()
            .filter(|location| !outputs.contains(location))
            .collect();
        if !missing.is_empty() {
            let mut text = String::new();
            for location in missing {
                text.push_str(&format!(
                    "error: fragment input at location {location} is not written by the vertex shader\n"
                ));
            }
            write_log(log, &text);
            return Err(ShaderError::Link);
        }

        Ok(NagaProgram {
            vertex: vertex.clone(),
            fragment: fragment.clone(),
        })
    }
}

fn entry_point(module: &naga::Module, stage: naga::ShaderStage) -> Option<&naga::EntryPoint> {
    module.entry_points.iter().find(|ep| ep.stage == stage)
}

fn collect_locations(
    module: &naga::Module,
    ty: naga::Handle<naga::Type>,
    binding: Option<&naga::Binding>,
    out: &mut Vec<u32>,
) {
    match binding {
        Some(naga::Binding::Location { location, .. }) => out.push(*location),
        Some(naga::Binding::BuiltIn(_)) => {}
        None => {
            if let naga::TypeInner::Struct { members, .. } = &module.types[ty].inner {
                for member in members {
                    if let Some(naga::Binding::Location { location, .. }) = &member.binding {
                        out.push(*location);
                    }
                }
            }
        }
    }
}

/// Backend producing wgpu render pipelines for one fixed pipeline layout.
#[derive(Clone)]
pub struct WgpuBackend {
    device: wgpu::Device,
    layout: wgpu::PipelineLayout,
    format: wgpu::TextureFormat,
    buffers: &'static [wgpu::VertexBufferLayout<'static>],
    blend: Option<wgpu::BlendState>,
    label: &'static str,
}

impl WgpuBackend {
    pub fn new(
        device: &wgpu::Device,
        layout: wgpu::PipelineLayout,
        format: wgpu::TextureFormat,
        label: &'static str,
    ) -> Self {
        Self {
            device: device.clone(),
            layout,
            format,
            buffers: &[],
            blend: Some(wgpu::BlendState::REPLACE),
            label,
        }
    }

    /// Vertex buffers fed to the vertex stage.
    pub fn with_buffers(mut self, buffers: &'static [wgpu::VertexBufferLayout<'static>]) -> Self {
        self.buffers = buffers;
        self
    }

    pub fn with_blend(mut self, blend: wgpu::BlendState) -> Self {
        self.blend = Some(blend);
        self
    }

    /// Run `create` inside one error scope per [`ERROR_FILTERS`] entry and
    /// return whatever the scopes caught as log text.
    fn capture<T>(&self, create: impl FnOnce(&wgpu::Device) -> T) -> (T, Option<String>) {
        for filter in ERROR_FILTERS {
            self.device.push_error_scope(filter);
        }
        let value = create(&self.device);
        let errors = ERROR_FILTERS
            .iter()
            .filter_map(|_| pollster::block_on(self.device.pop_error_scope()))
            .collect::<Vec<_>>();
        (value, describe_errors(errors))
    }
}

/// Scopes pushed around shader and pipeline creation. An error class left out
/// here reaches the device's uncaptured error handler instead of the log.
const ERROR_FILTERS: [wgpu::ErrorFilter; 3] = [
    wgpu::ErrorFilter::Validation,
    wgpu::ErrorFilter::Internal,
    wgpu::ErrorFilter::OutOfMemory,
];

/// Join captured wgpu errors into log text, one per line.
fn describe_errors(errors: impl IntoIterator<Item = wgpu::Error>) -> Option<String> {
    let mut text = String::new();
    for error in errors {
        text.push_str(error.to_string().trim_end());
        text.push('\n');
    }
    (!text.is_empty()).then_some(text)
}

impl ShaderBackend for WgpuBackend {
    type Shader = wgpu::ShaderModule;
    type Program = wgpu::RenderPipeline;

    fn compile(
        &self,
        stage: Stage,
        fragments: &[&str],
        log: &mut GrowableBuffer<u8>,
    ) -> Result<wgpu::ShaderModule, ShaderError> {
        let module = compile_glsl(stage, fragments, log)?;

        let (shader, errors) = self.capture(|device| {
            device.create_shader_module(wgpu::ShaderModuleDescriptor {
                label: Some(self.label),
                source: wgpu::ShaderSource::Naga(Cow::Owned(module)),
            })
        });

        if let Some(text) = errors {
            write_log(log, &text);
            return Err(ShaderError::Compile { stage });
        }

        Ok(shader)
    }

    fn link(
        &self,
        vertex: &wgpu::ShaderModule,
        fragment: &wgpu::ShaderModule,
        log: &mut GrowableBuffer<u8>,
    ) -> Result<wgpu::RenderPipeline, ShaderError> {
        let (pipeline, errors) = self.capture(|device| {
            device.create_render_pipeline(&wgpu::RenderPipelineDescriptor {
                label: Some(self.label),
                layout: Some(&self.layout),
                vertex: wgpu::VertexState {
                    module: vertex,
                    entry_point: Some("main"),
                    buffers: self.buffers,
                    compilation_options: Default::default(),
                },
                fragment: Some(wgpu::FragmentState {
                    module: fragment,
                    entry_point: Some("main"),
                    targets: &[Some(wgpu::ColorTargetState {
                        format: self.format,
                        blend: self.blend,
                        write_mask: wgpu::ColorWrites::ALL,
                    })],
                    compilation_options: Default::default(),
                }),
                primitive: wgpu::PrimitiveState {
                    topology: wgpu::PrimitiveTopology::TriangleList,
                    ..Default::default()
                },
                depth_stencil: None,
                multisample: wgpu::MultisampleState::default(),
                multiview: None,
                cache: None,
            })
        });

        if let Some(text) = errors {
            write_log(log, &text);
            return Err(ShaderError::Link);
        }

        Ok(pipeline)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn log_text(log: &GrowableBuffer<u8>) -> String {
        String::from_utf8_lossy(log).into_owned()
    }

    #[test]
    fn template_compiles_inside_wrapper() {
        let mut log = GrowableBuffer::new();
        let module = compile_glsl(Stage::Fragment, &image_source(FILE_TEMPLATE), &mut log);

        assert!(module.is_ok(), "{}", log_text(&log));
        assert!(log.is_empty());
    }

    #[test]
    fn builtin_shaders_compile_and_link() {
        let backend = NagaBackend;
        let mut log = GrowableBuffer::new();

        let vs = backend
            .compile(Stage::Vertex, &[OVERLAY_VERT], &mut log)
            .unwrap_or_else(|_| panic!("{}", log_text(&log)));
        let fs = backend
            .compile(Stage::Fragment, &[OVERLAY_FRAG], &mut log)
            .unwrap_or_else(|_| panic!("{}", log_text(&log)));
        assert!(backend.link(&vs, &fs, &mut log).is_ok(), "{}", log_text(&log));

        let fullscreen = backend
            .compile(Stage::Vertex, &[FULLSCREEN_VERT], &mut log)
            .unwrap_or_else(|_| panic!("{}", log_text(&log)));
        assert_eq!(fullscreen.entry_points.len(), 1);
    }

    #[test]
    fn syntax_error_fills_log() {
        let mut log = GrowableBuffer::new();
        let body = "void mainImage(out vec4 fragColor, in vec2 fragCoord) {\n   fragColor = vec4(1.0)\n}\n";

        let result = compile_glsl(Stage::Fragment, &image_source(body), &mut log);

        assert_eq!(
            result.err(),
            Some(ShaderError::Compile {
                stage: Stage::Fragment
            })
        );
        assert!(!log.is_empty());
    }

    #[test]
    fn failure_replaces_previous_log() {
        let mut log = GrowableBuffer::new();
        log.extend_from_slice(b"stale diagnostic that is rather long");

        let _ = compile_glsl(Stage::Fragment, &image_source("not glsl at all"), &mut log);

        assert!(!log.is_empty());
        assert!(!log_text(&log).contains("stale diagnostic"));
    }

    #[test]
    fn body_without_main_image_fails() {
        let mut log = GrowableBuffer::new();
        let result = compile_glsl(Stage::Fragment, &image_source(""), &mut log);

        assert!(result.is_err());
        assert!(!log.is_empty());
    }

    #[test]
    fn link_reports_unwritten_inputs() {
        let backend = NagaBackend;
        let mut log = GrowableBuffer::new();

        let vs = backend
            .compile(Stage::Vertex, &[FULLSCREEN_VERT], &mut log)
            .unwrap_or_else(|_| panic!("{}", log_text(&log)));
        let fs = backend
            .compile(Stage::Fragment, &[OVERLAY_FRAG], &mut log)
            .unwrap_or_else(|_| panic!("{}", log_text(&log)));

        assert_eq!(backend.link(&vs, &fs, &mut log).err(), Some(ShaderError::Link));
        assert!(log_text(&log).contains("location 0"));
    }

    #[test]
    fn every_error_class_is_scoped() {
        assert!(ERROR_FILTERS.contains(&wgpu::ErrorFilter::Validation));
        assert!(ERROR_FILTERS.contains(&wgpu::ErrorFilter::Internal));
        assert!(ERROR_FILTERS.contains(&wgpu::ErrorFilter::OutOfMemory));
    }

    #[test]
    fn backend_rejection_becomes_log_text() {
        let errors = vec![
            wgpu::Error::Internal {
                source: Box::new(std::io::Error::other("spirv translation failed")),
                description: "Internal error in FRAGMENT shader: bad loop\n".to_string(),
            },
            wgpu::Error::OutOfMemory {
                source: Box::new(std::io::Error::other("oom")),
            },
        ];

        let text = describe_errors(errors).expect("errors should produce text");
        assert_eq!(text, "Internal error in FRAGMENT shader: bad loop\nOut of Memory\n");
    }

    #[test]
    fn no_captured_errors_means_no_text() {
        assert_eq!(describe_errors(Vec::new()), None);
    }
}
