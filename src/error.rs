use thiserror::Error;

/// Failures while bringing up the window, GPU or builtin programs.
///
/// All of these are fatal: the previewer cannot draw anything without them.
#[derive(Debug, Error)]
pub enum InitError {
    #[error("failed to create event loop: {0}")]
    EventLoop(#[from] winit::error::EventLoopError),

    #[error("failed to create window: {0}")]
    Window(#[from] winit::error::OsError),

    #[error("failed to create surface: {0}")]
    Surface(#[from] wgpu::CreateSurfaceError),

    #[error("no suitable GPU adapter: {0}")]
    Adapter(#[from] wgpu::RequestAdapterError),

    #[error("failed to create device: {0}")]
    Device(#[from] wgpu::RequestDeviceError),

    #[error("surface reports no supported formats")]
    NoSurfaceFormat,

    #[error("builtin {name} program failed to build:\n{log}")]
    BuiltinShader { name: &'static str, log: String },

    #[error("GPU ran out of memory")]
    OutOfMemory,
}
