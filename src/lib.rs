//! # tadershoy
//!
//! **Live preview for a single GLSL fragment shader.**
//!
//! Point it at a file containing a `mainImage` function and it draws the
//! result across the whole window, recompiling whenever the file is saved. If
//! the shader fails to compile, the compiler's diagnostics are shown in place
//! of the image until the file is fixed.
//!
//! ```no_run
//! use tadershoy::{Config, run};
//!
//! run(Config::new("image.glsl")).expect("previewer failed to start");
//! ```
//!
//! The shader sees five inputs: `iResolution`, `iTime`, `iTimeDelta`,
//! `iFrame` and `iMouse`. A missing file is created from a template that
//! documents them.
//!
//! The pieces are usable on their own:
//!
//! - [`HotReloadController`] watches the file and swaps programs, generic over
//!   a [`ShaderBackend`] so it can run without a GPU ([`NagaBackend`]).
//! - [`QuadBatcher`] lays out quads and text into a [`GrowableBuffer`] of
//!   overlay vertices.

mod app;
mod assets;
mod buffer;
mod compiler;
mod config;
mod draw2d;
mod effect_pass;
mod error;
mod gpu;
mod hot_shader;
mod input;
mod logging;
mod overlay;
mod watcher;

pub use app::run;
pub use assets::{AtlasBitmap, FontAtlas, GlyphTable, load_font};
pub use buffer::GrowableBuffer;
pub use compiler::{
    FILE_TEMPLATE, FULLSCREEN_VERT, IMAGE_FOOTER, IMAGE_HEADER, NagaBackend, NagaProgram,
    OVERLAY_FRAG, OVERLAY_VERT, ShaderBackend, ShaderError, Stage, WgpuBackend, compile_glsl,
    image_source,
};
pub use config::{Cli, Config};
pub use draw2d::{Glyph, GlyphLookup, LINE_HEIGHT, QuadBatcher, Rect, Vertex};
pub use effect_pass::{ImagePass, ImageUniforms};
pub use error::InitError;
pub use gpu::GpuContext;
pub use hot_shader::{HotReloadController, ReloadOutcome, ReloadState};
pub use input::Input;
pub use logging::{LoggingConfig, init_logging};
pub use overlay::OverlayPass;
pub use watcher::{FileWatcher, POLL_INTERVAL_FRAMES, ensure_exists};
