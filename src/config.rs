use std::path::PathBuf;

use clap::Parser;

pub const DEFAULT_WIDTH: u32 = 1280;
pub const DEFAULT_HEIGHT: u32 = 720;
pub const DEFAULT_FONT_SIZE: f32 = 16.0;

/// Monospace fonts tried in order when `--font` is not given.
pub const SYSTEM_FONTS: &[&str] = &[
    "/usr/share/fonts/truetype/dejavu/DejaVuSansMono.ttf",
    "/usr/share/fonts/TTF/DejaVuSansMono.ttf",
    "/usr/share/fonts/dejavu/DejaVuSansMono.ttf",
    "/usr/share/fonts/dejavu-sans-mono-fonts/DejaVuSansMono.ttf",
    "/usr/share/fonts/truetype/liberation/LiberationMono-Regular.ttf",
    "/usr/share/fonts/liberation-mono/LiberationMono-Regular.ttf",
    "/usr/share/fonts/noto/NotoSansMono-Regular.ttf",
    "/System/Library/Fonts/Menlo.ttc",
    "C:\\Windows\\Fonts\\consola.ttf",
];

/// Live preview for a GLSL `mainImage` function.
#[derive(Parser, Debug)]
#[command(name = "tadershoy", version, about)]
pub struct Cli {
    /// Shader body to watch. Created from a template if missing.
    pub path: Option<PathBuf>,

    /// TTF/OTF font for the overlay text.
    #[arg(long)]
    pub font: Option<PathBuf>,

    /// Overlay font size in pixels.
    #[arg(long, default_value_t = DEFAULT_FONT_SIZE)]
    pub font_size: f32,

    /// Initial window width.
    #[arg(long, default_value_t = DEFAULT_WIDTH)]
    pub width: u32,

    /// Initial window height.
    #[arg(long, default_value_t = DEFAULT_HEIGHT)]
    pub height: u32,
}

/// Everything the previewer needs to start.
#[derive(Debug, Clone)]
pub struct Config {
    pub path: PathBuf,
    pub title: String,
    pub width: u32,
    pub height: u32,
    pub font: Option<PathBuf>,
    pub font_size: f32,
}

impl Config {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        let path = path.into();
        Self {
            title: format!("tadershoy - {}", path.display()),
            path,
            width: DEFAULT_WIDTH,
            height: DEFAULT_HEIGHT,
            font: None,
            font_size: DEFAULT_FONT_SIZE,
        }
    }

    /// Build a config from parsed arguments. `None` if no path was given.
    pub fn from_cli(cli: Cli) -> Option<Self> {
        let mut config = Self::new(cli.path?);
        config.width = cli.width;
        config.height = cli.height;
        config.font = cli.font;
        config.font_size = cli.font_size;
        Some(config)
    }

    /// Candidate font files, the explicit one first.
    pub fn font_candidates(&self) -> Vec<PathBuf> {
        self.font
            .iter()
            .cloned()
            .chain(SYSTEM_FONTS.iter().map(PathBuf::from))
            .collect()
    }
}
