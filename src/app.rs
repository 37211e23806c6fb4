use std::fmt::Write as _;
use std::sync::Arc;
use std::time::Instant;

use glam::Vec2;
use winit::application::ApplicationHandler;
use winit::event::WindowEvent;
use winit::event_loop::{ActiveEventLoop, ControlFlow, EventLoop};
use winit::window::{Window, WindowAttributes, WindowId};

use crate::assets::{AtlasBitmap, FontAtlas, load_font};
use crate::compiler::{FILE_TEMPLATE, WgpuBackend};
use crate::config::Config;
use crate::draw2d::{GlyphLookup, PANEL_COLOR, QuadBatcher, Rect};
use crate::effect_pass::{ImagePass, ImageUniforms};
use crate::error::InitError;
use crate::gpu::GpuContext;
use crate::hot_shader::HotReloadController;
use crate::input::Input;
use crate::overlay::OverlayPass;
use crate::watcher::{self, POLL_INTERVAL_FRAMES};

/// Pen position for the first line of overlay text.
const TEXT_ORIGIN: (f32, f32) = (0.0, 14.0);

/// Background behind the FPS readout.
const FPS_PANEL: Rect = Rect::new(0.0, 0.0, 90.0, 18.0);

/// Open a window on `config.path` and run until the window is closed.
///
/// The watched file is created from the template first if it is missing.
pub fn run(config: Config) -> Result<(), InitError> {
    match watcher::ensure_exists(&config.path, FILE_TEMPLATE) {
        Ok(true) => log::info!("created {} from template", config.path.display()),
        Ok(false) => {}
        Err(e) => log::warn!("cannot create {}: {}", config.path.display(), e),
    }

    let event_loop = EventLoop::new()?;
    event_loop.set_control_flow(ControlFlow::Poll);

    let mut app = PreviewApp::Pending { config };
    event_loop.run_app(&mut app)?;

    match app {
        PreviewApp::Failed(error) => Err(error),
        _ => Ok(()),
    }
}

/// Frame timing and the poll cadence of the watched file.
struct FrameClock {
    last: Instant,
    elapsed: f64,
    frame: i32,
    since_poll: u32,
}

impl FrameClock {
    fn new(now: Instant) -> Self {
        Self {
            last: now,
            elapsed: 0.0,
            frame: 0,
            // Poll on the very first frame.
            since_poll: POLL_INTERVAL_FRAMES,
        }
    }

    /// Whether the watched file should be checked this frame.
    fn poll_due(&mut self) -> bool {
        if self.since_poll >= POLL_INTERVAL_FRAMES {
            self.since_poll = 0;
            true
        } else {
            false
        }
    }

    /// Advance to `now` and return the frame delta in seconds.
    fn tick(&mut self, now: Instant) -> f32 {
        let dt = now.duration_since(self.last).as_secs_f64();
        self.last = now;

        self.elapsed += dt;
        if self.elapsed > f32::MAX as f64 {
            self.elapsed -= f32::MAX as f64;
        }
        dt as f32
    }

    fn end_frame(&mut self) {
        self.frame = self.frame.wrapping_add(1);
        self.since_poll += 1;
    }
}

enum PreviewApp {
    Pending { config: Config },
    Running(Box<Preview>),
    Failed(InitError),
}

/// Everything owned by a running previewer.
struct Preview {
    controller: HotReloadController<WgpuBackend>,
    image: ImagePass,
    overlay: OverlayPass,
    atlas: FontAtlas,
    batch: QuadBatcher,
    input: Input,
    clock: FrameClock,
    fps_text: String,
    gpu: GpuContext,
    window: Arc<Window>,
}

impl Preview {
    fn new(event_loop: &ActiveEventLoop, config: &Config) -> Result<Self, InitError> {
        let window_attrs = WindowAttributes::default()
            .with_title(&config.title)
            .with_inner_size(winit::dpi::LogicalSize::new(config.width, config.height));
        let window = Arc::new(event_loop.create_window(window_attrs)?);

        let gpu = GpuContext::new(window.clone())?;

        let bitmap = match load_font(&config.font_candidates()) {
            Some(font) => AtlasBitmap::rasterize(&font, config.font_size),
            None => {
                log::warn!("no usable overlay font found, text will be blank (see --font)");
                AtlasBitmap::empty()
            }
        };
        let atlas = FontAtlas::new(&gpu, bitmap);
        let overlay = OverlayPass::new(&gpu, &atlas)?;

        let image = ImagePass::new(&gpu);
        let controller = HotReloadController::new(image.backend(&gpu), &config.path)?;

        window.request_redraw();

        Ok(Self {
            controller,
            image,
            overlay,
            atlas,
            batch: QuadBatcher::new(),
            input: Input::new(),
            clock: FrameClock::new(Instant::now()),
            fps_text: String::new(),
            gpu,
            window,
        })
    }

    fn frame(&mut self) -> Result<(), InitError> {
        if self.clock.poll_due() {
            self.controller.poll();
        }
        let dt = self.clock.tick(Instant::now());

        let result = self.draw(dt);

        self.batch.clear();
        self.clock.end_frame();
        result
    }

    fn draw(&mut self, dt: f32) -> Result<(), InitError> {
        let output = match self.gpu.surface.get_current_texture() {
            Ok(output) => output,
            Err(wgpu::SurfaceError::Lost | wgpu::SurfaceError::Outdated) => {
                self.gpu.reconfigure();
                return Ok(());
            }
            Err(wgpu::SurfaceError::OutOfMemory) => return Err(InitError::OutOfMemory),
            Err(e) => {
                log::warn!("skipping frame: {}", e);
                return Ok(());
            }
        };
        let view = output
            .texture
            .create_view(&wgpu::TextureViewDescriptor::default());

        build_overlay(
            &mut self.batch,
            &self.atlas,
            self.controller.program().is_some(),
            self.controller.log(),
            dt,
            &mut self.fps_text,
        );

        let mut encoder = self
            .gpu
            .device
            .create_command_encoder(&wgpu::CommandEncoderDescriptor {
                label: Some("Preview Encoder"),
            });

        {
            let mut render_pass = encoder.begin_render_pass(&wgpu::RenderPassDescriptor {
                label: Some("Preview Pass"),
                color_attachments: &[Some(wgpu::RenderPassColorAttachment {
                    view: &view,
                    resolve_target: None,
                    ops: wgpu::Operations {
                        load: wgpu::LoadOp::Clear(wgpu::Color::BLACK),
                        store: wgpu::StoreOp::Store,
                    },
                    depth_slice: None,
                })],
                depth_stencil_attachment: None,
                timestamp_writes: None,
                occlusion_query_set: None,
            });

            if let Some(program) = self.controller.program() {
                let uniforms = ImageUniforms::new(
                    Vec2::new(self.gpu.width() as f32, self.gpu.height() as f32),
                    self.clock.elapsed as f32,
                    dt,
                    self.clock.frame,
                    self.input.mouse_position(),
                );
                self.image
                    .render(&self.gpu, &mut render_pass, program, &uniforms);
            }

            self.overlay
                .render(&self.gpu, &mut render_pass, self.batch.vertices());
        }

        self.gpu.queue.submit(std::iter::once(encoder.finish()));
        output.present();
        Ok(())
    }
}

/// Lay out this frame's overlay: the FPS panel while a program is active,
/// otherwise the diagnostic log. `fps_text` is scratch space reused across
/// frames.
fn build_overlay(
    batch: &mut QuadBatcher,
    glyphs: &impl GlyphLookup,
    program_active: bool,
    log: &[u8],
    dt: f32,
    fps_text: &mut String,
) {
    let (text_x, text_y) = TEXT_ORIGIN;
    if program_active {
        fps_text.clear();
        let _ = write!(fps_text, "FPS: {:.3}", 1.0 / dt);
        batch.push_quad(FPS_PANEL, Rect::UNTEXTURED, PANEL_COLOR);
        batch.push_text(glyphs, fps_text.as_bytes(), text_x, text_y);
    } else {
        batch.push_text(glyphs, log, text_x, text_y);
    }
}

impl ApplicationHandler for PreviewApp {
    fn resumed(&mut self, event_loop: &ActiveEventLoop) {
        let PreviewApp::Pending { config } = self else {
            return;
        };

        match Preview::new(event_loop, config) {
            Ok(preview) => *self = PreviewApp::Running(Box::new(preview)),
            Err(error) => {
                *self = PreviewApp::Failed(error);
                event_loop.exit();
            }
        }
    }

    fn window_event(&mut self, event_loop: &ActiveEventLoop, _id: WindowId, event: WindowEvent) {
        let PreviewApp::Running(preview) = self else {
            return;
        };

        preview.input.handle_event(&event);

        match event {
            WindowEvent::CloseRequested => {
                event_loop.exit();
            }
            WindowEvent::Resized(size) => {
                preview.gpu.resize(size.width, size.height);
            }
            WindowEvent::RedrawRequested => match preview.frame() {
                Ok(()) => preview.window.request_redraw(),
                Err(error) => {
                    *self = PreviewApp::Failed(error);
                    event_loop.exit();
                }
            },
            _ => {}
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::draw2d::{Glyph, LINE_HEIGHT, TEXT_COLOR};
    use std::time::Duration;

    /// Every glyph is 8x10, sits on the baseline and advances 9px.
    struct FixedGlyphs;

    impl GlyphLookup for FixedGlyphs {
        fn glyph(&self, _c: char) -> Glyph {
            Glyph {
                offset_x: 1.0,
                offset_y: 10.0,
                advance: 9.0,
                width: 8.0,
                height: 10.0,
                uv: Rect::new(0.0, 0.0, 0.5, 0.5),
            }
        }
    }

    #[test]
    fn active_program_shows_fps_panel() {
        let mut batch = QuadBatcher::new();
        let mut fps_text = String::new();

        build_overlay(&mut batch, &FixedGlyphs, true, b"stale log", 0.5, &mut fps_text);

        assert_eq!(fps_text, "FPS: 2.000");
        let vertices = batch.vertices();
        assert_eq!(vertices.len(), 6 * (1 + fps_text.len()));

        let panel = &vertices[..6];
        assert!(panel.iter().all(|v| v.color == PANEL_COLOR));
        assert!(panel.iter().all(|v| v.uv[0] < 0.0));
        assert_eq!(panel[0].position, [0.0, 0.0]);
        assert_eq!(panel[2].position, [90.0, 18.0]);

        let text = &vertices[6..];
        assert!(text.iter().all(|v| v.color == TEXT_COLOR));
        // First glyph: pen at (0, 14), offset (1, 10).
        assert_eq!(text[0].position, [1.0, 4.0]);
    }

    #[test]
    fn missing_program_shows_log_text() {
        let mut batch = QuadBatcher::new();
        let mut fps_text = String::new();

        build_overlay(&mut batch, &FixedGlyphs, false, b"ab\nc", 0.5, &mut fps_text);

        assert!(fps_text.is_empty());
        let vertices = batch.vertices();
        assert_eq!(vertices.len(), 6 * 3);
        assert!(vertices.iter().all(|v| v.color == TEXT_COLOR));
        assert!(vertices.iter().all(|v| v.uv[0] >= 0.0));

        assert_eq!(vertices[0].position, [1.0, 4.0]);
        assert_eq!(vertices[6].position, [10.0, 4.0]);
        assert_eq!(vertices[12].position, [1.0, 4.0 + LINE_HEIGHT]);
    }

    #[test]
    fn polls_on_first_frame_then_every_interval() {
        let mut clock = FrameClock::new(Instant::now());

        let mut polled = Vec::new();
        for frame in 0..25 {
            if clock.poll_due() {
                polled.push(frame);
            }
            clock.end_frame();
        }

        let n = POLL_INTERVAL_FRAMES as i32;
        assert_eq!(polled, vec![0, n, 2 * n]);
        assert_eq!(clock.frame, 25);
    }

    #[test]
    fn tick_accumulates_elapsed_time() {
        let start = Instant::now();
        let mut clock = FrameClock::new(start);

        let dt = clock.tick(start + Duration::from_millis(250));
        assert!((dt - 0.25).abs() < 1e-6);

        clock.tick(start + Duration::from_millis(1000));
        assert!((clock.elapsed - 1.0).abs() < 1e-9);
    }
}
