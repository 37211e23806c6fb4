use crate::buffer::GrowableBuffer;

/// Vertical distance between two lines of text, in pixels.
pub const LINE_HEIGHT: f32 = 20.0;

/// Color used for all overlay text.
pub const TEXT_COLOR: u32 = 0xFFFF_FFFF;

/// Half-transparent black behind the FPS readout.
pub const PANEL_COLOR: u32 = 0x0000_007F;

/// A rectangle in screen-space pixel coordinates (or atlas UV space).
#[derive(Clone, Copy, Debug, Default, PartialEq)]
pub struct Rect {
    pub x: f32,
    pub y: f32,
    pub width: f32,
    pub height: f32,
}

impl Rect {
    /// UV rect for quads drawn in a flat color. The overlay shader checks for
    /// a negative U and skips the atlas lookup.
    pub const UNTEXTURED: Rect = Rect::new(-1.0, -1.0, -1.0, -1.0);

    pub const fn new(x: f32, y: f32, width: f32, height: f32) -> Self {
        Self {
            x,
            y,
            width,
            height,
        }
    }

    pub fn is_untextured(&self) -> bool {
        self.x < 0.0
    }
}

/// Vertex for overlay quads. Color is packed as 0xRRGGBBAA.
#[repr(C)]
#[derive(Copy, Clone, Debug, PartialEq, bytemuck::Pod, bytemuck::Zeroable)]
pub struct Vertex {
    pub position: [f32; 2],
    pub uv: [f32; 2],
    pub color: u32,
}

impl Vertex {
    pub const LAYOUT: wgpu::VertexBufferLayout<'static> = wgpu::VertexBufferLayout {
        array_stride: std::mem::size_of::<Vertex>() as u64,
        step_mode: wgpu::VertexStepMode::Vertex,
        attributes: &[
            // position
            wgpu::VertexAttribute {
                offset: 0,
                shader_location: 0,
                format: wgpu::VertexFormat::Float32x2,
            },
            // uv
            wgpu::VertexAttribute {
                offset: 8,
                shader_location: 1,
                format: wgpu::VertexFormat::Float32x2,
            },
            // color
            wgpu::VertexAttribute {
                offset: 16,
                shader_location: 2,
                format: wgpu::VertexFormat::Uint32,
            },
        ],
    };

    fn new(x: f32, y: f32, u: f32, v: f32, color: u32) -> Self {
        Self {
            position: [x, y],
            uv: [u, v],
            color,
        }
    }
}

/// Placement and atlas location of one character.
#[derive(Clone, Copy, Debug, Default, PartialEq)]
pub struct Glyph {
    /// Horizontal offset from the pen position to the left edge of the bitmap.
    pub offset_x: f32,
    /// Distance from the baseline up to the top edge of the bitmap.
    pub offset_y: f32,
    /// How far to advance the pen after this glyph.
    pub advance: f32,
    pub width: f32,
    pub height: f32,
    /// Normalized rect in the atlas texture.
    pub uv: Rect,
}

/// Source of glyph metrics for [`QuadBatcher::push_text`].
///
/// Implementations must return a glyph for every character; characters the
/// font lacks map to a blank fallback.
pub trait GlyphLookup {
    fn glyph(&self, c: char) -> Glyph;
}

/// Immediate-mode batch of overlay quads for a single frame.
///
/// Every quad is stored as two triangles in one shared vertex stream. The
/// stream is meant to be submitted and then [`clear`](Self::clear)ed once per
/// frame; its allocation is reused.
#[derive(Default)]
pub struct QuadBatcher {
    vertices: GrowableBuffer<Vertex>,
}

impl QuadBatcher {
    pub fn new() -> Self {
        Self::default()
    }

    /// Append one quad as six vertices: top-left, top-right, bottom-right,
    /// bottom-right, bottom-left, top-left.
    pub fn push_quad(&mut self, rect: Rect, uv: Rect, color: u32) {
        let (x0, y0) = (rect.x, rect.y);
        let (x1, y1) = (rect.x + rect.width, rect.y + rect.height);
        let (u0, v0) = (uv.x, uv.y);
        let (u1, v1) = (uv.x + uv.width, uv.y + uv.height);

        self.vertices.push_back(Vertex::new(x0, y0, u0, v0, color));
        self.vertices.push_back(Vertex::new(x1, y0, u1, v0, color));
        self.vertices.push_back(Vertex::new(x1, y1, u1, v1, color));

        self.vertices.push_back(Vertex::new(x1, y1, u1, v1, color));
        self.vertices.push_back(Vertex::new(x0, y1, u0, v1, color));
        self.vertices.push_back(Vertex::new(x0, y0, u0, v0, color));
    }

    /// Lay out `text` starting with the pen at (`x`, `y`), where `y` is the
    /// baseline of the first line.
    ///
    /// Each byte is treated as one character. A newline returns the pen to
    /// `x` and moves it down by [`LINE_HEIGHT`].
    pub fn push_text(&mut self, glyphs: &impl GlyphLookup, text: &[u8], x: f32, y: f32) {
        let mut pen_x = x;
        let mut pen_y = y;

        for &byte in text {
            if byte == b'\n' {
                pen_x = x;
                pen_y += LINE_HEIGHT;
                continue;
            }

            let glyph = glyphs.glyph(char::from(byte));
            let rect = Rect::new(
                pen_x + glyph.offset_x,
                pen_y - glyph.offset_y,
                glyph.width,
                glyph.height,
            );
            self.push_quad(rect, glyph.uv, TEXT_COLOR);
            pen_x += glyph.advance;
        }
    }

    pub fn vertices(&self) -> &[Vertex] {
        &self.vertices
    }

    /// Drop this frame's quads, keeping the allocation.
    pub fn clear(&mut self) {
        self.vertices.clear();
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    /// Monospace test font: every glyph is 8x10 and sits on the baseline.
    struct FixedGlyphs;

    impl GlyphLookup for FixedGlyphs {
        fn glyph(&self, c: char) -> Glyph {
            let index = c as u32 as f32;
            Glyph {
                offset_x: 1.0,
                offset_y: 10.0,
                advance: 9.0,
                width: 8.0,
                height: 10.0,
                uv: Rect::new(index / 256.0, 0.0, 1.0 / 256.0, 1.0),
            }
        }
    }

    fn cross(a: [f32; 2], b: [f32; 2], c: [f32; 2]) -> f32 {
        (b[0] - a[0]) * (c[1] - a[1]) - (b[1] - a[1]) * (c[0] - a[0])
    }

    #[test]
    fn default_glyph_is_blank() {
        let glyph = Glyph::default();
        assert_eq!(glyph.uv, Rect::new(0.0, 0.0, 0.0, 0.0));
        assert_eq!(glyph.advance, 0.0);
        assert!(!glyph.uv.is_untextured());
    }

    #[test]
    fn push_quad_emits_six_vertices_in_order() {
        let mut batch = QuadBatcher::new();
        batch.push_quad(
            Rect::new(10.0, 20.0, 30.0, 40.0),
            Rect::new(0.25, 0.5, 0.25, 0.5),
            0x11223344,
        );

        let positions: Vec<[f32; 2]> = batch.vertices().iter().map(|v| v.position).collect();
        assert_eq!(
            positions,
            vec![
                [10.0, 20.0],
                [40.0, 20.0],
                [40.0, 60.0],
                [40.0, 60.0],
                [10.0, 60.0],
                [10.0, 20.0],
            ]
        );

        let uvs: Vec<[f32; 2]> = batch.vertices().iter().map(|v| v.uv).collect();
        assert_eq!(
            uvs,
            vec![
                [0.25, 0.5],
                [0.5, 0.5],
                [0.5, 1.0],
                [0.5, 1.0],
                [0.25, 1.0],
                [0.25, 0.5],
            ]
        );
        assert!(batch.vertices().iter().all(|v| v.color == 0x11223344));
    }

    #[test]
    fn push_quad_triangles_share_winding() {
        let mut batch = QuadBatcher::new();
        batch.push_quad(Rect::new(-5.0, 3.0, 7.0, 2.0), Rect::UNTEXTURED, PANEL_COLOR);

        let v = batch.vertices();
        let first = cross(v[0].position, v[1].position, v[2].position);
        let second = cross(v[3].position, v[4].position, v[5].position);
        assert!(first != 0.0);
        assert_eq!(first.signum(), second.signum());
    }

    #[test]
    fn untextured_uvs_stay_negative() {
        let mut batch = QuadBatcher::new();
        batch.push_quad(Rect::new(0.0, 0.0, 90.0, 18.0), Rect::UNTEXTURED, PANEL_COLOR);

        assert!(Rect::UNTEXTURED.is_untextured());
        assert!(batch.vertices().iter().all(|v| v.uv[0] < 0.0));
    }

    #[test]
    fn push_text_advances_pen() {
        let mut batch = QuadBatcher::new();
        batch.push_text(&FixedGlyphs, b"ab", 100.0, 50.0);

        let v = batch.vertices();
        assert_eq!(v.len(), 12);
        assert_eq!(v[0].position, [101.0, 40.0]);
        assert_eq!(v[6].position, [110.0, 40.0]);
        assert!(v.iter().all(|v| v.color == TEXT_COLOR));
        assert_eq!(v[6].uv[0], 'b' as u32 as f32 / 256.0);
    }

    #[test]
    fn newline_resets_to_origin_and_moves_down() {
        let mut batch = QuadBatcher::new();
        batch.push_text(&FixedGlyphs, b"xyz\nw\n\nq", 4.0, 14.0);

        let v = batch.vertices();
        // Newlines produce no geometry.
        assert_eq!(v.len(), 5 * 6);

        // 'w' starts the second line at the origin.
        assert_eq!(v[18].position, [5.0, 14.0 + LINE_HEIGHT - 10.0]);
        // 'q' sits two line heights further down.
        assert_eq!(v[24].position, [5.0, 14.0 + 3.0 * LINE_HEIGHT - 10.0]);
    }

    #[test]
    fn clear_keeps_allocation() {
        let mut batch = QuadBatcher::new();
        batch.push_text(&FixedGlyphs, b"some diagnostic text", 0.0, 14.0);
        let ptr = batch.vertices().as_ptr();

        batch.clear();
        assert!(batch.vertices().is_empty());

        batch.push_quad(Rect::new(0.0, 0.0, 1.0, 1.0), Rect::UNTEXTURED, PANEL_COLOR);
        assert_eq!(batch.vertices().as_ptr(), ptr);
    }
}
