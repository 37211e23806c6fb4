use std::collections::HashMap;
use std::path::PathBuf;

use fontdue::{Font, FontSettings};

use crate::draw2d::{Glyph, GlyphLookup, Rect};
use crate::gpu::GpuContext;

/// Character used for anything the atlas does not contain.
const FALLBACK_CHAR: char = ' ';

/// Glyph metrics for the printable ASCII range, with a blank fallback.
#[derive(Debug, Default, Clone)]
pub struct GlyphTable {
    glyphs: HashMap<char, Glyph>,
    fallback: Glyph,
}

impl GlyphTable {
    pub fn new(glyphs: HashMap<char, Glyph>) -> Self {
        let fallback = glyphs.get(&FALLBACK_CHAR).copied().unwrap_or_default();
        Self { glyphs, fallback }
    }

    pub fn len(&self) -> usize {
        self.glyphs.len()
    }

    pub fn is_empty(&self) -> bool {
        self.glyphs.is_empty()
    }
}

impl GlyphLookup for GlyphTable {
    fn glyph(&self, c: char) -> Glyph {
        self.glyphs.get(&c).copied().unwrap_or(self.fallback)
    }
}

/// Single-channel coverage bitmap with every glyph packed into rows.
pub struct AtlasBitmap {
    pub width: u32,
    pub height: u32,
    pub data: Vec<u8>,
    pub table: GlyphTable,
}

impl AtlasBitmap {
    /// A 1x1 blank atlas where every character maps to an empty glyph.
    pub fn empty() -> Self {
        Self {
            width: 1,
            height: 1,
            data: vec![0],
            table: GlyphTable::default(),
        }
    }

    /// Rasterize printable ASCII from `font` at `size` pixels.
    pub fn rasterize(font: &Font, size: f32) -> Self {
        let rasterized: Vec<(char, fontdue::Metrics, Vec<u8>)> = (32u8..=126u8)
            .map(char::from)
            .map(|c| {
                let (metrics, bitmap) = font.rasterize(c, size);
                (c, metrics, bitmap)
            })
            .collect();

        let padding = 1u32;
        let mut width = 256u32;
        let mut height = 256u32;

        // Grow the smaller side until a simple row packing fits.
        while !Self::fits(&rasterized, width, height, padding) {
            if width <= height {
                width *= 2;
            } else {
                height *= 2;
            }
        }

        let mut data = vec![0u8; (width * height) as usize];
        let mut glyphs = HashMap::new();

        let mut x = padding;
        let mut y = padding;
        let mut row_height = 0u32;

        for (c, metrics, bitmap) in &rasterized {
            let glyph_w = metrics.width as u32;
            let glyph_h = metrics.height as u32;

            if x + glyph_w + padding > width {
                x = padding;
                y += row_height + padding;
                row_height = 0;
            }

            for gy in 0..glyph_h {
                let src = (gy * glyph_w) as usize;
                let dst = ((y + gy) * width + x) as usize;
                data[dst..dst + glyph_w as usize]
                    .copy_from_slice(&bitmap[src..src + glyph_w as usize]);
            }

            glyphs.insert(
                *c,
                Glyph {
                    offset_x: metrics.xmin as f32,
                    // fontdue's ymin is the bottom edge relative to the baseline.
                    offset_y: metrics.ymin as f32 + glyph_h as f32,
                    advance: metrics.advance_width,
                    width: glyph_w as f32,
                    height: glyph_h as f32,
                    uv: Rect::new(
                        x as f32 / width as f32,
                        y as f32 / height as f32,
                        glyph_w as f32 / width as f32,
                        glyph_h as f32 / height as f32,
                    ),
                },
            );

            x += glyph_w + padding;
            row_height = row_height.max(glyph_h);
        }

        Self {
            width,
            height,
            data,
            table: GlyphTable::new(glyphs),
        }
    }

    fn fits(glyphs: &[(char, fontdue::Metrics, Vec<u8>)], width: u32, height: u32, padding: u32) -> bool {
        let mut x = padding;
        let mut y = padding;
        let mut row_height = 0u32;

        for (_, metrics, _) in glyphs {
            let glyph_w = metrics.width as u32;
            let glyph_h = metrics.height as u32;

            if x + glyph_w + padding > width {
                x = padding;
                y += row_height + padding;
                row_height = 0;
            }
            if y + glyph_h + padding > height {
                return false;
            }

            x += glyph_w + padding;
            row_height = row_height.max(glyph_h);
        }
        true
    }
}

/// Read the first font file in `candidates` that exists and parses.
pub fn load_font(candidates: &[PathBuf]) -> Option<Font> {
    for path in candidates {
        let Ok(data) = std::fs::read(path) else {
            continue;
        };
        match Font::from_bytes(data, FontSettings::default()) {
            Ok(font) => {
                log::info!("overlay font: {}", path.display());
                return Some(font);
            }
            Err(e) => log::warn!("cannot parse font {}: {}", path.display(), e),
        }
    }
    None
}

/// Glyph atlas uploaded to the GPU, sampled by the overlay pass.
pub struct FontAtlas {
    pub texture: wgpu::Texture,
    pub view: wgpu::TextureView,
    pub sampler: wgpu::Sampler,
    table: GlyphTable,
}

impl FontAtlas {
    pub fn new(gpu: &GpuContext, bitmap: AtlasBitmap) -> Self {
        let size = wgpu::Extent3d {
            width: bitmap.width,
            height: bitmap.height,
            depth_or_array_layers: 1,
        };

        let texture = gpu.device.create_texture(&wgpu::TextureDescriptor {
            label: Some("Font Atlas"),
            size,
            mip_level_count: 1,
            sample_count: 1,
            dimension: wgpu::TextureDimension::D2,
            format: wgpu::TextureFormat::R8Unorm,
            usage: wgpu::TextureUsages::TEXTURE_BINDING | wgpu::TextureUsages::COPY_DST,
            view_formats: &[],
        });

        gpu.queue.write_texture(
            wgpu::TexelCopyTextureInfo {
                texture: &texture,
                mip_level: 0,
                origin: wgpu::Origin3d::ZERO,
                aspect: wgpu::TextureAspect::All,
            },
            &bitmap.data,
            wgpu::TexelCopyBufferLayout {
                offset: 0,
                bytes_per_row: Some(bitmap.width),
                rows_per_image: Some(bitmap.height),
            },
            size,
        );

        let view = texture.create_view(&wgpu::TextureViewDescriptor::default());

        let sampler = gpu.device.create_sampler(&wgpu::SamplerDescriptor {
            label: Some("Font Sampler"),
            address_mode_u: wgpu::AddressMode::ClampToEdge,
            address_mode_v: wgpu::AddressMode::ClampToEdge,
            address_mode_w: wgpu::AddressMode::ClampToEdge,
            mag_filter: wgpu::FilterMode::Linear,
            min_filter: wgpu::FilterMode::Linear,
            ..Default::default()
        });

        Self {
            texture,
            view,
            sampler,
            table: bitmap.table,
        }
    }
}

impl GlyphLookup for FontAtlas {
    fn glyph(&self, c: char) -> Glyph {
        self.table.glyph(c)
    }
}
