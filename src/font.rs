//! Menu label rasterization with fontdue, fonts located through fontconfig

use anyhow::{Context, Result};
use fontconfig::{Fontconfig, Pattern};
use fontdue::{Font, FontSettings};
use std::ffi::CString;
use std::fs;
use std::path::PathBuf;
use tracing::{debug, info, warn};

/// Families asked from fontconfig, in order
const PREFERRED_FAMILIES: &[&str] = &["Sans", "DejaVu Sans", "Liberation Sans", "Noto Sans"];

/// Fallback locations when fontconfig has nothing usable
const FALLBACK_PATHS: &[&str] = &[
    "/usr/share/fonts/truetype/dejavu/DejaVuSans.ttf",
    "/usr/share/fonts/TTF/DejaVuSans.ttf",
    "/usr/share/fonts/dejavu/DejaVuSans.ttf",
    "/usr/share/fonts/truetype/liberation/LiberationSans-Regular.ttf",
    "/usr/share/fonts/liberation/LiberationSans-Regular.ttf",
    "/usr/share/fonts/noto/NotoSans-Regular.ttf",
];

/// Text as a premultiplied ARGB bitmap
pub struct RenderedText {
    pub width: usize,
    pub height: usize,
    pub data: Vec<u32>,
}

impl RenderedText {
    fn empty() -> Self {
        Self { width: 0, height: 0, data: Vec::new() }
    }

    pub fn is_empty(&self) -> bool {
        self.width == 0 || self.height == 0
    }

    /// Pixels as bytes in the X server's native order (little-endian BGRA)
    pub fn to_bgra_bytes(&self) -> Vec<u8> {
        self.data.iter().flat_map(|pixel| pixel.to_le_bytes()).collect()
    }
}

#[derive(Debug)]
pub struct FontRenderer {
    font: Font,
    size: f32,
}

/// Resolve a family name to a font file
pub fn find_font_path(family: &str) -> Result<PathBuf> {
    let fc = Fontconfig::new().context("Failed to initialize fontconfig")?;
    let mut pattern = Pattern::new(&fc);
    let family_cstr = CString::new(family)
        .with_context(|| format!("Invalid family name: {}", family))?;
    pattern.add_string(fontconfig::FC_FAMILY, &family_cstr);

    let matched = pattern.font_match();
    let path = matched
        .filename()
        .map(PathBuf::from)
        .with_context(|| format!("No font file found for '{}'", family))?;
    if !path.exists() {
        anyhow::bail!("Font file path '{}' does not exist", path.display());
    }
    debug!(family, path = %path.display(), "Resolved font via fontconfig");
    Ok(path)
}

impl FontRenderer {
    pub fn from_path(path: PathBuf, size: f32) -> Result<Self> {
        let font_data = fs::read(&path)
            .with_context(|| format!("Failed to read font file: {}", path.display()))?;
        let font = Font::from_bytes(font_data, FontSettings::default())
            .map_err(|e| anyhow::anyhow!("Failed to parse font {}: {}", path.display(), e))?;
        info!(path = %path.display(), size, "Loaded font");
        Ok(Self { font, size })
    }

    /// Load the desktop's sans font, then well-known paths
    pub fn from_system_font(size: f32) -> Result<Self> {
        for family in PREFERRED_FAMILIES {
            match find_font_path(family).and_then(|path| Self::from_path(path, size)) {
                Ok(renderer) => return Ok(renderer),
                Err(e) => debug!(family, error = ?e, "Font family unavailable"),
            }
        }

        for path in FALLBACK_PATHS {
            if let Ok(renderer) = Self::from_path(PathBuf::from(path), size) {
                return Ok(renderer);
            }
        }

        warn!("No TrueType font found, context menu falls back to the core X font");
        anyhow::bail!(
            "Could not find any system fonts. Tried families {:?} and paths {:?}",
            PREFERRED_FAMILIES,
            FALLBACK_PATHS
        )
    }

    /// Rasterize `text` in `fg_color` (straight ARGB) on a transparent background
    pub fn render_text(&self, text: &str, fg_color: u32) -> RenderedText {
        if text.is_empty() {
            return RenderedText::empty();
        }

        let mut glyphs = Vec::with_capacity(text.len());
        let mut pen = 0.0f32;
        let mut ascent = 0i32;
        let mut descent = 0i32;
        for ch in text.chars() {
            let (metrics, bitmap) = self.font.rasterize(ch, self.size);
            ascent = ascent.max(metrics.height as i32 + metrics.ymin);
            descent = descent.max(-metrics.ymin);
            glyphs.push((pen as i32 + metrics.xmin, metrics, bitmap));
            pen += metrics.advance_width;
        }

        let width = pen.ceil() as usize;
        let height = (ascent + descent).max(0) as usize;
        if width == 0 || height == 0 {
            return RenderedText::empty();
        }

        let [fg_b, fg_g, fg_r, fg_a] = fg_color.to_le_bytes().map(|c| c as f32 / 255.0);
        let mut data = vec![0u32; width * height];
        for (x_offset, metrics, bitmap) in glyphs {
            let top = ascent - (metrics.height as i32 + metrics.ymin);
            for gy in 0..metrics.height {
                for gx in 0..metrics.width {
                    let px = x_offset + gx as i32;
                    let py = top + gy as i32;
                    if px < 0 || py < 0 || px >= width as i32 || py >= height as i32 {
                        continue;
                    }
                    let coverage = bitmap[gy * metrics.width + gx] as f32 / 255.0;
                    if coverage > 0.0 {
                        let channel = |c: f32| (c * coverage * 255.0) as u32;
                        data[py as usize * width + px as usize] = (channel(fg_a) << 24)
                            | (channel(fg_r) << 16)
                            | (channel(fg_g) << 8)
                            | channel(fg_b);
                    }
                }
            }
        }

        RenderedText { width, height, data }
    }
}
