//! Built-in shader passes.

use std::fmt::Write as _;
use std::sync::{Arc, OnceLock};

use anyhow::Context as _;
use image::{Rgba, Rgba32FImage};
use resvg::tiny_skia::{Pixmap, Transform};

use crate::device::Shader;
use crate::foundation::core::{TextureDesc, TextureFormat, TextureSize};
use crate::foundation::error::{ChainError, ChainResult};

fn expect_inputs(name: &str, inputs: usize, want: usize) -> ChainResult<()> {
    if inputs != want {
        return Err(ChainError::configuration(format!(
            "{name} expects {want} input(s), got {inputs}"
        )));
    }
    Ok(())
}

/// 2x nearest-neighbour enlargement.
#[derive(Clone, Copy, Debug, Default)]
pub struct DoubleSize;

impl Shader for DoubleSize {
    fn name(&self) -> &str {
        "DoubleSize"
    }

    fn output_desc(&self, inputs: &[TextureDesc]) -> ChainResult<TextureDesc> {
        expect_inputs(self.name(), inputs.len(), 1)?;
        Ok(inputs[0].with_size(inputs[0].size.scaled(2)))
    }

    fn execute_cpu(&self, inputs: &[&Rgba32FImage], output: &mut Rgba32FImage) -> ChainResult<()> {
        expect_inputs(self.name(), inputs.len(), 1)?;
        let src = inputs[0];
        for (x, y, px) in output.enumerate_pixels_mut() {
            let sx = (x / 2).min(src.width().saturating_sub(1));
            let sy = (y / 2).min(src.height().saturating_sub(1));
            *px = *src.get_pixel(sx, sy);
        }
        Ok(())
    }
}

/// Merge a luma plane and a chroma plane of the same size into RGB (BT.709).
///
/// Chroma is stored offset by 0.5 in the red/green channels of the second input.
#[derive(Clone, Copy, Debug, Default)]
pub struct YuvToRgb;

impl Shader for YuvToRgb {
    fn name(&self) -> &str {
        "YuvToRgb"
    }

    fn output_desc(&self, inputs: &[TextureDesc]) -> ChainResult<TextureDesc> {
        expect_inputs(self.name(), inputs.len(), 2)?;
        if inputs[0].size != inputs[1].size {
            return Err(ChainError::configuration(format!(
                "luma {} and chroma {} must have the same size",
                inputs[0].size, inputs[1].size
            )));
        }
        Ok(TextureDesc::new(inputs[0].size, TextureFormat::Rgba32F))
    }

    fn execute_cpu(&self, inputs: &[&Rgba32FImage], output: &mut Rgba32FImage) -> ChainResult<()> {
        expect_inputs(self.name(), inputs.len(), 2)?;
        let (luma, chroma) = (inputs[0], inputs[1]);
        for (x, y, px) in output.enumerate_pixels_mut() {
            let l = luma.get_pixel(x, y).0[0];
            let c = chroma.get_pixel(x, y).0;
            let cb = c[0] - 0.5;
            let cr = c[1] - 0.5;
            *px = Rgba([
                l + 1.5748 * cr,
                l - 0.1873 * cb - 0.4681 * cr,
                l + 1.8556 * cb,
                1.0,
            ]);
        }
        Ok(())
    }
}

/// Contents of a generated 3D lookup table.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, serde::Serialize, serde::Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum LutMode {
    /// Output equals input.
    #[default]
    Identity,
    /// Rotate channels: red takes blue, green takes red, blue takes green.
    ChannelSwap,
}

impl std::fmt::Display for LutMode {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Identity => f.write_str("identity"),
            Self::ChannelSwap => f.write_str("channel_swap"),
        }
    }
}

/// Generates an `n x n x n` lookup table laid out as an `(n * n) x n` strip:
/// texel `(r + b * n, g)` holds the mapped colour of grid point `(r, g, b)`.
#[derive(Clone, Copy, Debug)]
pub struct LutTable {
    size: u32,
    mode: LutMode,
}

impl LutTable {
    pub fn new(size: u32, mode: LutMode) -> ChainResult<Self> {
        if !(2..=64).contains(&size) {
            return Err(ChainError::configuration(format!(
                "lut size must be within 2..=64, got {size}"
            )));
        }
        Ok(Self { size, mode })
    }

    pub fn desc(&self) -> ChainResult<TextureDesc> {
        Ok(TextureDesc::new(
            TextureSize::new(self.size * self.size, self.size)?,
            TextureFormat::Rgba32F,
        ))
    }
}

impl Shader for LutTable {
    fn name(&self) -> &str {
        "LutTable"
    }

    fn output_desc(&self, inputs: &[TextureDesc]) -> ChainResult<TextureDesc> {
        expect_inputs(self.name(), inputs.len(), 0)?;
        self.desc()
    }

    fn execute_cpu(&self, _inputs: &[&Rgba32FImage], output: &mut Rgba32FImage) -> ChainResult<()> {
        let n = self.size;
        let step = 1.0 / (n - 1) as f32;
        for (x, g, px) in output.enumerate_pixels_mut() {
            let r = (x % n) as f32 * step;
            let b = (x / n) as f32 * step;
            let g = g as f32 * step;
            *px = match self.mode {
                LutMode::Identity => Rgba([r, g, b, 1.0]),
                LutMode::ChannelSwap => Rgba([b, r, g, 1.0]),
            };
        }
        Ok(())
    }
}

/// Applies a lookup table produced by [`LutTable`] (second input) to an image (first input).
#[derive(Clone, Copy, Debug, Default)]
pub struct Lut3d;

impl Shader for Lut3d {
    fn name(&self) -> &str {
        "Lut3D"
    }

    fn output_desc(&self, inputs: &[TextureDesc]) -> ChainResult<TextureDesc> {
        expect_inputs(self.name(), inputs.len(), 2)?;
        let lut = inputs[1].size;
        if lut.width != lut.height.saturating_mul(lut.height) {
            return Err(ChainError::configuration(format!(
                "lut texture {lut} is not an (n*n)xn strip"
            )));
        }
        Ok(inputs[0])
    }

    fn execute_cpu(&self, inputs: &[&Rgba32FImage], output: &mut Rgba32FImage) -> ChainResult<()> {
        expect_inputs(self.name(), inputs.len(), 2)?;
        let (src, lut) = (inputs[0], inputs[1]);
        let n = lut.height();
        let max = (n - 1) as f32;
        let index = |v: f32| ((v.clamp(0.0, 1.0) * max).round() as u32).min(n - 1);
        for (x, y, px) in output.enumerate_pixels_mut() {
            let [r, g, b, a] = src.get_pixel(x, y).0;
            let mapped = lut.get_pixel(index(r) + index(b) * n, index(g)).0;
            *px = Rgba([mapped[0], mapped[1], mapped[2], a]);
        }
        Ok(())
    }
}

/// Striped warning card with the error text laid over it; shown in place of a failed chain.
///
/// The text layer is rasterized once, when the card is built. Each line sits on a dark panel
/// sized to its length so the message stays legible over the stripes.
#[derive(Clone, Debug)]
pub struct ErrorCard {
    size: TextureSize,
    text: Pixmap,
}

impl ErrorCard {
    pub const BACKGROUND: [f32; 4] = [0.35, 0.02, 0.02, 1.0];
    pub const STRIPE: [f32; 4] = [0.9, 0.75, 0.1, 1.0];

    pub fn new(size: TextureSize, message: &str) -> ChainResult<Self> {
        let svg = text_layer_svg(size, message);
        let opts = usvg::Options {
            fontdb: system_fonts(),
            ..Default::default()
        };
        let tree = usvg::Tree::from_str(&svg, &opts).context("parse error card text layer")?;
        let mut text = Pixmap::new(size.width, size.height).ok_or_else(|| {
            ChainError::configuration(format!("error card {size} cannot be rasterized"))
        })?;
        resvg::render(&tree, Transform::default(), &mut text.as_mut());
        Ok(Self { size, text })
    }
}

impl Shader for ErrorCard {
    fn name(&self) -> &str {
        "ErrorCard"
    }

    fn output_desc(&self, inputs: &[TextureDesc]) -> ChainResult<TextureDesc> {
        expect_inputs(self.name(), inputs.len(), 0)?;
        Ok(TextureDesc::new(self.size, TextureFormat::Rgba32F))
    }

    fn execute_cpu(&self, _inputs: &[&Rgba32FImage], output: &mut Rgba32FImage) -> ChainResult<()> {
        let band = (self.size.height / 8).max(1);
        for (x, y, px) in output.enumerate_pixels_mut() {
            let stripe = ((x + y) / band) % 4 == 0;
            let base = if stripe { Self::STRIPE } else { Self::BACKGROUND };
            *px = match self.text.pixel(x, y) {
                Some(c) if c.alpha() > 0 => {
                    // Premultiplied source over an opaque base.
                    let a = f32::from(c.alpha()) / 255.0;
                    let over = |v: u8, b: f32| f32::from(v) / 255.0 + b * (1.0 - a);
                    Rgba([
                        over(c.red(), base[0]),
                        over(c.green(), base[1]),
                        over(c.blue(), base[2]),
                        1.0,
                    ])
                }
                _ => Rgba(base),
            };
        }
        Ok(())
    }
}

fn system_fonts() -> Arc<usvg::fontdb::Database> {
    static FONTS: OnceLock<Arc<usvg::fontdb::Database>> = OnceLock::new();
    FONTS
        .get_or_init(|| {
            let mut db = usvg::fontdb::Database::new();
            db.load_system_fonts();
            tracing::debug!(faces = db.faces().count(), "loaded fonts for the error card");
            Arc::new(db)
        })
        .clone()
}

/// SVG for the text layer: one panel and one `<text>` per message line, clipped to the card
/// minus a margin so the outer border keeps the bare stripes.
fn text_layer_svg(size: TextureSize, message: &str) -> String {
    let (w, h) = (size.width as f32, size.height as f32);
    let margin = (size.height / 16).max(1) as f32;
    let font_size = (h / 24.0).max(6.0);
    let line_height = font_size * 1.25;
    let inner_w = (w - 2.0 * margin).max(0.0);
    let inner_h = (h - 2.0 * margin).max(0.0);

    let mut svg = format!(
        r#"<svg xmlns="http://www.w3.org/2000/svg" width="{w}" height="{h}" viewBox="0 0 {w} {h}">"#
    );
    let _ = write!(
        svg,
        r#"<defs><clipPath id="card"><rect x="{margin}" y="{margin}" width="{inner_w}" height="{inner_h}"/></clipPath></defs>"#
    );
    let _ = write!(
        svg,
        r#"<g clip-path="url(#card)" font-family="DejaVu Sans Mono, Liberation Mono, monospace" font-size="{font_size}">"#
    );
    for (row, line) in message.lines().enumerate() {
        let top = margin + row as f32 * line_height;
        if top >= h - margin {
            break;
        }
        let chars = line.chars().filter(|c| !c.is_control()).count();
        if chars == 0 {
            continue;
        }
        let width = (chars as f32 * font_size * 0.6).min(inner_w);
        let _ = write!(
            svg,
            r#"<rect x="{margin}" y="{top}" width="{width}" height="{line_height}" fill="black" fill-opacity="0.6"/>"#
        );
        let _ = write!(
            svg,
            r#"<text x="{margin}" y="{baseline}" fill="white" xml:space="preserve">{text}</text>"#,
            baseline = top + font_size,
            text = escape_xml(line),
        );
    }
    svg.push_str("</g></svg>");
    svg
}

fn escape_xml(text: &str) -> String {
    let mut out = String::with_capacity(text.len());
    for c in text.chars() {
        match c {
            '&' => out.push_str("&amp;"),
            '<' => out.push_str("&lt;"),
            '>' => out.push_str("&gt;"),
            '"' => out.push_str("&quot;"),
            c if c.is_control() => {}
            c => out.push(c),
        }
    }
    out
}

#[cfg(test)]
#[path = "../../tests/unit/device/shaders.rs"]
mod tests;
