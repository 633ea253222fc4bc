use std::cell::{Cell, RefCell};
use std::collections::HashMap;

use image::{Rgba, Rgba32FImage};

use crate::device::{RenderDevice, ScalerKind, Shader, Texture, TextureId};
use crate::foundation::core::{TextureDesc, TextureFormat};
use crate::foundation::error::{ChainError, ChainResult};

/// Allocation limits for [`CpuDevice`]. `None` means unbounded.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, serde::Serialize, serde::Deserialize)]
#[serde(default)]
pub struct CpuDeviceOpts {
    /// Maximum number of live textures.
    pub max_textures: Option<usize>,
    /// Maximum number of live texture bytes (as accounted by [`TextureDesc::byte_len`]).
    pub max_bytes: Option<u64>,
}

/// Counters exposed for tests and diagnostics.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct CpuDeviceStats {
    pub textures_created: u64,
    pub textures_released: u64,
    pub live_textures: usize,
    pub live_bytes: u64,
    pub dispatches: u64,
    pub scale_calls: u64,
}

struct Slot {
    desc: TextureDesc,
    pixels: Rgba32FImage,
}

/// In-memory [`RenderDevice`].
///
/// Every format is stored as RGBA f32; single and dual channel formats use the leading channels.
pub struct CpuDevice {
    opts: CpuDeviceOpts,
    next_id: Cell<u64>,
    slots: RefCell<HashMap<TextureId, Slot>>,
    stats: Cell<CpuDeviceStats>,
}

impl Default for CpuDevice {
    fn default() -> Self {
        Self::new(CpuDeviceOpts::default())
    }
}

impl CpuDevice {
    pub fn new(opts: CpuDeviceOpts) -> Self {
        Self {
            opts,
            next_id: Cell::new(1),
            slots: RefCell::new(HashMap::new()),
            stats: Cell::new(CpuDeviceStats::default()),
        }
    }

    pub fn stats(&self) -> CpuDeviceStats {
        self.stats.get()
    }

    /// `true` if `texture` has been created and not yet released.
    pub fn is_live(&self, texture: &Texture) -> bool {
        self.slots.borrow().contains_key(&texture.id())
    }

    /// Create a texture holding `pixels`.
    pub fn create_from_image(
        &self,
        pixels: Rgba32FImage,
        format: TextureFormat,
    ) -> ChainResult<Texture> {
        let size = crate::foundation::core::TextureSize::new(pixels.width(), pixels.height())?;
        let texture = self.create_texture(TextureDesc::new(size, format))?;
        self.upload(&texture, pixels)?;
        Ok(texture)
    }

    /// Replace the contents of `texture`.
    pub fn upload(&self, texture: &Texture, pixels: Rgba32FImage) -> ChainResult<()> {
        let mut slots = self.slots.borrow_mut();
        let slot = slots
            .get_mut(&texture.id())
            .ok_or_else(|| unknown_texture(texture))?;
        if pixels.dimensions() != (slot.desc.size.width, slot.desc.size.height) {
            return Err(ChainError::contract(format!(
                "upload of {}x{} pixels into texture {}",
                pixels.width(),
                pixels.height(),
                slot.desc
            )));
        }
        slot.pixels = pixels;
        Ok(())
    }

    /// Copy the contents of `texture` out.
    pub fn download(&self, texture: &Texture) -> ChainResult<Rgba32FImage> {
        self.slots
            .borrow()
            .get(&texture.id())
            .map(|slot| slot.pixels.clone())
            .ok_or_else(|| unknown_texture(texture))
    }

    fn bump(&self, f: impl FnOnce(&mut CpuDeviceStats)) {
        let mut stats = self.stats.get();
        f(&mut stats);
        self.stats.set(stats);
    }

    /// Temporarily take `output` out of the store so it can be written while inputs are read.
    fn with_output(
        &self,
        inputs: &[&Texture],
        output: &Texture,
        f: impl FnOnce(&[&Rgba32FImage], &mut Rgba32FImage) -> ChainResult<()>,
    ) -> ChainResult<()> {
        if inputs.iter().any(|t| t.id() == output.id()) {
            return Err(ChainError::contract(format!(
                "texture {} is both read and written by the same pass",
                output.id().0
            )));
        }
        let mut slot = self
            .slots
            .borrow_mut()
            .remove(&output.id())
            .ok_or_else(|| unknown_texture(output))?;

        let result = {
            let slots = self.slots.borrow();
            let mut images = Vec::with_capacity(inputs.len());
            let mut missing = None;
            for input in inputs {
                match slots.get(&input.id()) {
                    Some(s) => images.push(&s.pixels),
                    None => {
                        missing = Some(unknown_texture(input));
                        break;
                    }
                }
            }
            match missing {
                Some(err) => Err(err),
                None => f(&images, &mut slot.pixels),
            }
        };

        self.slots.borrow_mut().insert(output.id(), slot);
        result
    }
}

fn unknown_texture(texture: &Texture) -> ChainError {
    ChainError::contract(format!(
        "texture {} ({}) is not live on this device",
        texture.id().0,
        texture.desc()
    ))
}

impl RenderDevice for CpuDevice {
    fn create_texture(&self, desc: TextureDesc) -> ChainResult<Texture> {
        let stats = self.stats.get();
        if let Some(max) = self.opts.max_textures
            && stats.live_textures >= max
        {
            return Err(ChainError::exhausted(format!(
                "device texture limit reached ({max}) allocating {desc}"
            )));
        }
        if let Some(max) = self.opts.max_bytes
            && stats.live_bytes.saturating_add(desc.byte_len()) > max
        {
            return Err(ChainError::exhausted(format!(
                "device memory limit reached ({max} bytes) allocating {desc}"
            )));
        }

        let id = TextureId(self.next_id.get());
        self.next_id.set(id.0 + 1);
        let pixels = Rgba32FImage::new(desc.size.width, desc.size.height);
        self.slots.borrow_mut().insert(id, Slot { desc, pixels });
        self.bump(|s| {
            s.textures_created += 1;
            s.live_textures += 1;
            s.live_bytes = s.live_bytes.saturating_add(desc.byte_len());
        });
        tracing::trace!(id = id.0, %desc, "cpu texture created");
        Ok(Texture::new(id, desc))
    }

    fn release_texture(&self, texture: &Texture) {
        let removed = self.slots.borrow_mut().remove(&texture.id());
        match removed {
            Some(slot) => self.bump(|s| {
                s.textures_released += 1;
                s.live_textures = s.live_textures.saturating_sub(1);
                s.live_bytes = s.live_bytes.saturating_sub(slot.desc.byte_len());
            }),
            None => tracing::warn!(id = texture.id().0, "release of unknown texture ignored"),
        }
    }

    fn dispatch(
        &self,
        shader: &dyn Shader,
        inputs: &[&Texture],
        output: &Texture,
    ) -> ChainResult<()> {
        self.bump(|s| s.dispatches += 1);
        tracing::trace!(shader = shader.name(), inputs = inputs.len(), "cpu dispatch");
        self.with_output(inputs, output, |images, out| shader.execute_cpu(images, out))
    }

    fn scale(
        &self,
        output: &Texture,
        input: &Texture,
        upscaler: ScalerKind,
        downscaler: ScalerKind,
    ) -> ChainResult<()> {
        self.bump(|s| s.scale_calls += 1);
        let kind = if output.size().area() >= input.size().area() {
            upscaler
        } else {
            downscaler
        };
        self.with_output(&[input], output, |images, out| {
            resample(images[0], out, kind);
            Ok(())
        })
    }
}

/// Resample `src` into `dst` (already sized) with pixel-center alignment.
pub(crate) fn resample(src: &Rgba32FImage, dst: &mut Rgba32FImage, kind: ScalerKind) {
    let (sw, sh) = src.dimensions();
    let (dw, dh) = dst.dimensions();
    if sw == 0 || sh == 0 {
        return;
    }
    if (sw, sh) == (dw, dh) {
        dst.copy_from_slice(src.as_raw());
        return;
    }
    let sx = sw as f32 / dw as f32;
    let sy = sh as f32 / dh as f32;

    for (x, y, px) in dst.enumerate_pixels_mut() {
        let fx = (x as f32 + 0.5) * sx - 0.5;
        let fy = (y as f32 + 0.5) * sy - 0.5;
        *px = match kind {
            ScalerKind::Nearest => {
                let ix = (fx.round().max(0.0) as u32).min(sw - 1);
                let iy = (fy.round().max(0.0) as u32).min(sh - 1);
                *src.get_pixel(ix, iy)
            }
            ScalerKind::Bilinear => bilinear(src, fx, fy),
        };
    }
}

fn bilinear(src: &Rgba32FImage, fx: f32, fy: f32) -> Rgba<f32> {
    let (sw, sh) = src.dimensions();
    let fx = fx.clamp(0.0, (sw - 1) as f32);
    let fy = fy.clamp(0.0, (sh - 1) as f32);
    let x0 = fx.floor() as u32;
    let y0 = fy.floor() as u32;
    let x1 = (x0 + 1).min(sw - 1);
    let y1 = (y0 + 1).min(sh - 1);
    let tx = fx - x0 as f32;
    let ty = fy - y0 as f32;

    let p00 = src.get_pixel(x0, y0).0;
    let p10 = src.get_pixel(x1, y0).0;
    let p01 = src.get_pixel(x0, y1).0;
    let p11 = src.get_pixel(x1, y1).0;

    let mut out = [0.0f32; 4];
    for c in 0..4 {
        let top = p00[c] + (p10[c] - p00[c]) * tx;
        let bottom = p01[c] + (p11[c] - p01[c]) * tx;
        out[c] = top + (bottom - top) * ty;
    }
    Rgba(out)
}

#[cfg(test)]
#[path = "../../tests/unit/device/cpu.rs"]
mod tests;
