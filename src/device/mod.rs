//! Rendering device contract.
//!
//! The graph engine treats the device as an opaque texture allocator plus two primitives: run a
//! [`Shader`] from N input textures into one output texture, and scale one texture into another.
//! [`cpu::CpuDevice`] is an in-memory implementation used by tests and the CLI.

pub mod cpu;
pub mod shaders;

use crate::foundation::core::{TextureDesc, TextureSize};
use crate::foundation::error::ChainResult;

/// Device-unique texture identifier.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct TextureId(pub u64);

/// Handle to a device texture.
///
/// Handles are cheap to clone; ownership of the underlying storage is tracked by whoever
/// created it (the host, a pool, or a filter that owns it privately), never by the handle.
#[derive(Clone, Debug, PartialEq, Eq, Hash)]
pub struct Texture {
    id: TextureId,
    desc: TextureDesc,
}

impl Texture {
    /// Build a handle. Intended for [`RenderDevice`] implementations.
    pub fn new(id: TextureId, desc: TextureDesc) -> Self {
        Self { id, desc }
    }

    /// Identifier.
    pub fn id(&self) -> TextureId {
        self.id
    }

    /// Shape.
    pub fn desc(&self) -> TextureDesc {
        self.desc
    }

    /// Dimensions.
    pub fn size(&self) -> TextureSize {
        self.desc.size
    }
}

/// Resampling filter used by [`RenderDevice::scale`].
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash, serde::Serialize, serde::Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ScalerKind {
    /// Nearest neighbour.
    Nearest,
    /// Bilinear interpolation.
    #[default]
    Bilinear,
}

/// Pixel algorithm run by the device; opaque to the graph engine.
pub trait Shader {
    /// Name used in logs and tags.
    fn name(&self) -> &str;

    /// Shape of the output given the shapes of the inputs.
    fn output_desc(&self, inputs: &[TextureDesc]) -> ChainResult<TextureDesc>;

    /// Reference CPU implementation of the pass.
    ///
    /// `output` is pre-sized to [`Shader::output_desc`].
    fn execute_cpu(
        &self,
        inputs: &[&image::Rgba32FImage],
        output: &mut image::Rgba32FImage,
    ) -> ChainResult<()>;
}

/// Resource allocator and blit primitive supplied by the host player.
pub trait RenderDevice {
    /// Allocate a texture. Fails with `ResourceExhaustion` when the device is out of room.
    fn create_texture(&self, desc: TextureDesc) -> ChainResult<Texture>;

    /// Free a texture created by [`RenderDevice::create_texture`].
    fn release_texture(&self, texture: &Texture);

    /// Run `shader` reading `inputs` and writing `output`.
    fn dispatch(&self, shader: &dyn Shader, inputs: &[&Texture], output: &Texture)
    -> ChainResult<()>;

    /// Resample `input` into `output`, using `upscaler` when enlarging and `downscaler` otherwise.
    fn scale(
        &self,
        output: &Texture,
        input: &Texture,
        upscaler: ScalerKind,
        downscaler: ScalerKind,
    ) -> ChainResult<()>;
}
