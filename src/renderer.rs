//! Host-side state a render script reads while compiling and rendering.

use std::cell::RefCell;
use std::rc::Rc;

use crate::device::{RenderDevice, ScalerKind, Texture};
use crate::foundation::core::TextureSize;
use crate::foundation::error::{ChainError, ChainResult};
use crate::pool::TexturePool;

/// Layout of the decoded source frame.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, serde::Serialize, serde::Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SourceFormat {
    /// The host already converted the frame to RGB in the input target.
    #[default]
    Rgb,
    /// Separate luma and chroma planes are available.
    Yuv,
}

/// Plane a source filter reads from.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum SourcePlane {
    /// The input render target.
    Video,
    /// The luma plane of a YUV source.
    Luma,
    /// The interleaved chroma plane of a YUV source.
    Chroma,
}

/// Per-frame targets supplied by the host.
#[derive(Clone, Debug)]
pub struct FrameTargets {
    /// Decoded frame (RGB).
    pub input: Texture,
    /// Where the final image must end up.
    pub output: Texture,
    /// Source layout.
    pub format: SourceFormat,
    /// Luma plane, when `format` is [`SourceFormat::Yuv`].
    pub luma: Option<Texture>,
    /// Chroma plane, when `format` is [`SourceFormat::Yuv`].
    pub chroma: Option<Texture>,
}

impl FrameTargets {
    /// RGB-only targets.
    pub fn rgb(input: Texture, output: Texture) -> Self {
        Self {
            input,
            output,
            format: SourceFormat::Rgb,
            luma: None,
            chroma: None,
        }
    }

    /// Targets with separate luma and chroma planes.
    pub fn yuv(input: Texture, output: Texture, luma: Texture, chroma: Texture) -> Self {
        Self {
            input,
            output,
            format: SourceFormat::Yuv,
            luma: Some(luma),
            chroma: Some(chroma),
        }
    }
}

/// Scalers used by the host for plain resizes.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, serde::Serialize, serde::Deserialize)]
#[serde(default)]
pub struct ScalerSettings {
    pub upscaler: ScalerKind,
    pub downscaler: ScalerKind,
}

/// The host renderer as seen by filters: device, shared pool, current targets and scalers.
pub struct Renderer {
    device: Rc<dyn RenderDevice>,
    pool: TexturePool,
    targets: RefCell<FrameTargets>,
    scalers: RefCell<ScalerSettings>,
}

impl Renderer {
    pub fn new(device: Rc<dyn RenderDevice>, pool: TexturePool, targets: FrameTargets) -> Rc<Self> {
        Rc::new(Self {
            device,
            pool,
            targets: RefCell::new(targets),
            scalers: RefCell::new(ScalerSettings::default()),
        })
    }

    pub fn device(&self) -> &Rc<dyn RenderDevice> {
        &self.device
    }

    pub fn pool(&self) -> &TexturePool {
        &self.pool
    }

    pub fn targets(&self) -> FrameTargets {
        self.targets.borrow().clone()
    }

    /// Swap in the targets for the next frame.
    pub fn set_targets(&self, targets: FrameTargets) {
        *self.targets.borrow_mut() = targets;
    }

    pub fn scalers(&self) -> ScalerSettings {
        *self.scalers.borrow()
    }

    pub fn set_scalers(&self, scalers: ScalerSettings) {
        *self.scalers.borrow_mut() = scalers;
    }

    /// Size of the output render target.
    pub fn target_size(&self) -> TextureSize {
        self.targets.borrow().output.size()
    }

    /// Texture currently backing `plane`.
    pub fn source_texture(&self, plane: SourcePlane) -> ChainResult<Texture> {
        let targets = self.targets.borrow();
        let texture = match plane {
            SourcePlane::Video => Some(&targets.input),
            SourcePlane::Luma => targets.luma.as_ref(),
            SourcePlane::Chroma => targets.chroma.as_ref(),
        };
        texture.cloned().ok_or_else(|| {
            ChainError::configuration(format!("host provides no {plane:?} plane"))
        })
    }

    /// Resample with the configured host scalers.
    pub fn scale(&self, output: &Texture, input: &Texture) -> ChainResult<()> {
        let scalers = self.scalers();
        self.device
            .scale(output, input, scalers.upscaler, scalers.downscaler)
    }
}

impl std::fmt::Debug for Renderer {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Renderer")
            .field("targets", &*self.targets.borrow())
            .field("scalers", &self.scalers())
            .field("pool", &self.pool)
            .finish()
    }
}
