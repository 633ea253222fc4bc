use crate::foundation::error::{ChainError, ChainResult};

/// Texture dimensions in pixels.
#[derive(
    Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord, serde::Serialize, serde::Deserialize,
)]
pub struct TextureSize {
    /// Width in pixels.
    pub width: u32,
    /// Height in pixels.
    pub height: u32,
}

impl TextureSize {
    /// Create a validated, non-empty size.
    pub fn new(width: u32, height: u32) -> ChainResult<Self> {
        if width == 0 || height == 0 {
            return Err(ChainError::configuration(format!(
                "texture size must be non-empty, got {width}x{height}"
            )));
        }
        Ok(Self { width, height })
    }

    /// Number of pixels.
    pub fn area(self) -> u64 {
        u64::from(self.width) * u64::from(self.height)
    }

    /// Scale both dimensions by an integer factor (saturating).
    pub fn scaled(self, factor: u32) -> Self {
        Self {
            width: self.width.saturating_mul(factor),
            height: self.height.saturating_mul(factor),
        }
    }

    /// `true` when either dimension is strictly smaller than `other`'s.
    pub fn is_smaller_than(self, other: TextureSize) -> bool {
        self.width < other.width || self.height < other.height
    }

    /// Parse `"WxH"`, e.g. `"1920x1080"`.
    pub fn parse(s: &str) -> ChainResult<Self> {
        let (w, h) = s
            .trim()
            .split_once(['x', 'X'])
            .ok_or_else(|| ChainError::configuration(format!("invalid size '{s}' (want WxH)")))?;
        let w: u32 = w
            .trim()
            .parse()
            .map_err(|_| ChainError::configuration(format!("invalid width in '{s}'")))?;
        let h: u32 = h
            .trim()
            .parse()
            .map_err(|_| ChainError::configuration(format!("invalid height in '{s}'")))?;
        Self::new(w, h)
    }
}

impl std::fmt::Display for TextureSize {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}x{}", self.width, self.height)
    }
}

/// Pixel formats a texture may be declared with.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, serde::Serialize, serde::Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TextureFormat {
    /// Single channel float (luma planes).
    R32F,
    /// Two channel float (interleaved chroma planes).
    Rg32F,
    /// Four channel half float.
    Rgba16F,
    /// Four channel float.
    Rgba32F,
}

impl TextureFormat {
    /// Bytes per pixel as stored on the device.
    pub fn bytes_per_pixel(self) -> u64 {
        match self {
            Self::R32F => 4,
            Self::Rg32F => 8,
            Self::Rgba16F => 8,
            Self::Rgba32F => 16,
        }
    }
}

/// Shape of a texture: the eagerly available description of a lazily produced texture.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, serde::Serialize, serde::Deserialize)]
pub struct TextureDesc {
    /// Dimensions.
    pub size: TextureSize,
    /// Pixel format.
    pub format: TextureFormat,
}

impl TextureDesc {
    /// Shorthand constructor.
    pub fn new(size: TextureSize, format: TextureFormat) -> Self {
        Self { size, format }
    }

    /// Same format, different size.
    pub fn with_size(self, size: TextureSize) -> Self {
        Self { size, ..self }
    }

    /// Same size, different format.
    pub fn with_format(self, format: TextureFormat) -> Self {
        Self { format, ..self }
    }

    /// Storage footprint in bytes.
    pub fn byte_len(self) -> u64 {
        self.size.area().saturating_mul(self.format.bytes_per_pixel())
    }
}

impl std::fmt::Display for TextureDesc {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{} {:?}", self.size, self.format)
    }
}

#[cfg(test)]
#[path = "../../tests/unit/foundation/core.rs"]
mod tests;
