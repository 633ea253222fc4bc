use crate::device::ScalerKind;
use crate::device::shaders::LutMode;

/// One configured step of a render chain.
#[derive(Clone, Debug, PartialEq, serde::Serialize, serde::Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum ChainStep {
    /// Returns its input unchanged.
    Identity,
    /// 2x upscaler; skipped unless the input is smaller than the target (or `force` is set).
    DoubleSize(DoubleSizeStep),
    /// Resample to a fixed size with the host scalers.
    Resize(ResizeStep),
    /// Colour transform through a generated 3D lookup table.
    Lut3d(Lut3dStep),
    /// Replaces the chroma scaler of a YUV source.
    ChromaScaler(ChromaScalerStep),
    /// Runs `steps` only while `condition` holds.
    Conditional(ConditionalStep),
    /// Expands to a named preset.
    Preset(PresetStep),
}

#[derive(Clone, Debug, Default, PartialEq, Eq, serde::Serialize, serde::Deserialize)]
pub struct DoubleSizeStep {
    #[serde(default)]
    pub force: bool,
}

#[derive(Clone, Debug, PartialEq, Eq, serde::Serialize, serde::Deserialize)]
pub struct ResizeStep {
    pub width: u32,
    pub height: u32,
}

#[derive(Clone, Debug, PartialEq, Eq, serde::Serialize, serde::Deserialize)]
pub struct Lut3dStep {
    #[serde(default = "default_lut_size")]
    pub size: u32,
    #[serde(default)]
    pub mode: LutMode,
}

fn default_lut_size() -> u32 {
    17
}

#[derive(Clone, Debug, Default, PartialEq, Eq, serde::Serialize, serde::Deserialize)]
pub struct ChromaScalerStep {
    #[serde(default)]
    pub scaler: ScalerKind,
}

#[derive(Clone, Debug, PartialEq, serde::Serialize, serde::Deserialize)]
pub struct ConditionalStep {
    pub condition: String,
    #[serde(default)]
    pub steps: Vec<ChainStep>,
}

#[derive(Clone, Debug, PartialEq, Eq, serde::Serialize, serde::Deserialize)]
pub struct PresetStep {
    pub name: String,
}

impl ChainStep {
    /// Human readable label, used as the filter tag.
    pub fn label(&self) -> String {
        match self {
            Self::Identity => "Identity".to_owned(),
            Self::DoubleSize(_) => "DoubleSize".to_owned(),
            Self::Resize(r) => format!("Resize({}x{})", r.width, r.height),
            Self::Lut3d(l) => format!("Lut3D({}, {})", l.size, l.mode),
            Self::ChromaScaler(c) => format!("ChromaScaler({:?})", c.scaler),
            Self::Conditional(c) => format!("If({})", c.condition),
            Self::Preset(p) => format!("Preset({})", p.name),
        }
    }

    /// Direct child steps.
    pub fn children(&self) -> &[ChainStep] {
        match self {
            Self::Conditional(c) => &c.steps,
            _ => &[],
        }
    }
}
