use std::collections::BTreeMap;
use std::fs::File;
use std::io::{BufReader, Read};
use std::path::Path;

use anyhow::Context as _;

use crate::chain::condition::{ConditionEvaluator, ExprEvaluator};
use crate::chain::presets::PresetRegistry;
use crate::chain::step::ChainStep;
use crate::device::ScalerKind;
use crate::device::shaders::LutTable;
use crate::foundation::core::TextureSize;
use crate::foundation::error::{ChainError, ChainResult};
use crate::pool::PoolOpts;
use crate::renderer::ScalerSettings;

/// JSON description of a render script.
///
/// ```json
/// {
///   "name": "sharp",
///   "steps": [
///     { "kind": "double_size" },
///     { "kind": "conditional", "condition": "hdr", "steps": [{ "kind": "lut3d", "size": 17 }] }
///   ]
/// }
/// ```
#[derive(Clone, Debug, PartialEq, serde::Serialize, serde::Deserialize)]
#[serde(deny_unknown_fields)]
pub struct ScriptConfig {
    pub name: String,
    #[serde(default)]
    pub steps: Vec<ChainStep>,
    #[serde(default)]
    pub presets: BTreeMap<String, Vec<ChainStep>>,
    #[serde(default)]
    pub pool: PoolOpts,
    #[serde(default)]
    pub upscaler: ScalerKind,
    #[serde(default)]
    pub downscaler: ScalerKind,
}

impl ScriptConfig {
    /// Parse and validate.
    pub fn from_reader<R: Read>(reader: R) -> ChainResult<Self> {
        let config: Self = serde_json::from_reader(reader)
            .map_err(|e| ChainError::configuration(format!("parse script config: {e}")))?;
        config.validate()?;
        Ok(config)
    }

    pub fn from_json_str(s: &str) -> ChainResult<Self> {
        Self::from_reader(s.as_bytes())
    }

    pub fn from_path(path: impl AsRef<Path>) -> ChainResult<Self> {
        let path = path.as_ref();
        let file = File::open(path)
            .with_context(|| format!("open script config '{}'", path.display()))?;
        Self::from_reader(BufReader::new(file))
    }

    pub fn preset_registry(&self) -> PresetRegistry {
        PresetRegistry::from(self.presets.clone())
    }

    pub fn scalers(&self) -> ScalerSettings {
        ScalerSettings {
            upscaler: self.upscaler,
            downscaler: self.downscaler,
        }
    }

    /// Structural checks that do not need a renderer.
    pub fn validate(&self) -> ChainResult<()> {
        if self.name.trim().is_empty() {
            return Err(ChainError::configuration("script name must be non-empty"));
        }
        if self.presets.keys().any(|k| k.trim().is_empty()) {
            return Err(ChainError::configuration("preset names must be non-empty"));
        }
        if self.pool.max_textures_per_bucket == 0 {
            return Err(ChainError::configuration(
                "pool.max_textures_per_bucket must be at least 1",
            ));
        }

        let syntax = ExprEvaluator::new();
        for steps in std::iter::once(&self.steps).chain(self.presets.values()) {
            validate_steps(steps, &syntax)?;
        }

        let presets = self.preset_registry();
        presets.validate()?;
        presets.validate_steps(&self.steps)
    }
}

fn validate_steps(steps: &[ChainStep], syntax: &ExprEvaluator) -> ChainResult<()> {
    for step in steps {
        match step {
            ChainStep::Resize(r) => {
                TextureSize::new(r.width, r.height)?;
            }
            ChainStep::Lut3d(l) => {
                LutTable::new(l.size, l.mode)?;
            }
            ChainStep::Conditional(c) => syntax.validate(&c.condition)?,
            ChainStep::Identity
            | ChainStep::DoubleSize(_)
            | ChainStep::ChromaScaler(_)
            | ChainStep::Preset(_) => {}
        }
        validate_steps(step.children(), syntax)?;
    }
    Ok(())
}

#[cfg(test)]
#[path = "../../tests/unit/script/config.rs"]
mod tests;
