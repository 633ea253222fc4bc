use std::collections::BTreeMap;

use crate::chain::step::ChainStep;
use crate::foundation::error::{ChainError, ChainResult};

/// Named, reusable step lists.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct PresetRegistry {
    presets: BTreeMap<String, Vec<ChainStep>>,
}

impl PresetRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn insert(&mut self, name: impl Into<String>, steps: Vec<ChainStep>) {
        self.presets.insert(name.into(), steps);
    }

    pub fn get(&self, name: &str) -> ChainResult<&[ChainStep]> {
        self.presets
            .get(name)
            .map(Vec::as_slice)
            .ok_or_else(|| ChainError::configuration(format!("unknown preset '{name}'")))
    }

    pub fn names(&self) -> impl Iterator<Item = &str> {
        self.presets.keys().map(String::as_str)
    }

    pub fn len(&self) -> usize {
        self.presets.len()
    }

    pub fn is_empty(&self) -> bool {
        self.presets.is_empty()
    }

    /// Check that every preset reference in `steps` (and in the presets themselves) resolves and
    /// that no preset expands into itself.
    pub fn validate_steps(&self, steps: &[ChainStep]) -> ChainResult<()> {
        let mut stack = Vec::new();
        self.check(steps, &mut stack)
    }

    /// Validate every registered preset.
    pub fn validate(&self) -> ChainResult<()> {
        for (name, steps) in &self.presets {
            let mut stack = vec![name.clone()];
            self.check(steps, &mut stack)?;
        }
        Ok(())
    }

    fn check(&self, steps: &[ChainStep], stack: &mut Vec<String>) -> ChainResult<()> {
        for step in steps {
            if let ChainStep::Preset(p) = step {
                if stack.contains(&p.name) {
                    return Err(ChainError::configuration(format!(
                        "preset cycle: {} > {}",
                        stack.join(" > "),
                        p.name
                    )));
                }
                let inner = self.get(&p.name)?;
                stack.push(p.name.clone());
                self.check(inner, stack)?;
                stack.pop();
            }
            self.check(step.children(), stack)?;
        }
        Ok(())
    }
}

impl From<BTreeMap<String, Vec<ChainStep>>> for PresetRegistry {
    fn from(presets: BTreeMap<String, Vec<ChainStep>>) -> Self {
        Self { presets }
    }
}

#[cfg(test)]
#[path = "../../tests/unit/chain/presets.rs"]
mod tests;
