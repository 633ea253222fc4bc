use std::rc::Rc;

use crate::chain::condition::ConditionEvaluator;
use crate::chain::presets::PresetRegistry;
use crate::chain::step::ChainStep;
use crate::device::Shader;
use crate::device::shaders::{DoubleSize, Lut3d, LutTable};
use crate::filter::Filter;
use crate::foundation::core::{TextureDesc, TextureSize};
use crate::foundation::error::{ChainError, ChainResult};
use crate::renderer::Renderer;

const MAX_PRESET_DEPTH: usize = 16;

/// What chain compilation needs from its surroundings.
pub struct CompileContext<'a> {
    pub renderer: &'a Rc<Renderer>,
    pub evaluator: &'a Rc<dyn ConditionEvaluator>,
    pub presets: &'a PresetRegistry,
}

impl CompileContext<'_> {
    /// Description of `filter`, initializing it (and its inputs) if needed. Does not render.
    pub fn describe(&self, filter: &Filter) -> ChainResult<TextureDesc> {
        filter.initialize(self.renderer)?;
        filter.description()
    }

    pub fn target_size(&self) -> TextureSize {
        self.renderer.target_size()
    }
}

/// An ordered list of steps that turns an input filter into an output filter.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct Chain {
    steps: Vec<ChainStep>,
}

impl Chain {
    pub fn new(steps: Vec<ChainStep>) -> Self {
        Self { steps }
    }

    pub fn steps(&self) -> &[ChainStep] {
        &self.steps
    }

    /// Build the graph for this chain on top of `input`.
    pub fn process(&self, input: Filter, ctx: &CompileContext<'_>) -> ChainResult<Filter> {
        apply_steps(&self.steps, input, ctx, 0)
    }
}

fn apply_steps(
    steps: &[ChainStep],
    input: Filter,
    ctx: &CompileContext<'_>,
    depth: usize,
) -> ChainResult<Filter> {
    steps
        .iter()
        .try_fold(input, |filter, step| apply_step(step, filter, ctx, depth))
}

fn apply_step(
    step: &ChainStep,
    input: Filter,
    ctx: &CompileContext<'_>,
    depth: usize,
) -> ChainResult<Filter> {
    let filter = match step {
        ChainStep::Identity => return Ok(input),
        ChainStep::DoubleSize(doubler) => {
            let size = ctx.describe(&input)?.size;
            if !doubler.force && !size.is_smaller_than(ctx.target_size()) {
                tracing::debug!(%size, target = %ctx.target_size(), "not upscaling; doubler skipped");
                return Ok(input);
            }
            input + (Rc::new(DoubleSize) as Rc<dyn Shader>)
        }
        ChainStep::Resize(r) => Filter::resize(input, TextureSize::new(r.width, r.height)?),
        ChainStep::Lut3d(l) => {
            let table = Filter::generated(Rc::new(LutTable::new(l.size, l.mode)?));
            Filter::shader(Rc::new(Lut3d), vec![input, table])
        }
        ChainStep::ChromaScaler(c) => {
            let Some((luma, chroma)) = input.as_composition() else {
                tracing::debug!("chroma scaler applied to merged input; skipped");
                return Ok(input);
            };
            let chroma_size = ctx.describe(&chroma)?.size;
            if ctx.target_size().is_smaller_than(chroma_size) {
                tracing::debug!(chroma = %chroma_size, "downscaling chroma; keeping internal scaler");
                return Ok(input);
            }
            Filter::composition(luma, chroma, c.scaler)
        }
        ChainStep::Conditional(c) => {
            ctx.evaluator.validate(&c.condition)?;
            let branch = apply_steps(&c.steps, input.clone(), ctx, depth)?;
            Filter::conditional(input, branch, c.condition.clone(), Rc::clone(ctx.evaluator))
        }
        ChainStep::Preset(p) => {
            if depth >= MAX_PRESET_DEPTH {
                return Err(ChainError::configuration(format!(
                    "preset '{}' nested deeper than {MAX_PRESET_DEPTH} levels",
                    p.name
                )));
            }
            let steps = ctx.presets.get(&p.name)?;
            return apply_steps(steps, input, ctx, depth + 1);
        }
    };
    Ok(filter.tagged(step.label()))
}

#[cfg(test)]
#[path = "../../tests/unit/chain/compile.rs"]
mod tests;
