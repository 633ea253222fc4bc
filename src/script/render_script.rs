use std::rc::Rc;

use crate::chain::compile::{Chain, CompileContext};
use crate::chain::condition::ConditionEvaluator;
use crate::chain::presets::PresetRegistry;
use crate::filter::{Filter, FilterKind};
use crate::foundation::error::{ChainError, ChainResult};
use crate::renderer::{Renderer, SourceFormat, SourcePlane};
use crate::script::config::ScriptConfig;

/// Status shown after a failed compile.
pub const STATUS_INVALID: &str = "Status Invalid";

/// Lifecycle of a [`RenderScript`].
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum ScriptState {
    /// Created; no graph yet.
    Uninitialized,
    /// A graph (or the error display) is ready.
    Compiled,
    /// Inside [`RenderScript::execute`].
    Rendering,
    /// Between frames.
    Idle,
    /// Terminal.
    Disposed,
}

/// Per-frame orchestrator: compiles a [`Chain`] into a filter graph and renders it into the host's
/// output target.
pub struct RenderScript {
    name: String,
    chain: Chain,
    presets: PresetRegistry,
    evaluator: Rc<dyn ConditionEvaluator>,
    renderer: Rc<Renderer>,
    state: ScriptState,
    source: Option<Filter>,
    output: Option<Filter>,
    status: String,
    error: Option<String>,
}

impl RenderScript {
    pub fn new(
        name: impl Into<String>,
        chain: Chain,
        presets: PresetRegistry,
        evaluator: Rc<dyn ConditionEvaluator>,
        renderer: Rc<Renderer>,
    ) -> Self {
        Self {
            name: name.into(),
            chain,
            presets,
            evaluator,
            renderer,
            state: ScriptState::Uninitialized,
            source: None,
            output: None,
            status: String::new(),
            error: None,
        }
    }

    /// Build a script from validated configuration; also applies the configured host scalers.
    pub fn from_config(
        config: &ScriptConfig,
        evaluator: Rc<dyn ConditionEvaluator>,
        renderer: Rc<Renderer>,
    ) -> ChainResult<Self> {
        config.validate()?;
        renderer.set_scalers(config.scalers());
        Ok(Self::new(
            config.name.clone(),
            Chain::new(config.steps.clone()),
            config.preset_registry(),
            evaluator,
            renderer,
        ))
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn state(&self) -> ScriptState {
        self.state
    }

    /// Tags of the compiled graph, or [`STATUS_INVALID`].
    pub fn status(&self) -> &str {
        &self.status
    }

    /// Text of the last compile or render failure, until the next successful update.
    pub fn error_message(&self) -> Option<&str> {
        self.error.as_deref()
    }

    pub fn output_filter(&self) -> Option<&Filter> {
        self.output.as_ref()
    }

    pub fn renderer(&self) -> &Rc<Renderer> {
        &self.renderer
    }

    /// Rebuild the graph for the current source and target.
    ///
    /// Never fails: a compile error installs the error display instead.
    #[tracing::instrument(skip(self), fields(script = %self.name))]
    pub fn update(&mut self) {
        if self.state == ScriptState::Disposed {
            tracing::warn!("update on a disposed script ignored");
            return;
        }

        let previous_source = self.source.take();
        let previous_output = self.output.take();
        if let Some(source) = previous_source {
            source.dispose();
        }
        if let Some(output) = previous_output {
            output.dispose();
        }

        match self.compile() {
            Ok(output) => {
                self.status = output.status();
                self.error = None;
                self.output = Some(output);
                tracing::debug!(status = %self.status, "render chain compiled");
            }
            Err(err) => {
                let message = self.describe_error(&err);
                tracing::error!(error = %err, "render chain failed to compile");
                self.status = STATUS_INVALID.to_owned();
                self.install_error_display(message);
            }
        }
        self.state = ScriptState::Compiled;
    }

    fn compile(&mut self) -> ChainResult<Filter> {
        let source = self.initial_filter()?;
        self.source = Some(source.clone());

        let ctx = CompileContext {
            renderer: &self.renderer,
            evaluator: &self.evaluator,
            presets: &self.presets,
        };
        let compiled = self.chain.process(source, &ctx)?;
        let target = self.renderer.target_size();
        let output = Filter::resize(compiled, target).tagged(format!("SetSize({target})"));
        output.initialize(&self.renderer)?;
        Ok(output)
    }

    fn initial_filter(&self) -> ChainResult<Filter> {
        let targets = self.renderer.targets();
        match (targets.format, &targets.luma, &targets.chroma) {
            (SourceFormat::Rgb, _, _) => Ok(Filter::source(SourcePlane::Video).tagged("Source")),
            (SourceFormat::Yuv, Some(luma), Some(chroma)) => {
                if chroma.size().is_smaller_than(luma.size()) {
                    let scaler = self.renderer.scalers().upscaler;
                    Ok(Filter::composition(
                        Filter::source(SourcePlane::Luma),
                        Filter::source(SourcePlane::Chroma),
                        scaler,
                    )
                    .tagged("Source"))
                } else {
                    Ok(Filter::source(SourcePlane::Video).tagged("Source"))
                }
            }
            (SourceFormat::Yuv, _, _) => Err(ChainError::configuration(
                "YUV source without luma and chroma planes",
            )),
        }
    }

    /// Render one frame into the host's output target. Returns `false` on failure.
    #[tracing::instrument(skip(self), fields(script = %self.name))]
    pub fn execute(&mut self) -> bool {
        if self.state == ScriptState::Disposed {
            tracing::warn!("execute on a disposed script ignored");
            return false;
        }
        let Some(output) = self.output.clone() else {
            tracing::error!("execute called before update");
            return false;
        };

        self.state = ScriptState::Rendering;
        let result = self.render_frame(&output);
        output.reset();
        self.renderer.pool().flush_textures();
        self.state = ScriptState::Idle;

        match result {
            Ok(()) => true,
            Err(err) => {
                let message = self.describe_error(&err);
                tracing::error!(error = %err, "frame failed");
                if !matches!(output.kind(), FilterKind::ErrorDisplay(_)) {
                    output.dispose();
                    self.install_error_display(message);
                }
                false
            }
        }
    }

    fn render_frame(&self, output: &Filter) -> ChainResult<()> {
        let targets = self.renderer.targets();
        if targets.output.id() != targets.input.id() {
            self.renderer
                .pool()
                .put_temp_texture(targets.output.clone())?;
        }

        output.render()?;
        let rendered = output
            .rendered_texture()
            .ok_or_else(|| ChainError::contract("output filter rendered no texture"))?;
        if rendered.id() != targets.output.id() {
            self.renderer.scale(&targets.output, &rendered)?;
        }
        Ok(())
    }

    fn install_error_display(&mut self, message: String) {
        let display = Filter::error_display(message.clone()).tagged("Error");
        match display.initialize(&self.renderer) {
            Ok(()) => self.output = Some(display),
            Err(err) => {
                tracing::error!(error = %err, "error display unavailable");
                self.output = None;
            }
        }
        self.error = Some(message);
    }

    fn describe_error(&self, err: &ChainError) -> String {
        format!(
            "Error in {}:\n\n{}\n\n~\nStack Trace:\n{}",
            self.name,
            err.innermost(),
            err.trace()
        )
    }

    /// Free the graph and everything it owns. Idempotent.
    pub fn dispose(&mut self) {
        if self.state == ScriptState::Disposed {
            return;
        }
        if let Some(output) = self.output.take() {
            output.dispose();
        }
        if let Some(source) = self.source.take() {
            source.dispose();
        }
        self.state = ScriptState::Disposed;
        tracing::debug!(script = %self.name, "render script disposed");
    }
}

impl Drop for RenderScript {
    fn drop(&mut self) {
        self.dispose();
    }
}

impl std::fmt::Debug for RenderScript {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RenderScript")
            .field("name", &self.name)
            .field("state", &self.state)
            .field("status", &self.status)
            .field("output", &self.output)
            .finish_non_exhaustive()
    }
}

#[cfg(test)]
#[path = "../../tests/unit/script/render_script.rs"]
mod tests;
