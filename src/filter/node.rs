use std::cell::{Cell, RefCell};
use std::collections::HashSet;
use std::fmt;
use std::rc::Rc;
use std::sync::atomic::{AtomicU64, Ordering};

use crate::chain::condition::{ConditionEvaluator, FilterInfo};
use crate::device::shaders::{ErrorCard, YuvToRgb};
use crate::device::{RenderDevice, ScalerKind, Shader, Texture};
use crate::filter::output::{TextureOutput, fold_outputs, ret, safe_return};
use crate::foundation::core::{TextureDesc, TextureFormat, TextureSize};
use crate::foundation::error::{ChainError, ChainResult};
use crate::lending::{Lazy, Lease, Lendable, Retention, from_fn};
use crate::renderer::{Renderer, SourcePlane};

static NEXT_FILTER_ID: AtomicU64 = AtomicU64::new(1);

/// Process-unique filter identity.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct FilterId(pub u64);

impl FilterId {
    fn next() -> Self {
        Self(NEXT_FILTER_ID.fetch_add(1, Ordering::Relaxed))
    }
}

/// What a filter does with its inputs.
pub enum FilterKind {
    /// Reads a host plane; no inputs.
    Source(SourcePlane),
    /// Runs a shader over all inputs into a pool texture.
    Shader(Rc<dyn Shader>),
    /// Resamples its single input to a fixed size with the host scalers.
    Resize(TextureSize),
    /// Merges `[luma, chroma]` into RGB, upsampling chroma with the given scaler.
    Composition(ScalerKind),
    /// Chooses per frame between `[input, branch]`.
    Conditional {
        condition: String,
        evaluator: Rc<dyn ConditionEvaluator>,
    },
    /// Zero-input shader rendered once into a texture owned by the filter.
    Generated(Rc<dyn Shader>),
    /// Warning card at the target size with the message drawn on it.
    ErrorDisplay(String),
}

impl FilterKind {
    /// Short name used when a filter carries no tag.
    pub fn name(&self) -> String {
        match self {
            Self::Source(plane) => format!("Source({plane:?})"),
            Self::Shader(shader) => shader.name().to_owned(),
            Self::Resize(size) => format!("Resize({size})"),
            Self::Composition(scaler) => format!("Composition({scaler:?})"),
            Self::Conditional { condition, .. } => format!("If({condition})"),
            Self::Generated(shader) => shader.name().to_owned(),
            Self::ErrorDisplay(_) => "ErrorDisplay".to_owned(),
        }
    }
}

impl fmt::Debug for FilterKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.name())
    }
}

/// Texture owned by a single filter for its whole lifetime, produced on first use.
struct PrivateTexture {
    device: Rc<dyn RenderDevice>,
    desc: TextureDesc,
    generator: Rc<dyn Shader>,
    texture: RefCell<Option<Texture>>,
}

impl PrivateTexture {
    fn release(&self) {
        let texture = self.texture.borrow_mut().take();
        if let Some(texture) = texture {
            self.device.release_texture(&texture);
        }
    }
}

impl Lendable<Texture> for PrivateTexture {
    fn lease(&self) -> ChainResult<Lease<Texture>> {
        if let Some(texture) = self.texture.borrow().as_ref() {
            return Ok(Lease::detached(Rc::new(texture.clone())));
        }
        let texture = self.device.create_texture(self.desc)?;
        if let Err(err) = self.device.dispatch(self.generator.as_ref(), &[], &texture) {
            self.device.release_texture(&texture);
            return Err(err);
        }
        *self.texture.borrow_mut() = Some(texture.clone());
        Ok(Lease::detached(Rc::new(texture)))
    }
}

impl Drop for PrivateTexture {
    fn drop(&mut self) {
        self.release();
    }
}

/// Attributes render failures that originate in this filter to its stage.
struct Staged {
    stage: String,
    inner: Rc<dyn Lendable<Texture>>,
}

impl Lendable<Texture> for Staged {
    fn lease(&self) -> ChainResult<Lease<Texture>> {
        self.inner.lease().map_err(|err| match err {
            ChainError::Upstream { .. } => err,
            other => ChainError::upstream(self.stage.clone(), other),
        })
    }
}

struct Bound {
    output: TextureOutput,
    memo: Lazy<Texture>,
    private: Option<Rc<PrivateTexture>>,
}

struct FilterNode {
    id: FilterId,
    kind: FilterKind,
    inputs: Vec<Filter>,
    tag: RefCell<Option<String>>,
    bound: RefCell<Option<Bound>>,
    pinned: RefCell<Option<Lease<Texture>>>,
    consumers: Cell<usize>,
    disposed: Cell<bool>,
}

/// A node of the render graph.
///
/// Construction is cheap and does no work. [`Filter::initialize`] resolves descriptions through the
/// whole upstream graph; [`Filter::render`] leases the output, which renders whatever upstream
/// work is needed exactly once until [`Filter::reset`].
///
/// `Filter` is a shared handle: clones refer to the same node.
#[derive(Clone)]
pub struct Filter {
    node: Rc<FilterNode>,
}

impl Filter {
    fn with_kind(kind: FilterKind, inputs: Vec<Filter>) -> Self {
        Self {
            node: Rc::new(FilterNode {
                id: FilterId::next(),
                kind,
                inputs,
                tag: RefCell::new(None),
                bound: RefCell::new(None),
                pinned: RefCell::new(None),
                consumers: Cell::new(0),
                disposed: Cell::new(false),
            }),
        }
    }

    pub fn source(plane: SourcePlane) -> Self {
        Self::with_kind(FilterKind::Source(plane), Vec::new())
    }

    pub fn shader(shader: Rc<dyn Shader>, inputs: Vec<Filter>) -> Self {
        Self::with_kind(FilterKind::Shader(shader), inputs)
    }

    pub fn resize(input: Filter, size: TextureSize) -> Self {
        Self::with_kind(FilterKind::Resize(size), vec![input])
    }

    pub fn composition(luma: Filter, chroma: Filter, scaler: ScalerKind) -> Self {
        Self::with_kind(FilterKind::Composition(scaler), vec![luma, chroma])
    }

    /// `branch` is rendered when `condition` holds; otherwise `input` passes through, resized to
    /// the branch's description when the shapes differ.
    pub fn conditional(
        input: Filter,
        branch: Filter,
        condition: impl Into<String>,
        evaluator: Rc<dyn ConditionEvaluator>,
    ) -> Self {
        Self::with_kind(
            FilterKind::Conditional {
                condition: condition.into(),
                evaluator,
            },
            vec![input, branch],
        )
    }

    pub fn generated(generator: Rc<dyn Shader>) -> Self {
        Self::with_kind(FilterKind::Generated(generator), Vec::new())
    }

    pub fn error_display(message: impl Into<String>) -> Self {
        Self::with_kind(FilterKind::ErrorDisplay(message.into()), Vec::new())
    }

    pub fn id(&self) -> FilterId {
        self.node.id
    }

    pub fn kind(&self) -> &FilterKind {
        &self.node.kind
    }

    pub fn inputs(&self) -> &[Filter] {
        &self.node.inputs
    }

    /// `true` if both handles refer to the same node.
    pub fn same_as(&self, other: &Filter) -> bool {
        Rc::ptr_eq(&self.node, &other.node)
    }

    pub fn tag(&self) -> Option<String> {
        self.node.tag.borrow().clone()
    }

    pub fn set_tag(&self, tag: impl Into<String>) {
        *self.node.tag.borrow_mut() = Some(tag.into());
    }

    /// Builder form of [`Filter::set_tag`].
    pub fn tagged(self, tag: impl Into<String>) -> Self {
        self.set_tag(tag);
        self
    }

    /// Tag, or the kind's name for untagged filters.
    pub fn label(&self) -> String {
        self.tag().unwrap_or_else(|| self.node.kind.name())
    }

    /// `(luma, chroma)` inputs of a composition filter.
    pub fn as_composition(&self) -> Option<(Filter, Filter)> {
        match (&self.node.kind, self.node.inputs.as_slice()) {
            (FilterKind::Composition(_), [luma, chroma]) => Some((luma.clone(), chroma.clone())),
            _ => None,
        }
    }

    /// This filter and everything upstream of it, each node once, inputs before consumers.
    pub fn nodes(&self) -> Vec<Filter> {
        let mut seen = HashSet::new();
        let mut out = Vec::new();
        self.collect_nodes(&mut seen, &mut out);
        out
    }

    fn collect_nodes(&self, seen: &mut HashSet<FilterId>, out: &mut Vec<Filter>) {
        if !seen.insert(self.id()) {
            return;
        }
        for input in &self.node.inputs {
            input.collect_nodes(seen, out);
        }
        out.push(self.clone());
    }

    /// Tags of the graph in dependency order, joined with `" > "`.
    pub fn status(&self) -> String {
        self.nodes()
            .iter()
            .filter_map(Filter::tag)
            .collect::<Vec<_>>()
            .join(" > ")
    }

    pub fn is_initialized(&self) -> bool {
        self.node.bound.borrow().is_some()
    }

    pub fn is_disposed(&self) -> bool {
        self.node.disposed.get()
    }

    /// Resolve the description and lendable output of this filter and everything upstream.
    ///
    /// Does no rendering. Calling it again on an initialized graph is a no-op.
    pub fn initialize(&self, renderer: &Rc<Renderer>) -> ChainResult<()> {
        for filter in self.nodes() {
            filter.bind(renderer)?;
        }
        Ok(())
    }

    fn bind(&self, renderer: &Rc<Renderer>) -> ChainResult<()> {
        if self.node.disposed.get() {
            return Err(ChainError::configuration(format!(
                "filter '{}' was disposed",
                self.label()
            )));
        }
        if self.is_initialized() {
            return Ok(());
        }

        let (raw, private) = self.build_output(renderer)?;
        let desc = *raw.description();
        let staged: Rc<dyn Lendable<Texture>> = Rc::new(Staged {
            stage: self.label(),
            inner: raw.lendable(),
        });
        let stage = self.label();
        let memo = Lazy::new(move || {
            tracing::trace!(stage = %stage, "rendering filter");
            staged.lease()
        });
        let output = TextureOutput::new(desc, Rc::new(memo.clone()));

        *self.node.bound.borrow_mut() = Some(Bound {
            output,
            memo,
            private,
        });

        let mut counted = HashSet::new();
        for input in &self.node.inputs {
            if counted.insert(input.id()) {
                input.add_consumer();
            }
        }
        tracing::trace!(filter = %self.label(), %desc, "filter initialized");
        Ok(())
    }

    fn add_consumer(&self) {
        let n = self.node.consumers.get() + 1;
        self.node.consumers.set(n);
        if n > 1
            && let Some(bound) = self.node.bound.borrow().as_ref()
        {
            bound.memo.set_retention(Retention::UntilReset);
        }
    }

    /// Number of initialized filters reading this one.
    pub fn consumers(&self) -> usize {
        self.node.consumers.get()
    }

    fn build_output(
        &self,
        renderer: &Rc<Renderer>,
    ) -> ChainResult<(TextureOutput, Option<Rc<PrivateTexture>>)> {
        let inputs = self
            .node
            .inputs
            .iter()
            .map(Filter::output)
            .collect::<ChainResult<Vec<_>>>()?;
        let device = Rc::clone(renderer.device());
        let pool = renderer.pool().clone();

        let output = match &self.node.kind {
            FilterKind::Source(plane) => {
                expect_inputs(self, &inputs, 0)?;
                let plane = *plane;
                let declared = renderer.source_texture(plane)?.desc();
                let renderer = Rc::clone(renderer);
                ret(
                    declared,
                    from_fn(move || {
                        let texture = renderer.source_texture(plane)?;
                        if texture.desc() != declared {
                            return Err(ChainError::contract(format!(
                                "{plane:?} plane is {} but was declared as {declared}",
                                texture.desc()
                            )));
                        }
                        Ok(Lease::detached(Rc::new(texture)))
                    }),
                )
            }
            FilterKind::Shader(shader) => {
                let descs: Vec<TextureDesc> = inputs.iter().map(|o| *o.description()).collect();
                let desc = shader.output_desc(&descs)?;
                let shader = Rc::clone(shader);
                ret(desc, pool.slot(desc)).render_from(
                    fold_outputs(&inputs).lendable(),
                    move |ins: &Vec<Lease<Texture>>, out: &Texture| {
                        let refs: Vec<&Texture> = ins.iter().map(Lease::value).collect();
                        device.dispatch(shader.as_ref(), &refs, out)
                    },
                )
            }
            FilterKind::Resize(size) => {
                expect_inputs(self, &inputs, 1)?;
                resized(renderer, &inputs[0], inputs[0].description().with_size(*size))
            }
            FilterKind::Composition(scaler) => {
                expect_inputs(self, &inputs, 2)?;
                let luma = *inputs[0].description();
                let chroma = *inputs[1].description();
                let desc = TextureDesc::new(luma.size, TextureFormat::Rgba32F);
                let upsampled = chroma.with_size(luma.size);
                let scaler = *scaler;
                ret(desc, pool.slot(desc)).render_from(
                    fold_outputs(&inputs).lendable(),
                    move |planes: &Vec<Lease<Texture>>, out: &Texture| {
                        let (luma, chroma) = (planes[0].value(), planes[1].value());
                        if chroma.size() == luma.size() {
                            return device.dispatch(&YuvToRgb, &[luma, chroma], out);
                        }
                        let scaled = pool.lease(upsampled)?;
                        device.scale(&scaled, chroma, scaler, scaler)?;
                        device.dispatch(&YuvToRgb, &[luma, scaled.value()], out)
                    },
                )
            }
            FilterKind::Conditional {
                condition,
                evaluator,
            } => {
                expect_inputs(self, &inputs, 2)?;
                let (input, branch) = (inputs[0].clone(), inputs[1].clone());
                let desc = *branch.description();
                let info = FilterInfo {
                    input: *input.description(),
                    target: renderer.target_size(),
                };
                let passthrough = resized(renderer, &input, desc);
                let condition = condition.clone();
                let evaluator = Rc::clone(evaluator);
                safe_return(desc, move || {
                    if evaluator.evaluate(&info, &condition)? {
                        Ok(branch.clone())
                    } else {
                        Ok(passthrough.clone())
                    }
                })
            }
            FilterKind::Generated(generator) => {
                expect_inputs(self, &inputs, 0)?;
                let desc = generator.output_desc(&[])?;
                let private = Rc::new(PrivateTexture {
                    device,
                    desc,
                    generator: Rc::clone(generator),
                    texture: RefCell::new(None),
                });
                return Ok((ret(desc, Rc::clone(&private)), Some(private)));
            }
            FilterKind::ErrorDisplay(message) => {
                expect_inputs(self, &inputs, 0)?;
                let card = ErrorCard::new(renderer.target_size(), message)?;
                let desc = card.output_desc(&[])?;
                ret(
                    desc,
                    from_fn(move || {
                        let out = pool.lease(desc)?;
                        device.dispatch(&card, &[], out.value())?;
                        Ok(out)
                    }),
                )
            }
        };
        Ok((output, None))
    }

    /// Memoized output. Fails before [`Filter::initialize`].
    pub fn output(&self) -> ChainResult<TextureOutput> {
        self.node
            .bound
            .borrow()
            .as_ref()
            .map(|b| b.output.clone())
            .ok_or_else(|| {
                ChainError::contract(format!(
                    "filter '{}' used before initialization",
                    self.label()
                ))
            })
    }

    /// Eagerly known description of the output.
    pub fn description(&self) -> ChainResult<TextureDesc> {
        self.output().map(|o| *o.description())
    }

    fn memo(&self) -> Option<Lazy<Texture>> {
        self.node.bound.borrow().as_ref().map(|b| b.memo.clone())
    }

    /// Number of times this filter's render action has run.
    pub fn computations(&self) -> u64 {
        self.memo().map_or(0, |m| m.computations())
    }

    /// Render this filter (and whatever it depends on) and keep the result until
    /// [`Filter::reset`].
    pub fn render(&self) -> ChainResult<()> {
        if self.node.pinned.borrow().is_some() {
            return Ok(());
        }
        let memo = self.memo().ok_or_else(|| {
            ChainError::contract(format!(
                "filter '{}' rendered before initialization",
                self.label()
            ))
        })?;
        let lease = memo.lease()?;
        *self.node.pinned.borrow_mut() = Some(lease);
        Ok(())
    }

    /// Texture produced by the last [`Filter::render`], if still held.
    pub fn rendered_texture(&self) -> Option<Texture> {
        self.node.pinned.borrow().as_ref().map(|l| l.value().clone())
    }

    /// Drop every memoized result in the graph, returning temporaries to the pool.
    pub fn reset(&self) {
        let nodes = self.nodes();
        for filter in nodes.iter().rev() {
            let pinned = filter.node.pinned.borrow_mut().take();
            drop(pinned);
        }
        for filter in nodes.iter().rev() {
            if let Some(memo) = filter.memo() {
                memo.reset();
            }
        }
    }

    /// Reset the graph and free everything it owns. Idempotent; a disposed filter cannot be
    /// initialized again.
    pub fn dispose(&self) {
        let nodes = self.nodes();
        self.reset();
        for filter in nodes.iter().rev() {
            if filter.node.disposed.replace(true) {
                continue;
            }
            let bound = filter.node.bound.borrow_mut().take();
            if let Some(bound) = bound {
                if let Some(private) = &bound.private {
                    private.release();
                }
                drop(bound);
            }
        }
    }
}

fn expect_inputs(filter: &Filter, inputs: &[TextureOutput], want: usize) -> ChainResult<()> {
    if inputs.len() != want {
        return Err(ChainError::configuration(format!(
            "filter '{}' needs {want} input(s), got {}",
            filter.label(),
            inputs.len()
        )));
    }
    Ok(())
}

/// `input` itself when it already has `desc`, otherwise a host-scaled copy.
fn resized(renderer: &Rc<Renderer>, input: &TextureOutput, desc: TextureDesc) -> TextureOutput {
    if *input.description() == desc {
        return input.clone();
    }
    let host = Rc::clone(renderer);
    ret(desc, renderer.pool().slot(desc)).render_from(
        input.lendable(),
        move |src: &Texture, dst: &Texture| host.scale(dst, src),
    )
}

impl std::ops::Add<Rc<dyn Shader>> for Filter {
    type Output = Filter;

    /// `upstream + shader` runs `shader` over `upstream`.
    fn add(self, shader: Rc<dyn Shader>) -> Filter {
        Filter::shader(shader, vec![self])
    }
}

impl fmt::Debug for Filter {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Filter")
            .field("id", &self.node.id.0)
            .field("kind", &self.node.kind)
            .field("tag", &*self.node.tag.borrow())
            .field("inputs", &self.node.inputs.len())
            .field("initialized", &self.is_initialized())
            .finish()
    }
}

#[cfg(test)]
#[path = "../../tests/unit/filter/node.rs"]
mod tests;
