use std::fmt;
use std::rc::Rc;

use crate::device::Texture;
use crate::foundation::core::TextureDesc;
use crate::foundation::error::{ChainError, ChainResult};
use crate::lending::{Lease, Lendable, fold, render_into};

/// Output of a texture-producing filter.
pub type TextureOutput = FilterOutput<TextureDesc, Texture>;

/// A lendable value together with the description of what it will produce.
///
/// The description is known without doing any work; the value is produced only when leased.
pub struct FilterOutput<D, V: 'static> {
    description: D,
    value: Rc<dyn Lendable<V>>,
}

impl<D: Clone, V: 'static> Clone for FilterOutput<D, V> {
    fn clone(&self) -> Self {
        Self {
            description: self.description.clone(),
            value: Rc::clone(&self.value),
        }
    }
}

impl<D, V: 'static> FilterOutput<D, V> {
    /// Pair a description with the lendable that realizes it.
    pub fn new(description: D, value: Rc<dyn Lendable<V>>) -> Self {
        Self { description, value }
    }

    /// The eagerly known description.
    pub fn description(&self) -> &D {
        &self.description
    }

    /// The lendable value.
    pub fn lendable(&self) -> Rc<dyn Lendable<V>> {
        Rc::clone(&self.value)
    }

    /// Use this output as the render target of a pass reading `input`.
    ///
    /// Each lease of the result leases `input`, leases this output, runs `render` and returns this
    /// output's value, releasing the input on every exit path.
    pub fn render_from<X: 'static>(
        &self,
        input: Rc<dyn Lendable<X>>,
        render: impl Fn(&X, &V) -> ChainResult<()> + 'static,
    ) -> Self
    where
        D: Clone,
    {
        Self::new(
            self.description.clone(),
            Rc::new(render_into(Rc::clone(&self.value), input, render)),
        )
    }
}

impl<D, V: 'static> Lendable<V> for FilterOutput<D, V> {
    fn lease(&self) -> ChainResult<Lease<V>> {
        self.value.lease()
    }
}

impl<D: fmt::Debug, V: 'static> fmt::Debug for FilterOutput<D, V> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("FilterOutput")
            .field("description", &self.description)
            .finish_non_exhaustive()
    }
}

/// Wrap an already available lendable.
pub fn ret<D, V: 'static>(description: D, value: impl Lendable<V> + 'static) -> FilterOutput<D, V> {
    FilterOutput::new(description, Rc::new(value))
}

type Producer<D, V> = Box<dyn Fn() -> ChainResult<FilterOutput<D, V>>>;

struct Checked<D, V: 'static> {
    declared: D,
    produce: Producer<D, V>,
}

impl<D, V> Lendable<V> for Checked<D, V>
where
    D: PartialEq + fmt::Debug + Clone,
    V: 'static,
{
    fn lease(&self) -> ChainResult<Lease<V>> {
        let produced = (self.produce)()?;
        if produced.description != self.declared {
            return Err(ChainError::contract(format!(
                "generated output {:?} does not match declared description {:?}",
                produced.description, self.declared
            )));
        }
        produced.lease()
    }
}

/// Declare `description` now and produce the actual output later.
///
/// `produce` runs every time the result is leased; an output whose description differs from the
/// declared one fails the lease with a contract violation.
pub fn safe_return<D, V>(
    description: D,
    produce: impl Fn() -> ChainResult<FilterOutput<D, V>> + 'static,
) -> FilterOutput<D, V>
where
    D: PartialEq + fmt::Debug + Clone + 'static,
    V: 'static,
{
    let checked = Checked {
        declared: description.clone(),
        produce: Box::new(produce),
    };
    FilterOutput::new(description, Rc::new(checked))
}

/// Combine outputs into one whose description is the list of descriptions and whose value leases
/// every member together.
pub fn fold_outputs<D: Clone, V: 'static>(
    outputs: &[FilterOutput<D, V>],
) -> FilterOutput<Vec<D>, Vec<Lease<V>>> {
    FilterOutput::new(
        outputs.iter().map(|o| o.description.clone()).collect(),
        Rc::new(fold(outputs.iter().map(FilterOutput::lendable).collect())),
    )
}

#[cfg(test)]
#[path = "../../tests/unit/filter/output.rs"]
mod tests;
