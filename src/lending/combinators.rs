use std::rc::Rc;

use crate::foundation::error::ChainResult;
use crate::lending::{Lease, Lendable};

/// Pass-through over an already materialized value.
pub struct Just<T> {
    value: Rc<T>,
}

impl<T> Just<T> {
    /// Lend `value` as is.
    pub fn new(value: T) -> Self {
        Self {
            value: Rc::new(value),
        }
    }
}

impl<T> Lendable<T> for Just<T> {
    fn lease(&self) -> ChainResult<Lease<T>> {
        Ok(Lease::detached(Rc::clone(&self.value)))
    }
}

type LeaseFn<T> = Box<dyn Fn() -> ChainResult<Lease<T>>>;

/// Lendable backed by a closure; see [`from_fn`].
pub struct FromFn<T> {
    lease: LeaseFn<T>,
}

impl<T> Lendable<T> for FromFn<T> {
    fn lease(&self) -> ChainResult<Lease<T>> {
        (self.lease)()
    }
}

/// Lendable that runs `f` on every lease, without memoizing.
pub fn from_fn<T>(f: impl Fn() -> ChainResult<Lease<T>> + 'static) -> FromFn<T> {
    FromFn { lease: Box::new(f) }
}

type RenderFn<X, Y> = Box<dyn Fn(&X, &Y) -> ChainResult<()>>;

/// "Lease my input, write into my output slot, release the input."
///
/// Built with [`render_into`].
pub struct RenderInto<X, Y> {
    output: Rc<dyn Lendable<Y>>,
    input: Rc<dyn Lendable<X>>,
    render: RenderFn<X, Y>,
}

impl<X, Y> Lendable<Y> for RenderInto<X, Y> {
    fn lease(&self) -> ChainResult<Lease<Y>> {
        let input = self.input.lease()?;
        let target = self.output.lease()?;
        // Both leases drop (and release) on the error path.
        (self.render)(input.value(), target.value())?;
        input.release();
        Ok(target)
    }
}

/// Every lease of the result leases `input`, leases a slot from `output`, runs `render` from the
/// input into the slot and returns the slot, releasing the input lease on every exit path.
pub fn render_into<X: 'static, Y: 'static>(
    output: Rc<dyn Lendable<Y>>,
    input: Rc<dyn Lendable<X>>,
    render: impl Fn(&X, &Y) -> ChainResult<()> + 'static,
) -> RenderInto<X, Y> {
    RenderInto {
        output,
        input,
        render: Box::new(render),
    }
}

/// Leases a sequence of lendables together; see [`fold`].
pub struct Fold<X> {
    items: Vec<Rc<dyn Lendable<X>>>,
}

impl<X: 'static> Lendable<Vec<Lease<X>>> for Fold<X> {
    fn lease(&self) -> ChainResult<Lease<Vec<Lease<X>>>> {
        let mut leases = Vec::with_capacity(self.items.len());
        for item in &self.items {
            // Leases already taken are dropped with `leases` if this one fails.
            leases.push(item.lease()?);
        }
        Ok(Lease::detached(Rc::new(leases)))
    }
}

/// Combine lendables into one lendable sequence: leasing it leases every item in order, and
/// releasing it releases them all.
pub fn fold<X: 'static>(items: Vec<Rc<dyn Lendable<X>>>) -> Fold<X> {
    Fold { items }
}
