//! Lease/lend protocol.
//!
//! A [`Lendable`] is "a value that can be borrowed". Borrowing yields a [`Lease`], which hands the
//! value back to its origin (a pool, or a memoizing [`Lazy`]) when dropped.

mod combinators;
mod lazy;
mod lease;

use std::rc::Rc;

use crate::foundation::error::ChainResult;

pub use combinators::{Fold, FromFn, Just, RenderInto, fold, from_fn, render_into};
pub use lazy::{Lazy, Retention};
pub use lease::Lease;

/// A factory of leases.
///
/// Fails only when producing the value fails; the error of the underlying computation is
/// propagated unchanged.
pub trait Lendable<T> {
    /// Borrow the value.
    fn lease(&self) -> ChainResult<Lease<T>>;
}

impl<T, L: Lendable<T> + ?Sized> Lendable<T> for Rc<L> {
    fn lease(&self) -> ChainResult<Lease<T>> {
        (**self).lease()
    }
}

/// Lease `lendable`, pass the value to `f`, release.
pub fn extract<T, R>(lendable: &dyn Lendable<T>, f: impl FnOnce(&T) -> R) -> ChainResult<R> {
    let lease = lendable.lease()?;
    Ok(f(lease.value()))
}

#[cfg(test)]
#[path = "../../tests/unit/lending/lending.rs"]
mod tests;
