use std::cell::{Cell, RefCell};
use std::fmt;
use std::rc::Rc;

use crate::foundation::error::ChainResult;
use crate::lending::{Lease, Lendable};

/// How long a [`Lazy`] keeps its computed result.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Retention {
    /// Drop the result (returning its resources) as soon as the last lease on it is released.
    UntilReleased,
    /// Keep the result until [`Lazy::reset`], even with no lease outstanding.
    UntilReset,
}

type ComputeFn<T> = Box<dyn Fn() -> ChainResult<Lease<T>>>;

struct LazyInner<T> {
    compute: ComputeFn<T>,
    memo: RefCell<Option<Lease<T>>>,
    outstanding: Cell<usize>,
    retention: Cell<Retention>,
    reset_pending: Cell<bool>,
    computations: Cell<u64>,
}

impl<T> LazyInner<T> {
    fn release_one(&self) {
        let n = self.outstanding.get().saturating_sub(1);
        self.outstanding.set(n);
        if n > 0 {
            return;
        }
        if self.retention.get() == Retention::UntilReleased || self.reset_pending.get() {
            self.reset_pending.set(false);
            let memo = self.memo.borrow_mut().take();
            drop(memo);
        }
    }
}

/// Memoized, on-demand computation of a leasable value.
///
/// The first [`Lendable::lease`] runs the computation (which may lease its own dependencies) and
/// keeps the resulting lease. Later calls hand out further leases on the same value without
/// recomputing, for as long as the result is retained.
pub struct Lazy<T: 'static> {
    inner: Rc<LazyInner<T>>,
}

impl<T: 'static> Clone for Lazy<T> {
    fn clone(&self) -> Self {
        Self {
            inner: Rc::clone(&self.inner),
        }
    }
}

impl<T: 'static> Lazy<T> {
    /// Wrap `compute`; nothing runs until the first lease.
    pub fn new(compute: impl Fn() -> ChainResult<Lease<T>> + 'static) -> Self {
        Self {
            inner: Rc::new(LazyInner {
                compute: Box::new(compute),
                memo: RefCell::new(None),
                outstanding: Cell::new(0),
                retention: Cell::new(Retention::UntilReleased),
                reset_pending: Cell::new(false),
                computations: Cell::new(0),
            }),
        }
    }

    /// Memoize over an existing lendable.
    pub fn over(source: Rc<dyn Lendable<T>>) -> Self {
        Self::new(move || source.lease())
    }

    /// Builder form of [`Lazy::set_retention`].
    pub fn with_retention(self, retention: Retention) -> Self {
        self.set_retention(retention);
        self
    }

    /// Change how long the computed result is kept.
    pub fn set_retention(&self, retention: Retention) {
        self.inner.retention.set(retention);
    }

    /// Current retention policy.
    pub fn retention(&self) -> Retention {
        self.inner.retention.get()
    }

    /// Number of times the computation has actually run.
    pub fn computations(&self) -> u64 {
        self.inner.computations.get()
    }

    /// Number of leases currently handed out and not yet released.
    pub fn outstanding(&self) -> usize {
        self.inner.outstanding.get()
    }

    /// `true` while a computed result is held.
    pub fn is_computed(&self) -> bool {
        self.inner.memo.borrow().is_some()
    }

    /// Discard the memoized result so the next lease recomputes.
    ///
    /// With leases still outstanding the result is dropped when the last of them is released.
    pub fn reset(&self) {
        if self.inner.outstanding.get() > 0 {
            tracing::debug!(
                outstanding = self.inner.outstanding.get(),
                "lazy value reset with leases outstanding; deferring"
            );
            self.inner.reset_pending.set(true);
            return;
        }
        self.inner.reset_pending.set(false);
        let memo = self.inner.memo.borrow_mut().take();
        drop(memo);
    }
}

impl<T: 'static> Lendable<T> for Lazy<T> {
    fn lease(&self) -> ChainResult<Lease<T>> {
        let memoized = self.inner.memo.borrow().as_ref().map(Lease::share);
        let value = match memoized {
            Some(value) => value,
            None => {
                let lease = (self.inner.compute)()?;
                self.inner
                    .computations
                    .set(self.inner.computations.get().saturating_add(1));
                let value = lease.share();
                *self.inner.memo.borrow_mut() = Some(lease);
                value
            }
        };

        self.inner.outstanding.set(self.inner.outstanding.get() + 1);
        let inner = Rc::clone(&self.inner);
        Ok(Lease::shared(value, move || inner.release_one()))
    }
}

impl<T: 'static> fmt::Debug for Lazy<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Lazy")
            .field("computed", &self.is_computed())
            .field("outstanding", &self.outstanding())
            .field("retention", &self.retention())
            .field("computations", &self.computations())
            .finish()
    }
}
