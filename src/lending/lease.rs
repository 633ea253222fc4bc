use std::fmt;
use std::ops::Deref;
use std::rc::Rc;

type ReleaseFn = Box<dyn FnOnce()>;

/// Temporary, exclusive access to a value, returned to its origin exactly once.
///
/// Release happens on drop. There is no way to release a lease twice, and the value cannot be
/// reached after release because the lease itself is gone. `release` exists to make the hand-back
/// point explicit in code that wants it.
pub struct Lease<T> {
    value: Rc<T>,
    on_release: Option<ReleaseFn>,
}

impl<T> Lease<T> {
    /// Lease a freshly produced value; `on_release` runs when the lease is dropped.
    pub fn new(value: T, on_release: impl FnOnce() + 'static) -> Self {
        Self::shared(Rc::new(value), on_release)
    }

    /// Lease a value shared with other leases of the same origin.
    pub fn shared(value: Rc<T>, on_release: impl FnOnce() + 'static) -> Self {
        Self {
            value,
            on_release: Some(Box::new(on_release)),
        }
    }

    /// Lease a value that has no origin to return to (already materialized, host-owned).
    pub fn detached(value: Rc<T>) -> Self {
        Self {
            value,
            on_release: None,
        }
    }

    /// Borrow the leased value.
    pub fn value(&self) -> &T {
        &self.value
    }

    /// Hand the value back to its origin now.
    pub fn release(self) {
        drop(self);
    }

    pub(crate) fn share(&self) -> Rc<T> {
        Rc::clone(&self.value)
    }
}

impl<T> Deref for Lease<T> {
    type Target = T;

    fn deref(&self) -> &T {
        &self.value
    }
}

impl<T> Drop for Lease<T> {
    fn drop(&mut self) {
        if let Some(release) = self.on_release.take() {
            release();
        }
    }
}

impl<T: fmt::Debug> fmt::Debug for Lease<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Lease")
            .field("value", &self.value)
            .field("owned", &self.on_release.is_some())
            .finish()
    }
}
