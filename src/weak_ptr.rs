//! Observing handle.

use crate::control_block::release_weak;
use crate::shared_ptr::{Link, SharedPtr};
use crate::upcast::Upcast;
use core::fmt;
use core::ptr;

/// A handle that observes an object without keeping it alive.
///
/// It keeps the control block's memory alive so that [`expired`] and
/// [`lock`] stay answerable after the last owner is gone.
///
/// [`expired`]: WeakPtr::expired
/// [`lock`]: WeakPtr::lock
pub struct WeakPtr<T: ?Sized> {
    link: Option<Link<T>>,
}

impl<T: ?Sized> WeakPtr<T> {
    /// An empty handle that observes nothing.
    pub const fn new() -> Self {
        Self { link: None }
    }

    /// Adopt one weak unit that is already counted in `link.block`.
    #[inline]
    pub(crate) unsafe fn from_link(link: Link<T>) -> Self {
        Self { link: Some(link) }
    }

    #[inline]
    pub(crate) fn is_attached(&self) -> bool {
        self.link.is_some()
    }

    /// Number of owners of the observed object. Informational only: it may
    /// be stale by the time it is acted upon.
    #[inline]
    pub fn use_count(&self) -> usize {
        self.link.map_or(0, |link| link.header().shared.load())
    }

    /// Number of observers of the control block, this one included.
    #[inline]
    pub fn weak_count(&self) -> usize {
        self.link.map_or(0, |link| link.header().weak.load())
    }

    /// True once no owner remains. An empty handle is always expired.
    #[inline]
    pub fn expired(&self) -> bool {
        self.use_count() == 0
    }

    /// Try to become an owner. Returns an empty handle if the object has
    /// already been destroyed; the shared count is never raised from zero.
    pub fn lock(&self) -> SharedPtr<T> {
        match self.link {
            Some(link) if link.header().shared.try_get() => unsafe { SharedPtr::from_link(link) },
            _ => SharedPtr::null(),
        }
    }

    /// Stop observing, leaving the handle empty.
    pub fn reset(&mut self) {
        if let Some(link) = self.link.take() {
            unsafe { release_weak(link.block) }
        }
    }

    pub fn swap(&mut self, other: &mut Self) {
        core::mem::swap(&mut self.link, &mut other.link);
    }

    /// Converting copy to a related element type.
    pub fn upcast<U: ?Sized>(&self) -> WeakPtr<U>
    where
        T: Upcast<U>,
    {
        match self.link {
            Some(link) => {
                link.header().weak.get();
                unsafe { WeakPtr::from_link(link.upcast()) }
            }
            None => WeakPtr::new(),
        }
    }

    /// Converting move to a related element type.
    pub fn into_upcast<U: ?Sized>(mut self) -> WeakPtr<U>
    where
        T: Upcast<U>,
    {
        match self.link.take() {
            Some(link) => unsafe { WeakPtr::from_link(link.upcast()) },
            None => WeakPtr::new(),
        }
    }

    /// True if both handles point at the same payload address.
    pub fn ptr_eq(&self, other: &Self) -> bool {
        self.addr() == other.addr()
    }

    /// True if both handles share one control block.
    pub fn owner_eq<U: ?Sized>(&self, other: &WeakPtr<U>) -> bool {
        self.link.map(|l| l.block) == other.link.map(|l| l.block)
    }

    #[inline]
    fn addr(&self) -> *const () {
        self.link.map_or(ptr::null(), |link| link.addr())
    }
}

impl<T: ?Sized> Clone for WeakPtr<T> {
    fn clone(&self) -> Self {
        if let Some(link) = self.link {
            link.header().weak.get();
        }
        Self { link: self.link }
    }
}

impl<T: ?Sized> Drop for WeakPtr<T> {
    fn drop(&mut self) {
        self.reset();
    }
}

impl<T: ?Sized> Default for WeakPtr<T> {
    fn default() -> Self {
        Self::new()
    }
}

impl<T: ?Sized> From<&SharedPtr<T>> for WeakPtr<T> {
    fn from(shared: &SharedPtr<T>) -> Self {
        shared.downgrade()
    }
}

impl<T: ?Sized> fmt::Debug for WeakPtr<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("(WeakPtr)")
    }
}
