//! Self-awareness: letting a managed object mint owning handles to itself.
//!
//! A payload opts in by embedding a [`WeakThis`] slot and implementing
//! [`SharedFromThis`]. The slot is populated the first time an owner is
//! attached, either by [`SharedPtr::enable_shared_from_this`] or, for
//! objects built with [`make_shared_cyclic`](crate::make_shared_cyclic), from
//! the observing handle passed to the initializer.
//!
//! The slot tracks the managed object itself. Aliasing constructions never
//! touch it, so a sub-object that is also `SharedFromThis` must be attached
//! separately.

use crate::shared_ptr::SharedPtr;
use crate::weak_ptr::WeakPtr;
use core::cell::Cell;
use core::fmt;

/// Observing handle a payload keeps to itself.
pub struct WeakThis<T> {
    weak: Cell<WeakPtr<T>>,
}

impl<T> WeakThis<T> {
    /// An unattached slot; [`upgrade`](Self::upgrade) returns empty until an
    /// owner is attached.
    pub const fn new() -> Self {
        Self {
            weak: Cell::new(WeakPtr::new()),
        }
    }

    /// A new owning handle, or empty if no owner currently exists.
    pub fn upgrade(&self) -> SharedPtr<T> {
        let weak = self.weak.take();
        let shared = weak.lock();
        self.weak.set(weak);
        shared
    }

    /// A copy of the stored observing handle.
    pub fn downgrade(&self) -> WeakPtr<T> {
        let weak = self.weak.take();
        let copy = weak.clone();
        self.weak.set(weak);
        copy
    }

    pub fn is_attached(&self) -> bool {
        let weak = self.weak.take();
        let attached = weak.is_attached();
        self.weak.set(weak);
        attached
    }

    /// Point the slot at `owner` unless it was attached before. Returns
    /// whether it was attached now.
    pub(crate) fn attach(&self, owner: &SharedPtr<T>) -> bool {
        let current = self.weak.take();
        if current.is_attached() || owner.is_null() {
            self.weak.set(current);
            return false;
        }
        self.weak.set(owner.downgrade());
        true
    }
}

impl<T> Default for WeakThis<T> {
    fn default() -> Self {
        Self::new()
    }
}

impl<T> From<WeakPtr<T>> for WeakThis<T> {
    fn from(weak: WeakPtr<T>) -> Self {
        Self {
            weak: Cell::new(weak),
        }
    }
}

impl<T> fmt::Debug for WeakThis<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("WeakThis")
            .field("attached", &self.is_attached())
            .finish()
    }
}

/// Capability of a managed object to obtain owning handles to itself.
///
/// ```
/// use rc_shared::{make_shared, SharedFromThis, WeakThis};
///
/// #[derive(Default)]
/// struct Node { this: WeakThis<Node> }
///
/// impl SharedFromThis for Node {
///     fn weak_this(&self) -> &WeakThis<Self> { &self.this }
/// }
///
/// let node = make_shared(Node::default()).enable_shared_from_this();
/// let again = node.shared_from_this();
/// assert!(again.owner_eq(&node));
/// assert_eq!(node.use_count(), 2);
/// ```
pub trait SharedFromThis: Sized {
    fn weak_this(&self) -> &WeakThis<Self>;

    /// A new owner of `self`, or an empty handle when no owner exists (for
    /// example while the object is still being constructed).
    fn shared_from_this(&self) -> SharedPtr<Self> {
        self.weak_this().upgrade()
    }

    fn weak_from_this(&self) -> WeakPtr<Self> {
        self.weak_this().downgrade()
    }
}

impl<T: SharedFromThis> SharedPtr<T> {
    /// Attach the payload's [`WeakThis`] slot to this handle's control
    /// block. A slot that is already attached is left as is.
    pub fn enable_shared_from_this(self) -> Self {
        if let Some(payload) = self.get() {
            payload.weak_this().attach(&self);
        }
        self
    }
}
