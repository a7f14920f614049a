//! Owning handle.

use crate::allocator::{AllocError, Allocator, Global};
use crate::control_block::{release_shared, ControlBlock};
use crate::strategies::{DefaultBlock, RegularBlock};
use crate::upcast::Upcast;
use crate::weak_ptr::WeakPtr;
use core::fmt;
use core::hash::{Hash, Hasher};
use core::marker::PhantomData;
use core::ops::Deref;
use core::ptr::{self, NonNull};

/// Payload pointer plus the control block it is accounted against. The
/// payload may alias anything the block's managed object keeps alive.
pub(crate) struct Link<T: ?Sized> {
    pub(crate) ptr: NonNull<T>,
    pub(crate) block: NonNull<ControlBlock>,
}

impl<T: ?Sized> Clone for Link<T> {
    fn clone(&self) -> Self {
        *self
    }
}

impl<T: ?Sized> Copy for Link<T> {}

impl<T: ?Sized> Link<T> {
    #[inline]
    pub(crate) fn header(&self) -> &ControlBlock {
        // Safety: a link is only held by a handle that owns a unit of the block.
        unsafe { self.block.as_ref() }
    }

    #[inline]
    pub(crate) fn upcast<U: ?Sized>(self) -> Link<U>
    where
        T: Upcast<U>,
    {
        Link {
            ptr: T::upcast(self.ptr),
            block: self.block,
        }
    }

    #[inline]
    pub(crate) fn addr(&self) -> *const () {
        self.ptr.as_ptr() as *const ()
    }
}

/// A single-threaded owning handle. Cloning shares the control block and
/// increments its shared count; dropping the last owner destroys the
/// managed object.
///
/// Handles are `!Send` and `!Sync`: counts are plain integers.
pub struct SharedPtr<T: ?Sized> {
    link: Option<Link<T>>,
    _owns: PhantomData<T>,
}

impl<T: ?Sized> SharedPtr<T> {
    /// An empty handle.
    pub const fn null() -> Self {
        Self {
            link: None,
            _owns: PhantomData,
        }
    }

    /// Adopt one shared unit that is already counted in `link.block`.
    #[inline]
    pub(crate) unsafe fn from_link(link: Link<T>) -> Self {
        Self {
            link: Some(link),
            _owns: PhantomData,
        }
    }

    #[inline]
    pub(crate) fn link(&self) -> Option<Link<T>> {
        self.link
    }

    /// Share `owner`'s control block while pointing at `ptr`.
    ///
    /// Aliasing an empty handle yields an empty handle.
    ///
    /// # Safety
    /// `ptr` must stay valid for as long as `owner`'s managed object is
    /// alive, typically because it points into that object.
    pub unsafe fn aliasing<U: ?Sized>(owner: &SharedPtr<U>, ptr: NonNull<T>) -> Self {
        match owner.link {
            Some(link) => {
                link.header().shared.get();
                Self::from_link(Link {
                    ptr,
                    block: link.block,
                })
            }
            None => Self::null(),
        }
    }

    /// Aliasing copy: a new owner of the same object that points at a part
    /// of it.
    ///
    /// ```
    /// use rc_shared::make_shared;
    ///
    /// struct Pair { left: u32, right: u32 }
    ///
    /// let pair = make_shared(Pair { left: 1, right: 2 });
    /// let right = pair.alias(|p| &p.right);
    /// drop(pair);
    /// assert_eq!(*right, 2);
    /// ```
    pub fn alias<U: ?Sized>(&self, project: impl FnOnce(&T) -> &U) -> SharedPtr<U> {
        let Some(link) = self.link else {
            return SharedPtr::null();
        };
        // Safety: this handle keeps the object alive for the borrow.
        let ptr = NonNull::from(project(unsafe { link.ptr.as_ref() }));
        link.header().shared.get();
        unsafe { SharedPtr::from_link(Link { ptr, block: link.block }) }
    }

    /// Aliasing move: like [`alias`](Self::alias) but transfers this
    /// handle's share instead of taking a new one.
    pub fn map<U: ?Sized>(mut self, project: impl FnOnce(&T) -> &U) -> SharedPtr<U> {
        let Some(link) = self.link else {
            return SharedPtr::null();
        };
        let ptr = NonNull::from(project(unsafe { link.ptr.as_ref() }));
        self.link = None;
        unsafe { SharedPtr::from_link(Link { ptr, block: link.block }) }
    }

    /// Converting copy to a related element type.
    pub fn upcast<U: ?Sized>(&self) -> SharedPtr<U>
    where
        T: Upcast<U>,
    {
        match self.link {
            Some(link) => {
                link.header().shared.get();
                unsafe { SharedPtr::from_link(link.upcast()) }
            }
            None => SharedPtr::null(),
        }
    }

    /// Converting move to a related element type.
    pub fn into_upcast<U: ?Sized>(mut self) -> SharedPtr<U>
    where
        T: Upcast<U>,
    {
        match self.link.take() {
            Some(link) => unsafe { SharedPtr::from_link(link.upcast()) },
            None => SharedPtr::null(),
        }
    }

    /// Borrow the payload, or `None` for an empty handle.
    #[inline]
    pub fn get(&self) -> Option<&T> {
        self.link.map(|link| unsafe { &*link.ptr.as_ptr() })
    }

    /// Raw payload pointer, or `None` for an empty handle.
    #[inline]
    pub fn as_ptr(&self) -> Option<NonNull<T>> {
        self.link.map(|link| link.ptr)
    }

    #[inline]
    pub fn is_null(&self) -> bool {
        self.link.is_none()
    }

    /// Number of owners sharing this handle's control block. Zero for an
    /// empty handle.
    #[inline]
    pub fn use_count(&self) -> usize {
        self.link.map_or(0, |link| link.header().shared.load())
    }

    /// Number of observers of this handle's control block.
    #[inline]
    pub fn weak_count(&self) -> usize {
        self.link.map_or(0, |link| link.header().weak.load())
    }

    /// Create an observing handle to the same object.
    pub fn downgrade(&self) -> WeakPtr<T> {
        match self.link {
            Some(link) => {
                link.header().weak.get();
                unsafe { WeakPtr::from_link(link) }
            }
            None => WeakPtr::new(),
        }
    }

    /// Release ownership, leaving the handle empty.
    pub fn reset(&mut self) {
        if let Some(link) = self.link.take() {
            unsafe { release_shared(link.block) }
        }
    }

    pub fn swap(&mut self, other: &mut Self) {
        core::mem::swap(&mut self.link, &mut other.link);
    }

    /// True if both handles point at the same payload address.
    pub fn ptr_eq(&self, other: &Self) -> bool {
        self.addr() == other.addr()
    }

    /// True if both handles share one control block, regardless of the
    /// payload each points at.
    pub fn owner_eq<U: ?Sized>(&self, other: &SharedPtr<U>) -> bool {
        self.link.map(|l| l.block) == other.link.map(|l| l.block)
    }

    #[inline]
    fn addr(&self) -> *const () {
        self.link.map_or(ptr::null(), |link| link.addr())
    }
}

impl<T: 'static> SharedPtr<T> {
    /// Box `value` and take ownership of it with a separately allocated
    /// control block. [`make_shared`](crate::make_shared) does both in one
    /// allocation.
    pub fn new(value: T) -> Self {
        Self::from_box(Box::new(value))
    }

    pub fn from_box(value: Box<T>) -> Self {
        unsafe { Self::from_raw(Box::into_raw(value)) }
    }

    /// Take ownership of a raw pointer. A null pointer yields an empty
    /// handle.
    ///
    /// # Safety
    /// `ptr` must come from `Box::into_raw` and must not be owned by any
    /// other control block.
    pub unsafe fn from_raw(ptr: *mut T) -> Self {
        let Some(object) = NonNull::new(ptr) else {
            return Self::null();
        };
        let block = DefaultBlock::<T>::allocate(object);
        Self::from_link(Link { ptr: object, block })
    }

    /// Take ownership of `ptr`, disposing of it with `deleter` once the
    /// last owner is gone.
    ///
    /// # Safety
    /// `ptr` must be valid for reads until `deleter` runs and must not be
    /// owned by any other control block.
    pub unsafe fn with_deleter<D>(ptr: NonNull<T>, deleter: D) -> Self
    where
        D: FnOnce(NonNull<T>) + 'static,
    {
        Self::with_deleter_in(ptr, deleter, Global)
    }

    /// Like [`with_deleter`](Self::with_deleter), allocating the control
    /// block through `alloc`.
    ///
    /// # Safety
    /// Same as [`with_deleter`](Self::with_deleter).
    pub unsafe fn with_deleter_in<D, A>(ptr: NonNull<T>, deleter: D, alloc: A) -> Self
    where
        D: FnOnce(NonNull<T>) + 'static,
        A: Allocator + 'static,
    {
        match Self::try_with_deleter_in(ptr, deleter, alloc) {
            Ok(shared) => shared,
            Err(e) => std::alloc::handle_alloc_error(e.layout()),
        }
    }

    /// Fallible form of [`with_deleter_in`](Self::with_deleter_in). If the
    /// control block cannot be allocated, `deleter` is run on `ptr` before
    /// the error is returned.
    ///
    /// # Safety
    /// Same as [`with_deleter`](Self::with_deleter).
    pub unsafe fn try_with_deleter_in<D, A>(
        ptr: NonNull<T>,
        deleter: D,
        alloc: A,
    ) -> Result<Self, AllocError>
    where
        D: FnOnce(NonNull<T>) + 'static,
        A: Allocator + 'static,
    {
        match RegularBlock::<T, D, A>::allocate(ptr, deleter, alloc) {
            Ok(block) => Ok(Self::from_link(Link { ptr, block })),
            Err((e, deleter)) => {
                deleter(ptr);
                Err(e)
            }
        }
    }

    /// Release current ownership, then own `value` instead.
    pub fn reset_to(&mut self, value: Box<T>) {
        self.reset();
        *self = Self::from_box(value);
    }
}

impl<T: ?Sized> Clone for SharedPtr<T> {
    fn clone(&self) -> Self {
        if let Some(link) = self.link {
            link.header().shared.get();
        }
        Self {
            link: self.link,
            _owns: PhantomData,
        }
    }
}

impl<T: ?Sized> Drop for SharedPtr<T> {
    fn drop(&mut self) {
        self.reset();
    }
}

impl<T: ?Sized> Default for SharedPtr<T> {
    fn default() -> Self {
        Self::null()
    }
}

impl<T: ?Sized> Deref for SharedPtr<T> {
    type Target = T;

    fn deref(&self) -> &T {
        match self.get() {
            Some(value) => value,
            None => panic!("dereferenced an empty SharedPtr"),
        }
    }
}

impl<T: 'static> From<Box<T>> for SharedPtr<T> {
    fn from(value: Box<T>) -> Self {
        Self::from_box(value)
    }
}

impl<T: ?Sized + fmt::Debug> fmt::Debug for SharedPtr<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.get() {
            Some(value) => f.debug_tuple("SharedPtr").field(&value).finish(),
            None => f.write_str("SharedPtr(null)"),
        }
    }
}

impl<T: ?Sized> fmt::Pointer for SharedPtr<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        fmt::Pointer::fmt(&self.addr(), f)
    }
}

impl<T: ?Sized> PartialEq for SharedPtr<T> {
    fn eq(&self, other: &Self) -> bool {
        self.ptr_eq(other)
    }
}

impl<T: ?Sized> Eq for SharedPtr<T> {}

impl<T: ?Sized> Hash for SharedPtr<T> {
    fn hash<H: Hasher>(&self, state: &mut H) {
        (self.addr() as usize).hash(state);
    }
}
