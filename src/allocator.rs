//! Allocator capability consumed by the `Regular` and `Embedded` control
//! block strategies.
//!
//! Allocation is expressed in terms of `Layout`, so an allocator does not
//! need to be rebound to a different element type: a strategy simply asks
//! for the layout of its own block type.

use core::alloc::Layout;
use core::ptr::NonNull;
use thiserror::Error;

/// The allocator could not satisfy a request.
#[derive(Copy, Clone, Debug, Eq, PartialEq, Error)]
#[error("memory allocation of {} bytes (align {}) failed", .layout.size(), .layout.align())]
pub struct AllocError {
    layout: Layout,
}

impl AllocError {
    pub fn new(layout: Layout) -> Self {
        Self { layout }
    }

    /// Layout of the request that failed.
    pub fn layout(&self) -> Layout {
        self.layout
    }
}

/// Raw memory source for control blocks.
///
/// # Safety
///
/// Implementors must ensure that:
/// - `allocate` returns memory that is valid for reads and writes of
///   `layout.size()` bytes and aligned to `layout.align()`;
/// - that memory stays valid until it is passed back to `deallocate` on the
///   same allocator or on a clone of it;
/// - clones of an allocator can free each other's memory.
pub unsafe trait Allocator {
    /// Allocate a block of memory for `layout`. Contents are uninitialized.
    fn allocate(&self, layout: Layout) -> Result<NonNull<u8>, AllocError>;

    /// Return memory previously obtained from `allocate`.
    ///
    /// # Safety
    /// `ptr` must come from `allocate` on this allocator (or a clone of it)
    /// with the same `layout`, and must not be used afterwards.
    unsafe fn deallocate(&self, ptr: NonNull<u8>, layout: Layout);

    /// Move `value` into raw storage.
    ///
    /// # Safety
    /// `ptr` must be valid for writes and properly aligned for `T`.
    #[inline]
    unsafe fn construct<T>(&self, ptr: NonNull<T>, value: T) {
        ptr.as_ptr().write(value)
    }

    /// Run the destructor of the value at `ptr` in place, leaving the
    /// storage allocated.
    ///
    /// # Safety
    /// `ptr` must point to an initialized value that is not used again.
    #[inline]
    unsafe fn destroy<T: ?Sized>(&self, ptr: NonNull<T>) {
        ptr.as_ptr().drop_in_place()
    }
}

unsafe impl<A: Allocator> Allocator for &A {
    #[inline]
    fn allocate(&self, layout: Layout) -> Result<NonNull<u8>, AllocError> {
        (**self).allocate(layout)
    }

    #[inline]
    unsafe fn deallocate(&self, ptr: NonNull<u8>, layout: Layout) {
        (**self).deallocate(ptr, layout)
    }

    #[inline]
    unsafe fn construct<T>(&self, ptr: NonNull<T>, value: T) {
        (**self).construct(ptr, value)
    }

    #[inline]
    unsafe fn destroy<T: ?Sized>(&self, ptr: NonNull<T>) {
        (**self).destroy(ptr)
    }
}

/// The process-wide allocator (`std::alloc`).
///
/// Zero-sized requests are rejected; every control block has a non-zero
/// size.
#[derive(Copy, Clone, Debug, Default, Eq, PartialEq)]
pub struct Global;

unsafe impl Allocator for Global {
    #[inline]
    fn allocate(&self, layout: Layout) -> Result<NonNull<u8>, AllocError> {
        if layout.size() == 0 {
            return Err(AllocError::new(layout));
        }
        // Safety: the layout has a non-zero size.
        NonNull::new(unsafe { std::alloc::alloc(layout) }).ok_or(AllocError::new(layout))
    }

    #[inline]
    unsafe fn deallocate(&self, ptr: NonNull<u8>, layout: Layout) {
        std::alloc::dealloc(ptr.as_ptr(), layout)
    }
}
