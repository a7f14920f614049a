//! Construction helpers that place the payload inside its control block.
//!
//! Each call performs exactly one allocation holding the header, the
//! allocator and the payload. The `_with` forms run the initializer after
//! that allocation has succeeded; if the initializer panics the allocation
//! is released before the panic propagates.

use crate::allocator::{AllocError, Allocator, Global};
use crate::shared_ptr::{Link, SharedPtr};
use crate::strategies::EmbeddedBlock;
use crate::weak_ptr::WeakPtr;
use core::mem;
use core::ptr::NonNull;

/// Allocate a control block with `value` embedded in it.
pub fn make_shared<T: 'static>(value: T) -> SharedPtr<T> {
    allocate_shared(Global, value)
}

/// Like [`make_shared`], building the value in place once the block is
/// allocated.
pub fn make_shared_with<T, F>(init: F) -> SharedPtr<T>
where
    T: 'static,
    F: FnOnce() -> T,
{
    allocate_shared_with(Global, init)
}

/// Like [`make_shared`], allocating through `alloc`.
pub fn allocate_shared<T, A>(alloc: A, value: T) -> SharedPtr<T>
where
    T: 'static,
    A: Allocator + 'static,
{
    allocate_shared_with(alloc, move || value)
}

pub fn allocate_shared_with<T, A, F>(alloc: A, init: F) -> SharedPtr<T>
where
    T: 'static,
    A: Allocator + 'static,
    F: FnOnce() -> T,
{
    match try_allocate_shared_with(alloc, init) {
        Ok(shared) => shared,
        Err(e) => std::alloc::handle_alloc_error(e.layout()),
    }
}

/// Fallible form of [`allocate_shared`]. `value` is dropped if the block
/// cannot be allocated.
pub fn try_allocate_shared<T, A>(alloc: A, value: T) -> Result<SharedPtr<T>, AllocError>
where
    T: 'static,
    A: Allocator + 'static,
{
    try_allocate_shared_with(alloc, move || value)
}

/// Fallible form of [`allocate_shared_with`]. `init` is not called if the
/// block cannot be allocated.
pub fn try_allocate_shared_with<T, A, F>(alloc: A, init: F) -> Result<SharedPtr<T>, AllocError>
where
    T: 'static,
    A: Allocator + 'static,
    F: FnOnce() -> T,
{
    let block = EmbeddedBlock::<T, A>::allocate_uninit(alloc, 1, 0)?;
    let unconstructed = Unconstructed(block);
    let value = init();
    unsafe { EmbeddedBlock::construct(block, value) };
    mem::forget(unconstructed);
    Ok(unsafe { SharedPtr::from_link(embedded_link(block)) })
}

/// Build a value that can observe its own control block while it is being
/// constructed.
///
/// `init` receives an observing handle to the block; locking it inside
/// `init` returns an empty handle because no owner exists yet. Copies kept
/// by the value become live once construction completes.
///
/// ```
/// use rc_shared::{make_shared_cyclic, WeakPtr};
///
/// struct Node { me: WeakPtr<Node> }
///
/// let node = make_shared_cyclic(|me: &WeakPtr<Node>| {
///     assert!(me.lock().is_null());
///     Node { me: me.clone() }
/// });
/// assert!(node.me.lock().owner_eq(&node));
/// ```
pub fn make_shared_cyclic<T, F>(init: F) -> SharedPtr<T>
where
    T: 'static,
    F: FnOnce(&WeakPtr<T>) -> T,
{
    let block = match EmbeddedBlock::<T, Global>::allocate_uninit(Global, 0, 1) {
        Ok(block) => block,
        Err(e) => std::alloc::handle_alloc_error(e.layout()),
    };
    let link = embedded_link(block);
    // Owns the weak unit the block was created with. If `init` panics,
    // dropping it frees the block without touching the value slot.
    let weak = unsafe { WeakPtr::from_link(link) };
    let value = init(&weak);
    unsafe { EmbeddedBlock::construct(block, value) };
    link.header().shared.get();
    drop(weak);
    unsafe { SharedPtr::from_link(link) }
}

fn embedded_link<T, A: Allocator>(block: NonNull<EmbeddedBlock<T, A>>) -> Link<T> {
    Link {
        ptr: EmbeddedBlock::value_ptr(block),
        block: EmbeddedBlock::header(block),
    }
}

/// Frees an embedded block whose value was never written.
struct Unconstructed<T, A: Allocator>(NonNull<EmbeddedBlock<T, A>>);

impl<T, A: Allocator> Drop for Unconstructed<T, A> {
    fn drop(&mut self) {
        unsafe { EmbeddedBlock::abandon(self.0) }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::cell::Cell;
    use std::rc::Rc;

    #[test]
    fn embedded_payload_lives_inside_the_block() {
        let shared = make_shared([7u64; 4]);
        let link = shared.link().expect("non-empty");
        let start = link.block.as_ptr() as usize;
        let payload = link.ptr.as_ptr() as usize;
        assert!(payload > start);
        assert!(payload - start < 128);
        assert_eq!(shared[2], 7);
    }

    #[test]
    fn cyclic_weak_is_live_after_construction() {
        struct Node {
            me: WeakPtr<Node>,
            seen_during_init: Cell<bool>,
        }
        let node = make_shared_cyclic(|me: &WeakPtr<Node>| Node {
            me: me.clone(),
            seen_during_init: Cell::new(!me.expired()),
        });
        assert!(!node.seen_during_init.get());
        assert_eq!(node.use_count(), 1);
        assert_eq!(node.weak_count(), 1);
        assert!(node.me.lock().owner_eq(&node));
    }

    #[test]
    fn cyclic_panic_frees_block_and_keeps_escaped_weak_valid() {
        let escaped: Rc<Cell<Option<WeakPtr<u32>>>> = Rc::new(Cell::new(None));
        let slot = escaped.clone();
        let res = std::panic::catch_unwind(std::panic::AssertUnwindSafe(|| {
            make_shared_cyclic(|me: &WeakPtr<u32>| -> u32 {
                slot.set(Some(me.clone()));
                panic!("init failed");
            })
        }));
        assert!(res.is_err());
        let weak = escaped.take().expect("weak escaped init");
        assert!(weak.expired());
        assert!(weak.lock().is_null());
        assert_eq!(weak.weak_count(), 1);
    }
}
