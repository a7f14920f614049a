//! Type-erased control block shared by every handle derived from one
//! ownership origin.
//!
//! The block is a passive holder of two counters and a strategy table.
//! Handles move the counters themselves and call the release functions
//! below when they give a unit back; the strategy is only consulted once a
//! count reaches zero.
//!
//! Lifecycle
//! - Created with `shared = 1, weak = 0` when ownership is first
//!   established.
//! - The managed object is alive iff `shared > 0`.
//! - The block's memory is valid iff `shared + weak > 0` and is freed
//!   exactly once, the moment both reach zero.

use crate::counter::Counter;
use core::ptr::NonNull;

/// Outcome of a strategy hook.
#[derive(Copy, Clone, Debug, Eq, PartialEq)]
pub(crate) enum Hook {
    /// The strategy performed the action itself.
    Handled,
    /// The caller must fall back to the ordinary action.
    Unhandled,
}

/// Function table for one (strategy, element type) pair.
///
/// Tables are `'static` and referenced from the block header, so handles of
/// any element type can release a block without knowing how it was built.
pub(crate) struct Strategy {
    #[cfg_attr(not(feature = "tracing"), allow(dead_code))]
    pub(crate) name: &'static str,
    pub(crate) destroy_managed_object: unsafe fn(NonNull<ControlBlock>) -> Hook,
    pub(crate) deallocate_self: unsafe fn(NonNull<ControlBlock>) -> Hook,
    /// Ordinary destruction of the managed object as a standalone `Box`.
    /// Only reached when `destroy_managed_object` reports `Unhandled`.
    pub(crate) drop_standalone: unsafe fn(NonNull<()>),
}

/// Common header placed at offset zero of every strategy's block.
#[repr(C)]
pub(crate) struct ControlBlock {
    pub(crate) shared: Counter,
    pub(crate) weak: Counter,
    // Original, non-aliased managed object.
    managed: NonNull<()>,
    strategy: &'static Strategy,
}

impl ControlBlock {
    pub(crate) fn new(managed: NonNull<()>, strategy: &'static Strategy) -> Self {
        Self::with_counts(1, 0, managed, strategy)
    }

    pub(crate) fn with_counts(
        shared: usize,
        weak: usize,
        managed: NonNull<()>,
        strategy: &'static Strategy,
    ) -> Self {
        Self {
            shared: Counter::new(shared),
            weak: Counter::new(weak),
            managed,
            strategy,
        }
    }

    #[inline]
    pub(crate) fn managed(&self) -> NonNull<()> {
        self.managed
    }
}

/// Ordinary destruction for objects handed over as `Box<T>`.
pub(crate) unsafe fn drop_standalone<T>(object: NonNull<()>) {
    drop(Box::from_raw(object.cast::<T>().as_ptr()));
}

/// Hook body for strategies that defer to the ordinary action.
pub(crate) unsafe fn unhandled(_block: NonNull<ControlBlock>) -> Hook {
    Hook::Unhandled
}

/// Give back one share. When it was the last one, the managed object is
/// destroyed and the block is freed if no observers remain.
///
/// # Safety
/// `block` must be live and the caller must own the share it returns.
pub(crate) unsafe fn release_shared(block: NonNull<ControlBlock>) {
    if !block.as_ref().shared.put() {
        return;
    }
    // Owners hold one weak unit while the object is torn down. A payload
    // observing itself therefore cannot free the block from its own
    // destructor, and the unit is returned even if the destructor panics.
    block.as_ref().weak.get();
    let _teardown = WeakUnit(block);
    destroy_managed_object(block);
}

/// Give back one weak unit, freeing the block if nothing else holds it.
///
/// # Safety
/// `block` must be live and the caller must own the weak unit it returns.
pub(crate) unsafe fn release_weak(block: NonNull<ControlBlock>) {
    let header = block.as_ref();
    if header.weak.put() && header.shared.is_zero() {
        deallocate(block);
    }
}

struct WeakUnit(NonNull<ControlBlock>);

impl Drop for WeakUnit {
    fn drop(&mut self) {
        unsafe { release_weak(self.0) }
    }
}

unsafe fn destroy_managed_object(block: NonNull<ControlBlock>) {
    let strategy = block.as_ref().strategy;
    if (strategy.destroy_managed_object)(block) == Hook::Unhandled {
        (strategy.drop_standalone)(block.as_ref().managed);
    }
}

unsafe fn deallocate(block: NonNull<ControlBlock>) {
    let strategy = block.as_ref().strategy;
    trace_block!(strategy = strategy.name, "control block freed");
    if (strategy.deallocate_self)(block) == Hook::Unhandled {
        drop(Box::from_raw(block.as_ptr()));
    }
}
