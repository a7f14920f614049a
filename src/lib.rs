//! rc-shared: single-threaded shared/weak pointers built on an explicit,
//! type-erased control block with pluggable destruction and allocation.
//!
//! Internal Design:
//!
//! Summary
//! - Goal: an owning handle (`SharedPtr<T>`) and an observing handle
//!   (`WeakPtr<T>`) whose bookkeeping lives in a control block that does
//!   not depend on the element type, so handles can be aliased and
//!   converted freely while the original object is still destroyed the way
//!   it was created.
//! - Layers:
//!   - Counter: plain `Cell<usize>` counter with overflow abort.
//!   - ControlBlock: header `{shared, weak, managed, strategy}` plus the
//!     release algorithms. The strategy is a `'static` table with two hooks,
//!     `destroy_managed_object` and `deallocate_self`, each reporting
//!     whether it handled the action or the caller must do the ordinary
//!     thing.
//!   - Strategies: `Default` (object boxed on its own, bare header boxed),
//!     `Regular` (user deleter and allocator), `Embedded` (value stored in
//!     the block, one allocation).
//!   - Handles: `SharedPtr` owns one shared unit, `WeakPtr` one weak unit.
//!   - Capabilities: `Upcast` for element-type conversion and
//!     `SharedFromThis` for self-awareness.
//!
//! Constraints
//! - Single-threaded: `!Send`/`!Sync` by construction (no atomics).
//! - The managed object is alive iff `shared > 0`; the block is freed
//!   exactly once, when `shared == 0 && weak == 0`.
//! - `WeakPtr::lock` never raises the shared count from zero.
//! - While the managed object is being destroyed the owners collectively
//!   hold one weak unit, so a payload that observes itself cannot free the
//!   block from its own destructor.
//!
//! Overflow semantics
//! - Count overflow aborts the process, matching `Rc`. Underflow is a bug
//!   in this crate and asserts.
//!
//! Divergences from a zero-check baseline
//! - Dereferencing an empty `SharedPtr` panics instead of being undefined.
//!   `get()` returns `Option<&T>` for callers that expect emptiness.
//! - Constructors that take raw pointers are `unsafe`; everything else is
//!   safe to call.
//! - Block-creating constructors require `T: 'static`: the block erases the
//!   element type and aliasing may change it, so the erased destructor must
//!   not depend on borrows the handle type no longer mentions.
//!
//! Notes and non-goals
//! - No cycle collection; break cycles with `WeakPtr`.
//! - Self-awareness is opt-in through a trait bound
//!   (`SharedPtr::enable_shared_from_this`) or `make_shared_cyclic`; it
//!   tracks the managed object, never an alias of it.

// Trace-level events on control-block allocation and release.
macro_rules! trace_block {
    ($($arg:tt)+) => {
        #[cfg(feature = "tracing")]
        tracing::trace!($($arg)+);
    };
}

mod allocator;
mod control_block;
mod counter;
mod handle_proptest;
mod make_shared;
mod shared_from_this;
mod shared_ptr;
mod strategies;
mod upcast;
mod weak_ptr;

// Public surface
pub use allocator::{AllocError, Allocator, Global};
pub use make_shared::{
    allocate_shared, allocate_shared_with, make_shared, make_shared_cyclic, make_shared_with,
    try_allocate_shared, try_allocate_shared_with,
};
pub use shared_from_this::{SharedFromThis, WeakThis};
pub use shared_ptr::SharedPtr;
pub use upcast::Upcast;
pub use weak_ptr::WeakPtr;
