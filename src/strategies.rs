//! Control block strategies.
//!
//! - `DefaultBlock`: bare header in its own `Box`; object and block are
//!   allocated and freed independently, both hooks defer to the ordinary
//!   action.
//! - `RegularBlock`: header plus a user deleter and a user allocator.
//! - `EmbeddedBlock`: header, allocator and the value itself in a single
//!   allocation.
//!
//! Every block is `#[repr(C)]` with the header first, so a
//! `NonNull<ControlBlock>` can be cast back to the concrete block inside
//! that strategy's hooks.

use crate::allocator::{AllocError, Allocator};
use crate::control_block::{drop_standalone, unhandled, ControlBlock, Hook, Strategy};
use core::alloc::Layout;
use core::marker::PhantomData;
use core::mem::{ManuallyDrop, MaybeUninit};
use core::ptr::{addr_of, addr_of_mut, NonNull};

pub(crate) struct DefaultBlock<T>(PhantomData<fn(T)>);

impl<T> DefaultBlock<T> {
    const STRATEGY: Strategy = Strategy {
        name: "default",
        destroy_managed_object: unhandled,
        deallocate_self: unhandled,
        drop_standalone: drop_standalone::<T>,
    };

    /// Take ownership of `object`, which must come from `Box::into_raw`.
    pub(crate) fn allocate(object: NonNull<T>) -> NonNull<ControlBlock> {
        let block = Box::new(ControlBlock::new(object.cast(), &Self::STRATEGY));
        trace_block!(
            strategy = "default",
            size = core::mem::size_of::<ControlBlock>(),
            "control block allocated"
        );
        NonNull::from(Box::leak(block))
    }
}

#[repr(C)]
pub(crate) struct RegularBlock<T, D, A> {
    header: ControlBlock,
    // Taken by the destroy hook.
    deleter: ManuallyDrop<D>,
    // Taken by the deallocate hook.
    alloc: ManuallyDrop<A>,
    _object: PhantomData<fn(NonNull<T>)>,
}

impl<T, D, A> RegularBlock<T, D, A>
where
    D: FnOnce(NonNull<T>),
    A: Allocator,
{
    const STRATEGY: Strategy = Strategy {
        name: "regular",
        destroy_managed_object: Self::destroy_object,
        deallocate_self: Self::free_block,
        drop_standalone: drop_standalone::<T>,
    };

    /// Allocate a block through `alloc`. On failure the deleter is handed
    /// back so the caller can still dispose of `object`.
    pub(crate) fn allocate(
        object: NonNull<T>,
        deleter: D,
        alloc: A,
    ) -> Result<NonNull<ControlBlock>, (AllocError, D)> {
        let layout = Layout::new::<Self>();
        let raw = match alloc.allocate(layout) {
            Ok(p) => p.cast::<Self>(),
            Err(e) => return Err((e, deleter)),
        };
        unsafe {
            raw.as_ptr().write(Self {
                header: ControlBlock::new(object.cast(), &Self::STRATEGY),
                deleter: ManuallyDrop::new(deleter),
                alloc: ManuallyDrop::new(alloc),
                _object: PhantomData,
            });
        }
        trace_block!(
            strategy = "regular",
            size = layout.size(),
            "control block allocated"
        );
        Ok(raw.cast())
    }

    unsafe fn destroy_object(block: NonNull<ControlBlock>) -> Hook {
        let this = block.cast::<Self>().as_ptr();
        let deleter = ManuallyDrop::take(&mut (*this).deleter);
        deleter((*this).header.managed().cast());
        Hook::Handled
    }

    unsafe fn free_block(block: NonNull<ControlBlock>) -> Hook {
        let this = block.cast::<Self>();
        let alloc = ManuallyDrop::take(&mut (*this.as_ptr()).alloc);
        alloc.deallocate(this.cast(), Layout::new::<Self>());
        Hook::Handled
    }
}

#[repr(C)]
pub(crate) struct EmbeddedBlock<T, A> {
    header: ControlBlock,
    alloc: ManuallyDrop<A>,
    value: MaybeUninit<T>,
}

impl<T, A: Allocator> EmbeddedBlock<T, A> {
    const STRATEGY: Strategy = Strategy {
        name: "embedded",
        destroy_managed_object: Self::destroy_object,
        deallocate_self: Self::free_block,
        drop_standalone: drop_standalone::<T>,
    };

    /// Allocate a block whose value slot is still uninitialized. The header
    /// starts with the given counts.
    pub(crate) fn allocate_uninit(
        alloc: A,
        shared: usize,
        weak: usize,
    ) -> Result<NonNull<Self>, AllocError> {
        let layout = Layout::new::<Self>();
        let raw = alloc.allocate(layout)?.cast::<Self>();
        unsafe {
            let value = NonNull::new_unchecked(addr_of_mut!((*raw.as_ptr()).value).cast::<T>());
            addr_of_mut!((*raw.as_ptr()).header).write(ControlBlock::with_counts(
                shared,
                weak,
                value.cast(),
                &Self::STRATEGY,
            ));
            addr_of_mut!((*raw.as_ptr()).alloc).write(ManuallyDrop::new(alloc));
        }
        trace_block!(
            strategy = "embedded",
            size = layout.size(),
            "control block allocated"
        );
        Ok(raw)
    }

    #[inline]
    pub(crate) fn header(block: NonNull<Self>) -> NonNull<ControlBlock> {
        block.cast()
    }

    #[inline]
    pub(crate) fn value_ptr(block: NonNull<Self>) -> NonNull<T> {
        unsafe { NonNull::new_unchecked(addr_of_mut!((*block.as_ptr()).value).cast::<T>()) }
    }

    /// Move `value` into the block through its own allocator.
    ///
    /// # Safety
    /// The value slot must be uninitialized.
    pub(crate) unsafe fn construct(block: NonNull<Self>, value: T) {
        let alloc: &A = &*addr_of!((*block.as_ptr()).alloc);
        alloc.construct(Self::value_ptr(block), value);
    }

    /// Free a block whose value was never constructed.
    ///
    /// # Safety
    /// No handle may refer to `block`.
    pub(crate) unsafe fn abandon(block: NonNull<Self>) {
        trace_block!(strategy = "embedded", "control block abandoned");
        Self::free_block(block.cast());
    }

    unsafe fn destroy_object(block: NonNull<ControlBlock>) -> Hook {
        let this = block.cast::<Self>();
        let alloc: &A = &*addr_of!((*this.as_ptr()).alloc);
        alloc.destroy(Self::value_ptr(this));
        Hook::Handled
    }

    unsafe fn free_block(block: NonNull<ControlBlock>) -> Hook {
        let this = block.cast::<Self>();
        let alloc = ManuallyDrop::take(&mut (*this.as_ptr()).alloc);
        alloc.deallocate(this.cast(), Layout::new::<Self>());
        Hook::Handled
    }
}
