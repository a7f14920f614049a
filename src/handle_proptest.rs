#![cfg(test)]

// Property tests for the handle/control-block protocol kept inside the
// crate so they can inspect the block a handle points at.

use crate::allocator::{AllocError, Allocator, Global};
use crate::make_shared::allocate_shared;
use crate::shared_ptr::SharedPtr;
use crate::weak_ptr::WeakPtr;
use core::alloc::Layout;
use core::ptr::NonNull;
use proptest::prelude::*;
use std::cell::Cell;
use std::rc::Rc;

#[derive(Default)]
struct Ledger {
    allocations: Cell<usize>,
    deallocations: Cell<usize>,
}

#[derive(Clone, Default)]
struct LedgerAlloc(Rc<Ledger>);

unsafe impl Allocator for LedgerAlloc {
    fn allocate(&self, layout: Layout) -> Result<NonNull<u8>, AllocError> {
        let ptr = Global.allocate(layout)?;
        self.0.allocations.set(self.0.allocations.get() + 1);
        Ok(ptr)
    }

    unsafe fn deallocate(&self, ptr: NonNull<u8>, layout: Layout) {
        self.0.deallocations.set(self.0.deallocations.get() + 1);
        Global.deallocate(ptr, layout)
    }
}

struct Payload(Rc<Cell<usize>>);

impl Drop for Payload {
    fn drop(&mut self) {
        self.0.set(self.0.get() + 1);
    }
}

#[derive(Clone, Copy, Debug)]
enum Origin {
    Boxed,
    Deleter,
    Embedded,
}

#[derive(Clone, Debug)]
enum Op {
    CloneShared(usize),
    DropShared(usize),
    ResetShared(usize),
    Downgrade(usize),
    CloneWeak(usize),
    DropWeak(usize),
    Lock(usize),
}

fn arb_origin() -> impl Strategy<Value = Origin> {
    prop_oneof![
        Just(Origin::Boxed),
        Just(Origin::Deleter),
        Just(Origin::Embedded)
    ]
}

fn arb_ops() -> impl Strategy<Value = Vec<Op>> {
    proptest::collection::vec(
        prop_oneof![
            (0usize..8).prop_map(Op::CloneShared),
            (0usize..8).prop_map(Op::DropShared),
            (0usize..8).prop_map(Op::ResetShared),
            (0usize..8).prop_map(Op::Downgrade),
            (0usize..8).prop_map(Op::CloneWeak),
            (0usize..8).prop_map(Op::DropWeak),
            (0usize..8).prop_map(Op::Lock),
        ],
        1..64,
    )
}

fn build(origin: Origin, drops: &Rc<Cell<usize>>, alloc: &LedgerAlloc) -> SharedPtr<Payload> {
    let payload = Payload(drops.clone());
    match origin {
        Origin::Boxed => SharedPtr::new(payload),
        Origin::Deleter => {
            let ptr = NonNull::from(Box::leak(Box::new(payload)));
            unsafe {
                SharedPtr::with_deleter_in(
                    ptr,
                    |p: NonNull<Payload>| drop(Box::from_raw(p.as_ptr())),
                    alloc.clone(),
                )
            }
        }
        Origin::Embedded => allocate_shared(alloc.clone(), payload),
    }
}

// Model: the vectors of live handles. Invariants checked after each step:
// - every owner reports use_count == number of owners and weak_count ==
//   number of observers;
// - the payload has been dropped iff no owner remains, and at most once;
// - observers are expired iff no owner remains, and lock never revives;
// - for allocator-backed blocks, the block is freed iff no handle remains.
proptest! {
    #[test]
    fn prop_counts_follow_handles(origin in arb_origin(), ops in arb_ops()) {
        let drops = Rc::new(Cell::new(0));
        let alloc = LedgerAlloc::default();
        let mut owners = vec![build(origin, &drops, &alloc)];
        let mut observers: Vec<WeakPtr<Payload>> = Vec::new();

        for op in ops {
            match op {
                Op::CloneShared(i) => {
                    if !owners.is_empty() {
                        let c = owners[i % owners.len()].clone();
                        owners.push(c);
                    }
                }
                Op::DropShared(i) => {
                    if !owners.is_empty() {
                        let n = owners.len();
                        drop(owners.swap_remove(i % n));
                    }
                }
                Op::ResetShared(i) => {
                    if !owners.is_empty() {
                        let n = owners.len();
                        let mut p = owners.swap_remove(i % n);
                        p.reset();
                        prop_assert!(p.is_null());
                        prop_assert_eq!(p.use_count(), 0);
                    }
                }
                Op::Downgrade(i) => {
                    if !owners.is_empty() {
                        let w = owners[i % owners.len()].downgrade();
                        observers.push(w);
                    }
                }
                Op::CloneWeak(i) => {
                    if !observers.is_empty() {
                        let c = observers[i % observers.len()].clone();
                        observers.push(c);
                    }
                }
                Op::DropWeak(i) => {
                    if !observers.is_empty() {
                        let n = observers.len();
                        drop(observers.swap_remove(i % n));
                    }
                }
                Op::Lock(i) => {
                    if !observers.is_empty() {
                        let w = &observers[i % observers.len()];
                        let before = w.use_count();
                        let locked = w.lock();
                        if before == 0 {
                            prop_assert!(locked.is_null());
                            prop_assert_eq!(w.use_count(), 0);
                        } else {
                            prop_assert_eq!(locked.use_count(), before + 1);
                            owners.push(locked);
                        }
                    }
                }
            }

            for p in &owners {
                prop_assert_eq!(p.use_count(), owners.len());
                prop_assert_eq!(p.weak_count(), observers.len());
            }
            for w in &observers {
                prop_assert_eq!(w.expired(), owners.is_empty());
                prop_assert_eq!(w.use_count(), owners.len());
                prop_assert_eq!(w.weak_count(), observers.len());
            }
            prop_assert_eq!(drops.get(), usize::from(owners.is_empty()));

            if !matches!(origin, Origin::Boxed) {
                prop_assert_eq!(alloc.0.allocations.get(), 1);
                let freed = owners.is_empty() && observers.is_empty();
                prop_assert_eq!(alloc.0.deallocations.get(), usize::from(freed));
            }
        }

        drop(owners);
        drop(observers);
        prop_assert_eq!(drops.get(), 1);
        if !matches!(origin, Origin::Boxed) {
            prop_assert_eq!(alloc.0.deallocations.get(), 1);
        }
    }
}
