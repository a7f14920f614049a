// Shared helpers for the integration tests: an instrumented allocator and a
// payload that records its own destruction.
#![allow(dead_code)]

use rc_shared::{AllocError, Allocator, Global};
use std::alloc::Layout;
use std::cell::Cell;
use std::ptr::NonNull;
use std::rc::Rc;

#[derive(Debug, Default)]
pub struct AllocStats {
    pub allocations: Cell<usize>,
    pub deallocations: Cell<usize>,
    pub fail_next: Cell<bool>,
}

/// Allocator that counts calls and can be told to fail the next request.
#[derive(Clone, Debug, Default)]
pub struct CountingAlloc {
    pub stats: Rc<AllocStats>,
}

impl CountingAlloc {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn allocations(&self) -> usize {
        self.stats.allocations.get()
    }

    pub fn deallocations(&self) -> usize {
        self.stats.deallocations.get()
    }

    pub fn live(&self) -> usize {
        self.allocations() - self.deallocations()
    }

    pub fn fail_next(&self) {
        self.stats.fail_next.set(true);
    }
}

unsafe impl Allocator for CountingAlloc {
    fn allocate(&self, layout: Layout) -> Result<NonNull<u8>, AllocError> {
        if self.stats.fail_next.replace(false) {
            return Err(AllocError::new(layout));
        }
        let ptr = Global.allocate(layout)?;
        self.stats.allocations.set(self.stats.allocations.get() + 1);
        Ok(ptr)
    }

    unsafe fn deallocate(&self, ptr: NonNull<u8>, layout: Layout) {
        self.stats.deallocations.set(self.stats.deallocations.get() + 1);
        Global.deallocate(ptr, layout)
    }
}

/// Payload that bumps a shared counter when dropped.
#[derive(Debug)]
pub struct Tracked {
    pub id: u32,
    drops: Rc<Cell<usize>>,
}

impl Tracked {
    pub fn new(id: u32, drops: &Rc<Cell<usize>>) -> Self {
        Self {
            id,
            drops: drops.clone(),
        }
    }
}

impl Drop for Tracked {
    fn drop(&mut self) {
        self.drops.set(self.drops.get() + 1);
    }
}

pub fn drop_counter() -> Rc<Cell<usize>> {
    Rc::new(Cell::new(0))
}

/// Raw pointer to a freshly boxed value, as handed to the deleter
/// constructors.
pub fn leak<T>(value: T) -> NonNull<T> {
    NonNull::from(Box::leak(Box::new(value)))
}
