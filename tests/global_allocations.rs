// Allocation counts through the global allocator.
//
// The counting allocator is per-thread so that tests running in parallel do
// not see each other's allocations.
use rc_shared::{make_shared, SharedPtr};
use std::alloc::{GlobalAlloc, Layout, System};
use std::cell::Cell;

struct PerThreadCounter;

thread_local! {
    static ALLOCATIONS: Cell<usize> = const { Cell::new(0) };
}

unsafe impl GlobalAlloc for PerThreadCounter {
    unsafe fn alloc(&self, layout: Layout) -> *mut u8 {
        let _ = ALLOCATIONS.try_with(|c| c.set(c.get() + 1));
        System.alloc(layout)
    }

    unsafe fn dealloc(&self, ptr: *mut u8, layout: Layout) {
        System.dealloc(ptr, layout)
    }
}

#[global_allocator]
static GLOBAL: PerThreadCounter = PerThreadCounter;

fn allocations_during(f: impl FnOnce()) -> usize {
    let before = ALLOCATIONS.with(Cell::get);
    f();
    ALLOCATIONS.with(Cell::get) - before
}

fn warm_up() {
    // First use of a trace callsite may register it.
    drop(make_shared(0u8));
    drop(SharedPtr::new(0u8));
}

#[test]
fn make_shared_allocates_once() {
    warm_up();
    let n = allocations_during(|| {
        let p = make_shared([1u64; 8]);
        let q = p.clone();
        let w = q.downgrade();
        drop((p, q, w));
    });
    assert_eq!(n, 1);
}

#[test]
fn new_allocates_object_and_block_separately() {
    warm_up();
    let n = allocations_during(|| {
        let p = SharedPtr::new([1u64; 8]);
        drop(p.clone());
    });
    assert_eq!(n, 2);
}

#[test]
fn handle_operations_do_not_allocate() {
    warm_up();
    let p = make_shared(String::from("x"));
    let n = allocations_during(|| {
        let q = p.clone();
        let w = q.downgrade();
        let r = w.lock();
        let a = r.alias(|s| s.as_str());
        drop((q, w, r, a));
    });
    assert_eq!(n, 0);
}
