// Self-awareness test suite.
//
// Invariants exercised:
// - shared_from_this() returns an owner of the same control block as the
//   handle that attached the object.
// - With no owner (never attached, still under construction, or already
//   released) it returns an empty handle.
// - The slot is populated once; aliasing never populates it.
mod support;

use rc_shared::{
    make_shared, make_shared_cyclic, SharedFromThis, SharedPtr, WeakPtr, WeakThis,
};
use std::cell::Cell;
use std::rc::Rc;
use support::{drop_counter, Tracked};

#[derive(Default)]
struct Session {
    this: WeakThis<Session>,
    hits: Cell<u32>,
}

impl SharedFromThis for Session {
    fn weak_this(&self) -> &WeakThis<Self> {
        &self.this
    }
}

impl Session {
    fn touch(&self) -> SharedPtr<Session> {
        self.hits.set(self.hits.get() + 1);
        self.shared_from_this()
    }
}

// Test: attached through SharedPtr::new.
// Verifies: the returned owner shares the block and the count rises by one.
#[test]
fn shared_from_this_shares_the_owner_block() {
    let s = SharedPtr::new(Session::default()).enable_shared_from_this();
    assert_eq!(s.use_count(), 1);
    assert_eq!(s.weak_count(), 1);

    let again = s.touch();
    assert!(again.owner_eq(&s));
    assert!(again.ptr_eq(&s));
    assert_eq!(s.use_count(), 2);
    assert_eq!(s.hits.get(), 1);

    let weak = s.weak_from_this();
    assert!(weak.lock().owner_eq(&s));
}

// Test: no owner was ever attached.
#[test]
fn unattached_object_yields_empty() {
    let bare = Session::default();
    assert!(!bare.this.is_attached());
    assert!(bare.shared_from_this().is_null());
    assert!(bare.weak_from_this().expired());

    // Owned, but never attached.
    let owned = make_shared(Session::default());
    assert!(owned.shared_from_this().is_null());
    assert_eq!(owned.weak_count(), 0);
}

// Test: during cyclic construction no owner exists yet.
#[test]
fn empty_during_construction() {
    struct Widget {
        this: WeakThis<Widget>,
        saw_owner: bool,
    }
    impl SharedFromThis for Widget {
        fn weak_this(&self) -> &WeakThis<Self> {
            &self.this
        }
    }

    let w = make_shared_cyclic(|me: &WeakPtr<Widget>| {
        let this = WeakThis::from(me.clone());
        let saw_owner = !this.upgrade().is_null();
        Widget { this, saw_owner }
    });
    assert!(!w.saw_owner);
    assert!(w.shared_from_this().owner_eq(&w));
    assert_eq!(w.use_count(), 1);
}

// Test: after every owner is gone the slot reports empty.
#[test]
fn empty_after_owners_released() {
    struct Holder {
        this: WeakThis<Holder>,
        _tag: Tracked,
    }
    impl SharedFromThis for Holder {
        fn weak_this(&self) -> &WeakThis<Self> {
            &self.this
        }
    }

    let drops = drop_counter();
    let h = make_shared(Holder {
        this: WeakThis::new(),
        _tag: Tracked::new(1, &drops),
    })
    .enable_shared_from_this();
    let observer = h.weak_from_this();
    drop(h);
    assert_eq!(drops.get(), 1);
    assert!(observer.expired());
    assert!(observer.lock().is_null());
}

// Test: the slot is populated the first time only.
// Verifies: attaching again through another owner leaves the slot as it
// was, holding a single observer.
#[test]
fn slot_is_attached_once() {
    let first = make_shared(Session::default()).enable_shared_from_this();
    let again = first.clone().enable_shared_from_this();
    assert!(again.owner_eq(&first));
    assert_eq!(first.weak_count(), 1);
    assert!(first.shared_from_this().owner_eq(&first));
}

// Test: aliasing an object never attaches its slot.
#[test]
fn aliasing_does_not_attach() {
    struct Outer {
        inner: Session,
    }
    let outer = make_shared(Outer {
        inner: Session::default(),
    });
    let inner = outer.alias(|o| &o.inner);
    assert!(!inner.this.is_attached());
    assert!(inner.shared_from_this().is_null());
    assert_eq!(outer.weak_count(), 0);

    // Attaching explicitly through the alias tracks the outer block.
    let inner = inner.enable_shared_from_this();
    assert!(inner.shared_from_this().owner_eq(&outer));
}

// Test: an object may hand out owners of itself from its own methods and
// those owners keep it alive after the original handle is gone.
#[test]
fn minted_owner_outlives_original_handle() {
    let drops = drop_counter();
    struct Job {
        this: WeakThis<Job>,
        _tag: Tracked,
        done: Rc<Cell<bool>>,
    }
    impl SharedFromThis for Job {
        fn weak_this(&self) -> &WeakThis<Self> {
            &self.this
        }
    }
    let done = Rc::new(Cell::new(false));
    let job = SharedPtr::new(Job {
        this: WeakThis::new(),
        _tag: Tracked::new(2, &drops),
        done: done.clone(),
    })
    .enable_shared_from_this();
    let keep = job.shared_from_this();
    drop(job);
    assert_eq!(drops.get(), 0);
    keep.done.set(true);
    drop(keep);
    assert!(done.get());
    assert_eq!(drops.get(), 1);
}
