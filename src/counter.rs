//! Plain, non-atomic reference counter used for both halves of a control
//! block.

use core::cell::Cell;

/// Single-threaded reference counter.
///
/// `get` follows `Rc` semantics and aborts on overflow; `put` reports
/// whether the count just reached zero.
#[derive(Debug)]
pub(crate) struct Counter {
    count: Cell<usize>,
}

impl Counter {
    pub(crate) const fn new(initial: usize) -> Self {
        Self {
            count: Cell::new(initial),
        }
    }

    #[inline]
    pub(crate) fn load(&self) -> usize {
        self.count.get()
    }

    #[inline]
    pub(crate) fn is_zero(&self) -> bool {
        self.count.get() == 0
    }

    /// Acquire one unit.
    #[inline]
    pub(crate) fn get(&self) {
        let n = self.count.get().wrapping_add(1);
        self.count.set(n);
        if n == 0 {
            // Follow Rc semantics: abort on overflow rather than continue unsafely.
            std::process::abort();
        }
    }

    /// Acquire one unit only if at least one is already held. A count of
    /// zero is never raised back up.
    #[inline]
    pub(crate) fn try_get(&self) -> bool {
        if self.is_zero() {
            return false;
        }
        self.get();
        true
    }

    /// Release one unit. Returns true if the count is now zero.
    #[inline]
    pub(crate) fn put(&self) -> bool {
        let c = self.count.get();
        assert!(c > 0, "Counter underflow");
        let n = c - 1;
        self.count.set(n);
        n == 0
    }
}

#[cfg(test)]
mod tests {
    use super::Counter;

    #[test]
    fn get_and_put_report_zero() {
        let c = Counter::new(1);
        c.get();
        assert_eq!(c.load(), 2);
        assert!(!c.put());
        assert!(c.put());
        assert!(c.is_zero());
    }

    #[test]
    fn try_get_refuses_zero() {
        let c = Counter::new(0);
        assert!(!c.try_get());
        assert_eq!(c.load(), 0);

        c.get();
        assert!(c.try_get());
        assert_eq!(c.load(), 2);
    }

    #[test]
    #[should_panic(expected = "Counter underflow")]
    fn put_below_zero_panics() {
        let c = Counter::new(0);
        c.put();
    }
}
