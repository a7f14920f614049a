//! Element-type conversion for handles.

use core::ptr::NonNull;

/// Declares that a pointer to `Self` converts to a pointer to `U` at the
/// same address, usually an unsizing coercion such as
/// `Circle -> dyn Shape`.
///
/// The conversion is applied to pointers held by observing handles too, so
/// it must not read through the pointer.
///
/// # Safety
///
/// `upcast` must return a pointer to the same object it was given, without
/// dereferencing it. Prefer the [`upcast!`](crate::upcast!) macro, which
/// only accepts conversions the compiler can coerce.
pub unsafe trait Upcast<U: ?Sized> {
    fn upcast(ptr: NonNull<Self>) -> NonNull<U>;
}

/// Implement [`Upcast`] for coercible pairs of types.
///
/// ```
/// use rc_shared::{make_shared, upcast, SharedPtr};
///
/// trait Shape { fn area(&self) -> f64; }
/// struct Square(f64);
/// impl Shape for Square { fn area(&self) -> f64 { self.0 * self.0 } }
///
/// upcast!(Square => dyn Shape);
///
/// let square = make_shared(Square(3.0));
/// let shape: SharedPtr<dyn Shape> = square.upcast();
/// assert_eq!(shape.area(), 9.0);
/// assert_eq!(square.use_count(), 2);
/// ```
#[macro_export]
macro_rules! upcast {
    ($($from:ty => $to:ty),+ $(,)?) => {
        $(
            unsafe impl $crate::Upcast<$to> for $from {
                #[inline]
                fn upcast(ptr: ::core::ptr::NonNull<Self>) -> ::core::ptr::NonNull<$to> {
                    ptr
                }
            }
        )+
    };
}
