// Copyright 2018 0-0-1 and Contributors
//
// Licensed under the Apache License, Version 2.0 <LICENSE-APACHE or
// http://www.apache.org/licenses/LICENSE-2.0> or the MIT license
// <LICENSE-MIT or http://opensource.org/licenses/MIT>, at your
// option. This file may not be copied, modified, or distributed
// except according to those terms.

use std::fmt::{Debug, Formatter, Result as FmtResult};

use crate::block::{AtomicCount, RefCount};
use crate::parts::Parts;
use crate::source::Source;
use crate::strong::Strong;

/// Weak is a handle that holds a non-owning reference to the value of a
/// [`Source`]. The value is accessed by calling [`lock`] on the `Weak`, which
/// returns a [`Strong`] that is empty if the value is gone.
///
/// Since a `Weak` reference does not count towards ownership, it will not
/// prevent the value from being dropped, and the `Weak` itself makes no
/// guarantees about the value still being present. It only keeps the control
/// block alive, so that [`lock`] can tell.
///
/// A `Weak` pointer is useful for keeping a temporary reference to the value
/// without extending its lifetime, e.g. a cache entry or a back-reference
/// from a child to its owner.
///
/// The typical way to obtain a `Weak` pointer is to call [`Source::to_weak`].
/// Unlike [`Source`] and [`Strong`], `Weak` can be [`Clone`]d.
///
/// [`Source`]: ./struct.Source.html
/// [`Strong`]: ./struct.Strong.html
///
/// [`Source::to_weak`]: ./struct.Source.html#method.to_weak
/// [`lock`]: ./struct.Weak.html#method.lock
///
/// [`Clone`]: https://doc.rust-lang.org/std/clone/trait.Clone.html
pub struct Weak<T, C = AtomicCount>
where
    T: ?Sized,
    C: RefCount,
{
    pub(crate) parts: Option<Parts<T, C>>,
}

unsafe impl<T, C> Send for Weak<T, C>
where
    T: Send + Sync + ?Sized,
    C: RefCount + Send + Sync,
{
}

unsafe impl<T, C> Sync for Weak<T, C>
where
    T: Send + Sync + ?Sized,
    C: RefCount + Send + Sync,
{
}

impl<T, C> Weak<T, C>
where
    T: ?Sized,
    C: RefCount,
{
    /// Constructs an empty `Weak`. Calling [`lock`] on the return value always
    /// gives an empty [`Strong`].
    ///
    /// # Examples
    ///
    /// ```rust
    /// use scoped_ptr::{Strong, Weak};
    ///
    /// let empty: Weak<i64> = Weak::new();
    /// assert!(Strong::is_empty(&empty.lock()));
    /// ```
    ///
    /// [`Strong`]: ./struct.Strong.html
    ///
    /// [`lock`]: ./struct.Weak.html#method.lock
    pub fn new() -> Weak<T, C> {
        Weak { parts: None }
    }

    /// Attempts to promote the `Weak` to a [`Strong`], extending the lifetime
    /// of the value if successful.
    ///
    /// Returns an empty `Strong` if the value has since been dropped. This
    /// never blocks; it races any concurrent release of the last strong
    /// handle and either wins (the value stays alive for as long as the
    /// returned `Strong`) or loses (the value is gone for good).
    ///
    /// # Examples
    ///
    /// ```rust
    /// use scoped_ptr::{Source, Strong};
    ///
    /// let five: Source<_> = Source::new(5);
    /// let weak_five = Source::to_weak(&five);
    ///
    /// let strong_five = weak_five.lock();
    /// assert_eq!(5, *strong_five);
    ///
    /// drop(strong_five);
    /// drop(five);
    ///
    /// assert!(Strong::is_empty(&weak_five.lock()));
    /// ```
    ///
    /// [`Strong`]: ./struct.Strong.html
    pub fn lock(&self) -> Strong<T, C> {
        Strong::from_parts(self.parts.and_then(|parts| parts.acquire_strong()))
    }

    /// Gets the number of strong handles to the value, or zero if the `Weak`
    /// is empty or the value is gone.
    pub fn use_count(&self) -> usize {
        self.parts.map_or(0, |parts| parts.block().strong_count())
    }

    /// Gets the number of `Weak`s observing the same value, this one
    /// included, or zero if the `Weak` is empty.
    pub fn weak_count(&self) -> usize {
        self.parts.map_or(0, |parts| parts.block().weak_count())
    }

    /// Returns `true` if the value is gone (or was never there). Once `true`,
    /// it stays `true`.
    pub fn expired(&self) -> bool {
        self.use_count() == 0
    }

    /// Returns `true` if the `Weak` observes nothing at all, not even an
    /// expired value.
    pub fn is_empty(&self) -> bool {
        self.parts.is_none()
    }

    /// Releases the weak reference and leaves the `Weak` empty.
    pub fn reset(&mut self) {
        if let Some(parts) = self.parts.take() {
            unsafe { parts.release_weak() };
        }
    }

    /// Returns `true` if both `Weak`s observe the same allocation, even if
    /// the value is already gone. Two empty `Weak`s are not equal under this
    /// comparison.
    ///
    /// # Examples
    ///
    /// ```rust
    /// use scoped_ptr::Source;
    ///
    /// let five: Source<_> = Source::new(5);
    /// let weak_five = Source::to_weak(&five);
    /// let same_weak_five = weak_five.clone();
    ///
    /// drop(five);
    ///
    /// assert!(weak_five.ptr_eq(&same_weak_five));
    /// ```
    pub fn ptr_eq(&self, other: &Weak<T, C>) -> bool {
        match (self.parts, other.parts) {
            (Some(a), Some(b)) => a.same_block(&b),
            _ => false,
        }
    }
}

impl<T, C> Clone for Weak<T, C>
where
    T: ?Sized,
    C: RefCount,
{
    /// Makes a clone of the `Weak` pointer that observes the same value.
    ///
    /// If the value is already gone, the clone may come out empty: an
    /// expired control block refuses new weak references.
    ///
    /// # Examples
    ///
    /// ```rust
    /// use scoped_ptr::{Source, Weak};
    ///
    /// let five: Source<_> = Source::new(5);
    /// let weak_five = Source::to_weak(&five);
    ///
    /// let same_weak_five = Weak::clone(&weak_five);
    /// assert_eq!(2, same_weak_five.weak_count());
    /// ```
    fn clone(&self) -> Weak<T, C> {
        Weak {
            parts: self.parts.and_then(|parts| parts.acquire_weak()),
        }
    }
}

impl<T, C> Drop for Weak<T, C>
where
    T: ?Sized,
    C: RefCount,
{
    /// Drops the `Weak` pointer.
    ///
    /// # Examples
    ///
    /// ```rust
    /// use scoped_ptr::{Source, Strong, Weak};
    ///
    /// struct Foo;
    ///
    /// impl Drop for Foo {
    ///     fn drop(&mut self) {
    ///         println!("dropped!");
    ///     }
    /// }
    ///
    /// let foo: Source<_> = Source::new(Foo);
    /// let weak_foo = Source::to_weak(&foo);
    /// let other_weak_foo = Weak::clone(&weak_foo);
    ///
    /// drop(weak_foo); // Doesn't print anything
    /// drop(foo); // Prints "dropped!"
    ///
    /// assert!(Strong::is_empty(&other_weak_foo.lock()));
    /// ```
    fn drop(&mut self) {
        self.reset();
    }
}

impl<T, C> Default for Weak<T, C>
where
    T: ?Sized,
    C: RefCount,
{
    /// Constructs an empty `Weak`.
    fn default() -> Weak<T, C> {
        Weak::new()
    }
}

impl<'a, T, C> From<&'a Source<T, C>> for Weak<T, C>
where
    T: ?Sized,
    C: RefCount,
{
    fn from(source: &'a Source<T, C>) -> Weak<T, C> {
        Source::to_weak(source)
    }
}

impl<T, C> Debug for Weak<T, C>
where
    T: ?Sized,
    C: RefCount,
{
    fn fmt(&self, f: &mut Formatter) -> FmtResult {
        write!(f, "(Weak)")
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    use std::cell::Cell;
    use std::mem;

    use crate::block::LocalCount;
    use crate::testing::{DropCount, Tracked};

    #[test]
    fn new_and_default() {
        for i in 0usize..2usize {
            let weak: Weak<usize> = match i {
                0 => Weak::new(),
                1 => Default::default(),
                _ => unreachable!(),
            };

            assert!(weak.is_empty(), "Freshly created weak pointer was not empty.");
            assert!(weak.expired());
            assert_eq!(0, weak.use_count());
            assert_eq!(0, weak.weak_count());
            assert!(
                Strong::is_empty(&weak.lock()),
                "Freshly created weak pointer locked into a non-empty Strong."
            );
            assert!(weak.clone().is_empty(), "Clone of an empty weak pointer was not empty.");
        }
    }

    #[test]
    fn lock() {
        let five: Source<_> = Source::new(5);
        let weak_five = Source::to_weak(&five);

        let strong_five = weak_five.lock();
        assert!(!Strong::is_empty(&strong_five));
        assert!(Strong::is_from(&strong_five, &five));
        assert_eq!(2, Strong::use_count(&strong_five), "lock did not add a strong reference.");

        mem::drop(strong_five);
        assert_eq!(1, weak_five.use_count());

        mem::drop(five);
        assert!(weak_five.expired());
        assert!(Strong::is_empty(&weak_five.lock()));
        // Failing over and over never resurrects anything.
        assert!(Strong::is_empty(&weak_five.lock()));
    }

    #[test]
    fn clone() {
        let five: Source<_> = Source::new(5);
        let weak_five = Weak::from(&five);
        assert_eq!(1, Source::weak_count(&five));

        let same_weak_five = Weak::clone(&weak_five);
        assert!(weak_five.ptr_eq(&same_weak_five));
        assert_eq!(2, Source::weak_count(&five));
        assert_eq!(1, Source::use_count(&five), "cloning a Weak changed the strong count.");

        mem::drop(same_weak_five);
        assert_eq!(1, Source::weak_count(&five));
        assert_eq!(1, Source::use_count(&five));
    }

    #[test]
    fn clone_after_expiry() {
        let five: Source<_, Tracked<3>> = Source::new(5);
        let weak_five = Source::to_weak(&five);
        mem::drop(five);

        let clone = weak_five.clone();
        assert!(clone.is_empty(), "expired control block accepted a new weak reference.");
        assert_eq!(1, weak_five.weak_count());

        mem::drop(clone);
        assert_eq!(0, Tracked::<3>::destroyed());
        mem::drop(weak_five);
        assert_eq!(1, Tracked::<3>::destroyed());
    }

    #[test]
    fn reset() {
        let five: Source<_> = Source::new(5);
        let mut weak_five = Source::to_weak(&five);

        weak_five.reset();
        assert!(weak_five.is_empty());
        assert_eq!(0, Source::weak_count(&five));

        weak_five.reset();
        assert_eq!(0, Source::weak_count(&five));
    }

    #[test]
    fn move_keeps_counts() {
        let five: Source<_> = Source::new(5);
        let mut slot = Source::to_weak(&five);

        let moved = mem::take(&mut slot);
        assert!(slot.is_empty());
        assert!(!moved.is_empty());
        assert_eq!(1, Source::weak_count(&five));
        assert_eq!(1, Source::use_count(&five));
    }

    // Same checks as the `Drop` documentation example, with a flag instead of
    // printing.
    #[test]
    fn drop() {
        struct Foo<'a>(&'a Cell<bool>);

        impl<'a> Drop for Foo<'a> {
            fn drop(&mut self) {
                self.0.set(true);
            }
        }

        let cell = Cell::new(false);

        let foo: Source<_, LocalCount> = Source::new(Foo(&cell));
        let weak_foo = Source::to_weak(&foo);
        let other_weak_foo = Weak::clone(&weak_foo);

        // Cell is currently false.
        assert_eq!(cell.get(), false);

        // Cell is not set to true since Foo::drop is not run.
        mem::drop(weak_foo);
        assert_eq!(cell.get(), false);

        // Cell is set to true here since Foo::drop is run.
        mem::drop(foo);
        assert_eq!(cell.get(), true);

        // The remaining weak pointer cannot be locked because no strong pointer
        // remains!
        assert!(Strong::is_empty(&other_weak_foo.lock()));
    }

    #[test]
    fn block_outlives_value() {
        let drops = DropCount::new();
        let source: Source<_, Tracked<4>> = Source::new(drops.token());
        let weak = Source::to_weak(&source);

        mem::drop(source);
        assert_eq!(1, drops.get());
        assert_eq!(0, Tracked::<4>::destroyed(), "block freed while a Weak remained.");
        assert_eq!(1, weak.weak_count());

        mem::drop(weak);
        assert_eq!(1, Tracked::<4>::destroyed());
    }

    #[test]
    fn debug() {
        let weak: Weak<usize> = Weak::new();

        assert_eq!(
            format!("{:?}", weak),
            "(Weak)",
            "Weak pointers should debug-format to the string \"(Weak)\""
        );
    }
}
