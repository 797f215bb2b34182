// Copyright 2018 0-0-1 and Contributors
//
// Licensed under the Apache License, Version 2.0 <LICENSE-APACHE or
// http://www.apache.org/licenses/LICENSE-2.0> or the MIT license
// <LICENSE-MIT or http://opensource.org/licenses/MIT>, at your
// option. This file may not be copied, modified, or distributed
// except according to those terms.

use std::fmt::{Debug, Formatter, Pointer, Result as FmtResult};
use std::marker::PhantomData;
use std::ops::Deref;

use crate::block::{AtomicCount, RefCount};
use crate::parts::Parts;
use crate::strong::Strong;
use crate::weak::Weak;

/// The originating handle of a pointer family. A `Source` owns its value the
/// way a [`Box`] does, but can hand out [`Strong`] handles that keep the value
/// alive and [`Weak`] handles that observe it.
///
/// A `Source` is either empty or holding. Only a `Source` can be created from
/// a value; every other handle is derived from one. It cannot be cloned, only
/// moved.
///
/// The inherent methods of `Source` are all associated functions, which means
/// you have to call them as e.g. [`Source::to_weak(&value)`][`to_weak`]
/// instead of `value.to_weak()`. This avoids conflict with methods of the
/// inner type `T`.
///
/// [`Strong`]: ./struct.Strong.html
/// [`Weak`]: ./struct.Weak.html
///
/// [`to_weak`]: ./struct.Source.html#method.to_weak
///
/// [`Box`]: https://doc.rust-lang.org/std/boxed/struct.Box.html
pub struct Source<T, C = AtomicCount>
where
    T: ?Sized,
    C: RefCount,
{
    pub(crate) parts: Option<Parts<T, C>>,
    pub(crate) phantom: PhantomData<T>,
}

unsafe impl<T, C> Send for Source<T, C>
where
    T: Send + Sync + ?Sized,
    C: RefCount + Send + Sync,
{
}

unsafe impl<T, C> Sync for Source<T, C>
where
    T: Send + Sync + ?Sized,
    C: RefCount + Send + Sync,
{
}

impl<T, C> Source<T, C>
where
    C: RefCount,
{
    /// Constructs a new `Source` holding `value`.
    ///
    /// # Examples
    ///
    /// ```rust
    /// use scoped_ptr::Source;
    ///
    /// let five: Source<_> = Source::new(5);
    /// assert_eq!(1, Source::use_count(&five));
    /// ```
    pub fn new(value: T) -> Source<T, C> {
        Source::from(Box::new(value))
    }

    /// Drops the current value (if this was its last strong handle) and starts
    /// holding `value` under a brand new control block. Handles derived
    /// before the reset keep following the old value.
    ///
    /// # Examples
    ///
    /// ```rust
    /// use scoped_ptr::{Source, Strong};
    ///
    /// let mut source: Source<_> = Source::new(1);
    /// let weak = Source::to_weak(&source);
    ///
    /// Source::reset(&mut source, 2);
    ///
    /// assert_eq!(2, *source);
    /// assert!(Strong::is_empty(&weak.lock()));
    /// ```
    pub fn reset(this: &mut Source<T, C>, value: T) {
        *this = Source::new(value);
    }
}

impl<T, C> Source<T, C>
where
    T: ?Sized,
    C: RefCount,
{
    /// Constructs an empty `Source`. Every handle derived from it is empty as
    /// well.
    ///
    /// # Examples
    ///
    /// ```rust
    /// use scoped_ptr::{Source, Strong};
    ///
    /// let nothing: Source<i32> = Source::empty();
    /// assert!(Source::is_empty(&nothing));
    /// assert!(Strong::is_empty(&Source::to_strong(&nothing)));
    /// ```
    pub fn empty() -> Source<T, C> {
        Source {
            parts: None,
            phantom: PhantomData,
        }
    }

    /// Creates a new [`Weak`] handle observing this value. Returns an empty
    /// `Weak` if the `Source` is empty.
    ///
    /// # Examples
    ///
    /// ```rust
    /// use scoped_ptr::Source;
    ///
    /// let five: Source<_> = Source::new(5);
    ///
    /// let weak_five = Source::to_weak(&five);
    /// assert_eq!(1, weak_five.weak_count());
    /// ```
    ///
    /// [`Weak`]: ./struct.Weak.html
    pub fn to_weak(this: &Source<T, C>) -> Weak<T, C> {
        Weak {
            parts: this.parts.and_then(|parts| parts.acquire_weak()),
        }
    }

    /// Creates a new [`Strong`] handle to this value, incrementing the strong
    /// count. Returns an empty `Strong` if the `Source` is empty.
    ///
    /// # Examples
    ///
    /// ```rust
    /// use scoped_ptr::Source;
    ///
    /// let five: Source<_> = Source::new(5);
    /// let strong_five = Source::to_strong(&five);
    ///
    /// assert_eq!(2, Source::use_count(&five));
    ///
    /// drop(five);
    /// assert_eq!(5, *strong_five);
    /// ```
    ///
    /// [`Strong`]: ./struct.Strong.html
    pub fn to_strong(this: &Source<T, C>) -> Strong<T, C> {
        Strong::from_parts(this.parts.and_then(|parts| parts.acquire_strong()))
    }

    /// Gets the number of strong handles (this `Source` included) to the value,
    /// or zero if the `Source` is empty.
    ///
    /// The number is a snapshot; other threads may change it at any time.
    pub fn use_count(this: &Source<T, C>) -> usize {
        this.parts.map_or(0, |parts| parts.block().strong_count())
    }

    /// Gets the number of [`Weak`] handles observing the value, or zero if the
    /// `Source` is empty.
    ///
    /// # Examples
    ///
    /// ```rust
    /// use scoped_ptr::Source;
    ///
    /// let five: Source<_> = Source::new(5);
    /// let _weak_a = Source::to_weak(&five);
    /// let _weak_b = _weak_a.clone();
    ///
    /// assert_eq!(2, Source::weak_count(&five));
    /// ```
    ///
    /// [`Weak`]: ./struct.Weak.html
    pub fn weak_count(this: &Source<T, C>) -> usize {
        this.parts.map_or(0, |parts| parts.block().weak_count())
    }

    /// Returns `true` if the `Source` holds no value.
    pub fn is_empty(this: &Source<T, C>) -> bool {
        this.parts.is_none()
    }

    /// Returns a reference to the value, or `None` if the `Source` is empty.
    ///
    /// # Examples
    ///
    /// ```rust
    /// use scoped_ptr::Source;
    ///
    /// let five: Source<_> = Source::new(5);
    /// assert_eq!(Some(&5), Source::get(&five));
    ///
    /// let nothing: Source<i32> = Source::empty();
    /// assert_eq!(None, Source::get(&nothing));
    /// ```
    pub fn get(this: &Source<T, C>) -> Option<&T> {
        // The `Source` itself is a strong reference.
        this.parts.map(|parts| unsafe { parts.value() })
    }

    /// Returns a mutable reference to the value, if no other [`Strong`] or
    /// [`Weak`] handle to it exists.
    ///
    /// Returns `None` otherwise, because it is not safe to mutate a shared
    /// value.
    ///
    /// # Examples
    ///
    /// ```rust
    /// use scoped_ptr::Source;
    ///
    /// let mut x: Source<_> = Source::new(3);
    /// *Source::get_mut(&mut x).unwrap() = 4;
    /// assert_eq!(*x, 4);
    ///
    /// let _y = Source::to_weak(&x);
    /// assert!(Source::get_mut(&mut x).is_none());
    /// ```
    ///
    /// [`Strong`]: ./struct.Strong.html
    /// [`Weak`]: ./struct.Weak.html
    pub fn get_mut(this: &mut Source<T, C>) -> Option<&mut T> {
        match this.parts {
            Some(parts) if parts.block().is_unique() => Some(unsafe { &mut *parts.value.as_ptr() }),
            _ => None,
        }
    }

    /// Releases the value (dropping it if this was its last strong handle)
    /// and leaves the `Source` empty.
    pub fn clear(this: &mut Source<T, C>) {
        if let Some(parts) = this.parts.take() {
            unsafe { parts.release_strong() };
        }
    }

    /// Returns `true` if both `Source`s hold the same allocation. Two empty
    /// `Source`s are not equal under this comparison.
    pub fn ptr_eq(this: &Source<T, C>, other: &Source<T, C>) -> bool {
        match (this.parts, other.parts) {
            (Some(a), Some(b)) => a.same_block(&b),
            _ => false,
        }
    }
}

impl<T, C> Drop for Source<T, C>
where
    T: ?Sized,
    C: RefCount,
{
    /// Drops the `Source`.
    ///
    /// This releases one strong reference. If no [`Strong`] handle remains,
    /// the value is dropped; the control block is freed as well once no
    /// [`Weak`] handle remains either.
    ///
    /// # Examples
    ///
    /// ```rust
    /// use scoped_ptr::Source;
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
    /// let strong_foo = Source::to_strong(&foo);
    ///
    /// drop(foo); // Doesn't print anything
    /// drop(strong_foo); // Prints "dropped!"
    /// ```
    ///
    /// [`Strong`]: ./struct.Strong.html
    /// [`Weak`]: ./struct.Weak.html
    fn drop(&mut self) {
        Source::clear(self);
    }
}

impl<T, C> Default for Source<T, C>
where
    T: ?Sized,
    C: RefCount,
{
    /// Constructs an empty `Source`.
    fn default() -> Source<T, C> {
        Source::empty()
    }
}

impl<T, C> Deref for Source<T, C>
where
    T: ?Sized,
    C: RefCount,
{
    type Target = T;

    /// # Panics
    ///
    /// Panics if the `Source` is empty. Use [`Source::get`] to check first.
    ///
    /// [`Source::get`]: ./struct.Source.html#method.get
    fn deref(&self) -> &T {
        match Source::get(self) {
            Some(value) => value,
            None => panic!("dereferenced an empty Source"),
        }
    }
}

impl<T, C> From<Box<T>> for Source<T, C>
where
    T: ?Sized,
    C: RefCount,
{
    fn from(value: Box<T>) -> Source<T, C> {
        Source {
            parts: Some(Parts::new(value)),
            phantom: PhantomData,
        }
    }
}

impl<T, C> From<T> for Source<T, C>
where
    C: RefCount,
{
    fn from(value: T) -> Source<T, C> {
        Source::new(value)
    }
}

impl<T, C> Debug for Source<T, C>
where
    T: Debug + ?Sized,
    C: RefCount,
{
    fn fmt(&self, f: &mut Formatter) -> FmtResult {
        match Source::get(self) {
            Some(value) => write!(f, "{:?}", value),
            None => write!(f, "(empty)"),
        }
    }
}

impl<T, C> Pointer for Source<T, C>
where
    T: ?Sized,
    C: RefCount,
{
    fn fmt(&self, f: &mut Formatter) -> FmtResult {
        match self.parts {
            Some(parts) => write!(f, "{:p}", parts.value.as_ptr()),
            None => write!(f, "{:p}", std::ptr::null::<u8>()),
        }
    }
}
