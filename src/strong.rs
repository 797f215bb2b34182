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
use crate::source::Source;

/// A counted owning handle. While a non-empty `Strong` exists, the value it
/// points to stays alive, whatever happens to the [`Source`] it came from.
///
/// A `Strong` is obtained with [`Source::to_strong`] or [`Weak::lock`]; both
/// return an empty `Strong` if the value is gone. `Strong` is deliberately not
/// [`Clone`]. Several `Strong`s to the same value may exist, each created by
/// its own call, and [`Strong::to_strong`] is that call for an existing
/// `Strong`.
///
/// Like [`Source`], `Strong` only has associated functions, so they don't
/// shadow methods of `T`.
///
/// [`Source`]: ./struct.Source.html
/// [`Source::to_strong`]: ./struct.Source.html#method.to_strong
/// [`Weak::lock`]: ./struct.Weak.html#method.lock
/// [`Strong::to_strong`]: ./struct.Strong.html#method.to_strong
///
/// [`Clone`]: https://doc.rust-lang.org/std/clone/trait.Clone.html
pub struct Strong<T, C = AtomicCount>
where
    T: ?Sized,
    C: RefCount,
{
    pub(crate) parts: Option<Parts<T, C>>,
    pub(crate) phantom: PhantomData<T>,
}

unsafe impl<T, C> Send for Strong<T, C>
where
    T: Send + Sync + ?Sized,
    C: RefCount + Send + Sync,
{
}

unsafe impl<T, C> Sync for Strong<T, C>
where
    T: Send + Sync + ?Sized,
    C: RefCount + Send + Sync,
{
}

impl<T, C> Strong<T, C>
where
    T: ?Sized,
    C: RefCount,
{
    /// Wraps parts whose strong reference has already been acquired.
    pub(crate) fn from_parts(parts: Option<Parts<T, C>>) -> Strong<T, C> {
        Strong {
            parts,
            phantom: PhantomData,
        }
    }

    /// Constructs an empty `Strong`.
    pub fn empty() -> Strong<T, C> {
        Strong::from_parts(None)
    }

    /// Creates another `Strong` to the same value, incrementing the strong
    /// count. Returns an empty `Strong` if `this` is empty.
    ///
    /// # Examples
    ///
    /// ```rust
    /// use scoped_ptr::{Source, Strong};
    ///
    /// let five: Source<_> = Source::new(5);
    /// let a = Source::to_strong(&five);
    /// let b = Strong::to_strong(&a);
    ///
    /// assert_eq!(3, Strong::use_count(&b));
    /// ```
    pub fn to_strong(this: &Strong<T, C>) -> Strong<T, C> {
        Strong::from_parts(this.parts.and_then(|parts| parts.acquire_strong()))
    }

    /// Gets the number of strong handles to the value (this one, other
    /// `Strong`s and the [`Source`] if it is still around), or zero if the
    /// `Strong` is empty.
    ///
    /// [`Source`]: ./struct.Source.html
    pub fn use_count(this: &Strong<T, C>) -> usize {
        this.parts.map_or(0, |parts| parts.block().strong_count())
    }

    /// Gets the number of [`Weak`] handles observing the value, or zero if the
    /// `Strong` is empty.
    ///
    /// [`Weak`]: ./struct.Weak.html
    pub fn weak_count(this: &Strong<T, C>) -> usize {
        this.parts.map_or(0, |parts| parts.block().weak_count())
    }

    /// Returns `true` if the `Strong` holds no value, e.g. because it was
    /// [`lock`]ed from an expired [`Weak`].
    ///
    /// [`lock`]: ./struct.Weak.html#method.lock
    /// [`Weak`]: ./struct.Weak.html
    pub fn is_empty(this: &Strong<T, C>) -> bool {
        this.parts.is_none()
    }

    /// Returns a reference to the value, or `None` if the `Strong` is empty.
    pub fn get(this: &Strong<T, C>) -> Option<&T> {
        this.parts.map(|parts| unsafe { parts.value() })
    }

    /// Turns an empty `Strong` into `None` and a holding one into `Some`.
    ///
    /// # Examples
    ///
    /// ```rust
    /// use scoped_ptr::{Source, Strong};
    ///
    /// let five: Source<_> = Source::new(5);
    /// let weak_five = Source::to_weak(&five);
    ///
    /// if let Some(strong) = Strong::into_option(weak_five.lock()) {
    ///     assert_eq!(5, *strong);
    /// }
    ///
    /// drop(five);
    /// assert!(Strong::into_option(weak_five.lock()).is_none());
    /// ```
    pub fn into_option(this: Strong<T, C>) -> Option<Strong<T, C>> {
        if this.parts.is_some() {
            Some(this)
        } else {
            None
        }
    }

    /// Releases the value (dropping it if this was its last strong handle)
    /// and leaves the `Strong` empty.
    pub fn reset(this: &mut Strong<T, C>) {
        if let Some(parts) = this.parts.take() {
            unsafe { parts.release_strong() };
        }
    }

    /// Returns `true` if both `Strong`s point to the same allocation. Two
    /// empty `Strong`s are not equal under this comparison.
    pub fn ptr_eq(this: &Strong<T, C>, other: &Strong<T, C>) -> bool {
        match (this.parts, other.parts) {
            (Some(a), Some(b)) => a.same_block(&b),
            _ => false,
        }
    }

    /// Returns `true` if the `Strong` was derived from `source`.
    pub fn is_from(this: &Strong<T, C>, source: &Source<T, C>) -> bool {
        match (this.parts, source.parts) {
            (Some(a), Some(b)) => a.same_block(&b),
            _ => false,
        }
    }
}

impl<T, C> Drop for Strong<T, C>
where
    T: ?Sized,
    C: RefCount,
{
    fn drop(&mut self) {
        Strong::reset(self);
    }
}

impl<T, C> Default for Strong<T, C>
where
    T: ?Sized,
    C: RefCount,
{
    /// Constructs an empty `Strong`.
    fn default() -> Strong<T, C> {
        Strong::empty()
    }
}

impl<T, C> Deref for Strong<T, C>
where
    T: ?Sized,
    C: RefCount,
{
    type Target = T;

    /// # Panics
    ///
    /// Panics if the `Strong` is empty. Use [`Strong::get`] to check first.
    ///
    /// [`Strong::get`]: ./struct.Strong.html#method.get
    fn deref(&self) -> &T {
        match Strong::get(self) {
            Some(value) => value,
            None => panic!("dereferenced an empty Strong"),
        }
    }
}

impl<'a, T, C> From<&'a Source<T, C>> for Strong<T, C>
where
    T: ?Sized,
    C: RefCount,
{
    fn from(source: &'a Source<T, C>) -> Strong<T, C> {
        Source::to_strong(source)
    }
}

impl<T, C> Debug for Strong<T, C>
where
    T: Debug + ?Sized,
    C: RefCount,
{
    fn fmt(&self, f: &mut Formatter) -> FmtResult {
        match Strong::get(self) {
            Some(value) => write!(f, "{:?}", value),
            None => write!(f, "(empty)"),
        }
    }
}

impl<T, C> Pointer for Strong<T, C>
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
