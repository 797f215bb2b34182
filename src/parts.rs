// Copyright 2018 0-0-1 and Contributors
//
// Licensed under the Apache License, Version 2.0 <LICENSE-APACHE or
// http://www.apache.org/licenses/LICENSE-2.0> or the MIT license
// <LICENSE-MIT or http://opensource.org/licenses/MIT>, at your
// option. This file may not be copied, modified, or distributed
// except according to those terms.

use std::ptr::NonNull;

use log::trace;

use crate::block::RefCount;

/// The pointer pair every holding handle carries: the pointee, allocated as a
/// `Box<T>`, and the control block counting references to it, allocated as a
/// `Box<C>`.
///
/// `Parts` is `Copy` and does no counting of its own. Whoever copies it is
/// responsible for having acquired the matching reference first.
pub(crate) struct Parts<T, C>
where
    T: ?Sized,
{
    pub(crate) value: NonNull<T>,
    pub(crate) block: NonNull<C>,
}

impl<T, C> Parts<T, C>
where
    T: ?Sized,
    C: RefCount,
{
    /// Takes ownership of `value` and allocates a fresh control block for it.
    pub(crate) fn new(value: Box<T>) -> Parts<T, C> {
        Parts {
            value: NonNull::from(Box::leak(value)),
            block: NonNull::from(Box::leak(Box::new(C::default()))),
        }
    }

    /// The control block. Valid as long as the caller holds a reference of
    /// either kind.
    pub(crate) fn block(&self) -> &C {
        unsafe { self.block.as_ref() }
    }

    /// The pointee. Valid as long as the caller holds a strong reference.
    pub(crate) unsafe fn value<'a>(&self) -> &'a T {
        &*self.value.as_ptr()
    }

    /// Acquires a strong reference on behalf of a new handle, or returns
    /// `None` if the pointee is already gone.
    pub(crate) fn acquire_strong(&self) -> Option<Parts<T, C>> {
        if self.block().acquire_strong() {
            Some(*self)
        } else {
            None
        }
    }

    /// Acquires a weak reference on behalf of a new handle, or returns `None`
    /// if the block refused it.
    pub(crate) fn acquire_weak(&self) -> Option<Parts<T, C>> {
        if self.block().acquire_weak() {
            Some(*self)
        } else {
            None
        }
    }

    /// Gives back a strong reference, destroying whatever it was the last
    /// reference to.
    ///
    /// The caller must hold a strong reference and must not use `self` (or
    /// any copy it holds) afterwards.
    pub(crate) unsafe fn release_strong(self) {
        let released = self.block().release_strong();

        if released.drop_value {
            debug_assert!(!released.drop_block || self.block().weak_count() == 0);

            trace!("destroying pointee at {:p}", self.value.as_ptr());
            drop(Box::from_raw(self.value.as_ptr()));

            if released.drop_block {
                self.destroy_block();
            }
        }
    }

    /// Gives back a weak reference, destroying the control block if it was the
    /// last reference of any kind.
    ///
    /// The caller must hold a weak reference and must not use `self` (or any
    /// copy it holds) afterwards.
    pub(crate) unsafe fn release_weak(self) {
        if self.block().release_weak() {
            self.destroy_block();
        }
    }

    unsafe fn destroy_block(self) {
        trace!("destroying control block at {:p}", self.block.as_ptr());
        drop(Box::from_raw(self.block.as_ptr()));
    }

    /// Whether two pairs share a control block, i.e. were derived from the
    /// same source.
    pub(crate) fn same_block(&self, other: &Parts<T, C>) -> bool {
        self.block == other.block
    }
}

impl<T, C> Clone for Parts<T, C>
where
    T: ?Sized,
{
    fn clone(&self) -> Parts<T, C> {
        *self
    }
}

impl<T, C> Copy for Parts<T, C> where T: ?Sized {}
