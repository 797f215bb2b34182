// Copyright 2018 0-0-1 and Contributors
//
// Licensed under the Apache License, Version 2.0 <LICENSE-APACHE or
// http://www.apache.org/licenses/LICENSE-2.0> or the MIT license
// <LICENSE-MIT or http://opensource.org/licenses/MIT>, at your
// option. This file may not be copied, modified, or distributed
// except according to those terms.

//! This small library provides a family of three thread-safe pointer types
//! sharing one value: [`Source`], [`Strong`] and [`Weak`].
//!
//! A [`Source`] is created from a value and is the only way to bring a value
//! into the family. From it, [`Strong`] handles can be derived, which keep the
//! value alive like an [`Arc`] does, and [`Weak`] handles, which observe the
//! value without keeping it alive. A [`Weak`] can be [`lock`]ed to get a
//! [`Strong`], which comes out empty once the value is gone.
//!
//! Neither [`Source`] nor [`Strong`] implement [`Clone`]: every strong
//! reference is created by an explicit call ([`Source::to_strong`],
//! [`Strong::to_strong`] or [`Weak::lock`]). [`Weak`] can be cloned freely.
//!
//! Every handle may also be empty. Empty handles are what a failed conversion
//! returns, what [`Default`] produces, and what a handle becomes after being
//! reset or moved out of with [`mem::take`].
//!
//! # Technical Details
//!
//! The value lives in its own allocation. Next to it, the [`Source`]
//! allocates a control block holding a strong and a weak reference count;
//! every handle is a pair of pointers to the two. When the strong count drops
//! to zero the value is dropped, and when no reference of any kind is left the
//! control block is freed too.
//!
//! The default control block, [`AtomicCount`], counts with atomics and never
//! locks. [`Weak::lock`] increments the strong count with a compare-and-swap
//! loop that refuses to go up from zero, so a value that has been dropped can
//! never be handed out again, no matter how the threads interleave. The strong
//! holders share one extra weak reference between them, which makes the
//! decision to free the control block depend on a single counter.
//!
//! The counting strategy is the second type parameter of every handle. Any
//! implementation of [`RefCount`] can be plugged in; [`LocalCount`] is a
//! non-atomic one for handles that stay on one thread.
//!
//! With a logger installed, the destruction of values and control blocks is
//! reported at `trace` level through the [`log`] facade.
//!
//! [`Source`]: ./struct.Source.html
//! [`Strong`]: ./struct.Strong.html
//! [`Weak`]: ./struct.Weak.html
//! [`AtomicCount`]: ./struct.AtomicCount.html
//! [`LocalCount`]: ./struct.LocalCount.html
//! [`RefCount`]: ./trait.RefCount.html
//!
//! [`Source::to_strong`]: ./struct.Source.html#method.to_strong
//! [`Strong::to_strong`]: ./struct.Strong.html#method.to_strong
//! [`Weak::lock`]: ./struct.Weak.html#method.lock
//! [`lock`]: ./struct.Weak.html#method.lock
//!
//! [`Arc`]: https://doc.rust-lang.org/std/sync/struct.Arc.html
//! [`Clone`]: https://doc.rust-lang.org/std/clone/trait.Clone.html
//! [`Default`]: https://doc.rust-lang.org/std/default/trait.Default.html
//! [`mem::take`]: https://doc.rust-lang.org/std/mem/fn.take.html
//! [`log`]: https://docs.rs/log

mod block;
mod parts;
mod source;
mod strong;
mod weak;

#[cfg(test)]
mod testing;

pub use block::{AtomicCount, LocalCount, RefCount, Released};
pub use source::Source;
pub use strong::Strong;
pub use weak::Weak;
