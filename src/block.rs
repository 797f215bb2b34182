// Copyright 2018 0-0-1 and Contributors
//
// Licensed under the Apache License, Version 2.0 <LICENSE-APACHE or
// http://www.apache.org/licenses/LICENSE-2.0> or the MIT license
// <LICENSE-MIT or http://opensource.org/licenses/MIT>, at your
// option. This file may not be copied, modified, or distributed
// except according to those terms.

use std::cell::Cell;
use std::fmt::{Debug, Formatter, Result as FmtResult};
use std::process;
use std::sync::atomic::{fence, AtomicUsize, Ordering};

/// Past this many references of either kind, counting aborts the process.
/// Leaking handles in a loop is the only way to get here, and wrapping the
/// counter would be a use-after-free.
const MAX_REFCOUNT: usize = isize::MAX as usize;

/// What the caller of [`release_strong`] has to clean up.
///
/// `drop_block` is only ever set together with `drop_value`.
///
/// [`release_strong`]: ./trait.RefCount.html#tymethod.release_strong
#[derive(Clone, Copy, Debug, Default, Eq, PartialEq)]
pub struct Released {
    /// The last strong reference is gone; the pointee must be destroyed.
    pub drop_value: bool,
    /// No reference of any kind remains; the control block must be destroyed.
    pub drop_block: bool,
}

/// The counting half of a [`Source`]/[`Strong`]/[`Weak`] family: a control
/// block shared by every handle derived from one [`Source`].
///
/// A freshly [`default`]ed block stands for exactly one strong holder (the
/// [`Source`] that allocated it) and no weak holders.
///
/// The block never owns the pointee. It only tells the handles when to
/// destroy the pointee and when to destroy the block itself.
///
/// # Safety
///
/// Handles trust the answers of these methods to free memory. An
/// implementation must guarantee, for any interleaving of calls that the
/// handles make:
///
/// * [`acquire_strong`] never succeeds once the strong count has reached zero,
/// * exactly one [`release_strong`] call reports `drop_value`, and it is the
///   call that released the last strong reference,
/// * exactly one call in total reports that the block must be destroyed, and
///   it happens after the `drop_value` report and after every weak reference
///   has been released.
///
/// [`Source`]: ./struct.Source.html
/// [`Strong`]: ./struct.Strong.html
/// [`Weak`]: ./struct.Weak.html
///
/// [`acquire_strong`]: ./trait.RefCount.html#tymethod.acquire_strong
/// [`release_strong`]: ./trait.RefCount.html#tymethod.release_strong
///
/// [`default`]: https://doc.rust-lang.org/std/default/trait.Default.html#tymethod.default
pub unsafe trait RefCount: Default {
    /// Tries to add a strong reference. Fails, returning `false`, if the strong
    /// count is already zero: a destroyed pointee is never resurrected.
    fn acquire_strong(&self) -> bool;

    /// Removes a strong reference held by the caller.
    fn release_strong(&self) -> Released;

    /// Adds a weak reference, unless the pointee is observed to be gone
    /// already, in which case nothing is counted and `false` is returned.
    fn acquire_weak(&self) -> bool;

    /// Removes a weak reference held by the caller. Returns `true` if the
    /// caller must now destroy the block.
    fn release_weak(&self) -> bool;

    /// Snapshot of the number of strong references. Stale as soon as it is
    /// read when other threads hold handles.
    fn strong_count(&self) -> usize;

    /// Snapshot of the number of weak references.
    fn weak_count(&self) -> usize;

    /// Whether the caller's strong reference is the only reference of any
    /// kind. Only meaningful when the caller also has exclusive access to the
    /// handle that created the block.
    fn is_unique(&self) -> bool;
}

/// The default, thread-safe control block. All operations are lock-free.
///
/// The strong holders collectively own one extra weak reference, released by
/// whichever strong release brings the strong count to zero. Deciding when to
/// free the block therefore never requires reading the strong count, and a
/// final strong release racing a final weak release cannot both (or neither)
/// free it.
///
/// # Examples
///
/// ```rust
/// use scoped_ptr::{AtomicCount, RefCount};
///
/// let block = AtomicCount::default();
/// assert!(block.acquire_weak());
///
/// let released = block.release_strong();
/// assert!(released.drop_value);
/// assert!(!released.drop_block);
///
/// assert!(!block.acquire_strong());
/// assert!(block.release_weak());
/// ```
pub struct AtomicCount {
    strong: AtomicUsize,
    // Weak holders, plus one while any strong holder exists.
    weak: AtomicUsize,
}

impl Default for AtomicCount {
    fn default() -> AtomicCount {
        AtomicCount {
            strong: AtomicUsize::new(1),
            weak: AtomicUsize::new(1),
        }
    }
}

unsafe impl RefCount for AtomicCount {
    fn acquire_strong(&self) -> bool {
        let mut strong = self.strong.load(Ordering::Relaxed);
        loop {
            if strong == 0 {
                return false;
            }
            if strong > MAX_REFCOUNT {
                process::abort();
            }
            match self.strong.compare_exchange_weak(
                strong,
                strong + 1,
                Ordering::Acquire,
                Ordering::Relaxed,
            ) {
                Ok(_) => return true,
                Err(current) => strong = current,
            }
        }
    }

    fn release_strong(&self) -> Released {
        if self.strong.fetch_sub(1, Ordering::Release) != 1 {
            return Released::default();
        }
        // Every other strong holder's last use happens before the pointee is
        // destroyed.
        fence(Ordering::Acquire);

        Released {
            drop_value: true,
            drop_block: self.release_weak(),
        }
    }

    fn acquire_weak(&self) -> bool {
        if self.strong.load(Ordering::Relaxed) == 0 {
            return false;
        }
        if self.weak.fetch_add(1, Ordering::Relaxed) > MAX_REFCOUNT {
            process::abort();
        }
        true
    }

    fn release_weak(&self) -> bool {
        if self.weak.fetch_sub(1, Ordering::Release) != 1 {
            return false;
        }
        fence(Ordering::Acquire);
        true
    }

    fn strong_count(&self) -> usize {
        self.strong.load(Ordering::Relaxed)
    }

    fn weak_count(&self) -> usize {
        let weak = self.weak.load(Ordering::Relaxed);
        if self.strong.load(Ordering::Relaxed) == 0 {
            weak
        } else {
            weak.saturating_sub(1)
        }
    }

    fn is_unique(&self) -> bool {
        // Weak first. With no weak holder left, only the exclusively borrowed
        // source could mint new handles, so a strong count of one read
        // afterwards cannot go stale. Read the other way round, a weak holder
        // could lock and then drop itself between the two loads.
        self.weak.load(Ordering::Acquire) == 1 && self.strong.load(Ordering::Acquire) == 1
    }
}

impl Debug for AtomicCount {
    fn fmt(&self, f: &mut Formatter) -> FmtResult {
        f.debug_struct("AtomicCount")
            .field("strong", &self.strong_count())
            .field("weak", &self.weak_count())
            .finish()
    }
}

/// A control block for handles that never leave their thread. Same protocol
/// as [`AtomicCount`], counted with plain [`Cell`]s.
///
/// `LocalCount` is not [`Sync`], so handles built on it are neither [`Send`]
/// nor [`Sync`].
///
/// [`AtomicCount`]: ./struct.AtomicCount.html
///
/// [`Cell`]: https://doc.rust-lang.org/std/cell/struct.Cell.html
/// [`Send`]: https://doc.rust-lang.org/std/marker/trait.Send.html
/// [`Sync`]: https://doc.rust-lang.org/std/marker/trait.Sync.html
pub struct LocalCount {
    strong: Cell<usize>,
    weak: Cell<usize>,
}

impl Default for LocalCount {
    fn default() -> LocalCount {
        LocalCount {
            strong: Cell::new(1),
            weak: Cell::new(1),
        }
    }
}

unsafe impl RefCount for LocalCount {
    fn acquire_strong(&self) -> bool {
        let strong = self.strong.get();
        if strong == 0 {
            return false;
        }
        if strong > MAX_REFCOUNT {
            process::abort();
        }
        self.strong.set(strong + 1);
        true
    }

    fn release_strong(&self) -> Released {
        let strong = self.strong.get();
        debug_assert_ne!(0, strong, "strong release without a strong reference");
        self.strong.set(strong - 1);
        if strong != 1 {
            return Released::default();
        }

        Released {
            drop_value: true,
            drop_block: self.release_weak(),
        }
    }

    fn acquire_weak(&self) -> bool {
        if self.strong.get() == 0 {
            return false;
        }
        let weak = self.weak.get();
        if weak > MAX_REFCOUNT {
            process::abort();
        }
        self.weak.set(weak + 1);
        true
    }

    fn release_weak(&self) -> bool {
        let weak = self.weak.get();
        debug_assert_ne!(0, weak, "weak release without a weak reference");
        self.weak.set(weak - 1);
        weak == 1
    }

    fn strong_count(&self) -> usize {
        self.strong.get()
    }

    fn weak_count(&self) -> usize {
        if self.strong.get() == 0 {
            self.weak.get()
        } else {
            self.weak.get() - 1
        }
    }

    fn is_unique(&self) -> bool {
        self.strong.get() == 1 && self.weak.get() == 1
    }
}

impl Debug for LocalCount {
    fn fmt(&self, f: &mut Formatter) -> FmtResult {
        f.debug_struct("LocalCount")
            .field("strong", &self.strong_count())
            .field("weak", &self.weak_count())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    use crossbeam::thread;

    fn lifecycle<C: RefCount>() {
        let block = C::default();
        assert_eq!(1, block.strong_count(), "new block must have one strong holder");
        assert_eq!(0, block.weak_count(), "new block must have no weak holders");
        assert!(block.is_unique());

        assert!(block.acquire_strong());
        assert!(block.acquire_weak());
        assert_eq!(2, block.strong_count());
        assert_eq!(1, block.weak_count());
        assert!(!block.is_unique());

        assert_eq!(Released::default(), block.release_strong());
        assert_eq!(
            Released {
                drop_value: true,
                drop_block: false,
            },
            block.release_strong(),
            "last strong release with a weak holder left must only drop the value"
        );
        assert_eq!(0, block.strong_count());
        assert_eq!(1, block.weak_count());

        assert!(!block.acquire_strong(), "promotion succeeded after expiry");
        assert!(!block.acquire_weak(), "weak acquired after expiry");
        assert_eq!(1, block.weak_count());

        assert!(block.release_weak(), "last weak release must drop the block");
    }

    #[test]
    fn atomic_lifecycle() {
        lifecycle::<AtomicCount>();
    }

    #[test]
    fn local_lifecycle() {
        lifecycle::<LocalCount>();
    }

    fn strong_only<C: RefCount>() {
        let block = C::default();
        assert_eq!(
            Released {
                drop_value: true,
                drop_block: true,
            },
            block.release_strong()
        );
    }

    #[test]
    fn last_strong_without_weak_drops_everything() {
        strong_only::<AtomicCount>();
        strong_only::<LocalCount>();
    }

    fn weak_outlives_nothing<C: RefCount>() {
        let block = C::default();
        assert!(block.acquire_weak());
        assert!(!block.release_weak(), "weak release dropped a block still held strongly");
        assert_eq!(
            Released {
                drop_value: true,
                drop_block: true,
            },
            block.release_strong()
        );
    }

    #[test]
    fn weak_released_first() {
        weak_outlives_nothing::<AtomicCount>();
        weak_outlives_nothing::<LocalCount>();
    }

    #[test]
    fn debug() {
        assert_eq!(
            format!("{:?}", AtomicCount::default()),
            "AtomicCount { strong: 1, weak: 0 }"
        );
        assert_eq!(
            format!("{:?}", LocalCount::default()),
            "LocalCount { strong: 1, weak: 0 }"
        );
    }

    // Races the final strong release against the final weak release many
    // times; exactly one side may claim the block.
    #[test]
    fn final_releases_race() {
        use std::sync::atomic::AtomicUsize;

        for _ in 0..2000 {
            let block = AtomicCount::default();
            assert!(block.acquire_weak());
            let claims = AtomicUsize::new(0);
            let values = AtomicUsize::new(0);

            thread::scope(|scope| {
                scope.spawn(|_| {
                    let released = block.release_strong();
                    if released.drop_value {
                        values.fetch_add(1, Ordering::Relaxed);
                    }
                    if released.drop_block {
                        claims.fetch_add(1, Ordering::Relaxed);
                    }
                });
                scope.spawn(|_| {
                    if block.release_weak() {
                        claims.fetch_add(1, Ordering::Relaxed);
                    }
                });
            })
            .unwrap();

            assert_eq!(1, values.load(Ordering::Relaxed));
            assert_eq!(1, claims.load(Ordering::Relaxed));
        }
    }

    // Promotions racing the last release either succeed while the count is
    // live or fail afterwards; the value is reported dead exactly once.
    #[test]
    fn promotion_races_release() {
        use std::sync::atomic::AtomicUsize;

        for _ in 0..500 {
            let block = AtomicCount::default();
            let drops = AtomicUsize::new(0);

            thread::scope(|scope| {
                for _ in 0..4 {
                    scope.spawn(|_| {
                        for _ in 0..16 {
                            if block.acquire_strong() {
                                if block.release_strong().drop_value {
                                    drops.fetch_add(1, Ordering::Relaxed);
                                }
                            }
                        }
                    });
                }
                scope.spawn(|_| {
                    if block.release_strong().drop_value {
                        drops.fetch_add(1, Ordering::Relaxed);
                    }
                });
            })
            .unwrap();

            assert_eq!(1, drops.load(Ordering::Relaxed));
            assert_eq!(0, block.strong_count());
            assert!(!block.acquire_strong());
        }
    }
}
