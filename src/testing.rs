// Copyright 2018 0-0-1 and Contributors
//
// Licensed under the Apache License, Version 2.0 <LICENSE-APACHE or
// http://www.apache.org/licenses/LICENSE-2.0> or the MIT license
// <LICENSE-MIT or http://opensource.org/licenses/MIT>, at your
// option. This file may not be copied, modified, or distributed
// except according to those terms.

//! Helpers for observing destruction in tests.

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;

use crate::block::{AtomicCount, RefCount, Released};

/// Counts how many of its tokens have been dropped.
#[derive(Clone, Default)]
pub(crate) struct DropCount(Arc<AtomicUsize>);

impl DropCount {
    pub(crate) fn new() -> DropCount {
        Default::default()
    }

    pub(crate) fn token(&self) -> Token {
        Token(Arc::clone(&self.0))
    }

    pub(crate) fn get(&self) -> usize {
        self.0.load(Ordering::SeqCst)
    }
}

/// Reports its own drop to the `DropCount` it came from.
#[derive(Debug)]
pub(crate) struct Token(Arc<AtomicUsize>);

impl Drop for Token {
    fn drop(&mut self) {
        self.0.fetch_add(1, Ordering::SeqCst);
    }
}

const ZERO: AtomicUsize = AtomicUsize::new(0);

static DESTROYED: [AtomicUsize; 16] = [ZERO; 16];

/// An `AtomicCount` that records its own destruction in slot `ID`. Every test
/// uses its own `ID`, since tests run in parallel.
#[derive(Debug, Default)]
pub(crate) struct Tracked<const ID: usize>(AtomicCount);

impl<const ID: usize> Tracked<ID> {
    /// How many blocks with this `ID` have been destroyed so far.
    pub(crate) fn destroyed() -> usize {
        DESTROYED[ID].load(Ordering::SeqCst)
    }
}

impl<const ID: usize> Drop for Tracked<ID> {
    fn drop(&mut self) {
        DESTROYED[ID].fetch_add(1, Ordering::SeqCst);
    }
}

unsafe impl<const ID: usize> RefCount for Tracked<ID> {
    fn acquire_strong(&self) -> bool {
        self.0.acquire_strong()
    }

    fn release_strong(&self) -> Released {
        self.0.release_strong()
    }

    fn acquire_weak(&self) -> bool {
        self.0.acquire_weak()
    }

    fn release_weak(&self) -> bool {
        self.0.release_weak()
    }

    fn strong_count(&self) -> usize {
        self.0.strong_count()
    }

    fn weak_count(&self) -> usize {
        self.0.weak_count()
    }

    fn is_unique(&self) -> bool {
        self.0.is_unique()
    }
}

/// Installs a test logger so `trace` output shows up for failing tests.
pub(crate) fn init_logger() {
    let _ = env_logger::builder().is_test(true).try_init();
}
