// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! A single-writer cell for statics, adapted from the `StaticCell`/
//! `StaticRef` pair used to hand out exclusive access to task statics: only
//! one borrow may be outstanding at a time, and taking a second one while
//! the first is alive panics instead of aliasing.

use core::cell::UnsafeCell;
use core::sync::atomic::{AtomicBool, Ordering};

pub struct StaticCell<T> {
    borrowed: AtomicBool,
    cell: UnsafeCell<T>,
}

impl<T> StaticCell<T> {
    pub const fn new(contents: T) -> Self {
        Self {
            borrowed: AtomicBool::new(false),
            cell: UnsafeCell::new(contents),
        }
    }

    /// Gets exclusive access to the contents of `self`.
    ///
    /// Panics if a [`StaticRef`] for `self` is already outstanding anywhere
    /// in the program.
    pub fn borrow_mut(&self) -> StaticRef<'_, T> {
        let already_borrowed = self.borrowed.swap(true, Ordering::Acquire);
        if already_borrowed {
            panic!("entity already borrowed for dispatch");
        }
        // Safety: the swap above proves no other `StaticRef` exists for
        // this cell, so an exclusive reference can't alias.
        unsafe {
            StaticRef {
                contents: &mut *self.cell.get(),
                borrow: &self.borrowed,
            }
        }
    }
}

unsafe impl<T> Sync for StaticCell<T> where for<'a> &'a mut T: Send {}

pub struct StaticRef<'a, T> {
    contents: &'a mut T,
    borrow: &'a AtomicBool,
}

impl<'a, T> Drop for StaticRef<'a, T> {
    fn drop(&mut self) {
        self.borrow.store(false, Ordering::Release);
    }
}

impl<'a, T> core::ops::Deref for StaticRef<'a, T> {
    type Target = T;

    fn deref(&self) -> &Self::Target {
        self.contents
    }
}

impl<'a, T> core::ops::DerefMut for StaticRef<'a, T> {
    fn deref_mut(&mut self) -> &mut Self::Target {
        self.contents
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn borrow_then_drop_allows_reborrow() {
        let cell = StaticCell::new(5);
        {
            let mut r = cell.borrow_mut();
            *r += 1;
        }
        let r = cell.borrow_mut();
        assert_eq!(*r, 6);
    }

    #[test]
    #[should_panic]
    fn double_borrow_panics() {
        let cell = StaticCell::new(5);
        let _a = cell.borrow_mut();
        let _b = cell.borrow_mut();
    }
}
