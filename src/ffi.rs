// SPDX-License-Identifier: Apache-2.0 OR MIT
// SPDX-FileCopyrightText: © 2024 Google
// Ported from libtypec (Rajaram Regupathy <rajaram.regupathy@gmail.com>)

//! Ownership tokens for arrays handed out over the C API.
//!
//! An array leaves the library as `(ptr, len, mem_sz)`. `mem_sz` packs the
//! capacity of the backing `Vec` with a per-type tag in its low byte, so the
//! destroyer can tell when it is handed an array of another type. Debug builds
//! also remember every pointer that is still out, which catches double frees.

use std::mem::ManuallyDrop;

use log::warn;

/// Element types that can cross the C boundary in an array.
pub(crate) trait Tagged {
    const TAG: u8;
}

#[derive(Debug, PartialEq, Eq)]
pub(crate) enum Misuse {
    /// `mem_sz` was produced for another element type.
    ForeignTag { expected: u8, found: u8 },
    /// The pointer is not out, or was already destroyed.
    UnknownPointer,
}

#[cfg(debug_assertions)]
mod ledger {
    use std::collections::HashSet;
    use std::sync::Mutex;
    use std::sync::OnceLock;

    fn outstanding() -> &'static Mutex<HashSet<usize>> {
        static OUTSTANDING: OnceLock<Mutex<HashSet<usize>>> = OnceLock::new();
        OUTSTANDING.get_or_init(Default::default)
    }

    pub fn insert(ptr: usize) {
        if let Ok(mut outstanding) = outstanding().lock() {
            outstanding.insert(ptr);
        }
    }

    pub fn remove(ptr: usize) -> bool {
        outstanding()
            .lock()
            .map(|mut outstanding| outstanding.remove(&ptr))
            .unwrap_or(false)
    }
}

/// Gives up ownership of `items`. Empty arrays are handed out as NULL.
pub(crate) fn leak<T: Tagged>(items: Vec<T>) -> (*mut T, usize, usize) {
    if items.capacity() == 0 {
        return (std::ptr::null_mut(), 0, usize::from(T::TAG));
    }

    let mut items = ManuallyDrop::new(items);
    let ptr = items.as_mut_ptr();
    #[cfg(debug_assertions)]
    ledger::insert(ptr as usize);

    (ptr, items.len(), (items.capacity() << 8) | usize::from(T::TAG))
}

/// Checks a token and returns the capacity it encodes. In debug builds the
/// pointer is retired.
pub(crate) fn validate<T: Tagged>(ptr: *mut T, mem_sz: usize) -> Result<usize, Misuse> {
    let found = (mem_sz & 0xff) as u8;
    if found != T::TAG {
        return Err(Misuse::ForeignTag {
            expected: T::TAG,
            found,
        });
    }

    #[cfg(debug_assertions)]
    if !ptr.is_null() && !ledger::remove(ptr as usize) {
        return Err(Misuse::UnknownPointer);
    }

    Ok(mem_sz >> 8)
}

/// Takes back an array previously given out by [`leak`].
///
/// A bad token aborts debug builds. Release builds leak the memory instead.
///
/// # Safety
/// `(ptr, len, mem_sz)` must be a triple returned by [`leak`] for `T`.
pub(crate) unsafe fn reclaim<T: Tagged>(ptr: *mut T, len: usize, mem_sz: usize) {
    match validate(ptr, mem_sz) {
        Ok(_) if ptr.is_null() => (),
        Ok(capacity) => drop(Vec::from_raw_parts(ptr, len, capacity)),
        Err(misuse) => {
            warn!("Refusing to destroy {ptr:?} (len {len}, mem_sz {mem_sz:#x}): {misuse:?}");
            #[cfg(debug_assertions)]
            std::process::abort();
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[derive(Debug, PartialEq)]
    struct Apple(u32);

    impl Tagged for Apple {
        const TAG: u8 = 0x11;
    }

    struct Orange;

    impl Tagged for Orange {
        const TAG: u8 = 0x22;
    }

    #[test]
    fn token_carries_capacity_and_tag() {
        let mut items = Vec::with_capacity(5);
        items.extend([Apple(1), Apple(2), Apple(3)]);

        let (ptr, len, mem_sz) = leak(items);
        assert!(!ptr.is_null());
        assert_eq!(len, 3);
        assert_eq!(mem_sz, (5 << 8) | 0x11);

        unsafe { reclaim(ptr, len, mem_sz) };
    }

    #[test]
    fn foreign_tag_is_rejected() {
        let (ptr, len, mem_sz) = leak(vec![Apple(7)]);
        assert_eq!(
            validate(ptr as *mut Orange, mem_sz),
            Err(Misuse::ForeignTag {
                expected: 0x22,
                found: 0x11
            })
        );

        // The pointer is still out, so the right destroyer succeeds.
        unsafe { reclaim(ptr, len, mem_sz) };
    }

    #[test]
    fn double_destroy_is_detected() {
        let (ptr, _, mem_sz) = leak(vec![Apple(1), Apple(2)]);
        assert_eq!(validate(ptr, mem_sz), Ok(2));
        assert_eq!(validate(ptr, mem_sz), Err(Misuse::UnknownPointer));

        // Ownership went nowhere in validate, so free for real.
        unsafe { drop(Vec::from_raw_parts(ptr, 2, 2)) };
    }

    #[test]
    fn empty_arrays_are_null() {
        let (ptr, len, mem_sz) = leak(Vec::<Apple>::new());
        assert!(ptr.is_null());
        assert_eq!(len, 0);
        assert_eq!(mem_sz, 0x11);

        assert_eq!(validate(ptr, mem_sz), Ok(0));
        unsafe { reclaim(ptr, len, mem_sz) };
    }
}
