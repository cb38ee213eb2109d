/*
 * SPDX-License-Identifier: BlueOak-1.0.0
 * Copyright (c) Berkus Decker <berkus+vesper@metta.systems>
 */

//! Callback stubs.
//!
//! One stub family per arity. A stub is monomorphized for its table, object
//! type, argument and return types and, as a const parameter, for the slot it
//! serves. When external code calls it, it loads the slot, checks that the
//! slot still holds a method of its shape, puts the object in front of the
//! arguments it was called with and calls the bound method. The compiler lays
//! out argument registers for the target ABI, so nothing here depends on a
//! particular instruction set.
//!
//! Selecting the stub for a runtime slot index goes through a `match` over the
//! indices below [`MAX_SLOTS`](crate::MAX_SLOTS). Arms at or past the table's
//! [`CAPACITY`](crate::Table::CAPACITY) are guarded by a constant that is false
//! after monomorphization, so their stubs are optimized out.

#![allow(improper_ctypes_definitions)]

use {
    crate::registry::Table,
    cfg_if::cfg_if,
    core::{any::type_name, marker::PhantomData, mem},
};

//--------------------------------------------------------------------------------------------------
// Slot index expansion
//--------------------------------------------------------------------------------------------------

cfg_if! {
    if #[cfg(feature = "slots-64")] {
        macro_rules! with_slot_indices {
            ($callback:ident) => {
                $callback!(
                    0 1 2 3 4 5 6 7 8 9 10 11 12 13 14 15
                    16 17 18 19 20 21 22 23 24 25 26 27 28 29 30 31
                    32 33 34 35 36 37 38 39 40 41 42 43 44 45 46 47
                    48 49 50 51 52 53 54 55 56 57 58 59 60 61 62 63
                )
            };
        }
    } else if #[cfg(feature = "slots-32")] {
        macro_rules! with_slot_indices {
            ($callback:ident) => {
                $callback!(
                    0 1 2 3 4 5 6 7 8 9 10 11 12 13 14 15
                    16 17 18 19 20 21 22 23 24 25 26 27 28 29 30 31
                )
            };
        }
    } else {
        macro_rules! with_slot_indices {
            ($callback:ident) => {
                $callback!(0 1 2 3 4 5 6 7 8 9 10 11 12 13 14 15)
            };
        }
    }
}

//--------------------------------------------------------------------------------------------------
// Public Definitions
//--------------------------------------------------------------------------------------------------

/// A stub family: yields the stub serving slot `SLOT`.
pub(crate) trait SlotEntry {
    type Callback: Copy;

    /// Slots in the table the stubs serve.
    const CAPACITY: usize;

    fn entry<const SLOT: usize>() -> Self::Callback;
}

/// Whether `SLOT` exists in the table of stub family `E`.
struct InTable<E, const SLOT: usize>(PhantomData<E>);

impl<E: SlotEntry, const SLOT: usize> InTable<E, SLOT> {
    const EXISTS: bool = SLOT < E::CAPACITY;
}

// Type-level selectors, never instantiated.
#[allow(dead_code)]
pub(crate) struct Arity0<Tb, T, R>(PhantomData<(Tb, fn(&mut T) -> R)>);
#[allow(dead_code)]
pub(crate) struct Arity1<Tb, T, R, A1>(PhantomData<(Tb, fn(&mut T, A1) -> R)>);
#[allow(dead_code)]
pub(crate) struct Arity2<Tb, T, R, A1, A2>(PhantomData<(Tb, fn(&mut T, A1, A2) -> R)>);
#[allow(dead_code)]
pub(crate) struct Arity3<Tb, T, R, A1, A2, A3>(PhantomData<(Tb, fn(&mut T, A1, A2, A3) -> R)>);

//--------------------------------------------------------------------------------------------------
// Public Code
//--------------------------------------------------------------------------------------------------

/// The stub of family `E` serving slot `index`.
pub(crate) fn select<E: SlotEntry>(index: usize) -> E::Callback {
    macro_rules! arms {
        ($($n:literal)*) => {
            match index {
                $($n if InTable::<E, $n>::EXISTS => E::entry::<$n>(),)*
                _ => unreachable!(
                    "slot index {} beyond table capacity {}",
                    index,
                    E::CAPACITY
                ),
            }
        };
    }
    with_slot_indices!(arms)
}

impl<Tb: Table, T, R> SlotEntry for Arity0<Tb, T, R> {
    type Callback = unsafe extern "C" fn() -> R;

    const CAPACITY: usize = Tb::CAPACITY;

    fn entry<const SLOT: usize>() -> Self::Callback {
        stub0::<Tb, T, R, SLOT>
    }
}

impl<Tb: Table, T, R, A1> SlotEntry for Arity1<Tb, T, R, A1> {
    type Callback = unsafe extern "C" fn(A1) -> R;

    const CAPACITY: usize = Tb::CAPACITY;

    fn entry<const SLOT: usize>() -> Self::Callback {
        stub1::<Tb, T, R, A1, SLOT>
    }
}

impl<Tb: Table, T, R, A1, A2> SlotEntry for Arity2<Tb, T, R, A1, A2> {
    type Callback = unsafe extern "C" fn(A1, A2) -> R;

    const CAPACITY: usize = Tb::CAPACITY;

    fn entry<const SLOT: usize>() -> Self::Callback {
        stub2::<Tb, T, R, A1, A2, SLOT>
    }
}

impl<Tb: Table, T, R, A1, A2, A3> SlotEntry for Arity3<Tb, T, R, A1, A2, A3> {
    type Callback = unsafe extern "C" fn(A1, A2, A3) -> R;

    const CAPACITY: usize = Tb::CAPACITY;

    fn entry<const SLOT: usize>() -> Self::Callback {
        stub3::<Tb, T, R, A1, A2, A3, SLOT>
    }
}

//--------------------------------------------------------------------------------------------------
// Private Code
//--------------------------------------------------------------------------------------------------

/// Turn the erased pointer stored in a slot back into the method it was erased from.
///
/// # Safety
///
/// `erased` must come from `M::erase` for exactly this `F`.
#[inline(always)]
unsafe fn restore<F: Copy>(erased: *const ()) -> F {
    debug_assert_eq!(mem::size_of::<F>(), mem::size_of::<*const ()>());
    mem::transmute_copy(&erased)
}

unsafe extern "C" fn stub0<Tb: Table, T, R, const SLOT: usize>() -> R {
    let (object, method) = Tb::registry().load(SLOT, type_name::<fn(&mut T) -> R>());
    // Safety: the slot holds a method of this shape, so it was installed by a
    // `Trampoline<T, fn(&mut T) -> R, Tb>`, which also holds the exclusive borrow of the
    // object for as long as the slot is bound. The caller upholds the contract of
    // `Trampoline::as_callback`.
    unsafe {
        let method = restore::<fn(&mut T) -> R>(method);
        method(object.cast::<T>().as_mut())
    }
}

unsafe extern "C" fn stub1<Tb: Table, T, R, A1, const SLOT: usize>(a1: A1) -> R {
    let (object, method) = Tb::registry().load(SLOT, type_name::<fn(&mut T, A1) -> R>());
    // Safety: see stub0.
    unsafe {
        let method = restore::<fn(&mut T, A1) -> R>(method);
        method(object.cast::<T>().as_mut(), a1)
    }
}

unsafe extern "C" fn stub2<Tb: Table, T, R, A1, A2, const SLOT: usize>(a1: A1, a2: A2) -> R {
    let (object, method) = Tb::registry().load(SLOT, type_name::<fn(&mut T, A1, A2) -> R>());
    // Safety: see stub0.
    unsafe {
        let method = restore::<fn(&mut T, A1, A2) -> R>(method);
        method(object.cast::<T>().as_mut(), a1, a2)
    }
}

unsafe extern "C" fn stub3<Tb: Table, T, R, A1, A2, A3, const SLOT: usize>(
    a1: A1,
    a2: A2,
    a3: A3,
) -> R {
    let shape = type_name::<fn(&mut T, A1, A2, A3) -> R>();
    let (object, method) = Tb::registry().load(SLOT, shape);
    // Safety: see stub0.
    unsafe {
        let method = restore::<fn(&mut T, A1, A2, A3) -> R>(method);
        method(object.cast::<T>().as_mut(), a1, a2, a3)
    }
}

//--------------------------------------------------------------------------------------------------
// Testing
//--------------------------------------------------------------------------------------------------
