/*
 * SPDX-License-Identifier: BlueOak-1.0.0
 * Copyright (c) Berkus Decker <berkus+vesper@metta.systems>
 */

//! Which methods can be bound.
//!
//! A bindable method takes `&mut T` plus zero to three arguments that each fit
//! in one machine word, and returns nothing or a value that fits in two
//! machine words. These are the shapes a C callback can carry entirely in
//! registers. Anything else is rejected while compiling, never at runtime.
//!
//! Four arguments have no [`Method`] implementation:
//!
//! ```compile_fail
//! use trampoline::{trampoline_table, Trampoline};
//!
//! trampoline_table!(Wide, 1);
//!
//! struct Sink;
//!
//! impl Sink {
//!     fn take(&mut self, _a: u32, _b: u32, _c: u32, _d: u32) {}
//! }
//!
//! let mut sink = Sink;
//! let _ = Trampoline::<_, fn(&mut Sink, u32, u32, u32, u32), Wide>::bind_in(&mut sink, Sink::take);
//! ```
//!
//! Neither does an argument wider than a word:
//!
//! ```compile_fail
//! use trampoline::{trampoline_table, Trampoline};
//!
//! trampoline_table!(Wide, 1);
//!
//! struct Sink;
//!
//! impl Sink {
//!     fn take(&mut self, _wide: u128) {}
//! }
//!
//! let mut sink = Sink;
//! let _ = Trampoline::<_, fn(&mut Sink, u128), Wide>::bind_in(&mut sink, Sink::take);
//! ```
//!
//! Or a `Word` implementation that lies about its size:
//!
//! ```compile_fail
//! use trampoline::{trampoline_table, Trampoline, Word};
//!
//! trampoline_table!(Wide, 1);
//!
//! #[derive(Copy, Clone)]
//! struct Pair(usize, usize);
//! unsafe impl Word for Pair {}
//!
//! struct Sink;
//!
//! impl Sink {
//!     fn take(&mut self, _pair: Pair) {}
//! }
//!
//! let mut sink = Sink;
//! let _ = Trampoline::<_, fn(&mut Sink, Pair), Wide>::bind_in(&mut sink, Sink::take);
//! ```

use {
    crate::{
        dispatch::{self, Arity0, Arity1, Arity2, Arity3},
        registry::{SlotId, Table},
    },
    cfg_if::cfg_if,
    core::{ffi::c_void, mem::size_of, ptr::NonNull},
    static_assertions::{assert_eq_size, const_assert},
};

//--------------------------------------------------------------------------------------------------
// Public Definitions
//--------------------------------------------------------------------------------------------------

/// Size of one machine word (one argument register) on the target.
pub const WORD_SIZE: usize = size_of::<usize>();

/// A type passed in a single argument register.
///
/// # Safety
///
/// The type must fit in [`WORD_SIZE`] bytes. Binding a method with an argument
/// that doesn't is a compile error regardless of this promise.
pub unsafe trait Word: Copy {}

/// A type a callback may return: `()` or anything fitting in two machine words.
///
/// # Safety
///
/// The type must fit in `2 * WORD_SIZE` bytes.
pub unsafe trait ReturnValue {}

mod sealed {
    pub trait Sealed<T> {}
}

/// A bindable method of `T`, implemented for `fn(&mut T, A1, ..) -> R` with up to
/// three [`Word`] arguments and a [`ReturnValue`].
pub trait Method<T>: Copy + sealed::Sealed<T> {
    /// The context-free callback shape: the method minus its receiver.
    ///
    /// Calling it from Rust is `unsafe`, see
    /// [`Trampoline::as_callback`](crate::Trampoline::as_callback).
    type Callback: Copy;

    /// Number of arguments besides the receiver.
    const ARITY: usize;

    /// Evaluates to `()` if every argument fits a word and the return value
    /// fits two, fails to compile otherwise.
    const FITS: ();

    /// The method as a type-erased pointer, for storage in a slot.
    fn erase(self) -> *const ();

    /// The stub serving `slot` of table `Tb` for this method shape.
    fn callback<Tb: Table>(slot: SlotId) -> Self::Callback;
}

//--------------------------------------------------------------------------------------------------
// Public Code
//--------------------------------------------------------------------------------------------------

// Methods travel through slots as plain data pointers.
assert_eq_size!(fn(&mut u8), *const ());
assert_eq_size!(fn(&mut u8, usize, usize, usize) -> u64, *const ());
// The two-word return budget covers 64-bit values on 32-bit targets.
const_assert!(size_of::<u64>() <= 2 * WORD_SIZE);

macro_rules! impl_word {
    ($($t:ty),* $(,)?) => {
        $(unsafe impl Word for $t {})*
    };
}

impl_word!(u8, u16, u32, usize, i8, i16, i32, isize, bool, char, f32);

cfg_if! {
    if #[cfg(target_pointer_width = "64")] {
        impl_word!(u64, i64, f64);
    } else {
        unsafe impl ReturnValue for u64 {}
        unsafe impl ReturnValue for i64 {}
        unsafe impl ReturnValue for f64 {}
    }
}

unsafe impl<P> Word for *const P {}
unsafe impl<P> Word for *mut P {}
unsafe impl<P> Word for NonNull<P> {}
unsafe impl<P> Word for Option<NonNull<P>> {}
unsafe impl<'r, P> Word for &'r P {}
unsafe impl<'r, P> Word for Option<&'r P> {}

unsafe impl ReturnValue for () {}
unsafe impl<W: Word> ReturnValue for W {}

// Keep the C void pointer spelled the way SDK headers spell it.
const_assert!(size_of::<*mut c_void>() == WORD_SIZE);

macro_rules! impl_method {
    ($arity:literal, $family:ident; $($arg:ident),*) => {
        impl<T, R: ReturnValue, $($arg: Word),*> sealed::Sealed<T> for fn(&mut T, $($arg),*) -> R {}

        impl<T, R: ReturnValue, $($arg: Word),*> Method<T> for fn(&mut T, $($arg),*) -> R {
            type Callback = unsafe extern "C" fn($($arg),*) -> R;

            const ARITY: usize = $arity;

            const FITS: () = {
                $(assert!(
                    size_of::<$arg>() <= WORD_SIZE,
                    "trampoline arguments must fit in one machine word"
                );)*
                assert!(
                    size_of::<R>() <= 2 * WORD_SIZE,
                    "trampoline return values must fit in two machine words"
                );
            };

            fn erase(self) -> *const () {
                self as *const ()
            }

            fn callback<Tb: Table>(slot: SlotId) -> Self::Callback {
                dispatch::select::<$family<Tb, T, R, $($arg),*>>(slot.index())
            }
        }
    };
}

impl_method!(0, Arity0;);
impl_method!(1, Arity1; A1);
impl_method!(2, Arity2; A1, A2);
impl_method!(3, Arity3; A1, A2, A3);

//--------------------------------------------------------------------------------------------------
// Testing
//--------------------------------------------------------------------------------------------------
