/*
 * SPDX-License-Identifier: BlueOak-1.0.0
 * Copyright (c) Berkus Decker <berkus+vesper@metta.systems>
 */

//! Bind object methods to plain, context-free C/hardware callbacks.
//!
//! Hardware SDKs and C libraries take callbacks as bare function pointers with
//! zero to three register-sized arguments and no "user data" slot. A
//! [`Trampoline`] binds an object and one of its methods to such a pointer:
//! invoking the pointer calls `object.method(args...)`.
//!
//! Every trampoline occupies one slot of a statically allocated [`Table`].
//! The callback it hands out is a precompiled `extern "C"` stub dedicated to
//! that slot, so the pointer stays valid and identical for as long as the
//! trampoline is bound, no matter how often the method is rebound.
//!
//! ```
//! use trampoline::{trampoline_table, Trampoline};
//!
//! trampoline_table!(Leds, 2);
//!
//! struct Blinker {
//!     lit: bool,
//! }
//!
//! impl Blinker {
//!     fn toggle(&mut self) {
//!         self.lit = !self.lit;
//!     }
//! }
//!
//! let mut blinker = Blinker { lit: false };
//! let handler = Trampoline::<_, fn(&mut Blinker), Leds>::bind_in(&mut blinker, Blinker::toggle)
//!     .expect("Leds has a free slot");
//!
//! // Calling the callback from Rust is `unsafe`: the caller vouches that the
//! // trampoline is still bound and that the call does not overlap another one.
//! let callback: unsafe extern "C" fn() = handler.as_callback();
//! unsafe { callback() };
//!
//! let blinker = handler.release();
//! assert!(blinker.lit);
//! ```

#![no_std]
#![allow(clippy::upper_case_acronyms)]
#![allow(clippy::nonstandard_macro_braces)] // https://github.com/shepmaster/snafu/issues/296

#[cfg(test)]
extern crate std;

#[macro_use]
pub mod macros;

pub mod callbacks;
pub mod console;
mod dispatch;
pub mod registry;
pub mod signature;
mod sync;
mod trampoline;

pub use {
    registry::{
        DefaultTable, Error, Registry, Slot, SlotId, Table, DEFAULT_CAPACITY, MAX_SLOTS,
    },
    signature::{Method, ReturnValue, Word, WORD_SIZE},
    trampoline::Trampoline,
};
