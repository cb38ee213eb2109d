/*
 * SPDX-License-Identifier: BlueOak-1.0.0
 */

//! Diagnostic output sink.
//!
//! Trampolines have no output device of their own. Firmware that wants to see
//! trampoline diagnostics (orphaned invocations, `trace` feature logging)
//! registers a console once at startup; until then everything goes to the
//! [`null_console::NullConsole`].

use crate::sync::NullLock;

pub mod null_console;

//--------------------------------------------------------------------------------------------------
// Public Definitions
//--------------------------------------------------------------------------------------------------

/// Console interfaces.
pub mod interface {
    use core::fmt;

    /// Console write functions.
    pub trait Write {
        /// Write a Rust format string.
        fn write_fmt(&self, args: fmt::Arguments) -> fmt::Result;
    }
}

//--------------------------------------------------------------------------------------------------
// Global instances
//--------------------------------------------------------------------------------------------------

static CONSOLE: NullLock<&'static (dyn interface::Write + Sync)> =
    NullLock::new(&null_console::NULL_CONSOLE);

//--------------------------------------------------------------------------------------------------
// Public Code
//--------------------------------------------------------------------------------------------------

use crate::sync::interface::Mutex;

/// Register a new console.
///
/// Call this before the first trampoline is bound; swapping consoles while a
/// callback may be printing from interrupt context is not synchronized.
pub fn register_console(new_console: &'static (dyn interface::Write + Sync)) {
    CONSOLE.lock(|con| *con = new_console);
}

/// Return a reference to the currently registered console.
///
/// This is the global console used by all printing macros.
pub fn console() -> &'static dyn interface::Write {
    CONSOLE.lock(|con| *con)
}

//--------------------------------------------------------------------------------------------------
// Testing
//--------------------------------------------------------------------------------------------------
