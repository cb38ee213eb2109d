/*
 * SPDX-License-Identifier: BlueOak-1.0.0
 * Copyright (c) Berkus Decker <berkus+vesper@metta.systems>
 */

#[doc(hidden)]
#[cfg(not(test))]
pub fn _print(args: core::fmt::Arguments) {
    use crate::console::{console, interface::Write};

    let _ = console().write_fmt(args);
}

/// Host-based tests print straight to stdout.
#[doc(hidden)]
#[cfg(test)]
pub fn _print(args: core::fmt::Arguments) {
    std::print!("{}", args);
}

//--------------------------------------------------------------------------------------------------
//--------------------------------------------------------------------------------------------------

/// Prints info text, with a newline.
#[macro_export]
macro_rules! info {
    ($string:expr) => ({
        $crate::macros::_print(format_args!(concat!("[i] ", $string, "\n")));
    });
    ($format_string:expr, $($arg:tt)*) => ({
        $crate::macros::_print(format_args!(concat!("[i] ", $format_string, "\n"), $($arg)*));
    })
}

/// Prints warning text, with a newline.
#[macro_export]
macro_rules! warn {
    ($string:expr) => ({
        $crate::macros::_print(format_args!(concat!("[W] ", $string, "\n")));
    });
    ($format_string:expr, $($arg:tt)*) => ({
        $crate::macros::_print(format_args!(concat!("[W] ", $format_string, "\n"), $($arg)*));
    })
}

/// Info output that only exists with the `trace` feature.
macro_rules! trace {
    ($($arg:tt)*) => ({
        #[cfg(feature = "trace")]
        $crate::info!($($arg)*);
    })
}

//--------------------------------------------------------------------------------------------------
// Declarations
//--------------------------------------------------------------------------------------------------

/// Declare a trampoline table: a zero-sized [`Table`](crate::Table) type backed by
/// `capacity` statically allocated slots.
///
/// ```
/// trampoline::trampoline_table!(
///     /// Slots for GPIO bank 0 handlers.
///     pub GpioBank0, 4
/// );
///
/// use trampoline::Table;
/// assert_eq!(GpioBank0::registry().capacity(), 4);
/// ```
///
/// Capacity above [`MAX_SLOTS`](crate::MAX_SLOTS) fails to compile.
///
/// ```compile_fail
/// trampoline::trampoline_table!(TooBig, 65);
/// # use trampoline::Table;
/// # let _ = TooBig::registry();
/// ```
#[macro_export]
macro_rules! trampoline_table {
    ($(#[$attr:meta])* $vis:vis $name:ident, $capacity:expr $(,)?) => {
        $(#[$attr])*
        $vis struct $name;

        impl $crate::registry::Table for $name {
            const CAPACITY: usize = $capacity;

            fn registry() -> &'static $crate::registry::Registry {
                const EMPTY: $crate::registry::Slot = $crate::registry::Slot::EMPTY;
                static SLOTS: [$crate::registry::Slot; $capacity] = [EMPTY; $capacity];
                static REGISTRY: $crate::registry::Registry =
                    $crate::registry::Registry::new(stringify!($name), &SLOTS);

                &REGISTRY
            }
        }
    };
}

/// Bind a method to one of the named hardware callback shapes in one line.
///
/// `kind` is one of `irq`, `exception`, `resus`, `rtc`, `gpio_irq`,
/// `hardware_alarm`, `repeating_timer` or `alarm`, see [`callbacks`](crate::callbacks).
/// Without a table the trampoline lands in [`DefaultTable`](crate::DefaultTable),
/// `kind in Table` picks another one.
///
/// ```
/// use trampoline::{trampoline, trampoline_table};
///
/// trampoline_table!(Buttons, 1);
///
/// struct Button {
///     edges: u32,
/// }
///
/// impl Button {
///     fn on_edge(&mut self, _gpio: u32, events: u32) {
///         self.edges += events.count_ones();
///     }
/// }
///
/// let mut button = Button { edges: 0 };
/// let handler = trampoline!(gpio_irq in Buttons, &mut button, Button::on_edge).unwrap();
///
/// unsafe { (handler.as_callback())(7, 0b1100) };
/// assert_eq!(handler.release().edges, 2);
/// ```
#[macro_export]
macro_rules! trampoline {
    (@with $alias:ident, $object:expr, $method:expr $(,)?) => {
        $crate::callbacks::$alias::bind($object, $method)
    };
    (@with $alias:ident in $table:ty, $object:expr, $method:expr $(,)?) => {
        $crate::callbacks::$alias::<_, $table>::bind_in($object, $method)
    };
    (irq $($rest:tt)*) => {
        $crate::trampoline!(@with IrqTrampoline $($rest)*)
    };
    (exception $($rest:tt)*) => {
        $crate::trampoline!(@with ExceptionTrampoline $($rest)*)
    };
    (resus $($rest:tt)*) => {
        $crate::trampoline!(@with ResusTrampoline $($rest)*)
    };
    (rtc $($rest:tt)*) => {
        $crate::trampoline!(@with RtcTrampoline $($rest)*)
    };
    (gpio_irq $($rest:tt)*) => {
        $crate::trampoline!(@with GpioIrqTrampoline $($rest)*)
    };
    (hardware_alarm $($rest:tt)*) => {
        $crate::trampoline!(@with HardwareAlarmTrampoline $($rest)*)
    };
    (repeating_timer $($rest:tt)*) => {
        $crate::trampoline!(@with RepeatingTimerTrampoline $($rest)*)
    };
    (alarm $($rest:tt)*) => {
        $crate::trampoline!(@with AlarmTrampoline $($rest)*)
    };
}
