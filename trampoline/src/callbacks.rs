/*
 * SPDX-License-Identifier: BlueOak-1.0.0
 * Copyright (c) Berkus Decker <berkus+vesper@metta.systems>
 */

//! Trampolines for the callback shapes of the Raspberry Pi Pico SDK.
//!
//! Each alias is a plain [`Trampoline`] with the method shape filled in; the
//! comment names the SDK callback type it produces. Every alias takes the table
//! as an optional last parameter.

use {
    crate::{registry::DefaultTable, trampoline::Trampoline},
    core::ffi::c_void,
};

/// Opaque SDK `repeating_timer_t`, only ever seen through a pointer.
#[repr(C)]
pub struct RepeatingTimer {
    _private: [u8; 0],
}

/// `irq_handler_t`
pub type IrqTrampoline<'a, T, Tb = DefaultTable> = Trampoline<'a, T, fn(&mut T), Tb>;

/// `exception_handler_t`
pub type ExceptionTrampoline<'a, T, Tb = DefaultTable> = Trampoline<'a, T, fn(&mut T), Tb>;

/// `resus_callback_t`
pub type ResusTrampoline<'a, T, Tb = DefaultTable> = Trampoline<'a, T, fn(&mut T), Tb>;

/// `rtc_callback_t`
pub type RtcTrampoline<'a, T, Tb = DefaultTable> = Trampoline<'a, T, fn(&mut T), Tb>;

/// `gpio_irq_callback_t`: GPIO number and event mask.
pub type GpioIrqTrampoline<'a, T, Tb = DefaultTable> =
    Trampoline<'a, T, fn(&mut T, u32, u32), Tb>;

/// `hardware_alarm_callback_t`: alarm number.
pub type HardwareAlarmTrampoline<'a, T, Tb = DefaultTable> =
    Trampoline<'a, T, fn(&mut T, u32), Tb>;

/// `repeating_timer_callback_t`: return `true` to keep repeating.
pub type RepeatingTimerTrampoline<'a, T, Tb = DefaultTable> =
    Trampoline<'a, T, fn(&mut T, *mut RepeatingTimer) -> bool, Tb>;

/// `alarm_callback_t`: alarm id and user data. A positive return reschedules the
/// alarm that many microseconds after it was due, a negative one that many
/// microseconds from now, zero cancels it.
pub type AlarmTrampoline<'a, T, Tb = DefaultTable> =
    Trampoline<'a, T, fn(&mut T, i32, *mut c_void) -> i64, Tb>;

//--------------------------------------------------------------------------------------------------
// Testing
//--------------------------------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use {super::*, crate::registry::Table, core::ptr};

    trampoline_table!(Sdk, 4);

    #[derive(Default)]
    struct Board {
        irqs: u32,
        edges: (u32, u32),
        alarm: Option<u32>,
        ticks: u32,
    }

    impl Board {
        fn on_irq(&mut self) {
            self.irqs += 1;
        }

        fn on_gpio(&mut self, gpio: u32, events: u32) {
            self.edges = (gpio, events);
        }

        fn on_hardware_alarm(&mut self, alarm: u32) {
            self.alarm = Some(alarm);
        }

        fn on_tick(&mut self, _timer: *mut RepeatingTimer) -> bool {
            self.ticks += 1;
            self.ticks < 3
        }
    }

    struct Alarms {
        fired: i32,
    }

    impl Alarms {
        fn on_alarm(&mut self, id: i32, _user_data: *mut c_void) -> i64 {
            self.fired = id;
            -1_000_000
        }
    }

    #[test]
    fn aliases_produce_sdk_callback_shapes() {
        let mut board = Board::default();
        let mut alarms = Alarms { fired: 0 };
        {
            // Every handler below shares the one board, one at a time. Each callback is
            // only called while its trampoline is bound.
            let irq = IrqTrampoline::<_, Sdk>::bind_in(&mut board, Board::on_irq).unwrap();
            let callback: unsafe extern "C" fn() = irq.as_callback();
            unsafe {
                callback();
                callback();
            }
            let board = irq.release();

            let gpio = GpioIrqTrampoline::<_, Sdk>::bind_in(board, Board::on_gpio).unwrap();
            let callback: unsafe extern "C" fn(u32, u32) = gpio.as_callback();
            unsafe { callback(21, 0x8) };
            let board = gpio.release();

            let alarm =
                HardwareAlarmTrampoline::<_, Sdk>::bind_in(board, Board::on_hardware_alarm)
                    .unwrap();
            let callback: unsafe extern "C" fn(u32) = alarm.as_callback();
            unsafe { callback(3) };
            let board = alarm.release();

            let timer =
                RepeatingTimerTrampoline::<_, Sdk>::bind_in(board, Board::on_tick).unwrap();
            let callback: unsafe extern "C" fn(*mut RepeatingTimer) -> bool =
                timer.as_callback();
            unsafe {
                assert!(callback(ptr::null_mut()));
                assert!(callback(ptr::null_mut()));
                assert!(!callback(ptr::null_mut()));
            }
        }
        assert_eq!(board.irqs, 2);
        assert_eq!(board.edges, (21, 0x8));
        assert_eq!(board.alarm, Some(3));
        assert_eq!(board.ticks, 3);

        let handler =
            AlarmTrampoline::<_, Sdk>::bind_in(&mut alarms, Alarms::on_alarm).unwrap();
        let callback: unsafe extern "C" fn(i32, *mut c_void) -> i64 = handler.as_callback();
        // Safety: the trampoline stays bound.
        assert_eq!(unsafe { callback(42, ptr::null_mut()) }, -1_000_000);
        assert_eq!(handler.release().fired, 42);
    }

    #[test]
    fn declaration_macro_picks_alias_and_table() {
        trampoline_table!(Declared, 2);

        let mut board = Board::default();
        // Safety: every callback is called while its trampoline is bound.
        let rtc = trampoline!(rtc in Declared, &mut board, Board::on_irq).unwrap();
        unsafe { (rtc.as_callback())() };
        let board = rtc.release();

        let resus = trampoline!(resus in Declared, board, Board::on_irq).unwrap();
        unsafe { (resus.as_callback())() };
        let board = resus.release();

        let exception = trampoline!(exception in Declared, board, Board::on_irq).unwrap();
        unsafe { (exception.as_callback())() };

        assert_eq!(exception.release().irqs, 3);
        assert_eq!(Declared::registry().bound(), 0);
    }
}
