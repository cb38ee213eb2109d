/*
 * SPDX-License-Identifier: BlueOak-1.0.0
 * Copyright (c) Berkus Decker <berkus+vesper@metta.systems>
 */

//! A host stand-in for a microcontroller SDK.
//!
//! Like the real thing it only takes bare `extern "C"` function pointers: no
//! user data, no closures. Interrupts and timer expiries are raised by the
//! simulator loop instead of hardware.
//!
//! Registering a callback promises that it stays callable until it is removed
//! again, which is what makes the calls below sound.

use {
    anyhow::{bail, ensure, Result},
    trampoline::callbacks::RepeatingTimer,
};

pub type GpioIrqCallback = unsafe extern "C" fn(u32, u32);
pub type HardwareAlarmCallback = unsafe extern "C" fn(u32);
pub type RepeatingTimerCallback = unsafe extern "C" fn(*mut RepeatingTimer) -> bool;

pub const NUM_BANK0_GPIOS: u32 = 30;
pub const NUM_HARDWARE_ALARMS: u32 = 4;

pub const GPIO_IRQ_LEVEL_LOW: u32 = 0x1;
pub const GPIO_IRQ_LEVEL_HIGH: u32 = 0x2;
pub const GPIO_IRQ_EDGE_FALL: u32 = 0x4;
pub const GPIO_IRQ_EDGE_RISE: u32 = 0x8;
pub const GPIO_IRQ_ALL: u32 =
    GPIO_IRQ_LEVEL_LOW | GPIO_IRQ_LEVEL_HIGH | GPIO_IRQ_EDGE_FALL | GPIO_IRQ_EDGE_RISE;

/// What the SDK hands to a repeating timer callback.
///
/// Callbacks only see it as an opaque `*mut RepeatingTimer`.
#[repr(C)]
#[derive(Debug, Default)]
pub struct TimerState {
    pub period_us: u32,
    pub fired: u32,
}

/// Counts of simulated interrupts, delivered or not.
#[derive(Debug, Default)]
pub struct Stats {
    pub gpio_delivered: u32,
    pub gpio_masked: u32,
    pub alarms_fired: u32,
    pub timer_fired: u32,
}

#[derive(Default)]
pub struct Sdk {
    gpio_callback: Option<GpioIrqCallback>,
    gpio_enabled: [u32; NUM_BANK0_GPIOS as usize],
    alarms: [Option<HardwareAlarmCallback>; NUM_HARDWARE_ALARMS as usize],
    timer: Option<(RepeatingTimerCallback, TimerState)>,
    stats: Stats,
}

impl Sdk {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn stats(&self) -> &Stats {
        &self.stats
    }

    //----------------------------------------------------------------------------------------------
    // GPIO
    //----------------------------------------------------------------------------------------------

    /// `gpio_set_irq_enabled_with_callback()`: one callback serves every pin of the bank.
    pub fn gpio_set_irq_enabled_with_callback(
        &mut self,
        gpio: u32,
        events: u32,
        enabled: bool,
        callback: GpioIrqCallback,
    ) -> Result<()> {
        self.gpio_set_irq_enabled(gpio, events, enabled)?;
        self.gpio_callback = Some(callback);
        Ok(())
    }

    pub fn gpio_set_irq_enabled(&mut self, gpio: u32, events: u32, enabled: bool) -> Result<()> {
        ensure!(
            gpio < NUM_BANK0_GPIOS,
            "GPIO {} out of range (0..{})",
            gpio,
            NUM_BANK0_GPIOS
        );
        ensure!(events & !GPIO_IRQ_ALL == 0, "Invalid GPIO events {:#x}", events);

        let mask = &mut self.gpio_enabled[gpio as usize];
        if enabled {
            *mask |= events;
        } else {
            *mask &= !events;
        }
        Ok(())
    }

    /// Remove the bank callback, but only if it is still `callback`.
    pub fn gpio_remove_irq_callback(&mut self, callback: GpioIrqCallback) {
        if self.gpio_callback.map(|cb| cb as usize) == Some(callback as usize) {
            self.gpio_enabled = [0; NUM_BANK0_GPIOS as usize];
            self.gpio_callback = None;
        }
    }

    /// Latch `events` on `gpio` and run the bank callback for the enabled ones.
    pub fn raise_gpio(&mut self, gpio: u32, events: u32) -> Result<()> {
        ensure!(gpio < NUM_BANK0_GPIOS, "GPIO {} out of range", gpio);

        let pending = events & self.gpio_enabled[gpio as usize];
        match self.gpio_callback {
            Some(callback) if pending != 0 => {
                // Safety: registered callbacks stay valid until removed.
                unsafe { callback(gpio, pending) };
                self.stats.gpio_delivered += 1;
            }
            _ => self.stats.gpio_masked += 1,
        }
        Ok(())
    }

    //----------------------------------------------------------------------------------------------
    // Hardware alarms
    //----------------------------------------------------------------------------------------------

    /// `hardware_alarm_set_callback()`
    pub fn hardware_alarm_set_callback(
        &mut self,
        alarm: u32,
        callback: HardwareAlarmCallback,
    ) -> Result<()> {
        let Some(slot) = self.alarms.get_mut(alarm as usize) else {
            bail!("Hardware alarm {} does not exist", alarm);
        };
        ensure!(slot.is_none(), "Hardware alarm {} is already claimed", alarm);
        *slot = Some(callback);
        Ok(())
    }

    pub fn hardware_alarm_unclaim(&mut self, alarm: u32) {
        if let Some(slot) = self.alarms.get_mut(alarm as usize) {
            *slot = None;
        }
    }

    /// Fire a one-shot alarm. Unclaimed alarms expire silently.
    pub fn raise_alarm(&mut self, alarm: u32) -> Result<()> {
        ensure!(
            alarm < NUM_HARDWARE_ALARMS,
            "Hardware alarm {} does not exist",
            alarm
        );
        if let Some(callback) = self.alarms[alarm as usize] {
            // Safety: as for GPIO.
            unsafe { callback(alarm) };
            self.stats.alarms_fired += 1;
        }
        Ok(())
    }

    //----------------------------------------------------------------------------------------------
    // Repeating timer
    //----------------------------------------------------------------------------------------------

    /// `add_repeating_timer_us()`
    pub fn add_repeating_timer_us(
        &mut self,
        period_us: u32,
        callback: RepeatingTimerCallback,
    ) -> Result<()> {
        ensure!(self.timer.is_none(), "Repeating timer already running");
        self.timer = Some((
            callback,
            TimerState {
                period_us,
                fired: 0,
            },
        ));
        Ok(())
    }

    pub fn cancel_repeating_timer(&mut self) -> bool {
        self.timer.take().is_some()
    }

    /// Let one timer period pass. Returns whether the timer is still running.
    pub fn tick(&mut self) -> bool {
        let Some((callback, state)) = self.timer.as_mut() else {
            return false;
        };
        state.fired += 1;
        self.stats.timer_fired += 1;

        let timer: *mut TimerState = state;
        // Safety: as for GPIO, and `timer` points at live timer state.
        if unsafe { callback(timer.cast()) } {
            true
        } else {
            self.timer = None;
            false
        }
    }

    pub fn timer_running(&self) -> bool {
        self.timer.is_some()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    extern "C" fn ignore_gpio(_gpio: u32, _events: u32) {}
    extern "C" fn ignore_alarm(_alarm: u32) {}

    #[test]
    fn masked_gpio_events_are_not_delivered() {
        let mut sdk = Sdk::new();
        sdk.gpio_set_irq_enabled_with_callback(2, GPIO_IRQ_EDGE_RISE, true, ignore_gpio)
            .unwrap();

        sdk.raise_gpio(2, GPIO_IRQ_EDGE_FALL).unwrap();
        sdk.raise_gpio(2, GPIO_IRQ_EDGE_RISE | GPIO_IRQ_EDGE_FALL)
            .unwrap();
        sdk.raise_gpio(3, GPIO_IRQ_EDGE_RISE).unwrap();

        assert_eq!(sdk.stats().gpio_delivered, 1);
        assert_eq!(sdk.stats().gpio_masked, 2);
        assert!(sdk.raise_gpio(NUM_BANK0_GPIOS, GPIO_IRQ_EDGE_RISE).is_err());
    }

    #[test]
    fn alarms_are_claimed_once() {
        let mut sdk = Sdk::new();
        sdk.hardware_alarm_set_callback(1, ignore_alarm).unwrap();
        assert!(sdk.hardware_alarm_set_callback(1, ignore_alarm).is_err());
        assert!(sdk
            .hardware_alarm_set_callback(NUM_HARDWARE_ALARMS, ignore_alarm)
            .is_err());

        sdk.hardware_alarm_unclaim(1);
        sdk.hardware_alarm_set_callback(1, ignore_alarm).unwrap();
    }
}
