/*
 * SPDX-License-Identifier: BlueOak-1.0.0
 * Copyright (c) Berkus Decker <berkus+vesper@metta.systems>
 */

mod sdk;

use {
    anyhow::{anyhow, Context, Result},
    clap::{value_parser, Arg, ArgAction, Command},
    sdk::{
        Sdk, TimerState, GPIO_IRQ_ALL, GPIO_IRQ_EDGE_FALL, GPIO_IRQ_EDGE_RISE,
        GPIO_IRQ_LEVEL_HIGH, GPIO_IRQ_LEVEL_LOW, NUM_BANK0_GPIOS,
    },
    std::{collections::BTreeSet, fmt, io::Write as _},
    trampoline::{
        callbacks::{GpioIrqTrampoline, RepeatingTimer},
        console::{self, interface},
        trampoline, trampoline_table, Table,
    },
};

/// Timer period handed to the simulated SDK.
const HEARTBEAT_PERIOD_US: u32 = 500_000;

trampoline_table!(
    /// Trampolines for the simulated timer block.
    Timers, 2
);

//--------------------------------------------------------------------------------------------------
// Console
//--------------------------------------------------------------------------------------------------

/// Trampoline diagnostics go to stderr, next to the simulator's own output.
struct StderrConsole;

static STDERR_CONSOLE: StderrConsole = StderrConsole;

impl interface::Write for StderrConsole {
    fn write_fmt(&self, args: fmt::Arguments) -> fmt::Result {
        std::io::stderr().write_fmt(args).map_err(|_| fmt::Error)
    }
}

//--------------------------------------------------------------------------------------------------
// Interrupt consumers
//--------------------------------------------------------------------------------------------------

#[derive(Default)]
struct ButtonPanel {
    presses: [u32; NUM_BANK0_GPIOS as usize],
    releases: [u32; NUM_BANK0_GPIOS as usize],
    levels: u32,
}

impl ButtonPanel {
    fn on_gpio(&mut self, gpio: u32, events: u32) {
        let pin = gpio as usize;
        if events & GPIO_IRQ_EDGE_FALL != 0 {
            self.presses[pin] += 1;
        }
        if events & GPIO_IRQ_EDGE_RISE != 0 {
            self.releases[pin] += 1;
        }
        if events & (GPIO_IRQ_LEVEL_LOW | GPIO_IRQ_LEVEL_HIGH) != 0 {
            self.levels += 1;
        }
    }

    fn on_gpio_logged(&mut self, gpio: u32, events: u32) {
        println!("  gpio {:2}: {}", gpio, EventNames(events));
        self.on_gpio(gpio, events);
    }
}

struct AlarmLog {
    verbose: bool,
    fired: Vec<u32>,
}

impl AlarmLog {
    fn on_alarm(&mut self, alarm: u32) {
        if self.verbose {
            println!("  alarm {} fired", alarm);
        }
        self.fired.push(alarm);
    }
}

struct Heartbeat {
    verbose: bool,
    limit: u32,
    beats: u32,
}

impl Heartbeat {
    fn on_tick(&mut self, timer: *mut RepeatingTimer) -> bool {
        self.beats += 1;
        if self.verbose {
            // Safety: the SDK passes its own live `TimerState` as the opaque timer.
            let state = unsafe { &*timer.cast::<TimerState>() };
            println!(
                "  heartbeat {}/{} (period {} us, fired {})",
                self.beats, self.limit, state.period_us, state.fired
            );
        }
        self.beats < self.limit
    }
}

//--------------------------------------------------------------------------------------------------
// Command line
//--------------------------------------------------------------------------------------------------

/// `PIN:EVENTS`, where events are `rise`, `fall`, `high`, `low` joined by `+`,
/// or a raw event mask.
fn parse_gpio(arg: &str) -> Result<(u32, u32)> {
    let (pin, events) = arg
        .split_once(':')
        .ok_or_else(|| anyhow!("expected PIN:EVENTS, got {}", arg))?;
    let pin = pin
        .parse::<u32>()
        .with_context(|| format!("invalid GPIO number in {}", arg))?;

    let mut mask = 0;
    for event in events.split('+') {
        mask |= match event {
            "rise" => GPIO_IRQ_EDGE_RISE,
            "fall" => GPIO_IRQ_EDGE_FALL,
            "high" => GPIO_IRQ_LEVEL_HIGH,
            "low" => GPIO_IRQ_LEVEL_LOW,
            raw => parse_mask(raw).with_context(|| format!("invalid GPIO event {}", raw))?,
        };
    }
    if mask == 0 || mask & !GPIO_IRQ_ALL != 0 {
        return Err(anyhow!("GPIO event mask {:#x} out of range", mask));
    }
    Ok((pin, mask))
}

fn parse_mask(raw: &str) -> Result<u32> {
    Ok(match raw.strip_prefix("0x") {
        Some(hex) => u32::from_str_radix(hex, 16)?,
        None => raw.parse()?,
    })
}

struct EventNames(u32);

impl fmt::Display for EventNames {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let names = [
            (GPIO_IRQ_LEVEL_LOW, "low"),
            (GPIO_IRQ_LEVEL_HIGH, "high"),
            (GPIO_IRQ_EDGE_FALL, "fall"),
            (GPIO_IRQ_EDGE_RISE, "rise"),
        ];
        let mut separator = "";
        for (bit, name) in names {
            if self.0 & bit != 0 {
                write!(f, "{}{}", separator, name)?;
                separator = "+";
            }
        }
        Ok(())
    }
}

//--------------------------------------------------------------------------------------------------
// Simulation
//--------------------------------------------------------------------------------------------------

// irqsim --gpio 3:fall --gpio 3:rise --alarm 1 --ticks 4 --verbose
fn main() -> Result<()> {
    let matches = Command::new("irqsim - interrupt simulator")
        .about("Deliver simulated GPIO, alarm and timer interrupts to object methods through trampolines")
        .disable_version_flag(true)
        .arg(
            Arg::new("gpio")
                .long("gpio")
                .value_name("PIN:EVENTS")
                .help("Raise GPIO events, e.g. 3:fall or 7:rise+fall (repeatable)")
                .action(ArgAction::Append),
        )
        .arg(
            Arg::new("alarm")
                .long("alarm")
                .value_name("NUM")
                .help("Fire a hardware alarm (repeatable)")
                .value_parser(value_parser!(u32))
                .action(ArgAction::Append),
        )
        .arg(
            Arg::new("ticks")
                .long("ticks")
                .value_name("N")
                .help("Number of heartbeats before the repeating timer stops itself")
                .value_parser(value_parser!(u32))
                .default_value("3"),
        )
        .arg(
            Arg::new("verbose")
                .long("verbose")
                .short('v')
                .help("Log every delivered interrupt")
                .action(ArgAction::SetTrue),
        )
        .get_matches();

    let gpio_events = matches
        .get_many::<String>("gpio")
        .unwrap_or_default()
        .map(|arg| parse_gpio(arg))
        .collect::<Result<Vec<_>>>()?;
    let alarms = matches
        .get_many::<u32>("alarm")
        .unwrap_or_default()
        .copied()
        .collect::<Vec<_>>();
    let ticks = matches.get_one::<u32>("ticks").copied().unwrap_or_default();
    let verbose = matches.get_flag("verbose");

    console::register_console(&STDERR_CONSOLE);

    let mut sdk = Sdk::new();
    let mut panel = ButtonPanel::default();
    let mut alarm_log = AlarmLog {
        verbose,
        fired: Vec::new(),
    };
    let mut heartbeat = Heartbeat {
        verbose,
        limit: ticks,
        beats: 0,
    };

    // GPIO bank callback, in the default table.
    let mut gpio: GpioIrqTrampoline<'_, ButtonPanel> =
        trampoline!(gpio_irq, &mut panel, ButtonPanel::on_gpio)?;
    if verbose {
        gpio.set_method(ButtonPanel::on_gpio_logged);
    }
    // The bank callback is installed with the first pin, the others only get enabled.
    let pins = gpio_events
        .iter()
        .map(|&(pin, _)| pin)
        .collect::<BTreeSet<_>>();
    for (n, &pin) in pins.iter().enumerate() {
        if n == 0 {
            sdk.gpio_set_irq_enabled_with_callback(pin, GPIO_IRQ_ALL, true, gpio.as_callback())?;
        } else {
            sdk.gpio_set_irq_enabled(pin, GPIO_IRQ_ALL, true)?;
        }
    }

    // One alarm callback serves every claimed alarm, it is told which one fired.
    let alarm = trampoline!(hardware_alarm in Timers, &mut alarm_log, AlarmLog::on_alarm)?;
    let claimed = alarms.iter().copied().collect::<BTreeSet<_>>();
    for &num in &claimed {
        sdk.hardware_alarm_set_callback(num, alarm.as_callback())?;
    }

    let timer = trampoline!(repeating_timer in Timers, &mut heartbeat, Heartbeat::on_tick)?;
    if ticks > 0 {
        sdk.add_repeating_timer_us(HEARTBEAT_PERIOD_US, timer.as_callback())?;
    }

    if verbose {
        println!(
            "Bound gpio {}, alarm {} and heartbeat {}; {} of {} timer slots in use",
            gpio.slot(),
            alarm.slot(),
            timer.slot(),
            Timers::registry().bound(),
            Timers::registry().capacity()
        );
    }

    for &(pin, events) in &gpio_events {
        sdk.raise_gpio(pin, events)?;
    }
    for &num in &alarms {
        sdk.raise_alarm(num)?;
    }
    while sdk.tick() {}

    // Unregister from the SDK before the slots go back to their tables.
    let panel = gpio.release_with(|callback| sdk.gpio_remove_irq_callback(callback));
    let alarm_log = alarm.release_with(|_| {
        for &num in &claimed {
            sdk.hardware_alarm_unclaim(num);
        }
    });
    let heartbeat = timer.release_with(|_| {
        sdk.cancel_repeating_timer();
    });

    let stats = sdk.stats();
    println!(
        "GPIO: {} delivered, {} masked",
        stats.gpio_delivered, stats.gpio_masked
    );
    for pin in 0..NUM_BANK0_GPIOS as usize {
        if panel.presses[pin] + panel.releases[pin] > 0 {
            println!(
                "  gpio {:2}: {} presses, {} releases",
                pin, panel.presses[pin], panel.releases[pin]
            );
        }
    }
    if panel.levels > 0 {
        println!("  {} level interrupts", panel.levels);
    }
    println!("Alarms: {} fired {:?}", stats.alarms_fired, alarm_log.fired);
    println!(
        "Heartbeat: {} beats of {} timer expiries, timer {}",
        heartbeat.beats,
        stats.timer_fired,
        if sdk.timer_running() {
            "still running"
        } else {
            "stopped"
        }
    );

    Ok(())
}
