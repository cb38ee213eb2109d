/*
 * SPDX-License-Identifier: BlueOak-1.0.0
 * Copyright (c) Berkus Decker <berkus+vesper@metta.systems>
 */

//! Trampolines driven the way external C code drives them: through the bare
//! function pointer only.
//!
//! Every callback below is called while its trampoline is bound, one call at a
//! time, with no reference from `object()` alive across the call.

use trampoline::{
    callbacks::IrqTrampoline, trampoline, trampoline_table, DefaultTable, Error, Table,
    Trampoline,
};

//--------------------------------------------------------------------------------------------------
// No arguments
//--------------------------------------------------------------------------------------------------

trampoline_table!(Blinkers, 1);

struct Blinker {
    lit: bool,
}

impl Blinker {
    fn toggle(&mut self) {
        self.lit = !self.lit;
    }
}

#[test]
fn blinker_toggles_on_each_invocation() {
    let mut blinker = Blinker { lit: false };
    let handler =
        Trampoline::<_, fn(&mut Blinker), Blinkers>::bind_in(&mut blinker, Blinker::toggle)
            .unwrap();
    let callback: unsafe extern "C" fn() = handler.as_callback();

    unsafe {
        callback();
        assert!(handler.object().lit);

        callback();
        assert!(!handler.object().lit);
    }

    assert!(!handler.release().lit);
}

//--------------------------------------------------------------------------------------------------
// One argument with a return value
//--------------------------------------------------------------------------------------------------

trampoline_table!(Counters, 1);

struct Counter {
    total: i32,
}

impl Counter {
    fn add(&mut self, x: i32) -> i32 {
        self.total += x;
        self.total
    }
}

#[test]
fn counter_returns_running_total() {
    let mut counter = Counter { total: 0 };
    let handler =
        Trampoline::<_, fn(&mut Counter, i32) -> i32, Counters>::bind_in(&mut counter, Counter::add)
            .unwrap();
    let callback: unsafe extern "C" fn(i32) -> i32 = handler.as_callback();

    unsafe {
        assert_eq!(callback(5), 5);
        assert_eq!(handler.object().total, 5);
        assert_eq!(callback(3), 8);
    }

    assert_eq!(handler.release().total, 8);
}

//--------------------------------------------------------------------------------------------------
// Rebinding
//--------------------------------------------------------------------------------------------------

trampoline_table!(Switches, 1);

#[derive(Default)]
struct Switch {
    a: bool,
    b: bool,
}

impl Switch {
    fn handler_a(&mut self) {
        self.a = true;
    }

    fn handler_b(&mut self) {
        self.b = true;
    }
}

#[test]
fn rebind_dispatches_to_new_method() {
    let mut switch = Switch::default();
    let mut handler =
        Trampoline::<_, fn(&mut Switch), Switches>::bind_in(&mut switch, Switch::handler_a)
            .unwrap();
    let callback = handler.as_callback();

    unsafe { callback() };
    let seen = unsafe { handler.object() };
    assert!(seen.a && !seen.b);

    let handler_b: fn(&mut Switch) = Switch::handler_b;
    handler.set_method(handler_b);
    assert_eq!(handler.method() as usize, handler_b as usize);
    assert_eq!(handler.as_callback() as usize, callback as usize);

    // Clear `a` to show the second invocation leaves it alone.
    unsafe {
        handler.object_mut().a = false;
        callback();
    }

    let switch = handler.release();
    assert!(switch.b);
    assert!(!switch.a);
}

//--------------------------------------------------------------------------------------------------
// Argument preservation across every arity
//--------------------------------------------------------------------------------------------------

trampoline_table!(Recorders, 4);

#[derive(Default)]
struct Recorder {
    calls: u32,
    args: [u32; 3],
}

impl Recorder {
    fn none(&mut self) -> u32 {
        self.calls += 1;
        self.calls
    }

    fn one(&mut self, a: u32) -> u32 {
        self.calls += 1;
        self.args = [a, 0, 0];
        a.wrapping_mul(3)
    }

    fn two(&mut self, a: u32, b: u32) -> u64 {
        self.calls += 1;
        self.args = [a, b, 0];
        (u64::from(a) << 32) | u64::from(b)
    }

    fn three(&mut self, a: u32, b: u32, c: u32) -> u32 {
        self.calls += 1;
        self.args = [a, b, c];
        a.wrapping_add(b).wrapping_add(c)
    }
}

#[test]
fn arguments_and_returns_pass_through_every_arity() {
    let values = [0u32, 1, 0x7fff_ffff, 0x8000_0000, u32::MAX, 0xdead_beef];

    let mut recorder = Recorder::default();
    let none = Trampoline::<_, fn(&mut Recorder) -> u32, Recorders>::bind_in(
        &mut recorder,
        Recorder::none,
    )
    .unwrap();
    unsafe {
        assert_eq!((none.as_callback())(), 1);
        assert_eq!((none.as_callback())(), 2);
    }
    let recorder = none.release();

    let one = Trampoline::<_, fn(&mut Recorder, u32) -> u32, Recorders>::bind_in(
        recorder,
        Recorder::one,
    )
    .unwrap();
    for &a in &values {
        unsafe {
            assert_eq!((one.as_callback())(a), a.wrapping_mul(3));
            assert_eq!(one.object().args, [a, 0, 0]);
        }
    }
    let recorder = one.release();

    let two = Trampoline::<_, fn(&mut Recorder, u32, u32) -> u64, Recorders>::bind_in(
        recorder,
        Recorder::two,
    )
    .unwrap();
    for (&a, &b) in values.iter().zip(values.iter().rev()) {
        unsafe {
            assert_eq!(
                (two.as_callback())(a, b),
                (u64::from(a) << 32) | u64::from(b)
            );
            assert_eq!(two.object().args, [a, b, 0]);
        }
    }
    let recorder = two.release();

    let three = Trampoline::<_, fn(&mut Recorder, u32, u32, u32) -> u32, Recorders>::bind_in(
        recorder,
        Recorder::three,
    )
    .unwrap();
    for window in values.windows(3) {
        let (a, b, c) = (window[0], window[1], window[2]);
        unsafe {
            assert_eq!(
                (three.as_callback())(a, b, c),
                a.wrapping_add(b).wrapping_add(c)
            );
            assert_eq!(three.object().args, [a, b, c]);
        }
    }

    let recorder = three.release();
    assert_eq!(recorder.calls, 2 + 6 + 6 + 4);
    assert_eq!(Recorders::registry().bound(), 0);
}

//--------------------------------------------------------------------------------------------------
// Pointer arguments and mixed widths
//--------------------------------------------------------------------------------------------------

trampoline_table!(Buffers, 1);

struct Filler {
    pattern: u8,
}

impl Filler {
    fn fill(&mut self, buffer: *mut u8, len: usize, offset: u16) -> bool {
        if buffer.is_null() {
            return false;
        }
        for index in usize::from(offset)..len {
            // Safety: the caller passes a buffer of `len` bytes.
            unsafe { *buffer.add(index) = self.pattern };
        }
        true
    }
}

#[test]
fn pointer_arguments_reach_the_method() {
    let mut filler = Filler { pattern: 0xa5 };
    let handler = Trampoline::<_, fn(&mut Filler, *mut u8, usize, u16) -> bool, Buffers>::bind_in(
        &mut filler,
        Filler::fill,
    )
    .unwrap();
    let callback = handler.as_callback();

    let mut buffer = [0u8; 8];
    unsafe {
        assert!(callback(buffer.as_mut_ptr(), buffer.len(), 5));
        assert!(!callback(core::ptr::null_mut(), 8, 0));
    }
    assert_eq!(buffer, [0, 0, 0, 0, 0, 0xa5, 0xa5, 0xa5]);
}

//--------------------------------------------------------------------------------------------------
// Table exhaustion and slot reuse
//--------------------------------------------------------------------------------------------------

trampoline_table!(Pair, 2);

#[test]
fn full_table_refuses_then_reuses_released_slot() {
    let mut first = Blinker { lit: false };
    let mut second = Blinker { lit: false };
    let mut third = Blinker { lit: false };

    let a = Trampoline::<_, fn(&mut Blinker), Pair>::bind_in(&mut first, Blinker::toggle).unwrap();
    let b =
        Trampoline::<_, fn(&mut Blinker), Pair>::bind_in(&mut second, Blinker::toggle).unwrap();
    assert_eq!(Pair::registry().bound(), 2);

    match Trampoline::<_, fn(&mut Blinker), Pair>::bind_in(&mut third, Blinker::toggle) {
        Err(Error::TableFull { table, capacity }) => {
            assert_eq!(table, "Pair");
            assert_eq!(capacity, 2);
        }
        Ok(_) => panic!("bound a third trampoline into a two-slot table"),
    }

    let freed = a.slot();
    a.release();
    let c = Trampoline::<_, fn(&mut Blinker), Pair>::bind_in(&mut third, Blinker::toggle).unwrap();
    assert_eq!(c.slot(), freed);

    unsafe {
        (c.as_callback())();
        (b.as_callback())();
    }
    assert!(c.release().lit);
    assert!(b.release().lit);
    assert!(!first.lit);
}

//--------------------------------------------------------------------------------------------------
// Default table
//--------------------------------------------------------------------------------------------------

#[test]
fn default_table_binds_without_naming_a_table() {
    let mut blinker = Blinker { lit: false };
    let handler = Trampoline::bind(&mut blinker, Blinker::toggle as fn(&mut Blinker)).unwrap();
    assert!(DefaultTable::registry().is_bound(handler.slot()));
    unsafe { (handler.as_callback())() };
    let blinker = handler.release();

    let handler: IrqTrampoline<'_, Blinker> = trampoline!(irq, blinker, Blinker::toggle).unwrap();
    unsafe { (handler.as_callback())() };
    let slot = handler.slot();

    assert!(!handler.release().lit);
    assert!(!DefaultTable::registry().is_bound(slot));
}
