/*
 * SPDX-License-Identifier: BlueOak-1.0.0
 * Copyright (c) Berkus Decker <berkus+vesper@metta.systems>
 */

//! Trampoline tables.
//!
//! A table is a fixed array of slots in static memory. Each bound trampoline
//! owns one slot, which holds the object pointer and the type-erased method
//! pointer its callback stub reads on every invocation. Slots never move and
//! are identified by index, so a callback handed out for slot `n` stays valid
//! for as long as slot `n` stays bound.
//!
//! Every slot also records the shape of the method bound to it, the type name
//! of `fn(&mut T, ..) -> R`. A stub checks that shape before dispatching, so a
//! callback kept from an earlier binding of a reused slot is caught instead of
//! calling the new method with the wrong types.

use {
    crate::{
        sync::{interface::Mutex, NullLock},
        warn,
    },
    bit_field::BitField,
    cfg_if::cfg_if,
    core::{
        fmt,
        ptr::{self, NonNull},
        slice, str,
        sync::atomic::{AtomicPtr, AtomicUsize, Ordering},
    },
    snafu::{OptionExt, Snafu},
    static_assertions::const_assert,
};

//--------------------------------------------------------------------------------------------------
// Public Definitions
//--------------------------------------------------------------------------------------------------

cfg_if! {
    if #[cfg(feature = "slots-64")] {
        /// Largest capacity a single table may be declared with.
        pub const MAX_SLOTS: usize = 64;
    } else if #[cfg(feature = "slots-32")] {
        /// Largest capacity a single table may be declared with.
        pub const MAX_SLOTS: usize = 32;
    } else {
        /// Largest capacity a single table may be declared with.
        pub const MAX_SLOTS: usize = 16;
    }
}

/// Capacity of [`DefaultTable`].
pub const DEFAULT_CAPACITY: usize = MAX_SLOTS;

// Claims are tracked one bit per slot.
const_assert!(MAX_SLOTS <= u64::BITS as usize);

/// Errors possibly returned from binding a trampoline.
#[derive(Debug, Snafu)]
pub enum Error {
    /// Every slot of the table is already bound.
    #[snafu(display("Trampoline table {} is full ({} slots)", table, capacity))]
    TableFull {
        table: &'static str,
        capacity: usize,
    },
}

/// Index of a slot within its table.
#[derive(Copy, Clone, Debug, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct SlotId(usize);

/// Storage for one bound trampoline.
///
/// Fields are only ever loaded and stored whole, which keeps dispatch free of
/// locks and of read-modify-write atomics (unavailable on ARMv6-M).
pub struct Slot {
    object: AtomicPtr<()>,
    method: AtomicPtr<()>,
    shape: AtomicPtr<u8>,
    shape_len: AtomicUsize,
}

struct RegistryInner {
    claimed: u64,
}

/// A fixed-size set of trampoline slots.
pub struct Registry {
    name: &'static str,
    slots: &'static [Slot],
    inner: NullLock<RegistryInner>,
}

/// Static access to one [`Registry`].
///
/// Callback stubs are plain functions without context, so the only way for
/// them to find their slot is through a type. Declare tables with
/// [`trampoline_table!`](crate::trampoline_table).
pub trait Table: 'static {
    /// Number of slots, equal to `registry().capacity()`.
    ///
    /// Stubs are only emitted for slots below it.
    const CAPACITY: usize;

    /// The registry backing this table.
    fn registry() -> &'static Registry;
}

trampoline_table!(
    /// Table used by trampolines that don't name one.
    pub DefaultTable,
    DEFAULT_CAPACITY
);

//--------------------------------------------------------------------------------------------------
// Public Code
//--------------------------------------------------------------------------------------------------

impl SlotId {
    /// Position of the slot in its table.
    pub const fn index(self) -> usize {
        self.0
    }
}

impl fmt::Display for SlotId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "#{}", self.0)
    }
}

impl Slot {
    /// An unbound slot, used to initialize table storage.
    #[allow(clippy::declare_interior_mutable_const)]
    pub const EMPTY: Slot = Slot {
        object: AtomicPtr::new(ptr::null_mut()),
        method: AtomicPtr::new(ptr::null_mut()),
        shape: AtomicPtr::new(ptr::null_mut()),
        shape_len: AtomicUsize::new(0),
    };

    fn has_shape(&self, shape: &'static str) -> bool {
        let name = self.shape.load(Ordering::Acquire);
        let len = self.shape_len.load(Ordering::Acquire);
        if name.is_null() || len != shape.len() {
            return false;
        }
        if ptr::eq(name, shape.as_ptr()) {
            return true;
        }
        // The same type name may be emitted more than once across codegen units.
        // Safety: `name` and `len` were stored together from a `&'static str` in `install`.
        unsafe { slice::from_raw_parts(name, len) == shape.as_bytes() }
    }

    fn shape(&self) -> &'static str {
        let name = self.shape.load(Ordering::Acquire);
        if name.is_null() {
            return "nothing";
        }
        // Safety: as in `has_shape`.
        let bytes = unsafe { slice::from_raw_parts(name, self.shape_len.load(Ordering::Acquire)) };
        str::from_utf8(bytes).unwrap_or("?")
    }
}

impl Registry {
    /// Create a registry over `slots`.
    ///
    /// Panics during constant evaluation if there are more than [`MAX_SLOTS`] slots.
    pub const fn new(name: &'static str, slots: &'static [Slot]) -> Self {
        assert!(
            slots.len() <= MAX_SLOTS,
            "trampoline table capacity exceeds MAX_SLOTS"
        );
        Self {
            name,
            slots,
            inner: NullLock::new(RegistryInner { claimed: 0 }),
        }
    }

    /// Name the table was declared with.
    pub fn name(&self) -> &'static str {
        self.name
    }

    /// Total number of slots.
    pub fn capacity(&self) -> usize {
        self.slots.len()
    }

    /// Number of slots currently bound.
    pub fn bound(&self) -> usize {
        self.inner.lock(|inner| inner.claimed.count_ones() as usize)
    }

    /// Whether `slot` currently belongs to a live trampoline.
    pub fn is_bound(&self, slot: SlotId) -> bool {
        slot.0 < self.capacity() && self.inner.lock(|inner| inner.claimed.get_bit(slot.0))
    }

    /// Reserve the lowest free slot.
    pub(crate) fn claim(&self) -> Result<SlotId, Error> {
        let capacity = self.capacity();
        self.inner
            .lock(|inner| {
                let index = (0..capacity).find(|&index| !inner.claimed.get_bit(index))?;
                inner.claimed.set_bit(index, true);
                Some(SlotId(index))
            })
            .context(TableFullSnafu {
                table: self.name,
                capacity,
            })
    }

    /// Publish object, method and method shape of a freshly claimed slot.
    ///
    /// The object goes last: a stub that sees the object also sees the rest.
    pub(crate) fn install(
        &self,
        slot: SlotId,
        object: NonNull<()>,
        method: *const (),
        shape: &'static str,
    ) {
        let slot = &self.slots[slot.0];
        slot.shape_len.store(shape.len(), Ordering::Release);
        slot.shape.store(shape.as_ptr() as *mut u8, Ordering::Release);
        slot.method.store(method as *mut (), Ordering::Release);
        slot.object.store(object.as_ptr(), Ordering::Release);
    }

    /// Swap the method of a bound slot. The shape stays the same.
    pub(crate) fn rebind(&self, slot: SlotId, method: *const ()) {
        self.slots[slot.0]
            .method
            .store(method as *mut (), Ordering::Release);
    }

    /// Clear a slot and return it to the free pool.
    pub(crate) fn release(&self, slot: SlotId) {
        let entry = &self.slots[slot.0];
        entry.object.store(ptr::null_mut(), Ordering::Release);
        entry.method.store(ptr::null_mut(), Ordering::Release);
        entry.shape.store(ptr::null_mut(), Ordering::Release);
        entry.shape_len.store(0, Ordering::Release);
        self.inner.lock(|inner| {
            inner.claimed.set_bit(slot.0, false);
        });
    }

    /// Fetch object and method for dispatch from slot `index`, on behalf of a
    /// stub for methods of type `shape`.
    ///
    /// A cleared slot means the callback outlived its trampoline. A slot bound to
    /// another shape means the callback outlived its trampoline and the slot was
    /// reused. Both are reported and turned into a panic instead of calling
    /// through stale pointers.
    #[inline(always)]
    pub(crate) fn load(&self, index: usize, shape: &'static str) -> (NonNull<()>, *const ()) {
        let slot = &self.slots[index];
        let Some(object) = NonNull::new(slot.object.load(Ordering::Acquire)) else {
            self.orphaned(index)
        };
        if !slot.has_shape(shape) {
            self.mismatched(index, shape)
        }
        (object, slot.method.load(Ordering::Acquire) as *const ())
    }

    #[cold]
    #[inline(never)]
    fn orphaned(&self, index: usize) -> ! {
        warn!(
            "Callback for trampoline table {} slot #{} invoked after release",
            self.name, index
        );
        panic!("orphaned trampoline callback");
    }

    #[cold]
    #[inline(never)]
    fn mismatched(&self, index: usize, shape: &'static str) -> ! {
        warn!(
            "Stale {} callback for trampoline table {} slot #{}, now bound to {}",
            shape,
            self.name,
            index,
            self.slots[index].shape()
        );
        panic!("orphaned trampoline callback");
    }
}

//--------------------------------------------------------------------------------------------------
// Testing
//--------------------------------------------------------------------------------------------------
