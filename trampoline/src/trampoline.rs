/*
 * SPDX-License-Identifier: BlueOak-1.0.0
 * Copyright (c) Berkus Decker <berkus+vesper@metta.systems>
 */

use {
    crate::{
        registry::{DefaultTable, Error, SlotId, Table},
        signature::Method,
    },
    core::{any::type_name, marker::PhantomData, mem::ManuallyDrop, ptr::NonNull},
    static_assertions::assert_not_impl_any,
};

//--------------------------------------------------------------------------------------------------
// Public Definitions
//--------------------------------------------------------------------------------------------------

/// An object method bound to a plain `extern "C"` callback.
///
/// The trampoline holds the exclusive borrow of its object and one slot of table
/// `Tb`. [`as_callback`](Self::as_callback) returns a function pointer without
/// any context argument; calling it calls the bound method on the object with
/// the same arguments and returns what the method returns.
///
/// The callback is valid from `bind` until the trampoline is released or
/// dropped. Releasing the slot while external code can still call the callback
/// is a contract violation: disable the interrupt, cancel the timer or
/// unregister the handler first, see [`release_with`](Self::release_with).
/// A callback invoked after release, or after its slot went to a method of
/// another type, reports the misuse and panics.
///
/// Forgetting a trampoline with [`core::mem::forget`] leaks its slot, which
/// then keeps pointing at the object after the borrow ends. The callback must
/// not be invoked after that.
///
/// Nothing is synchronized. Rebinding while the callback runs on another core
/// or from a higher priority interrupt lets that invocation see either method.
pub struct Trampoline<'a, T, M, Tb = DefaultTable>
where
    M: Method<T>,
    Tb: Table,
{
    slot: SlotId,
    object: NonNull<T>,
    method: M,
    _borrow: PhantomData<&'a mut T>,
    _table: PhantomData<Tb>,
}

// Copying a trampoline would hand out a second owner of the same slot.
assert_not_impl_any!(Trampoline<'static, u32, fn(&mut u32)>: Clone, Copy, Send, Sync);

//--------------------------------------------------------------------------------------------------
// Public Code
//--------------------------------------------------------------------------------------------------

impl<'a, T, M> Trampoline<'a, T, M, DefaultTable>
where
    M: Method<T>,
{
    /// Bind `method` of `object` in the [`DefaultTable`].
    pub fn bind(object: &'a mut T, method: M) -> Result<Self, Error> {
        Self::bind_in(object, method)
    }
}

impl<'a, T, M, Tb> Trampoline<'a, T, M, Tb>
where
    M: Method<T>,
    Tb: Table,
{
    /// Bind `method` of `object` in table `Tb`.
    ///
    /// Fails with [`Error::TableFull`] if every slot of `Tb` is taken.
    ///
    /// The slot is returned by [`release`](Self::release) or by dropping the
    /// trampoline. A trampoline passed to [`core::mem::forget`] never returns it,
    /// and its callback then refers to an object whose borrow has ended.
    pub fn bind_in(object: &'a mut T, method: M) -> Result<Self, Error> {
        // Rejects over-wide argument and return types at compile time.
        #[allow(clippy::let_unit_value)]
        let () = M::FITS;

        let registry = Tb::registry();
        let slot = registry.claim()?;
        let object = NonNull::from(object);
        registry.install(slot, object.cast(), method.erase(), type_name::<M>());

        trace!(
            "Bound {}-argument trampoline in {} slot {}",
            M::ARITY,
            registry.name(),
            slot
        );

        Ok(Self {
            slot,
            object,
            method,
            _borrow: PhantomData,
            _table: PhantomData,
        })
    }

    /// The callback to hand to external code.
    ///
    /// Always the same function pointer for as long as this trampoline lives,
    /// whatever method is bound at the moment.
    ///
    /// # Calling the callback
    ///
    /// Creating the pointer is safe, calling it is not. Whoever calls it must make
    /// sure that:
    ///
    /// * the trampoline is still bound: not released, dropped or forgotten;
    /// * no other invocation of it is running, on another core, in an interrupt
    ///   or further up the stack of the bound method;
    /// * no reference from [`object`](Self::object) or
    ///   [`object_mut`](Self::object_mut) is alive.
    pub fn as_callback(&self) -> M::Callback {
        M::callback::<Tb>(self.slot)
    }

    /// Bind another method of the same object. Takes effect with the next invocation.
    pub fn set_method(&mut self, method: M) {
        self.method = method;
        Tb::registry().rebind(self.slot, method.erase());

        trace!("Rebound {} slot {}", Tb::registry().name(), self.slot);
    }

    /// The currently bound method.
    pub fn method(&self) -> M {
        self.method
    }

    /// The table slot this trampoline occupies.
    pub fn slot(&self) -> SlotId {
        self.slot
    }

    /// Shared access to the bound object.
    ///
    /// # Safety
    ///
    /// The callback must not be invoked while the returned reference is alive.
    pub unsafe fn object(&self) -> &T {
        self.object.as_ref()
    }

    /// Exclusive access to the bound object.
    ///
    /// # Safety
    ///
    /// The callback must not be invoked while the returned reference is alive.
    pub unsafe fn object_mut(&mut self) -> &mut T {
        self.object.as_mut()
    }

    /// Release the slot and give the object back.
    ///
    /// The caller must have made sure nothing can invoke the callback anymore.
    pub fn release(self) -> &'a mut T {
        let this = ManuallyDrop::new(self);
        this.unbind();
        // Safety: the pointer came from the `&'a mut T` passed to `bind_in` and the slot
        // no longer refers to it.
        unsafe { &mut *this.object.as_ptr() }
    }

    /// Run `quiesce` with the callback, then release.
    ///
    /// `quiesce` is where the callback gets unregistered from whatever external
    /// code holds it: an interrupt controller, a timer, a C library.
    pub fn release_with(self, quiesce: impl FnOnce(M::Callback)) -> &'a mut T {
        quiesce(self.as_callback());
        self.release()
    }

    fn unbind(&self) {
        let registry = Tb::registry();
        registry.release(self.slot);

        trace!("Released {} slot {}", registry.name(), self.slot);
    }
}

impl<'a, T, M, Tb> Drop for Trampoline<'a, T, M, Tb>
where
    M: Method<T>,
    Tb: Table,
{
    fn drop(&mut self) {
        self.unbind();
    }
}

//--------------------------------------------------------------------------------------------------
// Testing
//--------------------------------------------------------------------------------------------------
