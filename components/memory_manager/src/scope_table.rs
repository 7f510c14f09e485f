//! The persistent scope table.
//!
//! Debugger clients hold on to scopes across pause/resume cycles. A scope
//! can be *deactivated* when execution leaves it without being destroyed,
//! and later *reactivated* if execution re-enters it. The table is the
//! ownership authority: a slot is released only once it is inactive and no
//! handle refers to it. Handles are RAII pins ([`ScopeRef`]) that keep the
//! slot's reference count; they never destroy an active scope.

use std::cell::{Cell, RefCell};

use core_types::TaggedValue;

/// Whether a scope is currently live on the execution stack.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ScopeState {
    /// The scope is live; it cannot be released regardless of handles.
    Active,
    /// Execution has left the scope; it is released once unreferenced.
    Inactive,
}

/// Identifies a slot in the table. Stable for the slot's whole lifetime.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ScopeId(usize);

struct ScopeSlot {
    occupied: Cell<bool>,
    state: Cell<ScopeState>,
    refs: Cell<u32>,
    value: Cell<TaggedValue>,
}

/// The table of persistent scopes.
#[derive(Default)]
pub struct ScopeTable {
    slots: Vec<ScopeSlot>,
    free: RefCell<Vec<usize>>,
}

impl ScopeTable {
    /// Creates an empty table.
    pub fn new() -> Self {
        Self::default()
    }

    /// Creates a new active scope holding `value`.
    pub fn create(&mut self, value: TaggedValue) -> ScopeId {
        if let Some(index) = self.free.borrow_mut().pop() {
            let slot = &self.slots[index];
            slot.occupied.set(true);
            slot.state.set(ScopeState::Active);
            slot.refs.set(0);
            slot.value.set(value);
            return ScopeId(index);
        }
        let index = self.slots.len();
        self.slots.push(ScopeSlot {
            occupied: Cell::new(true),
            state: Cell::new(ScopeState::Active),
            refs: Cell::new(0),
            value: Cell::new(value),
        });
        ScopeId(index)
    }

    fn slot(&self, id: ScopeId) -> &ScopeSlot {
        let slot = &self.slots[id.0];
        debug_assert!(slot.occupied.get(), "use of a released scope");
        slot
    }

    /// Pins the scope, returning an RAII handle.
    pub fn pin(&self, id: ScopeId) -> ScopeRef<'_> {
        let slot = self.slot(id);
        slot.refs.set(slot.refs.get() + 1);
        ScopeRef { table: self, id }
    }

    /// Marks the scope inactive. If nothing pins it, the slot is released
    /// immediately; otherwise release happens when the last pin drops.
    pub fn deactivate(&self, id: ScopeId) {
        let slot = self.slot(id);
        slot.state.set(ScopeState::Inactive);
        if slot.refs.get() == 0 {
            self.release(id);
        }
    }

    /// Marks an inactive scope active again. The scope must still be
    /// occupied, which pinned scopes always are.
    pub fn reactivate(&self, id: ScopeId) {
        let slot = self.slot(id);
        slot.state.set(ScopeState::Active);
    }

    /// The scope's current state.
    pub fn state(&self, id: ScopeId) -> ScopeState {
        self.slot(id).state.get()
    }

    /// The value stored in the scope.
    pub fn value(&self, id: ScopeId) -> TaggedValue {
        self.slot(id).value.get()
    }

    /// Number of pins on the scope.
    pub fn ref_count(&self, id: ScopeId) -> u32 {
        self.slot(id).refs.get()
    }

    /// Whether the slot backing `id` is still occupied.
    pub fn is_occupied(&self, id: ScopeId) -> bool {
        self.slots[id.0].occupied.get()
    }

    fn release(&self, id: ScopeId) {
        let slot = &self.slots[id.0];
        debug_assert!(slot.refs.get() == 0, "releasing a pinned scope");
        debug_assert!(
            slot.state.get() == ScopeState::Inactive,
            "releasing an active scope"
        );
        slot.occupied.set(false);
        self.free.borrow_mut().push(id.0);
    }
}

/// An RAII pin on a scope slot.
///
/// While any pin is live the slot cannot be released; dropping the last pin
/// of an inactive scope releases it.
pub struct ScopeRef<'a> {
    table: &'a ScopeTable,
    id: ScopeId,
}

impl ScopeRef<'_> {
    /// The pinned scope's id.
    pub fn id(&self) -> ScopeId {
        self.id
    }

    /// The value stored in the pinned scope.
    pub fn value(&self) -> TaggedValue {
        self.table.value(self.id)
    }
}

impl Clone for ScopeRef<'_> {
    fn clone(&self) -> Self {
        self.table.pin(self.id)
    }
}

impl Drop for ScopeRef<'_> {
    fn drop(&mut self) {
        let slot = self.table.slot(self.id);
        let refs = slot.refs.get();
        debug_assert!(refs > 0, "scope reference count underflow");
        slot.refs.set(refs - 1);
        if refs == 1 && slot.state.get() == ScopeState::Inactive {
            self.table.release(self.id);
        }
    }
}
