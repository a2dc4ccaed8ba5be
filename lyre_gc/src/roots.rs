//! Root stack.
//!
//! The mutator registers the address of each local that must survive a
//! collection; the collector rewrites the contents of every registered slot
//! when objects move. Slots are pushed and popped in strict LIFO order.

use alloc::vec::Vec;
use core::fmt;

use crate::object::ObjRef;

/// Why a `pop_root` call was rejected.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RootError {
    /// The root stack was empty.
    Empty,
    /// The popped slot was not the most recently pushed one.
    NotOnTop,
}

impl fmt::Display for RootError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            RootError::Empty => write!(f, "root stack is empty"),
            RootError::NotOnTop => write!(f, "slot is not on top of the root stack"),
        }
    }
}

/// LIFO stack of registered root slots.
pub struct RootStack {
    slots: Vec<*mut ObjRef>,
}

impl RootStack {
    pub const fn new() -> RootStack {
        RootStack { slots: Vec::new() }
    }

    #[inline]
    pub fn len(&self) -> usize {
        self.slots.len()
    }

    #[inline]
    pub fn is_empty(&self) -> bool {
        self.slots.is_empty()
    }

    /// Register a slot. The collector never takes ownership; it only reads
    /// and rewrites the slot contents during a flip.
    #[inline]
    pub fn push(&mut self, slot: *mut ObjRef) {
        debug_assert!(!slot.is_null(), "null root slot");
        self.slots.push(slot);
    }

    /// Deregister a slot. The slot must be the current top of the stack.
    pub fn pop(&mut self, slot: *mut ObjRef) -> Result<(), RootError> {
        match self.slots.last() {
            None => Err(RootError::Empty),
            Some(&top) if top != slot => Err(RootError::NotOnTop),
            Some(_) => {
                self.slots.pop();
                Ok(())
            }
        }
    }

    /// The slot registered at `index`, oldest first.
    #[inline]
    pub(crate) fn slot(&self, index: usize) -> *mut ObjRef {
        self.slots[index]
    }

    pub fn iter(&self) -> impl Iterator<Item = *mut ObjRef> + '_ {
        self.slots.iter().copied()
    }
}

impl Default for RootStack {
    fn default() -> Self {
        Self::new()
    }
}
