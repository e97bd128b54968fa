//! Object storage model.
//!
//! Attribute writes flow through the transition engine: a write the current
//! layout already satisfies is a direct slot store; anything else derives a
//! new layout, migrates the object onto it, and then stores. Reads never
//! migrate; they are a layout lookup followed by a typed slot read.

pub mod class;
pub mod instance;
pub mod layout;
pub mod storage;
pub mod transition;

use crate::object::layout::SlotKind;
use thiserror::Error;

/// Errors surfaced by the storage model.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ObjectError {
    /// The attribute is not present on the object. The interpreter maps
    /// this to the language-level missing-attribute error.
    #[error("'{class_name}' object has no attribute '{attribute}'")]
    AttributeNotFound {
        /// Name of the object's class.
        class_name: String,
        /// The attribute that was looked up.
        attribute: String,
    },

    /// A slot was read before anything was stored in it. At the storage
    /// level this is a layout/storage desynchronization and is not
    /// recoverable.
    #[error("read of unoccupied {kind:?} slot {index}")]
    SlotUninitialized {
        /// Kind of the slot that was read.
        kind: SlotKind,
        /// Index of the slot within its kind.
        index: u16,
    },
}
