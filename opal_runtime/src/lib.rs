//! Object-representation core for the Opal runtime.
//!
//! This crate gives every runtime object a physical storage layout that can
//! change over its lifetime while preserving logical attribute values, and
//! lets many objects of the same logical shape share one layout descriptor:
//!
//! - Layout descriptors mapping attribute names to typed storage slots
//! - A fixed storage block with bounded inline slots per kind plus a
//!   growable spill array
//! - Per-class canonical layouts handed to new instances
//! - A transition engine that migrates objects between layouts

#![deny(unsafe_op_in_unsafe_fn)]

pub mod object;

pub use object::class::Class;
pub use object::instance::{Instance, LayoutPolicy};
pub use object::layout::{Layout, LayoutId, SlotKind, SlotLocation};
pub use object::storage::FixedStorage;
pub use object::transition::{migrate, synchronize_with_class};
pub use object::ObjectError;
