//! # Opal Core
//!
//! Foundational types for the Opal object runtime.
//!
//! This crate provides the building blocks the storage model is written
//! against:
//!
//! - **Value System**: tagged union representation of runtime values with
//!   NaN-boxing, fitting every value in a single 64-bit word
//! - **Interning**: attribute-name interning for O(1) equality checks

#![deny(unsafe_op_in_unsafe_fn)]
#![warn(missing_docs)]
#![warn(clippy::all)]

pub mod intern;
pub mod value;

pub use intern::{intern, InternedString, StringInterner};
pub use value::Value;
