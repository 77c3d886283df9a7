//! The Property System (spec.md §4.1): lets physics modules attach typed,
//! per-galaxy data without changing the `Galaxy` struct itself.
//!
//! `PropertyTable` owns the dense id space and the declared shape of every
//! property. Per-galaxy storage lives on each `Galaxy` directly
//! (`sage_core::types::PropertyBag`); this crate is the only thing that
//! reads or writes it.

#![warn(missing_docs)]

mod kind;
mod registry;

pub use kind::{Arity, PropertyKind, PropertyValue};
pub use registry::{PropertyDescriptor, PropertyTable};
