//! Weft type lattice
//!
//! A single tagged [`Type`] enum covers every value shape; container kinds
//! carry their nested types inline. Relations between types (exact,
//! subtype, castable) live in [`relation`] and consult the class parent
//! graph through the [`ClassHierarchy`] trait.

pub mod relation;
pub mod ty;

pub use relation::{is_subclass, ClassHierarchy, Relation};
pub use ty::{ClassId, MethodSig, MethodSlot, Type};
