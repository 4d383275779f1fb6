//! Atom data consumed by the surface pipeline.
//!
//! Parsing molecular files is someone else's job; this module only holds
//! the shape the pipeline reads: positions, element symbols, display
//! colors and free-form numeric properties, stored in a sparse
//! [`AtomSlots`] collection whose indices stay stable across deletions.

mod atom;
mod element;
mod extent;

pub use atom::{Atom, AtomSlots};
pub use element::vdw_radius;
pub use extent::{compute_extent, Axis, Extent};
