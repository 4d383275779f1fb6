// -- Lint policy ---------------------------------------------------------
// This is the single source of truth for crate-wide lints.

// Broad lint groups
#![deny(clippy::all)]
#![deny(clippy::pedantic)]
#![deny(clippy::nursery)]
// Documentation
#![deny(missing_docs)]
#![deny(rustdoc::broken_intra_doc_links)]
#![deny(rustdoc::private_intra_doc_links)]
#![deny(rustdoc::bare_urls)]
// No panicking in library code
#![deny(clippy::unwrap_used)]
#![deny(clippy::expect_used)]
#![deny(clippy::panic)]
#![deny(clippy::todo)]
#![deny(clippy::unimplemented)]
// No debug/print artifacts
#![deny(clippy::dbg_macro)]
#![deny(clippy::print_stdout)]
#![deny(clippy::print_stderr)]
// Import hygiene
#![deny(clippy::wildcard_imports)]
// Function signature hygiene
#![deny(clippy::fn_params_excessive_bools)]
// Clone / pass-by-value hygiene
#![deny(clippy::needless_pass_by_value)]
#![deny(clippy::implicit_clone)]
// String hygiene
#![deny(clippy::inefficient_to_string)]
#![deny(clippy::redundant_closure_for_method_calls)]
#![deny(clippy::manual_string_new)]
#![deny(clippy::str_to_string)]
// Cargo lints (warn, not deny since cargo lints can be noisy)
#![warn(clippy::cargo)]
// Unused / redundant code
#![deny(unused_results)]
#![deny(unused_qualifications)]
// Cast hygiene
#![deny(trivial_casts)]
#![deny(trivial_numeric_casts)]

//! Chunked, multi-threaded molecular surface generation.
//!
//! Molsurf computes van der Waals, solvent-accessible and solvent-excluded
//! surfaces around atom selections without stalling the frame loop. The
//! bounding volume of the atoms is carved into volume-bounded chunks, each
//! chunk is sent to a pool of worker threads running an
//! [`IsosurfaceExtractor`](surface::IsosurfaceExtractor), and the partial
//! meshes are merged into one aggregate surface as they arrive.
//!
//! # Key entry points
//!
//! - [`surface::SurfaceManager`] - add, restyle and remove surfaces
//! - [`scene::SceneGraph`] - node registry with added/removed deltas
//! - [`molecule::compute_extent`] - bounding box and centroid of atoms
//! - [`surface::partition()`] - recursive volume-bounded splitting
//! - [`options::Options`] - runtime configuration (TOML presets)
//!
//! # Architecture
//!
//! The coordinating thread owns every piece of mutable state. Workers
//! receive jobs over bounded queues and answer over a shared result
//! channel; the coordinator drains that channel once per frame in
//! [`surface::SurfaceManager::pump`] and folds each fragment into its
//! surface record. [`surface::SurfaceManager::reconcile`] then swaps the
//! displayed mesh node for every surface that is still filling in.

pub mod error;
pub mod molecule;
pub mod options;
pub mod scene;
pub mod surface;
