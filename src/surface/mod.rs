//! Chunked surface generation.
//!
//! [`SurfaceManager::add_surface`] computes the extent of the atoms to
//! show, [`partition()`]s it into volume-bounded [`VolumeChunk`]s and hands
//! one [`SurfaceJob`] per chunk to the [`WorkerPool`]. Each result is turned
//! into a colored [`MeshFragment`] and appended to the surface's
//! [`SurfaceGeometry`] in the [`SurfaceRegistry`].

mod color;
mod extractor;
mod manager;
mod material;
mod mesh;
mod partition;
mod pool;
mod protocol;
mod registry;

pub use color::{
    apply_property_map, property_range, ColorRamp, ColorScheme, PropertyMap,
};
pub use extractor::{IsosurfaceExtractor, SphereShellExtractor};
pub use manager::{SurfaceManager, SurfaceRequest, SurfaceStats};
pub use material::{Material, SurfaceStyle};
pub use mesh::{
    to_mesh_fragment, MeshFragment, SurfaceGeometry, SurfaceVertex,
    MISSING_ATOM_COLOR,
};
pub use partition::{
    atoms_within, partition, prioritize_by_focus, split_extent, VolumeChunk,
    DEFAULT_CHUNK_PADDING, DEFAULT_VOLUME_BUDGET,
};
pub use pool::{WorkerEvent, WorkerPool, WorkerRequest};
pub use protocol::{
    ExtractedMesh, ExtractedVertex, Face, ReducedAtom, SurfaceJob, SurfaceType,
    WorkerInit,
};
pub use registry::{JobOutcome, SurfaceId, SurfaceRecord, SurfaceRegistry};
