//! The isosurface extractor seam.
//!
//! The voxel algorithm that turns a chunk into triangles is pluggable:
//! anything implementing [`IsosurfaceExtractor`] can be handed to the
//! worker pool. [`SphereShellExtractor`] is a lightweight stand-in that
//! emits one tessellated sphere per visible atom.

use std::sync::OnceLock;

use glam::Vec3;
use rustc_hash::FxHashMap;

use super::protocol::{
    ExtractedMesh, ExtractedVertex, Face, SurfaceJob, WorkerInit,
};
use crate::error::ExtractError;
use crate::molecule::vdw_radius;
use crate::options::SurfaceOptions;

/// Turns one chunk of atoms into a triangle mesh.
///
/// Implementations run on worker threads and must not rely on anything but
/// their arguments. Every returned vertex carries the serial of the atom it
/// belongs to so the coordinator can color it.
pub trait IsosurfaceExtractor: Send + Sync {
    /// Extract the surface for `job` using the atom table from `init`.
    ///
    /// # Errors
    ///
    /// Returns [`ExtractError`] when the job cannot be processed (bad atom
    /// serials, resource limits, ...). The chunk is then left empty.
    fn extract(
        &self,
        init: &WorkerInit,
        job: &SurfaceJob,
    ) -> Result<ExtractedMesh, ExtractError>;
}

/// Reference extractor: a tessellated sphere around every atom to show.
///
/// Radius is the element's van der Waals radius, inflated by the probe
/// radius for solvent-based surface types.
#[derive(Debug, Clone, PartialEq)]
pub struct SphereShellExtractor {
    /// Icosahedron subdivision level (0 = 12 vertices per atom).
    pub subdivisions: u32,
    /// Solvent probe radius.
    pub probe_radius: f32,
}

impl Default for SphereShellExtractor {
    fn default() -> Self {
        Self {
            subdivisions: 1,
            probe_radius: 1.4,
        }
    }
}

impl SphereShellExtractor {
    /// Extractor with the given probe radius and default detail.
    #[must_use]
    pub fn with_probe_radius(probe_radius: f32) -> Self {
        Self {
            probe_radius,
            ..Self::default()
        }
    }

    /// Extractor using the probe radius from loaded surface options.
    #[must_use]
    pub fn from_options(options: &SurfaceOptions) -> Self {
        Self::with_probe_radius(options.clamped().probe_radius)
    }
}

impl IsosurfaceExtractor for SphereShellExtractor {
    fn extract(
        &self,
        init: &WorkerInit,
        job: &SurfaceJob,
    ) -> Result<ExtractedMesh, ExtractError> {
        let (dots, triangles) = unit_sphere(self.subdivisions.min(4));
        let inflate = if job.surface_type.uses_probe() {
            self.probe_radius
        } else {
            0.0
        };

        let mut mesh = ExtractedMesh {
            vertices: Vec::with_capacity(job.atoms_to_show_indices.len() * dots.len()),
            faces: Vec::with_capacity(job.atoms_to_show_indices.len() * triangles.len()),
        };
        for &serial in &job.atoms_to_show_indices {
            let atom = init.atoms.get(serial as usize).ok_or_else(|| {
                ExtractError::new(format!(
                    "atom serial {serial} out of range ({} atoms loaded)",
                    init.atoms.len()
                ))
            })?;
            let center = Vec3::new(atom.x, atom.y, atom.z);
            let radius = vdw_radius(&atom.elem) + inflate;
            let base = mesh.vertices.len() as u32;

            mesh.vertices.extend(dots.iter().map(|&d| {
                let p = center + d * radius;
                ExtractedVertex {
                    x: p.x,
                    y: p.y,
                    z: p.z,
                    atom_id: atom.serial,
                }
            }));
            mesh.faces.extend(triangles.iter().map(|&[a, b, c]| Face {
                a: a + base,
                b: b + base,
                c: c + base,
            }));
        }
        Ok(mesh)
    }
}

type Tessellation = (Vec<Vec3>, Vec<[u32; 3]>);

/// Cached unit-sphere tessellation for subdivision levels 0..=4.
fn unit_sphere(level: u32) -> &'static Tessellation {
    static LEVELS: OnceLock<Vec<Tessellation>> = OnceLock::new();
    let levels = LEVELS.get_or_init(|| {
        let mut out = vec![icosahedron()];
        for _ in 0..4 {
            let next = out.last().map_or_else(icosahedron, subdivide);
            out.push(next);
        }
        out
    });
    &levels[level as usize]
}

fn icosahedron() -> Tessellation {
    let phi = (1.0 + 5.0_f32.sqrt()) / 2.0;
    let raw = [
        [-1.0, phi, 0.0],
        [1.0, phi, 0.0],
        [-1.0, -phi, 0.0],
        [1.0, -phi, 0.0],
        [0.0, -1.0, phi],
        [0.0, 1.0, phi],
        [0.0, -1.0, -phi],
        [0.0, 1.0, -phi],
        [phi, 0.0, -1.0],
        [phi, 0.0, 1.0],
        [-phi, 0.0, -1.0],
        [-phi, 0.0, 1.0],
    ];
    let dots = raw.iter().map(|&v| Vec3::from_array(v).normalize()).collect();
    let faces = vec![
        [0, 11, 5],
        [0, 5, 1],
        [0, 1, 7],
        [0, 7, 10],
        [0, 10, 11],
        [1, 5, 9],
        [5, 11, 4],
        [11, 10, 2],
        [10, 7, 6],
        [7, 1, 8],
        [3, 9, 4],
        [3, 4, 2],
        [3, 2, 6],
        [3, 6, 8],
        [3, 8, 9],
        [4, 9, 5],
        [2, 4, 11],
        [6, 2, 10],
        [8, 6, 7],
        [9, 8, 1],
    ];
    (dots, faces)
}

/// Split every triangle into four, projecting new vertices onto the sphere.
fn subdivide((dots, faces): &Tessellation) -> Tessellation {
    let mut dots = dots.clone();
    let mut midpoints: FxHashMap<(u32, u32), u32> = FxHashMap::default();
    let mut midpoint = |a: u32, b: u32, dots: &mut Vec<Vec3>| -> u32 {
        let key = (a.min(b), a.max(b));
        *midpoints.entry(key).or_insert_with(|| {
            let p = ((dots[a as usize] + dots[b as usize]) * 0.5).normalize();
            dots.push(p);
            (dots.len() - 1) as u32
        })
    };

    let mut out = Vec::with_capacity(faces.len() * 4);
    for &[a, b, c] in faces {
        let ab = midpoint(a, b, &mut dots);
        let bc = midpoint(b, c, &mut dots);
        let ca = midpoint(c, a, &mut dots);
        out.extend([[a, ab, ca], [b, bc, ab], [c, ca, bc], [ab, bc, ca]]);
    }
    (dots, out)
}
