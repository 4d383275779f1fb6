//! Mesh assembly: extractor output → colored fragments → aggregate surface.
//!
//! Fragments are always appended, never overwritten, so the aggregate is the
//! same (up to vertex/face order) whatever order chunks complete in. Normals
//! and bounds belong to the aggregate and are recomputed lazily, which
//! gives seams between chunks consistent shading after the next refresh.

use bytemuck::{Pod, Zeroable};
use glam::Vec3;

use super::protocol::ExtractedMesh;

/// Color used for vertices whose owning atom has no resolvable color.
pub const MISSING_ATOM_COLOR: [f32; 3] = [0.0, 0.0, 0.0];

/// Interleaved vertex layout for GPU upload.
#[repr(C)]
#[derive(Debug, Clone, Copy, PartialEq, Pod, Zeroable)]
pub struct SurfaceVertex {
    /// World-space position.
    pub position: [f32; 3],
    /// Unit normal (zero for isolated vertices).
    pub normal: [f32; 3],
    /// RGB color.
    pub color: [f32; 3],
}

/// The colored mesh produced by one completed job, before merging.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct MeshFragment {
    /// Vertex positions.
    pub positions: Vec<Vec3>,
    /// Per-vertex colors, parallel to `positions`.
    pub colors: Vec<[f32; 3]>,
    /// Triangles indexing into `positions`.
    pub faces: Vec<[u32; 3]>,
}

impl MeshFragment {
    /// Number of vertices.
    #[must_use]
    pub fn vertex_count(&self) -> usize {
        self.positions.len()
    }

    /// Number of triangles.
    #[must_use]
    pub fn face_count(&self) -> usize {
        self.faces.len()
    }
}

/// Build a colored fragment from extractor output.
///
/// `palette` is indexed by atom serial and holds each atom's surface color
/// (see [`Atom::surface_display_color`](crate::molecule::Atom::surface_display_color)).
/// Each face paints its three corners with the colors of the atoms those
/// corners belong to; an atom without a color paints
/// [`MISSING_ATOM_COLOR`]. Faces pointing past the vertex list are dropped.
#[must_use]
pub fn to_mesh_fragment(
    palette: &[Option<[f32; 3]>],
    mesh: &ExtractedMesh,
) -> MeshFragment {
    let positions: Vec<Vec3> = mesh
        .vertices
        .iter()
        .map(|v| Vec3::new(v.x, v.y, v.z))
        .collect();
    let mut colors = vec![MISSING_ATOM_COLOR; positions.len()];
    let mut faces = Vec::with_capacity(mesh.faces.len());
    let atom_color = |serial: u32| {
        palette
            .get(serial as usize)
            .copied()
            .flatten()
            .unwrap_or(MISSING_ATOM_COLOR)
    };

    let mut dropped = 0usize;
    for face in &mesh.faces {
        let corners = [face.a, face.b, face.c];
        if corners.iter().any(|&i| i as usize >= positions.len()) {
            dropped += 1;
            continue;
        }
        for &corner in &corners {
            let owner = mesh.vertices[corner as usize].atom_id;
            colors[corner as usize] = atom_color(owner);
        }
        faces.push(corners);
    }
    if dropped > 0 {
        log::warn!("dropped {dropped} faces referencing missing vertices");
    }

    MeshFragment {
        positions,
        colors,
        faces,
    }
}

/// Aggregate geometry of one surface: the union of every merged fragment.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct SurfaceGeometry {
    positions: Vec<Vec3>,
    colors: Vec<[f32; 3]>,
    normals: Vec<Vec3>,
    faces: Vec<[u32; 3]>,
    bounds: Option<(Vec3, Vec3)>,
    fragments: usize,
    stale: bool,
}

impl SurfaceGeometry {
    /// Empty geometry.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Append a fragment, offsetting its face indices by the current vertex
    /// count. Normals and bounds become stale.
    pub fn merge(&mut self, fragment: MeshFragment) {
        let offset = self.positions.len() as u32;
        self.positions.extend(fragment.positions);
        self.colors.extend(fragment.colors);
        self.faces.extend(
            fragment
                .faces
                .into_iter()
                .map(|[a, b, c]| [a + offset, b + offset, c + offset]),
        );
        self.fragments += 1;
        self.stale = true;
    }

    /// Whether normals/bounds need recomputing before display.
    #[must_use]
    pub fn is_stale(&self) -> bool {
        self.stale
    }

    /// Recompute area-weighted vertex normals and bounds if stale.
    pub fn ensure_normals(&mut self) {
        if !self.stale {
            return;
        }
        let mut normals = vec![Vec3::ZERO; self.positions.len()];
        for &[a, b, c] in &self.faces {
            let (pa, pb, pc) = (
                self.positions[a as usize],
                self.positions[b as usize],
                self.positions[c as usize],
            );
            // Unnormalized cross product weights by triangle area.
            let n = (pb - pa).cross(pc - pa);
            normals[a as usize] += n;
            normals[b as usize] += n;
            normals[c as usize] += n;
        }
        for n in &mut normals {
            *n = n.normalize_or_zero();
        }
        self.normals = normals;

        self.bounds = self.positions.iter().fold(None, |acc, &p| match acc {
            None => Some((p, p)),
            Some((lo, hi)) => Some((lo.min(p), hi.max(p))),
        });
        self.stale = false;
    }

    /// Number of vertices.
    #[must_use]
    pub fn vertex_count(&self) -> usize {
        self.positions.len()
    }

    /// Number of triangles.
    #[must_use]
    pub fn face_count(&self) -> usize {
        self.faces.len()
    }

    /// Number of fragments merged so far.
    #[must_use]
    pub fn fragment_count(&self) -> usize {
        self.fragments
    }

    /// Vertex positions.
    #[must_use]
    pub fn positions(&self) -> &[Vec3] {
        &self.positions
    }

    /// Per-vertex colors.
    #[must_use]
    pub fn colors(&self) -> &[[f32; 3]] {
        &self.colors
    }

    /// Triangles.
    #[must_use]
    pub fn faces(&self) -> &[[u32; 3]] {
        &self.faces
    }

    /// Vertex normals as of the last [`ensure_normals`](Self::ensure_normals).
    #[must_use]
    pub fn normals(&self) -> &[Vec3] {
        &self.normals
    }

    /// Bounding box as of the last refresh; `None` when empty.
    #[must_use]
    pub fn bounds(&self) -> Option<(Vec3, Vec3)> {
        self.bounds
    }

    /// Interleaved vertices. Normals are zero until refreshed.
    #[must_use]
    pub fn vertices(&self) -> Vec<SurfaceVertex> {
        self.positions
            .iter()
            .zip(&self.colors)
            .enumerate()
            .map(|(i, (p, c))| SurfaceVertex {
                position: p.to_array(),
                normal: self.normals.get(i).copied().unwrap_or(Vec3::ZERO).to_array(),
                color: *c,
            })
            .collect()
    }

    /// Vertex buffer bytes.
    #[must_use]
    pub fn vertex_bytes(&self) -> Vec<u8> {
        bytemuck::cast_slice(&self.vertices()).to_vec()
    }

    /// Index buffer bytes (`u32`, three per triangle).
    #[must_use]
    pub fn index_bytes(&self) -> Vec<u8> {
        bytemuck::cast_slice(&self.faces).to_vec()
    }

    /// Order-independent view of the triangles: every face as its three
    /// corner positions (bit patterns), rotated so the smallest corner comes
    /// first, then sorted.
    #[must_use]
    pub fn canonical_triangles(&self) -> Vec<[[u32; 3]; 3]> {
        let key = |p: Vec3| [p.x.to_bits(), p.y.to_bits(), p.z.to_bits()];
        let mut tris: Vec<[[u32; 3]; 3]> = self
            .faces
            .iter()
            .map(|&[a, b, c]| {
                let mut t = [
                    key(self.positions[a as usize]),
                    key(self.positions[b as usize]),
                    key(self.positions[c as usize]),
                ];
                let first = (0..3).min_by_key(|&i| t[i]).unwrap_or(0);
                t.rotate_left(first);
                t
            })
            .collect();
        tris.sort_unstable();
        tris
    }
}

#[cfg(test)]
mod tests {
    use rand::rngs::StdRng;
    use rand::seq::SliceRandom;
    use rand::SeedableRng;

    use super::*;
    use crate::surface::protocol::{ExtractedVertex, Face};

    fn triangle_mesh(origin: f32, atom_id: u32) -> ExtractedMesh {
        let v = |x: f32, y: f32| ExtractedVertex {
            x: origin + x,
            y,
            z: 0.0,
            atom_id,
        };
        ExtractedMesh {
            vertices: vec![v(0.0, 0.0), v(1.0, 0.0), v(0.0, 1.0), v(1.0, 1.0)],
            faces: vec![Face { a: 0, b: 1, c: 2 }, Face { a: 1, b: 3, c: 2 }],
        }
    }

    #[test]
    fn fragment_colors_come_from_owning_atoms() {
        let palette = vec![Some([1.0, 0.0, 0.0]), None];
        let mut mesh = triangle_mesh(0.0, 0);
        mesh.vertices[3].atom_id = 1;
        let frag = to_mesh_fragment(&palette, &mesh);

        assert_eq!(frag.colors[0], [1.0, 0.0, 0.0]);
        assert_eq!(frag.colors[3], MISSING_ATOM_COLOR);
        assert_eq!(frag.face_count(), 2);
    }

    #[test]
    fn unknown_serial_and_bad_faces_do_not_fail() {
        let mut mesh = triangle_mesh(0.0, 99);
        mesh.faces.push(Face { a: 0, b: 1, c: 42 });
        let frag = to_mesh_fragment(&[], &mesh);
        assert_eq!(frag.face_count(), 2);
        assert!(frag.colors.iter().all(|&c| c == MISSING_ATOM_COLOR));
    }

    #[test]
    fn merge_offsets_faces_and_marks_stale() {
        let mut geo = SurfaceGeometry::new();
        geo.merge(to_mesh_fragment(&[], &triangle_mesh(0.0, 0)));
        geo.merge(to_mesh_fragment(&[], &triangle_mesh(5.0, 0)));

        assert_eq!(geo.vertex_count(), 8);
        assert_eq!(geo.face_count(), 4);
        assert_eq!(geo.faces()[2], [4, 5, 6]);
        assert!(geo.is_stale());

        geo.ensure_normals();
        assert!(!geo.is_stale());
        for n in geo.normals() {
            assert!((*n - Vec3::Z).length() < 1e-6);
        }
        assert_eq!(geo.bounds(), Some((Vec3::ZERO, Vec3::new(6.0, 1.0, 0.0))));
    }

    #[test]
    fn merge_order_does_not_change_the_aggregate() {
        let fragments: Vec<MeshFragment> = (0..12)
            .map(|i| to_mesh_fragment(&[Some([0.5; 3])], &triangle_mesh(i as f32 * 3.0, 0)))
            .collect();

        let mut in_order = SurfaceGeometry::new();
        for f in fragments.clone() {
            in_order.merge(f);
        }

        let mut rng = StdRng::seed_from_u64(42);
        for _ in 0..5 {
            let mut shuffled = fragments.clone();
            shuffled.shuffle(&mut rng);
            let mut geo = SurfaceGeometry::new();
            for f in shuffled {
                geo.merge(f);
            }
            assert_eq!(geo.vertex_count(), in_order.vertex_count());
            assert_eq!(geo.face_count(), in_order.face_count());
            assert_eq!(geo.canonical_triangles(), in_order.canonical_triangles());
        }
    }

    #[test]
    fn gpu_buffers_have_expected_sizes() {
        let mut geo = SurfaceGeometry::new();
        geo.merge(to_mesh_fragment(&[], &triangle_mesh(0.0, 0)));
        geo.ensure_normals();
        assert_eq!(geo.vertex_bytes().len(), 4 * size_of::<SurfaceVertex>());
        assert_eq!(geo.index_bytes().len(), 2 * 3 * size_of::<u32>());
    }
}
