//! Surface records keyed by stable ids.
//!
//! Ids come from an incrementing counter and are never reused. Removing a
//! surface leaves a tombstone so late results for it can be recognized and
//! dropped instead of landing on an unrelated record.

use std::fmt;
use std::sync::Arc;

use rustc_hash::{FxHashMap, FxHashSet};
use serde::Serialize;

use super::material::Material;
use super::mesh::{to_mesh_fragment, SurfaceGeometry};
use super::protocol::{ExtractedMesh, SurfaceType};
use crate::scene::NodeId;

/// Stable handle to a surface.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize,
)]
pub struct SurfaceId(u32);

impl SurfaceId {
    /// Wrap a raw id.
    #[must_use]
    pub fn from_raw(raw: u32) -> Self {
        Self(raw)
    }

    /// The raw id.
    #[must_use]
    pub fn raw(self) -> u32 {
        self.0
    }
}

impl fmt::Display for SurfaceId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "surface #{}", self.0)
    }
}

/// What a job result did to its surface.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum JobOutcome {
    /// Fragment merged; more chunks outstanding.
    Merged,
    /// Fragment merged and it was the last one: the surface is now done.
    Completed,
    /// Failure recorded; the surface can no longer reach done.
    Failed,
    /// Result dropped: unknown or removed surface, or a chunk that was
    /// already resolved.
    Ignored,
}

/// State of one surface.
#[derive(Debug, Clone)]
pub struct SurfaceRecord {
    id: SurfaceId,
    surface_type: SurfaceType,
    geometry: Arc<SurfaceGeometry>,
    material: Material,
    palette: Vec<Option<[f32; 3]>>,
    last_node: Option<NodeId>,
    resolved: FxHashSet<usize>,
    jobs_done: usize,
    jobs_total: usize,
    failed: usize,
    done: bool,
    finished: bool,
}

impl SurfaceRecord {
    /// Surface id.
    #[must_use]
    pub fn id(&self) -> SurfaceId {
        self.id
    }

    /// Surface kind.
    #[must_use]
    pub fn surface_type(&self) -> SurfaceType {
        self.surface_type
    }

    /// Aggregate geometry merged so far.
    #[must_use]
    pub fn geometry(&self) -> &SurfaceGeometry {
        &self.geometry
    }

    /// Current material.
    #[must_use]
    pub fn material(&self) -> &Material {
        &self.material
    }

    /// Scene node currently displaying this surface.
    #[must_use]
    pub fn last_node(&self) -> Option<NodeId> {
        self.last_node
    }

    /// Jobs merged successfully.
    #[must_use]
    pub fn jobs_done(&self) -> usize {
        self.jobs_done
    }

    /// Jobs dispatched for this surface.
    #[must_use]
    pub fn jobs_total(&self) -> usize {
        self.jobs_total
    }

    /// Jobs that failed.
    #[must_use]
    pub fn failed(&self) -> usize {
        self.failed
    }

    /// Every job merged.
    #[must_use]
    pub fn is_done(&self) -> bool {
        self.done
    }

    /// The displayed mesh reflects the final geometry and material.
    #[must_use]
    pub fn is_finished(&self) -> bool {
        self.finished
    }

    /// Refresh stale normals and hand out a shared snapshot of the
    /// geometry. Later merges copy on write, so the snapshot never changes.
    pub fn snapshot(&mut self) -> Arc<SurfaceGeometry> {
        if self.geometry.is_stale() {
            Arc::make_mut(&mut self.geometry).ensure_normals();
        }
        Arc::clone(&self.geometry)
    }

    pub(crate) fn set_last_node(&mut self, node: Option<NodeId>) {
        self.last_node = node;
    }

    pub(crate) fn set_finished(&mut self, finished: bool) {
        self.finished = finished;
    }

    fn resolve(&mut self, chunk: usize) -> bool {
        chunk < self.jobs_total && self.resolved.insert(chunk)
    }
}

#[derive(Debug)]
enum Slot {
    Live(SurfaceRecord),
    Removed,
}

/// Slot map of surfaces.
#[derive(Debug, Default)]
pub struct SurfaceRegistry {
    slots: FxHashMap<SurfaceId, Slot>,
    next_id: u32,
}

impl SurfaceRegistry {
    /// Empty registry.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a new surface expecting `jobs_total` chunk results.
    ///
    /// `palette` maps atom serials to surface colors for the mesh
    /// assembler.
    pub fn insert(
        &mut self,
        surface_type: SurfaceType,
        material: Material,
        palette: Vec<Option<[f32; 3]>>,
        jobs_total: usize,
    ) -> SurfaceId {
        let id = SurfaceId(self.next_id);
        self.next_id += 1;
        let record = SurfaceRecord {
            id,
            surface_type,
            geometry: Arc::new(SurfaceGeometry::new()),
            material,
            palette,
            last_node: None,
            resolved: FxHashSet::default(),
            jobs_done: 0,
            jobs_total,
            failed: 0,
            done: jobs_total == 0,
            finished: false,
        };
        drop(self.slots.insert(id, Slot::Live(record)));
        id
    }

    /// Live record for `id`.
    #[must_use]
    pub fn get(&self, id: SurfaceId) -> Option<&SurfaceRecord> {
        match self.slots.get(&id) {
            Some(Slot::Live(record)) => Some(record),
            _ => None,
        }
    }

    /// Mutable live record for `id`.
    pub fn get_mut(&mut self, id: SurfaceId) -> Option<&mut SurfaceRecord> {
        match self.slots.get_mut(&id) {
            Some(Slot::Live(record)) => Some(record),
            _ => None,
        }
    }

    /// Whether `id` names a live surface.
    #[must_use]
    pub fn contains(&self, id: SurfaceId) -> bool {
        self.get(id).is_some()
    }

    /// Whether `id` was issued and later removed.
    #[must_use]
    pub fn is_removed(&self, id: SurfaceId) -> bool {
        matches!(self.slots.get(&id), Some(Slot::Removed))
    }

    /// Tombstone a surface, returning its record. Unknown or already
    /// removed ids give `None`.
    pub fn remove(&mut self, id: SurfaceId) -> Option<SurfaceRecord> {
        let slot = self.slots.get_mut(&id)?;
        match std::mem::replace(slot, Slot::Removed) {
            Slot::Live(record) => Some(record),
            Slot::Removed => None,
        }
    }

    /// Live surface ids in creation order.
    #[must_use]
    pub fn ids(&self) -> Vec<SurfaceId> {
        let mut ids: Vec<SurfaceId> = self
            .slots
            .iter()
            .filter(|(_, slot)| matches!(slot, Slot::Live(_)))
            .map(|(&id, _)| id)
            .collect();
        ids.sort_unstable();
        ids
    }

    /// Number of live surfaces.
    #[must_use]
    pub fn len(&self) -> usize {
        self.slots
            .values()
            .filter(|slot| matches!(slot, Slot::Live(_)))
            .count()
    }

    /// Whether no surface is live.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Merge a chunk result. Each chunk counts once; `done` flips when the
    /// last chunk is merged and never again.
    pub fn complete_job(
        &mut self,
        id: SurfaceId,
        chunk: usize,
        mesh: &ExtractedMesh,
    ) -> JobOutcome {
        let Some(record) = self.get_mut(id) else {
            return JobOutcome::Ignored;
        };
        if !record.resolve(chunk) {
            return JobOutcome::Ignored;
        }
        let fragment = to_mesh_fragment(&record.palette, mesh);
        Arc::make_mut(&mut record.geometry).merge(fragment);
        record.jobs_done += 1;

        if record.jobs_done == record.jobs_total && !record.done {
            record.done = true;
            JobOutcome::Completed
        } else {
            JobOutcome::Merged
        }
    }

    /// Record a failed chunk. The chunk stays a hole in the surface.
    pub fn fail_job(&mut self, id: SurfaceId, chunk: usize) -> JobOutcome {
        let Some(record) = self.get_mut(id) else {
            return JobOutcome::Ignored;
        };
        if !record.resolve(chunk) {
            return JobOutcome::Ignored;
        }
        record.failed += 1;
        JobOutcome::Failed
    }

    /// Replace a surface's material and schedule a redisplay.
    pub fn set_material(&mut self, id: SurfaceId, material: Material) -> bool {
        match self.get_mut(id) {
            Some(record) => {
                record.material = material;
                record.finished = false;
                true
            }
            None => false,
        }
    }
}

#[cfg(test)]
mod tests {
    use rand::rngs::StdRng;
    use rand::seq::SliceRandom;
    use rand::SeedableRng;

    use super::*;
    use crate::surface::protocol::{ExtractedVertex, Face};

    fn mesh(n: u32) -> ExtractedMesh {
        ExtractedMesh {
            vertices: (0..3 * n)
                .map(|i| ExtractedVertex {
                    x: i as f32,
                    y: 0.0,
                    z: 0.0,
                    atom_id: 0,
                })
                .collect(),
            faces: (0..n)
                .map(|f| Face {
                    a: 3 * f,
                    b: 3 * f + 1,
                    c: 3 * f + 2,
                })
                .collect(),
        }
    }

    fn registry_with(jobs: usize) -> (SurfaceRegistry, SurfaceId) {
        let mut registry = SurfaceRegistry::new();
        let id = registry.insert(SurfaceType::Vdw, Material::default(), vec![], jobs);
        (registry, id)
    }

    #[test]
    fn ids_are_never_reused() {
        let mut registry = SurfaceRegistry::new();
        let a = registry.insert(SurfaceType::Vdw, Material::default(), vec![], 1);
        assert!(registry.remove(a).is_some());
        let b = registry.insert(SurfaceType::Sas, Material::default(), vec![], 1);
        assert_ne!(a, b);
        assert!(registry.is_removed(a));
        assert_eq!(registry.ids(), vec![b]);
    }

    #[test]
    fn double_removal_is_a_no_op() {
        let (mut registry, id) = registry_with(1);
        assert!(registry.remove(id).is_some());
        assert!(registry.remove(id).is_none());
        assert!(registry.remove(SurfaceId::from_raw(77)).is_none());
        assert!(!registry.set_material(id, Material::default()));
    }

    #[test]
    fn done_flips_exactly_once_under_any_order() {
        let mut rng = StdRng::seed_from_u64(3);
        for _ in 0..20 {
            let (mut registry, id) = registry_with(8);
            let mut chunks: Vec<usize> = (0..8).chain(0..8).collect();
            chunks.shuffle(&mut rng);

            let completions = chunks
                .iter()
                .map(|&c| registry.complete_job(id, c, &mesh(2)))
                .filter(|&o| o == JobOutcome::Completed)
                .count();
            assert_eq!(completions, 1);

            let record = registry.get(id).unwrap();
            assert!(record.is_done());
            assert_eq!(record.jobs_done(), 8);
            assert_eq!(record.geometry().vertex_count(), 8 * 6);
            assert_eq!(record.geometry().face_count(), 8 * 2);
        }
    }

    #[test]
    fn results_for_removed_surfaces_are_dropped() {
        let mut registry = SurfaceRegistry::new();
        let gone = registry.insert(SurfaceType::Vdw, Material::default(), vec![], 2);
        let live = registry.insert(SurfaceType::Vdw, Material::default(), vec![], 2);
        let _ = registry.remove(gone);

        assert_eq!(registry.complete_job(gone, 0, &mesh(1)), JobOutcome::Ignored);
        assert_eq!(registry.fail_job(gone, 1), JobOutcome::Ignored);
        let record = registry.get(live).unwrap();
        assert_eq!(record.geometry().vertex_count(), 0);
        assert_eq!(record.jobs_done(), 0);
    }

    #[test]
    fn failed_chunk_stalls_the_surface() {
        let (mut registry, id) = registry_with(2);
        assert_eq!(registry.fail_job(id, 0), JobOutcome::Failed);
        assert_eq!(registry.complete_job(id, 0, &mesh(1)), JobOutcome::Ignored);
        assert_eq!(registry.complete_job(id, 1, &mesh(1)), JobOutcome::Merged);

        let record = registry.get(id).unwrap();
        assert!(!record.is_done());
        assert_eq!(record.failed(), 1);
    }

    #[test]
    fn material_change_clears_finished() {
        let (mut registry, id) = registry_with(1);
        registry.get_mut(id).unwrap().set_finished(true);
        assert!(registry.set_material(id, Material::default()));
        assert!(!registry.get(id).unwrap().is_finished());
    }

    #[test]
    fn snapshots_are_isolated_from_later_merges() {
        let (mut registry, id) = registry_with(2);
        let _ = registry.complete_job(id, 0, &mesh(1));
        let snap = registry.get_mut(id).unwrap().snapshot();
        assert!(!snap.is_stale());

        let _ = registry.complete_job(id, 1, &mesh(1));
        assert_eq!(snap.vertex_count(), 3);
        assert_eq!(registry.get(id).unwrap().geometry().vertex_count(), 6);
    }
}
