//! The coordinator: partitions surfaces, dispatches jobs, folds results
//! into the registry and keeps the scene graph in sync.

use std::sync::Arc;
use std::time::Duration;

use rustc_hash::FxHashMap;
use serde::Serialize;
use web_time::Instant;

use super::color::apply_property_map;
use super::extractor::IsosurfaceExtractor;
use super::material::{Material, SurfaceStyle};
use super::partition::{partition, prioritize_by_focus, VolumeChunk};
use super::pool::{run_job, WorkerEvent, WorkerPool};
use super::protocol::{ReducedAtom, SurfaceJob, SurfaceType, WorkerInit};
use super::registry::{JobOutcome, SurfaceId, SurfaceRecord, SurfaceRegistry};
use crate::error::SurfaceError;
use crate::molecule::{compute_extent, Atom, AtomSlots};
use crate::options::{Options, SurfaceOptions};
use crate::scene::{NodeId, NodeKind, SceneGraph, SurfaceMesh};

/// Everything needed to create a surface.
#[derive(Debug, Clone)]
pub struct SurfaceRequest<'a> {
    /// Surface kind.
    pub surface_type: SurfaceType,
    /// Color, opacity and property map.
    pub style: SurfaceStyle,
    /// Slot indices of the atoms whose surface is displayed. Atoms missing
    /// from `all_atoms` are not surfaced.
    pub atoms_to_show: &'a [usize],
    /// Slot indices of every atom that shapes the surface.
    pub all_atoms: &'a [usize],
    /// Atoms whose neighborhood should be computed first.
    pub focus: Option<&'a [usize]>,
}

impl<'a> SurfaceRequest<'a> {
    /// Request with the default style and no focus.
    #[must_use]
    pub fn new(
        surface_type: SurfaceType,
        atoms_to_show: &'a [usize],
        all_atoms: &'a [usize],
    ) -> Self {
        Self {
            surface_type,
            style: SurfaceStyle::default(),
            atoms_to_show,
            all_atoms,
            focus: None,
        }
    }

    /// Builder-style surface style.
    #[must_use]
    pub fn with_style(mut self, style: SurfaceStyle) -> Self {
        self.style = style;
        self
    }

    /// Builder-style focus selection.
    #[must_use]
    pub fn with_focus(mut self, focus: &'a [usize]) -> Self {
        self.focus = Some(focus);
        self
    }
}

/// Progress snapshot of one surface.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct SurfaceStats {
    /// Chunks merged.
    pub jobs_done: usize,
    /// Chunks dispatched.
    pub jobs_total: usize,
    /// Chunks that failed.
    pub failed: usize,
    /// Aggregate vertex count.
    pub vertices: usize,
    /// Aggregate triangle count.
    pub faces: usize,
    /// Every chunk merged.
    pub done: bool,
    /// Display reflects the final geometry.
    pub finished: bool,
}

impl From<&SurfaceRecord> for SurfaceStats {
    fn from(record: &SurfaceRecord) -> Self {
        Self {
            jobs_done: record.jobs_done(),
            jobs_total: record.jobs_total(),
            failed: record.failed(),
            vertices: record.geometry().vertex_count(),
            faces: record.geometry().face_count(),
            done: record.is_done(),
            finished: record.is_finished(),
        }
    }
}

/// Owns the surface registry and the worker pool.
///
/// All methods run on the calling (coordinator) thread. Results are only
/// folded in by [`pump`](Self::pump), so nothing mutates a surface behind
/// the caller's back.
pub struct SurfaceManager {
    options: SurfaceOptions,
    registry: SurfaceRegistry,
    extractor: Arc<dyn IsosurfaceExtractor>,
    pool: Option<WorkerPool>,
}

impl SurfaceManager {
    /// Create a manager. In synchronous mode no threads are spawned.
    ///
    /// # Errors
    ///
    /// Returns [`SurfaceError::ThreadSpawn`] if a worker fails to start.
    pub fn new(
        options: &Options,
        extractor: Arc<dyn IsosurfaceExtractor>,
    ) -> Result<Self, SurfaceError> {
        let surface = options.surface.clamped();
        let pool = if surface.synchronous {
            None
        } else {
            Some(WorkerPool::new(&options.workers, Arc::clone(&extractor))?)
        };
        Ok(Self {
            options: surface,
            registry: SurfaceRegistry::new(),
            extractor,
            pool,
        })
    }

    /// Effective surface options.
    #[must_use]
    pub fn options(&self) -> &SurfaceOptions {
        &self.options
    }

    /// Read access to every surface record.
    #[must_use]
    pub fn registry(&self) -> &SurfaceRegistry {
        &self.registry
    }

    /// Live record for `id`.
    #[must_use]
    pub fn surface(&self, id: SurfaceId) -> Option<&SurfaceRecord> {
        self.registry.get(id)
    }

    /// Progress of a live surface.
    #[must_use]
    pub fn stats(&self, id: SurfaceId) -> Option<SurfaceStats> {
        self.registry.get(id).map(SurfaceStats::from)
    }

    /// Jobs dispatched whose results have not been pumped yet.
    #[must_use]
    pub fn outstanding(&self) -> usize {
        self.pool.as_ref().map_or(0, WorkerPool::outstanding)
    }

    /// Start computing a surface and return its id right away.
    ///
    /// A style with a property map recolors the atoms to show first. The
    /// extent of the atoms to show is partitioned, chunks nearest the focus
    /// (if any) are dispatched first, and geometry fills in as
    /// [`pump`](Self::pump) folds results in. In synchronous mode the
    /// surface is complete on return.
    pub fn add_surface(
        &mut self,
        atoms: &mut AtomSlots,
        request: &SurfaceRequest<'_>,
    ) -> SurfaceId {
        let start = Instant::now();
        if let Some(map) = &request.style.map {
            apply_property_map(atoms, request.atoms_to_show, map);
        }

        // Serials index the present atoms of the all-atoms selection.
        let present: Vec<&Atom> = request
            .all_atoms
            .iter()
            .filter_map(|&i| atoms.get(i))
            .collect();
        let mut serial_of: FxHashMap<usize, u32> = FxHashMap::default();
        for (serial, atom) in present.iter().enumerate() {
            let _ = serial_of.entry(atom.index).or_insert(serial as u32);
        }

        let show = atoms.select(request.atoms_to_show);
        let orphaned = show
            .iter()
            .flatten()
            .filter(|a| !serial_of.contains_key(&a.index))
            .count();
        if orphaned > 0 {
            log::warn!("{orphaned} atoms to show are outside the all-atoms selection and will not be surfaced");
        }
        let extent = compute_extent(show.iter().copied());
        let all_positions: Vec<_> = present.iter().map(|a| Some(a.position)).collect();
        let show_positions: Vec<_> = show.iter().map(|a| a.map(|a| a.position)).collect();

        let mut chunks = partition(
            &extent,
            self.options.volume_budget,
            self.options.chunk_padding,
            &all_positions,
            &show_positions,
        );
        if let Some(focus) = request.focus.filter(|f| !f.is_empty()) {
            prioritize_by_focus(&mut chunks, &compute_extent(atoms.select(focus)));
        }

        let jobs: Vec<SurfaceJob> = chunks
            .iter()
            .map(|chunk| {
                build_job(request.surface_type, chunk, request.atoms_to_show, &serial_of)
            })
            .collect();
        let init = WorkerInit {
            atoms: present
                .iter()
                .enumerate()
                .map(|(serial, atom)| ReducedAtom::from_atom(atom, serial as u32))
                .collect(),
            volume: extent.volume(),
        };
        let palette = present.iter().map(|a| a.surface_display_color()).collect();

        let id = self.registry.insert(
            request.surface_type,
            Material::from_style(&request.style),
            palette,
            jobs.len(),
        );
        log::debug!(
            "{id}: {} chunks over {:.0} cubic angstroms ({} atoms, {} shown), partitioned in {:.1}ms",
            jobs.len(),
            extent.volume(),
            present.len(),
            request.atoms_to_show.len(),
            start.elapsed().as_secs_f64() * 1000.0,
        );

        match &mut self.pool {
            Some(pool) => {
                pool.broadcast_init(id, init);
                for (chunk, job) in jobs.into_iter().enumerate() {
                    pool.submit(id, chunk, job);
                }
                pool.release(id);
            }
            None => {
                for (chunk, job) in jobs.iter().enumerate() {
                    let event = match run_job(0, &*self.extractor, &init, job) {
                        Ok(mesh) => WorkerEvent::Completed {
                            surface: id,
                            chunk,
                            worker: 0,
                            mesh,
                        },
                        Err(error) => WorkerEvent::Failed {
                            surface: id,
                            chunk,
                            worker: 0,
                            error,
                        },
                    };
                    self.handle_event(event);
                }
            }
        }
        id
    }

    /// Fold every available worker result into its surface. Returns the
    /// number of results processed.
    pub fn pump(&mut self) -> usize {
        let events = self.pool.as_mut().map(WorkerPool::drain).unwrap_or_default();
        let count = events.len();
        for event in events {
            self.handle_event(event);
        }
        count
    }

    /// Like [`pump`](Self::pump), but wait up to `timeout` for the first
    /// result when none is ready.
    pub fn pump_wait(&mut self, timeout: Duration) -> usize {
        let first = self
            .pool
            .as_mut()
            .and_then(|pool| pool.recv_timeout(timeout));
        match first {
            Some(event) => {
                self.handle_event(event);
                1 + self.pump()
            }
            None => 0,
        }
    }

    /// Swap a surface's material; its display is refreshed on the next
    /// [`reconcile`](Self::reconcile). Unknown ids are ignored.
    pub fn set_surface_material_style(&mut self, id: SurfaceId, style: &SurfaceStyle) -> bool {
        self.registry.set_material(id, Material::from_style(style))
    }

    /// Remove a surface and its displayed mesh. Jobs still in flight finish
    /// and are discarded when pumped. Unknown ids are ignored.
    pub fn remove_surface(&mut self, scene: &mut SceneGraph, id: SurfaceId) -> bool {
        let Some(record) = self.registry.remove(id) else {
            return false;
        };
        if let Some(node) = record.last_node() {
            let _ = scene.despawn(node);
        }
        log::debug!(
            "{id} removed ({}/{} chunks merged)",
            record.jobs_done(),
            record.jobs_total()
        );
        true
    }

    /// Remove every surface.
    pub fn clear(&mut self, scene: &mut SceneGraph) {
        for id in self.registry.ids() {
            let _ = self.remove_surface(scene, id);
        }
    }

    /// Per-frame display step.
    ///
    /// Every surface that is not finished gets its displayed mesh replaced
    /// by a fresh snapshot under `group`. A surface that was already done
    /// before the swap is marked finished and skipped from then on.
    /// Returns the number of meshes replaced.
    pub fn reconcile(&mut self, scene: &mut SceneGraph, group: NodeId) -> usize {
        let mut refreshed = 0;
        for id in self.registry.ids() {
            let Some(record) = self.registry.get_mut(id) else {
                continue;
            };
            if record.is_finished() {
                continue;
            }
            let was_done = record.is_done();
            if let Some(old) = record.last_node() {
                let _ = scene.despawn(old);
                record.set_last_node(None);
            }

            let node = scene.spawn(NodeKind::Mesh(SurfaceMesh {
                surface: id,
                geometry: record.snapshot(),
                material: record.material().clone(),
            }));
            if !scene.add(group, node) {
                let _ = scene.despawn(node);
                log::warn!("cannot attach {id} to {group}");
                continue;
            }
            record.set_last_node(Some(node));
            record.set_finished(was_done);
            refreshed += 1;
        }
        refreshed
    }

    /// Stop the worker threads. Pending results are lost.
    pub fn shutdown(&mut self) {
        if let Some(pool) = &mut self.pool {
            pool.shutdown();
        }
    }

    fn handle_event(&mut self, event: WorkerEvent) {
        match event {
            WorkerEvent::Completed {
                surface,
                chunk,
                worker,
                mesh,
            } => match self.registry.complete_job(surface, chunk, &mesh) {
                JobOutcome::Completed => {
                    if let Some(record) = self.registry.get(surface) {
                        log::info!(
                            "{surface} complete: {} chunks, {} vertices, {} faces",
                            record.jobs_total(),
                            record.geometry().vertex_count(),
                            record.geometry().face_count(),
                        );
                    }
                }
                JobOutcome::Merged => {
                    log::debug!(
                        "{surface}: chunk {chunk} merged from worker {worker} ({} vertices)",
                        mesh.vertices.len()
                    );
                }
                JobOutcome::Ignored if self.registry.is_removed(surface) => {
                    log::warn!("dropping chunk {chunk} of removed {surface}");
                }
                JobOutcome::Ignored | JobOutcome::Failed => {
                    log::debug!("{surface}: ignoring repeated result for chunk {chunk}");
                }
            },
            WorkerEvent::Failed {
                surface,
                chunk,
                worker,
                error,
            } => {
                if self.registry.fail_job(surface, chunk) == JobOutcome::Failed {
                    log::error!("{surface}: chunk {chunk} failed on worker {worker}: {error}");
                } else {
                    log::warn!("{surface}: chunk {chunk} failed on worker {worker}, result discarded: {error}");
                }
            }
        }
    }
}

fn build_job(
    surface_type: SurfaceType,
    chunk: &VolumeChunk,
    atoms_to_show: &[usize],
    serial_of: &FxHashMap<usize, u32>,
) -> SurfaceJob {
    let shown = chunk
        .atoms_to_show
        .iter()
        .filter_map(|&i| atoms_to_show.get(i))
        .filter_map(|slot| serial_of.get(slot).copied())
        .collect();
    SurfaceJob {
        surface_type,
        expanded_extent: chunk.padded.to_array(),
        extended_atom_indices: chunk.atoms.iter().map(|&i| i as u32).collect(),
        atoms_to_show_indices: shown,
    }
}
