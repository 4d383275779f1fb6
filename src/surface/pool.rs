//! Fixed pool of surface worker threads.
//!
//! Every worker owns a bounded inbound queue; results come back on one
//! shared channel. The coordinator never blocks on submission: when a
//! worker's queue is full the request waits in a coordinator-side backlog
//! that is flushed on every poll. Requests to one worker stay in FIFO
//! order, so a surface's init always reaches a worker before its jobs and
//! its release arrives after them.

use std::collections::VecDeque;
use std::panic::{self, AssertUnwindSafe};
use std::sync::mpsc::{self, TrySendError};
use std::sync::Arc;
use std::thread::JoinHandle;
use std::time::Duration;

use rustc_hash::FxHashMap;
use web_time::Instant;

use super::extractor::IsosurfaceExtractor;
use super::protocol::{ExtractedMesh, SurfaceJob, WorkerInit};
use super::registry::SurfaceId;
use crate::error::{ExtractError, SurfaceError};
use crate::options::WorkerOptions;

/// Granularity of the backlog flush while waiting for results.
const WAIT_SLICE: Duration = Duration::from_millis(5);

/// Message sent from the coordinator to one worker.
#[derive(Debug)]
pub enum WorkerRequest {
    /// Load the atom table for a surface.
    Init {
        /// Owning surface.
        surface: SurfaceId,
        /// Shared, read-only atom table.
        init: Arc<WorkerInit>,
    },
    /// Extract one chunk.
    Job {
        /// Owning surface.
        surface: SurfaceId,
        /// Chunk index in dispatch order.
        chunk: usize,
        /// Job payload.
        job: SurfaceJob,
    },
    /// Drop the atom table of a surface.
    Release {
        /// Owning surface.
        surface: SurfaceId,
    },
    /// Stop the worker thread.
    Shutdown,
}

/// Result of one job, delivered to the coordinator.
#[derive(Debug)]
pub enum WorkerEvent {
    /// The extractor produced a mesh.
    Completed {
        /// Owning surface.
        surface: SurfaceId,
        /// Chunk index.
        chunk: usize,
        /// Worker that ran the job.
        worker: usize,
        /// Extracted geometry.
        mesh: ExtractedMesh,
    },
    /// The job failed (extractor error, panic or dead worker).
    Failed {
        /// Owning surface.
        surface: SurfaceId,
        /// Chunk index.
        chunk: usize,
        /// Worker the job was assigned to.
        worker: usize,
        /// What went wrong.
        error: ExtractError,
    },
}

impl WorkerEvent {
    /// Surface the event belongs to.
    #[must_use]
    pub fn surface(&self) -> SurfaceId {
        match self {
            Self::Completed { surface, .. } | Self::Failed { surface, .. } => {
                *surface
            }
        }
    }
}

struct Worker {
    tx: mpsc::SyncSender<WorkerRequest>,
    backlog: VecDeque<WorkerRequest>,
    thread: Option<JoinHandle<()>>,
    alive: bool,
}

/// Long-lived worker threads running an [`IsosurfaceExtractor`].
pub struct WorkerPool {
    workers: Vec<Worker>,
    events_rx: mpsc::Receiver<WorkerEvent>,
    /// Failures synthesized on the coordinator for jobs that could not be
    /// delivered.
    local_events: VecDeque<WorkerEvent>,
    outstanding: usize,
}

impl WorkerPool {
    /// Spawn `options.num_workers` threads sharing `extractor`.
    ///
    /// # Errors
    ///
    /// Returns [`SurfaceError::ThreadSpawn`] if a thread fails to spawn.
    pub fn new(
        options: &WorkerOptions,
        extractor: Arc<dyn IsosurfaceExtractor>,
    ) -> Result<Self, SurfaceError> {
        let options = options.clamped();
        let (events_tx, events_rx) = mpsc::channel::<WorkerEvent>();

        let mut workers = Vec::with_capacity(options.num_workers);
        for index in 0..options.num_workers {
            let (tx, rx) = mpsc::sync_channel(options.queue_depth);
            let events = events_tx.clone();
            let extractor = Arc::clone(&extractor);
            let thread = std::thread::Builder::new()
                .name(format!("{}-{index}", options.thread_name_prefix))
                .spawn(move || worker_loop(index, rx, events, extractor))
                .map_err(SurfaceError::ThreadSpawn)?;
            workers.push(Worker {
                tx,
                backlog: VecDeque::new(),
                thread: Some(thread),
                alive: true,
            });
        }
        log::debug!("spawned {} surface workers", workers.len());

        Ok(Self {
            workers,
            events_rx,
            local_events: VecDeque::new(),
            outstanding: 0,
        })
    }

    /// Number of worker threads.
    #[must_use]
    pub fn num_workers(&self) -> usize {
        self.workers.len()
    }

    /// Jobs submitted whose result has not been received yet.
    #[must_use]
    pub fn outstanding(&self) -> usize {
        self.outstanding
    }

    /// Send a surface's atom table to every worker.
    pub fn broadcast_init(&mut self, surface: SurfaceId, init: WorkerInit) {
        let init = Arc::new(init);
        for index in 0..self.workers.len() {
            self.enqueue(
                index,
                WorkerRequest::Init {
                    surface,
                    init: Arc::clone(&init),
                },
            );
        }
    }

    /// Queue a chunk job on worker `chunk % num_workers`.
    pub fn submit(&mut self, surface: SurfaceId, chunk: usize, job: SurfaceJob) {
        self.outstanding += 1;
        let index = chunk % self.workers.len();
        self.enqueue(index, WorkerRequest::Job { surface, chunk, job });
    }

    /// Tell every worker to drop a surface's atom table once its queued
    /// jobs have run.
    pub fn release(&mut self, surface: SurfaceId) {
        for index in 0..self.workers.len() {
            self.enqueue(index, WorkerRequest::Release { surface });
        }
    }

    /// Next available result, without blocking.
    pub fn try_recv(&mut self) -> Option<WorkerEvent> {
        self.flush();
        let event = self
            .local_events
            .pop_front()
            .or_else(|| self.events_rx.try_recv().ok());
        self.account(event)
    }

    /// Every result available right now.
    pub fn drain(&mut self) -> Vec<WorkerEvent> {
        let mut events = Vec::new();
        while let Some(event) = self.try_recv() {
            events.push(event);
        }
        events
    }

    /// Wait up to `timeout` for the next result.
    pub fn recv_timeout(&mut self, timeout: Duration) -> Option<WorkerEvent> {
        let deadline = Instant::now() + timeout;
        loop {
            if let Some(event) = self.try_recv() {
                return Some(event);
            }
            let now = Instant::now();
            if now >= deadline {
                return None;
            }
            let wait = (deadline - now).min(WAIT_SLICE);
            match self.events_rx.recv_timeout(wait) {
                Ok(event) => return self.account(Some(event)),
                Err(mpsc::RecvTimeoutError::Timeout) => {}
                Err(mpsc::RecvTimeoutError::Disconnected) => return None,
            }
        }
    }

    /// Stop every worker and join its thread. Queued jobs are abandoned.
    pub fn shutdown(&mut self) {
        for worker in &mut self.workers {
            worker.backlog.clear();
            if worker.alive {
                let _ = worker.tx.send(WorkerRequest::Shutdown);
                worker.alive = false;
            }
        }
        for worker in &mut self.workers {
            if let Some(handle) = worker.thread.take() {
                let _ = handle.join();
            }
        }
    }

    fn account(&mut self, event: Option<WorkerEvent>) -> Option<WorkerEvent> {
        if event.is_some() {
            self.outstanding = self.outstanding.saturating_sub(1);
        }
        event
    }

    fn enqueue(&mut self, index: usize, request: WorkerRequest) {
        let worker = &mut self.workers[index];
        if !worker.alive {
            fail_undeliverable(index, request, &mut self.local_events);
            return;
        }
        let was_clear = worker.backlog.is_empty();
        worker.backlog.push_back(request);
        self.flush_worker(index);
        if was_clear && !self.workers[index].backlog.is_empty() {
            log::warn!(
                "surface worker {index} queue is full; holding requests back"
            );
        }
    }

    fn flush(&mut self) {
        for index in 0..self.workers.len() {
            self.flush_worker(index);
        }
    }

    fn flush_worker(&mut self, index: usize) {
        let worker = &mut self.workers[index];
        while let Some(request) = worker.backlog.pop_front() {
            match worker.tx.try_send(request) {
                Ok(()) => {}
                Err(TrySendError::Full(request)) => {
                    worker.backlog.push_front(request);
                    return;
                }
                Err(TrySendError::Disconnected(request)) => {
                    log::error!("{}", SurfaceError::WorkerDisconnected(index));
                    worker.alive = false;
                    fail_undeliverable(index, request, &mut self.local_events);
                    for rest in worker.backlog.drain(..) {
                        fail_undeliverable(index, rest, &mut self.local_events);
                    }
                    return;
                }
            }
        }
    }
}

impl Drop for WorkerPool {
    fn drop(&mut self) {
        self.shutdown();
    }
}

fn fail_undeliverable(
    index: usize,
    request: WorkerRequest,
    events: &mut VecDeque<WorkerEvent>,
) {
    if let WorkerRequest::Job { surface, chunk, .. } = request {
        events.push_back(WorkerEvent::Failed {
            surface,
            chunk,
            worker: index,
            error: ExtractError::new(
                SurfaceError::WorkerDisconnected(index).to_string(),
            ),
        });
    }
}

#[allow(clippy::needless_pass_by_value)]
fn worker_loop(
    index: usize,
    rx: mpsc::Receiver<WorkerRequest>,
    events: mpsc::Sender<WorkerEvent>,
    extractor: Arc<dyn IsosurfaceExtractor>,
) {
    let mut datasets: FxHashMap<SurfaceId, Arc<WorkerInit>> =
        FxHashMap::default();

    while let Ok(request) = rx.recv() {
        let event = match request {
            WorkerRequest::Shutdown => break,
            WorkerRequest::Init { surface, init } => {
                drop(datasets.insert(surface, init));
                continue;
            }
            WorkerRequest::Release { surface } => {
                drop(datasets.remove(&surface));
                continue;
            }
            WorkerRequest::Job { surface, chunk, job } => {
                let result = match datasets.get(&surface) {
                    Some(init) => run_job(index, &*extractor, init, &job),
                    None => Err(ExtractError::new(format!(
                        "no atom data loaded for {surface}"
                    ))),
                };
                match result {
                    Ok(mesh) => WorkerEvent::Completed {
                        surface,
                        chunk,
                        worker: index,
                        mesh,
                    },
                    Err(error) => WorkerEvent::Failed {
                        surface,
                        chunk,
                        worker: index,
                        error,
                    },
                }
            }
        };
        if events.send(event).is_err() {
            break;
        }
    }
}

pub(crate) fn run_job(
    index: usize,
    extractor: &dyn IsosurfaceExtractor,
    init: &WorkerInit,
    job: &SurfaceJob,
) -> Result<ExtractedMesh, ExtractError> {
    let start = Instant::now();
    let result = panic::catch_unwind(AssertUnwindSafe(|| extractor.extract(init, job)))
        .unwrap_or_else(|payload| {
            let reason = payload
                .downcast_ref::<&str>()
                .map(|s| (*s).to_owned())
                .or_else(|| payload.downcast_ref::<String>().cloned())
                .unwrap_or_else(|| "unknown panic".to_owned());
            Err(ExtractError::new(format!("extractor panicked: {reason}")))
        });
    log::debug!(
        "worker {index}: {} atoms to show, {} extended, {:.1}ms",
        job.atoms_to_show_indices.len(),
        job.extended_atom_indices.len(),
        start.elapsed().as_secs_f64() * 1000.0,
    );
    result
}

#[cfg(test)]
mod tests {
    use std::sync::atomic::{AtomicUsize, Ordering};

    use super::*;
    use crate::surface::protocol::{ExtractedVertex, SurfaceType};

    struct Echo {
        calls: AtomicUsize,
    }

    impl IsosurfaceExtractor for Echo {
        fn extract(
            &self,
            init: &WorkerInit,
            job: &SurfaceJob,
        ) -> Result<ExtractedMesh, ExtractError> {
            let _ = self.calls.fetch_add(1, Ordering::SeqCst);
            if job.atoms_to_show_indices.contains(&13) {
                return Err(ExtractError::new("unlucky atom"));
            }
            if job.atoms_to_show_indices.contains(&66) {
                panic!("boom");
            }
            Ok(ExtractedMesh {
                vertices: job
                    .atoms_to_show_indices
                    .iter()
                    .map(|&s| ExtractedVertex {
                        x: init.volume,
                        y: 0.0,
                        z: 0.0,
                        atom_id: s,
                    })
                    .collect(),
                faces: Vec::new(),
            })
        }
    }

    fn job(show: Vec<u32>) -> SurfaceJob {
        SurfaceJob {
            surface_type: SurfaceType::Vdw,
            expanded_extent: [[0.0; 3], [1.0; 3]],
            extended_atom_indices: show.clone(),
            atoms_to_show_indices: show,
        }
    }

    fn pool(num_workers: usize, queue_depth: usize) -> (WorkerPool, Arc<Echo>) {
        let echo = Arc::new(Echo {
            calls: AtomicUsize::new(0),
        });
        let options = WorkerOptions {
            num_workers,
            queue_depth,
            ..WorkerOptions::default()
        };
        let extractor: Arc<dyn IsosurfaceExtractor> = echo.clone();
        (WorkerPool::new(&options, extractor).unwrap(), echo)
    }

    fn collect(pool: &mut WorkerPool, n: usize) -> Vec<WorkerEvent> {
        let mut events = Vec::new();
        while events.len() < n {
            let event = pool
                .recv_timeout(Duration::from_secs(10))
                .expect("worker result");
            events.push(event);
        }
        events
    }

    fn init() -> WorkerInit {
        WorkerInit {
            atoms: Vec::new(),
            volume: 7.0,
        }
    }

    #[test]
    fn round_robin_assignment() {
        let (mut pool, _) = pool(3, 8);
        let surface = SurfaceId::from_raw(1);
        pool.broadcast_init(surface, init());
        for chunk in 0..7 {
            pool.submit(surface, chunk, job(vec![chunk as u32]));
        }
        pool.release(surface);

        for event in collect(&mut pool, 7) {
            match event {
                WorkerEvent::Completed {
                    chunk, worker, mesh, ..
                } => {
                    assert_eq!(worker, chunk % 3);
                    assert_eq!(mesh.vertices[0].x, 7.0);
                }
                WorkerEvent::Failed { error, .. } => panic!("{error}"),
            }
        }
        assert_eq!(pool.outstanding(), 0);
    }

    #[test]
    fn tiny_queues_never_block_submission() {
        let (mut pool, echo) = pool(2, 1);
        let surface = SurfaceId::from_raw(1);
        pool.broadcast_init(surface, init());
        for chunk in 0..50 {
            pool.submit(surface, chunk, job(vec![1]));
        }
        pool.release(surface);
        assert_eq!(collect(&mut pool, 50).len(), 50);
        assert_eq!(echo.calls.load(Ordering::SeqCst), 50);
    }

    #[test]
    fn errors_and_panics_become_failures() {
        let (mut pool, _) = pool(1, 8);
        let surface = SurfaceId::from_raw(4);
        pool.broadcast_init(surface, init());
        pool.submit(surface, 0, job(vec![13]));
        pool.submit(surface, 1, job(vec![66]));
        pool.submit(surface, 2, job(vec![1]));

        let events = collect(&mut pool, 3);
        let failures: Vec<String> = events
            .iter()
            .filter_map(|e| match e {
                WorkerEvent::Failed { error, .. } => Some(error.to_string()),
                WorkerEvent::Completed { .. } => None,
            })
            .collect();
        assert_eq!(failures.len(), 2);
        assert!(failures.iter().any(|m| m.contains("unlucky")));
        assert!(failures.iter().any(|m| m.contains("boom")));
        // The worker survived the panic and ran the last job.
        assert!(matches!(events[2], WorkerEvent::Completed { chunk: 2, .. }));
    }

    #[test]
    fn job_without_init_fails() {
        let (mut pool, _) = pool(1, 8);
        pool.submit(SurfaceId::from_raw(9), 0, job(vec![1]));
        let event = collect(&mut pool, 1).remove(0);
        assert!(matches!(event, WorkerEvent::Failed { .. }));
        assert_eq!(event.surface(), SurfaceId::from_raw(9));
    }
}
