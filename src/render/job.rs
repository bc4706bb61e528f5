// SPDX-License-Identifier: Apache-2.0
// Copyright (c) 2025 Polyframe Inc.

//! Render orchestration
//!
//! A [`Renderer`] turns a tree into a mesh either on the calling thread or
//! on a worker. Asynchronous jobs come back as a [`RenderHandle`] that the
//! caller completes later. Jobs submitted to one [`RenderQueue`] run
//! strictly one after another.

use super::polygonizer::{check_resolution, Polygonizer, SurfaceNets};
use crate::error::{FrepError, Result};
use crate::geometry::{normals, Mesh, RawMesh, Region};
use crate::tree::{Context, Expr, Tree};
use crossbeam_channel::{self as channel, Receiver, Sender, TryRecvError};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use std::thread::{self, JoinHandle};
use std::time::Instant;

/// Per-render knobs
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct RenderSettings {
    /// Samples per unit length
    pub resolution: f32,
    /// Crease angle in degrees; 180 or more keeps every vertex shared
    pub splitting_angle: f32,
}

impl Default for RenderSettings {
    fn default() -> Self {
        Self {
            resolution: 12.0,
            splitting_angle: normals::NO_SPLITTING,
        }
    }
}

/// A fully resolved polygonization request.
///
/// Holds its own snapshot of the expression, so it stays valid on another
/// thread whatever happens to the originating handle.
#[derive(Clone)]
pub struct RenderJob {
    expr: Expr,
    region: Region,
    resolution: f32,
    polygonizer: Arc<dyn Polygonizer>,
}

impl RenderJob {
    pub fn expr(&self) -> &Expr {
        &self.expr
    }

    pub fn region(&self) -> &Region {
        &self.region
    }

    pub fn resolution(&self) -> f32 {
        self.resolution
    }

    /// Run the polygonizer; an empty surface becomes an empty mesh.
    ///
    /// Output with a triangle index past the vertex list is rejected here,
    /// before anything indexes into it.
    pub fn run(&self) -> Result<RawMesh> {
        let start = Instant::now();
        let raw = self
            .polygonizer
            .polygonize(&self.expr, &self.region, self.resolution)?
            .unwrap_or_default();
        if !raw.is_valid() {
            return Err(FrepError::InvalidMesh {
                vertices: raw.vertex_count(),
                triangles: raw.triangle_count(),
            });
        }

        tracing::debug!(
            triangles = raw.triangle_count(),
            elapsed = ?start.elapsed(),
            "render job finished"
        );
        Ok(raw)
    }
}

impl std::fmt::Debug for RenderJob {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RenderJob")
            .field("expr", &self.expr)
            .field("region", &self.region)
            .field("resolution", &self.resolution)
            .finish_non_exhaustive()
    }
}

/// Entry point for turning trees into meshes
#[derive(Clone)]
pub struct Renderer {
    polygonizer: Arc<dyn Polygonizer>,
    settings: RenderSettings,
}

impl Renderer {
    pub fn new(polygonizer: impl Polygonizer + 'static) -> Self {
        Self::with_polygonizer(Arc::new(polygonizer))
    }

    pub fn with_polygonizer(polygonizer: Arc<dyn Polygonizer>) -> Self {
        Self {
            polygonizer,
            settings: RenderSettings::default(),
        }
    }

    pub fn with_settings(mut self, settings: RenderSettings) -> Self {
        self.settings = settings;
        self
    }

    pub fn settings(&self) -> &RenderSettings {
        &self.settings
    }

    /// Resolve `tree` and check the request without running it.
    ///
    /// Fails with [`FrepError::ReleasedTree`] when the handle is stale.
    pub fn prepare(&self, ctx: &Context, tree: Tree, region: &Region) -> Result<RenderJob> {
        region.validate()?;
        check_resolution(self.settings.resolution)?;

        Ok(RenderJob {
            expr: ctx.expr(tree)?,
            region: *region,
            resolution: self.settings.resolution,
            polygonizer: Arc::clone(&self.polygonizer),
        })
    }

    /// Polygonize on the calling thread
    pub fn render_raw(&self, ctx: &Context, tree: Tree, region: &Region) -> Result<RawMesh> {
        self.prepare(ctx, tree, region)?.run()
    }

    /// Polygonize on the calling thread, then compute normals with the
    /// configured splitting angle
    pub fn render(&self, ctx: &Context, tree: Tree, region: &Region) -> Result<Mesh> {
        let raw = self.render_raw(ctx, tree, region)?;
        Ok(finish_mesh(raw, self.settings.splitting_angle))
    }

    /// Polygonize on the rayon pool; the result is collected through the handle
    pub fn schedule(&self, ctx: &Context, tree: Tree, region: &Region) -> Result<RenderHandle> {
        let job = self.prepare(ctx, tree, region)?;
        let (sender, receiver) = channel::bounded(1);

        rayon::spawn(move || {
            // Receiver dropped means nobody wants the mesh any more
            let _ = sender.send(job.run());
        });

        Ok(RenderHandle::new(receiver))
    }

    /// Queue on `queue`, after every job submitted to it earlier
    pub fn enqueue(
        &self,
        queue: &RenderQueue,
        ctx: &Context,
        tree: Tree,
        region: &Region,
    ) -> Result<RenderHandle> {
        queue.submit(self.prepare(ctx, tree, region)?)
    }
}

impl Default for Renderer {
    fn default() -> Self {
        Self::new(SurfaceNets::default())
    }
}

impl std::fmt::Debug for Renderer {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Renderer")
            .field("settings", &self.settings)
            .finish_non_exhaustive()
    }
}

fn finish_mesh(raw: RawMesh, splitting_angle: f32) -> Mesh {
    let mut mesh = raw.into_mesh();
    mesh.recalculate_normals(splitting_angle);
    mesh
}

/// Pending render result, completed exactly once
#[derive(Debug)]
pub struct RenderHandle {
    receiver: Receiver<Result<RawMesh>>,
    result: Option<Result<RawMesh>>,
}

impl RenderHandle {
    fn new(receiver: Receiver<Result<RawMesh>>) -> Self {
        Self {
            receiver,
            result: None,
        }
    }

    /// Non-blocking check for a finished job
    pub fn is_ready(&mut self) -> bool {
        if self.result.is_some() {
            return true;
        }
        match self.receiver.try_recv() {
            Ok(result) => {
                self.result = Some(result);
                true
            }
            Err(TryRecvError::Empty) => false,
            Err(TryRecvError::Disconnected) => {
                self.result = Some(Err(FrepError::WorkerDisconnected));
                true
            }
        }
    }

    /// Block until the job finishes and take its mesh
    pub fn complete(mut self) -> Result<RawMesh> {
        match self.result.take() {
            Some(result) => result,
            None => self
                .receiver
                .recv()
                .unwrap_or(Err(FrepError::WorkerDisconnected)),
        }
    }

    /// Block, then build a mesh with normals split at `splitting_angle`
    pub fn complete_mesh(self, splitting_angle: f32) -> Result<Mesh> {
        Ok(finish_mesh(self.complete()?, splitting_angle))
    }
}

struct QueuedJob {
    job: RenderJob,
    reply: Sender<Result<RawMesh>>,
}

/// Single worker thread that runs submitted jobs in FIFO order.
///
/// A job starts only after the previous one has finished. Dropping the
/// queue lets the worker drain what was already submitted, then joins it.
pub struct RenderQueue {
    sender: Option<Sender<QueuedJob>>,
    worker: Option<JoinHandle<()>>,
}

impl RenderQueue {
    pub fn new() -> Result<Self> {
        let (sender, receiver) = channel::unbounded::<QueuedJob>();

        let worker = thread::Builder::new()
            .name("frepkit-render".into())
            .spawn(move || {
                for (sequence, queued) in receiver.iter().enumerate() {
                    tracing::trace!(sequence, "render queue picked up job");
                    let _ = queued.reply.send(queued.job.run());
                }
            })?;

        Ok(Self {
            sender: Some(sender),
            worker: Some(worker),
        })
    }

    /// Append `job` to the queue
    pub fn submit(&self, job: RenderJob) -> Result<RenderHandle> {
        let (reply, receiver) = channel::bounded(1);
        self.sender
            .as_ref()
            .ok_or(FrepError::WorkerDisconnected)?
            .send(QueuedJob { job, reply })
            .map_err(|_| FrepError::WorkerDisconnected)?;
        Ok(RenderHandle::new(receiver))
    }
}

impl Drop for RenderQueue {
    fn drop(&mut self) {
        drop(self.sender.take());
        if let Some(worker) = self.worker.take() {
            if worker.join().is_err() {
                tracing::error!("render queue worker panicked");
            }
        }
    }
}

impl std::fmt::Debug for RenderQueue {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RenderQueue")
            .field("running", &self.worker.is_some())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::csg::sphere_at_origin;

    #[test]
    fn test_render_sync_and_async_agree() -> Result<()> {
        let ctx = Context::new();
        let sphere = sphere_at_origin(&ctx, 1.0)?;
        let region = Region::cube(1.5);
        let renderer = Renderer::default().with_settings(RenderSettings {
            resolution: 8.0,
            ..RenderSettings::default()
        });

        let sync = renderer.render_raw(&ctx, sphere, &region)?;
        let handle = renderer.schedule(&ctx, sphere, &region)?;
        let async_mesh = handle.complete()?;

        assert!(!sync.is_empty());
        assert_eq!(sync, async_mesh);
        Ok(())
    }

    #[test]
    fn test_released_tree_fails_before_scheduling() -> Result<()> {
        let ctx = Context::new();
        let sphere = sphere_at_origin(&ctx, 1.0)?;
        ctx.release(sphere);

        let err = Renderer::default()
            .schedule(&ctx, sphere, &Region::cube(1.5))
            .unwrap_err();
        assert!(matches!(err, FrepError::ReleasedTree(_)));
        Ok(())
    }

    #[test]
    fn test_handle_polls_until_ready() -> Result<()> {
        let ctx = Context::new();
        let sphere = sphere_at_origin(&ctx, 1.0)?;
        let mut handle = Renderer::default().schedule(&ctx, sphere, &Region::cube(1.5))?;

        while !handle.is_ready() {
            std::thread::yield_now();
        }
        assert!(handle.is_ready());
        assert!(!handle.complete()?.is_empty());
        Ok(())
    }

    /// Emits a triangle that points past its single vertex
    struct Dangling;

    impl Polygonizer for Dangling {
        fn polygonize(&self, _: &Expr, _: &Region, _: f32) -> Result<Option<RawMesh>> {
            Ok(Some(RawMesh::new(vec![nalgebra::Point3::origin()], vec![[0, 1, 2]])))
        }
    }

    #[test]
    fn test_out_of_range_indices_are_reported() -> Result<()> {
        let ctx = Context::new();
        let sphere = sphere_at_origin(&ctx, 1.0)?;
        let region = Region::cube(1.5);
        let renderer = Renderer::new(Dangling);

        assert!(matches!(
            renderer.render(&ctx, sphere, &region),
            Err(FrepError::InvalidMesh { vertices: 1, triangles: 1 })
        ));
        assert!(matches!(
            renderer.schedule(&ctx, sphere, &region)?.complete_mesh(30.0),
            Err(FrepError::InvalidMesh { .. })
        ));

        let queue = RenderQueue::new()?;
        let handle = renderer.enqueue(&queue, &ctx, sphere, &region)?;
        assert!(matches!(handle.complete(), Err(FrepError::InvalidMesh { .. })));
        Ok(())
    }

    #[test]
    fn test_queue_runs_jobs() -> Result<()> {
        let ctx = Context::new();
        let sphere = sphere_at_origin(&ctx, 1.0)?;
        let renderer = Renderer::default();
        let queue = RenderQueue::new()?;

        let first = renderer.enqueue(&queue, &ctx, sphere, &Region::cube(1.5))?;
        let second = renderer.enqueue(&queue, &ctx, sphere, &Region::cube(0.5))?;

        assert!(!first.complete()?.is_empty());
        // Region entirely inside the sphere, closed off by the padding layer
        assert!(!second.complete_mesh(90.0)?.is_empty());
        Ok(())
    }
}
