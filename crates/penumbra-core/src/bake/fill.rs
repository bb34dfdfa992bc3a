//! Parallel fill of the voxel grid in synchronous Z-slice batches
//!
//! One job per Z slice. Jobs are dispatched onto a fixed-size rayon pool in
//! batches of at most `P`; each batch is a `scope` that returns only when
//! all of its slices are done. Every job owns a disjoint `&mut` chunk of the
//! output, so nothing is locked.

use super::voxel::VoxelField;
use crate::{Error, Result};
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};

/// Cooperative cancellation flag, checked once per slice
#[derive(Debug, Clone, Default)]
pub struct CancelToken {
    cancelled: Arc<AtomicBool>,
}

impl CancelToken {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn cancel(&self) {
        self.cancelled.store(true, Ordering::Relaxed);
    }

    pub fn is_cancelled(&self) -> bool {
        self.cancelled.load(Ordering::Relaxed)
    }
}

/// Outcome of a completed fill
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct FillReport {
    /// Any voxel on the grid's outer shell came out negative
    pub any_border_negative: bool,
    /// Number of batches dispatched
    pub batches: usize,
    /// Workers in the pool
    pub workers: usize,
}

/// One Z slice and the part of the output it writes
struct SliceJob<'a> {
    z: u32,
    voxels: &'a mut [f32],
    negative_at_border: bool,
    finished: bool,
}

impl SliceJob<'_> {
    fn run(&mut self, field: &VoxelField<'_>, cancel: &CancelToken) {
        if cancel.is_cancelled() {
            return;
        }

        let dims = field.dims();
        for y in 0..dims.y {
            for x in 0..dims.x {
                let sample = field.evaluate(x, y, self.z);
                self.voxels[(y * dims.x + x) as usize] = sample.distance;
                self.negative_at_border |= sample.negative_at_border;
            }
        }
        self.finished = true;
    }
}

/// Fill `distances` (x fastest, then y, then z) with `field` using `workers`
/// threads; `0` means one per available CPU.
///
/// Results do not depend on `workers` or on batch order.
pub fn fill_volume(
    field: &VoxelField<'_>,
    distances: &mut [f32],
    workers: usize,
    cancel: &CancelToken,
) -> Result<FillReport> {
    let dims = field.dims();
    let plane = (dims.x * dims.y) as usize;
    let expected = plane * dims.z as usize;
    if distances.len() != expected {
        return Err(Error::InvalidParameter(format!(
            "distance buffer holds {} voxels, grid needs {}",
            distances.len(),
            expected
        )));
    }
    if expected == 0 {
        return Ok(FillReport::default());
    }

    let pool = rayon::ThreadPoolBuilder::new()
        .num_threads(workers)
        .thread_name(|i| format!("penumbra-fill-{i}"))
        .build()
        .map_err(|e| Error::ThreadPool(e.to_string()))?;
    let workers = pool.current_num_threads().max(1);

    let mut jobs: Vec<SliceJob<'_>> = distances
        .chunks_mut(plane)
        .enumerate()
        .map(|(z, voxels)| SliceJob {
            z: z as u32,
            voxels,
            negative_at_border: false,
            finished: false,
        })
        .collect();

    let mut batches = 0;
    for batch in jobs.chunks_mut(workers) {
        if cancel.is_cancelled() {
            return Err(Error::Cancelled);
        }

        tracing::trace!(batch = batches, slices = batch.len(), "dispatching slice batch");
        pool.scope(|scope| {
            for job in batch.iter_mut() {
                scope.spawn(move |_| job.run(field, cancel));
            }
        });
        batches += 1;
    }

    if jobs.iter().any(|job| !job.finished) {
        return Err(Error::Cancelled);
    }

    Ok(FillReport {
        any_border_negative: jobs.iter().any(|job| job.negative_at_border),
        batches,
        workers,
    })
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;
    use crate::bvh::SpatialIndex;
    use crate::sampling::SampleDirections;
    use glam::{UVec3, Vec3};
    use penumbra_math::Aabb;

    fn empty_field<'a>(
        index: &'a SpatialIndex,
        dirs: &'a SampleDirections,
        dim: u32,
    ) -> VoxelField<'a> {
        let bounds = Aabb::new(Vec3::ZERO, Vec3::splat(dim as f32));
        VoxelField::new(index, dirs, bounds, UVec3::splat(dim), bounds.extent().length())
    }

    #[test]
    fn batches_are_ceil_of_slices_over_workers() {
        let index = SpatialIndex::build(Vec::new(), &[]);
        let dirs = SampleDirections::generate(16, 0);
        let field = empty_field(&index, &dirs, 10);
        let mut distances = vec![0.0; 1000];

        let report = fill_volume(&field, &mut distances, 4, &CancelToken::new()).unwrap();
        assert_eq!(report.workers, 4);
        assert_eq!(report.batches, 3);
        assert!(!report.any_border_negative);
        // Nothing to hit: every voxel is the normalized max distance
        let expected = field.max_distance() / 5.0;
        assert!(distances.iter().all(|&d| (d - expected).abs() < 1e-6));
    }

    #[test]
    fn rejects_mismatched_buffer() {
        let index = SpatialIndex::build(Vec::new(), &[]);
        let dirs = SampleDirections::generate(16, 0);
        let field = empty_field(&index, &dirs, 4);
        let mut distances = vec![0.0; 10];

        let result = fill_volume(&field, &mut distances, 2, &CancelToken::new());
        assert!(matches!(result, Err(Error::InvalidParameter(_))));
    }

    #[test]
    fn cancelled_before_start() {
        let index = SpatialIndex::build(Vec::new(), &[]);
        let dirs = SampleDirections::generate(16, 0);
        let field = empty_field(&index, &dirs, 4);
        let mut distances = vec![0.0; 64];

        let cancel = CancelToken::new();
        cancel.cancel();
        let result = fill_volume(&field, &mut distances, 2, &cancel);
        assert!(matches!(result, Err(Error::Cancelled)));
        assert!(distances.iter().all(|&d| d == 0.0));
    }

    #[test]
    fn clones_share_the_flag() {
        let token = CancelToken::new();
        let other = token.clone();
        assert!(!other.is_cancelled());
        token.cancel();
        assert!(other.is_cancelled());
    }
}
