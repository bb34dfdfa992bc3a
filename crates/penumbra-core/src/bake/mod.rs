//! Mesh to distance field baking
//!
//! A bake runs in a fixed order: detect planar meshes, filter degenerate
//! triangles, build the [`SpatialIndex`] and [`SampleDirections`], size a
//! cubic grid from the expanded bounds, fill it in parallel, then keep the
//! result only if no inside voxel reached the grid border.
//!
//! ```rust,ignore
//! use penumbra_core::prelude::*;
//!
//! let baker = DistanceFieldBaker::new(BakeConfig::default().with_resolution_scale(1.0));
//! let output = baker.bake(&mesh)?;
//! if output.volume.mesh_was_closed() {
//!     upload(output.volume.as_bytes());
//! }
//! ```

mod fill;
mod voxel;

use crate::bvh::SpatialIndex;
use crate::mesh::{MeshBounds, MeshSnapshot};
use crate::sampling::{DEFAULT_SAMPLE_COUNT, MAX_SAMPLE_COUNT, SampleDirections};
use crate::volume::{DistanceFieldVolume, VolumeFlags};
use crate::{Error, Result};
use glam::{UVec3, Vec3};
use penumbra_math::Aabb;
use serde::{Deserialize, Serialize};

pub use fill::{CancelToken, FillReport, fill_volume};
pub use voxel::{VoxelField, VoxelSample};

/// Smallest grid size on any axis
pub const MIN_VOXELS_PER_AXIS: u32 = 8;
/// Largest grid size on any axis for `resolution_scale <= 1`
pub const MAX_VOXELS_PER_AXIS: u32 = 64;
/// Largest grid size on any axis for `resolution_scale > 1`
pub const MAX_VOXELS_PER_AXIS_HIGH: u32 = 128;
/// Voxels per local-space unit at a resolution scale of 1
pub const VOXELS_PER_UNIT: f32 = 0.1;
/// Each side of the volume is pushed out by this share of the largest mesh extent
pub const BOUNDS_EXPANSION: f32 = 0.2;
/// Matches the sixteen threads the batch scheduler was tuned for
pub const DEFAULT_WORKERS: usize = 16;

/// Configuration for distance field baking
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct BakeConfig {
    /// Voxel density multiplier; `<= 0` disables baking
    pub resolution_scale: f32,
    /// Recorded on the output volume
    pub generate_as_if_two_sided: bool,
    /// Worker pool size; 0 uses every available CPU
    pub num_workers: usize,
    /// Requested number of sample rays per voxel, clamped to [`MAX_SAMPLE_COUNT`]
    pub num_samples: u32,
    /// Seed of the sample direction stream
    pub seed: i32,
}

impl Default for BakeConfig {
    fn default() -> Self {
        Self {
            resolution_scale: 1.0,
            generate_as_if_two_sided: false,
            num_workers: DEFAULT_WORKERS,
            num_samples: DEFAULT_SAMPLE_COUNT,
            seed: 0,
        }
    }
}

impl BakeConfig {
    pub fn with_resolution_scale(mut self, scale: f32) -> Self {
        self.resolution_scale = scale;
        self
    }

    pub fn with_two_sided(mut self, two_sided: bool) -> Self {
        self.generate_as_if_two_sided = two_sided;
        self
    }

    pub fn with_workers(mut self, workers: usize) -> Self {
        self.num_workers = workers;
        self
    }

    pub fn with_samples(mut self, samples: u32) -> Self {
        self.num_samples = samples;
        self
    }

    pub fn with_seed(mut self, seed: i32) -> Self {
        self.seed = seed;
        self
    }

    /// Whether this configuration produces a volume at all
    pub fn is_enabled(&self) -> bool {
        self.resolution_scale > 0.0
    }
}

/// Counters gathered during a bake
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct BakeStats {
    pub input_triangles: usize,
    pub degenerate_triangles: usize,
    pub indexed_triangles: usize,
    pub sample_directions: usize,
    pub batches: usize,
    pub workers: usize,
}

/// A finished bake
#[derive(Debug, Clone, PartialEq)]
pub struct BakeOutput {
    pub volume: DistanceFieldVolume,
    pub stats: BakeStats,
}

/// Volume bounds for a mesh: its box grown by 20% of the largest extent on every side
pub fn volume_bounds(bounds: &MeshBounds) -> Aabb {
    let grow = BOUNDS_EXPANSION * bounds.box_extent.max_element();
    Aabb::from_center(bounds.origin, bounds.box_extent + Vec3::splat(grow))
}

/// Cubic grid size for volume bounds of `size`.
///
/// Each axis asks for `size * 0.1 * scale` voxels, truncated and clamped to
/// `[8, 64]` (`[8, 128]` when `scale > 1`); the largest of the three is used
/// for every axis.
pub fn grid_dimension(size: Vec3, resolution_scale: f32) -> u32 {
    let max_voxels = if resolution_scale <= 1.0 {
        MAX_VOXELS_PER_AXIS
    } else {
        MAX_VOXELS_PER_AXIS_HIGH
    };
    let desired = size * (VOXELS_PER_UNIT * resolution_scale);

    desired
        .to_array()
        .iter()
        .map(|&d| (d.max(0.0) as u32).clamp(MIN_VOXELS_PER_AXIS, max_voxels))
        .max()
        .unwrap_or(MIN_VOXELS_PER_AXIS)
}

/// Bounds must be finite with a non-negative extent that is non-zero on
/// some axis; anything else leaves nothing to normalize distances by.
fn check_bounds(bounds: &MeshBounds) -> Result<()> {
    let extent = bounds.box_extent;
    if !bounds.origin.is_finite()
        || !extent.is_finite()
        || extent.min_element() < 0.0
        || extent.max_element() <= 0.0
    {
        return Err(Error::InvalidParameter(format!(
            "bake bounds need a finite, non-empty extent (origin {}, extent {})",
            bounds.origin, extent
        )));
    }
    Ok(())
}

/// Bakes mesh snapshots with a fixed configuration
///
/// The baker holds no state between bakes; every input is passed in
/// explicitly and the same inputs always give the same volume.
#[derive(Debug, Clone, Default)]
pub struct DistanceFieldBaker {
    config: BakeConfig,
}

impl DistanceFieldBaker {
    pub fn new(config: BakeConfig) -> Self {
        Self { config }
    }

    pub fn config(&self) -> &BakeConfig {
        &self.config
    }

    /// Bake using the mesh's own vertex bounds
    pub fn bake(&self, mesh: &MeshSnapshot) -> Result<BakeOutput> {
        self.bake_with_bounds(mesh, &mesh.bounds(), &CancelToken::new())
    }

    /// Bake with caller-supplied bounds and a cancellation token.
    ///
    /// A non-positive resolution scale returns an empty volume. An unclosed
    /// mesh returns a volume with `mesh_was_closed == false` and no voxels.
    /// Bounds that are non-finite, negative or empty are rejected with
    /// [`Error::InvalidParameter`].
    pub fn bake_with_bounds(
        &self,
        mesh: &MeshSnapshot,
        bounds: &MeshBounds,
        cancel: &CancelToken,
    ) -> Result<BakeOutput> {
        let config = &self.config;
        let local_bounds = volume_bounds(bounds);

        if !config.is_enabled() {
            tracing::debug!(
                scale = config.resolution_scale,
                "resolution scale disables distance field"
            );
            return Ok(BakeOutput {
                volume: DistanceFieldVolume::empty(local_bounds),
                stats: BakeStats::default(),
            });
        }

        let mesh_was_plane = bounds.is_planar();
        let (build_triangles, degenerate_triangles) = mesh.build_triangles(mesh_was_plane);
        if degenerate_triangles > 0 {
            tracing::debug!(count = degenerate_triangles, "skipped degenerate triangles");
        }
        if build_triangles.is_empty() {
            tracing::warn!(
                triangles = mesh.triangle_count(),
                "no usable triangles, nothing to bake"
            );
            return Err(Error::EmptyMesh);
        }
        check_bounds(bounds)?;
        if config.num_samples > MAX_SAMPLE_COUNT {
            tracing::debug!(
                requested = config.num_samples,
                max = MAX_SAMPLE_COUNT,
                "clamping sample budget"
            );
        }

        let index = SpatialIndex::build(build_triangles, mesh.materials());
        let directions = SampleDirections::generate(config.num_samples, config.seed);
        tracing::debug!(
            triangles = index.triangle_count(),
            nodes = index.node_count(),
            directions = directions.len(),
            "spatial index ready"
        );

        let max_distance = local_bounds.extent().length();
        let dim = grid_dimension(local_bounds.size(), config.resolution_scale);
        let mut distances = vec![0.0_f32; (dim as usize).pow(3)];

        let field = VoxelField::new(
            &index,
            &directions,
            local_bounds,
            UVec3::splat(dim),
            max_distance,
        );
        let report = fill_volume(&field, &mut distances, config.num_workers, cancel)?;

        let flags = VolumeFlags {
            mesh_was_closed: !report.any_border_negative,
            built_as_if_two_sided: config.generate_as_if_two_sided,
            mesh_was_plane,
        };
        let mut volume = DistanceFieldVolume::new(distances, dim, local_bounds, flags);

        if flags.mesh_was_closed {
            tracing::info!(dim, plane = mesh_was_plane, "baked distance field");
        } else {
            tracing::warn!(dim, "mesh is not closed, discarding distance field");
            volume.discard();
        }

        Ok(BakeOutput {
            volume,
            stats: BakeStats {
                input_triangles: mesh.triangle_count(),
                degenerate_triangles,
                indexed_triangles: index.triangle_count(),
                sample_directions: directions.len(),
                batches: report.batches,
                workers: report.workers,
            },
        })
    }
}

impl MeshSnapshot {
    /// Bake this mesh with `config`
    pub fn bake_distance_field(&self, config: BakeConfig) -> Result<BakeOutput> {
        DistanceFieldBaker::new(config).bake(self)
    }
}
