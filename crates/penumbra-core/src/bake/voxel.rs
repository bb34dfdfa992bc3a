//! Per-voxel signed distance evaluation

use crate::bvh::SpatialIndex;
use crate::sampling::SampleDirections;
use glam::{UVec3, Vec3};
use penumbra_math::{Aabb, Ray};

/// Fraction of all sample rays that must hit back faces for a voxel to be inside
const INSIDE_BACKFACE_RATIO: f32 = 0.5;

/// Near a surface, the share of hits that must be back faces to force inside
const THIN_SURFACE_BACKFACE_RATIO: f32 = 0.95;

/// One evaluated voxel
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct VoxelSample {
    /// Signed distance divided by the volume's largest half extent
    pub distance: f32,
    /// The voxel is inside and lies on the outer shell of the grid
    pub negative_at_border: bool,
}

/// Everything a worker needs to evaluate voxels, published before any
/// worker starts and only ever read afterwards
#[derive(Debug, Clone, Copy)]
pub struct VoxelField<'a> {
    index: &'a SpatialIndex,
    directions: &'a SampleDirections,
    bounds: Aabb,
    dims: UVec3,
    max_distance: f32,
    voxel_size: Vec3,
    voxel_diameter: f32,
    normalization: f32,
}

impl<'a> VoxelField<'a> {
    /// `max_distance` is the longest ray cast from any voxel, normally the
    /// half diagonal of `bounds`.
    pub fn new(
        index: &'a SpatialIndex,
        directions: &'a SampleDirections,
        bounds: Aabb,
        dims: UVec3,
        max_distance: f32,
    ) -> Self {
        let voxel_size = bounds.size() / dims.max(UVec3::ONE).as_vec3();
        Self {
            index,
            directions,
            bounds,
            dims,
            max_distance,
            voxel_size,
            voxel_diameter: voxel_size.length(),
            normalization: bounds.extent().max_element(),
        }
    }

    pub fn dims(&self) -> UVec3 {
        self.dims
    }

    pub fn bounds(&self) -> Aabb {
        self.bounds
    }

    pub fn voxel_size(&self) -> Vec3 {
        self.voxel_size
    }

    pub fn max_distance(&self) -> f32 {
        self.max_distance
    }

    /// World position of the center of voxel `(x, y, z)`
    pub fn voxel_center(&self, x: u32, y: u32, z: u32) -> Vec3 {
        (Vec3::new(x as f32, y as f32, z as f32) + 0.5) * self.voxel_size + self.bounds.min
    }

    /// Whether `(x, y, z)` is on any face of the grid
    pub fn is_border(&self, x: u32, y: u32, z: u32) -> bool {
        let last = self.dims.saturating_sub(UVec3::ONE);
        x == 0 || y == 0 || z == 0 || x == last.x || y == last.y || z == last.z
    }

    /// Signed distance in world units from `position` to the nearest surface.
    ///
    /// Every sample direction is traced. A voxel is inside when at least half
    /// of all rays hit one-sided back faces, or when it is within one voxel
    /// diagonal of a surface and more than 95% of its hits are back faces;
    /// the second rule keeps thin one-sided sheets from leaking.
    pub fn signed_distance(&self, position: Vec3) -> f32 {
        let mut min_distance = self.max_distance;
        let mut hits = 0_u32;
        let mut back_hits = 0_u32;

        for &direction in self.directions {
            let ray = Ray::new(position, direction);
            if !self.bounds.intersects_segment(&ray, self.max_distance) {
                continue;
            }

            let Some(hit) = self.index.nearest_hit(&ray, self.max_distance) else {
                continue;
            };

            hits += 1;
            if direction.dot(hit.normal) > 0.0 && !hit.two_sided {
                back_hits += 1;
            }

            let distance = self.max_distance * hit.time;
            if distance < min_distance {
                min_distance = distance;
            }
        }

        let unsigned = min_distance;
        let total = self.directions.len() as f32;

        let mostly_back = hits > 0 && back_hits as f32 >= total * INSIDE_BACKFACE_RATIO;
        let thin_inside = unsigned < self.voxel_diameter
            && back_hits as f32 > THIN_SURFACE_BACKFACE_RATIO * hits as f32;

        if mostly_back || thin_inside {
            -unsigned
        } else {
            unsigned
        }
    }

    /// Evaluate voxel `(x, y, z)`
    pub fn evaluate(&self, x: u32, y: u32, z: u32) -> VoxelSample {
        let signed = self.signed_distance(self.voxel_center(x, y, z));
        VoxelSample {
            distance: signed / self.normalization,
            negative_at_border: signed < 0.0 && self.is_border(x, y, z),
        }
    }
}
