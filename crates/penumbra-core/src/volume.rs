//! The baked distance field volume
//!
//! Distances are stored row-major with X varying fastest, normalized by the
//! largest half extent of [`DistanceFieldVolume::local_bounds`] so that
//! values nominally fall in `[-1, 1]`.

use glam::{UVec3, Vec3};
use penumbra_math::Aabb;

/// Status flags reported with every bake
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct VolumeFlags {
    /// No inside voxel touched the grid's outer shell. Volumes that fail
    /// this check are discarded.
    pub mesh_was_closed: bool,
    pub built_as_if_two_sided: bool,
    /// The mesh was flattened onto Z = 0 before baking
    pub mesh_was_plane: bool,
}

impl Default for VolumeFlags {
    fn default() -> Self {
        Self {
            mesh_was_closed: true,
            built_as_if_two_sided: false,
            mesh_was_plane: false,
        }
    }
}

/// A dense cubic grid of signed distances in mesh-local space
#[derive(Debug, Clone, PartialEq, Default)]
pub struct DistanceFieldVolume {
    distances: Vec<f32>,
    dims: UVec3,
    local_bounds: Aabb,
    flags: VolumeFlags,
}

impl DistanceFieldVolume {
    /// A volume with no voxels
    pub fn empty(local_bounds: Aabb) -> Self {
        Self {
            distances: Vec::new(),
            dims: UVec3::ZERO,
            local_bounds,
            flags: VolumeFlags::default(),
        }
    }

    pub(crate) fn new(distances: Vec<f32>, dim: u32, local_bounds: Aabb, flags: VolumeFlags) -> Self {
        debug_assert_eq!(distances.len(), (dim as usize).pow(3));
        Self {
            distances,
            dims: UVec3::splat(dim),
            local_bounds,
            flags,
        }
    }

    /// Drop the voxels, keeping bounds and flags
    pub(crate) fn discard(&mut self) {
        self.distances = Vec::new();
        self.dims = UVec3::ZERO;
    }

    pub fn is_empty(&self) -> bool {
        self.distances.is_empty()
    }

    /// Grid dimensions; always equal on all three axes
    pub fn dims(&self) -> UVec3 {
        self.dims
    }

    pub fn distances(&self) -> &[f32] {
        &self.distances
    }

    /// Take ownership of the voxel buffer
    pub fn into_distances(self) -> Vec<f32> {
        self.distances
    }

    pub fn local_bounds(&self) -> Aabb {
        self.local_bounds
    }

    pub fn flags(&self) -> VolumeFlags {
        self.flags
    }

    pub fn mesh_was_closed(&self) -> bool {
        self.flags.mesh_was_closed
    }

    pub fn built_as_if_two_sided(&self) -> bool {
        self.flags.built_as_if_two_sided
    }

    pub fn mesh_was_plane(&self) -> bool {
        self.flags.mesh_was_plane
    }

    /// Full size of the volume bounds
    pub fn size(&self) -> Vec3 {
        self.local_bounds.size()
    }

    /// Half size of the volume bounds
    pub fn extent(&self) -> Vec3 {
        self.local_bounds.extent()
    }

    /// Multiply a stored value by this to get a local-space distance
    pub fn distance_scale(&self) -> f32 {
        self.extent().max_element()
    }

    /// Size of one voxel, or zero for an empty volume
    pub fn voxel_size(&self) -> Vec3 {
        if self.is_empty() {
            Vec3::ZERO
        } else {
            self.size() / self.dims.as_vec3()
        }
    }

    /// Buffer offset of voxel `(x, y, z)`
    pub fn index(&self, x: u32, y: u32, z: u32) -> Option<usize> {
        if x < self.dims.x && y < self.dims.y && z < self.dims.z {
            Some(((z * self.dims.y + y) * self.dims.x + x) as usize)
        } else {
            None
        }
    }

    /// Normalized value stored for voxel `(x, y, z)`
    pub fn get(&self, x: u32, y: u32, z: u32) -> Option<f32> {
        self.index(x, y, z).map(|i| self.distances[i])
    }

    /// Trilinearly interpolated local-space distance at `point`.
    ///
    /// Points outside the voxel centers clamp to the nearest edge voxel.
    /// Returns `None` for an empty volume.
    pub fn sample(&self, point: Vec3) -> Option<f32> {
        if self.is_empty() {
            return None;
        }

        let max_index = (self.dims - UVec3::ONE).as_vec3();
        let grid = ((point - self.local_bounds.min) / self.voxel_size() - 0.5)
            .clamp(Vec3::ZERO, max_index);
        let base = grid.floor().min(max_index);
        let t = grid - base;

        let i0 = base.as_uvec3();
        let i1 = (i0 + UVec3::ONE).min(self.dims - UVec3::ONE);

        let at = |x: u32, y: u32, z: u32| self.get(x, y, z).unwrap_or_default();
        let lerp = |a: f32, b: f32, t: f32| a + (b - a) * t;

        let c00 = lerp(at(i0.x, i0.y, i0.z), at(i1.x, i0.y, i0.z), t.x);
        let c10 = lerp(at(i0.x, i1.y, i0.z), at(i1.x, i1.y, i0.z), t.x);
        let c01 = lerp(at(i0.x, i0.y, i1.z), at(i1.x, i0.y, i1.z), t.x);
        let c11 = lerp(at(i0.x, i1.y, i1.z), at(i1.x, i1.y, i1.z), t.x);

        let c0 = lerp(c00, c10, t.y);
        let c1 = lerp(c01, c11, t.y);

        Some(lerp(c0, c1, t.z) * self.distance_scale())
    }

    /// Raw bytes of the distance buffer, ready for a 3D texture upload
    pub fn as_bytes(&self) -> &[u8] {
        bytemuck::cast_slice(&self.distances)
    }

    /// Memory held by the voxel buffer
    pub fn resource_size(&self) -> usize {
        std::mem::size_of::<Self>() + self.distances.capacity() * std::mem::size_of::<f32>()
    }
}
