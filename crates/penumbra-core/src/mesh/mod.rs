//! Immutable mesh snapshots handed to the baker
//!
//! A [`MeshSnapshot`] is validated once on construction, so the bake can
//! index into it freely afterwards.

mod builder;
mod material;

use crate::bvh::BuildTriangle;
use crate::{Error, Result};
use glam::{Vec2, Vec3};
use penumbra_math::{Aabb, KINDA_SMALL_NUMBER, SMALL_NUMBER};

pub use builder::{MeshSection, MeshSnapshotBuilder};
pub use material::{Material, Texture};

/// An indexed triangle with the material it was authored with
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Triangle {
    pub indices: [u32; 3],
    pub material: u32,
}

impl Triangle {
    pub fn new(indices: [u32; 3], material: u32) -> Self {
        Self { indices, material }
    }
}

/// Read-only view of a mesh for the duration of one bake
#[derive(Debug, Clone, Default)]
pub struct MeshSnapshot {
    vertices: Vec<Vec3>,
    uvs: Vec<Vec2>,
    triangles: Vec<Triangle>,
    materials: Vec<Material>,
}

impl MeshSnapshot {
    /// Create a snapshot, checking every index against its array.
    ///
    /// `uvs` may be empty unless some material is alpha-tested, in which case
    /// it must hold one coordinate per vertex.
    pub fn new(
        vertices: Vec<Vec3>,
        uvs: Vec<Vec2>,
        triangles: Vec<Triangle>,
        materials: Vec<Material>,
    ) -> Result<Self> {
        let needs_uvs = materials.iter().any(|m| m.alpha_test);
        if needs_uvs && uvs.len() != vertices.len() {
            return Err(Error::InvalidMesh(format!(
                "alpha-tested materials need one UV per vertex ({} UVs for {} vertices)",
                uvs.len(),
                vertices.len()
            )));
        }
        if !uvs.is_empty() && uvs.len() != vertices.len() {
            return Err(Error::InvalidMesh(format!(
                "{} UVs for {} vertices",
                uvs.len(),
                vertices.len()
            )));
        }

        for (i, tri) in triangles.iter().enumerate() {
            if let Some(&bad) = tri.indices.iter().find(|&&idx| idx as usize >= vertices.len()) {
                return Err(Error::InvalidMesh(format!(
                    "triangle {} references vertex {} of {}",
                    i,
                    bad,
                    vertices.len()
                )));
            }
            if tri.material as usize >= materials.len() {
                return Err(Error::InvalidMesh(format!(
                    "triangle {} references material {} of {}",
                    i,
                    tri.material,
                    materials.len()
                )));
            }
        }

        Ok(Self {
            vertices,
            uvs,
            triangles,
            materials,
        })
    }

    /// Positions plus a flat index list, all sharing one opaque one-sided material
    pub fn from_indexed(positions: Vec<Vec3>, indices: &[u32]) -> Result<Self> {
        if indices.len() % 3 != 0 {
            return Err(Error::InvalidMesh(format!(
                "index count {} is not a multiple of 3",
                indices.len()
            )));
        }
        let triangles = indices
            .chunks_exact(3)
            .map(|c| Triangle::new([c[0], c[1], c[2]], 0))
            .collect();
        Self::new(positions, Vec::new(), triangles, vec![Material::opaque()])
    }

    pub fn vertices(&self) -> &[Vec3] {
        &self.vertices
    }

    pub fn uvs(&self) -> &[Vec2] {
        &self.uvs
    }

    pub fn triangles(&self) -> &[Triangle] {
        &self.triangles
    }

    pub fn materials(&self) -> &[Material] {
        &self.materials
    }

    pub fn vertex_count(&self) -> usize {
        self.vertices.len()
    }

    pub fn triangle_count(&self) -> usize {
        self.triangles.len()
    }

    /// Box-sphere bounds of the vertex positions
    pub fn bounds(&self) -> MeshBounds {
        MeshBounds::from_points(&self.vertices)
    }

    /// Triangles ready for the spatial index, plus how many were dropped as degenerate.
    ///
    /// Vertices are taken in reverse order, so the stored face normal
    /// `(v1 - v2) x (v0 - v2)` is the counter-clockwise normal of the
    /// authored winding. With `flatten_to_plane` every Z is forced to 0.
    pub fn build_triangles(&self, flatten_to_plane: bool) -> (Vec<BuildTriangle>, usize) {
        let mut out = Vec::with_capacity(self.triangles.len());
        let mut degenerate = 0;

        for tri in &self.triangles {
            let [i0, i1, i2] = tri.indices.map(|i| i as usize);
            let mut v0 = self.vertices[i2];
            let mut v1 = self.vertices[i1];
            let mut v2 = self.vertices[i0];

            if flatten_to_plane {
                v0.z = 0.0;
                v1.z = 0.0;
                v2.z = 0.0;
            }

            if (v1 - v2).cross(v0 - v2).length_squared() < SMALL_NUMBER {
                degenerate += 1;
                continue;
            }

            let material = &self.materials[tri.material as usize];
            let uvs = if material.alpha_test {
                [self.uvs[i2], self.uvs[i1], self.uvs[i0]]
            } else {
                [Vec2::ZERO; 3]
            };

            out.push(BuildTriangle {
                vertices: [v0, v1, v2],
                uvs,
                material: tri.material,
                two_sided: material.two_sided,
            });
        }

        (out, degenerate)
    }
}

/// Box and bounding sphere around a mesh
#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub struct MeshBounds {
    pub origin: Vec3,
    /// Half size of the box
    pub box_extent: Vec3,
    pub sphere_radius: f32,
}

impl MeshBounds {
    pub fn new(origin: Vec3, box_extent: Vec3) -> Self {
        Self {
            origin,
            box_extent,
            sphere_radius: box_extent.length(),
        }
    }

    /// Bounds of a point set; zero-sized at the origin when there are no points
    pub fn from_points(points: &[Vec3]) -> Self {
        let aabb = Aabb::from_points(points.iter().copied());
        if aabb.is_valid() {
            Self::new(aabb.center(), aabb.extent())
        } else {
            Self::default()
        }
    }

    pub fn to_aabb(&self) -> Aabb {
        Aabb::from_center(self.origin, self.box_extent)
    }

    /// Full size along each axis
    pub fn size(&self) -> Vec3 {
        self.box_extent * 2.0
    }

    /// Very thin in Z (under 1% of the largest dimension) and straddling Z = 0
    pub fn is_planar(&self) -> bool {
        let size = self.size();
        let max_dimension = size.max_element();

        size.z * 100.0 < max_dimension
            && self.origin.z - self.box_extent.z < KINDA_SMALL_NUMBER
            && self.origin.z + self.box_extent.z > -KINDA_SMALL_NUMBER
    }
}
