//! Assembling a snapshot from per-material sections

use super::{Material, MeshSnapshot, Triangle};
use crate::{Error, Result};
use glam::{Vec2, Vec3};

/// One sub-mesh drawn with a single material
///
/// Indices are local to `positions`.
#[derive(Debug, Clone, Copy)]
pub struct MeshSection<'a> {
    pub positions: &'a [Vec3],
    /// Only read when the material is alpha-tested
    pub uvs: Option<&'a [Vec2]>,
    pub indices: &'a [u32],
}

/// Incrementally builds a [`MeshSnapshot`] from sections
///
/// ```rust
/// use glam::Vec3;
/// use penumbra_core::mesh::{Material, MeshSection, MeshSnapshotBuilder};
///
/// let positions = [Vec3::ZERO, Vec3::X, Vec3::Y];
/// let mut builder = MeshSnapshotBuilder::new();
/// builder
///     .add_section(
///         MeshSection { positions: &positions, uvs: None, indices: &[0, 1, 2] },
///         Material::opaque(),
///     )
///     .unwrap();
/// assert_eq!(builder.build().triangle_count(), 1);
/// ```
#[derive(Debug, Clone, Default)]
pub struct MeshSnapshotBuilder {
    vertices: Vec<Vec3>,
    uvs: Vec<Vec2>,
    triangles: Vec<Triangle>,
    materials: Vec<Material>,
}

impl MeshSnapshotBuilder {
    pub fn new() -> Self {
        Self::default()
    }

    /// Append a section; its material gets the next material index.
    ///
    /// UVs are copied only for alpha-tested materials, other sections get
    /// `(0, 0)` placeholders so the UV array stays parallel to the vertices.
    pub fn add_section(&mut self, section: MeshSection<'_>, material: Material) -> Result<&mut Self> {
        let vertex_count = section.positions.len();

        if section.indices.len() % 3 != 0 {
            return Err(Error::InvalidMesh(format!(
                "section {} has {} indices, not a multiple of 3",
                self.materials.len(),
                section.indices.len()
            )));
        }
        if let Some(&bad) = section.indices.iter().find(|&&i| i as usize >= vertex_count) {
            return Err(Error::InvalidMesh(format!(
                "section {} references vertex {} of {}",
                self.materials.len(),
                bad,
                vertex_count
            )));
        }

        match (material.alpha_test, section.uvs) {
            (true, Some(uvs)) if uvs.len() == vertex_count => self.uvs.extend_from_slice(uvs),
            (true, _) => {
                return Err(Error::InvalidMesh(format!(
                    "alpha-tested section {} needs one UV per vertex",
                    self.materials.len()
                )));
            }
            (false, _) => self.uvs.resize(self.uvs.len() + vertex_count, Vec2::ZERO),
        }

        let base = self.vertices.len() as u32;
        let material_index = self.materials.len() as u32;

        self.vertices.extend_from_slice(section.positions);
        self.triangles.extend(section.indices.chunks_exact(3).map(|c| {
            Triangle::new([base + c[0], base + c[1], base + c[2]], material_index)
        }));
        self.materials.push(material);

        Ok(self)
    }

    pub fn section_count(&self) -> usize {
        self.materials.len()
    }

    pub fn build(self) -> MeshSnapshot {
        // Every section was validated on insertion
        MeshSnapshot {
            vertices: self.vertices,
            uvs: self.uvs,
            triangles: self.triangles,
            materials: self.materials,
        }
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;
    use crate::mesh::Texture;
    use std::sync::Arc;

    const TRI: [Vec3; 3] = [Vec3::ZERO, Vec3::X, Vec3::Y];

    #[test]
    fn sections_offset_indices_and_materials() {
        let mut builder = MeshSnapshotBuilder::new();
        let section = MeshSection {
            positions: &TRI,
            uvs: None,
            indices: &[0, 1, 2],
        };
        builder.add_section(section, Material::opaque()).unwrap();
        builder
            .add_section(section, Material::opaque().with_two_sided(true))
            .unwrap();

        let mesh = builder.build();
        assert_eq!(mesh.vertex_count(), 6);
        assert_eq!(mesh.uvs().len(), 6);
        assert_eq!(mesh.triangles()[1], Triangle::new([3, 4, 5], 1));
        assert!(mesh.materials()[1].two_sided);
    }

    #[test]
    fn only_alpha_tested_sections_keep_uvs() {
        let uvs = [Vec2::new(0.1, 0.2), Vec2::new(0.3, 0.4), Vec2::new(0.5, 0.6)];
        let texture = Arc::new(Texture::new(1, 1, 1, vec![255]).unwrap());

        let mut builder = MeshSnapshotBuilder::new();
        let section = MeshSection {
            positions: &TRI,
            uvs: Some(&uvs),
            indices: &[0, 1, 2],
        };
        builder.add_section(section, Material::opaque()).unwrap();
        builder
            .add_section(section, Material::opaque().with_alpha_test(10, texture))
            .unwrap();

        let mesh = builder.build();
        assert_eq!(mesh.uvs()[0], Vec2::ZERO);
        assert_eq!(mesh.uvs()[3], uvs[0]);
    }

    #[test]
    fn rejects_bad_sections() {
        let mut builder = MeshSnapshotBuilder::new();
        let out_of_range = MeshSection {
            positions: &TRI,
            uvs: None,
            indices: &[0, 1, 3],
        };
        assert!(builder.add_section(out_of_range, Material::opaque()).is_err());

        let missing_uvs = MeshSection {
            positions: &TRI,
            uvs: None,
            indices: &[0, 1, 2],
        };
        let alpha = Material {
            alpha_test: true,
            ..Material::default()
        };
        assert!(builder.add_section(missing_uvs, alpha).is_err());
        assert_eq!(builder.section_count(), 0);
    }
}
