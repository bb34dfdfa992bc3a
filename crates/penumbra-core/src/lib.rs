//! # Penumbra Core
//!
//! Bake static triangle meshes into signed distance field volumes for
//! distance-field shadowing and occlusion.
//!
//! Every voxel fires a fixed, stratified set of rays at a BVH over the mesh;
//! the nearest hit gives the distance and the share of back-face hits gives
//! the sign. Z slices are filled in parallel, and a volume whose inside
//! region touches the grid border is rejected as unclosed.
//!
//! ## Quick Start
//!
//! ```rust
//! use penumbra_core::prelude::*;
//!
//! // A closed tetrahedron with outward-facing, counter-clockwise triangles
//! let positions = vec![
//!     Vec3::new(0.0, 0.0, 0.0),
//!     Vec3::new(20.0, 0.0, 0.0),
//!     Vec3::new(0.0, 20.0, 0.0),
//!     Vec3::new(0.0, 0.0, 20.0),
//! ];
//! let indices = [0, 2, 1, 0, 1, 3, 0, 3, 2, 1, 2, 3];
//! let mesh = MeshSnapshot::from_indexed(positions, &indices)?;
//!
//! let output = mesh.bake_distance_field(BakeConfig::default().with_samples(200))?;
//! assert_eq!(output.volume.dims(), UVec3::splat(8));
//! # Ok::<(), penumbra_core::Error>(())
//! ```
//!
//! ## Conventions
//!
//! - **Winding**: front faces are counter-clockwise; normals point out of the solid
//! - **Storage**: `f32`, X fastest, then Y, then Z
//! - **Values**: local-space distance divided by the largest half extent of
//!   the volume bounds, negative inside

pub mod bake;
pub mod bvh;
pub mod mesh;
pub mod sampling;
pub mod volume;

mod error;

pub use error::{Error, Result};

/// Prelude module for convenient imports
pub mod prelude {
    // Baking
    pub use crate::bake::{BakeConfig, BakeOutput, BakeStats, CancelToken, DistanceFieldBaker};

    // Mesh input
    pub use crate::mesh::{
        Material, MeshBounds, MeshSection, MeshSnapshot, MeshSnapshotBuilder, Texture, Triangle,
    };

    // Output
    pub use crate::volume::{DistanceFieldVolume, VolumeFlags};

    // Math (re-export glam)
    pub use glam::{UVec3, Vec2, Vec3};
    pub use penumbra_math::Aabb;

    // Error handling
    pub use crate::{Error, Result};
}
