//! Penumbra Math - geometric primitives shared by the distance field baker
//!
//! Everything here is plain `f32` math on top of [`glam`]:
//!
//! - [`Aabb`]: axis-aligned boxes with slab-based ray clipping
//! - [`Ray`] and [`ray_triangle`]: double-sided Möller–Trumbore intersection
//! - [`RandomStream`]: a tiny seeded generator whose output is stable across
//!   platforms, so baked volumes are reproducible bit for bit
//!
//! # Example
//!
//! ```rust
//! use glam::Vec3;
//! use penumbra_math::{Aabb, Ray};
//!
//! let bounds = Aabb::new(Vec3::splat(-1.0), Vec3::splat(1.0));
//! let ray = Ray::new(Vec3::new(-5.0, 0.0, 0.0), Vec3::X);
//! let (enter, exit) = bounds.clip_ray(&ray, 100.0).unwrap_or((0.0, 0.0));
//! assert!((enter - 4.0).abs() < 1e-6);
//! assert!((exit - 6.0).abs() < 1e-6);
//! ```

mod aabb;
mod random;
mod ray;

pub use aabb::Aabb;
pub use random::RandomStream;
pub use ray::{Ray, TriangleHit, ray_triangle};

/// Squared length below which a vector is treated as zero.
pub const SMALL_NUMBER: f32 = 1.0e-8;

/// General purpose tolerance used for "close to zero" comparisons.
pub const KINDA_SMALL_NUMBER: f32 = 1.0e-4;
