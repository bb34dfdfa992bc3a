//! Axis-aligned bounding boxes

use crate::Ray;
use glam::Vec3;

/// Axis-Aligned Bounding Box
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Aabb {
    pub min: Vec3,
    pub max: Vec3,
}

impl Default for Aabb {
    fn default() -> Self {
        Self::new(Vec3::ZERO, Vec3::ZERO)
    }
}

impl Aabb {
    /// An inverted box that any `union` or `include` replaces.
    pub const EMPTY: Self = Self {
        min: Vec3::splat(f32::MAX),
        max: Vec3::splat(f32::MIN),
    };

    pub fn new(min: Vec3, max: Vec3) -> Self {
        Self { min, max }
    }

    /// Create from center and half-extents
    pub fn from_center(center: Vec3, half_extents: Vec3) -> Self {
        Self::new(center - half_extents, center + half_extents)
    }

    /// Smallest box containing every point, or [`Aabb::EMPTY`] for no points
    pub fn from_points<I: IntoIterator<Item = Vec3>>(points: I) -> Self {
        points
            .into_iter()
            .fold(Self::EMPTY, |acc, p| acc.include(p))
    }

    /// Whether min <= max on every axis
    pub fn is_valid(&self) -> bool {
        self.min.cmple(self.max).all()
    }

    /// Grow the box to contain `p`
    pub fn include(&self, p: Vec3) -> Self {
        Self::new(self.min.min(p), self.max.max(p))
    }

    /// Merge two bounding boxes
    pub fn union(&self, other: &Aabb) -> Self {
        Self::new(self.min.min(other.min), self.max.max(other.max))
    }

    /// Full size along each axis
    pub fn size(&self) -> Vec3 {
        self.max - self.min
    }

    /// Half size along each axis
    pub fn extent(&self) -> Vec3 {
        self.size() * 0.5
    }

    pub fn center(&self) -> Vec3 {
        (self.min + self.max) * 0.5
    }

    /// Grow every side by the same margin
    pub fn expand(&self, margin: f32) -> Self {
        Self::new(self.min - Vec3::splat(margin), self.max + Vec3::splat(margin))
    }

    /// Index of the longest axis (0 = X, 1 = Y, 2 = Z)
    pub fn longest_axis(&self) -> usize {
        let size = self.size();
        if size.x >= size.y && size.x >= size.z {
            0
        } else if size.y >= size.z {
            1
        } else {
            2
        }
    }

    pub fn contains(&self, p: Vec3) -> bool {
        p.cmpge(self.min).all() && p.cmple(self.max).all()
    }

    /// Clip the segment `[0, max_t]` of `ray` against the box.
    ///
    /// Returns the entry and exit parameters, or `None` when the segment
    /// misses. Axes the ray runs parallel to only pass if the origin lies
    /// inside that slab.
    pub fn clip_ray(&self, ray: &Ray, max_t: f32) -> Option<(f32, f32)> {
        let origin = ray.origin.to_array();
        let inv = ray.inv_direction.to_array();
        let dir = ray.direction.to_array();
        let min = self.min.to_array();
        let max = self.max.to_array();

        let mut t_enter = 0.0_f32;
        let mut t_exit = max_t;

        for axis in 0..3 {
            if dir[axis].abs() < f32::EPSILON {
                if origin[axis] < min[axis] || origin[axis] > max[axis] {
                    return None;
                }
                continue;
            }

            let t0 = (min[axis] - origin[axis]) * inv[axis];
            let t1 = (max[axis] - origin[axis]) * inv[axis];
            let (near, far) = if t0 <= t1 { (t0, t1) } else { (t1, t0) };

            t_enter = t_enter.max(near);
            t_exit = t_exit.min(far);
            if t_enter > t_exit {
                return None;
            }
        }

        Some((t_enter, t_exit))
    }

    /// Whether the segment from `ray.origin` to `ray.at(max_t)` touches the box
    pub fn intersects_segment(&self, ray: &Ray, max_t: f32) -> bool {
        self.clip_ray(ray, max_t).is_some()
    }
}
