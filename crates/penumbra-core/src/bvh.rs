//! Bounding volume hierarchy for nearest-hit ray queries
//!
//! The tree is built once from the filtered build triangles and never
//! mutated afterwards; queries take `&self`, so any number of workers can
//! share one index without locking.

use crate::mesh::Material;
use glam::{Vec2, Vec3};
use penumbra_math::{Aabb, Ray, TriangleHit, ray_triangle};

/// Maximum triangles stored in a leaf before it is split.
const MAX_LEAF_SIZE: usize = 4;

/// A triangle as the spatial index sees it
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct BuildTriangle {
    pub vertices: [Vec3; 3],
    /// Per-vertex UVs; zero unless the material is alpha-tested
    pub uvs: [Vec2; 3],
    /// Index into the material list the index was built with
    pub material: u32,
    pub two_sided: bool,
}

impl BuildTriangle {
    /// Unit face normal, `(v1 - v2) x (v0 - v2)`
    pub fn normal(&self) -> Vec3 {
        let [v0, v1, v2] = self.vertices;
        (v1 - v2).cross(v0 - v2).normalize_or_zero()
    }

    pub fn bounds(&self) -> Aabb {
        Aabb::from_points(self.vertices)
    }

    pub fn centroid(&self) -> Vec3 {
        (self.vertices[0] + self.vertices[1] + self.vertices[2]) / 3.0
    }

    fn uv_at(&self, hit: &TriangleHit) -> Vec2 {
        self.uvs[0] * hit.w() + self.uvs[1] * hit.u + self.uvs[2] * hit.v
    }
}

/// Nearest intersection found by [`SpatialIndex::nearest_hit`]
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct RayHit {
    /// Hit distance as a fraction of the query's max distance
    pub time: f32,
    /// Face normal of the hit triangle
    pub normal: Vec3,
    pub material: u32,
    /// Copied from the hit triangle's own material
    pub two_sided: bool,
    /// Position of the triangle in [`SpatialIndex::triangles`]
    pub triangle: usize,
}

#[derive(Debug, Clone, Copy)]
enum NodeKind {
    Leaf { first: u32, count: u32 },
    Internal { left: u32, right: u32 },
}

#[derive(Debug, Clone, Copy)]
struct BvhNode {
    bounds: Aabb,
    kind: NodeKind,
}

/// Read-only triangle BVH
#[derive(Debug, Clone, Default)]
pub struct SpatialIndex {
    nodes: Vec<BvhNode>,
    triangles: Vec<BuildTriangle>,
    normals: Vec<Vec3>,
    materials: Vec<Material>,
}

impl SpatialIndex {
    /// Build the tree with median splits along the widest centroid axis.
    ///
    /// `materials` is consulted during queries for alpha testing; triangles
    /// whose material index is out of range are treated as opaque.
    pub fn build(triangles: Vec<BuildTriangle>, materials: &[Material]) -> Self {
        if triangles.is_empty() {
            return Self {
                materials: materials.to_vec(),
                ..Self::default()
            };
        }

        let bounds: Vec<Aabb> = triangles.iter().map(BuildTriangle::bounds).collect();
        let centroids: Vec<Vec3> = triangles.iter().map(BuildTriangle::centroid).collect();
        let mut order: Vec<u32> = (0..triangles.len() as u32).collect();

        let mut builder = TreeBuilder {
            nodes: Vec::with_capacity(2 * triangles.len() / MAX_LEAF_SIZE + 1),
            bounds: &bounds,
            centroids: &centroids,
        };
        builder.build(&mut order, 0);
        let nodes = builder.nodes;

        // Leaves address contiguous runs, so store triangles in tree order
        let triangles: Vec<BuildTriangle> = order.iter().map(|&i| triangles[i as usize]).collect();
        let normals = triangles.iter().map(BuildTriangle::normal).collect();

        Self {
            nodes,
            triangles,
            normals,
            materials: materials.to_vec(),
        }
    }

    pub fn is_empty(&self) -> bool {
        self.triangles.is_empty()
    }

    pub fn triangle_count(&self) -> usize {
        self.triangles.len()
    }

    pub fn node_count(&self) -> usize {
        self.nodes.len()
    }

    /// Triangles in tree order
    pub fn triangles(&self) -> &[BuildTriangle] {
        &self.triangles
    }

    /// Bounds of everything in the index
    pub fn bounds(&self) -> Option<Aabb> {
        self.nodes.first().map(|n| n.bounds)
    }

    /// Closest triangle hit along `ray` within `max_distance`.
    ///
    /// `ray.direction` must be unit length. Hits on alpha-tested triangles
    /// whose texel is below the material's reference are skipped and the
    /// search continues past them.
    pub fn nearest_hit(&self, ray: &Ray, max_distance: f32) -> Option<RayHit> {
        if self.nodes.is_empty() || max_distance <= 0.0 {
            return None;
        }

        let mut best_t = max_distance;
        let mut best: Option<usize> = None;
        let mut stack: Vec<u32> = Vec::with_capacity(32);
        stack.push(0);

        while let Some(node_index) = stack.pop() {
            let node = &self.nodes[node_index as usize];
            if node.bounds.clip_ray(ray, best_t).is_none() {
                continue;
            }

            match node.kind {
                NodeKind::Leaf { first, count } => {
                    let range = first as usize..(first + count) as usize;
                    for i in range {
                        let tri = &self.triangles[i];
                        let [v0, v1, v2] = tri.vertices;
                        let Some(hit) = ray_triangle(ray, v0, v1, v2) else {
                            continue;
                        };
                        if hit.t < best_t && self.blocks_ray(tri, &hit) {
                            best_t = hit.t;
                            best = Some(i);
                        }
                    }
                }
                NodeKind::Internal { left, right } => {
                    let near_left = self.entry_distance(left, ray, best_t);
                    let near_right = self.entry_distance(right, ray, best_t);

                    // Push the farther child first so the nearer one is visited next
                    match (near_left, near_right) {
                        (Some(l), Some(r)) if l <= r => {
                            stack.push(right);
                            stack.push(left);
                        }
                        (Some(_), Some(_)) => {
                            stack.push(left);
                            stack.push(right);
                        }
                        (Some(_), None) => stack.push(left),
                        (None, Some(_)) => stack.push(right),
                        (None, None) => {}
                    }
                }
            }
        }

        best.map(|i| {
            let tri = &self.triangles[i];
            RayHit {
                time: best_t / max_distance,
                normal: self.normals[i],
                material: tri.material,
                two_sided: tri.two_sided,
                triangle: i,
            }
        })
    }

    fn entry_distance(&self, node: u32, ray: &Ray, max_t: f32) -> Option<f32> {
        self.nodes[node as usize]
            .bounds
            .clip_ray(ray, max_t)
            .map(|(enter, _)| enter)
    }

    fn blocks_ray(&self, tri: &BuildTriangle, hit: &TriangleHit) -> bool {
        match self.materials.get(tri.material as usize) {
            Some(material) if material.alpha_test => material.is_opaque_at(tri.uv_at(hit)),
            _ => true,
        }
    }
}

struct TreeBuilder<'a> {
    nodes: Vec<BvhNode>,
    bounds: &'a [Aabb],
    centroids: &'a [Vec3],
}

impl TreeBuilder<'_> {
    /// Build the subtree for `items`, whose triangles will start at `first`
    /// in the final ordering. Returns the node index.
    fn build(&mut self, items: &mut [u32], first: usize) -> u32 {
        let node_bounds = items
            .iter()
            .fold(Aabb::EMPTY, |acc, &i| acc.union(&self.bounds[i as usize]));
        let index = self.nodes.len() as u32;
        let leaf = NodeKind::Leaf {
            first: first as u32,
            count: items.len() as u32,
        };

        if items.len() <= MAX_LEAF_SIZE {
            self.nodes.push(BvhNode {
                bounds: node_bounds,
                kind: leaf,
            });
            return index;
        }

        let centroid_bounds = Aabb::from_points(items.iter().map(|&i| self.centroids[i as usize]));
        let axis = centroid_bounds.longest_axis();
        if centroid_bounds.size()[axis] <= 0.0 {
            // All centroids coincide; no split can separate them
            self.nodes.push(BvhNode {
                bounds: node_bounds,
                kind: leaf,
            });
            return index;
        }

        let mid = items.len() / 2;
        let centroids = self.centroids;
        items.select_nth_unstable_by(mid, |&a, &b| {
            centroids[a as usize][axis].total_cmp(&centroids[b as usize][axis])
        });

        self.nodes.push(BvhNode {
            bounds: node_bounds,
            kind: leaf,
        });
        let (lo, hi) = items.split_at_mut(mid);
        let left = self.build(lo, first);
        let right = self.build(hi, first + mid);
        self.nodes[index as usize].kind = NodeKind::Internal { left, right };

        index
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;
    use crate::mesh::Texture;
    use approx::assert_relative_eq;
    use std::sync::Arc;

    /// Unit quad in the XY plane at height `z`, facing +Z
    fn quad(z: f32, material: u32, two_sided: bool) -> [BuildTriangle; 2] {
        let a = Vec3::new(-1.0, -1.0, z);
        let b = Vec3::new(1.0, -1.0, z);
        let c = Vec3::new(1.0, 1.0, z);
        let d = Vec3::new(-1.0, 1.0, z);
        let uv = [Vec2::new(0.0, 0.0), Vec2::new(1.0, 0.0), Vec2::new(1.0, 1.0)];
        [
            BuildTriangle {
                vertices: [c, b, a],
                uvs: [uv[2], uv[1], uv[0]],
                material,
                two_sided,
            },
            BuildTriangle {
                vertices: [d, c, a],
                uvs: [Vec2::new(0.0, 1.0), uv[2], uv[0]],
                material,
                two_sided,
            },
        ]
    }

    fn stack_of_quads(count: usize) -> Vec<BuildTriangle> {
        (0..count)
            .flat_map(|i| quad(i as f32, 0, false))
            .collect()
    }

    /// Reference answer by testing every triangle
    fn brute_force(tris: &[BuildTriangle], ray: &Ray, max_distance: f32) -> Option<f32> {
        tris.iter()
            .filter_map(|t| ray_triangle(ray, t.vertices[0], t.vertices[1], t.vertices[2]))
            .map(|h| h.t)
            .filter(|&t| t < max_distance)
            .min_by(f32::total_cmp)
    }

    #[test]
    fn empty_index_never_hits() {
        let index = SpatialIndex::build(Vec::new(), &[]);
        assert!(index.is_empty());
        assert!(index.bounds().is_none());
        let ray = Ray::new(Vec3::ZERO, Vec3::Z);
        assert!(index.nearest_hit(&ray, 10.0).is_none());
    }

    #[test]
    fn finds_nearest_of_stacked_quads() {
        let index = SpatialIndex::build(stack_of_quads(20), &[Material::opaque()]);
        assert_eq!(index.triangle_count(), 40);
        assert!(index.node_count() > 1);

        let ray = Ray::new(Vec3::new(0.1, 0.2, 7.5), Vec3::NEG_Z);
        let hit = index.nearest_hit(&ray, 100.0).unwrap();
        assert_relative_eq!(hit.time * 100.0, 0.5, epsilon = 1e-4);
        assert_relative_eq!(hit.normal.z, 1.0, epsilon = 1e-6);
    }

    #[test]
    fn respects_max_distance() {
        let index = SpatialIndex::build(stack_of_quads(3), &[Material::opaque()]);
        let ray = Ray::new(Vec3::new(0.0, 0.0, -1.0), Vec3::Z);
        assert!(index.nearest_hit(&ray, 0.5).is_none());
        assert!(index.nearest_hit(&ray, 1.5).is_some());
    }

    #[test]
    fn matches_brute_force_for_many_rays() {
        let tris = stack_of_quads(16);
        let index = SpatialIndex::build(tris.clone(), &[Material::opaque()]);
        let mut stream = penumbra_math::RandomStream::new(3);

        for _ in 0..500 {
            let origin = Vec3::new(
                stream.range(-2.0, 2.0),
                stream.range(-2.0, 2.0),
                stream.range(-2.0, 18.0),
            );
            let dir = Vec3::new(
                stream.range(-1.0, 1.0),
                stream.range(-1.0, 1.0),
                stream.range(-1.0, 1.0),
            )
            .normalize_or_zero();
            if dir == Vec3::ZERO {
                continue;
            }
            let ray = Ray::new(origin, dir);
            let expected = brute_force(&tris, &ray, 50.0);
            let got = index.nearest_hit(&ray, 50.0).map(|h| h.time * 50.0);
            match (expected, got) {
                (Some(e), Some(g)) => assert_relative_eq!(e, g, epsilon = 1e-3),
                (None, None) => {}
                other => panic!("bvh disagrees with brute force: {other:?}"),
            }
        }
    }

    #[test]
    fn reports_two_sided_flag_and_material() {
        let mut tris = quad(0.0, 1, true).to_vec();
        tris.extend(quad(5.0, 0, false));
        let index = SpatialIndex::build(tris, &[Material::opaque(), Material::opaque()]);

        let up = Ray::new(Vec3::new(0.0, 0.0, -1.0), Vec3::Z);
        let hit = index.nearest_hit(&up, 100.0);
        assert_eq!(hit.map(|h| (h.material, h.two_sided)), Some((1, true)));

        let down = Ray::new(Vec3::new(0.0, 0.0, 6.0), Vec3::NEG_Z);
        let hit = index.nearest_hit(&down, 100.0);
        assert_eq!(hit.map(|h| (h.material, h.two_sided)), Some((0, false)));
    }

    #[test]
    fn alpha_tested_cutout_lets_rays_through() {
        // 2x1 texture: u < 0.5 transparent, u >= 0.5 opaque
        let texture = Texture::new(2, 1, 1, vec![0, 255]).unwrap();
        let cutout = Material::opaque().with_alpha_test(128, Arc::new(texture));

        let mut tris = quad(0.0, 1, false).to_vec();
        tris.extend(quad(-3.0, 0, false));
        let index = SpatialIndex::build(tris, &[Material::opaque(), cutout]);

        // u = (x + 1) / 2, so x < 0 lands on the transparent half
        let through = Ray::new(Vec3::new(-0.5, 0.0, 1.0), Vec3::NEG_Z);
        let hit = index.nearest_hit(&through, 100.0);
        assert_relative_eq!(hit.unwrap().time * 100.0, 4.0, epsilon = 1e-4);

        let blocked = Ray::new(Vec3::new(0.5, 0.0, 1.0), Vec3::NEG_Z);
        let hit = index.nearest_hit(&blocked, 100.0);
        assert_relative_eq!(hit.unwrap().time * 100.0, 1.0, epsilon = 1e-4);
    }
}
