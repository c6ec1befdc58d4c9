//! Ray casting against bodies and shapes.
//!
//! A [`Ray`] is a segment from `from` to `to`. Every surface crossing it finds
//! is reported with a world-space point and outward normal, and the
//! [`RayMode`] decides which of those ends up in the [`RaycastResult`].

use alloc::vec::Vec;

// ComplexField provides sqrt() for f32 in no_std via libm
#[allow(unused_imports)]
use nalgebra::ComplexField;

use crate::aabb::Aabb;
use crate::body::{Body, BodyHandle, ShapeId};
use crate::math::{closest_point_on_segment, point_in_polygon, Quat, Vec3};
use crate::shape::{ConvexPolyhedron, Heightfield, Plane, Shape, Trimesh};

/// Parallel rays and degenerate triangles below this are ignored.
const PRECISION: f32 = 1e-6;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum RayMode {
    /// Keep the hit nearest to `from`.
    #[default]
    Closest,
    /// Stop at the first hit found, whichever it is.
    Any,
    /// Report every hit through a callback.
    All,
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct RayOptions {
    pub collision_filter_mask: u32,
    pub collision_filter_group: u32,
    /// Ignore surfaces whose normal points along the ray.
    pub skip_backfaces: bool,
    /// Ignore bodies with `collision_response == false`.
    pub check_collision_response: bool,
}

impl Default for RayOptions {
    fn default() -> Self {
        Self {
            collision_filter_mask: u32::MAX,
            collision_filter_group: u32::MAX,
            skip_backfaces: false,
            check_collision_response: true,
        }
    }
}

impl RayOptions {
    pub fn with_collision_filter(mut self, group: u32, mask: u32) -> Self {
        self.collision_filter_group = group;
        self.collision_filter_mask = mask;
        self
    }

    pub fn with_skip_backfaces(mut self, skip: bool) -> Self {
        self.skip_backfaces = skip;
        self
    }

    pub fn with_check_collision_response(mut self, check: bool) -> Self {
        self.check_collision_response = check;
        self
    }
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct RaycastResult {
    pub ray_from_world: Vec3,
    pub ray_to_world: Vec3,
    pub hit_normal_world: Vec3,
    pub hit_point_world: Vec3,
    pub has_hit: bool,
    pub body: Option<BodyHandle>,
    pub shape: Option<ShapeId>,
    /// Hull face, heightfield triangle or mesh triangle that was hit.
    pub hit_face_index: Option<usize>,
    /// Distance from `ray_from_world`; infinite without a hit.
    pub distance: f32,
}

impl Default for RaycastResult {
    fn default() -> Self {
        Self {
            ray_from_world: Vec3::zeros(),
            ray_to_world: Vec3::zeros(),
            hit_normal_world: Vec3::zeros(),
            hit_point_world: Vec3::zeros(),
            has_hit: false,
            body: None,
            shape: None,
            hit_face_index: None,
            distance: f32::INFINITY,
        }
    }
}

impl RaycastResult {
    pub fn reset(&mut self) {
        *self = Self::default();
    }
}

/// Where a hit came from, passed down to the result.
#[derive(Debug, Clone, Copy)]
struct HitSource {
    body: Option<BodyHandle>,
    shape: Option<ShapeId>,
}

#[derive(Debug, Clone)]
pub struct Ray {
    pub from: Vec3,
    pub to: Vec3,
    pub mode: RayMode,
    pub options: RayOptions,
    pub result: RaycastResult,
    direction: Vec3,
    length: f32,
    terminated: bool,
    triangles: Vec<usize>,
    polygon: Vec<Vec3>,
}

impl Ray {
    pub fn new(from: Vec3, to: Vec3, mode: RayMode, options: RayOptions) -> Self {
        let mut ray = Self {
            from,
            to,
            mode,
            options,
            result: RaycastResult::default(),
            direction: Vec3::zeros(),
            length: 0.0,
            terminated: false,
            triangles: Vec::new(),
            polygon: Vec::new(),
        };
        ray.reset();
        ray
    }

    /// Clear the result and recompute the direction after `from`/`to` changed.
    pub fn reset(&mut self) {
        let d = self.to - self.from;
        self.length = d.norm();
        self.direction = if self.length > 0.0 { d / self.length } else { Vec3::zeros() };
        self.terminated = false;
        self.result.reset();
        self.result.ray_from_world = self.from;
        self.result.ray_to_world = self.to;
    }

    pub fn direction(&self) -> Vec3 {
        self.direction
    }

    pub fn length(&self) -> f32 {
        self.length
    }

    /// Whether an [`RayMode::Any`] ray already found its hit.
    pub fn is_terminated(&self) -> bool {
        self.terminated
    }

    /// Box enclosing the whole segment.
    pub fn aabb(&self) -> Aabb {
        Aabb::from_points([self.from, self.to].iter())
    }

    /// Cast against every shape of `body`, honoring the filter options.
    pub fn intersect_body<F: FnMut(&RaycastResult)>(&mut self, body: &Body, on_hit: &mut F) {
        if self.terminated {
            return;
        }
        let o = &self.options;
        if o.check_collision_response && !body.collision_response {
            return;
        }
        if o.collision_filter_group & body.collision_filter_mask == 0
            || body.collision_filter_group & o.collision_filter_mask == 0
        {
            return;
        }
        for slot in body.shapes() {
            let (pos, quat) = body.shape_world_pose(slot);
            let source = HitSource {
                body: body.handle(),
                shape: Some(slot.id()),
            };
            self.cast_shape(&slot.shape, &pos, &quat, source, on_hit);
            if self.terminated {
                return;
            }
        }
    }

    /// Cast against a single posed shape that belongs to no body.
    pub fn intersect_shape<F: FnMut(&RaycastResult)>(&mut self, shape: &Shape, position: &Vec3, quaternion: &Quat, on_hit: &mut F) {
        let source = HitSource { body: None, shape: None };
        self.cast_shape(shape, position, quaternion, source, on_hit);
    }

    fn cast_shape<F: FnMut(&RaycastResult)>(&mut self, shape: &Shape, pos: &Vec3, quat: &Quat, source: HitSource, on_hit: &mut F) {
        if self.length <= 0.0 {
            return;
        }
        let closest = closest_point_on_segment(&self.from, &self.to, pos);
        if (closest - pos).norm() > shape.bounding_sphere_radius() {
            return;
        }
        match shape {
            Shape::Sphere(s) => self.cast_sphere(s.radius, pos, source, on_hit),
            Shape::Plane(_) => self.cast_plane(pos, quat, source, on_hit),
            Shape::Heightfield(hf) => self.cast_heightfield(hf, pos, quat, source, on_hit),
            Shape::Trimesh(mesh) => self.cast_trimesh(mesh, pos, quat, source, on_hit),
            Shape::Particle => {}
            other => {
                if let Some(hull) = other.hull() {
                    self.cast_hull(hull, pos, quat, source, on_hit);
                }
            }
        }
    }

    fn cast_sphere<F: FnMut(&RaycastResult)>(&mut self, radius: f32, center: &Vec3, source: HitSource, on_hit: &mut F) {
        // |from + t·d - c|² = r² with unit d.
        let m = self.from - center;
        let b = m.dot(&self.direction);
        let c = m.norm_squared() - radius * radius;
        let disc = b * b - c;
        if disc < 0.0 {
            return;
        }
        let root = disc.sqrt();
        for t in [-b - root, -b + root] {
            if t < 0.0 || t > self.length {
                continue;
            }
            let point = self.from + self.direction * t;
            let normal = (point - center) / radius;
            self.report(point, normal, None, source, on_hit);
            if self.terminated || root == 0.0 {
                return;
            }
        }
    }

    fn cast_plane<F: FnMut(&RaycastResult)>(&mut self, pos: &Vec3, quat: &Quat, source: HitSource, on_hit: &mut F) {
        let normal = Plane::world_normal(quat);
        let side_from = (self.from - pos).dot(&normal);
        let side_to = (self.to - pos).dot(&normal);
        if side_from * side_to > 0.0 {
            return;
        }
        let denom = normal.dot(&self.direction);
        if denom.abs() < PRECISION {
            return;
        }
        let t = -side_from / denom;
        let point = self.from + self.direction * t;
        self.report(point, normal, None, source, on_hit);
    }

    fn cast_hull<F: FnMut(&RaycastResult)>(
        &mut self,
        hull: &ConvexPolyhedron,
        pos: &Vec3,
        quat: &Quat,
        source: HitSource,
        on_hit: &mut F,
    ) {
        // Work in hull space; the polygon test then needs no transformed vertices.
        let from = quat.inverse_transform_vector(&(self.from - pos));
        let dir = quat.inverse_transform_vector(&self.direction);

        for (fi, (face, n)) in hull.faces().iter().zip(hull.face_normals()).enumerate() {
            let denom = n.dot(&dir);
            if denom.abs() < PRECISION {
                continue;
            }
            let t = (hull.vertices()[face[0]] - from).dot(n) / denom;
            if t < 0.0 || t > self.length {
                continue;
            }
            let local_point = from + dir * t;
            self.polygon.clear();
            self.polygon.extend(face.iter().map(|&i| hull.vertices()[i]));
            if !point_in_polygon(&self.polygon, n, &local_point) {
                continue;
            }
            self.report(pos + quat * local_point, quat * n, Some(fi), source, on_hit);
            if self.terminated {
                return;
            }
        }
    }

    fn cast_heightfield<F: FnMut(&RaycastResult)>(
        &mut self,
        hf: &Heightfield,
        pos: &Vec3,
        quat: &Quat,
        source: HitSource,
        on_hit: &mut F,
    ) {
        let from = quat.inverse_transform_vector(&(self.from - pos));
        let to = quat.inverse_transform_vector(&(self.to - pos));
        let dir = quat.inverse_transform_vector(&self.direction);
        let footprint = Aabb::from_points([from, to].iter());
        let range = match hf.cell_range(&footprint) {
            Some(range) => range,
            None => return,
        };

        for i in range.i0..=range.i1 {
            for j in range.j0..=range.j1 {
                for (k, upper) in [false, true].into_iter().enumerate() {
                    let tri = hf.triangle(i, j, upper);
                    let Some(t) = ray_triangle(&from, &dir, self.length, &tri) else {
                        continue;
                    };
                    let mut n = (tri[1] - tri[0]).cross(&(tri[2] - tri[0])).normalize();
                    if n.y < 0.0 {
                        n = -n;
                    }
                    let face = 2 * (i * (hf.cols() - 1) + j) + k;
                    self.report(pos + quat * (from + dir * t), quat * n, Some(face), source, on_hit);
                    if self.terminated {
                        return;
                    }
                }
            }
        }
    }

    fn cast_trimesh<F: FnMut(&RaycastResult)>(
        &mut self,
        mesh: &Trimesh,
        pos: &Vec3,
        quat: &Quat,
        source: HitSource,
        on_hit: &mut F,
    ) {
        let from = quat.inverse_transform_vector(&(self.from - pos));
        let to = quat.inverse_transform_vector(&(self.to - pos));
        let dir = quat.inverse_transform_vector(&self.direction);

        let mut triangles = core::mem::take(&mut self.triangles);
        triangles.clear();
        mesh.triangles_in_aabb(&Aabb::from_points([from, to].iter()), &mut triangles);
        for &t in triangles.iter() {
            let Some(dist) = ray_triangle(&from, &dir, self.length, &mesh.triangle(t)) else {
                continue;
            };
            self.report(pos + quat * (from + dir * dist), quat * mesh.normal(t), Some(t), source, on_hit);
            if self.terminated {
                break;
            }
        }
        self.triangles = triangles;
    }

    fn report<F: FnMut(&RaycastResult)>(
        &mut self,
        point: Vec3,
        normal: Vec3,
        face: Option<usize>,
        source: HitSource,
        on_hit: &mut F,
    ) {
        if self.options.skip_backfaces && normal.dot(&self.direction) > 0.0 {
            return;
        }
        let distance = (point - self.from).norm();
        if self.mode == RayMode::Closest && self.result.has_hit && distance >= self.result.distance {
            return;
        }

        let r = &mut self.result;
        r.hit_point_world = point;
        r.hit_normal_world = normal;
        r.hit_face_index = face;
        r.body = source.body;
        r.shape = source.shape;
        r.distance = distance;
        r.has_hit = true;

        match self.mode {
            RayMode::All => on_hit(&self.result),
            RayMode::Any => self.terminated = true,
            RayMode::Closest => {}
        }
    }
}

/// Möller–Trumbore: distance along unit `dir` to the triangle, within `max`.
/// Both sides of the triangle count.
fn ray_triangle(from: &Vec3, dir: &Vec3, max: f32, tri: &[Vec3; 3]) -> Option<f32> {
    let e1 = tri[1] - tri[0];
    let e2 = tri[2] - tri[0];
    let p = dir.cross(&e2);
    let det = e1.dot(&p);
    if det.abs() < PRECISION {
        return None;
    }
    let inv = 1.0 / det;
    let s = from - tri[0];
    let u = s.dot(&p) * inv;
    if !(0.0..=1.0).contains(&u) {
        return None;
    }
    let q = s.cross(&e1);
    let v = dir.dot(&q) * inv;
    if v < 0.0 || u + v > 1.0 {
        return None;
    }
    let t = e2.dot(&q) * inv;
    (0.0..=max).contains(&t).then_some(t)
}

#[cfg(test)]
mod tests {
    extern crate std;
    use super::*;
    use std::vec;

    const EPSILON: f32 = 1e-4;

    fn approx_eq(a: f32, b: f32) -> bool {
        (a - b).abs() < EPSILON
    }

    fn approx_vec_eq(a: &Vec3, b: &Vec3) -> bool {
        approx_eq(a.x, b.x) && approx_eq(a.y, b.y) && approx_eq(a.z, b.z)
    }

    fn down_ray(x: f32, z: f32, mode: RayMode) -> Ray {
        Ray::new(Vec3::new(x, 10.0, z), Vec3::new(x, -10.0, z), mode, RayOptions::default())
    }

    fn ignore(_: &RaycastResult) {}

    #[test]
    fn test_sphere_closest_hit() {
        let mut ray = down_ray(0.0, 0.0, RayMode::Closest);
        let sphere = Shape::sphere(1.0).unwrap();
        ray.intersect_shape(&sphere, &Vec3::zeros(), &Quat::identity(), &mut ignore);
        assert!(ray.result.has_hit);
        assert!(approx_vec_eq(&ray.result.hit_point_world, &Vec3::y()));
        assert!(approx_vec_eq(&ray.result.hit_normal_world, &Vec3::y()));
        assert!(approx_eq(ray.result.distance, 9.0));
    }

    #[test]
    fn test_sphere_all_reports_entry_and_exit() {
        let mut ray = down_ray(0.0, 0.0, RayMode::All);
        let mut hits = vec![];
        ray.intersect_shape(&Shape::sphere(1.0).unwrap(), &Vec3::zeros(), &Quat::identity(), &mut |r: &RaycastResult| {
            hits.push(r.hit_point_world)
        });
        assert_eq!(hits.len(), 2);
        assert!(approx_vec_eq(&hits[1], &-Vec3::y()));
    }

    #[test]
    fn test_backfaces_skipped_from_inside() {
        let mut ray = Ray::new(
            Vec3::zeros(),
            Vec3::new(0.0, 5.0, 0.0),
            RayMode::Closest,
            RayOptions::default().with_skip_backfaces(true),
        );
        ray.intersect_shape(&Shape::sphere(1.0).unwrap(), &Vec3::zeros(), &Quat::identity(), &mut ignore);
        assert!(!ray.result.has_hit);
    }

    #[test]
    fn test_plane_hit_and_miss() {
        let mut ray = down_ray(3.0, 4.0, RayMode::Closest);
        ray.intersect_shape(&Shape::plane(), &Vec3::new(0.0, -1.0, 0.0), &Quat::identity(), &mut ignore);
        assert!(approx_vec_eq(&ray.result.hit_point_world, &Vec3::new(3.0, -1.0, 4.0)));

        let mut short = Ray::new(Vec3::new(0.0, 5.0, 0.0), Vec3::new(0.0, 1.0, 0.0), RayMode::Closest, RayOptions::default());
        short.intersect_shape(&Shape::plane(), &Vec3::zeros(), &Quat::identity(), &mut ignore);
        assert!(!short.result.has_hit);
    }

    #[test]
    fn test_rotated_box_face() {
        let q = Quat::from_axis_angle(&Vec3::y_axis(), 0.3);
        let mut ray = down_ray(0.1, 0.2, RayMode::Closest);
        ray.intersect_shape(&Shape::cuboid(Vec3::new(1.0, 0.5, 1.0)).unwrap(), &Vec3::zeros(), &q, &mut ignore);
        assert!(ray.result.has_hit);
        assert!(approx_eq(ray.result.hit_point_world.y, 0.5));
        assert!(approx_vec_eq(&ray.result.hit_normal_world, &Vec3::y()));
        assert!(ray.result.hit_face_index.is_some());
    }

    #[test]
    fn test_cylinder_with_many_segments_hits_top_cap() {
        let cylinder = Shape::cylinder(1.0, 1.0, 2.0, 100).unwrap();
        for k in 0..16 {
            let angle = k as f32 * core::f32::consts::TAU / 16.0;
            let (x, z) = (0.5 * angle.cos(), 0.5 * angle.sin());
            let mut ray = down_ray(x, z, RayMode::Closest);
            ray.intersect_shape(&cylinder, &Vec3::zeros(), &Quat::identity(), &mut ignore);
            assert!(ray.result.has_hit);
            assert!(approx_eq(ray.result.hit_point_world.y, 1.0), "ray {} hit y = {}", k, ray.result.hit_point_world.y);
            assert!(approx_vec_eq(&ray.result.hit_normal_world, &Vec3::y()));
        }
    }

    /// A prism whose caps are `sides`-gons of radius 1, spanning y in [-0.5, 0.5].
    fn prism(sides: usize) -> ConvexPolyhedron {
        let mut vertices = vec![];
        for y in [-0.5, 0.5] {
            for i in 0..sides {
                let angle = i as f32 * core::f32::consts::TAU / sides as f32;
                vertices.push(Vec3::new(angle.cos(), y, angle.sin()));
            }
        }
        let mut faces = vec![(0..sides).rev().collect::<std::vec::Vec<_>>(), (sides..2 * sides).collect()];
        for i in 0..sides {
            let j = (i + 1) % sides;
            faces.push(vec![i, j, sides + j, sides + i]);
        }
        ConvexPolyhedron::new(vertices, faces).unwrap()
    }

    #[test]
    fn test_convex_hull_with_large_faces() {
        let hull = Shape::ConvexPolyhedron(prism(80));
        let pos = Vec3::new(0.0, 2.0, 0.0);
        for (x, z) in [(0.6, 0.6), (-0.65, 0.2), (0.0, -0.9), (0.1, 0.1)] {
            let mut ray = down_ray(x, z, RayMode::Closest);
            ray.intersect_shape(&hull, &pos, &Quat::identity(), &mut ignore);
            assert!(ray.result.has_hit);
            assert!(approx_eq(ray.result.hit_point_world.y, 2.5), "({}, {}) hit y = {}", x, z, ray.result.hit_point_world.y);
        }

        let mut all = down_ray(0.6, 0.6, RayMode::All);
        let mut ys = vec![];
        all.intersect_shape(&hull, &pos, &Quat::identity(), &mut |r: &RaycastResult| ys.push(r.hit_point_world.y));
        assert_eq!(ys.len(), 2);
        assert!(ys.iter().any(|y| approx_eq(*y, 1.5)));
    }

    #[test]
    fn test_heightfield_ramp() {
        let hf = Heightfield::new(vec![vec![0.0; 3], vec![1.0; 3], vec![2.0; 3]], 1.0).unwrap();
        let mut ray = down_ray(1.5, 0.3, RayMode::Closest);
        ray.intersect_shape(&Shape::Heightfield(hf), &Vec3::zeros(), &Quat::identity(), &mut ignore);
        assert!(ray.result.has_hit);
        assert!(approx_eq(ray.result.hit_point_world.y, 1.5));
        assert!(ray.result.hit_normal_world.y > 0.0);
    }

    #[test]
    fn test_trimesh_triangle() {
        let mesh = Trimesh::new(
            vec![Vec3::new(0.0, 0.0, 0.0), Vec3::new(0.0, 0.0, 1.0), Vec3::new(1.0, 0.0, 0.0)],
            &[0, 1, 2],
        )
        .unwrap();
        let shape = Shape::Trimesh(mesh);
        let mut ray = down_ray(0.2, 0.2, RayMode::Any);
        ray.intersect_shape(&shape, &Vec3::new(0.0, 2.0, 0.0), &Quat::identity(), &mut ignore);
        assert!(ray.is_terminated());
        assert_eq!(ray.result.hit_face_index, Some(0));
        assert!(approx_eq(ray.result.hit_point_world.y, 2.0));

        let mut miss = down_ray(0.8, 0.8, RayMode::Closest);
        miss.intersect_shape(&shape, &Vec3::new(0.0, 2.0, 0.0), &Quat::identity(), &mut ignore);
        assert!(!miss.result.has_hit);
    }

    #[test]
    fn test_body_filters() {
        let body = Body::new(1.0)
            .with_shape(Shape::sphere(1.0).unwrap())
            .with_collision_filter(2, u32::MAX);
        let mut ray = down_ray(0.0, 0.0, RayMode::Closest);
        ray.options = RayOptions::default().with_collision_filter(u32::MAX, 1);
        ray.intersect_body(&body, &mut ignore);
        assert!(!ray.result.has_hit);

        ray.options = RayOptions::default().with_collision_filter(u32::MAX, 2);
        ray.intersect_body(&body, &mut ignore);
        assert!(ray.result.has_hit);
        assert_eq!(ray.result.shape, Some(body.shapes()[0].id()));

        let ghost = Body::new(1.0)
            .with_shape(Shape::sphere(1.0).unwrap())
            .with_collision_response(false);
        let mut ray = down_ray(0.0, 0.0, RayMode::Closest);
        ray.intersect_body(&ghost, &mut ignore);
        assert!(!ray.result.has_hit);
    }
}
