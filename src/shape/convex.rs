//! Convex polyhedra: the shared hull representation behind boxes,
//! cylinders, heightfield pillars and user-supplied convex shapes.
//!
//! Hull–hull contact uses the Separating Axis Theorem over face normals and
//! edge cross products, then clips the incident face of one hull against the
//! side planes of the reference face of the other (Sutherland–Hodgman).

use alloc::vec::Vec;

use log::warn;

// ComplexField provides sqrt()/abs() for f32 in no_std via libm
#[allow(unused_imports)]
use nalgebra::ComplexField;

use crate::aabb::Aabb;
use crate::error::{PhysicsError, Result};
use crate::math::{Quat, Vec3};

/// Parallel-direction tolerance used when deduplicating edges and axes.
const PARALLEL_EPS: f32 = 1e-6;

/// A closed convex polyhedron with outward, counter-clockwise wound faces.
#[derive(Debug, Clone, PartialEq)]
pub struct ConvexPolyhedron {
    vertices: Vec<Vec3>,
    faces: Vec<Vec<usize>>,
    face_normals: Vec<Vec3>,
    unique_edges: Vec<Vec3>,
    unique_axes: Vec<Vec3>,
    bounding_radius: f32,
}

/// Scratch polygons reused by [`ConvexPolyhedron::clip_against_hull`].
#[derive(Debug, Default, Clone)]
pub struct ClipBuffers {
    input: Vec<Vec3>,
    output: Vec<Vec3>,
}

impl ConvexPolyhedron {
    /// Build a hull from vertices and polygonal faces (vertex index lists).
    ///
    /// Faces pointing into the hull are re-wound so every normal faces outward.
    pub fn new(vertices: Vec<Vec3>, faces: Vec<Vec<usize>>) -> Result<Self> {
        for (i, face) in faces.iter().enumerate() {
            if face.len() < 3 {
                return Err(PhysicsError::DegenerateFace { face: i, count: face.len() });
            }
            if let Some(&bad) = face.iter().find(|&&v| v >= vertices.len()) {
                return Err(PhysicsError::IndexOutOfRange {
                    element: i,
                    index: bad,
                    vertex_count: vertices.len(),
                });
            }
        }

        let mut hull = Self {
            vertices,
            faces,
            face_normals: Vec::new(),
            unique_edges: Vec::new(),
            unique_axes: Vec::new(),
            bounding_radius: 0.0,
        };
        let flipped = hull.rebuild();
        if flipped > 0 {
            warn!("ConvexPolyhedron: {} face(s) were wound inward and have been flipped", flipped);
        }
        Ok(hull)
    }

    /// Box hull with the given half extents, centered on the origin.
    pub(crate) fn cuboid(half_extents: &Vec3) -> Self {
        let (x, y, z) = (half_extents.x, half_extents.y, half_extents.z);
        let vertices = alloc::vec![
            Vec3::new(-x, -y, -z),
            Vec3::new(x, -y, -z),
            Vec3::new(x, y, -z),
            Vec3::new(-x, y, -z),
            Vec3::new(-x, -y, z),
            Vec3::new(x, -y, z),
            Vec3::new(x, y, z),
            Vec3::new(-x, y, z),
        ];
        let faces = alloc::vec![
            alloc::vec![3, 2, 1, 0],
            alloc::vec![4, 5, 6, 7],
            alloc::vec![5, 4, 0, 1],
            alloc::vec![2, 3, 7, 6],
            alloc::vec![0, 4, 7, 3],
            alloc::vec![1, 2, 6, 5],
        ];
        Self::from_parts(vertices, faces)
    }

    /// Cylinder (or frustum) hull along the local Y axis.
    pub(crate) fn cylinder(radius_top: f32, radius_bottom: f32, height: f32, segments: usize) -> Self {
        let half = 0.5 * height;
        let mut vertices = Vec::with_capacity(2 * segments);
        for i in 0..segments {
            let theta = 2.0 * core::f32::consts::PI * i as f32 / segments as f32;
            let (s, c) = (theta.sin(), theta.cos());
            vertices.push(Vec3::new(radius_bottom * c, -half, radius_bottom * s));
            vertices.push(Vec3::new(radius_top * c, half, radius_top * s));
        }

        let mut faces = Vec::with_capacity(segments + 2);
        let bottom: Vec<usize> = (0..segments).map(|i| 2 * i).collect();
        let top: Vec<usize> = (0..segments).rev().map(|i| 2 * i + 1).collect();
        faces.push(bottom);
        faces.push(top);
        for i in 0..segments {
            let j = (i + 1) % segments;
            faces.push(alloc::vec![2 * i, 2 * i + 1, 2 * j + 1, 2 * j]);
        }
        Self::from_parts(vertices, faces)
    }

    /// Six-vertex prism below one heightfield triangle, reusing this hull's storage.
    ///
    /// Vertices are stored relative to the prism's centroid, which is returned.
    pub(crate) fn set_triangle_pillar(&mut self, top: [Vec3; 3], bottom_y: f32) -> Vec3 {
        let bottom = top.map(|v| Vec3::new(v.x, bottom_y, v.z));
        let centroid = (top.iter().sum::<Vec3>() + bottom.iter().sum::<Vec3>()) / 6.0;
        self.vertices.clear();
        self.vertices.extend(top.iter().chain(bottom.iter()).map(|v| v - centroid));
        if self.faces.len() != 5 {
            self.faces.clear();
            self.faces.push(alloc::vec![0, 1, 2]);
            self.faces.push(alloc::vec![5, 4, 3]);
            self.faces.push(alloc::vec![0, 3, 4, 1]);
            self.faces.push(alloc::vec![1, 4, 5, 2]);
            self.faces.push(alloc::vec![2, 5, 3, 0]);
        }
        self.rebuild();
        centroid
    }

    /// An empty hull used as a reusable pillar buffer.
    pub(crate) fn empty() -> Self {
        Self {
            vertices: Vec::new(),
            faces: Vec::new(),
            face_normals: Vec::new(),
            unique_edges: Vec::new(),
            unique_axes: Vec::new(),
            bounding_radius: 0.0,
        }
    }

    fn from_parts(vertices: Vec<Vec3>, faces: Vec<Vec<usize>>) -> Self {
        let mut hull = Self {
            vertices,
            faces,
            face_normals: Vec::new(),
            unique_edges: Vec::new(),
            unique_axes: Vec::new(),
            bounding_radius: 0.0,
        };
        hull.rebuild();
        hull
    }

    /// Recompute normals, edges, axes and the bounding radius.
    /// Returns the number of faces that had to be re-wound.
    fn rebuild(&mut self) -> usize {
        let flipped = self.compute_normals();
        self.compute_edges();
        self.compute_axes();
        self.bounding_radius = self.vertices.iter().map(|v| v.norm()).fold(0.0, f32::max);
        flipped
    }

    fn compute_normals(&mut self) -> usize {
        let centroid = if self.vertices.is_empty() {
            Vec3::zeros()
        } else {
            self.vertices.iter().sum::<Vec3>() / self.vertices.len() as f32
        };

        self.face_normals.clear();
        let mut flipped = 0;
        for face in self.faces.iter_mut() {
            // Newell's method tolerates collinear leading vertices.
            let mut n = Vec3::zeros();
            let mut face_center = Vec3::zeros();
            for (k, &i) in face.iter().enumerate() {
                let a = self.vertices[i];
                let b = self.vertices[face[(k + 1) % face.len()]];
                n.x += (a.y - b.y) * (a.z + b.z);
                n.y += (a.z - b.z) * (a.x + b.x);
                n.z += (a.x - b.x) * (a.y + b.y);
                face_center += a;
            }
            face_center /= face.len() as f32;
            let len = n.norm();
            if len > 0.0 {
                n /= len;
            }
            if n.dot(&(face_center - centroid)) < 0.0 {
                n = -n;
                face.reverse();
                flipped += 1;
            }
            self.face_normals.push(n);
        }
        flipped
    }

    fn compute_edges(&mut self) {
        self.unique_edges.clear();
        for face in self.faces.iter() {
            for k in 0..face.len() {
                let e = self.vertices[face[(k + 1) % face.len()]] - self.vertices[face[k]];
                let len = e.norm();
                if len <= PARALLEL_EPS {
                    continue;
                }
                let e = e / len;
                push_unique_direction(&mut self.unique_edges, e);
            }
        }
    }

    fn compute_axes(&mut self) {
        self.unique_axes.clear();
        for n in self.face_normals.iter() {
            push_unique_direction(&mut self.unique_axes, *n);
        }
    }

    pub fn vertices(&self) -> &[Vec3] {
        &self.vertices
    }

    pub fn faces(&self) -> &[Vec<usize>] {
        &self.faces
    }

    pub fn face_normals(&self) -> &[Vec3] {
        &self.face_normals
    }

    pub fn unique_edges(&self) -> &[Vec3] {
        &self.unique_edges
    }

    pub fn unique_axes(&self) -> &[Vec3] {
        &self.unique_axes
    }

    pub fn bounding_sphere_radius(&self) -> f32 {
        self.bounding_radius
    }

    pub fn local_aabb(&self) -> Aabb {
        Aabb::from_points(self.vertices.iter())
    }

    /// World AABB from every transformed vertex.
    pub fn world_aabb(&self, position: &Vec3, quaternion: &Quat) -> Aabb {
        let mut aabb = Aabb::EMPTY;
        for v in self.vertices.iter() {
            aabb.extend_point(&(position + quaternion * v));
        }
        aabb
    }

    /// Box approximation of the inertia of the local bounding box.
    pub fn local_inertia(&self, mass: f32) -> Vec3 {
        box_inertia(&self.local_aabb().half_extents(), mass)
    }

    /// Whether the local point `p` is inside or on the hull.
    pub fn contains_local_point(&self, p: &Vec3) -> bool {
        self.faces.iter().zip(self.face_normals.iter()).all(|(face, n)| {
            let v = self.vertices[face[0]];
            n.dot(&(p - v)) <= 0.0
        })
    }

    /// Project the hull placed at `position`/`quaternion` onto a world axis.
    pub fn project(&self, axis: &Vec3, position: &Vec3, quaternion: &Quat) -> (f32, f32) {
        let local_axis = quaternion.inverse_transform_vector(axis);
        let offset = position.dot(axis);
        let mut min = f32::INFINITY;
        let mut max = f32::NEG_INFINITY;
        for v in self.vertices.iter() {
            let d = v.dot(&local_axis);
            min = min.min(d);
            max = max.max(d);
        }
        (min + offset, max + offset)
    }

    /// Overlap depth of the two hulls along `axis`, or `None` if it separates them.
    pub fn test_separating_axis(
        &self,
        other: &ConvexPolyhedron,
        axis: &Vec3,
        pos_a: &Vec3,
        quat_a: &Quat,
        pos_b: &Vec3,
        quat_b: &Quat,
    ) -> Option<f32> {
        let (min_a, max_a) = self.project(axis, pos_a, quat_a);
        let (min_b, max_b) = other.project(axis, pos_b, quat_b);
        if max_a < min_b || max_b < min_a {
            return None;
        }
        let d0 = max_a - min_b;
        let d1 = max_b - min_a;
        Some(d0.min(d1))
    }

    /// SAT search. Returns the axis of minimum overlap oriented from this hull
    /// toward `other`, or `None` if some axis separates the hulls.
    pub fn find_separating_axis(
        &self,
        other: &ConvexPolyhedron,
        pos_a: &Vec3,
        quat_a: &Quat,
        pos_b: &Vec3,
        quat_b: &Quat,
    ) -> Option<Vec3> {
        let mut best = Vec3::zeros();
        let mut dmin = f32::INFINITY;

        for axis in self.unique_axes.iter() {
            let world = quat_a * axis;
            let d = self.test_separating_axis(other, &world, pos_a, quat_a, pos_b, quat_b)?;
            if d < dmin {
                dmin = d;
                best = world;
            }
        }

        for axis in other.unique_axes.iter() {
            let world = quat_b * axis;
            let d = self.test_separating_axis(other, &world, pos_a, quat_a, pos_b, quat_b)?;
            if d < dmin {
                dmin = d;
                best = world;
            }
        }

        for ea in self.unique_edges.iter() {
            let world_a = quat_a * ea;
            for eb in other.unique_edges.iter() {
                let world_b = quat_b * eb;
                let cross = world_a.cross(&world_b);
                let len = cross.norm();
                if len <= PARALLEL_EPS {
                    continue;
                }
                let axis = cross / len;
                let d = self.test_separating_axis(other, &axis, pos_a, quat_a, pos_b, quat_b)?;
                if d < dmin {
                    dmin = d;
                    best = axis;
                }
            }
        }

        if (pos_b - pos_a).dot(&best) < 0.0 {
            best = -best;
        }
        Some(best)
    }

    /// Clip the face of `other` that faces this hull against the reference
    /// face of this hull most aligned with `normal` (pointing from this hull
    /// toward `other`).
    ///
    /// `emit(point_on_self, point_on_other, depth)` is called for every
    /// clipped point with `min_depth <= depth <= max_depth` (depth is negative
    /// when penetrating; smaller depths are clamped to `min_depth`).
    #[allow(clippy::too_many_arguments)]
    pub fn clip_against_hull<F>(
        &self,
        pos_a: &Vec3,
        quat_a: &Quat,
        other: &ConvexPolyhedron,
        pos_b: &Vec3,
        quat_b: &Quat,
        normal: &Vec3,
        min_depth: f32,
        max_depth: f32,
        buffers: &mut ClipBuffers,
        mut emit: F,
    ) where
        F: FnMut(Vec3, Vec3, f32),
    {
        let incident = match min_dot_face(other, quat_b, normal) {
            Some(i) => i,
            None => return,
        };
        let reference = match max_dot_face(self, quat_a, normal) {
            Some(i) => i,
            None => return,
        };

        buffers.input.clear();
        for &i in other.faces[incident].iter() {
            buffers.input.push(pos_b + quat_b * other.vertices[i]);
        }

        let ref_face = &self.faces[reference];
        let ref_normal = quat_a * self.face_normals[reference];
        for k in 0..ref_face.len() {
            let a = pos_a + quat_a * self.vertices[ref_face[k]];
            let b = pos_a + quat_a * self.vertices[ref_face[(k + 1) % ref_face.len()]];
            let side = (b - a).cross(&ref_normal);
            clip_polygon_against_plane(&buffers.input, &mut buffers.output, &a, &side);
            core::mem::swap(&mut buffers.input, &mut buffers.output);
            if buffers.input.is_empty() {
                return;
            }
        }

        let ref_point = pos_a + quat_a * self.vertices[ref_face[0]];
        for p in buffers.input.iter() {
            let mut depth = ref_normal.dot(&(p - ref_point));
            if depth <= min_depth {
                depth = min_depth;
            }
            if depth <= max_depth {
                let on_self = p - ref_normal * depth;
                emit(on_self, *p, depth);
            }
        }
    }
}

fn push_unique_direction(list: &mut Vec<Vec3>, dir: Vec3) {
    let duplicate = list
        .iter()
        .any(|d| d.cross(&dir).norm_squared() < PARALLEL_EPS * PARALLEL_EPS);
    if !duplicate {
        list.push(dir);
    }
}

fn max_dot_face(hull: &ConvexPolyhedron, quat: &Quat, dir: &Vec3) -> Option<usize> {
    let mut best = None;
    let mut dmax = f32::NEG_INFINITY;
    for (i, n) in hull.face_normals.iter().enumerate() {
        let d = (quat * n).dot(dir);
        if d > dmax {
            dmax = d;
            best = Some(i);
        }
    }
    best
}

fn min_dot_face(hull: &ConvexPolyhedron, quat: &Quat, dir: &Vec3) -> Option<usize> {
    let mut best = None;
    let mut dmin = f32::INFINITY;
    for (i, n) in hull.face_normals.iter().enumerate() {
        let d = (quat * n).dot(dir);
        if d < dmin {
            dmin = d;
            best = Some(i);
        }
    }
    best
}

/// Keep the part of `input` on the non-positive side of the plane through
/// `point` with normal `normal`.
fn clip_polygon_against_plane(input: &[Vec3], output: &mut Vec<Vec3>, point: &Vec3, normal: &Vec3) {
    output.clear();
    let n = input.len();
    if n < 2 {
        return;
    }
    let mut prev = input[n - 1];
    let mut d_prev = normal.dot(&(prev - point));
    for &cur in input.iter() {
        let d_cur = normal.dot(&(cur - point));
        if d_cur <= 0.0 {
            if d_prev > 0.0 {
                output.push(prev + (cur - prev) * (d_prev / (d_prev - d_cur)));
            }
            output.push(cur);
        } else if d_prev <= 0.0 {
            output.push(prev + (cur - prev) * (d_prev / (d_prev - d_cur)));
        }
        prev = cur;
        d_prev = d_cur;
    }
}

/// Diagonal inertia of a solid box: `(1/12)·m·(dims²)` per axis.
pub fn box_inertia(half_extents: &Vec3, mass: f32) -> Vec3 {
    let x = 2.0 * half_extents.x;
    let y = 2.0 * half_extents.y;
    let z = 2.0 * half_extents.z;
    let k = mass / 12.0;
    Vec3::new(k * (y * y + z * z), k * (x * x + z * z), k * (x * x + y * y))
}
