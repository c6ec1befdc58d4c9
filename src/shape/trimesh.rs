//! Triangle meshes with a static AABB tree for triangle selection.

use alloc::vec::Vec;

use log::error;

use crate::aabb::Aabb;
use crate::error::{PhysicsError, Result};
use crate::math::{Quat, Vec3};
use crate::shape::convex::box_inertia;

/// Triangles per leaf of the AABB tree.
const LEAF_SIZE: usize = 4;
/// Traversal stack depth; a median-split tree over `n` triangles is about `log2(n)` deep.
const MAX_TREE_DEPTH: usize = 64;

#[derive(Debug, Clone, PartialEq)]
enum NodeKind {
    Leaf { start: usize, len: usize },
    Internal { left: usize, right: usize },
}

#[derive(Debug, Clone, PartialEq)]
struct Node {
    aabb: Aabb,
    kind: NodeKind,
}

/// Bounding-volume hierarchy over triangle indices, built once by median split.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct AabbTree {
    nodes: Vec<Node>,
    items: Vec<usize>,
}

impl AabbTree {
    fn build(bounds: &[Aabb]) -> Self {
        let mut tree = Self {
            nodes: Vec::with_capacity(2 * bounds.len() / LEAF_SIZE + 1),
            items: (0..bounds.len()).collect(),
        };
        if !bounds.is_empty() {
            tree.build_node(bounds, 0, bounds.len());
        }
        tree
    }

    fn build_node(&mut self, bounds: &[Aabb], start: usize, end: usize) -> usize {
        let mut aabb = Aabb::EMPTY;
        let mut centers = Aabb::EMPTY;
        for &item in self.items[start..end].iter() {
            aabb.extend(&bounds[item]);
            centers.extend_point(&bounds[item].center());
        }

        let index = self.nodes.len();
        self.nodes.push(Node {
            aabb,
            kind: NodeKind::Leaf { start, len: end - start },
        });
        if end - start <= LEAF_SIZE {
            return index;
        }

        let extent = centers.upper - centers.lower;
        let axis = if extent.x >= extent.y && extent.x >= extent.z {
            0
        } else if extent.y >= extent.z {
            1
        } else {
            2
        };
        self.items[start..end].sort_unstable_by(|&a, &b| {
            bounds[a].center()[axis]
                .partial_cmp(&bounds[b].center()[axis])
                .unwrap_or(core::cmp::Ordering::Equal)
        });
        let mid = start + (end - start) / 2;

        let left = self.build_node(bounds, start, mid);
        let right = self.build_node(bounds, mid, end);
        self.nodes[index].kind = NodeKind::Internal { left, right };
        index
    }

    /// Append every item whose box overlaps `aabb` to `out`.
    pub fn query(&self, aabb: &Aabb, out: &mut Vec<usize>) {
        if self.nodes.is_empty() {
            return;
        }
        let mut stack: heapless::Vec<usize, MAX_TREE_DEPTH> = heapless::Vec::new();
        let _ = stack.push(0);
        while let Some(index) = stack.pop() {
            let node = &self.nodes[index];
            if !node.aabb.overlaps(aabb) {
                continue;
            }
            match node.kind {
                NodeKind::Leaf { start, len } => out.extend_from_slice(&self.items[start..start + len]),
                NodeKind::Internal { left, right } => {
                    if stack.push(left).is_err() || stack.push(right).is_err() {
                        error!("AabbTree::query: traversal stack exceeded (max {})", MAX_TREE_DEPTH);
                        return;
                    }
                }
            }
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct Trimesh {
    vertices: Vec<Vec3>,
    triangles: Vec<[usize; 3]>,
    normals: Vec<Vec3>,
    aabb: Aabb,
    bounding_radius: f32,
    tree: AabbTree,
}

impl Trimesh {
    /// Build a mesh from a flat triangle index list (three indices per triangle).
    pub fn new(vertices: Vec<Vec3>, indices: &[usize]) -> Result<Self> {
        if indices.len() % 3 != 0 {
            return Err(PhysicsError::IncompleteTriangle(indices.len()));
        }
        let mut triangles = Vec::with_capacity(indices.len() / 3);
        for (t, tri) in indices.chunks_exact(3).enumerate() {
            if let Some(&bad) = tri.iter().find(|&&i| i >= vertices.len()) {
                return Err(PhysicsError::IndexOutOfRange {
                    element: t,
                    index: bad,
                    vertex_count: vertices.len(),
                });
            }
            triangles.push([tri[0], tri[1], tri[2]]);
        }

        let normals = triangles
            .iter()
            .map(|&[a, b, c]| {
                let n = (vertices[b] - vertices[a]).cross(&(vertices[c] - vertices[a]));
                n.try_normalize(f32::EPSILON).unwrap_or_else(Vec3::zeros)
            })
            .collect();
        let bounds: Vec<Aabb> = triangles
            .iter()
            .map(|tri| Aabb::from_points(tri.iter().map(|&i| &vertices[i])))
            .collect();
        let aabb = Aabb::from_points(vertices.iter());
        let bounding_radius = vertices.iter().map(|v| v.norm()).fold(0.0, f32::max);
        let tree = AabbTree::build(&bounds);

        Ok(Self {
            vertices,
            triangles,
            normals,
            aabb,
            bounding_radius,
            tree,
        })
    }

    pub fn vertices(&self) -> &[Vec3] {
        &self.vertices
    }

    pub fn triangle_count(&self) -> usize {
        self.triangles.len()
    }

    /// Local-space corners of triangle `t`.
    pub fn triangle(&self, t: usize) -> [Vec3; 3] {
        let [a, b, c] = self.triangles[t];
        [self.vertices[a], self.vertices[b], self.vertices[c]]
    }

    /// Local-space unit normal of triangle `t` (counter-clockwise winding).
    pub fn normal(&self, t: usize) -> Vec3 {
        self.normals[t]
    }

    pub fn local_aabb(&self) -> Aabb {
        self.aabb
    }

    pub fn world_aabb(&self, position: &Vec3, quaternion: &Quat) -> Aabb {
        self.aabb.transformed(position, quaternion)
    }

    pub fn bounding_sphere_radius(&self) -> f32 {
        self.bounding_radius
    }

    pub fn local_inertia(&self, mass: f32) -> Vec3 {
        box_inertia(&self.aabb.half_extents(), mass)
    }

    /// Indices of triangles whose bounds overlap the local box `aabb`.
    pub fn triangles_in_aabb(&self, aabb: &Aabb, out: &mut Vec<usize>) {
        self.tree.query(aabb, out);
    }
}
