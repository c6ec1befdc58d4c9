//! Regular height grids (terrain).
//!
//! Samples lie in the local XZ plane, `element_size` apart, with heights
//! along local +Y. Sample `(i, j)` sits at `(i * element_size, data[i][j],
//! j * element_size)`. Each grid cell is split into two triangles; collision
//! treats every triangle as a convex "pillar" reaching below the lowest sample.

use alloc::vec::Vec;

// ComplexField provides floor()/sqrt() for f32 in no_std via libm
#[allow(unused_imports)]
use nalgebra::ComplexField;

use crate::aabb::Aabb;
use crate::error::{require_positive, PhysicsError, Result};
use crate::math::{Quat, Vec3};
use crate::shape::convex::{box_inertia, ConvexPolyhedron};

/// Depth of the pillar bottoms below the lowest sample.
const PILLAR_DEPTH: f32 = 1.0;

#[derive(Debug, Clone, PartialEq)]
pub struct Heightfield {
    data: Vec<Vec<f32>>,
    element_size: f32,
    min_value: f32,
    max_value: f32,
}

/// Inclusive range of grid cells `(i0..=i1, j0..=j1)`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CellRange {
    pub i0: usize,
    pub i1: usize,
    pub j0: usize,
    pub j1: usize,
}

impl Heightfield {
    pub fn new(data: Vec<Vec<f32>>, element_size: f32) -> Result<Self> {
        require_positive("Heightfield", "element_size", element_size)?;
        if data.len() < 2 {
            return Err(PhysicsError::MalformedHeightfield { row: 0, len: data.len() });
        }
        let cols = data[0].len();
        for (row, samples) in data.iter().enumerate() {
            if samples.len() < 2 || samples.len() != cols {
                return Err(PhysicsError::MalformedHeightfield { row, len: samples.len() });
            }
            if let Some(&bad) = samples.iter().find(|h| !h.is_finite()) {
                return Err(PhysicsError::InvalidShapeParameter {
                    shape: "Heightfield",
                    param: "data",
                    value: bad,
                });
            }
        }

        let mut hf = Self {
            data,
            element_size,
            min_value: 0.0,
            max_value: 0.0,
        };
        hf.update_min_max();
        Ok(hf)
    }

    fn update_min_max(&mut self) {
        let mut min = f32::INFINITY;
        let mut max = f32::NEG_INFINITY;
        for h in self.data.iter().flatten() {
            min = min.min(*h);
            max = max.max(*h);
        }
        self.min_value = min;
        self.max_value = max;
    }

    /// Overwrite one sample and refresh the cached extremes.
    pub fn set_height(&mut self, i: usize, j: usize, height: f32) {
        if let Some(h) = self.data.get_mut(i).and_then(|row| row.get_mut(j)) {
            *h = height;
            self.update_min_max();
        }
    }

    /// Number of samples along local X.
    pub fn rows(&self) -> usize {
        self.data.len()
    }

    /// Number of samples along local Z.
    pub fn cols(&self) -> usize {
        self.data[0].len()
    }

    pub fn element_size(&self) -> f32 {
        self.element_size
    }

    pub fn height(&self, i: usize, j: usize) -> f32 {
        self.data[i][j]
    }

    pub fn min_value(&self) -> f32 {
        self.min_value
    }

    pub fn max_value(&self) -> f32 {
        self.max_value
    }

    pub fn local_aabb(&self) -> Aabb {
        Aabb::new(
            Vec3::new(0.0, self.min_value, 0.0),
            Vec3::new(
                (self.rows() - 1) as f32 * self.element_size,
                self.max_value,
                (self.cols() - 1) as f32 * self.element_size,
            ),
        )
    }

    pub fn world_aabb(&self, position: &Vec3, quaternion: &Quat) -> Aabb {
        self.local_aabb().transformed(position, quaternion)
    }

    pub fn bounding_sphere_radius(&self) -> f32 {
        let aabb = self.local_aabb();
        let h = self.min_value.abs().max(self.max_value.abs());
        Vec3::new(aabb.upper.x, h, aabb.upper.z).norm()
    }

    pub fn local_inertia(&self, mass: f32) -> Vec3 {
        box_inertia(&self.local_aabb().half_extents(), mass)
    }

    /// Cells touched by the local box `aabb`, or `None` if it misses the grid.
    pub fn cell_range(&self, aabb: &Aabb) -> Option<CellRange> {
        let last_i = self.rows() - 2;
        let last_j = self.cols() - 2;
        let to_cell = |v: f32| (v / self.element_size).floor();

        let (x0, x1) = (to_cell(aabb.lower.x), to_cell(aabb.upper.x));
        let (z0, z1) = (to_cell(aabb.lower.z), to_cell(aabb.upper.z));
        if x1 < 0.0 || z1 < 0.0 || x0 > last_i as f32 || z0 > last_j as f32 {
            return None;
        }
        if aabb.lower.y > self.max_value {
            return None;
        }
        Some(CellRange {
            i0: x0.max(0.0) as usize,
            i1: (x1 as usize).min(last_i),
            j0: z0.max(0.0) as usize,
            j1: (z1 as usize).min(last_j),
        })
    }

    /// Lowest and highest sample of cell `(i, j)`.
    pub fn cell_height_range(&self, i: usize, j: usize) -> (f32, f32) {
        let h = [
            self.data[i][j],
            self.data[i + 1][j],
            self.data[i][j + 1],
            self.data[i + 1][j + 1],
        ];
        let min = h.iter().copied().fold(f32::INFINITY, f32::min);
        let max = h.iter().copied().fold(f32::NEG_INFINITY, f32::max);
        (min, max)
    }

    fn sample(&self, i: usize, j: usize) -> Vec3 {
        Vec3::new(
            i as f32 * self.element_size,
            self.data[i][j],
            j as f32 * self.element_size,
        )
    }

    /// One of the two triangles of cell `(i, j)` in local coordinates.
    /// The lower triangle covers `fx + fz <= 1` of the cell.
    pub fn triangle(&self, i: usize, j: usize, upper: bool) -> [Vec3; 3] {
        if upper {
            [self.sample(i + 1, j + 1), self.sample(i + 1, j), self.sample(i, j + 1)]
        } else {
            [self.sample(i, j), self.sample(i, j + 1), self.sample(i + 1, j)]
        }
    }

    /// Load the pillar below one triangle into `pillar`. Returns the pillar's
    /// center in heightfield coordinates; its vertices are relative to it.
    pub(crate) fn fill_pillar(&self, i: usize, j: usize, upper: bool, pillar: &mut ConvexPolyhedron) -> Vec3 {
        pillar.set_triangle_pillar(self.triangle(i, j, upper), self.min_value - PILLAR_DEPTH)
    }

    /// Interpolated surface height and upward normal at local `(x, z)`.
    pub fn height_at(&self, x: f32, z: f32) -> Option<(f32, Vec3)> {
        let width = (self.rows() - 1) as f32 * self.element_size;
        let depth = (self.cols() - 1) as f32 * self.element_size;
        if !(0.0..=width).contains(&x) || !(0.0..=depth).contains(&z) {
            return None;
        }
        let gx = x / self.element_size;
        let gz = z / self.element_size;
        let i = (gx.floor() as usize).min(self.rows() - 2);
        let j = (gz.floor() as usize).min(self.cols() - 2);
        let fx = gx - i as f32;
        let fz = gz - j as f32;

        let upper = fx + fz > 1.0;
        let [a, b, c] = self.triangle(i, j, upper);
        let mut normal = (b - a).cross(&(c - a)).normalize();
        if normal.y < 0.0 {
            normal = -normal;
        }
        // Plane through `a`: n·(p - a) = 0, solved for y.
        let y = a.y - (normal.x * (x - a.x) + normal.z * (z - a.z)) / normal.y;
        Some((y, normal))
    }
}
