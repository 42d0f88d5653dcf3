//! Procedural meshes
//!
//! Each generator produces counter-clockwise, outward-facing triangles and
//! converts into an [`Asset3D`], which then becomes a [`Model3D`]:
//!
//! ```no_run
//! use lumen::model::Model3D;
//! use lumen::procedural::Sphere;
//!
//! let model = Model3D::new(Sphere::new(16, 32).into());
//! ```
//!
//! [`Model3D`]: crate::model::Model3D

use crate::model::{Asset3D, VertexData};
use std::f32::consts::PI;

/// Cube spanning -1..1 on every axis, 4 vertices per face.
#[derive(Debug, Clone, Copy, Default)]
pub struct Cube;

impl Cube {
    pub fn new() -> Self {
        Self
    }

    pub fn vertices(&self) -> Vec<VertexData> {
        // (normal, u axis, v axis) of each face; corners are normal ± u ± v
        const FACES: [([f32; 3], [f32; 3], [f32; 3]); 6] = [
            ([0.0, 0.0, 1.0], [1.0, 0.0, 0.0], [0.0, 1.0, 0.0]),   // front (+Z)
            ([0.0, 0.0, -1.0], [-1.0, 0.0, 0.0], [0.0, 1.0, 0.0]), // back (-Z)
            ([0.0, 1.0, 0.0], [1.0, 0.0, 0.0], [0.0, 0.0, -1.0]),  // top (+Y)
            ([0.0, -1.0, 0.0], [1.0, 0.0, 0.0], [0.0, 0.0, 1.0]),  // bottom (-Y)
            ([1.0, 0.0, 0.0], [0.0, 0.0, -1.0], [0.0, 1.0, 0.0]),  // right (+X)
            ([-1.0, 0.0, 0.0], [0.0, 0.0, 1.0], [0.0, 1.0, 0.0]),  // left (-X)
        ];
        const CORNERS: [(f32, f32); 4] = [(-1.0, -1.0), (1.0, -1.0), (1.0, 1.0), (-1.0, 1.0)];

        let mut vertices = Vec::with_capacity(24);
        for (normal, u, v) in FACES {
            for (su, sv) in CORNERS {
                let position = std::array::from_fn(|k| normal[k] + su * u[k] + sv * v[k]);
                let uv = [(su + 1.0) * 0.5, (1.0 - sv) * 0.5];
                vertices.push(VertexData::new(position, normal, uv));
            }
        }
        vertices
    }

    pub fn indices(&self) -> Vec<u32> {
        let mut indices = Vec::with_capacity(36);
        for face in 0..6 {
            let base = face * 4;
            indices.extend_from_slice(&[base, base + 1, base + 2, base, base + 2, base + 3]);
        }
        indices
    }
}

impl From<Cube> for Asset3D {
    fn from(cube: Cube) -> Self {
        Asset3D::from_geometry(cube.vertices(), cube.indices())
    }
}

/// Flat grid on the XZ plane spanning -1..1, facing +Y.
#[derive(Debug, Clone, Copy)]
pub struct Plane {
    /// Cells along X.
    horizontal: u32,
    /// Cells along Z.
    vertical: u32,
}

impl Plane {
    pub fn new(horizontal: u32, vertical: u32) -> Self {
        Self {
            horizontal: horizontal.max(1),
            vertical: vertical.max(1),
        }
    }

    pub fn horizontal(&self) -> u32 {
        self.horizontal
    }

    pub fn vertical(&self) -> u32 {
        self.vertical
    }

    pub fn vertices(&self) -> Vec<VertexData> {
        let (h, v) = (self.horizontal, self.vertical);
        let mut vertices = Vec::with_capacity(((h + 1) * (v + 1)) as usize);
        for row in 0..=v {
            let t = row as f32 / v as f32;
            for col in 0..=h {
                let s = col as f32 / h as f32;
                vertices.push(VertexData::new(
                    [s * 2.0 - 1.0, 0.0, t * 2.0 - 1.0],
                    [0.0, 1.0, 0.0],
                    [s * h as f32, t * v as f32],
                ));
            }
        }
        vertices
    }

    pub fn indices(&self) -> Vec<u32> {
        let stride = self.horizontal + 1;
        let mut indices = Vec::with_capacity((self.horizontal * self.vertical * 6) as usize);
        for row in 0..self.vertical {
            for col in 0..self.horizontal {
                let a = row * stride + col;
                let b = a + 1;
                let d = a + stride;
                let c = d + 1;
                indices.extend_from_slice(&[a, d, c, a, c, b]);
            }
        }
        indices
    }
}

impl From<Plane> for Asset3D {
    fn from(plane: Plane) -> Self {
        Asset3D::from_geometry(plane.vertices(), plane.indices())
    }
}

/// Unit UV sphere.
#[derive(Debug, Clone, Copy)]
pub struct Sphere {
    /// Latitude bands, pole to pole.
    rings: u32,
    /// Longitude slices.
    sectors: u32,
}

impl Sphere {
    pub fn new(rings: u32, sectors: u32) -> Self {
        Self {
            rings: rings.max(2),
            sectors: sectors.max(3),
        }
    }

    pub fn rings(&self) -> u32 {
        self.rings
    }

    pub fn sectors(&self) -> u32 {
        self.sectors
    }

    pub fn vertices(&self) -> Vec<VertexData> {
        let mut vertices = Vec::with_capacity(((self.rings + 1) * (self.sectors + 1)) as usize);
        for ring in 0..=self.rings {
            let phi = PI * ring as f32 / self.rings as f32;
            let y = phi.cos();
            let ring_radius = phi.sin();

            for sector in 0..=self.sectors {
                let theta = 2.0 * PI * sector as f32 / self.sectors as f32;
                let x = ring_radius * theta.cos();
                let z = ring_radius * theta.sin();
                vertices.push(VertexData::new(
                    [x, y, z],
                    [x, y, z],
                    [
                        sector as f32 / self.sectors as f32,
                        ring as f32 / self.rings as f32,
                    ],
                ));
            }
        }
        vertices
    }

    pub fn indices(&self) -> Vec<u32> {
        let mut indices = Vec::with_capacity((self.rings * self.sectors * 6) as usize);
        for ring in 0..self.rings {
            for sector in 0..self.sectors {
                let current = ring * (self.sectors + 1) + sector;
                let next = current + self.sectors + 1;
                indices.extend_from_slice(&[current, current + 1, next]);
                indices.extend_from_slice(&[current + 1, next + 1, next]);
            }
        }
        indices
    }
}

impl From<Sphere> for Asset3D {
    fn from(sphere: Sphere) -> Self {
        Asset3D::from_geometry(sphere.vertices(), sphere.indices())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::BoundingVolumes;
    use glam::Vec3;

    /// Every non-degenerate triangle must wind counter-clockwise around its normal.
    fn assert_outward(asset: &Asset3D) {
        assert!(asset.validate().is_ok());
        for tri in asset.indices.chunks_exact(3) {
            let [a, b, c] = [tri[0], tri[1], tri[2]].map(|i| asset.vertices[i as usize]);
            let pa = Vec3::from(a.position);
            let face = (Vec3::from(b.position) - pa).cross(Vec3::from(c.position) - pa);
            let normal = Vec3::from(a.normal) + Vec3::from(b.normal) + Vec3::from(c.normal);
            assert!(face.dot(normal) >= -1e-6, "triangle {tri:?} faces inward");
        }
    }

    #[test]
    fn test_cube() {
        let asset: Asset3D = Cube::new().into();
        assert_eq!(asset.vertices.len(), 24);
        assert_eq!(asset.indices.len(), 36);
        assert_outward(&asset);

        let bounds = BoundingVolumes::compute(asset.vertices.iter().map(|v| Vec3::from(v.position)));
        assert_eq!(bounds.aabb().min, Vec3::splat(-1.0));
        assert_eq!(bounds.aabb().max, Vec3::splat(1.0));
        assert!((bounds.max_length() - 3.0f32.sqrt()).abs() < 1e-6);
    }

    #[test]
    fn test_plane() {
        let asset: Asset3D = Plane::new(3, 2).into();
        assert_eq!(asset.vertices.len(), 12);
        assert_eq!(asset.indices.len(), 36);
        assert_outward(&asset);
        assert_eq!(asset.vertices[0].position, [-1.0, 0.0, -1.0]);
        assert_eq!(asset.vertices[11].position, [1.0, 0.0, 1.0]);
    }

    #[test]
    fn test_plane_minimum_size() {
        let plane = Plane::new(0, 0);
        assert_eq!((plane.horizontal(), plane.vertical()), (1, 1));
        assert_eq!(plane.indices().len(), 6);
        assert!(plane
            .vertices()
            .iter()
            .all(|v| v.position.iter().chain(&v.uv).all(|c| c.is_finite())));
    }

    #[test]
    fn test_sphere_minimum_size() {
        let sphere = Sphere::new(0, 0);
        assert_eq!((sphere.rings(), sphere.sectors()), (2, 3));
        let asset: Asset3D = sphere.into();
        assert_outward(&asset);
        assert!(asset
            .vertices
            .iter()
            .all(|v| v.position.iter().all(|c| c.is_finite())));
    }

    #[test]
    fn test_sphere() {
        let asset: Asset3D = Sphere::new(8, 16).into();
        assert_eq!(asset.vertices.len(), 9 * 17);
        assert_eq!(asset.indices.len(), 8 * 16 * 6);
        assert_outward(&asset);
        for v in &asset.vertices {
            assert!((Vec3::from(v.position).length() - 1.0).abs() < 1e-5);
        }
    }
}
