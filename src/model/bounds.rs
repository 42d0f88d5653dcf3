//! Bounding volumes of a model in local space

use glam::{Mat4, Quat, Vec3};

/// Corner pairs forming the 12 edges of a box, for line drawing.
///
/// Corners are numbered by their bits: bit 0 selects max x, bit 1 max y, bit 2 max z.
pub const BOX_EDGES: [u32; 24] = [
    0, 1, 2, 3, 4, 5, 6, 7, // along x
    0, 2, 1, 3, 4, 6, 5, 7, // along y
    0, 4, 1, 5, 2, 6, 3, 7, // along z
];

/// Axis-aligned bounding box.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Aabb {
    pub min: Vec3,
    pub max: Vec3,
}

impl Default for Aabb {
    fn default() -> Self {
        Self {
            min: Vec3::ZERO,
            max: Vec3::ZERO,
        }
    }
}

impl Aabb {
    pub fn new(min: Vec3, max: Vec3) -> Self {
        Self { min, max }
    }

    /// Smallest box containing every point. Empty input gives a zero box.
    pub fn from_points(points: impl IntoIterator<Item = Vec3>) -> Self {
        let mut min = Vec3::splat(f32::INFINITY);
        let mut max = Vec3::splat(f32::NEG_INFINITY);
        let mut any = false;
        for p in points {
            min = min.min(p);
            max = max.max(p);
            any = true;
        }
        if any {
            Self { min, max }
        } else {
            Self::default()
        }
    }

    pub fn center(&self) -> Vec3 {
        (self.min + self.max) * 0.5
    }

    pub fn size(&self) -> Vec3 {
        self.max - self.min
    }

    pub fn contains(&self, point: Vec3) -> bool {
        point.cmpge(self.min).all() && point.cmple(self.max).all()
    }

    /// The 8 corners, indexed as in [`BOX_EDGES`].
    pub fn corners(&self) -> [Vec3; 8] {
        std::array::from_fn(|i| {
            Vec3::new(
                if i & 1 == 0 { self.min.x } else { self.max.x },
                if i & 2 == 0 { self.min.y } else { self.max.y },
                if i & 4 == 0 { self.min.z } else { self.max.z },
            )
        })
    }

    /// Matrix mapping the unit cube `[0, 1]^3` onto this box.
    pub fn unit_transform(&self) -> Mat4 {
        Mat4::from_scale_rotation_translation(self.size(), Quat::IDENTITY, self.min)
    }
}

/// A box in model space, rotated with the model.
#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub struct OrientedBox {
    /// Extent before rotation.
    pub local: Aabb,
    pub rotation: Quat,
}

impl OrientedBox {
    /// The 8 rotated corners, indexed as in [`BOX_EDGES`].
    pub fn corners(&self) -> [Vec3; 8] {
        self.local.corners().map(|c| self.rotation * c)
    }

    /// Matrix mapping the unit cube `[0, 1]^3` onto this box.
    pub fn unit_transform(&self) -> Mat4 {
        Mat4::from_quat(self.rotation) * self.local.unit_transform()
    }
}

/// Bounding sphere radius, oriented box and enclosing world-axis box.
#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub struct BoundingVolumes {
    max_length_vertex: Vec3,
    oriented: OrientedBox,
    aabb: Aabb,
}

impl BoundingVolumes {
    /// One pass over the vertex positions, assumed centered on the origin.
    pub fn compute(positions: impl IntoIterator<Item = Vec3>) -> Self {
        let mut max_length_vertex = Vec3::ZERO;
        let mut max_length = 0.0f32;
        let mut min = Vec3::splat(f32::INFINITY);
        let mut max = Vec3::splat(f32::NEG_INFINITY);
        let mut any = false;

        for p in positions {
            let length = p.length();
            if length > max_length {
                max_length = length;
                max_length_vertex = p;
            }
            min = min.min(p);
            max = max.max(p);
            any = true;
        }

        let local = if any { Aabb::new(min, max) } else { Aabb::default() };
        Self {
            max_length_vertex,
            oriented: OrientedBox {
                local,
                rotation: Quat::IDENTITY,
            },
            aabb: local,
        }
    }

    /// Rotate the oriented box and refit the world-axis box around it.
    pub fn update(&mut self, rotation: Quat) {
        self.oriented.rotation = rotation;
        self.aabb = Aabb::from_points(self.oriented.corners());
    }

    pub fn max_length_vertex(&self) -> Vec3 {
        self.max_length_vertex
    }

    /// Radius of the bounding sphere around the origin.
    pub fn max_length(&self) -> f32 {
        self.max_length_vertex.length()
    }

    pub fn oriented(&self) -> &OrientedBox {
        &self.oriented
    }

    pub fn aabb(&self) -> &Aabb {
        &self.aabb
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn cube_points() -> Vec<Vec3> {
        Aabb::new(Vec3::splat(-1.0), Vec3::splat(1.0))
            .corners()
            .to_vec()
    }

    #[test]
    fn test_unit_cube_bounds() {
        let bounds = BoundingVolumes::compute(cube_points());
        assert_eq!(bounds.aabb().min, Vec3::splat(-1.0));
        assert_eq!(bounds.aabb().max, Vec3::splat(1.0));
        assert!((bounds.max_length() - 3.0f32.sqrt()).abs() < 1e-6);
        assert_eq!(bounds.oriented().local, *bounds.aabb());
    }

    #[test]
    fn test_positive_only_geometry() {
        // a mesh that never crosses an axis keeps its real minimum
        let points = [Vec3::new(1.0, 2.0, 3.0), Vec3::new(2.0, 4.0, 5.0)];
        let bounds = BoundingVolumes::compute(points);
        assert_eq!(bounds.aabb().min, Vec3::new(1.0, 2.0, 3.0));
        assert_eq!(bounds.aabb().max, Vec3::new(2.0, 4.0, 5.0));
    }

    #[test]
    fn test_empty_geometry() {
        let bounds = BoundingVolumes::compute(std::iter::empty());
        assert_eq!(*bounds.aabb(), Aabb::default());
        assert_eq!(bounds.max_length(), 0.0);
    }

    #[test]
    fn test_rotation_refits_aabb() {
        let mut bounds = BoundingVolumes::compute(cube_points());
        bounds.update(Quat::from_rotation_y(std::f32::consts::FRAC_PI_4));
        let expected = 2.0f32.sqrt();
        assert!((bounds.aabb().max.x - expected).abs() < 1e-5);
        assert!((bounds.aabb().max.z - expected).abs() < 1e-5);
        assert!((bounds.aabb().max.y - 1.0).abs() < 1e-5);
        // the oriented box keeps its local extent
        assert_eq!(bounds.oriented().local.max, Vec3::splat(1.0));
    }

    #[test]
    fn test_corners_follow_edge_numbering() {
        let aabb = Aabb::new(Vec3::ZERO, Vec3::ONE);
        let corners = aabb.corners();
        for pair in BOX_EDGES.chunks_exact(2) {
            let d = corners[pair[1] as usize] - corners[pair[0] as usize];
            assert_eq!(d.length(), 1.0, "edge {pair:?} is not axis aligned");
        }
        assert!(aabb.contains(aabb.center()));
        assert_eq!(aabb.unit_transform().transform_point3(Vec3::ONE), Vec3::ONE);
    }
}
