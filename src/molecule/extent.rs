use glam::Vec3;

use super::Atom;

/// Coordinate axis, used when bisecting an extent.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Axis {
    /// The x axis.
    X,
    /// The y axis.
    Y,
    /// The z axis.
    Z,
}

impl Axis {
    fn index(self) -> usize {
        match self {
            Self::X => 0,
            Self::Y => 1,
            Self::Z => 2,
        }
    }
}

/// Axis-aligned bounding box plus the centroid of the points it was built
/// from.
///
/// Invariant: `min <= max` componentwise. Boxes carved out of a parent
/// extent have no point set of their own; their centroid is the box center.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Extent {
    /// Minimum corner.
    pub min: Vec3,
    /// Maximum corner.
    pub max: Vec3,
    /// Mean of the source points (box center for derived boxes).
    pub centroid: Vec3,
}

impl Default for Extent {
    fn default() -> Self {
        Self::ZERO
    }
}

impl Extent {
    /// The degenerate extent returned for empty input.
    pub const ZERO: Self = Self {
        min: Vec3::ZERO,
        max: Vec3::ZERO,
        centroid: Vec3::ZERO,
    };

    /// Box spanning two corners, centroid at its center. Corners are sorted
    /// componentwise so the result always satisfies `min <= max`.
    #[must_use]
    pub fn from_corners(a: Vec3, b: Vec3) -> Self {
        let min = a.min(b);
        let max = a.max(b);
        Self {
            min,
            max,
            centroid: (min + max) * 0.5,
        }
    }

    /// Bounding box and centroid of a point set. Empty input yields
    /// [`Extent::ZERO`].
    #[must_use]
    pub fn from_positions(points: impl IntoIterator<Item = Vec3>) -> Self {
        let mut min = Vec3::splat(f32::INFINITY);
        let mut max = Vec3::splat(f32::NEG_INFINITY);
        let mut sum = glam::DVec3::ZERO;
        let mut count = 0usize;

        for p in points {
            min = min.min(p);
            max = max.max(p);
            sum += p.as_dvec3();
            count += 1;
        }

        if count == 0 {
            return Self::ZERO;
        }
        Self {
            min,
            max,
            centroid: (sum / count as f64).as_vec3(),
        }
    }

    /// Edge lengths.
    #[must_use]
    pub fn size(&self) -> Vec3 {
        self.max - self.min
    }

    /// Box center (not the centroid).
    #[must_use]
    pub fn center(&self) -> Vec3 {
        (self.min + self.max) * 0.5
    }

    /// `w * h * d`.
    #[must_use]
    pub fn volume(&self) -> f32 {
        let s = self.size();
        s.x * s.y * s.z
    }

    /// Closed componentwise bounds test.
    #[must_use]
    pub fn contains(&self, p: Vec3) -> bool {
        p.cmpge(self.min).all() && p.cmple(self.max).all()
    }

    /// Copy grown by `margin` on every side. The centroid is kept.
    #[must_use]
    pub fn padded(&self, margin: f32) -> Self {
        Self {
            min: self.min - Vec3::splat(margin),
            max: self.max + Vec3::splat(margin),
            centroid: self.centroid,
        }
    }

    /// Longest edge; ties resolve x, then y, then z.
    #[must_use]
    pub fn longest_axis(&self) -> Axis {
        let s = self.size();
        if s.x >= s.y && s.x >= s.z {
            Axis::X
        } else if s.y >= s.z {
            Axis::Y
        } else {
            Axis::Z
        }
    }

    /// Split at the midpoint of `axis` into lower and upper halves.
    #[must_use]
    pub fn bisect(&self, axis: Axis) -> (Self, Self) {
        let i = axis.index();
        let mid = (self.max[i] - self.min[i]) / 2.0 + self.min[i];

        let mut lower_max = self.max;
        lower_max[i] = mid;
        let mut upper_min = self.min;
        upper_min[i] = mid;

        (
            Self::from_corners(self.min, lower_max),
            Self::from_corners(upper_min, self.max),
        )
    }

    /// Volume shared with another box (zero when they only touch).
    #[must_use]
    pub fn overlap_volume(&self, other: &Self) -> f32 {
        let lo = self.min.max(other.min);
        let hi = self.max.min(other.max);
        let s = (hi - lo).max(Vec3::ZERO);
        s.x * s.y * s.z
    }

    /// Corners as `[[min], [max]]`, the wire layout used in worker jobs.
    #[must_use]
    pub fn to_array(&self) -> [[f32; 3]; 2] {
        [self.min.to_array(), self.max.to_array()]
    }
}

/// Bounding box and centroid of a possibly sparse atom list.
///
/// Holes (`None`) are skipped. Empty or all-hole input yields
/// [`Extent::ZERO`], which callers treat as "no geometry".
#[must_use]
pub fn compute_extent<'a>(
    atoms: impl IntoIterator<Item = Option<&'a Atom>>,
) -> Extent {
    Extent::from_positions(atoms.into_iter().flatten().map(|a| a.position))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::molecule::AtomSlots;

    #[test]
    fn empty_and_all_holes_give_zero_extent() {
        assert_eq!(compute_extent(Vec::<Option<&Atom>>::new()), Extent::ZERO);
        assert_eq!(compute_extent(vec![None, None]), Extent::ZERO);
    }

    #[test]
    fn extent_bounds_every_atom_and_centroid_is_mean() {
        let mut atoms: AtomSlots = [
            Vec3::new(1.0, -2.0, 3.0),
            Vec3::new(-4.0, 5.0, 0.5),
            Vec3::new(2.0, 2.0, -6.0),
            Vec3::new(100.0, 100.0, 100.0),
        ]
        .into_iter()
        .map(|p| Atom::new(p, "C"))
        .collect();
        let _ = atoms.remove(3);

        let extent = compute_extent(atoms.select(&atoms.all_indices()));
        assert_eq!(extent.min, Vec3::new(-4.0, -2.0, -6.0));
        assert_eq!(extent.max, Vec3::new(2.0, 5.0, 3.0));
        let expected = Vec3::new(-1.0 / 3.0, 5.0 / 3.0, -2.5 / 3.0);
        assert!((extent.centroid - expected).length() < 1e-5);
        for atom in atoms.slots().iter().flatten() {
            assert!(extent.contains(atom.position));
        }
    }

    #[test]
    fn longest_axis_breaks_ties_in_xyz_order() {
        let cube = Extent::from_corners(Vec3::ZERO, Vec3::splat(10.0));
        assert_eq!(cube.longest_axis(), Axis::X);
        let yz = Extent::from_corners(Vec3::ZERO, Vec3::new(1.0, 5.0, 5.0));
        assert_eq!(yz.longest_axis(), Axis::Y);
        let z = Extent::from_corners(Vec3::ZERO, Vec3::new(1.0, 2.0, 3.0));
        assert_eq!(z.longest_axis(), Axis::Z);
    }

    #[test]
    fn bisect_halves_volume_without_overlap() {
        let e = Extent::from_corners(Vec3::splat(-2.0), Vec3::new(6.0, 2.0, 2.0));
        let (a, b) = e.bisect(Axis::X);
        assert_eq!(a.max.x, 2.0);
        assert_eq!(b.min.x, 2.0);
        assert_eq!(a.volume() + b.volume(), e.volume());
        assert_eq!(a.overlap_volume(&b), 0.0);
    }

    #[test]
    fn padding_grows_every_side() {
        let e = Extent::from_corners(Vec3::ZERO, Vec3::ONE);
        let p = e.padded(6.0);
        assert_eq!(p.min, Vec3::splat(-6.0));
        assert_eq!(p.max, Vec3::splat(7.0));
        assert_eq!(p.centroid, e.centroid);
    }
}
