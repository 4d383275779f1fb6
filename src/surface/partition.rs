//! Volume-bounded spatial partitioning.
//!
//! The surface extent is bisected along its longest axis until every piece
//! is below the volume budget, so a worker's voxel grid stays bounded no
//! matter how large the molecule is: bigger molecules get more chunks, not
//! bigger ones. Each piece is then padded before atoms are gathered so the
//! isosurface is continuous across chunk seams.

use glam::Vec3;

use crate::molecule::Extent;

/// Default padding around each chunk, enough for a water probe plus two
/// atomic radii.
pub const DEFAULT_CHUNK_PADDING: f32 = 6.0;

/// Default chunk volume budget in cubic angstroms.
pub const DEFAULT_VOLUME_BUDGET: f32 = 64_000.0;

/// Bisection depth limit; bounds the chunk count at `2^MAX_SPLIT_DEPTH`.
const MAX_SPLIT_DEPTH: u32 = 24;

/// One independently computable piece of a surface.
#[derive(Debug, Clone, PartialEq)]
pub struct VolumeChunk {
    /// Unpadded bounds. The unpadded bounds of all chunks tile the parent
    /// extent exactly.
    pub extent: Extent,
    /// Bounds grown by the padding margin; may overlap neighbors.
    pub padded: Extent,
    /// Indices (into the all-atoms list) of atoms inside `padded`.
    pub atoms: Vec<usize>,
    /// Indices (into the atoms-to-show list) of atoms inside `extent`.
    pub atoms_to_show: Vec<usize>,
}

/// Recursively bisect `extent` until every piece has volume below
/// `volume_budget`.
///
/// An extent already under budget comes back as a single piece. Pieces are
/// ordered lower half first at every split. A non-positive or NaN budget
/// disables splitting. Bisection stops at a fixed depth, so a budget tiny
/// relative to the extent leaves oversized pieces and logs a warning.
#[must_use]
pub fn split_extent(extent: &Extent, volume_budget: f32) -> Vec<Extent> {
    let mut out = Vec::new();
    let mut capped = 0_usize;
    split_recursive(*extent, volume_budget, 0, &mut out, &mut capped);
    if capped > 0 {
        log::warn!(
            "{capped} of {} chunks stopped at split depth {MAX_SPLIT_DEPTH} \
             still above the {volume_budget} volume budget",
            out.len()
        );
    }
    out
}

fn split_recursive(
    extent: Extent,
    volume_budget: f32,
    depth: u32,
    out: &mut Vec<Extent>,
    capped: &mut usize,
) {
    if volume_budget.is_nan()
        || volume_budget <= 0.0
        || extent.volume() < volume_budget
    {
        out.push(extent);
        return;
    }
    if depth >= MAX_SPLIT_DEPTH {
        *capped += 1;
        out.push(extent);
        return;
    }
    let (lower, upper) = extent.bisect(extent.longest_axis());
    split_recursive(lower, volume_budget, depth + 1, out, capped);
    split_recursive(upper, volume_budget, depth + 1, out, capped);
}

/// Indices of the present atoms inside `extent` (closed bounds test).
#[must_use]
pub fn atoms_within(atoms: &[Option<Vec3>], extent: &Extent) -> Vec<usize> {
    atoms
        .iter()
        .enumerate()
        .filter_map(|(i, p)| p.filter(|&p| extent.contains(p)).map(|_| i))
        .collect()
}

/// Carve `extent` into volume-bounded chunks and assign atoms to them.
///
/// `all_atoms` feed the padded gather (neighbors across seams);
/// `atoms_to_show` are assigned by the unpadded bounds. Both lists may be
/// sparse; holes are skipped. Returned index lists point into the
/// respective input slice.
#[must_use]
pub fn partition(
    extent: &Extent,
    volume_budget: f32,
    padding: f32,
    all_atoms: &[Option<Vec3>],
    atoms_to_show: &[Option<Vec3>],
) -> Vec<VolumeChunk> {
    split_extent(extent, volume_budget)
        .into_iter()
        .map(|piece| {
            let padded = piece.padded(padding);
            VolumeChunk {
                atoms: atoms_within(all_atoms, &padded),
                atoms_to_show: atoms_within(atoms_to_show, &piece),
                extent: piece,
                padded,
            }
        })
        .collect()
}

/// Reorder chunks so those nearest the focus centroid are dispatched first.
///
/// Distance is measured from each chunk's unpadded center. The sort is
/// stable, so equidistant chunks keep their partition order. This only
/// influences submission order; completions still arrive in whatever order
/// the workers finish.
pub fn prioritize_by_focus(chunks: &mut [VolumeChunk], focus: &Extent) {
    let target = focus.centroid;
    chunks.sort_by(|a, b| {
        let da = a.extent.center().distance_squared(target);
        let db = b.extent.center().distance_squared(target);
        da.total_cmp(&db)
    });
}

#[cfg(test)]
mod tests {
    use rand::rngs::StdRng;
    use rand::{Rng, SeedableRng};

    use super::*;

    fn cube(edge: f32) -> Extent {
        Extent::from_corners(Vec3::ZERO, Vec3::splat(edge))
    }

    fn assert_tiles(parent: &Extent, pieces: &[Extent]) {
        let total: f64 = pieces.iter().map(|p| f64::from(p.volume())).sum();
        let expected = f64::from(parent.volume());
        assert!((total - expected).abs() <= expected * 1e-5);
        for (i, a) in pieces.iter().enumerate() {
            assert!(parent.contains(a.min) && parent.contains(a.max));
            for b in &pieces[i + 1..] {
                assert!(a.overlap_volume(b) <= 1e-3);
            }
        }
    }

    #[test]
    fn small_extent_is_not_split() {
        let pieces = split_extent(&cube(10.0), DEFAULT_VOLUME_BUDGET);
        assert_eq!(pieces, vec![cube(10.0)]);
    }

    #[test]
    fn large_cube_splits_into_sixteen_equal_chunks() {
        let parent = cube(100.0);
        let pieces = split_extent(&parent, DEFAULT_VOLUME_BUDGET);
        assert_eq!(pieces.len(), 16);
        for p in &pieces {
            assert_eq!(p.volume(), 62_500.0);
        }
        assert_tiles(&parent, &pieces);
    }

    #[test]
    fn random_extents_tile_and_respect_budget() {
        let mut rng = StdRng::seed_from_u64(7);
        for _ in 0..50 {
            let min = Vec3::new(
                rng.random_range(-50.0..50.0),
                rng.random_range(-50.0..50.0),
                rng.random_range(-50.0..50.0),
            );
            let size = Vec3::new(
                rng.random_range(1.0..120.0),
                rng.random_range(1.0..120.0),
                rng.random_range(1.0..120.0),
            );
            let budget = rng.random_range(500.0..80_000.0);
            let parent = Extent::from_corners(min, min + size);
            let pieces = split_extent(&parent, budget);

            if parent.volume() < budget {
                assert_eq!(pieces.len(), 1);
            } else {
                assert!(pieces.len() > 1);
                for p in &pieces {
                    assert!(p.volume() < budget);
                }
            }
            assert_tiles(&parent, &pieces);
        }
    }

    #[test]
    fn invalid_budget_returns_the_extent_unsplit() {
        assert_eq!(split_extent(&cube(100.0), 0.0).len(), 1);
        assert_eq!(split_extent(&cube(100.0), f32::NAN).len(), 1);
    }

    #[test]
    fn zero_extent_is_a_single_chunk() {
        let chunks = partition(&Extent::ZERO, DEFAULT_VOLUME_BUDGET, 6.0, &[], &[]);
        assert_eq!(chunks.len(), 1);
        assert!(chunks[0].atoms.is_empty());
        assert!(chunks[0].atoms_to_show.is_empty());
    }

    #[test]
    fn padding_admits_neighbors_but_show_set_uses_unpadded_bounds() {
        let parent = Extent::from_corners(Vec3::ZERO, Vec3::new(80.0, 30.0, 30.0));
        let left = Some(Vec3::new(38.0, 15.0, 15.0));
        let right = Some(Vec3::new(42.0, 15.0, 15.0));
        let atoms = vec![left, None, right];

        let chunks = partition(&parent, DEFAULT_VOLUME_BUDGET, 6.0, &atoms, &atoms);
        assert_eq!(chunks.len(), 2);
        assert_eq!(chunks[0].extent.max.x, 40.0);

        // Both atoms are within 6 units of the seam.
        assert_eq!(chunks[0].atoms, vec![0, 2]);
        assert_eq!(chunks[1].atoms, vec![0, 2]);
        assert_eq!(chunks[0].atoms_to_show, vec![0]);
        assert_eq!(chunks[1].atoms_to_show, vec![2]);
        assert_eq!(chunks[0].padded.min, Vec3::splat(-6.0));
    }

    #[test]
    fn focus_orders_nearest_chunks_first() {
        let parent = cube(100.0);
        let mut chunks = partition(&parent, DEFAULT_VOLUME_BUDGET, 6.0, &[], &[]);
        let focus = Extent::from_positions([Vec3::splat(99.0)]);
        prioritize_by_focus(&mut chunks, &focus);

        assert!(chunks[0].extent.contains(Vec3::splat(99.0)));
        let dists: Vec<f32> = chunks
            .iter()
            .map(|c| c.extent.center().distance_squared(focus.centroid))
            .collect();
        assert!(dists.windows(2).all(|w| w[0] <= w[1]));
    }
}
