//! Property value → surface color mapping.
//!
//! A surface style may name an atom property and a [`ColorScheme`]. Before
//! the surface is partitioned every atom-to-show gets its `surface_color`
//! from the scheme, so the colors travel with the atoms into the mesh
//! assembler.

use schemars::JsonSchema;
use serde::{Deserialize, Serialize};

use crate::molecule::AtomSlots;

/// A color ramp defined by N evenly-spaced color stops.
/// `t = 0` maps to the first color, `t = 1` maps to the last.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, JsonSchema)]
pub struct ColorRamp {
    stops: Vec<[f32; 3]>,
}

impl ColorRamp {
    /// Build a ramp from explicit stops. Fewer than two stops are padded
    /// so sampling is always defined.
    #[must_use]
    pub fn new(mut stops: Vec<[f32; 3]>) -> Self {
        match stops.len() {
            0 => stops = vec![[0.0; 3], [1.0; 3]],
            1 => stops.push(stops[0]),
            _ => {}
        }
        Self { stops }
    }

    /// Red → white → blue.
    #[must_use]
    pub fn red_white_blue() -> Self {
        Self::new(vec![[1.0, 0.0, 0.0], [1.0, 1.0, 1.0], [0.0, 0.0, 1.0]])
    }

    /// Interpolate the ramp at position `t` in [0, 1].
    ///
    /// A deserialized ramp may carry fewer than two stops; it samples as
    /// if it had been padded by [`ColorRamp::new`].
    #[must_use]
    pub fn sample(&self, t: f32) -> [f32; 3] {
        let t = if t.is_nan() { 0.0 } else { t.clamp(0.0, 1.0) };
        match self.stops.as_slice() {
            [] => return [t; 3],
            [only] => return *only,
            _ => {}
        }
        let n = self.stops.len() - 1;
        let scaled = t * n as f32;
        let idx = (scaled as usize).min(n - 1);
        let frac = scaled - idx as f32;

        let a = &self.stops[idx];
        let b = &self.stops[idx + 1];
        [
            a[0] + (b[0] - a[0]) * frac,
            a[1] + (b[1] - a[1]) * frac,
            a[2] + (b[2] - a[2]) * frac,
        ]
    }
}

/// How property values become colors.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, JsonSchema)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum ColorScheme {
    /// Red (low) through white to blue (high).
    RedWhiteBlue {
        /// Fixed `[min, max]`; derived from the atoms when absent.
        range: Option<[f32; 2]>,
    },
    /// Custom stops, evenly spaced over the range.
    Ramp {
        /// Color ramp to sample.
        ramp: ColorRamp,
        /// Fixed `[min, max]`; derived from the atoms when absent.
        range: Option<[f32; 2]>,
    },
}

impl Default for ColorScheme {
    fn default() -> Self {
        Self::RedWhiteBlue { range: None }
    }
}

impl ColorScheme {
    /// The scheme's fixed range, if it carries one.
    #[must_use]
    pub fn range(&self) -> Option<[f32; 2]> {
        match self {
            Self::RedWhiteBlue { range } | Self::Ramp { range, .. } => *range,
        }
    }

    /// Map `value` within `range` to a color. A collapsed range maps
    /// everything to the ramp midpoint.
    #[must_use]
    pub fn value_to_color(&self, value: f32, range: [f32; 2]) -> [f32; 3] {
        let [lo, hi] = range;
        let t = if hi > lo { (value - lo) / (hi - lo) } else { 0.5 };
        match self {
            Self::RedWhiteBlue { .. } => ColorRamp::red_white_blue().sample(t),
            Self::Ramp { ramp, .. } => ramp.sample(t),
        }
    }
}

/// Property-to-color request carried by a surface style.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, JsonSchema)]
pub struct PropertyMap {
    /// Atom property name.
    pub prop: String,
    /// Scheme used to color it.
    #[serde(default)]
    pub scheme: ColorScheme,
}

/// Min/max of `prop` over the given atoms.
///
/// No value at all gives `[0, 0]`; if only one bound is finite both ends
/// take that bound.
#[must_use]
pub fn property_range(atoms: &AtomSlots, selection: &[usize], prop: &str) -> [f32; 2] {
    let mut min = f32::INFINITY;
    let mut max = f32::NEG_INFINITY;
    for atom in selection.iter().filter_map(|&i| atoms.get(i)) {
        if let Some(&v) = atom.properties.get(prop) {
            min = min.min(v);
            max = max.max(v);
        }
    }

    match (min.is_finite(), max.is_finite()) {
        (true, true) => [min, max],
        (true, false) => [min, min],
        (false, true) => [max, max],
        (false, false) => [0.0, 0.0],
    }
}

/// Assign `surface_color` to every selected atom from `map`.
///
/// Atoms without the property take the low end of the range.
pub fn apply_property_map(atoms: &mut AtomSlots, selection: &[usize], map: &PropertyMap) {
    let range = map
        .scheme
        .range()
        .unwrap_or_else(|| property_range(atoms, selection, &map.prop));

    for &i in selection {
        if let Some(atom) = atoms.get_mut(i) {
            let value = atom.properties.get(&map.prop).copied().unwrap_or(range[0]);
            atom.surface_color = Some(map.scheme.value_to_color(value, range));
        }
    }
}

#[cfg(test)]
mod tests {
    use glam::Vec3;

    use super::*;
    use crate::molecule::Atom;

    fn charged(values: &[Option<f32>]) -> AtomSlots {
        values
            .iter()
            .map(|v| {
                let atom = Atom::new(Vec3::ZERO, "C");
                match v {
                    Some(v) => atom.with_property("charge", *v),
                    None => atom,
                }
            })
            .collect()
    }

    #[test]
    fn ramp_endpoints_and_midpoint() {
        let ramp = ColorRamp::red_white_blue();
        assert_eq!(ramp.sample(0.0), [1.0, 0.0, 0.0]);
        assert_eq!(ramp.sample(0.5), [1.0, 1.0, 1.0]);
        assert_eq!(ramp.sample(1.0), [0.0, 0.0, 1.0]);
        assert_eq!(ramp.sample(7.0), [0.0, 0.0, 1.0]);
    }

    #[test]
    fn degenerate_ramps_are_padded() {
        assert_eq!(ColorRamp::new(vec![]).sample(1.0), [1.0; 3]);
        assert_eq!(ColorRamp::new(vec![[0.2; 3]]).sample(0.7), [0.2; 3]);
    }

    #[test]
    fn deserialized_degenerate_ramps_still_sample() {
        let empty: ColorScheme = toml::from_str(
            "kind = \"ramp\"\nrange = [0.0, 1.0]\n[ramp]\nstops = []\n",
        )
        .unwrap();
        assert_eq!(empty.value_to_color(1.0, [0.0, 1.0]), [1.0; 3]);
        assert_eq!(empty.value_to_color(0.0, [0.0, 1.0]), [0.0; 3]);

        let single: ColorScheme = toml::from_str(
            "kind = \"ramp\"\n[ramp]\nstops = [[0.2, 0.2, 0.2]]\n",
        )
        .unwrap();
        assert_eq!(single.value_to_color(0.3, [0.0, 1.0]), [0.2; 3]);

        let mut atoms = charged(&[Some(-1.0), Some(4.0)]);
        let map = PropertyMap {
            prop: "charge".to_owned(),
            scheme: single,
        };
        apply_property_map(&mut atoms, &[0, 1], &map);
        assert_eq!(atoms.get(1).unwrap().surface_color, Some([0.2; 3]));
    }

    #[test]
    fn property_range_handles_missing_values() {
        let atoms = charged(&[Some(-2.0), None, Some(3.0)]);
        assert_eq!(property_range(&atoms, &[0, 1, 2], "charge"), [-2.0, 3.0]);
        assert_eq!(property_range(&atoms, &[1], "charge"), [0.0, 0.0]);
        assert_eq!(property_range(&atoms, &[2], "charge"), [3.0, 3.0]);
    }

    #[test]
    fn property_map_assigns_surface_colors() {
        let mut atoms = charged(&[Some(-1.0), Some(0.0), Some(1.0), None]);
        let map = PropertyMap {
            prop: "charge".to_owned(),
            scheme: ColorScheme::default(),
        };
        apply_property_map(&mut atoms, &[0, 1, 2, 3], &map);

        assert_eq!(atoms.get(0).unwrap().surface_color, Some([1.0, 0.0, 0.0]));
        assert_eq!(atoms.get(1).unwrap().surface_color, Some([1.0, 1.0, 1.0]));
        assert_eq!(atoms.get(2).unwrap().surface_color, Some([0.0, 0.0, 1.0]));
        // Missing property maps to the low end.
        assert_eq!(atoms.get(3).unwrap().surface_color, Some([1.0, 0.0, 0.0]));
    }

    #[test]
    fn fixed_scheme_range_wins_over_data_range() {
        let mut atoms = charged(&[Some(0.0)]);
        let map = PropertyMap {
            prop: "charge".to_owned(),
            scheme: ColorScheme::RedWhiteBlue {
                range: Some([0.0, 10.0]),
            },
        };
        apply_property_map(&mut atoms, &[0], &map);
        assert_eq!(atoms.get(0).unwrap().surface_color, Some([1.0, 0.0, 0.0]));
    }
}
