use glam::Vec3;
use rustc_hash::FxHashMap;

/// A single atom as seen by the surface pipeline.
#[derive(Debug, Clone, PartialEq)]
pub struct Atom {
    /// Cartesian position in angstroms.
    pub position: Vec3,
    /// Element symbol (`"C"`, `"Fe"`, ...).
    pub element: String,
    /// Base display color.
    pub color: Option<[f32; 3]>,
    /// Numeric per-atom properties (charge, b-factor, ...).
    pub properties: FxHashMap<String, f32>,
    /// Stable slot index within the owning [`AtomSlots`].
    pub index: usize,
    /// Color assigned by a surface property map. Takes precedence over
    /// [`color`](Self::color) when surfaces are colored.
    pub surface_color: Option<[f32; 3]>,
}

impl Atom {
    /// Create an atom with no color or properties.
    pub fn new(position: Vec3, element: impl Into<String>) -> Self {
        Self {
            position,
            element: element.into(),
            color: None,
            properties: FxHashMap::default(),
            index: 0,
            surface_color: None,
        }
    }

    /// Builder-style base color.
    #[must_use]
    pub fn with_color(mut self, color: [f32; 3]) -> Self {
        self.color = Some(color);
        self
    }

    /// Builder-style numeric property.
    #[must_use]
    pub fn with_property(mut self, name: impl Into<String>, value: f32) -> Self {
        drop(self.properties.insert(name.into(), value));
        self
    }

    /// Color a surface vertex owned by this atom should take.
    #[must_use]
    pub fn surface_display_color(&self) -> Option<[f32; 3]> {
        self.surface_color.or(self.color)
    }
}

/// Sparse atom storage. Removing an atom leaves a hole so the indices of
/// the remaining atoms never shift.
#[derive(Debug, Clone, Default)]
pub struct AtomSlots {
    slots: Vec<Option<Atom>>,
}

impl AtomSlots {
    /// Create an empty collection.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Append an atom, returning its stable slot index.
    pub fn push(&mut self, mut atom: Atom) -> usize {
        let index = self.slots.len();
        atom.index = index;
        self.slots.push(Some(atom));
        index
    }

    /// Remove the atom at `index`, leaving a hole. Returns the atom if the
    /// slot was occupied.
    pub fn remove(&mut self, index: usize) -> Option<Atom> {
        self.slots.get_mut(index).and_then(Option::take)
    }

    /// Atom at `index`, if the slot is occupied.
    #[must_use]
    pub fn get(&self, index: usize) -> Option<&Atom> {
        self.slots.get(index).and_then(Option::as_ref)
    }

    /// Mutable atom at `index`, if the slot is occupied.
    pub fn get_mut(&mut self, index: usize) -> Option<&mut Atom> {
        self.slots.get_mut(index).and_then(Option::as_mut)
    }

    /// Number of slots, holes included.
    #[must_use]
    pub fn slot_count(&self) -> usize {
        self.slots.len()
    }

    /// Number of occupied slots.
    #[must_use]
    pub fn len(&self) -> usize {
        self.slots.iter().filter(|s| s.is_some()).count()
    }

    /// Whether no slot is occupied.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.slots.iter().all(Option::is_none)
    }

    /// Every slot index, holes included, in order.
    #[must_use]
    pub fn all_indices(&self) -> Vec<usize> {
        (0..self.slots.len()).collect()
    }

    /// Raw slot view; `None` marks a hole.
    #[must_use]
    pub fn slots(&self) -> &[Option<Atom>] {
        &self.slots
    }

    /// Resolve a selection of slot indices, keeping holes as `None`.
    #[must_use]
    pub fn select(&self, selection: &[usize]) -> Vec<Option<&Atom>> {
        selection.iter().map(|&i| self.get(i)).collect()
    }

    /// The occupied slot indices of a selection, in selection order.
    #[must_use]
    pub fn present(&self, selection: &[usize]) -> Vec<usize> {
        selection
            .iter()
            .copied()
            .filter(|&i| self.get(i).is_some())
            .collect()
    }
}

impl FromIterator<Atom> for AtomSlots {
    fn from_iter<T: IntoIterator<Item = Atom>>(iter: T) -> Self {
        let mut slots = Self::new();
        for atom in iter {
            let _ = slots.push(atom);
        }
        slots
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn removal_keeps_indices_stable() {
        let mut atoms: AtomSlots = (0..4)
            .map(|i| Atom::new(Vec3::splat(i as f32), "C"))
            .collect();
        assert!(atoms.remove(1).is_some());
        assert!(atoms.remove(1).is_none());

        assert_eq!(atoms.slot_count(), 4);
        assert_eq!(atoms.len(), 3);
        assert_eq!(atoms.get(2).unwrap().index, 2);
        assert_eq!(atoms.present(&[0, 1, 2, 3, 9]), vec![0, 2, 3]);
        assert!(atoms.select(&[1])[0].is_none());
    }

    #[test]
    fn surface_color_overrides_base_color() {
        let mut atom = Atom::new(Vec3::ZERO, "O").with_color([1.0, 0.0, 0.0]);
        assert_eq!(atom.surface_display_color(), Some([1.0, 0.0, 0.0]));
        atom.surface_color = Some([0.0, 0.0, 1.0]);
        assert_eq!(atom.surface_display_color(), Some([0.0, 0.0, 1.0]));
        assert_eq!(Atom::new(Vec3::ZERO, "N").surface_display_color(), None);
    }
}
