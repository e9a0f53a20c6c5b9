//! Handle geometry and drop position math

use std::collections::HashMap;

use parking_lot::RwLock;
use serde::{Deserialize, Serialize};

/// Direction sections are laid out in
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum Axis {
    /// Top to bottom
    #[default]
    Vertical,
    /// Left to right
    Horizontal,
}

/// Pointer location in the same coordinate space as [`SectionBounds`]
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct PointerPosition {
    /// Horizontal coordinate
    pub x: f64,
    /// Vertical coordinate
    pub y: f64,
}

impl PointerPosition {
    /// Create a pointer position
    pub fn new(x: f64, y: f64) -> Self {
        Self { x, y }
    }
}

/// Rectangle occupied by a section's handle
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct SectionBounds {
    /// Left edge
    pub x: f64,
    /// Top edge
    pub y: f64,
    /// Width
    pub width: f64,
    /// Height
    pub height: f64,
}

impl SectionBounds {
    /// Create bounds
    pub fn new(x: f64, y: f64, width: f64, height: f64) -> Self {
        Self {
            x,
            y,
            width,
            height,
        }
    }

    /// Centre line along `axis`
    pub fn midpoint(&self, axis: Axis) -> f64 {
        match axis {
            Axis::Vertical => self.y + self.height / 2.0,
            Axis::Horizontal => self.x + self.width / 2.0,
        }
    }
}

/// Which side of the target the dragged section lands on
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum DropPosition {
    /// Immediately before the target
    Before,
    /// Immediately after the target
    After,
}

impl DropPosition {
    /// Before when the pointer is short of the target's midpoint, After otherwise
    pub fn from_pointer(pointer: PointerPosition, bounds: &SectionBounds, axis: Axis) -> Self {
        let coordinate = match axis {
            Axis::Vertical => pointer.y,
            Axis::Horizontal => pointer.x,
        };
        if coordinate < bounds.midpoint(axis) {
            DropPosition::Before
        } else {
            DropPosition::After
        }
    }
}

/// Index the dragged section ends up at, for use with `DocumentStore::reorder`
///
/// `from` is the dragged section's index and `target` the index of the section
/// it was dropped on. Returns `from` when the section would not move.
pub fn destination_index(from: usize, target: usize, position: DropPosition) -> usize {
    use std::cmp::Ordering;

    match (from.cmp(&target), position) {
        (Ordering::Equal, _) => from,
        (Ordering::Less, DropPosition::Before) => target - 1,
        (Ordering::Less, DropPosition::After) => target,
        (Ordering::Greater, DropPosition::Before) => target,
        (Ordering::Greater, DropPosition::After) => target + 1,
    }
}

/// Supplies the on-screen bounds of section handles
///
/// Implemented by the UI layer; the controller only needs a lookup by id.
pub trait HandleGeometry: Send + Sync {
    /// Bounds of the handle for `section_id`, if it is currently laid out
    fn bounds(&self, section_id: &str) -> Option<SectionBounds>;
}

/// Geometry backed by a table of known bounds
#[derive(Debug, Default)]
pub struct StaticGeometry {
    bounds: RwLock<HashMap<String, SectionBounds>>,
}

impl StaticGeometry {
    /// Create an empty table
    pub fn new() -> Self {
        Self::default()
    }

    /// Lay `ids` out as equally sized handles along `axis`, starting at the origin
    pub fn stacked<I, S>(ids: I, axis: Axis, extent: f64) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        let geometry = Self::new();
        for (i, id) in ids.into_iter().enumerate() {
            let offset = i as f64 * extent;
            let bounds = match axis {
                Axis::Vertical => SectionBounds::new(0.0, offset, 100.0, extent),
                Axis::Horizontal => SectionBounds::new(offset, 0.0, extent, 100.0),
            };
            geometry.set(id, bounds);
        }
        geometry
    }

    /// Record the bounds for a section
    pub fn set(&self, section_id: impl Into<String>, bounds: SectionBounds) {
        self.bounds.write().insert(section_id.into(), bounds);
    }

    /// Forget a section
    pub fn remove(&self, section_id: &str) -> Option<SectionBounds> {
        self.bounds.write().remove(section_id)
    }
}

impl HandleGeometry for StaticGeometry {
    fn bounds(&self, section_id: &str) -> Option<SectionBounds> {
        self.bounds.read().get(section_id).copied()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn moved(ids: &[&str], from: usize, target: usize, position: DropPosition) -> Vec<String> {
        let mut ids: Vec<String> = ids.iter().map(|s| s.to_string()).collect();
        let to = destination_index(from, target, position);
        let item = ids.remove(from);
        ids.insert(to, item);
        ids
    }

    #[test]
    fn test_index_law_on_four_sections() {
        let ids = ["A", "B", "C", "D"];
        assert_eq!(moved(&ids, 0, 2, DropPosition::Before), ["B", "A", "C", "D"]);
        assert_eq!(moved(&ids, 0, 2, DropPosition::After), ["B", "C", "A", "D"]);
        assert_eq!(moved(&ids, 3, 1, DropPosition::Before), ["A", "D", "B", "C"]);
        assert_eq!(moved(&ids, 3, 1, DropPosition::After), ["A", "B", "D", "C"]);
        assert_eq!(destination_index(0, 0, DropPosition::After), 0);
    }

    #[test]
    fn test_adjacent_drop_can_be_a_no_op() {
        // A onto the top half of B stays where it is
        assert_eq!(destination_index(0, 1, DropPosition::Before), 0);
        // C onto the bottom half of B stays where it is
        assert_eq!(destination_index(2, 1, DropPosition::After), 2);
    }

    #[test]
    fn test_drop_position_from_pointer() {
        let bounds = SectionBounds::new(0.0, 40.0, 200.0, 40.0);
        assert_eq!(
            DropPosition::from_pointer(PointerPosition::new(10.0, 45.0), &bounds, Axis::Vertical),
            DropPosition::Before
        );
        assert_eq!(
            DropPosition::from_pointer(PointerPosition::new(10.0, 60.0), &bounds, Axis::Vertical),
            DropPosition::After
        );
        assert_eq!(
            DropPosition::from_pointer(PointerPosition::new(150.0, 0.0), &bounds, Axis::Horizontal),
            DropPosition::After
        );
    }

    #[test]
    fn test_stacked_geometry() {
        let geometry = StaticGeometry::stacked(["a", "b"], Axis::Horizontal, 50.0);
        let b = geometry.bounds("b").unwrap();
        assert_eq!(b.x, 50.0);
        assert_eq!(b.midpoint(Axis::Horizontal), 75.0);

        assert!(geometry.remove("a").is_some());
        assert!(geometry.bounds("a").is_none());
    }
}

#[cfg(test)]
mod property_tests {
    use super::*;
    use proptest::prelude::*;

    fn position() -> impl Strategy<Value = DropPosition> {
        prop_oneof![Just(DropPosition::Before), Just(DropPosition::After)]
    }

    proptest! {
        #[test]
        fn prop_dragged_lands_beside_target(
            (len, from, target) in (2usize..12).prop_flat_map(|len| (Just(len), 0..len, 0..len)),
            position in position(),
        ) {
            prop_assume!(from != target);
            let mut items: Vec<usize> = (0..len).collect();
            let to = destination_index(from, target, position);
            prop_assert!(to < len);

            let item = items.remove(from);
            items.insert(to, item);

            let target_now = items.iter().position(|&i| i == target).unwrap();
            match position {
                DropPosition::Before => {
                    prop_assert_eq!(target_now, to + 1);
                }
                DropPosition::After => {
                    prop_assert_eq!(target_now + 1, to);
                }
            }
        }
    }
}
