//! The boundary to the constant pool compaction stage.
//!
//! The compactor owns the old → new index mapping; this crate only ever
//! consumes it through [`ConstantPoolRelocator`] and never interprets pool
//! contents itself.

use indexmap::IndexMap;

/// Failure owned by the relocator side of the boundary.
#[derive(Debug, Clone, PartialEq, Eq)]
#[non_exhaustive]
pub enum RelocateError {
    /// The index does not appear in the relocation map
    UnknownIndex { index: u16 },
}

/// Maps an index in the original constant pool to the corresponding index
/// in the compacted pool of the target machine.
pub trait ConstantPoolRelocator {
    fn relocate(&self, index: u16) -> Result<u16, RelocateError>;
}

/// Relocator backed by explicit old → new pairs, as read from a relocation
/// map file.
///
/// Identity mappings must be listed like any other: an index the map does
/// not mention is an error, so a stale map fails loudly instead of letting
/// wrong indices through.
#[derive(Debug, Clone, Default)]
pub struct MapRelocator {
    map: IndexMap<u16, u16>,
}
impl MapRelocator {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Returns the previously mapped value if `old` was already present.
    pub fn insert(&mut self, old: u16, new: u16) -> Option<u16> {
        self.map.insert(old, new)
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.map.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.map.is_empty()
    }
}
impl FromIterator<(u16, u16)> for MapRelocator {
    fn from_iter<I: IntoIterator<Item = (u16, u16)>>(iter: I) -> Self {
        Self {
            map: iter.into_iter().collect(),
        }
    }
}
impl ConstantPoolRelocator for MapRelocator {
    fn relocate(&self, index: u16) -> Result<u16, RelocateError> {
        self.map
            .get(&index)
            .copied()
            .ok_or(RelocateError::UnknownIndex { index })
    }
}

/// Everything the rewrite pass needs to know about the class it is
/// translating code for.
#[derive(Debug)]
pub struct RelocationContext<'r, R> {
    pub relocator: &'r R,
    /// Lowest relocated-index high byte that identifies a natively
    /// provided object rather than a pool entry
    pub lowest_native_id: u8,
}
impl<'r, R: ConstantPoolRelocator> RelocationContext<'r, R> {
    pub fn new(relocator: &'r R, lowest_native_id: u8) -> Self {
        Self {
            relocator,
            lowest_native_id,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::{ConstantPoolRelocator, MapRelocator, RelocateError};

    #[test]
    fn map_relocator_lookup() {
        let relocator: MapRelocator = [(3, 1), (5, 2)].into_iter().collect();
        assert_eq!(relocator.relocate(3), Ok(1));
        assert_eq!(relocator.relocate(5), Ok(2));
        assert_eq!(
            relocator.relocate(4),
            Err(RelocateError::UnknownIndex { index: 4 })
        );
    }

    #[test]
    fn insert_reports_replaced_entries() {
        let mut relocator = MapRelocator::new();
        assert_eq!(relocator.insert(3, 1), None);
        assert_eq!(relocator.insert(3, 2), Some(1));
        assert_eq!(relocator.relocate(3), Ok(2));
        assert_eq!(relocator.len(), 1);
    }
}
