pub mod file;

use std::collections::{BTreeSet, HashMap};

use crate::error::{PipelineError, Result};
use crate::types::{Identifier, RawInteraction, TrainingExample};

pub use file::MappingFile;

/// Bidirectional map between opaque identifiers and dense indices `0..n`.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct IdMapping {
    forward: HashMap<Identifier, u32>,
    inverse: Vec<Identifier>,
}

impl IdMapping {
    /// Assign indices in sorted identifier order (see `Identifier`'s `Ord`).
    /// Duplicates collapse to one entry.
    pub fn from_ids<'a>(ids: impl IntoIterator<Item = &'a Identifier>) -> Self {
        let distinct: BTreeSet<&Identifier> = ids.into_iter().collect();
        let inverse: Vec<Identifier> = distinct.into_iter().cloned().collect();
        Self::from_inverse(inverse)
    }

    /// Build from an inverse table. Callers guarantee uniqueness.
    fn from_inverse(inverse: Vec<Identifier>) -> Self {
        let forward = inverse
            .iter()
            .enumerate()
            .map(|(idx, id)| (id.clone(), idx as u32))
            .collect();
        Self { forward, inverse }
    }

    /// Rebuild from `(index, id)` pairs, rejecting gaps and duplicate ids.
    pub fn from_entries(
        entries: impl IntoIterator<Item = (usize, Identifier)>,
    ) -> std::result::Result<Self, String> {
        let entries: Vec<(usize, Identifier)> = entries.into_iter().collect();
        let mut slots: Vec<Option<Identifier>> = vec![None; entries.len()];
        for (idx, id) in entries {
            // n entries must cover exactly 0..n.
            let Some(slot) = slots.get_mut(idx) else {
                return Err(format!("index {idx} out of range for {} entries", slots.len()));
            };
            if slot.replace(id).is_some() {
                return Err(format!("index {idx} assigned twice"));
            }
        }
        let inverse = slots
            .into_iter()
            .enumerate()
            .map(|(idx, slot)| {
                slot.ok_or_else(|| format!("index space has a gap at {idx}"))
            })
            .collect::<std::result::Result<Vec<_>, _>>()?;

        let mapping = Self::from_inverse(inverse);
        if mapping.forward.len() != mapping.inverse.len() {
            return Err("identifier mapped to more than one index".to_string());
        }
        Ok(mapping)
    }

    pub fn len(&self) -> usize {
        self.inverse.len()
    }

    pub fn is_empty(&self) -> bool {
        self.inverse.is_empty()
    }

    pub fn index_of(&self, id: &Identifier) -> Option<u32> {
        self.forward.get(id).copied()
    }

    pub fn id_of(&self, index: usize) -> Option<&Identifier> {
        self.inverse.get(index)
    }

    /// `(index, id)` pairs in index order.
    pub fn iter(&self) -> impl Iterator<Item = (usize, &Identifier)> {
        self.inverse.iter().enumerate()
    }
}

/// Output of the mapping stage.
#[derive(Debug, Clone)]
pub struct MappedInteractions {
    pub examples: Vec<TrainingExample>,
    pub users: IdMapping,
    pub items: IdMapping,
}

/// Map raw rows to dense training examples. Output order matches input order
/// one-to-one.
pub fn map_interactions(rows: &[RawInteraction]) -> Result<MappedInteractions> {
    if rows.is_empty() {
        return Err(PipelineError::EmptyInput);
    }

    let users = IdMapping::from_ids(rows.iter().map(|r| &r.user_id));
    let items = IdMapping::from_ids(rows.iter().map(|r| &r.item_id));

    let examples = rows
        .iter()
        .map(|r| TrainingExample {
            // Both ids were inserted above.
            user_index: users.forward[&r.user_id],
            item_index: items.forward[&r.item_id],
            label: r.label,
        })
        .collect();

    Ok(MappedInteractions {
        examples,
        users,
        items,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::fallback_interactions;

    fn assert_contiguous_inverse(mapping: &IdMapping) {
        for (idx, id) in mapping.iter() {
            assert_eq!(mapping.index_of(id), Some(idx as u32));
        }
        assert_eq!(mapping.forward.len(), mapping.len());
    }

    #[test]
    fn empty_input_rejected() {
        assert!(matches!(map_interactions(&[]), Err(PipelineError::EmptyInput)));
    }

    #[test]
    fn fallback_maps_to_sorted_indices() {
        let mapped = map_interactions(&fallback_interactions()).unwrap();
        assert_eq!(mapped.users.len(), 3);
        assert_eq!(mapped.items.len(), 3);
        assert_eq!(mapped.examples.len(), 5);

        assert_eq!(mapped.items.id_of(0), Some(&Identifier::Int(155)));
        assert_eq!(mapped.items.id_of(1), Some(&Identifier::Int(550)));
        assert_eq!(mapped.items.id_of(2), Some(&Identifier::Int(27205)));
        assert_eq!(mapped.users.index_of(&"user-2".into()), Some(1));

        let first = mapped.examples[0];
        assert_eq!((first.user_index, first.item_index, first.label), (0, 1, 1.0));
    }

    #[test]
    fn forward_and_inverse_agree() {
        let rows: Vec<RawInteraction> = (0..50)
            .map(|i| {
                RawInteraction::new(
                    format!("user-{}", (i * 7) % 13).as_str(),
                    (i * 31) % 17,
                    "CLICK",
                    0.5,
                )
            })
            .collect();
        let mapped = map_interactions(&rows).unwrap();
        assert_contiguous_inverse(&mapped.users);
        assert_contiguous_inverse(&mapped.items);
        assert_eq!(mapped.users.len(), 13);
        assert_eq!(mapped.items.len(), 17);

        for (row, ex) in rows.iter().zip(&mapped.examples) {
            assert_eq!(mapped.users.id_of(ex.user_index as usize), Some(&row.user_id));
            assert_eq!(mapped.items.id_of(ex.item_index as usize), Some(&row.item_id));
        }
    }

    #[test]
    fn mixed_identifier_types() {
        let rows = vec![
            RawInteraction::new("abc", "tt-1", "CLICK", 1.0),
            RawInteraction::new(42, 7, "CLICK", 0.0),
        ];
        let mapped = map_interactions(&rows).unwrap();
        assert_eq!(mapped.users.id_of(0), Some(&Identifier::Int(42)));
        assert_eq!(mapped.users.id_of(1), Some(&Identifier::from("abc")));
        assert_eq!(mapped.items.id_of(0), Some(&Identifier::Int(7)));
    }

    #[test]
    fn entries_with_gap_rejected() {
        let err = IdMapping::from_entries([(0, Identifier::Int(1)), (2, Identifier::Int(3))])
            .unwrap_err();
        assert!(err.contains("index 2 out of range"));
    }

    #[test]
    fn entries_with_duplicate_id_rejected() {
        let err = IdMapping::from_entries([(0, Identifier::Int(1)), (1, Identifier::Int(1))])
            .unwrap_err();
        assert!(err.contains("more than one index"));
    }

    #[test]
    fn entries_with_oversized_index_rejected() {
        let entries = vec![(0, Identifier::Int(1)), (usize::MAX, Identifier::Int(3))];
        let err = IdMapping::from_entries(entries).unwrap_err();
        assert!(err.contains("out of range for 2 entries"));

        let err = IdMapping::from_entries(vec![(4_000_000_000, Identifier::Int(1))]).unwrap_err();
        assert!(err.contains("out of range"));
    }

    #[test]
    fn entries_out_of_order_accepted() {
        let mapping =
            IdMapping::from_entries([(1, Identifier::from("b")), (0, Identifier::from("a"))])
                .unwrap();
        assert_eq!(mapping.id_of(0), Some(&Identifier::from("a")));
        assert_eq!(mapping.index_of(&"b".into()), Some(1));
    }
}
