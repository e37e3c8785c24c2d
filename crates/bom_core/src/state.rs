use std::collections::HashMap;
use std::fmt;

use serde::Serialize;

use crate::view_model::{CollectionView, PartRowView, StatusCounts};

/// Stable record identity: the normalized part number.
pub type PartId = String;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum PartStatus {
    Pending,
    Searching,
    Identified,
    Failed,
}

impl PartStatus {
    pub fn is_terminal(self) -> bool {
        matches!(self, PartStatus::Identified | PartStatus::Failed)
    }

    /// Whether `self -> next` is a legal step of the record state machine.
    ///
    /// `Searching` is optional: the streamed transport moves records from
    /// `Pending` straight to a terminal status.
    pub fn can_transition_to(self, next: PartStatus) -> bool {
        match (self, next) {
            (PartStatus::Pending, PartStatus::Searching) => true,
            (PartStatus::Pending | PartStatus::Searching, next) => next.is_terminal(),
            (PartStatus::Identified | PartStatus::Failed, _) => false,
        }
    }
}

impl fmt::Display for PartStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            PartStatus::Pending => write!(f, "pending"),
            PartStatus::Searching => write!(f, "searching"),
            PartStatus::Identified => write!(f, "identified"),
            PartStatus::Failed => write!(f, "failed"),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct PartRecord {
    pub id: PartId,
    pub part_number: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub product_type: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub manufacturer: Option<String>,
    pub status: PartStatus,
}

impl PartRecord {
    fn pending(part_number: String) -> Self {
        Self {
            id: part_number.clone(),
            part_number,
            product_type: None,
            manufacturer: None,
            status: PartStatus::Pending,
        }
    }
}

/// Trim surrounding whitespace; blank part numbers normalize to `None`.
pub fn normalize_part_number(raw: &str) -> Option<String> {
    let trimmed = raw.trim();
    if trimmed.is_empty() {
        None
    } else {
        Some(trimmed.to_owned())
    }
}

/// Ordered part records with id lookup.
///
/// Record order is fixed when the collection is seeded; later updates only
/// mutate records in place.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct PartCollection {
    records: Vec<PartRecord>,
    index: HashMap<PartId, usize>,
}

impl PartCollection {
    pub fn new() -> Self {
        Self::default()
    }

    /// Build a collection of pending records, coalescing repeated part numbers
    /// into the position of their first occurrence.
    pub fn seed<I, S>(part_numbers: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        let mut collection = Self::new();
        for raw in part_numbers {
            let Some(part_number) = normalize_part_number(raw.as_ref()) else {
                continue;
            };
            if collection.index.contains_key(&part_number) {
                continue;
            }
            collection
                .index
                .insert(part_number.clone(), collection.records.len());
            collection.records.push(PartRecord::pending(part_number));
        }
        collection
    }

    pub fn get(&self, id: &str) -> Option<&PartRecord> {
        self.index.get(id).map(|&idx| &self.records[idx])
    }

    pub(crate) fn get_mut(&mut self, id: &str) -> Option<&mut PartRecord> {
        self.index.get(id).map(|&idx| &mut self.records[idx])
    }

    pub fn records(&self) -> &[PartRecord] {
        &self.records
    }

    pub fn len(&self) -> usize {
        self.records.len()
    }

    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }

    pub fn ids(&self) -> impl Iterator<Item = &str> {
        self.records.iter().map(|record| record.id.as_str())
    }

    /// Records in a terminal status.
    pub fn settled_count(&self) -> usize {
        self.records
            .iter()
            .filter(|record| record.status.is_terminal())
            .count()
    }

    pub fn is_settled(&self) -> bool {
        self.records.iter().all(|record| record.status.is_terminal())
    }

    pub fn counts(&self) -> StatusCounts {
        let mut counts = StatusCounts::default();
        for record in &self.records {
            counts.add(record.status);
        }
        counts
    }

    pub fn view(&self) -> CollectionView {
        CollectionView {
            rows: self
                .records
                .iter()
                .map(|record| PartRowView {
                    part_number: record.part_number.clone(),
                    product_type: record.product_type.clone().unwrap_or_default(),
                    manufacturer: record.manufacturer.clone().unwrap_or_default(),
                    status: record.status,
                })
                .collect(),
            counts: self.counts(),
        }
    }
}
