use crate::PartStatus;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct StatusCounts {
    pub pending: usize,
    pub searching: usize,
    pub identified: usize,
    pub failed: usize,
}

impl StatusCounts {
    pub(crate) fn add(&mut self, status: PartStatus) {
        match status {
            PartStatus::Pending => self.pending += 1,
            PartStatus::Searching => self.searching += 1,
            PartStatus::Identified => self.identified += 1,
            PartStatus::Failed => self.failed += 1,
        }
    }

    pub fn total(&self) -> usize {
        self.pending + self.searching + self.identified + self.failed
    }

    /// Records still waiting on a terminal status.
    pub fn unresolved(&self) -> usize {
        self.pending + self.searching
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct CollectionView {
    pub rows: Vec<PartRowView>,
    pub counts: StatusCounts,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PartRowView {
    pub part_number: String,
    pub product_type: String,
    pub manufacturer: String,
    pub status: PartStatus,
}
