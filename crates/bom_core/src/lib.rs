//! BOM core: part records, identification events and the pure status reducer.
mod event;
mod reduce;
mod state;
mod view_model;

pub use event::{Enrichment, Event};
pub use reduce::{apply, reduce, Transition};
pub use state::{normalize_part_number, PartCollection, PartId, PartRecord, PartStatus};
pub use view_model::{CollectionView, PartRowView, StatusCounts};
