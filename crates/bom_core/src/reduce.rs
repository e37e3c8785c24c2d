use crate::{normalize_part_number, Enrichment, Event, PartCollection, PartStatus};

/// What a reduced event did to the collection.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Transition {
    /// The collection was replaced by a fresh seed.
    Seeded,
    /// One record moved to a new status.
    Updated { from: PartStatus, to: PartStatus },
    /// Unknown id, illegal transition, or nothing to do.
    Ignored,
}

impl Transition {
    pub fn changed(self) -> bool {
        !matches!(self, Transition::Ignored)
    }
}

/// Pure reducer: applies an event to the collection and reports the transition.
///
/// Total over all inputs. A repeated `Initial` resets the collection.
pub fn reduce(mut collection: PartCollection, event: &Event) -> (PartCollection, Transition) {
    let transition = match event {
        Event::Initial { part_numbers } => {
            collection = PartCollection::seed(part_numbers);
            Transition::Seeded
        }
        Event::Searching { part_number } => {
            advance(&mut collection, part_number, PartStatus::Searching, None)
        }
        Event::Processed {
            part_number,
            enrichment,
        } => advance(
            &mut collection,
            part_number,
            PartStatus::Identified,
            Some(enrichment),
        ),
        Event::Error { part_number } => {
            advance(&mut collection, part_number, PartStatus::Failed, None)
        }
    };

    (collection, transition)
}

/// [`reduce`] without the transition report.
pub fn apply(collection: PartCollection, event: &Event) -> PartCollection {
    reduce(collection, event).0
}

fn advance(
    collection: &mut PartCollection,
    part_number: &str,
    next: PartStatus,
    enrichment: Option<&Enrichment>,
) -> Transition {
    let Some(id) = normalize_part_number(part_number) else {
        return Transition::Ignored;
    };
    let Some(record) = collection.get_mut(&id) else {
        return Transition::Ignored;
    };
    let from = record.status;
    if !from.can_transition_to(next) {
        return Transition::Ignored;
    }

    record.status = next;
    if let Some(enrichment) = enrichment {
        if enrichment.product_type.is_some() {
            record.product_type = enrichment.product_type.clone();
        }
        if enrichment.manufacturer.is_some() {
            record.manufacturer = enrichment.manufacturer.clone();
        }
    }

    Transition::Updated { from, to: next }
}
