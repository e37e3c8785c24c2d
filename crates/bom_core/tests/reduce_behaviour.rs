use std::sync::Once;

use bom_core::{apply, reduce, Enrichment, Event, PartCollection, PartRecord, PartStatus, Transition};
use pretty_assertions::assert_eq;

fn init_logging() {
    static INIT: Once = Once::new();
    INIT.call_once(ingest_logging::initialize_for_tests);
}

fn initial(parts: &[&str]) -> Event {
    Event::Initial {
        part_numbers: parts.iter().map(|p| p.to_string()).collect(),
    }
}

fn processed(part: &str, product_type: &str, manufacturer: &str) -> Event {
    Event::Processed {
        part_number: part.to_string(),
        enrichment: Enrichment {
            product_type: Some(product_type.to_string()),
            manufacturer: Some(manufacturer.to_string()),
        },
    }
}

fn error(part: &str) -> Event {
    Event::Error {
        part_number: part.to_string(),
    }
}

fn searching(part: &str) -> Event {
    Event::Searching {
        part_number: part.to_string(),
    }
}

fn record(id: &str, status: PartStatus) -> PartRecord {
    PartRecord {
        id: id.to_string(),
        part_number: id.to_string(),
        product_type: None,
        manufacturer: None,
        status,
    }
}

fn statuses(collection: &PartCollection) -> Vec<(&str, PartStatus)> {
    collection
        .records()
        .iter()
        .map(|r| (r.id.as_str(), r.status))
        .collect()
}

#[test]
fn initial_then_processed_enriches_only_the_target() {
    init_logging();
    let collection = apply(PartCollection::new(), &initial(&["P1", "P2"]));
    assert_eq!(
        collection.records(),
        &[
            record("P1", PartStatus::Pending),
            record("P2", PartStatus::Pending)
        ]
    );

    let collection = apply(collection, &processed("P2", "R", "M"));
    assert_eq!(
        collection.records(),
        &[
            record("P1", PartStatus::Pending),
            PartRecord {
                product_type: Some("R".to_string()),
                manufacturer: Some("M".to_string()),
                ..record("P2", PartStatus::Identified)
            },
        ]
    );
}

#[test]
fn failed_is_sticky() {
    init_logging();
    let collection = apply(PartCollection::new(), &initial(&["P1"]));
    let collection = apply(collection, &error("P1"));
    assert_eq!(collection.records(), &[record("P1", PartStatus::Failed)]);

    let (collection, transition) = reduce(collection, &processed("P1", "R", "M"));
    assert_eq!(collection.records(), &[record("P1", PartStatus::Failed)]);
    assert_eq!(transition, Transition::Ignored);
}

#[test]
fn identified_is_sticky() {
    init_logging();
    let collection = apply(PartCollection::new(), &initial(&["P1"]));
    let collection = apply(collection, &processed("P1", "R", "M"));
    let before = collection.clone();

    let collection = apply(collection, &error("P1"));
    let collection = apply(collection, &searching("P1"));
    let collection = apply(collection, &processed("P1", "Other", "Other"));

    assert_eq!(collection, before);
}

#[test]
fn repeated_terminal_events_are_idempotent() {
    init_logging();
    let seeded = apply(PartCollection::new(), &initial(&["P1", "P2"]));

    for event in [processed("P1", "R", "M"), error("P2")] {
        let once = apply(seeded.clone(), &event);
        let twice = apply(once.clone(), &event);
        assert_eq!(once, twice);
    }
}

#[test]
fn record_order_follows_initial_list_not_completion_order() {
    init_logging();
    let mut collection = apply(PartCollection::new(), &initial(&["C", "A", "B"]));
    for event in [error("B"), processed("C", "R", "M"), processed("A", "L", "N")] {
        collection = apply(collection, &event);
    }

    assert_eq!(
        statuses(&collection),
        vec![
            ("C", PartStatus::Identified),
            ("A", PartStatus::Identified),
            ("B", PartStatus::Failed),
        ]
    );
}

#[test]
fn second_initial_resets_the_collection() {
    init_logging();
    let collection = apply(PartCollection::new(), &initial(&["P1", "P2"]));
    let collection = apply(collection, &error("P1"));

    let (collection, transition) = reduce(collection, &initial(&["P3", "P1"]));

    assert_eq!(transition, Transition::Seeded);
    assert_eq!(
        statuses(&collection),
        vec![("P3", PartStatus::Pending), ("P1", PartStatus::Pending)]
    );
}

#[test]
fn searching_then_terminal_reports_each_step() {
    init_logging();
    let collection = apply(PartCollection::new(), &initial(&["P1"]));

    let (collection, transition) = reduce(collection, &searching("P1"));
    assert_eq!(
        transition,
        Transition::Updated {
            from: PartStatus::Pending,
            to: PartStatus::Searching
        }
    );

    let (collection, transition) = reduce(collection, &searching("P1"));
    assert_eq!(transition, Transition::Ignored);

    let (collection, transition) = reduce(collection, &error("P1"));
    assert_eq!(
        transition,
        Transition::Updated {
            from: PartStatus::Searching,
            to: PartStatus::Failed
        }
    );
    assert!(collection.is_settled());
}

#[test]
fn duplicate_part_numbers_merge_into_one_record() {
    init_logging();
    let collection = apply(PartCollection::new(), &initial(&["P1", "P2", " P1"]));
    assert_eq!(collection.len(), 2);

    let collection = apply(collection, &processed(" P1 ", "R", "M"));
    assert_eq!(
        statuses(&collection),
        vec![("P1", PartStatus::Identified), ("P2", PartStatus::Pending)]
    );
}

#[test]
fn processed_without_enrichment_keeps_fields_empty() {
    init_logging();
    let collection = apply(PartCollection::new(), &initial(&["P1"]));
    let collection = apply(
        collection,
        &Event::Processed {
            part_number: "P1".to_string(),
            enrichment: Enrichment::default(),
        },
    );

    assert_eq!(collection.records(), &[record("P1", PartStatus::Identified)]);
}

#[test]
fn view_reports_counts_in_record_order() {
    init_logging();
    let collection = apply(PartCollection::new(), &initial(&["P1", "P2", "P3"]));
    let collection = apply(collection, &processed("P3", "Capacitor", "Murata"));
    let collection = apply(collection, &searching("P2"));

    let view = collection.view();
    let parts: Vec<_> = view.rows.iter().map(|r| r.part_number.as_str()).collect();
    assert_eq!(parts, vec!["P1", "P2", "P3"]);
    assert_eq!(view.rows[2].product_type, "Capacitor");
    assert_eq!(view.counts.pending, 1);
    assert_eq!(view.counts.searching, 1);
    assert_eq!(view.counts.identified, 1);
    assert_eq!(view.counts.unresolved(), 2);
    assert_eq!(view.counts.total(), 3);
}

#[test]
fn records_serialize_with_wire_field_names() {
    let collection = apply(PartCollection::new(), &initial(&["P1"]));
    let collection = apply(collection, &processed("P1", "R", "M"));

    let json = serde_json::to_value(collection.records()).unwrap();
    assert_eq!(
        json,
        serde_json::json!([{
            "id": "P1",
            "partNumber": "P1",
            "productType": "R",
            "manufacturer": "M",
            "status": "identified"
        }])
    );
}
