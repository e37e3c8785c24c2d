/// Enrichment fields attached to an identified part.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct Enrichment {
    pub product_type: Option<String>,
    pub manufacturer: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Event {
    /// Seeds the collection, in listed order.
    Initial { part_numbers: Vec<String> },
    /// A lookup for the part has started (per-item transport only).
    Searching { part_number: String },
    /// The part was identified.
    Processed {
        part_number: String,
        enrichment: Enrichment,
    },
    /// Identification of the part failed.
    Error { part_number: String },
}

impl Event {
    /// Target part number for per-record events.
    pub fn part_number(&self) -> Option<&str> {
        match self {
            Event::Initial { .. } => None,
            Event::Searching { part_number }
            | Event::Processed { part_number, .. }
            | Event::Error { part_number } => Some(part_number),
        }
    }

    pub fn kind(&self) -> &'static str {
        match self {
            Event::Initial { .. } => "initial",
            Event::Searching { .. } => "searching",
            Event::Processed { .. } => "processed",
            Event::Error { .. } => "error",
        }
    }
}
