#![allow(dead_code)]

use std::collections::HashMap;
use std::sync::{Mutex, Once};

use bom_core::PartCollection;
use bom_ingest::{
    ByteStream, LookupResponse, RunUpdate, SnapshotSink, Transport, TransportError,
    TransportFailure, Upload,
};
use bytes::Bytes;
use futures_util::{stream, StreamExt};

pub fn init_logging() {
    static INIT: Once = Once::new();
    INIT.call_once(ingest_logging::initialize_for_tests);
}

pub fn upload() -> Upload {
    Upload::new("bom.xlsx", b"PK\x03\x04".to_vec()).unwrap()
}

pub fn frame(json: &str) -> String {
    format!("data: {json}\n\n")
}

pub fn identified(product_type: &str, manufacturer: &str) -> LookupResponse {
    LookupResponse {
        status: "identified".to_string(),
        product_type: Some(product_type.to_string()),
        manufacturer: Some(manufacturer.to_string()),
        error: None,
    }
}

pub fn network_error() -> TransportError {
    TransportError::new(TransportFailure::Network, "connection reset")
}

/// In-memory backend with canned responses.
#[derive(Default)]
pub struct ScriptedTransport {
    pub chunks: Vec<Result<Bytes, TransportError>>,
    /// Keep the stream open after the scripted chunks.
    pub hang_after_chunks: bool,
    pub open_error: Option<TransportError>,
    pub part_list: Option<Result<Vec<String>, TransportError>>,
    pub lookups: HashMap<String, Result<LookupResponse, TransportError>>,
    pub requested: Mutex<Vec<String>>,
}

impl ScriptedTransport {
    pub fn streaming(chunks: Vec<Vec<u8>>) -> Self {
        Self {
            chunks: chunks.into_iter().map(|c| Ok(Bytes::from(c))).collect(),
            ..Self::default()
        }
    }

    pub fn polling(parts: &[&str]) -> Self {
        Self {
            part_list: Some(Ok(parts.iter().map(|p| p.to_string()).collect())),
            ..Self::default()
        }
    }

    pub fn with_lookup(
        mut self,
        part_number: &str,
        result: Result<LookupResponse, TransportError>,
    ) -> Self {
        self.lookups.insert(part_number.to_string(), result);
        self
    }

    pub fn requested(&self) -> Vec<String> {
        self.requested.lock().unwrap().clone()
    }
}

#[async_trait::async_trait]
impl Transport for ScriptedTransport {
    async fn open_stream(&self, _upload: &Upload) -> Result<ByteStream, TransportError> {
        if let Some(err) = &self.open_error {
            return Err(err.clone());
        }
        let chunks = stream::iter(self.chunks.clone());
        if self.hang_after_chunks {
            Ok(chunks.chain(stream::pending()).boxed())
        } else {
            Ok(chunks.boxed())
        }
    }

    async fn fetch_part_list(&self, _upload: &Upload) -> Result<Vec<String>, TransportError> {
        self.part_list.clone().unwrap_or_else(|| Ok(Vec::new()))
    }

    async fn identify(&self, part_number: &str) -> Result<LookupResponse, TransportError> {
        self.requested.lock().unwrap().push(part_number.to_string());
        self.lookups
            .get(part_number)
            .cloned()
            .unwrap_or_else(|| Err(network_error()))
    }
}

#[derive(Default)]
pub struct RecordingSink {
    updates: Mutex<Vec<RunUpdate>>,
}

impl RecordingSink {
    pub fn updates(&self) -> Vec<RunUpdate> {
        self.updates.lock().unwrap().clone()
    }

    pub fn snapshots(&self) -> Vec<PartCollection> {
        self.updates()
            .into_iter()
            .filter_map(|update| match update {
                RunUpdate::Snapshot(collection) => Some(collection),
                _ => None,
            })
            .collect()
    }

    pub fn last_snapshot(&self) -> Option<PartCollection> {
        self.snapshots().pop()
    }
}

impl SnapshotSink for RecordingSink {
    fn publish(&self, update: RunUpdate) {
        self.updates.lock().unwrap().push(update);
    }
}
