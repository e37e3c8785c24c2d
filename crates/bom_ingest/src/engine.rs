use std::collections::HashSet;
use std::num::NonZeroUsize;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

use bom_core::{normalize_part_number, reduce, Enrichment, Event, PartCollection};
use futures_util::stream::FuturesUnordered;
use futures_util::StreamExt;
use ingest_logging::{ingest_debug, ingest_error, ingest_info, ingest_trace, ingest_warn};
use tokio_util::sync::CancellationToken;

use crate::frame::{FrameDecoder, TrailingFramePolicy};
use crate::transport::{LookupResponse, Transport, Upload};
use crate::{
    parse_frame, Frame, FrameDecodeError, IngestError, ItemLookupError, RunId, RunSummary,
    RunUpdate, SnapshotSink, TransportError,
};

static NEXT_RUN_ID: AtomicU64 = AtomicU64::new(1);

/// How part numbers reach the engine.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TransportStrategy {
    /// One long-lived response whose body is a frame stream.
    Streamed,
    /// A part-number list request followed by one lookup per part, with at
    /// most `workers` lookups in flight.
    Polled { workers: NonZeroUsize },
}

impl TransportStrategy {
    pub fn sequential_polling() -> Self {
        TransportStrategy::Polled {
            workers: NonZeroUsize::MIN,
        }
    }
}

/// Handling of repeated part numbers in the seed list.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum DuplicatePolicy {
    /// Merge repeats into the first occurrence.
    #[default]
    Coalesce,
    /// Fail the run when the opening seed repeats a part number, before
    /// anything is published. Later seeds with repeats are skipped.
    Reject,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct EngineSettings {
    pub strategy: TransportStrategy,
    pub duplicate_policy: DuplicatePolicy,
    pub trailing_frame_policy: TrailingFramePolicy,
}

impl Default for EngineSettings {
    fn default() -> Self {
        Self {
            strategy: TransportStrategy::Streamed,
            duplicate_policy: DuplicatePolicy::default(),
            trailing_frame_policy: TrailingFramePolicy::default(),
        }
    }
}

/// Drives one transport strategy through decode, parse and reduce, publishing
/// a snapshot after every event that changes the collection.
pub struct IngestionEngine {
    transport: Arc<dyn Transport>,
    settings: EngineSettings,
}

impl IngestionEngine {
    pub fn new(transport: Arc<dyn Transport>, settings: EngineSettings) -> Self {
        Self {
            transport,
            settings,
        }
    }

    /// Execute one run to completion, fatal failure or cancellation.
    ///
    /// A terminal `Finished` or `Failed` update is published unless the run
    /// was cancelled, in which case nothing is published after the request.
    pub async fn run(
        &self,
        upload: &Upload,
        sink: &dyn SnapshotSink,
        cancel: &CancellationToken,
    ) -> Result<RunSummary, IngestError> {
        let mut run = Run::new(
            NEXT_RUN_ID.fetch_add(1, Ordering::Relaxed),
            sink,
            cancel,
            self.settings.duplicate_policy,
        );
        ingest_info!(
            "run={} starting {:?} ingestion of {} ({} bytes)",
            run.id,
            self.settings.strategy,
            upload.file_name(),
            upload.bytes().len()
        );

        let result = match self.settings.strategy {
            TransportStrategy::Streamed => self.run_streamed(&mut run, upload).await,
            TransportStrategy::Polled { workers } => {
                self.run_polled(&mut run, upload, workers).await
            }
        };

        match result {
            Ok(()) => {
                // A cancel request after the last checkpoint still suppresses `Finished`.
                if cancel.is_cancelled() {
                    run.cancelled = true;
                }
                let summary = run.summary();
                if summary.cancelled {
                    ingest_info!("run={} cancelled: {:?}", run.id, summary);
                } else {
                    ingest_info!("run={} finished: {:?}", run.id, summary);
                    sink.publish(RunUpdate::Finished(summary.clone()));
                }
                Ok(summary)
            }
            Err(err) => {
                ingest_error!("run={} failed: {}", run.id, err);
                if !cancel.is_cancelled() {
                    sink.publish(RunUpdate::Failed(err.to_string()));
                }
                Err(err)
            }
        }
    }

    async fn run_streamed(&self, run: &mut Run<'_>, upload: &Upload) -> Result<(), IngestError> {
        let cancel = run.cancel.clone();
        let mut stream = tokio::select! {
            biased;
            _ = cancel.cancelled() => {
                run.cancelled = true;
                return Ok(());
            }
            opened = self.transport.open_stream(upload) => opened?,
        };

        let mut decoder = FrameDecoder::new(self.settings.trailing_frame_policy);
        loop {
            let next = tokio::select! {
                biased;
                _ = cancel.cancelled() => {
                    run.cancelled = true;
                    return Ok(());
                }
                next = stream.next() => next,
            };
            match next {
                Some(Ok(chunk)) => {
                    ingest_trace!("run={} received {} bytes", run.id, chunk.len());
                    let (frames, warning) = decoder.feed(&chunk);
                    if let Some(warning) = warning {
                        run.decode_warning(warning);
                    }
                    for frame in &frames {
                        run.handle_frame(frame)?;
                    }
                }
                Some(Err(err)) => return Err(err.into()),
                None => break,
            }
        }
        drop(stream);

        match decoder.flush() {
            Ok(Some(frame)) => run.handle_trailing_frame(&frame),
            Ok(None) => Ok(()),
            Err(warning) => {
                run.decode_warning(warning);
                Ok(())
            }
        }
    }

    async fn run_polled(
        &self,
        run: &mut Run<'_>,
        upload: &Upload,
        workers: NonZeroUsize,
    ) -> Result<(), IngestError> {
        let cancel = run.cancel.clone();
        let part_numbers = tokio::select! {
            biased;
            _ = cancel.cancelled() => {
                run.cancelled = true;
                return Ok(());
            }
            list = self.transport.fetch_part_list(upload) => list?,
        };
        ingest_info!("run={} received {} part numbers", run.id, part_numbers.len());
        run.apply(Event::Initial { part_numbers })?;

        let transport = self.transport.as_ref();
        let mut queue = run
            .collection
            .ids()
            .map(str::to_owned)
            .collect::<Vec<_>>()
            .into_iter();
        let mut in_flight = FuturesUnordered::new();

        loop {
            while in_flight.len() < workers.get() {
                if cancel.is_cancelled() {
                    run.cancelled = true;
                    return Ok(());
                }
                let Some(part_number) = queue.next() else {
                    break;
                };
                // Searching is published before the request goes out.
                run.apply(Event::Searching {
                    part_number: part_number.clone(),
                })?;
                in_flight.push(async move {
                    let result = transport.identify(&part_number).await;
                    (part_number, result)
                });
            }

            let completed = tokio::select! {
                biased;
                _ = cancel.cancelled() => {
                    run.cancelled = true;
                    return Ok(());
                }
                completed = in_flight.next() => completed,
            };
            let Some((part_number, result)) = completed else {
                return Ok(());
            };
            run.apply_lookup(part_number, result)?;
        }
    }
}

/// Mutable state of one run. Only the run task touches it.
struct Run<'a> {
    id: RunId,
    collection: PartCollection,
    sink: &'a dyn SnapshotSink,
    cancel: &'a CancellationToken,
    duplicate_policy: DuplicatePolicy,
    decode_warnings: usize,
    format_errors: usize,
    lookup_failures: usize,
    cancelled: bool,
    /// Whether any snapshot has gone out.
    published: bool,
}

impl<'a> Run<'a> {
    fn new(
        id: RunId,
        sink: &'a dyn SnapshotSink,
        cancel: &'a CancellationToken,
        duplicate_policy: DuplicatePolicy,
    ) -> Self {
        Self {
            id,
            collection: PartCollection::new(),
            sink,
            cancel,
            duplicate_policy,
            decode_warnings: 0,
            format_errors: 0,
            lookup_failures: 0,
            cancelled: false,
            published: false,
        }
    }

    fn apply(&mut self, event: Event) -> Result<(), IngestError> {
        if self.cancel.is_cancelled() {
            self.cancelled = true;
            return Ok(());
        }
        if let Event::Initial { part_numbers } = &event {
            if self.duplicate_policy == DuplicatePolicy::Reject {
                if let Some(duplicate) = first_duplicate(part_numbers) {
                    if !self.published {
                        return Err(IngestError::DuplicatePartNumber(duplicate));
                    }
                    // Later seeds are skipped like any malformed payload.
                    self.format_errors += 1;
                    ingest_warn!(
                        "run={} skipping initial event with duplicate part number {}",
                        self.id,
                        duplicate
                    );
                    return Ok(());
                }
            }
            if !self.collection.is_empty() {
                ingest_warn!("run={} received another initial event; resetting", self.id);
            }
        }

        let (collection, transition) = reduce(std::mem::take(&mut self.collection), &event);
        self.collection = collection;
        if transition.changed() {
            ingest_debug!(
                "run={} {} {:?}: {:?}",
                self.id,
                event.kind(),
                event.part_number(),
                transition
            );
            self.sink.publish(RunUpdate::Snapshot(self.collection.clone()));
            self.published = true;
        } else {
            ingest_debug!(
                "run={} ignored {} for {:?}",
                self.id,
                event.kind(),
                event.part_number()
            );
        }
        Ok(())
    }

    fn handle_frame(&mut self, frame: &Frame) -> Result<(), IngestError> {
        match parse_frame(frame) {
            Ok(Some(event)) => self.apply(event),
            Ok(None) => {
                ingest_trace!("run={} frame carries no event", self.id);
                Ok(())
            }
            Err(err) => {
                self.format_errors += 1;
                ingest_warn!("run={} skipping malformed frame: {}", self.id, err);
                Ok(())
            }
        }
    }

    fn handle_trailing_frame(&mut self, frame: &Frame) -> Result<(), IngestError> {
        match parse_frame(frame) {
            Ok(Some(event)) => {
                ingest_debug!("run={} applying unterminated trailing frame", self.id);
                self.apply(event)
            }
            Ok(None) => {
                self.decode_warning(FrameDecodeError::TrailingFrameRejected {
                    reason: "no recognised event".to_string(),
                });
                Ok(())
            }
            Err(err) => {
                self.decode_warning(FrameDecodeError::TrailingFrameRejected {
                    reason: err.to_string(),
                });
                Ok(())
            }
        }
    }

    fn apply_lookup(
        &mut self,
        part_number: String,
        result: Result<LookupResponse, TransportError>,
    ) -> Result<(), IngestError> {
        let event = match lookup_enrichment(result) {
            Ok(enrichment) => Event::Processed {
                part_number,
                enrichment,
            },
            Err(err) => {
                self.lookup_failures += 1;
                ingest_warn!("run={} lookup for {} failed: {}", self.id, part_number, err);
                Event::Error { part_number }
            }
        };
        self.apply(event)
    }

    fn decode_warning(&mut self, warning: FrameDecodeError) {
        self.decode_warnings += 1;
        ingest_warn!("run={} {}", self.id, warning);
    }

    fn summary(&self) -> RunSummary {
        let counts = self.collection.counts();
        RunSummary {
            run_id: self.id,
            total: counts.total(),
            identified: counts.identified,
            failed: counts.failed,
            unresolved: counts.unresolved(),
            decode_warnings: self.decode_warnings,
            format_errors: self.format_errors,
            lookup_failures: self.lookup_failures,
            cancelled: self.cancelled,
        }
    }
}

fn lookup_enrichment(
    result: Result<LookupResponse, TransportError>,
) -> Result<Enrichment, ItemLookupError> {
    let response = result?;
    match response.status.as_str() {
        "identified" => Ok(Enrichment {
            product_type: response.product_type,
            manufacturer: response.manufacturer,
        }),
        "failed" => Err(ItemLookupError::Rejected(
            response
                .error
                .unwrap_or_else(|| "no reason given".to_string()),
        )),
        other => Err(ItemLookupError::UnknownStatus(other.to_string())),
    }
}

fn first_duplicate(part_numbers: &[String]) -> Option<String> {
    let mut seen = HashSet::new();
    part_numbers
        .iter()
        .filter_map(|raw| normalize_part_number(raw))
        .find(|part_number| !seen.insert(part_number.clone()))
}
