//! BOM ingest: frame decoding, event parsing, transports and the ingestion engine.
mod engine;
mod frame;
mod handle;
mod parse;
mod sink;
mod transport;
mod types;

pub use engine::{DuplicatePolicy, EngineSettings, IngestionEngine, TransportStrategy};
pub use frame::{Frame, FrameDecoder, TrailingFramePolicy, FRAME_DELIMITER};
pub use handle::EngineHandle;
pub use parse::{parse_frame, DATA_MARKER};
pub use sink::{ChannelSink, SnapshotSink};
pub use transport::{
    ByteStream, LookupResponse, ReqwestTransport, Transport, TransportSettings, Upload,
};
pub use types::{
    FrameDecodeError, FrameFormatError, IngestError, ItemLookupError, RunId, RunSummary,
    RunUpdate, TransportError, TransportFailure,
};
