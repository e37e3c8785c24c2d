use std::fs;
use std::num::NonZeroUsize;
use std::path::Path;
use std::time::Duration;

use bom_ingest::{
    DuplicatePolicy, EngineSettings, TrailingFramePolicy, TransportSettings, TransportStrategy,
};
use ingest_logging::{ingest_info, ingest_warn};
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, clap::ValueEnum)]
pub enum Mode {
    /// One streamed response carrying all results.
    Streamed,
    /// Part list first, then one lookup request per part.
    Polled,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct IngestConfig {
    pub base_url: String,
    pub mode: Mode,
    /// Concurrent lookups in polled mode.
    pub workers: usize,
    pub reject_duplicates: bool,
    pub discard_trailing_frame: bool,
    pub connect_timeout_secs: u64,
    pub request_timeout_secs: u64,
    pub read_timeout_secs: u64,
}

impl Default for IngestConfig {
    fn default() -> Self {
        let transport = TransportSettings::default();
        Self {
            base_url: transport.base_url,
            mode: Mode::Streamed,
            workers: 1,
            reject_duplicates: false,
            discard_trailing_frame: false,
            connect_timeout_secs: transport.connect_timeout.as_secs(),
            request_timeout_secs: transport.request_timeout.as_secs(),
            read_timeout_secs: transport.read_timeout.as_secs(),
        }
    }
}

impl IngestConfig {
    pub fn engine_settings(&self) -> EngineSettings {
        let strategy = match self.mode {
            Mode::Streamed => TransportStrategy::Streamed,
            Mode::Polled => TransportStrategy::Polled {
                workers: NonZeroUsize::new(self.workers).unwrap_or(NonZeroUsize::MIN),
            },
        };
        EngineSettings {
            strategy,
            duplicate_policy: if self.reject_duplicates {
                DuplicatePolicy::Reject
            } else {
                DuplicatePolicy::Coalesce
            },
            trailing_frame_policy: if self.discard_trailing_frame {
                TrailingFramePolicy::Discard
            } else {
                TrailingFramePolicy::Parse
            },
        }
    }

    pub fn transport_settings(&self) -> TransportSettings {
        TransportSettings {
            base_url: self.base_url.clone(),
            connect_timeout: Duration::from_secs(self.connect_timeout_secs),
            request_timeout: Duration::from_secs(self.request_timeout_secs),
            read_timeout: Duration::from_secs(self.read_timeout_secs),
            ..TransportSettings::default()
        }
    }
}

/// Load the RON config file. A missing file or unreadable content falls back to defaults.
pub fn load_config(path: &Path) -> IngestConfig {
    let content = match fs::read_to_string(path) {
        Ok(text) => text,
        Err(err) if err.kind() == std::io::ErrorKind::NotFound => {
            return IngestConfig::default();
        }
        Err(err) => {
            ingest_warn!("Failed to read config from {:?}: {}", path, err);
            return IngestConfig::default();
        }
    };

    match ron::from_str(&content) {
        Ok(config) => {
            ingest_info!("Loaded config from {:?}", path);
            config
        }
        Err(err) => {
            ingest_warn!("Failed to parse config from {:?}: {}", path, err);
            IngestConfig::default()
        }
    }
}
