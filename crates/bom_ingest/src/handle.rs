use std::sync::{mpsc, Arc};
use std::thread;
use std::time::Duration;

use ingest_logging::ingest_debug;
use tokio_util::sync::CancellationToken;

use crate::engine::{EngineSettings, IngestionEngine};
use crate::sink::ChannelSink;
use crate::transport::{Transport, Upload};
use crate::{IngestError, RunUpdate};

enum EngineCommand {
    Start {
        upload: Upload,
        sink: ChannelSink,
        cancel: CancellationToken,
    },
}

/// Runs the engine on a background thread and exposes its updates as a queue.
///
/// Runs execute one after another. Starting a run cancels the active one and
/// switches to a fresh update queue, so updates of different runs never mix.
pub struct EngineHandle {
    cmd_tx: mpsc::Sender<EngineCommand>,
    update_rx: mpsc::Receiver<RunUpdate>,
    active: Option<CancellationToken>,
}

impl EngineHandle {
    pub fn new(transport: Arc<dyn Transport>, settings: EngineSettings) -> Result<Self, IngestError> {
        let (cmd_tx, cmd_rx) = mpsc::channel::<EngineCommand>();
        // Idle until the first run starts.
        let (_, update_rx) = mpsc::channel();
        let runtime = tokio::runtime::Builder::new_current_thread()
            .enable_all()
            .build()?;
        let engine = IngestionEngine::new(transport, settings);

        thread::spawn(move || {
            while let Ok(command) = cmd_rx.recv() {
                match command {
                    EngineCommand::Start {
                        upload,
                        sink,
                        cancel,
                    } => {
                        // Errors are published to the sink by the engine itself.
                        let result = runtime.block_on(engine.run(&upload, &sink, &cancel));
                        ingest_debug!("engine thread finished run: ok={}", result.is_ok());
                    }
                }
            }
        });

        Ok(Self {
            cmd_tx,
            update_rx,
            active: None,
        })
    }

    /// Start a new run, cancelling the active one.
    pub fn start(&mut self, upload: Upload) {
        self.cancel();
        let (update_tx, update_rx) = mpsc::channel();
        let cancel = CancellationToken::new();
        self.update_rx = update_rx;
        self.active = Some(cancel.clone());
        let _ = self.cmd_tx.send(EngineCommand::Start {
            upload,
            sink: ChannelSink::new(update_tx),
            cancel,
        });
    }

    /// Request cancellation of the active run. No further updates are published for it.
    pub fn cancel(&mut self) {
        if let Some(cancel) = self.active.take() {
            cancel.cancel();
        }
    }

    pub fn try_recv(&self) -> Option<RunUpdate> {
        self.update_rx.try_recv().ok()
    }

    /// Block until the next update. `None` once the run's updates are exhausted
    /// and its sink is gone, or if no run was started.
    pub fn recv(&self) -> Option<RunUpdate> {
        self.update_rx.recv().ok()
    }

    /// Wait up to `timeout` for the next update.
    pub fn recv_timeout(&self, timeout: Duration) -> Option<RunUpdate> {
        self.update_rx.recv_timeout(timeout).ok()
    }
}

impl Drop for EngineHandle {
    fn drop(&mut self) {
        self.cancel();
    }
}
