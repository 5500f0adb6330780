//! SinkHandle - one worker task and bounded queue per sink
//!
//! A slow sink fills its own queue and drops publications; it never stalls
//! the publish loop or the other sinks.

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

use contracts::{Publication, PublicationSink};
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tracing::{debug, error, instrument, warn};

/// Per-sink delivery counters
#[derive(Debug, Default)]
pub struct SinkCounters {
    written: AtomicU64,
    failed: AtomicU64,
    dropped: AtomicU64,
}

/// Point-in-time copy of [`SinkCounters`]
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct SinkCountersSnapshot {
    pub written: u64,
    pub failed: u64,
    pub dropped: u64,
}

impl SinkCounters {
    pub fn snapshot(&self) -> SinkCountersSnapshot {
        SinkCountersSnapshot {
            written: self.written.load(Ordering::Relaxed),
            failed: self.failed.load(Ordering::Relaxed),
            dropped: self.dropped.load(Ordering::Relaxed),
        }
    }
}

/// Handle to a running sink worker
pub struct SinkHandle {
    name: String,
    tx: mpsc::Sender<Publication>,
    counters: Arc<SinkCounters>,
    worker: JoinHandle<()>,
}

impl SinkHandle {
    /// Spawn the worker task of `sink`
    pub fn spawn<S: PublicationSink + Send + 'static>(sink: S, queue_capacity: usize) -> Self {
        let name = sink.name().to_string();
        let (tx, rx) = mpsc::channel(queue_capacity.max(1));
        let counters = Arc::new(SinkCounters::default());

        let worker = tokio::spawn(run_worker(sink, rx, Arc::clone(&counters), name.clone()));

        Self {
            name,
            tx,
            counters,
            worker,
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn counters(&self) -> SinkCountersSnapshot {
        self.counters.snapshot()
    }

    /// Queue a publication without waiting
    ///
    /// Returns false when the queue is full (publication dropped) or the
    /// worker is gone.
    pub fn offer(&self, publication: Publication) -> bool {
        match self.tx.try_send(publication) {
            Ok(()) => true,
            Err(mpsc::error::TrySendError::Full(p)) => {
                self.counters.dropped.fetch_add(1, Ordering::Relaxed);
                warn!(sink = %self.name, topic = %p.topic(), "Sink queue full, publication dropped");
                false
            }
            Err(mpsc::error::TrySendError::Closed(_)) => {
                error!(sink = %self.name, "Sink worker stopped unexpectedly");
                false
            }
        }
    }

    /// Drain the queue, then flush and close the sink
    #[instrument(name = "sink_handle_shutdown", skip(self), fields(sink = %self.name))]
    pub async fn shutdown(self) -> SinkCountersSnapshot {
        drop(self.tx);
        if let Err(e) = self.worker.await {
            error!(sink = %self.name, error = ?e, "Sink worker panicked");
        }
        self.counters.snapshot()
    }
}

async fn run_worker<S: PublicationSink + Send>(
    mut sink: S,
    mut rx: mpsc::Receiver<Publication>,
    counters: Arc<SinkCounters>,
    name: String,
) {
    debug!(sink = %name, "Sink worker started");

    while let Some(publication) = rx.recv().await {
        let ok = match sink.write(&publication).await {
            Ok(()) => {
                counters.written.fetch_add(1, Ordering::Relaxed);
                true
            }
            Err(e) => {
                counters.failed.fetch_add(1, Ordering::Relaxed);
                error!(sink = %name, topic = %publication.topic(), error = %e, "Sink write failed");
                false
            }
        };
        observability::record_sink_write(&name, ok);
    }

    if let Err(e) = sink.flush().await {
        error!(sink = %name, error = %e, "Flush failed on shutdown");
    }
    if let Err(e) = sink.close().await {
        error!(sink = %name, error = %e, "Close failed on shutdown");
    }
    debug!(sink = %name, "Sink worker stopped");
}
