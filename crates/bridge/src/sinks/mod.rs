//! Publication sinks
//!
//! 每个 sink 一个独立队列和 worker（见 [`SinkHandle`]），publish loop
//! 只做非阻塞投递。

mod handle;
mod log;
mod memory;
mod network;

pub use self::handle::{SinkCounters, SinkCountersSnapshot, SinkHandle};
pub use self::log::LogSink;
pub use self::memory::MemorySink;
pub use self::network::{NetworkSink, NetworkSinkConfig, WireFormat};

use contracts::{Publication, SinkConfig, SinkType};
use tracing::{info, instrument};

use crate::error::{BridgeError, Result};

/// Fan-out over every configured sink
#[derive(Default)]
pub struct SinkSet {
    handles: Vec<SinkHandle>,
}

impl SinkSet {
    pub fn new(handles: Vec<SinkHandle>) -> Self {
        Self { handles }
    }

    /// Build sinks from configuration; an empty list yields a single log sink
    #[instrument(name = "sink_set_from_configs", skip(configs), fields(sinks = configs.len()))]
    pub async fn from_configs(configs: &[SinkConfig]) -> Result<Self> {
        if configs.is_empty() {
            return Ok(Self::new(vec![SinkHandle::spawn(
                LogSink::new("log"),
                SinkConfig::DEFAULT_QUEUE_CAPACITY,
            )]));
        }

        let mut handles = Vec::with_capacity(configs.len());
        for config in configs {
            handles.push(create_handle(config).await?);
        }
        Ok(Self::new(handles))
    }

    pub fn push(&mut self, handle: SinkHandle) {
        self.handles.push(handle);
    }

    pub fn len(&self) -> usize {
        self.handles.len()
    }

    pub fn is_empty(&self) -> bool {
        self.handles.is_empty()
    }

    /// Offer a publication to every sink; returns how many accepted it
    pub fn dispatch(&self, publication: &Publication) -> usize {
        self.handles
            .iter()
            .filter(|h| h.offer(publication.clone()))
            .count()
    }

    /// Drain and close every sink
    pub async fn shutdown(self) -> Vec<(String, SinkCountersSnapshot)> {
        let mut report = Vec::with_capacity(self.handles.len());
        for handle in self.handles {
            let name = handle.name().to_string();
            let counters = handle.shutdown().await;
            info!(
                sink = %name,
                written = counters.written,
                failed = counters.failed,
                dropped = counters.dropped,
                "Sink closed"
            );
            report.push((name, counters));
        }
        report
    }
}

async fn create_handle(config: &SinkConfig) -> Result<SinkHandle> {
    match config.sink_type {
        SinkType::Log => Ok(SinkHandle::spawn(
            LogSink::new(&config.name),
            config.queue_capacity,
        )),
        SinkType::Network => {
            let sink = NetworkSink::from_params(&config.name, &config.params)
                .await
                .map_err(|e| BridgeError::sink_creation(&config.name, e.to_string()))?;
            Ok(SinkHandle::spawn(sink, config.queue_capacity))
        }
    }
}
