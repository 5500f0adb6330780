//! MemorySink - keeps every publication in a shared vector

use std::sync::{Arc, Mutex, PoisonError};

use contracts::{ContractError, Publication, PublicationSink};

/// Sink collecting publications in memory; clones share the buffer
#[derive(Debug, Clone, Default)]
pub struct MemorySink {
    name: String,
    buffer: Arc<Mutex<Vec<Publication>>>,
}

impl MemorySink {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            buffer: Arc::default(),
        }
    }

    pub fn publications(&self) -> Vec<Publication> {
        self.buffer
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }

    pub fn len(&self) -> usize {
        self.buffer.lock().unwrap_or_else(PoisonError::into_inner).len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

impl PublicationSink for MemorySink {
    fn name(&self) -> &str {
        &self.name
    }

    async fn write(&mut self, publication: &Publication) -> Result<(), ContractError> {
        self.buffer
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .push(publication.clone());
        Ok(())
    }

    async fn flush(&mut self) -> Result<(), ContractError> {
        Ok(())
    }

    async fn close(&mut self) -> Result<(), ContractError> {
        Ok(())
    }
}
