//! Process-lifetime message store

use super::{MessageStore, StoreError, StoreResult};
use crate::llm::Message;
use async_trait::async_trait;
use std::collections::HashMap;
use std::sync::Mutex;

/// Keeps every thread in memory; nothing survives the process
#[derive(Debug, Default)]
pub struct MemoryStore {
    threads: Mutex<HashMap<String, Vec<Message>>>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl MessageStore for MemoryStore {
    async fn load(&self, thread_id: &str) -> StoreResult<Vec<Message>> {
        let threads = self.threads.lock().map_err(|_| StoreError::Poisoned)?;
        Ok(threads.get(thread_id).cloned().unwrap_or_default())
    }

    async fn append(&self, thread_id: &str, message: &Message) -> StoreResult<()> {
        let mut threads = self.threads.lock().map_err(|_| StoreError::Poisoned)?;
        threads
            .entry(thread_id.to_string())
            .or_default()
            .push(message.clone());
        Ok(())
    }
}
