//! In-process port store
//!
//! Same replace-on-conflict semantics as the database table. Backs dry runs
//! of the file CLI and the pipeline tests.

use async_trait::async_trait;
use std::collections::HashMap;
use std::sync::{Mutex, MutexGuard, PoisonError};

use super::{PortStore, StoreError};
use crate::model::StoredPort;

#[derive(Debug, Default)]
struct Inner {
    rows: HashMap<String, StoredPort>,
    write_log: Vec<String>,
}

#[derive(Debug, Default)]
pub struct MemoryPortStore {
    inner: Mutex<Inner>,
}

impl MemoryPortStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn get(&self, key: &str) -> Option<StoredPort> {
        self.lock().rows.get(key).cloned()
    }

    /// Number of distinct ports held.
    pub fn len(&self) -> usize {
        self.lock().rows.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Keys in the order they were written, duplicates included.
    pub fn write_log(&self) -> Vec<String> {
        self.lock().write_log.clone()
    }

    fn lock(&self) -> MutexGuard<'_, Inner> {
        self.inner.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

#[async_trait]
impl PortStore for MemoryPortStore {
    async fn upsert(&self, port: &StoredPort) -> Result<(), StoreError> {
        let mut inner = self.lock();
        inner.rows.insert(port.key.clone(), port.clone());
        inner.write_log.push(port.key.clone());
        Ok(())
    }
}
