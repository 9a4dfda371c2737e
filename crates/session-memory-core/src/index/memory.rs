//! In-memory [`IndexBackend`] for tests and ephemeral runs.
//!
//! Records live in a `HashMap` behind `std::sync::RwLock`, with a separate
//! insertion-order list so that equal distances come back in a stable
//! order. Search is brute-force cosine distance over every record.

use std::collections::HashMap;
use std::sync::{RwLock, RwLockReadGuard, RwLockWriteGuard};

use async_trait::async_trait;

use crate::embedding::cosine_distance;
use crate::error::{MemoryError, Result};
use crate::filter::WhereClause;
use crate::models::{MetadataPatch, StoredRecord};

use super::{IndexBackend, SearchHit};

#[derive(Default)]
struct State {
    initialized: bool,
    records: HashMap<String, StoredRecord>,
    order: Vec<String>,
}

#[derive(Default)]
pub struct InMemoryBackend {
    state: RwLock<State>,
}

impl InMemoryBackend {
    pub fn new() -> Self {
        Self::default()
    }

    fn read(&self) -> Result<RwLockReadGuard<'_, State>> {
        let guard = self
            .state
            .read()
            .map_err(|_| MemoryError::storage("in-memory index lock poisoned"))?;
        if !guard.initialized {
            return Err(MemoryError::not_initialized("in-memory"));
        }
        Ok(guard)
    }

    fn write(&self) -> Result<RwLockWriteGuard<'_, State>> {
        let guard = self
            .state
            .write()
            .map_err(|_| MemoryError::storage("in-memory index lock poisoned"))?;
        if !guard.initialized {
            return Err(MemoryError::not_initialized("in-memory"));
        }
        Ok(guard)
    }
}

#[async_trait]
impl IndexBackend for InMemoryBackend {
    fn describe(&self) -> String {
        "memory".to_string()
    }

    async fn initialize(&self) -> Result<()> {
        let mut state = self
            .state
            .write()
            .map_err(|_| MemoryError::storage("in-memory index lock poisoned"))?;
        state.initialized = true;
        Ok(())
    }

    async fn upsert(&self, record: StoredRecord) -> Result<()> {
        let mut state = self.write()?;
        if !state.records.contains_key(&record.id) {
            state.order.push(record.id.clone());
        }
        state.records.insert(record.id.clone(), record);
        Ok(())
    }

    async fn search(
        &self,
        vector: &[f32],
        limit: usize,
        filter: &WhereClause,
    ) -> Result<Vec<SearchHit>> {
        let state = self.read()?;
        let mut hits: Vec<SearchHit> = state
            .order
            .iter()
            .filter_map(|id| state.records.get(id))
            .filter(|r| filter.matches(&r.metadata))
            .map(|r| SearchHit {
                id: r.id.clone(),
                distance: cosine_distance(vector, &r.vector),
                metadata: r.metadata.clone(),
            })
            .collect();
        hits.sort_by(|a, b| {
            a.distance
                .partial_cmp(&b.distance)
                .unwrap_or(std::cmp::Ordering::Equal)
        });
        hits.truncate(limit);
        Ok(hits)
    }

    async fn update_metadata(&self, id: &str, patch: &MetadataPatch) -> Result<()> {
        let mut state = self.write()?;
        let record = state
            .records
            .get_mut(id)
            .ok_or_else(|| MemoryError::NotFound(id.to_string()))?;
        record.metadata.apply(patch);
        Ok(())
    }

    async fn count(&self) -> Result<u64> {
        Ok(self.read()?.records.len() as u64)
    }

    async fn get(&self, id: &str) -> Result<Option<StoredRecord>> {
        Ok(self.read()?.records.get(id).cloned())
    }
}
