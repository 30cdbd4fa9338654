//! In-process [`EntityRepository`] for embedding and tests.

use std::collections::{BTreeMap, BTreeSet};
use std::sync::{Mutex, MutexGuard, PoisonError};

use linksync_core::error::StoreError;
use linksync_core::types::{Record, RecordId, RecordType};

use crate::collaborators::EntityRepository;

type Key = (RecordType, RecordId);

#[derive(Debug, Default)]
struct State {
    records: BTreeMap<Key, Record>,
    saves: Vec<Key>,
    invalidations: Vec<Key>,
    failing_saves: BTreeSet<Key>,
}

/// Records held in a map, with a log of saves and cache invalidations.
#[derive(Debug, Default)]
pub struct MemoryRepository {
    state: Mutex<State>,
}

impl MemoryRepository {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_records(records: impl IntoIterator<Item = Record>) -> Self {
        let repo = Self::new();
        for record in records {
            repo.put(record);
        }
        repo
    }

    /// Store `record` without logging a save.
    pub fn put(&self, record: Record) {
        let key = (record.record_type.clone(), record.id);
        self.lock().records.insert(key, record);
    }

    pub fn get(&self, record_type: &RecordType, id: RecordId) -> Option<Record> {
        self.lock().records.get(&(record_type.clone(), id)).cloned()
    }

    /// Every `save` call so far, in order.
    pub fn saves(&self) -> Vec<Key> {
        self.lock().saves.clone()
    }

    /// Every `invalidate_cache` entry so far, in order.
    pub fn invalidations(&self) -> Vec<Key> {
        self.lock().invalidations.clone()
    }

    /// Make every later `save` of this record fail with an I/O error.
    pub fn fail_saves_of(&self, record_type: &RecordType, id: RecordId) {
        self.lock().failing_saves.insert((record_type.clone(), id));
    }

    fn lock(&self) -> MutexGuard<'_, State> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

impl EntityRepository for MemoryRepository {
    fn load(&self, record_type: &RecordType, ids: &[RecordId]) -> Result<Vec<Record>, StoreError> {
        let state = self.lock();
        Ok(ids
            .iter()
            .filter_map(|id| state.records.get(&(record_type.clone(), *id)).cloned())
            .collect())
    }

    fn save(&self, record: &Record) -> Result<(), StoreError> {
        let key = (record.record_type.clone(), record.id);
        let mut state = self.lock();
        state.saves.push(key.clone());
        if state.failing_saves.contains(&key) {
            return Err(StoreError::Io(std::io::Error::other(format!(
                "save of {record} refused"
            ))));
        }
        state.records.insert(key, record.clone());
        Ok(())
    }

    fn invalidate_cache(&self, record_type: &RecordType, ids: &[RecordId]) {
        let mut state = self.lock();
        state
            .invalidations
            .extend(ids.iter().map(|id| (record_type.clone(), *id)));
    }
}
