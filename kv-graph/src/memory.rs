//! In-process ordered store with optimistic transactions.
//!
//! Reads observe the latest committed state plus the transaction's own writes.
//! At commit every key read or written, and every range scanned, is validated:
//! if another transaction committed a change there after this one began, the
//! commit fails with [`Error::Conflict`] and nothing is applied.

use std::collections::{BTreeMap, BTreeSet};
use std::ops::Range;
use std::sync::Arc;

use parking_lot::Mutex;

use crate::{
    Error,
    txn::{KvPair, KvStore, KvTransaction},
};

#[derive(Debug)]
struct Versioned {
    version: u64,
    value: Option<Vec<u8>>,
}

#[derive(Debug, Default)]
struct State {
    data: BTreeMap<Vec<u8>, Versioned>,
    version: u64,
}

#[derive(Clone, Debug, Default)]
pub struct MemoryStore {
    state: Arc<Mutex<State>>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of live committed keys.
    pub fn len(&self) -> usize {
        self.state
            .lock()
            .data
            .values()
            .filter(|v| v.value.is_some())
            .count()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

impl KvStore for MemoryStore {
    type Transaction = MemoryTransaction;

    async fn begin(&self) -> Result<MemoryTransaction, Error> {
        let start = self.state.lock().version;
        Ok(MemoryTransaction {
            state: self.state.clone(),
            start,
            reads: BTreeSet::new(),
            scans: Vec::new(),
            writes: BTreeMap::new(),
        })
    }
}

#[derive(Debug)]
pub struct MemoryTransaction {
    state: Arc<Mutex<State>>,
    start: u64,
    reads: BTreeSet<Vec<u8>>,
    scans: Vec<Range<Vec<u8>>>,
    writes: BTreeMap<Vec<u8>, Option<Vec<u8>>>,
}

impl MemoryTransaction {
    fn validate(&self, state: &State) -> Result<(), Error> {
        let changed = |key: &Vec<u8>| {
            state
                .data
                .get(key)
                .is_some_and(|v| v.version > self.start)
        };
        if self.reads.iter().any(changed) || self.writes.keys().any(changed) {
            return Err(Error::Conflict);
        }
        for range in &self.scans {
            if state
                .data
                .range(range.clone())
                .any(|(_, v)| v.version > self.start)
            {
                return Err(Error::Conflict);
            }
        }
        Ok(())
    }

    fn reset(&mut self) {
        self.reads.clear();
        self.scans.clear();
        self.writes.clear();
    }
}

impl KvTransaction for MemoryTransaction {
    async fn get(&mut self, key: Vec<u8>) -> Result<Option<Vec<u8>>, Error> {
        if let Some(staged) = self.writes.get(&key) {
            return Ok(staged.clone());
        }
        let value = self
            .state
            .lock()
            .data
            .get(&key)
            .and_then(|v| v.value.clone());
        self.reads.insert(key);
        Ok(value)
    }

    async fn scan(&mut self, range: Range<Vec<u8>>, limit: u32) -> Result<Vec<KvPair>, Error> {
        let mut merged: BTreeMap<Vec<u8>, Vec<u8>> = self
            .state
            .lock()
            .data
            .range(range.clone())
            .filter_map(|(k, v)| v.value.clone().map(|value| (k.clone(), value)))
            .collect();
        for (key, staged) in self.writes.range(range.clone()) {
            match staged {
                Some(value) => merged.insert(key.clone(), value.clone()),
                None => merged.remove(key),
            };
        }
        self.scans.push(range);
        Ok(merged.into_iter().take(limit as usize).collect())
    }

    async fn put(&mut self, key: Vec<u8>, value: Vec<u8>) -> Result<(), Error> {
        self.writes.insert(key, Some(value));
        Ok(())
    }

    async fn delete(&mut self, key: Vec<u8>) -> Result<(), Error> {
        self.writes.insert(key, None);
        Ok(())
    }

    async fn commit(&mut self) -> Result<(), Error> {
        let result = {
            let mut state = self.state.lock();
            self.validate(&state).map(|()| {
                state.version += 1;
                let version = state.version;
                for (key, value) in std::mem::take(&mut self.writes) {
                    state.data.insert(key, Versioned { version, value });
                }
            })
        };
        self.reset();
        result
    }

    async fn rollback(&mut self) -> Result<(), Error> {
        self.reset();
        Ok(())
    }
}
