use std::collections::BTreeMap;
use std::ops::Range;

use crate::{
    Error,
    txn::{KvPair, KvTransaction},
};

type Layer = BTreeMap<Vec<u8>, Option<Vec<u8>>>;

/// Mutations of one logical operation, staged over the caller's transaction.
///
/// Reads see the staged layers first, then the transaction. Nothing reaches
/// the transaction until [`KvTransaction::commit`] flushes the buffer; dropping
/// or rolling back the buffer leaves the transaction exactly as it was.
pub struct WriteBuffer<'t, T> {
    txn: &'t mut T,
    layers: Vec<Layer>,
}

impl<'t, T: KvTransaction> WriteBuffer<'t, T> {
    pub fn new(txn: &'t mut T) -> Self {
        Self {
            txn,
            layers: vec![Layer::new()],
        }
    }

    /// Opens a nested layer that can be discarded on its own.
    pub fn savepoint(&mut self) {
        self.layers.push(Layer::new());
    }

    /// Folds the innermost layer into its parent.
    pub fn release(&mut self) {
        if self.layers.len() > 1 {
            if let Some(top) = self.layers.pop() {
                if let Some(parent) = self.layers.last_mut() {
                    parent.extend(top);
                }
            }
        }
    }

    /// Discards the innermost layer.
    pub fn rollback_to(&mut self) {
        if self.layers.len() > 1 {
            self.layers.pop();
        } else if let Some(root) = self.layers.last_mut() {
            root.clear();
        }
    }

    pub fn len(&self) -> usize {
        self.merged().len()
    }

    pub fn is_empty(&self) -> bool {
        self.layers.iter().all(|l| l.is_empty())
    }

    fn staged(&self, key: &[u8]) -> Option<&Option<Vec<u8>>> {
        self.layers.iter().rev().find_map(|layer| layer.get(key))
    }

    fn merged(&self) -> Layer {
        let mut merged = Layer::new();
        for layer in &self.layers {
            merged.extend(layer.iter().map(|(k, v)| (k.clone(), v.clone())));
        }
        merged
    }

    fn top(&mut self) -> &mut Layer {
        if self.layers.is_empty() {
            self.layers.push(Layer::new());
        }
        let last = self.layers.len() - 1;
        &mut self.layers[last]
    }
}

impl<T: KvTransaction> KvTransaction for WriteBuffer<'_, T> {
    async fn get(&mut self, key: Vec<u8>) -> Result<Option<Vec<u8>>, Error> {
        if let Some(staged) = self.staged(&key) {
            return Ok(staged.clone());
        }
        self.txn.get(key).await
    }

    async fn scan(&mut self, range: Range<Vec<u8>>, limit: u32) -> Result<Vec<KvPair>, Error> {
        let overlay: Layer = self
            .merged()
            .into_iter()
            .filter(|(k, _)| range.contains(k))
            .collect();
        // 多取被暂存删除的条数，保证合并后仍够 limit
        let deleted = overlay.values().filter(|v| v.is_none()).count() as u32;

        let mut result: BTreeMap<Vec<u8>, Vec<u8>> = self
            .txn
            .scan(range, limit.saturating_add(deleted))
            .await?
            .into_iter()
            .collect();
        for (key, staged) in overlay {
            match staged {
                Some(value) => result.insert(key, value),
                None => result.remove(&key),
            };
        }
        Ok(result.into_iter().take(limit as usize).collect())
    }

    async fn put(&mut self, key: Vec<u8>, value: Vec<u8>) -> Result<(), Error> {
        self.top().insert(key, Some(value));
        Ok(())
    }

    async fn delete(&mut self, key: Vec<u8>) -> Result<(), Error> {
        self.top().insert(key, None);
        Ok(())
    }

    /// Flushes every staged mutation into the underlying transaction without
    /// committing it.
    async fn commit(&mut self) -> Result<(), Error> {
        let merged = self.merged();
        log::trace!("flushing {} staged mutations", merged.len());
        for (key, value) in merged {
            match value {
                Some(value) => self.txn.put(key, value).await?,
                None => self.txn.delete(key).await?,
            }
        }
        self.layers = vec![Layer::new()];
        Ok(())
    }

    async fn rollback(&mut self) -> Result<(), Error> {
        self.layers = vec![Layer::new()];
        Ok(())
    }
}
