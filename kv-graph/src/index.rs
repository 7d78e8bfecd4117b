//! Equality index entries `(type, "index", property, encoded_value, entity_id) -> ""`.
//!
//! Entries are only ever written alongside the scalar record they describe.

use crate::{
    EntityId, Error,
    keys::{Layout, trailing_uid},
    txn::{KvTransaction, scan_all},
};

pub struct IndexMaintainer<'a> {
    layout: &'a Layout,
    page_size: u32,
}

impl<'a> IndexMaintainer<'a> {
    pub fn new(layout: &'a Layout, page_size: u32) -> Self {
        Self { layout, page_size }
    }

    /// True iff no entity of `type_name` holds `encoded` under `property`,
    /// as seen by `txn` (including its own uncommitted writes).
    pub async fn check_unique<T: KvTransaction>(
        &self,
        txn: &mut T,
        type_name: &str,
        property: &str,
        encoded: &[u8],
    ) -> Result<bool, Error> {
        let range = self
            .layout
            .index_value(type_name, property, encoded)
            .uid_range();
        Ok(txn.scan(range, 1).await?.is_empty())
    }

    pub async fn write<T: KvTransaction>(
        &self,
        txn: &mut T,
        type_name: &str,
        property: &str,
        encoded: &[u8],
        uid: EntityId,
    ) -> Result<(), Error> {
        let key = self
            .layout
            .index_value(type_name, property, encoded)
            .uid(uid);
        txn.put(key.into(), Vec::new()).await
    }

    /// Every entity of `type_name` holding `encoded` under `property`, ascending.
    pub async fn lookup<T: KvTransaction>(
        &self,
        txn: &mut T,
        type_name: &str,
        property: &str,
        encoded: &[u8],
    ) -> Result<Vec<EntityId>, Error> {
        let range = self
            .layout
            .index_value(type_name, property, encoded)
            .uid_range();
        scan_all(txn, range, self.page_size)
            .await?
            .iter()
            .map(|(key, _)| trailing_uid(key))
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{memory::MemoryStore, txn::KvStore};

    #[tokio::test]
    async fn entries_are_scoped_by_value_prefix() {
        let layout = Layout::new("t");
        let index = IndexMaintainer::new(&layout, 2);
        let store = MemoryStore::new();
        let mut txn = store.begin().await.unwrap();

        assert!(index.check_unique(&mut txn, "user", "name", b"ann").await.unwrap());
        for uid in [3, 1, 2] {
            index.write(&mut txn, "user", "name", b"ann", uid).await.unwrap();
        }
        index.write(&mut txn, "user", "name", b"anna", 9).await.unwrap();
        index.write(&mut txn, "user", "nick", b"ann", 8).await.unwrap();

        assert!(!index.check_unique(&mut txn, "user", "name", b"ann").await.unwrap());
        assert_eq!(
            index.lookup(&mut txn, "user", "name", b"ann").await.unwrap(),
            vec![1, 2, 3]
        );
        assert_eq!(
            index.lookup(&mut txn, "user", "name", b"an").await.unwrap(),
            Vec::<EntityId>::new()
        );
    }
}
