//! The ordered transactional key-value store this crate is layered on.

use std::future::Future;
use std::ops::Range;

use tikv_client::{Transaction, TransactionClient};

use crate::{Error, keys::next_key};

pub type KvPair = (Vec<u8>, Vec<u8>);

/// One optimistic transaction. Writes are visible to later reads of the same
/// transaction; conflicts with other transactions surface at `commit`.
pub trait KvTransaction: Send {
    fn get(&mut self, key: Vec<u8>) -> impl Future<Output = Result<Option<Vec<u8>>, Error>> + Send;

    /// Up to `limit` pairs in `range`, ascending by key.
    fn scan(
        &mut self,
        range: Range<Vec<u8>>,
        limit: u32,
    ) -> impl Future<Output = Result<Vec<KvPair>, Error>> + Send;

    fn put(&mut self, key: Vec<u8>, value: Vec<u8>) -> impl Future<Output = Result<(), Error>> + Send;

    fn delete(&mut self, key: Vec<u8>) -> impl Future<Output = Result<(), Error>> + Send;

    fn commit(&mut self) -> impl Future<Output = Result<(), Error>> + Send;

    fn rollback(&mut self) -> impl Future<Output = Result<(), Error>> + Send;
}

pub trait KvStore: Send + Sync {
    type Transaction: KvTransaction;

    fn begin(&self) -> impl Future<Output = Result<Self::Transaction, Error>> + Send;
}

impl KvTransaction for Transaction {
    async fn get(&mut self, key: Vec<u8>) -> Result<Option<Vec<u8>>, Error> {
        Transaction::get(self, key).await.map_err(Error::TikvError)
    }

    async fn scan(&mut self, range: Range<Vec<u8>>, limit: u32) -> Result<Vec<KvPair>, Error> {
        Ok(Transaction::scan(self, range, limit)
            .await
            .map_err(Error::TikvError)?
            .map(|kv| (Vec::<u8>::from(kv.key().clone()), kv.value().clone()))
            .collect())
    }

    async fn put(&mut self, key: Vec<u8>, value: Vec<u8>) -> Result<(), Error> {
        Transaction::put(self, key, value)
            .await
            .map_err(Error::TikvError)
    }

    async fn delete(&mut self, key: Vec<u8>) -> Result<(), Error> {
        Transaction::delete(self, key)
            .await
            .map_err(Error::TikvError)
    }

    async fn commit(&mut self) -> Result<(), Error> {
        Transaction::commit(self)
            .await
            .map_err(Error::TikvError)?;
        Ok(())
    }

    async fn rollback(&mut self) -> Result<(), Error> {
        Transaction::rollback(self).await.map_err(Error::TikvError)
    }
}

impl KvStore for TransactionClient {
    type Transaction = Transaction;

    async fn begin(&self) -> Result<Transaction, Error> {
        self.begin_optimistic().await.map_err(Error::TikvError)
    }
}

/// Every pair in `range`, fetched `page_size` at a time.
pub(crate) async fn scan_all<T: KvTransaction>(
    txn: &mut T,
    range: Range<Vec<u8>>,
    page_size: u32,
) -> Result<Vec<KvPair>, Error> {
    let page_size = page_size.max(1);
    let mut start = range.start;
    let end = range.end;
    let mut pairs = Vec::new();
    loop {
        let page = txn.scan(start.clone()..end.clone(), page_size).await?;
        let len = page.len();
        let Some((last, _)) = page.last() else {
            break;
        };
        start = next_key(last);
        pairs.extend(page);
        if len < page_size as usize {
            break;
        }
    }
    log::trace!("scanned {} pairs", pairs.len());
    Ok(pairs)
}
