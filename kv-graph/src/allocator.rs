use crate::{
    EntityId, Error,
    keys::{decode_uid, encode_uid},
    txn::KvTransaction,
};

/// Increments the counter at `counter_key` and reads the new value back.
///
/// The increment is an ordinary read-modify-write inside the caller's
/// transaction: two transactions racing on one counter conflict at commit, and
/// an increment that is never committed is never observed.
pub async fn next_id<T: KvTransaction>(txn: &mut T, counter_key: Vec<u8>) -> Result<EntityId, Error> {
    let current = match txn.get(counter_key.clone()).await? {
        Some(raw) => decode_uid(&raw)?,
        None => 0,
    };
    let next = current
        .checked_add(1)
        .ok_or_else(|| Error::InvalidKey(format!("counter {counter_key:?} exhausted")))?;
    txn.put(counter_key.clone(), encode_uid(next)).await?;

    let Some(raw) = txn.get(counter_key.clone()).await? else {
        return Err(Error::InvalidKey(format!("counter {counter_key:?} vanished")));
    };
    let uid = decode_uid(&raw)?;
    log::debug!("allocated id {uid}");
    Ok(uid)
}
