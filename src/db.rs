//! The in-memory store: a typed map plus a parallel expiration table,
//! behind a single reader/writer lock, with a background cleanup task.

use crate::shutdown::Shutdown;
use crate::utils::{glob_to_regex, now_timestamp_in_millis, timestamp_from_ttl_millis};
use bytes::Bytes;
use std::collections::{HashMap, HashSet, VecDeque};
use std::sync::Arc;
use tokio::sync::{broadcast, RwLock};
use tokio::time::{self, Duration, MissedTickBehavior};
use tracing::debug;

#[derive(thiserror::Error, Debug, Clone, PartialEq)]
pub enum StoreError {
    #[error("WRONGTYPE Operation against a key holding the wrong kind of value")]
    WrongType,
    #[error("ERR value is not an integer or out of range")]
    NotAnInteger,
    #[error("ERR invalid glob pattern")]
    InvalidPattern,
}

pub type StoreResult<T> = Result<T, StoreError>;

/// One value slot. A key maps to exactly one of these.
#[derive(Clone, Debug)]
enum Entry {
    Str(Bytes),
    List(VecDeque<Bytes>),
    Set(HashSet<Bytes>),
    Hash(HashMap<Bytes, Bytes>),
}

impl Entry {
    fn kind(&self) -> &'static str {
        match self {
            Entry::Str(_) => "string",
            Entry::List(_) => "list",
            Entry::Set(_) => "set",
            Entry::Hash(_) => "hash",
        }
    }
}

#[derive(Default)]
struct State {
    entries: HashMap<String, Entry>,
    expires: HashMap<String, i64>,
}

impl State {
    /// Removes `key` if it has an expiration that has passed. Returns
    /// whether the key is now considered absent. Requires mutable access;
    /// only called from the write side (writers purge-on-access eagerly).
    fn expire_if_due(&mut self, key: &str, now: i64) -> bool {
        if let Some(&deadline) = self.expires.get(key) {
            if deadline <= now {
                self.entries.remove(key);
                self.expires.remove(key);
                return true;
            }
        }
        false
    }

    /// Purges `key` if due, then reports whether it's present. Used by
    /// writers, which already hold the write lock.
    fn purge_and_check(&mut self, key: &str, now: i64) -> bool {
        !self.expire_if_due(key, now) && self.entries.contains_key(key)
    }

    /// Read-only liveness check: a key is live if it has no expiration, or
    /// its deadline hasn't passed yet. Never mutates, so it's safe to call
    /// from the read side — overdue keys are left for the cleanup task
    /// (or the next writer) to actually purge.
    fn is_live(&self, key: &str, now: i64) -> bool {
        match self.expires.get(key) {
            Some(&deadline) if deadline <= now => false,
            _ => self.entries.contains_key(key),
        }
    }
}

struct Shared {
    state: RwLock<State>,
}

/// Handle to the store; cheaply cloneable, shared across connections.
#[derive(Clone)]
pub struct Db {
    shared: Arc<Shared>,
}

/// Owns the background cleanup task's shutdown; dropping it (at process
/// shutdown) lets the task observe the signal and exit.
pub struct DbDropGuard {
    db: Db,
    shutdown_tx: Option<broadcast::Sender<()>>,
}

impl DbDropGuard {
    pub fn new(cleanup_interval: Duration) -> DbDropGuard {
        let (shutdown_tx, shutdown_rx) = broadcast::channel(1);
        let db = Db::new();
        tokio::spawn(purge_expired_task(
            db.clone(),
            cleanup_interval,
            Shutdown::new(shutdown_rx),
        ));
        DbDropGuard {
            db,
            shutdown_tx: Some(shutdown_tx),
        }
    }

    pub fn db(&self) -> Db {
        self.db.clone()
    }
}

impl Drop for DbDropGuard {
    fn drop(&mut self) {
        if let Some(tx) = self.shutdown_tx.take() {
            let _ = tx.send(());
        }
    }
}

async fn purge_expired_task(db: Db, interval: Duration, mut shutdown: Shutdown) {
    let mut ticker = time::interval(interval);
    ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);

    while !shutdown.is_shutdown() {
        tokio::select! {
            _ = ticker.tick() => {}
            _ = shutdown.recv() => break,
        }
        let removed = db.purge_expired().await;
        if removed > 0 {
            debug!(removed, "purged expired keys");
        }
    }
}

impl Db {
    pub fn new() -> Db {
        Db {
            shared: Arc::new(Shared {
                state: RwLock::new(State::default()),
            }),
        }
    }

    async fn purge_expired(&self) -> usize {
        let now = now_timestamp_in_millis();
        let mut state = self.shared.state.write().await;
        let due: Vec<String> = state
            .expires
            .iter()
            .filter(|(_, &deadline)| deadline <= now)
            .map(|(k, _)| k.clone())
            .collect();
        for key in &due {
            state.entries.remove(key);
            state.expires.remove(key);
        }
        due.len()
    }

    // ---- generic ----

    pub async fn set(&self, key: &str, value: Bytes) {
        let mut state = self.shared.state.write().await;
        state.entries.insert(key.to_string(), Entry::Str(value));
        state.expires.remove(key);
    }

    pub async fn get(&self, key: &str) -> StoreResult<Option<Bytes>> {
        let now = now_timestamp_in_millis();
        let state = self.shared.state.read().await;
        if !state.is_live(key, now) {
            return Ok(None);
        }
        match state.entries.get(key) {
            Some(Entry::Str(v)) => Ok(Some(v.clone())),
            Some(_) => Err(StoreError::WrongType),
            None => Ok(None),
        }
    }

    /// Snapshot of keys whose expiration deadline is at or before now.
    /// Read-only: actual eviction happens in the background cleanup task
    /// or lazily the next time a writer touches the key.
    pub async fn expired_keys(&self) -> Vec<String> {
        let now = now_timestamp_in_millis();
        let state = self.shared.state.read().await;
        state
            .expires
            .iter()
            .filter(|(_, &deadline)| deadline <= now)
            .map(|(k, _)| k.clone())
            .collect()
    }

    pub async fn delete(&self, keys: &[String]) -> i64 {
        let mut state = self.shared.state.write().await;
        let mut count = 0;
        for key in keys {
            state.expire_if_due(key, now_timestamp_in_millis());
            if state.entries.remove(key).is_some() {
                count += 1;
            }
            state.expires.remove(key);
        }
        count
    }

    pub async fn exists(&self, keys: &[String]) -> i64 {
        let now = now_timestamp_in_millis();
        let state = self.shared.state.read().await;
        keys.iter().filter(|k| state.is_live(k, now)).count() as i64
    }

    pub async fn key_type(&self, key: &str) -> &'static str {
        let now = now_timestamp_in_millis();
        let state = self.shared.state.read().await;
        if !state.is_live(key, now) {
            return "none";
        }
        state.entries.get(key).map(|e| e.kind()).unwrap_or("none")
    }

    pub async fn keys(&self, pattern: &str) -> StoreResult<Vec<String>> {
        let re = glob_to_regex(pattern).map_err(|_| StoreError::InvalidPattern)?;
        let now = now_timestamp_in_millis();
        let state = self.shared.state.read().await;
        Ok(state
            .entries
            .keys()
            .filter(|k| state.is_live(k, now) && re.is_match(k))
            .cloned()
            .collect())
    }

    pub async fn flushdb(&self) {
        let mut state = self.shared.state.write().await;
        state.entries.clear();
        state.expires.clear();
    }

    pub async fn set_expire(&self, key: &str, ttl_millis: i64) -> bool {
        let now = now_timestamp_in_millis();
        let mut state = self.shared.state.write().await;
        if !state.purge_and_check(key, now) {
            return false;
        }
        let deadline = timestamp_from_ttl_millis(ttl_millis);
        state.expires.insert(key.to_string(), deadline);
        true
    }

    /// -2 absent, -1 no expire, else remaining milliseconds.
    pub async fn ttl_millis(&self, key: &str) -> i64 {
        let now = now_timestamp_in_millis();
        let state = self.shared.state.read().await;
        if !state.is_live(key, now) {
            return -2;
        }
        match state.expires.get(key) {
            None => -1,
            Some(&deadline) => {
                let remaining = deadline - now_timestamp_in_millis();
                if remaining <= 0 {
                    -2
                } else {
                    remaining
                }
            }
        }
    }

    // ---- string ----

    pub async fn incr(&self, key: &str, delta: i64) -> StoreResult<i64> {
        let mut state = self.shared.state.write().await;
        state.expire_if_due(key, now_timestamp_in_millis());
        let current: i64 = match state.entries.get(key) {
            None => 0,
            Some(Entry::Str(v)) => std::str::from_utf8(v)
                .ok()
                .and_then(|s| s.parse::<i64>().ok())
                .ok_or(StoreError::NotAnInteger)?,
            Some(_) => return Err(StoreError::WrongType),
        };
        let next = current.checked_add(delta).ok_or(StoreError::NotAnInteger)?;
        state
            .entries
            .insert(key.to_string(), Entry::Str(Bytes::from(next.to_string())));
        Ok(next)
    }

    pub async fn append(&self, key: &str, suffix: &Bytes) -> StoreResult<i64> {
        let mut state = self.shared.state.write().await;
        state.expire_if_due(key, now_timestamp_in_millis());
        match state.entries.get_mut(key) {
            Some(Entry::Str(v)) => {
                let mut joined = Vec::with_capacity(v.len() + suffix.len());
                joined.extend_from_slice(v);
                joined.extend_from_slice(suffix);
                let len = joined.len() as i64;
                *v = Bytes::from(joined);
                Ok(len)
            }
            Some(_) => Err(StoreError::WrongType),
            None => {
                let len = suffix.len() as i64;
                state
                    .entries
                    .insert(key.to_string(), Entry::Str(suffix.clone()));
                Ok(len)
            }
        }
    }

    // ---- list ----

    pub async fn lpush(&self, key: &str, values: &[Bytes]) -> StoreResult<i64> {
        self.push(key, values, true).await
    }

    pub async fn rpush(&self, key: &str, values: &[Bytes]) -> StoreResult<i64> {
        self.push(key, values, false).await
    }

    async fn push(&self, key: &str, values: &[Bytes], front: bool) -> StoreResult<i64> {
        let mut state = self.shared.state.write().await;
        state.expire_if_due(key, now_timestamp_in_millis());
        let entry = state
            .entries
            .entry(key.to_string())
            .or_insert_with(|| Entry::List(VecDeque::new()));
        let list = match entry {
            Entry::List(l) => l,
            _ => return Err(StoreError::WrongType),
        };
        for v in values {
            if front {
                list.push_front(v.clone());
            } else {
                list.push_back(v.clone());
            }
        }
        Ok(list.len() as i64)
    }

    pub async fn lpop(&self, key: &str) -> StoreResult<Option<Bytes>> {
        self.pop(key, true).await
    }

    pub async fn rpop(&self, key: &str) -> StoreResult<Option<Bytes>> {
        self.pop(key, false).await
    }

    async fn pop(&self, key: &str, front: bool) -> StoreResult<Option<Bytes>> {
        let now = now_timestamp_in_millis();
        let mut state = self.shared.state.write().await;
        if !state.purge_and_check(key, now) {
            return Ok(None);
        }
        let popped = match state.entries.get_mut(key) {
            Some(Entry::List(l)) => {
                if front {
                    l.pop_front()
                } else {
                    l.pop_back()
                }
            }
            Some(_) => return Err(StoreError::WrongType),
            None => None,
        };
        if matches!(state.entries.get(key), Some(Entry::List(l)) if l.is_empty()) {
            state.entries.remove(key);
        }
        Ok(popped)
    }

    pub async fn llen(&self, key: &str) -> StoreResult<i64> {
        let now = now_timestamp_in_millis();
        let state = self.shared.state.read().await;
        if !state.is_live(key, now) {
            return Ok(0);
        }
        match state.entries.get(key) {
            Some(Entry::List(l)) => Ok(l.len() as i64),
            Some(_) => Err(StoreError::WrongType),
            None => Ok(0),
        }
    }

    pub async fn lrange(&self, key: &str, start: i64, stop: i64) -> StoreResult<Vec<Bytes>> {
        let now = now_timestamp_in_millis();
        let state = self.shared.state.read().await;
        if !state.is_live(key, now) {
            return Ok(vec![]);
        }
        let list = match state.entries.get(key) {
            Some(Entry::List(l)) => l,
            Some(_) => return Err(StoreError::WrongType),
            None => return Ok(vec![]),
        };
        let len = list.len() as i64;
        if len == 0 {
            return Ok(vec![]);
        }
        let norm = |i: i64| -> i64 {
            if i < 0 {
                (len + i).max(0)
            } else {
                i
            }
        };
        let start = norm(start).min(len - 1).max(0);
        let stop = norm(stop).min(len - 1);
        if start > stop || start >= len {
            return Ok(vec![]);
        }
        Ok(list
            .iter()
            .skip(start as usize)
            .take((stop - start + 1) as usize)
            .cloned()
            .collect())
    }

    // ---- set ----

    pub async fn sadd(&self, key: &str, members: &[Bytes]) -> StoreResult<i64> {
        let mut state = self.shared.state.write().await;
        state.expire_if_due(key, now_timestamp_in_millis());
        let entry = state
            .entries
            .entry(key.to_string())
            .or_insert_with(|| Entry::Set(HashSet::new()));
        let set = match entry {
            Entry::Set(s) => s,
            _ => return Err(StoreError::WrongType),
        };
        let mut added = 0;
        for m in members {
            if set.insert(m.clone()) {
                added += 1;
            }
        }
        Ok(added)
    }

    pub async fn srem(&self, key: &str, members: &[Bytes]) -> StoreResult<i64> {
        let now = now_timestamp_in_millis();
        let mut state = self.shared.state.write().await;
        if !state.purge_and_check(key, now) {
            return Ok(0);
        }
        let removed = match state.entries.get_mut(key) {
            Some(Entry::Set(s)) => members.iter().filter(|m| s.remove(*m)).count() as i64,
            Some(_) => return Err(StoreError::WrongType),
            None => 0,
        };
        if matches!(state.entries.get(key), Some(Entry::Set(s)) if s.is_empty()) {
            state.entries.remove(key);
        }
        Ok(removed)
    }

    pub async fn smembers(&self, key: &str) -> StoreResult<Vec<Bytes>> {
        let now = now_timestamp_in_millis();
        let state = self.shared.state.read().await;
        if !state.is_live(key, now) {
            return Ok(vec![]);
        }
        match state.entries.get(key) {
            Some(Entry::Set(s)) => Ok(s.iter().cloned().collect()),
            Some(_) => Err(StoreError::WrongType),
            None => Ok(vec![]),
        }
    }

    pub async fn sismember(&self, key: &str, member: &Bytes) -> StoreResult<bool> {
        let now = now_timestamp_in_millis();
        let state = self.shared.state.read().await;
        if !state.is_live(key, now) {
            return Ok(false);
        }
        match state.entries.get(key) {
            Some(Entry::Set(s)) => Ok(s.contains(member)),
            Some(_) => Err(StoreError::WrongType),
            None => Ok(false),
        }
    }

    // ---- hash ----

    pub async fn hset(&self, key: &str, field: &Bytes, value: Bytes) -> StoreResult<i64> {
        let mut state = self.shared.state.write().await;
        state.expire_if_due(key, now_timestamp_in_millis());
        let entry = state
            .entries
            .entry(key.to_string())
            .or_insert_with(|| Entry::Hash(HashMap::new()));
        let hash = match entry {
            Entry::Hash(h) => h,
            _ => return Err(StoreError::WrongType),
        };
        Ok(if hash.insert(field.clone(), value).is_none() {
            1
        } else {
            0
        })
    }

    pub async fn hget(&self, key: &str, field: &Bytes) -> StoreResult<Option<Bytes>> {
        let now = now_timestamp_in_millis();
        let state = self.shared.state.read().await;
        if !state.is_live(key, now) {
            return Ok(None);
        }
        match state.entries.get(key) {
            Some(Entry::Hash(h)) => Ok(h.get(field).cloned()),
            Some(_) => Err(StoreError::WrongType),
            None => Ok(None),
        }
    }

    pub async fn hgetall(&self, key: &str) -> StoreResult<Vec<(Bytes, Bytes)>> {
        let now = now_timestamp_in_millis();
        let state = self.shared.state.read().await;
        if !state.is_live(key, now) {
            return Ok(vec![]);
        }
        match state.entries.get(key) {
            Some(Entry::Hash(h)) => Ok(h.iter().map(|(k, v)| (k.clone(), v.clone())).collect()),
            Some(_) => Err(StoreError::WrongType),
            None => Ok(vec![]),
        }
    }
}

impl Default for Db {
    fn default() -> Self {
        Db::new()
    }
}
