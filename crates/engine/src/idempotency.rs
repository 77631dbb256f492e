use std::collections::HashMap;
use std::sync::{Arc, Mutex, MutexGuard};

use chrono::{DateTime, Utc};

use tripweave_core::ItineraryDiff;

/// Result cached under an idempotency key: exactly what `apply` returned.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StoredResult {
    pub version: u64,
    pub diff: ItineraryDiff,
}

#[derive(Debug, Clone)]
pub struct IdempotencyRecord {
    pub result: StoredResult,
    pub op_tag: String,
    pub created_at: DateTime<Utc>,
}

#[derive(Debug)]
enum Slot {
    /// A call holding this key is still executing.
    Pending,
    Done(IdempotencyRecord),
}

/// Outcome of claiming a key before executing an apply.
#[derive(Debug)]
pub enum Claim {
    /// Key unseen; the slot is reserved for this caller. The caller must
    /// `complete` or `abandon` it.
    Fresh,
    /// Another call with this key is executing right now.
    InFlight,
    /// A previous apply finished under this key; replay its result.
    Replayed(StoredResult),
}

/// In-memory idempotency map. Claiming reserves the key in the same mutex
/// hold that checks it, so two concurrent applies with the same fresh key
/// can never both execute.
#[derive(Clone, Default)]
pub struct IdempotencyManager {
    inner: Arc<Mutex<HashMap<String, Slot>>>,
}

impl IdempotencyManager {
    pub fn new() -> Self {
        Self::default()
    }

    fn map(&self) -> MutexGuard<'_, HashMap<String, Slot>> {
        match self.inner.lock() {
            Ok(guard) => guard,
            Err(poisoned) => poisoned.into_inner(),
        }
    }

    /// Keys are caller-supplied tokens: 1–128 chars of `[A-Za-z0-9_.:-]`.
    pub fn is_valid_key(key: &str) -> bool {
        !key.is_empty()
            && key.len() <= 128
            && key
                .chars()
                .all(|c| c.is_ascii_alphanumeric() || matches!(c, '-' | '_' | '.' | ':'))
    }

    pub fn claim(&self, key: &str) -> Claim {
        let mut map = self.map();
        match map.get(key) {
            Some(Slot::Pending) => Claim::InFlight,
            Some(Slot::Done(record)) => Claim::Replayed(record.result.clone()),
            None => {
                map.insert(key.to_string(), Slot::Pending);
                Claim::Fresh
            }
        }
    }

    pub fn lookup(&self, key: &str) -> Option<StoredResult> {
        match self.map().get(key) {
            Some(Slot::Done(record)) => Some(record.result.clone()),
            _ => None,
        }
    }

    /// Store the apply result under a previously claimed key.
    pub fn complete(&self, key: &str, result: StoredResult, op_tag: &str) {
        self.map().insert(
            key.to_string(),
            Slot::Done(IdempotencyRecord {
                result,
                op_tag: op_tag.to_string(),
                created_at: Utc::now(),
            }),
        );
    }

    /// Release a claimed key after a failed apply so a retry can execute.
    pub fn abandon(&self, key: &str) {
        let mut map = self.map();
        if matches!(map.get(key), Some(Slot::Pending)) {
            map.remove(key);
        }
    }
}
