use std::{
    collections::HashMap,
    sync::{Arc, Mutex},
};

use tokio::sync::{Mutex as AsyncMutex, OwnedMutexGuard};

use crate::db_types::MatchId;

const PRUNE_THRESHOLD: usize = 1024;

/// Serializes operations on the same match within this process. Different matches never contend.
///
/// Cross-process safety comes from versioned writes in the store. This registry just keeps one process from racing
/// itself into needless version conflicts.
#[derive(Clone, Default)]
pub struct MatchLocks {
    locks: Arc<Mutex<HashMap<MatchId, Arc<AsyncMutex<()>>>>>,
}

impl MatchLocks {
    pub async fn lock(&self, match_id: &MatchId) -> OwnedMutexGuard<()> {
        let lock = {
            let mut map = match self.locks.lock() {
                Ok(m) => m,
                Err(poisoned) => poisoned.into_inner(),
            };
            if map.len() > PRUNE_THRESHOLD {
                // Nobody holds or waits on an entry whose only reference is the map itself
                map.retain(|_, l| Arc::strong_count(l) > 1);
            }
            Arc::clone(map.entry(match_id.clone()).or_default())
        };
        lock.lock_owned().await
    }

    pub fn len(&self) -> usize {
        self.locks.lock().map(|m| m.len()).unwrap_or_default()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}
