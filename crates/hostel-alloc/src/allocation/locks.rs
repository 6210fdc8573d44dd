use std::collections::HashMap;
use std::sync::{Arc, Mutex, PoisonError};
use std::time::Duration;

use tokio::sync::{Mutex as AsyncMutex, OwnedMutexGuard};

use super::domain::RoomId;
use super::errors::AllocationError;

/// Lazily populated table of per-room locks. There is no global lock: rooms never contend with
/// each other, only requests for the same room serialize.
#[derive(Debug)]
pub struct RoomLocks {
    table: Mutex<HashMap<RoomId, Arc<AsyncMutex<()>>>>,
    timeout: Duration,
}

/// Held for the whole check-and-commit of one room.
#[derive(Debug)]
pub struct RoomGuard {
    room_id: RoomId,
    _guard: OwnedMutexGuard<()>,
}

impl RoomGuard {
    pub fn room_id(&self) -> RoomId {
        self.room_id
    }
}

impl RoomLocks {
    pub fn new(timeout: Duration) -> Self {
        Self {
            table: Mutex::new(HashMap::new()),
            timeout,
        }
    }

    /// Wait at most the configured timeout for the room's lock.
    ///
    /// Dropping the returned future before it resolves leaves no trace.
    pub async fn acquire(&self, room_id: RoomId) -> Result<RoomGuard, AllocationError> {
        let lock = self.lock_for(room_id);
        match tokio::time::timeout(self.timeout, lock.lock_owned()).await {
            Ok(guard) => Ok(RoomGuard {
                room_id,
                _guard: guard,
            }),
            Err(_) => Err(AllocationError::Busy {
                room_id,
                waited: self.timeout,
            }),
        }
    }

    fn lock_for(&self, room_id: RoomId) -> Arc<AsyncMutex<()>> {
        let mut table = self.table.lock().unwrap_or_else(PoisonError::into_inner);
        table
            .entry(room_id)
            .or_insert_with(|| Arc::new(AsyncMutex::new(())))
            .clone()
    }
}
