//! Advisory per-document lock table.
//!
//! One table is owned by a [`RepositoryManager`](crate::RepositoryManager)
//! and handed to every store it builds. Locks are keyed by document ID and
//! are honored only by code that goes through the table; nothing stops a
//! caller from touching storage directly.

use crate::models::DocId;
use crate::{Error, Result};
use std::collections::HashSet;
use std::sync::{Condvar, Mutex, MutexGuard};
use std::time::{Duration, Instant};

/// Process-local advisory mutual exclusion keyed by document ID.
#[derive(Debug, Default)]
pub struct LockTable {
    held: Mutex<HashSet<DocId>>,
    released: Condvar,
}

/// Releases its lock when dropped, on every exit path.
#[derive(Debug)]
#[must_use = "the lock is released as soon as the guard is dropped"]
pub struct LockGuard<'a> {
    table: &'a LockTable,
    id: DocId,
}

impl LockGuard<'_> {
    /// Returns the locked document ID.
    pub const fn id(&self) -> &DocId {
        &self.id
    }

    /// Checks that this guard holds `id` in `table`.
    ///
    /// # Errors
    ///
    /// Returns [`Error::InvalidInput`] if the guard was taken for another ID
    /// or from another table.
    pub fn ensure_covers(&self, table: &LockTable, id: &DocId) -> Result<()> {
        if std::ptr::eq(self.table, table) && &self.id == id {
            return Ok(());
        }
        Err(Error::InvalidInput(format!(
            "lock guard for '{}' does not cover document '{id}'",
            self.id
        )))
    }
}

impl Drop for LockGuard<'_> {
    fn drop(&mut self) {
        self.table.release(&self.id);
    }
}

impl LockTable {
    /// Creates an empty lock table.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Acquires the held-set mutex, recovering from poisoning.
    fn held(&self) -> MutexGuard<'_, HashSet<DocId>> {
        self.held.lock().unwrap_or_else(|poisoned| {
            tracing::warn!("Lock table mutex was poisoned, recovering");
            poisoned.into_inner()
        })
    }

    /// Locks `id`, waiting up to `timeout` for a current holder to release it.
    ///
    /// Returns `false` if the lock is still held when the wait expires; the
    /// caller must not write in that case.
    pub fn acquire(&self, id: &DocId, timeout: Duration) -> bool {
        let deadline = Instant::now() + timeout;
        let mut held = self.held();

        while held.contains(id) {
            let now = Instant::now();
            if now >= deadline {
                metrics::counter!("lock_table_timeouts_total").increment(1);
                tracing::debug!(doc.id = %id, ?timeout, "Timed out waiting for document lock");
                return false;
            }
            held = match self.released.wait_timeout(held, deadline - now) {
                Ok((guard, _)) => guard,
                Err(poisoned) => {
                    tracing::warn!("Lock table mutex was poisoned, recovering");
                    poisoned.into_inner().0
                },
            };
        }

        held.insert(id.clone());
        true
    }

    /// Releases `id`. Releasing an unlocked ID is a no-op.
    pub fn release(&self, id: &DocId) {
        let removed = self.held().remove(id);
        if removed {
            self.released.notify_all();
        }
    }

    /// Returns true if `id` is currently locked.
    pub fn is_locked(&self, id: &DocId) -> bool {
        self.held().contains(id)
    }

    /// Acquires `id` and returns a guard that releases it on drop.
    ///
    /// Returns `None` on timeout.
    pub fn lock(&self, id: &DocId, timeout: Duration) -> Option<LockGuard<'_>> {
        self.acquire(id, timeout).then(|| LockGuard {
            table: self,
            id: id.clone(),
        })
    }

    /// Acquires `id` like [`Self::lock`], turning a timeout into an error.
    ///
    /// # Errors
    ///
    /// Returns a retryable [`Error::AccessFailure`] with operation
    /// `acquire_lock` if the lock is still held after `timeout`.
    pub fn lock_or_timeout(&self, id: &DocId, timeout: Duration) -> Result<LockGuard<'_>> {
        self.lock(id, timeout).ok_or_else(|| Error::AccessFailure {
            operation: "acquire_lock".to_string(),
            cause: format!("document '{id}' still locked after {timeout:?}"),
        })
    }

    /// Returns the number of currently held locks.
    pub fn held_count(&self) -> usize {
        self.held().len()
    }
}
