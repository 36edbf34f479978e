//! Presence registry - the single authoritative user → connection mapping.

use std::sync::Arc;

use dashmap::DashMap;

use courier_core::types::id::UserId;

use crate::connection::handle::ConnectionHandle;

/// Maps each online user to the one connection that currently represents them.
///
/// Every operation is atomic per user: mutations for the same user are
/// serialized by the map's shard lock, mutations for different users are
/// independent. Nothing here performs I/O, so no call ever waits on a peer.
#[derive(Debug, Default)]
pub struct PresenceRegistry {
    /// User ID → current connection
    entries: DashMap<UserId, Arc<ConnectionHandle>>,
}

impl PresenceRegistry {
    /// Create an empty registry
    pub fn new() -> Self {
        Self {
            entries: DashMap::new(),
        }
    }

    /// Associate `user_id` with `handle`, replacing any previous connection.
    ///
    /// Returns the superseded handle when it was a different connection. The
    /// superseded connection is not closed; that belongs to the transport.
    pub fn register(
        &self,
        user_id: UserId,
        handle: Arc<ConnectionHandle>,
    ) -> Option<Arc<ConnectionHandle>> {
        let id = handle.id;
        self.entries
            .insert(user_id, handle)
            .filter(|previous| previous.id != id)
    }

    /// Remove the mapping for `user_id` only if it still points at `handle`.
    ///
    /// A close event from a connection that has already been replaced must
    /// not evict the newer one, so this is a compare-and-delete rather than a
    /// delete by key. Returns whether an entry was removed.
    pub fn unregister(&self, user_id: &UserId, handle: &ConnectionHandle) -> bool {
        self.entries
            .remove_if(user_id, |_, current| current.id == handle.id)
            .is_some()
    }

    /// Current connection for `user_id`, if any.
    pub fn lookup(&self, user_id: &UserId) -> Option<Arc<ConnectionHandle>> {
        self.entries.get(user_id).map(|entry| Arc::clone(entry.value()))
    }

    /// Check if a user is online
    pub fn is_online(&self, user_id: &UserId) -> bool {
        self.entries.contains_key(user_id)
    }

    /// Number of users with a registered connection
    pub fn online_count(&self) -> usize {
        self.entries.len()
    }

    /// Snapshot of all online users, sorted
    pub fn online_users(&self) -> Vec<UserId> {
        let mut users: Vec<UserId> = self.entries.iter().map(|r| r.key().clone()).collect();
        users.sort();
        users
    }
}
