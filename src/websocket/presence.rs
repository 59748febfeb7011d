use crate::models::websocket::{PresenceStatus, ServerEvent, UserConnection};
use dashmap::DashMap;
use std::sync::Arc;
use uuid::Uuid;

// Which users currently have a live, addressable connection. Process-local
// and rebuilt from scratch on restart; presence is current-session-only.
//
// One connection per user: a second register for the same user replaces the
// first, and only the replacement is reachable afterwards.
#[derive(Clone)]
pub struct PresenceRegistry {
    entries: Arc<DashMap<Uuid, UserConnection>>,
}

impl PresenceRegistry {
    pub fn new() -> Self {
        Self {
            entries: Arc::new(DashMap::new()),
        }
    }

    // Bind a user to a connection, displacing any previous one, and tell
    // everyone else they came online.
    pub fn register(&self, connection: UserConnection) {
        let user_id = connection.user_id;
        self.entries.insert(user_id, connection);

        self.broadcast(
            ServerEvent::UserStatusUpdate {
                user_id,
                status: PresenceStatus::Online,
            },
            Some(user_id),
        );
        tracing::info!("user {} is online", user_id);
    }

    // Drop the mapping held by this exact connection. A stale handle (one
    // already superseded by a newer connection from the same user) must not
    // evict the newer mapping, so the removal re-checks the connection id.
    pub fn unregister(&self, connection_id: Uuid) -> Option<Uuid> {
        let user_id = self
            .entries
            .iter()
            .find_map(|entry| (entry.value().connection_id == connection_id).then(|| *entry.key()))?;

        let removed = self
            .entries
            .remove_if(&user_id, |_, conn| conn.connection_id == connection_id);

        if removed.is_some() {
            self.broadcast(
                ServerEvent::UserStatusUpdate {
                    user_id,
                    status: PresenceStatus::Offline,
                },
                Some(user_id),
            );
            tracing::info!("user {} is offline", user_id);
            Some(user_id)
        } else {
            None
        }
    }

    pub fn lookup(&self, user_id: Uuid) -> Option<UserConnection> {
        self.entries.get(&user_id).map(|entry| entry.value().clone())
    }

    pub fn is_online(&self, user_id: Uuid) -> bool {
        self.entries.contains_key(&user_id)
    }

    // Push an event to every registered connection except `exclude_user`.
    // Entries whose channel is gone are pruned after the sweep.
    pub fn broadcast(&self, event: ServerEvent, exclude_user: Option<Uuid>) {
        let mut dead: Vec<(Uuid, Uuid)> = Vec::new();

        for entry in self.entries.iter() {
            let user_id = *entry.key();
            if Some(user_id) == exclude_user {
                continue;
            }
            if entry.value().sender.send(event.clone()).is_err() {
                dead.push((user_id, entry.value().connection_id));
            }
        }

        for (user_id, connection_id) in dead {
            tracing::warn!("pruning dead presence entry for user {}", user_id);
            self.entries
                .remove_if(&user_id, |_, conn| conn.connection_id == connection_id);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tokio::sync::mpsc::{unbounded_channel, UnboundedReceiver};

    fn connection(user_id: Uuid) -> (UserConnection, UnboundedReceiver<ServerEvent>) {
        let (tx, rx) = unbounded_channel();
        (
            UserConnection {
                connection_id: Uuid::new_v4(),
                user_id,
                sender: tx,
            },
            rx,
        )
    }

    #[tokio::test]
    async fn register_then_lookup() {
        let registry = PresenceRegistry::new();
        let user = Uuid::new_v4();
        let (conn, _rx) = connection(user);
        let connection_id = conn.connection_id;

        registry.register(conn);

        assert!(registry.is_online(user));
        assert_eq!(registry.lookup(user).unwrap().connection_id, connection_id);
        assert!(registry.lookup(Uuid::new_v4()).is_none());
    }

    #[tokio::test]
    async fn last_registration_wins() {
        let registry = PresenceRegistry::new();
        let user = Uuid::new_v4();
        let (first, _rx1) = connection(user);
        let (second, _rx2) = connection(user);
        let first_id = first.connection_id;
        let second_id = second.connection_id;

        registry.register(first);
        registry.register(second);
        assert_eq!(registry.lookup(user).unwrap().connection_id, second_id);

        // the superseded handle disconnecting must not evict the newer one
        assert_eq!(registry.unregister(first_id), None);
        assert!(registry.is_online(user));

        assert_eq!(registry.unregister(second_id), Some(user));
        assert!(!registry.is_online(user));
    }

    #[tokio::test]
    async fn unregister_unknown_handle_is_a_noop() {
        let registry = PresenceRegistry::new();
        assert_eq!(registry.unregister(Uuid::new_v4()), None);
    }

    #[tokio::test]
    async fn register_broadcasts_online_to_others() {
        let registry = PresenceRegistry::new();
        let watcher = Uuid::new_v4();
        let joiner = Uuid::new_v4();
        let (watcher_conn, mut watcher_rx) = connection(watcher);
        let (joiner_conn, mut joiner_rx) = connection(joiner);

        registry.register(watcher_conn);
        registry.register(joiner_conn);

        match watcher_rx.try_recv().unwrap() {
            ServerEvent::UserStatusUpdate { user_id, status } => {
                assert_eq!(user_id, joiner);
                assert_eq!(status, PresenceStatus::Online);
            }
            other => panic!("unexpected event: {:?}", other),
        }
        // the joiner does not hear about themselves
        assert!(joiner_rx.try_recv().is_err());
    }

    #[tokio::test]
    async fn unregister_broadcasts_offline() {
        let registry = PresenceRegistry::new();
        let watcher = Uuid::new_v4();
        let leaver = Uuid::new_v4();
        let (watcher_conn, mut watcher_rx) = connection(watcher);
        let (leaver_conn, _leaver_rx) = connection(leaver);
        let leaver_connection_id = leaver_conn.connection_id;

        registry.register(watcher_conn);
        registry.register(leaver_conn);
        watcher_rx.try_recv().unwrap(); // online event

        registry.unregister(leaver_connection_id);

        match watcher_rx.try_recv().unwrap() {
            ServerEvent::UserStatusUpdate { user_id, status } => {
                assert_eq!(user_id, leaver);
                assert_eq!(status, PresenceStatus::Offline);
            }
            other => panic!("unexpected event: {:?}", other),
        }
    }

    #[tokio::test]
    async fn broadcast_prunes_closed_channels() {
        let registry = PresenceRegistry::new();
        let gone = Uuid::new_v4();
        let (gone_conn, gone_rx) = connection(gone);
        registry.register(gone_conn);
        drop(gone_rx);

        registry.broadcast(
            ServerEvent::UserStatusUpdate {
                user_id: Uuid::new_v4(),
                status: PresenceStatus::Online,
            },
            None,
        );

        assert!(!registry.is_online(gone));
    }
}
