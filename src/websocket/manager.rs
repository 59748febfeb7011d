use crate::models::websocket::{ChatRoom, ServerEvent, UserConnection};
use dashmap::DashMap;
use std::sync::Arc;
use uuid::Uuid;

// Chat-room membership for live connections. Rooms are keyed by chat id and
// hold one slot per physical connection; membership changes only through
// explicit join/leave signals and the disconnect sweep.
#[derive(Clone)]
pub struct WebSocketManager {
    // Map of chat_id -> ChatRoom
    chat_rooms: Arc<DashMap<Uuid, ChatRoom>>,
    // Map of connection_id -> set of chat_ids that connection has joined
    connection_chats: Arc<DashMap<Uuid, Arc<DashMap<Uuid, ()>>>>,
}

impl WebSocketManager {
    pub fn new() -> Self {
        Self {
            chat_rooms: Arc::new(DashMap::new()),
            connection_chats: Arc::new(DashMap::new()),
        }
    }

    pub fn join_chat(&self, chat_id: Uuid, connection: UserConnection) {
        let connection_id = connection.connection_id;

        let chat_room = self.chat_rooms.entry(chat_id).or_insert_with(|| ChatRoom {
            chat_id,
            connections: Arc::new(DashMap::new()),
        });
        chat_room.connections.insert(connection_id, connection);

        let joined = self
            .connection_chats
            .entry(connection_id)
            .or_insert_with(|| Arc::new(DashMap::new()));
        joined.insert(chat_id, ());

        tracing::debug!("connection {} joined chat {}", connection_id, chat_id);
    }

    pub fn leave_chat(&self, chat_id: Uuid, connection_id: Uuid) {
        if let Some(chat_room) = self.chat_rooms.get(&chat_id) {
            chat_room.connections.remove(&connection_id);

            if let Some(joined) = self.connection_chats.get(&connection_id) {
                joined.remove(&chat_id);
            }

            let empty = chat_room.connections.is_empty();
            drop(chat_room);
            if empty {
                self.chat_rooms
                    .remove_if(&chat_id, |_, room| room.connections.is_empty());
            }
        }

        tracing::debug!("connection {} left chat {}", connection_id, chat_id);
    }

    // Disconnect sweep; a connection leaves every room it joined.
    pub fn leave_all_chats(&self, connection_id: Uuid) {
        if let Some((_, joined)) = self.connection_chats.remove(&connection_id) {
            let chat_ids: Vec<Uuid> = joined.iter().map(|entry| *entry.key()).collect();
            for chat_id in chat_ids {
                if let Some(chat_room) = self.chat_rooms.get(&chat_id) {
                    chat_room.connections.remove(&connection_id);

                    let empty = chat_room.connections.is_empty();
                    drop(chat_room);
                    if empty {
                        self.chat_rooms
                            .remove_if(&chat_id, |_, room| room.connections.is_empty());
                    }
                }
            }
        }
    }

    pub fn broadcast_to_chat(
        &self,
        chat_id: Uuid,
        event: ServerEvent,
        exclude_connection: Option<Uuid>,
    ) {
        let Some(chat_room) = self.chat_rooms.get(&chat_id) else {
            return;
        };

        let mut dead: Vec<Uuid> = Vec::new();
        for connection in chat_room.connections.iter() {
            let connection_id = *connection.key();
            if Some(connection_id) == exclude_connection {
                continue;
            }
            if connection.value().sender.send(event.clone()).is_err() {
                dead.push(connection_id);
            }
        }

        for connection_id in dead {
            tracing::warn!(
                "pruning dead connection {} from chat {}",
                connection_id,
                chat_id
            );
            chat_room.connections.remove(&connection_id);
        }
    }

    pub fn is_connection_in_chat(&self, chat_id: Uuid, connection_id: Uuid) -> bool {
        if let Some(chat_room) = self.chat_rooms.get(&chat_id) {
            chat_room.connections.contains_key(&connection_id)
        } else {
            false
        }
    }

    pub fn chat_user_ids(&self, chat_id: Uuid) -> Vec<Uuid> {
        if let Some(chat_room) = self.chat_rooms.get(&chat_id) {
            chat_room
                .connections
                .iter()
                .map(|connection| connection.value().user_id)
                .collect()
        } else {
            Vec::new()
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

    fn probe_event() -> ServerEvent {
        ServerEvent::UserJoinedChat {
            chat_id: Uuid::new_v4(),
        }
    }

    #[tokio::test]
    async fn broadcast_skips_excluded_connection() {
        let manager = WebSocketManager::new();
        let chat_id = Uuid::new_v4();
        let (conn_a, mut rx_a) = connection(Uuid::new_v4());
        let (conn_b, mut rx_b) = connection(Uuid::new_v4());
        let a_id = conn_a.connection_id;

        manager.join_chat(chat_id, conn_a);
        manager.join_chat(chat_id, conn_b);

        manager.broadcast_to_chat(chat_id, probe_event(), Some(a_id));

        assert!(rx_a.try_recv().is_err());
        assert!(rx_b.try_recv().is_ok());
    }

    #[tokio::test]
    async fn leave_chat_removes_membership() {
        let manager = WebSocketManager::new();
        let chat_id = Uuid::new_v4();
        let (conn, mut rx) = connection(Uuid::new_v4());
        let connection_id = conn.connection_id;

        manager.join_chat(chat_id, conn);
        assert!(manager.is_connection_in_chat(chat_id, connection_id));

        manager.leave_chat(chat_id, connection_id);
        assert!(!manager.is_connection_in_chat(chat_id, connection_id));

        manager.broadcast_to_chat(chat_id, probe_event(), None);
        assert!(rx.try_recv().is_err());
    }

    #[tokio::test]
    async fn leave_all_chats_clears_every_room() {
        let manager = WebSocketManager::new();
        let chat_a = Uuid::new_v4();
        let chat_b = Uuid::new_v4();
        let user = Uuid::new_v4();
        let (conn, _rx) = connection(user);
        let connection_id = conn.connection_id;

        manager.join_chat(chat_a, conn.clone());
        manager.join_chat(chat_b, conn);

        manager.leave_all_chats(connection_id);

        assert!(!manager.is_connection_in_chat(chat_a, connection_id));
        assert!(!manager.is_connection_in_chat(chat_b, connection_id));
        assert!(manager.chat_user_ids(chat_a).is_empty());
    }

    #[tokio::test]
    async fn broadcast_prunes_dead_connections() {
        let manager = WebSocketManager::new();
        let chat_id = Uuid::new_v4();
        let (conn, rx) = connection(Uuid::new_v4());
        let connection_id = conn.connection_id;

        manager.join_chat(chat_id, conn);
        drop(rx);

        manager.broadcast_to_chat(chat_id, probe_event(), None);
        assert!(!manager.is_connection_in_chat(chat_id, connection_id));
    }

    #[tokio::test]
    async fn chat_user_ids_reports_room_members() {
        let manager = WebSocketManager::new();
        let chat_id = Uuid::new_v4();
        let user_a = Uuid::new_v4();
        let user_b = Uuid::new_v4();
        let (conn_a, _rx_a) = connection(user_a);
        let (conn_b, _rx_b) = connection(user_b);

        manager.join_chat(chat_id, conn_a);
        manager.join_chat(chat_id, conn_b);

        let mut users = manager.chat_user_ids(chat_id);
        users.sort();
        let mut expected = vec![user_a, user_b];
        expected.sort();
        assert_eq!(users, expected);
    }
}
