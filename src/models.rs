pub mod chats;
pub mod notifications;
pub mod sessions;
pub mod users;
pub mod websocket;
