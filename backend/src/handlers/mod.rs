pub mod auth;
pub mod chats;
pub mod folders;
pub mod health;
pub mod speech;
