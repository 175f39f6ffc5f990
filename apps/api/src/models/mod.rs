pub mod admin;
pub mod chat;
pub mod content;
pub mod session;
