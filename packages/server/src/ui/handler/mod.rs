//! Request handlers

pub mod http;
pub mod websocket;

pub use http::{get_message_history, health_check};
pub use websocket::websocket_handler;
