//! UI layer
//!
//! HTTP / WebSocket の入り口。認証ゲート、アップグレード、読み込み・書き込みループ、
//! 履歴 API を提供します。

pub mod handler;
pub mod middleware;
pub mod server;
mod signal;
pub mod state;

pub use server::Server;
pub use state::AppState;
