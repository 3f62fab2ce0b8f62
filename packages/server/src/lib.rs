//! Hibiki: real-time event fan-out core.
//!
//! 各インスタンスは WebSocket 接続を受け付け、受信したイベントを永続化キューと
//! クラスタ共有のリレーへ送り、リレーから受け取ったイベントをローカルに接続中の
//! 宛先へ配信します。

pub mod config;
pub mod domain;
pub mod infrastructure;
pub mod instance;
pub mod ui;
pub mod usecase;

pub use config::ServerConfig;
pub use instance::{Collaborators, Instance};
