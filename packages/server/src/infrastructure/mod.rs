//! Infrastructure layer
//!
//! ドメイン層が定義する trait の具体的な実装と、インスタンスローカルな接続レジストリ。

pub mod auth;
pub mod connection_registry;
pub mod dto;
pub mod relay;
pub mod repository;

pub use connection_registry::ConnectionRegistry;
