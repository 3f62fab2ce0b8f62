//! Relay implementations
//!
//! - `memory`: プロセス内の broadcast チャンネルを使った実装（単一ノード／テスト用）

pub mod memory;

pub use memory::InMemoryRelay;
