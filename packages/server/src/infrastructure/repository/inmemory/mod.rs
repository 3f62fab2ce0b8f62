//! InMemory implementations of the durable store and the membership store

pub mod membership;
pub mod message;

pub use membership::InMemoryMembershipStore;
pub use message::InMemoryMessageStore;
