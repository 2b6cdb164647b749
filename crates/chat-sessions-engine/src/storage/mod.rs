//! Checkpoint storage implementations.

pub mod json;
pub mod memory;

pub use json::JsonStore;
pub use memory::MemoryStore;
