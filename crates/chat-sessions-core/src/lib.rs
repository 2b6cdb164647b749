//! Core types for the chat session state engine.
//!
//! This crate provides the fundamental building blocks:
//! - `Session` / `Message` / `Checkpoint` - conversation data and wire types
//! - `ids` - stable message identifiers and display timestamps
//! - `ChangeNotifier` - single-slot mailbox for UI refresh events
//! - Collaborator traits (`ResponseGenerator`, `Presenter`, `AppCatalog`,
//!   `CheckpointStore`)

pub mod catalog;
pub mod event;
pub mod ids;
pub mod model;
pub mod notifier;
pub mod traits;

pub use catalog::{AppDescriptor, MessageTemplate, StaticCatalog};
pub use event::{ChangeEvent, ChangeKind, SwitchReason};
pub use ids::IdError;
pub use model::{Checkpoint, Message, Role, Session};
pub use notifier::ChangeNotifier;
pub use traits::{
    AppCatalog, CheckpointStore, ChunkStream, GeneratorError, Presenter, ResponseGenerator,
    StoreError,
};
