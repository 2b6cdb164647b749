//! App descriptors: the initial-message templates a new session copies.

use serde::{Deserialize, Serialize};

use crate::model::Role;
use crate::traits::AppCatalog;

/// A role/content template copied into a freshly created session.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MessageTemplate {
    pub role: Role,
    pub content: String,
}

/// External app descriptor consulted at session creation.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AppDescriptor {
    pub id: String,
    #[serde(default)]
    pub initial_messages: Vec<MessageTemplate>,
}

impl AppDescriptor {
    /// Descriptor with no seed messages.
    #[must_use]
    pub fn new(id: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            initial_messages: Vec::new(),
        }
    }

    /// Add a seed message template.
    #[must_use]
    pub fn with_initial_message(mut self, role: Role, content: impl Into<String>) -> Self {
        self.initial_messages.push(MessageTemplate {
            role,
            content: content.into(),
        });
        self
    }
}

/// Catalog backed by a fixed list of descriptors.
#[derive(Debug, Default)]
pub struct StaticCatalog {
    apps: Vec<AppDescriptor>,
}

impl StaticCatalog {
    /// Create a catalog from a list of descriptors.
    #[must_use]
    pub fn new(apps: Vec<AppDescriptor>) -> Self {
        Self { apps }
    }
}

impl AppCatalog for StaticCatalog {
    fn describe(&self, app_id: &str) -> Option<AppDescriptor> {
        self.apps.iter().find(|app| app.id == app_id).cloned()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn describe_finds_by_exact_id() {
        let catalog = StaticCatalog::new(vec![
            AppDescriptor::new("scratchpad"),
            AppDescriptor::new("docs-rag").with_initial_message(Role::System, "Answer from docs."),
        ]);

        let app = catalog.describe("docs-rag").unwrap();
        assert_eq!(app.initial_messages.len(), 1);
        assert!(catalog.describe("Docs-RAG").is_none());
        assert!(catalog.describe("missing").is_none());
    }

    #[test]
    fn initial_messages_default_to_empty_on_wire() {
        let app: AppDescriptor = serde_json::from_str("{\"id\":\"bare\"}").unwrap();
        assert!(app.initial_messages.is_empty());
    }
}
