use serde::{Deserialize, Serialize};

use crate::ids::NodeId;

/// One changed element. `title` is snapshotted before mutation so removed
/// and updated entries stay readable after the node is gone.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DiffItem {
    /// Node id for node changes, edge id for edge acknowledgements,
    /// `day<N>` for day-level restructuring.
    pub id: String,
    pub day: u32,
    pub fields: Vec<String>,
    pub title: String,
}

/// The added/removed/updated summary of what a changeset actually changed.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ItineraryDiff {
    pub added: Vec<DiffItem>,
    pub removed: Vec<DiffItem>,
    pub updated: Vec<DiffItem>,
}

impl ItineraryDiff {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn is_empty(&self) -> bool {
        self.added.is_empty() && self.removed.is_empty() && self.updated.is_empty()
    }

    pub fn len(&self) -> usize {
        self.added.len() + self.removed.len() + self.updated.len()
    }

    pub fn add(&mut self, id: impl Into<String>, day: u32, fields: Vec<String>, title: impl Into<String>) {
        self.added.push(DiffItem {
            id: id.into(),
            day,
            fields,
            title: title.into(),
        });
    }

    pub fn remove(&mut self, id: impl Into<String>, day: u32, title: impl Into<String>) {
        self.removed.push(DiffItem {
            id: id.into(),
            day,
            fields: Vec::new(),
            title: title.into(),
        });
    }

    pub fn update(&mut self, id: impl Into<String>, day: u32, fields: Vec<String>, title: impl Into<String>) {
        self.updated.push(DiffItem {
            id: id.into(),
            day,
            fields,
            title: title.into(),
        });
    }

    /// Ids of nodes added or updated, for post-commit enrichment.
    pub fn enrichable_node_ids(&self) -> Vec<NodeId> {
        self.added
            .iter()
            .chain(self.updated.iter())
            .map(|item| NodeId::new(item.id.clone()))
            .collect()
    }

    /// All element ids this diff touches, for conflict intersection.
    pub fn touched_ids(&self) -> Vec<String> {
        self.added
            .iter()
            .chain(self.removed.iter())
            .chain(self.updated.iter())
            .map(|item| item.id.clone())
            .collect()
    }

    /// Human-readable one-liner for notifications and logs.
    pub fn summary(&self) -> String {
        if self.is_empty() {
            return "no changes".to_string();
        }
        let mut parts = Vec::new();
        if !self.added.is_empty() {
            parts.push(format!("{} added", self.added.len()));
        }
        if !self.removed.is_empty() {
            parts.push(format!("{} removed", self.removed.len()));
        }
        if !self.updated.is_empty() {
            parts.push(format!("{} updated", self.updated.len()));
        }
        parts.join(", ")
    }
}
