use std::collections::BTreeMap;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::ids::NodeId;
use crate::model::{Cost, Location, Node, NodeStatus, TimeWindow};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ChangeScope {
    Trip,
    Day,
}

impl Default for ChangeScope {
    fn default() -> Self {
        Self::Trip
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct ChangePreferences {
    /// Honor the per-node `locked` flag. Default true; AI-generated
    /// changesets may override it deliberately.
    pub respect_locks: bool,
    pub auto_apply: bool,
    pub user_first: bool,
}

impl Default for ChangePreferences {
    fn default() -> Self {
        Self {
            respect_locks: true,
            auto_apply: false,
            user_first: true,
        }
    }
}

/// Partial node used by the `update` operation. Scalar fields overwrite,
/// map fields merge key-by-key into the existing node so a partial patch
/// never wipes fields it did not mention.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct NodePatch {
    #[serde(default)]
    pub title: Option<String>,
    #[serde(default)]
    pub status: Option<NodeStatus>,
    #[serde(default)]
    pub timing: Option<TimeWindow>,
    #[serde(default)]
    pub location: Option<Location>,
    #[serde(default)]
    pub cost: Option<Cost>,
    #[serde(default)]
    pub locked: Option<bool>,
    #[serde(default)]
    pub details: BTreeMap<String, String>,
    #[serde(default)]
    pub agent_data: BTreeMap<String, String>,
}

impl NodePatch {
    pub fn is_empty(&self) -> bool {
        self.title.is_none()
            && self.status.is_none()
            && self.timing.is_none()
            && self.location.is_none()
            && self.cost.is_none()
            && self.locked.is_none()
            && self.details.is_empty()
            && self.agent_data.is_empty()
    }

    /// Names of the fields this patch would touch, for diff reporting.
    pub fn field_names(&self) -> Vec<String> {
        let mut fields = Vec::new();
        if self.title.is_some() {
            fields.push("title".to_string());
        }
        if self.status.is_some() {
            fields.push("status".to_string());
        }
        if self.timing.is_some() {
            fields.push("timing".to_string());
        }
        if self.location.is_some() {
            fields.push("location".to_string());
        }
        if self.cost.is_some() {
            fields.push("cost".to_string());
        }
        if self.locked.is_some() {
            fields.push("locked".to_string());
        }
        if !self.details.is_empty() {
            fields.push("details".to_string());
        }
        if !self.agent_data.is_empty() {
            fields.push("agent_data".to_string());
        }
        fields
    }
}

/// One requested edit. Tagged so AI-produced changesets serialize as
/// `{"op": "move", ...}`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "op", rename_all = "snake_case")]
pub enum ChangeOperation {
    Move {
        id: NodeId,
        start: DateTime<Utc>,
        end: DateTime<Utc>,
    },
    Insert {
        day: u32,
        node: Node,
        #[serde(default)]
        after: Option<NodeId>,
    },
    Delete {
        id: NodeId,
    },
    Replace {
        id: NodeId,
        #[serde(default)]
        node: Option<Node>,
    },
    Update {
        id: NodeId,
        patch: NodePatch,
    },
    UpdateEdge {
        #[serde(default)]
        edge_id: Option<String>,
        #[serde(default)]
        day: Option<u32>,
    },
    Reorder {
        day: u32,
        order: Vec<NodeId>,
    },
}

impl ChangeOperation {
    pub fn op_name(&self) -> &'static str {
        match self {
            Self::Move { .. } => "move",
            Self::Insert { .. } => "insert",
            Self::Delete { .. } => "delete",
            Self::Replace { .. } => "replace",
            Self::Update { .. } => "update",
            Self::UpdateEdge { .. } => "update_edge",
            Self::Reorder { .. } => "reorder",
        }
    }

    /// The node this operation targets, where it targets a single node.
    pub fn target_node(&self) -> Option<&NodeId> {
        match self {
            Self::Move { id, .. }
            | Self::Delete { id }
            | Self::Replace { id, .. }
            | Self::Update { id, .. } => Some(id),
            Self::Insert { .. } | Self::UpdateEdge { .. } | Self::Reorder { .. } => None,
        }
    }

    /// The day this operation restructures, where it targets a whole day.
    pub fn target_day(&self) -> Option<u32> {
        match self {
            Self::Reorder { day, .. } => Some(*day),
            Self::Insert { day, .. } => Some(*day),
            _ => None,
        }
    }
}

/// A batch of requested edits plus concurrency and locking preferences.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ChangeSet {
    #[serde(default)]
    pub scope: ChangeScope,
    #[serde(default)]
    pub day: Option<u32>,
    pub operations: Vec<ChangeOperation>,
    #[serde(default)]
    pub preferences: ChangePreferences,
    /// The version the caller believes is current; enables optimistic
    /// concurrency when present.
    #[serde(default)]
    pub base_version: Option<u64>,
    #[serde(default)]
    pub idempotency_key: Option<String>,
    #[serde(default)]
    pub agent: Option<String>,
    #[serde(default)]
    pub reason: Option<String>,
}

impl ChangeSet {
    pub fn new(operations: Vec<ChangeOperation>) -> Self {
        Self {
            scope: ChangeScope::Trip,
            day: None,
            operations,
            preferences: ChangePreferences::default(),
            base_version: None,
            idempotency_key: None,
            agent: None,
            reason: None,
        }
    }

    pub fn with_base_version(mut self, version: u64) -> Self {
        self.base_version = Some(version);
        self
    }

    pub fn with_idempotency_key(mut self, key: impl Into<String>) -> Self {
        self.idempotency_key = Some(key.into());
        self
    }

    pub fn with_agent(mut self, agent: impl Into<String>) -> Self {
        self.agent = Some(agent.into());
        self
    }

    pub fn with_preferences(mut self, preferences: ChangePreferences) -> Self {
        self.preferences = preferences;
        self
    }
}
