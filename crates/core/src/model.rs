use std::collections::BTreeMap;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::error::CoreError;
use crate::ids::{ItineraryId, NodeId};

/// Lifecycle status of a node. Transitions are validated, not just stored —
/// see [`NodeStatus::can_transition_to`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum NodeStatus {
    Planned,
    InProgress,
    Completed,
    Skipped,
    Cancelled,
}

impl NodeStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Planned => "planned",
            Self::InProgress => "in_progress",
            Self::Completed => "completed",
            Self::Skipped => "skipped",
            Self::Cancelled => "cancelled",
        }
    }

    /// Whether a status change is allowed.
    ///
    /// planned -> in_progress | skipped | cancelled
    /// in_progress -> completed | skipped | cancelled
    /// skipped | cancelled -> planned | in_progress
    /// completed -> planned | in_progress
    pub fn can_transition_to(self, next: Self) -> bool {
        use NodeStatus::*;
        if self == next {
            return true;
        }
        match self {
            Planned => matches!(next, InProgress | Skipped | Cancelled),
            InProgress => matches!(next, Completed | Skipped | Cancelled),
            Skipped | Cancelled => matches!(next, Planned | InProgress),
            Completed => matches!(next, Planned | InProgress),
        }
    }
}

impl Default for NodeStatus {
    fn default() -> Self {
        Self::Planned
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct TimeWindow {
    pub start: DateTime<Utc>,
    pub end: DateTime<Utc>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Location {
    pub name: String,
    #[serde(default)]
    pub lat: Option<f64>,
    #[serde(default)]
    pub lon: Option<f64>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Cost {
    pub amount: f64,
    pub currency: String,
}

/// A single activity, meal, transfer, etc. within a day.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Node {
    pub id: NodeId,
    pub kind: String,
    pub title: String,
    #[serde(default)]
    pub locked: bool,
    #[serde(default)]
    pub status: NodeStatus,
    #[serde(default)]
    pub timing: Option<TimeWindow>,
    #[serde(default)]
    pub location: Option<Location>,
    #[serde(default)]
    pub cost: Option<Cost>,
    #[serde(default)]
    pub details: BTreeMap<String, String>,
    #[serde(default)]
    pub agent_data: BTreeMap<String, String>,
    #[serde(default)]
    pub updated_by: Option<String>,
    #[serde(default)]
    pub updated_at: Option<DateTime<Utc>>,
}

impl Node {
    pub fn new(id: impl Into<NodeId>, kind: impl Into<String>, title: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            kind: kind.into(),
            title: title.into(),
            locked: false,
            status: NodeStatus::Planned,
            timing: None,
            location: None,
            cost: None,
            details: BTreeMap::new(),
            agent_data: BTreeMap::new(),
            updated_by: None,
            updated_at: None,
        }
    }

    pub fn touch(&mut self, agent: Option<&str>, at: DateTime<Utc>) {
        self.updated_by = agent.map(|a| a.to_string());
        self.updated_at = Some(at);
    }
}

/// Directed visiting-order edge between two nodes of the same day.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Edge {
    pub id: String,
    pub from: NodeId,
    pub to: NodeId,
}

impl Edge {
    pub fn between(day: u32, from: &NodeId, to: &NodeId) -> Self {
        Self {
            id: format!("day{day}_{from}__{to}"),
            from: from.clone(),
            to: to.clone(),
        }
    }

    /// Parse the day number out of a structured edge id (`day<N>_...`).
    pub fn day_from_id(edge_id: &str) -> Option<u32> {
        let rest = edge_id.strip_prefix("day")?;
        let digits: String = rest.chars().take_while(|c| c.is_ascii_digit()).collect();
        if digits.is_empty() || !rest[digits.len()..].starts_with('_') {
            return None;
        }
        digits.parse().ok()
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Day {
    pub number: u32,
    #[serde(default)]
    pub nodes: Vec<Node>,
    #[serde(default)]
    pub edges: Vec<Edge>,
}

impl Day {
    pub fn new(number: u32) -> Self {
        Self {
            number,
            nodes: Vec::new(),
            edges: Vec::new(),
        }
    }

    pub fn node(&self, id: &NodeId) -> Option<&Node> {
        self.nodes.iter().find(|n| &n.id == id)
    }

    pub fn node_mut(&mut self, id: &NodeId) -> Option<&mut Node> {
        self.nodes.iter_mut().find(|n| &n.id == id)
    }

    pub fn node_index(&self, id: &NodeId) -> Option<usize> {
        self.nodes.iter().position(|n| &n.id == id)
    }

    pub fn node_ids(&self) -> Vec<NodeId> {
        self.nodes.iter().map(|n| n.id.clone()).collect()
    }

    /// Rebuild the visiting-order chain so edges follow node order exactly.
    pub fn rebuild_chain_edges(&mut self) {
        self.edges = self
            .nodes
            .windows(2)
            .map(|pair| Edge::between(self.number, &pair[0].id, &pair[1].id))
            .collect();
    }
}

/// The versioned tree-of-graphs document the change engine mutates.
/// `version` starts at 1 and strictly increases on every successful apply;
/// undo restores content but still moves the counter forward.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Itinerary {
    pub id: ItineraryId,
    pub version: u64,
    pub owner_id: String,
    pub days: Vec<Day>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Itinerary {
    pub fn new(id: ItineraryId, owner_id: impl Into<String>, now: DateTime<Utc>) -> Self {
        Self {
            id,
            version: 1,
            owner_id: owner_id.into(),
            days: Vec::new(),
            created_at: now,
            updated_at: now,
        }
    }

    pub fn day(&self, number: u32) -> Option<&Day> {
        self.days.iter().find(|d| d.number == number)
    }

    pub fn day_mut(&mut self, number: u32) -> Option<&mut Day> {
        self.days.iter_mut().find(|d| d.number == number)
    }

    /// Locate a node anywhere in the itinerary. Linear scan; documents hold
    /// tens of nodes per day, not thousands.
    pub fn find_node(&self, id: &NodeId) -> Option<(u32, &Node)> {
        self.days
            .iter()
            .find_map(|d| d.node(id).map(|n| (d.number, n)))
    }

    pub fn find_node_mut(&mut self, id: &NodeId) -> Option<(u32, &mut Node)> {
        self.days.iter_mut().find_map(|d| {
            let number = d.number;
            d.node_mut(id).map(|n| (number, n))
        })
    }

    pub fn contains_node(&self, id: &NodeId) -> bool {
        self.find_node(id).is_some()
    }

    pub fn node_ids(&self) -> Vec<NodeId> {
        self.days.iter().flat_map(|d| d.node_ids()).collect()
    }

    pub fn to_msgpack(&self) -> Result<Vec<u8>, CoreError> {
        rmp_serde::to_vec(self).map_err(|e| CoreError::Serialization(e.to_string()))
    }

    pub fn from_msgpack(bytes: &[u8]) -> Result<Self, CoreError> {
        rmp_serde::from_slice(bytes).map_err(|e| CoreError::Serialization(e.to_string()))
    }
}
