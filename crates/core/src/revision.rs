use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::diff::ItineraryDiff;
use crate::ids::{ItineraryId, RevisionId};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ElementKind {
    Node,
    Edge,
    Day,
}

impl ElementKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Node => "node",
            Self::Edge => "edge",
            Self::Day => "day",
        }
    }
}

/// What one operation did to one element, recorded for the audit trail and
/// consumed by conflict detection.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ChangeDetail {
    pub op: String,
    pub element: ElementKind,
    pub element_id: String,
    #[serde(default)]
    pub day: Option<u32>,
    #[serde(default)]
    pub old_title: Option<String>,
    #[serde(default)]
    pub new_title: Option<String>,
    #[serde(default)]
    pub fields: Vec<String>,
}

impl ChangeDetail {
    /// True when this detail only touches cosmetic fields — ones that can
    /// commute with a concurrent timing move on the same node.
    pub fn is_cosmetic(&self) -> bool {
        !self.fields.is_empty()
            && self
                .fields
                .iter()
                .all(|f| matches!(f.as_str(), "title" | "details" | "agent_data" | "cost" | "location"))
    }

    /// True when this detail destroys or swaps out the element entirely.
    pub fn is_destructive(&self) -> bool {
        matches!(self.op.as_str(), "delete" | "replace")
    }
}

/// Immutable record of one successful apply (or undo): who changed what,
/// from which version to which. Written once, never mutated.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RevisionRecord {
    pub id: RevisionId,
    pub itinerary_id: ItineraryId,
    pub from_version: u64,
    pub to_version: u64,
    pub created_at: DateTime<Utc>,
    #[serde(default)]
    pub agent: Option<String>,
    #[serde(default)]
    pub reason: Option<String>,
    pub owner_id: String,
    pub details: Vec<ChangeDetail>,
}

impl RevisionRecord {
    /// Build the detail list from a computed diff. Titles in the diff were
    /// captured pre-mutation, which is exactly what the audit trail wants.
    pub fn details_from_diff(diff: &ItineraryDiff) -> Vec<ChangeDetail> {
        let mut details = Vec::new();
        for item in &diff.added {
            details.push(ChangeDetail {
                op: "insert".to_string(),
                element: element_kind_for(&item.id),
                element_id: item.id.clone(),
                day: Some(item.day),
                old_title: None,
                new_title: Some(item.title.clone()),
                fields: item.fields.clone(),
            });
        }
        for item in &diff.removed {
            details.push(ChangeDetail {
                op: "delete".to_string(),
                element: element_kind_for(&item.id),
                element_id: item.id.clone(),
                day: Some(item.day),
                old_title: Some(item.title.clone()),
                new_title: None,
                fields: item.fields.clone(),
            });
        }
        for item in &diff.updated {
            details.push(ChangeDetail {
                op: "update".to_string(),
                element: element_kind_for(&item.id),
                element_id: item.id.clone(),
                day: Some(item.day),
                old_title: Some(item.title.clone()),
                new_title: None,
                fields: item.fields.clone(),
            });
        }
        details
    }

    /// Element ids this revision touched.
    pub fn touched_ids(&self) -> impl Iterator<Item = &str> {
        self.details.iter().map(|d| d.element_id.as_str())
    }
}

/// `day<N>` is a whole-day entry (reorder, anchorless edge change),
/// `day<N>_...` is a structured edge id, anything else is a node id.
fn element_kind_for(id: &str) -> ElementKind {
    if let Some(rest) = id.strip_prefix("day") {
        if !rest.is_empty() && rest.chars().all(|c| c.is_ascii_digit()) {
            return ElementKind::Day;
        }
        if crate::model::Edge::day_from_id(id).is_some() {
            return ElementKind::Edge;
        }
    }
    ElementKind::Node
}
