use std::collections::BTreeMap;

use tracing::debug;

use tripweave_core::{
    ChangeOperation, ChangeSet, Itinerary, ItineraryDiff, RevisionRecord,
    revision::ChangeDetail,
};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConflictKind {
    /// A later revision modified a node this changeset targets.
    NodeModified,
    /// A later revision deleted or replaced a node this changeset targets.
    NodeDeleted,
    /// A later revision restructured a day this changeset restructures.
    DayRestructured,
}

impl ConflictKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::NodeModified => "node_modified",
            Self::NodeDeleted => "node_deleted",
            Self::DayRestructured => "day_restructured",
        }
    }
}

#[derive(Debug, Clone)]
pub struct Conflict {
    pub kind: ConflictKind,
    pub element_id: String,
    pub day: Option<u32>,
}

/// What conflict detection concluded for a stale changeset.
#[derive(Debug)]
pub enum ConflictOutcome {
    /// The concurrent revisions touched nothing this changeset touches;
    /// the caller's base version can be advanced silently.
    Clean,
    /// Every conflict commuted; the merged operation list survives.
    Resolved(Vec<ChangeOperation>),
    /// At least one conflict could not be reconciled.
    Unresolved(Vec<Conflict>),
}

/// Compares a changeset's targets against what later revisions touched.
pub struct ConflictResolver;

impl ConflictResolver {
    /// Detect overlap between the changeset's targets and everything that
    /// changed in revisions the caller has not seen.
    pub fn detect(changeset: &ChangeSet, history: &[RevisionRecord]) -> Vec<Conflict> {
        let mut touched: BTreeMap<&str, Vec<&ChangeDetail>> = BTreeMap::new();
        let mut restructured_days: Vec<u32> = Vec::new();
        for record in history {
            for detail in &record.details {
                touched.entry(detail.element_id.as_str()).or_default().push(detail);
                if matches!(detail.op.as_str(), "insert" | "delete")
                    && let Some(day) = detail.day
                {
                    restructured_days.push(day);
                }
                if detail.fields.iter().any(|f| f == "order")
                    && let Some(day) = detail.day
                {
                    restructured_days.push(day);
                }
            }
        }

        let mut conflicts = Vec::new();
        for op in &changeset.operations {
            if let Some(id) = op.target_node() {
                if let Some(details) = touched.get(id.as_str()) {
                    let destroyed = details.iter().any(|d| d.is_destructive());
                    let day = details.iter().find_map(|d| d.day);
                    conflicts.push(Conflict {
                        kind: if destroyed {
                            ConflictKind::NodeDeleted
                        } else {
                            ConflictKind::NodeModified
                        },
                        element_id: id.to_string(),
                        day,
                    });
                }
            } else if let Some(day) = op.target_day()
                && restructured_days.contains(&day)
            {
                conflicts.push(Conflict {
                    kind: ConflictKind::DayRestructured,
                    element_id: format!("day{day}"),
                    day: Some(day),
                });
            }
        }
        conflicts
    }

    /// Attempt cheap, safe merges. A `move` commutes with purely cosmetic
    /// concurrent edits on the same node; destructive overlap and day
    /// restructuring never resolve automatically.
    pub fn attempt_auto_resolution(
        changeset: &ChangeSet,
        conflicts: Vec<Conflict>,
        history: &[RevisionRecord],
    ) -> ConflictOutcome {
        if conflicts.is_empty() {
            return ConflictOutcome::Clean;
        }

        let mut unresolved = Vec::new();
        for conflict in conflicts {
            match conflict.kind {
                ConflictKind::NodeModified => {
                    let incoming_is_move = changeset.operations.iter().any(|op| {
                        matches!(op, ChangeOperation::Move { id, .. } if id.as_str() == conflict.element_id)
                    });
                    let all_cosmetic = history.iter().flat_map(|r| &r.details).filter(|d| d.element_id == conflict.element_id).all(ChangeDetail::is_cosmetic);
                    if incoming_is_move && all_cosmetic {
                        debug!(
                            element = %conflict.element_id,
                            "conflict auto-resolved: move commutes with cosmetic edit"
                        );
                        continue;
                    }
                    unresolved.push(conflict);
                }
                ConflictKind::NodeDeleted | ConflictKind::DayRestructured => {
                    unresolved.push(conflict);
                }
            }
        }

        if unresolved.is_empty() {
            ConflictOutcome::Resolved(changeset.operations.clone())
        } else {
            ConflictOutcome::Unresolved(unresolved)
        }
    }

    /// Render unresolved conflicts as a diff-shaped payload so callers can
    /// show "what changed under you". Titles come from the live document
    /// where the node still exists.
    pub fn to_diff(conflicts: &[Conflict], live: &Itinerary) -> ItineraryDiff {
        let mut diff = ItineraryDiff::new();
        for conflict in conflicts {
            let (day, title) = live
                .find_node(&conflict.element_id.as_str().into())
                .map(|(day, node)| (day, node.title.clone()))
                .unwrap_or((conflict.day.unwrap_or(0), String::new()));
            match conflict.kind {
                ConflictKind::NodeDeleted => {
                    diff.remove(conflict.element_id.clone(), day, title);
                }
                ConflictKind::NodeModified | ConflictKind::DayRestructured => {
                    diff.update(
                        conflict.element_id.clone(),
                        day,
                        vec![conflict.kind.as_str().to_string()],
                        title,
                    );
                }
            }
        }
        diff
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Utc;
    use tripweave_core::{ElementKind, ItineraryId, NodeId, RevisionId};

    fn record(details: Vec<ChangeDetail>) -> RevisionRecord {
        RevisionRecord {
            id: RevisionId::new(),
            itinerary_id: ItineraryId::new(),
            from_version: 3,
            to_version: 4,
            created_at: Utc::now(),
            agent: Some("other".into()),
            reason: None,
            owner_id: "owner-1".into(),
            details,
        }
    }

    fn detail(op: &str, id: &str, fields: &[&str]) -> ChangeDetail {
        ChangeDetail {
            op: op.into(),
            element: ElementKind::Node,
            element_id: id.into(),
            day: Some(1),
            old_title: None,
            new_title: None,
            fields: fields.iter().map(|f| f.to_string()).collect(),
        }
    }

    fn move_op(id: &str) -> ChangeOperation {
        ChangeOperation::Move {
            id: NodeId::from(id),
            start: Utc::now(),
            end: Utc::now(),
        }
    }

    #[test]
    fn disjoint_targets_are_clean() {
        let cs = ChangeSet::new(vec![move_op("n1")]);
        let history = vec![record(vec![detail("update", "n9", &["title"])])];
        let conflicts = ConflictResolver::detect(&cs, &history);
        assert!(conflicts.is_empty());
        assert!(matches!(
            ConflictResolver::attempt_auto_resolution(&cs, conflicts, &history),
            ConflictOutcome::Clean
        ));
    }

    #[test]
    fn move_commutes_with_cosmetic_edit() {
        let cs = ChangeSet::new(vec![move_op("n1")]);
        let history = vec![record(vec![detail("update", "n1", &["title", "details"])])];
        let conflicts = ConflictResolver::detect(&cs, &history);
        assert_eq!(conflicts.len(), 1);
        assert_eq!(conflicts[0].kind, ConflictKind::NodeModified);

        match ConflictResolver::attempt_auto_resolution(&cs, conflicts, &history) {
            ConflictOutcome::Resolved(ops) => assert_eq!(ops.len(), 1),
            other => panic!("expected resolution, got {other:?}"),
        }
    }

    #[test]
    fn move_does_not_commute_with_timing_edit() {
        let cs = ChangeSet::new(vec![move_op("n1")]);
        let history = vec![record(vec![detail("update", "n1", &["timing"])])];
        let conflicts = ConflictResolver::detect(&cs, &history);
        assert!(matches!(
            ConflictResolver::attempt_auto_resolution(&cs, conflicts, &history),
            ConflictOutcome::Unresolved(_)
        ));
    }

    #[test]
    fn concurrent_delete_never_resolves() {
        let cs = ChangeSet::new(vec![ChangeOperation::Delete { id: "n1".into() }]);
        let history = vec![record(vec![detail("delete", "n1", &[])])];
        let conflicts = ConflictResolver::detect(&cs, &history);
        assert_eq!(conflicts[0].kind, ConflictKind::NodeDeleted);
        match ConflictResolver::attempt_auto_resolution(&cs, conflicts, &history) {
            ConflictOutcome::Unresolved(unresolved) => {
                assert_eq!(unresolved[0].element_id, "n1");
            }
            other => panic!("expected unresolved, got {other:?}"),
        }
    }

    #[test]
    fn reorder_conflicts_with_restructured_day() {
        let cs = ChangeSet::new(vec![ChangeOperation::Reorder {
            day: 1,
            order: vec!["a".into(), "b".into()],
        }]);
        let history = vec![record(vec![detail("insert", "x", &[])])];
        let conflicts = ConflictResolver::detect(&cs, &history);
        assert_eq!(conflicts.len(), 1);
        assert_eq!(conflicts[0].kind, ConflictKind::DayRestructured);
    }
}
