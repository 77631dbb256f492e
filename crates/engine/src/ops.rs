//! Applies change operations to a working copy of the document, producing
//! a diff. Rejections (locked target, missing node, invalid reorder,
//! invalid status transition) make the operation a no-op for diff
//! purposes; they never fail the surrounding call.

use std::fmt;

use chrono::{DateTime, Utc};
use tracing::debug;

use tripweave_core::{
    ChangeOperation, ChangeSet, Day, Edge, Itinerary, ItineraryDiff, Node, NodeId, NodePatch,
    NodeStatus, TimeWindow,
};

use crate::graph;
use crate::locks::LockManager;
use crate::node_id::NodeIdGenerator;

#[derive(Debug)]
pub(crate) enum Rejection {
    NodeLocked(NodeId),
    SystemLocked(NodeId),
    MissingNode(NodeId),
    MissingDay(u32),
    MissingEdge(String),
    DuplicateId(NodeId),
    InvalidReorder(String),
    InvalidTransition(NodeStatus, NodeStatus),
    EmptyReplacement(NodeId),
}

impl fmt::Display for Rejection {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::NodeLocked(id) => write!(f, "node {id} is locked"),
            Self::SystemLocked(id) => write!(f, "node {id} is locked by the system"),
            Self::MissingNode(id) => write!(f, "node {id} not found"),
            Self::MissingDay(day) => write!(f, "day {day} not found"),
            Self::MissingEdge(id) => write!(f, "edge {id} not found"),
            Self::DuplicateId(id) => write!(f, "node id {id} already in use"),
            Self::InvalidReorder(msg) => write!(f, "invalid reorder: {msg}"),
            Self::InvalidTransition(from, to) => {
                write!(f, "invalid status transition {} -> {}", from.as_str(), to.as_str())
            }
            Self::EmptyReplacement(id) => write!(f, "no replacement node supplied for {id}"),
        }
    }
}

/// Apply every operation of the changeset against the working copy.
/// Rejected operations are logged and skipped; the returned diff covers
/// only operations that actually changed the document.
pub(crate) fn apply_operations(
    doc: &mut Itinerary,
    changeset: &ChangeSet,
    locks: &LockManager,
    now: DateTime<Utc>,
) -> ItineraryDiff {
    let mut diff = ItineraryDiff::new();
    let agent = changeset.agent.as_deref();
    for op in &changeset.operations {
        if let Err(rejection) = apply_one(doc, op, changeset, locks, agent, now, &mut diff) {
            debug!(op = op.op_name(), %rejection, "operation rejected");
        }
    }
    diff
}

fn apply_one(
    doc: &mut Itinerary,
    op: &ChangeOperation,
    changeset: &ChangeSet,
    locks: &LockManager,
    agent: Option<&str>,
    now: DateTime<Utc>,
    diff: &mut ItineraryDiff,
) -> Result<(), Rejection> {
    match op {
        ChangeOperation::Move { id, start, end } => {
            check_locks(doc, id, changeset, locks)?;
            let (day, node) = doc
                .find_node_mut(id)
                .ok_or_else(|| Rejection::MissingNode(id.clone()))?;
            let title = node.title.clone();
            node.timing = Some(TimeWindow {
                start: *start,
                end: *end,
            });
            node.touch(agent, now);
            diff.update(id.to_string(), day, vec!["timing".to_string()], title);
            Ok(())
        }

        ChangeOperation::Insert { day, node, after } => {
            let day_number = *day;
            let mut node = node.clone();
            if node.id.is_empty() {
                node.id = NodeIdGenerator::generate(&node.kind, day_number, doc);
            } else if doc.contains_node(&node.id) {
                return Err(Rejection::DuplicateId(node.id.clone()));
            }
            let day = doc
                .day_mut(day_number)
                .ok_or(Rejection::MissingDay(day_number))?;

            // Anchor placement: after the named node when present, at the
            // end of the day otherwise.
            let anchor_index = after.as_ref().and_then(|a| day.node_index(a));
            let position = anchor_index.map(|i| i + 1).unwrap_or(day.nodes.len());
            let predecessor = position
                .checked_sub(1)
                .map(|i| day.nodes[i].id.clone());

            node.touch(agent, now);
            let new_id = node.id.clone();
            let title = node.title.clone();
            day.nodes.insert(position, node);
            graph::splice_in(day, &new_id, predecessor.as_ref());
            diff.add(new_id.to_string(), day_number, Vec::new(), title);
            Ok(())
        }

        ChangeOperation::Delete { id } => {
            check_locks(doc, id, changeset, locks)?;
            let (day_number, node) = doc
                .find_node(id)
                .ok_or_else(|| Rejection::MissingNode(id.clone()))?;
            let title = node.title.clone();
            if let Some(day) = doc.day_mut(day_number) {
                day.nodes.retain(|n| &n.id != id);
                graph::splice_out(day, id);
            }
            diff.remove(id.to_string(), day_number, title);
            Ok(())
        }

        ChangeOperation::Replace { id, node } => {
            check_locks(doc, id, changeset, locks)?;
            // Exact-id lookup only. A missing target is a hard per-op
            // failure; guessing another node in the day is how edits end
            // up on the wrong element.
            let (day_number, old) = doc
                .find_node(id)
                .ok_or_else(|| Rejection::MissingNode(id.clone()))?;
            let old_title = old.title.clone();

            let Some(replacement) = node else {
                return Err(Rejection::EmptyReplacement(id.clone()));
            };
            let mut replacement = replacement.clone();
            if replacement.id.is_empty() {
                replacement.id = NodeIdGenerator::generate(&replacement.kind, day_number, doc);
            } else if replacement.id != *id && doc.contains_node(&replacement.id) {
                return Err(Rejection::DuplicateId(replacement.id.clone()));
            }
            replacement.touch(agent, now);
            let new_id = replacement.id.clone();
            let new_title = replacement.title.clone();

            if let Some(day) = doc.day_mut(day_number)
                && let Some(index) = day.node_index(id)
            {
                day.nodes[index] = replacement;
                if new_id != *id {
                    graph::rewire(day, id, &new_id);
                }
            }
            diff.remove(id.to_string(), day_number, old_title);
            diff.add(new_id.to_string(), day_number, Vec::new(), new_title);
            Ok(())
        }

        ChangeOperation::Update { id, patch } => {
            check_locks(doc, id, changeset, locks)?;
            let (day, node) = doc
                .find_node_mut(id)
                .ok_or_else(|| Rejection::MissingNode(id.clone()))?;
            if let Some(next) = patch.status
                && !node.status.can_transition_to(next)
            {
                return Err(Rejection::InvalidTransition(node.status, next));
            }
            let title = node.title.clone();
            let fields = patch.field_names();
            merge_patch(node, patch);
            node.touch(agent, now);
            diff.update(id.to_string(), day, fields, title);
            Ok(())
        }

        ChangeOperation::UpdateEdge { edge_id, day } => {
            // Day may be supplied explicitly or derived from a structured
            // edge id of the form `day<N>_...`.
            let day_number = day
                .or_else(|| edge_id.as_deref().and_then(Edge::day_from_id))
                .or(changeset.day)
                .ok_or(Rejection::MissingDay(0))?;
            let day = doc
                .day(day_number)
                .ok_or(Rejection::MissingDay(day_number))?;
            if let Some(edge_id) = edge_id
                && !day.edges.iter().any(|e| &e.id == edge_id)
            {
                return Err(Rejection::MissingEdge(edge_id.clone()));
            }
            // Edges are coarse-grained; acknowledge the change in the diff
            // without attribute storage.
            let element = edge_id
                .clone()
                .unwrap_or_else(|| format!("day{day_number}"));
            diff.update(element, day_number, vec!["edge".to_string()], String::new());
            Ok(())
        }

        ChangeOperation::Reorder { day, order } => {
            let day_number = *day;
            let day = doc
                .day_mut(day_number)
                .ok_or(Rejection::MissingDay(day_number))?;
            validate_permutation(day.node_ids(), order)?;

            let mut reordered = Vec::with_capacity(day.nodes.len());
            for id in order {
                if let Some(index) = day.node_index(id) {
                    reordered.push(day.nodes.remove(index));
                }
            }
            day.nodes = reordered;
            day.rebuild_chain_edges();
            diff.update(
                format!("day{day_number}"),
                day_number,
                vec!["order".to_string()],
                format!("day {day_number}"),
            );
            Ok(())
        }
    }
}

fn check_locks(
    doc: &Itinerary,
    id: &NodeId,
    changeset: &ChangeSet,
    locks: &LockManager,
) -> Result<(), Rejection> {
    if changeset.preferences.respect_locks
        && let Some((_, node)) = doc.find_node(id)
        && node.locked
    {
        return Err(Rejection::NodeLocked(id.clone()));
    }
    if locks.is_locked(id) {
        return Err(Rejection::SystemLocked(id.clone()));
    }
    Ok(())
}

/// Merge a partial patch into a node. Scalar fields overwrite; map fields
/// merge key-by-key so a partial AI-generated patch never wipes fields it
/// did not mention.
fn merge_patch(node: &mut Node, patch: &NodePatch) {
    if let Some(title) = &patch.title {
        node.title = title.clone();
    }
    if let Some(status) = patch.status {
        node.status = status;
    }
    if let Some(timing) = patch.timing {
        node.timing = Some(timing);
    }
    if let Some(location) = &patch.location {
        node.location = Some(location.clone());
    }
    if let Some(cost) = &patch.cost {
        node.cost = Some(cost.clone());
    }
    if let Some(locked) = patch.locked {
        node.locked = locked;
    }
    for (key, value) in &patch.details {
        node.details.insert(key.clone(), value.clone());
    }
    for (key, value) in &patch.agent_data {
        node.agent_data.insert(key.clone(), value.clone());
    }
}

/// A reorder list must be an exact permutation of the day's current node
/// ids. Partial reorders could silently drop nodes, so the whole
/// operation is rejected instead.
fn validate_permutation(current: Vec<NodeId>, order: &[NodeId]) -> Result<(), Rejection> {
    if order.len() != current.len() {
        return Err(Rejection::InvalidReorder(format!(
            "expected {} ids, got {}",
            current.len(),
            order.len()
        )));
    }
    let mut seen = std::collections::HashSet::new();
    for id in order {
        if !seen.insert(id) {
            return Err(Rejection::InvalidReorder(format!("duplicate id {id}")));
        }
        if !current.contains(id) {
            return Err(Rejection::InvalidReorder(format!("unknown id {id}")));
        }
    }
    Ok(())
}

/// Structural diff between two documents, used by undo to describe the
/// restore. Titles come from `before` for removed/updated entries.
pub(crate) fn diff_documents(before: &Itinerary, after: &Itinerary) -> ItineraryDiff {
    let mut diff = ItineraryDiff::new();

    for day in &after.days {
        for node in &day.nodes {
            match before.find_node(&node.id) {
                None => diff.add(node.id.to_string(), day.number, Vec::new(), node.title.clone()),
                Some((_, old)) => {
                    let fields = changed_fields(old, node);
                    if !fields.is_empty() {
                        diff.update(node.id.to_string(), day.number, fields, old.title.clone());
                    }
                }
            }
        }
    }
    for day in &before.days {
        for node in &day.nodes {
            if !after.contains_node(&node.id) {
                diff.remove(node.id.to_string(), day.number, node.title.clone());
            }
        }
    }
    // Order-only changes leave every node equal to itself; compare the
    // relative order of surviving nodes per day.
    for day in &after.days {
        if let Some(prior) = before.day(day.number)
            && order_changed(prior, day)
        {
            diff.update(
                format!("day{}", day.number),
                day.number,
                vec!["order".to_string()],
                format!("day {}", day.number),
            );
        }
    }
    diff
}

fn order_changed(before: &Day, after: &Day) -> bool {
    let shared_before: Vec<&NodeId> = before
        .nodes
        .iter()
        .map(|n| &n.id)
        .filter(|id| after.node(id).is_some())
        .collect();
    let shared_after: Vec<&NodeId> = after
        .nodes
        .iter()
        .map(|n| &n.id)
        .filter(|id| before.node(id).is_some())
        .collect();
    shared_before != shared_after
}

fn changed_fields(old: &Node, new: &Node) -> Vec<String> {
    let mut fields = Vec::new();
    if old.title != new.title {
        fields.push("title".to_string());
    }
    if old.status != new.status {
        fields.push("status".to_string());
    }
    if old.timing != new.timing {
        fields.push("timing".to_string());
    }
    if old.location != new.location {
        fields.push("location".to_string());
    }
    if old.cost != new.cost {
        fields.push("cost".to_string());
    }
    if old.locked != new.locked {
        fields.push("locked".to_string());
    }
    if old.details != new.details {
        fields.push("details".to_string());
    }
    if old.agent_data != new.agent_data {
        fields.push("agent_data".to_string());
    }
    fields
}
