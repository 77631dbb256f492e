//! Edge repair for the per-day visiting-order graph. Days hold tens of
//! nodes, so these are direct scans over small Vecs rather than a graph
//! library.

use tripweave_core::{Day, Edge, NodeId};

/// Wire a freshly inserted node into the chain after `predecessor`. The
/// predecessor's old outgoing edge (if any) is redirected to the new node,
/// and the new node is wired to the old successor.
pub fn splice_in(day: &mut Day, new_id: &NodeId, predecessor: Option<&NodeId>) {
    let Some(pred) = predecessor else {
        return;
    };
    let day_number = day.number;
    let old_successor = day
        .edges
        .iter()
        .position(|e| &e.from == pred)
        .map(|idx| day.edges.remove(idx).to);
    day.edges.push(Edge::between(day_number, pred, new_id));
    if let Some(successor) = old_successor {
        day.edges.push(Edge::between(day_number, new_id, &successor));
    }
}

/// Remove a node from the chain, stitching its predecessor directly to its
/// successor. Graph repair, not just edge deletion.
pub fn splice_out(day: &mut Day, id: &NodeId) {
    let day_number = day.number;
    let predecessor = day.edges.iter().find(|e| &e.to == id).map(|e| e.from.clone());
    let successor = day.edges.iter().find(|e| &e.from == id).map(|e| e.to.clone());
    day.edges.retain(|e| &e.from != id && &e.to != id);
    if let (Some(pred), Some(succ)) = (predecessor, successor) {
        day.edges.push(Edge::between(day_number, &pred, &succ));
    }
}

/// Point every edge touching `old_id` at `new_id`, regenerating edge ids
/// so they keep encoding their endpoints.
pub fn rewire(day: &mut Day, old_id: &NodeId, new_id: &NodeId) {
    let day_number = day.number;
    for edge in &mut day.edges {
        let mut changed = false;
        if &edge.from == old_id {
            edge.from = new_id.clone();
            changed = true;
        }
        if &edge.to == old_id {
            edge.to = new_id.clone();
            changed = true;
        }
        if changed {
            edge.id = Edge::between(day_number, &edge.from, &edge.to).id;
        }
    }
}
