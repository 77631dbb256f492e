//! Post-commit hooks. Both fire after the new version is durable, so a
//! slow or panicking implementation can never corrupt the document.

use tripweave_core::{ItineraryDiff, ItineraryId, NodeId};

/// Receives a human-readable summary of each committed change.
pub trait ChangeNotifier: Send + Sync {
    fn change_applied(
        &self,
        itinerary_id: ItineraryId,
        diff: &ItineraryDiff,
        summary: &str,
        can_undo: bool,
    );
}

/// Receives the ids of nodes that were added or updated, so background
/// enrichment (photos, descriptions, booking links) can refresh them.
pub trait EnrichmentTrigger: Send + Sync {
    fn nodes_changed(&self, itinerary_id: ItineraryId, nodes: &[NodeId]);
}

/// Drops every notification.
#[derive(Debug, Default, Clone, Copy)]
pub struct NullNotifier;

impl ChangeNotifier for NullNotifier {
    fn change_applied(&self, _: ItineraryId, _: &ItineraryDiff, _: &str, _: bool) {}
}

impl EnrichmentTrigger for NullNotifier {
    fn nodes_changed(&self, _: ItineraryId, _: &[NodeId]) {}
}
