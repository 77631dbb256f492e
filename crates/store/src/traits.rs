use tripweave_core::{Itinerary, ItineraryId, RevisionRecord};

use crate::error::StoreError;

/// Keyed document store plus append-only revision log. The engine treats
/// this as the single durable collaborator; no transaction API is assumed
/// beyond the conditional write.
pub trait DocumentStore {
    /// Fetch the current document for an itinerary.
    fn get(&self, id: ItineraryId) -> Result<Option<Itinerary>, StoreError>;

    /// Persist the document unconditionally (create or last-write-wins).
    fn put(&mut self, doc: &Itinerary) -> Result<(), StoreError>;

    /// Persist the document only if the stored version still matches
    /// `expected`. Fails with [`StoreError::VersionMismatch`] when another
    /// writer moved the row underneath the caller.
    fn put_if_version(&mut self, doc: &Itinerary, expected: u64) -> Result<(), StoreError>;

    /// Fetch the revision keyed by the version of the snapshot it carries,
    /// i.e. `get_revision(id, v)` returns the document content as it stood
    /// at version `v`.
    fn get_revision(
        &self,
        id: ItineraryId,
        version: u64,
    ) -> Result<Option<(RevisionRecord, Itinerary)>, StoreError>;

    /// Append one immutable revision record plus its pre-mutation snapshot.
    /// A second write for the same version fails.
    fn put_revision(
        &mut self,
        record: &RevisionRecord,
        snapshot: &Itinerary,
    ) -> Result<(), StoreError>;

    /// Revision records whose snapshot version is >= `base_version`,
    /// oldest first. Feeds conflict detection.
    fn revisions_since(
        &self,
        id: ItineraryId,
        base_version: u64,
    ) -> Result<Vec<RevisionRecord>, StoreError>;

    /// All revision records for an itinerary, newest first.
    fn list_revisions(&self, id: ItineraryId) -> Result<Vec<RevisionRecord>, StoreError>;
}
