use tripweave_core::{CoreError, ItineraryDiff, ItineraryId};
use tripweave_store::StoreError;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum EngineError {
    #[error("store error: {0}")]
    Store(#[from] StoreError),

    #[error("core error: {0}")]
    Core(#[from] CoreError),

    #[error("itinerary not found: {0}")]
    ItineraryNotFound(ItineraryId),

    #[error("revision not found: itinerary {itinerary} version {version}")]
    RevisionNotFound {
        itinerary: ItineraryId,
        version: u64,
    },

    /// The caller's view is stale and the concurrent edits could not be
    /// reconciled. `conflicts` describes what changed under the caller so
    /// UIs can re-render before a retry.
    #[error("version conflict: base {base_version} behind live {live_version}")]
    VersionConflict {
        base_version: u64,
        live_version: u64,
        conflicts: ItineraryDiff,
    },

    #[error("invalid idempotency key: {0}")]
    InvalidIdempotencyKey(String),

    #[error("idempotency key already in flight: {0}")]
    IdempotencyInFlight(String),
}
