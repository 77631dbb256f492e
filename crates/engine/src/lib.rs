//! The change engine: validates changesets against the live document,
//! detects and reconciles concurrent edits, and commits new versions with
//! an audit revision per commit.
//!
//! Write ordering per commit is revision first, document second. A crash
//! between the two leaves a revision whose `to_version` was never
//! reached, which replays harmlessly; the reverse order could lose the
//! undo snapshot for a committed version.

pub mod conflict;
pub mod error;
pub mod graph;
pub mod idempotency;
pub mod locks;
pub mod node_id;
pub mod notify;
mod ops;

use std::sync::Arc;

use chrono::Utc;
use tracing::{debug, info, warn};

use tripweave_core::{
    ChangeSet, Itinerary, ItineraryDiff, ItineraryId, RevisionId, RevisionRecord,
};
use tripweave_store::DocumentStore;

use crate::conflict::{ConflictOutcome, ConflictResolver};
use crate::idempotency::{Claim, IdempotencyManager, StoredResult};
use crate::locks::LockManager;
use crate::notify::{ChangeNotifier, EnrichmentTrigger};

pub use crate::error::EngineError;
pub use crate::node_id::NodeIdGenerator;

/// A dry-run result: what the document would look like if the changeset
/// were applied now. Nothing is persisted.
#[derive(Debug)]
pub struct Proposal {
    pub document: Itinerary,
    pub diff: ItineraryDiff,
    pub preview_version: u64,
}

/// What a committed (or replayed) apply produced.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ApplyOutcome {
    pub version: u64,
    pub diff: ItineraryDiff,
}

pub struct ChangeEngine<S: DocumentStore> {
    store: S,
    locks: LockManager,
    idempotency: IdempotencyManager,
    notifier: Option<Arc<dyn ChangeNotifier>>,
    enricher: Option<Arc<dyn EnrichmentTrigger>>,
}

impl<S: DocumentStore> ChangeEngine<S> {
    pub fn new(store: S) -> Self {
        Self {
            store,
            locks: LockManager::new(),
            idempotency: IdempotencyManager::new(),
            notifier: None,
            enricher: None,
        }
    }

    pub fn with_notifier(mut self, notifier: Arc<dyn ChangeNotifier>) -> Self {
        self.notifier = Some(notifier);
        self
    }

    pub fn with_enricher(mut self, enricher: Arc<dyn EnrichmentTrigger>) -> Self {
        self.enricher = Some(enricher);
        self
    }

    /// System-level locks, orthogonal to the per-node `locked` flag.
    pub fn locks(&self) -> &LockManager {
        &self.locks
    }

    /// Seed or overwrite a document unconditionally.
    pub fn create(&mut self, doc: &Itinerary) -> Result<(), EngineError> {
        self.store.put(doc)?;
        Ok(())
    }

    pub fn get(&self, id: ItineraryId) -> Result<Itinerary, EngineError> {
        self.store
            .get(id)?
            .ok_or(EngineError::ItineraryNotFound(id))
    }

    /// Apply the changeset to a working copy and return the result without
    /// persisting anything. Conflict detection and idempotency are
    /// deliberately skipped; a proposal previews operations, not commits.
    pub fn propose(
        &self,
        id: ItineraryId,
        changeset: &ChangeSet,
    ) -> Result<Proposal, EngineError> {
        let live = self.get(id)?;
        let mut copy = live.clone();
        copy.version = live.version + 1;
        let diff = ops::apply_operations(&mut copy, changeset, &self.locks, Utc::now());
        Ok(Proposal {
            preview_version: copy.version,
            document: copy,
            diff,
        })
    }

    /// Validate, reconcile, and commit a changeset. On success the
    /// document advances exactly one version and a revision record holding
    /// the pre-mutation snapshot is appended. A changeset whose every
    /// operation was rejected or changed nothing commits nothing and
    /// returns the current version.
    pub fn apply(
        &mut self,
        id: ItineraryId,
        changeset: &ChangeSet,
    ) -> Result<ApplyOutcome, EngineError> {
        let key = changeset.idempotency_key.clone();
        if let Some(key) = &key {
            if !IdempotencyManager::is_valid_key(key) {
                return Err(EngineError::InvalidIdempotencyKey(key.clone()));
            }
            match self.idempotency.claim(key) {
                Claim::Replayed(stored) => {
                    debug!(itinerary = %id, key, "replaying stored idempotent result");
                    return Ok(ApplyOutcome {
                        version: stored.version,
                        diff: stored.diff,
                    });
                }
                Claim::InFlight => return Err(EngineError::IdempotencyInFlight(key.clone())),
                Claim::Fresh => {}
            }
        }

        let result = self.apply_inner(id, changeset);
        if let Some(key) = &key {
            match &result {
                Ok(outcome) => self.idempotency.complete(
                    key,
                    StoredResult {
                        version: outcome.version,
                        diff: outcome.diff.clone(),
                    },
                    "apply",
                ),
                Err(_) => self.idempotency.abandon(key),
            }
        }
        result
    }

    fn apply_inner(
        &mut self,
        id: ItineraryId,
        changeset: &ChangeSet,
    ) -> Result<ApplyOutcome, EngineError> {
        let live = self.get(id)?;

        let mut effective = changeset.clone();
        if let Some(base) = changeset.base_version
            && base != live.version
        {
            let unseen = self.store.revisions_since(id, base)?;
            let conflicts = ConflictResolver::detect(changeset, &unseen);
            match ConflictResolver::attempt_auto_resolution(changeset, conflicts, &unseen) {
                ConflictOutcome::Clean => {
                    debug!(itinerary = %id, base, live = live.version, "stale base advanced; no overlap");
                }
                ConflictOutcome::Resolved(operations) => {
                    debug!(itinerary = %id, base, live = live.version, "stale base auto-resolved");
                    effective.operations = operations;
                }
                ConflictOutcome::Unresolved(conflicts) => {
                    warn!(
                        itinerary = %id,
                        base,
                        live = live.version,
                        conflicts = conflicts.len(),
                        "unresolvable version conflict"
                    );
                    return Err(EngineError::VersionConflict {
                        base_version: base,
                        live_version: live.version,
                        conflicts: ConflictResolver::to_diff(&conflicts, &live),
                    });
                }
            }
        }

        let now = Utc::now();
        let mut copy = live.clone();
        let diff = ops::apply_operations(&mut copy, &effective, &self.locks, now);
        if diff.is_empty() {
            debug!(itinerary = %id, version = live.version, "changeset produced no changes; version unchanged");
            return Ok(ApplyOutcome {
                version: live.version,
                diff,
            });
        }

        let record = RevisionRecord {
            id: RevisionId::new(),
            itinerary_id: id,
            from_version: live.version,
            to_version: live.version + 1,
            created_at: now,
            agent: effective.agent.clone(),
            reason: effective.reason.clone(),
            owner_id: live.owner_id.clone(),
            details: RevisionRecord::details_from_diff(&diff),
        };
        self.store.put_revision(&record, &live)?;

        copy.version = live.version + 1;
        copy.updated_at = now;
        self.store.put_if_version(&copy, live.version)?;

        info!(
            itinerary = %id,
            version = copy.version,
            summary = %diff.summary(),
            "changeset applied"
        );
        self.fire_hooks(id, &diff, true);

        Ok(ApplyOutcome {
            version: copy.version,
            diff,
        })
    }

    /// Restore the document content it had at `to_version`. Undo is itself
    /// a versioned change: the live document is snapshotted into a new
    /// revision, so an undo can be undone.
    pub fn undo(&mut self, id: ItineraryId, to_version: u64) -> Result<ApplyOutcome, EngineError> {
        let live = self.get(id)?;
        let (_, snapshot) = self
            .store
            .get_revision(id, to_version)?
            .ok_or(EngineError::RevisionNotFound {
                itinerary: id,
                version: to_version,
            })?;

        let now = Utc::now();
        let diff = ops::diff_documents(&live, &snapshot);
        let record = RevisionRecord {
            id: RevisionId::new(),
            itinerary_id: id,
            from_version: live.version,
            to_version: live.version + 1,
            created_at: now,
            agent: Some("undo".to_string()),
            reason: Some(format!("restore version {to_version}")),
            owner_id: live.owner_id.clone(),
            details: RevisionRecord::details_from_diff(&diff),
        };
        self.store.put_revision(&record, &live)?;

        let mut restored = snapshot;
        restored.version = live.version + 1;
        restored.updated_at = now;
        self.store.put_if_version(&restored, live.version)?;

        info!(
            itinerary = %id,
            version = restored.version,
            restored_from = to_version,
            "itinerary restored"
        );
        self.fire_hooks(id, &diff, true);

        Ok(ApplyOutcome {
            version: restored.version,
            diff,
        })
    }

    /// Full revision history, newest first.
    pub fn history(&self, id: ItineraryId) -> Result<Vec<RevisionRecord>, EngineError> {
        Ok(self.store.list_revisions(id)?)
    }

    fn fire_hooks(&self, id: ItineraryId, diff: &ItineraryDiff, can_undo: bool) {
        if let Some(notifier) = &self.notifier {
            notifier.change_applied(id, diff, &diff.summary(), can_undo);
        }
        if let Some(enricher) = &self.enricher {
            let nodes = diff.enrichable_node_ids();
            if !nodes.is_empty() {
                enricher.nodes_changed(id, &nodes);
            }
        }
    }
}
