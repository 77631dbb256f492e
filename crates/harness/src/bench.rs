use chrono::{DateTime, TimeZone, Utc};

use tripweave_core::{ChangeSet, Day, Itinerary, ItineraryId, Node};
use tripweave_engine::{ApplyOutcome, ChangeEngine, EngineError, Proposal};
use tripweave_store::SqliteStore;

/// One engine over an in-memory store, plus seeding helpers so tests can
/// build multi-day trips in a line or two.
pub struct TestBench {
    pub engine: ChangeEngine<SqliteStore>,
}

impl TestBench {
    pub fn new() -> Result<Self, Box<dyn std::error::Error>> {
        Ok(Self::with_store(SqliteStore::open_in_memory()?))
    }

    pub fn with_store(store: SqliteStore) -> Self {
        crate::init_tracing();
        Self {
            engine: ChangeEngine::new(store),
        }
    }

    /// Fixed-date timestamp helper so test timings are deterministic.
    pub fn hour(hour: u32) -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2026, 6, 1, hour, 0, 0).unwrap()
    }

    /// Seed a trip. Each outer slice entry is one day; each inner tuple is
    /// `(id, kind, title)`. Nodes are chained in order within each day.
    pub fn seed_trip(
        &mut self,
        days: &[&[(&str, &str, &str)]],
    ) -> Result<ItineraryId, Box<dyn std::error::Error>> {
        let id = ItineraryId::new();
        let mut itinerary = Itinerary::new(id, "owner-1", Self::hour(8));
        for (index, entries) in days.iter().enumerate() {
            let mut day = Day::new(index as u32 + 1);
            for (node_id, kind, title) in entries.iter() {
                day.nodes.push(Node::new(*node_id, *kind, *title));
            }
            day.rebuild_chain_edges();
            itinerary.days.push(day);
        }
        self.engine.create(&itinerary)?;
        Ok(id)
    }

    pub fn apply(
        &mut self,
        id: ItineraryId,
        changeset: &ChangeSet,
    ) -> Result<ApplyOutcome, EngineError> {
        self.engine.apply(id, changeset)
    }

    pub fn propose(
        &self,
        id: ItineraryId,
        changeset: &ChangeSet,
    ) -> Result<Proposal, EngineError> {
        self.engine.propose(id, changeset)
    }

    pub fn document(&self, id: ItineraryId) -> Result<Itinerary, EngineError> {
        self.engine.get(id)
    }

    /// Node ids of a day in chain order.
    pub fn day_order(&self, id: ItineraryId, day: u32) -> Result<Vec<String>, EngineError> {
        let doc = self.engine.get(id)?;
        Ok(doc
            .day(day)
            .map(|d| d.nodes.iter().map(|n| n.id.to_string()).collect())
            .unwrap_or_default())
    }
}
