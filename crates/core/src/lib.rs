pub mod changeset;
pub mod diff;
pub mod error;
pub mod ids;
pub mod model;
pub mod revision;

pub use changeset::{ChangeOperation, ChangePreferences, ChangeScope, ChangeSet, NodePatch};
pub use diff::{DiffItem, ItineraryDiff};
pub use error::CoreError;
pub use ids::{ItineraryId, NodeId, RevisionId};
pub use model::{Cost, Day, Edge, Itinerary, Location, Node, NodeStatus, TimeWindow};
pub use revision::{ChangeDetail, ElementKind, RevisionRecord};
