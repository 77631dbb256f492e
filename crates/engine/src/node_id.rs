use tripweave_core::{Itinerary, NodeId};

/// Produces stable, collision-free node ids of the form
/// `<kind>_d<day>_<seq>` (e.g. `meal_d2_003`), unique within the document.
pub struct NodeIdGenerator;

impl NodeIdGenerator {
    pub fn generate(kind: &str, day: u32, doc: &Itinerary) -> NodeId {
        let kind = sanitize_kind(kind);
        let mut seq: u32 = 1;
        loop {
            let candidate = NodeId::new(format!("{kind}_d{day}_{seq:03}"));
            if !doc.contains_node(&candidate) {
                return candidate;
            }
            seq += 1;
        }
    }
}

fn sanitize_kind(kind: &str) -> String {
    let cleaned: String = kind
        .trim()
        .chars()
        .map(|c| {
            if c.is_ascii_alphanumeric() {
                c.to_ascii_lowercase()
            } else {
                '_'
            }
        })
        .collect();
    if cleaned.is_empty() {
        "node".to_string()
    } else {
        cleaned
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Utc;
    use tripweave_core::{Day, ItineraryId, Node};

    fn doc_with_nodes(ids: &[&str]) -> Itinerary {
        let mut it = Itinerary::new(ItineraryId::new(), "owner-1", Utc::now());
        let mut day = Day::new(2);
        for id in ids {
            day.nodes.push(Node::new(*id, "meal", "Meal"));
        }
        it.days.push(day);
        it
    }

    #[test]
    fn first_id_for_kind_and_day() {
        let doc = doc_with_nodes(&[]);
        let id = NodeIdGenerator::generate("meal", 2, &doc);
        assert_eq!(id.as_str(), "meal_d2_001");
    }

    #[test]
    fn skips_occupied_sequence_numbers() {
        let doc = doc_with_nodes(&["meal_d2_001", "meal_d2_002"]);
        let id = NodeIdGenerator::generate("meal", 2, &doc);
        assert_eq!(id.as_str(), "meal_d2_003");
    }

    #[test]
    fn sanitizes_freeform_kinds() {
        let doc = doc_with_nodes(&[]);
        let id = NodeIdGenerator::generate("  Boat Tour ", 1, &doc);
        assert_eq!(id.as_str(), "boat_tour_d1_001");

        let id = NodeIdGenerator::generate("", 1, &doc);
        assert_eq!(id.as_str(), "node_d1_001");
    }
}
