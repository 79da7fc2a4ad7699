//! Resolve a free-form identifier (store id, uuid or display name) to a node.

use crate::error::{Error, Result};
use crate::model::Node;

/// How an identifier matched a candidate. Lower ranks win.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub enum MatchRank {
    StoreId,
    Uuid,
    Name,
}

pub fn rank(identifier: &str, node: &Node) -> Option<MatchRank> {
    if node.id.to_string() == identifier {
        Some(MatchRank::StoreId)
    } else if node.uuid == identifier {
        Some(MatchRank::Uuid)
    } else if !node.name.is_empty() && node.name == identifier {
        Some(MatchRank::Name)
    } else {
        None
    }
}

/// Pick the best-ranked candidate for `identifier`.
///
/// Candidates that do not match at all are ignored. Two candidates tied at
/// the best rank make the identifier ambiguous, which is reported as
/// [`Error::NotFound`]; store ids and uuids are unique so only names can tie.
pub fn pick_match(identifier: &str, candidates: Vec<Node>) -> Result<Node> {
    let mut ranked: Vec<(MatchRank, Node)> = candidates
        .into_iter()
        .filter_map(|node| rank(identifier, &node).map(|r| (r, node)))
        .collect();
    ranked.sort_by_key(|(r, _)| *r);

    let mut iter = ranked.into_iter();
    let Some((best_rank, best)) = iter.next() else {
        return Err(Error::NotFound(format!("no node matches {identifier:?}")));
    };
    if let Some((next_rank, other)) = iter.next() {
        if next_rank == best_rank {
            tracing::debug!(
                "Identifier {:?} matches both {} and {}",
                identifier,
                best.uuid,
                other.uuid
            );
            return Err(Error::NotFound(format!(
                "identifier {identifier:?} is ambiguous"
            )));
        }
    }
    Ok(best)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_utils::named_node;

    #[test]
    fn test_store_id_beats_uuid_and_name() {
        let by_id = named_node(7, "u-1", "Calculus");
        let by_uuid = named_node(8, "7", "Algebra");
        let by_name = named_node(9, "u-3", "7");
        let picked = pick_match("7", vec![by_name, by_uuid, by_id]).unwrap();
        assert_eq!(picked.uuid, "u-1");
    }

    #[test]
    fn test_uuid_beats_name() {
        let by_uuid = named_node(1, "graphs", "Graph Theory");
        let by_name = named_node(2, "u-2", "graphs");
        let picked = pick_match("graphs", vec![by_name, by_uuid]).unwrap();
        assert_eq!(picked.id.0, 1);
    }

    #[test]
    fn test_duplicate_names_are_ambiguous() {
        let a = named_node(1, "u-1", "Intro");
        let b = named_node(2, "u-2", "Intro");
        let err = pick_match("Intro", vec![a, b]).unwrap_err();
        assert!(err.is_not_found());
    }

    #[test]
    fn test_no_candidates_is_not_found() {
        assert!(pick_match("nothing", Vec::new()).unwrap_err().is_not_found());
    }

    #[test]
    fn test_placeholder_without_name_never_matches_empty_identifier() {
        let placeholder = named_node(4, "u-4", "");
        assert!(pick_match("", vec![placeholder]).is_err());
    }
}
