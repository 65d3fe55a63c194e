//! Candidate resolution: maps a pending item to at most one reference row

use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, info, warn};

use super::state::PendingItem;
use crate::error::Result;
use crate::oracle::{Disambiguator, SelectionAnswer, SelectionStatus};
use crate::storage::{Candidate, FoodId, FoodStore};

/// Validated outcome of resolution
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Resolution {
    NoMatch { reason: String },
    /// The only candidate, accepted without consulting the oracle
    SingleMatch(FoodId),
    /// A member of the offered set chosen by the oracle
    Selected { id: FoodId },
}

impl Resolution {
    pub fn no_match(reason: impl Into<String>) -> Self {
        Self::NoMatch {
            reason: reason.into(),
        }
    }

    pub fn food_id(&self) -> Option<FoodId> {
        match self {
            Self::NoMatch { .. } => None,
            Self::SingleMatch(id) | Self::Selected { id } => Some(*id),
        }
    }
}

/// Routing of a raw candidate set
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CandidateRoute {
    NoMatch,
    SingleMatch(FoodId),
    MultiMatch(Vec<Candidate>),
}

pub fn route_candidates(mut candidates: Vec<Candidate>) -> CandidateRoute {
    match candidates.len() {
        0 => CandidateRoute::NoMatch,
        1 => CandidateRoute::SingleMatch(candidates.remove(0).id),
        _ => CandidateRoute::MultiMatch(candidates),
    }
}

/// Check an oracle answer against the set that was actually offered
pub fn validate_selection(answer: &SelectionAnswer, offered: &[Candidate]) -> Resolution {
    match answer.status {
        SelectionStatus::Selected => match answer.food_id {
            Some(id) if offered.iter().any(|c| c.id == id) => Resolution::Selected { id },
            Some(id) => {
                warn!(
                    "Oracle selected id {} which was not among the {} offered candidates",
                    id,
                    offered.len()
                );
                Resolution::no_match(format!("selected id {} was not offered", id))
            }
            None => {
                warn!("Oracle reported SELECTED without an id");
                Resolution::no_match("selection without an id")
            }
        },
        SelectionStatus::NoMatch => Resolution::no_match("no candidate matched"),
        SelectionStatus::Ambiguous => {
            info!("Oracle found the candidates ambiguous; treating as no match");
            Resolution::no_match("ambiguous candidates")
        }
        SelectionStatus::Unknown => {
            info!("Oracle returned an unrecognized status; treating as no match");
            Resolution::no_match("unrecognized selection status")
        }
    }
}

pub struct CandidateResolver {
    store: Arc<dyn FoodStore>,
    disambiguator: Arc<dyn Disambiguator>,
    lookup_limit: usize,
    timeout: Duration,
}

impl CandidateResolver {
    pub fn new(
        store: Arc<dyn FoodStore>,
        disambiguator: Arc<dyn Disambiguator>,
        lookup_limit: usize,
        timeout: Duration,
    ) -> Self {
        Self {
            store,
            disambiguator,
            lookup_limit,
            timeout,
        }
    }

    /// Resolve `item`. Only a store read failure is an error.
    pub async fn resolve(&self, item: &PendingItem) -> Result<Resolution> {
        let candidates = self.store.lookup(&item.name, self.lookup_limit).await?;
        debug!("Lookup for '{}' returned {} candidates", item.name, candidates.len());

        let offered = match route_candidates(candidates) {
            CandidateRoute::NoMatch => return Ok(Resolution::no_match("no database match")),
            CandidateRoute::SingleMatch(id) => return Ok(Resolution::SingleMatch(id)),
            CandidateRoute::MultiMatch(offered) => offered,
        };

        let call = self.disambiguator.disambiguate(item.context(), &offered);
        let resolution = match tokio::time::timeout(self.timeout, call).await {
            Ok(Ok(answer)) => validate_selection(&answer, &offered),
            Ok(Err(e)) => {
                warn!("Disambiguation for '{}' failed: {}", item.name, e);
                Resolution::no_match(format!("disambiguation failed: {}", e))
            }
            Err(_) => {
                warn!(
                    "Disambiguation for '{}' timed out after {:?}",
                    item.name, self.timeout
                );
                Resolution::no_match("disambiguation timed out")
            }
        };
        Ok(resolution)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing::fixtures::seeded_store;
    use crate::testing::mocks::ScriptedDisambiguator;

    fn candidates(ids: &[FoodId]) -> Vec<Candidate> {
        ids.iter()
            .map(|id| Candidate {
                id: *id,
                name: format!("food {}", id),
            })
            .collect()
    }

    #[test]
    fn test_route_candidates() {
        assert_eq!(route_candidates(vec![]), CandidateRoute::NoMatch);
        assert_eq!(
            route_candidates(candidates(&[7])),
            CandidateRoute::SingleMatch(7)
        );
        assert_eq!(
            route_candidates(candidates(&[1, 2])),
            CandidateRoute::MultiMatch(candidates(&[1, 2]))
        );
    }

    #[test]
    fn test_out_of_set_selection_is_no_match() {
        let offered = candidates(&[1, 2, 3]);
        let resolution = validate_selection(&SelectionAnswer::selected(99), &offered);
        assert!(matches!(resolution, Resolution::NoMatch { .. }));
        assert_eq!(
            validate_selection(&SelectionAnswer::selected(2), &offered),
            Resolution::Selected { id: 2 }
        );
    }

    #[test]
    fn test_ambiguous_and_unknown_collapse_to_no_match() {
        let offered = candidates(&[1, 2]);
        for status in [SelectionStatus::Ambiguous, SelectionStatus::Unknown] {
            let answer = SelectionAnswer {
                status,
                food_id: Some(1),
                confidence: None,
            };
            assert_eq!(validate_selection(&answer, &offered).food_id(), None);
        }
    }

    #[tokio::test]
    async fn test_single_match_skips_oracle() {
        let store = seeded_store();
        let oracle = Arc::new(ScriptedDisambiguator::new(vec![]));
        let resolver =
            CandidateResolver::new(store, oracle.clone(), 10, Duration::from_secs(1));

        let resolution = resolver
            .resolve(&PendingItem::new("banana", 120.0))
            .await
            .unwrap();
        assert_eq!(resolution, Resolution::SingleMatch(3));
        assert_eq!(oracle.calls(), 0);
    }

    #[tokio::test]
    async fn test_multi_match_consults_oracle_with_offered_set() {
        let store = seeded_store();
        let oracle = Arc::new(ScriptedDisambiguator::new(vec![Ok(
            SelectionAnswer::selected(2),
        )]));
        let resolver =
            CandidateResolver::new(store, oracle.clone(), 10, Duration::from_secs(1));

        let resolution = resolver
            .resolve(&PendingItem::new("chicken", 200.0).with_raw_text("200g roast chicken"))
            .await
            .unwrap();
        assert_eq!(resolution, Resolution::Selected { id: 2 });
        assert_eq!(oracle.calls(), 1);
        assert_eq!(oracle.last_offered_ids(), vec![1, 2]);
        assert_eq!(oracle.last_context().as_deref(), Some("200g roast chicken"));
    }

    #[tokio::test]
    async fn test_slow_oracle_times_out_to_no_match() {
        let oracle = ScriptedDisambiguator::new(vec![Ok(SelectionAnswer::selected(1))])
            .with_delay(Duration::from_millis(500));
        let resolver = CandidateResolver::new(
            seeded_store(),
            Arc::new(oracle),
            10,
            Duration::from_millis(20),
        );

        let resolution = resolver
            .resolve(&PendingItem::new("chicken", 200.0))
            .await
            .unwrap();
        assert_eq!(resolution, Resolution::no_match("disambiguation timed out"));
    }

    #[tokio::test]
    async fn test_oracle_error_is_no_match() {
        let store = seeded_store();
        let oracle = Arc::new(ScriptedDisambiguator::new(vec![Err(
            crate::oracle::OracleError::transport("connection refused"),
        )]));
        let resolver = CandidateResolver::new(store, oracle, 10, Duration::from_secs(1));

        let resolution = resolver
            .resolve(&PendingItem::new("chicken", 200.0))
            .await
            .unwrap();
        assert!(matches!(resolution, Resolution::NoMatch { .. }));
    }
}
