//! Token index over entity identities and individual observations.
//!
//! The index is a pure function of one graph snapshot: it stores entity
//! positions, never entity data, and is rebuilt wholesale whenever the store
//! loads or saves. Passing a different graph to [`SearchIndex::search`] than
//! the one it was built from yields meaningless positions.

use std::collections::{BTreeMap, BTreeSet, HashSet};
use std::fmt;

use crate::model::KnowledgeGraph;

/// Position of one observation: `(entity index, observation index)`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct ObservationKey {
    pub entity: usize,
    pub observation: usize,
}

impl fmt::Display for ObservationKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}-{}", self.entity, self.observation)
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
struct TokenMap<K: Ord> {
    postings: BTreeMap<String, BTreeSet<K>>,
    documents: BTreeMap<K, String>,
}

impl<K: Ord> Default for TokenMap<K> {
    fn default() -> Self {
        Self {
            postings: BTreeMap::new(),
            documents: BTreeMap::new(),
        }
    }
}

impl<K: Ord + Copy> TokenMap<K> {
    fn insert(&mut self, key: K, text: &str) {
        for token in tokenize(text) {
            self.postings.entry(token).or_default().insert(key);
        }
        self.documents.insert(key, fold_case(text));
    }

    /// Documents where every query token is a substring of some document token.
    fn matching(&self, query_tokens: &[String]) -> BTreeSet<K> {
        let mut matched: Option<BTreeSet<K>> = None;
        for query_token in query_tokens {
            let hits = self
                .postings
                .iter()
                .filter(|(token, _)| token.contains(query_token.as_str()))
                .flat_map(|(_, keys)| keys.iter().copied())
                .collect::<BTreeSet<_>>();
            matched = Some(match matched {
                Some(previous) => previous.intersection(&hits).copied().collect(),
                None => hits,
            });
            if matched.as_ref().is_some_and(BTreeSet::is_empty) {
                break;
            }
        }
        matched.unwrap_or_default()
    }

    fn matching_raw(&self, needle: &str) -> BTreeSet<K> {
        self.documents
            .iter()
            .filter(|(_, text)| text.contains(needle))
            .map(|(key, _)| *key)
            .collect()
    }
}

/// Derived search structure over one graph snapshot.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SearchIndex {
    entity_count: usize,
    identities: TokenMap<usize>,
    observations: TokenMap<ObservationKey>,
}

impl SearchIndex {
    /// Indexes `"<name> <entityType>"` per entity and every observation on its own.
    pub fn build(graph: &KnowledgeGraph) -> Self {
        let mut index = Self {
            entity_count: graph.entities.len(),
            ..Self::default()
        };
        for (entity_position, entity) in graph.entities.iter().enumerate() {
            index.identities.insert(
                entity_position,
                &format!("{} {}", entity.name, entity.entity_type),
            );
            for (observation_position, observation) in entity.observations.iter().enumerate() {
                index.observations.insert(
                    ObservationKey {
                        entity: entity_position,
                        observation: observation_position,
                    },
                    observation,
                );
            }
        }
        index
    }

    pub fn entity_count(&self) -> usize {
        self.entity_count
    }

    pub fn observation_count(&self) -> usize {
        self.observations.documents.len()
    }

    /// Entity positions matched by `query` through either token map.
    pub fn matching_positions(&self, query: &str) -> BTreeSet<usize> {
        let trimmed = query.trim();
        if trimmed.is_empty() {
            return BTreeSet::new();
        }

        let query_tokens = tokenize(trimmed);
        let (identity_hits, observation_hits) = if query_tokens.is_empty() {
            let needle = fold_case(trimmed);
            (
                self.identities.matching_raw(&needle),
                self.observations.matching_raw(&needle),
            )
        } else {
            (
                self.identities.matching(&query_tokens),
                self.observations.matching(&query_tokens),
            )
        };

        identity_hits
            .into_iter()
            .chain(observation_hits.into_iter().map(|key| key.entity))
            .collect()
    }

    /// Matched entities in graph order plus the relations between them.
    /// Blank queries match nothing.
    pub fn search(&self, graph: &KnowledgeGraph, query: &str) -> KnowledgeGraph {
        debug_assert_eq!(self.entity_count, graph.entities.len());
        graph.induced_subgraph(&self.matching_positions(query))
    }

    /// Exact-name lookup with the same induced-subgraph projection.
    pub fn open_nodes(graph: &KnowledgeGraph, names: &[String]) -> KnowledgeGraph {
        let wanted = names.iter().map(String::as_str).collect::<HashSet<_>>();
        let positions = graph
            .entities
            .iter()
            .enumerate()
            .filter(|(_, entity)| wanted.contains(entity.name.as_str()))
            .map(|(position, _)| position)
            .collect::<BTreeSet<_>>();
        graph.induced_subgraph(&positions)
    }
}

/// Lowercased alphanumeric runs.
pub fn tokenize(text: &str) -> Vec<String> {
    text.split(|character: char| !character.is_alphanumeric())
        .filter(|token| !token.is_empty())
        .map(fold_case)
        .collect()
}

/// Per-character lowercasing. Unlike `str::to_lowercase` it ignores word
/// position (final sigma), so a folded substring stays a substring of the
/// folded whole.
fn fold_case(text: &str) -> String {
    text.chars().flat_map(char::to_lowercase).collect()
}
