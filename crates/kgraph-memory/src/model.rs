//! Entity, relation, and request/response records shared by the store.

use std::collections::{BTreeSet, HashSet};

use serde::{Deserialize, Serialize};

/// Named, typed record holding free-text observations. `name` is the unique key.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Entity {
    pub name: String,
    pub entity_type: String,
    #[serde(default)]
    pub observations: Vec<String>,
}

impl Entity {
    pub fn new(
        name: impl Into<String>,
        entity_type: impl Into<String>,
        observations: impl IntoIterator<Item = impl Into<String>>,
    ) -> Self {
        Self {
            name: name.into(),
            entity_type: entity_type.into(),
            observations: observations.into_iter().map(Into::into).collect(),
        }
    }
}

/// Directed, typed edge between two entity names, identified by the full triple.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Relation {
    pub from: String,
    pub to: String,
    pub relation_type: String,
}

impl Relation {
    pub fn new(
        from: impl Into<String>,
        to: impl Into<String>,
        relation_type: impl Into<String>,
    ) -> Self {
        Self {
            from: from.into(),
            to: to.into(),
            relation_type: relation_type.into(),
        }
    }
}

/// The unit of persistence and mutation.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct KnowledgeGraph {
    pub entities: Vec<Entity>,
    pub relations: Vec<Relation>,
}

impl KnowledgeGraph {
    pub fn is_empty(&self) -> bool {
        self.entities.is_empty() && self.relations.is_empty()
    }

    pub fn entity(&self, name: &str) -> Option<&Entity> {
        self.entities.iter().find(|entity| entity.name == name)
    }

    pub fn entity_mut(&mut self, name: &str) -> Option<&mut Entity> {
        self.entities.iter_mut().find(|entity| entity.name == name)
    }

    pub fn contains_entity(&self, name: &str) -> bool {
        self.entity(name).is_some()
    }

    /// Projects the entities at `positions` (graph order) plus the relations
    /// whose endpoints are both among them.
    pub fn induced_subgraph(&self, positions: &BTreeSet<usize>) -> KnowledgeGraph {
        let entities = positions
            .iter()
            .filter_map(|position| self.entities.get(*position))
            .cloned()
            .collect::<Vec<_>>();
        let names = entities
            .iter()
            .map(|entity| entity.name.as_str())
            .collect::<HashSet<_>>();
        let relations = self
            .relations
            .iter()
            .filter(|relation| {
                names.contains(relation.from.as_str()) && names.contains(relation.to.as_str())
            })
            .cloned()
            .collect();
        KnowledgeGraph {
            entities,
            relations,
        }
    }
}

/// Observations to append to a named entity.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ObservationInput {
    pub entity_name: String,
    pub contents: Vec<String>,
}

/// Observations actually appended to one entity.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ObservationResult {
    pub entity_name: String,
    pub added_observations: Vec<String>,
}

/// Observations to remove from a named entity.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ObservationDeletion {
    pub entity_name: String,
    pub observations: Vec<String>,
}

/// Mixed creation request applied against one loaded graph with a single save.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct BatchCreateRequest {
    pub entities: Vec<Entity>,
    pub relations: Vec<Relation>,
    pub observations: Vec<ObservationInput>,
}

/// Combined outcome of a batch creation.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct BatchCreateResult {
    pub created_entities: Vec<Entity>,
    pub created_relations: Vec<Relation>,
    pub added_observations: Vec<ObservationResult>,
}
