//! Public operation surface over the persistent graph store.
//!
//! Every call loads the full graph, applies its query or mutation in memory,
//! and (for mutations) saves the full graph back. A mutex serializes these
//! load-mutate-save cycles so concurrent callers sharing one manager never
//! lose each other's updates.

use std::collections::HashSet;
use std::sync::Arc;

use tokio::sync::Mutex;
use tracing::{info, instrument, warn};

use crate::config::{MemoryStoreConfig, RelationValidation};
use crate::duplicates::{find_duplicates, DuplicateReport, FindDuplicatesRequest};
use crate::error::{GraphError, GraphResult};
use crate::index::SearchIndex;
use crate::model::{
    BatchCreateRequest, BatchCreateResult, Entity, KnowledgeGraph, ObservationDeletion,
    ObservationInput, ObservationResult, Relation,
};
use crate::storage::{GraphStorage, JsonlGraphStorage, PersistentGraphStore};

/// Async entry point for graph mutations and queries.
pub struct KnowledgeGraphManager {
    store: Mutex<PersistentGraphStore>,
    relation_validation: RelationValidation,
}

impl KnowledgeGraphManager {
    pub fn new(storage: Arc<dyn GraphStorage>) -> Self {
        Self {
            store: Mutex::new(PersistentGraphStore::new(storage)),
            relation_validation: RelationValidation::default(),
        }
    }

    /// File-backed manager for a resolved configuration.
    pub fn from_config(config: &MemoryStoreConfig) -> Self {
        Self::new(Arc::new(JsonlGraphStorage::new(
            config.memory_file_path.clone(),
        )))
        .with_relation_validation(config.relation_validation)
    }

    pub fn with_relation_validation(mut self, relation_validation: RelationValidation) -> Self {
        self.relation_validation = relation_validation;
        self
    }

    /// Inserts entities whose names are not yet taken; returns the inserted subset.
    #[instrument(skip(self, entities), fields(requested = entities.len()))]
    pub async fn create_entities(&self, entities: Vec<Entity>) -> GraphResult<Vec<Entity>> {
        let mut store = self.store.lock().await;
        let mut graph = store.load().await?;
        let requested = entities.len();
        let inserted = insert_entities(&mut graph, entities);
        store.save(&graph).await?;
        info!(
            inserted = inserted.len(),
            skipped = requested - inserted.len(),
            "entities created"
        );
        Ok(inserted)
    }

    /// Inserts relations whose triple is not yet stored; returns the inserted subset.
    #[instrument(skip(self, relations), fields(requested = relations.len()))]
    pub async fn create_relations(&self, relations: Vec<Relation>) -> GraphResult<Vec<Relation>> {
        let mut store = self.store.lock().await;
        let mut graph = store.load().await?;
        let requested = relations.len();
        let inserted = insert_relations(&mut graph, relations, self.relation_validation)?;
        store.save(&graph).await?;
        info!(
            inserted = inserted.len(),
            skipped = requested - inserted.len(),
            "relations created"
        );
        Ok(inserted)
    }

    /// Appends new observation values; fails without writing if any entity is missing.
    #[instrument(skip(self, inputs), fields(entities = inputs.len()))]
    pub async fn add_observations(
        &self,
        inputs: Vec<ObservationInput>,
    ) -> GraphResult<Vec<ObservationResult>> {
        let mut store = self.store.lock().await;
        let mut graph = store.load().await?;
        let results = append_observations(&mut graph, &inputs)?;
        store.save(&graph).await?;
        info!(
            added = results
                .iter()
                .map(|result| result.added_observations.len())
                .sum::<usize>(),
            "observations added"
        );
        Ok(results)
    }

    /// Removes entities and every relation touching them.
    #[instrument(skip(self, names), fields(requested = names.len()))]
    pub async fn delete_entities(&self, names: Vec<String>) -> GraphResult<()> {
        let mut store = self.store.lock().await;
        let mut graph = store.load().await?;
        let (removed, cascaded_relations) = remove_entities(&mut graph, &names);
        store.save(&graph).await?;
        info!(removed, cascaded_relations, "entities deleted");
        Ok(())
    }

    /// Removes matching observation values; unknown entities are ignored.
    #[instrument(skip(self, deletions), fields(entities = deletions.len()))]
    pub async fn delete_observations(&self, deletions: Vec<ObservationDeletion>) -> GraphResult<()> {
        let mut store = self.store.lock().await;
        let mut graph = store.load().await?;
        let removed = remove_observations(&mut graph, &deletions);
        store.save(&graph).await?;
        info!(removed, "observations deleted");
        Ok(())
    }

    /// Removes relations by exact triple; unknown relations are ignored.
    #[instrument(skip(self, relations), fields(requested = relations.len()))]
    pub async fn delete_relations(&self, relations: Vec<Relation>) -> GraphResult<()> {
        let mut store = self.store.lock().await;
        let mut graph = store.load().await?;
        let removed = remove_relations(&mut graph, &relations);
        store.save(&graph).await?;
        info!(removed, "relations deleted");
        Ok(())
    }

    pub async fn read_graph(&self) -> GraphResult<KnowledgeGraph> {
        let mut store = self.store.lock().await;
        store.load().await
    }

    /// Token search returning matched entities and the relations between them.
    #[instrument(skip(self))]
    pub async fn search_nodes(&self, query: &str) -> GraphResult<KnowledgeGraph> {
        let mut store = self.store.lock().await;
        let graph = store.load().await?;
        Ok(store.index().search(&graph, query))
    }

    /// Exact-name lookup returning the named entities and the relations between them.
    pub async fn open_nodes(&self, names: &[String]) -> GraphResult<KnowledgeGraph> {
        let mut store = self.store.lock().await;
        let graph = store.load().await?;
        Ok(SearchIndex::open_nodes(&graph, names))
    }

    /// Read-only duplicate analysis of the request against the stored graph.
    #[instrument(skip(self, request), fields(
        entities = request.entities.len(),
        relations = request.relations.len(),
        observations = request.observations.len(),
        check_within_existing = request.check_within_existing
    ))]
    pub async fn find_duplicates(
        &self,
        request: &FindDuplicatesRequest,
    ) -> GraphResult<DuplicateReport> {
        let mut store = self.store.lock().await;
        let graph = store.load().await?;
        find_duplicates(&graph, request)
    }

    /// Entities, then relations, then observations against one loaded graph
    /// with a single save. Nothing is written if any step fails.
    #[instrument(skip(self, request), fields(
        entities = request.entities.len(),
        relations = request.relations.len(),
        observations = request.observations.len()
    ))]
    pub async fn batch_create(&self, request: BatchCreateRequest) -> GraphResult<BatchCreateResult> {
        let mut store = self.store.lock().await;
        let mut graph = store.load().await?;
        let created_entities = insert_entities(&mut graph, request.entities);
        let created_relations =
            insert_relations(&mut graph, request.relations, self.relation_validation)?;
        let added_observations = append_observations(&mut graph, &request.observations)?;
        store.save(&graph).await?;
        info!(
            entities = created_entities.len(),
            relations = created_relations.len(),
            observation_entities = added_observations.len(),
            "batch created"
        );
        Ok(BatchCreateResult {
            created_entities,
            created_relations,
            added_observations,
        })
    }
}

fn insert_entities(graph: &mut KnowledgeGraph, entities: Vec<Entity>) -> Vec<Entity> {
    let mut taken = graph
        .entities
        .iter()
        .map(|entity| entity.name.clone())
        .collect::<HashSet<_>>();
    let inserted = entities
        .into_iter()
        .filter(|entity| taken.insert(entity.name.clone()))
        .collect::<Vec<_>>();
    graph.entities.extend(inserted.iter().cloned());
    inserted
}

fn insert_relations(
    graph: &mut KnowledgeGraph,
    relations: Vec<Relation>,
    validation: RelationValidation,
) -> GraphResult<Vec<Relation>> {
    let mut stored = graph.relations.iter().cloned().collect::<HashSet<_>>();
    let inserted = relations
        .into_iter()
        .filter(|relation| stored.insert(relation.clone()))
        .collect::<Vec<_>>();

    if validation == RelationValidation::Strict {
        let names = graph
            .entities
            .iter()
            .map(|entity| entity.name.as_str())
            .collect::<HashSet<_>>();
        for relation in &inserted {
            let missing = [&relation.from, &relation.to]
                .into_iter()
                .find(|endpoint| !names.contains(endpoint.as_str()));
            if let Some(missing) = missing {
                warn!(
                    from = %relation.from,
                    to = %relation.to,
                    missing = %missing,
                    "rejected dangling relation"
                );
                return Err(GraphError::DanglingRelation {
                    from: relation.from.clone(),
                    to: relation.to.clone(),
                    relation_type: relation.relation_type.clone(),
                    missing: missing.clone(),
                });
            }
        }
    }

    graph.relations.extend(inserted.iter().cloned());
    Ok(inserted)
}

fn append_observations(
    graph: &mut KnowledgeGraph,
    inputs: &[ObservationInput],
) -> GraphResult<Vec<ObservationResult>> {
    if let Some(missing) = inputs
        .iter()
        .find(|input| !graph.contains_entity(&input.entity_name))
    {
        return Err(GraphError::EntityNotFound(missing.entity_name.clone()));
    }

    let mut results = Vec::with_capacity(inputs.len());
    for input in inputs {
        let entity = graph
            .entity_mut(&input.entity_name)
            .ok_or_else(|| GraphError::EntityNotFound(input.entity_name.clone()))?;
        let mut added_observations = Vec::new();
        for content in &input.contents {
            if !entity.observations.contains(content) {
                entity.observations.push(content.clone());
                added_observations.push(content.clone());
            }
        }
        results.push(ObservationResult {
            entity_name: input.entity_name.clone(),
            added_observations,
        });
    }
    Ok(results)
}

fn remove_entities(graph: &mut KnowledgeGraph, names: &[String]) -> (usize, usize) {
    let doomed = names.iter().map(String::as_str).collect::<HashSet<_>>();
    let entities_before = graph.entities.len();
    graph
        .entities
        .retain(|entity| !doomed.contains(entity.name.as_str()));
    let relations_before = graph.relations.len();
    graph.relations.retain(|relation| {
        !doomed.contains(relation.from.as_str()) && !doomed.contains(relation.to.as_str())
    });
    (
        entities_before - graph.entities.len(),
        relations_before - graph.relations.len(),
    )
}

fn remove_observations(graph: &mut KnowledgeGraph, deletions: &[ObservationDeletion]) -> usize {
    let mut removed = 0usize;
    for deletion in deletions {
        let Some(entity) = graph.entity_mut(&deletion.entity_name) else {
            continue;
        };
        let before = entity.observations.len();
        entity
            .observations
            .retain(|observation| !deletion.observations.contains(observation));
        removed += before - entity.observations.len();
    }
    removed
}

fn remove_relations(graph: &mut KnowledgeGraph, relations: &[Relation]) -> usize {
    let doomed = relations.iter().collect::<HashSet<_>>();
    let before = graph.relations.len();
    graph.relations.retain(|relation| !doomed.contains(relation));
    before - graph.relations.len()
}
