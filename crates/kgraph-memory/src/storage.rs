//! Newline-delimited graph persistence and the index-maintaining store wrapper.
//!
//! The backing file holds one JSON record per line, tagged with
//! `"type": "entity"` or `"type": "relation"`. Entities are always written
//! before relations and both keep their in-memory order, so a save followed by
//! a load reproduces the same graph.

use std::io::ErrorKind;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use tokio::sync::RwLock;
use tracing::{debug, instrument};

use crate::error::{GraphError, GraphResult};
use crate::index::SearchIndex;
use crate::model::{Entity, KnowledgeGraph, Relation};

#[derive(Debug, Deserialize)]
#[serde(tag = "type", rename_all = "lowercase")]
enum GraphRecord {
    Entity(Entity),
    Relation(Relation),
}

#[derive(Debug, Serialize)]
#[serde(tag = "type", rename_all = "lowercase")]
enum GraphRecordRef<'a> {
    Entity(&'a Entity),
    Relation(&'a Relation),
}

/// Serializes `graph` as newline-terminated records, entities first.
pub fn encode_graph(graph: &KnowledgeGraph) -> GraphResult<String> {
    let mut encoded = String::new();
    let records = graph
        .entities
        .iter()
        .map(GraphRecordRef::Entity)
        .chain(graph.relations.iter().map(GraphRecordRef::Relation));
    for record in records {
        encoded.push_str(&serde_json::to_string(&record)?);
        encoded.push('\n');
    }
    Ok(encoded)
}

/// Parses file content into a graph, skipping blank lines.
///
/// `source` only labels parse errors; a malformed line aborts the whole decode.
pub fn decode_graph(content: &str, source: &Path) -> GraphResult<KnowledgeGraph> {
    let mut graph = KnowledgeGraph::default();
    for (index, line) in content.lines().enumerate() {
        let trimmed = line.trim();
        if trimmed.is_empty() {
            continue;
        }
        let record =
            serde_json::from_str::<GraphRecord>(trimmed).map_err(|source_error| {
                GraphError::Parse {
                    path: source.to_path_buf(),
                    line: index + 1,
                    source: source_error,
                }
            })?;
        match record {
            GraphRecord::Entity(entity) => graph.entities.push(entity),
            GraphRecord::Relation(relation) => graph.relations.push(relation),
        }
    }
    Ok(graph)
}

/// Whole-graph persistence contract.
#[async_trait]
pub trait GraphStorage: Send + Sync {
    /// Reads the full graph; an absent backing resource yields an empty graph.
    async fn load(&self) -> GraphResult<KnowledgeGraph>;
    /// Replaces the full persisted graph.
    async fn save(&self, graph: &KnowledgeGraph) -> GraphResult<()>;
    /// Human-readable location used in logs.
    fn describe(&self) -> String;
}

/// File-backed storage using the newline-delimited record format.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct JsonlGraphStorage {
    path: PathBuf,
}

impl JsonlGraphStorage {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    pub fn path(&self) -> &Path {
        self.path.as_path()
    }
}

#[async_trait]
impl GraphStorage for JsonlGraphStorage {
    #[instrument(skip(self), fields(path = %self.path.display()))]
    async fn load(&self) -> GraphResult<KnowledgeGraph> {
        let content = match tokio::fs::read_to_string(&self.path).await {
            Ok(content) => content,
            Err(error) if error.kind() == ErrorKind::NotFound => {
                debug!("graph file missing; starting from an empty graph");
                return Ok(KnowledgeGraph::default());
            }
            Err(error) => return Err(GraphError::io(&self.path, error)),
        };
        decode_graph(&content, &self.path)
    }

    #[instrument(skip(self, graph), fields(path = %self.path.display(), entities = graph.entities.len(), relations = graph.relations.len()))]
    async fn save(&self, graph: &KnowledgeGraph) -> GraphResult<()> {
        let encoded = encode_graph(graph)?;
        let path = self.path.clone();
        tokio::task::spawn_blocking(move || kgraph_core::write_text_atomic(&path, &encoded))
            .await
            .map_err(|error| GraphError::Background(error.to_string()))??;
        Ok(())
    }

    fn describe(&self) -> String {
        self.path.display().to_string()
    }
}

/// Volatile storage holding the graph in process memory.
#[derive(Debug, Default)]
pub struct InMemoryGraphStorage {
    graph: RwLock<KnowledgeGraph>,
    saves: AtomicUsize,
}

impl InMemoryGraphStorage {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_graph(graph: KnowledgeGraph) -> Self {
        Self {
            graph: RwLock::new(graph),
            saves: AtomicUsize::new(0),
        }
    }

    /// Number of completed saves.
    pub fn save_count(&self) -> usize {
        self.saves.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl GraphStorage for InMemoryGraphStorage {
    async fn load(&self) -> GraphResult<KnowledgeGraph> {
        Ok(self.graph.read().await.clone())
    }

    async fn save(&self, graph: &KnowledgeGraph) -> GraphResult<()> {
        *self.graph.write().await = graph.clone();
        self.saves.fetch_add(1, Ordering::SeqCst);
        Ok(())
    }

    fn describe(&self) -> String {
        "in-memory".to_string()
    }
}

/// Storage plus the search index derived from the most recent load or save.
pub struct PersistentGraphStore {
    storage: Arc<dyn GraphStorage>,
    index: SearchIndex,
}

impl PersistentGraphStore {
    pub fn new(storage: Arc<dyn GraphStorage>) -> Self {
        Self {
            storage,
            index: SearchIndex::default(),
        }
    }

    /// Index over the graph returned by the latest `load` or passed to the latest `save`.
    pub fn index(&self) -> &SearchIndex {
        &self.index
    }

    pub async fn load(&mut self) -> GraphResult<KnowledgeGraph> {
        let graph = self.storage.load().await?;
        self.index = SearchIndex::build(&graph);
        debug!(
            storage = %self.storage.describe(),
            entities = graph.entities.len(),
            relations = graph.relations.len(),
            "graph loaded"
        );
        Ok(graph)
    }

    pub async fn save(&mut self, graph: &KnowledgeGraph) -> GraphResult<()> {
        self.storage.save(graph).await?;
        self.index = SearchIndex::build(graph);
        debug!(
            storage = %self.storage.describe(),
            entities = graph.entities.len(),
            relations = graph.relations.len(),
            "graph saved"
        );
        Ok(())
    }
}
