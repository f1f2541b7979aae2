use std::{
    fs,
    path::{Path, PathBuf},
    sync::{
        atomic::{AtomicU64, AtomicUsize, Ordering},
        Arc,
    },
    time::{SystemTime, UNIX_EPOCH},
};

use async_trait::async_trait;
use kgraph_memory::{
    DuplicateCheckOptions, DuplicatePreset, Entity, FindDuplicatesRequest, GraphError,
    GraphResult, GraphStorage, InMemoryGraphStorage, KnowledgeGraph, KnowledgeGraphManager,
    MatchType, MemoryStoreConfig, ObservationInput, Relation, RelationValidation,
};
use serde_json::Value;

static WORKSPACE_COUNTER: AtomicU64 = AtomicU64::new(1);

struct IsolatedWorkspace {
    root: PathBuf,
}

impl IsolatedWorkspace {
    fn new(label: &str) -> Self {
        let tick = SystemTime::now()
            .duration_since(UNIX_EPOCH)
            .expect("clock should be after unix epoch")
            .as_nanos();
        let count = WORKSPACE_COUNTER.fetch_add(1, Ordering::Relaxed);
        let root = std::env::temp_dir().join(format!(
            "kgraph-{label}-{}-{tick}-{count}",
            std::process::id()
        ));
        fs::create_dir_all(&root).expect("must create isolated workspace root");
        Self { root }
    }

    fn root(&self) -> &Path {
        &self.root
    }

    fn memory_file(&self) -> PathBuf {
        self.root.join("memory.jsonl")
    }
}

impl Drop for IsolatedWorkspace {
    fn drop(&mut self) {
        let _ = fs::remove_dir_all(&self.root);
    }
}

/// Storage whose saves always fail after recording the attempt.
struct RejectingStorage {
    inner: InMemoryGraphStorage,
    attempts: AtomicUsize,
}

#[async_trait]
impl GraphStorage for RejectingStorage {
    async fn load(&self) -> GraphResult<KnowledgeGraph> {
        self.inner.load().await
    }

    async fn save(&self, _graph: &KnowledgeGraph) -> GraphResult<()> {
        self.attempts.fetch_add(1, Ordering::SeqCst);
        Err(GraphError::Background("disk unavailable".to_string()))
    }

    fn describe(&self) -> String {
        "rejecting".to_string()
    }
}

fn file_manager(workspace: &IsolatedWorkspace) -> KnowledgeGraphManager {
    KnowledgeGraphManager::from_config(&MemoryStoreConfig::new(workspace.memory_file()))
}

fn names(graph: &KnowledgeGraph) -> Vec<&str> {
    graph
        .entities
        .iter()
        .map(|entity| entity.name.as_str())
        .collect()
}

async fn seed_people(manager: &KnowledgeGraphManager) {
    manager
        .create_entities(vec![
            Entity::new("Alice", "person", ["likes tea", "lives in Paris"]),
            Entity::new("Bob", "person", ["plays chess"]),
            Entity::new("Carol", "person", Vec::<String>::new()),
        ])
        .await
        .expect("seed entities");
    manager
        .create_relations(vec![
            Relation::new("Alice", "Bob", "knows"),
            Relation::new("Bob", "Carol", "mentors"),
        ])
        .await
        .expect("seed relations");
}

#[tokio::test]
async fn integration_graph_survives_reopen_with_type_tagged_lines() {
    let workspace = IsolatedWorkspace::new("reopen");
    seed_people(&file_manager(&workspace)).await;

    let raw = fs::read_to_string(workspace.memory_file()).expect("memory file");
    let lines: Vec<Value> = raw
        .lines()
        .map(|line| serde_json::from_str(line).expect("json line"))
        .collect();
    assert_eq!(lines.len(), 5);
    assert!(lines[..3].iter().all(|line| line["type"] == "entity"));
    assert!(lines[3..].iter().all(|line| line["type"] == "relation"));
    assert_eq!(lines[3]["relationType"], "knows");

    let reopened = file_manager(&workspace);
    let graph = reopened.read_graph().await.expect("read");
    assert_eq!(names(&graph), vec!["Alice", "Bob", "Carol"]);
    assert_eq!(graph.relations.len(), 2);
    assert_eq!(
        graph.entities[0].observations,
        vec!["likes tea".to_string(), "lives in Paris".to_string()]
    );
}

#[tokio::test]
async fn integration_repeated_creates_are_idempotent() {
    let workspace = IsolatedWorkspace::new("idempotent");
    let manager = file_manager(&workspace);
    seed_people(&manager).await;

    let again = manager
        .create_entities(vec![Entity::new("Alice", "robot", ["ignored"])])
        .await
        .expect("create");
    assert!(again.is_empty());
    let again = manager
        .create_relations(vec![Relation::new("Alice", "Bob", "knows")])
        .await
        .expect("create");
    assert!(again.is_empty());

    let added = manager
        .add_observations(vec![ObservationInput {
            entity_name: "Alice".to_string(),
            contents: vec!["likes tea".to_string(), "owns a cat".to_string()],
        }])
        .await
        .expect("observations");
    assert_eq!(added[0].added_observations, vec!["owns a cat".to_string()]);

    let graph = manager.read_graph().await.expect("read");
    assert_eq!(graph.entities[0].entity_type, "person");
    assert_eq!(graph.entities[0].observations.len(), 3);
    assert_eq!(graph.relations.len(), 2);
}

#[tokio::test]
async fn integration_entity_delete_cascades_to_relations_on_disk() {
    let workspace = IsolatedWorkspace::new("cascade");
    let manager = file_manager(&workspace);
    seed_people(&manager).await;

    manager
        .delete_entities(vec!["Bob".to_string(), "Nobody".to_string()])
        .await
        .expect("delete");

    let reopened = file_manager(&workspace);
    let graph = reopened.read_graph().await.expect("read");
    assert_eq!(names(&graph), vec!["Alice", "Carol"]);
    assert!(graph.relations.is_empty());
}

#[tokio::test]
async fn integration_search_returns_induced_subgraph() {
    let workspace = IsolatedWorkspace::new("search");
    let manager = file_manager(&workspace);
    seed_people(&manager).await;

    let found = manager.search_nodes("PERSON").await.expect("search");
    assert_eq!(names(&found), vec!["Alice", "Bob", "Carol"]);
    assert_eq!(found.relations.len(), 2);

    let found = manager.search_nodes("chess").await.expect("search");
    assert_eq!(names(&found), vec!["Bob"]);
    assert!(found.relations.is_empty());

    let found = manager.search_nodes("lives par").await.expect("search");
    assert_eq!(names(&found), vec!["Alice"]);

    let found = manager.search_nodes("tea chess").await.expect("search");
    assert!(found.is_empty());

    let found = manager.search_nodes("   ").await.expect("search");
    assert!(found.is_empty());

    let opened = manager
        .open_nodes(&["Carol".to_string(), "Bob".to_string(), "Zed".to_string()])
        .await
        .expect("open");
    assert_eq!(names(&opened), vec!["Bob", "Carol"]);
    assert_eq!(opened.relations, vec![Relation::new("Bob", "Carol", "mentors")]);
}

#[tokio::test]
async fn integration_loose_preset_flags_misspelled_entity() {
    let workspace = IsolatedWorkspace::new("duplicates");
    let manager = file_manager(&workspace);
    seed_people(&manager).await;

    let request = FindDuplicatesRequest {
        entities: vec![Entity::new("Alise", "person", Vec::<String>::new())],
        options: DuplicateCheckOptions {
            preset: Some(DuplicatePreset::Loose),
            ..DuplicateCheckOptions::default()
        },
        ..FindDuplicatesRequest::default()
    };
    let report = manager.find_duplicates(&request).await.expect("report");
    assert_eq!(report.entity_duplicates.len(), 1);
    let duplicate = &report.entity_duplicates[0];
    assert_eq!(duplicate.existing.name, "Alice");
    assert_eq!(duplicate.match_type, MatchType::Fuzzy);
    assert!(report.statistics.has_duplicates);

    let strict = FindDuplicatesRequest {
        options: DuplicateCheckOptions {
            preset: Some(DuplicatePreset::Strict),
            ..DuplicateCheckOptions::default()
        },
        ..request
    };
    let report = manager.find_duplicates(&strict).await.expect("report");
    assert!(report.entity_duplicates.is_empty());
    assert!(!report.statistics.has_duplicates);
}

#[tokio::test]
async fn integration_strict_validation_rejects_dangling_relation_without_writing() {
    let workspace = IsolatedWorkspace::new("strict");
    let config = MemoryStoreConfig::new(workspace.memory_file())
        .with_relation_validation(RelationValidation::Strict);
    let manager = KnowledgeGraphManager::from_config(&config);
    seed_people(&manager).await;
    let before = fs::read_to_string(workspace.memory_file()).expect("memory file");

    let error = manager
        .create_relations(vec![Relation::new("Alice", "Ghost", "haunts")])
        .await
        .expect_err("dangling relation");
    assert!(matches!(
        error,
        GraphError::DanglingRelation { ref missing, .. } if missing == "Ghost"
    ));
    let after = fs::read_to_string(workspace.memory_file()).expect("memory file");
    assert_eq!(before, after);
}

#[tokio::test]
async fn integration_missing_entity_observation_fails_whole_call() {
    let workspace = IsolatedWorkspace::new("observations");
    let manager = file_manager(&workspace);
    seed_people(&manager).await;

    let error = manager
        .add_observations(vec![
            ObservationInput {
                entity_name: "Alice".to_string(),
                contents: vec!["speaks French".to_string()],
            },
            ObservationInput {
                entity_name: "Ghost".to_string(),
                contents: vec!["boo".to_string()],
            },
        ])
        .await
        .expect_err("missing entity");
    assert_eq!(error.to_string(), "entity with name 'Ghost' not found");

    let graph = manager.read_graph().await.expect("read");
    assert_eq!(graph.entities[0].observations.len(), 2);
}

#[tokio::test]
async fn integration_saves_leave_no_temporary_files_behind() {
    let workspace = IsolatedWorkspace::new("atomic");
    let manager = file_manager(&workspace);
    seed_people(&manager).await;
    manager
        .delete_relations(vec![Relation::new("Alice", "Bob", "knows")])
        .await
        .expect("delete");

    let entries: Vec<String> = fs::read_dir(workspace.root())
        .expect("read dir")
        .map(|entry| {
            entry
                .expect("entry")
                .file_name()
                .to_string_lossy()
                .into_owned()
        })
        .collect();
    assert_eq!(entries, vec!["memory.jsonl".to_string()]);
}

#[tokio::test]
async fn integration_concurrent_callers_on_one_manager_keep_every_entity() {
    let workspace = IsolatedWorkspace::new("concurrent");
    let manager = Arc::new(file_manager(&workspace));

    let mut handles = Vec::new();
    for worker in 0..8 {
        let manager = Arc::clone(&manager);
        handles.push(tokio::spawn(async move {
            manager
                .create_entities(vec![Entity::new(
                    format!("node-{worker}"),
                    "node",
                    Vec::<String>::new(),
                )])
                .await
        }));
    }
    for handle in handles {
        handle.await.expect("join").expect("create");
    }

    let graph = file_manager(&workspace).read_graph().await.expect("read");
    assert_eq!(graph.entities.len(), 8);
}

#[tokio::test]
async fn integration_failed_save_surfaces_storage_error() {
    let storage = Arc::new(RejectingStorage {
        inner: InMemoryGraphStorage::new(),
        attempts: AtomicUsize::new(0),
    });
    let manager = KnowledgeGraphManager::new(storage.clone());

    let error = manager
        .create_entities(vec![Entity::new("Alice", "person", Vec::<String>::new())])
        .await
        .expect_err("save failure");
    assert!(error.to_string().contains("disk unavailable"));
    assert_eq!(storage.attempts.load(Ordering::SeqCst), 1);
    assert!(manager.read_graph().await.expect("read").is_empty());
}
