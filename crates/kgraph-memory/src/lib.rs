//! Persistent knowledge-graph store with token search and duplicate detection.
//!
//! Entities and relations live in a single newline-delimited JSON file that is
//! fully loaded and rewritten per operation. A token index is rebuilt from each
//! loaded or saved snapshot, and a similarity engine scores candidate records
//! against the stored graph to surface likely duplicates.

pub mod config;
pub mod duplicates;
pub mod error;
pub mod index;
pub mod manager;
pub mod model;
pub mod similarity;
pub mod storage;

pub use config::{
    executable_dir, resolve_memory_file_path, MemoryStoreConfig, RelationValidation,
    DEFAULT_MEMORY_FILE_NAME, MEMORY_FILE_PATH_ENV, RELATION_VALIDATION_ENV,
};
pub use duplicates::{
    find_duplicates, DuplicateCheckOptions, DuplicatePolicy, DuplicatePreset, DuplicateReport,
    DuplicateSource, DuplicateStatistics, DuplicateType, EntityDuplicate, FindDuplicatesRequest,
    MatchType, ObservationDuplicate, RelationDuplicate,
};
pub use error::{GraphError, GraphResult};
pub use index::{ObservationKey, SearchIndex};
pub use manager::KnowledgeGraphManager;
pub use model::{
    BatchCreateRequest, BatchCreateResult, Entity, KnowledgeGraph, ObservationDeletion,
    ObservationInput, ObservationResult, Relation,
};
pub use similarity::{
    edit_similarity, keyword_similarity, levenshtein_distance, semantic_similarity, similarity,
    MatchMode,
};
pub use storage::{
    decode_graph, encode_graph, GraphStorage, InMemoryGraphStorage, JsonlGraphStorage,
    PersistentGraphStore,
};
