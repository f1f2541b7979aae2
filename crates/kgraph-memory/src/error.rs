//! Error taxonomy for graph storage and operations.

use std::path::PathBuf;

use thiserror::Error;

/// Result type for knowledge-graph operations.
pub type GraphResult<T> = Result<T, GraphError>;

/// Errors returned by storage, search, duplicate detection, and mutations.
#[derive(Debug, Error)]
pub enum GraphError {
    #[error("entity with name '{0}' not found")]
    EntityNotFound(String),
    #[error("relation '{from}' -[{relation_type}]-> '{to}' references missing entity '{missing}'")]
    DanglingRelation {
        from: String,
        to: String,
        relation_type: String,
        missing: String,
    },
    #[error("invalid {field} threshold {value}: expected a value in 0.0..=1.0")]
    InvalidThreshold { field: &'static str, value: f64 },
    #[error("failed to access graph file {}: {source}", path.display())]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error("failed to parse graph file {} at line {line}: {source}", path.display())]
    Parse {
        path: PathBuf,
        line: usize,
        #[source]
        source: serde_json::Error,
    },
    #[error("failed to encode graph record: {0}")]
    Encode(#[from] serde_json::Error),
    #[error("failed to persist graph: {0:#}")]
    Persist(#[from] anyhow::Error),
    #[error("background graph task failed: {0}")]
    Background(String),
    #[error("invalid configuration: {0}")]
    Config(String),
}

impl GraphError {
    pub(crate) fn io(path: impl Into<PathBuf>, source: std::io::Error) -> Self {
        Self::Io {
            path: path.into(),
            source,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn unit_entity_not_found_names_the_entity() {
        let error = GraphError::EntityNotFound("Alice".to_string());
        assert_eq!(error.to_string(), "entity with name 'Alice' not found");
    }

    #[test]
    fn unit_parse_error_reports_path_and_line() {
        let source = serde_json::from_str::<serde_json::Value>("{").expect_err("invalid json");
        let error = GraphError::Parse {
            path: PathBuf::from("/tmp/memory.jsonl"),
            line: 3,
            source,
        };
        let rendered = error.to_string();
        assert!(rendered.contains("/tmp/memory.jsonl"));
        assert!(rendered.contains("line 3"));
    }

    #[test]
    fn unit_persist_error_wraps_anyhow_chain() {
        let error: GraphError = anyhow::anyhow!("disk full")
            .context("failed to write temporary file")
            .into();
        let rendered = error.to_string();
        assert!(rendered.contains("failed to write temporary file"));
        assert!(rendered.contains("disk full"));
    }
}
