//! Store configuration resolved from environment variables.

use std::env;
use std::fmt;
use std::path::{Path, PathBuf};
use std::str::FromStr;

use crate::error::{GraphError, GraphResult};

/// Env var naming the backing graph file.
pub const MEMORY_FILE_PATH_ENV: &str = "MEMORY_FILE_PATH";
/// Env var selecting relation endpoint validation (`permissive` | `strict`).
pub const RELATION_VALIDATION_ENV: &str = "KGRAPH_RELATION_VALIDATION";
/// File name used when no path is configured.
pub const DEFAULT_MEMORY_FILE_NAME: &str = "memory.jsonl";

/// Whether relation endpoints must name existing entities at creation time.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum RelationValidation {
    /// Dangling relations are stored as submitted.
    #[default]
    Permissive,
    /// Relations whose endpoints are missing are rejected.
    Strict,
}

impl RelationValidation {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Permissive => "permissive",
            Self::Strict => "strict",
        }
    }
}

impl fmt::Display for RelationValidation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for RelationValidation {
    type Err = GraphError;

    fn from_str(raw: &str) -> Result<Self, Self::Err> {
        match raw.trim().to_ascii_lowercase().as_str() {
            "permissive" => Ok(Self::Permissive),
            "strict" => Ok(Self::Strict),
            other => Err(GraphError::Config(format!(
                "unsupported relation validation '{other}' (expected permissive|strict)"
            ))),
        }
    }
}

/// Resolved configuration for a file-backed store.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MemoryStoreConfig {
    pub memory_file_path: PathBuf,
    pub relation_validation: RelationValidation,
}

impl MemoryStoreConfig {
    pub fn new(memory_file_path: impl Into<PathBuf>) -> Self {
        Self {
            memory_file_path: memory_file_path.into(),
            relation_validation: RelationValidation::default(),
        }
    }

    pub fn with_relation_validation(mut self, relation_validation: RelationValidation) -> Self {
        self.relation_validation = relation_validation;
        self
    }

    /// Resolves configuration from `MEMORY_FILE_PATH` and
    /// `KGRAPH_RELATION_VALIDATION`, anchoring relative paths at the
    /// directory of the running executable.
    pub fn from_env() -> GraphResult<Self> {
        let base_dir = executable_dir()?;
        Self::from_values(
            env::var(MEMORY_FILE_PATH_ENV).ok().as_deref(),
            env::var(RELATION_VALIDATION_ENV).ok().as_deref(),
            &base_dir,
        )
    }

    /// Resolves configuration from raw values, as `from_env` does.
    pub fn from_values(
        memory_file_path: Option<&str>,
        relation_validation: Option<&str>,
        base_dir: &Path,
    ) -> GraphResult<Self> {
        let memory_file_path = resolve_memory_file_path(memory_file_path, base_dir);
        let relation_validation = match relation_validation
            .map(str::trim)
            .filter(|value| !value.is_empty())
        {
            Some(raw) => raw.parse::<RelationValidation>().map_err(|error| {
                GraphError::Config(format!("{RELATION_VALIDATION_ENV}: {error}"))
            })?,
            None => RelationValidation::default(),
        };
        Ok(Self {
            memory_file_path,
            relation_validation,
        })
    }
}

/// Resolves the backing file path; blank or missing values fall back to the default file name.
pub fn resolve_memory_file_path(raw: Option<&str>, base_dir: &Path) -> PathBuf {
    match raw.map(str::trim).filter(|value| !value.is_empty()) {
        Some(value) => {
            let candidate = PathBuf::from(value);
            if candidate.is_absolute() {
                candidate
            } else {
                base_dir.join(candidate)
            }
        }
        None => base_dir.join(DEFAULT_MEMORY_FILE_NAME),
    }
}

/// Directory holding the running executable; relative paths resolve against it.
pub fn executable_dir() -> GraphResult<PathBuf> {
    let executable = env::current_exe().map_err(|error| {
        GraphError::Config(format!("failed to resolve current executable: {error}"))
    })?;
    Ok(executable
        .parent()
        .map(Path::to_path_buf)
        .unwrap_or_else(|| PathBuf::from(".")))
}
