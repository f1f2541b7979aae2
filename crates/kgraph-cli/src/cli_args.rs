use clap::{Parser, Subcommand};
use kgraph_memory::{MEMORY_FILE_PATH_ENV, RELATION_VALIDATION_ENV};

#[derive(Debug, Parser)]
#[command(
    name = "kgraph",
    about = "Persistent knowledge-graph store with search and duplicate detection",
    version
)]
pub struct Cli {
    #[arg(
        long = "memory-file",
        env = MEMORY_FILE_PATH_ENV,
        global = true,
        help = "Backing graph file; relative paths resolve beside the executable"
    )]
    pub memory_file: Option<String>,

    #[arg(
        long = "relation-validation",
        env = RELATION_VALIDATION_ENV,
        global = true,
        help = "Relation endpoint validation: permissive (default) or strict"
    )]
    pub relation_validation: Option<String>,

    #[command(subcommand)]
    pub command: CliCommand,
}

#[derive(Debug, Subcommand)]
pub enum CliCommand {
    /// Insert entities from a JSON array of `{name, entityType, observations}`.
    CreateEntities {
        #[arg(long)]
        json: String,
    },
    /// Insert relations from a JSON array of `{from, to, relationType}`.
    CreateRelations {
        #[arg(long)]
        json: String,
    },
    /// Append observations from a JSON array of `{entityName, contents}`.
    AddObservations {
        #[arg(long)]
        json: String,
    },
    /// Delete entities by name, cascading to their relations.
    DeleteEntities {
        #[arg(required = true)]
        names: Vec<String>,
    },
    /// Delete observations from a JSON array of `{entityName, observations}`.
    DeleteObservations {
        #[arg(long)]
        json: String,
    },
    /// Delete relations from a JSON array of `{from, to, relationType}`.
    DeleteRelations {
        #[arg(long)]
        json: String,
    },
    /// Print the full graph.
    ReadGraph,
    /// Token search over names, types, and observations.
    SearchNodes { query: String },
    /// Exact-name lookup.
    OpenNodes {
        #[arg(required = true)]
        names: Vec<String>,
    },
    /// Duplicate analysis from a JSON `{entities, relations, observations, checkWithinExisting, options}` object.
    FindDuplicates {
        #[arg(long)]
        json: String,
    },
    /// Mixed creation from a JSON `{entities, relations, observations}` object.
    BatchCreate {
        #[arg(long)]
        json: String,
    },
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn unit_cli_parses_global_flags_after_subcommand() {
        let cli = Cli::try_parse_from([
            "kgraph",
            "search-nodes",
            "tea",
            "--memory-file",
            "/tmp/graph.jsonl",
            "--relation-validation",
            "strict",
        ])
        .expect("parse");
        assert_eq!(cli.memory_file.as_deref(), Some("/tmp/graph.jsonl"));
        assert_eq!(cli.relation_validation.as_deref(), Some("strict"));
        assert!(matches!(cli.command, CliCommand::SearchNodes { query } if query == "tea"));
    }

    #[test]
    fn regression_delete_entities_requires_at_least_one_name() {
        assert!(Cli::try_parse_from(["kgraph", "delete-entities"]).is_err());
    }

    #[test]
    fn unit_cli_definition_is_consistent() {
        use clap::CommandFactory;
        Cli::command().debug_assert();
    }
}
