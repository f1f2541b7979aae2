//! Subcommand dispatch onto the graph manager.

use anyhow::{Context, Result};
use kgraph_memory::{
    executable_dir, BatchCreateRequest, Entity, FindDuplicatesRequest, KnowledgeGraphManager,
    MemoryStoreConfig, ObservationDeletion, ObservationInput, Relation,
};
use serde::de::DeserializeOwned;
use serde_json::{json, Value};

use crate::cli_args::{Cli, CliCommand};

pub(crate) fn resolve_config(cli: &Cli) -> Result<MemoryStoreConfig> {
    let base_dir = executable_dir()?;
    let config = MemoryStoreConfig::from_values(
        cli.memory_file.as_deref(),
        cli.relation_validation.as_deref(),
        &base_dir,
    )?;
    Ok(config)
}

pub(crate) async fn run_cli(cli: Cli) -> Result<()> {
    let config = resolve_config(&cli)?;
    tracing::debug!(
        memory_file = %config.memory_file_path.display(),
        relation_validation = %config.relation_validation,
        "resolved store configuration"
    );
    let manager = KnowledgeGraphManager::from_config(&config);
    let output = execute(&manager, cli.command).await?;
    println!(
        "{}",
        serde_json::to_string_pretty(&output).context("failed to render output")?
    );
    Ok(())
}

pub(crate) async fn execute(manager: &KnowledgeGraphManager, command: CliCommand) -> Result<Value> {
    let output = match command {
        CliCommand::CreateEntities { json } => {
            let entities = parse_payload::<Vec<Entity>>("create-entities", &json)?;
            serde_json::to_value(manager.create_entities(entities).await?)?
        }
        CliCommand::CreateRelations { json } => {
            let relations = parse_payload::<Vec<Relation>>("create-relations", &json)?;
            serde_json::to_value(manager.create_relations(relations).await?)?
        }
        CliCommand::AddObservations { json } => {
            let inputs = parse_payload::<Vec<ObservationInput>>("add-observations", &json)?;
            serde_json::to_value(manager.add_observations(inputs).await?)?
        }
        CliCommand::DeleteEntities { names } => {
            manager.delete_entities(names).await?;
            json!({ "status": "entities deleted" })
        }
        CliCommand::DeleteObservations { json } => {
            let deletions = parse_payload::<Vec<ObservationDeletion>>("delete-observations", &json)?;
            manager.delete_observations(deletions).await?;
            json!({ "status": "observations deleted" })
        }
        CliCommand::DeleteRelations { json } => {
            let relations = parse_payload::<Vec<Relation>>("delete-relations", &json)?;
            manager.delete_relations(relations).await?;
            json!({ "status": "relations deleted" })
        }
        CliCommand::ReadGraph => serde_json::to_value(manager.read_graph().await?)?,
        CliCommand::SearchNodes { query } => {
            serde_json::to_value(manager.search_nodes(&query).await?)?
        }
        CliCommand::OpenNodes { names } => serde_json::to_value(manager.open_nodes(&names).await?)?,
        CliCommand::FindDuplicates { json } => {
            let request = parse_payload::<FindDuplicatesRequest>("find-duplicates", &json)?;
            serde_json::to_value(manager.find_duplicates(&request).await?)?
        }
        CliCommand::BatchCreate { json } => {
            let request = parse_payload::<BatchCreateRequest>("batch-create", &json)?;
            serde_json::to_value(manager.batch_create(request).await?)?
        }
    };
    Ok(output)
}

fn parse_payload<T: DeserializeOwned>(command: &str, raw: &str) -> Result<T> {
    serde_json::from_str(raw).with_context(|| format!("invalid --json payload for {command}"))
}
