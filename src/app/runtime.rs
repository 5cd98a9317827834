//! Top-level run flow: config, mode dispatch and the resolve-then-download run.

use anyhow::{Context, Result, bail};
use sproket_core::search::DATA_NODE_FIELD;
use sproket_core::{
    FileIndex, HttpClient, IndexClient, PipelineOptions, ResolveOptions, RetrieveOptions,
    effective_criteria, retrieve,
};
use tracing::{debug, info};

use crate::ProcessExit;
use crate::app::config::{RunConfig, load_config};
use crate::app::{exit_handler, input_processor, output, validation};
use crate::cli::Args;

/// Runs the tool for parsed `args`. Errors are fatal and map to exit code 1.
pub(crate) async fn run(args: Args) -> Result<ProcessExit> {
    let Some(config_path) = args.config.as_deref() else {
        bail!(output::NO_CONFIG_GUIDANCE);
    };
    let config = load_config(config_path)?;
    validation::ensure_output_dir(&args.out_dir)?;
    debug!(
        search_api = %config.search_api,
        criteria = config.criteria.len(),
        enabled = config.enabled_criteria(),
        "config loaded"
    );

    let index = IndexClient::new(&config.search_api).context("failed to create search client")?;

    if args.field_keys {
        list_field_keys(&index, &config).await?;
        return Ok(ProcessExit::Success);
    }

    let criteria = input_processor::collect_criteria(&args, &config)?;
    if args.data_nodes {
        list_data_nodes(&index, &criteria).await?;
        return Ok(ProcessExit::Success);
    }
    if criteria.iter().all(|c| c.disabled) {
        println!("{}", output::NO_CRITERIA_GUIDANCE);
        return Ok(ProcessExit::Success);
    }

    let options = retrieve_options(&args, &config);
    info!(
        criteria = criteria.len(),
        workers = options.pipeline.workers,
        priority = ?options.data_node_priority,
        "sproket starting"
    );

    let client = HttpClient::new().context("failed to create download client")?;
    let summary = retrieve(&index, client, &criteria, &options)
        .await
        .context("search failed")?;

    output::print_run_summary(&summary, options.resolve.bulk_threshold);
    Ok(exit_handler::exit_for_summary(&summary))
}

/// Maps CLI flags and config onto library options. CLI priority wins over config.
pub(crate) fn retrieve_options(args: &Args, config: &RunConfig) -> RetrieveOptions {
    let data_node_priority = if args.data_node_priority.is_empty() {
        config.data_node_priority.clone()
    } else {
        args.data_node_priority.clone()
    };
    RetrieveOptions {
        resolve: ResolveOptions {
            confirm_bulk: args.yes,
            output_dir: args.out_dir.clone(),
            ..ResolveOptions::default()
        },
        pipeline: PipelineOptions {
            workers: usize::from(args.parallel),
            verify: !args.no_verify,
            require_checksum: args.require_checksum,
            dry_run: args.no_download,
        },
        data_node_priority,
        count_only: args.count,
    }
}

async fn list_field_keys(index: &IndexClient, config: &RunConfig) -> Result<()> {
    for criteria in config.criteria.iter().filter(|c| !c.disabled) {
        let keys = index
            .field_keys(criteria)
            .await
            .with_context(|| format!("failed to list field keys for {}", criteria.query()))?;
        output::print_block(&output::field_key_lines(&criteria.query(), &keys));
    }
    Ok(())
}

async fn list_data_nodes(index: &IndexClient, criteria: &[sproket_core::Criteria]) -> Result<()> {
    for c in effective_criteria(criteria, &[]) {
        let canonical = c.canonical();
        let nodes = index
            .facet(&canonical, DATA_NODE_FIELD)
            .await
            .with_context(|| format!("failed to list data nodes for {}", canonical.query()))?;
        output::print_block(&output::data_node_lines(&canonical.query(), &nodes));
    }
    Ok(())
}
