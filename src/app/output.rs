//! CLI output formatting and display helpers.
//!
//! Formatting functions return lines so they can be tested; `print_*`
//! wrappers write them to stdout.

use sproket_core::{FacetCounts, RunOutcome, RunSummary};

/// Message when neither config criteria nor stdin ids were provided.
pub const NO_CRITERIA_GUIDANCE: &str =
    "No criteria to search. Add enabled criteria to the config file or pipe ids with --file-ids / --dataset-ids.";

/// Message when the run needs a config file.
pub const NO_CONFIG_GUIDANCE: &str =
    "A config file is required: pass --config <PATH> with at least a search_api entry.";

/// Guidance printed when a run stops at the bulk threshold.
pub fn threshold_guidance(found: usize, threshold: usize) -> String {
    format!(
        "too many files ({found} > {threshold}): confirm download by specifying the -y option or refine search criteria"
    )
}

/// Per-criteria counts followed by the run total.
pub fn count_lines(summary: &RunSummary) -> Vec<String> {
    let mut lines: Vec<String> = summary
        .counts
        .iter()
        .map(|c| format!("{}: {} files", c.query, c.count))
        .collect();
    lines.push(format!("total files: {}", summary.found));
    lines
}

/// Final summary lines.
pub fn summary_lines(summary: &RunSummary) -> Vec<String> {
    let mut lines = vec![format!(
        "found: {}  submitted: {}  preferred: {}",
        summary.found, summary.submitted, summary.preferred
    )];
    if summary.planned > 0 {
        lines.push(format!("dry run: {} files not downloaded", summary.planned));
    }
    lines.push(format!(
        "completed: {}  skipped: {}  verified: {}  failed: {}",
        summary.completed, summary.skipped, summary.verified, summary.failed
    ));
    lines
}

/// Field keys listing for one criteria, hiding `_`-prefixed internal names.
pub fn field_key_lines(query: &str, keys: &[String]) -> Vec<String> {
    let mut lines = vec![format!("criteria: {query}"), "field keys:".to_string()];
    lines.extend(
        keys.iter()
            .filter(|key| !key.starts_with('_'))
            .map(|key| format!("  {key}")),
    );
    lines
}

/// Data node listing for one criteria, sorted by node name.
pub fn data_node_lines(query: &str, nodes: &FacetCounts) -> Vec<String> {
    let mut lines = vec![format!("criteria: {query}"), "data nodes:".to_string()];
    lines.extend(nodes.iter().map(|(node, count)| format!("  {node} {count}")));
    lines
}

/// Prints whatever a finished run should show the user.
pub fn print_run_summary(summary: &RunSummary, threshold: usize) {
    for line in count_lines(summary) {
        println!("{line}");
    }
    match summary.outcome {
        RunOutcome::Counted => {}
        RunOutcome::NothingFound => println!("no files match the search criteria"),
        RunOutcome::ThresholdExceeded => println!("{}", threshold_guidance(summary.found, threshold)),
        RunOutcome::Completed => {
            for line in summary_lines(summary) {
                println!("{line}");
            }
        }
    }
}

/// Prints a block of lines followed by a blank line.
pub fn print_block(lines: &[String]) {
    for line in lines {
        println!("{line}");
    }
    println!();
}
