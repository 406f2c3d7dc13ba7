use anyhow::{Context, Result};
use clap::Args;
use graphbin_core::{IngestConfig, PgdfFiles, ingest};
use std::io::Write;
use std::path::PathBuf;

use super::OutputContext;

#[derive(Args, Debug)]
pub struct IngestArgs {
    /// Node file (PGDF)
    pub nodes: PathBuf,

    /// Edge file (PGDF)
    pub edges: PathBuf,

    /// Output directory for the store (created if missing)
    pub out_dir: PathBuf,
}

pub fn execute<W: Write>(
    args: IngestArgs,
    config: &IngestConfig,
    output: &OutputContext,
    out: &mut W,
) -> Result<()> {
    let source =
        PgdfFiles::new(&args.nodes, &args.edges).with_buffer_capacity(config.buffer_capacity);
    let stats = ingest(&source, &args.out_dir, config)
        .with_context(|| format!("ingestion into {} failed", args.out_dir.display()))?;

    if output.json {
        return output.print_json(out, &stats);
    }

    output.print_success(
        out,
        &format!(
            "Ingested {} nodes and {} edges into {} in {} ms",
            stats.nodes_stored,
            stats.edges_stored,
            args.out_dir.display(),
            stats.elapsed_ms
        ),
    )?;
    if output.verbose {
        output.print_info(
            out,
            &format!(
                "dictionaries: {} labels, {} property names, {} property values",
                stats.labels, stats.property_names, stats.property_values
            ),
        )?;
        output.print_info(
            out,
            &format!(
                "skipped nodes: {} malformed, {} duplicate ids",
                stats.node_rows_malformed, stats.duplicate_node_ids
            ),
        )?;
        output.print_info(
            out,
            &format!(
                "skipped edges: {} non-forward, {} missing fields, {} dangling, {} duplicate ids",
                stats.edges_non_forward,
                stats.edges_missing_fields,
                stats.edges_dangling,
                stats.duplicate_edge_ids
            ),
        )?;
    }
    Ok(())
}
