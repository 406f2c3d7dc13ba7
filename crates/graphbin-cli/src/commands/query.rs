use anyhow::{Context, Result};
use clap::{Args, Subcommand};
use graphbin_core::{GraphReader, PostingCursor};
use serde::Serialize;
use std::io::Write;
use std::path::{Path, PathBuf};
use std::time::Instant;

use super::OutputContext;

#[derive(Args, Debug)]
pub struct NodeArgs {
    /// Store directory written by `ingest`
    pub out_dir: PathBuf,

    /// External node id
    pub node_id: String,
}

#[derive(Args, Debug)]
pub struct EdgeArgs {
    /// Store directory written by `ingest`
    pub out_dir: PathBuf,

    /// External edge id (explicit or derived)
    pub edge_id: String,
}

#[derive(Args, Debug)]
pub struct LabelArgs {
    /// Store directory written by `ingest`
    pub out_dir: PathBuf,

    /// Edge label
    pub label: String,

    /// Maximum number of ids to print
    #[arg(long)]
    pub limit: Option<usize>,
}

#[derive(Args, Debug)]
pub struct PropertyArgs {
    /// Store directory written by `ingest`
    pub out_dir: PathBuf,

    /// Property name
    pub name: String,

    /// Property value (case-folded before lookup)
    pub value: String,

    /// Maximum number of ids to print
    #[arg(long)]
    pub limit: Option<usize>,
}

/// Which label posting list a listing reads
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LabelListing {
    Edges,
    Sources,
    Destinations,
}

#[derive(Subcommand, Debug)]
pub enum QueryCommands {
    /// Print a node's label and properties
    QNode(NodeArgs),
    /// Print an edge's label and endpoints
    QEdge(EdgeArgs),
    /// List ids of edges carrying a label
    QEdgesByLabel(LabelArgs),
    /// List ids of nodes that are the source of an edge carrying a label
    QSrcByLabel(LabelArgs),
    /// List ids of nodes that are the destination of an edge carrying a label
    QDstByLabel(LabelArgs),
    /// List ids of nodes whose property equals a value
    QNodesByProp(PropertyArgs),
}

pub fn execute<W: Write>(command: QueryCommands, output: &OutputContext, out: &mut W) -> Result<()> {
    match command {
        QueryCommands::QNode(args) => node(args, output, out),
        QueryCommands::QEdge(args) => edge(args, output, out),
        QueryCommands::QEdgesByLabel(args) => by_label(args, LabelListing::Edges, output, out),
        QueryCommands::QSrcByLabel(args) => by_label(args, LabelListing::Sources, output, out),
        QueryCommands::QDstByLabel(args) => {
            by_label(args, LabelListing::Destinations, output, out)
        }
        QueryCommands::QNodesByProp(args) => by_property(args, output, out),
    }
}

fn open(dir: &Path) -> Result<GraphReader> {
    GraphReader::open(dir).with_context(|| format!("cannot open store {}", dir.display()))
}

fn node<W: Write>(args: NodeArgs, output: &OutputContext, out: &mut W) -> Result<()> {
    let started = Instant::now();
    let graph = open(&args.out_dir)?;
    let node = graph.node_by_id(&args.node_id)?;
    output.print_elapsed("Query", started.elapsed())?;

    if output.json {
        return output.print_json(out, &node);
    }

    match node {
        Some(node) => {
            let props = node
                .properties
                .iter()
                .map(|(name, value)| format!("{}={}", name, value))
                .collect::<Vec<_>>()
                .join(", ");
            writeln!(out, "label={}", node.label)?;
            writeln!(out, "props={{{}}}", props)?;
            if output.verbose {
                output.print_info(out, &format!("ordinal {}", node.ordinal))?;
            }
        }
        None => writeln!(out, "Node not found")?,
    }
    Ok(())
}

fn edge<W: Write>(args: EdgeArgs, output: &OutputContext, out: &mut W) -> Result<()> {
    let started = Instant::now();
    let graph = open(&args.out_dir)?;
    let edge = graph.edge_by_id(&args.edge_id)?;
    output.print_elapsed("Query", started.elapsed())?;

    if output.json {
        return output.print_json(out, &edge);
    }

    match edge {
        Some(edge) => {
            writeln!(out, "id={}", edge.id)?;
            writeln!(out, "label={}", edge.label)?;
            writeln!(out, "source={}", edge.source)?;
            writeln!(out, "target={}", edge.target)?;
            if output.verbose {
                output.print_info(out, &format!("ordinal {}", edge.ordinal))?;
            }
        }
        None => writeln!(out, "Edge not found")?,
    }
    Ok(())
}

fn by_label<W: Write>(
    args: LabelArgs,
    listing: LabelListing,
    output: &OutputContext,
    out: &mut W,
) -> Result<()> {
    let started = Instant::now();
    let graph = open(&args.out_dir)?;
    let ids = match listing {
        LabelListing::Edges => {
            let cursor = graph.edges_by_label(&args.label)?;
            collect_ids(cursor, args.limit, |ordinal| graph.edge_id(ordinal))?
        }
        LabelListing::Sources => {
            let cursor = graph.sources_by_label(&args.label)?;
            collect_ids(cursor, args.limit, |ordinal| graph.node_id(ordinal))?
        }
        LabelListing::Destinations => {
            let cursor = graph.destinations_by_label(&args.label)?;
            collect_ids(cursor, args.limit, |ordinal| graph.node_id(ordinal))?
        }
    };
    output.print_elapsed("Query", started.elapsed())?;
    print_ids(&ids, output, out)
}

fn by_property<W: Write>(args: PropertyArgs, output: &OutputContext, out: &mut W) -> Result<()> {
    let started = Instant::now();
    let graph = open(&args.out_dir)?;
    let cursor = graph.nodes_by_property(&args.name, &args.value)?;
    let ids = collect_ids(cursor, args.limit, |ordinal| graph.node_id(ordinal))?;
    output.print_elapsed("Query", started.elapsed())?;
    print_ids(&ids, output, out)
}

fn collect_ids<'g, F>(
    cursor: PostingCursor<'_>,
    limit: Option<usize>,
    resolve: F,
) -> Result<Vec<String>>
where
    F: Fn(u32) -> graphbin_core::Result<&'g str>,
{
    let mut ids = Vec::new();
    for ordinal in cursor.take(limit.unwrap_or(usize::MAX)) {
        ids.push(resolve(ordinal?)?.to_string());
    }
    Ok(ids)
}

#[derive(Serialize)]
struct IdListing<'a> {
    count: usize,
    ids: &'a [String],
}

fn print_ids<W: Write>(ids: &[String], output: &OutputContext, out: &mut W) -> Result<()> {
    if output.json {
        return output.print_json(out, &IdListing { count: ids.len(), ids });
    }
    for id in ids {
        writeln!(out, "{}", id)?;
    }
    if output.verbose {
        output.print_info(out, &format!("{} ids", ids.len()))?;
    }
    Ok(())
}
