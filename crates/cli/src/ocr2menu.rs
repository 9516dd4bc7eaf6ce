//! ocr2menu - Group OCR'd menu lines into dish descriptions
//!
//! Reads OCR line JSON (a bare array of `{content, polygon}` or a layout
//! analysis document), runs a grouping flow and writes the grouping result
//! as JSON. Optionally washes the result and fuses paragraphs and prices
//! into a list of dish records.

use std::fs::File;
use std::io::{self, BufWriter, Write};
use std::path::{Path, PathBuf};
use std::process;
use std::sync::Arc;

use anyhow::{Context, Result, bail};
use clap::{ArgAction, Parser};
use menulayout_core::flow::FlowRegistry;
use menulayout_core::openai::{DEFAULT_BASE_URL, DEFAULT_MODEL, OpenAiClient, OpenAiSettings};
use menulayout_core::wash::WashItem;
use menulayout_core::{
    DishRecord, EngineConfig, FusionReport, GroupingOutput, SemanticGrouper, WashOutcome,
    canvas_scale, default_registry, fuse_context, ingest_lines, parse_ocr_json, wash_lines,
};
use serde::Serialize;
use tracing::{debug, info};
use tracing_subscriber::EnvFilter;

/// Group OCR'd restaurant menu lines into dish descriptions.
#[derive(Parser, Debug)]
#[command(name = "ocr2menu")]
#[command(author, version, about, long_about = None)]
struct Args {
    /// One or more OCR line JSON files
    #[arg(required_unless_present = "list_flows")]
    files: Vec<PathBuf>,

    /// Use debug logging level
    #[arg(short = 'd', long, action = ArgAction::SetTrue)]
    debug: bool,

    /// Path to file where output is written, or "-" for stdout
    #[arg(short = 'o', long, default_value = "-")]
    outfile: String,

    /// Write compact JSON instead of pretty-printed
    #[arg(short = 'c', long, action = ArgAction::SetTrue)]
    compact: bool,

    /// JSON engine config; missing fields keep their defaults
    #[arg(long)]
    config: Option<PathBuf>,

    /// Grouping flow id or alias (default: the configured default flow)
    #[arg(short = 'f', long)]
    flow: Option<String>,

    /// List the available flows and exit
    #[arg(long = "list-flows", action = ArgAction::SetTrue)]
    list_flows: bool,

    // === Semantic options ===
    /// Semantic round-trip timeout in seconds
    #[arg(long)]
    timeout: Option<f64>,

    /// Only pages with more lines than this escalate to semantic grouping
    #[arg(long = "line-threshold")]
    line_threshold: Option<usize>,

    /// Do not cluster segments geometrically when semantic grouping is empty
    #[arg(long = "no-cluster-fallback", action = ArgAction::SetTrue)]
    no_cluster_fallback: bool,

    /// Disable the semantic provider even if an API key is available
    #[arg(long = "no-semantic", action = ArgAction::SetTrue)]
    no_semantic: bool,

    /// API key of the OpenAI-compatible provider
    #[arg(long = "api-key", env = "OPENAI_API_KEY", hide_env_values = true)]
    api_key: Option<String>,

    /// Base URL of the OpenAI-compatible provider
    #[arg(long = "base-url", env = "OPENAI_BASE_URL", default_value = DEFAULT_BASE_URL)]
    base_url: String,

    /// Model used for grouping and washing
    #[arg(long, env = "OPENAI_MODEL", default_value = DEFAULT_MODEL)]
    model: String,

    // === Post-processing options ===
    /// Label grouped output with the semantic provider and report the buckets
    #[arg(short = 'w', long, action = ArgAction::SetTrue)]
    wash: bool,

    /// JSON array of dish records to fuse paragraphs and prices into
    #[arg(long)]
    dishes: Option<PathBuf>,
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct FileReport<'a> {
    file: &'a Path,
    flow_id: &'a str,
    line_count: usize,
    grouping: GroupingOutput,
    #[serde(skip_serializing_if = "Option::is_none")]
    wash: Option<WashOutcome>,
    #[serde(skip_serializing_if = "Option::is_none")]
    fusion: Option<FusedDishes>,
}

#[derive(Serialize)]
struct FusedDishes {
    dishes: Vec<DishRecord>,
    report: FusionReport,
}

fn init_tracing(debug: bool) {
    let filter = if debug {
        EnvFilter::new("debug")
    } else {
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("warn"))
    };
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(io::stderr)
        .init();
}

/// Loads the config file (if any) and applies command line overrides.
fn build_config(args: &Args) -> Result<EngineConfig> {
    let mut config = match &args.config {
        Some(path) => EngineConfig::from_json_file(path)
            .with_context(|| format!("failed to load config {}", path.display()))?,
        None => EngineConfig::default(),
    };
    if let Some(timeout) = args.timeout {
        config.semantic.timeout_secs = timeout;
    }
    if let Some(threshold) = args.line_threshold {
        config.semantic.line_threshold = threshold;
    }
    if args.no_cluster_fallback {
        config.semantic.enable_cluster_fallback = false;
    }
    config.validate()?;
    Ok(config)
}

fn build_client(args: &Args) -> Option<OpenAiClient> {
    if args.no_semantic {
        return None;
    }
    let api_key = args.api_key.as_deref().filter(|key| !key.trim().is_empty())?;
    Some(OpenAiClient::new(OpenAiSettings {
        api_key: api_key.to_string(),
        base_url: args.base_url.clone(),
        model: args.model.clone(),
    }))
}

fn write_json<T: Serialize>(output: &mut dyn Write, value: &T, compact: bool) -> Result<()> {
    if compact {
        serde_json::to_writer(&mut *output, value)?;
    } else {
        serde_json::to_writer_pretty(&mut *output, value)?;
    }
    writeln!(output)?;
    Ok(())
}

fn list_flows(registry: &FlowRegistry, output: &mut dyn Write) -> Result<()> {
    for descriptor in registry.descriptors() {
        let marker = if descriptor.id == registry.default_flow_id() {
            " (default)"
        } else {
            ""
        };
        writeln!(output, "{}{marker}", descriptor.id)?;
        writeln!(output, "    {}: {}", descriptor.label, descriptor.description)?;
    }
    Ok(())
}

async fn process_file(
    path: &Path,
    args: &Args,
    config: &EngineConfig,
    registry: &FlowRegistry,
    client: Option<&OpenAiClient>,
    dishes: Option<&[DishRecord]>,
    output: &mut dyn Write,
) -> Result<()> {
    let json = std::fs::read_to_string(path)?;
    let lines = ingest_lines(parse_ocr_json(&json)?)?;
    let flow = registry.resolve(args.flow.as_deref())?;
    debug!(file = %path.display(), flow = flow.id(), lines = lines.len(), "processing");

    let grouping = flow.run(&lines).await;

    let wash = match (args.wash, client) {
        (true, Some(client)) => Some(
            wash_lines(
                client,
                WashItem::from_output(&grouping),
                config.semantic.timeout(),
            )
            .await,
        ),
        _ => None,
    };

    let fusion = dishes.map(|dishes| {
        let mut dishes = dishes.to_vec();
        let fragments = grouping.context_fragments(&canvas_scale(&lines));
        let report = fuse_context(&mut dishes, &fragments, &config.fusion);
        FusedDishes { dishes, report }
    });

    let report = FileReport {
        file: path,
        flow_id: flow.id(),
        line_count: lines.len(),
        grouping,
        wash,
        fusion,
    };
    write_json(output, &report, args.compact)
}

fn run(args: &Args) -> Result<()> {
    let config = build_config(args)?;
    let client = build_client(args);
    if args.wash && client.is_none() {
        bail!("--wash needs an API key (--api-key or OPENAI_API_KEY)");
    }
    let grouper = client
        .clone()
        .map(|client| Arc::new(client) as Arc<dyn SemanticGrouper>);
    let registry = default_registry(&config, grouper)?;

    let mut output: Box<dyn Write> = if args.outfile == "-" {
        Box::new(BufWriter::new(io::stdout()))
    } else {
        let file = File::create(&args.outfile)
            .with_context(|| format!("failed to create output file {}", args.outfile))?;
        Box::new(BufWriter::new(file))
    };

    if args.list_flows {
        list_flows(&registry, output.as_mut())?;
        output.flush()?;
        return Ok(());
    }

    let dishes: Option<Vec<DishRecord>> = match &args.dishes {
        Some(path) => {
            let text = std::fs::read_to_string(path)
                .with_context(|| format!("failed to read dishes {}", path.display()))?;
            Some(serde_json::from_str(&text).context("dishes must be a JSON array of dish records")?)
        }
        None => None,
    };

    let runtime = tokio::runtime::Builder::new_multi_thread()
        .enable_all()
        .build()?;

    for path in &args.files {
        if !path.exists() {
            bail!("file not found: {}", path.display());
        }
        runtime
            .block_on(process_file(
                path,
                args,
                &config,
                &registry,
                client.as_ref(),
                dishes.as_deref(),
                output.as_mut(),
            ))
            .with_context(|| format!("failed to process {}", path.display()))?;
    }
    output.flush()?;
    info!(files = args.files.len(), "done");
    Ok(())
}

fn main() {
    let args = Args::parse();
    init_tracing(args.debug);

    if let Err(e) = run(&args) {
        eprintln!("Error: {e:#}");
        process::exit(1);
    }
}
