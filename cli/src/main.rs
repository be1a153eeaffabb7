//! golr-loader: build search-index documents from a graph snapshot
//!
//! Subcommands:
//! - `load`: run query files, write one JSON file per query, optionally
//!   upload them to Solr
//! - `entities`: write one document per clique leader
//! - `check`: execute every query file and report the ones that fail

use anyhow::{bail, Context, Result};
use clap::{Args, Parser, Subcommand};
use comfy_table::{ContentArrangement, Table};
use golr_loader::check::{CheckReport, QueryCheck};
use golr_loader::entity::{read_equivalent_prefixes, EntityLoader, EquivalentPrefixes};
use golr_loader::index::{BatchWriter, SolrClient};
use golr_loader::pipeline::{load_queries, Pipeline, PipelineOptions, PipelineReport, DEFAULT_RUN_TIMEOUT};
use golr_loader::{LoaderConfig, RunContext};
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tracing::info;
use tracing_subscriber::{fmt, EnvFilter};

#[derive(Parser)]
#[command(name = "golr-loader", version, about = "Build search-index documents from an ontology graph")]
struct Cli {
    /// Log filter, e.g. `info` or `golr_loader=debug`
    #[arg(long, default_value = "info", global = true, env = "GOLR_LOG")]
    log: String,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Args)]
struct GraphArgs {
    /// Loader configuration (YAML)
    #[arg(short, long)]
    config: Option<PathBuf>,

    /// Graph snapshot directory; overrides `location` in the configuration
    #[arg(short, long)]
    graph: Option<PathBuf>,
}

impl GraphArgs {
    fn load_config(&self) -> Result<LoaderConfig> {
        let mut config = match &self.config {
            Some(path) => LoaderConfig::from_file(path)
                .with_context(|| format!("reading configuration {}", path.display()))?,
            None => LoaderConfig::default(),
        };
        if let Some(graph) = &self.graph {
            config.location = Some(graph.clone());
        }
        Ok(config)
    }
}

#[derive(Args)]
struct LoadArgs {
    #[command(flatten)]
    graph: GraphArgs,

    /// Directory of query files (*.yaml)
    #[arg(short, long, required_unless_present = "only_upload")]
    queries: Option<PathBuf>,

    /// Solr core URL, e.g. http://localhost:8983/solr/golr
    #[arg(short, long)]
    solr_server: Option<String>,

    /// Directory for generated JSON files; a temporary one when unset
    #[arg(short, long)]
    output: Option<PathBuf>,

    /// Upload the files already in the output directory, run no queries
    #[arg(long, requires_all = ["solr_server", "output"])]
    only_upload: bool,

    /// Remove generated files once uploaded
    #[arg(long)]
    delete_json: bool,

    /// Concurrent queries; overrides the configuration
    #[arg(short, long)]
    workers: Option<usize>,
}

#[derive(Subcommand)]
enum Commands {
    /// Run query files and write (and optionally upload) their documents
    Load(LoadArgs),
    /// Write one document per clique leader
    Entities {
        #[command(flatten)]
        graph: GraphArgs,

        /// Output file; standard output when unset
        #[arg(short, long)]
        output: Option<PathBuf>,

        /// Equivalent-prefix map (YAML: prefix -> [prefix, ...])
        #[arg(short = 'm', long)]
        eq_map: Option<PathBuf>,
    },
    /// Execute every query file and report failures
    Check {
        #[command(flatten)]
        graph: GraphArgs,

        /// Directory of query files (*.yaml)
        #[arg(short, long)]
        queries: PathBuf,
    },
}

#[tokio::main]
async fn main() {
    let cli = Cli::parse();

    let filter = EnvFilter::try_new(&cli.log).unwrap_or_else(|_| EnvFilter::new("info"));
    fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .with_target(false)
        .compact()
        .init();

    let result = match cli.command {
        Commands::Load(args) => run_load(args).await,
        Commands::Entities { graph, output, eq_map } => run_entities(&graph, output.as_deref(), eq_map.as_deref()),
        Commands::Check { graph, queries } => run_check(&graph, &queries),
    };

    if let Err(e) = result {
        eprintln!("Error: {:#}", e);
        std::process::exit(1);
    }
}

async fn run_load(args: LoadArgs) -> Result<()> {
    let mut config = args.graph.load_config()?;
    if let Some(workers) = args.workers {
        config.workers = workers;
    }

    let writer = match &args.solr_server {
        Some(url) => {
            let client = SolrClient::new(url, &config.index).context("building Solr client")?;
            Some(Arc::new(BatchWriter::new(Arc::new(client), config.batch_size)))
        }
        None => None,
    };
    let options = PipelineOptions {
        output_dir: args.output.clone(),
        workers: config.effective_workers(),
        delete_json: args.delete_json,
        timeout: DEFAULT_RUN_TIMEOUT,
    };
    let pipeline = Pipeline::new(options, writer);

    let report = if args.only_upload {
        pipeline.upload_only().await?
    } else {
        let Some(dir) = &args.queries else {
            bail!("--queries is required");
        };
        let queries = load_queries(dir)?;
        let ctx = open_context(config).await?;
        pipeline.run(Arc::new(ctx), queries).await?
    };

    print_load_report(&report);
    if !report.is_success() {
        bail!("failed queries: {}", report.failed().join(", "));
    }
    Ok(())
}

/// Load the snapshot off the async workers
async fn open_context(config: LoaderConfig) -> Result<RunContext> {
    let location = config.graph_location()?.to_path_buf();
    info!("Loading graph from {}", location.display());
    let ctx = tokio::task::spawn_blocking(move || RunContext::open(&config, &location))
        .await
        .context("graph loading task failed")??;
    Ok(ctx)
}

fn open_context_blocking(graph: &GraphArgs) -> Result<RunContext> {
    let config = graph.load_config()?;
    let location = config.graph_location()?;
    info!("Loading graph from {}", location.display());
    RunContext::open(&config, location).with_context(|| format!("opening graph {}", location.display()))
}

fn run_entities(graph: &GraphArgs, output: Option<&Path>, eq_map: Option<&Path>) -> Result<()> {
    let equivalent_prefixes = match eq_map {
        Some(path) => read_equivalent_prefixes(path)
            .with_context(|| format!("reading equivalent-prefix map {}", path.display()))?,
        None => EquivalentPrefixes::new(),
    };
    let ctx = open_context_blocking(graph)?;
    let loader = EntityLoader::new(&ctx, &equivalent_prefixes);
    let count = match output {
        Some(path) => loader.load_to_file(path)?,
        None => loader.load(std::io::stdout().lock())?,
    };
    info!("{} entity documents", count);
    Ok(())
}

fn run_check(graph: &GraphArgs, queries: &Path) -> Result<()> {
    let queries = load_queries(queries)?;
    let ctx = open_context_blocking(graph)?;
    let report = QueryCheck::new(ctx.graph.as_ref()).run(&queries);
    print_check_report(&report);
    if !report.is_success() {
        bail!("failed queries: {}", report.failed().join(", "));
    }
    Ok(())
}

fn print_load_report(report: &PipelineReport) {
    let mut table = Table::new();
    table.set_content_arrangement(ContentArrangement::Dynamic);
    table.set_header(vec!["Query", "Documents", "Status"]);
    for outcome in &report.outcomes {
        let status = outcome.error.as_deref().unwrap_or("ok");
        table.add_row(vec![outcome.name.clone(), outcome.documents.to_string(), status.to_string()]);
    }
    println!("{}", table);
    println!("{} document(s)", report.total_documents());
}

fn print_check_report(report: &CheckReport) {
    let mut table = Table::new();
    table.set_content_arrangement(ContentArrangement::Dynamic);
    table.set_header(vec!["Query", "Rows", "Status"]);
    for outcome in &report.outcomes {
        let (rows, status) = match &outcome.result {
            Ok(rows) => (rows.to_string(), "ok".to_string()),
            Err(e) => ("-".to_string(), e.clone()),
        };
        table.add_row(vec![outcome.name.clone(), rows, status]);
    }
    println!("{}", table);
}
