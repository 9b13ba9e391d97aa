//! get-papers-list - PubMed industry-affiliation search
//!
//! Searches PubMed and lists the papers that have at least one author
//! affiliated with a pharmaceutical or biotech company.
//!
//! ## Usage
//!
//! ```bash
//! get-papers-list "crispr off-target" -f results.csv
//! get-papers-list "mrna vaccine" --format json -f results.json --debug
//! get-papers-list "mrna vaccine" --format json > results.json
//! ```

use anyhow::{Context, Result};
use clap::{Parser, ValueEnum};
use pubmed_papers::classify::IndustryClassifier;
use pubmed_papers::keymatch::KeywordClassifier;
use pubmed_papers::llm_match::{LlmClassifier, LlmConfig};
use pubmed_papers::models::ClassifiedArticle;
use pubmed_papers::output;
use pubmed_papers::pipeline::PaperPipeline;
use pubmed_papers::pubmed::{self, FetchConfig, PubmedClient};
use std::fs::File;
use std::io::{self, BufWriter, Write};
use std::path::{Path, PathBuf};
use tracing::{debug, Level};
use tracing_subscriber::{fmt, EnvFilter};

// ============================================================================
// CLI Definition
// ============================================================================

/// Fetch PubMed papers with pharmaceutical/biotech-affiliated authors
#[derive(Parser)]
#[command(name = "get-papers-list")]
#[command(version, about, long_about = None)]
struct Cli {
    /// PubMed search query (full PubMed query syntax)
    query: String,

    /// Enable debug logging
    #[arg(short, long)]
    debug: bool,

    /// Save results to this file instead of printing them
    #[arg(short, long)]
    file: Option<PathBuf>,

    /// Output format; CSV for --file when omitted, console listing otherwise
    #[arg(long, value_enum)]
    format: Option<OutputFormat>,

    /// Keyword matching only, skip the LLM layer
    #[arg(long)]
    no_llm: bool,

    /// PMIDs per search page
    #[arg(long, default_value_t = pubmed::DEFAULT_PAGE_SIZE)]
    page_size: usize,

    /// PMIDs per metadata request
    #[arg(long, default_value_t = pubmed::DEFAULT_BATCH_SIZE)]
    batch_size: usize,

    /// LLM model name (overrides LLM_MODEL)
    #[arg(long)]
    llm_model: Option<String>,
}

#[derive(Clone, Copy, Debug, ValueEnum)]
enum OutputFormat {
    Csv,
    Json,
}

// ============================================================================
// Main Entry Point
// ============================================================================

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    // Initialize logging
    let log_level = if cli.debug { Level::DEBUG } else { Level::WARN };
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(log_level.to_string()));

    fmt()
        .with_env_filter(filter)
        .with_target(true)
        .with_writer(std::io::stderr)
        .init();

    debug!(query = %cli.query, file = ?cli.file, "Starting");

    let classifier = build_classifier(&cli)?;

    let fetch_config = FetchConfig {
        page_size: cli.page_size,
        batch_size: cli.batch_size,
        ..FetchConfig::default()
    }
    .with_env_api_key();
    let fetcher = PubmedClient::new(fetch_config).context("Failed to create PubMed client")?;

    let pipeline = PaperPipeline::new(fetcher, classifier);
    let papers = pipeline.run(&cli.query).await;

    match &cli.file {
        Some(path) => {
            save(path, cli.format.unwrap_or(OutputFormat::Csv), &papers)?;
            println!("Saved results to {}", path.display());
        }
        None => print_results(io::stdout().lock(), cli.format, &papers)
            .context("Failed to write results to stdout")?,
    }

    Ok(())
}

/// Stdout rendering: the requested format, or the console listing
fn print_results<W: Write>(
    mut out: W,
    format: Option<OutputFormat>,
    papers: &[ClassifiedArticle],
) -> Result<()> {
    match format {
        Some(OutputFormat::Csv) => output::write_csv(out, papers)?,
        Some(OutputFormat::Json) => output::write_json(out, papers)?,
        None => {
            out.write_all(output::render_console(papers).as_bytes())?;
            out.flush()?;
        }
    }
    Ok(())
}

fn build_classifier(cli: &Cli) -> Result<IndustryClassifier> {
    let keyword = KeywordClassifier::new().context("Failed to build keyword classifier")?;
    if cli.no_llm {
        return Ok(IndustryClassifier::keyword_only(keyword));
    }

    let mut config = LlmConfig::from_env()
        .context("LLM classifier unavailable (set GROQ_API_KEY or pass --no-llm)")?;
    if let Some(model) = &cli.llm_model {
        config.model = model.clone();
    }
    let llm = LlmClassifier::new(config).context("Failed to create LLM classifier")?;

    Ok(IndustryClassifier::new(keyword, Box::new(llm)))
}

fn save(path: &Path, format: OutputFormat, papers: &[ClassifiedArticle]) -> Result<()> {
    let file = File::create(path)
        .with_context(|| format!("Failed to create output file {}", path.display()))?;
    let writer = BufWriter::new(file);

    match format {
        OutputFormat::Csv => output::write_csv(writer, papers),
        OutputFormat::Json => output::write_json(writer, papers),
    }
    .with_context(|| format!("Failed to write {}", path.display()))
}
