use std::sync::Arc;
use std::time::Duration;

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use floorchat::config::{self, Config};
use floorchat::embedding::{OpenAiEmbeddingClient, RetryingEmbeddingClient};
use floorchat::indexer::{
    IndexReport, Indexer, IndexerOptions, ReaderClient, collect_documents, load_catalog,
};
use floorchat::knowledge::QdrantKnowledgeStore;
use floorchat::locale::Locale;
use floorchat::logging;
use floorchat::qdrant::QdrantService;
use floorchat::retry::BackoffPolicy;

#[derive(Parser)]
#[command(
    name = "floorchat-indexer",
    about = "Embed products, marketing pages and documents into the chat knowledge base"
)]
struct Cli {
    /// Embed everything but write nothing.
    #[arg(long, global = true)]
    dry_run: bool,
    /// Leave units that already have chunks untouched.
    #[arg(long, global = true)]
    skip_existing: bool,
    /// Pause between units, in milliseconds.
    #[arg(long, global = true, value_name = "MS", default_value_t = 0)]
    delay: u64,
    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Index the product catalog.
    Products {
        /// Only index products of this collection.
        #[arg(long)]
        collection: Option<String>,
    },
    /// Index the marketing pages in every locale.
    Pages,
    /// Index local documents under the documents directory.
    Documents {
        /// Glob relative to the documents directory, e.g. `guides/**/*.md`.
        #[arg(long)]
        file: String,
        /// Locale the documents are written in.
        #[arg(long)]
        locale: Locale,
    },
    /// Index products and pages.
    All,
}

impl Command {
    fn label(&self) -> &'static str {
        match self {
            Self::Products { .. } => "products",
            Self::Pages => "pages",
            Self::Documents { .. } => "documents",
            Self::All => "all",
        }
    }
}

#[tokio::main]
async fn main() {
    if let Err(err) = run().await {
        eprintln!("error: {err:#}");
        std::process::exit(1);
    }
}

async fn run() -> Result<()> {
    let cli = Cli::parse();
    let config = config::init_config().context("Failed to load configuration")?;
    logging::init_tracing();

    let embedding = OpenAiEmbeddingClient::from_config(config)
        .context("Failed to build embedding client")?;
    let store = QdrantKnowledgeStore::new(
        QdrantService::from_config(config).context("Failed to build Qdrant client")?,
        config.knowledge_collection.clone(),
        config.embedding_dimension,
    );
    if !cli.dry_run {
        store
            .ensure_collection()
            .await
            .with_context(|| format!("Failed to prepare collection {}", config.knowledge_collection))?;
    }

    let indexer = Indexer::new(
        Arc::new(RetryingEmbeddingClient::new(embedding, BackoffPolicy::EMBEDDING)),
        Arc::new(store),
        IndexerOptions {
            dry_run: cli.dry_run,
            skip_existing: cli.skip_existing,
            delay: Duration::from_millis(cli.delay),
        },
    );

    let label = cli.command.label();
    let mut report = IndexReport::default();
    match cli.command {
        Command::Products { collection } => {
            report.merge(index_products(&indexer, config, collection.as_deref()).await?);
        }
        Command::Pages => report.merge(index_pages(&indexer, config).await?),
        Command::Documents { file, locale } => {
            let documents = collect_documents(&config.documents_dir, &file)
                .context("Failed to collect documents")?;
            report.merge(indexer.index_documents(&documents, locale).await);
        }
        Command::All => {
            report.merge(index_products(&indexer, config, None).await?);
            report.merge(index_pages(&indexer, config).await?);
        }
    }

    report.log(label);
    Ok(())
}

async fn index_products(
    indexer: &Indexer,
    config: &Config,
    collection: Option<&str>,
) -> Result<IndexReport> {
    let products = load_catalog(&config.product_catalog_path)?;
    let report = indexer
        .index_products(&products, &config.site_base_url, collection)
        .await?;
    report.log("products");
    Ok(report)
}

async fn index_pages(indexer: &Indexer, config: &Config) -> Result<IndexReport> {
    let reader = ReaderClient::from_config(config).context("Failed to build page reader")?;
    let report = indexer.index_pages(&reader, &config.site_base_url).await;
    report.log("pages");
    Ok(report)
}
