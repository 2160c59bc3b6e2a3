use anyhow::{Context, Result};
use clap::{Parser, Subcommand, ValueEnum};
use spimi::index::{load_names, LinkGraph};
use spimi::{
    DocId, IndexBackend, IndexConfig, IndexStore, Indexer, QueryEvaluator, QueryType,
    RankingType, SearchOutcome, Tokenizer,
};
use std::path::{Path, PathBuf};
use std::time::Instant;
use tracing::{info, warn};

#[derive(Parser)]
#[command(name = "spimi")]
#[command(about = "Build and query a disk-backed inverted index", long_about = None)]
struct Args {
    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Index every file under a directory
    Build {
        /// Root directory of the document collection
        root: PathBuf,

        /// Directory holding the index files
        #[arg(long, env = "SPIMI_INDEX_DIR", default_value = "./index")]
        index_dir: PathBuf,

        /// Token insertions buffered before a partition is spilled
        #[arg(long, env = "SPIMI_MEMORY_BUDGET")]
        memory_budget: Option<usize>,

        /// Keep postings in memory instead of writing an index file
        #[arg(long)]
        memory: bool,

        /// JSON configuration file
        #[arg(long)]
        config: Option<PathBuf>,
    },
    /// Run one query against a built index
    Query {
        /// Query terms
        #[arg(required = true)]
        terms: Vec<String>,

        /// Directory holding the index files
        #[arg(long, env = "SPIMI_INDEX_DIR", default_value = "./index")]
        index_dir: PathBuf,

        /// JSON configuration file
        #[arg(long)]
        config: Option<PathBuf>,

        #[arg(long, value_enum, default_value_t = Mode::Intersection)]
        mode: Mode,

        /// Scoring used by ranked mode
        #[arg(long, value_enum, default_value_t = Ranking::TfIdf)]
        ranking: Ranking,

        /// Maximum number of results to print
        #[arg(long, default_value = "10")]
        limit: usize,
    },
    /// Compute PageRank scores from a link graph
    Pagerank {
        /// Links file, one `title;target,target,...` line per page
        links: PathBuf,

        /// Names file mapping titles to document files, `title;fileName`
        #[arg(long)]
        names: Option<PathBuf>,

        /// Directory holding the index files
        #[arg(long, env = "SPIMI_INDEX_DIR", default_value = "./index")]
        index_dir: PathBuf,

        /// Where to write the scores, defaults to the index's PageRank file
        #[arg(long)]
        output: Option<PathBuf>,

        /// JSON configuration file
        #[arg(long)]
        config: Option<PathBuf>,
    },
}

#[derive(Clone, Copy, ValueEnum)]
enum Mode {
    Intersection,
    Phrase,
    Ranked,
}

#[derive(Clone, Copy, ValueEnum)]
enum Ranking {
    TfIdf,
    Pagerank,
    Combination,
}

fn query_type(mode: Mode, ranking: Ranking) -> QueryType {
    match mode {
        Mode::Intersection => QueryType::Intersection,
        Mode::Phrase => QueryType::Phrase,
        Mode::Ranked => QueryType::Ranked(match ranking {
            Ranking::TfIdf => RankingType::TfIdf,
            Ranking::Pagerank => RankingType::PageRank,
            Ranking::Combination => RankingType::Combination,
        }),
    }
}

fn load_config(config: Option<&Path>, index_dir: PathBuf) -> Result<IndexConfig> {
    match config {
        Some(path) => IndexConfig::from_json_file(path)
            .with_context(|| format!("failed to load configuration from {}", path.display())),
        None => Ok(IndexConfig::new(index_dir)),
    }
}

fn build(config: IndexConfig, root: &Path) -> Result<()> {
    let started = Instant::now();
    info!("Index configuration:");
    info!("  Index directory: {:?}", config.root_dir);
    info!("  Memory budget: {} tokens", config.memory_budget);
    info!("  Backend: {:?}", config.backend);
    if config.backend == IndexBackend::Memory {
        warn!("in-memory build: nothing is written for later queries");
    }

    let mut indexer = Indexer::new(config)?;
    let documents = indexer
        .index_directory(root)
        .with_context(|| format!("failed to index {}", root.display()))?;
    let store = indexer.finish()?;

    info!(
        "Indexed {} documents, {} terms in {:.2?}",
        documents,
        store.term_count(),
        started.elapsed()
    );
    Ok(())
}

fn search(config: IndexConfig, terms: &[String], query_type: QueryType, limit: usize) -> Result<()> {
    let store = IndexStore::open(&config)
        .with_context(|| format!("no usable index in {}", config.root_dir.display()))?;
    let tokenizer = Tokenizer::new(&config.tokenizer);
    let query = tokenizer.query(&terms.join(" "));

    let started = Instant::now();
    let outcome = QueryEvaluator::new(&store).search(&query, query_type)?;
    info!("Found {} matching documents in {:.2?}", outcome.len(), started.elapsed());

    let path_of = |doc: DocId| {
        store
            .document_path(doc)
            .map(|p| p.display().to_string())
            .unwrap_or_else(|| format!("<doc {}>", doc))
    };

    match outcome {
        SearchOutcome::NoMatches => println!("No matches."),
        SearchOutcome::Postings(list) => {
            for doc in list.doc_ids().take(limit) {
                println!("{}", path_of(doc));
            }
        }
        SearchOutcome::Ranked(hits) => {
            for hit in hits.iter().take(limit) {
                println!("{:.5}\t{}", hit.score, path_of(hit.doc_id));
            }
        }
    }
    Ok(())
}

fn pagerank(config: IndexConfig, links: &Path, names: Option<&Path>) -> Result<()> {
    let started = Instant::now();
    let graph = LinkGraph::load(links)
        .with_context(|| format!("failed to read links from {}", links.display()))?;
    let names = match names {
        Some(path) => load_names(path)
            .with_context(|| format!("failed to read names from {}", path.display()))?,
        None => Default::default(),
    };

    let scores = graph.scores(&config.pagerank, &names);
    let output = config.pagerank_file();
    if let Some(parent) = output.parent() {
        std::fs::create_dir_all(parent)?;
    }
    scores.save(&output)?;

    info!(
        "Scored {} pages in {:.2?}, written to {}",
        graph.len(),
        started.elapsed(),
        output.display()
    );
    for (name, score) in scores.top(10) {
        println!("{:.5}\t{}", score, name);
    }
    Ok(())
}

fn main() -> Result<()> {
    // Initialize tracing
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::from_default_env()
                .add_directive(tracing::Level::INFO.into()),
        )
        .init();

    let args = Args::parse();
    info!("spimi v{}", spimi::VERSION);

    match args.command {
        Command::Build {
            root,
            index_dir,
            memory_budget,
            memory,
            config,
        } => {
            let mut config = load_config(config.as_deref(), index_dir)?;
            if let Some(budget) = memory_budget {
                config = config.with_memory_budget(budget);
            }
            if memory {
                config = config.with_backend(IndexBackend::Memory);
            }
            build(config, &root)
        }
        Command::Query {
            terms,
            index_dir,
            config,
            mode,
            ranking,
            limit,
        } => {
            let config = load_config(config.as_deref(), index_dir)?;
            search(config, &terms, query_type(mode, ranking), limit)
        }
        Command::Pagerank {
            links,
            names,
            index_dir,
            output,
            config,
        } => {
            let mut config = load_config(config.as_deref(), index_dir)?;
            if let Some(output) = output {
                config = config.with_pagerank_file(output);
            }
            pagerank(config, &links, names.as_deref())
        }
    }
}
