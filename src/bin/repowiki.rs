//! Command-line driver for the wiki + RAG engine

use clap::{Parser, Subcommand};
use repowiki::conversation::ConversationStore;
use repowiki::index_cache::IndexCache;
use repowiki::research::{DeepResearch, RepositoryFingerprint};
use repowiki::{CancelToken, QueryOptions, RagEngine, WikiConfig, WikiError, WikiPipeline};
use std::path::PathBuf;
use tracing::error;
use tracing_subscriber::EnvFilter;

#[derive(Parser)]
#[command(name = "repowiki", version, about = "Repository wiki + RAG engine")]
struct Cli {
    /// Configuration file (json, toml or yaml)
    #[arg(short, long, global = true)]
    config: Option<PathBuf>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Build or refresh the index for a repository
    Build {
        /// Repository root
        repo: PathBuf,
    },
    /// Ask a question against a repository index
    Ask {
        /// Repository root
        repo: PathBuf,
        /// Natural-language question
        question: String,
        /// Run the bounded deep-research protocol instead of a single query
        #[arg(long)]
        deep: bool,
    },
    /// Clear the cache for one repository, or every tracked repository
    Clear {
        /// Repository root
        repo: Option<PathBuf>,
        /// Clear every repository in the global index
        #[arg(long)]
        all: bool,
    },
    /// Show the global cache index
    Stats,
}

#[tokio::main]
async fn main() {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("repowiki=info")),
        )
        .with_target(false)
        .init();

    let cli = Cli::parse();

    if let Err(e) = run(cli).await {
        error!("{}", e);
        std::process::exit(e.exit_code());
    }
}

async fn run(cli: Cli) -> Result<(), WikiError> {
    let config = load_config(cli.config.as_deref())?;

    match cli.command {
        Commands::Build { repo } => {
            let pipeline = WikiPipeline::new(config)?;
            let output = pipeline.build(&repo, &CancelToken::new()).await?;
            let report = &output.report;
            println!(
                "Indexed {}: {} files, {} chunks, {} wiki sections, {} documents ({} ms{})",
                output.analysis.project_name,
                report.files_indexed,
                report.chunks,
                report.wiki_sections,
                report.total_documents,
                report.duration_ms,
                if report.from_cache { ", from cache" } else { "" },
            );
        }

        Commands::Ask {
            repo,
            question,
            deep,
        } => {
            let conversation_config = config.conversation.clone();
            let pipeline = WikiPipeline::new(config)?;
            let output = pipeline.build(&repo, &CancelToken::new()).await?;
            let engine = RagEngine::new(output.store, pipeline.generator());

            if deep {
                let cache = IndexCache::new(&repo);
                let mut conversation =
                    ConversationStore::open(cache.conversations_dir(), &conversation_config);
                let fingerprint = RepositoryFingerprint::from(&output.analysis);
                let mut research = DeepResearch::new(&engine, &mut conversation, fingerprint);

                let outcome = research.run(&question).await?;
                println!("{}", outcome.final_answer());
                println!(
                    "\n({} iterations, complete: {})",
                    outcome.iterations.len(),
                    outcome.state.research_complete
                );
            } else {
                let answer = engine.query(&question, &QueryOptions::default()).await?;

                let cache = IndexCache::new(&repo);
                let mut conversation =
                    ConversationStore::open(cache.conversations_dir(), &conversation_config);
                conversation.add_message(repowiki::MessageRole::User, &question, None);
                let sources: Vec<String> = answer
                    .sources
                    .iter()
                    .map(|source| source.document.path.clone())
                    .collect();
                conversation.add_message(
                    repowiki::MessageRole::Assistant,
                    &answer.answer,
                    (!sources.is_empty()).then_some(sources),
                );

                println!("{}", answer.answer);
                if !answer.sources.is_empty() {
                    println!("\nSources:");
                    for source in &answer.sources {
                        println!(
                            "  {} ({:.1}%)",
                            source.document.path,
                            source.relevance_score * 100.0
                        );
                    }
                }
                println!("Confidence: {:.2}", answer.confidence);
            }
        }

        Commands::Clear { repo, all } => {
            if all {
                let probe = IndexCache::new(".");
                let index = probe.load_global_index();
                for entry in &index.entries {
                    IndexCache::new(&entry.project_path).clear()?;
                    println!("Cleared {}", entry.project_path);
                }
            } else if let Some(repo) = repo {
                IndexCache::new(&repo).clear()?;
                println!("Cleared {}", repo.display());
            } else {
                return Err(WikiError::Config(
                    "clear needs a repository path or --all".to_string(),
                ));
            }
        }

        Commands::Stats => {
            let index = IndexCache::new(".").load_global_index();
            if index.entries.is_empty() {
                println!("No cached repositories.");
            } else {
                println!("Cached repositories ({}):", index.entries.len());
                for entry in &index.entries {
                    println!(
                        "  {} — {} (last built {})",
                        entry.project_name,
                        entry.project_path,
                        entry.last_modified.format("%Y-%m-%d %H:%M"),
                    );
                }
            }
        }
    }

    Ok(())
}

fn load_config(path: Option<&std::path::Path>) -> Result<WikiConfig, WikiError> {
    match path {
        Some(path) => WikiConfig::from_file(path)
            .map_err(|e| WikiError::Config(format!("Failed to load {}: {}", path.display(), e))),
        None => Ok(WikiConfig::default()),
    }
}
