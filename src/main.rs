use anyhow::Context;
use cinematch::config::{BuildConfig, ServeConfig};
use cinematch::pipeline;
use cinematch::store;
use cinematch::{RecommendError, Recommender};
use clap::{Parser, Subcommand};
use log::error;
use std::path::PathBuf;
use std::process::ExitCode;

#[derive(Parser)]
#[command(name = "cinematch", about = "Content-based movie recommendations")]
struct Cli {
    /// Artifact database (defaults to $CINEMATCH_ARTIFACTS or ./cinematch.db)
    #[arg(long, global = true)]
    artifacts: Option<PathBuf>,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Build catalog and similarity artifacts from TMDB CSV exports
    Build {
        #[arg(long)]
        movies: PathBuf,
        #[arg(long)]
        credits: PathBuf,
        /// Vocabulary cap
        #[arg(long)]
        max_features: Option<usize>,
    },
    /// Recommend movies similar to TITLE
    Recommend {
        title: String,
        #[arg(short, long)]
        k: Option<usize>,
    },
    /// List catalog titles in catalog order
    Titles,
    /// Show catalog statistics
    Info,
}

fn main() -> ExitCode {
    let _ = env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info"))
        .format_timestamp_millis()
        .try_init();

    let cli = Cli::parse();
    match run(cli) {
        Ok(code) => code,
        Err(e) => {
            error!("{:#}", e);
            ExitCode::FAILURE
        }
    }
}

fn run(cli: Cli) -> anyhow::Result<ExitCode> {
    match cli.command {
        Command::Build {
            movies,
            credits,
            max_features,
        } => {
            let mut config = BuildConfig::from_env();
            if let Some(path) = cli.artifacts {
                config.artifact_path = path;
            }
            if let Some(cap) = max_features.filter(|c| *c > 0) {
                config.max_features = cap;
            }

            let report = pipeline::run_build(&movies, &credits, &config)
                .context("Build failed; existing artifacts were left untouched")?;
            println!(
                "Built {} movies ({} terms) into {}",
                report.catalog_size,
                report.vocabulary_size,
                config.artifact_path.display()
            );
            println!(
                "Dropped: {} without credits, {} without overview, {} duplicate titles, {} skipped rows",
                report.ingest.without_credits,
                report.profiles.missing_narrative,
                report.duplicate_titles_dropped,
                report.ingest.movies.skipped + report.ingest.credits.skipped
            );
            Ok(ExitCode::SUCCESS)
        }
        Command::Recommend { title, k } => {
            let config = serve_config(cli.artifacts);
            let recommender = Recommender::load(&config)
                .context("Run `cinematch build` first to create the artifacts")?;
            let k = k.unwrap_or(config.top_k);

            match recommender.rank_similar(&title, k) {
                Ok(ranked) => {
                    for (i, rec) in ranked.iter().enumerate() {
                        println!("{}. {} ({:.3})", i + 1, rec.title, rec.score);
                    }
                    Ok(ExitCode::SUCCESS)
                }
                Err(RecommendError::NotFound { title, suggestions }) => {
                    eprintln!("Movie not found in catalog: {}", title);
                    if !suggestions.is_empty() {
                        eprintln!("Did you mean: {}", suggestions.join(", "));
                    }
                    Ok(ExitCode::from(2))
                }
                Err(e @ RecommendError::Misaligned { .. }) => Err(e.into()),
            }
        }
        Command::Titles => {
            let config = serve_config(cli.artifacts);
            let recommender = Recommender::load(&config)?;
            for title in recommender.catalog().titles() {
                println!("{}", title);
            }
            Ok(ExitCode::SUCCESS)
        }
        Command::Info => {
            let config = serve_config(cli.artifacts);
            let info = store::read_build_info(&config.artifact_path)?;
            println!("Artifacts:       {}", config.artifact_path.display());
            println!("Movies:          {}", info.item_count);
            println!("Vocabulary:      {} terms (cap {})", info.vocabulary_size, info.max_features);
            println!("Built at:        {}", info.built_at);
            Ok(ExitCode::SUCCESS)
        }
    }
}

fn serve_config(artifacts: Option<PathBuf>) -> ServeConfig {
    let mut config = ServeConfig::from_env();
    if let Some(path) = artifacts {
        config.artifact_path = path;
    }
    config
}
