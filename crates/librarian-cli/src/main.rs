//! Librarian - client library generation and release automation CLI
//!
//! ## Commands
//!
//! - `generate`: Generate code for one API path, refined when a configured
//!   library owns it and raw otherwise
//! - `regenerate`: Regenerate every permitted library in a language
//!   repository and publish one pull request

use std::path::PathBuf;
use std::sync::Arc;

use anyhow::{Context, Result};
use chrono::Utc;
use clap::{Args, Parser, Subcommand};
use librarian_core::{
    format_timestamp, run_generate, run_regenerate, DockerRunner, EnvironmentResolver,
    GenerateDeps, GenerationOrchestrator, GitHubClient, GitRepoOpener, HostingStateProvider,
    InvocationConfig, InvocationFlags, PullRequestPublisher, RegenerateDeps, RunSpan,
};
use tracing::{info, Level};

#[derive(Parser)]
#[command(name = "librarian")]
#[command(author = "Librarian Maintainers")]
#[command(version = env!("CARGO_PKG_VERSION"))]
#[command(about = "Client library generation and release automation", long_about = None)]
struct Cli {
    /// Enable verbose output
    #[arg(short, long, global = true)]
    verbose: bool,

    /// Emit JSON-formatted log lines
    #[arg(long, global = true)]
    json: bool,

    #[command(subcommand)]
    command: Commands,
}

/// Flags shared by every command.
#[derive(Args, Debug, Clone, Default)]
struct CommonArgs {
    /// Working directory root (default: a timestamped directory under the system temp dir)
    #[arg(long, env = "LIBRARIAN_WORK_ROOT")]
    work_root: Option<PathBuf>,

    /// Root of the API definition repository (e.g. a googleapis checkout)
    #[arg(long, env = "LIBRARIAN_API_ROOT")]
    api_root: Option<PathBuf>,

    /// Local language repository checkout
    #[arg(long, conflicts_with = "repo_url")]
    repo_root: Option<PathBuf>,

    /// Language repository URL to clone
    #[arg(long)]
    repo_url: Option<String>,

    /// Build generated code after generation
    #[arg(long)]
    build: bool,

    /// Generator image, overriding the repository configuration
    #[arg(long, env = "LIBRARIAN_IMAGE")]
    image: Option<String>,

    /// Google Cloud project holding secrets for container environment variables
    #[arg(long, env = "LIBRARIAN_SECRETS_PROJECT")]
    secrets_project: Option<String>,

    /// Language whose default generator image is used when none is configured
    #[arg(long, env = "LIBRARIAN_LANGUAGE")]
    language: Option<String>,
}

#[derive(Subcommand)]
enum Commands {
    /// Generate client library code for an API
    Generate {
        /// API path relative to the API root (e.g. google/cloud/functions/v2)
        #[arg(long)]
        api_path: String,

        #[command(flatten)]
        common: CommonArgs,
    },

    /// Regenerate every library in a language repository and open a pull request
    Regenerate {
        /// Push the branch and create the pull request (otherwise only log it)
        #[arg(long)]
        push: bool,

        #[command(flatten)]
        common: CommonArgs,
    },
}

fn flags(common: CommonArgs, api_path: Option<String>, push: bool) -> InvocationFlags {
    InvocationFlags {
        work_root: common.work_root,
        api_path,
        api_root: common.api_root,
        repo_root: common.repo_root,
        repo_url: common.repo_url,
        build: common.build,
        push,
        image: common.image,
        secrets_project: common.secrets_project,
        language: common.language,
    }
}

fn orchestrator() -> GenerationOrchestrator {
    let runner = Arc::new(DockerRunner::new(EnvironmentResolver::system()));
    GenerationOrchestrator::new(runner.clone(), runner)
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    let level = if cli.verbose {
        Level::DEBUG
    } else {
        Level::INFO
    };
    librarian_core::init_tracing(cli.json, level);

    let start_time = Utc::now();
    let started = format_timestamp(&start_time);

    match cli.command {
        Commands::Generate { api_path, common } => {
            let _span = RunSpan::enter("generate", &started);
            let config =
                InvocationConfig::from_flags(flags(common, Some(api_path), false), start_time)
                    .context("Invalid generate flags")?;
            cmd_generate(&config, cli.json).await
        }
        Commands::Regenerate { push, common } => {
            let _span = RunSpan::enter("regenerate", &started);
            let config = InvocationConfig::from_flags(flags(common, None, push), start_time)
                .context("Invalid regenerate flags")?;
            cmd_regenerate(&config, cli.json).await
        }
    }
}

async fn cmd_generate(config: &InvocationConfig, json: bool) -> Result<()> {
    let hosting = Arc::new(GitHubClient::from_env().context("Failed to create GitHub client")?);
    let deps = GenerateDeps {
        state_provider: Arc::new(HostingStateProvider::new(hosting)),
        opener: Arc::new(GitRepoOpener),
        orchestrator: orchestrator(),
    };

    let outcome = run_generate(config, &deps)
        .await
        .context("Generation failed")?;

    if json {
        let summary = serde_json::json!({
            "library_id": outcome.library_id,
            "output_dir": outcome.output_dir,
        });
        println!("{}", serde_json::to_string_pretty(&summary)?);
    } else {
        match &outcome.library_id {
            Some(id) => println!("Generated library {id}"),
            None => println!("Generated raw output"),
        }
        println!("  Output: {}", outcome.output_dir.display());
    }
    Ok(())
}

async fn cmd_regenerate(config: &InvocationConfig, json: bool) -> Result<()> {
    let hosting = Arc::new(GitHubClient::from_env().context("Failed to create GitHub client")?);
    let deps = RegenerateDeps {
        opener: Arc::new(GitRepoOpener),
        orchestrator: orchestrator(),
        publisher: PullRequestPublisher::new(hosting, config.push),
    };

    let outcome = run_regenerate(config, &deps)
        .await
        .context("Regeneration failed")?;

    if json {
        println!("{}", serde_json::to_string_pretty(&serde_json::json!({
            "successes": outcome.content.successes,
            "errors": outcome.content.errors,
            "deferred": outcome.deferred,
            "pull_request": outcome.pull_request,
        }))?);
        return Ok(());
    }

    println!(
        "Regenerated {} librar{}, {} error(s)",
        outcome.content.successes.len(),
        if outcome.content.successes.len() == 1 { "y" } else { "ies" },
        outcome.content.errors.len()
    );
    if !outcome.deferred.is_empty() {
        println!("  Deferred: {}", outcome.deferred.join(", "));
    }
    match &outcome.pull_request {
        Some(pr) => {
            info!(number = pr.number, "pull request ready");
            println!("  Pull request: {}", pr.url);
        }
        None if config.push => println!("  No pull request created"),
        None => println!("  Dry run; pass --push to create the pull request"),
    }
    Ok(())
}
