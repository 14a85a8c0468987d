use anyhow::{Context, Result};
use clap::Parser;
use std::io::IsTerminal;
use std::path::PathBuf;
use std::process::ExitCode;
use std::sync::Arc;
use std::time::Duration;
use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::util::SubscriberInitExt;
use tracing_subscriber::{fmt, EnvFilter};

use multi_review::agent::{AgentInvoker, CredentialStore, HttpRuntime, ModelRegistry, Provider};
use multi_review::coding::{PipelineOutcome, ReviewPipeline, ReviewRequest};
use multi_review::config::Config;
use multi_review::vcs::GitCli;

/// Review a git diff with several models and merge their findings.
#[derive(Parser, Debug)]
#[command(name = "multi-review", version, about)]
struct Cli {
    /// Ref to review
    #[arg(default_value = "HEAD")]
    target: String,

    /// Ref to compare against
    #[arg(default_value = "main")]
    base: String,

    /// Optional focus for the reviewers, e.g. "error handling"
    #[arg(trailing_var_arg = true)]
    focus: Vec<String>,

    /// Config file (defaults to the platform config dir)
    #[arg(long)]
    config: Option<PathBuf>,

    /// Directory reports are written to
    #[arg(long)]
    output_dir: Option<PathBuf>,

    /// Debug-level diagnostics
    #[arg(short, long)]
    verbose: bool,
}

fn init_tracing(verbose: bool) {
    let default_level = if verbose { "debug" } else { "info" };
    let filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_level));
    tracing_subscriber::registry()
        .with(filter)
        .with(
            fmt::layer()
                .with_target(false)
                .with_writer(std::io::stderr)
                .with_ansi(std::io::stderr().is_terminal()),
        )
        .try_init()
        .ok();
}

#[tokio::main(flavor = "current_thread")]
async fn main() -> ExitCode {
    let cli = Cli::parse();
    init_tracing(cli.verbose);

    match run(cli).await {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            tracing::error!("❌ {e:#}");
            ExitCode::FAILURE
        }
    }
}

async fn run(cli: Cli) -> Result<()> {
    let (mut config, source) = Config::load(cli.config.as_deref())?;
    match &source {
        Some(path) => tracing::debug!(path = %path.display(), "Loaded config"),
        None => tracing::debug!("Using built-in config"),
    }
    if let Some(dir) = &cli.output_dir {
        config.output_dir = dir.to_string_lossy().into_owned();
    }

    let credentials = CredentialStore::from_env(&config.providers);
    for provider in [Provider::Anthropic, Provider::OpenAi, Provider::Google] {
        if !credentials.has(provider) {
            tracing::debug!(provider = provider.as_str(), "No API key found");
        }
    }
    let registry = ModelRegistry::from_config(credentials, &config.providers);
    let runtime = HttpRuntime::new(Duration::from_secs(config.runtime.connect_timeout_secs))
        .context("Failed to build the HTTP client")?;
    let invoker = AgentInvoker::new(
        Arc::new(runtime),
        Arc::new(registry),
        config.runtime.max_output_tokens,
    );

    let cwd = std::env::current_dir().context("Failed to read the working directory")?;
    let git = GitCli::new(cwd, config.runtime.max_diff_bytes);
    let pipeline = ReviewPipeline::from_config(&config, invoker, Arc::new(git));

    let focus = cli.focus.join(" ");
    let request = ReviewRequest {
        target: cli.target,
        base: cli.base,
        focus: (!focus.trim().is_empty()).then_some(focus),
    };

    match pipeline.run(&request).await? {
        PipelineOutcome::NoChanges => {}
        PipelineOutcome::Completed { paths, .. } => {
            println!("{}", serde_json::to_string(&paths)?);
        }
    }
    Ok(())
}
