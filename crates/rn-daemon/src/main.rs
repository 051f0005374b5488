//! relnote — release-notes daemon and CLI.
//!
//! Watches a git repository, turns new commits into LLM-written release
//! notes, maintains a changelog document, and posts to a chat webhook.

use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;

use anyhow::Context;
use clap::{Parser, Subcommand};
use tracing::{error, info};

use rn_core::config::{Config, Credentials, ProviderKind};
use rn_core::cursor::CursorStore;
use rn_core::document::DocumentStore;
use rn_core::gate::{KeywordGate, SignificanceGate};
use rn_daemon::manual::{write_atomic, ManualOutcome, ManualRun};
use rn_daemon::orchestrator::Orchestrator;
use rn_daemon::{logging, shutdown::ShutdownSignal};
use rn_git::{CommitSource, GitCommitSource};
use rn_llm::prompts::CONNECTIVITY_PROMPT;
use rn_llm::{
    AzureOpenAiProvider, DocsGenerator, LlmConfig, LlmMessage, LlmNoteGenerator, LlmProvider,
    NoteGenerator, OpenAiProvider,
};
use rn_notify::{PublishSink, WebhookSink};

#[global_allocator]
static GLOBAL: mimalloc::MiMalloc = mimalloc::MiMalloc;

const WEBHOOK_TIMEOUT: Duration = Duration::from_secs(30);

// ---------------------------------------------------------------------------
// CLI
// ---------------------------------------------------------------------------

/// Automated release notes from your commit history.
#[derive(Parser)]
#[command(name = "relnote", version, about)]
struct Cli {
    /// Path to the config file (default: ~/.relnote/config.toml).
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    /// Emit JSON log lines instead of human-readable output.
    #[arg(long, global = true)]
    log_json: bool,

    #[command(subcommand)]
    command: Option<Commands>,
}

#[derive(Subcommand)]
enum Commands {
    /// Watch the repository and process new commits on an interval (default).
    Monitor,

    /// Generate one combined release note for an explicit commit range.
    Manual {
        /// Oldest commit of the range, exclusive.
        #[arg(long)]
        start: Option<String>,
        /// Newest commit of the range, inclusive (default: HEAD).
        #[arg(long)]
        end: Option<String>,
    },

    /// Summarize every source file into an auto-generated README.
    Docs,

    /// Verify credentials and provider connectivity with one prompt.
    Check,

    /// Inspect or scaffold the configuration.
    Config {
        /// Write a commented sample config (refuses to overwrite).
        #[arg(long)]
        sample: bool,
        /// Print the effective config and credential presence (default).
        #[arg(long)]
        status: bool,
    },
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    dotenv::dotenv().ok();
    let cli = Cli::parse();

    // `config` must keep working even when the current file is broken.
    if let Some(Commands::Config { sample, status }) = &cli.command {
        return run_config(*sample, *status, cli.config.as_deref());
    }

    let config = match &cli.config {
        Some(path) => Config::load_from(path)
            .with_context(|| format!("failed to load config from {}", path.display()))?,
        None => Config::load().context("failed to load configuration")?,
    };

    if cli.log_json {
        logging::init_logging_json("relnote", &config.general.log_level);
    } else {
        logging::init_logging("relnote", &config.general.log_level);
    }

    match cli.command {
        None | Some(Commands::Monitor) => run_monitor(&config).await,
        Some(Commands::Manual { start, end }) => {
            run_manual(&config, start.as_deref(), end.as_deref()).await
        }
        Some(Commands::Docs) => run_docs(&config).await,
        Some(Commands::Check) => run_check(&config).await,
        Some(Commands::Config { .. }) => unreachable!("handled before config load"),
    }
}

// ---------------------------------------------------------------------------
// Subcommands
// ---------------------------------------------------------------------------

async fn run_monitor(config: &Config) -> anyhow::Result<()> {
    let repo = validated_repo_path(config)?;
    info!(repo = %repo.display(), "starting monitor");

    let source: Arc<dyn CommitSource> = Arc::new(GitCommitSource::new(&repo));
    let generator = build_generator(config)?;
    let sink = build_sink(config);
    let gate: Arc<dyn SignificanceGate> = Arc::new(KeywordGate::new(
        config.docs.significance_keywords.iter().cloned(),
    ));

    let cursor = CursorStore::new(config.git.cursor_path());
    let document = DocumentStore::new(
        config.docs.resolved_document_path(&config.git.repository_path),
        config.docs.backup_document,
    );

    let orchestrator = Orchestrator::new(
        source,
        generator,
        sink,
        gate,
        cursor,
        document,
        config.monitor.clone(),
    );

    spawn_ctrl_c_handler(orchestrator.shutdown_handle());

    orchestrator
        .run_continuous()
        .await
        .context("monitor loop failed")
}

async fn run_manual(
    config: &Config,
    start: Option<&str>,
    end: Option<&str>,
) -> anyhow::Result<()> {
    let repo = validated_repo_path(config)?;

    let source: Arc<dyn CommitSource> = Arc::new(GitCommitSource::new(&repo));
    let generator = build_generator(config)?;
    let sink = build_sink(config);
    let output_dir = config.docs.resolved_output_dir(&config.git.repository_path);

    let run = ManualRun::new(
        source,
        generator,
        sink,
        output_dir,
        config.monitor.max_commits_per_check,
    );

    match run.run(start, end).await? {
        ManualOutcome::Written { path, commits } => {
            println!(
                "release notes for {commits} commit(s) written to {}",
                path.display()
            );
        }
        ManualOutcome::NothingToDo => {
            println!("nothing to generate for the requested range");
        }
    }
    Ok(())
}

async fn run_docs(config: &Config) -> anyhow::Result<()> {
    let repo = PathBuf::from(&config.git.repository_path);
    let provider = build_provider(config)?;
    let generator = DocsGenerator::new(provider, llm_config_from(config), config.docs.clone());

    let readme = generator
        .generate(&repo)
        .await
        .context("documentation generation failed")?;

    let out = config
        .docs
        .resolved_output_dir(&config.git.repository_path)
        .join("README.md");
    write_atomic(&out, &readme)
        .with_context(|| format!("failed to write {}", out.display()))?;
    println!("documentation written to {}", out.display());
    Ok(())
}

async fn run_check(config: &Config) -> anyhow::Result<()> {
    let provider = build_provider(config)?;
    let messages = vec![LlmMessage::user(CONNECTIVITY_PROMPT)];

    println!(
        "checking {:?} connectivity (model {})...",
        config.llm.provider, config.llm.model
    );
    let response = provider
        .complete(&messages, &llm_config_from(config))
        .await
        .context("connectivity check failed")?;

    println!("ok: {}", response.content.trim());
    println!(
        "usage: {} prompt + {} completion tokens",
        response.input_tokens, response.output_tokens
    );
    Ok(())
}

fn run_config(sample: bool, _status: bool, path_override: Option<&Path>) -> anyhow::Result<()> {
    let path = path_override
        .map(PathBuf::from)
        .unwrap_or_else(Config::default_path);

    if sample {
        anyhow::ensure!(
            !path.exists(),
            "refusing to overwrite existing config at {}",
            path.display()
        );
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)
                .with_context(|| format!("failed to create {}", parent.display()))?;
        }
        std::fs::write(&path, Config::sample_toml())
            .with_context(|| format!("failed to write {}", path.display()))?;
        println!("sample config written to {}", path.display());
        return Ok(());
    }

    // Default to --status.
    let config = if path.exists() {
        Config::load_from(&path)
            .with_context(|| format!("failed to load config from {}", path.display()))?
    } else {
        println!("no config file at {}, showing defaults", path.display());
        Config::default()
    };

    println!("config file:  {}", path.display());
    println!("repository:   {}", config.git.repository_path);
    println!(
        "provider:     {:?} (model {}, {} max tokens)",
        config.llm.provider, config.llm.model, config.llm.max_tokens
    );
    println!(
        "monitor:      every {}s, up to {} commits, policy {:?}",
        config.monitor.interval_secs,
        config.monitor.max_commits_per_check,
        config.monitor.cursor_policy
    );
    println!(
        "document:     {}",
        config
            .docs
            .resolved_document_path(&config.git.repository_path)
            .display()
    );
    println!(
        "webhook:      {}",
        if config.webhook.enabled && config.webhook.resolved_url().is_some() {
            "configured"
        } else {
            "disabled"
        }
    );

    let creds = Credentials::available();
    if creds.is_empty() {
        println!("credentials:  none detected (set OPENAI_API_KEY or AZURE_OPENAI_API_KEY)");
    } else {
        println!("credentials:  {}", creds.join(", "));
    }
    Ok(())
}

// ---------------------------------------------------------------------------
// Wiring helpers
// ---------------------------------------------------------------------------

fn validated_repo_path(config: &Config) -> anyhow::Result<PathBuf> {
    let repo = PathBuf::from(&config.git.repository_path);
    anyhow::ensure!(
        GitCommitSource::is_repo(&repo),
        "{} is not a git repository (set git.repository_path)",
        repo.display()
    );
    Ok(repo)
}

fn build_provider(config: &Config) -> anyhow::Result<Arc<dyn LlmProvider>> {
    let timeout = Duration::from_secs(config.llm.timeout_secs);
    match config.llm.provider {
        ProviderKind::OpenAi => {
            let api_key = config
                .llm
                .api_key()
                .context("OPENAI_API_KEY is not set")?;
            let mut provider = OpenAiProvider::new(api_key).with_timeout(timeout);
            if let Some(endpoint) = config.llm.resolved_endpoint() {
                provider = provider.with_base_url(endpoint);
            }
            Ok(Arc::new(provider))
        }
        ProviderKind::Azure => {
            let api_key = config
                .llm
                .api_key()
                .context("AZURE_OPENAI_API_KEY is not set")?;
            let endpoint = config
                .llm
                .resolved_endpoint()
                .context("llm.endpoint (or AZURE_OPENAI_ENDPOINT) is not set")?;
            let provider = AzureOpenAiProvider::new(
                api_key,
                endpoint,
                &config.llm.deployment,
                &config.llm.api_version,
            )
            .with_timeout(timeout);
            Ok(Arc::new(provider))
        }
    }
}

fn build_generator(config: &Config) -> anyhow::Result<Arc<dyn NoteGenerator>> {
    let provider = build_provider(config)?;
    Ok(Arc::new(LlmNoteGenerator::new(
        provider,
        llm_config_from(config),
    )))
}

fn llm_config_from(config: &Config) -> LlmConfig {
    LlmConfig {
        model: config.llm.model.clone(),
        max_tokens: config.llm.max_tokens,
        temperature: config.llm.temperature,
        system_prompt: None,
    }
}

fn build_sink(config: &Config) -> Option<Arc<dyn PublishSink>> {
    if !config.webhook.enabled {
        info!("webhook notifications disabled in config");
        return None;
    }
    let Some(url) = config.webhook.resolved_url() else {
        info!("no webhook URL configured, notifications disabled");
        return None;
    };
    let sink = WebhookSink::new(url)
        .with_channel(config.webhook.channel.clone())
        .with_mentions(config.webhook.mention_users.clone())
        .with_timeout(WEBHOOK_TIMEOUT);
    Some(Arc::new(sink))
}

fn spawn_ctrl_c_handler(shutdown: ShutdownSignal) {
    tokio::spawn(async move {
        if let Err(e) = tokio::signal::ctrl_c().await {
            error!(error = %e, "failed to listen for ctrl-c");
            return;
        }
        info!("ctrl-c received, shutting down");
        shutdown.trigger();
    });
}
