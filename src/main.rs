use anyhow::{Context, Result};
use chrono::Utc;
use clap::{Args, Parser, Subcommand};
use colored::Colorize;
use std::path::PathBuf;
use tracing_subscriber::EnvFilter;

use git_digest::config::{ConfigSource, Settings, SettingsLayer};
use git_digest::digest::{build_report, DigestOptions};
use git_digest::mcp;

#[derive(Parser)]
#[command(name = "git-digest")]
#[command(about = "Digest of new commits and tags across git remotes")]
#[command(version)]
struct Cli {
    #[command(subcommand)]
    command: Commands,

    /// YAML config file (default: ./repos.yaml, ./repos.yml, ~/.config/git-digest/repos.yaml)
    #[arg(short, long, global = true)]
    config: Option<PathBuf>,

    /// Text file with one repo URL per line (repeatable)
    #[arg(long = "repos", global = true)]
    repo_lists: Vec<PathBuf>,

    /// Directory for clones and state
    #[arg(long, global = true)]
    cache_dir: Option<PathBuf>,

    /// Debug logging to stderr
    #[arg(short, long, global = true)]
    verbose: bool,
}

#[derive(Subcommand)]
enum Commands {
    /// Fetch every repo and print the digest
    Report(ReportArgs),

    /// List configured repositories
    List,

    /// Serve get_git_updates and list_tracked_repos as MCP tools on stdio
    Mcp,
}

#[derive(Args)]
struct ReportArgs {
    /// Write the report to a file instead of stdout
    #[arg(short, long)]
    output: Option<PathBuf>,

    /// Report title
    #[arg(short, long)]
    title: Option<String>,

    /// Only report commits and tags newer than the previous run
    #[arg(long)]
    changes_only: bool,

    /// Condense the report with a local Ollama model
    #[arg(long)]
    ai_summary: bool,

    #[arg(long)]
    ollama_model: Option<String>,

    #[arg(long)]
    ollama_url: Option<String>,

    /// Seconds to wait for the model
    #[arg(long)]
    ollama_timeout: Option<u64>,
}

fn main() {
    let cli = Cli::parse();
    init_logging(cli.verbose);

    if let Err(e) = run(cli) {
        eprintln!("{} {:#}", "Error:".red().bold(), e);
        std::process::exit(1);
    }
}

fn init_logging(verbose: bool) {
    let default = if verbose { "warn,git_digest=debug" } else { "warn" };
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default));

    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .with_target(false)
        .init();
}

fn run(cli: Cli) -> Result<()> {
    let cwd = std::env::current_dir().context("Could not determine current directory")?;
    let source = ConfigSource {
        config: cli.config,
        repo_lists: cli.repo_lists,
        cwd,
    };
    let overrides = SettingsLayer {
        cache_dir: cli.cache_dir,
        ..Default::default()
    };

    match cli.command {
        Commands::Report(args) => {
            let request = SettingsLayer {
                title: args.title.clone(),
                ollama_model: args.ollama_model.clone(),
                ollama_url: args.ollama_url.clone(),
                ollama_timeout: args.ollama_timeout,
                ..Default::default()
            };
            let settings = source.load(&[&overrides, &request])?;
            cmd_report(settings, &args)
        }
        Commands::List => cmd_list(&source.load(&[&overrides])?),
        Commands::Mcp => cmd_mcp(source, overrides),
    }
}

#[tokio::main]
async fn cmd_report(settings: Settings, args: &ReportArgs) -> Result<()> {
    let options = DigestOptions {
        changes_only: args.changes_only,
        ai_summary: args.ai_summary,
    };
    let report = build_report(settings, options, Utc::now()).await?;

    match args.output {
        Some(ref path) => {
            std::fs::write(path, report.text())
                .with_context(|| format!("Failed to write report to {}", path.display()))?;
            tracing::info!("Report written to {}", path.display());
        }
        None => print!("{}", report.text()),
    }

    Ok(())
}

#[tokio::main]
async fn cmd_mcp(source: ConfigSource, overrides: SettingsLayer) -> Result<()> {
    tracing::debug!("Serving MCP on stdio");
    mcp::serve(source, overrides).await
}

fn cmd_list(settings: &Settings) -> Result<()> {
    println!("\n{} {}\n", "Repositories".bold(), format!("({})", settings.repos.len()).dimmed());

    for target in &settings.repos {
        println!("  {} {}", "•".green(), target.display_name().cyan());
        println!("    {} {}", "url:".dimmed(), target.url);
        println!("    {} {}", "branch:".dimmed(), target.branch);
        println!("    {} {}", "max commits:".dimmed(), target.max_commits);
        if !target.include_tags {
            println!("    {} {}", "tags:".dimmed(), "off".yellow());
        }
        println!();
    }

    println!("{} {}", "cache:".dimmed(), settings.cache_dir.display());
    Ok(())
}
