//! Synckeep CLI
//!
//! Preview or apply transformation rules to files from the command line.

use anyhow::{Context, Result};
use clap::Parser;
use serde::Serialize;
use std::path::{Path, PathBuf};
use synckeep::rules::render_summary;
use synckeep::{Config, RuleEngine, RuleLoader, RuleSources, TransformContext, Transformation};
use tracing::{debug, warn};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

#[derive(Parser, Debug)]
#[command(name = "synckeep")]
#[command(author, version, about = "Rule-driven transformations for synced repository files")]
struct Cli {
    /// Path to config file (defaults to ./synckeep.toml)
    #[arg(short, long, value_name = "FILE")]
    config: Option<PathBuf>,

    /// Project directory used to find project-local rules
    #[arg(short, long, value_name = "DIR", default_value = ".")]
    project: PathBuf,

    /// Enable verbose logging
    #[arg(short, long)]
    verbose: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(clap::Subcommand, Debug)]
enum Commands {
    /// List loaded rules
    List,

    /// Validate configuration and rule sources
    Check,

    /// Run rules over files (preview unless --apply)
    Run {
        /// Release tag, e.g. v1.4.5
        #[arg(short, long)]
        tag: String,

        /// Extra template variable (NAME=VALUE)
        #[arg(long = "var", value_name = "NAME=VALUE", value_parser = parse_var)]
        vars: Vec<(String, String)>,

        /// Actually write changed files
        #[arg(long)]
        apply: bool,

        /// Print results as JSON
        #[arg(long)]
        json: bool,

        /// Files or directories (directories are not recursed)
        #[arg(required = true)]
        paths: Vec<PathBuf>,
    },
}

fn parse_var(raw: &str) -> Result<(String, String), String> {
    match raw.split_once('=') {
        Some((name, value)) if !name.trim().is_empty() => {
            Ok((name.trim().to_string(), value.to_string()))
        }
        _ => Err(format!("expected NAME=VALUE, got '{}'", raw)),
    }
}

#[derive(Serialize)]
struct FileReport {
    path: PathBuf,
    #[serde(flatten)]
    result: Transformation,
}

fn main() -> Result<()> {
    let cli = Cli::parse();

    let config_path = cli
        .config
        .clone()
        .unwrap_or_else(|| cli.project.join(Config::FILE_NAME));
    let config = Config::load(Some(config_path.as_path()));

    // Initialize logging
    let log_level = if cli.verbose {
        "debug".to_string()
    } else {
        config
            .as_ref()
            .map(|c| c.general.log_level.clone())
            .unwrap_or_else(|_| "info".to_string())
    };
    tracing_subscriber::registry()
        .with(tracing_subscriber::EnvFilter::new(
            std::env::var("SYNCKEEP_LOG").unwrap_or(log_level),
        ))
        .with(tracing_subscriber::fmt::layer().with_target(false))
        .init();
    debug!("synckeep {}", synckeep::VERSION);

    match cli.command {
        Commands::Check => match config {
            Ok(config) => {
                let loader = loader_for(&cli.project, &config_path, &config);
                let rules = loader.load();
                println!("✓ Config is valid");
                print_sources(loader.sources());
                println!("  {} embedded rules", config.rules.len());
                println!("  {} preserve entries", config.preserve.len());
                println!("  {} enabled rules from all sources", rules.len());
            }
            Err(e) => {
                eprintln!("✗ Config error: {:#}", e);
                std::process::exit(1);
            }
        },

        Commands::List => {
            let config = config?;
            let loader = loader_for(&cli.project, &config_path, &config);
            println!("Rules:");
            for (i, rule) in loader.load().iter().enumerate() {
                println!(
                    "  [{}] {} ({})",
                    i + 1,
                    rule.name,
                    rule.target_files.join(", ")
                );
                if let Some(description) = &rule.description {
                    println!("      {}", description);
                }
            }
        }

        Commands::Run {
            tag,
            vars,
            apply,
            json,
            paths,
        } => {
            let config = config?;
            let loader = loader_for(&cli.project, &config_path, &config);
            let engine = RuleEngine::from_loader(&loader);

            let mut reports = Vec::new();
            for file in expand_inputs(&paths)? {
                let content = match std::fs::read_to_string(&file) {
                    Ok(c) => c,
                    Err(e) => {
                        warn!("Skipping {}: {}", file.display(), e);
                        continue;
                    }
                };

                let mut ctx = TransformContext::new(&tag).with_base_dir(
                    file.parent().map(Path::to_path_buf).unwrap_or_default(),
                );
                for (name, value) in &vars {
                    ctx = ctx.with_var(name, value);
                }

                let rel = file.strip_prefix(&cli.project).unwrap_or(&file);
                let result = if apply {
                    engine.process(rel, &content, &ctx)
                } else {
                    engine.preview(rel, &content, &ctx)
                };

                if apply && result.changed {
                    std::fs::write(&file, &result.content)
                        .with_context(|| format!("Failed to write {}", file.display()))?;
                }
                reports.push(FileReport {
                    path: rel.to_path_buf(),
                    result,
                });
            }

            if json {
                println!("{}", serde_json::to_string_pretty(&reports)?);
            } else {
                print_reports(&reports, apply);
            }
        }
    }

    Ok(())
}

fn loader_for(project: &Path, config_path: &Path, config: &Config) -> RuleLoader {
    RuleLoader::new(
        RuleSources::discover(project)
            .with_config(config_path)
            .with_env_var(&config.general.rules_env_var),
    )
}

fn print_sources(sources: &RuleSources) {
    let files = [
        ("global", sources.global.as_deref()),
        ("project", sources.project.as_deref()),
        ("config", sources.config.as_deref()),
    ];
    for (label, path) in files {
        if let Some(path) = path {
            let state = if path.exists() { "found" } else { "missing" };
            println!("  {} rules: {} ({})", label, path.display(), state);
        }
    }
    if let Some(var) = &sources.env_var {
        match std::env::var(var) {
            Ok(value) if !value.trim().is_empty() => println!("  ${}: {}", var, value.trim()),
            _ => println!("  ${}: not set", var),
        }
    }
}

/// Files named directly, plus the files directly inside named directories
fn expand_inputs(paths: &[PathBuf]) -> Result<Vec<PathBuf>> {
    let mut files = Vec::new();
    for path in paths {
        if path.is_dir() {
            let entries = std::fs::read_dir(path)
                .with_context(|| format!("Failed to read directory {}", path.display()))?;
            let mut found: Vec<_> = entries
                .flatten()
                .map(|e| e.path())
                .filter(|p| p.is_file())
                .collect();
            found.sort();
            files.extend(found);
        } else {
            files.push(path.clone());
        }
    }
    Ok(files)
}

fn print_reports(reports: &[FileReport], applied: bool) {
    let mode = if applied { "Applied" } else { "[dry-run]" };
    for report in reports.iter().filter(|r| r.result.changed) {
        println!("{} {}", mode, report.path.display());
        for change in &report.result.changes {
            println!("  {}", change);
        }
    }

    let summary = render_summary(
        reports
            .iter()
            .map(|r| (r.path.as_path(), r.result.changes.as_slice())),
    );
    if summary.is_empty() {
        println!("No changes");
    } else {
        println!("\nSummary:\n{}", summary);
    }
}
