//! CALM CLI
//!
//! Validates architectures against patterns, generates placeholder
//! architectures from patterns and hosts the validation server.

use anyhow::Context;
use clap::{Args, Parser, Subcommand};
use std::net::SocketAddr;
use std::path::{Path, PathBuf};
use tracing_subscriber::EnvFilter;

use calm_patterns::format::{format_outcome, OutputFormat};
use calm_patterns::loader::{DocumentLoader, LoaderChain};
use calm_patterns::server::{self, AppState};
use calm_patterns::validate::{self, ValidationTarget};
use calm_patterns::{instantiate, CalmConfig, GenerateOptions, SchemaDirectory};

#[derive(Parser)]
#[command(name = "calm")]
#[command(version, about = "Validate and generate CALM architectures from patterns")]
struct Cli {
    /// Configuration file, layered over calm.toml and the user config
    #[arg(long, global = true)]
    config: Option<String>,

    /// Enable debug logging
    #[arg(short, long, global = true)]
    verbose: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Args)]
struct SchemaArgs {
    /// Directory of additional schemas to load
    #[arg(short = 's', long = "schemaDirectory", alias = "schema-directory")]
    schema_directory: Option<PathBuf>,
}

#[derive(Subcommand)]
enum Commands {
    /// Validate an architecture against a pattern
    Validate {
        /// Pattern file or URL
        #[arg(short, long)]
        pattern: Option<String>,

        /// Architecture file or URL
        #[arg(short, long)]
        architecture: Option<String>,

        #[command(flatten)]
        schemas: SchemaArgs,

        /// Fail on warnings as well as errors
        #[arg(long)]
        strict: bool,

        /// Output format
        #[arg(short, long, value_enum)]
        format: Option<OutputFormat>,

        /// Write the report to a file instead of stdout
        #[arg(short, long)]
        output: Option<PathBuf>,
    },

    /// Generate a placeholder architecture from a pattern
    Generate {
        /// Pattern file or URL
        #[arg(short, long)]
        pattern: String,

        /// Where to write the architecture
        #[arg(short, long, default_value = "architecture.json")]
        output: PathBuf,

        #[command(flatten)]
        schemas: SchemaArgs,

        /// Instantiate optional properties too
        #[arg(short = 'g', long = "generateAll", alias = "generate-all")]
        generate_all: bool,

        /// Fail when a reference cannot be resolved
        #[arg(long)]
        strict: bool,
    },

    /// Serve the validation API
    Server {
        /// Port to listen on
        #[arg(long)]
        port: Option<u16>,

        /// Address to bind
        #[arg(long)]
        host: Option<String>,

        #[command(flatten)]
        schemas: SchemaArgs,
    },

    /// Manage the configuration file
    Config {
        #[command(subcommand)]
        action: ConfigAction,
    },
}

#[derive(Subcommand)]
enum ConfigAction {
    /// Write the effective configuration as TOML
    Init {
        /// Where to write it
        #[arg(short, long, default_value = "calm.toml")]
        output: PathBuf,

        /// Overwrite an existing file
        #[arg(long)]
        force: bool,
    },
}

#[tokio::main]
async fn main() {
    let cli = Cli::parse();

    let default_level = if cli.verbose { "debug" } else { "warn" };
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_level));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .init();

    match run(cli).await {
        Ok(code) => std::process::exit(code),
        Err(e) => {
            eprintln!("Error: {e:#}");
            std::process::exit(1);
        }
    }
}

async fn run(cli: Cli) -> anyhow::Result<i32> {
    let config = CalmConfig::load_from(cli.config.as_deref()).context("loading configuration")?;
    let loader = LoaderChain::standard(&config)?;

    match cli.command {
        Commands::Validate {
            pattern,
            architecture,
            schemas,
            strict,
            format,
            output,
        } => {
            let mut directory = load_directory(&config, schemas.schema_directory.as_deref()).await?;

            let pattern = match pattern {
                Some(id) => Some(loader.resolve(&id).await?),
                None => None,
            };
            let architecture = match architecture {
                Some(id) => Some(loader.resolve(&id).await?),
                None => None,
            };
            let target = ValidationTarget::from_parts(architecture, pattern)?;

            let (outcome, maps) = validate::run(&target, &mut directory, &loader).await?;
            let report = format_outcome(&outcome, format.unwrap_or(config.output.format), &maps)?;
            match output {
                Some(path) => write_file(&path, &report)?,
                None => println!("{report}"),
            }
            Ok(outcome.exit_code(strict))
        }

        Commands::Generate {
            pattern,
            output,
            schemas,
            generate_all,
            strict,
        } => {
            let mut directory = load_directory(&config, schemas.schema_directory.as_deref()).await?;
            let pattern = loader.resolve(&pattern).await?;
            if let Err(e) = validate::fetch_references(&pattern.value, &mut directory, &loader).await {
                tracing::warn!(error = %e, "some referenced schemas could not be fetched");
            }
            directory.add_value(&pattern.identifier, pattern.value.clone());

            let options = GenerateOptions {
                instantiate_all: generate_all,
                strict: strict || config.resolution.strict,
            };
            let architecture = instantiate(&pattern.value, &directory, &options)?;
            write_file(&output, &serde_json::to_string_pretty(&architecture)?)?;
            eprintln!("Generated architecture written to {}", output.display());
            Ok(0)
        }

        Commands::Server {
            port,
            host,
            schemas,
        } => {
            let directory = load_directory(&config, schemas.schema_directory.as_deref()).await?;
            let host = host.unwrap_or(config.server.host);
            let port = port.unwrap_or(config.server.port);
            let addr: SocketAddr = format!("{host}:{port}")
                .parse()
                .with_context(|| format!("invalid listen address {host}:{port}"))?;

            server::serve(addr, AppState::new(directory)).await?;
            Ok(0)
        }

        Commands::Config {
            action: ConfigAction::Init { output, force },
        } => {
            if output.exists() && !force {
                anyhow::bail!("{} already exists; pass --force to overwrite", output.display());
            }
            config
                .save(&output)
                .with_context(|| format!("writing {}", output.display()))?;
            eprintln!("Configuration written to {}", output.display());
            Ok(0)
        }
    }
}

async fn load_directory(config: &CalmConfig, override_dir: Option<&Path>) -> anyhow::Result<SchemaDirectory> {
    let mut directory = SchemaDirectory::new();
    if config.schemas.bundled {
        directory.load_bundled()?;
    }
    if let Some(dir) = override_dir.or(config.schemas.directory.as_deref()) {
        directory
            .load_directory(dir)
            .await
            .with_context(|| format!("loading schema directory {}", dir.display()))?;
    }
    tracing::info!(
        schemas = directory.len(),
        digest = %directory.digest().short(),
        "schema directory ready"
    );
    Ok(directory)
}

fn write_file(path: &Path, content: &str) -> anyhow::Result<()> {
    if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
        std::fs::create_dir_all(parent)?;
    }
    std::fs::write(path, format!("{content}\n")).with_context(|| format!("writing {}", path.display()))?;
    Ok(())
}
