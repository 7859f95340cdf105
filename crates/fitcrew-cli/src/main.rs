mod config;
mod generate_cmd;
mod knowledge_cmd;
mod serve_cmd;
mod validate_cmd;

use std::path::PathBuf;

use clap::{CommandFactory, Parser, Subcommand};
use clap_complete::Shell;

use fitcrew_core::knowledge::DEFAULT_LIMIT;
use fitcrew_core::orchestrator::ExecutionMode;

use config::{CliOverrides, FitcrewConfig};

#[derive(Parser)]
#[command(
    name = "fitcrew",
    about = "Multi-agent workout and nutrition plan generator"
)]
struct Cli {
    /// Model endpoint base URL (overrides FITCREW_LLM_BASE_URL)
    #[arg(long, global = true)]
    base_url: Option<String>,

    /// Model name (overrides FITCREW_LLM_MODEL)
    #[arg(long, global = true)]
    model: Option<String>,

    /// Per-plan timeout in seconds (overrides FITCREW_TIMEOUT_SECS)
    #[arg(long, global = true)]
    timeout: Option<u64>,

    /// Stage scheduling: concurrent or sequential
    #[arg(long, global = true)]
    mode: Option<ExecutionMode>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
pub enum Commands {
    /// Write a fitcrew config file
    Init {
        /// Model endpoint base URL to store
        #[arg(long)]
        llm_base_url: Option<String>,
        /// Model name to store
        #[arg(long)]
        llm_model: Option<String>,
        /// API key to store (the file is written with 0600 permissions)
        #[arg(long)]
        api_key: Option<String>,
        /// Overwrite existing config file
        #[arg(long)]
        force: bool,
    },
    /// Serve the plan generation HTTP API
    Serve {
        /// Address to bind
        #[arg(long, default_value = "127.0.0.1")]
        bind: String,
        /// Port to listen on
        #[arg(long, default_value_t = 8000)]
        port: u16,
    },
    /// Generate a plan from a profile JSON file
    Generate {
        /// Profile JSON file (`-` for stdin)
        #[arg(long, short)]
        input: PathBuf,
        /// Output file (`-` for stdout; defaults to plan-<timestamp>.json)
        #[arg(long, short)]
        output: Option<PathBuf>,
    },
    /// Check a plan file against the FinalPlan schema
    Validate {
        /// Plan JSON file
        file: PathBuf,
        /// Treat the file as raw model output and extract the JSON object first
        #[arg(long)]
        extract: bool,
    },
    /// Search the body-assessment reference table (omit query to list topics)
    Knowledge {
        /// Search terms
        query: Option<String>,
        /// Maximum number of entries to show
        #[arg(long, default_value_t = DEFAULT_LIMIT)]
        limit: usize,
    },
    /// Print shell completions
    Completions {
        /// Target shell
        shell: Shell,
    },
}

/// Execute the `fitcrew init` command: write config file.
fn cmd_init(
    base_url: Option<String>,
    model: Option<String>,
    api_key: Option<String>,
    force: bool,
) -> anyhow::Result<()> {
    let path = config::config_path();

    if path.exists() && !force {
        anyhow::bail!(
            "config file already exists at {}\nUse --force to overwrite.",
            path.display()
        );
    }

    let has_key = api_key.is_some();
    let cfg = config::ConfigFile {
        llm: config::LlmSection {
            base_url,
            model,
            api_key,
            temperature: None,
        },
        pipeline: config::PipelineSection::default(),
    };

    config::save_config(&cfg)?;

    println!("Config written to {}", path.display());
    if let Some(url) = &cfg.llm.base_url {
        println!("  llm.base_url = {url}");
    }
    if let Some(model) = &cfg.llm.model {
        println!("  llm.model = {model}");
    }
    if has_key {
        println!("  llm.api_key = (set)");
    } else {
        println!();
        println!("No API key stored; set {} or {}.", config::ENV_API_KEY, config::ENV_OPENAI_API_KEY);
    }

    Ok(())
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info")),
        )
        .with_writer(std::io::stderr)
        .init();

    let cli = Cli::parse();
    let overrides = CliOverrides {
        base_url: cli.base_url,
        model: cli.model,
        timeout_secs: cli.timeout,
        mode: cli.mode,
    };

    match cli.command {
        Commands::Init {
            llm_base_url,
            llm_model,
            api_key,
            force,
        } => {
            cmd_init(llm_base_url, llm_model, api_key, force)?;
        }
        Commands::Serve { bind, port } => {
            let resolved = FitcrewConfig::resolve(&overrides)?;
            tracing::info!(
                model = %resolved.llm.model,
                base_url = %resolved.llm.base_url,
                mode = ?resolved.mode,
                timeout_secs = resolved.timeout.as_secs(),
                "starting plan service"
            );
            serve_cmd::run_serve(resolved.pipeline()?, &bind, port).await?;
        }
        Commands::Generate { input, output } => {
            let resolved = FitcrewConfig::resolve(&overrides)?;
            generate_cmd::run_generate(&resolved.pipeline()?, &input, output).await?;
        }
        Commands::Validate { file, extract } => {
            validate_cmd::run_validate(&file, extract)?;
        }
        Commands::Knowledge { query, limit } => {
            let resolved = FitcrewConfig::resolve(&overrides)?;
            knowledge_cmd::run_knowledge(&resolved.knowledge()?, query.as_deref(), limit)?;
        }
        Commands::Completions { shell } => {
            clap_complete::generate(shell, &mut Cli::command(), "fitcrew", &mut std::io::stdout());
        }
    }

    Ok(())
}
