use anyhow::{bail, Result};
use beankit_bootstrap::{
    default_collaborators, AppConfig, CliArgs, ContextHierarchy, ContextPlan, RefreshMode,
};
use clap::{Parser, Subcommand};

use std::path::PathBuf;

/// BeanKit - inspect the context hierarchy described by a config file
#[derive(Parser)]
#[command(name = "beankit")]
#[command(about = "BeanKit - hierarchical object container bootstrap")]
#[command(version = "0.1.0")]
struct Cli {
    /// Path to configuration file
    #[arg(short, long)]
    config: Option<PathBuf>,

    /// Print effective configuration (YAML) and exit
    #[arg(long)]
    print_config: bool,

    /// Log verbosity level (-v debug, -vv trace)
    #[arg(short, long, action = clap::ArgAction::Count)]
    verbose: u8,

    #[command(subcommand)]
    command: Option<Commands>,
}

#[derive(Subcommand)]
enum Commands {
    /// Print every context with its resolved load plan
    Plan {
        /// Emit JSON instead of YAML
        #[arg(long)]
        json: bool,
    },
    /// Verify that every configured location resolves, then exit
    Check,
}

fn main() -> Result<()> {
    let cli = Cli::parse();

    let args = CliArgs {
        verbose: cli.verbose,
    };

    // defaults -> YAML (if provided) -> env (BEANKIT__*) -> CLI overrides
    let mut config = AppConfig::load_or_default(cli.config.as_deref())?;
    config.apply_cli_overrides(&args);

    let logging_config = config.logging.clone().unwrap_or_default();
    beankit_bootstrap::init_logging(&logging_config, config.home_dir());

    tracing::info!(
        home_dir = %config.home_dir().display(),
        contexts = config.contexts.len(),
        "BeanKit starting"
    );

    if cli.print_config {
        println!("{}", config.to_yaml()?);
        return Ok(());
    }

    // Contexts are built unrefreshed: no definition reader is wired here
    let hierarchy = ContextHierarchy::build(
        &config,
        default_collaborators(&config),
        RefreshMode::Never,
    )?;

    let result = match cli.command.unwrap_or(Commands::Plan { json: false }) {
        Commands::Plan { json } => print_plan(&hierarchy.plan(), json),
        Commands::Check => check(&hierarchy),
    };

    hierarchy.close();
    result
}

fn print_plan(plans: &[ContextPlan], json: bool) -> Result<()> {
    let rendered = if json {
        serde_json::to_string_pretty(plans)?
    } else {
        serde_yaml::to_string(plans)?
    };
    println!("{rendered}");
    Ok(())
}

fn check(hierarchy: &ContextHierarchy) -> Result<()> {
    tracing::info!("Checking context sources…");
    let issues = hierarchy.check();
    if issues.is_empty() {
        println!(
            "Configuration is valid ({} contexts)",
            hierarchy.contexts().len()
        );
        return Ok(());
    }
    for issue in &issues {
        eprintln!("{issue}");
    }
    bail!("{} problem(s) found in context sources", issues.len())
}
