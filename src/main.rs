mod catalog;
mod config;
mod constants;
mod db;
mod diff;
mod fixup;
mod mapping;
mod render;
mod report;

use anyhow::Result;
use clap::{Parser, Subcommand};
use std::collections::BTreeSet;
use tracing::info;
use tracing_subscriber::{EnvFilter, fmt};

use crate::constants::{CONFIG_FILENAME, DEFAULT_CONVERTER_TIMEOUT};
use crate::db::{CliDdlFetcher, CliRunner};
use crate::fixup::Synthesizer;
use crate::mapping::RemapRules;

#[derive(Parser)]
#[command(author, version, about, long_about = None)]
struct Cli {
    #[arg(long, default_value = CONFIG_FILENAME, global = true)]
    config_file: String,

    /// Enable verbose output (info level)
    #[arg(long, short = 'v', global = true)]
    verbose: bool,

    /// Suppress all non-essential output (error level only)
    #[arg(long, short = 'q', global = true)]
    quiet: bool,

    /// Enable debug output (debug level)
    #[arg(long, global = true)]
    debug: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Compare the source and target catalogs and synthesize fixup scripts
    Check {
        /// Report only, skip fixup script generation even when configured
        #[arg(long)]
        no_fixup: bool,
    },

    /// Load and validate the configuration, then print the resolved settings
    Validate,
}

fn main() -> Result<()> {
    let cli = Cli::parse();
    initialize_logging(&cli);
    run_main(cli)
}

fn initialize_logging(cli: &Cli) {
    let level = if cli.debug {
        "debug"
    } else if cli.verbose {
        "info"
    } else if cli.quiet {
        "error"
    } else {
        "warn" // default level
    };

    let filter = if std::env::var("RUST_LOG").is_ok() {
        EnvFilter::from_default_env()
    } else {
        EnvFilter::new(level)
    };

    fmt().with_env_filter(filter).with_target(false).init();
}

fn run_main(cli: Cli) -> Result<()> {
    match &cli.command {
        Commands::Validate => {
            let config = config::load_config(&cli.config_file)?;
            println!("configuration {} is valid", cli.config_file);
            println!("  source:     {}@{}:{}", config.source.user, config.source.host, config.source.port);
            println!("  target:     {}@{}:{}", config.target.user, config.target.host, config.target.port);
            println!("  schemas:    {}", config.schemas.join(", "));
            println!("  remap file: {}", config.remap_file);
            println!("  fixup dir:  {}", config.fixup_dir);
            println!("  report dir: {}", config.report_dir);
            println!(
                "  length window: x{} .. x{}",
                config.length_check.min_multiplier, config.length_check.max_multiplier
            );
            Ok(())
        }
        Commands::Check { no_fixup } => cmd_check(&cli.config_file, *no_fixup),
    }
}

fn cmd_check(config_file: &str, no_fixup: bool) -> Result<()> {
    let config = config::load_config(config_file)?;
    let schema_set: BTreeSet<String> = config.schemas.iter().cloned().collect();

    info!("loading the source catalog");
    let source_runner = CliRunner::new(config.source.clone(), config.client_timeout);
    let source = db::load_snapshot(&source_runner, &schema_set)?;

    let rules = RemapRules::load(&config.remap_file);
    let mut object_mapping = mapping::ObjectMapping::build(&source, &rules);
    let check_list = mapping::master_check_list(&source, &rules)?;
    let schema_mapping = mapping::build_schema_mapping(&check_list);

    // The target side is inspected under the mapped schema names, plus the
    // configured ones for anything that stays in place.
    let mut target_schemas = object_mapping.target_schemas();
    target_schemas.extend(schema_set.iter().cloned());

    info!("loading the target catalog");
    let target_runner = CliRunner::new(config.target.clone(), config.client_timeout);
    let target = db::load_snapshot(&target_runner, &target_schemas)?;

    let outcome = diff::run_comparison(
        &source,
        &target,
        &check_list,
        &rules,
        &mut object_mapping,
        &config.schemas,
        &schema_mapping,
        &config.length_check,
    );

    let fixup_summary = if config.generate_fixup && !no_fixup && !outcome.is_clean() {
        info!("synthesizing fixup scripts under {}", config.fixup_dir);
        let mut fetcher = CliDdlFetcher::new(
            config.ddl.clone(),
            config.source.clone(),
            DEFAULT_CONVERTER_TIMEOUT,
        );
        let summary = Synthesizer::new(
            &config.fixup_dir,
            &source,
            &target,
            &object_mapping,
            &check_list,
            &outcome,
        )
        .generate(&mut fetcher)?;
        Some(summary)
    } else {
        None
    };

    report::emit(&outcome, fixup_summary.as_ref(), &config.report_dir)?;

    if !outcome.is_clean() {
        std::process::exit(1);
    }
    Ok(())
}
