//! modhost - load, inspect and check component catalogs.
//!
//! Usage:
//!   modhost load <DIR> <NAME>...   Load components and show the result
//!   modhost list <DIR>             List the components a directory declares
//!   modhost check <DIR>            Try to load every declared component
//!   modhost --help                 Show help

use std::path::{Path, PathBuf};

use clap::{Parser, Subcommand, ValueEnum};
use color_eyre::eyre::{Context, Result, bail};
use itertools::Itertools;
use serde::Serialize;
use tracing_subscriber::EnvFilter;

use modhost_core::{LoadedComponent, Version};
use modhost_runtime::{DescriptorSource, HostConfig, ManifestCatalog, Registry, RegistryError};

#[derive(Parser)]
#[command(
    name = "modhost",
    version,
    about = "Component lifecycle host",
    long_about = "modhost loads named components from a manifest directory, resolving \
                  their dependencies, wiring their public APIs and applying hotswaps."
)]
struct Cli {
    /// Log lifecycle steps (overrides MODHOST_LOG)
    #[arg(short, long, global = true)]
    verbose: bool,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Load components and show the resulting registry
    Load {
        /// Manifest directory
        dir: PathBuf,

        /// Components to load, in order
        #[arg(required = true)]
        names: Vec<String>,

        /// Host configuration file (defaults to the user config directory)
        #[arg(long)]
        host: Option<PathBuf>,

        /// Output format
        #[arg(short, long, default_value = "text")]
        format: OutputFormat,
    },

    /// List declared components and their dependencies
    List {
        /// Manifest directory
        dir: PathBuf,
    },

    /// Load every declared component in a fresh registry and report failures
    Check {
        /// Manifest directory
        dir: PathBuf,

        /// Host configuration file (defaults to the user config directory)
        #[arg(long)]
        host: Option<PathBuf>,
    },
}

#[derive(Debug, Clone, Copy, ValueEnum, Default)]
enum OutputFormat {
    #[default]
    Text,
    Json,
}

/// Summary of one loaded component.
#[derive(Debug, Serialize)]
struct ComponentReport {
    name: String,
    slot: String,
    version: Option<Version>,
    requires: Vec<String>,
    imports: Vec<String>,
    replaced: bool,
}

/// Result of a `load` run.
#[derive(Debug, Serialize)]
struct LoadReport {
    loaded_count: usize,
    components: Vec<ComponentReport>,
    failures: Vec<FailureReport>,
}

#[derive(Debug, Serialize)]
struct FailureReport {
    name: String,
    kind: String,
    message: String,
}

impl FailureReport {
    fn new(name: &str, error: &RegistryError) -> Self {
        Self {
            name: name.to_string(),
            kind: error.root_cause().kind().to_string(),
            message: error_chain(error),
        }
    }
}

fn main() -> Result<()> {
    color_eyre::install()?;

    let cli = Cli::parse();
    init_logging(cli.verbose);

    match cli.command {
        Command::Load {
            dir,
            names,
            host,
            format,
        } => run_load(&dir, &names, host.as_deref(), format),
        Command::List { dir } => run_list(&dir),
        Command::Check { dir, host } => run_check(&dir, host.as_deref()),
    }
}

/// Install the stderr log subscriber.
fn init_logging(verbose: bool) {
    let filter = if verbose {
        EnvFilter::new("modhost=debug")
    } else {
        EnvFilter::try_from_env("MODHOST_LOG").unwrap_or_else(|_| EnvFilter::new("warn"))
    };

    // A subscriber may already be set when embedded; keep it.
    let _ = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .try_init();
}

fn read_catalog(dir: &Path) -> Result<ManifestCatalog> {
    ManifestCatalog::from_dir(dir)
        .with_context(|| format!("Failed to read manifests from {}", dir.display()))
}

fn read_host(path: Option<&Path>) -> Result<HostConfig> {
    match path {
        Some(path) => HostConfig::load_from(path)
            .with_context(|| format!("Failed to read host configuration {}", path.display())),
        None => HostConfig::discover().context("Failed to read host configuration"),
    }
}

/// Load the requested components and print the registry.
fn run_load(dir: &Path, names: &[String], host: Option<&Path>, format: OutputFormat) -> Result<()> {
    let catalog = read_catalog(dir)?;
    let host = read_host(host)?;
    let mut registry = Registry::new(catalog, host);

    let failures: Vec<FailureReport> = names
        .iter()
        .filter_map(|name| {
            registry
                .load(name)
                .err()
                .map(|error| FailureReport::new(name, &error))
        })
        .collect();

    let report = LoadReport {
        loaded_count: registry.loaded_count(),
        components: registry
            .components()
            .map(|component| component_report(&registry, component))
            .collect(),
        failures,
    };

    match format {
        OutputFormat::Text => print_load_report(&report),
        OutputFormat::Json => println!("{}", serde_json::to_string_pretty(&report)?),
    }

    registry.shutdown();

    if !report.failures.is_empty() {
        bail!("{} component(s) failed to load", report.failures.len());
    }
    Ok(())
}

fn component_report(registry: &Registry, component: &LoadedComponent) -> ComponentReport {
    ComponentReport {
        name: component.origin().to_string(),
        slot: component.name().to_string(),
        version: registry.get_version(component.origin()),
        requires: component.required().keys().cloned().collect(),
        imports: component.imported().to_vec(),
        replaced: component.is_replaced(),
    }
}

fn print_load_report(report: &LoadReport) {
    println!();
    println!("{}", "─".repeat(60));
    println!(" Loaded {} component(s)", report.loaded_count);
    println!("{}", "─".repeat(60));
    println!();

    for (i, component) in report.components.iter().enumerate() {
        let version = component
            .version
            .map(|version| version.to_string())
            .unwrap_or_else(|| "-".to_string());
        let slot = if component.replaced {
            format!(" (as {})", component.slot)
        } else {
            String::new()
        };

        println!(" {:>3}. {:<32} {:>10}{}", i + 1, component.name, version, slot);
        if !component.requires.is_empty() {
            println!("        requires: {}", component.requires.iter().join(", "));
        }
        if !component.imports.is_empty() {
            println!("        imports:  {}", component.imports.iter().join(", "));
        }
    }

    if !report.failures.is_empty() {
        println!();
        println!(" {} failure(s):", report.failures.len());
        for failure in &report.failures {
            println!("   {} [{}]: {}", failure.name, failure.kind, failure.message);
        }
    }
    println!();
}

/// List the catalog.
fn run_list(dir: &Path) -> Result<()> {
    let catalog = read_catalog(dir)?;

    if catalog.is_empty() {
        println!("No components found in {}", dir.display());
        return Ok(());
    }

    for (name, manifest) in catalog.manifests() {
        println!("{name}");
        if !manifest.requires.is_empty() {
            println!("  requires: {}", manifest.requires.iter().join(", "));
        }
        if !manifest.wants.is_empty() {
            println!("  wants:    {}", manifest.wants.iter().join(", "));
        }
        if !manifest.imports.is_empty() {
            println!("  imports:  {}", manifest.imports.iter().join(", "));
        }
        if let Some(target) = &manifest.replaces {
            println!("  replaces: {target}");
        }
    }

    Ok(())
}

/// Load each catalog component in isolation.
fn run_check(dir: &Path, host: Option<&Path>) -> Result<()> {
    let catalog = read_catalog(dir)?;
    let host = read_host(host)?;

    let failures: Vec<FailureReport> = catalog
        .names()
        .iter()
        .filter_map(|name| {
            let mut registry = Registry::new(catalog.clone(), host.clone());
            registry
                .load(name)
                .err()
                .map(|error| FailureReport::new(name, &error))
        })
        .collect();

    let total = catalog.len();
    if failures.is_empty() {
        println!("All {total} component(s) load cleanly");
        return Ok(());
    }

    let by_kind = failures
        .iter()
        .into_group_map_by(|failure| failure.kind.clone());
    for (kind, group) in by_kind.iter().sorted_by(|(a, _), (b, _)| a.cmp(b)) {
        println!("{kind} ({})", group.len());
        for failure in group {
            println!("  {}: {}", failure.name, failure.message);
        }
    }

    bail!("{} of {total} component(s) failed to load", failures.len());
}

/// Render an error and its dependency chain on one line.
fn error_chain(error: &RegistryError) -> String {
    let mut parts = vec![error.to_string()];
    let mut current: &dyn std::error::Error = error;
    while let Some(source) = current.source() {
        parts.push(source.to_string());
        current = source;
    }
    parts.join(": ")
}
