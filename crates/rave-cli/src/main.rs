//! Command-line interface for inspecting Rave plugins.

use std::path::{Path, PathBuf};
use std::process::ExitCode;

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use rave_core::config::env_vars;
use rave_core::{InterfaceMap, InterfaceType, PluginDatabase, PluginDbConfig};

/// Rave plugin inspector - list, probe and locate native plugins.
#[derive(Parser, Debug)]
#[command(name = "rave-plugins")]
#[command(author, version, about, long_about = None)]
struct Args {
    /// Action to perform.
    #[command(subcommand)]
    command: Command,

    /// TOML configuration file.
    #[arg(short, long, global = true)]
    config: Option<PathBuf>,

    /// Extra search directory (repeatable).
    #[arg(short, long = "dir", global = true)]
    dirs: Vec<PathBuf>,

    /// Descend into subdirectories of search paths.
    #[arg(short, long, global = true)]
    recurse: bool,

    /// Verbose output.
    #[arg(short, long, global = true)]
    verbose: bool,
}

/// Available commands.
#[derive(Subcommand, Debug)]
enum Command {
    /// List discovered plugins.
    List {
        /// Print as JSON.
        #[arg(long)]
        json: bool,
    },
    /// List loaded interface names grouped by type.
    Interfaces {
        /// Only show this interface type.
        #[arg(short = 't', long = "type")]
        interface_type: Option<String>,
    },
    /// Try to load a single file as a plugin.
    Probe {
        /// Path to the shared library.
        #[arg(required = true)]
        path: PathBuf,
    },
    /// Print the effective search paths.
    Paths,
}

fn main() -> Result<ExitCode> {
    let args = Args::parse();
    init_logging(args.verbose);

    let config = load_config(&args)?;
    match args.command {
        Command::List { json } => list_plugins(config.as_ref(), json),
        Command::Interfaces { interface_type } => {
            list_interfaces(config.as_ref(), interface_type.as_deref())
        }
        Command::Probe { path } => Ok(probe(&path)),
        Command::Paths => print_paths(config.as_ref()),
    }
}

fn init_logging(verbose: bool) {
    let json_logging = std::env::var("RAVE_LOG_JSON")
        .ok()
        .and_then(|v| v.parse().ok())
        .unwrap_or(false);

    let env_filter = tracing_subscriber::EnvFilter::try_from_default_env().unwrap_or_else(|_| {
        let level = if verbose { "debug" } else { "info" };
        tracing_subscriber::EnvFilter::new(format!("rave={}", level))
            .add_directive(tracing::Level::WARN.into())
    });

    if json_logging {
        tracing_subscriber::fmt()
            .json()
            .with_env_filter(env_filter)
            .with_target(true)
            .with_writer(std::io::stderr)
            .init();
    } else {
        tracing_subscriber::fmt()
            .with_env_filter(env_filter)
            .with_target(false)
            .with_writer(std::io::stderr)
            .compact()
            .init();
    }
}

/// Configuration from `--config`/`--dir`, else from the environment.
///
/// `None` means no source was given and `RAVE_PLUGINS` is unset.
fn load_config(args: &Args) -> Result<Option<PluginDbConfig>> {
    let base = match &args.config {
        Some(path) => Some(
            PluginDbConfig::from_file(path)
                .with_context(|| format!("Failed to read config {}", path.display()))?,
        ),
        None if !args.dirs.is_empty() => Some(PluginDbConfig::default()),
        None => PluginDbConfig::from_env(),
    };

    Ok(base.map(|mut config| {
        config.search_paths.extend(args.dirs.iter().cloned());
        if args.recurse {
            config.recurse = true;
        }
        config
    }))
}

fn open_database(config: Option<&PluginDbConfig>) -> PluginDatabase {
    let db = PluginDatabase::new();
    match config {
        Some(config) => db.init_with_config(config),
        None => db.init(),
    };
    db
}

fn list_plugins(config: Option<&PluginDbConfig>, json: bool) -> Result<ExitCode> {
    let db = open_database(config);
    let plugins = db.plugin_info();

    if json {
        println!("{}", serde_json::to_string_pretty(&plugins)?);
        return Ok(ExitCode::SUCCESS);
    }

    if plugins.is_empty() {
        println!("No plugins found");
        return Ok(ExitCode::SUCCESS);
    }

    for plugin in &plugins {
        let location = plugin
            .path
            .as_deref()
            .map(|p| p.display().to_string())
            .unwrap_or_else(|| "<in-process>".to_string());
        println!("{} {} ({})", plugin.name, plugin.version, location);
        print_interfaces(&plugin.interfaces, None, "  ");
    }
    Ok(ExitCode::SUCCESS)
}

fn list_interfaces(config: Option<&PluginDbConfig>, filter: Option<&str>) -> Result<ExitCode> {
    let filter = filter
        .map(|t| t.parse::<InterfaceType>())
        .transpose()
        .context("Invalid --type")?;

    let db = open_database(config);
    print_interfaces(&db.loaded_interfaces(), filter, "");
    Ok(ExitCode::SUCCESS)
}

fn print_interfaces(interfaces: &InterfaceMap, filter: Option<InterfaceType>, indent: &str) {
    for (interface_type, names) in interfaces {
        if filter.is_some_and(|f| f != *interface_type) {
            continue;
        }
        println!("{}{}: {}", indent, interface_type, names.join(", "));
    }
}

fn probe(path: &Path) -> ExitCode {
    let db = PluginDatabase::new();
    match db.load_plugin_file(path) {
        Ok(plugin) => {
            println!("{}: plugin {} {}", path.display(), plugin.name(), plugin.version());
            print_interfaces(plugin.interfaces(), None, "  ");
            ExitCode::SUCCESS
        }
        Err(e) if e.is_not_a_plugin() => {
            eprintln!("{}: not a plugin: {}", path.display(), e);
            ExitCode::FAILURE
        }
        Err(e) => {
            eprintln!("{}: {}", path.display(), e);
            ExitCode::FAILURE
        }
    }
}

fn print_paths(config: Option<&PluginDbConfig>) -> Result<ExitCode> {
    let Some(config) = config else {
        eprintln!("{} is not set and no --config or --dir was given", env_vars::PLUGINS);
        return Ok(ExitCode::SUCCESS);
    };

    for path in config.effective_search_paths() {
        println!("{}", path.display());
    }
    Ok(ExitCode::SUCCESS)
}
