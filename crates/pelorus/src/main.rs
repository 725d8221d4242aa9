mod cli;

use std::path::{Path, PathBuf};
use std::process::ExitCode;

use clap::Parser;
use log::{error, info, warn};
use pelorus_core::PluginHost;
use pelorus_core::plugin_system::{CompatibilityPolicy, PluginPaths, SemanticVersion};
use pelorus_core::storage::HostConfig;

use crate::cli::{CliArgs, Command};

#[tokio::main]
async fn main() -> ExitCode {
    // A second logger (e.g. from a test harness) is not an error.
    let _ = env_logger::try_init();

    let args = CliArgs::parse();
    if args.ping {
        println!("pong");
        return ExitCode::SUCCESS;
    }

    match args.command.unwrap_or(Command::Scan { dirs: Vec::new(), config: None }) {
        Command::Scan { dirs, config } => scan(dirs, config.as_deref()).await,
        Command::Check { name, version } => check(&name, &version),
        Command::Paths => {
            cli::print_paths(&PluginPaths::from_env());
            ExitCode::SUCCESS
        }
    }
}

fn home_dir() -> PathBuf {
    std::env::var_os("HOME")
        .or_else(|| std::env::var_os("USERPROFILE"))
        .map(PathBuf::from)
        .unwrap_or_else(|| PathBuf::from("."))
}

async fn scan(dirs: Vec<PathBuf>, config_path: Option<&Path>) -> ExitCode {
    let config_path = config_path.map(Path::to_path_buf).unwrap_or_else(|| HostConfig::default_path(&home_dir()));
    let mut config = match HostConfig::load_or_default(&config_path) {
        Ok(config) => config,
        Err(e) => {
            eprintln!("Failed to read configuration {}: {}", config_path.display(), e);
            return ExitCode::FAILURE;
        }
    };
    if !dirs.is_empty() {
        config.plugin_dirs = dirs;
    }

    let mut host = PluginHost::new(config);
    for dir in host.registry().paths().libdirs() {
        info!("Search directory: {}", dir.display());
    }
    if let Err(e) = host.load_all_plugins(true).await {
        error!("Plugin scan aborted: {}", e);
        eprintln!("Plugin scan aborted: {}", e);
        return ExitCode::FAILURE;
    }

    cli::print_records(host.registry().records());
    cli::print_report(&host.show_deferred_messages());
    host.shutdown();
    ExitCode::SUCCESS
}

/// Same fallback as the loader: an unparsable version is matched as 0.0.0.
fn check(name: &str, version: &str) -> ExitCode {
    let version = SemanticVersion::parse(version).unwrap_or_else(|e| {
        warn!("Invalid version '{}' for '{}': {}", version, name, e);
        eprintln!("Invalid version '{}': {}; matching as {}", version, e, SemanticVersion::lowest());
        SemanticVersion::lowest()
    });
    let verdict = CompatibilityPolicy::builtin().evaluate(name, &version);
    println!("{} {}: {}", name, version, verdict);
    ExitCode::SUCCESS
}
