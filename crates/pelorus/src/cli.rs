use std::path::PathBuf;

use clap::{Parser, Subcommand};
use pelorus_core::plugin_system::{PluginPaths, PluginRecord, ScanReport};

/// Pelorus: plugin host for marine navigation software
#[derive(Parser, Debug)]
#[command(author, version, about, long_about = None)]
pub struct CliArgs {
    /// Print "pong" and exit
    #[arg(long)]
    pub ping: bool,

    #[command(subcommand)]
    pub command: Option<Command>,
}

#[derive(Subcommand, Debug)]
pub enum Command {
    /// Load every plugin found in the search directories and print the registry
    Scan {
        /// Directories to scan instead of the configured ones
        dirs: Vec<PathBuf>,
        /// Host configuration file (.toml, .yaml or .json)
        #[arg(long, short)]
        config: Option<PathBuf>,
    },
    /// Print the blacklist verdict for a plugin name and version
    Check {
        /// Plugin common or short name, e.g. radar_pi
        name: String,
        /// Plugin version, e.g. 0.94 or 1.2.3-beta
        version: String,
    },
    /// Print the plugin search directories
    Paths,
}

pub fn print_records<'a>(records: impl IntoIterator<Item = &'a PluginRecord>) {
    let mut any = false;
    for record in records {
        any = true;
        let state = if record.is_active() {
            "active"
        } else if record.is_enabled() {
            "enabled"
        } else {
            "disabled"
        };
        println!(
            "{:>4}  {:<24} {:<12} {:<10} {:<9} {}  [{}]",
            record.id().to_string(),
            record.common_name(),
            record.version().to_string(),
            record.status().to_string(),
            state,
            record.file().display(),
            record.capabilities()
        );
    }
    if !any {
        println!("No plugins loaded.");
    }
}

pub fn print_report(report: &ScanReport) {
    if report.is_empty() {
        return;
    }
    println!("{} problem(s) while loading plugins:", report.len());
    for entry in &report.entries {
        println!("  - {}", entry);
    }
}

pub fn print_paths(paths: &PluginPaths) {
    println!("user plugin directory: {}", paths.user_libdir().display());
    println!("search directories:");
    for dir in paths.libdirs() {
        let marker = if dir == paths.user_libdir() { " (user)" } else { "" };
        println!("  {}{}", dir.display(), marker);
    }
}
