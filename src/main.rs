// src/main.rs
//! Smelter - CLI entry point

use anyhow::Result;
use clap::{CommandFactory, Parser, Subcommand};
use clap_complete::{generate, Shell};
use smelter::{ColorMode, Config};
use std::io::{self, IsTerminal};

mod commands;

// =============================================================================
// CLI Definitions
// =============================================================================

#[derive(Parser)]
#[command(name = "smelter")]
#[command(version)]
#[command(about = "Source-based package manager: fetch, build, package, install", long_about = None)]
struct Cli {
    #[command(subcommand)]
    command: Option<Commands>,
}

#[derive(Subcommand)]
enum Commands {
    /// Fast-forward pull the recipe repository from its upstream
    Sync,

    /// Search recipes by regular expression
    Search {
        /// Pattern matched against repo-relative recipe paths
        pattern: String,
    },

    /// Show the evaluated recipe record for targets
    Info {
        /// Recipe targets (path, repo-relative path, or unique suffix)
        targets: Vec<String>,
    },

    /// Download sources into the cache without building
    Fetch {
        targets: Vec<String>,
    },

    /// Extract and patch sources into the build workspace
    Unpack {
        targets: Vec<String>,
    },

    /// Build targets into their staging trees
    Build {
        targets: Vec<String>,
    },

    /// Build and install targets, without dependency expansion
    Install {
        targets: Vec<String>,
    },

    /// Install targets and their dependency closure in dependency order
    InstallDeps {
        targets: Vec<String>,
    },

    /// Build targets and create package archives
    Package {
        targets: Vec<String>,
    },

    /// Remove an installed package
    Remove {
        /// `name` or `name@version`
        package: String,
    },

    /// List installed packages nothing in the repository depends on
    Orphans,

    /// Scan for broken shared-library links and rebuild if any are found
    Revdep,

    /// Rebuild and reinstall every recipe in the repository
    World,

    /// Upgrade installed packages to the newest repository versions
    Upgrade,

    /// Scaffold a toolchain recipe directory
    MkToolchain {
        /// Category/package path, e.g. `base/gcc`
        package: String,
        version: String,
    },

    /// Generate shell completions
    Completions {
        #[arg(value_enum)]
        shell: Shell,
    },
}

// =============================================================================
// Main Entry Point
// =============================================================================

fn main() -> Result<()> {
    let config = Config::from_env();

    let ansi = match config.color {
        ColorMode::Always => true,
        ColorMode::Never => false,
        ColorMode::Auto => io::stderr().is_terminal(),
    };
    tracing_subscriber::fmt()
        .with_ansi(ansi)
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info")),
        )
        .init();

    let cli = Cli::parse();

    match cli.command {
        Some(Commands::Sync) => commands::cmd_sync(&config),

        Some(Commands::Search { pattern }) => commands::cmd_search(&config, &pattern),

        Some(Commands::Info { targets }) => commands::cmd_info(&config, &targets),

        Some(Commands::Fetch { targets }) => commands::cmd_fetch(&config, &targets),

        Some(Commands::Unpack { targets }) => commands::cmd_unpack(&config, &targets),

        Some(Commands::Build { targets }) => commands::cmd_build(&config, &targets),

        Some(Commands::Install { targets }) => commands::cmd_install(&config, &targets),

        Some(Commands::InstallDeps { targets }) => commands::cmd_install_deps(&config, &targets),

        Some(Commands::Package { targets }) => commands::cmd_package(&config, &targets),

        Some(Commands::Remove { package }) => commands::cmd_remove(&config, &package),

        Some(Commands::Orphans) => commands::cmd_orphans(&config),

        Some(Commands::Revdep) => commands::cmd_revdep(&config),

        Some(Commands::World) => commands::cmd_world(&config),

        Some(Commands::Upgrade) => commands::cmd_upgrade(&config),

        Some(Commands::MkToolchain { package, version }) => {
            commands::cmd_mk_toolchain(&config, &package, &version)
        }

        Some(Commands::Completions { shell }) => {
            let mut cmd = Cli::command();
            generate(shell, &mut cmd, "smelter", &mut io::stdout());
            Ok(())
        }

        None => {
            println!("Smelter v{}", env!("CARGO_PKG_VERSION"));
            println!("Run 'smelter --help' for usage information");
            Ok(())
        }
    }
}
