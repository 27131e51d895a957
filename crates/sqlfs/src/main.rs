//! sqlfs binary.
//!
//! Usage:
//!   sqlfs init                          # create fs.sql in the current directory
//!   sqlfs -u postgres://fs@db/fs init
//!   sqlfs verify
//!   sqlfs mount /mnt/sqlfs
//!   sqlfs -c sqlfs.toml mount /mnt/sqlfs --allow-other

use anyhow::Result;
use clap::{Parser, Subcommand};
use std::path::PathBuf;
use tracing_subscriber::{EnvFilter, fmt, layer::SubscriberExt, util::SubscriberInitExt};

use sqlfs::commands;
use sqlfs::config::Config;

/// Filesystem stored in a relational database.
#[derive(Parser, Debug)]
#[command(name = "sqlfs", version)]
#[command(about = "Mount a filesystem stored in SQLite, MySQL or PostgreSQL")]
struct Cli {
    /// Connection target, backend://dsn (sqlite, mysql, postgres) [default: sqlite://fs.sql]
    #[arg(short, long, global = true, env = "SQLFS_URI")]
    uri: Option<String>,

    /// TOML config file
    #[arg(short, long, global = true)]
    config: Option<PathBuf>,

    /// Log at debug level (RUST_LOG overrides)
    #[arg(short, long, global = true)]
    verbose: bool,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Create the schema and the root directory
    Init,
    /// Check that the store is initialized
    Verify,
    /// Verify, then serve the filesystem until unmounted
    Mount {
        /// Directory to mount on
        mountpoint: PathBuf,

        /// Allow other users to access the mount
        #[arg(long)]
        allow_other: bool,

        /// Keep the mount after the process exits
        #[arg(long)]
        no_auto_unmount: bool,
    },
}

async fn run(cli: Cli) -> Result<()> {
    let mut config = Config::load_or_default(cli.config.as_deref())?;
    let target = config.target(cli.uri.as_deref())?;

    match cli.command {
        Command::Init => commands::initialize(&target, &config.pool).await,
        Command::Verify => commands::verify(&target, &config.pool).await,
        Command::Mount {
            mountpoint,
            allow_other,
            no_auto_unmount,
        } => {
            config.mount.allow_other |= allow_other;
            if no_auto_unmount {
                config.mount.auto_unmount = false;
            }
            commands::mount(&target, &config.pool, &mountpoint, &config.mount).await
        }
    }
}

#[tokio::main]
async fn main() {
    let cli = Cli::parse();

    let level = if cli.verbose { "debug" } else { "info" };
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(level));
    tracing_subscriber::registry()
        .with(filter)
        .with(fmt::layer().with_writer(std::io::stderr))
        .init();

    if let Err(e) = run(cli).await {
        tracing::error!("{e:#}");
        std::process::exit(1);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use clap::CommandFactory;

    #[test]
    fn test_cli_definition() {
        Cli::command().debug_assert();
    }

    #[test]
    fn test_parse_mount() {
        let cli = Cli::try_parse_from([
            "sqlfs",
            "mount",
            "/mnt/fs",
            "--allow-other",
            "-u",
            "mysql://fs@db/fs",
        ])
        .unwrap();
        assert_eq!(cli.uri.as_deref(), Some("mysql://fs@db/fs"));
        match cli.command {
            Command::Mount {
                mountpoint,
                allow_other,
                no_auto_unmount,
            } => {
                assert_eq!(mountpoint, PathBuf::from("/mnt/fs"));
                assert!(allow_other);
                assert!(!no_auto_unmount);
            }
            other => panic!("unexpected command {other:?}"),
        }
    }
}
