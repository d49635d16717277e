/// Command line interface of the `keystone` binary
///
/// ```text
/// keystone serve [--host H] [--port P] [--workers N]
/// keystone migrate up
/// keystone migrate down [--target VERSION]
/// keystone migrate status
/// ```

use clap::{Args, Parser, Subcommand};

#[derive(Debug, Parser)]
#[command(name = "keystone")]
#[command(version, about = "Keystone authentication and workspace server", long_about = None)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Command,
}

#[derive(Debug, Subcommand)]
pub enum Command {
    /// Run the HTTP server
    Serve(ServeArgs),

    /// Manage the database schema
    #[command(subcommand)]
    Migrate(MigrateCommand),
}

/// Overrides for the configured bind address and runtime size
#[derive(Debug, Clone, Default, Args)]
pub struct ServeArgs {
    /// Interface to bind (defaults to API_HOST)
    #[arg(long)]
    pub host: Option<String>,

    /// Port to bind (defaults to API_PORT)
    #[arg(long)]
    pub port: Option<u16>,

    /// Tokio worker threads (defaults to the number of CPUs)
    #[arg(long, value_parser = clap::value_parser!(u16).range(1..))]
    pub workers: Option<u16>,
}

#[derive(Debug, Clone, Copy, Subcommand)]
pub enum MigrateCommand {
    /// Apply every pending migration
    Up,

    /// Revert migrations newer than the target version
    Down {
        /// Version to keep; 0 reverts everything
        #[arg(long, default_value_t = 0)]
        target: i64,
    },

    /// Show applied and pending migrations
    Status,
}

impl Cli {
    /// Tokio worker threads requested on the command line
    pub fn workers(&self) -> Option<usize> {
        match &self.command {
            Command::Serve(args) => args.workers.map(usize::from),
            Command::Migrate(_) => None,
        }
    }
}
