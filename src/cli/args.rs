//! cli::args
//!
//! Command-line argument definitions using clap derive.
//!
//! # Global Flags
//!
//! These flags are available on all commands:
//! - `--help` / `-h`: Show help
//! - `--version`: Show version
//! - `--config <path>`: Read configuration from this file
//! - `--debug`: Enable debug logging
//! - `--quiet` / `-q`: Minimal output
//! - `--json`: Machine-readable output

use clap::{Parser, Subcommand};
use std::path::PathBuf;

/// autocommitter - scheduled commits to GitHub through the Git Data API
#[derive(Parser, Debug)]
#[command(name = "autocommitter")]
#[command(author, version, about, long_about = None)]
pub struct Cli {
    /// Read configuration from this file instead of the default locations
    #[arg(long, global = true, value_name = "PATH")]
    pub config: Option<PathBuf>,

    /// Enable debug logging
    #[arg(long, global = true)]
    pub debug: bool,

    /// Minimal output
    #[arg(short, long, global = true, conflicts_with = "debug")]
    pub quiet: bool,

    /// Print results as JSON
    #[arg(long, global = true)]
    pub json: bool,

    #[command(subcommand)]
    pub command: Command,
}

impl Cli {
    /// Parse command-line arguments.
    pub fn parse_args() -> Self {
        Parser::parse()
    }
}

/// Available commands.
#[derive(Subcommand, Debug)]
pub enum Command {
    /// Publish one commit
    #[command(
        long_about = "Publish one commit.\n\n\
            Files come from --file, then from the config's [[files]] table. When \
            neither is given, a file is generated for the configured commit type.",
        after_help = "\
EXAMPLES:
    # Commit a local file as docs/status.md
    autocommitter publish --repo https://github.com/me/notes --file docs/status.md=./status.md

    # Commit generated README content to a feature branch
    autocommitter publish --branch feature --type readme"
    )]
    Publish {
        /// Repository URL (default: repo_url from config)
        #[arg(long)]
        repo: Option<String>,

        /// Target branch (default: branch from config, else main)
        #[arg(long, short)]
        branch: Option<String>,

        /// Commit message (default: message from config)
        #[arg(long, short)]
        message: Option<String>,

        /// File to commit, as REMOTE_PATH=LOCAL_FILE
        #[arg(long = "file", value_name = "REMOTE=LOCAL")]
        files: Vec<String>,

        /// Generated content type when no files are given
        #[arg(long = "type", value_name = "TYPE")]
        kind: Option<String>,
    },

    /// Check that the token is accepted and can push commits
    ValidateToken,

    /// Report whether a branch moved since a known commit
    Check {
        /// Repository URL (default: repo_url from config)
        #[arg(long)]
        repo: Option<String>,

        /// Branch to check (default: branch from config, else main)
        #[arg(long, short)]
        branch: Option<String>,

        /// Last commit sha seen
        #[arg(long, value_name = "SHA")]
        since: Option<String>,
    },

    /// Publish on a timer until interrupted
    #[command(after_help = "\
Press Ctrl-C to stop. A commit in flight is finished before exiting.")]
    Run {
        /// Run a single batch and exit
        #[arg(long, conflicts_with = "cycles")]
        once: bool,

        /// Stop after this many batches
        #[arg(long, value_name = "N")]
        cycles: Option<u64>,

        /// Override the interval between batches, in seconds
        #[arg(long, value_name = "SECS")]
        interval: Option<u64>,

        /// Override the generated content type
        #[arg(long = "type", value_name = "TYPE")]
        kind: Option<String>,
    },
}

#[cfg(test)]
mod tests {
    use super::*;
    use clap::CommandFactory;

    #[test]
    fn verify_cli() {
        Cli::command().debug_assert();
    }

    #[test]
    fn parse_publish() {
        let cli = Cli::try_parse_from([
            "autocommitter",
            "--json",
            "publish",
            "--repo",
            "https://github.com/o/r",
            "--file",
            "a.md=./a.md",
            "--file",
            "b.md=./b.md",
        ])
        .unwrap();
        assert!(cli.json);
        match cli.command {
            Command::Publish { repo, files, .. } => {
                assert_eq!(repo.as_deref(), Some("https://github.com/o/r"));
                assert_eq!(files.len(), 2);
            }
            other => panic!("unexpected command {:?}", other),
        }
    }

    #[test]
    fn global_flags_after_subcommand() {
        let cli = Cli::try_parse_from(["autocommitter", "validate-token", "--debug"]).unwrap();
        assert!(cli.debug);
        assert!(matches!(cli.command, Command::ValidateToken));
    }

    #[test]
    fn run_once_conflicts_with_cycles() {
        let result = Cli::try_parse_from(["autocommitter", "run", "--once", "--cycles", "2"]);
        assert!(result.is_err());
    }

    #[test]
    fn quiet_conflicts_with_debug() {
        let result = Cli::try_parse_from(["autocommitter", "-q", "--debug", "validate-token"]);
        assert!(result.is_err());
    }
}
