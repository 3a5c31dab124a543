use clap::{ArgAction, Parser, Subcommand};
use std::path::PathBuf;

/// lexroute: run the Lex fulfillment router locally.
/// Reads `Lexroute.toml` from the current directory or any parent unless --config is given.
#[derive(Parser, Debug)]
#[command(author, version, about, long_about = None)]
#[command(propagate_version = true)]
pub struct Cli {
    /// Increase message verbosity.
    ///
    /// Specify multiple times for more verbose output:
    ///  -v:  INFO level
    ///  -vv: DEBUG level
    ///  -vvv: TRACE level (most verbose)
    #[arg(short, long, action = ArgAction::Count, global = true)]
    pub verbose: u8,

    /// Path to a config file (skips the upward search for Lexroute.toml).
    #[arg(short, long, global = true)]
    pub config: Option<PathBuf>,

    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Run a Lex V2 event JSON file through the router and print the Lex reply.
    Invoke {
        /// Event file; `-` reads from stdin.
        #[arg(short, long)]
        event: PathBuf,
    },
    /// Send a single utterance as if Lex had matched `--intent`.
    Ask {
        /// Intent name Lex would have matched (default: FallbackIntent).
        #[arg(short, long)]
        intent: Option<String>,
        /// Session id; a random one is generated when omitted.
        #[arg(short, long)]
        session: Option<String>,
        /// What the user said; may be omitted when --intent is given.
        utterance: Vec<String>,
    },
    /// Validate the configuration and print the intent table.
    Check,
}
