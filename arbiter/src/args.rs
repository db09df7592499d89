use std::path::PathBuf;

use arbiter_config::Mode;
use clap::{Parser, Subcommand};

/// Arbiter answer router
#[derive(Debug, Parser)]
#[command(name = "arbiter", about = "Quality-gated answers with local-to-remote fallback")]
pub struct Args {
    /// Path to configuration file
    #[arg(short, long, default_value = "arbiter.toml", env = "ARBITER_CONFIG")]
    pub config: PathBuf,

    #[command(subcommand)]
    pub command: Command,
}

#[derive(Debug, Subcommand)]
pub enum Command {
    /// Answer one question and exit
    Ask {
        question: String,

        /// Earlier conversation line, oldest first; repeatable
        #[arg(long = "context")]
        context: Vec<String>,

        /// Override the configured mode
        #[arg(long, env = "ARBITER_MODE")]
        mode: Option<Mode>,

        /// Print the score breakdown after the answer
        #[arg(long)]
        score: bool,
    },

    /// Read questions from stdin, one per line
    Repl {
        /// Override the configured mode
        #[arg(long, env = "ARBITER_MODE")]
        mode: Option<Mode>,
    },
}
