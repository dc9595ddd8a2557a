use std::path::PathBuf;

use clap::{Parser, Subcommand};

/// Gesture Canvas - draw with hand landmarks
#[derive(Parser, Debug)]
#[command(name = "gesture-canvas")]
#[command(author, version, about, long_about = None)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Commands,

    /// JSON config file
    #[arg(short, long, global = true)]
    pub config: Option<PathBuf>,
}

#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Replay recorded detector output and write the finished drawing as PNG
    Replay {
        /// Recording in JSON Lines format
        #[arg(short, long)]
        input: PathBuf,

        /// PNG to write
        #[arg(short, long)]
        output: PathBuf,

        /// Background image path or data URI
        #[arg(short, long)]
        background: Option<String>,

        /// Background opacity in percent (10-100)
        #[arg(long, default_value = "100")]
        opacity: u8,
    },

    /// Print the classified gesture and intent for every recorded frame
    Inspect {
        /// Recording in JSON Lines format
        #[arg(short, long)]
        input: PathBuf,
    },
}
