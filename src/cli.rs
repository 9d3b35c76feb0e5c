use clap::{Parser, Subcommand};
use std::path::PathBuf;

#[derive(Parser, Debug)]
#[clap(version, about = "Front end and evaluator for the ΓΛΩΣΣΑ pseudocode language")]
pub struct Args {
    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Run a source file
    Run {
        /// Path to the source file
        file: PathBuf,

        /// File with one line per ΔΙΑΒΑΣΕ target; stdin when absent
        #[arg(long)]
        input: Option<PathBuf>,
    },

    /// Check a source file for syntax errors
    Check {
        /// Path to the source file to check
        file: PathBuf,
    },
}
