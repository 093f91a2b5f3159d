use clap::{ArgAction, Parser, Subcommand};

#[derive(Parser, Debug)]
#[command(name = "tenk", about = "SEC 10-K filing indexing and analysis CLI")]
pub struct Cli {
    #[arg(long, global = true, action = ArgAction::SetTrue)]
    pub verbose: bool,
    #[command(subcommand)]
    pub command: Command,
}

#[derive(Subcommand, Debug)]
pub enum Command {
    /// Chunk a filing, persist it, and index its embeddings.
    Index {
        /// Filing JSON: ticker, fiscal_year, and text or a section map.
        filing: String,
        #[arg(long)]
        chunk_size: Option<usize>,
        #[arg(long)]
        overlap: Option<usize>,
    },
    /// Run the four-stage analysis pipeline against the index.
    Analyze {
        ticker: String,
        #[arg(long)]
        fiscal_year: i32,
        #[arg(long)]
        company: Option<String>,
        #[arg(long)]
        prior_year: Option<i32>,
        /// Emit the full report as JSON instead of the markdown digest.
        #[arg(long, default_value_t = false)]
        json: bool,
        /// Write the output to a file as well as stdout.
        #[arg(long)]
        output: Option<String>,
    },
    /// Remove every indexed record for a document.
    Delete { doc_id: String },
    /// Show index record count and dimension.
    Stats,
}
