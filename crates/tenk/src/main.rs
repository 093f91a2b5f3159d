mod analyze;
mod cli;
mod config;
mod index;
mod logging;
mod maintain;

use anyhow::Result;
use clap::Parser;

use tenk_core::CancelToken;

use crate::analyze::AnalyzeArgs;
use crate::cli::{Cli, Command};
use crate::config::TenkConfig;

fn main() -> Result<()> {
    let cli = Cli::parse();
    let verbose = if cli.verbose {
        true
    } else {
        logging::env_flag()
    };
    logging::init(verbose);
    let mut config = TenkConfig::from_env()?;
    let cancel = CancelToken::new();
    match cli.command {
        Command::Index {
            filing,
            chunk_size,
            overlap,
        } => {
            if let Some(chunk_size) = chunk_size {
                config.chunker.chunk_size = chunk_size;
            }
            if let Some(overlap) = overlap {
                config.chunker.overlap = overlap;
            }
            index::run(&config, &filing, &cancel)
        }
        Command::Analyze {
            ticker,
            fiscal_year,
            company,
            prior_year,
            json,
            output,
        } => analyze::run(
            &config,
            AnalyzeArgs {
                ticker,
                fiscal_year,
                company,
                prior_year,
                json,
                output,
            },
            &cancel,
        ),
        Command::Delete { doc_id } => maintain::delete(&config, &doc_id),
        Command::Stats => maintain::stats(&config),
    }
}
