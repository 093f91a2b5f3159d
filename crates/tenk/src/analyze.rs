use std::fs;

use anyhow::{bail, Result};

use tenk_agents::{
    quick_summary, AnalysisPipeline, AnalysisRequest, KeywordParser, PipelineStatus,
};
use tenk_core::CancelToken;
use tenk_llm::LlmClient;
use tenk_rag::{EmbeddingClient, Retriever, VectorStore};

use crate::config::TenkConfig;
use crate::logging;

pub struct AnalyzeArgs {
    pub ticker: String,
    pub fiscal_year: i32,
    pub company: Option<String>,
    pub prior_year: Option<i32>,
    pub json: bool,
    pub output: Option<String>,
}

pub fn run(config: &TenkConfig, args: AnalyzeArgs, cancel: &CancelToken) -> Result<()> {
    let store = VectorStore::open(&config.index_path)?;
    if store.stats()?.count == 0 {
        bail!(
            "index {} is empty; run `tenk index` first",
            config.index_path.display()
        );
    }
    let embedder = EmbeddingClient::new(config.embedding.clone())?;
    let retriever = Retriever::new(store, embedder);
    let llm = LlmClient::new(config.llm.clone())?;
    let pipeline = AnalysisPipeline::new(
        retriever,
        Box::new(llm),
        Box::new(KeywordParser),
        config.temperature,
    );

    logging::stage(
        "analyze",
        format!("{} FY{}", args.ticker, args.fiscal_year),
    );
    let request = AnalysisRequest {
        ticker: args.ticker,
        fiscal_year: args.fiscal_year,
        company: args.company,
        prior_year: args.prior_year,
    };
    let report = pipeline.analyze(&request, cancel);

    let rendered = if args.json {
        serde_json::to_string_pretty(&report)?
    } else {
        quick_summary(&report)
    };
    println!("{rendered}");
    if let Some(path) = &args.output {
        fs::write(path, &rendered)?;
        logging::stage("analyze", format!("report written to {path}"));
    }
    if let PipelineStatus::Failed { stage, error } = &report.status {
        bail!("analysis failed at {} stage: {error}", stage.as_str());
    }
    Ok(())
}
