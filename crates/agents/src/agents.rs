//! The four analysis stages. Each stage retrieves its own context, makes one
//! generation call, and parses the response into a structured result.

use std::thread;

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use tracing::info;

use tenk_core::{Result, TenkError};
use tenk_llm::{GenerationRequest, LlmClient};
use tenk_rag::Retriever;

use crate::metrics::{derive_metrics, format_metrics, parse_metrics};
use crate::parse::{DecisionComponents, OutputParser, SwotComponents};
use crate::prompts;

/// Blocking text generation, one implementation per backend.
pub trait Generate {
    fn generate(&self, req: &GenerationRequest) -> Result<String>;
}

impl Generate for LlmClient {
    fn generate(&self, req: &GenerationRequest) -> Result<String> {
        self.generate_blocking(req)
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SummaryResult {
    pub ticker: String,
    pub fiscal_year: i32,
    pub company: String,
    pub summary: String,
    pub sections_analyzed: Vec<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SwotResult {
    pub ticker: String,
    pub fiscal_year: i32,
    pub company: String,
    pub swot_analysis: String,
    pub components: SwotComponents,
    pub sections_analyzed: Vec<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MetricsResult {
    pub ticker: String,
    pub fiscal_year: i32,
    pub prior_year: i32,
    pub company: String,
    pub metrics: Map<String, Value>,
    pub raw_response: String,
    pub sections_analyzed: Vec<String>,
}

/// The upstream stage results a decision was synthesized from, carried with
/// it so a decision keeps its provenance outside the full report.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DecisionInputs {
    pub summary: SummaryResult,
    pub swot: SwotResult,
    pub metrics: MetricsResult,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DecisionResult {
    pub ticker: String,
    pub fiscal_year: i32,
    pub company: String,
    pub full_decision: String,
    pub components: DecisionComponents,
    pub inputs: DecisionInputs,
}

/// Shared stage dependencies; the pipeline borrows one of these per run.
pub struct AgentContext<'a> {
    pub retriever: &'a Retriever,
    pub llm: &'a dyn Generate,
    pub parser: &'a dyn OutputParser,
    pub temperature: f32,
}

impl AgentContext<'_> {
    pub fn summary(&self, ticker: &str, fiscal_year: i32, company: &str) -> Result<SummaryResult> {
        info!(ticker, fiscal_year, "generating executive summary");
        let sections = prompts::section_scope(prompts::SUMMARY_SECTIONS);
        let context = self.retriever.retrieve_context(
            &prompts::summary_queries(),
            ticker,
            fiscal_year,
            &sections,
            prompts::SUMMARY_TOP_K,
        )?;
        let request = GenerationRequest::new(
            prompts::SUMMARY_SYSTEM,
            prompts::summary_prompt(&context, company, fiscal_year),
            self.temperature,
        );
        let summary = self.llm.generate(&request)?;
        Ok(SummaryResult {
            ticker: ticker.to_string(),
            fiscal_year,
            company: company.to_string(),
            summary,
            sections_analyzed: sections,
        })
    }

    /// The four quadrant retrievals are independent, so they run on scoped
    /// threads; the single generation call happens after all four are in.
    pub fn swot(&self, ticker: &str, fiscal_year: i32, company: &str) -> Result<SwotResult> {
        info!(ticker, fiscal_year, "performing SWOT analysis");
        let sections = prompts::section_scope(prompts::SWOT_SECTIONS);
        let quadrants = [
            prompts::strengths_queries(),
            prompts::weaknesses_queries(),
            prompts::opportunities_queries(),
            prompts::threats_queries(),
        ];
        let retriever = self.retriever;
        let contexts = thread::scope(|scope| -> Result<Vec<String>> {
            let handles: Vec<_> = quadrants
                .iter()
                .map(|queries| {
                    let sections = &sections;
                    scope.spawn(move || {
                        retriever.retrieve_context(
                            queries,
                            ticker,
                            fiscal_year,
                            sections,
                            prompts::SWOT_TOP_K,
                        )
                    })
                })
                .collect();
            handles
                .into_iter()
                .map(|handle| {
                    handle
                        .join()
                        .map_err(|_| TenkError::Other("quadrant retrieval panicked".into()))?
                })
                .collect()
        })?;
        let combined = format!(
            "STRENGTHS CONTEXT:\n{}\n\nWEAKNESSES CONTEXT:\n{}\n\nOPPORTUNITIES CONTEXT:\n{}\n\nTHREATS CONTEXT:\n{}",
            contexts[0], contexts[1], contexts[2], contexts[3]
        );
        let request = GenerationRequest::new(
            prompts::SWOT_SYSTEM,
            prompts::swot_prompt(&combined, company, fiscal_year),
            self.temperature,
        );
        let swot_analysis = self.llm.generate(&request)?;
        let components = self.parser.parse_swot(&swot_analysis);
        Ok(SwotResult {
            ticker: ticker.to_string(),
            fiscal_year,
            company: company.to_string(),
            swot_analysis,
            components,
            sections_analyzed: sections,
        })
    }

    pub fn metrics(
        &self,
        ticker: &str,
        fiscal_year: i32,
        company: &str,
        prior_year: Option<i32>,
    ) -> Result<MetricsResult> {
        info!(ticker, fiscal_year, "extracting financial metrics");
        let prior_year = prior_year.unwrap_or(fiscal_year - 1);
        let sections = prompts::section_scope(prompts::METRICS_SECTIONS);
        let context = self.retriever.retrieve_context(
            &prompts::metrics_queries(),
            ticker,
            fiscal_year,
            &sections,
            prompts::METRICS_TOP_K,
        )?;
        let request = GenerationRequest::new(
            prompts::METRICS_SYSTEM,
            prompts::metrics_prompt(&context, company, fiscal_year, prior_year),
            self.temperature,
        );
        let raw_response = self.llm.generate(&request)?;
        let mut metrics = parse_metrics(&raw_response);
        if !metrics.is_empty() {
            derive_metrics(&mut metrics);
        }
        Ok(MetricsResult {
            ticker: ticker.to_string(),
            fiscal_year,
            prior_year,
            company: company.to_string(),
            metrics,
            raw_response,
            sections_analyzed: sections,
        })
    }

    pub fn decision(
        &self,
        ticker: &str,
        fiscal_year: i32,
        company: &str,
        summary: &SummaryResult,
        swot: &SwotResult,
        metrics: &MetricsResult,
    ) -> Result<DecisionResult> {
        info!(ticker, fiscal_year, "generating investment decision");
        // Red-flag retrieval is deliberately unscoped by section.
        let red_flags_context = self.retriever.retrieve_context(
            &prompts::red_flag_queries(),
            ticker,
            fiscal_year,
            &[],
            prompts::RED_FLAGS_TOP_K,
        )?;
        let metrics_text = format_metrics(&metrics.metrics);
        let request = GenerationRequest::new(
            prompts::decision_system(&red_flags_context),
            prompts::decision_prompt(
                &summary.summary,
                &swot.swot_analysis,
                &metrics_text,
                company,
                fiscal_year,
            ),
            self.temperature,
        );
        let full_decision = self.llm.generate(&request)?;
        let components = self.parser.parse_decision(&full_decision);
        info!(
            ticker,
            recommendation = components.recommendation.as_str(),
            "decision parsed"
        );
        Ok(DecisionResult {
            ticker: ticker.to_string(),
            fiscal_year,
            company: company.to_string(),
            full_decision,
            components,
            inputs: DecisionInputs {
                summary: summary.clone(),
                swot: swot.clone(),
                metrics: metrics.clone(),
            },
        })
    }
}
