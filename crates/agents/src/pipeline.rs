//! Fail-fast orchestration of the four analysis stages. A stage failure
//! aborts the remaining stages and the report carries whatever completed.

use serde::{Deserialize, Serialize};
use tracing::{error, info};

use tenk_core::CancelToken;
use tenk_rag::Retriever;

use crate::agents::{
    AgentContext, DecisionResult, Generate, MetricsResult, SummaryResult, SwotResult,
};
use crate::metrics::format_key_metrics;
use crate::parse::OutputParser;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Stage {
    Summary,
    Swot,
    Metrics,
    Decision,
}

impl Stage {
    pub fn as_str(&self) -> &'static str {
        match self {
            Stage::Summary => "summary",
            Stage::Swot => "swot",
            Stage::Metrics => "metrics",
            Stage::Decision => "decision",
        }
    }
}

/// Distinguishes "no recommendation produced" from a defaulted HOLD: a failed
/// run names the stage that broke and carries no decision at all.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "status", rename_all = "snake_case")]
pub enum PipelineStatus {
    Completed,
    Failed { stage: Stage, error: String },
}

#[derive(Debug, Clone)]
pub struct AnalysisRequest {
    pub ticker: String,
    pub fiscal_year: i32,
    pub company: Option<String>,
    pub prior_year: Option<i32>,
}

impl AnalysisRequest {
    pub fn new(ticker: impl Into<String>, fiscal_year: i32) -> Self {
        Self {
            ticker: ticker.into(),
            fiscal_year,
            company: None,
            prior_year: None,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AnalysisReport {
    pub ticker: String,
    pub fiscal_year: i32,
    pub company: String,
    pub status: PipelineStatus,
    pub summary: Option<SummaryResult>,
    pub swot: Option<SwotResult>,
    pub metrics: Option<MetricsResult>,
    pub decision: Option<DecisionResult>,
}

pub struct AnalysisPipeline {
    retriever: Retriever,
    llm: Box<dyn Generate>,
    parser: Box<dyn OutputParser>,
    temperature: f32,
}

impl AnalysisPipeline {
    pub fn new(
        retriever: Retriever,
        llm: Box<dyn Generate>,
        parser: Box<dyn OutputParser>,
        temperature: f32,
    ) -> Self {
        Self {
            retriever,
            llm,
            parser,
            temperature,
        }
    }

    /// Runs Summary, SWOT, Metrics, Decision in order. Cancellation is
    /// checked between stages so no new external calls start after it fires.
    pub fn analyze(&self, request: &AnalysisRequest, cancel: &CancelToken) -> AnalysisReport {
        let company = request
            .company
            .clone()
            .unwrap_or_else(|| request.ticker.clone());
        let mut report = AnalysisReport {
            ticker: request.ticker.clone(),
            fiscal_year: request.fiscal_year,
            company: company.clone(),
            status: PipelineStatus::Completed,
            summary: None,
            swot: None,
            metrics: None,
            decision: None,
        };
        let ctx = AgentContext {
            retriever: &self.retriever,
            llm: self.llm.as_ref(),
            parser: self.parser.as_ref(),
            temperature: self.temperature,
        };
        let ticker = request.ticker.as_str();
        let fiscal_year = request.fiscal_year;
        info!(ticker, fiscal_year, "starting analysis pipeline");

        let summary = match cancel
            .check()
            .and_then(|_| ctx.summary(ticker, fiscal_year, &company))
        {
            Ok(result) => result,
            Err(err) => return fail(report, Stage::Summary, err),
        };
        report.summary = Some(summary.clone());

        let swot = match cancel
            .check()
            .and_then(|_| ctx.swot(ticker, fiscal_year, &company))
        {
            Ok(result) => result,
            Err(err) => return fail(report, Stage::Swot, err),
        };
        report.swot = Some(swot.clone());

        let metrics = match cancel
            .check()
            .and_then(|_| ctx.metrics(ticker, fiscal_year, &company, request.prior_year))
        {
            Ok(result) => result,
            Err(err) => return fail(report, Stage::Metrics, err),
        };
        report.metrics = Some(metrics.clone());

        let decision = match cancel.check().and_then(|_| {
            ctx.decision(ticker, fiscal_year, &company, &summary, &swot, &metrics)
        }) {
            Ok(result) => result,
            Err(err) => return fail(report, Stage::Decision, err),
        };
        report.decision = Some(decision);

        info!(ticker, fiscal_year, "analysis pipeline completed");
        report
    }
}

fn fail(mut report: AnalysisReport, stage: Stage, err: tenk_core::TenkError) -> AnalysisReport {
    error!(stage = stage.as_str(), %err, "pipeline stage failed");
    report.status = PipelineStatus::Failed {
        stage,
        error: err.to_string(),
    };
    report
}

/// Markdown digest of a completed report.
pub fn quick_summary(report: &AnalysisReport) -> String {
    if let PipelineStatus::Failed { stage, error } = &report.status {
        return format!("Analysis failed at {} stage: {error}", stage.as_str());
    }
    let decision = report.decision.as_ref();
    let mut out = format!(
        "# {} ({}) - FY {} Analysis\n",
        report.company, report.ticker, report.fiscal_year
    );
    if let Some(decision) = decision {
        out.push_str(&format!(
            "\n## Investment Recommendation: {}\n**Confidence:** {}\n**Position Sizing:** {}\n",
            decision.components.recommendation.as_str(),
            decision.components.confidence.as_str(),
            decision.components.position_sizing.as_str()
        ));
    }
    if let Some(summary) = &report.summary {
        out.push_str(&format!("\n## Executive Summary\n{}\n", summary.summary));
    }
    if let Some(metrics) = &report.metrics {
        out.push_str(&format!(
            "\n## Key Metrics\n{}\n",
            format_key_metrics(&metrics.metrics)
        ));
    }
    if let Some(swot) = &report.swot {
        out.push_str(&format!(
            "\n## SWOT Highlights\n{}\n",
            swot_highlights(swot)
        ));
    }
    if let Some(decision) = decision {
        if !decision.components.investment_thesis.is_empty() {
            out.push_str(&format!(
                "\n## Investment Thesis\n{}\n",
                decision.components.investment_thesis
            ));
        }
        if !decision.components.red_flags.is_empty() {
            out.push_str(&format!(
                "\n## Red Flags\n{}\n",
                decision.components.red_flags
            ));
        }
    }
    out
}

fn swot_highlights(swot: &SwotResult) -> String {
    let quadrants = [
        ("Strengths", &swot.components.strengths),
        ("Weaknesses", &swot.components.weaknesses),
        ("Opportunities", &swot.components.opportunities),
        ("Threats", &swot.components.threats),
    ];
    let mut parts = Vec::new();
    for (title, text) in quadrants {
        if text.is_empty() {
            continue;
        }
        let preview = text.lines().take(3).collect::<Vec<_>>().join("\n  ");
        parts.push(format!("**{title}:**\n  {preview}"));
    }
    if parts.is_empty() {
        "SWOT analysis not available".to_string()
    } else {
        parts.join("\n\n")
    }
}
