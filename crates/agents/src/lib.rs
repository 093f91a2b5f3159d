//! Four-stage filing analysis: Summary, SWOT, Metrics, Decision.

pub mod agents;
pub mod metrics;
pub mod parse;
pub mod pipeline;
pub mod prompts;

pub use agents::{
    AgentContext, DecisionInputs, DecisionResult, Generate, MetricsResult, SummaryResult,
    SwotResult,
};
pub use metrics::{derive_metrics, format_key_metrics, format_metrics, parse_metrics};
pub use parse::{
    Confidence, DecisionComponents, KeywordParser, OutputParser, PositionSizing, Recommendation,
    SwotComponents,
};
pub use pipeline::{
    quick_summary, AnalysisPipeline, AnalysisReport, AnalysisRequest, PipelineStatus, Stage,
};
