use std::collections::VecDeque;
use std::sync::Mutex;

use tenk_agents::{
    quick_summary, AnalysisPipeline, AnalysisRequest, Generate, KeywordParser, PipelineStatus,
    Recommendation, Stage,
};
use tenk_core::{CancelToken, Result, TenkError};
use tenk_llm::GenerationRequest;
use tenk_rag::{EmbeddingClient, EmbeddingConfig, IndexedRecord, Retriever, VectorStore};

struct ScriptedLlm {
    responses: Mutex<VecDeque<std::result::Result<String, String>>>,
}

impl ScriptedLlm {
    fn new(responses: Vec<std::result::Result<String, String>>) -> Self {
        Self {
            responses: Mutex::new(responses.into_iter().collect()),
        }
    }
}

impl Generate for ScriptedLlm {
    fn generate(&self, _req: &GenerationRequest) -> Result<String> {
        match self.responses.lock().unwrap().pop_front() {
            Some(Ok(text)) => Ok(text),
            Some(Err(message)) => Err(TenkError::Generation(message)),
            None => Err(TenkError::Generation("no scripted response left".into())),
        }
    }
}

fn seeded_retriever(dir: &tempfile::TempDir) -> Retriever {
    let embedder = EmbeddingClient::new(EmbeddingConfig::hash(64)).unwrap();
    let store = VectorStore::open(dir.path().join("index.db")).unwrap();
    store.create(embedder.dimension()).unwrap();
    let seeds = [
        ("ITEM_1_chunk_0", "ITEM_1", "hardware and services revenue model"),
        ("ITEM_1A_chunk_0", "ITEM_1A", "customer concentration and supply risk"),
        ("ITEM_7_chunk_0", "ITEM_7", "margins expanded on services growth"),
        ("ITEM_8_chunk_0", "ITEM_8", "consolidated statements of operations"),
    ];
    let records: Vec<IndexedRecord> = seeds
        .iter()
        .map(|(chunk_id, section_id, text)| IndexedRecord {
            chunk_id: chunk_id.to_string(),
            doc_id: "TST_2024_10K".to_string(),
            ticker: "TST".to_string(),
            fiscal_year: 2024,
            section_id: section_id.to_string(),
            chunk_index: 0,
            start_page: 1,
            token_count: 6,
            char_count: text.len(),
            text: text.to_string(),
            embedding: embedder.embed(text).unwrap(),
        })
        .collect();
    store.upsert(&records).unwrap();
    Retriever::new(store, embedder)
}

fn pipeline_with(dir: &tempfile::TempDir, llm: ScriptedLlm) -> AnalysisPipeline {
    AnalysisPipeline::new(
        seeded_retriever(dir),
        Box::new(llm),
        Box::new(KeywordParser),
        0.1,
    )
}

const SWOT_RESPONSE: &str = "**STRENGTHS**: durable services franchise \
**WEAKNESSES**: hardware cyclicality **OPPORTUNITIES**: emerging markets \
**THREATS**: regulatory scrutiny";

const METRICS_RESPONSE: &str = r#"Extracted figures:
{"current_year": {"revenue": 1200, "gross_profit": 480, "net_income": 120},
 "prior_year": {"revenue": 1000, "net_income": 100}}"#;

const DECISION_RESPONSE: &str = "**1. INVESTMENT THESIS**\nQuality compounder at a \
reasonable valuation.\n\n**2. RED FLAGS ASSESSMENT**\nNone material.\n\n\
Recommendation: STRONG BUY\n\nConfidence Level: HIGH\n\nSizing: OVERWEIGHT";

#[test]
fn full_pipeline_produces_structured_decision() {
    let dir = tempfile::tempdir().unwrap();
    let pipeline = pipeline_with(
        &dir,
        ScriptedLlm::new(vec![
            Ok("Executive summary of the business.".to_string()),
            Ok(SWOT_RESPONSE.to_string()),
            Ok(METRICS_RESPONSE.to_string()),
            Ok(DECISION_RESPONSE.to_string()),
        ]),
    );
    let report = pipeline.analyze(&AnalysisRequest::new("TST", 2024), &CancelToken::new());

    assert_eq!(report.status, PipelineStatus::Completed);
    let summary = report.summary.as_ref().unwrap();
    assert!(summary.summary.contains("Executive summary"));
    let swot = report.swot.as_ref().unwrap();
    assert!(swot.components.strengths.contains("services franchise"));
    let metrics = report.metrics.as_ref().unwrap();
    let current = metrics.metrics["current_year"].as_object().unwrap();
    assert_eq!(current["gross_margin"].as_f64().unwrap(), 40.0);
    assert_eq!(current["revenue_growth"].as_f64().unwrap(), 20.0);
    let decision = report.decision.as_ref().unwrap();
    assert_eq!(
        decision.components.recommendation,
        Recommendation::StrongBuy
    );
}

#[test]
fn decision_carries_its_upstream_inputs() {
    let dir = tempfile::tempdir().unwrap();
    let pipeline = pipeline_with(
        &dir,
        ScriptedLlm::new(vec![
            Ok("Executive summary of the business.".to_string()),
            Ok(SWOT_RESPONSE.to_string()),
            Ok(METRICS_RESPONSE.to_string()),
            Ok(DECISION_RESPONSE.to_string()),
        ]),
    );
    let report = pipeline.analyze(&AnalysisRequest::new("TST", 2024), &CancelToken::new());

    let decision = report.decision.as_ref().unwrap();
    assert_eq!(
        decision.inputs.summary.summary,
        report.summary.as_ref().unwrap().summary
    );
    assert!(decision
        .inputs
        .swot
        .components
        .strengths
        .contains("services franchise"));
    assert!(decision.inputs.metrics.metrics.contains_key("current_year"));
}

#[test]
fn metrics_failure_halts_before_decision() {
    let dir = tempfile::tempdir().unwrap();
    let pipeline = pipeline_with(
        &dir,
        ScriptedLlm::new(vec![
            Ok("Summary text.".to_string()),
            Ok(SWOT_RESPONSE.to_string()),
            Err("model unavailable".to_string()),
        ]),
    );
    let report = pipeline.analyze(&AnalysisRequest::new("TST", 2024), &CancelToken::new());

    match &report.status {
        PipelineStatus::Failed { stage, error } => {
            assert_eq!(*stage, Stage::Metrics);
            assert!(error.contains("model unavailable"));
        }
        other => panic!("expected failure, got {other:?}"),
    }
    assert!(report.summary.is_some());
    assert!(report.swot.is_some());
    assert!(report.metrics.is_none());
    assert!(report.decision.is_none());
    assert!(quick_summary(&report).contains("failed at metrics stage"));
}

#[test]
fn malformed_metrics_json_degrades_without_aborting() {
    let dir = tempfile::tempdir().unwrap();
    let pipeline = pipeline_with(
        &dir,
        ScriptedLlm::new(vec![
            Ok("Summary text.".to_string()),
            Ok(SWOT_RESPONSE.to_string()),
            Ok("I could not find structured figures.".to_string()),
            Ok("Recommendation: HOLD".to_string()),
        ]),
    );
    let report = pipeline.analyze(&AnalysisRequest::new("TST", 2024), &CancelToken::new());

    assert_eq!(report.status, PipelineStatus::Completed);
    assert!(report.metrics.as_ref().unwrap().metrics.is_empty());
    assert_eq!(
        report.decision.as_ref().unwrap().components.recommendation,
        Recommendation::Hold
    );
}

#[test]
fn cancellation_stops_the_pipeline_at_the_first_stage() {
    let dir = tempfile::tempdir().unwrap();
    let pipeline = pipeline_with(
        &dir,
        ScriptedLlm::new(vec![Ok("never used".to_string())]),
    );
    let cancel = CancelToken::new();
    cancel.cancel();
    let report = pipeline.analyze(&AnalysisRequest::new("TST", 2024), &cancel);

    match &report.status {
        PipelineStatus::Failed { stage, .. } => assert_eq!(*stage, Stage::Summary),
        other => panic!("expected failure, got {other:?}"),
    }
    assert!(report.summary.is_none());
}

#[test]
fn quick_summary_renders_decision_headline() {
    let dir = tempfile::tempdir().unwrap();
    let pipeline = pipeline_with(
        &dir,
        ScriptedLlm::new(vec![
            Ok("Summary text.".to_string()),
            Ok(SWOT_RESPONSE.to_string()),
            Ok(METRICS_RESPONSE.to_string()),
            Ok(DECISION_RESPONSE.to_string()),
        ]),
    );
    let report = pipeline.analyze(&AnalysisRequest::new("TST", 2024), &CancelToken::new());
    let digest = quick_summary(&report);

    assert!(digest.contains("## Investment Recommendation: STRONG BUY"));
    assert!(digest.contains("**Confidence:** HIGH"));
    assert!(digest.contains("- Revenue: $1200"));
    assert!(digest.contains("**Strengths:**"));
}
