//! Metrics extraction from generation output and derived-ratio computation.

use serde_json::{Map, Value};
use tracing::warn;

use crate::parse::first_json_block;

/// Decodes the first complete JSON object found in the generation output.
/// Anything unparseable degrades to an empty object; the pipeline never
/// aborts on a malformed metrics response.
pub fn parse_metrics(raw: &str) -> Map<String, Value> {
    let Some(block) = first_json_block(raw) else {
        warn!("no JSON object found in metrics response");
        return Map::new();
    };
    match serde_json::from_str::<Value>(block) {
        Ok(Value::Object(map)) => map,
        Ok(_) => {
            warn!("metrics response JSON is not an object");
            Map::new()
        }
        Err(err) => {
            warn!(%err, "failed to decode metrics JSON");
            Map::new()
        }
    }
}

/// Adds derived ratios to `current_year`. Each ratio is computed only when
/// both operands are numeric and the denominator is nonzero; otherwise it is
/// skipped, never an error.
pub fn derive_metrics(metrics: &mut Map<String, Value>) {
    let prior = metrics
        .get("prior_year")
        .and_then(Value::as_object)
        .cloned()
        .unwrap_or_default();
    let Some(current) = metrics
        .get_mut("current_year")
        .and_then(Value::as_object_mut)
    else {
        return;
    };

    let margins = [
        ("gross_margin", "gross_profit"),
        ("operating_margin", "operating_income"),
        ("net_margin", "net_income"),
    ];
    for (name, numerator) in margins {
        if let Some(value) = percent_ratio(current, numerator, "revenue") {
            current.insert(name.to_string(), json_number(value));
        }
    }
    if let Some(roe) = percent_ratio(current, "net_income", "stockholders_equity") {
        current.insert("roe".to_string(), json_number(roe));
    }
    if let Some(roa) = percent_ratio(current, "net_income", "total_assets") {
        current.insert("roa".to_string(), json_number(roa));
    }
    if let Some(ratio) = plain_ratio(current, "current_assets", "current_liabilities") {
        current.insert("current_ratio".to_string(), json_number(ratio));
    }
    if let Some(ratio) = plain_ratio(current, "total_debt", "stockholders_equity") {
        current.insert("debt_to_equity".to_string(), json_number(ratio));
    }

    let growths = [
        ("revenue_growth", "revenue"),
        ("net_income_growth", "net_income"),
    ];
    for (name, key) in growths {
        let (Some(now), Some(then)) = (numeric(current, key), numeric(&prior, key)) else {
            continue;
        };
        if then == 0.0 {
            continue;
        }
        current.insert(
            name.to_string(),
            json_number((now - then) / then * 100.0),
        );
    }
}

fn numeric(map: &Map<String, Value>, key: &str) -> Option<f64> {
    map.get(key).and_then(Value::as_f64)
}

fn percent_ratio(map: &Map<String, Value>, numerator: &str, denominator: &str) -> Option<f64> {
    plain_ratio(map, numerator, denominator).map(|r| r * 100.0)
}

fn plain_ratio(map: &Map<String, Value>, numerator: &str, denominator: &str) -> Option<f64> {
    let num = numeric(map, numerator)?;
    let den = numeric(map, denominator)?;
    if den == 0.0 {
        return None;
    }
    Some(num / den)
}

fn json_number(value: f64) -> Value {
    serde_json::Number::from_f64(value)
        .map(Value::Number)
        .unwrap_or(Value::Null)
}

/// Renders the metrics object as the plain-text block fed into the decision
/// prompt.
pub fn format_metrics(metrics: &Map<String, Value>) -> String {
    if metrics.is_empty() {
        return "No metrics available".to_string();
    }
    let current = metrics
        .get("current_year")
        .and_then(Value::as_object)
        .cloned()
        .unwrap_or_default();
    let prior = metrics
        .get("prior_year")
        .and_then(Value::as_object)
        .cloned()
        .unwrap_or_default();

    let mut lines = Vec::new();
    lines.push("INCOME STATEMENT:".to_string());
    for key in ["revenue", "gross_profit", "operating_income", "net_income", "eps"] {
        if let Some(value) = numeric(&current, key) {
            let mut line = format!("  {}: ${:.2}", title_case(key), value);
            if let Some(prev) = numeric(&prior, key) {
                if prev != 0.0 {
                    line.push_str(&format!(" ({:+.1}% YoY)", (value - prev) / prev * 100.0));
                }
            }
            lines.push(line);
        }
    }
    lines.push("\nBALANCE SHEET:".to_string());
    for key in ["total_assets", "total_liabilities", "stockholders_equity", "total_debt"] {
        if let Some(value) = numeric(&current, key) {
            lines.push(format!("  {}: ${:.2}", title_case(key), value));
        }
    }
    lines.push("\nCASH FLOW:".to_string());
    for key in ["cash_from_operations", "free_cash_flow", "capex"] {
        if let Some(value) = numeric(&current, key) {
            lines.push(format!("  {}: ${:.2}", title_case(key), value));
        }
    }
    lines.push("\nKEY RATIOS:".to_string());
    for key in [
        "gross_margin",
        "operating_margin",
        "net_margin",
        "roe",
        "roa",
        "debt_to_equity",
        "current_ratio",
        "revenue_growth",
    ] {
        if let Some(value) = numeric(&current, key) {
            if key.contains("margin") || key.contains("growth") || key == "roe" || key == "roa" {
                lines.push(format!("  {}: {:.2}%", title_case(key), value));
            } else {
                lines.push(format!("  {}: {:.2}", title_case(key), value));
            }
        }
    }
    lines.join("\n")
}

/// Short metric list for the markdown quick summary.
pub fn format_key_metrics(metrics: &Map<String, Value>) -> String {
    let current = metrics
        .get("current_year")
        .and_then(Value::as_object)
        .cloned()
        .unwrap_or_default();
    let mut parts = Vec::new();
    if let Some(value) = numeric(&current, "revenue") {
        parts.push(format!("- Revenue: ${value:.0}"));
    }
    if let Some(value) = numeric(&current, "net_income") {
        parts.push(format!("- Net Income: ${value:.0}"));
    }
    if let Some(value) = numeric(&current, "revenue_growth") {
        parts.push(format!("- Revenue Growth: {value:.1}%"));
    }
    if let Some(value) = numeric(&current, "net_margin") {
        parts.push(format!("- Net Margin: {value:.1}%"));
    }
    if let Some(value) = numeric(&current, "roe") {
        parts.push(format!("- ROE: {value:.1}%"));
    }
    if parts.is_empty() {
        "Metrics not available".to_string()
    } else {
        parts.join("\n")
    }
}

fn title_case(key: &str) -> String {
    key.split('_')
        .map(|word| {
            let mut chars = word.chars();
            match chars.next() {
                Some(first) => first.to_uppercase().collect::<String>() + chars.as_str(),
                None => String::new(),
            }
        })
        .collect::<Vec<_>>()
        .join(" ")
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn object(value: Value) -> Map<String, Value> {
        value.as_object().cloned().unwrap()
    }

    #[test]
    fn gross_margin_from_revenue_and_gross_profit() {
        let mut metrics = object(json!({
            "current_year": { "revenue": 1000, "gross_profit": 400 }
        }));
        derive_metrics(&mut metrics);
        let current = metrics["current_year"].as_object().unwrap();
        assert_eq!(current["gross_margin"].as_f64().unwrap(), 40.0);
    }

    #[test]
    fn roe_is_omitted_on_zero_equity() {
        let mut metrics = object(json!({
            "current_year": { "net_income": 50, "stockholders_equity": 0 }
        }));
        derive_metrics(&mut metrics);
        let current = metrics["current_year"].as_object().unwrap();
        assert!(!current.contains_key("roe"));
    }

    #[test]
    fn non_numeric_operands_are_skipped() {
        let mut metrics = object(json!({
            "current_year": { "revenue": "n/a", "net_income": 50 }
        }));
        derive_metrics(&mut metrics);
        let current = metrics["current_year"].as_object().unwrap();
        assert!(!current.contains_key("net_margin"));
    }

    #[test]
    fn revenue_growth_year_over_year() {
        let mut metrics = object(json!({
            "current_year": { "revenue": 1200 },
            "prior_year": { "revenue": 1000 }
        }));
        derive_metrics(&mut metrics);
        let current = metrics["current_year"].as_object().unwrap();
        assert_eq!(current["revenue_growth"].as_f64().unwrap(), 20.0);
    }

    #[test]
    fn parse_recovers_object_embedded_in_prose() {
        let raw = "Here are the figures:\n{\"current_year\": {\"revenue\": 10}}\nDone.";
        let metrics = parse_metrics(raw);
        assert!(metrics.contains_key("current_year"));
    }

    #[test]
    fn parse_failure_degrades_to_empty() {
        assert!(parse_metrics("no structured data here").is_empty());
        assert!(parse_metrics("{\"broken\": ").is_empty());
    }

    #[test]
    fn formatting_skips_missing_fields() {
        let metrics = object(json!({
            "current_year": { "revenue": 1000.0, "net_margin": 12.5 }
        }));
        let text = format_metrics(&metrics);
        assert!(text.contains("Revenue: $1000.00"));
        assert!(text.contains("Net Margin: 12.50%"));
        assert!(!text.contains("Roe"));
        assert_eq!(format_metrics(&Map::new()), "No metrics available");
    }
}
