//! Parsers that turn free-text generation output into structured fields.
//! Keyword matching lives behind a trait so the strategy can change (for
//! example to native structured output) without touching pipeline logic.

use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Recommendation {
    StrongBuy,
    Buy,
    Hold,
    Sell,
    StrongSell,
}

impl Recommendation {
    pub fn as_str(&self) -> &'static str {
        match self {
            Recommendation::StrongBuy => "STRONG BUY",
            Recommendation::Buy => "BUY",
            Recommendation::Hold => "HOLD",
            Recommendation::Sell => "SELL",
            Recommendation::StrongSell => "STRONG SELL",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Confidence {
    High,
    Medium,
    Low,
}

impl Confidence {
    pub fn as_str(&self) -> &'static str {
        match self {
            Confidence::High => "HIGH",
            Confidence::Medium => "MEDIUM",
            Confidence::Low => "LOW",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum PositionSizing {
    Overweight,
    MarketWeight,
    Underweight,
    Avoid,
}

impl PositionSizing {
    pub fn as_str(&self) -> &'static str {
        match self {
            PositionSizing::Overweight => "OVERWEIGHT",
            PositionSizing::MarketWeight => "MARKET WEIGHT",
            PositionSizing::Underweight => "UNDERWEIGHT",
            PositionSizing::Avoid => "AVOID",
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct SwotComponents {
    pub strengths: String,
    pub weaknesses: String,
    pub opportunities: String,
    pub threats: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DecisionComponents {
    pub investment_thesis: String,
    pub red_flags: String,
    pub catalysts_and_risks: String,
    pub recommendation: Recommendation,
    pub confidence: Confidence,
    pub position_sizing: PositionSizing,
}

impl Default for DecisionComponents {
    fn default() -> Self {
        Self {
            investment_thesis: String::new(),
            red_flags: String::new(),
            catalysts_and_risks: String::new(),
            recommendation: Recommendation::Hold,
            confidence: Confidence::Medium,
            position_sizing: PositionSizing::MarketWeight,
        }
    }
}

pub trait OutputParser {
    fn parse_swot(&self, text: &str) -> SwotComponents;
    fn parse_decision(&self, text: &str) -> DecisionComponents;
}

/// Literal keyword scanning with fixed priority order and per-field defaults.
#[derive(Debug, Default, Clone, Copy)]
pub struct KeywordParser;

impl OutputParser for KeywordParser {
    /// Splits on the `**` marker and assigns each trailing segment to the
    /// most recently seen quadrant header. Header detection is a
    /// case-insensitive prefix match; text before the first header is
    /// dropped.
    fn parse_swot(&self, text: &str) -> SwotComponents {
        let mut components = SwotComponents::default();
        let mut current: Option<Quadrant> = None;
        for segment in text.split("**") {
            let lowered = segment.trim().to_lowercase();
            if lowered.starts_with("strengths") {
                current = Some(Quadrant::Strengths);
            } else if lowered.starts_with("weaknesses") {
                current = Some(Quadrant::Weaknesses);
            } else if lowered.starts_with("opportunities") {
                current = Some(Quadrant::Opportunities);
            } else if lowered.starts_with("threats") {
                current = Some(Quadrant::Threats);
            } else if let Some(quadrant) = current {
                let slot = match quadrant {
                    Quadrant::Strengths => &mut components.strengths,
                    Quadrant::Weaknesses => &mut components.weaknesses,
                    Quadrant::Opportunities => &mut components.opportunities,
                    Quadrant::Threats => &mut components.threats,
                };
                slot.push_str(segment);
                slot.push('\n');
            }
        }
        components.strengths = components.strengths.trim().to_string();
        components.weaknesses = components.weaknesses.trim().to_string();
        components.opportunities = components.opportunities.trim().to_string();
        components.threats = components.threats.trim().to_string();
        components
    }

    fn parse_decision(&self, text: &str) -> DecisionComponents {
        let mut components = DecisionComponents {
            recommendation: parse_recommendation(text),
            confidence: parse_confidence(text),
            position_sizing: parse_position_sizing(text),
            ..DecisionComponents::default()
        };
        for paragraph in text.split("\n\n") {
            let lowered = paragraph.to_lowercase();
            if lowered.contains("investment thesis") {
                components.investment_thesis = paragraph.to_string();
            } else if lowered.contains("red flags") {
                components.red_flags = paragraph.to_string();
            } else if lowered.contains("catalysts") || lowered.contains("risks") {
                components.catalysts_and_risks = paragraph.to_string();
            }
        }
        components
    }
}

#[derive(Clone, Copy)]
enum Quadrant {
    Strengths,
    Weaknesses,
    Opportunities,
    Threats,
}

/// First literal match wins; the qualified forms are checked before their
/// plain substrings so "STRONG BUY" is never read as "BUY" nor
/// "STRONG SELL" as "SELL".
pub fn parse_recommendation(text: &str) -> Recommendation {
    const ORDER: &[(&str, Recommendation)] = &[
        ("STRONG BUY", Recommendation::StrongBuy),
        ("STRONG SELL", Recommendation::StrongSell),
        ("BUY", Recommendation::Buy),
        ("HOLD", Recommendation::Hold),
        ("SELL", Recommendation::Sell),
    ];
    for (literal, value) in ORDER {
        if text.contains(literal) {
            return *value;
        }
    }
    Recommendation::Hold
}

/// HIGH/LOW only count when the "Confidence" label co-occurs somewhere in
/// the text; anything else is MEDIUM.
pub fn parse_confidence(text: &str) -> Confidence {
    if !text.contains("Confidence") {
        return Confidence::Medium;
    }
    if text.contains("HIGH") {
        Confidence::High
    } else if text.contains("LOW") {
        Confidence::Low
    } else {
        Confidence::Medium
    }
}

pub fn parse_position_sizing(text: &str) -> PositionSizing {
    if text.contains("OVERWEIGHT") {
        PositionSizing::Overweight
    } else if text.contains("UNDERWEIGHT") {
        PositionSizing::Underweight
    } else if text.contains("AVOID") {
        PositionSizing::Avoid
    } else {
        PositionSizing::MarketWeight
    }
}

/// Finds the first syntactically complete top-level `{...}` block, tracking
/// string literals and escapes so braces inside strings do not count.
pub fn first_json_block(text: &str) -> Option<&str> {
    let bytes = text.as_bytes();
    let start = text.find('{')?;
    let mut depth = 0usize;
    let mut in_string = false;
    let mut escaped = false;
    for (offset, &byte) in bytes[start..].iter().enumerate() {
        if in_string {
            if escaped {
                escaped = false;
            } else if byte == b'\\' {
                escaped = true;
            } else if byte == b'"' {
                in_string = false;
            }
            continue;
        }
        match byte {
            b'"' => in_string = true,
            b'{' => depth += 1,
            b'}' => {
                depth -= 1;
                if depth == 0 {
                    return Some(&text[start..start + offset + 1]);
                }
            }
            _ => {}
        }
    }
    None
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn strong_buy_beats_standalone_buy() {
        let text = "We rate this STRONG BUY although a plain BUY was considered.";
        assert_eq!(parse_recommendation(text), Recommendation::StrongBuy);
    }

    #[test]
    fn strong_sell_beats_standalone_sell() {
        assert_eq!(
            parse_recommendation("Recommendation: STRONG SELL"),
            Recommendation::StrongSell
        );
        assert_eq!(
            parse_recommendation("We moved from SELL to STRONG SELL this year."),
            Recommendation::StrongSell
        );
    }

    #[test]
    fn plain_sell_is_detected() {
        assert_eq!(
            parse_recommendation("Recommendation: SELL"),
            Recommendation::Sell
        );
    }

    #[test]
    fn missing_recommendation_defaults_to_hold() {
        assert_eq!(
            parse_recommendation("No clear view emerged."),
            Recommendation::Hold
        );
    }

    #[test]
    fn confidence_requires_the_label() {
        assert_eq!(parse_confidence("risk is HIGH here"), Confidence::Medium);
        assert_eq!(
            parse_confidence("Confidence Level: HIGH"),
            Confidence::High
        );
        assert_eq!(parse_confidence("Confidence: LOW"), Confidence::Low);
    }

    #[test]
    fn position_sizing_defaults_to_market_weight() {
        assert_eq!(
            parse_position_sizing("size it normally"),
            PositionSizing::MarketWeight
        );
        assert_eq!(
            parse_position_sizing("Sizing: UNDERWEIGHT"),
            PositionSizing::Underweight
        );
    }

    #[test]
    fn swot_quadrants_split_on_markers() {
        let text = "preamble **STRENGTHS**: strong brand **Weaknesses** thin margins **OPPORTUNITIES**: new markets **THREATS**: rivals";
        let parser = KeywordParser;
        let swot = parser.parse_swot(text);
        assert!(swot.strengths.contains("strong brand"));
        assert!(swot.weaknesses.contains("thin margins"));
        assert!(swot.opportunities.contains("new markets"));
        assert!(swot.threats.contains("rivals"));
        assert!(!swot.strengths.contains("preamble"));
    }

    #[test]
    fn swot_text_before_first_header_is_dropped() {
        let parser = KeywordParser;
        let swot = parser.parse_swot("unattributed leading text with no headers");
        assert_eq!(swot, SwotComponents::default());
    }

    #[test]
    fn decision_sections_are_extracted_by_paragraph() {
        let text = "**1. INVESTMENT THESIS**\nDurable franchise at a fair price.\n\n**2. RED FLAGS ASSESSMENT**\nNone material.\n\n**KEY CATALYSTS & RISKS**\nProduct cycle upside.";
        let parser = KeywordParser;
        let decision = parser.parse_decision(text);
        assert!(decision.investment_thesis.contains("Durable franchise"));
        assert!(decision.red_flags.contains("None material"));
        assert!(decision.catalysts_and_risks.contains("Product cycle"));
    }

    #[test]
    fn json_block_skips_braces_inside_strings() {
        let text = r#"Here you go: {"note": "uses { and } freely", "n": 1} trailing {"x": 2}"#;
        let block = first_json_block(text).unwrap();
        assert_eq!(block, r#"{"note": "uses { and } freely", "n": 1}"#);
    }

    #[test]
    fn json_block_handles_nesting() {
        let text = r#"{"current_year": {"revenue": 1000}}"#;
        assert_eq!(first_json_block(text).unwrap(), text);
    }

    #[test]
    fn unterminated_json_block_is_none() {
        assert!(first_json_block(r#"{"open": true"#).is_none());
        assert!(first_json_block("no braces at all").is_none());
    }
}
