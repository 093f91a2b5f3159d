use std::collections::BTreeMap;
use std::fs;
use std::path::Path;

use once_cell::sync::Lazy;
use regex::Regex;
use serde::{Deserialize, Serialize};
use tracing::info;

use crate::error::{Result, TenkError};

/// 10-K item headings the section splitter recognizes, with their display
/// titles. Only the items the downstream agents read are matched; everything
/// between two recognized headings belongs to the earlier one.
static SECTION_PATTERNS: Lazy<Vec<(&'static str, &'static str, Regex)>> = Lazy::new(|| {
    vec![
        (
            "ITEM_1",
            "Business",
            Regex::new(r"(?i)ITEM\s+1\.?\s*[-:—]?\s*BUSINESS").expect("pattern"),
        ),
        (
            "ITEM_1A",
            "Risk Factors",
            Regex::new(r"(?i)ITEM\s+1A\.?\s*[-:—]?\s*RISK\s+FACTORS").expect("pattern"),
        ),
        (
            "ITEM_7",
            "Management's Discussion and Analysis",
            Regex::new(r"(?i)ITEM\s+7\.?\s*[-:—]?\s*MANAGEMENT'?S?\s+DISCUSSION").expect("pattern"),
        ),
        (
            "ITEM_8",
            "Financial Statements and Supplementary Data",
            Regex::new(r"(?i)ITEM\s+8\.?\s*[-:—]?\s*FINANCIAL\s+STATEMENTS").expect("pattern"),
        ),
        (
            "ITEM_9A",
            "Controls and Procedures",
            Regex::new(r"(?i)ITEM\s+9A\.?\s*[-:—]?\s*CONTROLS\s+AND\s+PROCEDURES").expect("pattern"),
        ),
    ]
});

/// A named contiguous subrange of the filing text.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Section {
    pub section_id: String,
    pub title: String,
    pub start_pos: usize,
    pub end_pos: usize,
    pub text: String,
    pub word_count: usize,
    pub char_count: usize,
    pub start_page: u32,
}

impl Section {
    fn from_range(
        section_id: &str,
        title: &str,
        start_pos: usize,
        end_pos: usize,
        text: &str,
        start_page: u32,
    ) -> Self {
        Self {
            section_id: section_id.to_string(),
            title: title.to_string(),
            start_pos,
            end_pos,
            word_count: text.split_whitespace().count(),
            char_count: text.len(),
            text: text.to_string(),
            start_page,
        }
    }
}

/// A pre-extracted section as supplied by an external filing source.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SectionInput {
    pub text: String,
    #[serde(default)]
    pub title: Option<String>,
    #[serde(default = "default_page")]
    pub start_page: u32,
}

fn default_page() -> u32 {
    1
}

/// The filing-source wire contract: full text plus an optional section map.
/// The core is agnostic to whether this came from an API fetch, an HTML
/// scrape, or PDF extraction.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Filing {
    pub ticker: String,
    pub fiscal_year: i32,
    #[serde(default = "default_filing_type")]
    pub filing_type: String,
    #[serde(default)]
    pub text: String,
    #[serde(default)]
    pub sections: BTreeMap<String, SectionInput>,
}

fn default_filing_type() -> String {
    "10-K".to_string()
}

impl Filing {
    pub fn load(path: &Path) -> Result<Self> {
        let raw = fs::read_to_string(path).map_err(|e| {
            TenkError::NotFound(format!("filing file {}: {e}", path.display()))
        })?;
        let filing: Filing = serde_json::from_str(&raw)?;
        if filing.ticker.trim().is_empty() {
            return Err(TenkError::Config("filing is missing a ticker".into()));
        }
        if filing.text.trim().is_empty() && filing.sections.is_empty() {
            return Err(TenkError::Config(
                "filing has neither text nor pre-extracted sections".into(),
            ));
        }
        Ok(filing)
    }

    /// Deterministic document identity: `{ticker}_{fiscal_year}_{type}` with
    /// the dash dropped from the filing type.
    pub fn doc_id(&self) -> String {
        format!(
            "{}_{}_{}",
            self.ticker,
            self.fiscal_year,
            self.filing_type.replace('-', "")
        )
    }

    /// Resolves the filing into ordered sections: pre-extracted sections are
    /// used as-is (with synthetic cumulative positions), otherwise the raw
    /// text is split on recognized 10-K item headings.
    pub fn resolve_sections(&self) -> Result<Vec<Section>> {
        if !self.sections.is_empty() {
            let mut pos = 0usize;
            let mut out = Vec::with_capacity(self.sections.len());
            for (section_id, input) in &self.sections {
                if input.text.trim().is_empty() {
                    continue;
                }
                let end = pos + input.text.len();
                out.push(Section::from_range(
                    section_id,
                    input.title.as_deref().unwrap_or(section_id),
                    pos,
                    end,
                    &input.text,
                    input.start_page,
                ));
                pos = end;
            }
            return Ok(out);
        }
        identify_sections(&self.text)
    }
}

/// Splits raw filing text on 10-K item headings. Each section runs from its
/// heading to the next recognized heading; the last section runs to the end
/// of the document, so the sections are non-overlapping, contiguous from the
/// first heading on, and ordered by start position.
pub fn identify_sections(text: &str) -> Result<Vec<Section>> {
    let mut marks: Vec<(usize, &'static str, &'static str)> = Vec::new();
    for (section_id, title, pattern) in SECTION_PATTERNS.iter() {
        // The first occurrence is usually the table of contents; prefer the
        // second match (the body heading) when one exists.
        let mut found = pattern.find_iter(text);
        let first = found.next();
        let start = match found.next().or(first) {
            Some(m) => m.start(),
            None => continue,
        };
        marks.push((start, section_id, title));
    }
    if marks.is_empty() {
        return Err(TenkError::NotFound(
            "no recognizable 10-K item headings in filing text".into(),
        ));
    }
    marks.sort_by_key(|(start, _, _)| *start);
    marks.dedup_by_key(|(start, _, _)| *start);

    let mut sections = Vec::with_capacity(marks.len());
    for (i, (start, section_id, title)) in marks.iter().enumerate() {
        let end = marks.get(i + 1).map(|(s, _, _)| *s).unwrap_or(text.len());
        let body = &text[*start..end];
        sections.push(Section::from_range(section_id, title, *start, end, body, 1));
    }
    info!(sections = sections.len(), "identified filing sections");
    Ok(sections)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample_text() -> String {
        let mut text = String::new();
        text.push_str("UNITED STATES SECURITIES AND EXCHANGE COMMISSION\n\n");
        text.push_str("Item 1. Business\nWe design and sell consumer devices. ");
        text.push_str(&"Our products reach customers worldwide. ".repeat(5));
        text.push_str("\n\nItem 1A. Risk Factors\nCompetition is intense. ");
        text.push_str(&"Demand may decline. ".repeat(5));
        text.push_str("\n\nItem 7. Management's Discussion and Analysis\n");
        text.push_str(&"Revenue increased year over year. ".repeat(5));
        text.push_str("\n\nItem 8. Financial Statements\n");
        text.push_str(&"Consolidated balance sheet follows. ".repeat(5));
        text
    }

    #[test]
    fn sections_are_contiguous_ordered_and_end_at_document_length() {
        let text = sample_text();
        let sections = identify_sections(&text).unwrap();
        assert_eq!(
            sections.iter().map(|s| s.section_id.as_str()).collect::<Vec<_>>(),
            vec!["ITEM_1", "ITEM_1A", "ITEM_7", "ITEM_8"]
        );
        for pair in sections.windows(2) {
            assert_eq!(pair[0].end_pos, pair[1].start_pos);
            assert!(pair[0].start_pos < pair[1].start_pos);
        }
        assert_eq!(sections.last().unwrap().end_pos, text.len());
        for section in &sections {
            assert_eq!(section.char_count, section.text.len());
            assert_eq!(&text[section.start_pos..section.end_pos], section.text);
        }
    }

    #[test]
    fn body_heading_preferred_over_table_of_contents() {
        let mut text = String::new();
        text.push_str("TABLE OF CONTENTS\nItem 1. Business ........ 3\n\n");
        text.push_str("Item 1. Business\nActual section body text here.\n");
        let sections = identify_sections(&text).unwrap();
        assert_eq!(sections.len(), 1);
        assert!(sections[0].text.contains("Actual section body"));
        assert!(!sections[0].text.contains("TABLE OF CONTENTS"));
    }

    #[test]
    fn unrecognized_text_is_a_not_found_error() {
        let err = identify_sections("quarterly letter to shareholders").unwrap_err();
        assert!(matches!(err, TenkError::NotFound(_)));
    }

    #[test]
    fn doc_id_is_deterministic() {
        let filing = Filing {
            ticker: "AAPL".into(),
            fiscal_year: 2023,
            filing_type: "10-K".into(),
            text: String::new(),
            sections: BTreeMap::new(),
        };
        assert_eq!(filing.doc_id(), "AAPL_2023_10K");
    }

    #[test]
    fn presupplied_sections_get_cumulative_positions() {
        let mut sections = BTreeMap::new();
        sections.insert(
            "ITEM_1".to_string(),
            SectionInput {
                text: "business overview".into(),
                title: Some("Business".into()),
                start_page: 3,
            },
        );
        sections.insert(
            "ITEM_7".to_string(),
            SectionInput {
                text: "management discussion".into(),
                title: None,
                start_page: 25,
            },
        );
        let filing = Filing {
            ticker: "MSFT".into(),
            fiscal_year: 2024,
            filing_type: "10-K".into(),
            text: String::new(),
            sections,
        };
        let resolved = filing.resolve_sections().unwrap();
        assert_eq!(resolved.len(), 2);
        assert_eq!(resolved[0].start_pos, 0);
        assert_eq!(resolved[0].end_pos, resolved[1].start_pos);
        assert_eq!(resolved[1].start_page, 25);
    }
}
