//! Prompt templates, retrieval query sets, and the filing sections each
//! analysis stage reads from.

pub const SUMMARY_SECTIONS: &[&str] = &["ITEM_1", "ITEM_7"];
pub const SWOT_SECTIONS: &[&str] = &["ITEM_1", "ITEM_1A", "ITEM_7", "ITEM_8"];
pub const METRICS_SECTIONS: &[&str] = &["ITEM_8"];

pub const SUMMARY_TOP_K: usize = 3;
pub const SWOT_TOP_K: usize = 3;
pub const METRICS_TOP_K: usize = 5;
pub const RED_FLAGS_TOP_K: usize = 3;

pub fn section_scope(ids: &[&str]) -> Vec<String> {
    ids.iter().map(|s| s.to_string()).collect()
}

pub fn summary_queries() -> Vec<String> {
    to_queries(&[
        "business model and strategy",
        "revenue drivers and market position",
        "strategic initiatives and direction",
        "management discussion and analysis",
        "forward-looking statements",
    ])
}

pub fn strengths_queries() -> Vec<String> {
    to_queries(&[
        "competitive advantages and market position",
        "pricing power and brand value",
        "profit margins and profitability",
        "research and development capabilities",
        "customer retention and satisfaction",
    ])
}

pub fn weaknesses_queries() -> Vec<String> {
    to_queries(&[
        "risks and challenges",
        "competitive pressures",
        "customer concentration",
        "operational inefficiencies",
        "debt and financial obligations",
    ])
}

pub fn opportunities_queries() -> Vec<String> {
    to_queries(&[
        "growth initiatives and expansion",
        "new markets and products",
        "strategic acquisitions",
        "industry trends and tailwinds",
        "innovation and technology",
    ])
}

pub fn threats_queries() -> Vec<String> {
    to_queries(&[
        "competition and market disruption",
        "regulatory risks and compliance",
        "macroeconomic factors",
        "supply chain vulnerabilities",
        "technology disruption",
    ])
}

pub fn metrics_queries() -> Vec<String> {
    to_queries(&[
        "financial statements and results",
        "balance sheet assets and liabilities",
        "cash flow statement",
        "income statement revenue and expenses",
        "key performance indicators",
    ])
}

pub fn red_flag_queries() -> Vec<String> {
    to_queries(&[
        "accounting policies and changes",
        "related party transactions",
        "goodwill and intangible assets",
        "auditor changes and disagreements",
        "legal proceedings and contingencies",
    ])
}

fn to_queries(items: &[&str]) -> Vec<String> {
    items.iter().map(|s| s.to_string()).collect()
}

pub const SUMMARY_SYSTEM: &str =
    "You are a financial analyst specializing in SEC filing analysis.";

pub fn summary_prompt(context: &str, company: &str, fiscal_year: i32) -> String {
    format!(
        "You are a financial analyst. Write a concise executive summary of a \
company's 10-K filing.

Context from SEC Filing:
{context}

Company: {company}
Fiscal Year: {fiscal_year}

Provide a 300-word executive summary covering:
1. Core business model and significant changes from the prior year
2. Key strategic initiatives and direction
3. Primary revenue drivers and market position
4. Management tone (optimistic, defensive, or neutral)
5. Major risks or opportunities mentioned

Focus on material changes and forward-looking statements. Be objective.

Summary:"
    )
}

pub const SWOT_SYSTEM: &str =
    "You are a buy-side analyst performing hostile witness analysis on SEC filings.";

pub fn swot_prompt(context: &str, company: &str, fiscal_year: i32) -> String {
    format!(
        "You are a buy-side analyst examining a 10-K filing. Extract structural \
reality, not corporate narrative.

Context from SEC Filing:
{context}

Company: {company}
Fiscal Year: {fiscal_year}

Perform a rigorous SWOT analysis with these exact headers:

**STRENGTHS**:
- Competitive advantages with evidence (pricing power, market share)
- Financial strengths (margin trends, cash generation, balance sheet)

**WEAKNESSES**:
- Structural vulnerabilities (customer concentration, supply chain)
- Financial weaknesses (margin compression, high debt)

**OPPORTUNITIES**:
- Addressable market expansion and strategic initiatives
- Industry tailwinds and partnership potential

**THREATS**:
- Competitive and regulatory pressure
- Macroeconomic exposure and technology disruption

Cite specific evidence from the filing for each point. Quantify where possible.

SWOT Analysis:"
    )
}

pub const METRICS_SYSTEM: &str =
    "You are a financial data analyst extracting KPIs from SEC filings.";

pub fn metrics_prompt(context: &str, company: &str, fiscal_year: i32, prior_year: i32) -> String {
    format!(
        "Extract financial metrics from the filing data below.

Financial Data from Filing:
{context}

Company: {company}
Fiscal Year: {fiscal_year}
Prior Year: {prior_year}

Extract revenue, cost of goods sold, gross profit, operating income, net \
income, EPS, total assets, current assets, total liabilities, current \
liabilities, total debt, stockholders' equity, operating cash flow, capital \
expenditures, and free cash flow for both fiscal years.

Return the data as JSON with top-level keys \"current_year\" and \
\"prior_year\", each mapping snake_case metric names to plain numbers. Use \
consistent units and omit metrics the filing does not state.

Metrics:"
    )
}

pub const DECISION_SYSTEM_PREFIX: &str =
    "You are a chief investment officer synthesizing multi-agent analysis into an investment recommendation.";

pub fn decision_system(red_flags_context: &str) -> String {
    format!(
        "{DECISION_SYSTEM_PREFIX}

Additional context about potential red flags:
{red_flags_context}

Be brutally honest and rigorous in your assessment."
    )
}

pub fn decision_prompt(
    summary: &str,
    swot: &str,
    metrics: &str,
    company: &str,
    fiscal_year: i32,
) -> String {
    format!(
        "**Summary Report:**
{summary}

**SWOT Analysis:**
{swot}

**Financial Metrics:**
{metrics}

Company: {company}
Fiscal Year: {fiscal_year}

Based on the analysis above, provide:

**1. INVESTMENT THESIS**
Synthesize the key findings into a coherent narrative (2-3 paragraphs).

**2. RED FLAGS ASSESSMENT**
Note revenue recognition changes, impairments, related party transactions, \
auditor changes, executive turnover, or inconsistencies between narrative \
and numbers.

**3. INVESTMENT RECOMMENDATION**
Choose one: **STRONG BUY | BUY | HOLD | SELL | STRONG SELL**

Confidence Level: **HIGH | MEDIUM | LOW**

**4. KEY CATALYSTS & RISKS**
Top 3 reasons the stock could outperform and top 3 risks to the thesis.

**5. SUGGESTED POSITION SIZING**
Based on risk/reward: **OVERWEIGHT | MARKET WEIGHT | UNDERWEIGHT | AVOID**

If the data suggests the narrative does not match reality, say so explicitly.

Investment Decision:"
    )
}
