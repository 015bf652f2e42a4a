//! Severity derivation from risk factors.
//!
//! Each risk factor is classified by the sink or source it mentions. A
//! result's severity is its worst category; a result with no risk factors is
//! `Low`.
//!
//! Keywords match whole words only, so "retrieval" does not mention `eval`.

use regex::{escape, RegexSet};
use serde::{Deserialize, Serialize};
use std::sync::LazyLock;

use super::Severity;

/// Script-execution sinks.
const EXECUTION_SINKS: &[&str] = &[
    "innerhtml",
    "outerhtml",
    "insertadjacenthtml",
    "document.write",
    "eval",
    "new function",
    "settimeout",
    "setinterval",
    "event handler",
    "javascript:",
    "srcdoc",
];

/// Untrusted sources and DOM writes that do not execute script by themselves.
const UNTRUSTED_SOURCES: &[&str] = &[
    "location",
    "hash",
    "query",
    "url parameter",
    "localstorage",
    "sessionstorage",
    "postmessage",
    "referrer",
    "window.name",
    "document.cookie",
    "dom manipulation",
    "used in dom",
    "untrusted",
    "unsanitized",
];

static SINK_MATCHER: LazyLock<Option<RegexSet>> = LazyLock::new(|| keyword_set(EXECUTION_SINKS));
static SOURCE_MATCHER: LazyLock<Option<RegexSet>> = LazyLock::new(|| keyword_set(UNTRUSTED_SOURCES));

/// Word-bounded, case-insensitive pattern for one keyword. A trailing plural
/// suffix is allowed.
fn keyword_pattern(keyword: &str) -> String {
    let starts_word = keyword.chars().next().is_some_and(|c| c.is_alphanumeric());
    let ends_word = keyword.chars().last().is_some_and(|c| c.is_alphanumeric());
    format!(
        "(?i){}{}{}",
        if starts_word { r"\b" } else { "" },
        escape(keyword),
        if ends_word { r"(?:s|es)?\b" } else { "" },
    )
}

fn keyword_set(keywords: &[&str]) -> Option<RegexSet> {
    RegexSet::new(keywords.iter().map(|k| keyword_pattern(k))).ok()
}

fn mentions(matcher: &Option<RegexSet>, text: &str) -> bool {
    matcher.as_ref().is_some_and(|set| set.is_match(text))
}

/// Category of a single risk factor.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RiskCategory {
    /// Informational; no known sink or source.
    Informational,
    /// Untrusted data reaches the DOM.
    UntrustedSource,
    /// Untrusted data reaches a script-execution sink.
    ExecutionSink,
}

impl RiskCategory {
    /// Returns the severity this category implies.
    #[must_use]
    pub fn severity(self) -> Severity {
        match self {
            Self::Informational => Severity::Low,
            Self::UntrustedSource => Severity::Medium,
            Self::ExecutionSink => Severity::High,
        }
    }
}

/// Classifies one risk factor by the keywords it contains.
#[must_use]
pub fn classify_risk_factor(factor: &str) -> RiskCategory {
    if mentions(&SINK_MATCHER, factor) {
        RiskCategory::ExecutionSink
    } else if mentions(&SOURCE_MATCHER, factor) {
        RiskCategory::UntrustedSource
    } else {
        RiskCategory::Informational
    }
}

/// Returns the severity of the worst risk factor, or `Low` if there are none.
#[must_use]
pub fn derive_severity<S: AsRef<str>>(risk_factors: &[S]) -> Severity {
    risk_factors
        .iter()
        .map(|f| classify_risk_factor(f.as_ref()))
        .max()
        .map_or(Severity::Low, RiskCategory::severity)
}
