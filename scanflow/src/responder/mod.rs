//! Keyword-driven canned responses.
//!
//! A [`Responder`] holds ordered rules. Each rule's keywords are compiled into
//! one case-insensitive pattern of a [`RegexSet`]; the lowest-index rule that
//! matches a message wins, and the fallback answers everything else.

use regex::{escape, RegexSet};
use serde::{Deserialize, Serialize};

use crate::errors::{ConfigurationError, ErrorInfo};

/// One topic the responder knows about.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ResponseRule {
    /// Title offered as a suggested question.
    pub topic: String,
    /// Phrases that select this rule, matched case-insensitively as substrings.
    pub keywords: Vec<String>,
    /// The canned answer.
    pub response: String,
}

impl ResponseRule {
    /// Creates a rule.
    pub fn new<K, S>(topic: impl Into<String>, keywords: K, response: impl Into<String>) -> Self
    where
        K: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            topic: topic.into(),
            keywords: keywords.into_iter().map(Into::into).collect(),
            response: response.into(),
        }
    }

    fn pattern(&self) -> String {
        let alternatives: Vec<String> = self.keywords.iter().map(|k| escape(k)).collect();
        format!("(?i)(?:{})", alternatives.join("|"))
    }
}

/// Answers messages from an ordered rule list.
#[derive(Debug, Clone)]
pub struct Responder {
    rules: Vec<ResponseRule>,
    matcher: RegexSet,
    fallback: String,
}

impl Responder {
    /// Compiles a responder.
    pub fn new(rules: Vec<ResponseRule>, fallback: impl Into<String>) -> Result<Self, ConfigurationError> {
        if let Some(rule) = rules.iter().find(|r| r.keywords.iter().all(|k| k.trim().is_empty())) {
            return Err(ConfigurationError::new(format!(
                "Rule '{}' has no keywords",
                rule.topic
            ))
            .with_error_info(ErrorInfo::new("RESPONDER-PATTERN", "Every rule needs a keyword")));
        }

        let matcher = RegexSet::new(rules.iter().map(ResponseRule::pattern)).map_err(|e| {
            ConfigurationError::new(format!("Invalid responder pattern: {e}")).with_error_info(
                ErrorInfo::new("RESPONDER-PATTERN", "Rule keywords did not compile"),
            )
        })?;

        Ok(Self {
            rules,
            matcher,
            fallback: fallback.into(),
        })
    }

    /// The DOM-XSS assistant: five topics and a fallback.
    #[must_use]
    pub fn security_assistant() -> Self {
        let rules = vec![
            ResponseRule::new(
                "What is DOM XSS?",
                ["what is dom xss"],
                "DOM-based cross-site scripting is a client-side vulnerability: page scripts \
                 take attacker-controlled data and write it into the DOM unsafely. The payload \
                 never has to reach the server, which makes it harder to spot with server-side \
                 defenses alone.",
            ),
            ResponseRule::new(
                "How to prevent DOM XSS?",
                ["how to prevent"],
                "Prefer safe DOM APIs such as textContent over innerHTML, sanitize untrusted \
                 input before it reaches a sink, enforce a strict Content Security Policy, rely \
                 on libraries that encode output for you, validate input on client and server, \
                 and scan the application regularly.",
            ),
            ResponseRule::new(
                "Common attack vectors",
                ["attack vectors", "common attack"],
                "Typical sources are URL fragments and query parameters, document.location, and \
                 values read from localStorage or sessionStorage. Typical sinks are eval(), \
                 innerHTML and outerHTML, and event handlers built from untrusted strings.",
            ),
            ResponseRule::new(
                "DOM XSS severity and risk",
                ["severity", "risk"],
                "DOM XSS is usually rated medium to high. A successful attack runs with the \
                 page's privileges and can hijack sessions, steal credentials or exfiltrate \
                 data, so browser mitigations alone are not enough.",
            ),
            ResponseRule::new(
                "Example of DOM XSS",
                ["example"],
                "A page reads ?name= from the URL and runs \
                 element.innerHTML = 'Hello, ' + name. A link whose name parameter carries \
                 markup with a script then executes that script in the victim's browser.",
            ),
        ];
        let fallback = "Happy to help with DOM XSS. Ask about prevention, attack vectors, risk, \
                        or a concrete example.";

        Self {
            matcher: RegexSet::new(rules.iter().map(ResponseRule::pattern))
                .unwrap_or_else(|_| RegexSet::empty()),
            rules,
            fallback: fallback.to_string(),
        }
    }

    /// Returns the answer for a message.
    #[must_use]
    pub fn respond(&self, message: &str) -> &str {
        self.matched_rule(message)
            .map_or(self.fallback.as_str(), |rule| rule.response.as_str())
    }

    /// Returns the rule that answers a message, if any.
    #[must_use]
    pub fn matched_rule(&self, message: &str) -> Option<&ResponseRule> {
        self.matcher
            .matches(message)
            .iter()
            .next()
            .and_then(|index| self.rules.get(index))
    }

    /// Returns the topic titles, in rule order.
    #[must_use]
    pub fn suggested_topics(&self) -> Vec<&str> {
        self.rules.iter().map(|r| r.topic.as_str()).collect()
    }
}
