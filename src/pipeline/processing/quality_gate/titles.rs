//! Job-title exclusion table.
//!
//! Each row excludes titles matching `exclude` unless they also match
//! `unless`, e.g. "Senior Developer" is excluded but "Senior Director" is not.

use once_cell::sync::Lazy;
use regex::Regex;
use serde::{Deserialize, Serialize};

use crate::error::ConfigError;

/// One row of the title table as written in configuration.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TitlePatternSpec {
    pub category: String,
    pub exclude: String,
    #[serde(default)]
    pub unless: Option<String>,
}

impl TitlePatternSpec {
    fn new(category: &str, exclude: &str, unless: Option<&str>) -> Self {
        Self {
            category: category.to_string(),
            exclude: exclude.to_string(),
            unless: unless.map(str::to_string),
        }
    }
}

/// Decision-maker words shared by every row that can be rescued. Managers and
/// team leads count as decision-makers whatever function they manage.
const LEADERSHIP: &str = r"\b(head|chief|director|vp|vice\s+president|owner|founder|co-founder|partner|officer|ceo|cto|cfo|coo|cmo|president|managing|manager|lead)\b";

static DEFAULT_TITLE_PATTERNS: Lazy<Vec<TitlePatternSpec>> = Lazy::new(|| {
    vec![
        TitlePatternSpec::new("intern", r"\b(intern|internship|trainee|praktikant)\b", None),
        TitlePatternSpec::new("student", r"\b(student|apprentice)\b", None),
        TitlePatternSpec::new("junior", r"\b(junior|jr\.?)(\s|$)", None),
        TitlePatternSpec::new(
            "assistant",
            r"\bassistant\b",
            Some(r"\bassistant\s+(director|general\s+manager|vice\s+president)\b"),
        ),
        TitlePatternSpec::new("senior_ic", r"\bsenior\b", Some(LEADERSHIP)),
        TitlePatternSpec::new("engineer", r"\b(engineer|developer|programmer)\b", Some(LEADERSHIP)),
        TitlePatternSpec::new("specialist", r"\bspecialist\b", Some(LEADERSHIP)),
        TitlePatternSpec::new("coordinator", r"\bcoordinator\b", None),
        TitlePatternSpec::new("analyst", r"\banalyst\b", Some(LEADERSHIP)),
        TitlePatternSpec::new(
            "sales_rep",
            r"\b(representative|sales\s+rep|sales\s+agent|account\s+executive)\b",
            Some(LEADERSHIP),
        ),
        TitlePatternSpec::new("accounting", r"\b(accountant|bookkeeper)\b", Some(LEADERSHIP)),
        TitlePatternSpec::new(
            "support",
            r"\b(support|helpdesk|help\s+desk|customer\s+service)\b",
            Some(LEADERSHIP),
        ),
        TitlePatternSpec::new("recruiter", r"\b(recruiter|talent\s+acquisition)\b", Some(LEADERSHIP)),
        TitlePatternSpec::new(
            "frontline",
            r"\b(technician|operator|driver|cashier|waiter|cook|nurse|teacher|consultant)\b",
            Some(LEADERSHIP),
        ),
    ]
});

pub fn default_title_patterns() -> &'static [TitlePatternSpec] {
    &DEFAULT_TITLE_PATTERNS
}

#[derive(Debug, Clone)]
struct TitlePattern {
    category: String,
    exclude: Regex,
    unless: Option<Regex>,
}

/// Compiled title table.
#[derive(Debug, Clone)]
pub struct TitleTable {
    patterns: Vec<TitlePattern>,
}

fn compile(stage: &str, pattern: &str) -> Result<Regex, ConfigError> {
    Regex::new(&format!("(?i){pattern}")).map_err(|e| ConfigError::InvalidStage {
        stage: stage.to_string(),
        message: format!("bad title pattern {pattern:?}: {e}"),
    })
}

impl TitleTable {
    /// Compile the default rows followed by `extra`.
    pub fn compile(stage: &str, extra: &[TitlePatternSpec]) -> Result<Self, ConfigError> {
        let patterns = default_title_patterns()
            .iter()
            .chain(extra)
            .map(|spec| {
                Ok(TitlePattern {
                    category: spec.category.clone(),
                    exclude: compile(stage, &spec.exclude)?,
                    unless: spec.unless.as_deref().map(|u| compile(stage, u)).transpose()?,
                })
            })
            .collect::<Result<Vec<_>, ConfigError>>()?;
        Ok(Self { patterns })
    }

    /// Category of the first row that excludes `title`.
    pub fn excluded_category(&self, title: &str) -> Option<&str> {
        self.patterns
            .iter()
            .find(|p| {
                p.exclude.is_match(title) && !p.unless.as_ref().is_some_and(|u| u.is_match(title))
            })
            .map(|p| p.category.as_str())
    }
}
