// src/findings.rs
// =============================================================================
// Finding records - one struct per kind of issue we detect on a page.
//
// The analyzer produces these bare, with no idea which page they came from.
// The crawl orchestrator wraps each one in Found<T> when it merges them into
// a job, stamping the page URL as `foundOn`.
// =============================================================================

use serde::Serialize;
use std::fmt;

use crate::render::ConsoleLevel;

/// A link that did not answer with a success or redirect
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct BrokenLink {
    pub url: String,
    /// Short status label, e.g. "broken" or "timeout"
    pub status: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub message: Option<String>,
}

/// An uncaught script error, or a failure to analyze the page at all
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct JsError {
    pub message: String,
}

/// An image that did not load
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct MissingImage {
    pub src: String,
    /// The alt text, or "(no alt)"
    pub alt: String,
}

/// A console message of warning or error severity
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ConsoleLog {
    #[serde(rename = "type")]
    pub level: ConsoleLevel,
    pub text: String,
}

/// Which kind of element a dead control is
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum ElementKind {
    Link,
    Button,
}

impl fmt::Display for ElementKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ElementKind::Link => write!(f, "link"),
            ElementKind::Button => write!(f, "button"),
        }
    }
}

/// An interactive-looking element that does nothing when clicked
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct DeadButton {
    #[serde(rename = "type")]
    pub element: ElementKind,
    /// Visible text, at most 50 characters
    pub text: String,
}

/// A page that took longer than the slow-page threshold to load
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct SlowPage {
    pub url: String,
    /// Milliseconds
    pub load_time: u64,
}

/// An image with empty or whitespace-only alt text
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct MissingAlt {
    pub src: String,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum FormDefect {
    #[serde(rename = "No action")]
    NoAction,
    #[serde(rename = "No submit button")]
    NoSubmitButton,
}

impl fmt::Display for FormDefect {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            FormDefect::NoAction => write!(f, "No action"),
            FormDefect::NoSubmitButton => write!(f, "No submit button"),
        }
    }
}

/// A defect in one form
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct FormIssue {
    /// "Form N", N being the 1-based position on the page
    pub form: String,
    pub issue: FormDefect,
}

/// A finding stamped with the page it was found on
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Found<T> {
    #[serde(flatten)]
    pub finding: T,
    pub found_on: String,
}

impl<T> Found<T> {
    pub fn on(page_url: &str, finding: T) -> Self {
        Self {
            finding,
            found_on: page_url.to_string(),
        }
    }
}
