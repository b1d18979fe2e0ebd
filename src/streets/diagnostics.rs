//! Errors and diagnostics for street generation
//!
//! Fatal input problems abort a run with [`StreetGenError`]. Everything else
//! is recoverable and recorded as a [`Diagnostic`] next to the output.

use serde::{Deserialize, Serialize};
use thiserror::Error;

use super::types::{BlockId, SegmentId};

/// Fatal input errors; raised before growth begins.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum StreetGenError {
    #[error("settlement has no entry points")]
    NoEntryPoints,
    #[error("degenerate settlement boundary: {0}")]
    DegenerateBoundary(String),
    #[error("invalid settlement: {0}")]
    InvalidSettlement(String),
    #[error("invalid configuration: {0}")]
    InvalidConfig(String),
}

/// A failed run: the fatal error plus every diagnostic gathered so far.
#[derive(Debug, Clone, Error)]
#[error("street generation failed for settlement {settlement}: {error}")]
pub struct GenerationFailure {
    pub settlement: u32,
    pub error: StreetGenError,
    pub diagnostics: Vec<Diagnostic>,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DiagnosticKind {
    InputError,
    GrowthStall,
    GeometryDegenerate,
    ConnectivityViolation,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Severity {
    Info,
    Warning,
    Error,
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Diagnostic {
    pub kind: DiagnosticKind,
    pub severity: Severity,
    pub message: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub block: Option<BlockId>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub segment: Option<SegmentId>,
}

impl Diagnostic {
    pub fn new(kind: DiagnosticKind, severity: Severity, message: impl Into<String>) -> Self {
        Self {
            kind,
            severity,
            message: message.into(),
            block: None,
            segment: None,
        }
    }

    pub fn with_block(mut self, block: BlockId) -> Self {
        self.block = Some(block);
        self
    }

    pub fn with_segment(mut self, segment: SegmentId) -> Self {
        self.segment = Some(segment);
        self
    }
}

impl From<&StreetGenError> for Diagnostic {
    fn from(error: &StreetGenError) -> Self {
        Diagnostic::new(DiagnosticKind::InputError, Severity::Error, error.to_string())
    }
}

/// Collects diagnostics for one run and mirrors them to the log.
#[derive(Clone, Debug, Default)]
pub struct Diagnostics {
    entries: Vec<Diagnostic>,
}

impl Diagnostics {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn push(&mut self, diagnostic: Diagnostic) {
        match diagnostic.severity {
            Severity::Info => tracing::debug!(
                target: "settlement_streets::diagnostics",
                kind = ?diagnostic.kind,
                "{}",
                diagnostic.message
            ),
            Severity::Warning => tracing::warn!(
                target: "settlement_streets::diagnostics",
                kind = ?diagnostic.kind,
                "{}",
                diagnostic.message
            ),
            Severity::Error => tracing::error!(
                target: "settlement_streets::diagnostics",
                kind = ?diagnostic.kind,
                "{}",
                diagnostic.message
            ),
        }
        self.entries.push(diagnostic);
    }

    pub fn extend(&mut self, diagnostics: impl IntoIterator<Item = Diagnostic>) {
        for d in diagnostics {
            self.push(d);
        }
    }

    pub fn warn(&mut self, kind: DiagnosticKind, message: impl Into<String>) {
        self.push(Diagnostic::new(kind, Severity::Warning, message));
    }

    pub fn info(&mut self, kind: DiagnosticKind, message: impl Into<String>) {
        self.push(Diagnostic::new(kind, Severity::Info, message));
    }

    pub fn entries(&self) -> &[Diagnostic] {
        &self.entries
    }

    pub fn count(&self, kind: DiagnosticKind) -> usize {
        self.entries.iter().filter(|d| d.kind == kind).count()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn into_vec(self) -> Vec<Diagnostic> {
        self.entries
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_input_error_becomes_error_diagnostic() {
        let diagnostic = Diagnostic::from(&StreetGenError::NoEntryPoints);
        assert_eq!(diagnostic.kind, DiagnosticKind::InputError);
        assert_eq!(diagnostic.severity, Severity::Error);
        assert!(diagnostic.message.contains("entry"));
    }

    #[test]
    fn test_collector_counts_by_kind() {
        let mut diagnostics = Diagnostics::new();
        diagnostics.warn(DiagnosticKind::GrowthStall, "3 attractors unreached");
        diagnostics.info(DiagnosticKind::GeometryDegenerate, "frontage too short");
        diagnostics.push(
            Diagnostic::new(DiagnosticKind::GeometryDegenerate, Severity::Warning, "zero area")
                .with_block(BlockId(4)),
        );

        assert_eq!(diagnostics.count(DiagnosticKind::GeometryDegenerate), 2);
        assert_eq!(diagnostics.count(DiagnosticKind::ConnectivityViolation), 0);
        assert_eq!(diagnostics.entries()[2].block, Some(BlockId(4)));
    }

    #[test]
    fn test_diagnostic_serializes_camel_case() {
        let d = Diagnostic::new(DiagnosticKind::ConnectivityViolation, Severity::Warning, "x")
            .with_segment(SegmentId(9));
        let json = serde_json::to_string(&d).unwrap();
        assert!(json.contains("\"kind\":\"connectivity_violation\""));
        assert!(json.contains("\"segment\":9"));
        assert!(!json.contains("block"));
    }
}
