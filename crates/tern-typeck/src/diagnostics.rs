//! Ariadne-based rendering of diagnostics.
//!
//! Each diagnostic becomes one report: its code, the message, and a label
//! on its range. Candidate signatures attached to a diagnostic are listed
//! in the help line. `json_mode` instead emits one compact JSON object per
//! diagnostic for tools.

use ariadne::{Color, Config, Label, Report, ReportKind, Source};
use serde::Serialize;
use tern_common::LineIndex;

use crate::error::{Diagnostic, DiagnosticKind, Severity};

/// How diagnostics are rendered.
#[derive(Clone, Debug, Default)]
pub struct DiagnosticOptions {
    pub color: bool,
    pub json: bool,
}

impl DiagnosticOptions {
    /// Plain text without ANSI escapes, for snapshots and logs.
    pub fn colorless() -> Self {
        DiagnosticOptions { color: false, json: false }
    }

    pub fn json_mode() -> Self {
        DiagnosticOptions { color: false, json: true }
    }
}

// ── JSON ───────────────────────────────────────────────────────────────

#[derive(Serialize)]
struct JsonDiagnostic<'d> {
    code: &'static str,
    kind: DiagnosticKind,
    severity: &'static str,
    message: &'d str,
    file: &'d str,
    spans: Vec<JsonSpan>,
    #[serde(skip_serializing_if = "Option::is_none")]
    candidates: Option<&'d [String]>,
}

#[derive(Serialize)]
struct JsonSpan {
    start: u32,
    end: u32,
    /// 1-based position of `start`.
    line: u32,
    column: u32,
    label: String,
}

fn render_json(diagnostic: &Diagnostic, source: &str, filename: &str) -> String {
    let (line, column) = LineIndex::new(source).line_col(diagnostic.range.start);
    let json = JsonDiagnostic {
        code: diagnostic.kind.code(),
        kind: diagnostic.kind,
        severity: match diagnostic.severity {
            Severity::Error => "error",
            Severity::Warning => "warning",
        },
        message: &diagnostic.message,
        file: filename,
        spans: vec![JsonSpan {
            start: diagnostic.range.start,
            end: diagnostic.range.end,
            line,
            column,
            label: label_text(diagnostic),
        }],
        candidates: Some(diagnostic.related_signatures.as_slice()).filter(|c| !c.is_empty()),
    };
    serde_json::to_string(&json).unwrap_or_else(|_| diagnostic.to_string())
}

// ── Text ───────────────────────────────────────────────────────────────

/// What the label under the range says.
fn label_text(diagnostic: &Diagnostic) -> String {
    match (diagnostic.kind, diagnostic.related_types.as_slice()) {
        (DiagnosticKind::TypeMismatch, [expected, found]) => {
            format!("expected {}, found {}", expected, found)
        }
        (DiagnosticKind::TypeMismatch, _) => "wrong number of arguments".to_string(),
        (DiagnosticKind::UnresolvedReference, _) => "not found in this scope".to_string(),
        (DiagnosticKind::OverloadResolutionAmbiguity, _) => "cannot choose between overloads".to_string(),
        (DiagnosticKind::TooComplex, _) => "too many candidates to consider".to_string(),
        (DiagnosticKind::CannotInferParameterType, _) => "add a type annotation".to_string(),
        (DiagnosticKind::UnusedVariable, _) | (DiagnosticKind::UnusedParameter, _) => {
            "declared here".to_string()
        }
        (DiagnosticKind::UnreachableCode, _) => "never executed".to_string(),
    }
}

fn help_text(diagnostic: &Diagnostic) -> Option<String> {
    match diagnostic.related_signatures.as_slice() {
        [] => match diagnostic.kind {
            DiagnosticKind::TooComplex => {
                Some("split the expression or annotate the function literals in it".to_string())
            }
            DiagnosticKind::UnusedVariable | DiagnosticKind::UnusedParameter => {
                Some("prefix the name with `_` to silence this warning".to_string())
            }
            _ => None,
        },
        [only] => Some(format!("candidate: {}", only)),
        many => Some(format!("candidates:\n{}", many.join("\n"))),
    }
}

/// Render one diagnostic against the unit's source text.
pub fn render_diagnostic(
    diagnostic: &Diagnostic,
    source: &str,
    filename: &str,
    options: &DiagnosticOptions,
) -> String {
    if options.json {
        return render_json(diagnostic, source, filename);
    }

    let config = Config::default().with_color(options.color);
    let span = diagnostic.range.to_range(source.len());
    let (kind, color) = match diagnostic.severity {
        Severity::Error => (ReportKind::Error, Color::Red),
        Severity::Warning => (ReportKind::Warning, Color::Yellow),
    };

    let mut builder = Report::build(kind, span.clone())
        .with_code(diagnostic.kind.code())
        .with_message(&diagnostic.message)
        .with_config(config)
        .with_label(Label::new(span).with_message(label_text(diagnostic)).with_color(color));
    if let Some(help) = help_text(diagnostic) {
        builder.set_help(help);
    }
    let report = builder.finish();

    let mut buf = Vec::new();
    if report.write(Source::from(source), &mut buf).is_err() {
        return diagnostic.to_string();
    }
    String::from_utf8_lossy(&buf).into_owned()
}
