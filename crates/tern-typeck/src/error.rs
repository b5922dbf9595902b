//! Diagnostics with provenance tracking.
//!
//! Every constraint carries a `ConstraintOrigin` recording which piece of
//! source produced it, so a failed resolution can point at the argument or
//! annotation responsible instead of at the whole call. Diagnostics are
//! values: produced once, never mutated, accumulated in report order by a
//! [`DiagnosticReporter`] and sorted into source order when handed off.

use std::fmt;

use serde::{Deserialize, Serialize};
use tern_common::Span;

use crate::ty::Ty;

/// Where a constraint came from.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum ConstraintOrigin {
    /// `f(x)`: the argument's type must conform to the parameter type.
    Argument { call: Span, arg: Span, index: usize },
    /// `f<Int>()`: an explicit type argument fixes a generic parameter.
    TypeArgument { span: Span, index: usize },
    /// The surrounding context expects a particular result type.
    ExpectedType { span: Span },
    /// A generic parameter's declared upper bound.
    DeclaredBound { span: Span, param: String },
    /// A value leaving a function literal (its final expression or a
    /// labeled return) must conform to the literal's return type.
    LiteralReturn { literal: Span, exit: Span },
    /// The value passed into a function literal must conform to the
    /// literal's declared or inferred parameter type.
    LiteralParameter { literal: Span, index: usize },
    /// `return v` against the enclosing function's declared return type.
    Return { span: Span },
    /// `val x: T = v` against the annotation.
    Annotation { span: Span },
}

impl ConstraintOrigin {
    /// The source range a diagnostic for this constraint points at.
    pub fn span(&self) -> Span {
        match self {
            ConstraintOrigin::Argument { arg, .. } => *arg,
            ConstraintOrigin::TypeArgument { span, .. } => *span,
            ConstraintOrigin::ExpectedType { span } => *span,
            ConstraintOrigin::DeclaredBound { span, .. } => *span,
            ConstraintOrigin::LiteralReturn { exit, .. } => *exit,
            ConstraintOrigin::LiteralParameter { literal, .. } => *literal,
            ConstraintOrigin::Return { span } => *span,
            ConstraintOrigin::Annotation { span } => *span,
        }
    }
}

#[derive(Copy, Clone, Debug, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub enum Severity {
    /// Halts code generation for the unit.
    Error,
    Warning,
}

impl fmt::Display for Severity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Severity::Error => write!(f, "error"),
            Severity::Warning => write!(f, "warning"),
        }
    }
}

/// The diagnostic taxonomy.
#[derive(Copy, Clone, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum DiagnosticKind {
    /// No candidate signature or value for a name.
    UnresolvedReference,
    /// Every candidate failed its constraints, or a value does not conform
    /// to the type its position requires.
    TypeMismatch,
    /// Two or more equally specific candidates resolved.
    OverloadResolutionAmbiguity,
    /// The candidate/literal budget ran out.
    TooComplex,
    /// A literal parameter stayed unconstrained.
    CannotInferParameterType,
    UnusedVariable,
    UnusedParameter,
    /// A statement follows an expression of type `Nothing`.
    UnreachableCode,
}

impl DiagnosticKind {
    pub const ALL: [DiagnosticKind; 8] = [
        DiagnosticKind::UnresolvedReference,
        DiagnosticKind::TypeMismatch,
        DiagnosticKind::OverloadResolutionAmbiguity,
        DiagnosticKind::TooComplex,
        DiagnosticKind::CannotInferParameterType,
        DiagnosticKind::UnusedVariable,
        DiagnosticKind::UnusedParameter,
        DiagnosticKind::UnreachableCode,
    ];

    pub fn severity(self) -> Severity {
        match self {
            DiagnosticKind::UnusedVariable
            | DiagnosticKind::UnusedParameter
            | DiagnosticKind::UnreachableCode => Severity::Warning,
            _ => Severity::Error,
        }
    }

    pub fn code(self) -> &'static str {
        match self {
            DiagnosticKind::UnresolvedReference => "E0101",
            DiagnosticKind::TypeMismatch => "E0102",
            DiagnosticKind::OverloadResolutionAmbiguity => "E0103",
            DiagnosticKind::TooComplex => "E0104",
            DiagnosticKind::CannotInferParameterType => "E0105",
            DiagnosticKind::UnusedVariable => "W0101",
            DiagnosticKind::UnusedParameter => "W0102",
            DiagnosticKind::UnreachableCode => "W0103",
        }
    }

    pub fn as_str(self) -> &'static str {
        match self {
            DiagnosticKind::UnresolvedReference => "UNRESOLVED_REFERENCE",
            DiagnosticKind::TypeMismatch => "TYPE_MISMATCH",
            DiagnosticKind::OverloadResolutionAmbiguity => "OVERLOAD_RESOLUTION_AMBIGUITY",
            DiagnosticKind::TooComplex => "TOO_COMPLEX",
            DiagnosticKind::CannotInferParameterType => "CANNOT_INFER_PARAMETER_TYPE",
            DiagnosticKind::UnusedVariable => "UNUSED_VARIABLE",
            DiagnosticKind::UnusedParameter => "UNUSED_PARAMETER",
            DiagnosticKind::UnreachableCode => "UNREACHABLE_CODE",
        }
    }

    pub fn from_name(name: &str) -> Option<DiagnosticKind> {
        DiagnosticKind::ALL.into_iter().find(|k| k.as_str() == name)
    }
}

impl fmt::Display for DiagnosticKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A positioned diagnostic record.
#[derive(Clone, Debug, PartialEq, Serialize)]
pub struct Diagnostic {
    pub kind: DiagnosticKind,
    pub range: Span,
    pub severity: Severity,
    pub message: String,
    /// Types the message talks about, e.g. `[expected, found]` for a mismatch.
    pub related_types: Vec<Ty>,
    /// Rendered candidate signatures, for ambiguity and mismatch reports.
    pub related_signatures: Vec<String>,
}

impl Diagnostic {
    fn new(kind: DiagnosticKind, range: Span, message: String) -> Self {
        Diagnostic {
            kind,
            range,
            severity: kind.severity(),
            message,
            related_types: Vec::new(),
            related_signatures: Vec::new(),
        }
    }

    pub fn unresolved_reference(name: &str, range: Span) -> Self {
        Diagnostic::new(
            DiagnosticKind::UnresolvedReference,
            range,
            format!("unresolved reference: {}", name),
        )
    }

    pub fn type_mismatch(expected: &Ty, found: &Ty, range: Span) -> Self {
        let mut d = Diagnostic::new(
            DiagnosticKind::TypeMismatch,
            range,
            format!("type mismatch: inferred type is {} but {} was expected", found, expected),
        );
        d.related_types = vec![expected.clone(), found.clone()];
        d
    }

    /// A mismatch against a call's closest candidate.
    pub fn candidate_mismatch(expected: &Ty, found: &Ty, range: Span, candidate: String) -> Self {
        let mut d = Diagnostic::type_mismatch(expected, found, range);
        d.related_signatures.push(candidate);
        d
    }

    /// The wrong number of arguments for the closest candidate.
    pub fn argument_count(expected: usize, found: usize, range: Span, candidate: String) -> Self {
        let mut d = Diagnostic::new(
            DiagnosticKind::TypeMismatch,
            range,
            format!("type mismatch: expected {} argument(s), found {}", expected, found),
        );
        d.related_signatures.push(candidate);
        d
    }

    /// The wrong number of explicit type arguments for the closest candidate.
    pub fn type_argument_count(expected: usize, found: usize, range: Span, candidate: String) -> Self {
        let mut d = Diagnostic::new(
            DiagnosticKind::TypeMismatch,
            range,
            format!("type mismatch: expected {} type argument(s), found {}", expected, found),
        );
        d.related_signatures.push(candidate);
        d
    }

    pub fn ambiguity(candidates: Vec<String>, range: Span) -> Self {
        let listed: Vec<String> = candidates.iter().map(|c| format!("`{}`", c)).collect();
        let mut d = Diagnostic::new(
            DiagnosticKind::OverloadResolutionAmbiguity,
            range,
            format!("overload resolution ambiguity between {}", listed.join(" and ")),
        );
        d.related_signatures = candidates;
        d
    }

    pub fn too_complex(range: Span) -> Self {
        Diagnostic::new(
            DiagnosticKind::TooComplex,
            range,
            "expression is too complex to resolve".to_string(),
        )
    }

    pub fn cannot_infer_parameter(name: &str, range: Span) -> Self {
        Diagnostic::new(
            DiagnosticKind::CannotInferParameterType,
            range,
            format!("cannot infer a type for this parameter: {}", name),
        )
    }

    pub fn unused_variable(name: &str, range: Span) -> Self {
        Diagnostic::new(
            DiagnosticKind::UnusedVariable,
            range,
            format!("variable '{}' is never used", name),
        )
    }

    pub fn unused_parameter(name: &str, range: Span) -> Self {
        Diagnostic::new(
            DiagnosticKind::UnusedParameter,
            range,
            format!("parameter '{}' is never used", name),
        )
    }

    pub fn unreachable(range: Span) -> Self {
        Diagnostic::new(DiagnosticKind::UnreachableCode, range, "unreachable code".to_string())
    }

    pub fn is_error(&self) -> bool {
        self.severity == Severity::Error
    }
}

impl fmt::Display for Diagnostic {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}[{}] {}: {}", self.severity, self.kind.code(), self.range, self.message)
    }
}

/// Append-only accumulator of diagnostics for one unit (or one buffered
/// candidate attempt). No deduplication, no mutation of earlier entries.
#[derive(Clone, Debug, Default)]
pub struct DiagnosticReporter {
    diagnostics: Vec<Diagnostic>,
}

impl DiagnosticReporter {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn report(&mut self, diagnostic: Diagnostic) {
        tracing::trace!(kind = %diagnostic.kind, range = %diagnostic.range, "diagnostic");
        self.diagnostics.push(diagnostic);
    }

    /// Append everything another reporter collected, keeping its order.
    pub fn absorb(&mut self, other: DiagnosticReporter) {
        self.diagnostics.extend(other.diagnostics);
    }

    pub fn has_errors(&self) -> bool {
        self.diagnostics.iter().any(Diagnostic::is_error)
    }

    /// Hand off the sequence in source order (stable for equal offsets).
    pub fn into_sorted(self) -> Vec<Diagnostic> {
        let mut out = self.diagnostics;
        out.sort_by_key(|d| d.range.start);
        out
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn severities_follow_kind() {
        assert_eq!(DiagnosticKind::TypeMismatch.severity(), Severity::Error);
        assert_eq!(DiagnosticKind::UnusedVariable.severity(), Severity::Warning);
        assert_eq!(DiagnosticKind::UnreachableCode.severity(), Severity::Warning);
    }

    #[test]
    fn kind_names_round_trip_through_lookup() {
        for kind in DiagnosticKind::ALL {
            assert_eq!(DiagnosticKind::from_name(kind.as_str()), Some(kind));
        }
        assert_eq!(DiagnosticKind::from_name("NOT_A_KIND"), None);
    }

    #[test]
    fn kind_serializes_as_screaming_snake_case() {
        let json = serde_json::to_string(&DiagnosticKind::OverloadResolutionAmbiguity).unwrap();
        assert_eq!(json, "\"OVERLOAD_RESOLUTION_AMBIGUITY\"");
    }

    #[test]
    fn mismatch_message() {
        let d = Diagnostic::type_mismatch(&Ty::int(), &Ty::string(), Span::new(3, 8));
        insta::assert_snapshot!(
            d.to_string(),
            @"error[E0102] 3..8: type mismatch: inferred type is String but Int was expected"
        );
        assert_eq!(d.related_types, vec![Ty::int(), Ty::string()]);
    }

    #[test]
    fn ambiguity_lists_every_candidate() {
        let d = Diagnostic::ambiguity(
            vec!["fun f(x: A): Unit".into(), "fun f(x: B): Unit".into()],
            Span::new(0, 1),
        );
        assert_eq!(d.related_signatures.len(), 2);
        assert_eq!(
            d.message,
            "overload resolution ambiguity between `fun f(x: A): Unit` and `fun f(x: B): Unit`"
        );
    }

    #[test]
    fn reporter_sorts_stably_into_source_order() {
        let mut r = DiagnosticReporter::new();
        r.report(Diagnostic::unresolved_reference("b", Span::new(10, 11)));
        r.report(Diagnostic::unresolved_reference("a", Span::new(2, 3)));
        r.report(Diagnostic::unused_variable("c", Span::new(10, 12)));
        assert!(r.has_errors());
        let sorted = r.into_sorted();
        let starts: Vec<u32> = sorted.iter().map(|d| d.range.start).collect();
        assert_eq!(starts, vec![2, 10, 10]);
        assert_eq!(sorted[1].kind, DiagnosticKind::UnresolvedReference);
        assert_eq!(sorted[2].kind, DiagnosticKind::UnusedVariable);
    }
}
