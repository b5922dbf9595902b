//! Tern type checker: constraint-based inference for calls, overloads and
//! function literals.
//!
//! Given a compilation unit's expression tree and a populated symbol table,
//! the checker assigns a type to every expression, picks a target for every
//! call, and reports diagnostics where no consistent assignment exists:
//!
//! - Overload resolution with most-specific selection
//! - Generic inference through subtype constraints with declared variance
//! - Function literals with inferred parameters, implicit `it`, labeled
//!   and non-local returns
//! - A configurable budget that degrades pathological nesting to
//!   `TOO_COMPLEX` instead of hanging
//!
//! # Architecture
//!
//! - [`ty`]: Core type representation (Ty, TyCon, TyVar)
//! - [`symbols`]: Symbol table of declared signatures and classes
//! - [`builtins`]: Prelude classes and functions
//! - [`lattice`]: Subtyping, least upper and greatest lower bounds
//! - [`constraints`]: Constraint system with fixpoint propagation
//! - [`infer`]: Per-unit inference driver; calls and function literals are
//!   resolved in the private `call` and `lambda` modules
//! - [`env`]: Lexical scope stack
//! - [`error`]: Diagnostics with provenance tracking
//! - [`diagnostics`]: Ariadne rendering
//! - [`config`]: Inference limits and suppressed diagnostics

pub mod ast;
pub mod builtins;
mod call;
pub mod config;
pub mod constraints;
pub mod diagnostics;
pub mod env;
pub mod error;
pub mod infer;
mod lambda;
pub mod lattice;
pub mod symbols;
pub mod ty;

use rustc_hash::FxHashMap;

use crate::ast::{CompilationUnit, ExprId};
use crate::config::InferConfig;
use crate::diagnostics::{render_diagnostic, DiagnosticOptions};
use crate::error::{Diagnostic, DiagnosticKind, Severity};
use crate::infer::ResolvedCall;
use crate::symbols::SymbolTable;
use crate::ty::Ty;

/// The result of checking one compilation unit: the annotated tree handed
/// to code generation, plus diagnostics in source order.
pub struct TypeckResult {
    /// Type of every expression node. Failed nodes map to `Error`.
    pub types: FxHashMap<ExprId, Ty>,
    /// Chosen callee of every successfully resolved call node.
    pub calls: FxHashMap<ExprId, ResolvedCall>,
    /// Diagnostics that survived suppression, sorted by start offset.
    pub diagnostics: Vec<Diagnostic>,
}

impl TypeckResult {
    /// Whether any error remains. Errors halt code generation for the
    /// unit, warnings do not.
    pub fn has_errors(&self) -> bool {
        self.diagnostics.iter().any(Diagnostic::is_error)
    }

    pub fn errors(&self) -> impl Iterator<Item = &Diagnostic> {
        self.diagnostics.iter().filter(|d| d.severity == Severity::Error)
    }

    pub fn warnings(&self) -> impl Iterator<Item = &Diagnostic> {
        self.diagnostics.iter().filter(|d| d.severity == Severity::Warning)
    }

    /// Diagnostic kinds in report order.
    pub fn kinds(&self) -> Vec<DiagnosticKind> {
        self.diagnostics.iter().map(|d| d.kind).collect()
    }

    pub fn type_of(&self, id: ExprId) -> Option<&Ty> {
        self.types.get(&id)
    }

    pub fn callee_of(&self, id: ExprId) -> Option<&ResolvedCall> {
        self.calls.get(&id)
    }

    /// Render every diagnostic against the unit's source.
    pub fn render_diagnostics(
        &self,
        source: &str,
        filename: &str,
        options: &DiagnosticOptions,
    ) -> Vec<String> {
        self.diagnostics
            .iter()
            .map(|d| render_diagnostic(d, source, filename, options))
            .collect()
    }
}

/// Check a compilation unit with the default limits.
pub fn check(unit: &CompilationUnit, symbols: &SymbolTable) -> TypeckResult {
    check_with_config(unit, symbols, &InferConfig::default())
}

/// Check a compilation unit. Nothing in here is fatal: every failure
/// becomes a diagnostic and an `Error`-typed node.
pub fn check_with_config(
    unit: &CompilationUnit,
    symbols: &SymbolTable,
    config: &InferConfig,
) -> TypeckResult {
    let _span = tracing::debug_span!("typeck", items = unit.items.len()).entered();
    let output = infer::infer_unit(unit, symbols, config);
    let diagnostics: Vec<Diagnostic> = output
        .diagnostics
        .into_sorted()
        .into_iter()
        .filter(|d| !config.is_suppressed(d.kind))
        .collect();
    tracing::debug!(
        types = output.types.len(),
        calls = output.calls.len(),
        diagnostics = diagnostics.len(),
        "unit checked"
    );
    TypeckResult { types: output.types, calls: output.calls, diagnostics }
}
