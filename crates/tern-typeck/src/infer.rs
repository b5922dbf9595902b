//! The per-unit inference driver.
//!
//! Walks functions and top-level properties, assigns a type to every
//! expression, and hands calls to the call resolver (`call.rs`) and function
//! literals to the literal inferencer (`lambda.rs`). Both of those analyse
//! sub-trees speculatively, so everything this driver produces (types,
//! chosen callees, diagnostics, constraints for an enclosing system) goes
//! into the current [`Recorder`]; a speculative analysis pushes a fresh one
//! and either commits it into its parent or drops it.

use rustc_hash::FxHashMap;
use serde::Serialize;
use tern_common::Span;

use crate::ast::{Block, CompilationUnit, Expr, ExprId, ExprKind, FunctionDecl, Item, LetStmt, Literal, Stmt};
use crate::config::InferConfig;
use crate::constraints::{Constraint, Substitution};
use crate::env::{LocalKind, TypeEnv};
use crate::error::{ConstraintOrigin, Diagnostic, DiagnosticReporter};
use crate::lattice::Lattice;
use crate::symbols::{SignatureId, SymbolTable};
use crate::ty::{Ty, VarSupply};

/// What a call resolved to.
#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
pub enum Callee {
    /// A declared function or member.
    Signature(SignatureId),
    /// A local value of function type.
    Local(String),
}

/// The chosen target of a call node, as handed to later phases.
#[derive(Clone, Debug, PartialEq, Serialize)]
pub struct ResolvedCall {
    pub callee: Callee,
    /// The declared signature, rendered.
    pub signature: String,
    /// Inferred type arguments, in declaration order.
    pub type_arguments: Vec<Ty>,
}

/// The type a position requires of the expression placed there.
#[derive(Clone, Debug)]
pub(crate) enum Expected {
    None,
    /// The value must conform to this type.
    Subtype(Ty),
    /// The value must have exactly this type (`checkType`).
    Exact(Ty),
}

/// Everything one (possibly speculative) analysis produced.
#[derive(Clone, Default)]
pub(crate) struct Recorder {
    pub(crate) types: Vec<(ExprId, Ty)>,
    pub(crate) calls: Vec<(ExprId, ResolvedCall)>,
    pub(crate) diagnostics: DiagnosticReporter,
    /// Constraints on variables owned further out.
    pub(crate) constraints: Vec<Constraint>,
}

impl Recorder {
    /// Rewrite recorded types under `subst`.
    pub(crate) fn apply(&mut self, subst: &Substitution) {
        for (_, ty) in &mut self.types {
            *ty = subst.apply(ty);
        }
        for (_, call) in &mut self.calls {
            for arg in &mut call.type_arguments {
                *arg = subst.apply(arg);
            }
        }
        self.constraints = self.constraints.iter().map(|c| c.apply(subst)).collect();
    }

    pub(crate) fn absorb(&mut self, other: Recorder) {
        self.types.extend(other.types);
        self.calls.extend(other.calls);
        self.diagnostics.absorb(other.diagnostics);
        self.constraints.extend(other.constraints);
    }
}

/// Candidate attempts spent under the current outermost call.
#[derive(Default)]
pub(crate) struct Budget {
    /// Set while an outermost call is being resolved.
    pub(crate) active: bool,
    pub(crate) attempts: usize,
    pub(crate) exhausted: bool,
}

/// Where a `return@label` inside an active literal sends its value.
pub(crate) struct LiteralFrame {
    pub(crate) label: Option<String>,
    pub(crate) target: Ty,
    pub(crate) span: Span,
}

pub(crate) struct Inferencer<'a> {
    pub(crate) symbols: &'a SymbolTable,
    pub(crate) lattice: Lattice<'a>,
    pub(crate) config: &'a InferConfig,
    pub(crate) supply: VarSupply,
    pub(crate) env: TypeEnv,
    /// Declared return types of the enclosing named functions.
    pub(crate) fn_returns: Vec<Ty>,
    pub(crate) frames: Vec<LiteralFrame>,
    pub(crate) rec: Recorder,
    saved: Vec<Recorder>,
    pub(crate) budget: Budget,
    /// Nesting of calls and literals being analysed.
    pub(crate) depth: usize,
}

/// The raw output of a unit walk, before suppression and sorting.
pub(crate) struct UnitOutput {
    pub(crate) types: FxHashMap<ExprId, Ty>,
    pub(crate) calls: FxHashMap<ExprId, ResolvedCall>,
    pub(crate) diagnostics: DiagnosticReporter,
}

pub(crate) fn infer_unit(unit: &CompilationUnit, symbols: &SymbolTable, config: &InferConfig) -> UnitOutput {
    let mut inf = Inferencer::new(symbols, config);
    for item in &unit.items {
        match item {
            Item::Function(f) => inf.check_function(f),
            Item::Property(p) => inf.check_property(p),
        }
    }
    inf.finish()
}

impl<'a> Inferencer<'a> {
    pub(crate) fn new(symbols: &'a SymbolTable, config: &'a InferConfig) -> Self {
        Inferencer {
            symbols,
            lattice: Lattice::new(symbols),
            config,
            supply: VarSupply::new(),
            env: TypeEnv::new(),
            fn_returns: Vec::new(),
            frames: Vec::new(),
            rec: Recorder::default(),
            saved: Vec::new(),
            budget: Budget::default(),
            depth: 0,
        }
    }

    fn finish(self) -> UnitOutput {
        if !self.rec.constraints.is_empty() {
            tracing::debug!(count = self.rec.constraints.len(), "dropping unowned constraints");
        }
        // Anything still unsolved at this level had no owner left to solve it.
        let zonk = |ty: Ty| if ty.has_vars() { erase_vars(&ty) } else { ty };
        let mut types = FxHashMap::default();
        for (id, ty) in self.rec.types {
            types.insert(id, zonk(ty));
        }
        let mut calls = FxHashMap::default();
        for (id, mut call) in self.rec.calls {
            call.type_arguments = call.type_arguments.into_iter().map(zonk).collect();
            calls.insert(id, call);
        }
        UnitOutput { types, calls, diagnostics: self.rec.diagnostics }
    }

    // ── Recording ───────────────────────────────────────────────────────

    /// Start a speculative analysis.
    pub(crate) fn push_recorder(&mut self) {
        let outer = std::mem::take(&mut self.rec);
        self.saved.push(outer);
    }

    /// End a speculative analysis, returning what it recorded.
    pub(crate) fn pop_recorder(&mut self) -> Recorder {
        let outer = self.saved.pop().unwrap_or_default();
        std::mem::replace(&mut self.rec, outer)
    }

    pub(crate) fn record(&mut self, id: ExprId, ty: Ty) {
        self.rec.types.push((id, ty));
    }

    pub(crate) fn report(&mut self, diagnostic: Diagnostic) {
        self.rec.diagnostics.report(diagnostic);
    }

    /// Give `Error` to `expr` and everything under it. Used for sub-trees a
    /// failed call never analysed for real.
    pub(crate) fn record_error_subtree(&mut self, expr: &Expr) {
        let mut ids = Vec::new();
        expr.walk(&mut |e| ids.push(e.id));
        for id in ids {
            self.record(id, Ty::Error);
        }
    }

    /// Hand a constraint to whoever owns its variables. A constraint with
    /// no variables left is checked on the spot.
    pub(crate) fn emit(&mut self, constraint: Constraint) {
        if !constraint.vars().is_empty() {
            self.rec.constraints.push(constraint);
            return;
        }
        let (lower, upper, holds) = match &constraint {
            Constraint::Subtype { lower, upper, .. } => {
                (lower, upper, self.lattice.is_subtype(lower, upper))
            }
            Constraint::Equal { left, right, .. } => {
                (left, right, self.lattice.equivalent(left, right))
            }
        };
        if !holds {
            let span = constraint.origin().span();
            let diag = Diagnostic::type_mismatch(upper, lower, span);
            self.report(diag);
        }
    }

    // ── Items ───────────────────────────────────────────────────────────

    fn check_function(&mut self, f: &FunctionDecl) {
        tracing::debug!(name = %f.name, "checking function");
        self.fn_returns.push(f.return_type.clone());
        self.env.push_scope();
        for p in &f.params {
            let ty = p.ty.clone().unwrap_or(Ty::Error);
            self.env.insert(&p.name, ty, p.span, LocalKind::Parameter);
        }
        self.infer_stmts(&f.body);
        self.close_scope();
        self.fn_returns.pop();
    }

    /// Top-level properties live in the outermost scope, which is never
    /// popped, so they are never reported unused.
    fn check_property(&mut self, p: &LetStmt) {
        let (declared, _) = self.infer_let_init(p);
        self.env.insert(&p.name, declared, p.name_span, LocalKind::Variable);
    }

    /// Pop a scope and warn about what it declared but never read.
    pub(crate) fn close_scope(&mut self) {
        for local in self.env.pop_scope() {
            if local.used || local.name.starts_with('_') {
                continue;
            }
            match local.kind {
                LocalKind::Variable => self.report(Diagnostic::unused_variable(&local.name, local.span)),
                LocalKind::Parameter => {
                    self.report(Diagnostic::unused_parameter(&local.name, local.span))
                }
                LocalKind::LiteralParameter | LocalKind::Implicit => {}
            }
        }
    }

    // ── Blocks and statements ───────────────────────────────────────────

    /// Infer a block's statements in order. Returns the type of the final
    /// expression statement, `None` when the block is empty or ends in a
    /// declaration. Statements after one of type `Nothing` get a single
    /// unreachable-code warning but are still analysed.
    pub(crate) fn infer_stmts(&mut self, block: &Block) -> Option<Ty> {
        let mut last = None;
        let mut diverged = false;
        let mut reported = false;
        for stmt in &block.stmts {
            if diverged && !reported {
                let end = block.stmts.last().map_or(stmt.span(), Stmt::span);
                self.report(Diagnostic::unreachable(stmt.span().cover(end)));
                reported = true;
            }
            let ty = match stmt {
                Stmt::Let(l) => {
                    let (declared, init) = self.infer_let_init(l);
                    self.env.insert(&l.name, declared, l.name_span, LocalKind::Variable);
                    last = None;
                    init
                }
                Stmt::Expr(e) => {
                    let ty = self.infer_expr(e, &Expected::None);
                    last = Some(ty.clone());
                    ty
                }
            };
            diverged |= ty.is_nothing();
        }
        last
    }

    /// Returns the declared type and the initializer's own type.
    fn infer_let_init(&mut self, l: &LetStmt) -> (Ty, Ty) {
        match &l.ty {
            Some(annotated) => {
                let origin = ConstraintOrigin::Annotation { span: l.init.span };
                let init = self.check_against(&l.init, annotated, origin);
                (annotated.clone(), init)
            }
            None => {
                let init = self.infer_expr(&l.init, &Expected::None);
                (init.clone(), init)
            }
        }
    }

    /// Infer `expr` where its value must conform to `target`.
    pub(crate) fn check_against(&mut self, expr: &Expr, target: &Ty, origin: ConstraintOrigin) -> Ty {
        if target.has_vars() {
            let found = self.infer_expr(expr, &Expected::None);
            self.emit(Constraint::Subtype { lower: found.clone(), upper: target.clone(), origin });
            found
        } else {
            self.infer_expr(expr, &Expected::Subtype(target.clone()))
        }
    }

    // ── Expressions ─────────────────────────────────────────────────────

    /// Infer and record the type of `expr`. Mismatches against `expected`
    /// are reported here, except for calls, which fold the expectation into
    /// candidate resolution.
    pub(crate) fn infer_expr(&mut self, expr: &Expr, expected: &Expected) -> Ty {
        let ty = match &expr.kind {
            ExprKind::Call { .. } => {
                let ty = self.infer_call(expr, expected);
                self.record(expr.id, ty.clone());
                return ty;
            }
            ExprKind::Literal(lit) => literal_type(lit),
            ExprKind::Name(name) => self.infer_name(name, expr.span),
            ExprKind::Lambda { .. } => {
                let hint = match expected {
                    Expected::Subtype(t) | Expected::Exact(t) => Some(t.clone()),
                    Expected::None => None,
                };
                let result = self.infer_literal(expr, hint.as_ref(), None);
                let ty = result.ty();
                for c in result.emitted {
                    self.emit(c);
                }
                ty
            }
            ExprKind::Return { label, label_span, value } => {
                self.infer_return(expr, label.as_deref(), *label_span, value.as_deref())
            }
            ExprKind::If { cond, then_branch, else_branch } => {
                let ty = self.infer_if(expr, cond, then_branch, else_branch.as_deref(), expected);
                self.record(expr.id, ty.clone());
                return ty;
            }
            ExprKind::Block(block) => {
                self.env.push_scope();
                let ty = self.infer_stmts(block).unwrap_or_else(Ty::unit);
                self.close_scope();
                ty
            }
            ExprKind::CheckType { expr: inner, ty } => {
                self.infer_expr(inner, &Expected::Exact(ty.clone()));
                Ty::unit()
            }
        };
        self.expect(&ty, expected, expr.span);
        self.record(expr.id, ty.clone());
        ty
    }

    /// Check a non-call expression's type against its expectation.
    fn expect(&mut self, found: &Ty, expected: &Expected, span: Span) {
        let origin = ConstraintOrigin::ExpectedType { span };
        match expected {
            Expected::None => {}
            Expected::Subtype(t) => self.emit(Constraint::Subtype {
                lower: found.clone(),
                upper: t.clone(),
                origin,
            }),
            Expected::Exact(t) => self.emit(Constraint::Equal {
                left: found.clone(),
                right: t.clone(),
                origin,
            }),
        }
    }

    fn infer_name(&mut self, name: &str, span: Span) -> Ty {
        if let Some(ty) = self.env.use_name(name) {
            return ty;
        }
        if let Some(object) = self.symbols.object(name) {
            return object.self_type();
        }
        self.report(Diagnostic::unresolved_reference(name, span));
        Ty::Error
    }

    fn infer_return(
        &mut self,
        expr: &Expr,
        label: Option<&str>,
        label_span: Option<Span>,
        value: Option<&Expr>,
    ) -> Ty {
        let target = match label {
            Some(label) => {
                let frame = self.frames.iter().rev().find(|f| f.label.as_deref() == Some(label));
                match frame {
                    Some(frame) => Some((frame.target.clone(), frame.span)),
                    None => {
                        let span = label_span.unwrap_or(expr.span);
                        self.report(Diagnostic::unresolved_reference(&format!("@{}", label), span));
                        None
                    }
                }
            }
            None => match self.fn_returns.last() {
                Some(ret) => Some((ret.clone(), expr.span)),
                None => {
                    self.report(Diagnostic::unresolved_reference("return", expr.span));
                    None
                }
            },
        };
        match (target, value) {
            (Some((target, literal)), Some(value)) => {
                let origin = match label {
                    Some(_) => ConstraintOrigin::LiteralReturn { literal, exit: value.span },
                    None => ConstraintOrigin::Return { span: value.span },
                };
                self.check_against(value, &target, origin);
            }
            (Some((target, literal)), None) => {
                let origin = match label {
                    Some(_) => ConstraintOrigin::LiteralReturn { literal, exit: expr.span },
                    None => ConstraintOrigin::Return { span: expr.span },
                };
                self.emit(Constraint::Subtype { lower: Ty::unit(), upper: target, origin });
            }
            (None, Some(value)) => {
                self.infer_expr(value, &Expected::None);
            }
            (None, None) => {}
        }
        Ty::Nothing
    }

    fn infer_if(
        &mut self,
        expr: &Expr,
        cond: &Expr,
        then: &Expr,
        otherwise: Option<&Expr>,
        expected: &Expected,
    ) -> Ty {
        self.check_against(cond, &Ty::boolean(), ConstraintOrigin::ExpectedType { span: cond.span });
        let Some(otherwise) = otherwise else {
            self.infer_expr(then, &Expected::None);
            self.expect(&Ty::unit(), expected, expr.span);
            return Ty::unit();
        };
        // A concrete upper bound is checked per branch so a mismatch points
        // at the offending branch rather than the whole `if`. An exact
        // expectation holds for the joined type only.
        let per_branch = match expected {
            Expected::Subtype(t) => !t.has_vars(),
            Expected::Exact(_) | Expected::None => false,
        };
        if per_branch {
            let then_ty = self.infer_expr(then, expected);
            let else_ty = self.infer_expr(otherwise, expected);
            self.lattice.lub(&[then_ty, else_ty])
        } else {
            let then_ty = self.infer_expr(then, &Expected::None);
            let else_ty = self.infer_expr(otherwise, &Expected::None);
            let ty = self.lattice.lub(&[then_ty, else_ty]);
            self.expect(&ty, expected, expr.span);
            ty
        }
    }
}

fn literal_type(lit: &Literal) -> Ty {
    match lit {
        Literal::Int(_) => Ty::int(),
        Literal::String(_) => Ty::string(),
        Literal::Bool(_) => Ty::boolean(),
        Literal::Null => Ty::null(),
    }
}

/// Replace leftover variables with `Error`.
pub(crate) fn erase_vars(ty: &Ty) -> Ty {
    match ty {
        Ty::Var(_) => Ty::Error,
        Ty::Named(con, args) => Ty::Named(con.clone(), args.iter().map(erase_vars).collect()),
        Ty::Fun(params, ret) => {
            Ty::Fun(params.iter().map(erase_vars).collect(), Box::new(erase_vars(ret)))
        }
        Ty::Nullable(inner) => Ty::nullable(erase_vars(inner)),
        Ty::Param(_) | Ty::Nothing | Ty::Error => ty.clone(),
    }
}
