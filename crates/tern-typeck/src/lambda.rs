//! Function-literal inference.
//!
//! A literal is analysed against an optional expected function type. Known
//! parameter types are bound directly; the rest get fresh variables owned by
//! the literal's own [`ConstraintSystem`], as does the return type when the
//! context does not fix it. Everything the body produces that mentions
//! those variables is solved here; the rest is handed back to the caller as
//! emitted constraints, never written into an enclosing system.

use tern_common::Span;

use crate::ast::{Expr, ExprKind, Stmt};
use crate::constraints::{Constraint, ConstraintFailure, ConstraintSystem, Unsatisfied, VarPosition};
use crate::env::LocalKind;
use crate::error::{ConstraintOrigin, Diagnostic};
use crate::infer::{Inferencer, LiteralFrame};
use crate::ty::{Ty, TyVar};

/// What a literal contributes to its context.
pub(crate) struct LiteralResult {
    pub(crate) params: Vec<Ty>,
    pub(crate) return_type: Ty,
    /// Constraints on variables the literal does not own.
    pub(crate) emitted: Vec<Constraint>,
}

impl LiteralResult {
    fn error() -> Self {
        LiteralResult { params: Vec::new(), return_type: Ty::Error, emitted: Vec::new() }
    }

    /// The literal's function type.
    pub(crate) fn ty(&self) -> Ty {
        Ty::Fun(self.params.clone(), Box::new(self.return_type.clone()))
    }
}

/// A parameter whose type the literal has to infer itself.
struct Unknown {
    var: TyVar,
    name: String,
    span: Span,
}

impl<'a> Inferencer<'a> {
    /// Analyse a function literal. `implicit_label` is the label a
    /// `return@label` may use when the literal declares none (the callee's
    /// name for literals passed as arguments). The literal expression itself
    /// is not recorded; the caller records `ty()`.
    pub(crate) fn infer_literal(
        &mut self,
        expr: &Expr,
        expected: Option<&Ty>,
        implicit_label: Option<&str>,
    ) -> LiteralResult {
        let ExprKind::Lambda { label, params, body } = &expr.kind else {
            return LiteralResult::error();
        };
        if self.budget.exhausted {
            self.record_error_subtree(expr);
            return LiteralResult::error();
        }
        if self.depth >= self.config.max_nesting_depth {
            self.record_error_subtree(expr);
            if self.budget.active {
                self.budget.exhausted = true;
            } else {
                self.report(Diagnostic::too_complex(expr.span));
            }
            return LiteralResult::error();
        }

        let expected_fun = match expected.map(Ty::non_null) {
            Some(Ty::Fun(ps, ret)) => Some((ps.as_slice(), &**ret)),
            _ => None,
        };
        tracing::trace!(span = %expr.span, expected = ?expected, "inferring function literal");

        let mut cs = ConstraintSystem::new(self.supply.clone())
            .with_step_limit(self.config.max_propagation_steps);
        let mut pending = Vec::new();

        // ── Parameters ──
        // Each binding is the type the body sees; `exposed` is the
        // parameter type of the literal's own function type.
        let mut bindings: Vec<(String, Ty, Span, LocalKind)> = Vec::new();
        let mut exposed: Vec<Ty> = Vec::new();
        let mut unknowns: Vec<Unknown> = Vec::new();
        let expected_params = expected_fun.map(|(ps, _)| ps);
        if params.is_empty() {
            if let Some([only]) = expected_params {
                bindings.push(("it".to_string(), only.clone(), expr.span, LocalKind::Implicit));
                exposed.push(only.clone());
            }
        } else {
            let context = expected_params.filter(|ps| ps.len() == params.len());
            for (index, p) in params.iter().enumerate() {
                let from_context = context.map(|ps| ps[index].clone());
                let (ty, outer) = match (&p.ty, from_context) {
                    (Some(annotated), Some(from_context)) => {
                        // The value passed in must fit the annotation.
                        pending.push(Constraint::Subtype {
                            lower: from_context.clone(),
                            upper: annotated.clone(),
                            origin: ConstraintOrigin::LiteralParameter { literal: expr.span, index },
                        });
                        (annotated.clone(), from_context)
                    }
                    (Some(annotated), None) => (annotated.clone(), annotated.clone()),
                    (None, Some(from_context)) => (from_context.clone(), from_context),
                    (None, None) => {
                        let var = cs.new_type_variable(&p.name, Vec::new(), VarPosition::Input);
                        unknowns.push(Unknown { var, name: p.name.clone(), span: p.span });
                        (Ty::Var(var), Ty::Var(var))
                    }
                };
                bindings.push((p.name.clone(), ty, p.span, LocalKind::LiteralParameter));
                exposed.push(outer);
            }
        }

        // ── Return target ──
        let (target, coerce_to_unit) = match expected_fun {
            Some((_, ret)) if ret.is_unit() => (Ty::unit(), true),
            Some((_, ret)) => (ret.clone(), false),
            None => (Ty::Var(cs.new_type_variable("R", Vec::new(), VarPosition::Output)), false),
        };

        // ── Body ──
        let frame_label = label.clone().or_else(|| implicit_label.map(str::to_string));
        self.frames.push(LiteralFrame { label: frame_label, target: target.clone(), span: expr.span });
        self.depth += 1;
        self.push_recorder();
        self.env.push_scope();
        for (name, ty, span, kind) in &bindings {
            self.env.insert(name, ty.clone(), *span, *kind);
        }
        let last = self.infer_stmts(body);
        self.close_scope();
        let mut recorded = self.pop_recorder();
        self.depth -= 1;
        self.frames.pop();

        if !coerce_to_unit {
            let exit = match body.stmts.last() {
                Some(Stmt::Expr(e)) => e.span,
                Some(stmt) => stmt.span(),
                None => body.span,
            };
            pending.push(Constraint::Subtype {
                lower: last.unwrap_or_else(Ty::unit),
                upper: target.clone(),
                origin: ConstraintOrigin::LiteralReturn { literal: expr.span, exit },
            });
        }

        // ── Solve what belongs to this literal ──
        pending.extend(std::mem::take(&mut recorded.constraints));
        let (own, mut emitted): (Vec<Constraint>, Vec<Constraint>) = pending
            .into_iter()
            .partition(|c| c.vars().iter().any(|v| cs.owns(*v)));
        cs.extend(own);

        let subst = match cs.resolve(self.lattice) {
            Ok(solution) => {
                emitted.extend(solution.residual);
                solution.substitution
            }
            Err(failure) => {
                self.report_literal_failure(expr.span, &unknowns, &failure);
                failure.substitution
            }
        };
        recorded.apply(&subst);
        self.rec.absorb(recorded);

        let params: Vec<Ty> = exposed.iter().map(|ty| subst.apply(ty)).collect();
        let return_type = subst.apply(&target);
        tracing::trace!(span = %expr.span, ret = %return_type, emitted = emitted.len(), "literal inferred");
        LiteralResult { params, return_type, emitted }
    }

    fn report_literal_failure(&mut self, literal: Span, unknowns: &[Unknown], failure: &ConstraintFailure) {
        for unsatisfied in &failure.unsatisfied {
            match unsatisfied {
                Unsatisfied::CannotInfer { var, name } => {
                    let (name, span) = unknowns
                        .iter()
                        .find(|u| u.var == *var)
                        .map_or((name.as_str(), literal), |u| (u.name.as_str(), u.span));
                    self.report(Diagnostic::cannot_infer_parameter(name, span));
                }
                Unsatisfied::Mismatch { lower, upper, origin } => {
                    self.report(Diagnostic::type_mismatch(upper, lower, origin.span()));
                }
                Unsatisfied::TooComplex => {
                    if self.budget.active {
                        self.budget.exhausted = true;
                    } else {
                        self.report(Diagnostic::too_complex(literal));
                    }
                }
                Unsatisfied::ArgumentCount { .. } | Unsatisfied::TypeArgumentCount { .. } => {}
            }
        }
    }
}

