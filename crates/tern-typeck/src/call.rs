//! Call resolution.
//!
//! A call site is resolved against up to three candidate levels, tried in
//! order: a local value of function type, the top-level functions of that
//! name, then the `invoke` members of an object of that name. Each candidate
//! gets its own [`ConstraintSystem`]: fresh variables for its generic
//! parameters, one constraint per argument, one for the expected result
//! type, plus whatever the function-literal arguments emit when analysed
//! against it. Literal bodies are analysed once per candidate, each time
//! into a fresh [`Recorder`], so only the chosen candidate's types and
//! diagnostics survive.
//!
//! The first level with a successful (or ambiguous) outcome wins. When every
//! level fails, the closest candidate of the first non-empty level is
//! reported.

use tern_common::Span;

use crate::ast::{Expr, ExprId, ExprKind};
use crate::constraints::{ConstraintFailure, ConstraintSystem, Solution, Substitution, Unsatisfied, VarPosition};
use crate::error::{ConstraintOrigin, Diagnostic};
use crate::infer::{Budget, Callee, Expected, Inferencer, Recorder, ResolvedCall};
use crate::symbols::{Signature, TypeParam};
use crate::ty::Ty;

/// The parts of a call expression resolution looks at.
struct CallSite<'e> {
    id: ExprId,
    span: Span,
    callee: &'e str,
    callee_span: Span,
    type_args: &'e [(Ty, Span)],
    args: &'e [Expr],
    /// Types of the ordinary arguments, inferred once per call. `None`
    /// marks a function literal, analysed per candidate.
    arg_types: Vec<Option<Ty>>,
    /// What inferring a call argument on its own recorded. A candidate
    /// whose parameter type it does not fit infers it again in context.
    plain: Vec<Option<Recorder>>,
}

#[derive(Copy, Clone, Debug, PartialEq, Eq)]
enum Level {
    Local,
    Function,
    Invoke,
}

impl Level {
    const ORDER: [Level; 3] = [Level::Local, Level::Function, Level::Invoke];
}

/// A callable shape, either a declared signature or a local's function type.
#[derive(Clone, Debug)]
struct Candidate {
    callee: Callee,
    rendered: String,
    type_params: Vec<TypeParam>,
    params: Vec<Ty>,
    return_type: Ty,
    /// `None` for synthesized candidates.
    decl_order: Option<u32>,
}

impl Candidate {
    fn from_signature(sig: &Signature) -> Self {
        Candidate {
            callee: Callee::Signature(sig.id),
            rendered: sig.to_string(),
            type_params: sig.type_params.clone(),
            params: sig.param_types().cloned().collect(),
            return_type: sig.return_type.clone(),
            decl_order: Some(sig.decl_order),
        }
    }

    fn local(name: &str, params: Vec<Ty>, return_type: Ty) -> Self {
        let ty = Ty::Fun(params.clone(), Box::new(return_type.clone()));
        Candidate {
            callee: Callee::Local(name.to_string()),
            rendered: format!("{}: {}", name, ty),
            type_params: Vec::new(),
            params,
            return_type,
            decl_order: None,
        }
    }

    fn is_generic(&self) -> bool {
        !self.type_params.is_empty()
    }
}

/// One candidate tried against a call site. Types are already rewritten
/// under the attempt's (possibly best-effort) substitution.
struct Attempt {
    params: Vec<Ty>,
    return_type: Ty,
    type_arguments: Vec<Ty>,
    buffer: Recorder,
    result: Result<Solution, ConstraintFailure>,
}

impl Attempt {
    fn failed(reason: Unsatisfied) -> Self {
        Attempt {
            params: Vec::new(),
            return_type: Ty::Error,
            type_arguments: Vec::new(),
            buffer: Recorder::default(),
            result: Err(ConstraintFailure::new(vec![reason])),
        }
    }

    /// Failures ranked for "closest candidate": a wrong argument count is
    /// further off than any number of type mismatches.
    fn distance(&self) -> (bool, usize) {
        match &self.result {
            Ok(_) => (false, 0),
            Err(failure) => {
                let arity = failure.unsatisfied.iter().any(|u| {
                    matches!(u, Unsatisfied::ArgumentCount { .. } | Unsatisfied::TypeArgumentCount { .. })
                });
                (arity, failure.unsatisfied.len())
            }
        }
    }
}

enum Selection {
    None,
    One(usize),
    Ambiguous(Vec<usize>),
}

/// How a call site came out. Everything but `Resolved` leaves the call
/// typed `Error`.
pub(crate) enum CallOutcome {
    Resolved(Ty),
    /// No level had a candidate.
    Unresolved,
    /// Rendered signatures of the equally specific winners.
    Ambiguous(Vec<String>),
    /// Every candidate failed; the closest one and what it recorded.
    Mismatch { candidate: String, failure: ConstraintFailure, buffer: Recorder },
    TooComplex,
}

impl<'a> Inferencer<'a> {
    /// Infer a call expression. The outermost call of a nest owns the
    /// attempt budget and reports `TOO_COMPLEX` once if anything inside it
    /// runs the budget out.
    pub(crate) fn infer_call(&mut self, expr: &Expr, expected: &Expected) -> Ty {
        let ExprKind::Call { callee, callee_span, type_args, args } = &expr.kind else {
            return Ty::Error;
        };
        let outermost = !self.budget.active;
        if outermost {
            self.budget = Budget { active: true, ..Budget::default() };
            self.push_recorder();
        }

        self.depth += 1;
        let outcome = if self.depth > self.config.max_nesting_depth || self.budget.exhausted {
            self.budget.exhausted = true;
            CallOutcome::TooComplex
        } else {
            let mut arg_types = Vec::with_capacity(args.len());
            let mut plain = Vec::with_capacity(args.len());
            for arg in args {
                match arg.kind {
                    ExprKind::Lambda { .. } => {
                        arg_types.push(None);
                        plain.push(None);
                    }
                    ExprKind::Call { .. } => {
                        self.push_recorder();
                        arg_types.push(Some(self.infer_expr(arg, &Expected::None)));
                        plain.push(Some(self.pop_recorder()));
                    }
                    _ => {
                        arg_types.push(Some(self.infer_expr(arg, &Expected::None)));
                        plain.push(None);
                    }
                }
            }
            let site = CallSite {
                id: expr.id,
                span: expr.span,
                callee,
                callee_span: *callee_span,
                type_args,
                args,
                arg_types,
                plain,
            };
            let outcome = self.resolve_call(&site, expected);
            // A committed or closest attempt carries its own copy.
            if !matches!(outcome, CallOutcome::Resolved(_) | CallOutcome::Mismatch { .. }) {
                for rec in site.plain.into_iter().flatten() {
                    self.rec.absorb(rec);
                }
            }
            outcome
        };
        self.depth -= 1;
        let ty = self.settle(expr, callee, *callee_span, args, outcome);

        if !outermost {
            return if self.budget.exhausted { Ty::Error } else { ty };
        }
        self.budget.active = false;
        let analysed = self.pop_recorder();
        if self.budget.exhausted {
            tracing::debug!(
                callee = %callee,
                attempts = self.budget.attempts,
                "call too complex, giving up"
            );
            self.record_error_subtree(expr);
            self.report(Diagnostic::too_complex(expr.span));
            return Ty::Error;
        }
        self.rec.absorb(analysed);
        ty
    }

    /// Report a call's outcome and give it a type.
    fn settle(
        &mut self,
        expr: &Expr,
        callee: &str,
        callee_span: Span,
        args: &[Expr],
        outcome: CallOutcome,
    ) -> Ty {
        let mut outcome = match outcome {
            CallOutcome::Resolved(ty) => return ty,
            other => other,
        };
        // The closest candidate's diagnostics stand, its types do not.
        if let CallOutcome::Mismatch { buffer, .. } = &mut outcome {
            self.rec.absorb(std::mem::take(buffer));
        }
        // Literal arguments were only analysed speculatively, if at all.
        for arg in args.iter().filter(|a| matches!(a.kind, ExprKind::Lambda { .. })) {
            self.record_error_subtree(arg);
        }
        match outcome {
            CallOutcome::Resolved(_) | CallOutcome::TooComplex => {}
            CallOutcome::Unresolved => {
                self.report(Diagnostic::unresolved_reference(callee, callee_span));
            }
            CallOutcome::Ambiguous(candidates) => {
                self.report(Diagnostic::ambiguity(candidates, callee_span));
            }
            CallOutcome::Mismatch { candidate, failure, .. } => {
                self.report_candidate_failure(expr.span, callee_span, &candidate, &failure);
            }
        }
        Ty::Error
    }

    fn report_candidate_failure(
        &mut self,
        call: Span,
        callee_span: Span,
        candidate: &str,
        failure: &ConstraintFailure,
    ) {
        for unsatisfied in &failure.unsatisfied {
            let diagnostic = match unsatisfied {
                Unsatisfied::Mismatch { lower, upper, origin } => {
                    Diagnostic::candidate_mismatch(upper, lower, origin.span(), candidate.to_string())
                }
                Unsatisfied::ArgumentCount { expected, found } => {
                    Diagnostic::argument_count(*expected, *found, call, candidate.to_string())
                }
                Unsatisfied::TypeArgumentCount { expected, found } => {
                    Diagnostic::type_argument_count(*expected, *found, call, candidate.to_string())
                }
                Unsatisfied::CannotInfer { name, .. } => Diagnostic::cannot_infer_parameter(name, callee_span),
                Unsatisfied::TooComplex => continue,
            };
            self.report(diagnostic);
        }
    }

    // ── Resolution ──────────────────────────────────────────────────────

    fn resolve_call(&mut self, site: &CallSite<'_>, expected: &Expected) -> CallOutcome {
        let mut closest: Option<(String, Attempt)> = None;
        for level in Level::ORDER {
            let candidates = self.candidates(level, site);
            if candidates.is_empty() {
                continue;
            }
            tracing::trace!(callee = site.callee, ?level, count = candidates.len(), "trying candidates");

            let mut attempts = Vec::with_capacity(candidates.len());
            for candidate in &candidates {
                let attempt = self.attempt(site, candidate, expected);
                if self.budget.exhausted {
                    return CallOutcome::TooComplex;
                }
                attempts.push(attempt);
            }

            match self.select(&candidates, &attempts) {
                Selection::One(i) => {
                    let attempt = attempts.swap_remove(i);
                    return self.commit(site, &candidates[i], attempt);
                }
                Selection::Ambiguous(tied) => {
                    tracing::debug!(callee = site.callee, count = tied.len(), "ambiguous call");
                    let rendered = tied.into_iter().map(|i| candidates[i].rendered.clone()).collect();
                    return CallOutcome::Ambiguous(rendered);
                }
                Selection::None => {
                    if closest.is_none() {
                        closest = candidates
                            .into_iter()
                            .zip(attempts)
                            .min_by_key(|(_, attempt)| attempt.distance())
                            .map(|(candidate, attempt)| (candidate.rendered, attempt));
                    }
                }
            }
        }
        match closest {
            None => CallOutcome::Unresolved,
            Some((candidate, attempt)) => match attempt.result {
                Err(failure) => CallOutcome::Mismatch { candidate, failure, buffer: attempt.buffer },
                Ok(_) => CallOutcome::Unresolved,
            },
        }
    }

    fn candidates(&mut self, level: Level, site: &CallSite<'_>) -> Vec<Candidate> {
        let mut signatures = match level {
            Level::Local => {
                let local = self.env.lookup(site.callee).map(|l| l.ty.clone());
                let Some(Ty::Fun(params, ret)) = local else {
                    return Vec::new();
                };
                self.env.use_name(site.callee);
                return vec![Candidate::local(site.callee, params, *ret)];
            }
            Level::Function => self.symbols.lookup(site.callee),
            Level::Invoke => {
                if !site.type_args.is_empty() || self.symbols.object(site.callee).is_none() {
                    return Vec::new();
                }
                self.symbols.members(site.callee, "invoke")
            }
        };
        signatures.sort_by_key(|sig| sig.decl_order);
        signatures.into_iter().map(Candidate::from_signature).collect()
    }

    /// Build and resolve one candidate's constraint system.
    fn attempt(&mut self, site: &CallSite<'_>, candidate: &Candidate, expected: &Expected) -> Attempt {
        self.budget.attempts += 1;
        if self.budget.attempts > self.config.max_candidate_attempts {
            tracing::debug!(attempts = self.budget.attempts, "candidate budget exhausted");
            self.budget.exhausted = true;
            return Attempt::failed(Unsatisfied::TooComplex);
        }
        tracing::trace!(candidate = %candidate.rendered, "attempting candidate");

        if candidate.params.len() != site.args.len() {
            return Attempt::failed(Unsatisfied::ArgumentCount {
                expected: candidate.params.len(),
                found: site.args.len(),
            });
        }
        if !site.type_args.is_empty() && site.type_args.len() != candidate.type_params.len() {
            return Attempt::failed(Unsatisfied::TypeArgumentCount {
                expected: candidate.type_params.len(),
                found: site.type_args.len(),
            });
        }

        let mut cs = ConstraintSystem::new(self.supply.clone())
            .with_step_limit(self.config.max_propagation_steps);

        // A generic parameter that no value parameter mentions only flows
        // out through the result.
        let instantiation: Vec<(String, Ty)> = candidate
            .type_params
            .iter()
            .map(|tp| {
                let position = if candidate.params.iter().any(|p| p.mentions_param(&tp.name)) {
                    VarPosition::Input
                } else {
                    VarPosition::Output
                };
                let var = cs.new_type_variable(&tp.name, Vec::new(), position);
                (tp.name.clone(), Ty::Var(var))
            })
            .collect();
        for (tp, (_, var)) in candidate.type_params.iter().zip(&instantiation) {
            if let (Some(bound), Ty::Var(v)) = (&tp.upper_bound, var) {
                let origin = ConstraintOrigin::DeclaredBound { span: site.callee_span, param: tp.name.clone() };
                cs.add_declared_bound(*v, bound.subst_params(&instantiation), origin);
            }
        }
        for (index, ((ty, span), (_, var))) in site.type_args.iter().zip(&instantiation).enumerate() {
            cs.add_equality(var.clone(), ty.clone(), ConstraintOrigin::TypeArgument { span: *span, index });
        }

        let params: Vec<Ty> = candidate.params.iter().map(|p| p.subst_params(&instantiation)).collect();
        let return_type = candidate.return_type.subst_params(&instantiation);

        let origin = ConstraintOrigin::ExpectedType { span: site.span };
        match expected {
            Expected::None => {}
            Expected::Subtype(t) => cs.add_constraint(return_type.clone(), t.clone(), origin),
            Expected::Exact(t) => cs.add_equality(return_type.clone(), t.clone(), origin),
        }
        for (index, (arg, param)) in site.args.iter().zip(&params).enumerate() {
            if let (Some(arg_ty), None) = (&site.arg_types[index], &site.plain[index]) {
                let origin = ConstraintOrigin::Argument { call: site.span, arg: arg.span, index };
                cs.add_constraint(arg_ty.clone(), param.clone(), origin);
            }
        }

        // Call arguments next, in context where they do not fit on their own.
        let mut contextual: Vec<Option<Recorder>> = site.args.iter().map(|_| None).collect();
        for (index, (arg, param)) in site.args.iter().zip(&params).enumerate() {
            let (Some(arg_ty), Some(_)) = (&site.arg_types[index], &site.plain[index]) else {
                continue;
            };
            let ty = match self.contextual_argument(&cs, arg, arg_ty, param) {
                Some((ty, rec)) => {
                    contextual[index] = Some(rec);
                    ty
                }
                None => arg_ty.clone(),
            };
            if self.budget.exhausted {
                return Attempt::failed(Unsatisfied::TooComplex);
            }
            let origin = ConstraintOrigin::Argument { call: site.span, arg: arg.span, index };
            cs.add_constraint(ty, param.clone(), origin);
        }

        // Literals go last so they see everything the other arguments
        // already pinned down.
        self.push_recorder();
        for (index, (arg, param)) in site.args.iter().zip(&params).enumerate() {
            if site.arg_types[index].is_some() {
                continue;
            }
            let hint = self.literal_hint(&mut cs, param, arg.span, index);
            let literal = self.infer_literal(arg, hint.as_ref(), Some(site.callee));
            let ty = literal.ty();
            self.record(arg.id, ty.clone());
            let origin = ConstraintOrigin::Argument { call: site.span, arg: arg.span, index };
            cs.add_constraint(ty, param.clone(), origin);
            cs.extend(literal.emitted);
            if self.budget.exhausted {
                self.pop_recorder();
                return Attempt::failed(Unsatisfied::TooComplex);
            }
        }
        let mut buffer = self.pop_recorder();
        cs.extend(std::mem::take(&mut buffer.constraints));
        for (index, plain) in site.plain.iter().enumerate() {
            match (contextual[index].take(), plain) {
                (Some(rec), _) => buffer.absorb(rec),
                (None, Some(plain)) => buffer.absorb(plain.clone()),
                (None, None) => {}
            }
        }

        let result = cs.resolve(self.lattice);
        let subst = match &result {
            Ok(solution) => &solution.substitution,
            Err(failure) => {
                if failure.is_too_complex() {
                    self.budget.exhausted = true;
                }
                &failure.substitution
            }
        };
        buffer.apply(subst);
        let params = params.iter().map(|p| subst.apply(p)).collect();
        let return_type = subst.apply(&return_type);
        let type_arguments = instantiation.iter().map(|(_, var)| subst.apply(var)).collect();
        Attempt { params, return_type, type_arguments, buffer, result }
    }

    /// Infer a call argument again, this time against its parameter type,
    /// when the type it got on its own does not fit. Only a parameter type
    /// the constraints gathered so far pin down completely is used, and
    /// only an analysis without errors is kept.
    fn contextual_argument(
        &mut self,
        cs: &ConstraintSystem,
        arg: &Expr,
        plain: &Ty,
        param: &Ty,
    ) -> Option<(Ty, Recorder)> {
        let target = if param.has_vars() {
            cs.partial_solution(self.lattice).apply(param)
        } else {
            param.clone()
        };
        if target.has_vars() || plain.has_vars() || self.lattice.is_subtype(plain, &target) {
            return None;
        }
        tracing::trace!(arg = %arg.span, target = %target, "inferring call argument in context");
        self.push_recorder();
        let ty = self.infer_expr(arg, &Expected::Subtype(target));
        let rec = self.pop_recorder();
        if rec.diagnostics.has_errors() || self.budget.exhausted {
            return None;
        }
        Some((ty, rec))
    }

    /// The function type a literal argument is analysed against: the
    /// parameter's function type, with those of the candidate's variables
    /// in its parameter positions that are already pinned down fixed (and
    /// the fix recorded as an equality so the final solution agrees).
    fn literal_hint(
        &self,
        cs: &mut ConstraintSystem,
        param: &Ty,
        literal: Span,
        index: usize,
    ) -> Option<Ty> {
        let Ty::Fun(params, ret) = param.non_null() else {
            return None;
        };
        let mut vars = Vec::new();
        for p in params {
            p.collect_vars(&mut vars);
        }
        if vars.is_empty() {
            return Some(Ty::Fun(params.clone(), ret.clone()));
        }
        let partial = cs.partial_solution(self.lattice);
        let mut fixed = Substitution::new();
        for var in vars {
            let Some(ty) = partial.get(var) else { continue };
            if ty.has_vars() || !cs.owns(var) || fixed.get(var).is_some() {
                continue;
            }
            fixed.insert(var, ty.clone());
            let origin = ConstraintOrigin::LiteralParameter { literal, index };
            cs.add_equality(Ty::Var(var), ty.clone(), origin);
        }
        Some(Ty::Fun(params.iter().map(|p| fixed.apply(p)).collect(), ret.clone()))
    }

    /// Pick the most specific successful attempt.
    fn select(&self, candidates: &[Candidate], attempts: &[Attempt]) -> Selection {
        let winners: Vec<usize> = (0..attempts.len()).filter(|&i| attempts[i].result.is_ok()).collect();
        match winners.as_slice() {
            [] => return Selection::None,
            [only] => return Selection::One(*only),
            _ => {}
        }
        let as_specific = |a: usize, b: usize| {
            attempts[a]
                .params
                .iter()
                .zip(&attempts[b].params)
                .all(|(x, y)| self.lattice.is_subtype(x, y))
        };
        let maximal: Vec<usize> = winners
            .iter()
            .copied()
            .filter(|&a| winners.iter().all(|&b| a == b || as_specific(a, b)))
            .collect();
        match maximal.as_slice() {
            [] => {
                // Only the candidates nothing else beats take part in the tie.
                let undominated = winners
                    .iter()
                    .copied()
                    .filter(|&a| {
                        !winners.iter().any(|&b| b != a && as_specific(b, a) && !as_specific(a, b))
                    })
                    .collect();
                return Selection::Ambiguous(undominated);
            }
            [only] => return Selection::One(*only),
            _ => {}
        }

        // Equally specific: non-generic beats generic, then declaration order.
        let non_generic: Vec<usize> =
            maximal.iter().copied().filter(|&i| !candidates[i].is_generic()).collect();
        let pool = if non_generic.is_empty() { maximal } else { non_generic };
        if pool.len() == 1 {
            return Selection::One(pool[0]);
        }
        if pool.iter().any(|&i| candidates[i].decl_order.is_none()) {
            return Selection::Ambiguous(pool);
        }
        pool.iter()
            .copied()
            .min_by_key(|&i| candidates[i].decl_order)
            .map_or(Selection::None, Selection::One)
    }

    /// Keep the chosen attempt: its recorded types and diagnostics, its
    /// constraints on outer variables, and the callee.
    fn commit(&mut self, site: &CallSite<'_>, candidate: &Candidate, attempt: Attempt) -> CallOutcome {
        let residual = match attempt.result {
            Ok(solution) => solution.residual,
            Err(_) => Vec::new(),
        };
        tracing::debug!(callee = site.callee, signature = %candidate.rendered, "resolved call");
        self.rec.absorb(attempt.buffer);
        for constraint in residual {
            self.emit(constraint);
        }
        self.rec.calls.push((
            site.id,
            ResolvedCall {
                callee: candidate.callee.clone(),
                signature: candidate.rendered.clone(),
                type_arguments: attempt.type_arguments,
            },
        ));
        CallOutcome::Resolved(attempt.return_type)
    }
}

