//! The constraint system.
//!
//! A `ConstraintSystem` records type variables and directed (`lower <: upper`)
//! or symmetric (`a == b`) relations between types. Nothing is checked while
//! constraints are added, so they may arrive in any order; `resolve` does all
//! the work:
//!
//! 1. Propagation. Every recorded constraint is pushed through a worklist
//!    that decomposes structured types (variance-aware for named types,
//!    contravariant parameters for function types) until each side of a
//!    pair is an owned variable, and accumulates lower/upper bound sets per
//!    variable. Bounds flow transitively through variable-variable edges
//!    until no set changes. Equalities between two owned variables also
//!    merge them into one `ena` equivalence class.
//! 2. Solving. A class equated to a concrete type is fixed to it. Any other
//!    class is fixed to the least upper bound of its proper lower bounds, or
//!    failing that the greatest lower bound of its proper upper bounds. A
//!    class with no bounds at all defaults to `Nothing` when it only occurs
//!    in output position.
//! 3. Verification. Every recorded constraint (and every declared bound) is
//!    re-checked under the substitution. Anything that still mentions a
//!    variable this system does not own is handed back as a residual
//!    constraint for the enclosing system.
//!
//! `resolve` takes `&self` and builds fresh solver state each time, so it can
//! be run speculatively (the call resolver does this before analysing a
//! function literal) and running it twice yields the same result.

use std::collections::VecDeque;
use std::fmt;

use ena::unify::{InPlaceUnificationTable, UnifyKey};
use rustc_hash::FxHashMap;

use crate::error::ConstraintOrigin;
use crate::lattice::Lattice;
use crate::ty::{Ty, TyVar, VarSupply, Variance};

/// Default cap on worklist steps for one `resolve` call.
pub const DEFAULT_STEP_LIMIT: usize = 100_000;

// ── Constraints ─────────────────────────────────────────────────────────

#[derive(Clone, Debug, PartialEq, Eq)]
pub enum Constraint {
    Subtype { lower: Ty, upper: Ty, origin: ConstraintOrigin },
    Equal { left: Ty, right: Ty, origin: ConstraintOrigin },
}

impl Constraint {
    pub fn origin(&self) -> &ConstraintOrigin {
        match self {
            Constraint::Subtype { origin, .. } | Constraint::Equal { origin, .. } => origin,
        }
    }

    /// Apply `subst` to both sides.
    pub fn apply(&self, subst: &Substitution) -> Constraint {
        match self {
            Constraint::Subtype { lower, upper, origin } => Constraint::Subtype {
                lower: subst.apply(lower),
                upper: subst.apply(upper),
                origin: origin.clone(),
            },
            Constraint::Equal { left, right, origin } => Constraint::Equal {
                left: subst.apply(left),
                right: subst.apply(right),
                origin: origin.clone(),
            },
        }
    }

    /// The variables on either side, in first-occurrence order.
    pub fn vars(&self) -> Vec<TyVar> {
        let mut out = Vec::new();
        match self {
            Constraint::Subtype { lower, upper, .. } => {
                lower.collect_vars(&mut out);
                upper.collect_vars(&mut out);
            }
            Constraint::Equal { left, right, .. } => {
                left.collect_vars(&mut out);
                right.collect_vars(&mut out);
            }
        }
        out
    }
}

impl fmt::Display for Constraint {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Constraint::Subtype { lower, upper, .. } => write!(f, "{} <: {}", lower, upper),
            Constraint::Equal { left, right, .. } => write!(f, "{} == {}", left, right),
        }
    }
}

/// Where a variable occurs in the signature it was instantiated from.
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub enum VarPosition {
    /// Only in the result (covariant) position: defaults to `Nothing`.
    Output,
    /// Somewhere a value flows in: must be inferred or reported.
    Input,
}

#[derive(Clone, Debug)]
struct VarInfo {
    var: TyVar,
    name: String,
    position: VarPosition,
    declared: Vec<(Ty, ConstraintOrigin)>,
}

// ── Results ─────────────────────────────────────────────────────────────

/// A mapping from variables to the types they were fixed to.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct Substitution {
    map: FxHashMap<TyVar, Ty>,
}

impl Substitution {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn insert(&mut self, var: TyVar, ty: Ty) {
        self.map.insert(var, ty);
    }

    pub fn get(&self, var: TyVar) -> Option<&Ty> {
        self.map.get(&var)
    }

    /// Merge `other` into `self`, `other` winning on overlap.
    pub fn extend(&mut self, other: &Substitution) {
        for (v, t) in &other.map {
            self.map.insert(*v, t.clone());
        }
    }

    /// Replace every bound variable in `ty`, following chains.
    pub fn apply(&self, ty: &Ty) -> Ty {
        match ty {
            Ty::Var(v) => match self.map.get(v) {
                Some(bound) if bound != ty => self.apply(bound),
                _ => ty.clone(),
            },
            Ty::Named(con, args) => {
                Ty::Named(con.clone(), args.iter().map(|a| self.apply(a)).collect())
            }
            Ty::Fun(params, ret) => Ty::Fun(
                params.iter().map(|p| self.apply(p)).collect(),
                Box::new(self.apply(ret)),
            ),
            Ty::Nullable(inner) => Ty::nullable(self.apply(inner)),
            Ty::Param(_) | Ty::Nothing | Ty::Error => ty.clone(),
        }
    }
}

/// A successful resolution.
#[derive(Clone, Debug, PartialEq)]
pub struct Solution {
    pub substitution: Substitution,
    /// Constraints that still mention variables of an enclosing system,
    /// already rewritten under `substitution`.
    pub residual: Vec<Constraint>,
}

/// One reason a system failed to resolve.
#[derive(Clone, Debug, PartialEq)]
pub enum Unsatisfied {
    /// `lower <: upper` (or equality) does not hold after solving.
    Mismatch { lower: Ty, upper: Ty, origin: ConstraintOrigin },
    /// A call supplied the wrong number of arguments.
    ArgumentCount { expected: usize, found: usize },
    /// A call supplied the wrong number of explicit type arguments.
    TypeArgumentCount { expected: usize, found: usize },
    /// A variable used in input position received no bounds.
    CannotInfer { var: TyVar, name: String },
    /// Propagation exceeded the step limit.
    TooComplex,
}

impl fmt::Display for Unsatisfied {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Unsatisfied::Mismatch { lower, upper, .. } => {
                write!(f, "{} is not a subtype of {}", lower, upper)
            }
            Unsatisfied::ArgumentCount { expected, found } => {
                write!(f, "expected {} argument(s), found {}", expected, found)
            }
            Unsatisfied::TypeArgumentCount { expected, found } => {
                write!(f, "expected {} type argument(s), found {}", expected, found)
            }
            Unsatisfied::CannotInfer { name, .. } => {
                write!(f, "not enough information to infer {}", name)
            }
            Unsatisfied::TooComplex => write!(f, "constraint propagation did not settle"),
        }
    }
}

/// The unsatisfiable constraints of a failed resolution, in recording order.
#[derive(Clone, Debug, PartialEq)]
pub struct ConstraintFailure {
    pub unsatisfied: Vec<Unsatisfied>,
    /// Best-effort bindings: every variable that could be fixed, the rest
    /// bound to `Error`. Empty when propagation gave up.
    pub substitution: Substitution,
}

impl ConstraintFailure {
    pub fn new(unsatisfied: Vec<Unsatisfied>) -> Self {
        ConstraintFailure { unsatisfied, substitution: Substitution::new() }
    }

    pub fn is_too_complex(&self) -> bool {
        self.unsatisfied.iter().any(|u| matches!(u, Unsatisfied::TooComplex))
    }
}

impl fmt::Display for ConstraintFailure {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for (i, u) in self.unsatisfied.iter().enumerate() {
            if i > 0 {
                write!(f, "; ")?;
            }
            write!(f, "{}", u)?;
        }
        Ok(())
    }
}

impl std::error::Error for ConstraintFailure {}

// ── The system ──────────────────────────────────────────────────────────

/// Variables and constraints for one resolution attempt.
#[derive(Clone, Debug)]
pub struct ConstraintSystem {
    supply: VarSupply,
    vars: Vec<VarInfo>,
    constraints: Vec<Constraint>,
    step_limit: usize,
}

impl ConstraintSystem {
    pub fn new(supply: VarSupply) -> Self {
        ConstraintSystem {
            supply,
            vars: Vec::new(),
            constraints: Vec::new(),
            step_limit: DEFAULT_STEP_LIMIT,
        }
    }

    pub fn with_step_limit(mut self, limit: usize) -> Self {
        self.step_limit = limit;
        self
    }

    /// Allocate a fresh variable owned by this system. `bounds` are declared
    /// upper bounds: they are checked, never used to pick the solution.
    pub fn new_type_variable(
        &mut self,
        name: &str,
        bounds: Vec<(Ty, ConstraintOrigin)>,
        position: VarPosition,
    ) -> TyVar {
        let var = self.supply.fresh();
        tracing::trace!(var = var.0, name, "new type variable");
        self.vars.push(VarInfo { var, name: name.to_string(), position, declared: bounds });
        var
    }

    /// Attach a declared upper bound to a variable after creation (bounds
    /// may mention sibling variables that did not exist yet).
    pub fn add_declared_bound(&mut self, var: TyVar, bound: Ty, origin: ConstraintOrigin) {
        if let Some(info) = self.vars.iter_mut().find(|i| i.var == var) {
            info.declared.push((bound, origin));
        }
    }

    pub fn add_constraint(&mut self, lower: Ty, upper: Ty, origin: ConstraintOrigin) {
        self.constraints.push(Constraint::Subtype { lower, upper, origin });
    }

    pub fn add_equality(&mut self, left: Ty, right: Ty, origin: ConstraintOrigin) {
        self.constraints.push(Constraint::Equal { left, right, origin });
    }

    /// Record constraints produced elsewhere (e.g. emitted by a literal).
    pub fn extend(&mut self, constraints: impl IntoIterator<Item = Constraint>) {
        self.constraints.extend(constraints);
    }

    pub fn owns(&self, var: TyVar) -> bool {
        self.vars.iter().any(|i| i.var == var)
    }

    pub fn resolve(&self, lattice: Lattice<'_>) -> Result<Solution, ConstraintFailure> {
        let mut solver = Solver::new(self, lattice);
        solver.propagate();
        if solver.steps > self.step_limit {
            tracing::debug!(steps = solver.steps, "constraint propagation exceeded step limit");
            return Err(ConstraintFailure::new(vec![Unsatisfied::TooComplex]));
        }
        let (substitution, mut failures) = solver.solve();
        let residual = solver.verify(&substitution, &mut failures);
        if failures.is_empty() {
            Ok(Solution { substitution, residual })
        } else {
            tracing::trace!(count = failures.len(), "constraint system unsatisfiable");
            Err(ConstraintFailure { unsatisfied: failures, substitution })
        }
    }

    /// Bindings for the variables whose bounds already pin them down,
    /// without defaulting or failing on the rest. Used to fix a candidate's
    /// variables before analysing a function literal against it.
    pub fn partial_solution(&self, lattice: Lattice<'_>) -> Substitution {
        let mut solver = Solver::new(self, lattice);
        solver.propagate();
        if solver.steps > self.step_limit {
            return Substitution::new();
        }
        solver.fixable()
    }
}

// ── Solver state ────────────────────────────────────────────────────────

/// Dense index of an owned variable, used as the `ena` key.
#[derive(Copy, Clone, Debug, PartialEq, Eq, Hash)]
struct Slot(u32);

impl UnifyKey for Slot {
    type Value = ();

    fn index(&self) -> u32 {
        self.0
    }

    fn from_index(u: u32) -> Self {
        Slot(u)
    }

    fn tag() -> &'static str {
        "Slot"
    }
}

struct Solver<'a> {
    system: &'a ConstraintSystem,
    lattice: Lattice<'a>,
    slots: FxHashMap<TyVar, Slot>,
    classes: InPlaceUnificationTable<Slot>,
    lower: Vec<Vec<Ty>>,
    upper: Vec<Vec<Ty>>,
    /// Concrete types a variable was equated to directly.
    exact: Vec<Vec<Ty>>,
    work: VecDeque<(Ty, Ty)>,
    steps: usize,
}

impl<'a> Solver<'a> {
    fn new(system: &'a ConstraintSystem, lattice: Lattice<'a>) -> Self {
        let mut classes = InPlaceUnificationTable::new();
        let mut slots = FxHashMap::default();
        for info in &system.vars {
            let slot = classes.new_key(());
            slots.insert(info.var, slot);
        }
        let n = system.vars.len();
        Solver {
            system,
            lattice,
            slots,
            classes,
            lower: vec![Vec::new(); n],
            upper: vec![Vec::new(); n],
            exact: vec![Vec::new(); n],
            work: VecDeque::new(),
            steps: 0,
        }
    }

    fn owned(&self, ty: &Ty) -> Option<Slot> {
        match ty {
            Ty::Var(v) => self.slots.get(v).copied(),
            _ => None,
        }
    }

    fn mentions_owned(&self, ty: &Ty) -> bool {
        let mut vars = Vec::new();
        ty.collect_vars(&mut vars);
        vars.iter().any(|v| self.slots.contains_key(v))
    }

    // ── Propagation ─────────────────────────────────────────────────

    fn propagate(&mut self) {
        let system = self.system;
        for c in &system.constraints {
            match c {
                Constraint::Subtype { lower, upper, .. } => {
                    self.work.push_back((lower.clone(), upper.clone()));
                }
                Constraint::Equal { left, right, .. } => {
                    match (self.owned(left), self.owned(right)) {
                        (Some(a), Some(b)) => self.classes.union(a, b),
                        (Some(a), None) if !right.has_vars() => self.add_exact(a, right),
                        (None, Some(b)) if !left.has_vars() => self.add_exact(b, left),
                        _ => {}
                    }
                    self.work.push_back((left.clone(), right.clone()));
                    self.work.push_back((right.clone(), left.clone()));
                }
            }
        }
        while let Some((lower, upper)) = self.work.pop_front() {
            self.steps += 1;
            if self.steps > self.system.step_limit {
                return;
            }
            self.step(lower, upper);
        }
    }

    /// Decompose one `lower <: upper` obligation. Pairs that can never hold
    /// are dropped here; verification reports them against the recorded
    /// constraint they came from.
    fn step(&mut self, lower: Ty, upper: Ty) {
        if lower == upper {
            return;
        }
        match (self.owned(&lower), self.owned(&upper)) {
            (Some(a), Some(b)) => {
                self.add_upper(a, upper);
                self.add_lower(b, lower);
                return;
            }
            (Some(a), None) => {
                self.add_upper(a, upper);
                return;
            }
            (None, Some(b)) => {
                self.add_lower(b, lower);
                return;
            }
            (None, None) => {}
        }
        match (lower, upper) {
            (Ty::Error, _) | (_, Ty::Error) | (Ty::Nothing, _) => {}
            (Ty::Var(_), _) | (_, Ty::Var(_)) => {}
            (Ty::Nullable(a), Ty::Nullable(b)) => self.work.push_back((*a, *b)),
            // `T? <: X` with an owned `X` nested deeper is rechecked after
            // solving; here only the non-null parts can contribute bounds.
            (Ty::Nullable(a), b) => self.work.push_back((*a, b)),
            (a, Ty::Nullable(b)) => self.work.push_back((a, *b)),
            (Ty::Fun(pa, ra), Ty::Fun(pb, rb)) => {
                if pa.len() == pb.len() {
                    for (a, b) in pa.into_iter().zip(pb) {
                        self.work.push_back((b, a));
                    }
                    self.work.push_back((*ra, *rb));
                }
            }
            (Ty::Named(c, a), Ty::Named(d, b)) => {
                let Some(projected) = self.lattice.supertype_as(&c, &a, &d.name) else {
                    return;
                };
                if projected.len() != b.len() {
                    return;
                }
                let variances = self.lattice.variances(&d.name, b.len());
                for ((p, q), v) in projected.into_iter().zip(b).zip(variances) {
                    match v {
                        Variance::Out => self.work.push_back((p, q)),
                        Variance::In => self.work.push_back((q, p)),
                        Variance::Invariant => {
                            if let (Some(x), Some(y)) = (self.owned(&p), self.owned(&q)) {
                                self.classes.union(x, y);
                            }
                            self.work.push_back((p.clone(), q.clone()));
                            self.work.push_back((q, p));
                        }
                    }
                }
            }
            _ => {}
        }
    }

    fn add_exact(&mut self, slot: Slot, ty: &Ty) {
        let exact = &mut self.exact[slot.0 as usize];
        if !exact.contains(ty) {
            exact.push(ty.clone());
        }
    }

    fn add_lower(&mut self, slot: Slot, ty: Ty) {
        let bounds = &mut self.lower[slot.0 as usize];
        if bounds.contains(&ty) {
            return;
        }
        bounds.push(ty.clone());
        for up in self.upper[slot.0 as usize].clone() {
            self.work.push_back((ty.clone(), up));
        }
    }

    fn add_upper(&mut self, slot: Slot, ty: Ty) {
        let bounds = &mut self.upper[slot.0 as usize];
        if bounds.contains(&ty) {
            return;
        }
        bounds.push(ty.clone());
        for low in self.lower[slot.0 as usize].clone() {
            self.work.push_back((low, ty.clone()));
        }
    }

    // ── Solving ─────────────────────────────────────────────────────

    /// Fix every equivalence class. Variables that cannot be fixed map to
    /// `Error` so verification does not report them a second time.
    fn solve(&mut self) -> (Substitution, Vec<Unsatisfied>) {
        let mut subst = Substitution::new();
        let mut failures = Vec::new();

        for members in self.groups() {
            let (lowers, uppers) = self.class_bounds(&members);
            let output_only = members
                .iter()
                .all(|&m| self.system.vars[m].position == VarPosition::Output);

            let first = &self.system.vars[members[0]];
            let picked = self.class_exact(&members).or_else(|| self.pick(&lowers, &uppers, output_only));
            let ty = match picked {
                Some(ty) => ty,
                None => {
                    failures.push(Unsatisfied::CannotInfer {
                        var: first.var,
                        name: first.name.clone(),
                    });
                    Ty::Error
                }
            };
            tracing::trace!(var = first.var.0, ty = %ty, "fixed type variable");
            for &m in &members {
                subst.insert(self.system.vars[m].var, ty.clone());
            }
        }
        (subst, failures)
    }

    /// Owned variable indices grouped by equivalence class, in creation order.
    fn groups(&mut self) -> Vec<Vec<usize>> {
        let mut groups: Vec<(Slot, Vec<usize>)> = Vec::new();
        for idx in 0..self.system.vars.len() {
            let root = self.classes.find(Slot(idx as u32));
            match groups.iter_mut().find(|(r, _)| *r == root) {
                Some((_, members)) => members.push(idx),
                None => groups.push((root, vec![idx])),
            }
        }
        groups.into_iter().map(|(_, members)| members).collect()
    }

    /// The bounds of a class that do not mention owned variables.
    fn class_bounds(&self, members: &[usize]) -> (Vec<Ty>, Vec<Ty>) {
        let mut lowers: Vec<Ty> = Vec::new();
        let mut uppers: Vec<Ty> = Vec::new();
        for &m in members {
            for t in &self.lower[m] {
                if !self.mentions_owned(t) && !lowers.contains(t) {
                    lowers.push(t.clone());
                }
            }
            for t in &self.upper[m] {
                if !self.mentions_owned(t) && !uppers.contains(t) {
                    uppers.push(t.clone());
                }
            }
        }
        (lowers, uppers)
    }

    /// The first concrete type any member of a class was equated to.
    fn class_exact(&self, members: &[usize]) -> Option<Ty> {
        members.iter().find_map(|&m| self.exact[m].first().cloned())
    }

    /// Classes with concrete bounds, fixed the way `solve` would fix them.
    fn fixable(&mut self) -> Substitution {
        let mut subst = Substitution::new();
        for members in self.groups() {
            let (lowers, uppers) = self.class_bounds(&members);
            let lowers: Vec<Ty> = lowers.into_iter().filter(|t| !t.has_vars()).collect();
            let uppers: Vec<Ty> = uppers.into_iter().filter(|t| !t.has_vars()).collect();
            let picked = match self.class_exact(&members) {
                Some(ty) => Some(ty),
                None if lowers.is_empty() && uppers.is_empty() => continue,
                None => self.pick(&lowers, &uppers, false),
            };
            if let Some(ty) = picked {
                for &m in &members {
                    subst.insert(self.system.vars[m].var, ty.clone());
                }
            }
        }
        subst
    }

    fn pick(&self, lowers: &[Ty], uppers: &[Ty], output_only: bool) -> Option<Ty> {
        let (concrete_lo, external_lo): (Vec<Ty>, Vec<Ty>) =
            lowers.iter().cloned().partition(|t| !t.has_vars());
        if !concrete_lo.is_empty() {
            return Some(self.lattice.lub(&concrete_lo));
        }
        if let Some(ext) = external_lo.into_iter().next() {
            return Some(ext);
        }
        let (concrete_up, external_up): (Vec<Ty>, Vec<Ty>) =
            uppers.iter().cloned().partition(|t| !t.has_vars());
        if !concrete_up.is_empty() {
            // Conflicting upper bounds surface in verification.
            return self.lattice.glb(&concrete_up).or_else(|| concrete_up.first().cloned());
        }
        if let Some(ext) = external_up.into_iter().next() {
            return Some(ext);
        }
        output_only.then_some(Ty::Nothing)
    }

    // ── Verification ────────────────────────────────────────────────

    fn verify(&self, subst: &Substitution, failures: &mut Vec<Unsatisfied>) -> Vec<Constraint> {
        let mut residual = Vec::new();
        let declared = self.system.vars.iter().flat_map(|info| {
            info.declared.iter().map(move |(bound, origin)| Constraint::Subtype {
                lower: Ty::Var(info.var),
                upper: bound.clone(),
                origin: origin.clone(),
            })
        });
        for c in self.system.constraints.iter().cloned().chain(declared) {
            let origin = c.origin().clone();
            let (lower, upper, holds) = match c.apply(subst) {
                Constraint::Subtype { lower, upper, .. } => {
                    let holds = self.check(&lower, &upper, &origin, &mut residual);
                    (lower, upper, holds)
                }
                Constraint::Equal { left, right, .. } => {
                    let holds = self.check(&left, &right, &origin, &mut residual)
                        && self.check(&right, &left, &origin, &mut residual);
                    (left, right, holds)
                }
            };
            if !holds {
                failures.push(Unsatisfied::Mismatch { lower, upper, origin });
            }
        }
        residual
    }

    /// Check `lower <: upper` with owned variables already substituted.
    /// Pairs mentioning outside variables are pushed to `residual` at the
    /// outermost position where a variable appears.
    fn check(
        &self,
        lower: &Ty,
        upper: &Ty,
        origin: &ConstraintOrigin,
        residual: &mut Vec<Constraint>,
    ) -> bool {
        if lower == upper {
            return true;
        }
        if !lower.has_vars() && !upper.has_vars() {
            return self.lattice.is_subtype(lower, upper);
        }
        match (lower, upper) {
            (Ty::Error, _) | (_, Ty::Error) | (Ty::Nothing, _) => true,
            (Ty::Var(_), _) | (_, Ty::Var(_)) => {
                residual.push(Constraint::Subtype {
                    lower: lower.clone(),
                    upper: upper.clone(),
                    origin: origin.clone(),
                });
                true
            }
            (Ty::Nullable(a), Ty::Nullable(b)) => self.check(a, b, origin, residual),
            (Ty::Nullable(_), _) => false,
            (a, Ty::Nullable(b)) => self.check(a, b, origin, residual),
            (Ty::Fun(pa, ra), Ty::Fun(pb, rb)) => {
                pa.len() == pb.len()
                    && pa.iter().zip(pb).all(|(a, b)| self.check(b, a, origin, residual))
                    && self.check(ra, rb, origin, residual)
            }
            (Ty::Fun(..), Ty::Named(con, args)) => con.name == "Any" && args.is_empty(),
            (Ty::Named(c, a), Ty::Named(d, b)) => {
                if d.name == "Any" && b.is_empty() {
                    return true;
                }
                let Some(projected) = self.lattice.supertype_as(c, a, &d.name) else {
                    return false;
                };
                if projected.len() != b.len() {
                    return false;
                }
                let variances = self.lattice.variances(&d.name, b.len());
                projected.iter().zip(b).zip(variances).all(|((p, q), v)| match v {
                    Variance::Out => self.check(p, q, origin, residual),
                    Variance::In => self.check(q, p, origin, residual),
                    Variance::Invariant => {
                        self.check(p, q, origin, residual) && self.check(q, p, origin, residual)
                    }
                })
            }
            _ => false,
        }
    }
}
