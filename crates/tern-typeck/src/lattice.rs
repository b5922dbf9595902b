//! The subtyping lattice over declared classes.
//!
//! `Nothing` sits below everything and `Any?` above everything. Named types
//! are related through the declared supertype lists, with type arguments
//! compared by the declared variance of the class's parameters. `Error`
//! relates to everything in both directions so a failed node never causes a
//! second diagnostic.

use crate::symbols::SymbolTable;
use crate::ty::{Ty, TyCon, Variance};

/// Subtyping queries against one unit's declarations.
#[derive(Copy, Clone)]
pub struct Lattice<'a> {
    symbols: &'a SymbolTable,
}

impl<'a> Lattice<'a> {
    pub fn new(symbols: &'a SymbolTable) -> Self {
        Lattice { symbols }
    }

    /// Declared variances of `class`'s parameters; unknown classes are invariant.
    pub fn variances(&self, class: &str, arity: usize) -> Vec<Variance> {
        match self.symbols.class(class) {
            Some(decl) if decl.type_params.len() == arity => {
                decl.type_params.iter().map(|tp| tp.variance).collect()
            }
            _ => vec![Variance::Invariant; arity],
        }
    }

    /// Project `Named(con, args)` onto its supertype `target`, returning the
    /// supertype's arguments, e.g. `MutableList<Int>` as `Collection` is `[Int]`.
    pub fn supertype_as(&self, con: &TyCon, args: &[Ty], target: &str) -> Option<Vec<Ty>> {
        if con.name == target {
            return Some(args.to_vec());
        }
        self.supertypes(&Ty::Named(con.clone(), args.to_vec()))
            .into_iter()
            .find_map(|sup| match sup {
                Ty::Named(c, a) if c.name == target => Some(a),
                _ => None,
            })
    }

    /// All supertypes of a named type, nearest first, the type itself
    /// included and `Any` last.
    pub fn supertypes(&self, ty: &Ty) -> Vec<Ty> {
        let mut out = vec![ty.clone()];
        let mut seen: Vec<String> = Vec::new();
        if let Ty::Named(con, _) = ty {
            seen.push(con.name.clone());
        }
        let mut cursor = 0;
        while cursor < out.len() {
            if let Ty::Named(con, args) = &out[cursor] {
                if let Some(decl) = self.symbols.class(&con.name) {
                    let map: Vec<(String, Ty)> = decl
                        .type_params
                        .iter()
                        .map(|tp| tp.name.clone())
                        .zip(args.iter().cloned())
                        .collect();
                    let direct: Vec<Ty> =
                        decl.supertypes.iter().map(|s| s.subst_params(&map)).collect();
                    for sup in direct {
                        if let Ty::Named(sc, _) = &sup {
                            if !seen.contains(&sc.name) {
                                seen.push(sc.name.clone());
                                out.push(sup);
                            }
                        }
                    }
                }
            }
            cursor += 1;
        }
        if !seen.iter().any(|s| s == "Any") {
            out.push(Ty::any());
        }
        out
    }

    /// `sub <: sup` for types whose variables are treated as opaque.
    pub fn is_subtype(&self, sub: &Ty, sup: &Ty) -> bool {
        match (sub, sup) {
            (Ty::Error, _) | (_, Ty::Error) => true,
            (Ty::Nothing, _) => true,
            (Ty::Nullable(a), Ty::Nullable(b)) => self.is_subtype(a, b),
            (a, Ty::Nullable(b)) => self.is_subtype(a, b),
            (Ty::Nullable(_), _) => false,
            (Ty::Var(a), Ty::Var(b)) => a == b,
            (Ty::Param(a), Ty::Param(b)) => a == b,
            (Ty::Var(_) | Ty::Param(_), Ty::Named(con, args)) => {
                con.name == "Any" && args.is_empty()
            }
            (Ty::Fun(pa, ra), Ty::Fun(pb, rb)) => {
                pa.len() == pb.len()
                    && pa.iter().zip(pb).all(|(a, b)| self.is_subtype(b, a))
                    && self.is_subtype(ra, rb)
            }
            (Ty::Fun(..), Ty::Named(con, args)) => con.name == "Any" && args.is_empty(),
            (Ty::Named(c, a), Ty::Named(d, b)) => {
                if d.name == "Any" && b.is_empty() {
                    return true;
                }
                match self.supertype_as(c, a, &d.name) {
                    Some(projected) => self.args_conform(&d.name, &projected, b),
                    None => false,
                }
            }
            _ => false,
        }
    }

    fn args_conform(&self, class: &str, sub: &[Ty], sup: &[Ty]) -> bool {
        if sub.len() != sup.len() {
            return false;
        }
        let variances = self.variances(class, sub.len());
        sub.iter().zip(sup).zip(variances).all(|((s, t), v)| match v {
            Variance::Out => self.is_subtype(s, t),
            Variance::In => self.is_subtype(t, s),
            Variance::Invariant => self.equivalent(s, t),
        })
    }

    pub fn equivalent(&self, a: &Ty, b: &Ty) -> bool {
        self.is_subtype(a, b) && self.is_subtype(b, a)
    }

    /// Least upper bound. `Nothing` is the identity, `Error` absorbs.
    pub fn lub(&self, types: &[Ty]) -> Ty {
        if types.iter().any(Ty::is_error) {
            return Ty::Error;
        }
        let nullable = types.iter().any(|t| matches!(t, Ty::Nullable(_)));
        let mut acc: Option<Ty> = None;
        for ty in types {
            let ty = ty.non_null();
            if ty.is_nothing() {
                continue;
            }
            acc = Some(match acc {
                None => ty.clone(),
                Some(prev) => self.lub2(&prev, ty),
            });
        }
        let base = acc.unwrap_or(Ty::Nothing);
        if nullable {
            Ty::nullable(base)
        } else {
            base
        }
    }

    fn lub2(&self, a: &Ty, b: &Ty) -> Ty {
        if self.is_subtype(a, b) {
            return b.clone();
        }
        if self.is_subtype(b, a) {
            return a.clone();
        }
        match (a, b) {
            (Ty::Fun(pa, ra), Ty::Fun(pb, rb)) if pa.len() == pb.len() => {
                let params: Option<Vec<Ty>> = pa
                    .iter()
                    .zip(pb)
                    .map(|(x, y)| self.glb(&[x.clone(), y.clone()]))
                    .collect();
                match params {
                    Some(params) => Ty::fun(params, self.lub2(ra, rb)),
                    None => Ty::any(),
                }
            }
            (Ty::Named(..), Ty::Named(..)) => {
                for candidate in self.supertypes(a) {
                    let Ty::Named(con, a_args) = &candidate else {
                        continue;
                    };
                    let Some(b_args) = self.lub_projection(b, con) else {
                        continue;
                    };
                    if let Some(args) = self.join_args(&con.name, a_args, &b_args) {
                        return Ty::Named(con.clone(), args);
                    }
                }
                Ty::any()
            }
            _ => Ty::any(),
        }
    }

    fn lub_projection(&self, ty: &Ty, target: &TyCon) -> Option<Vec<Ty>> {
        match ty {
            Ty::Named(con, args) => self.supertype_as(con, args, &target.name),
            _ => None,
        }
    }

    fn join_args(&self, class: &str, a: &[Ty], b: &[Ty]) -> Option<Vec<Ty>> {
        if a.len() != b.len() {
            return None;
        }
        let variances = self.variances(class, a.len());
        a.iter()
            .zip(b)
            .zip(variances)
            .map(|((x, y), v)| match v {
                Variance::Out => Some(self.lub(&[x.clone(), y.clone()])),
                Variance::In => self.glb(&[x.clone(), y.clone()]),
                Variance::Invariant => self.equivalent(x, y).then(|| x.clone()),
            })
            .collect()
    }

    /// Greatest lower bound among the given types: the first one that is a
    /// subtype of all the others. `None` when no such type exists.
    pub fn glb(&self, types: &[Ty]) -> Option<Ty> {
        if types.iter().any(Ty::is_error) {
            return Some(Ty::Error);
        }
        types
            .iter()
            .find(|candidate| types.iter().all(|other| self.is_subtype(candidate, other)))
            .cloned()
    }
}
