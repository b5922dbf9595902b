//! Type representation for the Tern type system.
//!
//! Defines the core `Ty` enum, named type constructors (`TyCon`), inference
//! variables (`TyVar`), and the supply that hands out fresh variable ids for
//! one compilation unit.

use std::cell::Cell;
use std::fmt;
use std::rc::Rc;

use serde::Serialize;

/// An inference variable, identified by a unit-wide unique `u32`.
///
/// Variables are owned by exactly one `ConstraintSystem`; other systems see
/// them as external and only forward constraints that mention them.
#[derive(Copy, Clone, Debug, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize)]
pub struct TyVar(pub u32);

/// A named type constructor such as `Int`, `List` or an object's own type.
#[derive(Clone, Debug, PartialEq, Eq, Hash, Serialize)]
pub struct TyCon {
    pub name: String,
}

impl TyCon {
    pub fn new(name: impl Into<String>) -> Self {
        TyCon { name: name.into() }
    }
}

impl fmt::Display for TyCon {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.name)
    }
}

/// A Tern type.
///
/// - `Named`: a class, interface or object type with type arguments
/// - `Var`: an inference variable (solved by a constraint system)
/// - `Param`: a generic parameter inside a declared signature or class
/// - `Fun`: a function type `(params) -> ret`
/// - `Nullable`: `T?`
/// - `Nothing`: the bottom type, the type of expressions that never complete
/// - `Error`: the type of a node whose inference failed; absorbs everything
#[derive(Clone, Debug, PartialEq, Eq, Hash, Serialize)]
pub enum Ty {
    Named(TyCon, Vec<Ty>),
    Var(TyVar),
    Param(String),
    Fun(Vec<Ty>, Box<Ty>),
    Nullable(Box<Ty>),
    Nothing,
    Error,
}

impl Ty {
    pub fn named(name: &str, args: Vec<Ty>) -> Ty {
        Ty::Named(TyCon::new(name), args)
    }

    pub fn simple(name: &str) -> Ty {
        Ty::Named(TyCon::new(name), Vec::new())
    }

    pub fn any() -> Ty {
        Ty::simple("Any")
    }

    /// `Any?`, the top of the lattice.
    pub fn top() -> Ty {
        Ty::nullable(Ty::any())
    }

    pub fn unit() -> Ty {
        Ty::simple("Unit")
    }

    pub fn int() -> Ty {
        Ty::simple("Int")
    }

    pub fn long() -> Ty {
        Ty::simple("Long")
    }

    pub fn number() -> Ty {
        Ty::simple("Number")
    }

    pub fn string() -> Ty {
        Ty::simple("String")
    }

    pub fn boolean() -> Ty {
        Ty::simple("Boolean")
    }

    pub fn list(elem: Ty) -> Ty {
        Ty::named("List", vec![elem])
    }

    pub fn param(name: &str) -> Ty {
        Ty::Param(name.to_string())
    }

    pub fn fun(params: Vec<Ty>, ret: Ty) -> Ty {
        Ty::Fun(params, Box::new(ret))
    }

    /// `T?`. Wrapping is idempotent: `nullable(T?)` is `T?`.
    pub fn nullable(inner: Ty) -> Ty {
        match inner {
            Ty::Nullable(_) | Ty::Error => inner,
            other => Ty::Nullable(Box::new(other)),
        }
    }

    /// The type of the `null` literal.
    pub fn null() -> Ty {
        Ty::nullable(Ty::Nothing)
    }

    pub fn is_error(&self) -> bool {
        matches!(self, Ty::Error)
    }

    pub fn is_nothing(&self) -> bool {
        matches!(self, Ty::Nothing)
    }

    pub fn is_unit(&self) -> bool {
        matches!(self, Ty::Named(con, args) if con.name == "Unit" && args.is_empty())
    }

    /// Strip one level of nullability.
    pub fn non_null(&self) -> &Ty {
        match self {
            Ty::Nullable(inner) => inner,
            other => other,
        }
    }

    /// Whether any inference variable occurs in this type.
    pub fn has_vars(&self) -> bool {
        match self {
            Ty::Var(_) => true,
            Ty::Named(_, args) => args.iter().any(Ty::has_vars),
            Ty::Fun(params, ret) => params.iter().any(Ty::has_vars) || ret.has_vars(),
            Ty::Nullable(inner) => inner.has_vars(),
            Ty::Param(_) | Ty::Nothing | Ty::Error => false,
        }
    }

    /// Collect the inference variables of this type in first-occurrence order.
    pub fn collect_vars(&self, out: &mut Vec<TyVar>) {
        match self {
            Ty::Var(v) => {
                if !out.contains(v) {
                    out.push(*v);
                }
            }
            Ty::Named(_, args) => args.iter().for_each(|a| a.collect_vars(out)),
            Ty::Fun(params, ret) => {
                params.iter().for_each(|p| p.collect_vars(out));
                ret.collect_vars(out);
            }
            Ty::Nullable(inner) => inner.collect_vars(out),
            Ty::Param(_) | Ty::Nothing | Ty::Error => {}
        }
    }

    /// Whether the generic parameter `name` occurs in this type.
    pub fn mentions_param(&self, name: &str) -> bool {
        match self {
            Ty::Param(p) => p == name,
            Ty::Named(_, args) => args.iter().any(|a| a.mentions_param(name)),
            Ty::Fun(params, ret) => {
                params.iter().any(|p| p.mentions_param(name)) || ret.mentions_param(name)
            }
            Ty::Nullable(inner) => inner.mentions_param(name),
            Ty::Var(_) | Ty::Nothing | Ty::Error => false,
        }
    }

    /// Replace generic parameters by name. Unknown parameters are kept.
    pub fn subst_params(&self, map: &[(String, Ty)]) -> Ty {
        match self {
            Ty::Param(p) => map
                .iter()
                .find(|(name, _)| name == p)
                .map(|(_, ty)| ty.clone())
                .unwrap_or_else(|| self.clone()),
            Ty::Named(con, args) => {
                Ty::Named(con.clone(), args.iter().map(|a| a.subst_params(map)).collect())
            }
            Ty::Fun(params, ret) => Ty::Fun(
                params.iter().map(|p| p.subst_params(map)).collect(),
                Box::new(ret.subst_params(map)),
            ),
            Ty::Nullable(inner) => Ty::nullable(inner.subst_params(map)),
            Ty::Var(_) | Ty::Nothing | Ty::Error => self.clone(),
        }
    }
}

fn write_list(f: &mut fmt::Formatter<'_>, items: &[Ty]) -> fmt::Result {
    for (i, item) in items.iter().enumerate() {
        if i > 0 {
            write!(f, ", ")?;
        }
        write!(f, "{}", item)?;
    }
    Ok(())
}

impl fmt::Display for Ty {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Ty::Named(con, args) => {
                write!(f, "{}", con)?;
                if !args.is_empty() {
                    write!(f, "<")?;
                    write_list(f, args)?;
                    write!(f, ">")?;
                }
                Ok(())
            }
            Ty::Var(v) => write!(f, "?{}", v.0),
            Ty::Param(name) => write!(f, "{}", name),
            Ty::Fun(params, ret) => {
                write!(f, "(")?;
                write_list(f, params)?;
                write!(f, ") -> {}", ret)
            }
            Ty::Nullable(inner) => match inner.as_ref() {
                Ty::Fun(..) => write!(f, "({})?", inner),
                _ => write!(f, "{}?", inner),
            },
            Ty::Nothing => write!(f, "Nothing"),
            Ty::Error => write!(f, "<error>"),
        }
    }
}

/// Declared variance of a generic parameter.
#[derive(Copy, Clone, Debug, PartialEq, Eq, Hash, Serialize, serde::Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Variance {
    /// `out T`: follows the argument's subtyping.
    Out,
    /// `in T`: reverses the argument's subtyping.
    In,
    /// `T`: requires equal arguments.
    Invariant,
}

impl fmt::Display for Variance {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Variance::Out => write!(f, "out "),
            Variance::In => write!(f, "in "),
            Variance::Invariant => Ok(()),
        }
    }
}

/// Hands out unit-wide unique type variable ids.
///
/// Cloned into every constraint system of one unit. Single-threaded by
/// construction: a unit's inference state never crosses threads.
#[derive(Clone, Debug, Default)]
pub struct VarSupply {
    next: Rc<Cell<u32>>,
}

impl VarSupply {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn fresh(&self) -> TyVar {
        let id = self.next.get();
        self.next.set(id + 1);
        TyVar(id)
    }

    /// Number of variables handed out so far.
    pub fn issued(&self) -> u32 {
        self.next.get()
    }
}
