//! Symbol table: declared classes, objects and callable signatures.
//!
//! The table is produced once per compilation unit by a declaration pass
//! (here: [`SymbolTableBuilder`]) and is read-only during inference. It is
//! plain data, so one table may be shared by units checked on different
//! threads.

use std::fmt;

use rustc_hash::FxHashMap;
use serde::Serialize;

use crate::ty::{Ty, Variance};

/// Index of a declared signature in its [`SymbolTable`].
#[derive(Copy, Clone, Debug, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize)]
pub struct SignatureId(pub u32);

/// A declared generic parameter.
#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
pub struct TypeParam {
    pub name: String,
    pub variance: Variance,
    /// Declared upper bound; `None` means `Any?`.
    pub upper_bound: Option<Ty>,
}

impl TypeParam {
    pub fn new(name: &str) -> Self {
        TypeParam { name: name.to_string(), variance: Variance::Invariant, upper_bound: None }
    }

    pub fn out(name: &str) -> Self {
        TypeParam { variance: Variance::Out, ..TypeParam::new(name) }
    }

    pub fn contra(name: &str) -> Self {
        TypeParam { variance: Variance::In, ..TypeParam::new(name) }
    }

    pub fn bounded(mut self, bound: Ty) -> Self {
        self.upper_bound = Some(bound);
        self
    }
}

impl fmt::Display for TypeParam {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}{}", self.variance, self.name)?;
        if let Some(bound) = &self.upper_bound {
            write!(f, " : {}", bound)?;
        }
        Ok(())
    }
}

/// A named value parameter of a signature.
#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
pub struct ValueParam {
    pub name: String,
    pub ty: Ty,
}

/// A callable's declared shape. Immutable once stored in a table.
#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
pub struct Signature {
    pub id: SignatureId,
    pub name: String,
    /// The class or object declaring this member, `None` for top-level functions.
    pub owner: Option<String>,
    pub type_params: Vec<TypeParam>,
    pub params: Vec<ValueParam>,
    pub return_type: Ty,
    /// Position in source declaration order across the whole unit.
    pub decl_order: u32,
}

impl Signature {
    pub fn param_types(&self) -> impl Iterator<Item = &Ty> {
        self.params.iter().map(|p| &p.ty)
    }

    pub fn is_generic(&self) -> bool {
        !self.type_params.is_empty()
    }
}

impl fmt::Display for Signature {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "fun ")?;
        if !self.type_params.is_empty() {
            write!(f, "<")?;
            for (i, tp) in self.type_params.iter().enumerate() {
                if i > 0 {
                    write!(f, ", ")?;
                }
                write!(f, "{}", tp)?;
            }
            write!(f, "> ")?;
        }
        if let Some(owner) = &self.owner {
            write!(f, "{}.", owner)?;
        }
        write!(f, "{}(", self.name)?;
        for (i, p) in self.params.iter().enumerate() {
            if i > 0 {
                write!(f, ", ")?;
            }
            write!(f, "{}: {}", p.name, p.ty)?;
        }
        write!(f, "): {}", self.return_type)
    }
}

/// A signature as written by the declaration pass, before it gets an id.
#[derive(Clone, Debug)]
pub struct SigDecl {
    name: String,
    type_params: Vec<TypeParam>,
    params: Vec<ValueParam>,
    return_type: Ty,
}

impl SigDecl {
    pub fn new(name: &str) -> Self {
        SigDecl {
            name: name.to_string(),
            type_params: Vec::new(),
            params: Vec::new(),
            return_type: Ty::unit(),
        }
    }

    pub fn type_param(mut self, tp: TypeParam) -> Self {
        self.type_params.push(tp);
        self
    }

    pub fn param(mut self, name: &str, ty: Ty) -> Self {
        self.params.push(ValueParam { name: name.to_string(), ty });
        self
    }

    pub fn returns(mut self, ty: Ty) -> Self {
        self.return_type = ty;
        self
    }
}

#[derive(Copy, Clone, Debug, PartialEq, Eq, Serialize)]
pub enum ClassKind {
    Class,
    Interface,
    /// A singleton: the name is both a type and a value of that type.
    Object,
}

/// A declared class, interface or object.
#[derive(Clone, Debug, Serialize)]
pub struct ClassDecl {
    pub name: String,
    pub kind: ClassKind,
    pub type_params: Vec<TypeParam>,
    /// Direct supertypes, written in terms of this class's `Param`s.
    /// Empty means `Any` (except for `Any` itself).
    pub supertypes: Vec<Ty>,
    /// Member signatures in declaration order.
    pub members: Vec<SignatureId>,
}

impl ClassDecl {
    pub fn new(name: &str, kind: ClassKind) -> Self {
        ClassDecl {
            name: name.to_string(),
            kind,
            type_params: Vec::new(),
            supertypes: Vec::new(),
            members: Vec::new(),
        }
    }

    pub fn type_param(mut self, tp: TypeParam) -> Self {
        self.type_params.push(tp);
        self
    }

    pub fn extends(mut self, supertype: Ty) -> Self {
        self.supertypes.push(supertype);
        self
    }

    /// The class applied to its own parameters, e.g. `List<E>`.
    pub fn self_type(&self) -> Ty {
        Ty::named(
            &self.name,
            self.type_params.iter().map(|tp| Ty::Param(tp.name.clone())).collect(),
        )
    }
}

/// Errors detected while building a symbol table.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum DeclError {
    DuplicateClass(String),
    UnknownOwner(String),
    UnknownSupertype { class: String, supertype: String },
    SupertypeArity { class: String, supertype: String, expected: usize, found: usize },
    CyclicHierarchy(String),
}

impl fmt::Display for DeclError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            DeclError::DuplicateClass(name) => write!(f, "class `{}` is declared twice", name),
            DeclError::UnknownOwner(name) => write!(f, "member owner `{}` is not declared", name),
            DeclError::UnknownSupertype { class, supertype } => {
                write!(f, "supertype `{}` of `{}` is not declared", supertype, class)
            }
            DeclError::SupertypeArity { class, supertype, expected, found } => write!(
                f,
                "supertype `{}` of `{}` expects {} type argument(s), found {}",
                supertype, class, expected, found
            ),
            DeclError::CyclicHierarchy(name) => {
                write!(f, "class `{}` is its own supertype", name)
            }
        }
    }
}

impl std::error::Error for DeclError {}

/// Read-only table of declarations for one compilation unit.
#[derive(Clone, Debug, Default)]
pub struct SymbolTable {
    classes: FxHashMap<String, ClassDecl>,
    signatures: Vec<Signature>,
    functions: FxHashMap<String, Vec<SignatureId>>,
}

impl SymbolTable {
    pub fn builder() -> SymbolTableBuilder {
        SymbolTableBuilder::default()
    }

    /// Top-level overload set for `name`, in declaration order. Empty means
    /// the name does not resolve to a function.
    pub fn lookup(&self, name: &str) -> Vec<&Signature> {
        self.functions
            .get(name)
            .map(|ids| ids.iter().map(|id| self.signature(*id)).collect())
            .unwrap_or_default()
    }

    pub fn signature(&self, id: SignatureId) -> &Signature {
        &self.signatures[id.0 as usize]
    }

    pub fn class(&self, name: &str) -> Option<&ClassDecl> {
        self.classes.get(name)
    }

    /// The singleton object named `name`, if any.
    pub fn object(&self, name: &str) -> Option<&ClassDecl> {
        self.classes.get(name).filter(|c| c.kind == ClassKind::Object)
    }

    /// Members called `name` declared by `class`, in declaration order.
    pub fn members(&self, class: &str, name: &str) -> Vec<&Signature> {
        self.classes
            .get(class)
            .map(|c| {
                c.members
                    .iter()
                    .map(|id| self.signature(*id))
                    .filter(|sig| sig.name == name)
                    .collect()
            })
            .unwrap_or_default()
    }
}

/// Collects declarations, then validates the class hierarchy.
#[derive(Default)]
pub struct SymbolTableBuilder {
    table: SymbolTable,
    errors: Vec<DeclError>,
}

impl SymbolTableBuilder {
    pub fn class(&mut self, decl: ClassDecl) -> &mut Self {
        if self.table.classes.contains_key(&decl.name) {
            self.errors.push(DeclError::DuplicateClass(decl.name));
        } else {
            self.table.classes.insert(decl.name.clone(), decl);
        }
        self
    }

    pub fn function(&mut self, decl: SigDecl) -> SignatureId {
        let id = self.push_signature(decl, None);
        let name = self.table.signature(id).name.clone();
        self.table.functions.entry(name).or_default().push(id);
        id
    }

    /// Declare a member of an already-declared class or object.
    pub fn member(&mut self, owner: &str, decl: SigDecl) -> Result<SignatureId, DeclError> {
        if !self.table.classes.contains_key(owner) {
            let err = DeclError::UnknownOwner(owner.to_string());
            self.errors.push(err.clone());
            return Err(err);
        }
        let id = self.push_signature(decl, Some(owner.to_string()));
        if let Some(class) = self.table.classes.get_mut(owner) {
            class.members.push(id);
        }
        Ok(id)
    }

    fn push_signature(&mut self, decl: SigDecl, owner: Option<String>) -> SignatureId {
        let id = SignatureId(self.table.signatures.len() as u32);
        self.table.signatures.push(Signature {
            id,
            name: decl.name,
            owner,
            type_params: decl.type_params,
            params: decl.params,
            return_type: decl.return_type,
            decl_order: id.0,
        });
        id
    }

    /// Validate supertypes and hand out the finished table.
    pub fn finish(mut self) -> Result<SymbolTable, Vec<DeclError>> {
        let mut names: Vec<&String> = self.table.classes.keys().collect();
        names.sort();
        for name in names {
            let class = &self.table.classes[name];
            for sup in &class.supertypes {
                let Ty::Named(con, args) = sup else {
                    continue;
                };
                match self.table.classes.get(&con.name) {
                    None => self.errors.push(DeclError::UnknownSupertype {
                        class: name.clone(),
                        supertype: con.name.clone(),
                    }),
                    Some(sup_decl) if sup_decl.type_params.len() != args.len() => {
                        self.errors.push(DeclError::SupertypeArity {
                            class: name.clone(),
                            supertype: con.name.clone(),
                            expected: sup_decl.type_params.len(),
                            found: args.len(),
                        })
                    }
                    Some(_) => {}
                }
            }
            if reaches(&self.table, name, name) {
                self.errors.push(DeclError::CyclicHierarchy(name.clone()));
            }
        }
        if self.errors.is_empty() {
            Ok(self.table)
        } else {
            Err(self.errors)
        }
    }
}

/// Whether `target` is reachable from `from`'s supertypes.
fn reaches(table: &SymbolTable, from: &str, target: &str) -> bool {
    let mut stack: Vec<&str> = vec![from];
    let mut seen: Vec<&str> = Vec::new();
    while let Some(current) = stack.pop() {
        let Some(class) = table.classes.get(current) else {
            continue;
        };
        for sup in &class.supertypes {
            if let Ty::Named(con, _) = sup {
                if con.name == target {
                    return true;
                }
                if !seen.contains(&con.name.as_str()) {
                    seen.push(&con.name);
                    stack.push(&con.name);
                }
            }
        }
    }
    false
}
