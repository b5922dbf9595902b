//! Lexical environment with a scope stack.
//!
//! Each scope keeps its bindings in insertion order so that unused-binding
//! warnings come out in source order. Lookups search from the innermost
//! scope outward; a later binding shadows an earlier one of the same name.

use rustc_hash::FxHashMap;
use tern_common::Span;

use crate::ty::Ty;

#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub enum LocalKind {
    /// `val x = ...`
    Variable,
    /// A parameter of a named function.
    Parameter,
    /// A declared parameter of a function literal.
    LiteralParameter,
    /// The implicit `it` of a one-parameter literal.
    Implicit,
}

#[derive(Clone, Debug)]
pub struct Local {
    pub name: String,
    pub ty: Ty,
    pub span: Span,
    pub kind: LocalKind,
    pub used: bool,
}

#[derive(Default)]
struct Scope {
    bindings: Vec<Local>,
    by_name: FxHashMap<String, usize>,
}

pub struct TypeEnv {
    /// Index 0 is the outermost scope.
    scopes: Vec<Scope>,
}

impl TypeEnv {
    pub fn new() -> Self {
        TypeEnv { scopes: vec![Scope::default()] }
    }

    pub fn push_scope(&mut self) {
        self.scopes.push(Scope::default());
    }

    /// Pop the innermost scope and hand back its bindings in insertion
    /// order. The outermost scope is never popped.
    pub fn pop_scope(&mut self) -> Vec<Local> {
        if self.scopes.len() <= 1 {
            return Vec::new();
        }
        self.scopes.pop().map(|s| s.bindings).unwrap_or_default()
    }

    pub fn insert(&mut self, name: &str, ty: Ty, span: Span, kind: LocalKind) {
        if let Some(scope) = self.scopes.last_mut() {
            scope.by_name.insert(name.to_string(), scope.bindings.len());
            scope.bindings.push(Local { name: name.to_string(), ty, span, kind, used: false });
        }
    }

    pub fn lookup(&self, name: &str) -> Option<&Local> {
        self.scopes
            .iter()
            .rev()
            .find_map(|scope| scope.by_name.get(name).map(|&i| &scope.bindings[i]))
    }

    /// Look a name up and mark it used. Returns its type.
    pub fn use_name(&mut self, name: &str) -> Option<Ty> {
        for scope in self.scopes.iter_mut().rev() {
            if let Some(&i) = scope.by_name.get(name) {
                let local = &mut scope.bindings[i];
                local.used = true;
                return Some(local.ty.clone());
            }
        }
        None
    }

    pub fn depth(&self) -> usize {
        self.scopes.len()
    }
}

impl Default for TypeEnv {
    fn default() -> Self {
        Self::new()
    }
}
