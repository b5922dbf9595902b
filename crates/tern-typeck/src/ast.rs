//! The expression tree the checker consumes.
//!
//! Trees come from the parser with a `Span` on every node and a unit-unique
//! `ExprId` on every expression; types written in source are already
//! resolved to `Ty`. [`TreeBuilder`] builds positioned trees straight from a
//! source string, locating each node's span by substring, for tools and
//! tests that have no parser at hand.

use serde::Serialize;
use tern_common::Span;

use crate::ty::Ty;

#[derive(Copy, Clone, Debug, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize)]
pub struct ExprId(pub u32);

#[derive(Clone, Debug)]
pub struct CompilationUnit {
    pub items: Vec<Item>,
}

#[derive(Clone, Debug)]
pub enum Item {
    Function(FunctionDecl),
    /// A top-level `val`.
    Property(LetStmt),
}

#[derive(Clone, Debug)]
pub struct FunctionDecl {
    pub name: String,
    pub name_span: Span,
    pub params: Vec<Param>,
    pub return_type: Ty,
    pub body: Block,
    pub span: Span,
}

/// A parameter of a function or function literal. Function parameters
/// always carry a type; literal parameters may leave it to inference.
#[derive(Clone, Debug)]
pub struct Param {
    pub name: String,
    pub ty: Option<Ty>,
    pub span: Span,
}

#[derive(Clone, Debug)]
pub struct Block {
    pub stmts: Vec<Stmt>,
    pub span: Span,
}

#[derive(Clone, Debug)]
pub enum Stmt {
    Let(LetStmt),
    Expr(Expr),
}

impl Stmt {
    pub fn span(&self) -> Span {
        match self {
            Stmt::Let(l) => l.span,
            Stmt::Expr(e) => e.span,
        }
    }
}

#[derive(Clone, Debug)]
pub struct LetStmt {
    pub name: String,
    pub name_span: Span,
    pub ty: Option<Ty>,
    pub init: Expr,
    pub span: Span,
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub enum Literal {
    Int(i64),
    String(String),
    Bool(bool),
    Null,
}

#[derive(Clone, Debug)]
pub struct Expr {
    pub id: ExprId,
    pub span: Span,
    pub kind: ExprKind,
}

#[derive(Clone, Debug)]
pub enum ExprKind {
    Literal(Literal),
    /// A bare reference: a local, a parameter, or an object.
    Name(String),
    Call {
        callee: String,
        callee_span: Span,
        type_args: Vec<(Ty, Span)>,
        args: Vec<Expr>,
    },
    /// A function literal. Empty `params` means none were written, which
    /// allows the implicit `it`.
    Lambda {
        label: Option<String>,
        params: Vec<Param>,
        body: Block,
    },
    /// `return v` (enclosing function) or `return@label v` (a literal).
    Return {
        label: Option<String>,
        label_span: Option<Span>,
        value: Option<Box<Expr>>,
    },
    If {
        cond: Box<Expr>,
        then_branch: Box<Expr>,
        else_branch: Option<Box<Expr>>,
    },
    Block(Block),
    /// `checkType<T>(e)`: `e` must have exactly type `T`.
    CheckType { expr: Box<Expr>, ty: Ty },
}

impl Expr {
    /// Direct sub-expressions, in source order.
    pub fn children(&self) -> Vec<&Expr> {
        match &self.kind {
            ExprKind::Literal(_) | ExprKind::Name(_) => Vec::new(),
            ExprKind::Call { args, .. } => args.iter().collect(),
            ExprKind::Lambda { body, .. } | ExprKind::Block(body) => body.exprs(),
            ExprKind::Return { value, .. } => value.iter().map(|v| v.as_ref()).collect(),
            ExprKind::If { cond, then_branch, else_branch } => {
                let mut out = vec![cond.as_ref(), then_branch.as_ref()];
                out.extend(else_branch.iter().map(|e| e.as_ref()));
                out
            }
            ExprKind::CheckType { expr, .. } => vec![expr.as_ref()],
        }
    }

    /// Pre-order walk over this expression and everything under it.
    pub fn walk<'a>(&'a self, f: &mut dyn FnMut(&'a Expr)) {
        f(self);
        for child in self.children() {
            child.walk(f);
        }
    }
}

impl Block {
    /// The block's statements' top-level expressions, in order.
    pub fn exprs(&self) -> Vec<&Expr> {
        self.stmts
            .iter()
            .map(|s| match s {
                Stmt::Let(l) => &l.init,
                Stmt::Expr(e) => e,
            })
            .collect()
    }
}

impl CompilationUnit {
    /// Every expression in the unit, pre-order, in item order.
    pub fn exprs(&self) -> Vec<&Expr> {
        let mut out = Vec::new();
        for item in &self.items {
            let roots = match item {
                Item::Function(f) => f.body.exprs(),
                Item::Property(p) => vec![&p.init],
            };
            for root in roots {
                root.walk(&mut |e| out.push(e));
            }
        }
        out
    }

    /// The outermost expression whose span is exactly `span`.
    pub fn expr_at(&self, span: Span) -> Option<&Expr> {
        self.exprs().into_iter().find(|e| e.span == span)
    }
}

// ── Builder ─────────────────────────────────────────────────────────────

/// Builds positioned trees against a source string.
///
/// Spans are located by substring: [`TreeBuilder::find`] returns the first
/// occurrence of a snippet, [`TreeBuilder::nth`] a later one, and
/// [`TreeBuilder::find_in`] searches inside another span. Names, integer
/// and string literal values are read back from the source text.
///
/// # Panics
///
/// The locating methods panic when the snippet does not occur; a builder
/// call that names text the source does not contain is a bug in the caller.
pub struct TreeBuilder<'s> {
    source: &'s str,
    next_id: u32,
}

impl<'s> TreeBuilder<'s> {
    pub fn new(source: &'s str) -> Self {
        TreeBuilder { source, next_id: 0 }
    }

    pub fn source(&self) -> &'s str {
        self.source
    }

    // ── Locating ────────────────────────────────────────────────────

    pub fn find(&self, snippet: &str) -> Span {
        self.nth(snippet, 0)
    }

    /// The `n`th (zero-based) occurrence of `snippet`.
    pub fn nth(&self, snippet: &str, n: usize) -> Span {
        let start = self
            .source
            .match_indices(snippet)
            .nth(n)
            .map(|(i, _)| i)
            .unwrap_or_else(|| panic!("occurrence {} of {:?} not found in source", n, snippet));
        Span::new(start as u32, (start + snippet.len()) as u32)
    }

    /// The first occurrence of `snippet` inside `within`.
    pub fn find_in(&self, within: Span, snippet: &str) -> Span {
        let hay = &self.source[within.start as usize..within.end as usize];
        let offset = hay
            .find(snippet)
            .unwrap_or_else(|| panic!("{:?} not found inside {}", snippet, within));
        let start = within.start as usize + offset;
        Span::new(start as u32, (start + snippet.len()) as u32)
    }

    pub fn text(&self, span: Span) -> &'s str {
        &self.source[span.start as usize..span.end as usize]
    }

    fn expr(&mut self, span: Span, kind: ExprKind) -> Expr {
        let id = ExprId(self.next_id);
        self.next_id += 1;
        Expr { id, span, kind }
    }

    // ── Expressions ─────────────────────────────────────────────────

    pub fn int(&mut self, span: Span) -> Expr {
        let value = self.text(span).parse().unwrap_or_else(|_| panic!("not an integer: {}", span));
        self.expr(span, ExprKind::Literal(Literal::Int(value)))
    }

    /// A string literal; the span includes the quotes.
    pub fn string(&mut self, span: Span) -> Expr {
        let value = self.text(span).trim_matches('"').to_string();
        self.expr(span, ExprKind::Literal(Literal::String(value)))
    }

    pub fn boolean(&mut self, span: Span) -> Expr {
        let value = self.text(span) == "true";
        self.expr(span, ExprKind::Literal(Literal::Bool(value)))
    }

    pub fn null(&mut self, span: Span) -> Expr {
        self.expr(span, ExprKind::Literal(Literal::Null))
    }

    pub fn name(&mut self, span: Span) -> Expr {
        let name = self.text(span).to_string();
        self.expr(span, ExprKind::Name(name))
    }

    /// A call whose callee name is the text at `callee_span`.
    pub fn call(&mut self, span: Span, callee_span: Span, args: Vec<Expr>) -> Expr {
        self.generic_call(span, callee_span, Vec::new(), args)
    }

    pub fn generic_call(
        &mut self,
        span: Span,
        callee_span: Span,
        type_args: Vec<(Ty, Span)>,
        args: Vec<Expr>,
    ) -> Expr {
        let callee = self.text(callee_span).to_string();
        self.expr(span, ExprKind::Call { callee, callee_span, type_args, args })
    }

    pub fn lambda(&mut self, span: Span, params: Vec<Param>, body: Block) -> Expr {
        self.expr(span, ExprKind::Lambda { label: None, params, body })
    }

    pub fn labeled_lambda(
        &mut self,
        label: &str,
        span: Span,
        params: Vec<Param>,
        body: Block,
    ) -> Expr {
        self.expr(span, ExprKind::Lambda { label: Some(label.to_string()), params, body })
    }

    /// `return value` or `return@label value`; `label_span` covers the
    /// label text after the `@`.
    pub fn ret(&mut self, span: Span, label_span: Option<Span>, value: Option<Expr>) -> Expr {
        let label = label_span.map(|s| self.text(s).to_string());
        self.expr(span, ExprKind::Return { label, label_span, value: value.map(Box::new) })
    }

    pub fn if_else(&mut self, span: Span, cond: Expr, then: Expr, otherwise: Option<Expr>) -> Expr {
        self.expr(
            span,
            ExprKind::If {
                cond: Box::new(cond),
                then_branch: Box::new(then),
                else_branch: otherwise.map(Box::new),
            },
        )
    }

    pub fn block_expr(&mut self, block: Block) -> Expr {
        let span = block.span;
        self.expr(span, ExprKind::Block(block))
    }

    pub fn check_type(&mut self, span: Span, expr: Expr, ty: Ty) -> Expr {
        self.expr(span, ExprKind::CheckType { expr: Box::new(expr), ty })
    }

    // ── Statements and declarations ─────────────────────────────────

    pub fn block(&self, span: Span, stmts: Vec<Stmt>) -> Block {
        Block { stmts, span }
    }

    /// A block holding a single expression statement, spanning it.
    pub fn block_of(&self, expr: Expr) -> Block {
        let span = expr.span;
        Block { stmts: vec![Stmt::Expr(expr)], span }
    }

    pub fn let_stmt(&self, span: Span, name_span: Span, ty: Option<Ty>, init: Expr) -> LetStmt {
        LetStmt { name: self.text(name_span).to_string(), name_span, ty, init, span }
    }

    /// A parameter named by the text at `span`.
    pub fn param(&self, span: Span, ty: Option<Ty>) -> Param {
        Param { name: self.text(span).to_string(), ty, span }
    }

    pub fn function(
        &self,
        span: Span,
        name_span: Span,
        params: Vec<Param>,
        return_type: Ty,
        body: Block,
    ) -> FunctionDecl {
        FunctionDecl {
            name: self.text(name_span).to_string(),
            name_span,
            params,
            return_type,
            body,
            span,
        }
    }

    pub fn unit(&self, items: Vec<Item>) -> CompilationUnit {
        CompilationUnit { items }
    }
}
