//! Property tests: checking the same unit twice gives identical results,
//! a nest of overloaded literals either resolves or is reported
//! `TOO_COMPLEX` exactly once, diagnostics come out in source order, and
//! the chosen overload does not depend on declaration order.

use proptest::prelude::*;
use tern_common::Span;
use tern_typeck::ast::{CompilationUnit, ExprId, Item, Stmt, TreeBuilder};
use tern_typeck::builtins::register_builtins;
use tern_typeck::config::InferConfig;
use tern_typeck::error::DiagnosticKind;
use tern_typeck::infer::Callee;
use tern_typeck::symbols::{SigDecl, SymbolTable};
use tern_typeck::ty::Ty;

// ── Helpers ────────────────────────────────────────────────────────────

fn symbols() -> SymbolTable {
    let mut b = SymbolTable::builder();
    register_builtins(&mut b);
    b.function(SigDecl::new("op").param("f", Ty::fun(vec![], Ty::int())).returns(Ty::int()));
    b.function(SigDecl::new("op").param("f", Ty::fun(vec![], Ty::string())).returns(Ty::string()));
    b.function(SigDecl::new("take").param("x", Ty::int()));
    b.finish().expect("test declarations must validate")
}

/// `op { op { ... op { 1 } ... } }` with `depth` calls.
fn nest_source(depth: usize) -> String {
    format!("fun probe() {{\n    {}1{}\n}}", "op { ".repeat(depth), " }".repeat(depth))
}

fn build_nest(src: &str, depth: usize) -> (CompilationUnit, ExprId) {
    let mut t = TreeBuilder::new(src);
    let base = t.find("op").start;
    let one_at = base + 5 * depth as u32;
    let mut expr = t.int(Span::new(one_at, one_at + 1));
    for k in (0..depth).rev() {
        let start = base + 5 * k as u32;
        let end = one_at + 1 + 2 * (depth - k) as u32;
        let lit = t.lambda(Span::new(start + 3, end), vec![], t.block_of(expr));
        expr = t.call(Span::new(start, end), Span::new(start, start + 2), vec![lit]);
    }
    let outer = expr.id;
    let body = t.block(Span::new(t.find("{\n").start, src.len() as u32), vec![Stmt::Expr(expr)]);
    let f = t.function(Span::new(0, src.len() as u32), t.find("probe"), vec![], Ty::unit(), body);
    (t.unit(vec![Item::Function(f)]), outer)
}

const HEADER: &str = "fun probe() {\n";
const LINE_LEN: u32 = 12;

/// One `take(1)` or `nope(1)` line per flag.
fn calls_source(known: &[bool]) -> String {
    let mut src = HEADER.to_string();
    for &k in known {
        src.push_str(if k { "    take(1)\n" } else { "    nope(1)\n" });
    }
    src.push('}');
    src
}

fn build_calls(src: &str, known: &[bool]) -> CompilationUnit {
    let mut t = TreeBuilder::new(src);
    let mut stmts = Vec::new();
    for i in 0..known.len() {
        let callee = HEADER.len() as u32 + LINE_LEN * i as u32 + 4;
        let arg = t.int(Span::new(callee + 5, callee + 6));
        let call = t.call(Span::new(callee, callee + 7), Span::new(callee, callee + 4), vec![arg]);
        stmts.push(Stmt::Expr(call));
    }
    let body = t.block(Span::new(t.find("{\n").start, src.len() as u32), stmts);
    let f = t.function(Span::new(0, src.len() as u32), t.find("probe"), vec![], Ty::unit(), body);
    t.unit(vec![Item::Function(f)])
}

const PICK: &str = "fun main() {\n    pick(1)\n}";

/// `pick` overloads over `Any`, `Number`, `Int` and `String`, declared in
/// the given order.
fn pick_symbols(order: &[Ty]) -> SymbolTable {
    let mut b = SymbolTable::builder();
    register_builtins(&mut b);
    for ty in order {
        b.function(SigDecl::new("pick").param("x", ty.clone()));
    }
    b.finish().expect("test declarations must validate")
}

fn build_pick() -> (CompilationUnit, ExprId) {
    let mut t = TreeBuilder::new(PICK);
    let one = t.int(t.find("1"));
    let call = t.call(t.find("pick(1)"), t.find("pick"), vec![one]);
    let call_id = call.id;
    let body = t.block(Span::new(t.find("{\n").start, PICK.len() as u32), vec![Stmt::Expr(call)]);
    let f = t.function(Span::new(0, PICK.len() as u32), t.find("main"), vec![], Ty::unit(), body);
    (t.unit(vec![Item::Function(f)]), call_id)
}

// ── Properties ─────────────────────────────────────────────────────────

proptest! {
    #[test]
    fn literal_nests_are_deterministic_under_any_budget(depth in 1usize..6, limit in 1usize..40) {
        let src = nest_source(depth);
        let (unit, outer) = build_nest(&src, depth);
        let symbols = symbols();
        let config = InferConfig { max_candidate_attempts: limit, ..InferConfig::default() };

        let first = tern_typeck::check_with_config(&unit, &symbols, &config);
        let second = tern_typeck::check_with_config(&unit, &symbols, &config);
        prop_assert_eq!(&first.diagnostics, &second.diagnostics);
        prop_assert_eq!(&first.types, &second.types);
        prop_assert_eq!(&first.calls, &second.calls);

        match first.kinds().as_slice() {
            [] => {
                prop_assert_eq!(first.type_of(outer), Some(&Ty::int()));
            }
            [DiagnosticKind::TooComplex] => {
                prop_assert_eq!(first.type_of(outer), Some(&Ty::Error));
                prop_assert_eq!(first.diagnostics[0].range.start, src.find("op").unwrap_or(0) as u32);
            }
            other => {
                prop_assert!(false, "unexpected diagnostics: {:?}", other);
            }
        }
    }

    #[test]
    fn overload_choice_ignores_declaration_order(
        order in Just(vec![Ty::any(), Ty::number(), Ty::int(), Ty::string()]).prop_shuffle()
    ) {
        let symbols = pick_symbols(&order);
        let (unit, call_id) = build_pick();
        let result = tern_typeck::check(&unit, &symbols);

        prop_assert!(result.diagnostics.is_empty(), "{:?}", result.diagnostics);
        let call = result.callee_of(call_id);
        prop_assert!(call.is_some());
        if let Some(call) = call {
            prop_assert_eq!(call.signature.as_str(), "fun pick(x: Int): Unit");
            match &call.callee {
                Callee::Signature(id) => {
                    prop_assert_eq!(symbols.signature(*id).to_string(), "fun pick(x: Int): Unit");
                }
                other => prop_assert!(false, "unexpected callee: {:?}", other),
            }
        }
    }

    #[test]
    fn unresolved_calls_are_reported_in_source_order(known in proptest::collection::vec(any::<bool>(), 0..12)) {
        let src = calls_source(&known);
        let unit = build_calls(&src, &known);
        let result = tern_typeck::check(&unit, &symbols());

        let missing = known.iter().filter(|&&k| !k).count();
        prop_assert_eq!(result.diagnostics.len(), missing);
        let starts: Vec<u32> = result.diagnostics.iter().map(|d| d.range.start).collect();
        let mut sorted = starts.clone();
        sorted.sort_unstable();
        prop_assert_eq!(starts, sorted);
        for d in &result.diagnostics {
            prop_assert_eq!(d.kind, DiagnosticKind::UnresolvedReference);
            prop_assert_eq!(&src[d.range.start as usize..d.range.end as usize], "nope");
        }
    }
}
