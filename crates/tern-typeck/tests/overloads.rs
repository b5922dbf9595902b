//! Integration tests for call resolution: candidate levels, most-specific
//! selection, ambiguity, closest-candidate reporting, generic inference
//! against expected types and the complexity budget.

use tern_common::Span;
use tern_typeck::ast::{Item, Stmt, TreeBuilder};
use tern_typeck::builtins::register_builtins;
use tern_typeck::config::InferConfig;
use tern_typeck::error::{Diagnostic, DiagnosticKind};
use tern_typeck::infer::Callee;
use tern_typeck::symbols::{ClassDecl, ClassKind, SigDecl, SignatureId, SymbolTable, SymbolTableBuilder, TypeParam};
use tern_typeck::ty::Ty;
use tern_typeck::TypeckResult;

// ── Helpers ────────────────────────────────────────────────────────────

fn symbols_with(extra: impl FnOnce(&mut SymbolTableBuilder)) -> SymbolTable {
    let mut b = SymbolTable::builder();
    register_builtins(&mut b);
    extra(&mut b);
    b.finish().expect("test declarations must validate")
}

/// `interface A`, `interface B`, `class C : A, B`.
fn diamond(b: &mut SymbolTableBuilder) {
    b.class(ClassDecl::new("A", ClassKind::Interface))
        .class(ClassDecl::new("B", ClassKind::Interface))
        .class(
            ClassDecl::new("C", ClassKind::Class)
                .extends(Ty::simple("A"))
                .extends(Ty::simple("B")),
        );
}

fn tail(t: &TreeBuilder, prefix: &str, name: &str) -> Span {
    let whole = t.find(&format!("{}{}", prefix, name));
    Span::new(whole.start + prefix.len() as u32, whole.end)
}

fn body_span(t: &TreeBuilder) -> Span {
    Span::new(t.find("{\n").start, t.source().len() as u32)
}

fn whole(t: &TreeBuilder) -> Span {
    Span::new(0, t.source().len() as u32)
}

fn only_error(result: &TypeckResult) -> &Diagnostic {
    let errors: Vec<&Diagnostic> = result.errors().collect();
    assert_eq!(errors.len(), 1, "expected exactly one error, got: {:?}", errors);
    errors[0]
}

fn assert_clean(result: &TypeckResult) {
    assert!(result.diagnostics.is_empty(), "expected no diagnostics, got: {:?}", result.diagnostics);
}

// ── Most specific candidate ────────────────────────────────────────────

#[test]
fn unrelated_parameter_types_are_ambiguous() {
    let symbols = symbols_with(|b| {
        diamond(b);
        b.function(SigDecl::new("f").param("x", Ty::simple("A")));
        b.function(SigDecl::new("f").param("x", Ty::simple("B")));
    });
    let src = "fun probe(c: C) {
    f(c)
}";
    let mut t = TreeBuilder::new(src);
    let c_ref = t.name(tail(&t, "f(", "c"));
    let call = t.call(t.find("f(c)"), tail(&t, "    ", "f"), vec![c_ref]);
    let call_id = call.id;
    let body = t.block(body_span(&t), vec![Stmt::Expr(call)]);
    let c_param = t.param(tail(&t, "probe(", "c"), Some(Ty::simple("C")));
    let f = t.function(whole(&t), t.find("probe"), vec![c_param], Ty::unit(), body);
    let unit = t.unit(vec![Item::Function(f)]);

    let result = tern_typeck::check(&unit, &symbols);
    assert_eq!(result.diagnostics.len(), 1, "{:?}", result.diagnostics);
    let err = &result.diagnostics[0];
    assert_eq!(err.kind, DiagnosticKind::OverloadResolutionAmbiguity);
    assert_eq!(err.range, tail(&t, "    ", "f"));
    assert_eq!(
        err.related_signatures,
        vec!["fun f(x: A): Unit".to_string(), "fun f(x: B): Unit".to_string()]
    );
    assert_eq!(result.type_of(call_id), Some(&Ty::Error));
    assert!(result.callee_of(call_id).is_none());
}

#[test]
fn ambiguity_lists_only_undominated_candidates() {
    let symbols = symbols_with(|b| {
        diamond(b);
        b.function(SigDecl::new("f").param("x", Ty::any()));
        b.function(SigDecl::new("f").param("x", Ty::simple("A")));
        b.function(SigDecl::new("f").param("x", Ty::simple("B")));
    });
    let src = "fun main(c: C) {
    f(c)
}";
    let mut t = TreeBuilder::new(src);
    let c_ref = t.name(tail(&t, "f(", "c"));
    let call = t.call(t.find("f(c)"), tail(&t, "    ", "f"), vec![c_ref]);
    let body = t.block(body_span(&t), vec![Stmt::Expr(call)]);
    let c_param = t.param(tail(&t, "main(", "c"), Some(Ty::simple("C")));
    let f = t.function(whole(&t), t.find("main"), vec![c_param], Ty::unit(), body);
    let unit = t.unit(vec![Item::Function(f)]);

    let result = tern_typeck::check(&unit, &symbols);
    let err = only_error(&result);
    assert_eq!(err.kind, DiagnosticKind::OverloadResolutionAmbiguity);
    // `f(x: Any)` loses to both and is not part of the tie.
    assert_eq!(
        err.related_signatures,
        vec!["fun f(x: A): Unit".to_string(), "fun f(x: B): Unit".to_string()]
    );
}

#[test]
fn more_specific_parameter_wins() {
    let mut specific = SignatureId(0);
    let symbols = symbols_with(|b| {
        diamond(b);
        b.function(SigDecl::new("f").param("x", Ty::simple("A")).returns(Ty::int()));
        specific = b.function(SigDecl::new("f").param("x", Ty::simple("C")).returns(Ty::string()));
    });
    let src = "fun probe(c: C) {
    f(c)
}";
    let mut t = TreeBuilder::new(src);
    let c_ref = t.name(tail(&t, "f(", "c"));
    let call = t.call(t.find("f(c)"), tail(&t, "    ", "f"), vec![c_ref]);
    let call_id = call.id;
    let body = t.block(body_span(&t), vec![Stmt::Expr(call)]);
    let c_param = t.param(tail(&t, "probe(", "c"), Some(Ty::simple("C")));
    let f = t.function(whole(&t), t.find("probe"), vec![c_param], Ty::unit(), body);
    let unit = t.unit(vec![Item::Function(f)]);

    let result = tern_typeck::check(&unit, &symbols);
    assert_clean(&result);
    assert_eq!(result.type_of(call_id), Some(&Ty::string()));
    assert_eq!(result.callee_of(call_id).map(|c| c.callee.clone()), Some(Callee::Signature(specific)));
}

#[test]
fn non_generic_beats_equally_specific_generic() {
    let mut plain = SignatureId(0);
    let symbols = symbols_with(|b| {
        b.function(
            SigDecl::new("show")
                .type_param(TypeParam::new("T"))
                .param("x", Ty::param("T"))
                .returns(Ty::string()),
        );
        plain = b.function(SigDecl::new("show").param("x", Ty::int()).returns(Ty::string()));
    });
    let src = "fun probe() {
    show(1)
}";
    let mut t = TreeBuilder::new(src);
    let one = t.int(t.find("1"));
    let call = t.call(t.find("show(1)"), t.find("show"), vec![one]);
    let call_id = call.id;
    let body = t.block(body_span(&t), vec![Stmt::Expr(call)]);
    let f = t.function(whole(&t), t.find("probe"), vec![], Ty::unit(), body);
    let unit = t.unit(vec![Item::Function(f)]);

    let result = tern_typeck::check(&unit, &symbols);
    assert_clean(&result);
    let call = result.callee_of(call_id).expect("call resolves");
    assert_eq!(call.callee, Callee::Signature(plain));
    assert!(call.type_arguments.is_empty());
}

// ── Candidate levels ───────────────────────────────────────────────────

#[test]
fn local_function_value_shadows_declared_function() {
    let symbols = symbols_with(|b| {
        b.function(SigDecl::new("g").param("x", Ty::int()).returns(Ty::int()));
    });
    let src = "fun probe(g: (Int) -> String) {
    val s = g(1)
    println(s)
}";
    let mut t = TreeBuilder::new(src);
    let one = t.int(t.find("1"));
    let call = t.call(t.find("g(1)"), tail(&t, "= ", "g"), vec![one]);
    let call_id = call.id;
    let val_s = t.let_stmt(t.find("val s = g(1)"), tail(&t, "val ", "s"), None, call);
    let s_ref = t.name(tail(&t, "println(", "s"));
    let print = t.call(t.find("println(s)"), t.find("println"), vec![s_ref]);
    let body = t.block(body_span(&t), vec![Stmt::Let(val_s), Stmt::Expr(print)]);
    let g_param = t.param(tail(&t, "probe(", "g"), Some(Ty::fun(vec![Ty::int()], Ty::string())));
    let f = t.function(whole(&t), t.find("probe"), vec![g_param], Ty::unit(), body);
    let unit = t.unit(vec![Item::Function(f)]);

    let result = tern_typeck::check(&unit, &symbols);
    assert_clean(&result);
    assert_eq!(result.type_of(call_id), Some(&Ty::string()));
    let call = result.callee_of(call_id).expect("call resolves");
    assert_eq!(call.callee, Callee::Local("g".to_string()));
    assert_eq!(call.signature, "g: (Int) -> String");
}

#[test]
fn failing_local_falls_back_to_declared_functions() {
    let mut declared = SignatureId(0);
    let symbols = symbols_with(|b| {
        declared = b.function(SigDecl::new("g").param("x", Ty::int()).returns(Ty::int()));
    });
    let src = "fun probe(g: (String) -> String) {
    g(1)
}";
    let mut t = TreeBuilder::new(src);
    let one = t.int(t.find("1"));
    let call = t.call(t.find("g(1)"), tail(&t, "    ", "g"), vec![one]);
    let call_id = call.id;
    let body = t.block(body_span(&t), vec![Stmt::Expr(call)]);
    let g_param = t.param(tail(&t, "probe(", "g"), Some(Ty::fun(vec![Ty::string()], Ty::string())));
    let f = t.function(whole(&t), t.find("probe"), vec![g_param], Ty::unit(), body);
    let unit = t.unit(vec![Item::Function(f)]);

    let result = tern_typeck::check(&unit, &symbols);
    assert_clean(&result);
    assert_eq!(result.type_of(call_id), Some(&Ty::int()));
    assert_eq!(result.callee_of(call_id).map(|c| c.callee.clone()), Some(Callee::Signature(declared)));
}

#[test]
fn unknown_callee_is_unresolved_and_arguments_are_still_typed() {
    let symbols = symbols_with(|_| {});
    let src = "fun probe() {
    h(1)
}";
    let mut t = TreeBuilder::new(src);
    let one = t.int(t.find("1"));
    let one_id = one.id;
    let call = t.call(t.find("h(1)"), t.find("h"), vec![one]);
    let body = t.block(body_span(&t), vec![Stmt::Expr(call)]);
    let f = t.function(whole(&t), t.find("probe"), vec![], Ty::unit(), body);
    let unit = t.unit(vec![Item::Function(f)]);

    let result = tern_typeck::check(&unit, &symbols);
    let err = only_error(&result);
    assert_eq!(err.kind, DiagnosticKind::UnresolvedReference);
    assert_eq!(err.range, t.find("h"));
    assert_eq!(result.type_of(one_id), Some(&Ty::int()));
}

// ── Failed candidates ──────────────────────────────────────────────────

fn take_overloads(b: &mut SymbolTableBuilder) {
    b.function(SigDecl::new("take").param("x", Ty::int()));
    b.function(SigDecl::new("take").param("x", Ty::int()).param("y", Ty::int()));
}

#[test]
fn closest_candidate_mismatch_points_at_the_argument() {
    let symbols = symbols_with(take_overloads);
    let src = "fun probe() {
    take(\"s\")
}";
    let mut t = TreeBuilder::new(src);
    let s = t.string(t.find("\"s\""));
    let call = t.call(t.find("take(\"s\")"), t.find("take"), vec![s]);
    let body = t.block(body_span(&t), vec![Stmt::Expr(call)]);
    let f = t.function(whole(&t), t.find("probe"), vec![], Ty::unit(), body);
    let unit = t.unit(vec![Item::Function(f)]);

    let result = tern_typeck::check(&unit, &symbols);
    let err = only_error(&result);
    assert_eq!(err.kind, DiagnosticKind::TypeMismatch);
    assert_eq!(err.range, t.find("\"s\""));
    assert_eq!(err.message, "type mismatch: inferred type is String but Int was expected");
    assert_eq!(err.related_signatures, vec!["fun take(x: Int): Unit".to_string()]);
}

#[test]
fn wrong_argument_count_reports_at_the_call() {
    let symbols = symbols_with(take_overloads);
    let src = "fun probe() {
    take()
}";
    let mut t = TreeBuilder::new(src);
    let call = t.call(t.find("take()"), t.find("take"), vec![]);
    let body = t.block(body_span(&t), vec![Stmt::Expr(call)]);
    let f = t.function(whole(&t), t.find("probe"), vec![], Ty::unit(), body);
    let unit = t.unit(vec![Item::Function(f)]);

    let result = tern_typeck::check(&unit, &symbols);
    let err = only_error(&result);
    assert_eq!(err.kind, DiagnosticKind::TypeMismatch);
    assert_eq!(err.range, t.find("take()"));
    assert_eq!(err.message, "type mismatch: expected 1 argument(s), found 0");
}

#[test]
fn wrong_type_argument_count_reports_at_the_call() {
    let symbols = symbols_with(|_| {});
    let src = "fun probe() {
    identity<Int, Int>(1)
}";
    let mut t = TreeBuilder::new(src);
    let one = t.int(t.find("1"));
    let call = t.generic_call(
        t.find("identity<Int, Int>(1)"),
        t.find("identity"),
        vec![(Ty::int(), t.find("Int")), (Ty::int(), t.nth("Int", 1))],
        vec![one],
    );
    let body = t.block(body_span(&t), vec![Stmt::Expr(call)]);
    let f = t.function(whole(&t), t.find("probe"), vec![], Ty::unit(), body);
    let unit = t.unit(vec![Item::Function(f)]);

    let result = tern_typeck::check(&unit, &symbols);
    let err = only_error(&result);
    assert_eq!(err.range, t.find("identity<Int, Int>(1)"));
    assert_eq!(err.message, "type mismatch: expected 1 type argument(s), found 2");
}

#[test]
fn violated_declared_bound_points_at_the_callee() {
    let symbols = symbols_with(|b| {
        b.function(
            SigDecl::new("half")
                .type_param(TypeParam::new("T").bounded(Ty::number()))
                .param("x", Ty::param("T"))
                .returns(Ty::param("T")),
        );
    });
    let src = "fun probe() {
    half(\"s\")
}";
    let mut t = TreeBuilder::new(src);
    let s = t.string(t.find("\"s\""));
    let call = t.call(t.find("half(\"s\")"), t.find("half"), vec![s]);
    let body = t.block(body_span(&t), vec![Stmt::Expr(call)]);
    let f = t.function(whole(&t), t.find("probe"), vec![], Ty::unit(), body);
    let unit = t.unit(vec![Item::Function(f)]);

    let result = tern_typeck::check(&unit, &symbols);
    let err = only_error(&result);
    assert_eq!(err.kind, DiagnosticKind::TypeMismatch);
    assert_eq!(err.range, t.find("half"));
    assert_eq!(err.related_types, vec![Ty::number(), Ty::string()]);
}

// ── Generic inference ──────────────────────────────────────────────────

#[test]
fn bounded_generic_infers_from_arguments() {
    let symbols = symbols_with(|_| {});
    let src = "fun probe() {
    maxOf(1, 2)
}";
    let mut t = TreeBuilder::new(src);
    let one = t.int(t.find("1"));
    let two = t.int(t.find("2"));
    let call = t.call(t.find("maxOf(1, 2)"), t.find("maxOf"), vec![one, two]);
    let call_id = call.id;
    let body = t.block(body_span(&t), vec![Stmt::Expr(call)]);
    let f = t.function(whole(&t), t.find("probe"), vec![], Ty::unit(), body);
    let unit = t.unit(vec![Item::Function(f)]);

    let result = tern_typeck::check(&unit, &symbols);
    assert_clean(&result);
    assert_eq!(result.type_of(call_id), Some(&Ty::int()));
}

#[test]
fn expected_type_does_not_override_argument_evidence() {
    let symbols = symbols_with(|_| {});
    let src = "val xs: List<Number> = listOf(1)";
    let mut t = TreeBuilder::new(src);
    let one = t.int(t.find("1"));
    let call = t.call(t.find("listOf(1)"), t.find("listOf"), vec![one]);
    let call_id = call.id;
    let prop = t.let_stmt(whole(&t), t.find("xs"), Some(Ty::list(Ty::number())), call);
    let unit = t.unit(vec![Item::Property(prop)]);

    let result = tern_typeck::check(&unit, &symbols);
    assert_clean(&result);
    assert_eq!(result.type_of(call_id), Some(&Ty::list(Ty::int())));
}

#[test]
fn output_only_variable_comes_from_the_expected_type() {
    let symbols = symbols_with(|_| {});
    let src = "val xs: List<String> = emptyList()
val ys = emptyList()";
    let mut t = TreeBuilder::new(src);
    let xs_call = t.call(t.find("emptyList()"), t.find("emptyList"), vec![]);
    let xs_id = xs_call.id;
    let xs = t.let_stmt(t.find("val xs: List<String> = emptyList()"), t.find("xs"), Some(Ty::list(Ty::string())), xs_call);
    let ys_call = t.call(t.nth("emptyList()", 1), t.nth("emptyList", 1), vec![]);
    let ys_id = ys_call.id;
    let ys = t.let_stmt(t.find("val ys = emptyList()"), t.find("ys"), None, ys_call);
    let unit = t.unit(vec![Item::Property(xs), Item::Property(ys)]);

    let result = tern_typeck::check(&unit, &symbols);
    assert_clean(&result);
    assert_eq!(result.type_of(xs_id), Some(&Ty::list(Ty::string())));
    // Nothing flows in, so the element type defaults to the bottom type.
    assert_eq!(result.type_of(ys_id), Some(&Ty::list(Ty::Nothing)));
}

#[test]
fn call_argument_is_inferred_against_the_parameter_type() {
    let symbols = symbols_with(|b| {
        b.function(SigDecl::new("fill").param("xs", Ty::named("MutableList", vec![Ty::int()])));
    });
    let src = "fun main() {
    fill(mutableListOf())
}";
    let mut t = TreeBuilder::new(src);
    let inner = t.call(t.find("mutableListOf()"), t.find("mutableListOf"), vec![]);
    let inner_id = inner.id;
    let outer = t.call(t.find("fill(mutableListOf())"), tail(&t, "    ", "fill"), vec![inner]);
    let outer_id = outer.id;
    let body = t.block(body_span(&t), vec![Stmt::Expr(outer)]);
    let f = t.function(whole(&t), t.find("main"), vec![], Ty::unit(), body);
    let unit = t.unit(vec![Item::Function(f)]);

    let result = tern_typeck::check(&unit, &symbols);
    assert_clean(&result);
    assert_eq!(result.type_of(inner_id), Some(&Ty::named("MutableList", vec![Ty::int()])));
    assert_eq!(
        result.callee_of(inner_id).map(|c| c.type_arguments.clone()),
        Some(vec![Ty::int()])
    );
    assert_eq!(result.type_of(outer_id), Some(&Ty::unit()));
}

#[test]
fn failed_nodes_do_not_cascade() {
    let symbols = symbols_with(|_| {});
    let src = "fun probe() {
    val x = h(1)
    val n: Int = x
    println(maxOf(n, x))
}";
    let mut t = TreeBuilder::new(src);
    let one = t.int(t.find("1"));
    let h = t.call(t.find("h(1)"), t.find("h"), vec![one]);
    let val_x = t.let_stmt(t.find("val x = h(1)"), tail(&t, "val ", "x"), None, h);
    let x_ref = t.name(tail(&t, "Int = ", "x"));
    let val_n = t.let_stmt(t.find("val n: Int = x"), tail(&t, "val ", "n"), Some(Ty::int()), x_ref);
    let n_ref = t.name(tail(&t, "maxOf(", "n"));
    let x_ref2 = t.name(tail(&t, "n, ", "x"));
    let max = t.call(t.find("maxOf(n, x)"), t.find("maxOf"), vec![n_ref, x_ref2]);
    let max_id = max.id;
    let print = t.call(t.find("println(maxOf(n, x))"), t.find("println"), vec![max]);
    let body = t.block(body_span(&t), vec![Stmt::Let(val_x), Stmt::Let(val_n), Stmt::Expr(print)]);
    let f = t.function(whole(&t), t.find("probe"), vec![], Ty::unit(), body);
    let unit = t.unit(vec![Item::Function(f)]);

    let result = tern_typeck::check(&unit, &symbols);
    assert_eq!(result.diagnostics.len(), 1, "{:?}", result.diagnostics);
    assert_eq!(result.diagnostics[0].kind, DiagnosticKind::UnresolvedReference);
    assert_eq!(result.type_of(max_id), Some(&Ty::Error));
}

// ── Complexity budget ──────────────────────────────────────────────────

/// `fun op(f: () -> Int): Int` and `fun op(f: () -> String): String`.
fn op_overloads(b: &mut SymbolTableBuilder) {
    b.function(SigDecl::new("op").param("f", Ty::fun(vec![], Ty::int())).returns(Ty::int()));
    b.function(SigDecl::new("op").param("f", Ty::fun(vec![], Ty::string())).returns(Ty::string()));
}

const OP_NEST: &str = "fun probe() {
    op { op { op { 1 } } }
}";

/// Builds `op { op { op { 1 } } }` and returns the unit with the outer call's id.
fn op_nest(t: &mut TreeBuilder) -> (tern_typeck::ast::CompilationUnit, tern_typeck::ast::ExprId) {
    let one = t.int(t.find("1"));
    let lit3 = t.lambda(t.find("{ 1 }"), vec![], t.block_of(one));
    let call3 = t.call(t.find("op { 1 }"), t.nth("op", 2), vec![lit3]);
    let lit2 = t.lambda(t.find("{ op { 1 } }"), vec![], t.block_of(call3));
    let call2 = t.call(t.find("op { op { 1 } }"), t.nth("op", 1), vec![lit2]);
    let lit1 = t.lambda(t.find("{ op { op { 1 } } }"), vec![], t.block_of(call2));
    let call1 = t.call(t.find("op { op { op { 1 } } }"), t.nth("op", 0), vec![lit1]);
    let id = call1.id;
    let body = t.block(body_span(t), vec![Stmt::Expr(call1)]);
    let f = t.function(whole(t), t.find("probe"), vec![], Ty::unit(), body);
    (t.unit(vec![Item::Function(f)]), id)
}

#[test]
fn nested_overloaded_literals_resolve_within_budget() {
    let symbols = symbols_with(op_overloads);
    let mut t = TreeBuilder::new(OP_NEST);
    let (unit, outer) = op_nest(&mut t);

    let result = tern_typeck::check(&unit, &symbols);
    assert_clean(&result);
    assert_eq!(result.type_of(outer), Some(&Ty::int()));
}

#[test]
fn exhausted_budget_reports_too_complex_once() {
    let symbols = symbols_with(op_overloads);
    let mut t = TreeBuilder::new(OP_NEST);
    let (unit, outer) = op_nest(&mut t);
    let config = InferConfig { max_candidate_attempts: 5, ..InferConfig::default() };

    let result = tern_typeck::check_with_config(&unit, &symbols, &config);
    let err = only_error(&result);
    assert_eq!(err.kind, DiagnosticKind::TooComplex);
    assert_eq!(err.range, t.find("op { op { op { 1 } } }"));
    assert_eq!(result.type_of(outer), Some(&Ty::Error));
    assert!(result.calls.is_empty(), "{:?}", result.calls);
}

#[test]
fn nesting_past_the_depth_limit_is_too_complex() {
    let symbols = symbols_with(op_overloads);
    let mut t = TreeBuilder::new(OP_NEST);
    let (unit, _) = op_nest(&mut t);
    let config = InferConfig { max_nesting_depth: 3, ..InferConfig::default() };

    let result = tern_typeck::check_with_config(&unit, &symbols, &config);
    let kinds = result.kinds();
    assert_eq!(kinds, vec![DiagnosticKind::TooComplex]);
}
