//! Built-in declarations.
//!
//! Registers the classes every unit can rely on (`Any`, `Unit`, the numeric
//! tower, `String`, `Comparable`, the read-only and mutable list interfaces)
//! and a handful of top-level functions used by the standard library surface
//! (`println`, `listOf`, `emptyList`, `maxOf`, `run`, `error`, ...).

use crate::symbols::{ClassDecl, ClassKind, SigDecl, SymbolTableBuilder, TypeParam};
use crate::ty::Ty;

/// Register the prelude into `builder`.
///
/// After this call the builder contains:
/// - `Any` (root of the non-nullable hierarchy) and `Unit`
/// - `Comparable<in T>`, `CharSequence`, `String`, `Boolean`
/// - `Number`, `Int`, `Long`
/// - `Collection<out E>`, `List<out E>`, `MutableList<E>`
/// - functions: `println`, `toString`, `listOf`, `emptyList`,
///   `mutableListOf`, `maxOf`, `identity`, `run`, `error`, `TODO`, `require`
pub fn register_builtins(builder: &mut SymbolTableBuilder) {
    // ── Classes ─────────────────────────────────────────────────────

    builder
        .class(ClassDecl::new("Any", ClassKind::Class))
        .class(ClassDecl::new("Unit", ClassKind::Object))
        .class(ClassDecl::new("Comparable", ClassKind::Interface).type_param(TypeParam::contra("T")))
        .class(ClassDecl::new("CharSequence", ClassKind::Interface))
        .class(
            ClassDecl::new("String", ClassKind::Class)
                .extends(Ty::simple("CharSequence"))
                .extends(Ty::named("Comparable", vec![Ty::string()])),
        )
        .class(
            ClassDecl::new("Boolean", ClassKind::Class)
                .extends(Ty::named("Comparable", vec![Ty::boolean()])),
        )
        .class(ClassDecl::new("Number", ClassKind::Class))
        .class(
            ClassDecl::new("Int", ClassKind::Class)
                .extends(Ty::number())
                .extends(Ty::named("Comparable", vec![Ty::int()])),
        )
        .class(
            ClassDecl::new("Long", ClassKind::Class)
                .extends(Ty::number())
                .extends(Ty::named("Comparable", vec![Ty::long()])),
        )
        .class(ClassDecl::new("Collection", ClassKind::Interface).type_param(TypeParam::out("E")))
        .class(
            ClassDecl::new("List", ClassKind::Interface)
                .type_param(TypeParam::out("E"))
                .extends(Ty::named("Collection", vec![Ty::param("E")])),
        )
        .class(
            ClassDecl::new("MutableList", ClassKind::Interface)
                .type_param(TypeParam::new("E"))
                .extends(Ty::list(Ty::param("E"))),
        );

    // ── Functions ───────────────────────────────────────────────────

    builder.function(SigDecl::new("println").param("message", Ty::top()));
    builder.function(
        SigDecl::new("toString").param("value", Ty::top()).returns(Ty::string()),
    );
    builder.function(
        SigDecl::new("listOf")
            .type_param(TypeParam::new("T"))
            .param("element", Ty::param("T"))
            .returns(Ty::list(Ty::param("T"))),
    );
    builder.function(
        SigDecl::new("listOf")
            .type_param(TypeParam::new("T"))
            .param("first", Ty::param("T"))
            .param("second", Ty::param("T"))
            .returns(Ty::list(Ty::param("T"))),
    );
    builder.function(
        SigDecl::new("emptyList")
            .type_param(TypeParam::new("T"))
            .returns(Ty::list(Ty::param("T"))),
    );
    builder.function(
        SigDecl::new("mutableListOf")
            .type_param(TypeParam::new("T"))
            .returns(Ty::named("MutableList", vec![Ty::param("T")])),
    );
    builder.function(
        SigDecl::new("maxOf")
            .type_param(
                TypeParam::new("T").bounded(Ty::named("Comparable", vec![Ty::param("T")])),
            )
            .param("a", Ty::param("T"))
            .param("b", Ty::param("T"))
            .returns(Ty::param("T")),
    );
    builder.function(
        SigDecl::new("identity")
            .type_param(TypeParam::new("T"))
            .param("value", Ty::param("T"))
            .returns(Ty::param("T")),
    );
    builder.function(
        SigDecl::new("run")
            .type_param(TypeParam::new("R"))
            .param("block", Ty::fun(vec![], Ty::param("R")))
            .returns(Ty::param("R")),
    );
    builder.function(
        SigDecl::new("repeat")
            .param("times", Ty::int())
            .param("action", Ty::fun(vec![Ty::int()], Ty::unit())),
    );
    builder.function(SigDecl::new("error").param("message", Ty::any()).returns(Ty::Nothing));
    builder.function(SigDecl::new("TODO").returns(Ty::Nothing));
    builder.function(SigDecl::new("require").param("value", Ty::boolean()));
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::symbols::SymbolTable;

    fn prelude() -> SymbolTable {
        let mut b = SymbolTable::builder();
        register_builtins(&mut b);
        b.finish().expect("prelude must validate")
    }

    #[test]
    fn prelude_validates() {
        let t = prelude();
        assert!(t.class("Any").is_some());
        assert!(t.class("MutableList").is_some());
        assert!(t.object("Unit").is_some());
    }

    #[test]
    fn list_of_has_two_overloads() {
        let t = prelude();
        let overloads = t.lookup("listOf");
        assert_eq!(overloads.len(), 2);
        assert_eq!(overloads[0].params.len(), 1);
        assert_eq!(overloads[1].params.len(), 2);
    }

    #[test]
    fn max_of_carries_bound() {
        let t = prelude();
        let max_of = t.lookup("maxOf")[0];
        assert_eq!(max_of.to_string(), "fun <T : Comparable<T>> maxOf(a: T, b: T): T");
    }

    #[test]
    fn diverging_functions_return_nothing() {
        let t = prelude();
        assert_eq!(t.lookup("error")[0].return_type, Ty::Nothing);
        assert_eq!(t.lookup("TODO")[0].return_type, Ty::Nothing);
    }
}
