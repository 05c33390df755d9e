//! Integration tests for type declarations: inheritance, constructors,
//! attributes, methods, `base`, and the `new`/`is`/`as` expressions.

use hulk_ast::{AstBuilder, BinaryOp, NodeId, Param, TypeDecl};
use hulk_typeck::error::TypeError;
use hulk_typeck::ty::TypeId;
use hulk_typeck::{check, Binding, TypeckResult};

fn messages(result: &TypeckResult) -> Vec<String> {
    result.errors.iter().map(|e| e.to_string()).collect()
}

fn assert_clean(result: &TypeckResult) {
    assert!(result.errors.is_empty(), "unexpected errors: {:?}", messages(result));
}

fn decl(name: &str) -> TypeDecl {
    TypeDecl {
        name: name.to_string(),
        params: None,
        parent: None,
        parent_args: None,
        attributes: Vec::new(),
        methods: Vec::new(),
    }
}

fn inherits(name: &str, parent: &str) -> TypeDecl {
    TypeDecl {
        parent: Some(parent.to_string()),
        ..decl(name)
    }
}

/// type Point(x: number, y: number) {
///     x = x; y = y;
///     getX() => self.x;
///     setX(v) => self.x := v;
/// }
fn point(b: &mut AstBuilder) -> NodeId {
    let x_init = b.var("x");
    let x_attr = b.attribute("x", None, x_init);
    let y_init = b.var("y");
    let y_attr = b.attribute("y", None, y_init);
    let this = b.self_ref();
    let get = b.attr_get(this, "x");
    let get_x = b.method("getX", Vec::new(), None, get);
    let this = b.self_ref();
    let v = b.var("v");
    let set = b.attr_set(this, "x", v);
    let set_x = b.method("setX", vec![Param::new("v")], None, set);
    b.type_decl(TypeDecl {
        params: Some(vec![Param::typed("x", "number"), Param::typed("y", "number")]),
        attributes: vec![x_attr, y_attr],
        methods: vec![get_x, set_x],
        ..decl("Point")
    })
}

/// let p = new Point(3, 4) in <body(p)>
fn with_point(b: &mut AstBuilder, body: impl FnOnce(&mut AstBuilder, NodeId) -> NodeId) -> NodeId {
    let three = b.number(3.0);
    let four = b.number(4.0);
    let new = b.new_instance("Point", vec![three, four]);
    let p_decl = b.var_decl("p", None, new);
    let p = b.var("p");
    let body = body(b, p);
    b.let_in(vec![p_decl], body)
}

// ── Inheritance ────────────────────────────────────────────────────────

#[test]
fn circular_inheritance_reported_once() {
    // type A inherits B {} type B inherits A {}
    let mut b = AstBuilder::new();
    let a = b.type_decl(inherits("A", "B"));
    let bt = b.type_decl(inherits("B", "A"));
    let ast = b.finish(vec![a, bt]);

    let result = check(&ast);
    assert_eq!(result.errors.len(), 1, "{:?}", messages(&result));
    assert!(matches!(&result.errors[0], TypeError::CircularInheritance { name, .. } if name == "A"));
    for ty in result.table.user_types() {
        assert!(result.table.is_ancestor(TypeId::OBJECT, ty));
    }
}

#[test]
fn builtin_parent_is_rejected() {
    // type A inherits number {}
    let mut b = AstBuilder::new();
    let a = b.type_decl(inherits("A", "number"));
    let ast = b.finish(vec![a]);

    let result = check(&ast);
    assert_eq!(
        messages(&result),
        vec!["type 'A' cannot inherit from built-in type 'number'"]
    );
    let ty = result.type_of(a);
    assert_eq!(result.table.parent(ty), Some(TypeId::OBJECT));
}

#[test]
fn self_referencing_constructor_is_circular() {
    // type A(x: A) {}
    let mut b = AstBuilder::new();
    let a = b.type_decl(TypeDecl {
        params: Some(vec![Param::typed("x", "A")]),
        ..decl("A")
    });
    let ast = b.finish(vec![a]);

    let result = check(&ast);
    assert_eq!(
        messages(&result),
        vec!["circular type reference involving type 'A'"]
    );
}

#[test]
fn parent_checked_on_demand_and_params_inherited() {
    // type Dog inherits Animal { speak() => "Woof"; }
    // type Animal(name: string) { name = name; speak() => "..."; }
    // let d = new Dog("rex") in d.speak()
    let mut b = AstBuilder::new();
    let woof = b.string("Woof");
    let dog_speak = b.method("speak", Vec::new(), None, woof);
    let dog = b.type_decl(TypeDecl {
        methods: vec![dog_speak],
        ..inherits("Dog", "Animal")
    });
    let name_init = b.var("name");
    let name_attr = b.attribute("name", None, name_init);
    let dots = b.string("...");
    let animal_speak = b.method("speak", Vec::new(), None, dots);
    let animal = b.type_decl(TypeDecl {
        params: Some(vec![Param::typed("name", "string")]),
        attributes: vec![name_attr],
        methods: vec![animal_speak],
        ..decl("Animal")
    });
    let rex = b.string("rex");
    let new = b.new_instance("Dog", vec![rex]);
    let d_decl = b.var_decl("d", None, new);
    let d = b.var("d");
    let call = b.method_call(d, "speak", Vec::new());
    let body = b.let_in(vec![d_decl], call);
    let ast = b.finish(vec![dog, animal, body]);

    let result = check(&ast);
    assert_clean(&result);
    let dog_ty = result.type_of(dog);
    let animal_ty = result.type_of(animal);
    assert_eq!(result.table.parent(dog_ty), Some(animal_ty));
    assert_eq!(result.table.get(dog_ty).param_types, vec![TypeId::STRING]);
    assert_eq!(result.bindings.get(&call), Some(&Binding::Method(dog_speak)));
    assert_eq!(result.result_type_name(), Some("string"));
}

#[test]
fn parent_arguments_are_checked() {
    // type Named(n: string) { name = n; }
    // type Person(age: number) inherits Named(age) {}
    let mut b = AstBuilder::new();
    let n = b.var("n");
    let name_attr = b.attribute("name", None, n);
    let named = b.type_decl(TypeDecl {
        params: Some(vec![Param::typed("n", "string")]),
        attributes: vec![name_attr],
        ..decl("Named")
    });
    let age = b.var("age");
    let person = b.type_decl(TypeDecl {
        params: Some(vec![Param::typed("age", "number")]),
        parent_args: Some(vec![age]),
        ..inherits("Person", "Named")
    });
    let ast = b.finish(vec![named, person]);

    let result = check(&ast);
    assert_eq!(
        messages(&result),
        vec!["type 'Named' receives 'string', not 'number' as argument 1"]
    );
}

#[test]
fn constructor_parameter_inferred_from_attribute() {
    // type Counter(start) { count = start + 0; }
    // new Counter(5)
    let mut b = AstBuilder::new();
    let start = b.var("start");
    let zero = b.number(0.0);
    let init = b.binary(BinaryOp::Add, start, zero);
    let count = b.attribute("count", None, init);
    let counter = b.type_decl(TypeDecl {
        params: Some(vec![Param::new("start")]),
        attributes: vec![count],
        ..decl("Counter")
    });
    let five = b.number(5.0);
    let new = b.new_instance("Counter", vec![five]);
    let ast = b.finish(vec![counter, new]);

    let result = check(&ast);
    assert_clean(&result);
    let ty = result.type_of(counter);
    assert_eq!(result.table.get(ty).param_types, vec![TypeId::NUMBER]);
    assert_eq!(result.type_name(count), "number");
    assert_eq!(result.result_type_name(), Some("Counter"));
}

// ── Attributes and methods ─────────────────────────────────────────────

#[test]
fn methods_see_attributes_through_self() {
    let mut b = AstBuilder::new();
    let point = point(&mut b);
    let body = with_point(&mut b, |b, p| b.method_call(p, "getX", Vec::new()));
    let ast = b.finish(vec![point, body]);

    let result = check(&ast);
    assert_clean(&result);
    assert_eq!(result.result_type_name(), Some("number"));
    assert_eq!(result.symbol_type("v"), Some("number"));
    for id in ast.ids() {
        assert!(result.type_of(id).is_concrete(), "node {} left untyped", id);
    }
}

#[test]
fn attributes_are_private() {
    let mut b = AstBuilder::new();
    let point = point(&mut b);
    let body = with_point(&mut b, |b, p| b.attr_get(p, "x"));
    let ast = b.finish(vec![point, body]);

    let result = check(&ast);
    assert_eq!(
        messages(&result),
        vec!["attribute 'x' is private and can only be accessed through 'self'"]
    );
}

#[test]
fn missing_method_is_reported() {
    let mut b = AstBuilder::new();
    let point = point(&mut b);
    let body = with_point(&mut b, |b, p| b.method_call(p, "norm", Vec::new()));
    let ast = b.finish(vec![point, body]);

    let result = check(&ast);
    assert_eq!(messages(&result), vec!["type 'Point' has no method 'norm'"]);
}

#[test]
fn method_arguments_are_checked() {
    let mut b = AstBuilder::new();
    let point = point(&mut b);
    let body = with_point(&mut b, |b, p| {
        let a = b.string("a");
        b.method_call(p, "setX", vec![a])
    });
    let ast = b.finish(vec![point, body]);

    let result = check(&ast);
    assert_eq!(
        messages(&result),
        vec!["method 'Point.setX' receives 'number', not 'string' as argument 1"]
    );
}

#[test]
fn receiver_inferred_from_member_name() {
    // type Shape { area() => 0; }
    // type Circle inherits Shape { area() => 3; }
    // function describe(s) => s.area();
    let mut b = AstBuilder::new();
    let zero = b.number(0.0);
    let shape_area = b.method("area", Vec::new(), None, zero);
    let shape = b.type_decl(TypeDecl {
        methods: vec![shape_area],
        ..decl("Shape")
    });
    let three = b.number(3.0);
    let circle_area = b.method("area", Vec::new(), None, three);
    let circle = b.type_decl(TypeDecl {
        methods: vec![circle_area],
        ..inherits("Circle", "Shape")
    });
    let s = b.var("s");
    let call = b.method_call(s, "area", Vec::new());
    let describe = b.function("describe", vec![Param::new("s")], None, call);
    let ast = b.finish(vec![shape, circle, describe]);

    let result = check(&ast);
    assert_clean(&result);
    assert_eq!(result.symbol_type("s"), Some("Shape"));
    assert_eq!(result.type_name(describe), "number");
}

#[test]
fn receiver_inferred_from_type_declared_later() {
    // function describe(s) => s.area();
    // type Shape { area() => 0; }
    // describe(new Shape())
    let mut b = AstBuilder::new();
    let s = b.var("s");
    let call = b.method_call(s, "area", Vec::new());
    let describe = b.function("describe", vec![Param::new("s")], None, call);
    let zero = b.number(0.0);
    let area = b.method("area", Vec::new(), None, zero);
    let shape = b.type_decl(TypeDecl {
        methods: vec![area],
        ..decl("Shape")
    });
    let new = b.new_instance("Shape", Vec::new());
    let use_site = b.call("describe", vec![new]);
    let ast = b.finish(vec![describe, shape, use_site]);

    let result = check(&ast);
    assert_clean(&result);
    assert_eq!(result.symbol_type("s"), Some("Shape"));
    assert_eq!(result.type_name(use_site), "number");
}

#[test]
fn conditional_joins_sibling_types() {
    // type Shape {} type Circle inherits Shape {} type Square inherits Shape {}
    // if (true) new Circle() else new Square()
    let mut b = AstBuilder::new();
    let shape = b.type_decl(decl("Shape"));
    let circle = b.type_decl(inherits("Circle", "Shape"));
    let square = b.type_decl(inherits("Square", "Shape"));
    let cond = b.boolean(true);
    let c = b.new_instance("Circle", Vec::new());
    let s = b.new_instance("Square", Vec::new());
    let branch = b.if_else(vec![(cond, c)], s);
    let ast = b.finish(vec![shape, circle, square, branch]);

    let result = check(&ast);
    assert_clean(&result);
    assert_eq!(result.type_name(branch), "Shape");
}

#[test]
fn overriding_method_keeps_the_signature() {
    // type A { f(x: number) => x; }
    // type B inherits A { f(x: string) => 1; }
    let mut b = AstBuilder::new();
    let x = b.var("x");
    let a_f = b.method("f", vec![Param::typed("x", "number")], None, x);
    let a = b.type_decl(TypeDecl {
        methods: vec![a_f],
        ..decl("A")
    });
    let one = b.number(1.0);
    let b_f = b.method("f", vec![Param::typed("x", "string")], None, one);
    let bt = b.type_decl(TypeDecl {
        methods: vec![b_f],
        ..inherits("B", "A")
    });
    let ast = b.finish(vec![a, bt]);

    let result = check(&ast);
    assert_eq!(
        messages(&result),
        vec!["method 'B.f' overrides its parent method with a different signature"]
    );
}

#[test]
fn base_calls_the_parent_implementation() {
    // type A { f() => 1; }
    // type B inherits A { f() => base() + 1; }
    // new B().f()
    let mut b = AstBuilder::new();
    let one = b.number(1.0);
    let a_f = b.method("f", Vec::new(), None, one);
    let a = b.type_decl(TypeDecl {
        methods: vec![a_f],
        ..decl("A")
    });
    let base = b.base(Vec::new());
    let one = b.number(1.0);
    let sum = b.binary(BinaryOp::Add, base, one);
    let b_f = b.method("f", Vec::new(), None, sum);
    let bt = b.type_decl(TypeDecl {
        methods: vec![b_f],
        ..inherits("B", "A")
    });
    let new = b.new_instance("B", Vec::new());
    let call = b.method_call(new, "f", Vec::new());
    let ast = b.finish(vec![a, bt, call]);

    let result = check(&ast);
    assert_clean(&result);
    assert_eq!(result.bindings.get(&base), Some(&Binding::Method(a_f)));
    assert_eq!(result.bindings.get(&call), Some(&Binding::Method(b_f)));
    assert_eq!(result.result_type_name(), Some("number"));
}

#[test]
fn keywords_outside_methods_are_illegal() {
    // self; base()
    let mut b = AstBuilder::new();
    let this = b.self_ref();
    let base = b.base(Vec::new());
    let ast = b.finish(vec![this, base]);

    let result = check(&ast);
    assert_eq!(
        messages(&result),
        vec![
            "illegal use of 'self': it is only available inside methods",
            "illegal use of 'base': it is only available inside methods",
        ]
    );
}

#[test]
fn base_without_overridden_method_is_illegal() {
    // type A { f() => base(); }
    let mut b = AstBuilder::new();
    let base = b.base(Vec::new());
    let f = b.method("f", Vec::new(), None, base);
    let a = b.type_decl(TypeDecl {
        methods: vec![f],
        ..decl("A")
    });
    let ast = b.finish(vec![a]);

    let result = check(&ast);
    assert_eq!(
        messages(&result),
        vec!["illegal use of 'base': no parent type defines the enclosing method"]
    );
}

// ── new / is / as ──────────────────────────────────────────────────────

#[test]
fn builtin_types_cannot_be_instantiated() {
    // new number(); new Object()
    let mut b = AstBuilder::new();
    let n = b.new_instance("number", Vec::new());
    let o = b.new_instance("Object", Vec::new());
    let ast = b.finish(vec![n, o]);

    let result = check(&ast);
    assert_eq!(
        messages(&result),
        vec!["built-in type 'number' cannot be instantiated"]
    );
    assert_eq!(result.type_name(o), "Object");
}

#[test]
fn downcast_and_type_test() {
    // type A {} type B inherits A {}
    // let a: A = new B() in { a is B; a as B }
    let mut b = AstBuilder::new();
    let a_ty = b.type_decl(decl("A"));
    let b_ty = b.type_decl(inherits("B", "A"));
    let new = b.new_instance("B", Vec::new());
    let a_decl = b.var_decl("a", Some("A"), new);
    let a1 = b.var("a");
    let test = b.is_type(a1, "B");
    let a2 = b.var("a");
    let cast = b.as_type(a2, "B");
    let block = b.block(vec![test, cast]);
    let body = b.let_in(vec![a_decl], block);
    let ast = b.finish(vec![a_ty, b_ty, body]);

    let result = check(&ast);
    assert_clean(&result);
    assert_eq!(result.symbol_type("a"), Some("A"));
    assert_eq!(result.type_name(test), "Boolean");
    assert_eq!(result.type_name(cast), "B");
    assert_eq!(result.result_type_name(), Some("B"));
}

#[test]
fn unrelated_cast_is_rejected() {
    // 1 as string
    let mut b = AstBuilder::new();
    let one = b.number(1.0);
    let cast = b.as_type(one, "string");
    let ast = b.finish(vec![cast]);

    let result = check(&ast);
    assert_eq!(messages(&result), vec!["cannot downcast 'number' to 'string'"]);
    assert_eq!(result.type_of(cast), TypeId::ERROR);
}

#[test]
fn unknown_annotation_is_undefined_type() {
    // let x: Foo = 1 in x
    let mut b = AstBuilder::new();
    let one = b.number(1.0);
    let decl = b.var_decl("x", Some("Foo"), one);
    let x = b.var("x");
    let body = b.let_in(vec![decl], x);
    let ast = b.finish(vec![body]);

    let result = check(&ast);
    assert_eq!(messages(&result), vec!["type 'Foo' is not defined"]);
}
