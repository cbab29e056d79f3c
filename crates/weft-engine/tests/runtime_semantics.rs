//! Integration tests for execution: main entry, dispatch, extend/retract,
//! suggestions and collections

mod common;

use common::*;
use std::rc::Rc;
use weft_engine::{Engine, EngineError, ObjectRef, Value, VmError};

fn num_field(engine: &Engine, obj: &ObjectRef, name: &str) -> f64 {
    engine
        .runtime()
        .get_field(obj, name)
        .map(|v| v.as_num())
        .unwrap_or(f64::NAN)
}

fn counter_module() -> String {
    module(vec![
        class(
            "Counter",
            &[],
            vec![
                field("count", t_num()),
                flag(
                    method(
                        "bump",
                        &[("by", t_num())],
                        t_void(),
                        vec![compound("+=", get(this(), "count"), name("by"))],
                    ),
                    "mutating_this",
                ),
                method("get", &[], t_num(), vec![ret(get(this(), "count"))]),
                flag(
                    method(
                        "init",
                        &[],
                        t_void(),
                        vec![
                            eval(call(this(), "bump", vec![num(2.0)])),
                            eval(call(this(), "bump", vec![num(3.0)])),
                        ],
                    ),
                    "mutating_this",
                ),
            ],
        ),
        main_class("Counter"),
    ])
}

#[test]
fn test_run_main_calls_entry_method() {
    let mut engine = engine(&[("app", counter_module())]);
    let main = engine.run_main("app").unwrap();
    assert_eq!(num_field(&engine, &main, "count"), 5.0);

    let got = engine.call(&main, "get", Vec::new()).unwrap();
    assert_eq!(got.as_num(), 5.0);

    engine.call(&main, "bump", vec![Value::Num(1.5)]).unwrap();
    assert_eq!(num_field(&engine, &main, "count"), 6.5);
}

#[test]
fn test_host_call_errors() {
    let mut engine = engine(&[("app", counter_module())]);
    let main = engine.run_main("app").unwrap();
    assert!(matches!(
        engine.call(&main, "missing", Vec::new()),
        Err(EngineError::Vm(VmError::UnknownMethod { .. }))
    ));
    assert!(matches!(
        engine.call(&main, "bump", Vec::new()),
        Err(EngineError::Vm(VmError::ArgumentCount {
            expected: 1,
            actual: 0,
            ..
        }))
    ));
}

#[test]
fn test_run_main_without_main_class() {
    let app = module(vec![class("Lonely", &[], vec![])]);
    let mut engine = engine(&[("app", app)]);
    assert!(matches!(engine.run_main("app"), Err(EngineError::NoMainClass { .. })));
}

fn bird_module() -> String {
    module(vec![
        class("Walker", &[], vec![]),
        class(
            "Flyer",
            &[],
            vec![
                field_init("wings", t_num(), num(2.0)),
                method("fly", &[], t_str(), vec![ret(str_("whoosh"))]),
            ],
        ),
        class(
            "Bird",
            &["Walker"],
            vec![
                flag(method("sprout", &[], t_void(), vec![extend(this(), "Flyer")]), "mutating_this"),
                flag(method("molt", &[], t_void(), vec![retract(this(), "Flyer")]), "mutating_this"),
                method("can_fly", &[], t_bool(), vec![ret(is(this(), "Flyer"))]),
            ],
        ),
        class(
            "Watcher",
            &[],
            vec![method(
                "listen",
                &[("f", t_named("Flyer"))],
                t_str(),
                vec![ret(call(name("f"), "fly", Vec::new()))],
            )],
        ),
    ])
}

#[test]
fn test_extend_then_retract_restores_object() {
    let mut engine = engine(&[("app", bird_module())]);
    engine.import("app").unwrap();
    let bird = engine.instantiate("app", "Bird").unwrap();
    let other = engine.instantiate("app", "Bird").unwrap();
    let before = bird.borrow().manifest().to_vec();
    assert!(Rc::ptr_eq(bird.borrow().vtable(), other.borrow().vtable()));

    engine.call(&bird, "sprout", Vec::new()).unwrap();
    assert_eq!(num_field(&engine, &bird, "wings"), 2.0);
    assert_eq!(engine.call(&bird, "fly", Vec::new()).unwrap().as_str(), Some("whoosh"));
    assert!(engine.call(&bird, "can_fly", Vec::new()).unwrap().as_bool());

    engine.call(&bird, "molt", Vec::new()).unwrap();
    assert_eq!(bird.borrow().manifest(), before.as_slice());
    assert!(engine.runtime().get_field(&bird, "wings").is_none());
    assert!(!engine.call(&bird, "can_fly", Vec::new()).unwrap().as_bool());
    assert!(matches!(
        engine.call(&bird, "fly", Vec::new()),
        Err(EngineError::Vm(VmError::UnknownMethod { .. }))
    ));

    // equal manifests share one method table
    assert!(Rc::ptr_eq(bird.borrow().vtable(), other.borrow().vtable()));
}

#[test]
fn test_call_on_null_receiver_yields_default() {
    let mut engine = engine(&[("app", bird_module())]);
    engine.import("app").unwrap();
    let watcher = engine.instantiate("app", "Watcher").unwrap();
    let heard = engine.call(&watcher, "listen", vec![Value::Null]).unwrap();
    assert_eq!(heard.as_str(), Some(""));
}

fn boost_module() -> String {
    module(vec![
        class(
            "Counter",
            &[],
            vec![
                field("n", t_num()),
                flag(
                    method("tick", &[], t_void(), vec![compound("+=", get(this(), "n"), num(1.0))]),
                    "mutating_this",
                ),
            ],
        ),
        class(
            "Boost",
            &["Counter"],
            vec![flag(
                flag(
                    method("tick", &[], t_void(), vec![compound("+=", get(this(), "n"), num(10.0))]),
                    "mutating_this",
                ),
                "override",
            )],
        ),
        class(
            "Driver",
            &[],
            vec![
                flag(
                    method(
                        "run",
                        &[("c", t_named("Counter"))],
                        t_void(),
                        vec![enforce(suggest(vec![
                            step_call(name("c"), "tick", Vec::new()),
                            step_retract(name("c"), "Boost"),
                            step_extend(name("c"), "Boost"),
                        ]))],
                    ),
                    "mutating",
                ),
                method(
                    "plan",
                    &[("c", t_named("Counter"))],
                    t_suggestion(),
                    vec![ret(suggest(vec![step_extend(name("c"), "Boost")]))],
                ),
            ],
        ),
    ])
}

#[test]
fn test_enforce_runs_extends_then_calls_then_retracts() {
    let mut engine = engine(&[("app", boost_module())]);
    engine.import("app").unwrap();
    let boost = engine.class("app", "Boost").unwrap();
    let counter = engine.instantiate("app", "Counter").unwrap();
    let driver = engine.instantiate("app", "Driver").unwrap();

    engine
        .call(&driver, "run", vec![Value::Object(counter.clone())])
        .unwrap();
    // the call step saw the boosted override, then the boost came off
    assert_eq!(num_field(&engine, &counter, "n"), 10.0);
    assert!(!counter.borrow().has_type(boost));
    assert!(!counter.borrow().worn().contains(&boost));
}

#[test]
fn test_host_enforces_returned_suggestion() {
    let mut engine = engine(&[("app", boost_module())]);
    engine.import("app").unwrap();
    let boost = engine.class("app", "Boost").unwrap();
    let counter = engine.instantiate("app", "Counter").unwrap();
    let driver = engine.instantiate("app", "Driver").unwrap();

    let plan = engine
        .call(&driver, "plan", vec![Value::Object(counter.clone())])
        .unwrap();
    // building a suggestion changes nothing
    assert!(!counter.borrow().has_type(boost));

    let Value::Suggestion(suggestion) = plan else {
        panic!("expected a suggestion");
    };
    assert_eq!(suggestion.len(), 1);
    engine.runtime_mut().enforce(&suggestion).unwrap();
    assert!(counter.borrow().has_type(boost));

    engine.call(&counter, "tick", Vec::new()).unwrap();
    assert_eq!(num_field(&engine, &counter, "n"), 10.0);
}

#[test]
fn test_super_call_reaches_parent_body() {
    let app = module(vec![
        class("Base", &[], vec![method("greet", &[], t_str(), vec![ret(str_("base"))])]),
        class(
            "Loud",
            &["Base"],
            vec![flag(
                method(
                    "greet",
                    &[],
                    t_str(),
                    vec![ret(binary("+", super_call("greet", Vec::new()), str_("!")))],
                ),
                "override",
            )],
        ),
    ]);
    let mut engine = engine(&[("app", app)]);
    engine.import("app").unwrap();
    let loud = engine.instantiate("app", "Loud").unwrap();
    assert_eq!(engine.call(&loud, "greet", Vec::new()).unwrap().as_str(), Some("base!"));
}

#[test]
fn test_tuple_keyed_map() {
    let pair = |a: f64, b: f64| tuple(vec![num(a), num(b)]);
    let app = module(vec![class(
        "Grid",
        &[],
        vec![flag(
            method(
                "lookup",
                &[],
                t_num(),
                vec![
                    let_("m", new(t_map(t_tuple(vec![t_num(), t_num()]), t_str()))),
                    assign(index(name("m"), pair(1.0, 2.0)), str_("a")),
                    assign(index(name("m"), pair(3.0, 4.0)), str_("b")),
                    compound("-=", name("m"), pair(1.0, 2.0)),
                    if_(has(name("m"), pair(1.0, 2.0)), vec![ret(num(100.0))]),
                    if_(
                        binary("==", index(name("m"), pair(3.0, 4.0)), str_("b")),
                        vec![ret(len(name("m")))],
                    ),
                    ret(num(0.0)),
                ],
            ),
            "mutating",
        )],
    )]);
    let mut engine = engine(&[("app", app)]);
    engine.import("app").unwrap();
    let grid = engine.instantiate("app", "Grid").unwrap();
    assert_eq!(engine.call(&grid, "lookup", Vec::new()).unwrap().as_num(), 1.0);
}

#[test]
fn test_engines_are_independent() {
    let mut first = engine(&[("app", counter_module())]);
    let mut second = engine(&[("app", counter_module())]);
    let a = first.run_main("app").unwrap();
    let b = second.run_main("app").unwrap();
    first.call(&a, "bump", vec![Value::Num(10.0)]).unwrap();
    assert_eq!(num_field(&first, &a, "count"), 15.0);
    assert_eq!(num_field(&second, &b, "count"), 5.0);
    assert_eq!(a.borrow().id().to_string(), b.borrow().id().to_string());
}
