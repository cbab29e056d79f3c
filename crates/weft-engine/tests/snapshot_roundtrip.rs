//! Integration tests for capturing and restoring object graphs

mod common;

use common::*;
use weft_engine::snapshot::{SnapValue, Snapshot};
use weft_engine::{EngineError, Value, VmError};

fn graph_module() -> String {
    let pair = |n: f64, s: &str| tuple(vec![num(n), str_(s)]);
    module(vec![
        class(
            "Node",
            &[],
            vec![
                field("label", t_str()),
                field("next", t_named("Node")),
                field("tags", t_set(t_tuple(vec![t_num(), t_str()]))),
            ],
        ),
        class(
            "Graph",
            &[],
            vec![
                field("a", t_named("Node")),
                field("b", t_named("Node")),
                flag(
                    method(
                        "init",
                        &[],
                        t_void(),
                        vec![
                            assign(get(this(), "a"), new(t_named("Node"))),
                            assign(get(this(), "b"), new(t_named("Node"))),
                            assign(get(get(this(), "a"), "label"), str_("a")),
                            assign(get(get(this(), "b"), "label"), str_("b")),
                            assign(get(get(this(), "a"), "next"), get(this(), "b")),
                            assign(get(get(this(), "b"), "next"), get(this(), "a")),
                            compound("+=", get(get(this(), "a"), "tags"), pair(1.0, "x")),
                            compound("+=", get(get(this(), "a"), "tags"), pair(0.0, "y")),
                        ],
                    ),
                    "mutating",
                ),
                method("tag_count", &[], t_num(), vec![ret(len(get(get(this(), "a"), "tags")))]),
            ],
        ),
        main_class("Graph"),
    ])
}

#[test]
fn test_graph_survives_round_trip() {
    let mut engine = engine(&[("app", graph_module())]);
    let graph = engine.run_main("app").unwrap();
    let snap = engine.snapshot(&Value::Object(graph.clone()));
    // graph, two nodes and two tag sets
    assert_eq!(snap.entity_count(), 5);

    let text = snap.to_json().unwrap();
    let parsed = Snapshot::from_json(&text).unwrap();
    assert_eq!(parsed, snap);

    let mut fresh = common::engine(&[("app", graph_module())]);
    fresh.import("app").unwrap();
    let root = fresh.restore(&parsed).unwrap();
    assert_eq!(fresh.snapshot(&root), snap);

    let root = root.as_object().unwrap().clone();
    let a = fresh.runtime().get_field(&root, "a").unwrap();
    let a = a.as_object().unwrap().clone();
    let b = fresh.runtime().get_field(&a, "next").unwrap();
    let back = fresh.runtime().get_field(b.as_object().unwrap(), "next").unwrap();
    assert!(back.same(&Value::Object(a.clone())));
    assert_eq!(fresh.runtime().get_field(&a, "label"), Some(Value::str("a")));

    let Some(Value::Set(tags)) = fresh.runtime().get_field(&a, "tags") else {
        panic!("expected a set");
    };
    let first = tags.items().values().next().cloned().unwrap();
    assert_eq!(first, Value::Tuple(vec![Value::Num(0.0), Value::str("y")].into()));

    // restored objects dispatch like fresh ones
    assert_eq!(fresh.call(&root, "tag_count", Vec::new()).unwrap().as_num(), 2.0);
}

#[test]
fn test_restore_needs_imported_classes() {
    let mut engine = engine(&[("app", graph_module())]);
    let graph = engine.run_main("app").unwrap();
    let snap = engine.snapshot(&Value::Object(graph));

    let mut empty = common::engine(&[]);
    assert!(matches!(
        empty.restore(&snap),
        Err(EngineError::Vm(VmError::Snapshot(_)))
    ));
}

#[test]
fn test_field_keys_carry_class_prefix() {
    let mut engine = engine(&[("app", graph_module())]);
    let graph = engine.run_main("app").unwrap();
    let snap = engine.snapshot(&Value::Object(graph));

    let SnapValue::Ref(root) = &snap.root else {
        panic!("expected a reference root");
    };
    let object = &snap.objects[root];
    assert_eq!(object.classes, vec!["app#Graph".to_string()]);
    assert!(object.fields.contains_key("app#Graph.a"));
    assert!(object.fields.contains_key("app#Graph.b"));
}
