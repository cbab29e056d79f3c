//! Syntax-tree builders shared by the integration tests

#![allow(dead_code)]

use serde_json::{json, Value as Json};
use weft_engine::{Engine, EngineOptions, MapFetcher};

// ----------------------------------------------------------------------------
// Modules and declarations
// ----------------------------------------------------------------------------

/// Module tree with the mandatory copyright and license notices
pub fn module(decls: Vec<Json>) -> String {
    let mut all = vec![
        json!({"type": "copyright", "children": {"text": "(c) Weft tests"}}),
        json!({"type": "license", "children": {"text": "MIT"}}),
    ];
    all.extend(decls);
    bare_module(all)
}

/// Module tree without implicit notices
pub fn bare_module(decls: Vec<Json>) -> String {
    json!({"type": "module", "children": {"declarations": decls}}).to_string()
}

/// Core module with the root and clonable classes
pub fn core() -> String {
    module(vec![class("Object", &[], vec![]), class("Clonable", &["Object"], vec![])])
}

/// Engine serving the core module plus `modules`
pub fn engine(modules: &[(&str, String)]) -> Engine {
    let mut fetcher = MapFetcher::new().with("weft:core", core());
    for (url, text) in modules {
        fetcher.insert(*url, text.clone());
    }
    Engine::new(EngineOptions::default(), Box::new(fetcher))
}

fn path(dotted: &str) -> Vec<String> {
    dotted.split('.').map(String::from).collect()
}

pub fn class(name: &str, parents: &[&str], members: Vec<Json>) -> Json {
    let parents: Vec<Vec<String>> = parents.iter().map(|p| path(p)).collect();
    json!({"type": "class", "children": {
        "name": name, "parents": parents, "exported": true, "members": members
    }})
}

pub fn import(url: &str, name: &str) -> Json {
    json!({"type": "import", "children": {"url": url, "name": name}})
}

pub fn main_class(name: &str) -> Json {
    json!({"type": "main", "children": {"path": path(name)}})
}

pub fn field(name: &str, ty: Json) -> Json {
    json!({"type": "field", "children": {"name": name, "ty": ty}})
}

pub fn field_init(name: &str, ty: Json, init: Json) -> Json {
    json!({"type": "field", "children": {"name": name, "ty": ty, "init": init}})
}

pub fn method(name: &str, params: &[(&str, Json)], ret: Json, body: Vec<Json>) -> Json {
    let params: Vec<Json> = params
        .iter()
        .map(|(n, t)| json!({"name": n, "ty": t}))
        .collect();
    json!({"type": "method", "children": {
        "name": name, "params": params, "ret": ret, "body": body
    }})
}

/// Set a boolean flag (`mutating`, `mutating_this`, `override`) on a method
pub fn flag(mut method: Json, name: &str) -> Json {
    method["children"][name] = json!(true);
    method
}

// ----------------------------------------------------------------------------
// Types
// ----------------------------------------------------------------------------

pub fn t_num() -> Json {
    json!({"type": "num"})
}

pub fn t_str() -> Json {
    json!({"type": "string"})
}

pub fn t_bool() -> Json {
    json!({"type": "bool"})
}

pub fn t_void() -> Json {
    json!({"type": "void"})
}

pub fn t_suggestion() -> Json {
    json!({"type": "suggestion"})
}

pub fn t_named(name: &str) -> Json {
    json!({"type": "named", "children": {"path": path(name)}})
}

pub fn t_tuple(elements: Vec<Json>) -> Json {
    json!({"type": "tuple", "children": {"elements": elements}})
}

pub fn t_map(key: Json, value: Json) -> Json {
    json!({"type": "map", "children": {"key": key, "value": value}})
}

pub fn t_set(element: Json) -> Json {
    json!({"type": "set", "children": {"element": element}})
}

// ----------------------------------------------------------------------------
// Statements
// ----------------------------------------------------------------------------

pub fn let_(name: &str, init: Json) -> Json {
    json!({"type": "let", "children": {"name": name, "init": init}})
}

pub fn assign(target: Json, value: Json) -> Json {
    json!({"type": "assign", "children": {"target": target, "value": value}})
}

pub fn compound(op: &str, target: Json, value: Json) -> Json {
    json!({"type": "compound", "children": {"op": op, "target": target, "value": value}})
}

pub fn eval(expr: Json) -> Json {
    json!({"type": "expr", "children": {"expr": expr}})
}

pub fn ret(value: Json) -> Json {
    json!({"type": "return", "children": {"value": value}})
}

pub fn if_(cond: Json, then: Vec<Json>) -> Json {
    json!({"type": "if", "children": {"cond": cond, "then": then}})
}

pub fn for_in(key: &str, value: Option<&str>, iter: Json, body: Vec<Json>) -> Json {
    json!({"type": "for", "children": {"key": key, "value": value, "iter": iter, "body": body}})
}

pub fn extend(target: Json, class: &str) -> Json {
    json!({"type": "extend", "children": {"target": target, "class": path(class)}})
}

pub fn retract(target: Json, class: &str) -> Json {
    json!({"type": "retract", "children": {"target": target, "class": path(class)}})
}

pub fn enforce(suggestion: Json) -> Json {
    json!({"type": "enforce", "children": {"suggestion": suggestion}})
}

// ----------------------------------------------------------------------------
// Expressions
// ----------------------------------------------------------------------------

pub fn num(value: f64) -> Json {
    json!({"type": "num", "children": {"value": value}})
}

pub fn str_(value: &str) -> Json {
    json!({"type": "str", "children": {"value": value}})
}

pub fn this() -> Json {
    json!({"type": "this"})
}

pub fn name(dotted: &str) -> Json {
    json!({"type": "name", "children": {"path": path(dotted)}})
}

pub fn get(object: Json, field: &str) -> Json {
    json!({"type": "field", "children": {"object": object, "name": field}})
}

pub fn index(object: Json, index: Json) -> Json {
    json!({"type": "index", "children": {"object": object, "index": index}})
}

pub fn call(object: Json, method: &str, args: Vec<Json>) -> Json {
    json!({"type": "call", "children": {"object": object, "method": method, "args": args}})
}

pub fn super_call(method: &str, args: Vec<Json>) -> Json {
    json!({"type": "super_call", "children": {"method": method, "args": args}})
}

pub fn new(ty: Json) -> Json {
    json!({"type": "new", "children": {"ty": ty}})
}

pub fn binary(op: &str, left: Json, right: Json) -> Json {
    json!({"type": "binary", "children": {"op": op, "left": left, "right": right}})
}

pub fn tuple(elements: Vec<Json>) -> Json {
    json!({"type": "tuple", "children": {"elements": elements}})
}

pub fn len(value: Json) -> Json {
    json!({"type": "len", "children": {"value": value}})
}

pub fn has(collection: Json, key: Json) -> Json {
    json!({"type": "has", "children": {"collection": collection, "key": key}})
}

pub fn is(value: Json, class: &str) -> Json {
    json!({"type": "is", "children": {"value": value, "class": path(class)}})
}

pub fn suggest(steps: Vec<Json>) -> Json {
    json!({"type": "suggest", "children": {"steps": steps}})
}

pub fn step_extend(target: Json, class: &str) -> Json {
    json!({"type": "extend", "children": {"target": target, "class": path(class)}})
}

pub fn step_retract(target: Json, class: &str) -> Json {
    json!({"type": "retract", "children": {"target": target, "class": path(class)}})
}

pub fn step_call(target: Json, method: &str, args: Vec<Json>) -> Json {
    json!({"type": "call", "children": {"target": target, "method": method, "args": args}})
}
