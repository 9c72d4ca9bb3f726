//! Composition set algebra over real containers.

mod common;

use common::fixture;
use oms_model::{
    ContainerCore, ContainerMut, Model, ModelError, Node, NodeRef, ProviderError, ProviderResult,
    TypeFilter,
};
use serde_json::json;
use std::sync::Arc;

fn tagged(model: &Model, tag: &str) -> NodeRef {
    let kind = model.types().get("Folder").unwrap();
    Node::builder(kind).attr("tag", json!(tag)).build()
}

fn tag(node: &NodeRef) -> String {
    node.get_attr("tag").unwrap().as_str().unwrap().to_string()
}

#[test]
fn persisted_injected_extended() {
    let fx = fixture();
    let model = fx.model.clone();

    {
        let model = model.clone();
        fx.model.providers().register_injector(
            TypeFilter::kind("Folder"),
            move |_: &NodeRef| -> ProviderResult {
                Ok(vec![
                    ("b".into(), tagged(&model, "b")),
                    ("c".into(), tagged(&model, "c1")),
                ])
            },
        );
    }
    {
        let model = model.clone();
        fx.model.providers().register_extender(
            TypeFilter::kind("Folder"),
            move |_: &NodeRef| -> ProviderResult {
                Ok(vec![
                    ("c".into(), tagged(&model, "c2")),
                    ("d".into(), tagged(&model, "d")),
                ])
            },
        );
    }

    let folder = model.create_named("Folder", "f").unwrap();
    let container = model.container(&folder).unwrap();
    let a = Node::builder(model.types().get("Folder").unwrap())
        .name("a")
        .attr("tag", json!("a"))
        .build();
    container.add(a).unwrap();

    let visible = container.compose().unwrap();
    assert_eq!(visible.names(), ["a", "b", "c", "d"]);
    assert_eq!(tag(&visible.children["c"]), "c2");
    assert!(visible.children["c"].is_transient());
    assert!(visible.children["d"].is_transient());
    assert!(!visible.children["b"].is_transient());

    let persisted: Vec<(String, String)> = folder
        .persisted_children()
        .unwrap()
        .iter()
        .map(|(k, v)| (k.clone(), tag(v)))
        .collect();
    assert_eq!(
        persisted,
        vec![
            ("a".to_string(), "a".to_string()),
            ("b".to_string(), "b".to_string()),
            ("c".to_string(), "c1".to_string()),
        ]
    );

    // injected children are parented and named like added ones
    let b = &visible.children["b"];
    assert_eq!(b.name().as_deref(), Some("b"));
    assert!(Arc::ptr_eq(&b.parent().unwrap(), &folder));
}

#[test]
fn repeated_reads_are_stable() {
    let fx = fixture();
    let model = fx.model.clone();
    {
        let model = model.clone();
        fx.model.providers().register_injector(
            TypeFilter::Any,
            move |_: &NodeRef| -> ProviderResult { Ok(vec![("x".into(), tagged(&model, "x"))]) },
        );
    }
    {
        let model = model.clone();
        fx.model.providers().register_extender(
            TypeFilter::Any,
            move |_: &NodeRef| -> ProviderResult { Ok(vec![("y".into(), tagged(&model, "y"))]) },
        );
    }

    let folder = model.create("Folder").unwrap();
    let container = model.container(&folder).unwrap();
    let first = container.list_names().unwrap();
    let second = container.list_names().unwrap();
    assert_eq!(first, second);
    assert_eq!(first, ["x", "y"]);

    // injected node identity survives reads; extended node is rebuilt
    let x1 = container.get("x").unwrap();
    let x2 = container.get("x").unwrap();
    assert!(Arc::ptr_eq(&x1, &x2));
    let y1 = container.get("y").unwrap();
    let y2 = container.get("y").unwrap();
    assert!(!Arc::ptr_eq(&y1, &y2));
}

#[test]
fn failing_injector_does_not_hide_persisted_children() {
    let fx = fixture();
    fx.model.providers().register_injector(
        TypeFilter::Any,
        |_: &NodeRef| -> ProviderResult { Err(ProviderError::Failed("no backend".into())) },
    );

    let folder = fx.model.create("Folder").unwrap();
    let container = fx.model.container(&folder).unwrap();
    let child = fx.model.create_named("Folder", "kept").unwrap();
    container.add(child).unwrap();

    let composition = container.compose().unwrap();
    assert_eq!(composition.names(), ["kept"]);
    assert_eq!(composition.failures.len(), 1);
    assert_eq!(
        composition.failures[0].error,
        ProviderError::Failed("no backend".into())
    );
}

#[test]
fn missing_child_is_not_found() {
    let fx = fixture();
    let folder = fx.model.create("Folder").unwrap();
    let err = fx.model.container(&folder).unwrap().get("ghost").unwrap_err();
    assert!(matches!(err, ModelError::NotFound { ref name, .. } if name == "ghost"));
}
