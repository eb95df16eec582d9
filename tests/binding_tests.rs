//! Integration tests for the binding lifecycle
//!
//! Sessions are driven through the public API with a manual scheduler so
//! every pass is synchronous and deterministic.

use std::sync::Arc;

use b3nd::view::Computed;
use b3nd::{
    bind, BindExt, BindOptions, Binder, BindingHandler, BindingValue, Document, ElementTree, JsonModel,
    ManualScheduler, Model, PlainView, SessionPhase,
};
use parking_lot::Mutex;
use pretty_assertions::assert_eq;
use serde_json::{json, Value};

const ATTR: &str = "data-model-bind";

type Calls = Arc<Mutex<Vec<(&'static str, String, BindingValue)>>>;

/// Handler recording (slot, element description, value) for every call
fn recorder(name: &str, calls: &Calls) -> BindingHandler {
    let on_init = Arc::clone(calls);
    let on_update = Arc::clone(calls);
    BindingHandler::new(name)
        .with_init(move |el, value, _| on_init.lock().push(("init", el.describe(), value.clone())))
        .with_update(move |el, value, _| on_update.lock().push(("update", el.describe(), value.clone())))
}

fn manual() -> BindOptions {
    BindOptions::new().scheduler(ManualScheduler::shared())
}

fn slots(calls: &Calls) -> Vec<&'static str> {
    calls.lock().iter().map(|(slot, _, _)| *slot).collect()
}

// ============================================================================
// Lifecycle
// ============================================================================

#[test]
fn test_foo_binding_init_then_single_update_per_change() {
    let doc = Document::new("div");
    doc.append(0, "span", &[(ATTR, "fooBinding: model.foo")]);
    let model = JsonModel::shared(json!({}));
    let view = PlainView::new(doc.root()).shared();
    let calls: Calls = Arc::default();

    let session = bind(view, Some(model.clone()), manual().using(recorder("fooBinding", &calls))).unwrap();
    assert_eq!(session.phase(), SessionPhase::Active);
    assert_eq!(
        *calls.lock(),
        vec![
            ("init", "span".to_string(), BindingValue::Undefined),
            ("update", "span".to_string(), BindingValue::Undefined),
        ]
    );

    model.set("foo", json!("blargh")).unwrap();
    let calls = calls.lock();
    assert_eq!(calls.len(), 3);
    assert_eq!(calls[2], ("update", "span".to_string(), BindingValue::Json(json!("blargh"))));
}

#[test]
fn test_every_init_runs_before_any_update() {
    let doc = Document::new("div");
    for _ in 0..3 {
        doc.append(0, "p", &[(ATTR, "a: 1, b: 2")]);
    }
    let view = PlainView::new(doc.root()).shared();
    let calls: Calls = Arc::default();

    bind(
        view,
        Some(JsonModel::shared(json!({}))),
        manual().using(recorder("a", &calls)).using(recorder("b", &calls)),
    )
    .unwrap();

    let slots = slots(&calls);
    assert_eq!(slots.len(), 12);
    assert!(slots[..6].iter().all(|s| *s == "init"));
    assert!(slots[6..].iter().all(|s| *s == "update"));
}

#[test]
fn test_root_element_is_processed_last() {
    let doc = Document::new("section");
    doc.set_attribute(0, ATTR, "probe: 'root'");
    doc.append(0, "p", &[(ATTR, "probe: 'first'")]);
    doc.append(0, "p", &[(ATTR, "probe: 'second'")]);
    let calls: Calls = Arc::default();

    Binder::new(PlainView::new(doc.root()).shared())
        .model(JsonModel::shared(json!({})))
        .scheduler(ManualScheduler::shared())
        .using(recorder("probe", &calls))
        .bind()
        .unwrap();

    let order: Vec<Value> = calls
        .lock()
        .iter()
        .filter(|(slot, _, _)| *slot == "init")
        .map(|(_, _, value)| value.to_json())
        .collect();
    assert_eq!(order, vec![json!("first"), json!("second"), json!("root")]);
}

#[test]
fn test_model_falls_back_to_view_model() {
    let doc = Document::new("div");
    let span = doc.append(0, "span", &[(ATTR, "text: model.title")]);
    let model = JsonModel::shared(json!({"title": "from view"}));
    let view = PlainView::new(doc.root()).with_model(model.clone()).shared();

    let session = view.b3nd_with(None, manual()).unwrap();
    assert_eq!(doc.element(span).text_content(), "from view");

    model.set("title", json!("changed")).unwrap();
    assert_eq!(doc.element(span).text_content(), "changed");
    session.unbind();
}

#[test]
fn test_unbind_stops_updates() {
    let doc = Document::new("div");
    let span = doc.append(0, "span", &[(ATTR, "text: model.title")]);
    let model = JsonModel::shared(json!({"title": "a"}));
    let session = bind(PlainView::new(doc.root()).shared(), Some(model.clone()), manual()).unwrap();

    session.unbind();
    assert_eq!(session.phase(), SessionPhase::Detached);
    assert_eq!(model.listener_count(), 0);

    model.set("title", json!("b")).unwrap();
    assert_eq!(doc.element(span).text_content(), "a");
    assert!(session.force_update().is_err());
}

#[test]
fn test_force_update_resyncs_external_changes() {
    let doc = Document::new("div");
    let span = doc.append(0, "span", &[(ATTR, "text: view.heading")]);
    let view = PlainView::new(doc.root()).with_property("heading", json!("old")).shared();
    let session = bind(view.clone(), Some(JsonModel::shared(json!({}))), manual()).unwrap();

    view.set_property("heading", json!("new"));
    assert_eq!(doc.element(span).text_content(), "old");

    let stats = session.force_update().unwrap();
    assert_eq!(stats.elements, 1);
    assert_eq!(doc.element(span).text_content(), "new");
}

// ============================================================================
// Scope
// ============================================================================

#[test]
fn test_state_changes_trigger_update() {
    let doc = Document::new("div");
    let span = doc.append(0, "span", &[(ATTR, "visible: state.open")]);
    let state = JsonModel::shared(json!({"open": false}));
    let view = PlainView::new(doc.root()).with_state(state.clone()).shared();
    bind(view, Some(JsonModel::shared(json!({}))), manual()).unwrap();

    assert_eq!(doc.element(span).style("display").as_deref(), Some("none"));
    state.set("open", json!(true)).unwrap();
    assert_eq!(doc.element(span).style("display"), None);
}

#[test]
fn test_missing_state_is_declaration_error() {
    let doc = Document::new("div");
    doc.append(0, "span", &[(ATTR, "visible: state.open")]);
    let model = JsonModel::shared(json!({}));

    let err = bind(PlainView::new(doc.root()).shared(), Some(model.clone()), manual()).unwrap_err();
    assert_eq!(err.code(), "B3ND-010");
    assert_eq!(err.declaration(), Some("visible: state.open"));
    // nothing subscribed after a failed creation
    assert_eq!(model.listener_count(), 0);
}

#[test]
fn test_computed_proxies_view_method_with_serialized_model() {
    let doc = Document::new("div");
    let span = doc.append(0, "span", &[(ATTR, "text: computed.summary")]);
    let view = PlainView::new(doc.root())
        .with_computed("summary", Computed::ViewMethod)
        .with_method("summary", |_, args| {
            let count = args[0]["items"].as_array().map_or(0, Vec::len);
            Ok(json!(format!("{count} items")))
        })
        .shared();
    let model = JsonModel::shared(json!({"items": [1, 2]}));
    bind(view, Some(model.clone()), manual()).unwrap();

    assert_eq!(doc.element(span).text_content(), "2 items");
    model.set("items", json!([1, 2, 3])).unwrap();
    assert_eq!(doc.element(span).text_content(), "3 items");
}

#[test]
fn test_computed_function_values() {
    let doc = Document::new("div");
    let span = doc.append(0, "span", &[(ATTR, "text: computed.full")]);
    let view = PlainView::new(doc.root())
        .with_computed(
            "full",
            Computed::function(|_, model| {
                json!(format!(
                    "{} {}",
                    model["first"].as_str().unwrap_or_default(),
                    model["last"].as_str().unwrap_or_default()
                ))
            }),
        )
        .shared();
    bind(view, Some(JsonModel::shared(json!({"first": "Ada", "last": "Lovelace"}))), manual()).unwrap();

    assert_eq!(doc.element(span).text_content(), "Ada Lovelace");
}

#[test]
fn test_missing_computed_method_is_an_error() {
    let doc = Document::new("div");
    let view = PlainView::new(doc.root()).with_computed("ghost", Computed::ViewMethod).shared();

    let err = bind(view, Some(JsonModel::shared(json!({}))), manual()).unwrap_err();
    assert_eq!(err.code(), "B3ND-020");
}

// ============================================================================
// Registry and dispatch
// ============================================================================

#[test]
fn test_unknown_binding_is_skipped() {
    let doc = Document::new("div");
    let span = doc.append(0, "span", &[(ATTR, "bogus: 1, text: model.title")]);
    let session = bind(
        PlainView::new(doc.root()).shared(),
        Some(JsonModel::shared(json!({"title": "Hello"}))),
        manual(),
    )
    .unwrap();

    assert_eq!(doc.element(span).text_content(), "Hello");
    let stats = session.force_update().unwrap();
    assert_eq!(stats.unknown, 1);
}

#[test]
fn test_long_operator_chain_is_a_declaration_error() {
    let doc = Document::new("div");
    let declaration = format!("text: 1{}", "+1".repeat(5_000));
    doc.append(0, "span", &[(ATTR, declaration.as_str())]);
    let model = JsonModel::shared(json!({}));

    let err = bind(PlainView::new(doc.root()).shared(), Some(model.clone()), manual()).unwrap_err();
    assert_eq!(err.code(), "B3ND-010");
    assert!(err.to_string().contains("nested too deeply"), "{err}");
    assert_eq!(model.listener_count(), 0);
}

#[test]
fn test_moderate_operator_chain_still_binds() {
    let doc = Document::new("div");
    let declaration = format!("text: 1{}", "+1".repeat(99));
    let span = doc.append(0, "span", &[(ATTR, declaration.as_str())]);

    let _session = bind(
        PlainView::new(doc.root()).shared(),
        Some(JsonModel::shared(json!({}))),
        manual(),
    )
    .unwrap();
    assert_eq!(doc.element(span).text_content(), "100");
}

#[test]
fn test_caller_handler_replaces_builtin() {
    let doc = Document::new("div");
    let span = doc.append(0, "span", &[(ATTR, "text: model.title")]);
    let custom = BindingHandler::new("text")
        .with_update(|el, value, _| el.set_text_content(&value.to_content_string().to_uppercase()));

    let session = bind(
        PlainView::new(doc.root()).shared(),
        Some(JsonModel::shared(json!({"title": "quiet"}))),
        manual().using(custom),
    )
    .unwrap();

    assert_eq!(doc.element(span).text_content(), "QUIET");
    assert!(session.b3ndings().contains("css"));
}

#[test]
fn test_css_toggles_only_its_class() {
    let doc = Document::new("div");
    let li = doc.append(0, "li", &[("class", "item"), (ATTR, "css: {active: model.isActive}")]);
    let model = JsonModel::shared(json!({"isActive": true}));
    bind(PlainView::new(doc.root()).shared(), Some(model.clone()), manual()).unwrap();

    assert_eq!(doc.element(li).classes(), vec!["item", "active"]);
    model.set("isActive", json!(false)).unwrap();
    assert_eq!(doc.element(li).classes(), vec!["item"]);
}

// ============================================================================
// Change events
// ============================================================================

#[test]
fn test_nested_changes_ignored_by_default() {
    let doc = Document::new("div");
    let span = doc.append(0, "span", &[(ATTR, "text: model.user.name")]);
    let model = JsonModel::shared(json!({"user": {"name": "Ada"}}));
    bind(PlainView::new(doc.root()).shared(), Some(model.clone()), manual()).unwrap();

    model.set("user.name", json!("Grace")).unwrap();
    assert_eq!(doc.element(span).text_content(), "Ada");
}

#[test]
fn test_nested_option_subscribes_to_nested_changes() {
    let doc = Document::new("div");
    let span = doc.append(0, "span", &[(ATTR, "text: model.user.name")]);
    let model = JsonModel::shared(json!({"user": {"name": "Ada"}}));
    bind(PlainView::new(doc.root()).shared(), Some(model.clone()), manual().nested(true)).unwrap();

    model.set("user.name", json!("Grace")).unwrap();
    assert_eq!(doc.element(span).text_content(), "Grace");
}

#[test]
fn test_sessions_on_one_model_update_independently() {
    let model = JsonModel::shared(json!({"n": 1}));
    let docs: Vec<_> = (0..2)
        .map(|_| {
            let doc = Document::new("div");
            doc.append(0, "b", &[(ATTR, "text: model.n")]);
            doc
        })
        .collect();
    let sessions: Vec<_> = docs
        .iter()
        .map(|doc| bind(PlainView::new(doc.root()).shared(), Some(model.clone()), manual()).unwrap())
        .collect();
    assert_eq!(model.listener_count(), 2);

    model.set("n", json!(2)).unwrap();
    for doc in &docs {
        assert_eq!(doc.root().text_content(), "2");
    }

    sessions[0].unbind();
    model.set("n", json!(3)).unwrap();
    assert_eq!(docs[0].root().text_content(), "2");
    assert_eq!(docs[1].root().text_content(), "3");
}

// ============================================================================
// Boundaries
// ============================================================================

#[test]
fn test_nested_session_owns_its_subtree() {
    let doc = Document::new("div");
    let outer_span = doc.append(0, "span", &[(ATTR, "text: model.label")]);
    let inner_root = doc.append(0, "section", &[]);
    let inner_span = doc.append(inner_root, "span", &[(ATTR, "text: model.label")]);

    let outer_model = JsonModel::shared(json!({"label": "outer"}));
    let inner_model = JsonModel::shared(json!({"label": "inner"}));

    let _inner = bind(
        PlainView::new(doc.element(inner_root)).shared(),
        Some(inner_model.clone()),
        manual(),
    )
    .unwrap();
    let outer = bind(PlainView::new(doc.root()).shared(), Some(outer_model.clone()), manual()).unwrap();

    assert_eq!(doc.element(outer_span).text_content(), "outer");
    assert_eq!(doc.element(inner_span).text_content(), "inner");

    outer_model.set("label", json!("outer 2")).unwrap();
    assert_eq!(doc.element(inner_span).text_content(), "inner");
    assert_eq!(outer.force_update().unwrap().elements, 1);

    inner_model.set("label", json!("inner 2")).unwrap();
    assert_eq!(doc.element(outer_span).text_content(), "outer 2");
    assert_eq!(doc.element(inner_span).text_content(), "inner 2");
}

#[test]
fn test_child_bound_after_parent_is_excluded_from_later_passes() {
    let doc = Document::new("div");
    let inner_root = doc.append(0, "section", &[]);
    let inner_span = doc.append(inner_root, "span", &[(ATTR, "text: model.label")]);
    let outer_model = JsonModel::shared(json!({"label": "outer"}));

    bind(PlainView::new(doc.root()).shared(), Some(outer_model.clone()), manual()).unwrap();
    assert_eq!(doc.element(inner_span).text_content(), "outer");

    bind(
        PlainView::new(doc.element(inner_root)).shared(),
        Some(JsonModel::shared(json!({"label": "inner"}))),
        manual(),
    )
    .unwrap();
    outer_model.set("label", json!("outer 2")).unwrap();
    assert_eq!(doc.element(inner_span).text_content(), "inner");
}
