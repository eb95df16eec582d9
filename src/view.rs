//! View collaborator
//!
//! A view owns a root element and optionally a model, a state object,
//! computed definitions, readable properties and callable methods.
//! `PlainView` is a builder-style implementation for hosts and tests.

use std::sync::Arc;

use parking_lot::RwLock;
use rustc_hash::FxHashMap;
use serde_json::Value;

use crate::dom::Element;
use crate::error::Result;
use crate::model::Model;

/// Function computing a value from the serialized model
pub type ComputedFn = Arc<dyn Fn(&dyn View, &Value) -> Value + Send + Sync>;

/// View method: receives the view and call arguments
pub type MethodFn = Arc<dyn Fn(&dyn View, &[Value]) -> Result<Value> + Send + Sync>;

/// One computed definition
#[derive(Clone)]
pub enum Computed {
    /// Invoked with the view and the serialized model
    Function(ComputedFn),
    /// Proxy marker: call the view method with the same name
    ViewMethod,
}

impl Computed {
    pub fn function(f: impl Fn(&dyn View, &Value) -> Value + Send + Sync + 'static) -> Self {
        Computed::Function(Arc::new(f))
    }
}

impl std::fmt::Debug for Computed {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Computed::Function(_) => f.write_str("Computed::Function"),
            Computed::ViewMethod => f.write_str("Computed::ViewMethod"),
        }
    }
}

pub trait View: Send + Sync {
    /// Root element of the rendered tree
    fn el(&self) -> Element;

    /// Model used when none is passed to `bind`
    fn model(&self) -> Option<Arc<dyn Model>> {
        None
    }

    fn state(&self) -> Option<Arc<dyn Model>> {
        None
    }

    fn computeds(&self) -> Option<FxHashMap<String, Computed>> {
        None
    }

    /// Readable property (`view.title` in a declaration)
    fn property(&self, _name: &str) -> Option<Value> {
        None
    }

    fn has_method(&self, _name: &str) -> bool {
        false
    }

    /// Invoke a method; `None` when the view has no such method
    fn call(&self, _method: &str, _args: &[Value]) -> Option<Result<Value>> {
        None
    }
}

/// Builder-style view over closures
pub struct PlainView {
    el: Element,
    model: Option<Arc<dyn Model>>,
    state: Option<Arc<dyn Model>>,
    computeds: Option<FxHashMap<String, Computed>>,
    properties: RwLock<FxHashMap<String, Value>>,
    methods: FxHashMap<String, MethodFn>,
}

impl PlainView {
    pub fn new(el: Element) -> Self {
        Self {
            el,
            model: None,
            state: None,
            computeds: None,
            properties: RwLock::new(FxHashMap::default()),
            methods: FxHashMap::default(),
        }
    }

    pub fn with_model(mut self, model: Arc<dyn Model>) -> Self {
        self.model = Some(model);
        self
    }

    pub fn with_state(mut self, state: Arc<dyn Model>) -> Self {
        self.state = Some(state);
        self
    }

    pub fn with_computed(mut self, name: impl Into<String>, computed: Computed) -> Self {
        self.computeds
            .get_or_insert_with(FxHashMap::default)
            .insert(name.into(), computed);
        self
    }

    pub fn with_property(self, name: impl Into<String>, value: Value) -> Self {
        self.properties.write().insert(name.into(), value);
        self
    }

    pub fn with_method(
        mut self,
        name: impl Into<String>,
        method: impl Fn(&dyn View, &[Value]) -> Result<Value> + Send + Sync + 'static,
    ) -> Self {
        self.methods.insert(name.into(), Arc::new(method));
        self
    }

    pub fn set_property(&self, name: impl Into<String>, value: Value) {
        self.properties.write().insert(name.into(), value);
    }

    pub fn shared(self) -> Arc<Self> {
        Arc::new(self)
    }
}

impl View for PlainView {
    fn el(&self) -> Element {
        self.el.clone()
    }

    fn model(&self) -> Option<Arc<dyn Model>> {
        self.model.clone()
    }

    fn state(&self) -> Option<Arc<dyn Model>> {
        self.state.clone()
    }

    fn computeds(&self) -> Option<FxHashMap<String, Computed>> {
        self.computeds.clone()
    }

    fn property(&self, name: &str) -> Option<Value> {
        self.properties.read().get(name).cloned()
    }

    fn has_method(&self, name: &str) -> bool {
        self.methods.contains_key(name)
    }

    fn call(&self, method: &str, args: &[Value]) -> Option<Result<Value>> {
        // clone out so the method may touch this view's properties
        let f = self.methods.get(method).cloned()?;
        Some(f(self, args))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::dom::Document;
    use crate::model::JsonModel;
    use serde_json::json;

    #[test]
    fn methods_receive_the_view() {
        let doc = Document::new("div");
        let view = PlainView::new(doc.root())
            .with_property("greeting", json!("hi"))
            .with_method("greet", |view, args| {
                let greeting = view.property("greeting").unwrap_or_default();
                Ok(json!(format!(
                    "{} {}",
                    greeting.as_str().unwrap_or_default(),
                    args.first().and_then(Value::as_str).unwrap_or_default()
                )))
            });

        assert!(view.has_method("greet"));
        assert!(!view.has_method("missing"));
        let result = view.call("greet", &[json!("bob")]).unwrap().unwrap();
        assert_eq!(result, json!("hi bob"));
        assert!(view.call("missing", &[]).is_none());
    }

    #[test]
    fn builder_collects_collaborators() {
        let doc = Document::new("div");
        let view = PlainView::new(doc.root())
            .with_model(JsonModel::shared(json!({"a": 1})))
            .with_computed("total", Computed::ViewMethod)
            .with_computed("double", Computed::function(|_, model| json!(model["a"].as_i64().unwrap_or(0) * 2)));

        assert_eq!(view.model().unwrap().to_json(), json!({"a": 1}));
        assert!(view.state().is_none());
        assert_eq!(view.computeds().unwrap().len(), 2);
        assert_eq!(view.el(), doc.root());
    }
}
