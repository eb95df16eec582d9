//! Per-pass evaluation scope
//!
//! Exposes exactly four names to declarations: `model`, `view`, `state`
//! and `computed`. Built fresh for every pass and dropped at its end.

use serde_json::{Map, Value};
use tracing::debug;

use crate::error::{B3ndError, Result};
use crate::expr::{Environment, Operand};
use crate::model::Model;
use crate::view::{Computed, View};

pub struct Scope<'a> {
    model: Value,
    view: &'a dyn View,
    state: Option<Value>,
    computed: Option<Value>,
}

impl<'a> Scope<'a> {
    /// Snapshot model and state, then evaluate every computed definition
    pub fn build(view: &'a dyn View, model: &dyn Model) -> Result<Self> {
        let model = model.to_json();
        let state = view.state().map(|s| s.to_json());

        let computed = match view.computeds() {
            Some(definitions) => {
                let mut values = Map::new();
                for (name, definition) in definitions {
                    let value = match definition {
                        Computed::Function(f) => f(view, &model),
                        Computed::ViewMethod => match view.call(&name, std::slice::from_ref(&model)) {
                            Some(result) => result?,
                            None => return Err(B3ndError::ComputedNotFound { name }),
                        },
                    };
                    values.insert(name, value);
                }
                debug!(count = values.len(), "computeds evaluated");
                Some(Value::Object(values))
            }
            None => None,
        };

        Ok(Self {
            model,
            view,
            state,
            computed,
        })
    }

    pub fn model(&self) -> &Value {
        &self.model
    }

    pub fn state(&self) -> Option<&Value> {
        self.state.as_ref()
    }

    pub fn computed(&self) -> Option<&Value> {
        self.computed.as_ref()
    }
}

fn optional(value: &Option<Value>) -> Operand {
    value.clone().map_or(Operand::Undefined, Operand::Json)
}

impl Environment for Scope<'_> {
    fn lookup(&self, name: &str) -> Option<Operand> {
        match name {
            "model" => Some(Operand::Json(self.model.clone())),
            "view" => Some(Operand::View),
            "state" => Some(optional(&self.state)),
            "computed" => Some(optional(&self.computed)),
            _ => None,
        }
    }

    fn view_member(&self, name: &str) -> Operand {
        if let Some(value) = self.view.property(name) {
            Operand::Json(value)
        } else if self.view.has_method(name) {
            Operand::Method(name.to_string())
        } else {
            Operand::Undefined
        }
    }

    fn call_view(&self, method: &str, args: &[Value]) -> Option<std::result::Result<Value, String>> {
        self.view
            .call(method, args)
            .map(|result| result.map_err(|e| e.to_string()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::dom::Document;
    use crate::expr::evaluate_declaration;
    use crate::model::JsonModel;
    use crate::value::BindingValue;
    use crate::view::PlainView;
    use serde_json::json;

    #[test]
    fn exposes_model_and_leaves_state_undefined() {
        let doc = Document::new("div");
        let view = PlainView::new(doc.root());
        let model = JsonModel::new(json!({"title": "t"}));

        let scope = Scope::build(&view, &model).unwrap();
        assert_eq!(scope.model(), &json!({"title": "t"}));
        assert!(scope.state().is_none());
        assert!(scope.computed().is_none());
        assert_eq!(scope.lookup("state"), Some(Operand::Undefined));
        assert_eq!(scope.lookup("window"), None);
    }

    #[test]
    fn computed_functions_receive_serialized_model() {
        let doc = Document::new("div");
        let view = PlainView::new(doc.root()).with_computed(
            "total",
            Computed::function(|_, model| json!(model["a"].as_i64().unwrap_or(0) + model["b"].as_i64().unwrap_or(0))),
        );
        let model = JsonModel::new(json!({"a": 2, "b": 3}));

        let scope = Scope::build(&view, &model).unwrap();
        assert_eq!(scope.computed(), Some(&json!({"total": 5})));
    }

    #[test]
    fn view_method_marker_proxies_to_method() {
        let doc = Document::new("div");
        let view = PlainView::new(doc.root())
            .with_computed("label", Computed::ViewMethod)
            .with_method("label", |_, args| {
                Ok(json!(format!("#{}", args[0]["id"])))
            });
        let model = JsonModel::new(json!({"id": 7}));

        let scope = Scope::build(&view, &model).unwrap();
        let bindings = evaluate_declaration("text: computed.label", &scope).unwrap();
        assert_eq!(bindings[0].1, BindingValue::Json(json!("#7")));
    }

    #[test]
    fn view_method_marker_without_method_fails() {
        let doc = Document::new("div");
        let view = PlainView::new(doc.root()).with_computed("ghost", Computed::ViewMethod);
        let model = JsonModel::default();

        let err = Scope::build(&view, &model).err().unwrap();
        assert!(matches!(err, B3ndError::ComputedNotFound { ref name } if name == "ghost"));
    }

    #[test]
    fn view_members_resolve_properties_then_methods() {
        let doc = Document::new("div");
        let view = PlainView::new(doc.root())
            .with_property("title", json!("Page"))
            .with_method("save", |_, _| Ok(Value::Null));
        let model = JsonModel::default();
        let scope = Scope::build(&view, &model).unwrap();

        assert_eq!(scope.view_member("title"), Operand::Json(json!("Page")));
        assert_eq!(scope.view_member("save"), Operand::Method("save".to_string()));
        assert_eq!(scope.view_member("nope"), Operand::Undefined);
    }
}
