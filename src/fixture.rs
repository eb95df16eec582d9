//! YAML/JSON fixtures for the CLI
//!
//! ```yaml
//! model:
//!   title: Hello
//!   done: false
//! state:              # optional, exposed as `state`
//!   open: true
//! properties:         # optional, readable as `view.<name>`
//!   heading: Todo
//! computeds:          # optional, proxied through same-named view methods
//!   label: "3 items"
//! tree:
//!   tag: div
//!   children:
//!     - tag: h1
//!       attrs: { data-model-bind: "text: model.title" }
//!     - tag: input
//!       attrs: { type: checkbox, data-model-bind: "css: {done: model.done}" }
//! ```

use std::path::Path;
use std::sync::Arc;

use serde::Deserialize;
use serde_json::{Map, Value};

use crate::dom::{Document, ElementTree, NodeId};
use crate::error::{B3ndError, Result};
use crate::model::JsonModel;
use crate::value::json_to_js_string;
use crate::view::{Computed, PlainView};

#[derive(Debug, Clone, Deserialize)]
pub struct Fixture {
    #[serde(default)]
    pub model: Value,
    #[serde(default)]
    pub state: Option<Value>,
    #[serde(default)]
    pub properties: Map<String, Value>,
    #[serde(default)]
    pub computeds: Map<String, Value>,
    pub tree: NodeSpec,
}

#[derive(Debug, Clone, Deserialize)]
pub struct NodeSpec {
    pub tag: String,
    #[serde(default)]
    pub attrs: Map<String, Value>,
    #[serde(default)]
    pub text: Option<String>,
    #[serde(default)]
    pub children: Vec<NodeSpec>,
}

/// Live objects built from a fixture
pub struct Built {
    pub document: Arc<Document>,
    pub view: Arc<PlainView>,
    pub model: Arc<JsonModel>,
    pub state: Option<Arc<JsonModel>>,
}

impl Fixture {
    pub fn from_path(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path)?;
        Self::parse(&content)
    }

    /// YAML is a superset of JSON, so both parse here
    pub fn parse(content: &str) -> Result<Self> {
        let fixture: Self = serde_yaml::from_str(content)?;
        fixture.validate()?;
        Ok(fixture)
    }

    fn validate(&self) -> Result<()> {
        if !matches!(self.model, Value::Object(_) | Value::Null) {
            return Err(B3ndError::Fixture {
                reason: "`model` must be a mapping".to_string(),
            });
        }
        if matches!(&self.state, Some(state) if !state.is_object()) {
            return Err(B3ndError::Fixture {
                reason: "`state` must be a mapping".to_string(),
            });
        }
        validate_node(&self.tree)
    }

    pub fn build(&self) -> Built {
        let document = Document::new(&self.tree.tag);
        populate(&document, document.root_id(), &self.tree);

        let model = JsonModel::shared(self.model.clone());
        let state = self.state.clone().map(JsonModel::shared);

        let mut view = PlainView::new(document.root()).with_model(model.clone());
        if let Some(state) = &state {
            view = view.with_state(state.clone());
        }
        for (name, value) in &self.properties {
            view = view.with_property(name.clone(), value.clone());
        }
        for (name, value) in &self.computeds {
            let value = value.clone();
            view = view
                .with_computed(name.clone(), Computed::ViewMethod)
                .with_method(name.clone(), move |_, _| Ok(value.clone()));
        }

        Built {
            document,
            view: view.shared(),
            model,
            state,
        }
    }
}

fn validate_node(node: &NodeSpec) -> Result<()> {
    if node.tag.trim().is_empty() || !node.tag.chars().all(|c| c.is_ascii_alphanumeric() || c == '-') {
        return Err(B3ndError::Fixture {
            reason: format!("invalid tag name '{}'", node.tag),
        });
    }
    node.children.iter().try_for_each(validate_node)
}

fn populate(document: &Document, id: NodeId, spec: &NodeSpec) {
    let attributes: Vec<(String, String)> = spec
        .attrs
        .iter()
        .map(|(name, value)| (name.clone(), json_to_js_string(value)))
        .collect();
    for (name, value) in &attributes {
        document.set_attribute(id, name, value);
    }
    if let Some(text) = &spec.text {
        document.set_text(id, text);
    }
    for child in &spec.children {
        let child_id = document.append_child(id, &child.tag);
        populate(document, child_id, child);
    }
}
