//! Element tree collaborator
//!
//! `ElementTree` is the host-side primitive set the engine needs (query,
//! attribute/class/style mutation, content, form state, listeners).
//! Classes and inline styles have default implementations on top of the
//! `class` and `style` attributes. `Element` is the cloneable handle handed
//! to binding handlers.

use std::fmt;
use std::sync::Arc;

use serde_json::{json, Value};

use crate::error::Result;

pub type NodeId = usize;

/// Process-unique identity of one tree
pub type TreeId = u64;

/// DOM-like event delivered to element listeners
#[derive(Debug, Clone, PartialEq)]
pub struct Event {
    pub kind: String,
    pub detail: Value,
    /// Extra call arguments forwarded by `click` after the event itself
    pub args: Vec<Value>,
}

impl Event {
    pub fn new(kind: impl Into<String>) -> Self {
        Self {
            kind: kind.into(),
            detail: Value::Null,
            args: Vec::new(),
        }
    }

    pub fn with_detail(mut self, detail: Value) -> Self {
        self.detail = detail;
        self
    }

    pub fn with_args(mut self, args: Vec<Value>) -> Self {
        self.args = args;
        self
    }

    /// JSON form passed to view methods
    pub fn to_json(&self) -> Value {
        json!({ "type": self.kind, "detail": self.detail })
    }
}

pub type EventListener = Arc<dyn Fn(&Element, &Event) -> Result<()> + Send + Sync>;

pub trait ElementTree: Send + Sync {
    fn tree_id(&self) -> TreeId;

    fn parent(&self, node: NodeId) -> Option<NodeId>;

    /// All descendants of `node` in document order, excluding `node`
    fn descendants(&self, node: NodeId) -> Vec<NodeId>;

    fn tag(&self, node: NodeId) -> String;

    fn attribute(&self, node: NodeId, name: &str) -> Option<String>;

    fn set_attribute(&self, node: NodeId, name: &str, value: &str);

    fn remove_attribute(&self, node: NodeId, name: &str);

    fn text_content(&self, node: NodeId) -> String;

    fn set_text_content(&self, node: NodeId, text: &str);

    fn inner_html(&self, node: NodeId) -> String;

    fn set_inner_html(&self, node: NodeId, html: &str);

    /// Current form value (property, falling back to the `value` attribute)
    fn value(&self, node: NodeId) -> String;

    fn set_value(&self, node: NodeId, value: &str);

    fn add_event_listener(&self, node: NodeId, kind: &str, listener: EventListener);

    fn is_checkable(&self, node: NodeId) -> bool {
        self.tag(node).eq_ignore_ascii_case("input")
            && self
                .attribute(node, "type")
                .is_some_and(|t| t.eq_ignore_ascii_case("radio") || t.eq_ignore_ascii_case("checkbox"))
    }

    /// Live checked state; trees without one read the `checked` attribute
    fn is_checked(&self, node: NodeId) -> bool {
        self.attribute(node, "checked").is_some()
    }

    fn set_checked(&self, node: NodeId, checked: bool) {
        if checked {
            self.set_attribute(node, "checked", "");
        } else {
            self.remove_attribute(node, "checked");
        }
    }

    fn classes(&self, node: NodeId) -> Vec<String> {
        self.attribute(node, "class")
            .map(|c| c.split_whitespace().map(str::to_string).collect())
            .unwrap_or_default()
    }

    fn add_class(&self, node: NodeId, class: &str) {
        let mut classes = self.classes(node);
        if !classes.iter().any(|c| c == class) {
            classes.push(class.to_string());
            self.set_attribute(node, "class", &classes.join(" "));
        }
    }

    fn remove_class(&self, node: NodeId, class: &str) {
        let mut classes = self.classes(node);
        let before = classes.len();
        classes.retain(|c| c != class);
        if classes.len() != before {
            self.set_attribute(node, "class", &classes.join(" "));
        }
    }

    fn style(&self, node: NodeId, property: &str) -> Option<String> {
        parse_style(&self.attribute(node, "style").unwrap_or_default())
            .into_iter()
            .find(|(name, _)| name == property)
            .map(|(_, value)| value)
    }

    /// Set one inline style property; an empty value removes it
    fn set_style(&self, node: NodeId, property: &str, value: &str) {
        let mut declarations = parse_style(&self.attribute(node, "style").unwrap_or_default());
        match declarations.iter_mut().find(|(name, _)| name == property) {
            Some(entry) if !value.is_empty() => entry.1 = value.to_string(),
            Some(_) => declarations.retain(|(name, _)| name != property),
            None if !value.is_empty() => declarations.push((property.to_string(), value.to_string())),
            None => return,
        }
        if declarations.is_empty() {
            self.remove_attribute(node, "style");
        } else {
            let style = declarations
                .iter()
                .map(|(name, value)| format!("{name}: {value}"))
                .collect::<Vec<_>>()
                .join("; ");
            self.set_attribute(node, "style", &style);
        }
    }

    /// Short description for diagnostics, e.g. `input#name.wide`
    fn describe(&self, node: NodeId) -> String {
        let mut out = self.tag(node);
        if let Some(id) = self.attribute(node, "id") {
            out.push('#');
            out.push_str(&id);
        }
        for class in self.classes(node) {
            out.push('.');
            out.push_str(&class);
        }
        out
    }
}

fn parse_style(style: &str) -> Vec<(String, String)> {
    style
        .split(';')
        .filter_map(|decl| {
            let (name, value) = decl.split_once(':')?;
            let name = name.trim();
            (!name.is_empty()).then(|| (name.to_string(), value.trim().to_string()))
        })
        .collect()
}

/// Handle to one node of an element tree
#[derive(Clone)]
pub struct Element {
    tree: Arc<dyn ElementTree>,
    node: NodeId,
}

impl Element {
    pub fn new(tree: Arc<dyn ElementTree>, node: NodeId) -> Self {
        Self { tree, node }
    }

    pub fn node_id(&self) -> NodeId {
        self.node
    }

    pub fn tree_id(&self) -> TreeId {
        self.tree.tree_id()
    }

    /// Another node of the same tree
    pub fn sibling_handle(&self, node: NodeId) -> Element {
        Element::new(Arc::clone(&self.tree), node)
    }

    pub fn parent(&self) -> Option<Element> {
        self.tree.parent(self.node).map(|p| self.sibling_handle(p))
    }

    pub fn descendants(&self) -> Vec<Element> {
        self.tree
            .descendants(self.node)
            .into_iter()
            .map(|n| self.sibling_handle(n))
            .collect()
    }

    pub fn tag(&self) -> String {
        self.tree.tag(self.node)
    }

    pub fn attribute(&self, name: &str) -> Option<String> {
        self.tree.attribute(self.node, name)
    }

    pub fn has_attribute(&self, name: &str) -> bool {
        self.attribute(name).is_some()
    }

    pub fn set_attribute(&self, name: &str, value: &str) {
        self.tree.set_attribute(self.node, name, value);
    }

    pub fn remove_attribute(&self, name: &str) {
        self.tree.remove_attribute(self.node, name);
    }

    pub fn classes(&self) -> Vec<String> {
        self.tree.classes(self.node)
    }

    pub fn has_class(&self, class: &str) -> bool {
        self.classes().iter().any(|c| c == class)
    }

    pub fn add_class(&self, class: &str) {
        self.tree.add_class(self.node, class);
    }

    pub fn remove_class(&self, class: &str) {
        self.tree.remove_class(self.node, class);
    }

    pub fn style(&self, property: &str) -> Option<String> {
        self.tree.style(self.node, property)
    }

    pub fn set_style(&self, property: &str, value: &str) {
        self.tree.set_style(self.node, property, value);
    }

    pub fn text_content(&self) -> String {
        self.tree.text_content(self.node)
    }

    pub fn set_text_content(&self, text: &str) {
        self.tree.set_text_content(self.node, text);
    }

    pub fn inner_html(&self) -> String {
        self.tree.inner_html(self.node)
    }

    pub fn set_inner_html(&self, html: &str) {
        self.tree.set_inner_html(self.node, html);
    }

    pub fn value(&self) -> String {
        self.tree.value(self.node)
    }

    pub fn set_value(&self, value: &str) {
        self.tree.set_value(self.node, value);
    }

    pub fn is_checkable(&self) -> bool {
        self.tree.is_checkable(self.node)
    }

    pub fn is_checked(&self) -> bool {
        self.tree.is_checked(self.node)
    }

    pub fn set_checked(&self, checked: bool) {
        self.tree.set_checked(self.node, checked);
    }

    pub fn add_event_listener(&self, kind: &str, listener: EventListener) {
        self.tree.add_event_listener(self.node, kind, listener);
    }

    pub fn describe(&self) -> String {
        self.tree.describe(self.node)
    }
}

impl PartialEq for Element {
    fn eq(&self, other: &Self) -> bool {
        self.node == other.node && self.tree_id() == other.tree_id()
    }
}

impl Eq for Element {}

impl fmt::Debug for Element {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Element({} @{}:{})", self.describe(), self.tree_id(), self.node)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_inline_style() {
        assert_eq!(
            parse_style("display: none; color:red;;"),
            vec![
                ("display".to_string(), "none".to_string()),
                ("color".to_string(), "red".to_string()),
            ]
        );
        assert!(parse_style("").is_empty());
    }

    #[test]
    fn event_json_carries_type_and_detail() {
        let event = Event::new("click").with_detail(json!({"x": 1}));
        assert_eq!(event.to_json(), json!({"type": "click", "detail": {"x": 1}}));
    }
}
