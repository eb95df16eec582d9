//! Arena-backed in-memory element tree
//!
//! Nodes live in a `Vec` indexed by `NodeId`; node 0 is the root. Setting
//! text or markup content replaces the node's children, as in a browser.
//! Markup is stored opaquely and never re-parsed into nodes.

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

use once_cell::sync::Lazy;
use parking_lot::RwLock;
use regex::Regex;
use smallvec::SmallVec;

use super::tree::{Element, ElementTree, Event, EventListener, NodeId, TreeId};
use crate::discovery::clear_boundaries;
use crate::error::Result;

static NEXT_TREE_ID: AtomicU64 = AtomicU64::new(1);

static TAG_PATTERN: Lazy<Regex> = Lazy::new(|| Regex::new(r"<[^>]*>").expect("valid regex"));

/// Elements rendered without a closing tag
const VOID_TAGS: &[&str] = &["br", "hr", "img", "input", "meta", "link"];

struct Node {
    tag: String,
    parent: Option<NodeId>,
    children: Vec<NodeId>,
    attributes: SmallVec<[(String, String); 4]>,
    /// Leading text given at construction
    text: String,
    /// Content written through `set_text_content`/`set_inner_html`
    markup: Option<String>,
    /// Live form value, separate from the `value` attribute
    value: Option<String>,
    /// Live checked state, separate from the `checked` attribute
    checked: Option<bool>,
    listeners: Vec<(String, EventListener)>,
}

impl Node {
    fn new(tag: &str, parent: Option<NodeId>) -> Self {
        Self {
            tag: tag.to_ascii_lowercase(),
            parent,
            children: Vec::new(),
            attributes: SmallVec::new(),
            text: String::new(),
            markup: None,
            value: None,
            checked: None,
            listeners: Vec::new(),
        }
    }
}

/// In-memory element tree
pub struct Document {
    id: TreeId,
    nodes: RwLock<Vec<Node>>,
}

impl Document {
    /// New document whose root element has the given tag
    pub fn new(root_tag: &str) -> Arc<Self> {
        Arc::new(Self {
            id: NEXT_TREE_ID.fetch_add(1, Ordering::Relaxed),
            nodes: RwLock::new(vec![Node::new(root_tag, None)]),
        })
    }

    pub fn root_id(&self) -> NodeId {
        0
    }

    pub fn root(self: &Arc<Self>) -> Element {
        self.element(self.root_id())
    }

    pub fn element(self: &Arc<Self>, node: NodeId) -> Element {
        Element::new(Arc::clone(self) as Arc<dyn ElementTree>, node)
    }

    /// Append a new child element and return its id
    pub fn append_child(&self, parent: NodeId, tag: &str) -> NodeId {
        let mut nodes = self.nodes.write();
        let id = nodes.len();
        nodes.push(Node::new(tag, Some(parent)));
        nodes[parent].children.push(id);
        id
    }

    /// Builder-style helper: append a child with attributes
    pub fn append(&self, parent: NodeId, tag: &str, attributes: &[(&str, &str)]) -> NodeId {
        let id = self.append_child(parent, tag);
        for (name, value) in attributes {
            self.set_attribute(id, name, value);
        }
        id
    }

    /// Set the construction-time text of a node
    pub fn set_text(&self, node: NodeId, text: &str) {
        self.nodes.write()[node].text = text.to_string();
    }

    /// Find the first element (document order) whose `id` attribute matches
    pub fn find_by_id(self: &Arc<Self>, id: &str) -> Option<Element> {
        let root = self.root_id();
        std::iter::once(root)
            .chain(self.descendants(root))
            .find(|&n| self.attribute(n, "id").as_deref() == Some(id))
            .map(|n| self.element(n))
    }

    /// Deliver an event to the listeners registered on one node (no bubbling)
    pub fn dispatch_event(self: &Arc<Self>, node: NodeId, event: &Event) -> Result<()> {
        if event.kind == "click" && self.is_checkable(node) {
            self.toggle_checked(node);
        }

        let listeners: Vec<EventListener> = {
            let nodes = self.nodes.read();
            nodes[node]
                .listeners
                .iter()
                .filter(|(kind, _)| *kind == event.kind)
                .map(|(_, l)| Arc::clone(l))
                .collect()
        };

        let target = self.element(node);
        for listener in listeners {
            listener(&target, event)?;
        }
        Ok(())
    }

    /// Click default action: checkboxes flip, radios check and clear their
    /// same-name group
    fn toggle_checked(&self, node: NodeId) {
        let is_radio = self
            .attribute(node, "type")
            .is_some_and(|t| t.eq_ignore_ascii_case("radio"));
        if !is_radio {
            let checked = self.is_checked(node);
            self.set_checked(node, !checked);
            return;
        }

        if let Some(group) = self.attribute(node, "name") {
            let len = self.nodes.read().len();
            for other in (0..len).filter(|&other| other != node) {
                if self.is_checkable(other) && self.attribute(other, "name").as_deref() == Some(group.as_str()) {
                    self.set_checked(other, false);
                }
            }
        }
        self.set_checked(node, true);
    }

    /// Serialize the whole tree as markup
    pub fn render(&self) -> String {
        let nodes = self.nodes.read();
        let mut out = String::new();
        render_node(&nodes, self.root_id(), &mut out);
        out
    }

    fn detach_children(nodes: &mut [Node], node: NodeId) {
        let children = std::mem::take(&mut nodes[node].children);
        for child in children {
            nodes[child].parent = None;
        }
        nodes[node].text.clear();
    }
}

impl Drop for Document {
    fn drop(&mut self) {
        clear_boundaries(self.id);
    }
}

impl std::fmt::Debug for Document {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Document")
            .field("id", &self.id)
            .field("nodes", &self.nodes.read().len())
            .finish()
    }
}

impl ElementTree for Document {
    fn tree_id(&self) -> TreeId {
        self.id
    }

    fn parent(&self, node: NodeId) -> Option<NodeId> {
        self.nodes.read()[node].parent
    }

    fn descendants(&self, node: NodeId) -> Vec<NodeId> {
        let nodes = self.nodes.read();
        let mut out = Vec::new();
        let mut stack: Vec<NodeId> = nodes[node].children.iter().rev().copied().collect();
        while let Some(current) = stack.pop() {
            out.push(current);
            stack.extend(nodes[current].children.iter().rev().copied());
        }
        out
    }

    fn tag(&self, node: NodeId) -> String {
        self.nodes.read()[node].tag.clone()
    }

    fn attribute(&self, node: NodeId, name: &str) -> Option<String> {
        self.nodes.read()[node]
            .attributes
            .iter()
            .find(|(n, _)| n == name)
            .map(|(_, v)| v.clone())
    }

    fn set_attribute(&self, node: NodeId, name: &str, value: &str) {
        let mut nodes = self.nodes.write();
        let attributes = &mut nodes[node].attributes;
        match attributes.iter_mut().find(|(n, _)| n == name) {
            Some(entry) => entry.1 = value.to_string(),
            None => attributes.push((name.to_string(), value.to_string())),
        }
    }

    fn remove_attribute(&self, node: NodeId, name: &str) {
        self.nodes.write()[node].attributes.retain(|(n, _)| n != name);
    }

    fn text_content(&self, node: NodeId) -> String {
        let nodes = self.nodes.read();
        let mut out = String::new();
        collect_text(&nodes, node, &mut out);
        out
    }

    fn set_text_content(&self, node: NodeId, text: &str) {
        let mut nodes = self.nodes.write();
        Self::detach_children(&mut nodes, node);
        nodes[node].markup = Some(escape_html(text));
    }

    fn inner_html(&self, node: NodeId) -> String {
        let nodes = self.nodes.read();
        let mut out = String::new();
        render_children(&nodes, node, &mut out);
        out
    }

    fn set_inner_html(&self, node: NodeId, html: &str) {
        let mut nodes = self.nodes.write();
        Self::detach_children(&mut nodes, node);
        nodes[node].markup = Some(html.to_string());
    }

    fn value(&self, node: NodeId) -> String {
        let nodes = self.nodes.read();
        let n = &nodes[node];
        if let Some(value) = &n.value {
            return value.clone();
        }
        if n.tag == "textarea" {
            let mut out = String::new();
            collect_text(&nodes, node, &mut out);
            return out;
        }
        n.attributes
            .iter()
            .find(|(name, _)| name == "value")
            .map(|(_, v)| v.clone())
            .unwrap_or_default()
    }

    fn set_value(&self, node: NodeId, value: &str) {
        self.nodes.write()[node].value = Some(value.to_string());
    }

    fn is_checked(&self, node: NodeId) -> bool {
        let nodes = self.nodes.read();
        let n = &nodes[node];
        n.checked
            .unwrap_or_else(|| n.attributes.iter().any(|(name, _)| name == "checked"))
    }

    fn set_checked(&self, node: NodeId, checked: bool) {
        self.nodes.write()[node].checked = Some(checked);
    }

    fn add_event_listener(&self, node: NodeId, kind: &str, listener: EventListener) {
        self.nodes.write()[node]
            .listeners
            .push((kind.to_string(), listener));
    }
}

fn collect_text(nodes: &[Node], node: NodeId, out: &mut String) {
    let n = &nodes[node];
    if let Some(markup) = &n.markup {
        out.push_str(&unescape_html(&TAG_PATTERN.replace_all(markup, "")));
        return;
    }
    out.push_str(&n.text);
    for &child in &n.children {
        collect_text(nodes, child, out);
    }
}

fn render_children(nodes: &[Node], node: NodeId, out: &mut String) {
    let n = &nodes[node];
    if let Some(markup) = &n.markup {
        out.push_str(markup);
        return;
    }
    out.push_str(&escape_html(&n.text));
    for &child in &n.children {
        render_node(nodes, child, out);
    }
}

fn render_node(nodes: &[Node], node: NodeId, out: &mut String) {
    let n = &nodes[node];
    out.push('<');
    out.push_str(&n.tag);
    for (name, value) in &n.attributes {
        out.push(' ');
        out.push_str(name);
        if !value.is_empty() {
            out.push_str("=\"");
            out.push_str(&escape_html(value).replace('"', "&quot;"));
            out.push('"');
        }
    }
    if let Some(value) = &n.value {
        out.push_str(" data-live-value=\"");
        out.push_str(&escape_html(value).replace('"', "&quot;"));
        out.push('"');
    }
    if let Some(checked) = n.checked {
        out.push_str(if checked {
            " data-live-checked=\"true\""
        } else {
            " data-live-checked=\"false\""
        });
    }
    out.push('>');
    if VOID_TAGS.contains(&n.tag.as_str()) {
        return;
    }
    render_children(nodes, node, out);
    out.push_str("</");
    out.push_str(&n.tag);
    out.push('>');
}

fn escape_html(text: &str) -> String {
    text.replace('&', "&amp;")
        .replace('<', "&lt;")
        .replace('>', "&gt;")
}

fn unescape_html(text: &str) -> String {
    text.replace("&lt;", "<")
        .replace("&gt;", ">")
        .replace("&quot;", "\"")
        .replace("&amp;", "&")
}
