//! Binding registry
//!
//! Name → handler record with optional `init` and `update` slots. Built-ins
//! are registered first, caller handlers after them, so a caller handler
//! with a built-in's name replaces it.

use std::fmt;
use std::sync::Arc;

use rustc_hash::FxHashMap;

use crate::dom::Element;
use crate::handlers::BuiltinBinding;
use crate::model::Model;
use crate::session::SessionOptions;
use crate::value::BindingValue;
use crate::view::View;

/// Everything a handler may need besides its element and value
#[derive(Clone)]
pub struct HandlerContext {
    pub model: Arc<dyn Model>,
    pub view: Arc<dyn View>,
    pub options: SessionOptions,
}

/// Handler slot: element, evaluated value, context. Problems are logged,
/// never returned.
pub type HandlerFn = Arc<dyn Fn(&Element, &BindingValue, &HandlerContext) + Send + Sync>;

#[derive(Clone)]
pub struct BindingHandler {
    name: String,
    init: Option<HandlerFn>,
    update: Option<HandlerFn>,
}

impl BindingHandler {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            init: None,
            update: None,
        }
    }

    /// Runs once per element when the session is created
    pub fn with_init(
        mut self,
        f: impl Fn(&Element, &BindingValue, &HandlerContext) + Send + Sync + 'static,
    ) -> Self {
        self.init = Some(Arc::new(f));
        self
    }

    /// Runs on every pass, including the first
    pub fn with_update(
        mut self,
        f: impl Fn(&Element, &BindingValue, &HandlerContext) + Send + Sync + 'static,
    ) -> Self {
        self.update = Some(Arc::new(f));
        self
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn init(&self) -> Option<&HandlerFn> {
        self.init.as_ref()
    }

    pub fn update(&self) -> Option<&HandlerFn> {
        self.update.as_ref()
    }
}

impl fmt::Debug for BindingHandler {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("BindingHandler")
            .field("name", &self.name)
            .field("init", &self.init.is_some())
            .field("update", &self.update.is_some())
            .finish()
    }
}

/// Name-keyed handler table for one session
#[derive(Clone, Default)]
pub struct Registry {
    handlers: FxHashMap<String, BindingHandler>,
}

impl Registry {
    /// Built-in table merged with caller handlers (last registered wins)
    pub fn new(using: impl IntoIterator<Item = BindingHandler>) -> Self {
        let mut registry = Self::default();
        for builtin in BuiltinBinding::ALL {
            registry.register(builtin.handler());
        }
        for handler in using {
            registry.register(handler);
        }
        registry
    }

    /// Built-in table only
    pub fn builtin() -> Self {
        Self::new(Vec::<BindingHandler>::new())
    }

    /// Insert a handler, returning the one it replaced
    pub fn register(&mut self, handler: BindingHandler) -> Option<BindingHandler> {
        self.handlers.insert(handler.name.clone(), handler)
    }

    pub fn get(&self, name: &str) -> Option<&BindingHandler> {
        self.handlers.get(name)
    }

    pub fn contains(&self, name: &str) -> bool {
        self.handlers.contains_key(name)
    }

    pub fn len(&self) -> usize {
        self.handlers.len()
    }

    pub fn is_empty(&self) -> bool {
        self.handlers.is_empty()
    }

    /// Registered names, sorted
    pub fn names(&self) -> Vec<&str> {
        let mut names: Vec<&str> = self.handlers.keys().map(String::as_str).collect();
        names.sort_unstable();
        names
    }
}

impl fmt::Debug for Registry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Registry").field("names", &self.names()).finish()
    }
}
