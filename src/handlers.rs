//! Built-in binding handlers
//!
//! | name | slot | effect |
//! |---|---|---|
//! | `click` | init | click listener calling the declared view method |
//! | `prop` / `attr` / `style` | update | set each (attribute, value) pair |
//! | `css` | update | add/remove each class by truthiness |
//! | `visible` | update | `display: none` when falsy |
//! | `hidden` | update | `visibility: hidden` when falsy |
//! | `textarea` | init | debounced keyup write-back of the value |
//! | `text` / `html` | update | text / markup content |
//! | `val` | update | form value (unchecked radio/checkbox: warn, skip) |
//! | `contenteditable` | init | write back text or markup on change/keyup/keydown |
//! | `contenteditablePlaintext` | init | same, always text |
//! | `modelval` | init | change write-back of the value |
//!
//! Write-back handlers take the model key path as their value.

use std::sync::Arc;
use std::time::Duration;

use once_cell::sync::Lazy;
use regex::Regex;
use serde_json::Value;
use smallvec::{smallvec, SmallVec};
use tracing::{error, warn};

use crate::dom::{Element, Event};
use crate::registry::{BindingHandler, HandlerContext};
use crate::scheduler::Debouncer;
use crate::value::{json_to_js_string, json_truthy, BindingValue};

static PLAINTEXT_MODE: Lazy<Regex> = Lazy::new(|| Regex::new(r"^plaintext").expect("valid regex"));

/// Events that trigger content write-back
type EventNames = SmallVec<[&'static str; 3]>;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum BuiltinBinding {
    Click,
    Prop,
    Attr,
    Style,
    Css,
    Visible,
    Hidden,
    Textarea,
    Text,
    Html,
    Val,
    Contenteditable,
    ContenteditablePlaintext,
    Modelval,
}

impl BuiltinBinding {
    pub const ALL: [BuiltinBinding; 14] = [
        Self::Click,
        Self::Prop,
        Self::Attr,
        Self::Style,
        Self::Css,
        Self::Visible,
        Self::Hidden,
        Self::Textarea,
        Self::Text,
        Self::Html,
        Self::Val,
        Self::Contenteditable,
        Self::ContenteditablePlaintext,
        Self::Modelval,
    ];

    pub fn name(&self) -> &'static str {
        match self {
            Self::Click => "click",
            Self::Prop => "prop",
            Self::Attr => "attr",
            Self::Style => "style",
            Self::Css => "css",
            Self::Visible => "visible",
            Self::Hidden => "hidden",
            Self::Textarea => "textarea",
            Self::Text => "text",
            Self::Html => "html",
            Self::Val => "val",
            Self::Contenteditable => "contenteditable",
            Self::ContenteditablePlaintext => "contenteditablePlaintext",
            Self::Modelval => "modelval",
        }
    }

    pub fn from_name(name: &str) -> Option<Self> {
        Self::ALL.into_iter().find(|b| b.name() == name)
    }

    /// Handler record for the registry
    pub fn handler(&self) -> BindingHandler {
        let handler = BindingHandler::new(self.name());
        match self {
            Self::Click => handler.with_init(click),
            Self::Prop | Self::Attr | Self::Style => handler.with_update(attributes),
            Self::Css => handler.with_update(css),
            Self::Visible => handler.with_update(visible),
            Self::Hidden => handler.with_update(hidden),
            Self::Textarea => handler.with_init(textarea),
            Self::Text => handler.with_update(|el, value, _| el.set_text_content(&value.to_content_string())),
            Self::Html => handler.with_update(|el, value, _| el.set_inner_html(&value.to_content_string())),
            Self::Val => handler.with_update(val),
            Self::Contenteditable => handler.with_init(|el, value, ctx| {
                let mode = el.attribute("contenteditable").unwrap_or_default();
                content_write_back(el, value, ctx, PLAINTEXT_MODE.is_match(&mode));
            }),
            Self::ContenteditablePlaintext => {
                handler.with_init(|el, value, ctx| content_write_back(el, value, ctx, true))
            }
            Self::Modelval => handler.with_init(modelval),
        }
    }
}

// ═══════════════════════════════════════════
// ONE-WAY (update)
// ═══════════════════════════════════════════

fn attributes(el: &Element, value: &BindingValue, _: &HandlerContext) {
    let Some(pairs) = object_value(el, value, "attribute map") else {
        return;
    };
    for (name, attr_value) in pairs {
        el.set_attribute(name, &json_to_js_string(attr_value));
    }
}

fn css(el: &Element, value: &BindingValue, _: &HandlerContext) {
    let Some(classes) = object_value(el, value, "class map") else {
        return;
    };
    for (class, flag) in classes {
        if json_truthy(flag) {
            el.add_class(class);
        } else {
            el.remove_class(class);
        }
    }
}

fn visible(el: &Element, value: &BindingValue, _: &HandlerContext) {
    el.set_style("display", if value.is_truthy() { "" } else { "none" });
}

fn hidden(el: &Element, value: &BindingValue, _: &HandlerContext) {
    el.set_style(
        "visibility",
        if value.is_truthy() { "visible" } else { "hidden" },
    );
}

fn val(el: &Element, value: &BindingValue, _: &HandlerContext) {
    if el.is_checkable() && !el.is_checked() {
        warn!(element = %el.describe(), "val binding for unchecked checkable elements is not supported");
        return;
    }
    el.set_value(&value.to_content_string());
}

/// Object-valued bindings; undefined/null are silently ignored
fn object_value<'v>(
    el: &Element,
    value: &'v BindingValue,
    what: &str,
) -> Option<&'v serde_json::Map<String, Value>> {
    match value {
        BindingValue::Undefined | BindingValue::Json(Value::Null) => None,
        other => {
            let map = other.as_object();
            if map.is_none() {
                warn!(
                    element = %el.describe(),
                    found = other.type_name(),
                    "expected an object ({what})"
                );
            }
            map
        }
    }
}

// ═══════════════════════════════════════════
// LISTENERS (init)
// ═══════════════════════════════════════════

fn click(el: &Element, value: &BindingValue, ctx: &HandlerContext) {
    let Some(method) = value.as_method() else {
        warn!(
            element = %el.describe(),
            found = value.type_name(),
            "click binding expects a view method"
        );
        return;
    };

    let method = method.to_string();
    let view = Arc::clone(&ctx.view);
    el.add_event_listener(
        "click",
        Arc::new(move |_, event: &Event| {
            let mut args = Vec::with_capacity(event.args.len() + 1);
            args.push(event.to_json());
            args.extend(event.args.iter().cloned());
            match view.call(&method, &args) {
                Some(result) => result.map(|_| ()),
                None => {
                    warn!(method = %method, "click handler no longer exists on the view");
                    Ok(())
                }
            }
        }),
    );
}

fn textarea(el: &Element, value: &BindingValue, ctx: &HandlerContext) {
    let Some(key) = key_path(el, value, "textarea") else {
        return;
    };

    let delay = Duration::from_millis(ctx.options.config.debounce_ms);
    let debouncer = Arc::new(Debouncer::new(Arc::clone(&ctx.options.scheduler), delay));
    let model = Arc::clone(&ctx.model);

    el.add_event_listener(
        "keyup",
        Arc::new(move |target, _| {
            let model = Arc::clone(&model);
            let target = target.clone();
            let key = key.clone();
            debouncer.trigger(Box::new(move || {
                // deferred: nobody is left to receive the error
                if let Err(e) = model.set(&key, Value::String(target.value())) {
                    error!(key = %key, error = %e, "debounced write-back failed");
                }
            }));
            Ok(())
        }),
    );
}

fn modelval(el: &Element, value: &BindingValue, ctx: &HandlerContext) {
    let Some(key) = key_path(el, value, "modelval") else {
        return;
    };
    let model = Arc::clone(&ctx.model);
    el.add_event_listener(
        "change",
        Arc::new(move |target, _| model.set(&key, Value::String(target.value()))),
    );
}

fn content_write_back(el: &Element, value: &BindingValue, ctx: &HandlerContext, plaintext: bool) {
    let Some(key) = key_path(el, value, "contenteditable") else {
        return;
    };

    let events: EventNames = smallvec!["change", "keyup", "keydown"];
    let model = Arc::clone(&ctx.model);
    let listener: crate::dom::EventListener = Arc::new(move |target, _| {
        let content = if plaintext {
            target.text_content()
        } else {
            target.inner_html()
        };
        model.set(&key, Value::String(content))
    });
    for event in events {
        el.add_event_listener(event, Arc::clone(&listener));
    }
}

fn key_path(el: &Element, value: &BindingValue, binding: &str) -> Option<String> {
    let key = value.as_str().map(str::to_string);
    if key.is_none() {
        warn!(
            element = %el.describe(),
            found = value.type_name(),
            "{binding} binding expects a model key path string"
        );
    }
    key
}
