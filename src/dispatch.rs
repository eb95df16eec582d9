//! Binding dispatcher
//!
//! One pass = build scope → discover owned elements → evaluate each
//! declaration → invoke the `init` or `update` slot of every named handler.
//! A declaration that fails to parse or evaluate aborts the pass; an unknown
//! binding name only skips that pair.

use std::sync::Arc;

use tracing::{debug, instrument, warn};

use crate::discovery::discover;
use crate::error::{B3ndError, Result};
use crate::expr::evaluate_declaration;
use crate::model::Model;
use crate::registry::{HandlerContext, Registry};
use crate::scope::Scope;
use crate::session::SessionOptions;
use crate::view::View;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PassMode {
    /// Binding setup, once per session
    Init,
    /// Value application, on every re-evaluation
    Update,
}

/// Counters for one pass
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct PassStats {
    /// Owned elements carrying a declaration
    pub elements: usize,
    /// Handler slots invoked
    pub invoked: usize,
    /// Binding names missing from the registry
    pub unknown: usize,
}

#[instrument(skip_all, fields(mode = ?mode))]
pub fn run_pass(
    view: &Arc<dyn View>,
    model: &Arc<dyn Model>,
    registry: &Registry,
    options: &SessionOptions,
    mode: PassMode,
) -> Result<PassStats> {
    let scope = Scope::build(view.as_ref(), model.as_ref())?;
    let ctx = HandlerContext {
        model: Arc::clone(model),
        view: Arc::clone(view),
        options: options.clone(),
    };
    let attribute = options.config.attribute.as_str();

    let mut stats = PassStats::default();
    for el in discover(&view.el(), attribute) {
        // an earlier handler may have rewritten this element
        let Some(declaration) = el.attribute(attribute) else {
            continue;
        };
        stats.elements += 1;

        let bindings =
            evaluate_declaration(&declaration, &scope).map_err(|source| B3ndError::Declaration {
                element: el.describe(),
                declaration: declaration.clone(),
                source,
            })?;

        for (name, value) in &bindings {
            let Some(handler) = registry.get(name) else {
                warn!(binding = %name, element = %el.describe(), "undefined binding");
                stats.unknown += 1;
                continue;
            };
            let slot = match mode {
                PassMode::Init => handler.init(),
                PassMode::Update => handler.update(),
            };
            if let Some(slot) = slot {
                slot(&el, value, &ctx);
                stats.invoked += 1;
            }
        }
    }

    debug!(
        elements = stats.elements,
        invoked = stats.invoked,
        unknown = stats.unknown,
        "pass complete"
    );
    Ok(stats)
}

/// Raw update pass against an arbitrary (view, model) pair
pub fn update_pass(
    view: &Arc<dyn View>,
    model: &Arc<dyn Model>,
    registry: &Registry,
    options: &SessionOptions,
) -> Result<PassStats> {
    run_pass(view, model, registry, options, PassMode::Update)
}
