//! b3nd - declarative attribute-driven data binding
//!
//! Elements carry a declaration such as
//! `data-model-bind="text: model.title, css: {active: model.isActive}"`.
//! A session evaluates every declaration under a view's root against the
//! model, view, state and computed values, dispatches each (name, value)
//! pair to a named handler, and re-runs the whole pass on every change.

pub mod config;
pub mod discovery;
pub mod dispatch;
pub mod dom;
pub mod error;
pub mod expr;
pub mod fixture;
pub mod handlers;
pub mod model;
pub mod registry;
pub mod scheduler;
pub mod scope;
pub mod session;
pub mod value;
pub mod view;

pub use config::BindConfig;
pub use dispatch::{run_pass, update_pass, PassMode, PassStats};
pub use dom::{Document, Element, ElementTree, Event};
pub use error::{B3ndError, FixSuggestion, Result};
pub use handlers::BuiltinBinding;
pub use model::{ChangeEvent, JsonModel, Model};
pub use registry::{BindingHandler, HandlerContext, Registry};
pub use scheduler::{ManualScheduler, Scheduler, TokioScheduler};
pub use session::{bind, BindExt, BindOptions, Binder, Session, SessionOptions, SessionPhase};
pub use value::BindingValue;
pub use view::{Computed, PlainView, View};
