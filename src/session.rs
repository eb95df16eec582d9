//! Reactive lifecycle controller
//!
//! A session binds one view to one model:
//! `Unattached` → (init pass, update pass, subscribe) → `Active` →
//! (`unbind`) → `Detached`.
//!
//! Subscriptions keep the session alive; the caller owns its lifetime and
//! releases it with [`Session::unbind`].

use std::fmt;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

use parking_lot::{Mutex, ReentrantMutex, RwLock};
use smallvec::SmallVec;
use tracing::{debug, info};

use crate::config::BindConfig;
use crate::dispatch::{run_pass, PassMode, PassStats};
use crate::error::{B3ndError, Result};
use crate::model::{ChangeEvent, Listener, Model, SubscriptionId};
use crate::registry::{BindingHandler, Registry};
use crate::scheduler::{Scheduler, TokioScheduler};
use crate::view::View;

static NEXT_SESSION_ID: AtomicU64 = AtomicU64::new(1);

// ═══════════════════════════════════════════
// OPTIONS
// ═══════════════════════════════════════════

/// Options accepted by the entry points
#[derive(Default)]
pub struct BindOptions {
    /// Extra handlers merged over the built-ins
    pub using: Vec<BindingHandler>,
    /// Also re-evaluate on nested model changes
    pub nested: bool,
    pub config: BindConfig,
    /// Timer capability; defaults to a `TokioScheduler` on the current
    /// runtime or the shared timer runtime
    pub scheduler: Option<Arc<dyn Scheduler>>,
}

impl BindOptions {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn using(mut self, handler: BindingHandler) -> Self {
        self.using.push(handler);
        self
    }

    pub fn using_all(mut self, handlers: impl IntoIterator<Item = BindingHandler>) -> Self {
        self.using.extend(handlers);
        self
    }

    pub fn nested(mut self, nested: bool) -> Self {
        self.nested = nested;
        self
    }

    pub fn config(mut self, config: BindConfig) -> Self {
        self.config = config;
        self
    }

    pub fn scheduler(mut self, scheduler: Arc<dyn Scheduler>) -> Self {
        self.scheduler = Some(scheduler);
        self
    }
}

/// Session options: everything but `using`, with the scheduler resolved
#[derive(Clone)]
pub struct SessionOptions {
    pub nested: bool,
    pub config: BindConfig,
    pub scheduler: Arc<dyn Scheduler>,
}

impl fmt::Debug for SessionOptions {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("SessionOptions")
            .field("nested", &self.nested)
            .field("config", &self.config)
            .finish_non_exhaustive()
    }
}

// ═══════════════════════════════════════════
// SESSION
// ═══════════════════════════════════════════

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SessionPhase {
    Unattached,
    Active,
    Detached,
}

struct SessionInner {
    id: u64,
    view: Arc<dyn View>,
    model: Arc<dyn Model>,
    registry: Registry,
    options: SessionOptions,
    phase: RwLock<SessionPhase>,
    subscriptions: Mutex<SmallVec<[(Arc<dyn Model>, SubscriptionId); 3]>>,
    /// Held for a whole pass; re-entrant for writes made from inside one
    pass_guard: ReentrantMutex<()>,
}

impl SessionInner {
    fn pass(&self, mode: PassMode) -> Result<PassStats> {
        let _guard = self.pass_guard.lock();
        run_pass(&self.view, &self.model, &self.registry, &self.options, mode)
    }

    fn on_change(&self, event: &ChangeEvent) -> Result<()> {
        if *self.phase.read() != SessionPhase::Active {
            return Ok(());
        }
        debug!(session = self.id, event = event.as_str(), "re-evaluating bindings");
        self.pass(PassMode::Update).map(|_| ())
    }
}

/// Live binding between a view and a model
#[derive(Clone)]
pub struct Session {
    inner: Arc<SessionInner>,
}

impl Session {
    fn create(view: Arc<dyn View>, model: Arc<dyn Model>, options: BindOptions) -> Result<Self> {
        let BindOptions {
            using,
            nested,
            config,
            scheduler,
        } = options;
        let scheduler: Arc<dyn Scheduler> = match scheduler {
            Some(scheduler) => scheduler,
            None => Arc::new(TokioScheduler::new()?),
        };

        let session = Self {
            inner: Arc::new(SessionInner {
                id: NEXT_SESSION_ID.fetch_add(1, Ordering::Relaxed),
                view,
                model,
                registry: Registry::new(using),
                options: SessionOptions {
                    nested,
                    config,
                    scheduler,
                },
                phase: RwLock::new(SessionPhase::Unattached),
                subscriptions: Mutex::new(SmallVec::new()),
                pass_guard: ReentrantMutex::new(()),
            }),
        };
        info!(
            session = session.id(),
            root = %session.inner.view.el().describe(),
            "binding view"
        );

        // a failing pass leaves nothing subscribed
        session.inner.pass(PassMode::Init)?;
        session.inner.pass(PassMode::Update)?;
        session.subscribe();
        Ok(session)
    }

    fn subscribe(&self) {
        let inner = Arc::clone(&self.inner);
        let listener: Listener = Arc::new(move |event| inner.on_change(event));

        let mut subscriptions = self.inner.subscriptions.lock();
        let model = &self.inner.model;
        subscriptions.push((
            Arc::clone(model),
            model.on(ChangeEvent::Change, Arc::clone(&listener)),
        ));
        if self.inner.options.nested {
            subscriptions.push((
                Arc::clone(model),
                model.on(ChangeEvent::NestedChange, Arc::clone(&listener)),
            ));
        }
        if let Some(state) = self.inner.view.state() {
            let id = state.on(ChangeEvent::Change, listener);
            subscriptions.push((state, id));
        }
        *self.inner.phase.write() = SessionPhase::Active;
    }

    /// Manual full re-synchronization
    pub fn force_update(&self) -> Result<PassStats> {
        if self.phase() == SessionPhase::Detached {
            return Err(B3ndError::SessionDetached { id: self.id() });
        }
        self.inner.pass(PassMode::Update)
    }

    /// Remove every subscription; idempotent
    pub fn unbind(&self) {
        *self.inner.phase.write() = SessionPhase::Detached;
        let subscriptions = std::mem::take(&mut *self.inner.subscriptions.lock());
        if subscriptions.is_empty() {
            return;
        }
        for (source, id) in subscriptions {
            source.off(id);
        }
        info!(session = self.id(), "unbound");
    }

    pub fn id(&self) -> u64 {
        self.inner.id
    }

    pub fn phase(&self) -> SessionPhase {
        *self.inner.phase.read()
    }

    pub fn view(&self) -> &Arc<dyn View> {
        &self.inner.view
    }

    pub fn model(&self) -> &Arc<dyn Model> {
        &self.inner.model
    }

    /// The session's registry
    pub fn b3ndings(&self) -> &Registry {
        &self.inner.registry
    }

    pub fn options(&self) -> &SessionOptions {
        &self.inner.options
    }
}

impl fmt::Debug for Session {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Session")
            .field("id", &self.id())
            .field("phase", &self.phase())
            .field("b3ndings", &self.inner.registry)
            .field("options", &self.inner.options)
            .finish()
    }
}

// ═══════════════════════════════════════════
// ENTRY POINTS
// ═══════════════════════════════════════════

/// Bind `view` to `model` (or to `view.model()` when `None`)
pub fn bind(view: Arc<dyn View>, model: Option<Arc<dyn Model>>, options: BindOptions) -> Result<Session> {
    let model = model.or_else(|| view.model()).ok_or(B3ndError::MissingModel)?;
    Session::create(view, model, options)
}

/// Builder over [`bind`]
pub struct Binder {
    view: Arc<dyn View>,
    model: Option<Arc<dyn Model>>,
    options: BindOptions,
}

impl Binder {
    pub fn new(view: Arc<dyn View>) -> Self {
        Self {
            view,
            model: None,
            options: BindOptions::default(),
        }
    }

    pub fn model(mut self, model: Arc<dyn Model>) -> Self {
        self.model = Some(model);
        self
    }

    pub fn using(mut self, handler: BindingHandler) -> Self {
        self.options = self.options.using(handler);
        self
    }

    pub fn using_all(mut self, handlers: impl IntoIterator<Item = BindingHandler>) -> Self {
        self.options = self.options.using_all(handlers);
        self
    }

    pub fn nested(mut self, nested: bool) -> Self {
        self.options.nested = nested;
        self
    }

    pub fn scheduler(mut self, scheduler: Arc<dyn Scheduler>) -> Self {
        self.options.scheduler = Some(scheduler);
        self
    }

    pub fn config(mut self, config: BindConfig) -> Self {
        self.options.config = config;
        self
    }

    pub fn bind(self) -> Result<Session> {
        bind(self.view, self.model, self.options)
    }
}

/// `view.b3nd()`: bind with the view as receiver
pub trait BindExt {
    fn b3nd(&self) -> Result<Session>;

    fn b3nd_with(&self, model: Option<Arc<dyn Model>>, options: BindOptions) -> Result<Session>;
}

impl<V: View + 'static> BindExt for Arc<V> {
    fn b3nd(&self) -> Result<Session> {
        self.b3nd_with(None, BindOptions::default())
    }

    fn b3nd_with(&self, model: Option<Arc<dyn Model>>, options: BindOptions) -> Result<Session> {
        bind(Arc::clone(self) as Arc<dyn View>, model, options)
    }
}
