//! Reactive model collaborator
//!
//! The engine only needs four capabilities from a model: a JSON snapshot,
//! keyed reads and writes, and change subscriptions. `JsonModel` is the
//! in-memory implementation used by the CLI and tests.
//!
//! Listeners run synchronously inside `set`, after every lock is released,
//! so a listener may read or write the same model.

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

use parking_lot::RwLock;
use serde_json::{Map, Value};

use crate::error::{B3ndError, Result};
use crate::value::json_type_name;

pub type SubscriptionId = u64;

/// Change notifications a model can emit
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ChangeEvent {
    /// A top-level field changed
    Change,
    /// A field below the top level changed (dotted key path)
    NestedChange,
}

impl ChangeEvent {
    pub fn as_str(&self) -> &'static str {
        match self {
            ChangeEvent::Change => "change",
            ChangeEvent::NestedChange => "nested-change",
        }
    }
}

/// Change listener; errors propagate back to the `set` caller
pub type Listener = Arc<dyn Fn(&ChangeEvent) -> Result<()> + Send + Sync>;

pub trait Model: Send + Sync {
    /// Snapshot of the current fields
    fn to_json(&self) -> Value;

    /// Read a field by (possibly dotted) key path
    fn get(&self, key: &str) -> Option<Value>;

    /// Write a field by (possibly dotted) key path and notify listeners
    fn set(&self, key: &str, value: Value) -> Result<()>;

    fn on(&self, event: ChangeEvent, listener: Listener) -> SubscriptionId;

    /// Remove a subscription; false when the id is unknown
    fn off(&self, id: SubscriptionId) -> bool;
}

struct Subscription {
    id: SubscriptionId,
    event: ChangeEvent,
    listener: Listener,
}

/// Thread-safe in-memory model over a JSON object
pub struct JsonModel {
    data: RwLock<Map<String, Value>>,
    listeners: RwLock<Vec<Subscription>>,
    next_id: AtomicU64,
}

impl JsonModel {
    /// Non-object values start from an empty object
    pub fn new(initial: Value) -> Self {
        let data = match initial {
            Value::Object(map) => map,
            _ => Map::new(),
        };
        Self {
            data: RwLock::new(data),
            listeners: RwLock::new(Vec::new()),
            next_id: AtomicU64::new(1),
        }
    }

    pub fn shared(initial: Value) -> Arc<Self> {
        Arc::new(Self::new(initial))
    }

    /// Number of live subscriptions (all events)
    pub fn listener_count(&self) -> usize {
        self.listeners.read().len()
    }

    fn emit(&self, event: ChangeEvent) -> Result<()> {
        let listeners: Vec<Listener> = self
            .listeners
            .read()
            .iter()
            .filter(|s| s.event == event)
            .map(|s| Arc::clone(&s.listener))
            .collect();

        // every listener runs; the first failure is reported
        let mut first_error = None;
        for listener in listeners {
            if let Err(e) = listener(&event) {
                first_error.get_or_insert(e);
            }
        }
        first_error.map_or(Ok(()), Err)
    }
}

impl Default for JsonModel {
    fn default() -> Self {
        Self::new(Value::Object(Map::new()))
    }
}

impl std::fmt::Debug for JsonModel {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("JsonModel")
            .field("data", &*self.data.read())
            .field("listeners", &self.listener_count())
            .finish()
    }
}

impl Model for JsonModel {
    fn to_json(&self) -> Value {
        Value::Object(self.data.read().clone())
    }

    fn get(&self, key: &str) -> Option<Value> {
        let data = self.data.read();
        let mut segments = key.split('.');
        let mut current = data.get(segments.next()?)?;
        for segment in segments {
            current = match current {
                Value::Object(map) => map.get(segment)?,
                Value::Array(items) => items.get(segment.parse::<usize>().ok()?)?,
                _ => return None,
            };
        }
        Some(current.clone())
    }

    fn set(&self, key: &str, value: Value) -> Result<()> {
        let nested = key.contains('.');
        let changed = {
            let mut data = self.data.write();
            write_path(&mut data, key, value)?
        };

        if !changed {
            return Ok(());
        }
        self.emit(if nested {
            ChangeEvent::NestedChange
        } else {
            ChangeEvent::Change
        })
    }

    fn on(&self, event: ChangeEvent, listener: Listener) -> SubscriptionId {
        let id = self.next_id.fetch_add(1, Ordering::Relaxed);
        self.listeners.write().push(Subscription {
            id,
            event,
            listener,
        });
        id
    }

    fn off(&self, id: SubscriptionId) -> bool {
        let mut listeners = self.listeners.write();
        let before = listeners.len();
        listeners.retain(|s| s.id != id);
        listeners.len() != before
    }
}

/// Write `value` at a dotted path. Missing or null intermediates become
/// objects; arrays are entered by index (the length itself appends).
/// Returns whether anything changed.
fn write_path(root: &mut Map<String, Value>, key: &str, value: Value) -> Result<bool> {
    let Some((head, rest)) = key.split_once('.') else {
        if root.get(key) == Some(&value) {
            return Ok(false);
        }
        root.insert(key.to_string(), value);
        return Ok(true);
    };

    let mut slot = root.entry(head.to_string()).or_insert(Value::Null);
    let mut segments = rest.split('.').peekable();
    while let Some(segment) = segments.next() {
        let last = segments.peek().is_none();
        if slot.is_null() {
            *slot = Value::Object(Map::new());
        }
        let child = match slot {
            Value::Object(map) => {
                if last {
                    if map.get(segment) == Some(&value) {
                        return Ok(false);
                    }
                    map.insert(segment.to_string(), value);
                    return Ok(true);
                }
                map.entry(segment.to_string()).or_insert(Value::Null)
            }
            Value::Array(items) => {
                let index = segment
                    .parse::<usize>()
                    .map_err(|_| path_error(key, format!("'{segment}' is not an array index")))?;
                if index > items.len() {
                    return Err(path_error(
                        key,
                        format!("index {index} is past the end of an array of {}", items.len()),
                    ));
                }
                if index == items.len() {
                    items.push(Value::Null);
                }
                let child = &mut items[index];
                if last {
                    if *child == value {
                        return Ok(false);
                    }
                    *child = value;
                    return Ok(true);
                }
                child
            }
            other => {
                return Err(path_error(
                    key,
                    format!("'{segment}' is below a {}", json_type_name(other)),
                ))
            }
        };
        slot = child;
    }
    Ok(false)
}

fn path_error(key: &str, reason: String) -> B3ndError {
    B3ndError::ModelPath {
        key: key.to_string(),
        reason,
    }
}
