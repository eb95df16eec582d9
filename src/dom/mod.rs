//! Element Tree Module
//!
//! - `tree`: `ElementTree` primitives, `Element` handle, `Event`
//! - `document`: in-memory arena implementation

mod document;
mod tree;

pub use document::Document;
pub use tree::{Element, ElementTree, Event, EventListener, NodeId, TreeId};
