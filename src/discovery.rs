//! Element discovery and boundary filtering
//!
//! Boundary markers live in a process-wide side-table keyed by
//! (tree id, node id) instead of on the elements themselves. A view's root
//! is marked when its pass begins; an outer view skips every candidate whose
//! path up to the outer root crosses a marked node.

use dashmap::DashSet;
use once_cell::sync::Lazy;
use tracing::trace;

use crate::dom::{Element, NodeId, TreeId};

static BOUNDARIES: Lazy<DashSet<(TreeId, NodeId)>> = Lazy::new(DashSet::new);

pub fn mark_boundary(el: &Element) {
    BOUNDARIES.insert((el.tree_id(), el.node_id()));
}

pub fn is_boundary(el: &Element) -> bool {
    BOUNDARIES.contains(&(el.tree_id(), el.node_id()))
}

/// Forget every marker of one tree (called when a tree is dropped)
pub fn clear_boundaries(tree: TreeId) {
    BOUNDARIES.retain(|(t, _)| *t != tree);
}

/// Elements under `root` (and `root` itself, last) carrying `attribute`,
/// excluding those owned by a nested bound view
pub fn discover(root: &Element, attribute: &str) -> Vec<Element> {
    mark_boundary(root);

    let mut candidates: Vec<Element> = root
        .descendants()
        .into_iter()
        .filter(|el| el.has_attribute(attribute))
        .collect();
    if root.has_attribute(attribute) {
        candidates.push(root.clone());
    }

    candidates
        .into_iter()
        .filter(|candidate| {
            let owned = is_owned_by(candidate, root);
            if !owned {
                trace!(element = %candidate.describe(), "skipped: inside nested binding boundary");
            }
            owned
        })
        .collect()
}

/// Walk from the candidate up to (not including) the root; any marker on
/// the way means a nested view owns the candidate
fn is_owned_by(candidate: &Element, root: &Element) -> bool {
    let mut current = Some(candidate.clone());
    while let Some(el) = current {
        if &el == root {
            break;
        }
        if is_boundary(&el) {
            return false;
        }
        current = el.parent();
    }
    true
}
