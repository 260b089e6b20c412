//! # Hierarchical Reorder Engine
//!
//! Translates a drag gesture (a source block dropped onto a target block in
//! the flattened visual list) into one atomic reorder batch for the store.
//!
//! ## Decision procedure
//!
//! 1. Same parent → pure sibling reorder: remove the source, reinsert at the
//!    target's position, renumber the group.
//! 2. Target is container-capable **and** expanded → insert as last child of
//!    the target, renumber both the target's children and the source's old
//!    sibling group.
//! 3. Otherwise → insert into the target's sibling list at the target's
//!    position, renumber that list and the source's old sibling group.
//!
//! Every affected sibling group comes out numbered `0..n-1` with no gaps or
//! duplicates. Drops whose effective new parent sits inside the source's own
//! subtree are refused; that would create a cycle.
//!
//! Unresolvable ids and self-drops are no-ops, matching the store's
//! tolerance for stale UI events.

use std::collections::HashSet;

use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::errors::StoreError;
use crate::store::BlockStore;

/// One entry of an atomic reorder batch.
///
/// `parent_id` is authoritative: `None` places the block at document root.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ReorderUpdate {
    pub id: String,
    pub order: i64,
    pub parent_id: Option<String>,
}

/// One row of the flattened, depth-aware visual list
#[derive(Debug, Clone, PartialEq)]
pub struct FlatRow {
    pub id: String,
    pub depth: usize,
}

/// Flatten the tree the way the block list renders it: depth-first, with
/// only expanded containers contributing their children.
pub fn flatten_visible(store: &BlockStore, expanded: &HashSet<String>) -> Vec<FlatRow> {
    let mut rows = Vec::new();
    walk_visible(store, None, 0, expanded, &mut rows);
    rows
}

fn walk_visible(
    store: &BlockStore,
    parent: Option<&str>,
    depth: usize,
    expanded: &HashSet<String>,
    rows: &mut Vec<FlatRow>,
) {
    for block in store.children_of(parent) {
        rows.push(FlatRow {
            id: block.id.clone(),
            depth,
        });
        if block.block_type.is_container() && expanded.contains(&block.id) {
            walk_visible(store, Some(&block.id), depth + 1, expanded, rows);
        }
    }
}

/// Compute the reorder batch for dropping `source_id` onto `target_id`.
///
/// Returns `None` for self-drops, unresolvable ids, and cycle-creating
/// moves. The returned batch is ready for [`BlockStore::reorder`].
pub fn plan_drop(
    store: &BlockStore,
    source_id: &str,
    target_id: &str,
    expanded: &HashSet<String>,
) -> Option<Vec<ReorderUpdate>> {
    if source_id == target_id {
        return None;
    }
    let source = store.get(source_id)?;
    let target = store.get(target_id)?;

    let source_parent = source.parent_id.clone();
    let target_parent = target.parent_id.clone();

    if source_parent == target_parent {
        // Branch 1: sibling reorder under the shared parent.
        let mut siblings = child_ids(store, source_parent.as_deref());
        siblings.retain(|id| id != source_id);
        let at = siblings.iter().position(|id| id == target_id)?;
        siblings.insert(at, source_id.to_string());

        return Some(renumber(&siblings, source_parent.as_deref()));
    }

    let into_container = target.block_type.is_container() && expanded.contains(target_id);
    let new_parent = if into_container {
        Some(target_id.to_string())
    } else {
        target_parent
    };

    // Ancestor guard: refuse drops whose new parent is the source itself or
    // sits anywhere inside the source's subtree.
    if let Some(parent) = new_parent.as_deref() {
        if parent == source_id || store.is_ancestor(source_id, parent) {
            debug!(source_id, target_id, "drop refused: would create a cycle");
            return None;
        }
    }

    let mut batch = if into_container {
        // Branch 2: append as last child of the expanded container.
        let mut children = child_ids(store, Some(target_id));
        children.retain(|id| id != source_id);
        children.push(source_id.to_string());
        renumber(&children, new_parent.as_deref())
    } else {
        // Branch 3: insert into the target's sibling list at its position.
        let mut siblings = child_ids(store, new_parent.as_deref());
        siblings.retain(|id| id != source_id);
        let at = siblings.iter().position(|id| id == target_id)?;
        siblings.insert(at, source_id.to_string());
        renumber(&siblings, new_parent.as_deref())
    };

    // Close the gap in the source's old sibling group.
    let mut old_siblings = child_ids(store, source_parent.as_deref());
    old_siblings.retain(|id| id != source_id);
    batch.extend(renumber(&old_siblings, source_parent.as_deref()));

    Some(batch)
}

/// Plan and apply a drop in one call.
///
/// Returns `Ok(false)` when the drop resolved to a no-op.
pub fn apply_drop(
    store: &mut BlockStore,
    source_id: &str,
    target_id: &str,
    expanded: &HashSet<String>,
) -> Result<bool, StoreError> {
    match plan_drop(store, source_id, target_id, expanded) {
        Some(batch) => {
            store.reorder(&batch)?;
            Ok(true)
        }
        None => Ok(false),
    }
}

fn child_ids(store: &BlockStore, parent: Option<&str>) -> Vec<String> {
    store
        .children_of(parent)
        .iter()
        .map(|b| b.id.clone())
        .collect()
}

fn renumber(ids: &[String], parent: Option<&str>) -> Vec<ReorderUpdate> {
    ids.iter()
        .enumerate()
        .map(|(i, id)| ReorderUpdate {
            id: id.clone(),
            order: i as i64,
            parent_id: parent.map(str::to_string),
        })
        .collect()
}
