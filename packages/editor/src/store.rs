//! # Block Store
//!
//! The authoritative in-memory tree for one open document. Owns every
//! mutation primitive; renderers, settings forms and the reorder planner all
//! funnel their writes through here.
//!
//! ## Mutation Semantics
//!
//! ### Not-found
//! - Operating on a stale/unknown id is a silent no-op, never an error
//! - UI events race against state changes; the store tolerates that
//!
//! ### Structural
//! - A parent change that would dangle a reference or create a cycle is
//!   rejected and the tree left unchanged
//! - A reorder batch is all-or-nothing with respect to structural checks
//!
//! ### Commit
//! - Every applied mutation marks the store dirty, bumps the change
//!   sequence, and pushes one history snapshot (one per reorder batch)

use std::collections::{HashMap, HashSet, VecDeque};

use serde_json::{Map, Value};
use tracing::{debug, warn};

use pagecraft_common::IdGenerator;

use crate::block::{Block, BlockType};
use crate::errors::StoreError;
use crate::history::History;
use crate::reorder::ReorderUpdate;
use crate::selection::Selection;

/// Partial changes for [`BlockStore::update`].
///
/// `content` and `settings` are shallow-merged key by key; `order` and
/// `parent_id` replace the scalar field. The double option on `parent_id`
/// distinguishes "leave unchanged" (`None`) from "move to root"
/// (`Some(None)`).
#[derive(Debug, Clone, Default)]
pub struct BlockUpdate {
    pub content: Option<Map<String, Value>>,
    pub settings: Option<Map<String, Value>>,
    pub order: Option<i64>,
    pub parent_id: Option<Option<String>>,
}

/// Authoritative block collection plus its editing state
#[derive(Debug)]
pub struct BlockStore {
    blocks: Vec<Block>,
    ids: IdGenerator,
    dirty: bool,
    change_seq: u64,
    history: History,
    selection: Selection,
}

impl BlockStore {
    /// Create an empty store scoped to one entity
    pub fn new(entity_id: &str) -> Self {
        Self {
            blocks: Vec::new(),
            ids: IdGenerator::new(entity_id),
            dirty: false,
            change_seq: 0,
            history: History::new(),
            selection: Selection::default(),
        }
    }

    // --- Read API ---

    pub fn blocks(&self) -> &[Block] {
        &self.blocks
    }

    /// Deep copy of the collection (for autosave snapshots and renderers)
    pub fn snapshot(&self) -> Vec<Block> {
        self.blocks.clone()
    }

    pub fn get(&self, id: &str) -> Option<&Block> {
        self.blocks.iter().find(|b| b.id == id)
    }

    pub fn len(&self) -> usize {
        self.blocks.len()
    }

    pub fn is_empty(&self) -> bool {
        self.blocks.is_empty()
    }

    /// Children of `parent` in stable sibling order (`order`, tie-break id)
    pub fn children_of(&self, parent: Option<&str>) -> Vec<&Block> {
        let mut children: Vec<&Block> = self
            .blocks
            .iter()
            .filter(|b| b.parent_id.as_deref() == parent)
            .collect();
        children.sort_by(|a, b| a.sibling_key().cmp(&b.sibling_key()));
        children
    }

    /// Transitive closure of `id`'s children (excluding `id` itself),
    /// computed by BFS over `parent_id` back-references
    pub fn descendants(&self, id: &str) -> Vec<String> {
        let mut out = Vec::new();
        let mut queue: VecDeque<String> = VecDeque::new();
        queue.push_back(id.to_string());

        while let Some(current) = queue.pop_front() {
            for block in &self.blocks {
                if block.parent_id.as_deref() == Some(current.as_str()) {
                    out.push(block.id.clone());
                    queue.push_back(block.id.clone());
                }
            }
        }

        out
    }

    /// Whether `ancestor` appears on `id`'s parent chain
    pub fn is_ancestor(&self, ancestor: &str, id: &str) -> bool {
        let mut current = self.get(id).and_then(|b| b.parent_id.as_deref());
        let mut steps = 0;
        while let Some(parent) = current {
            if parent == ancestor {
                return true;
            }
            steps += 1;
            if steps > self.blocks.len() {
                break;
            }
            current = self.get(parent).and_then(|b| b.parent_id.as_deref());
        }
        false
    }

    pub fn dirty(&self) -> bool {
        self.dirty
    }

    /// Monotonic counter bumped on every committed mutation.
    ///
    /// Autosave stamps each snapshot with this value so a save result can be
    /// attributed to the exact state it persisted.
    pub fn change_seq(&self) -> u64 {
        self.change_seq
    }

    pub fn history(&self) -> &History {
        &self.history
    }

    // --- Selection (observational) ---

    pub fn selection(&self) -> &Selection {
        &self.selection
    }

    pub fn select(&mut self, id: Option<String>) {
        self.selection.select(id);
    }

    pub fn hover(&mut self, id: Option<String>) {
        self.selection.hover(id);
    }

    // --- Mutation API ---

    /// Atomically swap the whole tree (initial load, version restore).
    ///
    /// Clears the dirty flag and pushes a seed history entry so the loaded
    /// state is itself an undo target.
    pub fn replace_all(&mut self, blocks: Vec<Block>) {
        self.ids.advance_past(blocks.iter().map(|b| b.id.as_str()));
        self.blocks = blocks;
        self.dirty = false;
        self.change_seq += 1;
        self.selection.clear();
        self.history.push(&self.blocks);
        debug!(count = self.blocks.len(), "replaced block tree");
    }

    /// Create a block with default content for its type.
    ///
    /// With an `index`, siblings at or after that position shift by +1 to
    /// make room; otherwise the block is appended with `order` = current
    /// sibling count. Returns `None` when `parent_id` does not resolve.
    pub fn add(
        &mut self,
        block_type: BlockType,
        parent_id: Option<&str>,
        index: Option<usize>,
    ) -> Option<Block> {
        if let Some(parent) = parent_id {
            if self.get(parent).is_none() {
                debug!(parent, "add: unknown parent, ignoring");
                return None;
            }
        }

        let sibling_ids: Vec<String> = self
            .children_of(parent_id)
            .iter()
            .map(|b| b.id.clone())
            .collect();
        let sibling_indices: Vec<usize> = sibling_ids
            .iter()
            .filter_map(|id| self.blocks.iter().position(|b| &b.id == id))
            .collect();

        let order = match index {
            Some(at) if at < sibling_indices.len() => {
                let slot = self.blocks[sibling_indices[at]].order;
                for &i in &sibling_indices[at..] {
                    self.blocks[i].order += 1;
                }
                slot
            }
            _ => sibling_indices.len() as i64,
        };

        let block = Block::new(
            self.ids.new_id(),
            block_type,
            parent_id.map(str::to_string),
            order,
        );
        self.blocks.push(block.clone());
        self.commit("add");
        Some(block)
    }

    /// Apply partial changes to one block.
    ///
    /// Returns `false` (and commits nothing) when the id is unknown or when
    /// a `parent_id` change would dangle or create a cycle.
    pub fn update(&mut self, id: &str, changes: BlockUpdate) -> bool {
        if self.get(id).is_none() {
            debug!(id, "update: unknown id, ignoring");
            return false;
        }

        if let Some(new_parent) = &changes.parent_id {
            if let Some(parent) = new_parent.as_deref() {
                if self.get(parent).is_none() {
                    warn!(id, parent, "update: rejected, parent does not exist");
                    return false;
                }
                if parent == id || self.is_ancestor(id, parent) {
                    warn!(id, parent, "update: rejected, would create a cycle");
                    return false;
                }
            }
        }

        let Some(block) = self.blocks.iter_mut().find(|b| b.id == id) else {
            return false;
        };

        if let Some(content) = changes.content {
            for (key, value) in content {
                block.content.insert(key, value);
            }
        }
        if let Some(settings) = changes.settings {
            for (key, value) in settings {
                block.settings.insert(key, value);
            }
        }
        if let Some(order) = changes.order {
            block.order = order;
        }
        if let Some(parent_id) = changes.parent_id {
            block.parent_id = parent_id;
        }

        self.commit("update");
        true
    }

    /// Remove a block and the full transitive closure of its descendants.
    ///
    /// Selection/hover pointing at any removed id is cleared. Returns
    /// `false` when the id is unknown.
    pub fn delete(&mut self, id: &str) -> bool {
        if self.get(id).is_none() {
            debug!(id, "delete: unknown id, ignoring");
            return false;
        }

        let mut removed: HashSet<String> = self.descendants(id).into_iter().collect();
        removed.insert(id.to_string());

        self.blocks.retain(|b| !removed.contains(&b.id));
        self.selection.clear_removed(&removed);
        debug!(id, count = removed.len(), "deleted block subtree");
        self.commit("delete");
        true
    }

    /// Apply many order/parent changes atomically in one pass.
    ///
    /// Entries whose id does not resolve are skipped (not-found policy). A
    /// batch that references an unknown parent or would create a cycle is
    /// rejected whole and the tree left unchanged. One history snapshot
    /// covers the entire batch.
    pub fn reorder(&mut self, updates: &[ReorderUpdate]) -> Result<(), StoreError> {
        let applicable: Vec<ReorderUpdate> = updates
            .iter()
            .filter(|u| self.get(&u.id).is_some())
            .cloned()
            .collect();
        if applicable.is_empty() {
            debug!("reorder: no resolvable ids in batch, ignoring");
            return Ok(());
        }

        let new_parents: HashMap<&str, Option<&str>> = applicable
            .iter()
            .map(|u| (u.id.as_str(), u.parent_id.as_deref()))
            .collect();
        let effective_parent = |id: &str| -> Option<&str> {
            match new_parents.get(id) {
                Some(assigned) => *assigned,
                None => self.get(id).and_then(|b| b.parent_id.as_deref()),
            }
        };

        for update in &applicable {
            if let Some(parent) = update.parent_id.as_deref() {
                if self.get(parent).is_none() {
                    return Err(StoreError::UnknownParent(parent.to_string()));
                }
            }

            // Any new cycle must pass through a reassigned edge, so walking
            // up from each batch entry is sufficient to detect all of them.
            let mut current = effective_parent(&update.id);
            let mut steps = 0;
            while let Some(parent) = current {
                if parent == update.id {
                    return Err(StoreError::WouldCycle(update.id.clone()));
                }
                steps += 1;
                if steps > self.blocks.len() {
                    return Err(StoreError::WouldCycle(update.id.clone()));
                }
                current = effective_parent(parent);
            }
        }

        for update in &applicable {
            if let Some(block) = self.blocks.iter_mut().find(|b| b.id == update.id) {
                block.order = update.order;
                block.parent_id = update.parent_id.clone();
            }
        }

        debug!(count = applicable.len(), "applied reorder batch");
        self.commit("reorder");
        Ok(())
    }

    // --- History ---

    /// Step back one history entry; marks dirty (an undo is itself a change
    /// that needs saving)
    pub fn undo(&mut self) -> bool {
        match self.history.undo() {
            Some(snapshot) => {
                self.restore(snapshot);
                debug!("undo");
                true
            }
            None => false,
        }
    }

    /// Step forward one history entry; marks dirty
    pub fn redo(&mut self) -> bool {
        match self.history.redo() {
            Some(snapshot) => {
                self.restore(snapshot);
                debug!("redo");
                true
            }
            None => false,
        }
    }

    pub fn can_undo(&self) -> bool {
        self.history.can_undo()
    }

    pub fn can_redo(&self) -> bool {
        self.history.can_redo()
    }

    // --- Persistence hooks ---

    /// Install the server's canonical list as the new saved baseline.
    ///
    /// Clears the dirty flag only when `seq` still matches the live change
    /// sequence; edits made while the save was in flight keep the store
    /// dirty so the next debounce cycle picks them up.
    pub fn mark_saved(&mut self, seq: u64, canonical: Vec<Block>) -> bool {
        if seq != self.change_seq {
            debug!(
                saved_seq = seq,
                live_seq = self.change_seq,
                "save landed behind local edits, staying dirty"
            );
            return false;
        }
        self.blocks = canonical;
        self.dirty = false;
        true
    }

    fn restore(&mut self, snapshot: Vec<Block>) {
        {
            let live: HashSet<&str> = snapshot.iter().map(|b| b.id.as_str()).collect();
            if self.selection.selected().is_some_and(|id| !live.contains(id)) {
                self.selection.select(None);
            }
            if self.selection.hovered().is_some_and(|id| !live.contains(id)) {
                self.selection.hover(None);
            }
        }
        self.blocks = snapshot;
        self.dirty = true;
        self.change_seq += 1;
    }

    fn commit(&mut self, op: &str) {
        self.dirty = true;
        self.change_seq += 1;
        self.history.push(&self.blocks);
        debug!(op, seq = self.change_seq, "committed mutation");
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn store_with_roots(n: usize) -> (BlockStore, Vec<String>) {
        let mut store = BlockStore::new("entity-1");
        store.replace_all(Vec::new());
        let ids = (0..n)
            .map(|_| store.add(BlockType::Text, None, None).unwrap().id)
            .collect();
        (store, ids)
    }

    #[test]
    fn test_add_appends_with_sibling_count_order() {
        let (store, ids) = store_with_roots(3);

        let roots = store.children_of(None);
        assert_eq!(roots.len(), 3);
        for (i, block) in roots.iter().enumerate() {
            assert_eq!(block.order, i as i64);
            assert_eq!(block.id, ids[i]);
        }
        assert!(store.dirty());
    }

    #[test]
    fn test_add_at_index_shifts_trailing_siblings() {
        let (mut store, ids) = store_with_roots(3);

        let inserted = store.add(BlockType::Heading, None, Some(1)).unwrap();

        let roots = store.children_of(None);
        let order: Vec<&str> = roots.iter().map(|b| b.id.as_str()).collect();
        assert_eq!(
            order,
            vec![
                ids[0].as_str(),
                inserted.id.as_str(),
                ids[1].as_str(),
                ids[2].as_str()
            ]
        );
    }

    #[test]
    fn test_add_under_unknown_parent_is_noop() {
        let mut store = BlockStore::new("entity-1");
        store.replace_all(Vec::new());
        let seq = store.change_seq();

        assert!(store.add(BlockType::Text, Some("ghost"), None).is_none());
        assert_eq!(store.change_seq(), seq);
        assert!(!store.dirty());
    }

    #[test]
    fn test_update_merges_content_shallowly() {
        let (mut store, ids) = store_with_roots(1);

        let mut first = Map::new();
        first.insert("text".to_string(), json!("hello"));
        first.insert("note".to_string(), json!("keep me"));
        assert!(store.update(
            &ids[0],
            BlockUpdate {
                content: Some(first),
                ..Default::default()
            }
        ));

        let mut second = Map::new();
        second.insert("text".to_string(), json!("world"));
        assert!(store.update(
            &ids[0],
            BlockUpdate {
                content: Some(second),
                ..Default::default()
            }
        ));

        let block = store.get(&ids[0]).unwrap();
        assert_eq!(block.content.get("text"), Some(&json!("world")));
        assert_eq!(block.content.get("note"), Some(&json!("keep me")));
    }

    #[test]
    fn test_update_unknown_id_is_silent_noop() {
        let (mut store, _) = store_with_roots(1);
        let seq = store.change_seq();

        assert!(!store.update("ghost", BlockUpdate::default()));
        assert_eq!(store.change_seq(), seq);
    }

    #[test]
    fn test_update_empty_change_leaves_tree_equal() {
        let (mut store, ids) = store_with_roots(2);
        let before = store.snapshot();

        assert!(store.update(&ids[0], BlockUpdate::default()));
        assert_eq!(store.snapshot(), before);
    }

    #[test]
    fn test_update_rejects_unknown_parent_change() {
        let (mut store, ids) = store_with_roots(1);
        let before = store.snapshot();
        let seq = store.change_seq();

        let applied = store.update(
            &ids[0],
            BlockUpdate {
                parent_id: Some(Some("ghost".to_string())),
                ..Default::default()
            },
        );

        assert!(!applied);
        assert_eq!(store.snapshot(), before);
        assert_eq!(store.change_seq(), seq);
    }

    #[test]
    fn test_update_rejects_cycle_creating_parent_change() {
        let mut store = BlockStore::new("entity-1");
        store.replace_all(Vec::new());
        let section = store.add(BlockType::Section, None, None).unwrap();
        let inner = store
            .add(BlockType::Section, Some(&section.id), None)
            .unwrap();

        let before = store.snapshot();
        let applied = store.update(
            &section.id,
            BlockUpdate {
                parent_id: Some(Some(inner.id.clone())),
                ..Default::default()
            },
        );

        assert!(!applied);
        assert_eq!(store.snapshot(), before);
    }

    #[test]
    fn test_delete_cascades_to_descendants_only() {
        let mut store = BlockStore::new("entity-1");
        store.replace_all(Vec::new());
        let section = store.add(BlockType::Section, None, None).unwrap();
        let child_a = store.add(BlockType::Text, Some(&section.id), None).unwrap();
        let child_b = store.add(BlockType::Text, Some(&section.id), None).unwrap();
        let bystander = store.add(BlockType::Text, None, None).unwrap();
        let bystander_before = store.get(&bystander.id).unwrap().clone();

        store.select(Some(child_a.id.clone()));
        assert!(store.delete(&section.id));

        assert!(store.get(&section.id).is_none());
        assert!(store.get(&child_a.id).is_none());
        assert!(store.get(&child_b.id).is_none());
        assert_eq!(store.get(&bystander.id), Some(&bystander_before));
        assert_eq!(store.selection().selected(), None);
    }

    #[test]
    fn test_delete_unknown_id_is_silent_noop() {
        let (mut store, _) = store_with_roots(1);
        let before = store.snapshot();

        assert!(!store.delete("ghost"));
        assert_eq!(store.snapshot(), before);
    }

    #[test]
    fn test_reorder_batch_rejected_whole_on_cycle() {
        let mut store = BlockStore::new("entity-1");
        store.replace_all(Vec::new());
        let outer = store.add(BlockType::Section, None, None).unwrap();
        let inner = store.add(BlockType::Section, Some(&outer.id), None).unwrap();
        let other = store.add(BlockType::Text, None, None).unwrap();
        let before = store.snapshot();

        let batch = vec![
            ReorderUpdate {
                id: other.id.clone(),
                order: 5,
                parent_id: None,
            },
            ReorderUpdate {
                id: outer.id.clone(),
                order: 0,
                parent_id: Some(inner.id.clone()),
            },
        ];

        let result = store.reorder(&batch);
        assert_eq!(result, Err(StoreError::WouldCycle(outer.id.clone())));
        assert_eq!(store.snapshot(), before);
    }

    #[test]
    fn test_reorder_skips_unknown_ids() {
        let (mut store, ids) = store_with_roots(2);

        let batch = vec![
            ReorderUpdate {
                id: "ghost".to_string(),
                order: 9,
                parent_id: None,
            },
            ReorderUpdate {
                id: ids[0].clone(),
                order: 7,
                parent_id: None,
            },
        ];

        store.reorder(&batch).unwrap();
        assert_eq!(store.get(&ids[0]).unwrap().order, 7);
    }

    #[test]
    fn test_reorder_all_unknown_is_noop() {
        let (mut store, _) = store_with_roots(1);
        let seq = store.change_seq();

        let batch = vec![ReorderUpdate {
            id: "ghost".to_string(),
            order: 0,
            parent_id: None,
        }];
        store.reorder(&batch).unwrap();
        assert_eq!(store.change_seq(), seq);
    }

    #[test]
    fn test_undo_restores_exact_prior_state() {
        let (mut store, ids) = store_with_roots(2);
        let before = store.snapshot();

        store.delete(&ids[1]);
        assert_ne!(store.snapshot(), before);

        assert!(store.undo());
        assert_eq!(store.snapshot(), before);
        assert!(store.dirty());

        assert!(store.redo());
        assert!(store.get(&ids[1]).is_none());
    }

    #[test]
    fn test_replace_all_clears_dirty_and_seeds_history() {
        let mut store = BlockStore::new("entity-1");
        let blocks = vec![Block::new("x-1".to_string(), BlockType::Text, None, 0)];
        store.replace_all(blocks);

        assert!(!store.dirty());
        assert_eq!(store.history().len(), 1);
        assert!(!store.can_undo());
    }

    #[test]
    fn test_mark_saved_respects_change_seq() {
        let (mut store, ids) = store_with_roots(1);
        let seq = store.change_seq();
        let canonical = store.snapshot();

        // A later edit arrives before the save result
        store.update(
            &ids[0],
            BlockUpdate {
                order: Some(3),
                ..Default::default()
            },
        );

        assert!(!store.mark_saved(seq, canonical.clone()));
        assert!(store.dirty());

        let seq = store.change_seq();
        let canonical = store.snapshot();
        assert!(store.mark_saved(seq, canonical));
        assert!(!store.dirty());
    }

    #[test]
    fn test_parent_ids_always_resolve() {
        let mut store = BlockStore::new("entity-1");
        store.replace_all(Vec::new());
        let section = store.add(BlockType::Section, None, None).unwrap();
        let child = store.add(BlockType::Text, Some(&section.id), None).unwrap();
        store.add(BlockType::Text, None, Some(0)).unwrap();
        store.delete(&child.id);
        store.undo();
        store.redo();

        for block in store.blocks() {
            if let Some(parent) = block.parent_id.as_deref() {
                assert!(store.get(parent).is_some(), "dangling parent {}", parent);
                assert!(!store.is_ancestor(&block.id, parent), "cycle at {}", block.id);
            }
        }
    }
}
