//! # Selection Tracking
//!
//! Purely observational: records which block is selected or hovered, with no
//! mutation authority over the tree. The store clears stale ids when a
//! delete removes the blocks they point at.

use std::collections::HashSet;

#[derive(Debug, Clone, Default, PartialEq)]
pub struct Selection {
    selected: Option<String>,
    hovered: Option<String>,
}

impl Selection {
    pub fn select(&mut self, id: Option<String>) {
        self.selected = id;
    }

    pub fn hover(&mut self, id: Option<String>) {
        self.hovered = id;
    }

    pub fn selected(&self) -> Option<&str> {
        self.selected.as_deref()
    }

    pub fn hovered(&self) -> Option<&str> {
        self.hovered.as_deref()
    }

    pub fn clear(&mut self) {
        self.selected = None;
        self.hovered = None;
    }

    /// Drop any pointer into a removed id set
    pub fn clear_removed(&mut self, removed: &HashSet<String>) {
        if self.selected.as_ref().is_some_and(|id| removed.contains(id)) {
            self.selected = None;
        }
        if self.hovered.as_ref().is_some_and(|id| removed.contains(id)) {
            self.hovered = None;
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_clear_removed_only_touches_removed_ids() {
        let mut selection = Selection::default();
        selection.select(Some("a".to_string()));
        selection.hover(Some("b".to_string()));

        let removed: HashSet<String> = ["b".to_string()].into_iter().collect();
        selection.clear_removed(&removed);

        assert_eq!(selection.selected(), Some("a"));
        assert_eq!(selection.hovered(), None);
    }
}
