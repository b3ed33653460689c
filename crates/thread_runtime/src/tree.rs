use std::collections::HashMap;

use thread_model::Message;

use crate::error::ThreadError;

/// Direction of a sibling switch, relative to the current branch position.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BranchDirection {
    Previous,
    Next,
}

/// Result of a sibling switch.
///
/// `Disabled` is the observable no-op at the first/last sibling; it is not an
/// error and applies no mutation.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SwitchOutcome {
    Switched { active_id: String },
    Disabled,
}

#[derive(Debug)]
struct TreeNode {
    message: Message,
    parent_id: Option<String>,
    children: Vec<String>,
    /// Most-recently-active child, recorded at every re-rooting of the
    /// active path. Switching back to this node restores the chain below it
    /// exactly as it was left.
    preferred_child: Option<String>,
}

/// Version forest of message records, addressed by id.
///
/// Nodes are never deleted; editing and regenerating only add siblings.
/// Sibling order is insertion order. Exactly one root-to-leaf path is active
/// at a time.
#[derive(Debug, Default)]
pub struct MessageTree {
    nodes: HashMap<String, TreeNode>,
    root_children: Vec<String>,
    root_preferred: Option<String>,
    active_leaf: Option<String>,
}

impl MessageTree {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.nodes.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.nodes.is_empty()
    }

    #[must_use]
    pub fn contains(&self, id: &str) -> bool {
        self.nodes.contains_key(id)
    }

    #[must_use]
    pub fn message(&self, id: &str) -> Option<&Message> {
        self.nodes.get(id).map(|node| &node.message)
    }

    pub(crate) fn message_mut(&mut self, id: &str) -> Result<&mut Message, ThreadError> {
        self.nodes
            .get_mut(id)
            .map(|node| &mut node.message)
            .ok_or_else(|| ThreadError::UnknownMessage { id: id.to_string() })
    }

    /// Parent id of `id`, or `None` for a root-level node.
    pub fn parent_of(&self, id: &str) -> Result<Option<&str>, ThreadError> {
        self.nodes
            .get(id)
            .map(|node| node.parent_id.as_deref())
            .ok_or_else(|| ThreadError::UnknownMessage { id: id.to_string() })
    }

    #[must_use]
    pub fn active_leaf_id(&self) -> Option<&str> {
        self.active_leaf.as_deref()
    }

    /// Insert a node under `parent_id` without re-rooting the active path.
    pub fn insert(
        &mut self,
        message: Message,
        parent_id: Option<&str>,
    ) -> Result<(), ThreadError> {
        let id = message.id.clone();
        if self.nodes.contains_key(&id) {
            return Err(ThreadError::DuplicateId { id });
        }
        if let Some(parent) = parent_id {
            if !self.nodes.contains_key(parent) {
                return Err(ThreadError::DanglingParent {
                    id: parent.to_string(),
                });
            }
        }

        match parent_id {
            Some(parent) => {
                if let Some(node) = self.nodes.get_mut(parent) {
                    node.children.push(id.clone());
                }
            }
            None => self.root_children.push(id.clone()),
        }

        self.nodes.insert(
            id,
            TreeNode {
                message,
                parent_id: parent_id.map(ToString::to_string),
                children: Vec::new(),
                preferred_child: None,
            },
        );

        Ok(())
    }

    /// Insert a node and re-root the active path through it.
    pub fn insert_active(
        &mut self,
        message: Message,
        parent_id: Option<&str>,
    ) -> Result<String, ThreadError> {
        let id = message.id.clone();
        self.insert(message, parent_id)?;
        self.activate(&id)
    }

    /// Re-root the active path through `id`, restoring the most-recently-
    /// active descendant chain below it. Returns the new active leaf.
    pub fn activate(&mut self, id: &str) -> Result<String, ThreadError> {
        if !self.nodes.contains_key(id) {
            return Err(ThreadError::UnknownMessage { id: id.to_string() });
        }

        let mut current = id.to_string();
        loop {
            let parent = self
                .nodes
                .get(&current)
                .and_then(|node| node.parent_id.clone());
            match parent {
                Some(parent_id) => {
                    if let Some(parent_node) = self.nodes.get_mut(&parent_id) {
                        parent_node.preferred_child = Some(current.clone());
                    }
                    current = parent_id;
                }
                None => {
                    self.root_preferred = Some(current);
                    break;
                }
            }
        }

        let leaf = self.descend_preferred(id);
        self.active_leaf = Some(leaf.clone());
        Ok(leaf)
    }

    /// Messages along the active root-to-leaf path, in conversation order.
    #[must_use]
    pub fn active_path(&self) -> Vec<&Message> {
        let mut ids = Vec::new();
        let mut current = self.active_leaf.clone();
        while let Some(id) = current {
            current = self
                .nodes
                .get(&id)
                .and_then(|node| node.parent_id.clone());
            ids.push(id);
        }
        ids.reverse();

        ids.iter()
            .filter_map(|id| self.nodes.get(id).map(|node| &node.message))
            .collect()
    }

    /// 1-indexed position of `id` among its siblings.
    pub fn branch_number(&self, id: &str) -> Result<usize, ThreadError> {
        let siblings = self.siblings_of(id)?;
        let position = siblings
            .iter()
            .position(|sibling| sibling == id)
            .unwrap_or(0);
        Ok(position + 1)
    }

    /// Number of siblings at the position of `id`, including itself.
    pub fn branch_count(&self, id: &str) -> Result<usize, ThreadError> {
        Ok(self.siblings_of(id)?.len())
    }

    /// Select the adjacent sibling of `id` and re-root the active path
    /// through it. At either edge the switch is disabled and nothing moves.
    pub fn switch_sibling(
        &mut self,
        id: &str,
        direction: BranchDirection,
    ) -> Result<SwitchOutcome, ThreadError> {
        let siblings = self.siblings_of(id)?;
        let position = siblings
            .iter()
            .position(|sibling| sibling == id)
            .unwrap_or(0);

        let target = match direction {
            BranchDirection::Previous => {
                if position == 0 {
                    return Ok(SwitchOutcome::Disabled);
                }
                siblings[position - 1].clone()
            }
            BranchDirection::Next => {
                if position + 1 >= siblings.len() {
                    return Ok(SwitchOutcome::Disabled);
                }
                siblings[position + 1].clone()
            }
        };

        let active_id = self.activate(&target)?;
        Ok(SwitchOutcome::Switched { active_id })
    }

    fn siblings_of(&self, id: &str) -> Result<&[String], ThreadError> {
        let node = self
            .nodes
            .get(id)
            .ok_or_else(|| ThreadError::UnknownMessage { id: id.to_string() })?;

        Ok(match &node.parent_id {
            Some(parent) => self
                .nodes
                .get(parent)
                .map(|parent_node| parent_node.children.as_slice())
                .unwrap_or(&[]),
            None => self.root_children.as_slice(),
        })
    }

    fn descend_preferred(&self, id: &str) -> String {
        let mut current = id.to_string();
        while let Some(child) = self
            .nodes
            .get(&current)
            .and_then(|node| node.preferred_child.clone())
        {
            if !self.nodes.contains_key(&child) {
                break;
            }
            current = child;
        }
        current
    }
}
