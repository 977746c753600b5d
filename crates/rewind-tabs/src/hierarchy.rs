//! Branch hierarchy
//!
//! Recorded actions form a tree: jumping back in history and then recording
//! again starts a new branch off the node the pointer references.
//!
//! Nodes live in an arena owned by the hierarchy. The branch pointer is an
//! arena index, so it can never dangle:
//! ```text
//! nodes[0] (root) ── nodes[1] ── nodes[2]
//!                  └─ nodes[3]            <- current
//! ```

use serde::{Deserialize, Serialize};
use std::collections::VecDeque;

use crate::error::TabError;
use crate::snapshot::Snapshot;
use crate::Result;

/// Arena index of a node
pub type NodeId = usize;

/// The root always occupies the first arena slot
pub const ROOT: NodeId = 0;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BranchNode {
    /// Recording index assigned by the target (root is 0)
    pub index: usize,
    /// State recorded at this node, if any
    pub snapshot: Option<Snapshot>,
    pub parent: Option<NodeId>,
    pub children: Vec<NodeId>,
}

/// Nested wire form of the hierarchy, as pushed by the inspected target
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct HierarchyTree {
    #[serde(default)]
    pub index: usize,
    #[serde(default, rename = "stateSnapshot")]
    pub snapshot: Option<Snapshot>,
    #[serde(default)]
    pub children: Vec<HierarchyTree>,
}

/// Node new actions branch off, as pushed by the target. Older targets send
/// only the recording index, newer ones the whole node.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum BranchLocation {
    Index(usize),
    Node(HierarchyTree),
}

impl BranchLocation {
    pub fn index(&self) -> usize {
        match self {
            Self::Index(index) => *index,
            Self::Node(node) => node.index,
        }
    }
}

impl From<usize> for BranchLocation {
    fn from(index: usize) -> Self {
        Self::Index(index)
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BranchHierarchy {
    nodes: Vec<BranchNode>,
    current: NodeId,
    /// Highest recording index seen in the tree
    action_count: usize,
}

impl BranchHierarchy {
    pub fn new(root_snapshot: Option<Snapshot>) -> Self {
        Self {
            nodes: vec![BranchNode {
                index: 0,
                snapshot: root_snapshot,
                parent: None,
                children: Vec::new(),
            }],
            current: ROOT,
            action_count: 0,
        }
    }

    /// Flatten a nested tree into the arena. The pointer starts at the root.
    pub fn from_tree(tree: HierarchyTree) -> Self {
        let mut hierarchy = Self {
            nodes: Vec::new(),
            current: ROOT,
            action_count: 0,
        };

        let mut queue: VecDeque<(HierarchyTree, Option<NodeId>)> = VecDeque::new();
        queue.push_back((tree, None));

        while let Some((node, parent)) = queue.pop_front() {
            let id = hierarchy.nodes.len();
            hierarchy.action_count = hierarchy.action_count.max(node.index);
            hierarchy.nodes.push(BranchNode {
                index: node.index,
                snapshot: node.snapshot,
                parent,
                children: Vec::new(),
            });
            if let Some(parent) = parent {
                hierarchy.nodes[parent].children.push(id);
            }
            for child in node.children {
                queue.push_back((child, Some(id)));
            }
        }

        hierarchy
    }

    /// Rebuild the nested wire form
    pub fn to_tree(&self) -> HierarchyTree {
        self.subtree(ROOT)
    }

    fn subtree(&self, id: NodeId) -> HierarchyTree {
        let node = &self.nodes[id];
        HierarchyTree {
            index: node.index,
            snapshot: node.snapshot.clone(),
            children: node.children.iter().map(|&c| self.subtree(c)).collect(),
        }
    }

    pub fn root(&self) -> &BranchNode {
        &self.nodes[ROOT]
    }

    pub fn current(&self) -> NodeId {
        self.current
    }

    pub fn current_node(&self) -> &BranchNode {
        &self.nodes[self.current]
    }

    pub fn get(&self, id: NodeId) -> Option<&BranchNode> {
        self.nodes.get(id)
    }

    pub fn len(&self) -> usize {
        self.nodes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.nodes.len() == 1
    }

    pub fn action_count(&self) -> usize {
        self.action_count
    }

    /// Point at the node carrying the given recording index
    pub fn jump_to(&mut self, index: usize) -> Result<NodeId> {
        let id = self
            .nodes
            .iter()
            .position(|n| n.index == index)
            .ok_or(TabError::NodeNotFound(index))?;
        self.current = id;
        Ok(id)
    }

    /// Drop every branch and point back at the root
    pub fn reset(&mut self) {
        self.nodes.truncate(1);
        self.nodes[ROOT].children.clear();
        self.current = ROOT;
        self.action_count = 0;
    }
}

impl Default for BranchHierarchy {
    fn default() -> Self {
        Self::new(None)
    }
}
