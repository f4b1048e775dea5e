//! Structural addresses of nodes in a logical tree.
//!
//! A [`NodeAddress`] is the sequence of child positions from the document
//! root down to a node. Every step records the container kind it passes
//! through, so an address identifies a node purely by shape: the same
//! address resolves to the corresponding node in every instance built from
//! the same compiled description.

use std::fmt;

use crate::object::Obj;
use crate::types::ContainerKind;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ChildIndex {
    /// Root of the parent's control template.
    Template,
    /// The n-th declared or generated child.
    At(usize),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct Step {
    pub kind: ContainerKind,
    pub index: ChildIndex,
}

impl Step {
    pub fn child(kind: ContainerKind, index: usize) -> Self {
        Self { kind, index: ChildIndex::At(index) }
    }

    pub fn template(kind: ContainerKind) -> Self {
        Self { kind, index: ChildIndex::Template }
    }
}

impl fmt::Display for Step {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.index {
            ChildIndex::Template => f.write_str("t"),
            ChildIndex::At(i) => write!(f, "{i}"),
        }
    }
}

// ── NodeAddress ───────────────────────────────────────────────────────────

#[derive(Debug, Clone, Default, PartialEq, Eq, Hash)]
pub struct NodeAddress {
    steps: Vec<Step>,
}

impl NodeAddress {
    pub fn root() -> Self {
        Self::default()
    }

    pub fn child(&self, step: Step) -> Self {
        let mut steps = self.steps.clone();
        steps.push(step);
        Self { steps }
    }

    pub fn steps(&self) -> &[Step] {
        &self.steps
    }

    pub fn depth(&self) -> usize {
        self.steps.len()
    }

    pub fn is_root(&self) -> bool {
        self.steps.is_empty()
    }

    pub fn parent(&self) -> Option<NodeAddress> {
        let (_, rest) = self.steps.split_last()?;
        Some(Self { steps: rest.to_vec() })
    }

    /// `true` if any step passes through a control template.
    pub fn in_template(&self) -> bool {
        self.steps.iter().any(|s| s.index == ChildIndex::Template)
    }

    pub fn is_ancestor_of(&self, other: &NodeAddress) -> bool {
        other.steps.len() > self.steps.len() && other.steps.starts_with(&self.steps)
    }

    /// Address of a live node, computed by walking its logical parents.
    pub fn of(node: &Obj) -> NodeAddress {
        let mut steps = Vec::new();
        let mut cursor = node.clone();
        while let (Some(step), Some(parent)) = (cursor.step(), cursor.logical_parent()) {
            steps.push(step);
            cursor = parent;
        }
        steps.reverse();
        Self { steps }
    }

    /// Follow this address down from `root`.
    pub fn resolve(&self, root: &Obj) -> Option<Obj> {
        let mut node = root.clone();
        for step in &self.steps {
            if node.type_info().container != Some(step.kind) {
                return None;
            }
            node = node.child(step.index)?;
        }
        Some(node)
    }

    /// Relative path leading from the node at `self` to the node at `target`:
    /// up to the deepest common ancestor, then down.
    pub fn path_to(&self, target: &NodeAddress) -> RelativePath {
        let common = self
            .steps
            .iter()
            .zip(&target.steps)
            .take_while(|(a, b)| a == b)
            .count();
        RelativePath {
            up: self.steps.len() - common,
            down: target.steps[common..].to_vec(),
        }
    }
}

impl fmt::Display for NodeAddress {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.steps.is_empty() {
            return f.write_str("/");
        }
        for step in &self.steps {
            write!(f, "/{step}")?;
        }
        Ok(())
    }
}

// ── RelativePath ──────────────────────────────────────────────────────────

/// `up` parent hops followed by `down` child steps.
#[derive(Debug, Clone, Default, PartialEq, Eq, Hash)]
pub struct RelativePath {
    pub up: usize,
    pub down: Vec<Step>,
}

impl RelativePath {
    pub fn is_identity(&self) -> bool {
        self.up == 0 && self.down.is_empty()
    }

    pub fn walk(&self, from: &Obj) -> Option<Obj> {
        let mut node = from.clone();
        for _ in 0..self.up {
            node = node.logical_parent()?;
        }
        NodeAddress { steps: self.down.clone() }.resolve(&node)
    }
}

impl fmt::Display for RelativePath {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.is_identity() {
            return f.write_str(".");
        }
        let mut parts: Vec<String> = (0..self.up).map(|_| "..".to_string()).collect();
        parts.extend(self.down.iter().map(|s| s.to_string()));
        f.write_str(&parts.join("/"))
    }
}
