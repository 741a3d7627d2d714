//! Engine-facing view of a built specification: containers and runnable leaves.

use std::fmt;
use std::fmt::Write as _;
use std::panic;
use std::sync::Arc;

use crate::errors::ExampleFailure;
use crate::execution::run_example;
use crate::tree::{ChildRef, ExampleId, NodeId, SpecTree};

/// One node of a built specification.
#[derive(Debug, Clone)]
pub enum TestNode {
    Container(Container),
    Leaf(Leaf),
}

/// A named group (`describe`/`context` block, or the root).
#[derive(Debug, Clone)]
pub struct Container {
    display_name: String,
    children: Vec<TestNode>,
}

/// A runnable example.
#[derive(Clone)]
pub struct Leaf {
    tree: Arc<SpecTree>,
    example: ExampleId,
}

impl TestNode {
    pub(crate) fn materialize(tree: &Arc<SpecTree>, node: NodeId) -> TestNode {
        let data = tree.node(node);
        let children = data
            .children
            .iter()
            .map(|child| match child {
                ChildRef::Container(id) => TestNode::materialize(tree, *id),
                ChildRef::Example(id) => TestNode::Leaf(Leaf {
                    tree: Arc::clone(tree),
                    example: *id,
                }),
            })
            .collect();
        TestNode::Container(Container {
            display_name: tree.naming.container_name(&data.name),
            children,
        })
    }

    pub fn display_name(&self) -> &str {
        match self {
            TestNode::Container(container) => container.display_name(),
            TestNode::Leaf(leaf) => leaf.display_name(),
        }
    }

    /// Host grouping key; only examples of flat-namespace specifications have one.
    pub fn grouping_key(&self) -> Option<&str> {
        match self {
            TestNode::Container(_) => None,
            TestNode::Leaf(leaf) => leaf.grouping_key(),
        }
    }

    /// Direct children, in declaration order; empty for leaves.
    pub fn children(&self) -> &[TestNode] {
        match self {
            TestNode::Container(container) => &container.children,
            TestNode::Leaf(_) => &[],
        }
    }

    pub fn as_container(&self) -> Option<&Container> {
        match self {
            TestNode::Container(container) => Some(container),
            TestNode::Leaf(_) => None,
        }
    }

    pub fn as_leaf(&self) -> Option<&Leaf> {
        match self {
            TestNode::Container(_) => None,
            TestNode::Leaf(leaf) => Some(leaf),
        }
    }

    /// All leaves below (or at) this node, depth first in declaration order.
    pub fn leaves(&self) -> Vec<&Leaf> {
        let mut leaves = Vec::new();
        self.collect_leaves(&mut leaves);
        leaves
    }

    fn collect_leaves<'a>(&'a self, out: &mut Vec<&'a Leaf>) {
        match self {
            TestNode::Leaf(leaf) => out.push(leaf),
            TestNode::Container(container) => {
                for child in &container.children {
                    child.collect_leaves(out);
                }
            }
        }
    }

    /// Follow a path of display names from this node's children downwards.
    pub fn find(&self, path: &[&str]) -> Option<&TestNode> {
        let Some((first, rest)) = path.split_first() else {
            return Some(self);
        };
        self.children()
            .iter()
            .find(|child| child.display_name() == *first)
            .and_then(|child| child.find(rest))
    }

    /// Indented text rendering of the tree; examples are prefixed with `- `.
    pub fn outline(&self) -> String {
        let mut out = String::new();
        self.write_outline(&mut out, 0);
        out.truncate(out.trim_end().len());
        out
    }

    fn write_outline(&self, out: &mut String, depth: usize) {
        let indent = "  ".repeat(depth);
        match self {
            TestNode::Container(container) => {
                // Writing to String cannot fail.
                let _ = writeln!(out, "{indent}{}", container.display_name);
                for child in &container.children {
                    child.write_outline(out, depth + 1);
                }
            }
            TestNode::Leaf(leaf) => {
                let _ = writeln!(out, "{indent}- {}", leaf.display_name());
            }
        }
    }
}

impl Container {
    pub fn display_name(&self) -> &str {
        &self.display_name
    }

    pub fn children(&self) -> &[TestNode] {
        &self.children
    }
}

impl Leaf {
    pub fn display_name(&self) -> &str {
        &self.tree.example(self.example).display_name
    }

    /// The description exactly as passed to `it`.
    pub fn description(&self) -> &str {
        &self.tree.example(self.example).description
    }

    pub fn grouping_key(&self) -> Option<&str> {
        self.tree.naming.grouping_key()
    }

    /// Run the example, returning body and cleanup failures instead of panicking.
    pub fn try_run(&self) -> Result<(), ExampleFailure> {
        run_example(&self.tree, self.example)
    }

    /// Run the example the way a test harness expects: a failing body re-raises its original panic after cleanup.
    ///
    /// # Panics
    ///
    /// Re-raises the body's panic; if only cleanup failed, panics with the cleanup failures.
    pub fn run(&self) {
        match self.try_run() {
            Ok(()) => {}
            Err(ExampleFailure::Body { body, cleanup, .. }) => {
                for failure in &cleanup {
                    tracing::warn!(%failure, "cleanup also failed");
                }
                panic::resume_unwind(body.into_inner());
            }
            Err(failure @ ExampleFailure::Cleanup { .. }) => panic!("{failure}"),
        }
    }
}

impl fmt::Debug for Leaf {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Leaf")
            .field("display_name", &self.display_name())
            .field("grouping_key", &self.grouping_key())
            .finish()
    }
}
