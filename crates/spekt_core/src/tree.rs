//! Specification tree construction.
//!
//! A tree is built by running a builder closure against a [`Context`] for the root node. `describe`/`context`
//! push child nodes and run nested builders synchronously, `it` registers examples, `support`/`subject` declare
//! collaborators and `refine` specializes them for the current scope. Once the root builder returns the arena
//! is frozen into an immutable [`SpecTree`] shared by every leaf.
//!
//! ## Build errors
//!
//! Invalid usage is reported synchronously by the offending call and also latched on the builder; the root build
//! fails with the first latched error, so an ignored `Result` cannot slip through.

use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};

use crate::collaborator::{Collaborator, CollaboratorDef, CollaboratorId, ErasedCollaborator, Role};
use crate::errors::{SpecError, SpecResult};
use crate::execution::ExecutionContext;
use crate::naming::NamingMode;
use crate::node::TestNode;

static NEXT_SPEC_ID: AtomicU64 = AtomicU64::new(1);

/// Identity of one built specification; handles from other specifications are rejected.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct SpecId(pub(crate) u64);

impl SpecId {
    fn next() -> Self {
        SpecId(NEXT_SPEC_ID.fetch_add(1, Ordering::Relaxed))
    }
}

/// Index of a context node within its tree.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct NodeId(pub(crate) usize);

impl NodeId {
    pub(crate) fn index(self) -> usize {
        self.0
    }
}

/// Index of an example within its tree.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct ExampleId(pub(crate) usize);

pub(crate) type ExampleBody = Box<dyn Fn(&ExecutionContext) + Send + Sync>;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum ChildRef {
    Container(NodeId),
    Example(ExampleId),
}

pub(crate) struct NodeData {
    pub(crate) name: String,
    pub(crate) parent: Option<NodeId>,
    /// Root first, this node last.
    pub(crate) ancestors: Vec<NodeId>,
    pub(crate) children: Vec<ChildRef>,
}

pub(crate) struct ExampleData {
    pub(crate) description: String,
    pub(crate) display_name: String,
    pub(crate) owner: NodeId,
    pub(crate) body: ExampleBody,
}

/// A frozen specification: nodes, examples and collaborator definitions.
///
/// Immutable after construction and `Send + Sync`, so leaves may be run from any thread.
pub struct SpecTree {
    pub(crate) id: SpecId,
    pub(crate) naming: NamingMode,
    pub(crate) nodes: Vec<NodeData>,
    pub(crate) examples: Vec<ExampleData>,
    pub(crate) collaborators: Vec<Box<dyn ErasedCollaborator>>,
}

impl SpecTree {
    pub fn id(&self) -> SpecId {
        self.id
    }

    pub fn naming(&self) -> NamingMode {
        self.naming
    }

    pub fn collaborator_count(&self) -> usize {
        self.collaborators.len()
    }

    pub(crate) fn node(&self, id: NodeId) -> &NodeData {
        &self.nodes[id.index()]
    }

    pub(crate) fn example(&self, id: ExampleId) -> &ExampleData {
        &self.examples[id.0]
    }

    /// Names of `node` and its ancestors, root first.
    pub(crate) fn path(&self, node: NodeId) -> impl Iterator<Item = &str> {
        self.node(node).ancestors.iter().map(|id| self.node(*id).name.as_str())
    }

    pub(crate) fn describe_collaborator(&self, id: CollaboratorId) -> String {
        let def = &self.collaborators[id.index()];
        format!("{} #{}: {}", def.role(), id.index(), def.type_name())
    }
}

/// Return value of a builder closure: either `()` or a `SpecResult<()>`.
pub trait BuildOutcome {
    fn into_result(self) -> SpecResult<()>;
}

impl BuildOutcome for () {
    fn into_result(self) -> SpecResult<()> {
        Ok(())
    }
}

impl BuildOutcome for Result<(), SpecError> {
    fn into_result(self) -> SpecResult<()> {
        self
    }
}

struct TreeBuilder {
    id: SpecId,
    naming: NamingMode,
    nodes: Vec<NodeData>,
    examples: Vec<ExampleData>,
    collaborators: Vec<Box<dyn ErasedCollaborator>>,
    error: Option<SpecError>,
}

impl TreeBuilder {
    fn new(naming: NamingMode) -> Self {
        Self {
            id: SpecId::next(),
            naming,
            nodes: Vec::new(),
            examples: Vec::new(),
            collaborators: Vec::new(),
            error: None,
        }
    }

    fn push_node(&mut self, name: String, parent: Option<NodeId>) -> NodeId {
        let id = NodeId(self.nodes.len());
        let mut ancestors = parent
            .map(|parent| self.nodes[parent.index()].ancestors.clone())
            .unwrap_or_default();
        ancestors.push(id);
        self.nodes.push(NodeData {
            name,
            parent,
            ancestors,
            children: Vec::new(),
        });
        if let Some(parent) = parent {
            self.nodes[parent.index()].children.push(ChildRef::Container(id));
        }
        id
    }

    fn path_string(&self, node: NodeId) -> String {
        self.nodes[node.index()]
            .ancestors
            .iter()
            .map(|id| self.nodes[id.index()].name.as_str())
            .collect::<Vec<_>>()
            .join(" ")
    }

    /// Keep the first error; later ones are usually consequences of it.
    fn latch(&mut self, error: SpecError) {
        if self.error.is_none() {
            self.error = Some(error);
        }
    }

    fn declare<T: 'static>(&mut self, node: NodeId, role: Role, def: CollaboratorDef<T>) -> Collaborator<T> {
        let id = CollaboratorId(self.collaborators.len());
        self.collaborators.push(Box::new(def));
        tracing::trace!(collaborator = id.index(), %role, context = %self.nodes[node.index()].name, "declared collaborator");
        Collaborator::new(self.id, id, role)
    }

    fn refine<T: 'static>(
        &mut self,
        node: NodeId,
        handle: &Collaborator<T>,
        refinement: crate::collaborator::Refinement<T>,
    ) -> SpecResult<()> {
        if handle.spec != self.id || handle.id.index() >= self.collaborators.len() {
            return Err(SpecError::ForeignCollaborator {
                handle: handle.to_string(),
            });
        }
        let declared_in = self.collaborators[handle.id.index()].declared_in();
        if !self.nodes[node.index()].ancestors.contains(&declared_in) {
            return Err(SpecError::OutOfScope {
                handle: handle.to_string(),
                declared_in: self.path_string(declared_in),
                context: self.path_string(node),
            });
        }
        let Some(def) = self.collaborators[handle.id.index()]
            .as_any_mut()
            .downcast_mut::<CollaboratorDef<T>>()
        else {
            return Err(SpecError::ForeignCollaborator {
                handle: handle.to_string(),
            });
        };
        def.refine(node, refinement);
        Ok(())
    }

    fn finish(self) -> Arc<SpecTree> {
        Arc::new(SpecTree {
            id: self.id,
            naming: self.naming,
            nodes: self.nodes,
            examples: self.examples,
            collaborators: self.collaborators,
        })
    }
}

/// Build-time view of one context node (the root, or a `describe`/`context` block).
///
/// Only exists while builder closures run; example bodies receive an [`ExecutionContext`] instead, which has no
/// tree-building operations. A `Context` cannot be smuggled into an example body:
///
/// ```compile_fail
/// use spekt_core::{NamingMode, build_spec};
///
/// build_spec("Widget", NamingMode::Nested, |s| {
///     s.it("nests", |_cx| {
///         s.it("inside a running example", |_| {});
///     });
/// });
/// ```
pub struct Context<'b> {
    builder: &'b mut TreeBuilder,
    node: NodeId,
}

impl Context<'_> {
    /// Local name of this context.
    pub fn name(&self) -> &str {
        &self.builder.nodes[self.node.index()].name
    }

    pub fn naming(&self) -> NamingMode {
        self.builder.naming
    }

    /// Local name of the enclosing context; `None` at the root.
    pub fn parent_name(&self) -> Option<&str> {
        let nodes = &self.builder.nodes;
        nodes[self.node.index()]
            .parent
            .map(|parent| nodes[parent.index()].name.as_str())
    }

    /// Names of this context and its ancestors, root first.
    pub fn path(&self) -> Vec<&str> {
        self.builder.nodes[self.node.index()]
            .ancestors
            .iter()
            .map(|id| self.builder.nodes[id.index()].name.as_str())
            .collect()
    }

    /// Define a nested specification for a particular thing (e.g. `"#push"`).
    ///
    /// The builder runs before this call returns. If it returns an error, the error is latched and the whole
    /// specification fails to build.
    pub fn describe<F, R>(&mut self, what: impl Into<String>, spec: F)
    where
        F: FnOnce(&mut Context<'_>) -> R,
        R: BuildOutcome,
    {
        let child = self.builder.push_node(what.into(), Some(self.node));
        let outcome = spec(&mut Context {
            builder: &mut *self.builder,
            node: child,
        })
        .into_result();
        if let Err(err) = outcome {
            tracing::debug!(context = %self.builder.path_string(child), error = %err, "builder failed");
            self.builder.latch(err);
        }
    }

    /// Define a nested specification for a particular situation (e.g. `"when empty"`); alias of
    /// [`describe`](Self::describe).
    pub fn context<F, R>(&mut self, case: impl Into<String>, spec: F)
    where
        F: FnOnce(&mut Context<'_>) -> R,
        R: BuildOutcome,
    {
        self.describe(case, spec);
    }

    /// Register an example. The body runs later, once per run, under a fresh [`ExecutionContext`].
    pub fn it<F>(&mut self, description: impl Into<String>, body: F)
    where
        F: Fn(&ExecutionContext) + Send + Sync + 'static,
    {
        let description = description.into();
        let display_name = {
            let nodes = &self.builder.nodes;
            let path = nodes[self.node.index()]
                .ancestors
                .iter()
                .map(|id| nodes[id.index()].name.as_str());
            self.builder.naming.example_name(path, &description)
        };
        let id = ExampleId(self.builder.examples.len());
        self.builder.examples.push(ExampleData {
            description,
            display_name,
            owner: self.node,
            body: Box::new(body),
        });
        self.builder.nodes[self.node.index()]
            .children
            .push(ChildRef::Example(id));
    }

    /// Define a refinable supporting collaborator, built at most once per example run.
    pub fn support<T, F>(&mut self, constructor: F) -> Collaborator<T>
    where
        T: 'static,
        F: Fn(&ExecutionContext) -> T + Send + Sync + 'static,
    {
        self.declare(Role::Support, Box::new(constructor), None)
    }

    /// Like [`support`](Self::support), with a destructor called once after the example with the refined value.
    pub fn support_with<T, F, D>(&mut self, constructor: F, destructor: D) -> Collaborator<T>
    where
        T: 'static,
        F: Fn(&ExecutionContext) -> T + Send + Sync + 'static,
        D: Fn(&ExecutionContext, T) + Send + Sync + 'static,
    {
        self.declare(Role::Support, Box::new(constructor), Some(Box::new(destructor)))
    }

    /// Define a refinable subject under test; behaves exactly like [`support`](Self::support).
    pub fn subject<T, F>(&mut self, constructor: F) -> Collaborator<T>
    where
        T: 'static,
        F: Fn(&ExecutionContext) -> T + Send + Sync + 'static,
    {
        self.declare(Role::Subject, Box::new(constructor), None)
    }

    /// Subject with an explicit destructor; see [`support_with`](Self::support_with).
    pub fn subject_with<T, F, D>(&mut self, constructor: F, destructor: D) -> Collaborator<T>
    where
        T: 'static,
        F: Fn(&ExecutionContext) -> T + Send + Sync + 'static,
        D: Fn(&ExecutionContext, T) + Send + Sync + 'static,
    {
        self.declare(Role::Subject, Box::new(constructor), Some(Box::new(destructor)))
    }

    fn declare<T: 'static>(
        &mut self,
        role: Role,
        initializer: crate::collaborator::Initializer<T>,
        destructor: Option<crate::collaborator::Destructor<T>>,
    ) -> Collaborator<T> {
        let def = CollaboratorDef::new(role, self.node, initializer, destructor);
        self.builder.declare(self.node, role, def)
    }

    /// Replace a collaborator's value with the result of `refinement`, for examples in this context and below.
    ///
    /// Refinements run after the initializer, outermost context first; several refinements registered by one
    /// context run in registration order, each seeing the previous result.
    ///
    /// Only handles returned by `support`/`subject` qualify; anything else is a type error:
    ///
    /// ```compile_fail
    /// use spekt_core::{NamingMode, build_spec};
    ///
    /// build_spec("Widget", NamingMode::Nested, |s| {
    ///     let plain = |_: &spekt_core::ExecutionContext| 1;
    ///     let _ = s.refine(&plain, |_, v| v + 1);
    /// });
    /// ```
    ///
    /// Handles from another specification, or declared in a context that does not enclose this one, are rejected
    /// with an invalid-argument [`SpecError`].
    pub fn refine<T, F>(&mut self, collaborator: &Collaborator<T>, refinement: F) -> SpecResult<()>
    where
        T: 'static,
        F: Fn(&ExecutionContext, T) -> T + Send + Sync + 'static,
    {
        let result = self.builder.refine(self.node, collaborator, Box::new(refinement));
        if let Err(err) = &result {
            tracing::debug!(error = %err, "rejected refinement");
            self.builder.latch(err.clone());
        }
        result
    }
}

/// Build a specification rooted at `name` and return its root container.
///
/// ```
/// use spekt_core::{NamingMode, build_spec};
///
/// let root = build_spec("Counter", NamingMode::Nested, |s| {
///     let start = s.support(|_| 0_u32);
///     s.it("starts at zero", move |cx| assert_eq!(*start.get(cx), 0));
///     s.context("after one increment", |s| {
///         s.refine(&start, |_, n| n + 1).expect("declared above");
///         s.it("is one", move |cx| assert_eq!(*start.get(cx), 1));
///     });
/// })
/// .expect("valid specification");
///
/// for leaf in root.leaves() {
///     leaf.run();
/// }
/// ```
#[tracing::instrument(skip_all, fields(naming = ?naming))]
pub fn build_spec<F, R>(name: impl Into<String>, naming: NamingMode, spec: F) -> SpecResult<TestNode>
where
    F: FnOnce(&mut Context<'_>) -> R,
    R: BuildOutcome,
{
    let mut builder = TreeBuilder::new(naming);
    let root = builder.push_node(name.into(), None);
    let outcome = spec(&mut Context {
        builder: &mut builder,
        node: root,
    })
    .into_result();
    if let Some(err) = builder.error.take() {
        return Err(err);
    }
    outcome?;

    let tree = builder.finish();
    tracing::debug!(
        spec = %tree.node(root).name,
        contexts = tree.nodes.len(),
        examples = tree.examples.len(),
        collaborators = tree.collaborators.len(),
        "built specification"
    );
    Ok(TestNode::materialize(&tree, root))
}
