//! Collaborators: lazily built, memoized, refinable fixture values.
//!
//! `support`/`subject` hand out a [`Collaborator<T>`] token. The definition behind it (initializer, optional
//! destructor, refinements keyed by the context that registered them) lives in the specification tree and is
//! read-only once the tree is built.

use std::any::{self, Any};
use std::collections::HashMap;
use std::fmt;
use std::marker::PhantomData;

use crate::execution::ExecutionContext;
use crate::tree::{NodeId, SpecId};

pub(crate) type Initializer<T> = Box<dyn Fn(&ExecutionContext) -> T + Send + Sync>;
pub(crate) type Refinement<T> = Box<dyn Fn(&ExecutionContext, T) -> T + Send + Sync>;
pub(crate) type Destructor<T> = Box<dyn Fn(&ExecutionContext, T) + Send + Sync>;

/// Whether a collaborator was declared as a supporting fixture or as the subject under test.
///
/// Purely descriptive; both behave identically.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Role {
    Support,
    Subject,
}

impl fmt::Display for Role {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Role::Support => f.write_str("support"),
            Role::Subject => f.write_str("subject"),
        }
    }
}

/// Index of a collaborator within its specification tree.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct CollaboratorId(pub(crate) usize);

impl CollaboratorId {
    pub(crate) fn index(self) -> usize {
        self.0
    }
}

/// Typed handle to a collaborator declared with `support` or `subject`.
///
/// The handle is `Copy` so it can be captured by any number of example bodies and refinements. Resolve it inside an
/// example with [`Collaborator::get`] or [`ExecutionContext::get`].
pub struct Collaborator<T> {
    pub(crate) spec: SpecId,
    pub(crate) id: CollaboratorId,
    pub(crate) role: Role,
    _marker: PhantomData<fn() -> T>,
}

impl<T> Collaborator<T> {
    pub(crate) fn new(spec: SpecId, id: CollaboratorId, role: Role) -> Self {
        Self {
            spec,
            id,
            role,
            _marker: PhantomData,
        }
    }

    pub fn role(&self) -> Role {
        self.role
    }
}

impl<T: 'static> Collaborator<T> {
    /// Resolve this collaborator for the running example (memoized per example run).
    #[track_caller]
    pub fn get<'c>(&self, cx: &'c ExecutionContext) -> &'c T {
        cx.get(self)
    }
}

impl<T> Clone for Collaborator<T> {
    fn clone(&self) -> Self {
        *self
    }
}

impl<T> Copy for Collaborator<T> {}

impl<T> fmt::Debug for Collaborator<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Collaborator")
            .field("spec", &self.spec)
            .field("id", &self.id)
            .field("role", &self.role)
            .field("type", &any::type_name::<T>())
            .finish()
    }
}

impl<T> fmt::Display for Collaborator<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} #{}: {}", self.role, self.id.0, any::type_name::<T>())
    }
}

/// Definition stored in the tree for one collaborator.
pub(crate) struct CollaboratorDef<T> {
    role: Role,
    declared_in: NodeId,
    initializer: Initializer<T>,
    destructor: Option<Destructor<T>>,
    refinements: HashMap<NodeId, Vec<Refinement<T>>>,
}

impl<T: 'static> CollaboratorDef<T> {
    pub(crate) fn new(
        role: Role,
        declared_in: NodeId,
        initializer: Initializer<T>,
        destructor: Option<Destructor<T>>,
    ) -> Self {
        Self {
            role,
            declared_in,
            initializer,
            destructor,
            refinements: HashMap::new(),
        }
    }

    /// Append a refinement registered by `context`; refinements of one context apply in registration order.
    pub(crate) fn refine(&mut self, context: NodeId, refinement: Refinement<T>) {
        self.refinements.entry(context).or_default().push(refinement);
    }

    /// Run the initializer, then fold in the refinements of every ancestor of the running example, root first.
    pub(crate) fn produce(&self, cx: &ExecutionContext) -> T {
        let mut value = (self.initializer)(cx);
        for ancestor in cx.ancestors() {
            if let Some(refinements) = self.refinements.get(ancestor) {
                for refinement in refinements {
                    value = refinement(cx, value);
                }
            }
        }
        value
    }
}

/// Type-erased view of a [`CollaboratorDef`] so definitions of different `T` share one table.
pub(crate) trait ErasedCollaborator: Send + Sync {
    fn as_any(&self) -> &dyn Any;

    fn as_any_mut(&mut self) -> &mut dyn Any;

    fn role(&self) -> Role;

    fn declared_in(&self) -> NodeId;

    fn type_name(&self) -> &'static str;

    /// Release a memoized value: the explicit destructor if there is one, otherwise the value's `Drop`.
    fn dispose(&self, cx: &ExecutionContext, value: Box<dyn Any>);
}

impl<T: 'static> ErasedCollaborator for CollaboratorDef<T> {
    fn as_any(&self) -> &dyn Any {
        self
    }

    fn as_any_mut(&mut self) -> &mut dyn Any {
        self
    }

    fn role(&self) -> Role {
        self.role
    }

    fn declared_in(&self) -> NodeId {
        self.declared_in
    }

    fn type_name(&self) -> &'static str {
        any::type_name::<T>()
    }

    fn dispose(&self, cx: &ExecutionContext, value: Box<dyn Any>) {
        match (value.downcast::<T>(), &self.destructor) {
            (Ok(value), Some(destructor)) => destructor(cx, *value),
            (Ok(value), None) => drop(value),
            (Err(_), _) => {
                tracing::error!(
                    collaborator = any::type_name::<T>(),
                    "memoized value has an unexpected type; dropping it"
                );
            }
        }
    }
}
