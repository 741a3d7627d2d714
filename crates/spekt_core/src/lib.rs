#![forbid(unsafe_code)]
#![cfg_attr(not(test), deny(clippy::unwrap_used))]
//! Specification trees with scoped, refinable collaborators.
//!
//! A specification is built by a closure that receives a [`Context`]. Inside it, `describe`/`context` nest
//! further contexts, `it` registers examples, `support`/`subject` declare lazily built fixture values
//! ([`Collaborator`]s) and `refine` overrides a collaborator for the current context and everything nested in it.
//!
//! The result is a tree of [`TestNode`]s. Each [`Leaf`] runs its example under a fresh [`ExecutionContext`], which
//! memoizes collaborators for that run only and cleans every resolved collaborator up afterwards, even when the
//! example panics.
//!
//! ## Panic Policy
//!
//! Library code returns `Result` for build-time misuse. Run-time misuse inside an example body (resolving a handle
//! from another specification, a collaborator that depends on itself) panics, which fails that example like any
//! assertion would. True invariants use `.expect("INVARIANT: reason")`.

pub mod collaborator;
pub mod errors;
pub mod execution;
pub mod naming;
pub mod node;
pub mod tree;

pub use collaborator::{Collaborator, Role};
pub use errors::{CleanupFailure, ExampleFailure, PanicPayload, SpecError, SpecResult};
pub use execution::ExecutionContext;
pub use naming::{FLAT_GROUPING_KEY, NamingMode};
pub use node::{Container, Leaf, TestNode};
pub use tree::{BuildOutcome, Context, SpecTree, build_spec};
