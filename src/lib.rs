#![forbid(unsafe_code)]
#![cfg_attr(not(test), deny(clippy::unwrap_used))]
//! Nested `describe`/`context`/`it` specifications with scoped, refinable collaborators.
//!
//! ```
//! struct Stack(Vec<u32>);
//!
//! let root = spekt::describe::<Stack>(|s| {
//!     let contents = s.support(|_| Vec::<u32>::new());
//!     let stack = s.subject(move |cx| Stack(contents.get(cx).clone()));
//!
//!     s.it("starts empty", move |cx| assert!(stack.get(cx).0.is_empty()));
//!
//!     s.context("with one element", |s| {
//!         s.refine(&contents, |_, mut v| {
//!             v.push(7);
//!             v
//!         })
//!         .expect("declared in an enclosing context");
//!         s.it("is not empty", move |cx| assert_eq!(stack.get(cx).0, [7]));
//!     });
//! })
//! .expect("valid specification");
//!
//! for leaf in root.leaves() {
//!     leaf.run();
//! }
//! ```
//!
//! The tree engine lives in [`spekt_core`]; this crate adds the entry points, configuration and suites. Hosting
//! the resulting tree (discovery, reporting) is left to the test harness.
//!
//! ## Panic Policy
//!
//! Build-time misuse is reported as [`SpecError`]. Example failures are panics, caught per example by
//! [`Leaf::try_run`]. True invariants use `.expect("INVARIANT: reason")`.

pub mod config;
pub mod describe;
pub mod suite;

pub use config::{FLAT_NAMESPACE_ENV, SpecConfig};
pub use describe::{describe, describe_named, describe_with, simple_type_name};
pub use suite::Suite;

pub use spekt_core::{
    BuildOutcome, CleanupFailure, Collaborator, Container, Context, ExampleFailure, ExecutionContext,
    FLAT_GROUPING_KEY, Leaf, NamingMode, PanicPayload, Role, SpecError, SpecResult, SpecTree, TestNode, build_spec,
};

/// Render a diagnostic (such as a [`SpecError`]) with its code and help text, without colors.
pub fn render_diagnostic(diagnostic: &dyn miette::Diagnostic) -> String {
    let handler = miette::GraphicalReportHandler::new_themed(miette::GraphicalTheme::unicode_nocolor());
    let mut out = String::new();
    // Writing to a String cannot fail.
    let _ = handler.render_report(&mut out, diagnostic);
    out
}
