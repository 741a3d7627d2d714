//! Top-level entry points for building specifications.

use std::any;

use spekt_core::{BuildOutcome, Context, SpecResult, TestNode, build_spec};

use crate::config::SpecConfig;

/// Build a specification for `T`, named after its simple type name, using the default [`SpecConfig`].
///
/// ```
/// struct Stack(Vec<u8>);
///
/// let root = spekt::describe::<Stack>(|s| {
///     let stack = s.subject(|_| Stack(Vec::new()));
///     s.it("starts empty", move |cx| assert!(stack.get(cx).0.is_empty()));
/// })
/// .expect("valid specification");
///
/// assert_eq!(root.display_name(), "Stack");
/// ```
pub fn describe<T: ?Sized>(spec: impl FnOnce(&mut Context<'_>)) -> SpecResult<TestNode> {
    describe_with(simple_type_name::<T>(), SpecConfig::default(), spec)
}

/// Build a specification with an explicit root name, using the default [`SpecConfig`].
pub fn describe_named<F, R>(name: impl Into<String>, spec: F) -> SpecResult<TestNode>
where
    F: FnOnce(&mut Context<'_>) -> R,
    R: BuildOutcome,
{
    describe_with(name, SpecConfig::default(), spec)
}

/// Build a specification with an explicit root name and configuration.
pub fn describe_with<F, R>(name: impl Into<String>, config: SpecConfig, spec: F) -> SpecResult<TestNode>
where
    F: FnOnce(&mut Context<'_>) -> R,
    R: BuildOutcome,
{
    build_spec(name, config.naming, spec)
}

/// `T`'s type name without module path or generic arguments (`alloc::vec::Vec<u8>` becomes `Vec`).
///
/// Tuples, arrays, slices, references and pointers have no single path to strip and keep their full type name.
pub fn simple_type_name<T: ?Sized>() -> &'static str {
    let full = any::type_name::<T>();
    if full.starts_with(['(', '[', '&', '*']) {
        return full;
    }
    let without_generics = full.split('<').next().unwrap_or(full);
    without_generics.rsplit("::").next().unwrap_or(without_generics)
}
