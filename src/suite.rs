//! Aggregation of many specifications into one list of test roots.

use spekt_core::{BuildOutcome, Context, Leaf, SpecResult, TestNode};

use crate::config::SpecConfig;
use crate::describe::{describe_with, simple_type_name};

/// All specifications of one unit (a test file, a module), in declaration order.
///
/// ```
/// use spekt::Suite;
///
/// struct Parser;
/// struct Lexer;
///
/// let mut suite = Suite::new();
/// suite.describe::<Parser>(|s| s.it("parses", |_| {})).unwrap();
/// suite.describe::<Lexer>(|s| s.it("lexes", |_| {})).unwrap();
///
/// let names: Vec<_> = suite.tests().iter().map(|root| root.display_name()).collect();
/// assert_eq!(names, ["Parser", "Lexer"]);
/// ```
#[derive(Debug, Clone, Default)]
pub struct Suite {
    config: SpecConfig,
    roots: Vec<TestNode>,
}

impl Suite {
    pub fn new() -> Self {
        Self::default()
    }

    /// Suite whose specifications use `config` unless they pass their own.
    pub fn with_config(config: SpecConfig) -> Self {
        Self {
            config,
            roots: Vec::new(),
        }
    }

    pub fn config(&self) -> &SpecConfig {
        &self.config
    }

    /// Add a specification for `T`. On error nothing is added.
    pub fn describe<T: ?Sized>(&mut self, spec: impl FnOnce(&mut Context<'_>)) -> SpecResult<()> {
        self.describe_named(simple_type_name::<T>(), spec)
    }

    /// Add a specification with an explicit root name.
    pub fn describe_named<F, R>(&mut self, name: impl Into<String>, spec: F) -> SpecResult<()>
    where
        F: FnOnce(&mut Context<'_>) -> R,
        R: BuildOutcome,
    {
        self.describe_with(name, self.config, spec)
    }

    /// Add a specification with its own configuration.
    pub fn describe_with<F, R>(&mut self, name: impl Into<String>, config: SpecConfig, spec: F) -> SpecResult<()>
    where
        F: FnOnce(&mut Context<'_>) -> R,
        R: BuildOutcome,
    {
        let root = describe_with(name, config, spec).inspect_err(|err| {
            tracing::debug!(error = %err, "specification not added to suite");
        })?;
        tracing::debug!(spec = root.display_name(), examples = root.leaves().len(), "added specification");
        self.roots.push(root);
        Ok(())
    }

    /// One root container per specification.
    pub fn tests(&self) -> &[TestNode] {
        &self.roots
    }

    pub fn into_tests(self) -> Vec<TestNode> {
        self.roots
    }

    /// Every example of every specification, in declaration order.
    pub fn leaves(&self) -> Vec<&Leaf> {
        self.roots.iter().flat_map(TestNode::leaves).collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use spekt_core::{NamingMode, SpecError};

    struct Widget;

    #[test]
    fn suite_collects_roots_in_order() {
        let mut suite = Suite::new();
        suite.describe::<Widget>(|_| {}).unwrap();
        suite.describe_named("Gadget", |_| {}).unwrap();
        let names: Vec<_> = suite.tests().iter().map(TestNode::display_name).collect();
        assert_eq!(names, vec!["Widget", "Gadget"]);
    }

    #[test]
    fn failed_specifications_are_not_added() {
        let mut suite = Suite::new();
        let err = suite
            .describe_named("Broken", |_| Err::<(), _>(SpecError::build("Broken", "no fixtures")))
            .unwrap_err();
        assert_eq!(err, SpecError::build("Broken", "no fixtures"));
        assert!(suite.tests().is_empty());
    }

    #[test]
    fn suite_config_applies_to_every_specification() {
        let mut suite = Suite::with_config(SpecConfig::new().with_naming_mode(NamingMode::Flat));
        suite.describe::<Widget>(|s| s.it("works", |_| {})).unwrap();
        suite
            .describe_with(
                "Gadget",
                SpecConfig::new().with_naming_mode(NamingMode::Nested),
                |s| s.it("works", |_| {}),
            )
            .unwrap();
        let names: Vec<_> = suite.leaves().into_iter().map(Leaf::display_name).collect();
        assert_eq!(names, vec!["Widget works", "works"]);
        assert_eq!(suite.config().naming, NamingMode::Flat);
    }
}
