//! Display names for containers and examples.
//!
//! In [`NamingMode::Nested`] every node keeps its local name. In [`NamingMode::Flat`] an example is named by its
//! whole context path (`"Stack when empty pops nothing"`) and carries [`FLAT_GROUPING_KEY`], so hosts that cannot
//! render nested containers can still group the examples of one specification together.

/// Grouping key attached to every example of a flat-namespace specification.
pub const FLAT_GROUPING_KEY: &str = "flat";

/// How node display names are derived; fixed for a whole tree when its root is created.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Hash)]
pub enum NamingMode {
    #[default]
    Nested,
    Flat,
}

impl NamingMode {
    pub fn is_flat(self) -> bool {
        self == NamingMode::Flat
    }

    /// Display name of a container; the local name in both modes.
    pub fn container_name(self, name: &str) -> String {
        name.to_string()
    }

    /// Display name of an example declared under `context_path` (root first).
    pub fn example_name<'a, I>(self, context_path: I, description: &str) -> String
    where
        I: IntoIterator<Item = &'a str>,
    {
        match self {
            NamingMode::Nested => description.to_string(),
            NamingMode::Flat => {
                let mut name = String::new();
                for segment in context_path {
                    name.push_str(segment);
                    name.push(' ');
                }
                name.push_str(description);
                name
            }
        }
    }

    /// Grouping key for examples; containers never carry one.
    pub fn grouping_key(self) -> Option<&'static str> {
        match self {
            NamingMode::Nested => None,
            NamingMode::Flat => Some(FLAT_GROUPING_KEY),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn nested_mode_uses_the_raw_description() {
        let name = NamingMode::Nested.example_name(["Subject", "noo"], "does");
        assert_eq!(name, "does");
        assert_eq!(NamingMode::Nested.grouping_key(), None);
    }

    #[test]
    fn flat_mode_joins_the_context_path() {
        let name = NamingMode::Flat.example_name(["Subject", "noo"], "does");
        assert_eq!(name, "Subject noo does");
        assert_eq!(NamingMode::Flat.grouping_key(), Some("flat"));
    }

    #[test]
    fn flat_mode_at_the_root() {
        assert_eq!(NamingMode::Flat.example_name(["Subject"], "does"), "Subject does");
    }

    #[test]
    fn containers_keep_local_names() {
        assert_eq!(NamingMode::Flat.container_name("when empty"), "when empty");
        assert_eq!(NamingMode::Nested.container_name("when empty"), "when empty");
    }

    #[test]
    fn default_is_nested() {
        assert_eq!(NamingMode::default(), NamingMode::Nested);
        assert!(!NamingMode::default().is_flat());
    }
}
