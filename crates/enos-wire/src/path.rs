//! Attribute paths used to point diagnostics at a specific input

use std::fmt;

use serde::{Deserialize, Serialize};

/// A single step in an [`AttributePath`]
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PathStep {
    /// Named attribute of an object
    Attribute(String),
    /// Key of a map element
    ElementKey(String),
    /// Index of a list element
    ElementIndex(usize),
}

/// Location of an attribute inside a resource or provider configuration
///
/// Displayed in the dotted form the host shows to users, e.g.
/// `transport.ssh.private_key` or `inline[2]`.
#[derive(Debug, Clone, Default, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct AttributePath(Vec<PathStep>);

impl AttributePath {
    /// The empty path, addressing the whole value
    #[must_use]
    pub fn root() -> Self {
        Self(Vec::new())
    }

    /// A path with a single attribute step
    pub fn new(name: impl Into<String>) -> Self {
        Self(vec![PathStep::Attribute(name.into())])
    }

    /// Extend the path with an attribute step
    #[must_use]
    pub fn attr(&self, name: impl Into<String>) -> Self {
        self.with(PathStep::Attribute(name.into()))
    }

    /// Extend the path with a list index step
    #[must_use]
    pub fn index(&self, index: usize) -> Self {
        self.with(PathStep::ElementIndex(index))
    }

    /// Extend the path with a map key step
    #[must_use]
    pub fn key(&self, key: impl Into<String>) -> Self {
        self.with(PathStep::ElementKey(key.into()))
    }

    /// Steps in order from the root
    #[must_use]
    pub fn steps(&self) -> &[PathStep] {
        &self.0
    }

    /// Whether this is the root path
    #[must_use]
    pub fn is_root(&self) -> bool {
        self.0.is_empty()
    }

    /// Name of the last attribute step, if any
    #[must_use]
    pub fn last_attribute(&self) -> Option<&str> {
        self.0.iter().rev().find_map(|step| match step {
            PathStep::Attribute(name) => Some(name.as_str()),
            _ => None,
        })
    }

    /// Whether `self` starts with every step of `prefix`
    #[must_use]
    pub fn starts_with(&self, prefix: &AttributePath) -> bool {
        self.0.starts_with(&prefix.0)
    }

    fn with(&self, step: PathStep) -> Self {
        let mut steps = self.0.clone();
        steps.push(step);
        Self(steps)
    }
}

impl fmt::Display for AttributePath {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.0.is_empty() {
            return f.write_str("<root>");
        }

        for (i, step) in self.0.iter().enumerate() {
            match step {
                PathStep::Attribute(name) => {
                    if i > 0 {
                        f.write_str(".")?;
                    }
                    f.write_str(name)?;
                }
                PathStep::ElementKey(key) => write!(f, "[{key:?}]")?,
                PathStep::ElementIndex(index) => write!(f, "[{index}]")?,
            }
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_display_dotted() {
        let path = AttributePath::new("transport").attr("ssh").attr("not_an_arg");
        assert_eq!(path.to_string(), "transport.ssh.not_an_arg");
    }

    #[test]
    fn test_display_elements() {
        let path = AttributePath::new("inline").index(2);
        assert_eq!(path.to_string(), "inline[2]");

        let path = AttributePath::new("env").key("HOME");
        assert_eq!(path.to_string(), "env[\"HOME\"]");
    }

    #[test]
    fn test_root_and_prefix() {
        let root = AttributePath::root();
        assert!(root.is_root());
        assert_eq!(root.to_string(), "<root>");

        let transport = AttributePath::new("transport");
        let host = transport.attr("ssh").attr("host");
        assert!(host.starts_with(&transport));
        assert!(!transport.starts_with(&host));
        assert_eq!(host.last_attribute(), Some("host"));
    }
}
