//! Environment variable fallback for transport fields

use std::collections::{BTreeMap, HashMap};

/// Source of environment variables
///
/// Lets tests supply a fixed map instead of mutating the process environment.
pub trait EnvLookup {
    /// Value of `name`; empty values count as unset
    fn var(&self, name: &str) -> Option<String>;
}

/// The real process environment
#[derive(Debug, Clone, Copy, Default)]
pub struct ProcessEnv;

impl EnvLookup for ProcessEnv {
    fn var(&self, name: &str) -> Option<String> {
        std::env::var(name).ok().filter(|v| !v.is_empty())
    }
}

/// An environment with nothing set
#[derive(Debug, Clone, Copy, Default)]
pub struct EmptyEnv;

impl EnvLookup for EmptyEnv {
    fn var(&self, _name: &str) -> Option<String> {
        None
    }
}

impl<S: std::hash::BuildHasher> EnvLookup for HashMap<String, String, S> {
    fn var(&self, name: &str) -> Option<String> {
        self.get(name).filter(|v| !v.is_empty()).cloned()
    }
}

impl EnvLookup for BTreeMap<String, String> {
    fn var(&self, name: &str) -> Option<String> {
        self.get(name).filter(|v| !v.is_empty()).cloned()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_map_lookup_ignores_empty() {
        let env = BTreeMap::from([
            ("ENOS_TRANSPORT_USER".to_string(), "ubuntu".to_string()),
            ("ENOS_TRANSPORT_HOST".to_string(), String::new()),
        ]);
        assert_eq!(env.var("ENOS_TRANSPORT_USER").as_deref(), Some("ubuntu"));
        assert_eq!(env.var("ENOS_TRANSPORT_HOST"), None);
        assert_eq!(EmptyEnv.var("ENOS_TRANSPORT_USER"), None);
    }
}
