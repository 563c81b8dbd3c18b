use crate::codegen::{standard_interfaces, InterfaceBackend};
use crate::integration::OutOfBoundsPolicy;
use crate::parser::keywords::standard_keywords;
use crate::parser::KeywordTable;

/// The keywords the DSL engine understands and the interfaces the generator targets,
/// built once and shared by every compilation.
pub struct Registry {
    keywords: KeywordTable,
    interfaces: Vec<Box<dyn InterfaceBackend>>,
    policy: OutOfBoundsPolicy,
}

impl Default for Registry {
    fn default() -> Self {
        Self::new()
    }
}

impl Registry {
    /// the standard keywords and interfaces, the out of bounds policy baked into the
    /// generated code being read from `MFRONT_OUT_OF_BOUNDS_POLICY`
    pub fn new() -> Self {
        Self {
            keywords: standard_keywords(),
            interfaces: standard_interfaces(),
            policy: OutOfBoundsPolicy::from_env(),
        }
    }

    pub fn with_policy(mut self, policy: OutOfBoundsPolicy) -> Self {
        self.policy = policy;
        self
    }

    pub fn keywords(&self) -> &KeywordTable {
        &self.keywords
    }

    pub fn interface(&self, name: &str) -> Option<&dyn InterfaceBackend> {
        self.interfaces
            .iter()
            .find(|i| i.name() == name)
            .map(|i| i.as_ref())
    }

    pub fn interface_names(&self) -> Vec<&'static str> {
        self.interfaces.iter().map(|i| i.name()).collect()
    }

    pub fn policy(&self) -> OutOfBoundsPolicy {
        self.policy
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn interfaces() {
        let registry = Registry::new();
        assert!(registry.interface("umat").is_some());
        assert!(registry.interface("UMAT").is_none());
        assert_eq!(registry.interface_names().len(), 7);
        assert_eq!(registry.interface_names()[0], "umat");
    }

    #[test]
    fn policy_override() {
        let registry = Registry::new().with_policy(OutOfBoundsPolicy::Strict);
        assert_eq!(registry.policy(), OutOfBoundsPolicy::Strict);
    }
}
