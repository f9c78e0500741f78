//! Factory registry mapping pass type names to constructors.
//!
//! The registry is built once at startup from a fixed manifest:
//!
//! ```
//! use vesper_graphics::error::PassError;
//! use vesper_graphics::graph::{PassRegistration, PassRegistry, Properties, RenderPass};
//!
//! fn create_nothing(_props: &Properties) -> Result<Box<dyn RenderPass>, PassError> {
//!     Err(PassError::msg("not available"))
//! }
//!
//! static MANIFEST: &[PassRegistration] = &[PassRegistration {
//!     type_name: "Nothing",
//!     description: "Never constructs",
//!     create: create_nothing,
//! }];
//!
//! let registry = PassRegistry::from_manifest(MANIFEST);
//! assert!(registry.contains("Nothing"));
//! ```

use std::collections::HashMap;

use crate::error::{GraphError, GraphResult, PassError};

use super::pass::RenderPass;
use super::properties::Properties;

/// Constructor of a registered pass type.
pub type PassConstructor = fn(&Properties) -> Result<Box<dyn RenderPass>, PassError>;

/// One entry of a pass manifest.
#[derive(Debug, Clone, Copy)]
pub struct PassRegistration {
    pub type_name: &'static str,
    pub description: &'static str,
    pub create: PassConstructor,
}

/// Registered pass types, in registration order.
#[derive(Debug, Default, Clone)]
pub struct PassRegistry {
    entries: Vec<PassRegistration>,
    by_name: HashMap<&'static str, usize>,
}

impl PassRegistry {
    /// Create an empty registry.
    pub fn new() -> Self {
        Self::default()
    }

    /// Create a registry holding every entry of `manifest`.
    pub fn from_manifest(manifest: &[PassRegistration]) -> Self {
        let mut registry = Self::new();
        for registration in manifest {
            registry.register(*registration);
        }
        registry
    }

    /// Register a pass type. Returns false if the type name is taken.
    pub fn register(&mut self, registration: PassRegistration) -> bool {
        if self.by_name.contains_key(registration.type_name) {
            log::warn!(
                "Pass type '{}' is already registered, ignoring duplicate",
                registration.type_name
            );
            return false;
        }
        log::debug!("Registered pass type '{}'", registration.type_name);
        self.by_name.insert(registration.type_name, self.entries.len());
        self.entries.push(registration);
        true
    }

    /// Construct a pass of the given type.
    pub fn create(&self, type_name: &str, properties: &Properties) -> GraphResult<Box<dyn RenderPass>> {
        let registration = self
            .get(type_name)
            .ok_or_else(|| GraphError::UnknownPassType(type_name.to_owned()))?;
        (registration.create)(properties).map_err(|source| GraphError::PassCreation {
            type_name: type_name.to_owned(),
            source,
        })
    }

    /// Look up a registration.
    pub fn get(&self, type_name: &str) -> Option<&PassRegistration> {
        self.by_name.get(type_name).map(|&i| &self.entries[i])
    }

    pub fn contains(&self, type_name: &str) -> bool {
        self.by_name.contains_key(type_name)
    }

    /// All registrations in registration order.
    pub fn registered_types(&self) -> impl Iterator<Item = &PassRegistration> + '_ {
        self.entries.iter()
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::graph::{CompileData, RenderContext, RenderData, RenderPassReflection};

    struct Noop;

    impl RenderPass for Noop {
        fn type_name(&self) -> &str {
            "Noop"
        }

        fn reflect(&self, _data: &CompileData) -> Result<RenderPassReflection, PassError> {
            Ok(RenderPassReflection::new())
        }

        fn execute(&mut self, _ctx: &mut RenderContext<'_>, _data: &mut RenderData<'_>) -> Result<(), PassError> {
            Ok(())
        }
    }

    fn create_noop(props: &Properties) -> Result<Box<dyn RenderPass>, PassError> {
        if props.get_bool("fail", false)? {
            return Err(PassError::msg("asked to fail"));
        }
        Ok(Box::new(Noop))
    }

    const NOOP: PassRegistration = PassRegistration {
        type_name: "Noop",
        description: "Does nothing",
        create: create_noop,
    };

    #[test]
    fn test_create_registered() {
        let registry = PassRegistry::from_manifest(&[NOOP]);
        let pass = registry.create("Noop", &Properties::new()).unwrap();
        assert_eq!(pass.type_name(), "Noop");
    }

    #[test]
    fn test_unknown_type() {
        let registry = PassRegistry::new();
        let err = registry.create("Missing", &Properties::new()).err().unwrap();
        assert_eq!(err, GraphError::UnknownPassType("Missing".into()));
    }

    #[test]
    fn test_constructor_failure() {
        let registry = PassRegistry::from_manifest(&[NOOP]);
        let err = registry
            .create("Noop", &Properties::new().with("fail", true))
            .err()
            .unwrap();
        assert!(matches!(err, GraphError::PassCreation { .. }));
    }

    #[test]
    fn test_duplicate_registration() {
        let mut registry = PassRegistry::from_manifest(&[NOOP]);
        assert!(!registry.register(NOOP));
        assert_eq!(registry.len(), 1);
        assert_eq!(registry.registered_types().count(), 1);
    }
}
