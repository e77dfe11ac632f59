//! Namespaced object identity

use kube::{Resource, ResourceExt};
use std::fmt;

/// Namespace and name of an object, the stable identity of a Pod or Service.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct ObjectKey {
    /// Namespace of the object
    pub namespace: String,
    /// Name of the object
    pub name: String,
}

impl ObjectKey {
    /// Create a key from a namespace and a name
    pub fn new(namespace: impl Into<String>, name: impl Into<String>) -> Self {
        Self {
            namespace: namespace.into(),
            name: name.into(),
        }
    }

    /// Key of a namespaced object, or `None` if it has no name or namespace
    pub fn of<K: Resource>(obj: &K) -> Option<Self> {
        let name = obj.meta().name.clone()?;
        let namespace = obj.namespace()?;
        Some(Self { namespace, name })
    }
}

impl fmt::Display for ObjectKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}/{}", self.namespace, self.name)
    }
}
