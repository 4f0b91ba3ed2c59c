use std::fmt;

use serde::Deserialize;
use serde::Serialize;

use super::Resource;
use crate::ResourceError;

/// Stable identifier of a watched object: `namespace/name`, or `name` for
/// cluster-scoped objects.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Key(String);

impl Key {
    pub fn new(
        namespace: Option<&str>,
        name: &str,
    ) -> Self {
        match namespace {
            Some(ns) if !ns.is_empty() => Key(format!("{ns}/{name}")),
            _ => Key(name.to_string()),
        }
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for Key {
    fn fmt(
        &self,
        f: &mut fmt::Formatter<'_>,
    ) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl AsRef<str> for Key {
    fn as_ref(&self) -> &str {
        &self.0
    }
}

/// Extracts the key of an object.
pub type KeyFunc<R> = fn(&R) -> Result<Key, ResourceError>;

/// Default key function: `namespace/name` from the object metadata.
pub fn meta_namespace_key_func<R: Resource>(obj: &R) -> Result<Key, ResourceError> {
    let meta = obj.metadata();
    if meta.name.is_empty() {
        return Err(ResourceError::MissingName);
    }
    Ok(Key::new(meta.namespace.as_deref(), &meta.name))
}
