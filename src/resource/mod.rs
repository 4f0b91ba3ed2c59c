//! Watched object identity and snapshots.
//!
//! A [`Resource`] is the full snapshot stored in the local cache; a [`Key`] is
//! the stable `namespace/name` identifier used both as the queue entry and as
//! the cache lookup.

mod key;
mod kinds;
pub use key::*;
pub use kinds::*;


use std::fmt::Debug;

use serde::Deserialize;
use serde::Serialize;

/// Subset of Kubernetes object metadata needed for identity.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ObjectMeta {
    #[serde(default)]
    pub name: String,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub namespace: Option<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub uid: Option<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub resource_version: Option<String>,
}

impl ObjectMeta {
    pub fn namespaced(
        namespace: &str,
        name: &str,
    ) -> Self {
        Self {
            name: name.to_string(),
            namespace: Some(namespace.to_string()),
            ..Default::default()
        }
    }
}

/// A watched resource kind.
///
/// One implementation per kind; the controller is generic over it so the
/// reconcile loop is written once.
pub trait Resource: Clone + Debug + Send + Sync + 'static {
    /// Human readable kind, e.g. `Deployment`
    const KIND: &'static str;

    /// API collection path, optionally scoped to one namespace.
    fn api_path(namespace: Option<&str>) -> String;

    fn metadata(&self) -> &ObjectMeta;

    /// Identity shown in "created" notifications.
    fn summary(&self) -> String {
        self.metadata().name.clone()
    }
}
