use std::fmt;

use crate::Key;
use crate::Resource;

/// What the reconciler observed for a key, ready to be rendered.
///
/// Classification is presence based: a key found in the cache is reported as
/// created, a missing one as deleted.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ChangeNotice {
    Created { kind: &'static str, summary: String },
    Deleted { kind: &'static str, key: Key },
}

impl ChangeNotice {
    pub fn created<R: Resource>(obj: &R) -> Self {
        ChangeNotice::Created {
            kind: R::KIND,
            summary: obj.summary(),
        }
    }

    pub fn deleted<R: Resource>(key: &Key) -> Self {
        ChangeNotice::Deleted {
            kind: R::KIND,
            key: key.clone(),
        }
    }

    pub fn render(
        &self,
        prefix: &str,
    ) -> String {
        format!("{prefix} - {self}")
    }
}

impl fmt::Display for ChangeNotice {
    fn fmt(
        &self,
        f: &mut fmt::Formatter<'_>,
    ) -> fmt::Result {
        match self {
            ChangeNotice::Created { kind, summary } => write!(f, "Created a new {kind} - {summary}"),
            ChangeNotice::Deleted { kind, key } => write!(f, "Deleted {kind} - {key}"),
        }
    }
}
