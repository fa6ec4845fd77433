use serde::{Deserialize, Serialize};
use std::fmt;

/// The Argo CD Application a conversation is scoped to
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ApplicationRef {
    /// Namespace the Application object lives in
    pub namespace: String,
    pub name: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub project: Option<String>,
}

impl ApplicationRef {
    pub fn new<N: Into<String>, S: Into<String>>(namespace: N, name: S) -> Self {
        Self {
            namespace: namespace.into(),
            name: name.into(),
            project: None,
        }
    }

    pub fn with_project<S: Into<String>>(mut self, project: S) -> Self {
        self.project = Some(project.into());
        self
    }

    /// Parse the `namespace:name` form the Argo CD UI sends in the
    /// `Argocd-Application-Name` header
    pub fn parse_qualified(value: &str) -> Option<Self> {
        let (namespace, name) = value.trim().split_once(':')?;
        if namespace.is_empty() || name.is_empty() || name.contains(':') {
            return None;
        }
        Some(Self::new(namespace, name))
    }
}

impl fmt::Display for ApplicationRef {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}:{}", self.namespace, self.name)
    }
}

/// A Kubernetes resource managed by the application, identified the way Argo CD's
/// log endpoint expects it
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ResourceRef {
    /// API group, empty for core resources
    #[serde(default)]
    pub group: String,
    pub version: String,
    pub kind: String,
    pub namespace: String,
    pub name: String,
}

/// Selects the events of one resource of the application
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ResourceEventsQuery {
    pub uid: String,
    pub namespace: String,
    pub name: String,
}
