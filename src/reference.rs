//! Structured names for registry resources

use std::fmt;

use crate::error::{RegistryError, Result};
use crate::transport::Action;

/// Returns the URL scheme for a registry endpoint.
///
/// Plain HTTP is used only for local registries (`localhost:<port>`);
/// everything else goes over HTTPS.
pub fn scheme(registry: &str) -> &'static str {
    if registry.starts_with("localhost:") {
        "http"
    } else {
        "https"
    }
}

/// A named registry resource the transport can be bound to.
///
/// Exposes the registry host the ping URL is built from and the
/// authorization scope requested during token exchange. `Display` provides a
/// stable name for error messages.
pub trait ResourceName: fmt::Display + Send + Sync {
    fn registry(&self) -> &str;
    fn scope(&self, action: Action) -> String;
}

/// A repository within a registry, e.g. `registry.example.com/library/ubuntu`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Repository {
    registry: String,
    repository: String,
}

impl Repository {
    pub fn new(registry: impl Into<String>, repository: impl Into<String>) -> Result<Self> {
        let registry = registry.into();
        let repository = repository.into();
        if registry.is_empty() {
            return Err(RegistryError::State(
                "repository name requires a registry host".to_string(),
            ));
        }
        if repository.is_empty() {
            return Err(RegistryError::State(
                "repository name requires a repository path".to_string(),
            ));
        }
        Ok(Self {
            registry,
            repository,
        })
    }

    pub fn repository(&self) -> &str {
        &self.repository
    }
}

impl fmt::Display for Repository {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}/{}", self.registry, self.repository)
    }
}

impl ResourceName for Repository {
    fn registry(&self) -> &str {
        &self.registry
    }

    fn scope(&self, action: Action) -> String {
        format!("repository:{}:{}", self.repository, action.capabilities())
    }
}

/// A registry endpoint itself, used for catalog-level access.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Registry {
    registry: String,
}

impl Registry {
    pub fn new(registry: impl Into<String>) -> Result<Self> {
        let registry = registry.into();
        if registry.is_empty() {
            return Err(RegistryError::State(
                "registry name requires a host".to_string(),
            ));
        }
        Ok(Self { registry })
    }
}

impl fmt::Display for Registry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.registry)
    }
}

impl ResourceName for Registry {
    fn registry(&self) -> &str {
        &self.registry
    }

    fn scope(&self, _action: Action) -> String {
        "registry:catalog:*".to_string()
    }
}
