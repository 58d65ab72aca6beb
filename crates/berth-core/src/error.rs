// Allow unused assignments for diagnostic fields - they're used by the macros
#![allow(unused_assignments)]

use miette::Diagnostic;
use thiserror::Error;

/// Core error type for Berth operations
#[derive(Error, Debug, Diagnostic)]
pub enum CoreError {
    /// Listing a resource collection failed
    #[error("Failed to list {resource}: {message}")]
    #[diagnostic(
        code(berth::list_failed),
        help("Check that the cluster snapshot source is reachable and well-formed")
    )]
    ListFailed {
        #[allow(unused)]
        resource: String,
        #[allow(unused)]
        message: String,
        #[source]
        #[allow(unused)]
        source: Option<Box<dyn std::error::Error + Send + Sync>>,
    },

    /// Node not found
    #[error("Node not found: {node_name}")]
    #[diagnostic(
        code(berth::node_not_found),
        help("The node may have been removed since the snapshot was taken")
    )]
    NodeNotFound {
        #[allow(unused)]
        node_name: String,
    },

    /// A resource quantity could not be read
    #[error("Invalid {resource} quantity {value:?}: {message}")]
    #[diagnostic(
        code(berth::invalid_quantity),
        help("Use a Kubernetes quantity such as 500m, 2, 1.5Gi, 16G or 1e9")
    )]
    InvalidQuantity {
        #[allow(unused)]
        resource: String,
        #[allow(unused)]
        value: String,
        #[allow(unused)]
        message: String,
    },

    /// Serialization error
    #[error("Serialization error: {message}")]
    #[diagnostic(
        code(berth::serialization_error),
        help("Ensure the resource format is valid JSON or YAML")
    )]
    SerializationError {
        #[allow(unused)]
        message: String,
        #[source]
        #[allow(unused)]
        source: Option<Box<dyn std::error::Error + Send + Sync>>,
    },
}

/// Result type alias for Berth core operations
pub type Result<T> = std::result::Result<T, CoreError>;

impl CoreError {
    /// Create a ListFailed error
    pub fn list_failed(
        resource: impl Into<String>,
        message: impl Into<String>,
        source: Option<Box<dyn std::error::Error + Send + Sync>>,
    ) -> Self {
        Self::ListFailed {
            resource: resource.into(),
            message: message.into(),
            source,
        }
    }

    /// Create a NodeNotFound error
    pub fn node_not_found(node_name: impl Into<String>) -> Self {
        Self::NodeNotFound {
            node_name: node_name.into(),
        }
    }

    /// Create an InvalidQuantity error
    pub fn invalid_quantity(
        resource: impl Into<String>,
        value: impl Into<String>,
        message: impl Into<String>,
    ) -> Self {
        Self::InvalidQuantity {
            resource: resource.into(),
            value: value.into(),
            message: message.into(),
        }
    }

    /// Create a SerializationError
    pub fn serialization_error(
        message: impl Into<String>,
        source: Option<Box<dyn std::error::Error + Send + Sync>>,
    ) -> Self {
        Self::SerializationError {
            message: message.into(),
            source,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_creation() {
        let err = CoreError::node_not_found("node1");
        assert!(matches!(err, CoreError::NodeNotFound { .. }));
        assert_eq!(err.to_string(), "Node not found: node1");

        let err = CoreError::list_failed("nodes", "store unavailable", None);
        assert_eq!(err.to_string(), "Failed to list nodes: store unavailable");

        let err = CoreError::invalid_quantity("memory", "12parsecs", "unknown suffix");
        assert_eq!(
            err.to_string(),
            "Invalid memory quantity \"12parsecs\": unknown suffix"
        );
    }
}
