//! Core types shared across the Docker capability layer.

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::docker::errors::DockerError;

/// A validated Docker container ID
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct ContainerId(String);

impl ContainerId {
    /// Create a new container ID with validation
    pub fn new(id: impl Into<String>) -> Result<Self, DockerError> {
        let id = id.into();
        if id.is_empty() {
            return Err(DockerError::invalid_config("Container ID cannot be empty"));
        }
        if id.len() < 12 || id.len() > 64 {
            return Err(DockerError::invalid_config(
                "Container ID must be between 12 and 64 characters",
            ));
        }
        if !id
            .chars()
            .all(|c| c.is_ascii_hexdigit() && (c.is_ascii_digit() || c.is_ascii_lowercase()))
        {
            return Err(DockerError::invalid_config(
                "Container ID must contain only lowercase hexadecimal characters",
            ));
        }
        Ok(Self(id))
    }

    /// Create a container ID without validation (for internal use)
    pub(crate) fn new_unchecked(id: String) -> Self {
        Self(id)
    }

    /// Get the container ID as a string
    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// Get the short form of the container ID (first 12 characters)
    pub fn short(&self) -> &str {
        &self.0[..12.min(self.0.len())]
    }
}

impl fmt::Display for ContainerId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl FromStr for ContainerId {
    type Err = DockerError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::new(s)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_container_id_validation() {
        // Valid container ID
        assert!(ContainerId::new("abcdef1234567890").is_ok());

        // Too short
        assert!(ContainerId::new("abc").is_err());

        // Too long
        assert!(ContainerId::new("a".repeat(100)).is_err());

        // Invalid characters
        assert!(ContainerId::new("invalid-chars!").is_err());

        // Empty
        assert!(ContainerId::new("").is_err());
    }
}
