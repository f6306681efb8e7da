//! Store error types.

use thiserror::Error;

/// Settings persistence failures.
///
/// The engine logs these and keeps its in-memory settings.
#[derive(Debug, Error)]
pub enum StoreError {
    /// Settings file could not be read or written.
    #[error("Settings I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// Settings could not be encoded or decoded.
    #[error("Settings encoding error: {0}")]
    Serialization(#[from] serde_json::Error),
}

impl StoreError {
    /// Returns true if the settings file does not exist yet.
    pub fn is_not_found(&self) -> bool {
        matches!(self, Self::Io(e) if e.kind() == std::io::ErrorKind::NotFound)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_is_not_found() {
        let missing = StoreError::from(std::io::Error::from(std::io::ErrorKind::NotFound));
        assert!(missing.is_not_found());

        let denied = StoreError::from(std::io::Error::from(std::io::ErrorKind::PermissionDenied));
        assert!(!denied.is_not_found());
    }
}
