use thiserror::Error;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StoreErrorCode {
    Argument,
    NotFound,
    Conflict,
    PermissionDenied,
    Store,
}

impl StoreErrorCode {
    pub fn as_str(self) -> &'static str {
        match self {
            StoreErrorCode::Argument => "argument",
            StoreErrorCode::NotFound => "not_found",
            StoreErrorCode::Conflict => "conflict",
            StoreErrorCode::PermissionDenied => "permission_denied",
            StoreErrorCode::Store => "store",
        }
    }
}

#[derive(Debug, Error)]
pub enum StoreError {
    /// A malformed argument: `add` combined with an original snapshot, an
    /// unknown flag name, or a value kind an operation cannot interpret.
    #[error("argument error: {0}")]
    Argument(String),
    #[error("{entity} not found: {key}")]
    NotFound { entity: &'static str, key: String },
    /// Optimistic-concurrency rejection. Raised by the store when a record's
    /// version diverged from the diff's original snapshot and `force` was not
    /// set. Never handled locally; the caller owns recovery.
    #[error("conflict: {0}")]
    Conflict(String),
    #[error("permission denied: {0}")]
    PermissionDenied(String),
    #[error("store error: {0}")]
    Store(String),
}

impl StoreError {
    pub fn code(&self) -> StoreErrorCode {
        match self {
            StoreError::Argument(_) => StoreErrorCode::Argument,
            StoreError::NotFound { .. } => StoreErrorCode::NotFound,
            StoreError::Conflict(_) => StoreErrorCode::Conflict,
            StoreError::PermissionDenied(_) => StoreErrorCode::PermissionDenied,
            StoreError::Store(_) => StoreErrorCode::Store,
        }
    }

    pub fn code_str(&self) -> &'static str {
        self.code().as_str()
    }

    pub(crate) fn record_not_found(key: impl std::fmt::Display) -> Self {
        StoreError::NotFound {
            entity: "record",
            key: key.to_string(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::{StoreError, StoreErrorCode};

    #[test]
    fn error_code_strings_are_stable() {
        assert_eq!(StoreErrorCode::Argument.as_str(), "argument");
        assert_eq!(StoreErrorCode::Conflict.as_str(), "conflict");
        assert_eq!(
            StoreErrorCode::PermissionDenied.as_str(),
            "permission_denied"
        );
    }

    #[test]
    fn error_code_str_matches_variant_mapping() {
        let err = StoreError::record_not_found("2f0c");
        assert_eq!(err.code(), StoreErrorCode::NotFound);
        assert_eq!(err.code_str(), "not_found");
        assert_eq!(err.to_string(), "record not found: 2f0c");
    }
}
