// Copyright 2025 Adobe. All rights reserved.
// This file is licensed to you under the Apache License,
// Version 2.0 (http://www.apache.org/licenses/LICENSE-2.0)
// or the MIT license (http://opensource.org/licenses/MIT),
// at your option.
//
// Unless required by applicable law or agreed to in writing,
// this software is distributed on an "AS IS" BASIS, WITHOUT
// WARRANTIES OR REPRESENTATIONS OF ANY KIND, either express or
// implied. See the LICENSE-MIT and LICENSE-APACHE files for the
// specific language governing permissions and limitations under
// each license.

use thiserror::Error;

/// Errors that can occur during storage operations
#[derive(Error, Debug)]
pub enum StorageError {
    /// The key, group or bucket is absent.
    #[error("Not found: {key} ({operation})")]
    NotFound { operation: &'static str, key: String },

    /// A version-bound read observed a different object state.
    #[error("Concurrent modification of {key}: {message}")]
    ConcurrentModification { key: String, message: String },

    /// Any other transport or protocol failure. Forbidden responses land
    /// here with `status == Some(403)`.
    #[error("IO error during {operation} of {key}: {message}")]
    IoError {
        operation: &'static str,
        key: String,
        status: Option<u16>,
        message: String,
    },

    #[error("Operation not permitted: {0}")]
    OperationNotPermitted(String),

    #[error("Configuration error: {0}")]
    ConfigError(String),

    #[error("URL parse error: {0}")]
    UrlParseError(#[from] url::ParseError),
}

/// Result type for storage operations
pub type StorageResult<T> = Result<T, StorageError>;

/// Coarse classification of a [`StorageError`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorKind {
    NotFound,
    ConcurrentModification,
    Io,
    OperationNotPermitted,
    Config,
}

impl StorageError {
    pub fn kind(&self) -> ErrorKind {
        match self {
            StorageError::NotFound { .. } => ErrorKind::NotFound,
            StorageError::ConcurrentModification { .. } => ErrorKind::ConcurrentModification,
            StorageError::IoError { .. } => ErrorKind::Io,
            StorageError::OperationNotPermitted(_) => ErrorKind::OperationNotPermitted,
            StorageError::ConfigError(_) | StorageError::UrlParseError(_) => ErrorKind::Config,
        }
    }

    pub fn is_not_found(&self) -> bool {
        self.kind() == ErrorKind::NotFound
    }

    /// True for responses that cannot be told apart from a missing object.
    pub fn is_forbidden(&self) -> bool {
        matches!(self, StorageError::IoError { status: Some(403), .. })
    }

    pub fn is_concurrent_modification(&self) -> bool {
        self.kind() == ErrorKind::ConcurrentModification
    }

    pub(crate) fn not_found(operation: &'static str, key: impl Into<String>) -> Self {
        StorageError::NotFound {
            operation,
            key: key.into(),
        }
    }

    pub(crate) fn io(operation: &'static str, key: impl Into<String>, message: impl ToString) -> Self {
        StorageError::IoError {
            operation,
            key: key.into(),
            status: None,
            message: message.to_string(),
        }
    }
}

/// Map an HTTP status and optional protocol error code onto the error taxonomy.
///
/// Every client adapter funnels its service failures through this function so
/// that status handling lives in exactly one place.
///
/// # Arguments
///
/// * `status` - HTTP status code of the failed response
/// * `code` - Protocol error code (e.g. `NoSuchKey`), if the response carried one
/// * `operation` - Name of the adapter operation, kept for diagnostics
/// * `key` - Object key or bucket the operation addressed
/// * `message` - Human readable detail
pub fn classify_status(
    status: u16,
    code: Option<&str>,
    operation: &'static str,
    key: &str,
    message: impl Into<String>,
) -> StorageError {
    match (status, code) {
        (_, Some("NoSuchKey" | "NoSuchBucket" | "NotFound")) | (404, _) => {
            StorageError::not_found(operation, key)
        }
        (_, Some("PreconditionFailed")) | (412, _) => StorageError::ConcurrentModification {
            key: key.to_string(),
            message: message.into(),
        },
        _ => StorageError::IoError {
            operation,
            key: key.to_string(),
            status: Some(status),
            message: message.into(),
        },
    }
}

/// Map an `object_store` failure onto the error taxonomy.
pub fn from_object_store(err: object_store::Error, operation: &'static str, key: &str) -> StorageError {
    match err {
        object_store::Error::NotFound { .. } => StorageError::not_found(operation, key),
        object_store::Error::Precondition { source, .. } => StorageError::ConcurrentModification {
            key: key.to_string(),
            message: source.to_string(),
        },
        object_store::Error::PermissionDenied { source, .. } => StorageError::IoError {
            operation,
            key: key.to_string(),
            status: Some(403),
            message: source.to_string(),
        },
        object_store::Error::Unauthenticated { source, .. } => StorageError::IoError {
            operation,
            key: key.to_string(),
            status: Some(401),
            message: source.to_string(),
        },
        other => StorageError::io(operation, key, other),
    }
}
