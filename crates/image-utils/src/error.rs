//! Error types for kiln-image-utils.

use miette::Diagnostic;
use std::path::PathBuf;
use thiserror::Error;

/// Result type for kiln-image-utils operations.
pub type Result<T> = std::result::Result<T, Error>;

/// Errors surfaced by the build utility layer.
///
/// Every fallible operation wraps the underlying cause together with its
/// context (destination path, offending token) and surfaces it immediately;
/// no retries happen at this layer.
#[derive(Error, Debug, Diagnostic)]
pub enum Error {
    /// No local image matched the given reference.
    #[error("image not found: {name}")]
    #[diagnostic(code(kiln::image_utils::image_not_found))]
    ImageNotFound {
        /// The reference (name or id) that was looked up.
        name: String,
    },

    /// An id prefix matched more than one local image.
    #[error("image id prefix {prefix:?} matches more than one image")]
    #[diagnostic(code(kiln::image_utils::ambiguous_id))]
    AmbiguousId {
        /// The ambiguous id prefix.
        prefix: String,
    },

    /// The storage backend could not be constructed or read.
    #[error("storage backend error: {message}")]
    #[diagnostic(code(kiln::image_utils::backend))]
    Backend {
        /// Description of the backend failure.
        message: String,
    },

    /// A relative destination path could not be made absolute.
    #[error("failed to resolve destination path {}: {source}", path.display())]
    #[diagnostic(code(kiln::image_utils::path_resolution))]
    PathResolution {
        /// The path that could not be resolved.
        path: PathBuf,
        /// The underlying I/O error.
        #[source]
        source: std::io::Error,
    },

    /// The destination directory tree could not be created.
    #[error("failed while creating the destination path {}: {source}", path.display())]
    #[diagnostic(code(kiln::image_utils::directory_creation))]
    DirectoryCreation {
        /// The destination directory.
        path: PathBuf,
        /// The underlying I/O error.
        #[source]
        source: std::io::Error,
    },

    /// Unpacking the archive stream into the destination failed.
    #[error("failed while performing untar at {}: {source}", path.display())]
    #[diagnostic(code(kiln::image_utils::untar))]
    Untar {
        /// The destination directory.
        path: PathBuf,
        /// The underlying I/O error.
        #[source]
        source: std::io::Error,
    },

    /// The destination file could not be created.
    #[error("failed while creating destination file at {}: {source}", path.display())]
    #[diagnostic(code(kiln::image_utils::file_creation))]
    FileCreation {
        /// The destination file.
        path: PathBuf,
        /// The underlying I/O error.
        #[source]
        source: std::io::Error,
    },

    /// Copying the stream to the destination failed.
    #[error("failed while performing copy to {}: {source}", path.display())]
    #[diagnostic(code(kiln::image_utils::copy))]
    Copy {
        /// The destination (file path, or the requested path when writing to stdout).
        path: PathBuf,
        /// The underlying I/O error.
        #[source]
        source: std::io::Error,
    },

    /// A decryption key spec could not be parsed or loaded.
    #[error("invalid decryption keys: {message}")]
    #[diagnostic(code(kiln::image_utils::invalid_decryption_keys))]
    InvalidDecryptionKeys {
        /// Description of the malformed key spec.
        message: String,
    },

    /// An encryption key spec could not be parsed or loaded.
    #[error("invalid encryption keys: {message}")]
    #[diagnostic(code(kiln::image_utils::invalid_encryption_keys))]
    InvalidEncryptionKeys {
        /// Description of the malformed key spec.
        message: String,
    },

    /// The format token is not one of the recognized image types.
    #[error("unrecognized image type {token:?}")]
    #[diagnostic(code(kiln::image_utils::unrecognized_format))]
    UnrecognizedFormat {
        /// The offending token.
        token: String,
    },

    /// I/O error with operation context.
    #[error("I/O error during {operation}: {source}")]
    #[diagnostic(code(kiln::image_utils::io))]
    Io {
        /// The underlying I/O error.
        #[source]
        source: std::io::Error,
        /// Description of the operation that failed.
        operation: String,
    },
}

impl Error {
    /// Create a storage backend error with a message.
    pub fn backend(message: impl Into<String>) -> Self {
        Self::Backend {
            message: message.into(),
        }
    }

    /// Create an invalid-decryption-keys error with a message.
    pub fn invalid_decryption_keys(message: impl Into<String>) -> Self {
        Self::InvalidDecryptionKeys {
            message: message.into(),
        }
    }

    /// Create an invalid-encryption-keys error with a message.
    pub fn invalid_encryption_keys(message: impl Into<String>) -> Self {
        Self::InvalidEncryptionKeys {
            message: message.into(),
        }
    }
}

impl From<std::io::Error> for Error {
    fn from(source: std::io::Error) -> Self {
        Self::Io {
            source,
            operation: "file operation".to_string(),
        }
    }
}
