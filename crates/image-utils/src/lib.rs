//! Build utilities for kiln.
//!
//! This crate is the helper layer the build orchestrator leans on:
//! - Resolve a local image reference (name or id) against a storage backend
//! - Normalize platform strings to the canonical OCI vocabulary
//! - Export a build's tar stream to a directory, file, or stdout
//! - Translate key lists into layer encryption/decryption configs
//! - Map a format token to its manifest media type
//!
//! Every operation is synchronous and single-shot: no state is retained
//! between calls, so independent invocations are safe to run concurrently.
//!
//! # Example
//!
//! ```ignore
//! use kiln_image_utils::{lookup_image, FileStore, SystemContext};
//!
//! let store = FileStore::new("/var/lib/kiln/storage");
//! let image = lookup_image(None, &store, "localhost/app:latest")?;
//! ```

#![warn(missing_docs)]

mod crypto;
mod error;
mod export;
mod platform;
mod store;

pub use crypto::{
    decrypt_config, encrypt_config, DecryptConfig, DecryptKey, EncryptConfig, EncryptRecipient,
    RecipientProtocol,
};
pub use error::{Error, Result};
pub use export::{export_from_reader, is_privileged, temp_dir, ExportOptions};
pub use platform::Platform;
pub use store::{lookup_image, FileStore, ImageStore, LocalImage, SystemContext};

/// Format token selecting an OCI image manifest.
pub const OCI: &str = "oci";

/// Format token selecting a Docker v2 schema 2 image manifest.
pub const DOCKER: &str = "docker";

/// Media type of an OCI v1 image manifest.
pub const OCI_V1_IMAGE_MANIFEST: &str = "application/vnd.oci.image.manifest.v1+json";

/// Media type of a Docker v2 schema 2 image manifest.
pub const DOCKER_V2S2_MANIFEST: &str = "application/vnd.docker.distribution.manifest.v2+json";

/// Translate a format token into the manifest media type it selects.
///
/// Exactly two tokens are recognized, [`OCI`] and [`DOCKER`]. Matching is
/// case-sensitive with no trimming; anything else is rejected.
pub fn manifest_media_type(format: &str) -> Result<&'static str> {
    match format {
        OCI => Ok(OCI_V1_IMAGE_MANIFEST),
        DOCKER => Ok(DOCKER_V2S2_MANIFEST),
        other => Err(Error::UnrecognizedFormat {
            token: other.to_string(),
        }),
    }
}
