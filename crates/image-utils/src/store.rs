//! Local image lookup.
//!
//! The build orchestrator resolves image references (name or id) against a
//! storage backend. The backend is injected as a capability so tests can
//! substitute an in-memory store for the real one.

use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use tracing::{debug, trace};

use crate::platform::Platform;
use crate::{Error, Result};

/// Caller-supplied lookup context.
///
/// All fields are optional. A caller that has no context passes `None` to
/// [`lookup_image`] and the default (no platform restriction) is substituted
/// at the call boundary; there is no hidden global state.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SystemContext {
    /// Restrict lookup to images built for this operating system.
    pub os_choice: Option<String>,
    /// Restrict lookup to images built for this architecture.
    pub architecture_choice: Option<String>,
    /// Restrict lookup to images built for this variant.
    pub variant_choice: Option<String>,
}

impl SystemContext {
    fn matches(&self, platform: &Platform) -> bool {
        let platform = platform.normalize();
        let wanted = Platform {
            os: self.os_choice.clone().unwrap_or_default(),
            architecture: self.architecture_choice.clone().unwrap_or_default(),
            variant: self.variant_choice.clone(),
        }
        .normalize();

        if self.os_choice.is_some() && wanted.os != platform.os {
            return false;
        }
        if self.architecture_choice.is_some() && wanted.architecture != platform.architecture {
            return false;
        }
        if self.variant_choice.is_some() && wanted.variant != platform.variant {
            return false;
        }
        true
    }
}

/// One image record held by the storage backend.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LocalImage {
    /// Content-addressed image id (hex digest, no algorithm prefix).
    pub id: String,
    /// Tagged names pointing at this image, e.g. `localhost/app:latest`.
    #[serde(default)]
    pub names: Vec<String>,
    /// Platform the image was built for.
    pub platform: Platform,
    /// RFC 3339 creation timestamp, when the backend records one.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub created: Option<String>,
}

/// Storage backend capability used by [`lookup_image`].
///
/// Backend construction or read failures are reported as
/// [`Error::Backend`]; an empty store is not an error.
pub trait ImageStore {
    /// List every image record the backend knows about.
    fn images(&self) -> Result<Vec<LocalImage>>;
}

/// Production backend reading an image index under a storage root.
///
/// Layout: `<root>/images.json`, a JSON array of [`LocalImage`] records
/// maintained by the store writer (out of scope here, this side is
/// read-only).
#[derive(Debug, Clone)]
pub struct FileStore {
    root: PathBuf,
}

impl FileStore {
    /// Open a store rooted at `root`. No validation happens until the
    /// first read.
    #[must_use]
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    /// The storage root directory.
    #[must_use]
    pub fn root(&self) -> &Path {
        &self.root
    }

    fn index_path(&self) -> PathBuf {
        self.root.join("images.json")
    }
}

impl ImageStore for FileStore {
    fn images(&self) -> Result<Vec<LocalImage>> {
        let index = self.index_path();
        trace!(index = %index.display(), "Reading image index");
        let data = std::fs::read(&index)
            .map_err(|e| Error::backend(format!("reading image index {}: {e}", index.display())))?;
        serde_json::from_slice(&data)
            .map_err(|e| Error::backend(format!("parsing image index {}: {e}", index.display())))
    }
}

/// Resolve a local image reference (name or id) against `store`.
///
/// A missing `ctx` is substituted with [`SystemContext::default`]. Candidates
/// are filtered by the context's platform choices, then matched in order:
/// exact name, name with an implied `:latest` tag, exact id, unambiguous id
/// prefix. Read-only; no side effects beyond the backend read.
///
/// # Errors
///
/// [`Error::ImageNotFound`] when nothing matches, [`Error::AmbiguousId`]
/// when an id prefix matches more than one image, and [`Error::Backend`]
/// when the store cannot be read.
pub fn lookup_image(
    ctx: Option<&SystemContext>,
    store: &dyn ImageStore,
    name: &str,
) -> Result<LocalImage> {
    let default_ctx = SystemContext::default();
    let ctx = ctx.unwrap_or(&default_ctx);

    let images = store.images()?;
    let candidates: Vec<&LocalImage> = images
        .iter()
        .filter(|img| ctx.matches(&img.platform))
        .collect();
    trace!(%name, candidates = candidates.len(), "Looking up local image");

    // Names win over ids: a tag that happens to look like a digest prefix
    // still resolves to the tagged image.
    if let Some(img) = candidates
        .iter()
        .find(|img| img.names.iter().any(|n| n.as_str() == name))
    {
        debug!(%name, id = %img.id, "Resolved image by name");
        return Ok((*img).clone());
    }
    if !name.contains(':') {
        let tagged = format!("{name}:latest");
        if let Some(img) = candidates
            .iter()
            .find(|img| img.names.iter().any(|n| n == &tagged))
        {
            debug!(%name, id = %img.id, "Resolved image by implied latest tag");
            return Ok((*img).clone());
        }
    }

    if let Some(img) = candidates.iter().find(|img| img.id == name) {
        debug!(%name, "Resolved image by id");
        return Ok((*img).clone());
    }

    let mut by_prefix = candidates.iter().filter(|img| img.id.starts_with(name));
    if let Some(first) = by_prefix.next() {
        if by_prefix.next().is_some() {
            return Err(Error::AmbiguousId {
                prefix: name.to_string(),
            });
        }
        debug!(%name, id = %first.id, "Resolved image by id prefix");
        return Ok((*first).clone());
    }

    Err(Error::ImageNotFound {
        name: name.to_string(),
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    struct MemStore(Vec<LocalImage>);

    impl ImageStore for MemStore {
        fn images(&self) -> Result<Vec<LocalImage>> {
            Ok(self.0.clone())
        }
    }

    fn image(id: &str, names: &[&str], os: &str, arch: &str) -> LocalImage {
        LocalImage {
            id: id.to_string(),
            names: names.iter().map(ToString::to_string).collect(),
            platform: Platform::new(os, arch),
            created: None,
        }
    }

    #[test]
    fn test_lookup_by_name() {
        let store = MemStore(vec![
            image("aaa111", &["localhost/app:latest"], "linux", "amd64"),
            image("bbb222", &["localhost/other:1.0"], "linux", "amd64"),
        ]);
        let img = lookup_image(None, &store, "localhost/other:1.0").unwrap();
        assert_eq!(img.id, "bbb222");
    }

    #[test]
    fn test_lookup_implied_latest() {
        let store = MemStore(vec![image(
            "aaa111",
            &["localhost/app:latest"],
            "linux",
            "amd64",
        )]);
        let img = lookup_image(None, &store, "localhost/app").unwrap();
        assert_eq!(img.id, "aaa111");
    }

    #[test]
    fn test_lookup_by_id_and_prefix() {
        let store = MemStore(vec![
            image("deadbeef01", &[], "linux", "amd64"),
            image("cafebabe02", &[], "linux", "amd64"),
        ]);
        assert_eq!(lookup_image(None, &store, "deadbeef01").unwrap().id, "deadbeef01");
        assert_eq!(lookup_image(None, &store, "cafe").unwrap().id, "cafebabe02");
    }

    #[test]
    fn test_lookup_ambiguous_prefix() {
        let store = MemStore(vec![
            image("deadbeef01", &[], "linux", "amd64"),
            image("deadbeef02", &[], "linux", "amd64"),
        ]);
        let err = lookup_image(None, &store, "deadbeef").unwrap_err();
        assert!(matches!(err, Error::AmbiguousId { .. }));
    }

    #[test]
    fn test_lookup_not_found() {
        let store = MemStore(vec![]);
        let err = lookup_image(None, &store, "localhost/app").unwrap_err();
        assert!(matches!(err, Error::ImageNotFound { ref name } if name == "localhost/app"));
    }

    #[test]
    fn test_lookup_platform_filter() {
        let store = MemStore(vec![
            image("aaa111", &["localhost/app:latest"], "linux", "amd64"),
            image("bbb222", &["localhost/app:latest"], "linux", "arm64"),
        ]);
        // Context aliases normalize before comparison: aarch64 matches arm64.
        let ctx = SystemContext {
            architecture_choice: Some("aarch64".to_string()),
            ..SystemContext::default()
        };
        let img = lookup_image(Some(&ctx), &store, "localhost/app").unwrap();
        assert_eq!(img.id, "bbb222");
    }

    #[test]
    fn test_absent_context_is_default() {
        let store = MemStore(vec![image(
            "aaa111",
            &["localhost/app:latest"],
            "linux",
            "s390x",
        )]);
        // No context means no platform restriction.
        assert!(lookup_image(None, &store, "localhost/app").is_ok());
    }

    #[test]
    fn test_file_store_reads_index() {
        let temp = TempDir::new().unwrap();
        let records = vec![image("aaa111", &["localhost/app:latest"], "linux", "amd64")];
        std::fs::write(
            temp.path().join("images.json"),
            serde_json::to_vec(&records).unwrap(),
        )
        .unwrap();

        let store = FileStore::new(temp.path());
        let img = lookup_image(None, &store, "localhost/app:latest").unwrap();
        assert_eq!(img.id, "aaa111");
    }

    #[test]
    fn test_file_store_missing_index_is_backend_error() {
        let temp = TempDir::new().unwrap();
        let store = FileStore::new(temp.path());
        let err = lookup_image(None, &store, "anything").unwrap_err();
        assert!(matches!(err, Error::Backend { .. }));
    }

    #[test]
    fn test_file_store_corrupt_index_is_backend_error() {
        let temp = TempDir::new().unwrap();
        std::fs::write(temp.path().join("images.json"), b"{ not json").unwrap();
        let store = FileStore::new(temp.path());
        let err = lookup_image(None, &store, "anything").unwrap_err();
        assert!(matches!(err, Error::Backend { .. }));
    }
}
