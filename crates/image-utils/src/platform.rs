//! Platform normalization.
//!
//! Callers spell platforms many ways ("Aarch64", "x86_64", "armhf");
//! image manifests use the canonical OCI vocabulary ("arm64", "amd64",
//! "arm" variant "v7"). This module maps the former onto the latter.

use serde::{Deserialize, Serialize};
use std::fmt;

/// An OCI platform: operating system, CPU architecture, optional variant.
#[derive(Debug, Clone, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Platform {
    /// Operating system (linux, darwin, windows).
    pub os: String,
    /// CPU architecture (amd64, arm64, arm, 386, ...).
    pub architecture: String,
    /// Architecture variant (v6, v7, ...), when one applies.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub variant: Option<String>,
}

impl Platform {
    /// Create a platform without a variant.
    #[must_use]
    pub fn new(os: impl Into<String>, architecture: impl Into<String>) -> Self {
        Self {
            os: os.into(),
            architecture: architecture.into(),
            variant: None,
        }
    }

    /// Create a platform with a variant.
    #[must_use]
    pub fn with_variant(
        os: impl Into<String>,
        architecture: impl Into<String>,
        variant: impl Into<String>,
    ) -> Self {
        Self {
            os: os.into(),
            architecture: architecture.into(),
            variant: Some(variant.into()),
        }
    }

    /// The canonical platform of the running process.
    #[must_use]
    pub fn host() -> Self {
        Self::new(std::env::consts::OS, std::env::consts::ARCH).normalize()
    }

    /// Canonicalize os, architecture, and variant.
    ///
    /// Total function: recognized aliases map to their canonical spelling,
    /// anything else passes through lowercased. There is no error path;
    /// validation (if any) belongs to the manifest consumer.
    #[must_use]
    pub fn normalize(&self) -> Self {
        let os = normalize_os(&self.os);
        let (architecture, variant) =
            normalize_arch(&self.architecture, self.variant.as_deref());
        Self {
            os,
            architecture,
            variant,
        }
    }
}

impl fmt::Display for Platform {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}/{}", self.os, self.architecture)?;
        if let Some(variant) = &self.variant {
            write!(f, "/{variant}")?;
        }
        Ok(())
    }
}

fn normalize_os(os: &str) -> String {
    let os = os.to_lowercase();
    match os.as_str() {
        "macos" | "osx" => "darwin".to_string(),
        _ => os,
    }
}

fn normalize_arch(arch: &str, variant: Option<&str>) -> (String, Option<String>) {
    let arch = arch.to_lowercase();
    let variant = variant.map(normalize_variant);

    match arch.as_str() {
        "i386" | "i486" | "i586" | "i686" | "x86" => ("386".to_string(), None),
        "x86_64" | "x86-64" | "amd64" => ("amd64".to_string(), variant),
        "aarch64" | "arm64" => {
            // v8 is the arm64 baseline and carries no information.
            let variant = variant.filter(|v| v != "v8");
            ("arm64".to_string(), variant)
        }
        "armhf" => ("arm".to_string(), Some("v7".to_string())),
        "armel" => ("arm".to_string(), Some("v6".to_string())),
        "arm" => ("arm".to_string(), variant),
        _ => (arch, variant),
    }
}

fn normalize_variant(variant: &str) -> String {
    let variant = variant.to_lowercase();
    if variant.chars().all(|c| c.is_ascii_digit()) && !variant.is_empty() {
        format!("v{variant}")
    } else {
        variant
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_normalize_aarch64() {
        let p = Platform::new("linux", "Aarch64").normalize();
        assert_eq!(p.os, "linux");
        assert_eq!(p.architecture, "arm64");
        assert_eq!(p.variant, None);
    }

    #[test]
    fn test_normalize_x86_64() {
        let p = Platform::new("Linux", "x86_64").normalize();
        assert_eq!(p.os, "linux");
        assert_eq!(p.architecture, "amd64");
    }

    #[test]
    fn test_normalize_macos() {
        let p = Platform::new("macOS", "arm64").normalize();
        assert_eq!(p.os, "darwin");
        assert_eq!(p.architecture, "arm64");
    }

    #[test]
    fn test_normalize_armhf() {
        let p = Platform::new("linux", "armhf").normalize();
        assert_eq!(p.architecture, "arm");
        assert_eq!(p.variant, Some("v7".to_string()));
    }

    #[test]
    fn test_normalize_i686() {
        let p = Platform::new("linux", "i686").normalize();
        assert_eq!(p.architecture, "386");
        assert_eq!(p.variant, None);
    }

    #[test]
    fn test_normalize_drops_redundant_v8() {
        let p = Platform::with_variant("linux", "aarch64", "v8").normalize();
        assert_eq!(p.architecture, "arm64");
        assert_eq!(p.variant, None);
    }

    #[test]
    fn test_normalize_bare_numeric_variant() {
        let p = Platform::with_variant("linux", "arm", "7").normalize();
        assert_eq!(p.architecture, "arm");
        assert_eq!(p.variant, Some("v7".to_string()));
    }

    #[test]
    fn test_unrecognized_values_pass_through() {
        // Unknown values are lowercased, never rejected.
        let p = Platform::new("plan9", "RISCV64").normalize();
        assert_eq!(p.os, "plan9");
        assert_eq!(p.architecture, "riscv64");
    }

    #[test]
    fn test_display() {
        assert_eq!(Platform::new("linux", "amd64").to_string(), "linux/amd64");
        assert_eq!(
            Platform::with_variant("linux", "arm", "v7").to_string(),
            "linux/arm/v7"
        );
    }

    #[test]
    fn test_host_is_canonical() {
        let p = Platform::host();
        assert!(!p.os.is_empty());
        assert_ne!(p.architecture, "x86_64");
        assert_ne!(p.architecture, "aarch64");
    }
}
