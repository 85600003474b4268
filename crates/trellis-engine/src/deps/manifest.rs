//! The `workflow.yml` dependency manifest.
//!
//! ```yaml
//! dependencies:
//!   - name: robotframework-browser
//!     type: pip
//!     version: "18.0.0"
//!     packages:
//!       - name: playwright
//!         type: npm
//!   - name: jq
//!     type: apt
//! ```

use std::path::Path;

use serde::Deserialize;

/// Manifest file name inside an artifact directory.
pub const MANIFEST_FILE: &str = "workflow.yml";

#[derive(Debug, Clone, Default, PartialEq, Deserialize)]
#[serde(default)]
pub struct Manifest {
    pub dependencies: Vec<Dependency>,
}

/// A top-level dependency with optional sub-packages.
#[derive(Debug, Clone, Default, PartialEq, Deserialize)]
#[serde(default)]
pub struct Dependency {
    pub name: String,
    #[serde(rename = "type")]
    pub manager: String,
    pub version: String,
    pub source: String,
    pub packages: Vec<Package>,
}

#[derive(Debug, Clone, Default, PartialEq, Deserialize)]
#[serde(default)]
pub struct Package {
    pub name: String,
    #[serde(rename = "type")]
    pub manager: String,
    pub version: String,
    pub source: String,
}

/// One package to probe and install.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PackageSpec {
    pub name: String,
    pub manager: String,
    pub version: Option<String>,
    pub source: Option<String>,
}

impl PackageSpec {
    fn from_fields(name: &str, manager: &str, version: &str, source: &str) -> Self {
        let non_empty = |s: &str| {
            let s = s.trim();
            (!s.is_empty()).then(|| s.to_string())
        };
        Self {
            name: name.trim().to_string(),
            manager: manager.trim().to_string(),
            version: non_empty(version),
            source: non_empty(source),
        }
    }
}

impl Manifest {
    pub fn from_yaml(text: &str) -> Result<Self, serde_yaml::Error> {
        // An empty document deserializes as unit, not as an empty map.
        if text.trim().is_empty() {
            return Ok(Self::default());
        }
        serde_yaml::from_str(text)
    }

    /// Read `path`, returning `None` when the file does not exist.
    pub fn load(path: &Path) -> std::io::Result<Option<String>> {
        match std::fs::read_to_string(path) {
            Ok(text) => Ok(Some(text)),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(None),
            Err(e) => Err(e),
        }
    }

    /// Packages in install order: each dependency's sub-packages first,
    /// then the dependency itself.
    pub fn packages(&self) -> Vec<PackageSpec> {
        let mut specs = Vec::new();
        for dep in &self.dependencies {
            for pkg in &dep.packages {
                specs.push(PackageSpec::from_fields(
                    &pkg.name,
                    &pkg.manager,
                    &pkg.version,
                    &pkg.source,
                ));
            }
            specs.push(PackageSpec::from_fields(
                &dep.name,
                &dep.manager,
                &dep.version,
                &dep.source,
            ));
        }
        specs.retain(|s| !s.name.is_empty());
        specs
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const SAMPLE: &str = r#"
name: demo
dependencies:
  - name: robotframework-browser
    type: pip
    version: "18.0.0"
    source: ok/77
    packages:
      - name: playwright
        type: npm
        version: "1.44.0"
  - name: jq
    type: apt
"#;

    #[test]
    fn test_packages_in_install_order() {
        let manifest = Manifest::from_yaml(SAMPLE).unwrap();
        let names: Vec<_> = manifest.packages().into_iter().map(|p| p.name).collect();
        assert_eq!(names, ["playwright", "robotframework-browser", "jq"]);
    }

    #[test]
    fn test_optional_fields_become_none() {
        let manifest = Manifest::from_yaml(SAMPLE).unwrap();
        let packages = manifest.packages();
        assert_eq!(packages[1].version.as_deref(), Some("18.0.0"));
        assert_eq!(packages[1].source.as_deref(), Some("ok/77"));
        assert_eq!(packages[2].version, None);
        assert_eq!(packages[2].source, None);
    }

    #[test]
    fn test_empty_and_dependency_free_manifests() {
        assert!(Manifest::from_yaml("").unwrap().packages().is_empty());
        assert!(Manifest::from_yaml("name: x\n").unwrap().packages().is_empty());
    }

    #[test]
    fn test_malformed_manifest() {
        assert!(Manifest::from_yaml("dependencies: [name: {").is_err());
    }

    #[test]
    fn test_load_missing_file() {
        let dir = tempfile::TempDir::new().unwrap();
        assert!(Manifest::load(&dir.path().join(MANIFEST_FILE)).unwrap().is_none());
    }
}
