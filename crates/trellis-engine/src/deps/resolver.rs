//! Probe-then-install over a manifest.

use std::path::Path;
use std::sync::Arc;

use thiserror::Error;
use tracing::{debug, info, warn};
use trellis_config::PackageRepoConfig;

use super::manifest::{Manifest, PackageSpec};
use super::plan::{PackagePlan, ProbeVerdict};
use crate::process::ProcessRunner;

/// Hard failures: the manifest itself could not be used.
#[derive(Debug, Error)]
pub enum DependencyError {
    #[error("Failed to read manifest {path}: {source}")]
    Read {
        path: String,
        source: std::io::Error,
    },

    #[error("Failed to parse manifest {path}: {source}")]
    Parse {
        path: String,
        source: serde_yaml::Error,
    },
}

/// What happened to a single package.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PackageOutcome {
    AlreadyInstalled,
    Installed,
    /// Declared with a package manager this engine does not drive.
    Unsupported(String),
    /// Probe failed; install was skipped.
    ProbeFailed(String),
    InstallFailed(String),
}

impl PackageOutcome {
    /// Whether this outcome is a logged, non-fatal failure.
    pub fn is_soft_failure(&self) -> bool {
        matches!(
            self,
            Self::Unsupported(_) | Self::ProbeFailed(_) | Self::InstallFailed(_)
        )
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PackageReport {
    pub name: String,
    pub manager: String,
    pub outcome: PackageOutcome,
}

/// Per-package results of one resolution pass.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ResolveReport {
    pub packages: Vec<PackageReport>,
}

impl ResolveReport {
    pub fn installed(&self) -> usize {
        self.count(|o| matches!(o, PackageOutcome::Installed))
    }

    pub fn already_installed(&self) -> usize {
        self.count(|o| matches!(o, PackageOutcome::AlreadyInstalled))
    }

    pub fn soft_failures(&self) -> usize {
        self.count(PackageOutcome::is_soft_failure)
    }

    fn count(&self, pred: impl Fn(&PackageOutcome) -> bool) -> usize {
        self.packages.iter().filter(|p| pred(&p.outcome)).count()
    }
}

/// Ensures the host packages an artifact declares are installed.
pub struct DependencyResolver {
    runner: Arc<dyn ProcessRunner>,
}

impl DependencyResolver {
    pub fn new(runner: Arc<dyn ProcessRunner>) -> Self {
        Self { runner }
    }

    /// Resolve the manifest at `path`. A missing manifest yields an empty
    /// report.
    pub async fn resolve(
        &self,
        path: &Path,
        repo: &PackageRepoConfig,
    ) -> Result<ResolveReport, DependencyError> {
        let text = Manifest::load(path).map_err(|e| DependencyError::Read {
            path: path.display().to_string(),
            source: e,
        })?;
        let Some(text) = text else {
            debug!(path = %path.display(), "No dependency manifest");
            return Ok(ResolveReport::default());
        };
        let manifest = Manifest::from_yaml(&text).map_err(|e| DependencyError::Parse {
            path: path.display().to_string(),
            source: e,
        })?;
        Ok(self.resolve_manifest(&manifest, repo).await)
    }

    /// Probe and install every package of `manifest`, in declaration order.
    pub async fn resolve_manifest(
        &self,
        manifest: &Manifest,
        repo: &PackageRepoConfig,
    ) -> ResolveReport {
        let mut report = ResolveReport::default();
        for spec in manifest.packages() {
            let outcome = self.resolve_package(&spec, repo).await;
            if outcome.is_soft_failure() {
                warn!(package = %spec.name, manager = %spec.manager, ?outcome, "Dependency not resolved");
            }
            report.packages.push(PackageReport {
                name: spec.name,
                manager: spec.manager,
                outcome,
            });
        }
        report
    }

    async fn resolve_package(&self, spec: &PackageSpec, repo: &PackageRepoConfig) -> PackageOutcome {
        let plan = match PackagePlan::new(spec, repo) {
            Ok(plan) => plan,
            Err(manager) => return PackageOutcome::Unsupported(manager),
        };

        let probe = plan.probe();
        let verdict = match self.runner.run(&probe).await {
            Ok(output) => plan.interpret_probe(&output),
            Err(e) => ProbeVerdict::Failed(format!("failed to run {}: {}", probe.program, e)),
        };

        match verdict {
            ProbeVerdict::Present => {
                debug!(package = %plan.name, manager = %plan.manager, "Package already installed");
                PackageOutcome::AlreadyInstalled
            }
            ProbeVerdict::Failed(reason) => PackageOutcome::ProbeFailed(reason),
            ProbeVerdict::Absent => {
                info!(
                    package = %plan.name,
                    command = %plan.install().command_line(),
                    "Installing missing package"
                );
                match self.runner.run(&plan.install()).await {
                    Ok(output) if output.success() => {
                        info!(package = %plan.name, "Package installed");
                        PackageOutcome::Installed
                    }
                    Ok(output) => PackageOutcome::InstallFailed(format!(
                        "install exited with status code {}: {}",
                        output.exit_code.unwrap_or(-1),
                        output.stderr.trim()
                    )),
                    Err(e) => PackageOutcome::InstallFailed(e.to_string()),
                }
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::process::{ProcessOutput, ScriptedRunner};
    use tempfile::TempDir;

    const MANIFEST: &str = r#"
dependencies:
  - name: robotframework-browser
    type: pip
    version: "18.0.0"
    packages:
      - name: playwright
        type: npm
  - name: jq
    type: apt
  - name: serde
    type: cargo
"#;

    fn write_manifest(dir: &TempDir, text: &str) -> std::path::PathBuf {
        let path = dir.path().join("workflow.yml");
        std::fs::write(&path, text).unwrap();
        path
    }

    #[tokio::test]
    async fn test_missing_manifest_is_empty_report() {
        let dir = TempDir::new().unwrap();
        let runner = Arc::new(ScriptedRunner::new());
        let resolver = DependencyResolver::new(runner.clone());

        let report = resolver
            .resolve(&dir.path().join("workflow.yml"), &PackageRepoConfig::default())
            .await
            .unwrap();
        assert!(report.packages.is_empty());
        assert!(runner.calls().is_empty());
    }

    #[tokio::test]
    async fn test_malformed_manifest_is_hard_error() {
        let dir = TempDir::new().unwrap();
        let path = write_manifest(&dir, "dependencies: [name: {");
        let resolver = DependencyResolver::new(Arc::new(ScriptedRunner::new()));

        let err = resolver
            .resolve(&path, &PackageRepoConfig::default())
            .await
            .unwrap_err();
        assert!(matches!(err, DependencyError::Parse { .. }));
    }

    #[tokio::test]
    async fn test_installs_only_absent_packages() {
        let dir = TempDir::new().unwrap();
        let path = write_manifest(&dir, MANIFEST);
        // npm reports playwright as installed; pip and apt report absence.
        let runner = Arc::new(ScriptedRunner::with_handler(|spec| {
            Ok(match (spec.program.as_str(), spec.args.first().map(String::as_str)) {
                ("npm", Some("ls")) => {
                    ProcessOutput::exited(0).with_stdout("└── playwright@1.44.0")
                }
                ("pip3", Some("show")) | ("dpkg-query", _) => ProcessOutput::exited(1),
                _ => ProcessOutput::exited(0),
            })
        }));
        let resolver = DependencyResolver::new(runner.clone());

        let report = resolver
            .resolve(&path, &PackageRepoConfig::default())
            .await
            .unwrap();

        let outcomes: Vec<_> = report.packages.iter().map(|p| p.outcome.clone()).collect();
        assert_eq!(
            outcomes,
            [
                PackageOutcome::AlreadyInstalled,
                PackageOutcome::Installed,
                PackageOutcome::Installed,
                PackageOutcome::Unsupported("cargo".into()),
            ]
        );
        assert_eq!(report.installed(), 2);
        assert_eq!(report.already_installed(), 1);
        assert_eq!(report.soft_failures(), 1);

        let programs: Vec<_> = runner.calls().into_iter().map(|c| c.program).collect();
        assert_eq!(programs, ["npm", "pip3", "pip3", "dpkg-query", "apt-get"]);
    }

    #[tokio::test]
    async fn test_probe_failure_skips_install() {
        let runner = Arc::new(ScriptedRunner::with_handler(|spec| {
            Ok(if spec.program == "dpkg-query" {
                ProcessOutput::exited(2).with_stderr("dpkg: database locked")
            } else {
                ProcessOutput::exited(0)
            })
        }));
        let resolver = DependencyResolver::new(runner.clone());
        let manifest = Manifest::from_yaml("dependencies:\n  - name: jq\n    type: apt\n").unwrap();

        let report = resolver
            .resolve_manifest(&manifest, &PackageRepoConfig::default())
            .await;

        assert!(matches!(
            &report.packages[0].outcome,
            PackageOutcome::ProbeFailed(reason) if reason.contains("database locked")
        ));
        assert!(runner.calls_to("apt-get").is_empty());
    }

    #[tokio::test]
    async fn test_install_failure_is_soft() {
        let runner = Arc::new(ScriptedRunner::with_handler(|spec| {
            Ok(match spec.args.first().map(String::as_str) {
                Some("ls") => ProcessOutput::exited(1),
                _ => ProcessOutput::exited(243).with_stderr("EACCES"),
            })
        }));
        let resolver = DependencyResolver::new(runner);
        let manifest =
            Manifest::from_yaml("dependencies:\n  - name: playwright\n    type: npm\n").unwrap();

        let report = resolver
            .resolve_manifest(&manifest, &PackageRepoConfig::default())
            .await;
        assert!(matches!(
            &report.packages[0].outcome,
            PackageOutcome::InstallFailed(reason) if reason.contains("243")
        ));
        assert_eq!(report.soft_failures(), 1);
    }
}
