//! Repository access for artifact installs.
//!
//! [`GitCli`] uses the system `git` command. Credentials are embedded in the
//! clone URL and never written to logs.

use std::path::{Path, PathBuf};
use std::process::Stdio;

use async_trait::async_trait;
use parking_lot::Mutex;
use thiserror::Error;
use tracing::{debug, info};

/// Name of the version-control metadata directory.
pub const METADATA_DIR: &str = ".git";

#[derive(Debug, Error)]
pub enum RepoError {
    /// The clone destination is already populated.
    #[error("Destination already exists: {}", .0.display())]
    AlreadyExists(PathBuf),

    #[error("Invalid repository URL '{url}': {reason}")]
    InvalidUrl { url: String, reason: String },

    #[error("git {command} failed: {stderr}")]
    Git { command: String, stderr: String },

    #[error("No remote reference matches '{0}'")]
    NoProductionBranch(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

pub type Result<T> = std::result::Result<T, RepoError>;

/// Basic-auth credentials for repository access.
#[derive(Clone, Default, PartialEq, Eq)]
pub struct RepoCredentials {
    pub username: String,
    pub password: String,
}

impl RepoCredentials {
    pub fn new(username: impl Into<String>, password: impl Into<String>) -> Self {
        Self {
            username: username.into(),
            password: password.into(),
        }
    }
}

impl std::fmt::Debug for RepoCredentials {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RepoCredentials")
            .field("username", &self.username)
            .field("password", &"***")
            .finish()
    }
}

/// A cloned working tree.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RepoHandle {
    path: PathBuf,
}

impl RepoHandle {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Whether the tree still carries version-control metadata.
    pub fn has_metadata(&self) -> bool {
        self.path.join(METADATA_DIR).exists()
    }
}

/// Source-control operations used by install.
#[async_trait]
pub trait RepoClient: Send + Sync {
    /// Clone `url` into `dest`.
    ///
    /// Returns [`RepoError::AlreadyExists`] without touching anything when
    /// `dest` is a non-empty directory.
    async fn clone_repo(
        &self,
        url: &str,
        dest: &Path,
        credentials: &RepoCredentials,
    ) -> Result<RepoHandle>;

    /// Every reference known to the clone, fully qualified.
    async fn list_references(&self, handle: &RepoHandle) -> Result<Vec<String>>;

    /// Check out `reference`, discarding local changes.
    async fn checkout(&self, handle: &RepoHandle, reference: &str) -> Result<()>;

    /// Remove version-control metadata so the tree is a plain directory.
    async fn strip_metadata(&self, handle: &RepoHandle) -> Result<()> {
        let metadata = handle.path().join(METADATA_DIR);
        if metadata.exists() {
            tokio::fs::remove_dir_all(&metadata).await?;
            debug!(path = %handle.path().display(), "Removed repository metadata");
        }
        Ok(())
    }
}

fn is_populated(dest: &Path) -> bool {
    std::fs::read_dir(dest)
        .map(|mut entries| entries.next().is_some())
        .unwrap_or(false)
}

/// Pick the first reference containing `branch`.
pub fn find_reference<'a>(references: &'a [String], branch: &str) -> Option<&'a str> {
    references
        .iter()
        .map(String::as_str)
        .find(|r| r.contains(branch))
}

// ─────────────────────────────────────────────────────────────────────────────
// Git CLI
// ─────────────────────────────────────────────────────────────────────────────

/// Repository client backed by the system `git` command.
#[derive(Debug, Clone, Copy, Default)]
pub struct GitCli;

impl GitCli {
    /// Embed credentials into an http(s) URL. Other schemes and plain paths
    /// are returned unchanged.
    fn authenticated_url(url: &str, credentials: &RepoCredentials) -> Result<String> {
        let mut parsed = match url::Url::parse(url) {
            Ok(parsed) => parsed,
            Err(url::ParseError::RelativeUrlWithoutBase) => return Ok(url.to_string()),
            Err(e) => {
                return Err(RepoError::InvalidUrl {
                    url: url.to_string(),
                    reason: e.to_string(),
                });
            }
        };
        if !matches!(parsed.scheme(), "http" | "https") || credentials.username.is_empty() {
            return Ok(url.to_string());
        }

        let invalid = |_| RepoError::InvalidUrl {
            url: url.to_string(),
            reason: "cannot carry credentials".into(),
        };
        parsed.set_username(&credentials.username).map_err(invalid)?;
        parsed
            .set_password(Some(&credentials.password))
            .map_err(invalid)?;
        Ok(parsed.into())
    }

    async fn git(
        dir: Option<&Path>,
        args: &[&str],
        credentials: &RepoCredentials,
    ) -> Result<String> {
        let mut command = tokio::process::Command::new("git");
        command
            .args(args)
            .env("GIT_TERMINAL_PROMPT", "0")
            .stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped());
        if let Some(dir) = dir {
            command.current_dir(dir);
        }

        let output = command.output().await?;
        if output.status.success() {
            return Ok(String::from_utf8_lossy(&output.stdout).into_owned());
        }

        let mut stderr = String::from_utf8_lossy(&output.stderr).trim().to_string();
        if !credentials.password.is_empty() {
            stderr = stderr.replace(&credentials.password, "***");
        }
        Err(RepoError::Git {
            command: args.first().copied().unwrap_or_default().to_string(),
            stderr,
        })
    }
}

#[async_trait]
impl RepoClient for GitCli {
    async fn clone_repo(
        &self,
        url: &str,
        dest: &Path,
        credentials: &RepoCredentials,
    ) -> Result<RepoHandle> {
        if is_populated(dest) {
            return Err(RepoError::AlreadyExists(dest.to_path_buf()));
        }
        if let Some(parent) = dest.parent() {
            tokio::fs::create_dir_all(parent).await?;
        }

        let remote = Self::authenticated_url(url, credentials)?;
        let dest_str = dest.to_string_lossy();
        info!(url, dest = %dest.display(), "Cloning repository");
        Self::git(
            None,
            &["clone", "--quiet", remote.as_str(), dest_str.as_ref()],
            credentials,
        )
        .await?;

        Ok(RepoHandle::new(dest))
    }

    async fn list_references(&self, handle: &RepoHandle) -> Result<Vec<String>> {
        let stdout = Self::git(
            Some(handle.path()),
            &["for-each-ref", "--format=%(refname)"],
            &RepoCredentials::default(),
        )
        .await?;
        Ok(stdout
            .lines()
            .map(str::trim)
            .filter(|l| !l.is_empty())
            .map(String::from)
            .collect())
    }

    async fn checkout(&self, handle: &RepoHandle, reference: &str) -> Result<()> {
        debug!(reference, path = %handle.path().display(), "Checking out");
        Self::git(
            Some(handle.path()),
            &["checkout", "--force", "--quiet", reference],
            &RepoCredentials::default(),
        )
        .await?;
        Ok(())
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// Fake
// ─────────────────────────────────────────────────────────────────────────────

/// In-process [`RepoClient`] that materializes a fixed file tree.
///
/// A cloned tree contains every configured file plus an empty `.git`
/// directory.
#[derive(Debug)]
pub struct FakeRepoClient {
    files: Vec<(String, String)>,
    references: Vec<String>,
    fail_clone: bool,
    clones: Mutex<Vec<PathBuf>>,
    checkouts: Mutex<Vec<String>>,
}

impl Default for FakeRepoClient {
    fn default() -> Self {
        Self {
            files: Vec::new(),
            references: vec![
                "refs/heads/main".to_string(),
                "refs/remotes/origin/main".to_string(),
                "refs/remotes/origin/production".to_string(),
            ],
            fail_clone: false,
            clones: Mutex::new(Vec::new()),
            checkouts: Mutex::new(Vec::new()),
        }
    }
}

impl FakeRepoClient {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_file(mut self, path: impl Into<String>, contents: impl Into<String>) -> Self {
        self.files.push((path.into(), contents.into()));
        self
    }

    pub fn with_references(mut self, references: &[&str]) -> Self {
        self.references = references.iter().map(|r| r.to_string()).collect();
        self
    }

    /// Make every clone fail with a git error.
    pub fn failing(mut self) -> Self {
        self.fail_clone = true;
        self
    }

    /// Destinations cloned so far.
    pub fn clones(&self) -> Vec<PathBuf> {
        self.clones.lock().clone()
    }

    pub fn checkouts(&self) -> Vec<String> {
        self.checkouts.lock().clone()
    }
}

#[async_trait]
impl RepoClient for FakeRepoClient {
    async fn clone_repo(
        &self,
        url: &str,
        dest: &Path,
        _credentials: &RepoCredentials,
    ) -> Result<RepoHandle> {
        if is_populated(dest) {
            return Err(RepoError::AlreadyExists(dest.to_path_buf()));
        }
        if self.fail_clone {
            return Err(RepoError::Git {
                command: "clone".into(),
                stderr: format!("repository '{url}' not found"),
            });
        }

        std::fs::create_dir_all(dest.join(METADATA_DIR))?;
        for (path, contents) in &self.files {
            let target = dest.join(path);
            if let Some(parent) = target.parent() {
                std::fs::create_dir_all(parent)?;
            }
            std::fs::write(target, contents)?;
        }
        self.clones.lock().push(dest.to_path_buf());
        Ok(RepoHandle::new(dest))
    }

    async fn list_references(&self, _handle: &RepoHandle) -> Result<Vec<String>> {
        Ok(self.references.clone())
    }

    async fn checkout(&self, _handle: &RepoHandle, reference: &str) -> Result<()> {
        self.checkouts.lock().push(reference.to_string());
        Ok(())
    }
}
