//! Applying a staged update.

use std::path::{Path, PathBuf};

use tracing::{info, warn};
use trellis_engine::{ProcessRunner, ProcessSpec};

use crate::error::{Result, UpdateError};

const SHELL: &str = "/bin/bash";
/// Subdirectory of a UI payload holding the built bundle.
pub const UI_BUILD_DIR: &str = "build";

/// Copy `src` over `dest`, skipping hidden entries.
///
/// An existing destination directory receives the whole tree, replacing
/// files of the same name. An existing destination file is replaced by the
/// single file `src` must contain. A missing destination is treated as a
/// file when `src` holds exactly one file, as a directory otherwise.
pub fn copy_and_replace(src: &Path, dest: &Path) -> Result<()> {
    if dest.is_dir() {
        return copy_tree(src, dest);
    }
    let files = visible_entries(src)?;
    let single = match files.as_slice() {
        [only] if only.is_file() => Some(only.clone()),
        _ => None,
    };
    match single {
        Some(file) => {
            std::fs::copy(&file, dest)?;
            Ok(())
        }
        None if dest.exists() => Err(UpdateError::AmbiguousSource(src.display().to_string())),
        None => {
            std::fs::create_dir_all(dest)?;
            copy_tree(src, dest)
        }
    }
}

fn copy_tree(src: &Path, dest: &Path) -> Result<()> {
    for entry in visible_entries(src)? {
        let Some(name) = entry.file_name() else {
            continue;
        };
        let target = dest.join(name);
        if entry.is_dir() {
            std::fs::create_dir_all(&target)?;
            copy_tree(&entry, &target)?;
        } else {
            std::fs::copy(&entry, &target)?;
        }
    }
    Ok(())
}

fn visible_entries(dir: &Path) -> Result<Vec<PathBuf>> {
    let mut entries = Vec::new();
    for entry in std::fs::read_dir(dir)? {
        let entry = entry?;
        if entry.file_name().to_string_lossy().starts_with('.') {
            continue;
        }
        entries.push(entry.path());
    }
    entries.sort();
    Ok(entries)
}

/// Copy a staged UI payload over the live bundle.
pub fn apply_ui(staging: &Path, ui_dir: &Path) -> Result<()> {
    let build = staging.join(UI_BUILD_DIR);
    let source = if build.is_dir() { build } else { staging.to_path_buf() };
    copy_and_replace(&source, ui_dir)?;
    info!(ui_dir = %ui_dir.display(), "UI update applied");
    Ok(())
}

/// Run a supervisor script from the engine directory.
///
/// The script swaps the staged binary in and stops the running process.
pub async fn run_supervisor(runner: &dyn ProcessRunner, engine_path: &Path, script: &str) -> Result<()> {
    let path = engine_path.join(script);
    let spec = ProcessSpec::new(SHELL).arg(path.display().to_string());
    info!(script = %path.display(), "Running supervisor script");

    let output = runner.run(&spec).await.map_err(|e| UpdateError::Supervisor {
        script: script.to_string(),
        message: e.to_string(),
    })?;
    if !output.success() {
        warn!(script, exit_code = ?output.exit_code, "Supervisor script failed");
        return Err(UpdateError::Supervisor {
            script: script.to_string(),
            message: format!("exit code {:?}: {}", output.exit_code, output.stderr.trim()),
        });
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;
    use trellis_engine::{ProcessOutput, ScriptedRunner};

    fn write(path: &Path, contents: &str) {
        std::fs::create_dir_all(path.parent().unwrap()).unwrap();
        std::fs::write(path, contents).unwrap();
    }

    #[test]
    fn test_tree_copy_replaces_and_skips_hidden() {
        let dir = TempDir::new().unwrap();
        let src = dir.path().join("src");
        let dest = dir.path().join("wui");
        write(&src.join("index.html"), "new");
        write(&src.join("static/app.js"), "v2");
        write(&src.join(".DS_Store"), "junk");
        write(&dest.join("index.html"), "old");
        write(&dest.join("favicon.ico"), "keep");

        copy_and_replace(&src, &dest).unwrap();
        assert_eq!(std::fs::read_to_string(dest.join("index.html")).unwrap(), "new");
        assert_eq!(std::fs::read_to_string(dest.join("static/app.js")).unwrap(), "v2");
        assert!(dest.join("favicon.ico").exists());
        assert!(!dest.join(".DS_Store").exists());
    }

    #[test]
    fn test_single_file_destination() {
        let dir = TempDir::new().unwrap();
        let src = dir.path().join("src");
        let dest = dir.path().join("guard");
        write(&src.join("guard-linux-amd64"), "binary-v2");
        write(&dest, "binary-v1");

        copy_and_replace(&src, &dest).unwrap();
        assert_eq!(std::fs::read_to_string(&dest).unwrap(), "binary-v2");
    }

    #[test]
    fn test_single_file_destination_needs_single_source() {
        let dir = TempDir::new().unwrap();
        let src = dir.path().join("src");
        let dest = dir.path().join("guard");
        write(&src.join("a"), "1");
        write(&src.join("b"), "2");
        write(&dest, "binary-v1");

        let err = copy_and_replace(&src, &dest).unwrap_err();
        assert!(matches!(err, UpdateError::AmbiguousSource(_)));
    }

    #[test]
    fn test_apply_ui_prefers_build_dir() {
        let dir = TempDir::new().unwrap();
        let staging = dir.path().join("update/ui");
        write(&staging.join("build/index.html"), "bundle");
        write(&staging.join("build/main.css"), "css");
        let ui_dir = dir.path().join("wui");

        apply_ui(&staging, &ui_dir).unwrap();
        assert_eq!(std::fs::read_to_string(ui_dir.join("index.html")).unwrap(), "bundle");
        assert!(!ui_dir.join("build").exists());
    }

    #[tokio::test]
    async fn test_supervisor_invocation() {
        let runner = ScriptedRunner::new();
        run_supervisor(&runner, Path::new("/opt/engine"), "updateAndStopEngine.sh")
            .await
            .unwrap();
        let calls = runner.calls_to("/bin/bash");
        assert_eq!(calls.len(), 1);
        assert_eq!(calls[0].args, ["/opt/engine/updateAndStopEngine.sh"]);
    }

    #[tokio::test]
    async fn test_supervisor_failure() {
        let runner = ScriptedRunner::with_handler(|_| {
            Ok(ProcessOutput::exited(1).with_stderr("binary busy"))
        });
        let err = run_supervisor(&runner, Path::new("/opt/engine"), "updateAndStopGuard.sh")
            .await
            .unwrap_err();
        assert!(matches!(err, UpdateError::Supervisor { message, .. } if message.contains("binary busy")));
    }
}
