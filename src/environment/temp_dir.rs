//! Per-run temporary directory for test files

use std::env;
use std::fs;
use std::io;
use std::path::{Path, PathBuf, MAIN_SEPARATOR};

use crate::environment::Environment;
use crate::error::{Error, Result};

/// Name prefix of every directory created by [`TempDirEnvironment`]
pub const TEMP_DIR_PREFIX: &str = "pandrs-test.";

const ENVIRONMENT_NAME: &str = "temp-dir";

/// Get the temporary root directory, respecting environment variables
///
/// Checks in order: TMPDIR, TEMP, TMP, then falls back to std::env::temp_dir()
pub fn default_temp_root() -> PathBuf {
    env::var("TMPDIR")
        .or_else(|_| env::var("TEMP"))
        .or_else(|_| env::var("TMP"))
        .map(PathBuf::from)
        .unwrap_or_else(|_| env::temp_dir())
}

#[derive(Debug)]
enum TempDirState {
    Uninitialized,
    Ready(PathBuf),
    Destroyed,
}

/// Provides a temporary directory for temporary test files.
///
/// The directory is created with a unique name when the environment is set up
/// and removed, with everything below it, when it is torn down (or dropped).
///
/// ```
/// use pandrs_testkit::environment::{Environment, TempDirEnvironment};
///
/// let mut env = TempDirEnvironment::new();
/// env.set_up().unwrap();
/// let path = env.temp_file_path("data.csv").unwrap();
/// std::fs::write(&path, "a,b\n1,2\n").unwrap();
/// env.tear_down().unwrap();
/// assert!(!path.exists());
/// ```
#[derive(Debug)]
pub struct TempDirEnvironment {
    root: PathBuf,
    state: TempDirState,
    cleanup: Option<CleanupReport>,
}

impl TempDirEnvironment {
    /// Environment creating its directory under [`default_temp_root`]
    pub fn new() -> Self {
        Self::with_root(default_temp_root())
    }

    /// Environment creating its directory under `root`
    pub fn with_root(root: impl Into<PathBuf>) -> Self {
        Self {
            root: root.into(),
            state: TempDirState::Uninitialized,
            cleanup: None,
        }
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    /// Get directory path to use for temporary files
    pub fn temp_dir(&self) -> Result<&Path> {
        match &self.state {
            TempDirState::Ready(path) => Ok(path),
            _ => Err(self.invalid_state("provide a temporary directory")),
        }
    }

    /// The temporary directory as a string ending in a path separator
    pub fn temp_dir_prefix(&self) -> Result<String> {
        let mut prefix = self.temp_dir()?.to_string_lossy().into_owned();
        if !prefix.ends_with(MAIN_SEPARATOR) {
            prefix.push(MAIN_SEPARATOR);
        }
        Ok(prefix)
    }

    /// Get a temporary file path to use for the specified file name
    ///
    /// The file is not created and its existence is not checked.
    pub fn temp_file_path(&self, filename: impl AsRef<Path>) -> Result<PathBuf> {
        Ok(self.temp_dir()?.join(filename))
    }

    /// Outcome of the teardown walk, once the environment has been torn down
    pub fn cleanup_report(&self) -> Option<&CleanupReport> {
        self.cleanup.as_ref()
    }

    fn state_name(&self) -> &'static str {
        match self.state {
            TempDirState::Uninitialized => "uninitialized",
            TempDirState::Ready(_) => "ready",
            TempDirState::Destroyed => "destroyed",
        }
    }

    fn invalid_state(&self, action: &'static str) -> Error {
        Error::InvalidState {
            environment: ENVIRONMENT_NAME.to_string(),
            action,
            state: self.state_name(),
        }
    }
}

impl Default for TempDirEnvironment {
    fn default() -> Self {
        Self::new()
    }
}

impl Environment for TempDirEnvironment {
    fn name(&self) -> &str {
        ENVIRONMENT_NAME
    }

    fn set_up(&mut self) -> Result<()> {
        if !matches!(self.state, TempDirState::Uninitialized) {
            return Err(self.invalid_state("set up"));
        }

        let creation_error = |source| Error::TempDirCreation {
            root: self.root.clone(),
            source,
        };
        let root = fs::canonicalize(&self.root).map_err(creation_error)?;
        let dir = tempfile::Builder::new()
            .prefix(TEMP_DIR_PREFIX)
            .tempdir_in(&root)
            .map_err(creation_error)?
            .keep();

        log::info!("Created temporary test directory {}", dir.display());
        self.state = TempDirState::Ready(dir);
        Ok(())
    }

    fn tear_down(&mut self) -> Result<()> {
        let dir = match std::mem::replace(&mut self.state, TempDirState::Destroyed) {
            TempDirState::Ready(dir) => dir,
            previous => {
                self.state = previous;
                return Err(self.invalid_state("tear down"));
            }
        };

        let report = remove_tree(&dir);
        if report.is_clean() {
            log::info!(
                "Removed temporary test directory {} ({} entries)",
                dir.display(),
                report.removed
            );
        } else {
            log::warn!(
                "Temporary test directory {} was not fully removed: \
                 {} failures, {} entries on other filesystems",
                dir.display(),
                report.failures.len(),
                report.skipped.len()
            );
        }
        self.cleanup = Some(report);
        Ok(())
    }
}

impl Drop for TempDirEnvironment {
    fn drop(&mut self) {
        if matches!(self.state, TempDirState::Ready(_)) {
            let _ = self.tear_down();
        }
    }
}

/// Result of a best-effort recursive removal
#[derive(Debug, Default)]
pub struct CleanupReport {
    /// Files, links and directories removed
    pub removed: usize,
    /// Directories left alone because they are on another filesystem
    pub skipped: Vec<PathBuf>,
    /// Entries that could not be inspected or removed
    pub failures: Vec<(PathBuf, io::Error)>,
}

impl CleanupReport {
    pub fn is_clean(&self) -> bool {
        self.failures.is_empty() && self.skipped.is_empty()
    }

    fn record_failure(&mut self, path: &Path, err: io::Error) {
        log::warn!("Failed to remove {}: {}", path.display(), err);
        self.failures.push((path.to_path_buf(), err));
    }
}

/// Removes `root` and everything below it, depth first
///
/// Symbolic links are removed, never followed, and directories on a different
/// filesystem than `root` are skipped. A failing entry does not stop the walk.
pub fn remove_tree(root: &Path) -> CleanupReport {
    let mut report = CleanupReport::default();
    match fs::symlink_metadata(root) {
        Ok(metadata) => remove_entry(root, &metadata, device_of(&metadata), &mut report),
        Err(err) => report.record_failure(root, err),
    }
    report
}

fn remove_entry(
    path: &Path,
    metadata: &fs::Metadata,
    root_device: Option<u64>,
    report: &mut CleanupReport,
) {
    if !metadata.is_dir() {
        match fs::remove_file(path) {
            Ok(()) => report.removed += 1,
            Err(err) => report.record_failure(path, err),
        }
        return;
    }

    if device_of(metadata) != root_device {
        log::warn!("Not crossing mount point {}", path.display());
        report.skipped.push(path.to_path_buf());
        return;
    }

    match fs::read_dir(path) {
        Ok(entries) => {
            for entry in entries {
                let child = match entry {
                    Ok(entry) => entry.path(),
                    Err(err) => {
                        report.record_failure(path, err);
                        continue;
                    }
                };
                match fs::symlink_metadata(&child) {
                    Ok(child_metadata) => {
                        remove_entry(&child, &child_metadata, root_device, report)
                    }
                    Err(err) => report.record_failure(&child, err),
                }
            }
        }
        Err(err) => report.record_failure(path, err),
    }

    match fs::remove_dir(path) {
        Ok(()) => report.removed += 1,
        Err(err) => report.record_failure(path, err),
    }
}

#[cfg(unix)]
fn device_of(metadata: &fs::Metadata) -> Option<u64> {
    use std::os::unix::fs::MetadataExt;
    Some(metadata.dev())
}

#[cfg(not(unix))]
fn device_of(_metadata: &fs::Metadata) -> Option<u64> {
    None
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_temp_root_exists() {
        let root = default_temp_root();
        assert!(root.exists());
        assert!(root.is_dir());
    }

    #[test]
    fn test_accessors_require_ready_state() {
        let scratch = tempfile::tempdir().unwrap();
        let mut env = TempDirEnvironment::with_root(scratch.path());

        assert!(matches!(
            env.temp_dir(),
            Err(Error::InvalidState { state: "uninitialized", .. })
        ));
        assert!(env.temp_file_path("x").is_err());
        assert!(env.tear_down().is_err());

        env.set_up().unwrap();
        assert!(env.temp_dir().is_ok());
        assert!(env.set_up().is_err());

        env.tear_down().unwrap();
        assert!(matches!(
            env.temp_dir(),
            Err(Error::InvalidState { state: "destroyed", .. })
        ));
        assert!(env.tear_down().is_err());
    }

    #[test]
    fn test_directory_is_unique_and_prefixed() {
        let scratch = tempfile::tempdir().unwrap();
        let mut a = TempDirEnvironment::with_root(scratch.path());
        let mut b = TempDirEnvironment::with_root(scratch.path());
        a.set_up().unwrap();
        b.set_up().unwrap();

        let dir_a = a.temp_dir().unwrap().to_path_buf();
        let dir_b = b.temp_dir().unwrap().to_path_buf();
        assert_ne!(dir_a, dir_b);
        assert!(dir_a.is_absolute());
        let name = dir_a.file_name().unwrap().to_string_lossy().into_owned();
        assert!(name.starts_with(TEMP_DIR_PREFIX));

        a.tear_down().unwrap();
        b.tear_down().unwrap();
    }

    #[test]
    fn test_prefix_has_trailing_separator() {
        let scratch = tempfile::tempdir().unwrap();
        let mut env = TempDirEnvironment::with_root(scratch.path());
        env.set_up().unwrap();

        let prefix = env.temp_dir_prefix().unwrap();
        assert!(prefix.ends_with(MAIN_SEPARATOR));
        let joined = PathBuf::from(format!("{prefix}a.bin"));
        assert_eq!(joined, env.temp_file_path("a.bin").unwrap());
    }

    #[test]
    fn test_missing_root_fails_setup() {
        let scratch = tempfile::tempdir().unwrap();
        let mut env = TempDirEnvironment::with_root(scratch.path().join("does-not-exist"));
        let err = env.set_up().unwrap_err();
        assert!(matches!(err, Error::TempDirCreation { .. }));
        assert!(err.is_fatal());
    }

    #[test]
    fn test_remove_tree_nested() {
        let scratch = tempfile::tempdir().unwrap();
        let root = scratch.path().join("tree");
        fs::create_dir_all(root.join("a/b/c")).unwrap();
        fs::write(root.join("top.txt"), "x").unwrap();
        fs::write(root.join("a/b/c/deep.txt"), "y").unwrap();

        let report = remove_tree(&root);
        assert!(report.is_clean());
        // tree, a, b, c, top.txt, deep.txt
        assert_eq!(report.removed, 6);
        assert!(!root.exists());
    }

    #[cfg(unix)]
    #[test]
    fn test_remove_tree_does_not_follow_symlinks() {
        let scratch = tempfile::tempdir().unwrap();
        let outside = scratch.path().join("outside");
        fs::create_dir(&outside).unwrap();
        fs::write(outside.join("keep.txt"), "keep").unwrap();

        let root = scratch.path().join("tree");
        fs::create_dir(&root).unwrap();
        std::os::unix::fs::symlink(&outside, root.join("link")).unwrap();

        let report = remove_tree(&root);
        assert!(report.is_clean());
        assert!(!root.exists());
        assert!(outside.join("keep.txt").exists());
    }

    #[cfg(unix)]
    #[test]
    fn test_failed_entry_does_not_stop_cleanup() {
        use std::os::unix::fs::PermissionsExt;

        let scratch = tempfile::tempdir().unwrap();
        let mut env = TempDirEnvironment::with_root(scratch.path());
        env.set_up().unwrap();

        let dir = env.temp_dir().unwrap().to_path_buf();
        let locked = dir.join("locked");
        fs::create_dir(&locked).unwrap();
        fs::write(locked.join("inner.txt"), "x").unwrap();
        fs::write(dir.join("sibling.txt"), "y").unwrap();
        fs::set_permissions(&locked, fs::Permissions::from_mode(0o555)).unwrap();

        // Permission bits do not bind a privileged user
        if fs::write(locked.join("writable.txt"), "z").is_ok() {
            fs::set_permissions(&locked, fs::Permissions::from_mode(0o755)).unwrap();
            env.tear_down().unwrap();
            return;
        }

        env.tear_down().unwrap();
        let report = env.cleanup_report().unwrap();
        assert!(!report.is_clean());
        assert!(!report.failures.is_empty());
        assert!(report
            .failures
            .iter()
            .any(|(path, _)| path.starts_with(&locked)));
        assert!(!dir.join("sibling.txt").exists());
        assert!(locked.join("inner.txt").exists());

        fs::set_permissions(&locked, fs::Permissions::from_mode(0o755)).unwrap();
        assert!(remove_tree(&dir).is_clean());
    }

    #[test]
    fn test_remove_tree_missing_root() {
        let scratch = tempfile::tempdir().unwrap();
        let report = remove_tree(&scratch.path().join("gone"));
        assert_eq!(report.removed, 0);
        assert_eq!(report.failures.len(), 1);
    }

    #[test]
    fn test_drop_removes_directory() {
        let scratch = tempfile::tempdir().unwrap();
        let dir;
        {
            let mut env = TempDirEnvironment::with_root(scratch.path());
            env.set_up().unwrap();
            dir = env.temp_dir().unwrap().to_path_buf();
            fs::write(dir.join("f.txt"), "data").unwrap();
        }
        assert!(!dir.exists());
    }
}
