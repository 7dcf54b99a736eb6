// src/artifact/manager.rs

use std::fs::{self, OpenOptions};
use std::io::{ErrorKind, Write};
use std::path::{Path, PathBuf};
use std::time::{Duration, SystemTime};

use chrono::Local;
use tracing::{debug, info, warn};

use crate::config::ExecutorConfig;
use crate::errors::{Result, ScriptvisorError};
use crate::output::{LogBuffer, Severity};

/// Upper bound on `_<n>` disambiguators tried within one millisecond.
const MAX_NAME_ATTEMPTS: u32 = 1000;

/// Creates, tracks and removes the transient script files a supervisor runs.
///
/// File names are `<prefix>_<YYYYMMDD_HHMMSS_mmm>.<ext>`, created with
/// create-new semantics: concurrent supervisors on the same host share the
/// directory without locking and never overwrite each other's files.
///
/// At most one artifact is *tracked* at a time. The tracked artifact is
/// removed by [`cleanup_current`](Self::cleanup_current) or, at the latest,
/// when the manager is dropped.
#[derive(Debug)]
pub struct TempArtifactManager {
    dir: PathBuf,
    prefix: String,
    extension: String,
    current: Option<PathBuf>,
    log: Option<LogBuffer>,
}

impl TempArtifactManager {
    pub fn new(
        dir: impl Into<PathBuf>,
        prefix: impl Into<String>,
        extension: impl Into<String>,
    ) -> Self {
        Self {
            dir: dir.into(),
            prefix: prefix.into(),
            extension: extension.into(),
            current: None,
            log: None,
        }
    }

    pub fn from_config(cfg: &ExecutorConfig) -> Self {
        Self::new(
            cfg.artifact_dir(),
            cfg.artifact_prefix.clone(),
            cfg.artifact_extension.clone(),
        )
    }

    /// Also report cleanup events into `log`.
    pub fn with_log(mut self, log: LogBuffer) -> Self {
        self.log = Some(log);
        self
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }

    pub fn extension(&self) -> &str {
        &self.extension
    }

    /// The tracked artifact, if any.
    pub fn current(&self) -> Option<&Path> {
        self.current.as_deref()
    }

    /// Write `source` to a fresh artifact and return its absolute path.
    ///
    /// With `track = true` the artifact becomes the current one; this fails
    /// with [`ScriptvisorError::ArtifactInUse`] while another artifact is
    /// still tracked. Untracked artifacts belong to the caller, who must
    /// remove them.
    pub fn materialize(&mut self, source: &str, track: bool) -> Result<PathBuf> {
        if track {
            if let Some(existing) = &self.current {
                return Err(ScriptvisorError::ArtifactInUse(existing.clone()));
            }
        }

        let dir = std::path::absolute(&self.dir).map_err(|source| {
            ScriptvisorError::ArtifactWrite {
                path: self.dir.clone(),
                source,
            }
        })?;

        let timestamp = Local::now().format("%Y%m%d_%H%M%S_%3f").to_string();
        let path = self.create_unique(&dir, &timestamp, source)?;

        debug!(path = ?path, track, "materialized script artifact");
        if track {
            self.current = Some(path.clone());
        }
        Ok(path)
    }

    fn create_unique(&self, dir: &Path, timestamp: &str, source: &str) -> Result<PathBuf> {
        for attempt in 0..MAX_NAME_ATTEMPTS {
            let name = if attempt == 0 {
                format!("{}_{}.{}", self.prefix, timestamp, self.extension)
            } else {
                format!("{}_{}_{}.{}", self.prefix, timestamp, attempt, self.extension)
            };
            let path = dir.join(name);

            let mut file = match OpenOptions::new().write(true).create_new(true).open(&path) {
                Ok(file) => file,
                Err(e) if e.kind() == ErrorKind::AlreadyExists => continue,
                Err(source) => return Err(ScriptvisorError::ArtifactWrite { path, source }),
            };

            if let Err(source) = file.write_all(source.as_bytes()).and_then(|()| file.flush()) {
                drop(file);
                let _ = fs::remove_file(&path);
                return Err(ScriptvisorError::ArtifactWrite { path, source });
            }
            return Ok(path);
        }

        Err(ScriptvisorError::ArtifactWrite {
            path: dir.to_path_buf(),
            source: std::io::Error::new(
                ErrorKind::AlreadyExists,
                format!("no free artifact name for timestamp {timestamp}"),
            ),
        })
    }

    /// Remove the tracked artifact, if any. Never fails: a file that is
    /// already gone is fine, other errors are logged.
    pub fn cleanup_current(&mut self) {
        let Some(path) = self.current.take() else {
            return;
        };

        match fs::remove_file(&path) {
            Ok(()) => debug!(path = ?path, "removed script artifact"),
            Err(e) if e.kind() == ErrorKind::NotFound => {
                debug!(path = ?path, "script artifact already gone");
            }
            Err(e) => {
                warn!(path = ?path, error = %e, "failed to remove script artifact");
                self.note(
                    Severity::Warning,
                    &format!("failed to remove script artifact {}: {e}", path.display()),
                );
            }
        }
    }

    /// True for file names following the artifact naming contract.
    pub fn is_artifact_name(&self, name: &str) -> bool {
        let head = format!("{}_", self.prefix);
        let tail = format!(".{}", self.extension);
        name.len() > head.len() + tail.len() && name.starts_with(&head) && name.ends_with(&tail)
    }

    /// Delete leftover artifacts whose modification time is older than
    /// `older_than`. Returns how many files were removed.
    ///
    /// Only meant for startup and explicit one-off cleanup: with a generous
    /// threshold it leaves the artifacts of sibling instances alone.
    pub fn sweep_orphans(&self, older_than: Duration) -> usize {
        let entries = match fs::read_dir(&self.dir) {
            Ok(entries) => entries,
            Err(e) => {
                warn!(dir = ?self.dir, error = %e, "cannot list artifact directory; skipping sweep");
                return 0;
            }
        };

        let now = SystemTime::now();
        let mut removed = 0;

        for entry in entries.flatten() {
            let path = entry.path();
            let Some(name) = path.file_name().and_then(|n| n.to_str()) else {
                continue;
            };
            if !self.is_artifact_name(name) || self.current.as_deref() == Some(path.as_path()) {
                continue;
            }

            // Skip anything whose age cannot be established.
            let Ok(modified) = entry.metadata().and_then(|m| m.modified()) else {
                continue;
            };
            let Ok(age) = now.duration_since(modified) else {
                continue;
            };
            if age < older_than {
                continue;
            }

            match fs::remove_file(&path) {
                Ok(()) => {
                    removed += 1;
                    debug!(path = ?path, age_secs = age.as_secs(), "removed orphaned artifact");
                    self.note(
                        Severity::Info,
                        &format!("removed orphaned script artifact {}", path.display()),
                    );
                }
                Err(e) => {
                    warn!(path = ?path, error = %e, "failed to remove orphaned artifact");
                    self.note(
                        Severity::Warning,
                        &format!("failed to remove orphaned artifact {}: {e}", path.display()),
                    );
                }
            }
        }

        if removed > 0 {
            info!(removed, dir = ?self.dir, "swept orphaned script artifacts");
        }
        removed
    }

    fn note(&self, severity: Severity, message: &str) {
        if let Some(log) = &self.log {
            log.event(severity, message);
        }
    }
}

impl Drop for TempArtifactManager {
    fn drop(&mut self) {
        self.cleanup_current();
    }
}
