//! Backup safety net for the delete strategy
//!
//! Before a credential is deleted upstream its raw content is written here, and
//! it is read back when the credential is re-uploaded. A backup exists exactly
//! while a credential is deleted by this guard and not yet restored, which also
//! makes the backup directory a durable record of what the guard owns across
//! restarts (see `BackupStore::names`).
//!
//! Writes use temp file + rename in the same directory so a crash mid-write
//! never leaves a truncated backup behind.

use std::path::{Path, PathBuf};

use tracing::{debug, info, warn};

use crate::error::{Error, Result};

/// Local key/value store of credential content, keyed by credential name.
pub trait BackupStore: Send + Sync {
    /// Persist `content` under `name`, replacing any previous entry. Returns
    /// only after the data is fully on disk.
    fn save(&self, name: &str, content: &[u8]) -> Result<()>;

    fn load(&self, name: &str) -> Result<Option<Vec<u8>>>;

    fn exists(&self, name: &str) -> bool;

    /// Remove the entry for `name`. Missing entries are not an error.
    fn remove(&self, name: &str) -> Result<()>;

    /// Names of every stored entry.
    fn names(&self) -> Result<Vec<String>>;
}

/// One file per credential inside a directory.
#[derive(Debug, Clone)]
pub struct FileBackupStore {
    dir: PathBuf,
}

impl FileBackupStore {
    /// Open (and create if needed) the backup directory.
    pub fn open(dir: impl Into<PathBuf>) -> Result<Self> {
        let dir = dir.into();
        std::fs::create_dir_all(&dir)
            .map_err(|e| Error::Backup(format!("creating {}: {e}", dir.display())))?;
        info!(path = %dir.display(), "backup directory ready");
        Ok(Self { dir })
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }

    /// Map a credential name to its file, rejecting anything that is not a
    /// plain file name. Names come from the upstream service and are untrusted.
    fn path_for(&self, name: &str) -> Result<PathBuf> {
        let plain = !name.is_empty()
            && !name.starts_with('.')
            && !name.contains(['/', '\\', '\0']);
        if !plain {
            return Err(Error::InvalidName(name.to_owned()));
        }
        Ok(self.dir.join(name))
    }
}

impl BackupStore for FileBackupStore {
    fn save(&self, name: &str, content: &[u8]) -> Result<()> {
        let path = self.path_for(name)?;
        write_atomic(&self.dir, &path, content)?;
        info!(account = name, bytes = content.len(), "backup saved");
        Ok(())
    }

    fn load(&self, name: &str) -> Result<Option<Vec<u8>>> {
        let path = self.path_for(name)?;
        match std::fs::read(&path) {
            Ok(content) => Ok(Some(content)),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                warn!(account = name, "no backup found");
                Ok(None)
            }
            Err(e) => Err(Error::Backup(format!("reading {}: {e}", path.display()))),
        }
    }

    fn exists(&self, name: &str) -> bool {
        self.path_for(name).is_ok_and(|p| p.is_file())
    }

    fn remove(&self, name: &str) -> Result<()> {
        let path = self.path_for(name)?;
        match std::fs::remove_file(&path) {
            Ok(()) => {
                info!(account = name, "backup removed");
                Ok(())
            }
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(()),
            Err(e) => Err(Error::Backup(format!("removing {}: {e}", path.display()))),
        }
    }

    fn names(&self) -> Result<Vec<String>> {
        let entries = std::fs::read_dir(&self.dir)
            .map_err(|e| Error::Backup(format!("listing {}: {e}", self.dir.display())))?;

        let mut names = Vec::new();
        for entry in entries {
            let entry =
                entry.map_err(|e| Error::Backup(format!("listing {}: {e}", self.dir.display())))?;
            if !entry.file_type().is_ok_and(|t| t.is_file()) {
                continue;
            }
            // Temp files are hidden; anything else that is not valid UTF-8 was
            // not written by us.
            match entry.file_name().into_string() {
                Ok(name) if !name.starts_with('.') => names.push(name),
                _ => {}
            }
        }
        names.sort();
        Ok(names)
    }
}

/// Write `content` to `path` atomically.
///
/// Writes a hidden temp file in `dir`, syncs it, then renames it over the
/// target. Permissions are 0600 on unix since the content is a live credential.
fn write_atomic(dir: &Path, path: &Path, content: &[u8]) -> Result<()> {
    use std::io::Write;

    let file_name = path
        .file_name()
        .and_then(|n| n.to_str())
        .ok_or_else(|| Error::Backup(format!("bad backup path {}", path.display())))?;
    let tmp_path = dir.join(format!(".{file_name}.tmp.{}", std::process::id()));

    let mut file = std::fs::File::create(&tmp_path)
        .map_err(|e| Error::Backup(format!("creating {}: {e}", tmp_path.display())))?;

    #[cfg(unix)]
    {
        use std::os::unix::fs::PermissionsExt;
        file.set_permissions(std::fs::Permissions::from_mode(0o600))
            .map_err(|e| Error::Backup(format!("setting backup permissions: {e}")))?;
    }

    file.write_all(content)
        .and_then(|()| file.sync_all())
        .map_err(|e| Error::Backup(format!("writing {}: {e}", tmp_path.display())))?;
    drop(file);

    std::fs::rename(&tmp_path, path)
        .map_err(|e| Error::Backup(format!("renaming into {}: {e}", path.display())))?;

    debug!(path = %path.display(), "persisted backup");
    Ok(())
}
