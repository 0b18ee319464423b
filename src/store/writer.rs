// Impass — Durable writer
//
// Replace-on-write for the database file `P`:
//   1. write the new ciphertext to `P.new` and flush it to disk   (stage)
//   2. remember `P`'s permissions, rename `P` → `P.bak`           (commit)
//   3. apply those permissions (0600 for a first save) to `P.new`
//   4. rename `P.new` → `P`
//
// A failure in step 1 never touches `P`. A failure between 2 and 4 leaves
// the previous generation in `P.bak` for the operator to recover.

use std::ffi::OsString;
use std::fs::{self, File, OpenOptions, Permissions};
use std::io::{self, Write};
use std::path::{Path, PathBuf};

/// `path` with `suffix` appended to its file name (`db` → `db.new`).
pub fn sibling(path: &Path, suffix: &str) -> PathBuf {
    let mut name: OsString = path.as_os_str().to_owned();
    name.push(suffix);
    PathBuf::from(name)
}

pub fn staging_path(path: &Path) -> PathBuf {
    sibling(path, ".new")
}

pub fn backup_path(path: &Path) -> PathBuf {
    sibling(path, ".bak")
}

/// Run all four steps.
pub fn write_atomic(path: &Path, bytes: &[u8]) -> io::Result<()> {
    stage(path, bytes)?.commit()
}

/// Step 1: the new content, fully written next to its final location.
#[derive(Debug)]
pub struct StagedWrite {
    target: PathBuf,
    staged: PathBuf,
}

pub fn stage(path: &Path, bytes: &[u8]) -> io::Result<StagedWrite> {
    let staged = staging_path(path);

    let result = write_synced(&staged, bytes);
    if let Err(e) = result {
        let _ = fs::remove_file(&staged);
        return Err(e);
    }

    tracing::debug!(staged = %staged.display(), bytes = bytes.len(), "Staged new database generation");
    Ok(StagedWrite {
        target: path.to_path_buf(),
        staged,
    })
}

impl StagedWrite {
    pub fn staged_path(&self) -> &Path {
        &self.staged
    }

    /// Steps 2-4: rotate the backup and move the staged file into place.
    pub fn commit(self) -> io::Result<()> {
        self.commit_with(sync_parent)
    }

    /// `commit` with the directory flush supplied by the caller. Once the
    /// final rename succeeds the new generation is in place, so a failed
    /// flush is only logged: an error here would invite a retry that
    /// rotates the new file into `P.bak`.
    fn commit_with<F>(self, sync_dir: F) -> io::Result<()>
    where
        F: FnOnce(&Path) -> io::Result<()>,
    {
        let permissions = match fs::metadata(&self.target) {
            Ok(meta) => {
                let permissions = meta.permissions();
                fs::rename(&self.target, backup_path(&self.target))?;
                permissions
            }
            Err(e) if e.kind() == io::ErrorKind::NotFound => owner_only(&self.staged)?,
            Err(e) => return Err(e),
        };

        fs::set_permissions(&self.staged, permissions)?;
        fs::rename(&self.staged, &self.target)?;
        if let Err(e) = sync_dir(&self.target) {
            tracing::warn!(path = %self.target.display(), error = %e, "Could not flush database directory");
        }

        tracing::info!(path = %self.target.display(), "Database written");
        Ok(())
    }
}

fn write_synced(path: &Path, bytes: &[u8]) -> io::Result<()> {
    let mut options = OpenOptions::new();
    options.write(true).create(true).truncate(true);
    #[cfg(unix)]
    {
        use std::os::unix::fs::OpenOptionsExt;
        options.mode(0o600);
    }

    let mut file = options.open(path)?;
    file.write_all(bytes)?;
    file.sync_all()
}

#[cfg(unix)]
fn owner_only(_staged: &Path) -> io::Result<Permissions> {
    use std::os::unix::fs::PermissionsExt;
    Ok(Permissions::from_mode(0o600))
}

#[cfg(not(unix))]
fn owner_only(staged: &Path) -> io::Result<Permissions> {
    Ok(fs::metadata(staged)?.permissions())
}

#[cfg(unix)]
fn sync_parent(path: &Path) -> io::Result<()> {
    match path.parent().filter(|p| !p.as_os_str().is_empty()) {
        Some(dir) => File::open(dir)?.sync_all(),
        None => File::open(".")?.sync_all(),
    }
}

#[cfg(not(unix))]
fn sync_parent(_path: &Path) -> io::Result<()> {
    Ok(())
}

// ─── Tests ───────────────────────────────────────────────────────────────────
