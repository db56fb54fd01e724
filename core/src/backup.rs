/// Atomic output writes with a timestamped backup of the previous file
use chrono::Local;
use log::debug;
use serde::Serialize;
use std::fs::{self, File, OpenOptions};
use std::io::{self, ErrorKind, Write};
use std::path::{Path, PathBuf};

#[derive(Debug, Serialize, Clone)]
#[serde(rename_all = "camelCase")]
pub struct BackupOutcome {
    /// Copy of the previous output, if there was one worth keeping
    pub backup_path: Option<PathBuf>,
    pub final_path: PathBuf,
}

#[derive(Debug, thiserror::Error)]
pub enum BackupError {
    #[error("{0}")]
    Io(#[from] io::Error),
    #[error("failed to create backup of {}: {reason}", .path.display())]
    BackupCreate { path: PathBuf, reason: String },
}

/// Attempts at a free backup name within one timestamp
const MAX_BACKUP_SUFFIX: usize = 1000;

/// Write `contents` to `target` through a temporary sibling file and a rename.
///
/// A non-empty existing `target` is first copied to
/// `<name>.<ext>.bak.<YYYYmmddHHMMSS>`, or `...<YYYYmmddHHMMSS>.<n>` when that
/// name is taken. Existing backups are never overwritten. Empty files are not
/// backed up.
pub fn backup_and_swap(target: &Path, contents: &[u8]) -> Result<BackupOutcome, BackupError> {
    let parent = target
        .parent()
        .filter(|p| !p.as_os_str().is_empty())
        .unwrap_or_else(|| Path::new("."));
    fs::create_dir_all(parent)?;

    let has_previous = fs::metadata(target)
        .map(|meta| meta.is_file() && meta.len() > 0)
        .unwrap_or(false);

    let backup_path = if has_previous {
        let timestamp = Local::now().format("%Y%m%d%H%M%S").to_string();
        let backup = create_backup(target, &timestamp).map_err(|err| BackupError::BackupCreate {
            path: target.to_path_buf(),
            reason: err.to_string(),
        })?;
        debug!("backed up {} to {}", target.display(), backup.display());
        Some(backup)
    } else {
        None
    };

    let temp_path = build_temp_path(target);
    stage_temp(&temp_path, |file| file.write_all(contents))?;

    #[cfg(target_os = "windows")]
    {
        if let Err(err) = fs::rename(&temp_path, target) {
            if err.kind() == ErrorKind::AlreadyExists {
                fs::remove_file(target)?;
                fs::rename(&temp_path, target)?;
            } else {
                let _ = fs::remove_file(&temp_path);
                return Err(BackupError::Io(err));
            }
        }
    }

    #[cfg(not(target_os = "windows"))]
    {
        if let Err(err) = fs::rename(&temp_path, target) {
            let _ = fs::remove_file(&temp_path);
            return Err(BackupError::Io(err));
        }
    }

    Ok(BackupOutcome {
        backup_path,
        final_path: target.to_path_buf(),
    })
}

/// Fill and fsync a fresh temp file. The temp file is removed if any step fails.
fn stage_temp<F>(temp_path: &Path, fill: F) -> io::Result<()>
where
    F: FnOnce(&mut File) -> io::Result<()>,
{
    let staged = OpenOptions::new()
        .create(true)
        .write(true)
        .truncate(true)
        .open(temp_path)
        .and_then(|mut file| {
            fill(&mut file)?;
            file.sync_all()
        });

    if staged.is_err() {
        let _ = fs::remove_file(temp_path);
    }
    staged
}

/// Copy `target` into the first free backup name for `timestamp`
fn create_backup(target: &Path, timestamp: &str) -> io::Result<PathBuf> {
    let mut source = File::open(target)?;
    for attempt in 0..MAX_BACKUP_SUFFIX {
        let candidate = backup_path_for(target, timestamp, attempt);
        let mut backup = match OpenOptions::new().write(true).create_new(true).open(&candidate) {
            Ok(file) => file,
            Err(err) if err.kind() == ErrorKind::AlreadyExists => continue,
            Err(err) => return Err(err),
        };
        let copied = io::copy(&mut source, &mut backup).and_then(|_| backup.sync_all());
        if let Err(err) = copied {
            let _ = fs::remove_file(&candidate);
            return Err(err);
        }
        return Ok(candidate);
    }
    Err(io::Error::new(
        ErrorKind::AlreadyExists,
        format!("no free backup name for timestamp {timestamp}"),
    ))
}

fn backup_path_for(target: &Path, timestamp: &str, attempt: usize) -> PathBuf {
    let mut name = target
        .file_name()
        .map(|n| n.to_os_string())
        .unwrap_or_else(|| "output".into());
    name.push(format!(".bak.{timestamp}"));
    if attempt > 0 {
        name.push(format!(".{attempt}"));
    }
    target.with_file_name(name)
}

fn build_temp_path(target: &Path) -> PathBuf {
    let mut temp = target.to_path_buf();
    let suffix = format!(".tmp{}", std::process::id());
    match temp.file_name() {
        Some(name) => {
            let mut os_string = name.to_os_string();
            os_string.push(suffix);
            temp.set_file_name(os_string);
        }
        None => {
            temp.push(format!("output{suffix}"));
        }
    }
    temp
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    #[test]
    fn writes_backup_and_swaps() {
        let dir = tempdir().unwrap();
        let target = dir.path().join("strings.rpy");
        fs::write(&target, b"translate schinese strings:\n").unwrap();

        let outcome = backup_and_swap(&target, b"fresh").unwrap();
        assert_eq!(fs::read_to_string(&target).unwrap(), "fresh");

        let backup = outcome.backup_path.expect("previous output is backed up");
        let backup_name = backup.file_name().unwrap().to_string_lossy().into_owned();
        assert!(backup_name.starts_with("strings.rpy.bak."));
        assert_eq!(
            fs::read_to_string(&backup).unwrap(),
            "translate schinese strings:\n"
        );
    }

    #[test]
    fn creates_missing_parent_without_backup() {
        let dir = tempdir().unwrap();
        let target = dir.path().join("tl").join("schinese").join("out.rpy");

        let outcome = backup_and_swap(&target, b"").unwrap();
        assert!(outcome.backup_path.is_none());
        assert_eq!(fs::read(&target).unwrap(), b"");
    }

    #[test]
    fn empty_previous_file_is_not_backed_up() {
        let dir = tempdir().unwrap();
        let target = dir.path().join("out.rpy");
        fs::write(&target, b"").unwrap();

        let outcome = backup_and_swap(&target, b"new").unwrap();
        assert!(outcome.backup_path.is_none());
        let leftovers = fs::read_dir(dir.path()).unwrap().count();
        assert_eq!(leftovers, 1);
    }

    #[test]
    fn back_to_back_swaps_keep_every_backup() {
        let dir = tempdir().unwrap();
        let target = dir.path().join("strings.rpy");
        fs::write(&target, "first").unwrap();

        let first = backup_and_swap(&target, b"second").unwrap().backup_path.unwrap();
        let second = backup_and_swap(&target, b"third").unwrap().backup_path.unwrap();
        let third = backup_and_swap(&target, b"fourth").unwrap().backup_path.unwrap();

        assert_ne!(first, second);
        assert_ne!(second, third);
        assert_eq!(fs::read_to_string(&first).unwrap(), "first");
        assert_eq!(fs::read_to_string(&second).unwrap(), "second");
        assert_eq!(fs::read_to_string(&third).unwrap(), "third");
        assert_eq!(fs::read_to_string(&target).unwrap(), "fourth");
    }

    #[test]
    fn taken_backup_name_gets_a_counter() {
        let dir = tempdir().unwrap();
        let target = dir.path().join("out.rpy");
        fs::write(&target, "current").unwrap();
        fs::write(backup_path_for(&target, "20260101000000", 0), "older").unwrap();

        let backup = create_backup(&target, "20260101000000").unwrap();
        assert_eq!(backup, dir.path().join("out.rpy.bak.20260101000000.1"));
        assert_eq!(fs::read_to_string(&backup).unwrap(), "current");
        assert_eq!(
            fs::read_to_string(backup_path_for(&target, "20260101000000", 0)).unwrap(),
            "older"
        );
    }

    #[test]
    fn failed_staging_removes_temp_file() {
        let dir = tempdir().unwrap();
        let temp = build_temp_path(&dir.path().join("out.rpy"));

        let err = stage_temp(&temp, |file| {
            file.write_all(b"partial")?;
            Err(io::Error::new(ErrorKind::Other, "disk full"))
        })
        .unwrap_err();
        assert_eq!(err.to_string(), "disk full");
        assert!(!temp.exists());
        assert_eq!(fs::read_dir(dir.path()).unwrap().count(), 0);
    }
}
