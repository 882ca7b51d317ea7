//! Cross-process cooperative path lock and the atomic
//! "build-on-a-temp-sibling-then-rename" update scope.
//!
//! Grounded on the clone-cache/workspace-install atomicity requirement: the
//! clone cache and workspace clone installation must survive a concurrent
//! invocation of the tool being killed mid-update without ever exposing a
//! half-written directory tree.

use fs4::fs_std::FileExt;
use std::fs::{self, File};
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tracing::debug;

const LEASE: Duration = Duration::from_secs(5);
const HEARTBEAT_INTERVAL: Duration = Duration::from_millis(1500);

fn lock_path_for(path: &Path) -> PathBuf {
    let mut name = path
        .file_name()
        .map(|n| n.to_string_lossy().into_owned())
        .unwrap_or_default();
    name.push_str("-gitws.lock");
    path.with_file_name(name)
}

/// A held filesystem lock for `path`. While alive, a background thread
/// refreshes the lease every [`HEARTBEAT_INTERVAL`]; dropping it stops the
/// heartbeat and releases the underlying OS lock.
pub struct PathLock {
    _file: File,
    stop: Arc<AtomicBool>,
    handle: Option<std::thread::JoinHandle<()>>,
}

impl PathLock {
    /// Acquire the lock at `"{path}-gitws.lock"`, blocking until available.
    pub fn acquire(path: &Path) -> std::io::Result<Self> {
        let lock_path = lock_path_for(path);
        if let Some(parent) = lock_path.parent() {
            fs::create_dir_all(parent)?;
        }
        let file = File::create(&lock_path)?;
        debug!(path = %lock_path.display(), "acquiring path lock");
        FileExt::lock_exclusive(&file)?;

        let stop = Arc::new(AtomicBool::new(false));
        let heartbeat_stop = Arc::clone(&stop);
        let heartbeat_path = lock_path.clone();
        let handle = std::thread::spawn(move || {
            while !heartbeat_stop.load(Ordering::Relaxed) {
                std::thread::sleep(HEARTBEAT_INTERVAL);
                if heartbeat_stop.load(Ordering::Relaxed) {
                    break;
                }
                // Refresh the lease by touching the lock file's mtime;
                // the lease itself is enforced only by convention between
                // cooperating processes of this tool, since the held OS
                // lock already excludes concurrent holders.
                let _ = filetime_touch(&heartbeat_path);
            }
        });

        Ok(Self {
            _file: file,
            stop,
            handle: Some(handle),
        })
    }
}

impl Drop for PathLock {
    fn drop(&mut self) {
        self.stop.store(true, Ordering::Relaxed);
        if let Some(handle) = self.handle.take() {
            let _ = handle.join();
        }
        // FileExt's lock is released implicitly when `_file` drops.
    }
}

fn filetime_touch(path: &Path) -> std::io::Result<()> {
    let now = std::time::SystemTime::now();
    File::options().write(true).open(path)?.set_modified(now)
}

/// Hold `path_lock(path)` for the duration of `body`, which receives a
/// temporary sibling path to build the new contents of `path` in.
///
/// On success, `path` (if present) is removed and the temp sibling is
/// renamed onto it. On failure, the temp sibling is removed and the error
/// propagates; `path` is left untouched either way until the rename.
pub fn atomic_update_or_create_path<T, E, F>(path: &Path, body: F) -> Result<T, E>
where
    F: FnOnce(&Path) -> Result<T, E>,
    E: From<std::io::Error>,
{
    let _lock = PathLock::acquire(path).map_err(E::from)?;

    let tmp_path = path.with_file_name(format!(
        "{}-{}",
        path.file_name()
            .map(|n| n.to_string_lossy().into_owned())
            .unwrap_or_default(),
        uuid_like(),
    ));

    if path.exists() {
        copy_recursive(path, &tmp_path).map_err(E::from)?;
    } else if let Some(parent) = tmp_path.parent() {
        fs::create_dir_all(parent).map_err(E::from)?;
    }

    match body(&tmp_path) {
        Ok(value) => {
            if path.exists() {
                remove_recursive(path).map_err(E::from)?;
            }
            fs::rename(&tmp_path, path).map_err(E::from)?;
            Ok(value)
        }
        Err(e) => {
            let _ = remove_recursive(&tmp_path);
            Err(e)
        }
    }
}

fn copy_recursive(src: &Path, dst: &Path) -> std::io::Result<()> {
    if src.is_dir() {
        fs::create_dir_all(dst)?;
        for entry in fs::read_dir(src)? {
            let entry = entry?;
            copy_recursive(&entry.path(), &dst.join(entry.file_name()))?;
        }
    } else if src.is_symlink() {
        let target = fs::read_link(src)?;
        #[cfg(unix)]
        std::os::unix::fs::symlink(target, dst)?;
        #[cfg(not(unix))]
        fs::copy(src, dst).map(|_| ())?;
        let _ = target;
    } else {
        fs::copy(src, dst)?;
    }
    Ok(())
}

fn remove_recursive(path: &Path) -> std::io::Result<()> {
    if path.is_dir() && !path.is_symlink() {
        fs::remove_dir_all(path)
    } else {
        fs::remove_file(path)
    }
}

fn uuid_like() -> String {
    use std::time::{SystemTime, UNIX_EPOCH};
    let nanos = SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .unwrap_or_default()
        .as_nanos();
    let pid = std::process::id();
    format!("{pid:x}-{nanos:x}")
}
