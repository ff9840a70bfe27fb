//! File-system collaborator used by the log sink.
//!
//! The sink never touches `std::fs` directly. [`StdFileSystem`] is the real
//! implementation; [`MemoryFileSystem`] keeps files in memory and can inject
//! failures, which is what the tests use.

use std::collections::{HashMap, HashSet};
use std::fs::{self, OpenOptions};
use std::io::{self, Write};
use std::path::{Path, PathBuf};
use std::sync::Mutex;
use std::sync::atomic::{AtomicU32, Ordering};

/// Minimal file operations needed by an append-only log.
pub trait FileSystem: Send + Sync {
    /// Whether a file or directory exists at `path`.
    fn exists(&self, path: &Path) -> bool;

    /// Create a directory and any missing parents.
    fn create_dir_all(&self, path: &Path) -> io::Result<()>;

    /// Create (or replace) a file with the given contents.
    fn write_file(&self, path: &Path, contents: &str) -> io::Result<()>;

    /// Append text to an existing file.
    ///
    /// Must fail if the file does not exist rather than creating it, so that a
    /// log without a preamble is never produced.
    fn append_file(&self, path: &Path, contents: &str) -> io::Result<()>;

    /// Read a whole file as UTF-8 text.
    fn read_file(&self, path: &Path) -> io::Result<String>;
}

/// [`FileSystem`] backed by the operating system.
#[derive(Debug, Clone, Copy, Default)]
pub struct StdFileSystem;

impl FileSystem for StdFileSystem {
    fn exists(&self, path: &Path) -> bool {
        path.exists()
    }

    fn create_dir_all(&self, path: &Path) -> io::Result<()> {
        fs::create_dir_all(path)
    }

    fn write_file(&self, path: &Path, contents: &str) -> io::Result<()> {
        fs::write(path, contents)
    }

    fn append_file(&self, path: &Path, contents: &str) -> io::Result<()> {
        let mut file = OpenOptions::new().append(true).open(path)?;
        file.write_all(contents.as_bytes())?;
        file.flush()
    }

    fn read_file(&self, path: &Path) -> io::Result<String> {
        fs::read_to_string(path)
    }
}

/// In-memory [`FileSystem`] with failure injection.
#[derive(Debug, Default)]
pub struct MemoryFileSystem {
    files: Mutex<HashMap<PathBuf, String>>,
    dirs: Mutex<HashSet<PathBuf>>,
    /// Number of upcoming appends that should fail.
    failing_appends: AtomicU32,
    /// Number of upcoming file creations that should fail.
    failing_writes: AtomicU32,
}

impl MemoryFileSystem {
    /// Create an empty in-memory file system.
    pub fn new() -> Self {
        Self::default()
    }

    /// Make the next `count` appends fail with an I/O error.
    pub fn fail_next_appends(&self, count: u32) {
        self.failing_appends.store(count, Ordering::SeqCst);
    }

    /// Make the next `count` file creations fail with an I/O error.
    pub fn fail_next_writes(&self, count: u32) {
        self.failing_writes.store(count, Ordering::SeqCst);
    }

    /// Current contents of a file, if it exists.
    pub fn contents(&self, path: &Path) -> Option<String> {
        lock(&self.files).get(path).cloned()
    }

    /// Whether a directory was created at `path`.
    pub fn has_dir(&self, path: &Path) -> bool {
        lock(&self.dirs).contains(path)
    }

    fn take_failure(counter: &AtomicU32) -> bool {
        counter
            .fetch_update(Ordering::SeqCst, Ordering::SeqCst, |n| n.checked_sub(1))
            .is_ok()
    }
}

fn lock<T>(mutex: &Mutex<T>) -> std::sync::MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
}

fn injected(what: &str) -> io::Error {
    io::Error::other(format!("injected {what} failure"))
}

impl FileSystem for MemoryFileSystem {
    fn exists(&self, path: &Path) -> bool {
        lock(&self.files).contains_key(path) || lock(&self.dirs).contains(path)
    }

    fn create_dir_all(&self, path: &Path) -> io::Result<()> {
        let mut dirs = lock(&self.dirs);
        for ancestor in path.ancestors().filter(|p| !p.as_os_str().is_empty()) {
            dirs.insert(ancestor.to_path_buf());
        }
        Ok(())
    }

    fn write_file(&self, path: &Path, contents: &str) -> io::Result<()> {
        if Self::take_failure(&self.failing_writes) {
            return Err(injected("write"));
        }
        if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty())
            && !lock(&self.dirs).contains(parent)
        {
            return Err(io::Error::new(
                io::ErrorKind::NotFound,
                format!("directory {} does not exist", parent.display()),
            ));
        }
        lock(&self.files).insert(path.to_path_buf(), contents.to_string());
        Ok(())
    }

    fn append_file(&self, path: &Path, contents: &str) -> io::Result<()> {
        if Self::take_failure(&self.failing_appends) {
            return Err(injected("append"));
        }
        match lock(&self.files).get_mut(path) {
            Some(existing) => {
                existing.push_str(contents);
                Ok(())
            }
            None => Err(io::Error::new(
                io::ErrorKind::NotFound,
                format!("{} does not exist", path.display()),
            )),
        }
    }

    fn read_file(&self, path: &Path) -> io::Result<String> {
        self.contents(path).ok_or_else(|| {
            io::Error::new(
                io::ErrorKind::NotFound,
                format!("{} does not exist", path.display()),
            )
        })
    }
}

impl<F: FileSystem + ?Sized> FileSystem for std::sync::Arc<F> {
    fn exists(&self, path: &Path) -> bool {
        (**self).exists(path)
    }

    fn create_dir_all(&self, path: &Path) -> io::Result<()> {
        (**self).create_dir_all(path)
    }

    fn write_file(&self, path: &Path, contents: &str) -> io::Result<()> {
        (**self).write_file(path, contents)
    }

    fn append_file(&self, path: &Path, contents: &str) -> io::Result<()> {
        (**self).append_file(path, contents)
    }

    fn read_file(&self, path: &Path) -> io::Result<String> {
        (**self).read_file(path)
    }
}
