use crate::paths;
use anyhow::{Context, Result};
use log::debug;
use std::collections::HashMap;
use std::ffi::OsString;
use std::fs;
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex};
use std::time::{Duration, Instant};

/// Playlist file extensions handled by the text-file backing store.
pub const PLAYLIST_EXTENSIONS: &[&str] = &["m3u", "m3u8"];

/// How long a self-write entry keeps the watcher quiet. Long enough to
/// cover the watcher's notification latency for the write that created it.
const SELF_WRITE_TTL: Duration = Duration::from_millis(1000);

pub fn is_playlist_file(path: &Path) -> bool {
    path.extension()
        .map(|ext| {
            PLAYLIST_EXTENSIONS
                .iter()
                .any(|known| ext.eq_ignore_ascii_case(known))
        })
        .unwrap_or(false)
}

fn ledger_key(path: &Path) -> String {
    paths::forward_slashes(path).to_ascii_lowercase()
}

/// Expiry ledger of paths this process just wrote. The writer registers a
/// path before touching it; the watcher drops events whose path has a live
/// entry. Expired entries are pruned on lookup.
#[derive(Debug, Default)]
pub struct WriteSuppressor {
    entries: Mutex<HashMap<String, Instant>>,
}

impl WriteSuppressor {
    pub fn register(&self, path: &Path) {
        self.register_until(path, Instant::now() + SELF_WRITE_TTL);
    }

    pub fn register_until(&self, path: &Path, expiry: Instant) {
        self.entries
            .lock()
            .expect("suppressor lock")
            .insert(ledger_key(path), expiry);
    }

    /// True while a live entry covers the path; an expired entry is
    /// removed and the event goes through.
    pub fn should_suppress(&self, path: &Path) -> bool {
        let key = ledger_key(path);
        let mut entries = self.entries.lock().expect("suppressor lock");
        match entries.get(&key) {
            Some(expiry) if Instant::now() < *expiry => true,
            Some(_) => {
                entries.remove(&key);
                false
            }
            None => false,
        }
    }
}

#[derive(Debug, Clone, Copy, Default)]
pub struct WriteOptions {
    /// Rewrite each member relative to the playlist's own directory,
    /// falling back to the absolute path when none is expressible.
    pub use_relative_paths: bool,
}

/// Backing store for `.m3u`/`.m3u8` playlists kept as plain text files.
///
/// Reads resolve each line to an absolute member path; writes are
/// idempotent, atomic, serialized per target path, and registered with the
/// suppression ledger before they land so the watcher ignores the echo.
#[derive(Debug, Default)]
pub struct M3uStore {
    suppressor: Arc<WriteSuppressor>,
    write_locks: Mutex<HashMap<String, Arc<Mutex<()>>>>,
}

impl M3uStore {
    pub fn new(suppressor: Arc<WriteSuppressor>) -> Self {
        Self {
            suppressor,
            write_locks: Mutex::new(HashMap::new()),
        }
    }

    pub fn suppressor(&self) -> Arc<WriteSuppressor> {
        Arc::clone(&self.suppressor)
    }

    /// Member paths in file order. Blank and `#` comment lines are
    /// skipped, `file://` URIs unwrapped, relative entries resolved
    /// against the playlist's directory. A read failure is an error so the
    /// caller can tell it apart from a legitimately empty playlist.
    pub fn read_members(&self, path: &Path) -> Result<Vec<String>> {
        let raw = fs::read_to_string(path)
            .with_context(|| format!("failed to read playlist file {}", path.display()))?;
        let dir = path.parent().unwrap_or_else(|| Path::new("."));

        let mut members = Vec::new();
        for line in raw.lines() {
            let trimmed = line.trim();
            if trimmed.is_empty() || trimmed.starts_with('#') {
                continue;
            }

            let entry = paths::strip_file_uri(trimmed);
            let entry_path = Path::new(&entry);
            if entry_path.is_absolute() {
                members.push(entry);
            } else {
                members.push(dir.join(entry_path).to_string_lossy().into_owned());
            }
        }
        Ok(members)
    }

    /// Rewrites the playlist to the given member order. Returns `false`
    /// when the file already holds exactly these lines and nothing was
    /// touched.
    pub fn write_members(
        &self,
        path: &Path,
        members: &[String],
        options: WriteOptions,
    ) -> Result<bool> {
        let lock = self.lock_for(path);
        let _guard = lock.lock().expect("playlist write lock");

        let lines = self.render_lines(path, members, options);

        if path.exists() {
            let existing = fs::read_to_string(path)
                .with_context(|| format!("failed to read playlist file {}", path.display()))?;
            let existing_lines: Vec<&str> = existing
                .lines()
                .filter(|line| !line.trim().is_empty())
                .collect();
            if existing_lines == lines {
                return Ok(false);
            }
        }

        // Registered before the write so the watcher event raised by the
        // write itself is already covered.
        self.suppressor.register(path);
        debug!("rewriting playlist file {}", path.display());

        let mut temp: OsString = path.as_os_str().to_owned();
        temp.push(".tmp");
        let temp = PathBuf::from(temp);

        let mut content = lines.join("\n");
        content.push('\n');
        fs::write(&temp, content)
            .with_context(|| format!("failed to write temp file {}", temp.display()))?;

        // Atomic swap; when rename refuses to replace (some platforms),
        // fall back to remove-then-rename and accept the window.
        if fs::rename(&temp, path).is_err() {
            fs::remove_file(path)
                .with_context(|| format!("failed to replace playlist {}", path.display()))?;
            fs::rename(&temp, path)
                .with_context(|| format!("failed to move {} into place", temp.display()))?;
        }

        Ok(true)
    }

    fn render_lines(&self, path: &Path, members: &[String], options: WriteOptions) -> Vec<String> {
        let dir = path.parent().unwrap_or_else(|| Path::new("."));
        members
            .iter()
            .map(|member| {
                let member_path = Path::new(member);
                if options.use_relative_paths {
                    if let Some(relative) = paths::relative_to(member_path, dir) {
                        return paths::forward_slashes(&relative);
                    }
                }
                paths::forward_slashes(member_path)
            })
            .collect()
    }

    fn lock_for(&self, path: &Path) -> Arc<Mutex<()>> {
        let mut locks = self.write_locks.lock().expect("write lock map");
        Arc::clone(locks.entry(ledger_key(path)).or_default())
    }
}
