use crate::config::Config;
use crate::host::HostLibrary;
use crate::m3u::{self, M3uStore, WriteOptions, WriteSuppressor};
use anyhow::Result;
use std::path::Path;
use std::sync::Arc;

/// One query/write surface over the two playlist backing stores: the
/// host-managed store and raw `.m3u`/`.m3u8` text files. The engine never
/// branches on the storage kind itself.
pub struct PlaylistStore {
    host: Arc<dyn HostLibrary>,
    text: M3uStore,
}

impl PlaylistStore {
    pub fn new(host: Arc<dyn HostLibrary>, suppressor: Arc<WriteSuppressor>) -> Self {
        Self {
            host,
            text: M3uStore::new(suppressor),
        }
    }

    /// Text-file handling applies only when the listener mode is on and
    /// the storage path carries a recognized playlist extension.
    pub fn uses_text_file(&self, config: &Config, path: &Path) -> bool {
        config.file_listener_enabled && m3u::is_playlist_file(path)
    }

    pub fn query_members(&self, config: &Config, path: &Path) -> Result<Vec<String>> {
        if self.uses_text_file(config, path) {
            self.text.read_members(path)
        } else {
            self.host.query_members(path)
        }
    }

    /// Returns `true` when content actually changed on the backing store.
    /// Host-managed writes always count as a change; the host decides.
    pub fn write_members(&self, config: &Config, path: &Path, members: &[String]) -> Result<bool> {
        if self.uses_text_file(config, path) {
            self.text.write_members(
                path,
                members,
                WriteOptions {
                    use_relative_paths: config.use_relative_paths,
                },
            )
        } else {
            self.host.write_members(path, members)?;
            Ok(true)
        }
    }
}
