use crate::model::{FileProperty, TagField};
use crate::paths;
use anyhow::Result;
use log::error;
use std::path::{Path, PathBuf};
use std::sync::Mutex;

/// Extension used by auto-generated ("smart") playlists, which are never
/// reordered by this engine.
const AUTO_PLAYLIST_EXTENSION: &str = "xautopf";

/// A playlist known to the host: display name plus storage path.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PlaylistInfo {
    pub name: String,
    pub path: PathBuf,
}

impl PlaylistInfo {
    pub fn new(name: impl Into<String>, path: impl Into<PathBuf>) -> Self {
        Self {
            name: name.into(),
            path: path.into(),
        }
    }
}

/// The host application's playlist and library surface. The engine only
/// consumes this capability; reading tags and managing the library is the
/// host's business.
pub trait HostLibrary: Send + Sync {
    /// Every playlist the host knows, including auto-generated ones.
    fn playlists(&self) -> Vec<PlaylistInfo>;

    /// Member files of a host-managed playlist, in play order.
    fn query_members(&self, path: &Path) -> Result<Vec<String>>;

    /// Replaces a host-managed playlist's member order. The host may echo
    /// this back as a playlist-updated notification; callers must tolerate
    /// re-entry from their own write.
    fn write_members(&self, path: &Path, members: &[String]) -> Result<()>;

    /// A file property value, as a string, for sort-key extraction.
    fn file_property(&self, file: &str, property: FileProperty) -> String;

    /// A metadata tag value, as a string, for sort-key extraction.
    fn file_tag(&self, file: &str, tag: TagField) -> String;

    /// Display name for a storage path, when the path belongs to a known
    /// playlist.
    fn playlist_name(&self, path: &Path) -> Option<String> {
        self.playlists()
            .into_iter()
            .find(|p| paths::paths_equal_ci(&p.path, path))
            .map(|p| p.name)
    }
}

/// All host playlists minus the auto-generated ones.
pub fn static_playlists(host: &dyn HostLibrary) -> Vec<PlaylistInfo> {
    host.playlists()
        .into_iter()
        .filter(|p| {
            !p.path
                .extension()
                .is_some_and(|ext| ext.eq_ignore_ascii_case(AUTO_PLAYLIST_EXTENSION))
        })
        .collect()
}

/// User-facing error sink. The host-integration layer maps this onto its
/// notification surface; failures routed here must be shown, not swallowed.
pub trait Reporter: Send + Sync {
    fn report(&self, message: &str);
}

/// Reporter that forwards to the log facade. The fallback when no
/// interactive surface is wired up.
#[derive(Debug, Default)]
pub struct LogReporter;

impl Reporter for LogReporter {
    fn report(&self, message: &str) {
        error!("{message}");
    }
}

/// Reporter that buffers messages for later display (or inspection in
/// tests).
#[derive(Debug, Default)]
pub struct CollectingReporter {
    messages: Mutex<Vec<String>>,
}

impl CollectingReporter {
    pub fn messages(&self) -> Vec<String> {
        self.messages.lock().expect("reporter lock").clone()
    }
}

impl Reporter for CollectingReporter {
    fn report(&self, message: &str) {
        self.messages
            .lock()
            .expect("reporter lock")
            .push(message.to_string());
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    struct FixedHost(Vec<PlaylistInfo>);

    impl HostLibrary for FixedHost {
        fn playlists(&self) -> Vec<PlaylistInfo> {
            self.0.clone()
        }

        fn query_members(&self, _path: &Path) -> Result<Vec<String>> {
            Ok(Vec::new())
        }

        fn write_members(&self, _path: &Path, _members: &[String]) -> Result<()> {
            Ok(())
        }

        fn file_property(&self, _file: &str, _property: FileProperty) -> String {
            String::new()
        }

        fn file_tag(&self, _file: &str, _tag: TagField) -> String {
            String::new()
        }
    }

    #[test]
    fn static_playlists_drop_auto_generated_entries() {
        let host = FixedHost(vec![
            PlaylistInfo::new("Jazz", "/pl/jazz.m3u"),
            PlaylistInfo::new("Recent", "/pl/recent.XAUTOPF"),
        ]);

        let names: Vec<String> = static_playlists(&host).into_iter().map(|p| p.name).collect();
        assert_eq!(names, vec![String::from("Jazz")]);
    }

    #[test]
    fn playlist_name_matches_case_insensitively() {
        let host = FixedHost(vec![PlaylistInfo::new("Jazz", "/Playlists/Jazz.m3u")]);
        assert_eq!(
            host.playlist_name(Path::new("/playlists/jazz.M3U")),
            Some(String::from("Jazz"))
        );
        assert_eq!(host.playlist_name(Path::new("/playlists/rock.m3u")), None);
    }
}
