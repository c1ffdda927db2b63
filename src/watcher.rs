use crate::host::PlaylistInfo;
use crate::m3u::{self, WriteSuppressor};
use crate::paths;
use log::{debug, info, warn};
use notify::{Config as NotifyConfig, Event, EventKind, RecommendedWatcher, RecursiveMode, Watcher};
use std::path::PathBuf;
use std::sync::Arc;

/// Deepest directory covering every text-file playlist, the root the
/// single recursive watcher is installed at.
pub fn compute_watch_root(playlists: &[PlaylistInfo]) -> Option<PathBuf> {
    let text_paths: Vec<PathBuf> = playlists
        .iter()
        .filter(|playlist| m3u::is_playlist_file(&playlist.path))
        .map(|playlist| playlist.path.clone())
        .collect();
    paths::common_root(&text_paths)
}

/// Owns the lifecycle of the one recursive file watcher for text-file
/// playlists. Reconfiguring always tears the previous watcher down first;
/// setup problems degrade to running without a watcher rather than
/// failing, since an explicit update-all still works.
#[derive(Default)]
pub struct WatcherCoordinator {
    watcher: Option<RecommendedWatcher>,
}

impl WatcherCoordinator {
    pub fn is_active(&self) -> bool {
        self.watcher.is_some()
    }

    pub fn stop(&mut self) {
        if self.watcher.take().is_some() {
            info!("playlist file watcher stopped");
        }
    }

    /// Installs (or removes) the watcher for the given playlist universe.
    /// Events are filtered to playlist files, checked against the
    /// self-write ledger, and handed to `on_change` as raw paths.
    pub fn reconfigure(
        &mut self,
        enabled: bool,
        playlists: &[PlaylistInfo],
        suppressor: Arc<WriteSuppressor>,
        on_change: impl Fn(PathBuf) + Send + 'static,
    ) {
        self.stop();
        if !enabled {
            return;
        }

        let Some(root) = compute_watch_root(playlists) else {
            warn!("no common root over text playlists, watcher not started");
            return;
        };
        if !root.exists() {
            warn!("watch root {} does not exist, watcher not started", root.display());
            return;
        }

        let handler = move |result: notify::Result<Event>| {
            let event = match result {
                Ok(event) => event,
                Err(err) => {
                    warn!("watch error: {err}");
                    return;
                }
            };

            // Creations, edits, and renames matter; reads and removals
            // don't reorder anything.
            if !matches!(event.kind, EventKind::Create(_) | EventKind::Modify(_)) {
                return;
            }

            for path in event.paths {
                if !m3u::is_playlist_file(&path) {
                    continue;
                }
                if suppressor.should_suppress(&path) {
                    debug!("ignoring own write to {}", path.display());
                    continue;
                }
                on_change(path);
            }
        };

        let mut watcher = match RecommendedWatcher::new(handler, NotifyConfig::default()) {
            Ok(watcher) => watcher,
            Err(err) => {
                warn!("failed to create file watcher: {err}");
                return;
            }
        };
        match watcher.watch(&root, RecursiveMode::Recursive) {
            Ok(()) => {
                info!("watching {} for playlist changes", root.display());
                self.watcher = Some(watcher);
            }
            Err(err) => {
                warn!("failed to watch {}: {err}", root.display());
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;
    use std::sync::mpsc;
    use std::time::Duration;
    use tempfile::tempdir;

    fn playlist(path: &str) -> PlaylistInfo {
        PlaylistInfo::new("x", path)
    }

    #[test]
    fn watch_root_spans_all_text_playlists() {
        let playlists = vec![
            playlist("/music/pl/a.m3u"),
            playlist("/music/pl/sub/b.m3u8"),
            playlist("/music/other.m3u"),
        ];
        assert_eq!(
            compute_watch_root(&playlists),
            Some(PathBuf::from("/music"))
        );
    }

    #[test]
    fn watch_root_ignores_host_managed_playlists() {
        let playlists = vec![
            playlist("/music/pl/a.m3u"),
            playlist("/library/internal/jazz"),
        ];
        assert_eq!(
            compute_watch_root(&playlists),
            Some(PathBuf::from("/music/pl"))
        );
        assert_eq!(compute_watch_root(&[playlist("/library/jazz")]), None);
    }

    #[test]
    fn missing_root_leaves_watcher_inactive() {
        let mut coordinator = WatcherCoordinator::default();
        coordinator.reconfigure(
            true,
            &[playlist("/does/not/exist/a.m3u")],
            Arc::new(WriteSuppressor::default()),
            |_| {},
        );
        assert!(!coordinator.is_active());
    }

    #[test]
    fn disabled_mode_stops_an_active_watcher() {
        let dir = tempdir().expect("tempdir");
        let playlist_path = dir.path().join("mix.m3u");
        fs::write(&playlist_path, "/a.mp3\n").expect("seed");
        let playlists = vec![PlaylistInfo::new("mix", &playlist_path)];

        let mut coordinator = WatcherCoordinator::default();
        coordinator.reconfigure(
            true,
            &playlists,
            Arc::new(WriteSuppressor::default()),
            |_| {},
        );
        assert!(coordinator.is_active());

        coordinator.reconfigure(
            false,
            &playlists,
            Arc::new(WriteSuppressor::default()),
            |_| {},
        );
        assert!(!coordinator.is_active());
    }

    #[test]
    fn edits_reach_the_handler_but_own_writes_do_not() {
        let dir = tempdir().expect("tempdir");
        let playlist_path = dir.path().join("mix.m3u");
        let other_file = dir.path().join("notes.txt");
        fs::write(&playlist_path, "/a.mp3\n").expect("seed");

        let suppressor = Arc::new(WriteSuppressor::default());
        let (tx, rx) = mpsc::channel();
        let mut coordinator = WatcherCoordinator::default();
        coordinator.reconfigure(
            true,
            &[PlaylistInfo::new("mix", &playlist_path)],
            Arc::clone(&suppressor),
            move |path| {
                let _ = tx.send(path);
            },
        );
        assert!(coordinator.is_active());

        fs::write(&other_file, "irrelevant").expect("write other");
        fs::write(&playlist_path, "/b.mp3\n").expect("edit playlist");

        let seen = rx
            .recv_timeout(Duration::from_secs(5))
            .expect("playlist event");
        assert!(paths::paths_equal_ci(&seen, &playlist_path));

        // Let duplicate notifications for the same edit settle, then drain.
        std::thread::sleep(Duration::from_millis(250));
        while rx.try_recv().is_ok() {}

        suppressor.register(&playlist_path);
        fs::write(&playlist_path, "/c.mp3\n").expect("self write");
        assert!(rx.recv_timeout(Duration::from_millis(400)).is_err());
    }
}
