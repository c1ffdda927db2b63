use crate::config::Config;
use crate::debounce::{DEBOUNCE_WINDOW, DebounceScheduler};
use crate::host::{self, HostLibrary, Reporter};
use crate::m3u::{self, WriteSuppressor};
use crate::model::ALL_PLAYLISTS;
use crate::paths;
use crate::sort;
use crate::store::PlaylistStore;
use crate::watcher::WatcherCoordinator;
use anyhow::Result;
use log::{debug, info};
use std::collections::{HashMap, HashSet};
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex};
use std::time::Duration;

/// The reconciliation engine: owns the live configuration, the membership
/// snapshots backing manual-descending playlists, the debounce scheduler,
/// and the file watcher. All host callbacks, watcher events, and UI bulk
/// actions funnel through one of its entry points; per-playlist failures
/// stop at the reporter and never take the engine down.
pub struct Engine {
    host: Arc<dyn HostLibrary>,
    reporter: Arc<dyn Reporter>,
    config_path: PathBuf,
    config: Mutex<Config>,
    store: PlaylistStore,
    scheduler: DebounceScheduler,
    playlist_index: Mutex<HashMap<String, HashSet<String>>>,
    suppressor: Arc<WriteSuppressor>,
    watcher: Mutex<WatcherCoordinator>,
    config_session_open: Mutex<bool>,
}

impl Engine {
    pub fn new(
        host: Arc<dyn HostLibrary>,
        reporter: Arc<dyn Reporter>,
        config_path: PathBuf,
    ) -> Arc<Self> {
        Self::with_debounce_window(host, reporter, config_path, DEBOUNCE_WINDOW)
    }

    pub fn with_debounce_window(
        host: Arc<dyn HostLibrary>,
        reporter: Arc<dyn Reporter>,
        config_path: PathBuf,
        window: Duration,
    ) -> Arc<Self> {
        let suppressor = Arc::new(WriteSuppressor::default());
        Arc::new(Self {
            store: PlaylistStore::new(Arc::clone(&host), Arc::clone(&suppressor)),
            host,
            reporter,
            config_path,
            config: Mutex::new(Config::default()),
            scheduler: DebounceScheduler::new(window),
            playlist_index: Mutex::new(HashMap::new()),
            suppressor,
            watcher: Mutex::new(WatcherCoordinator::default()),
            config_session_open: Mutex::new(false),
        })
    }

    pub fn config_snapshot(&self) -> Config {
        self.config.lock().expect("config lock").clone()
    }

    /// Loads the configuration, seeds the snapshots manual-descending
    /// playlists depend on, brings up the watcher, and, when the file
    /// listener is active, runs a full pass so on-disk playlists converge.
    pub fn startup(self: &Arc<Self>) {
        let config = Config::load_or_default(&self.config_path, self.reporter.as_ref());
        *self.config.lock().expect("config lock") = config.clone();

        self.seed_manual_descending_snapshots(&config);
        self.restart_watcher(&config);

        if config.file_listener_enabled {
            self.update_all();
        }
    }

    /// Host notification that a playlist was created or its membership
    /// changed. Debounced per playlist identity.
    pub fn notify_playlist_changed(self: &Arc<Self>, path: &Path) {
        self.request_update(path, false);
    }

    /// Immediate reconciliation of one playlist, bypassing the debounce
    /// window.
    pub fn update_playlist_now(self: &Arc<Self>, path: &Path) {
        self.request_update(path, true);
    }

    /// Reconciles every configured playlist now. When slash enforcement is
    /// active for text playlists, the pass widens to every known playlist
    /// so unconfigured `.m3u` files get their separators normalized too.
    pub fn update_all(self: &Arc<Self>) {
        let config = self.config_snapshot();
        let mut targets: HashSet<String> = config.playlists.keys().cloned().collect();

        if config.file_listener_enabled && config.enforce_forward_slash {
            for playlist in host::static_playlists(self.host.as_ref()) {
                if !config.is_excluded(&playlist.name) {
                    targets.insert(playlist.name);
                }
            }
        }

        self.update_changed(&config, &targets);
    }

    /// Installs a new configuration: persists it, restarts the watcher if
    /// the listener flag flipped, and reconciles exactly the playlists
    /// whose effective order changed.
    pub fn apply_config(self: &Arc<Self>, new_config: Config) {
        if let Err(err) = new_config.save(&self.config_path) {
            self.reporter
                .report(&format!("Error saving configuration: {err:#}"));
        }

        let old_config = {
            let mut config = self.config.lock().expect("config lock");
            std::mem::replace(&mut *config, new_config.clone())
        };

        if old_config.file_listener_enabled != new_config.file_listener_enabled {
            self.restart_watcher(&new_config);
        }

        let changed = new_config.modified_playlists(&old_config);
        self.update_changed(&new_config, &changed);
    }

    /// Claims the single configuration-editing session. Returns `false`
    /// when a session is already open.
    pub fn try_begin_config_session(&self) -> bool {
        let mut open = self.config_session_open.lock().expect("session lock");
        if *open {
            return false;
        }
        *open = true;
        true
    }

    pub fn end_config_session(&self) {
        *self.config_session_open.lock().expect("session lock") = false;
    }

    fn request_update(self: &Arc<Self>, path: &Path, forced: bool) {
        let config = self.config_snapshot();
        if config.playlists.is_empty() {
            return;
        }
        let Some(name) = self.host.playlist_name(path) else {
            debug!("change event for unknown playlist {}", path.display());
            return;
        };

        if forced {
            self.reconcile_with_boundary(&name, path, &config);
            return;
        }

        let weak = Arc::downgrade(self);
        let timer_path = path.to_path_buf();
        let timer_name = name.clone();
        self.scheduler.schedule(&name, move || {
            if let Some(engine) = weak.upgrade() {
                let config = engine.config_snapshot();
                engine.reconcile_with_boundary(&timer_name, &timer_path, &config);
            }
        });
    }

    fn reconcile_with_boundary(&self, name: &str, path: &Path, config: &Config) {
        if let Err(err) = self.reconcile(name, path, config) {
            self.reporter
                .report(&format!("Error processing playlist {name}: {err:#}"));
        }
    }

    fn reconcile(&self, name: &str, path: &Path, config: &Config) -> Result<()> {
        let enforce_slashes = config.file_listener_enabled
            && config.enforce_forward_slash
            && m3u::is_playlist_file(path);

        let resolved = config.resolved_order_for(name);
        let has_active_order = resolved
            .map(|order| !order.is_empty() && !order.is_manual_ascending())
            .unwrap_or(false);
        let is_manual_descending = resolved.is_some_and(|order| order.is_manual_descending());

        if !has_active_order && !enforce_slashes {
            return Ok(());
        }

        if is_manual_descending {
            return self.reconcile_manual_descending(name, path, config, enforce_slashes);
        }

        let members = match self.store.query_members(config, path) {
            Ok(members) => members,
            Err(err) => {
                // A playlist we failed to read is not one we overwrite.
                debug!("skipping {name}: {err:#}");
                return Ok(());
            }
        };
        if members.is_empty() {
            return Ok(());
        }

        let ordered = match resolved {
            Some(order) if has_active_order => {
                sort::sort_members(&members, &order.rules, self.host.as_ref())?
            }
            // Slash enforcement alone: keep the order, normalize the file.
            _ => members,
        };

        self.playlist_index
            .lock()
            .expect("playlist index lock")
            .insert(name.to_string(), ordered.iter().cloned().collect());
        self.store.write_members(config, path, &ordered)?;
        Ok(())
    }

    /// Pushes members never seen before to the front, keeps everything
    /// else in its current relative order, and remembers the full set so
    /// nothing is prepended twice.
    fn reconcile_manual_descending(
        &self,
        name: &str,
        path: &Path,
        config: &Config,
        enforce_slashes: bool,
    ) -> Result<()> {
        let current = match self.store.query_members(config, path) {
            Ok(members) => members,
            Err(err) => {
                debug!("skipping {name}: {err:#}");
                return Ok(());
            }
        };

        let previous = {
            let mut index = self.playlist_index.lock().expect("playlist index lock");
            let previous = index.get(name).cloned().unwrap_or_default();
            index.insert(name.to_string(), current.iter().cloned().collect());
            previous
        };

        let newly_added: Vec<String> = current
            .iter()
            .filter(|member| !previous.contains(*member))
            .cloned()
            .collect();

        if !newly_added.is_empty() {
            debug!("prepending {} new members to {name}", newly_added.len());
            let added: HashSet<&String> = newly_added.iter().collect();
            let mut result = newly_added.clone();
            result.extend(
                current
                    .iter()
                    .filter(|member| !added.contains(member))
                    .cloned(),
            );
            self.store.write_members(config, path, &result)?;
        } else if enforce_slashes {
            self.store.write_members(config, path, &current)?;
        }
        Ok(())
    }

    /// Reseeds manual-descending snapshots for changed playlists, then
    /// reconciles the changed set. A change to the [`ALL_PLAYLISTS`]
    /// default fans out to every playlist without an explicit entry.
    fn update_changed(self: &Arc<Self>, config: &Config, changed: &HashSet<String>) {
        let playlists = host::static_playlists(self.host.as_ref());

        for name in changed {
            let Some(order) = config.playlists.get(name) else {
                continue;
            };
            if !order.is_manual_descending() {
                continue;
            }
            if let Some(info) = playlists.iter().find(|p| &p.name == name) {
                if let Ok(members) = self.store.query_members(config, &info.path) {
                    self.playlist_index
                        .lock()
                        .expect("playlist index lock")
                        .insert(name.clone(), members.into_iter().collect());
                }
            }
        }

        if changed.contains(ALL_PLAYLISTS) {
            for info in &playlists {
                if !config.playlists.contains_key(&info.name) && !config.is_excluded(&info.name) {
                    self.force_update(&info.name, &info.path, config);
                }
            }
        }

        for name in changed.iter().filter(|name| *name != ALL_PLAYLISTS) {
            if let Some(info) = playlists.iter().find(|p| &p.name == name) {
                self.force_update(&info.name, &info.path, config);
            }
        }
    }

    fn force_update(&self, name: &str, path: &Path, config: &Config) {
        if config.playlists.is_empty() {
            return;
        }
        self.reconcile_with_boundary(name, path, config);
    }

    fn seed_manual_descending_snapshots(&self, config: &Config) {
        let playlists = host::static_playlists(self.host.as_ref());
        for (name, order) in &config.playlists {
            if !order.is_manual_descending() {
                continue;
            }
            let Some(info) = playlists.iter().find(|p| &p.name == name) else {
                continue;
            };
            if let Ok(members) = self.store.query_members(config, &info.path) {
                self.playlist_index
                    .lock()
                    .expect("playlist index lock")
                    .insert(name.clone(), members.into_iter().collect());
            }
        }
    }

    fn restart_watcher(self: &Arc<Self>, config: &Config) {
        let playlists = host::static_playlists(self.host.as_ref());
        let weak = Arc::downgrade(self);
        self.watcher.lock().expect("watcher lock").reconfigure(
            config.file_listener_enabled,
            &playlists,
            Arc::clone(&self.suppressor),
            move |path| {
                if let Some(engine) = weak.upgrade() {
                    engine.handle_file_event(&path);
                }
            },
        );
    }

    fn handle_file_event(self: &Arc<Self>, path: &Path) {
        let playlists = host::static_playlists(self.host.as_ref());
        let Some(info) = playlists
            .iter()
            .find(|p| paths::paths_equal_ci(&p.path, path))
        else {
            debug!("file event for untracked path {}", path.display());
            return;
        };
        info!("detected change in {}", info.name);
        self.request_update(&info.path, false);
    }
}
