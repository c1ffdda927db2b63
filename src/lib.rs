//! Automatic playlist play-order maintenance.
//!
//! Whenever a playlist's membership changes, the engine recomputes its
//! order from a per-playlist rule chain and rewrites it, with two special
//! modes: manual ascending leaves the order alone, manual descending only
//! pushes newly added tracks to the front. Playlists backed by
//! `.m3u`/`.m3u8` files can be supervised directly on disk through a file
//! watcher instead of host notifications; the engine debounces bursts of
//! change events and ignores the echoes of its own writes.
//!
//! The host application is reached exclusively through the
//! [`host::HostLibrary`] trait; user-visible failures go through
//! [`host::Reporter`]. Wire both into an [`engine::Engine`] and feed it
//! host notifications.

pub mod config;
pub mod debounce;
pub mod engine;
pub mod host;
pub mod m3u;
pub mod model;
pub mod paths;
pub mod sort;
pub mod store;
pub mod watcher;
