//! Hot reload of the scheduler section.
//!
//! Only scheduler knobs can change on a live gate. Edits to the transport or
//! observability sections are reported and otherwise ignored until restart.

use notify::{Config, Event, RecommendedWatcher, RecursiveMode, Watcher};
use std::path::{Path, PathBuf};
use std::time::Duration;
use tokio::sync::mpsc;

use crate::config::loader::load_config;
use crate::config::schema::{GateConfig, SchedulerConfigPatch};

/// Watches a config file and emits scheduler patches when it changes.
pub struct ConfigWatcher {
    path: PathBuf,
    current: GateConfig,
    patch_tx: mpsc::UnboundedSender<SchedulerConfigPatch>,
}

impl ConfigWatcher {
    /// `current` is the configuration the gate was started with; reloads
    /// that leave its scheduler section untouched emit nothing.
    pub fn new(path: &Path, current: GateConfig) -> (Self, mpsc::UnboundedReceiver<SchedulerConfigPatch>) {
        let (patch_tx, patch_rx) = mpsc::unbounded_channel();
        let watcher = Self {
            path: path.to_path_buf(),
            current,
            patch_tx,
        };
        (watcher, patch_rx)
    }

    /// Start watching on notify's background thread.
    ///
    /// Updates stop when the returned watcher is dropped.
    pub fn run(self) -> Result<RecommendedWatcher, notify::Error> {
        let Self {
            path,
            mut current,
            patch_tx,
        } = self;
        let watched = path.clone();

        let mut watcher = RecommendedWatcher::new(
            move |res: notify::Result<Event>| match res {
                Ok(event) if event.kind.is_modify() || event.kind.is_create() => {
                    match load_config(&path) {
                        Ok(next) => {
                            if let Some(patch) = diff(&mut current, next) {
                                let _ = patch_tx.send(patch);
                            }
                        }
                        Err(e) => {
                            tracing::error!(path = ?path, error = %e, "Config reload failed, keeping current limits");
                        }
                    }
                }
                Ok(_) => {}
                Err(e) => tracing::error!(error = ?e, "Config watch error"),
            },
            Config::default().with_poll_interval(Duration::from_secs(2)),
        )?;

        watcher.watch(&watched, RecursiveMode::NonRecursive)?;

        tracing::info!(path = ?watched, "Config watcher started");
        Ok(watcher)
    }
}

/// Fold `next` into `current`, returning the patch to apply to the gate.
fn diff(current: &mut GateConfig, next: GateConfig) -> Option<SchedulerConfigPatch> {
    if next.transport != current.transport || next.observability != current.observability {
        tracing::warn!("Transport and observability changes take effect on restart");
    }
    let patch = if next.scheduler == current.scheduler {
        tracing::debug!("Config file touched, scheduler unchanged");
        None
    } else {
        Some(SchedulerConfigPatch::from(next.scheduler.clone()))
    };

    // Compare the next reload against this file, so each edit is reported once.
    *current = next;
    patch
}
