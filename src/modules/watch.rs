//! Source watcher for hot reload.
//!
//! # Responsibilities
//! - Watch the directories holding a module's file and sentinel
//! - Translate matching file-system events into dirty notifications
//! - Stop promptly on request, with a bounded join
//!
//! # Design Decisions
//! - Parent directories are watched so files may appear, be replaced or
//!   vanish after the watch starts
//! - One channel multiplexes source events, source errors and stop
//! - The watch thread never reloads; it only notifies

use std::collections::HashSet;
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex, PoisonError};
use std::thread::{self, JoinHandle};
use std::time::{Duration, Instant};

use notify::{Config, Event, RecommendedWatcher, RecursiveMode, Watcher};
use tokio::sync::mpsc;

use crate::error::{ConfigError, Result};
use crate::modules::{DirtyNotifier, ModuleEvent};
use crate::observability::metrics;

const JOIN_POLL: Duration = Duration::from_millis(5);

enum WatchSignal {
    Source(Event),
    Error(notify::Error),
    Stop,
}

/// What a watch thread needs to decide which events matter.
pub struct WatchSpec {
    /// Module name for logs and metrics.
    pub name: String,
    /// Files whose events raise dirty notifications.
    pub targets: Vec<PathBuf>,
    /// Exit quietly on watcher errors instead of reporting them.
    pub optional: bool,
}

/// Handle to a running watch thread.
pub struct SourceWatcher {
    name: String,
    stop_tx: mpsc::UnboundedSender<WatchSignal>,
    thread: Mutex<Option<JoinHandle<()>>>,
}

impl SourceWatcher {
    /// Start watching `spec.targets`, delivering events through `notifier`.
    pub fn start(spec: WatchSpec, notifier: Arc<DirtyNotifier>) -> Result<Self> {
        let primary = spec.targets.first().cloned().unwrap_or_default();
        let setup_failed = |path: &Path, reason: String| ConfigError::WatchSetupFailed {
            path: path.to_path_buf(),
            reason,
        };

        let targets = resolve_targets(&spec.targets).map_err(|(path, e)| setup_failed(&path, e.to_string()))?;

        let (tx, rx) = mpsc::unbounded_channel();
        let event_tx = tx.clone();
        let mut watcher = RecommendedWatcher::new(
            move |res: notify::Result<Event>| {
                let signal = match res {
                    Ok(event) => WatchSignal::Source(event),
                    Err(e) => WatchSignal::Error(e),
                };
                let _ = event_tx.send(signal);
            },
            Config::default().with_poll_interval(Duration::from_secs(2)),
        )
        .map_err(|e| setup_failed(&primary, e.to_string()))?;

        let dirs: HashSet<&Path> = targets.iter().filter_map(|t| t.parent()).collect();
        for dir in dirs {
            watcher
                .watch(dir, RecursiveMode::NonRecursive)
                .map_err(|e| setup_failed(dir, e.to_string()))?;
        }

        tracing::info!(module = %spec.name, targets = ?targets, "Source watcher started");

        let loop_state = WatchLoop {
            name: spec.name.clone(),
            primary,
            targets,
            optional: spec.optional,
            notifier,
        };
        let thread = thread::Builder::new()
            .name(format!("watch-{}", spec.name))
            .spawn(move || loop_state.run(watcher, rx))?;

        Ok(Self {
            name: spec.name,
            stop_tx: tx,
            thread: Mutex::new(Some(thread)),
        })
    }

    /// Signal the watch thread to exit and wait up to `timeout` for it.
    ///
    /// A thread still running at the deadline is detached and reported as
    /// a straggler. Later calls return immediately.
    pub fn stop(&self, timeout: Duration) -> Result<()> {
        let Some(handle) = self.thread.lock().unwrap_or_else(PoisonError::into_inner).take() else {
            return Ok(());
        };
        let _ = self.stop_tx.send(WatchSignal::Stop);

        // Stopping from a subscriber callback runs on the watch thread itself.
        if handle.thread().id() == thread::current().id() {
            tracing::debug!(module = %self.name, "Watcher stopped from its own thread, not joining");
            return Ok(());
        }

        let deadline = Instant::now() + timeout;
        while !handle.is_finished() {
            if Instant::now() >= deadline {
                tracing::warn!(module = %self.name, timeout = ?timeout, "Watcher did not stop in time, detaching");
                metrics::record_shutdown_straggler(&self.name);
                return Err(ConfigError::ShutdownTimedOut {
                    modules: vec![self.name.clone()],
                    timeout,
                });
            }
            thread::sleep(JOIN_POLL);
        }
        let _ = handle.join();
        tracing::debug!(module = %self.name, "Watcher stopped");
        Ok(())
    }

    /// Feed a watcher error to the loop as the OS watcher would.
    #[cfg(test)]
    pub(crate) fn inject_error(&self, error: notify::Error) {
        let _ = self.stop_tx.send(WatchSignal::Error(error));
    }

    pub fn is_running(&self) -> bool {
        self.thread
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .as_ref()
            .is_some_and(|h| !h.is_finished())
    }
}

impl Drop for SourceWatcher {
    fn drop(&mut self) {
        let _ = self.stop_tx.send(WatchSignal::Stop);
    }
}

struct WatchLoop {
    name: String,
    primary: PathBuf,
    targets: Vec<PathBuf>,
    optional: bool,
    notifier: Arc<DirtyNotifier>,
}

impl WatchLoop {
    fn run(self, watcher: RecommendedWatcher, mut rx: mpsc::UnboundedReceiver<WatchSignal>) {
        // Dropped on exit, which releases the OS watch.
        let _watcher = watcher;

        loop {
            match rx.blocking_recv() {
                Some(WatchSignal::Source(event)) => {
                    if self.is_relevant(&event) {
                        tracing::info!(module = %self.name, kind = ?event.kind, "Source change detected");
                        metrics::record_watch_event(&self.name);
                        self.notifier.notify(ModuleEvent::Changed);
                    }
                }
                Some(WatchSignal::Error(e)) => {
                    if self.optional {
                        tracing::debug!(module = %self.name, error = %e, "Watch error on optional module, stopping watcher");
                    } else {
                        tracing::error!(module = %self.name, error = %e, "Watch failed");
                        let error = ConfigError::WatchFailed {
                            path: self.primary.clone(),
                            reason: e.to_string(),
                        };
                        self.notifier.notify(ModuleEvent::Failed(Arc::new(error)));
                    }
                    return;
                }
                Some(WatchSignal::Stop) | None => return,
            }
        }
    }

    fn is_relevant(&self, event: &Event) -> bool {
        let kind = &event.kind;
        if !(kind.is_modify() || kind.is_create() || kind.is_remove()) {
            return false;
        }
        event.paths.iter().any(|p| self.targets.iter().any(|t| t == p))
    }
}

/// Absolute target paths with canonical parent directories, matching the
/// paths the OS watcher reports.
fn resolve_targets(targets: &[PathBuf]) -> std::result::Result<Vec<PathBuf>, (PathBuf, std::io::Error)> {
    targets
        .iter()
        .map(|target| {
            let dir = match target.parent() {
                Some(p) if !p.as_os_str().is_empty() => p,
                _ => Path::new("."),
            };
            let dir = dir.canonicalize().map_err(|e| (target.clone(), e))?;
            let file = target.file_name().ok_or_else(|| {
                (
                    target.clone(),
                    std::io::Error::new(std::io::ErrorKind::InvalidInput, "path has no file name"),
                )
            })?;
            Ok(dir.join(file))
        })
        .collect()
}
