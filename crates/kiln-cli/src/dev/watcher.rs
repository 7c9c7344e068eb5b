//! Path watcher that turns native filesystem notifications into debounced
//! batches of changed paths.
//!
//! Raw events are forwarded from the notify backend to a dedicated debouncer
//! thread. The thread keeps an insertion-ordered set of changed paths and
//! flushes it once no new event has arrived for a full settle window.
//!
//! A watched file is observed through its parent directory. Editors that save
//! by writing a temporary file and renaming it over the old one replace the
//! inode, and a watch on the file itself would not survive that.

use crate::error::WatchError;
use indexmap::IndexSet;
use notify::{Event, EventKind, PollWatcher, RecommendedWatcher, RecursiveMode, Watcher};
use std::path::{Path, PathBuf};
use std::sync::mpsc::{self, Receiver, RecvTimeoutError, Sender};
use std::thread::{self, JoinHandle};
use std::time::Duration;

pub const DEFAULT_SETTLE: Duration = Duration::from_millis(100);

/// Which notification mechanism to use.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum WatchBackend {
    /// inotify, FSEvents or ReadDirectoryChangesW, depending on the platform
    #[default]
    Native,
    /// Periodic directory scans, for filesystems without native notifications
    Poll { interval: Duration },
}

#[derive(Debug, Clone, Copy)]
pub struct WatchOptions {
    /// Quiet period after the last event before a batch is flushed.
    pub settle: Duration,
    pub backend: WatchBackend,
}

impl Default for WatchOptions {
    fn default() -> Self {
        Self {
            settle: DEFAULT_SETTLE,
            backend: WatchBackend::Native,
        }
    }
}

enum Backend {
    Native(RecommendedWatcher),
    Poll(PollWatcher),
}

impl Backend {
    fn new(kind: WatchBackend, scope: Scope, tx: Sender<RawEvent>) -> notify::Result<Self> {
        let handler = forwarder(scope, tx);
        match kind {
            WatchBackend::Native => Ok(Backend::Native(RecommendedWatcher::new(
                handler,
                notify::Config::default(),
            )?)),
            WatchBackend::Poll { interval } => Ok(Backend::Poll(PollWatcher::new(
                handler,
                notify::Config::default().with_poll_interval(interval),
            )?)),
        }
    }

    fn watch(&mut self, path: &Path, mode: RecursiveMode) -> notify::Result<()> {
        match self {
            Backend::Native(watcher) => watcher.watch(path, mode),
            Backend::Poll(watcher) => watcher.watch(path, mode),
        }
    }
}

/// The watched paths, split into recursive directory roots and single files.
#[derive(Debug, Clone, Default, PartialEq)]
struct Scope {
    dirs: Vec<PathBuf>,
    files: Vec<PathBuf>,
}

impl Scope {
    fn new(paths: &[PathBuf]) -> Self {
        let (dirs, files) = paths.iter().cloned().partition(|p| p.is_dir());
        Self { dirs, files }
    }

    /// Whether a changed path belongs to what was asked for.
    fn contains(&self, path: &Path) -> bool {
        self.dirs.iter().any(|dir| path.starts_with(dir)) || self.files.iter().any(|f| f == path)
    }

    /// What to register with the backend. Files are covered by a
    /// non-recursive watch on their parent unless a directory root already
    /// covers them.
    fn registrations(&self) -> Vec<(PathBuf, RecursiveMode)> {
        let mut registrations: Vec<(PathBuf, RecursiveMode)> = self
            .dirs
            .iter()
            .map(|dir| (dir.clone(), RecursiveMode::Recursive))
            .collect();

        let mut parents = IndexSet::new();
        for file in &self.files {
            let Some(parent) = file.parent() else {
                registrations.push((file.clone(), RecursiveMode::NonRecursive));
                continue;
            };
            if !self.dirs.iter().any(|dir| parent.starts_with(dir)) {
                parents.insert(parent.to_path_buf());
            }
        }
        registrations.extend(
            parents
                .into_iter()
                .map(|parent| (parent, RecursiveMode::NonRecursive)),
        );
        registrations
    }
}

#[derive(Debug)]
enum RawEvent {
    Changed(Vec<PathBuf>),
    Failed(WatchError),
    Stop,
}

fn forwarder(scope: Scope, tx: Sender<RawEvent>) -> impl FnMut(notify::Result<Event>) + Send + 'static {
    move |res: notify::Result<Event>| {
        let message = match res {
            Ok(event) if event.need_rescan() => RawEvent::Failed(WatchError::Overflow),
            Ok(event) if is_change(&event.kind) => {
                let paths: Vec<PathBuf> = event
                    .paths
                    .into_iter()
                    .filter(|path| scope.contains(path))
                    .collect();
                if paths.is_empty() {
                    return;
                }
                RawEvent::Changed(paths)
            }
            Ok(_) => return,
            Err(err) => RawEvent::Failed(WatchError::Runtime(err)),
        };
        // The debouncer is gone once the watcher stops.
        let _ = tx.send(message);
    }
}

/// Reads do not count as changes; reacting to them would loop on our own builds.
fn is_change(kind: &EventKind) -> bool {
    !matches!(kind, EventKind::Access(_))
}

/// Watches a fixed set of paths and reports changed paths in batches.
///
/// Dropping the watcher stops it, same as calling [`PathWatcher::stop`].
pub struct PathWatcher {
    backend: Option<Backend>,
    control: Sender<RawEvent>,
    debouncer: Option<JoinHandle<()>>,
    paths: Vec<PathBuf>,
}

impl PathWatcher {
    /// Start watching `paths`. Directories are watched recursively. A file
    /// keeps being reported after it is replaced by a rename.
    ///
    /// `on_batch` receives each deduplicated batch on the watcher thread.
    /// `on_error` receives backend failures that happen after startup.
    ///
    /// # Errors
    ///
    /// Fails if any path is missing, unreadable or cannot be registered with
    /// the backend. Nothing is left running in that case.
    pub fn start<F, E>(
        paths: impl IntoIterator<Item = PathBuf>,
        options: WatchOptions,
        on_batch: F,
        on_error: E,
    ) -> Result<Self, WatchError>
    where
        F: FnMut(Vec<PathBuf>) + Send + 'static,
        E: FnMut(WatchError) + Send + 'static,
    {
        let paths = resolve_paths(paths)?;
        let scope = Scope::new(&paths);

        let (tx, rx) = mpsc::channel();
        let mut backend = Backend::new(options.backend, scope.clone(), tx.clone())
            .map_err(|e| WatchError::from_notify(PathBuf::new(), e))?;

        for (path, mode) in scope.registrations() {
            backend
                .watch(&path, mode)
                .map_err(|e| WatchError::from_notify(path.clone(), e))?;
            tracing::debug!("Watching {} ({:?})", path.display(), mode);
        }

        let settle = options.settle;
        let debouncer = thread::Builder::new()
            .name("kiln-watcher".into())
            .spawn(move || run_debouncer(rx, settle, on_batch, on_error))
            .map_err(WatchError::Thread)?;

        Ok(Self {
            backend: Some(backend),
            control: tx,
            debouncer: Some(debouncer),
            paths,
        })
    }

    /// The resolved, absolute paths being watched.
    pub fn paths(&self) -> &[PathBuf] {
        &self.paths
    }

    /// Stop watching. No callback runs after this returns.
    pub fn stop(mut self) {
        self.shutdown();
    }

    fn shutdown(&mut self) {
        drop(self.backend.take());
        if let Some(handle) = self.debouncer.take() {
            let _ = self.control.send(RawEvent::Stop);
            if handle.join().is_err() {
                tracing::warn!("Watcher thread panicked");
            }
        }
    }
}

impl Drop for PathWatcher {
    fn drop(&mut self) {
        self.shutdown();
    }
}

fn resolve_paths(paths: impl IntoIterator<Item = PathBuf>) -> Result<Vec<PathBuf>, WatchError> {
    let mut resolved = IndexSet::new();
    for path in paths {
        let canonical = path.canonicalize().map_err(|e| match e.kind() {
            std::io::ErrorKind::PermissionDenied => WatchError::PermissionDenied(path.clone()),
            _ => WatchError::PathNotFound(path.clone()),
        })?;
        resolved.insert(canonical);
    }
    Ok(resolved.into_iter().collect())
}

fn run_debouncer<F, E>(rx: Receiver<RawEvent>, settle: Duration, mut on_batch: F, mut on_error: E)
where
    F: FnMut(Vec<PathBuf>),
    E: FnMut(WatchError),
{
    let mut pending: IndexSet<PathBuf> = IndexSet::new();

    loop {
        let next = if pending.is_empty() {
            rx.recv().map_err(|_| RecvTimeoutError::Disconnected)
        } else {
            rx.recv_timeout(settle)
        };

        match next {
            Ok(RawEvent::Changed(paths)) => pending.extend(paths),
            Ok(RawEvent::Failed(err)) => on_error(err),
            Ok(RawEvent::Stop) | Err(RecvTimeoutError::Disconnected) => break,
            Err(RecvTimeoutError::Timeout) => {
                let batch: Vec<PathBuf> = pending.drain(..).collect();
                tracing::debug!("Flushing {} changed path(s)", batch.len());
                on_batch(batch);
            }
        }
    }
}
