//! Source watching for the development server.
//!
//! Every [`WatchBinding`] pairs a glob with the tasks it triggers. The static
//! prefix of each glob is watched recursively, and each filesystem event is
//! matched against the full patterns. Matching tasks are started right away
//! as independent pipeline runs. There is no debouncing, so saving three
//! files in quick succession starts three runs.

use std::collections::HashSet;
use std::path::PathBuf;
use std::sync::Arc;

use camino::{Utf8Path, Utf8PathBuf};
use glob::Pattern;
use notify::{Event, EventKind, RecommendedWatcher, RecursiveMode, Watcher as _};
use tokio::sync::mpsc::{UnboundedReceiver, unbounded_channel};

use crate::error::ServeError;
use crate::{Env, Pipeline, TaskId};

/// Glob pattern (relative to the working directory, or absolute) and the
/// tasks to run whenever a matching file changes.
#[derive(Debug, Clone)]
pub struct WatchBinding {
    pub pattern: String,
    pub tasks: Vec<TaskId>,
}

impl WatchBinding {
    pub fn new(pattern: impl Into<String>, tasks: impl IntoIterator<Item = TaskId>) -> Self {
        Self {
            pattern: pattern.into(),
            tasks: tasks.into_iter().collect(),
        }
    }
}

#[derive(Debug)]
struct Filter {
    pattern: Pattern,
    tasks: Vec<TaskId>,
}

/// Resolved bindings, without the OS watcher attached.
#[derive(Debug, Default)]
struct Filters {
    roots: Vec<Utf8PathBuf>,
    filters: Vec<Filter>,
}

impl Filters {
    /// Bindings whose directory does not exist yet are skipped with an error.
    fn new(bindings: &[WatchBinding]) -> Self {
        let mut roots = HashSet::new();
        let mut filters = Vec::new();

        for binding in bindings {
            match resolve_watch_path(&binding.pattern) {
                Ok((root, pattern)) => {
                    roots.insert(root);
                    filters.push(Filter {
                        pattern,
                        tasks: binding.tasks.clone(),
                    });
                }
                Err(e) => tracing::error!("not watching {}: {e}", binding.pattern),
            }
        }

        Self {
            roots: collapse_watch_paths(roots),
            filters,
        }
    }

    /// Tasks triggered by a change to any of `paths`, in binding order and
    /// without repeats.
    fn triggered(&self, paths: &[PathBuf]) -> Vec<TaskId> {
        let mut tasks = Vec::new();

        for filter in &self.filters {
            if !paths.iter().any(|path| filter.pattern.matches_path(path)) {
                continue;
            }

            for id in &filter.tasks {
                if !tasks.contains(id) {
                    tasks.push(*id);
                }
            }
        }

        tasks
    }
}

/// Live filesystem watcher. Events stop once this is dropped.
pub struct Watcher {
    _watcher: RecommendedWatcher,
    rx: UnboundedReceiver<notify::Result<Event>>,
    filters: Filters,
}

impl Watcher {
    pub fn new(bindings: &[WatchBinding]) -> Result<Self, ServeError> {
        let filters = Filters::new(bindings);

        let (tx, rx) = unbounded_channel();
        let mut watcher = notify::recommended_watcher(move |event: notify::Result<Event>| {
            let _ = tx.send(event);
        })?;

        for path in &filters.roots {
            tracing::info!("watching {}", path);
            watcher.watch(path.as_std_path(), RecursiveMode::Recursive)?;
        }

        Ok(Self {
            _watcher: watcher,
            rx,
            filters,
        })
    }

    /// Run triggered tasks until the watcher shuts down. A failed run is
    /// logged and watching carries on.
    pub async fn listen(mut self, pipeline: Arc<Pipeline>, env: Env) {
        while let Some(event) = self.rx.recv().await {
            let event = match event {
                Ok(event) => event,
                Err(e) => {
                    tracing::error!("watch error: {e}");
                    continue;
                }
            };

            if !matches!(
                event.kind,
                EventKind::Create(_) | EventKind::Modify(_) | EventKind::Remove(_)
            ) {
                continue;
            }

            for id in self.filters.triggered(&event.paths) {
                tracing::info!(
                    "change detected in {}, running '{}'",
                    display_paths(&event.paths),
                    pipeline.name(id)
                );

                let pipeline = pipeline.clone();
                let env = env.clone();

                tokio::spawn(async move {
                    if let Err(e) = pipeline.run(id, &env).await {
                        tracing::error!("{e}");
                    }
                });
            }
        }
    }
}

fn display_paths(paths: &[PathBuf]) -> String {
    paths
        .iter()
        .map(|path| path.display().to_string())
        .collect::<Vec<_>>()
        .join(", ")
}

/// Splits a glob string into a canonicalized static root path (for
/// watching) and a compiled absolute Pattern (for matching).
pub fn resolve_watch_path(
    glob_str: impl AsRef<str>,
) -> Result<(Utf8PathBuf, Pattern), ServeError> {
    let glob_str = glob_str.as_ref();
    let path = Utf8Path::new(glob_str);

    // Split path into static root and dynamic suffix (containing wildcards)
    let components: Vec<_> = path.components().collect();
    let split_idx = components
        .iter()
        .position(|c| c.as_str().contains(['*', '?', '[']))
        .unwrap_or(components.len());

    let root_part: Utf8PathBuf = components.iter().take(split_idx).collect();
    let suffix_part: Utf8PathBuf = components.iter().skip(split_idx).collect();

    let root_part = if root_part.as_str().is_empty() {
        Utf8PathBuf::from(".")
    } else {
        root_part
    };

    let absolute_root = root_part
        .canonicalize_utf8()
        .map_err(|e| ServeError::Resolve(glob_str.to_string(), e))?;

    // A concrete file is matched exactly, its parent is watched so that
    // atomic writes (write to temp, rename over) are still seen.
    if suffix_part.as_str().is_empty() && absolute_root.is_file() {
        let parent = absolute_root
            .parent()
            .unwrap_or(&absolute_root)
            .to_path_buf();
        let pattern = Pattern::new(&Pattern::escape(absolute_root.as_str()))?;
        return Ok((parent, pattern));
    }

    let mut pattern = Pattern::escape(absolute_root.as_str());
    if !suffix_part.as_str().is_empty() {
        pattern.push('/');
        pattern.push_str(suffix_part.as_str());
    }

    Ok((absolute_root, Pattern::new(&pattern)?))
}

/// Reduces a set of paths to the minimal set of watch roots.
///
/// If we watch `/a` and `/a/b`, we only need to watch `/a` because
/// the watcher is recursive.
fn collapse_watch_paths(paths: HashSet<Utf8PathBuf>) -> Vec<Utf8PathBuf> {
    let mut paths: Vec<_> = paths.into_iter().collect();
    paths.sort();

    let mut filtered = Vec::new();
    for path in paths {
        if let Some(last) = filtered.last()
            && path.starts_with(last)
        {
            continue;
        }
        filtered.push(path);
    }

    filtered
}
