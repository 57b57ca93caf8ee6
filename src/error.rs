use camino::Utf8PathBuf;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum PipelineError {
    #[error("Task '{0}' is already registered")]
    DuplicateTask(String),

    #[error("Task '{task}' depends on a handle ({index}) that doesn't belong to this blueprint")]
    ForeignHandle { task: String, index: usize },

    #[error("Cycle detected in task graph at '{0}'")]
    Cycle(String),

    #[error("Task '{0}' is not registered, available tasks: {1}")]
    UnknownTask(String, String),

    #[error("Task '{0}':\n{1:#}")]
    Task(String, anyhow::Error),
}

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("Couldn't read config file '{0}'.\n{1}")]
    Read(Utf8PathBuf, std::io::Error),

    #[error("Couldn't parse config file '{0}'.\n{1}")]
    Parse(Utf8PathBuf, toml::de::Error),
}

/// Errors returned by the Hugo invocation.
#[derive(Debug, Error)]
pub enum SiteError {
    /// The binary couldn't be started at all.
    #[error("Couldn't start '{0}'.\n{1}")]
    Spawn(String, std::io::Error),

    /// The process ran and exited with a nonzero code, or was killed.
    #[error("Hugo build failed ({0})")]
    Failed(std::process::ExitStatus),
}

/// Errors that can occur when compiling stylesheets.
#[derive(Debug, Error)]
pub enum StyleError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Couldn't compile glob pattern.\n{0}")]
    GlobPattern(#[from] glob::PatternError),

    #[error("Couldn't run glob.\n{0}")]
    Glob(#[from] glob::GlobError),

    #[error("Couldn't convert path to UTF-8.\n{0}")]
    PathFormat(#[from] camino::FromPathBufError),

    #[error("Sass compilation error: {0}")]
    Sass(#[from] Box<grass::Error>),

    #[error("Invalid browser query: {0}")]
    Browsers(String),

    #[error("Autoprefixer error: {0}")]
    Prefix(String),
}

/// Errors raised by the JavaScript bundler.
#[derive(Debug, Error)]
pub enum ScriptError {
    /// The engine itself reported a failure.
    #[error("[esbuild] {0}")]
    Esbuild(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Couldn't read the build metafile.\n{0}")]
    Metafile(#[from] serde_json::Error),
}

#[derive(Debug, Error)]
pub enum FontError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Couldn't compile glob pattern.\n{0}")]
    GlobPattern(#[from] glob::PatternError),

    #[error("Couldn't run glob.\n{0}")]
    Glob(#[from] glob::GlobError),

    #[error("Couldn't convert path to UTF-8.\n{0}")]
    PathFormat(#[from] camino::FromPathBufError),
}

#[cfg(feature = "server")]
#[derive(Debug, Error)]
pub enum ServeError {
    #[error(transparent)]
    Io(#[from] std::io::Error),

    #[error(transparent)]
    Notify(#[from] notify::Error),

    #[error("Couldn't compile watch pattern.\n{0}")]
    Pattern(#[from] glob::PatternError),

    #[error("Couldn't resolve watch path '{0}'.\n{1}")]
    Resolve(String, std::io::Error),
}
