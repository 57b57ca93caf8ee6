//! Pipeline settings.
//!
//! Every value has an in-source default which reproduces the usual layout of a
//! Hugo project with an asset pipeline next to it:
//!
//! ```text
//! site/          -> Hugo sources, built into dist/
//! src/scss/      -> stylesheets, compiled into dist/css/
//! src/js/        -> scripts, bundled into dist/
//! src/fonts/     -> fonts, flattened into dist/fonts/
//! ```
//!
//! Any of the values can be overridden from a `tsumiki.toml` file.

use std::collections::BTreeMap;
use std::fs;

use camino::{Utf8Path, Utf8PathBuf};
use serde::Deserialize;

use crate::error::ConfigError;

/// Name of the config file looked up in the working directory.
pub const CONFIG_FILE: &str = "tsumiki.toml";

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct Config {
    pub site: SiteConfig,
    pub scss: ScssConfig,
    pub js: BundlerConfig,
    pub fonts: FontsConfig,
    pub server: ServerConfig,
    pub watch: WatchConfig,
}

impl Config {
    /// Load the configuration. When `path` is `None` the default config file is
    /// used if it exists, otherwise the in-source defaults are returned. An
    /// explicitly requested file must exist.
    pub fn load(path: Option<&Utf8Path>) -> Result<Self, ConfigError> {
        let (path, required) = match path {
            Some(path) => (path, true),
            None => (Utf8Path::new(CONFIG_FILE), false),
        };

        if !required && !path.exists() {
            return Ok(Self::default());
        }

        let text = fs::read_to_string(path) //
            .map_err(|e| ConfigError::Read(path.to_owned(), e))?;

        let config = Self::parse(&text) //
            .map_err(|e| ConfigError::Parse(path.to_owned(), e))?;

        tracing::info!("loaded config from {path}");
        Ok(config)
    }

    pub fn parse(text: &str) -> Result<Self, toml::de::Error> {
        toml::from_str(text)
    }
}

/// Settings for the Hugo invocation.
#[derive(Debug, Clone, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct SiteConfig {
    /// Hugo binary, looked up in `PATH` unless it's a path.
    pub bin: String,
    /// Hugo source directory (`-s`).
    pub source: Utf8PathBuf,
    /// Output directory (`-d`), relative to the source directory.
    pub destination: Utf8PathBuf,
    /// Base URL used for the production build.
    pub base_url: String,
    /// Render drafts and future posts in development builds.
    pub preview: bool,
}

impl Default for SiteConfig {
    fn default() -> Self {
        Self {
            bin: "hugo".into(),
            source: "site".into(),
            destination: "../dist".into(),
            base_url: "http://viveapp.com/".into(),
            preview: false,
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct ScssConfig {
    /// Directory with the entry stylesheets, not searched recursively.
    pub src: Utf8PathBuf,
    pub dest: Utf8PathBuf,
    /// Browserslist queries used for vendor prefixing.
    pub browsers: Vec<String>,
}

impl Default for ScssConfig {
    fn default() -> Self {
        Self {
            src: "src/scss".into(),
            dest: "dist/css".into(),
            browsers: vec!["last 2 versions".into()],
        }
    }
}

/// Static configuration handed to the bundling engine.
///
/// The runner clones it for every invocation, so nothing that happens during
/// one bundle can leak into the next one.
#[derive(Debug, Clone, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct BundlerConfig {
    /// Bundler binary, esbuild compatible.
    pub program: String,
    pub entry_points: Vec<Utf8PathBuf>,
    pub outdir: Utf8PathBuf,
    pub entry_names: String,
    pub format: String,
    pub target: String,
    pub minify: bool,
    pub sourcemap: bool,
    /// File extension to loader, e.g. `.js = "jsx"`.
    pub loaders: BTreeMap<String, String>,
    /// Global identifier substitutions.
    pub define: BTreeMap<String, String>,
    /// Where the engine writes its build metadata.
    pub metafile: Utf8PathBuf,
}

impl Default for BundlerConfig {
    fn default() -> Self {
        Self {
            program: "esbuild".into(),
            entry_points: vec!["src/js/app.js".into()],
            outdir: "dist".into(),
            entry_names: "[name]".into(),
            format: "iife".into(),
            target: "es2017".into(),
            minify: true,
            sourcemap: true,
            loaders: BTreeMap::from([(".js".into(), "jsx".into())]),
            define: BTreeMap::new(),
            metafile: ".cache/esbuild/meta.json".into(),
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct FontsConfig {
    /// Searched recursively.
    pub src: Utf8PathBuf,
    /// Receives every font file, flattened.
    pub dest: Utf8PathBuf,
}

impl Default for FontsConfig {
    fn default() -> Self {
        Self {
            src: "src/fonts".into(),
            dest: "dist/fonts".into(),
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct ServerConfig {
    /// Directory served over HTTP.
    pub root: Utf8PathBuf,
    pub port: u16,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            root: "dist".into(),
            port: 3000,
        }
    }
}

/// Glob patterns which re-run a task when a matching file changes.
#[derive(Debug, Clone, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct WatchConfig {
    pub js: String,
    pub scss: String,
    pub fonts: String,
    pub site: String,
}

impl Default for WatchConfig {
    fn default() -> Self {
        Self {
            js: "src/js/**/*.js".into(),
            scss: "src/scss/**/*.scss".into(),
            fonts: "src/fonts/**/*".into(),
            site: "site/**/*".into(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults() {
        let config = Config::default();
        assert_eq!(config.site.bin, "hugo");
        assert_eq!(config.site.destination, "../dist");
        assert_eq!(config.site.base_url, "http://viveapp.com/");
        assert_eq!(config.scss.browsers, vec!["last 2 versions"]);
        assert_eq!(config.fonts.dest, "dist/fonts");
        assert_eq!(config.server.root, "dist");
    }

    #[test]
    fn test_partial_override() {
        let config = Config::parse(
            r#"
            [site]
            base_url = "https://kamoshi.org/"

            [js]
            entry_points = ["src/js/main.ts"]
            loaders = { ".ts" = "ts" }
            "#,
        )
        .unwrap();

        assert_eq!(config.site.base_url, "https://kamoshi.org/");
        // untouched fields keep their defaults
        assert_eq!(config.site.bin, "hugo");
        assert_eq!(config.js.entry_points, vec![Utf8PathBuf::from("src/js/main.ts")]);
        assert_eq!(config.js.loaders.get(".ts").map(String::as_str), Some("ts"));
        assert_eq!(config.js.program, "esbuild");
    }

    #[test]
    fn test_unknown_field_is_rejected() {
        assert!(Config::parse("[site]\nbase = \"x\"").is_err());
    }

    #[test]
    fn test_missing_explicit_file() {
        let err = Config::load(Some(Utf8Path::new("does/not/exist.toml"))).unwrap_err();
        assert!(matches!(err, ConfigError::Read(..)));
    }
}
