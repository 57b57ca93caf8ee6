//! JavaScript bundling through esbuild.
//!
//! **Note:** the `esbuild` binary (or whatever `js.program` points to) has to
//! be available in the system `PATH`.

use std::collections::BTreeMap;
use std::fmt::Write;
use std::process::Stdio;
use std::time::{Duration, Instant};

use console::style;
use indicatif::HumanBytes;
use serde::Deserialize;
use serde::de::IgnoredAny;
use tokio::process::Command;
use tracing_indicatif::span_ext::IndicatifSpanExt;

use crate::TaskContext;
use crate::config::BundlerConfig;
use crate::error::ScriptError;

/// Subset of the esbuild metafile used for the build report.
#[derive(Debug, Deserialize)]
struct Metafile {
    #[serde(default)]
    inputs: BTreeMap<String, IgnoredAny>,
    #[serde(default)]
    outputs: BTreeMap<String, OutputMeta>,
}

#[derive(Debug, Deserialize)]
struct OutputMeta {
    bytes: u64,
}

/// Summary of a finished bundle.
#[derive(Debug, Clone, PartialEq)]
pub struct BuildStats {
    /// Number of source files that went into the bundle.
    pub inputs: usize,
    /// Emitted files with their size in bytes, sorted by path.
    pub outputs: Vec<(String, u64)>,
    pub elapsed: Duration,
}

impl BuildStats {
    fn from_metafile(text: &str, elapsed: Duration) -> Result<Self, ScriptError> {
        let meta: Metafile = serde_json::from_str(text)?;

        Ok(Self {
            inputs: meta.inputs.len(),
            outputs: meta
                .outputs
                .into_iter()
                .map(|(path, output)| (path, output.bytes))
                .collect(),
            elapsed,
        })
    }

    /// Human readable report, one line per emitted file.
    pub fn render(&self) -> String {
        let mut out = format!(
            "bundled {} input(s) into {} file(s) in {}",
            self.inputs,
            self.outputs.len(),
            style(format!("{}ms", self.elapsed.as_millis())).blue()
        );

        let width = self
            .outputs
            .iter()
            .map(|(path, _)| path.len())
            .max()
            .unwrap_or(0);

        for (path, bytes) in &self.outputs {
            let _ = write!(
                out,
                "\n  {}  {}",
                style(format!("{path:width$}")).cyan(),
                style(HumanBytes(*bytes)).yellow()
            );
        }

        out
    }
}

/// One bundler invocation, owning its copy of the configuration.
#[derive(Debug, Clone)]
pub struct Bundler {
    config: BundlerConfig,
}

impl Bundler {
    pub fn new(config: &BundlerConfig) -> Self {
        Self {
            config: config.clone(),
        }
    }

    pub fn arguments(&self) -> Vec<String> {
        let config = &self.config;
        let mut args: Vec<String> = config.entry_points.iter().map(|p| p.to_string()).collect();

        args.push("--bundle".into());
        args.push(format!("--outdir={}", config.outdir));
        args.push(format!("--entry-names={}", config.entry_names));
        args.push(format!("--format={}", config.format));
        args.push(format!("--target={}", config.target));

        if config.minify {
            args.push("--minify".into());
        }

        if config.sourcemap {
            args.push("--sourcemap".into());
        }

        for (ext, loader) in &config.loaders {
            args.push(format!("--loader:{ext}={loader}"));
        }

        for (key, value) in &config.define {
            args.push(format!("--define:{key}={value}"));
        }

        args.push(format!("--metafile={}", config.metafile));
        args.push("--log-level=warning".into());
        args.push("--color=true".into());
        args
    }

    /// Run the bundler to completion and read back its build metadata.
    pub async fn run(&self) -> Result<BuildStats, ScriptError> {
        let start = Instant::now();
        let program = &self.config.program;

        if let Some(dir) = self.config.metafile.parent().filter(|dir| !dir.as_str().is_empty()) {
            tokio::fs::create_dir_all(dir).await?;
        }

        tracing::Span::current().pb_set_message(&format!(
            "Bundling {} entry point(s)",
            self.config.entry_points.len()
        ));

        let output = Command::new(program)
            .args(self.arguments())
            .stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .output()
            .await
            .map_err(|e| ScriptError::Esbuild(format!("couldn't start '{program}': {e}")))?;

        let stderr = String::from_utf8_lossy(&output.stderr);
        let stderr = stderr.trim();

        if !output.status.success() {
            let detail = if stderr.is_empty() {
                output.status.to_string()
            } else {
                stderr.to_string()
            };
            return Err(ScriptError::Esbuild(detail));
        }

        if !stderr.is_empty() {
            tracing::warn!("[esbuild] {stderr}");
        }

        let text = tokio::fs::read_to_string(&self.config.metafile).await?;
        BuildStats::from_metafile(&text, start.elapsed())
    }
}

/// `js` task.
pub async fn task(ctx: TaskContext) -> anyhow::Result<()> {
    let stats = Bundler::new(&ctx.env.config.js).run().await?;

    tracing::info!("[esbuild] {}", stats.render());
    ctx.env.reload.reload();

    Ok(())
}
