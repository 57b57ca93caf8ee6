//! Stylesheet compilation.
//!
//! Entry stylesheets are compiled with `grass`, then run through
//! `lightningcss`, which adds the vendor prefixes required by the configured
//! browser targets and prints the minified result. Files starting with `_`
//! are partials, they are only ever pulled in by other stylesheets.

use camino::{Utf8Path, Utf8PathBuf};
use lightningcss::stylesheet::{MinifyOptions, ParserOptions, PrinterOptions, StyleSheet};
use lightningcss::targets::{Browsers, Targets};

use crate::TaskContext;
use crate::config::ScssConfig;
use crate::error::StyleError;

/// Outcome of compiling a batch of stylesheets.
#[derive(Debug, Default)]
pub struct StyleReport {
    /// Files written to the destination directory.
    pub written: Vec<Utf8PathBuf>,
    /// Entry files which failed to compile, with the error message.
    pub failed: Vec<(Utf8PathBuf, String)>,
}

/// Resolve browserslist queries into prefixing targets.
pub fn targets(queries: &[String]) -> Result<Targets, StyleError> {
    let browsers =
        Browsers::from_browserslist(queries).map_err(|e| StyleError::Browsers(e.to_string()))?;

    Ok(Targets {
        browsers,
        ..Targets::default()
    })
}

/// Entry stylesheets found directly in `src`, sorted.
fn entries(src: &Utf8Path) -> Result<Vec<Utf8PathBuf>, StyleError> {
    let pattern = format!("{}/*.scss", glob::Pattern::escape(src.as_str()));

    let mut entries = Vec::new();
    for path in glob::glob(&pattern)? {
        let path = Utf8PathBuf::try_from(path?)?;

        let partial = path.file_name().is_some_and(|name| name.starts_with('_'));
        if path.is_file() && !partial {
            entries.push(path);
        }
    }

    Ok(entries)
}

/// Compile a single SCSS file into prefixed, minified CSS.
pub fn compile_file(path: &Utf8Path, targets: Targets) -> Result<String, StyleError> {
    let options = grass::Options::default()
        .input_syntax(grass::InputSyntax::Scss)
        .style(grass::OutputStyle::Compressed);

    let css = grass::from_path(path, &options)?;
    prefix(&css, targets)
}

/// Add vendor prefixes for `targets`, printing minified output.
pub fn prefix(css: &str, targets: Targets) -> Result<String, StyleError> {
    let mut sheet = StyleSheet::parse(css, ParserOptions::default())
        .map_err(|e| StyleError::Prefix(e.to_string()))?;

    sheet
        .minify(MinifyOptions {
            targets: targets.clone(),
            ..MinifyOptions::default()
        })
        .map_err(|e| StyleError::Prefix(e.to_string()))?;

    let output = sheet
        .to_css(PrinterOptions {
            minify: true,
            targets,
            ..PrinterOptions::default()
        })
        .map_err(|e| StyleError::Prefix(e.to_string()))?;

    Ok(output.code)
}

/// Compile every entry stylesheet. A file which fails to compile is logged and
/// skipped, the rest of the batch still gets written.
pub async fn compile(config: &ScssConfig) -> Result<StyleReport, StyleError> {
    let targets = targets(&config.browsers)?;
    let entries = entries(&config.src)?;

    tokio::fs::create_dir_all(&config.dest).await?;

    let mut report = StyleReport::default();

    for entry in entries {
        let css = match compile_file(&entry, targets.clone()) {
            Ok(css) => css,
            Err(err) => {
                tracing::error!("{entry}: {err}");
                report.failed.push((entry, err.to_string()));
                continue;
            }
        };

        let stem = entry.file_stem().unwrap_or("style");
        let path = config.dest.join(format!("{stem}.css"));

        tokio::fs::write(&path, css).await?;
        tracing::debug!("wrote {path}");
        report.written.push(path);
    }

    Ok(report)
}

/// `sass` task.
pub async fn task(ctx: TaskContext) -> anyhow::Result<()> {
    let report = compile(&ctx.env.config.scss).await?;

    if !report.failed.is_empty() {
        tracing::warn!(
            "{} stylesheet(s) failed to compile, {} written",
            report.failed.len(),
            report.written.len()
        );
    }

    ctx.env.reload.stream(&report.written);
    Ok(())
}
