use camino::Utf8PathBuf;

use crate::TaskContext;
use crate::config::FontsConfig;
use crate::error::FontError;

/// Copy every file under the fonts directory into a single flat destination
/// directory.
///
/// Only file names are kept, so two fonts with the same name in different
/// subdirectories end up in the same place and the one copied last wins.
/// Files are visited in glob order, which is alphabetical on most platforms,
/// but that is not something to rely on. A warning is logged when it happens.
pub async fn flatten(config: &FontsConfig) -> Result<Vec<Utf8PathBuf>, FontError> {
    let pattern = format!("{}/**/*", glob::Pattern::escape(config.src.as_str()));

    tokio::fs::create_dir_all(&config.dest).await?;

    let mut written = Vec::new();

    for path in glob::glob(&pattern)? {
        let path = Utf8PathBuf::try_from(path?)?;

        if !path.is_file() {
            continue;
        }

        let Some(name) = path.file_name() else {
            continue;
        };

        let target = config.dest.join(name);
        tokio::fs::copy(&path, &target).await?;

        if written.contains(&target) {
            tracing::warn!("{target} overwritten by {path}");
        } else {
            written.push(target);
        }
    }

    Ok(written)
}

/// `fonts` task.
pub async fn task(ctx: TaskContext) -> anyhow::Result<()> {
    let written = flatten(&ctx.env.config.fonts).await?;

    tracing::debug!("copied {} font file(s)", written.len());
    ctx.env.reload.stream(&written);

    Ok(())
}

#[cfg(test)]
mod tests {
    use std::fs;

    use camino::Utf8Path;

    use super::*;

    fn layout() -> (tempfile::TempDir, FontsConfig) {
        let dir = tempfile::tempdir().unwrap();
        let root = Utf8Path::from_path(dir.path()).unwrap();

        let config = FontsConfig {
            src: root.join("src/fonts"),
            dest: root.join("dist/fonts"),
        };

        (dir, config)
    }

    fn put(config: &FontsConfig, path: &str, data: &str) {
        let path = config.src.join(path);
        fs::create_dir_all(path.parent().unwrap()).unwrap();
        fs::write(path, data).unwrap();
    }

    fn listing(dir: &Utf8Path) -> Vec<String> {
        let mut names: Vec<_> = fs::read_dir(dir)
            .unwrap()
            .map(|entry| entry.unwrap().file_name().into_string().unwrap())
            .collect();
        names.sort();
        names
    }

    #[tokio::test]
    async fn test_flatten() {
        let (_dir, config) = layout();
        put(&config, "inter/Inter.woff2", "inter");
        put(&config, "icons/solid/fa-solid.ttf", "solid");
        put(&config, "serif.otf", "serif");

        let written = flatten(&config).await.unwrap();

        assert_eq!(written.len(), 3);
        assert_eq!(
            listing(&config.dest),
            ["Inter.woff2", "fa-solid.ttf", "serif.otf"]
        );
        assert_eq!(
            fs::read_to_string(config.dest.join("fa-solid.ttf")).unwrap(),
            "solid"
        );
    }

    #[tokio::test]
    async fn test_colliding_names() {
        let (_dir, config) = layout();
        put(&config, "a/x.ttf", "from a");
        put(&config, "b/x.ttf", "from b");

        let written = flatten(&config).await.unwrap();

        assert_eq!(written, vec![config.dest.join("x.ttf")]);
        assert_eq!(listing(&config.dest), ["x.ttf"]);

        let data = fs::read_to_string(config.dest.join("x.ttf")).unwrap();
        assert!(data == "from a" || data == "from b");
    }

    #[tokio::test]
    async fn test_missing_source() {
        let (_dir, config) = layout();

        let written = flatten(&config).await.unwrap();

        assert!(written.is_empty());
        assert!(config.dest.is_dir());
    }
}
