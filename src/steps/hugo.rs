use std::process::Stdio;

use camino::Utf8PathBuf;
use tokio::process::Command;

use crate::config::SiteConfig;
use crate::error::SiteError;
use crate::live::LiveReload;
use crate::{Mode, TaskContext};

/// Message shown in the browser when the build fails.
const FAILURE_NOTICE: &str = "Hugo build failed :(";

/// A single invocation of the Hugo binary.
#[derive(Debug, Clone)]
pub struct SiteBuild {
    program: String,
    source: Utf8PathBuf,
    destination: Utf8PathBuf,
    mode: Mode,
    extra: Vec<String>,
}

impl SiteBuild {
    /// Arguments rendering drafts and posts dated in the future.
    pub const PREVIEW_ARGS: [&'static str; 2] = ["--buildDrafts", "--buildFuture"];

    pub fn new(config: &SiteConfig) -> Self {
        Self {
            program: config.bin.clone(),
            source: config.source.clone(),
            destination: config.destination.clone(),
            mode: Mode::Development,
            extra: Vec::new(),
        }
    }

    /// Development build, with the preview arguments when enabled.
    pub fn development(config: &SiteConfig) -> Self {
        let build = Self::new(config);

        if config.preview {
            build.args(Self::PREVIEW_ARGS)
        } else {
            build
        }
    }

    /// Production build against the configured base URL.
    pub fn production(config: &SiteConfig) -> Self {
        Self::new(config)
            .mode(Mode::Production)
            .args(["--baseURL", config.base_url.as_str()])
    }

    pub fn mode(mut self, mode: Mode) -> Self {
        self.mode = mode;
        self
    }

    /// Append extra arguments after the base ones.
    pub fn args<I, S>(mut self, args: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.extra.extend(args.into_iter().map(Into::into));
        self
    }

    /// Full argument list: output directory, source directory and verbose
    /// flag, followed by the extra arguments.
    pub fn arguments(&self) -> Vec<String> {
        let mut args = vec![
            "-d".to_string(),
            self.destination.to_string(),
            "-s".to_string(),
            self.source.to_string(),
            "-v".to_string(),
        ];
        args.extend(self.extra.iter().cloned());
        args
    }

    pub fn command(&self) -> Command {
        let mut command = Command::new(&self.program);
        command
            .args(self.arguments())
            .env(Mode::VAR, self.mode.as_str())
            .stdin(Stdio::inherit())
            .stdout(Stdio::inherit())
            .stderr(Stdio::inherit());
        command
    }

    /// Run Hugo and wait for it to exit. On success the browsers are reloaded,
    /// on failure they are shown a notice and the error is returned.
    pub async fn run(&self, reload: &LiveReload) -> Result<(), SiteError> {
        tracing::debug!(mode = %self.mode, "{} {}", self.program, self.arguments().join(" "));

        let status = self
            .command()
            .status()
            .await
            .map_err(|e| SiteError::Spawn(self.program.clone(), e))?;

        if status.success() {
            reload.reload();
            Ok(())
        } else {
            reload.notify(FAILURE_NOTICE);
            Err(SiteError::Failed(status))
        }
    }
}

/// `hugo` task, development build.
pub async fn task(ctx: TaskContext) -> anyhow::Result<()> {
    SiteBuild::development(&ctx.env.config.site)
        .run(&ctx.env.reload)
        .await?;

    Ok(())
}

/// Final step of the `build` task.
pub async fn task_production(ctx: TaskContext) -> anyhow::Result<()> {
    SiteBuild::production(&ctx.env.config.site)
        .run(&ctx.env.reload)
        .await?;

    Ok(())
}

#[cfg(test)]
mod tests {
    use std::ffi::OsStr;

    use super::*;
    use crate::live::Message;

    fn config(bin: &str) -> SiteConfig {
        SiteConfig {
            bin: bin.into(),
            ..SiteConfig::default()
        }
    }

    #[test]
    fn test_base_arguments() {
        let build = SiteBuild::new(&SiteConfig::default());
        assert_eq!(build.arguments(), ["-d", "../dist", "-s", "site", "-v"]);
    }

    #[test]
    fn test_preview_arguments() {
        let config = SiteConfig {
            preview: true,
            ..SiteConfig::default()
        };

        assert_eq!(
            SiteBuild::development(&config).arguments(),
            ["-d", "../dist", "-s", "site", "-v", "--buildDrafts", "--buildFuture"]
        );
        assert_eq!(
            SiteBuild::development(&SiteConfig::default()).arguments(),
            ["-d", "../dist", "-s", "site", "-v"]
        );
    }

    #[test]
    fn test_production_command() {
        let config = SiteConfig {
            base_url: "https://kamoshi.org/".into(),
            ..SiteConfig::default()
        };

        // every invocation starts from the same immutable base
        for _ in 0..3 {
            let command = SiteBuild::production(&config).command();
            let command = command.as_std();

            assert_eq!(command.get_program(), "hugo");

            let args: Vec<_> = command.get_args().collect();
            assert_eq!(
                args,
                ["-d", "../dist", "-s", "site", "-v", "--baseURL", "https://kamoshi.org/"]
            );

            let envs: Vec<_> = command.get_envs().collect();
            assert_eq!(
                envs,
                [(OsStr::new("NODE_ENV"), Some(OsStr::new("production")))]
            );
        }
    }

    #[test]
    fn test_default_production_arguments() {
        let build = SiteBuild::production(&SiteConfig::default());
        assert_eq!(
            build.arguments(),
            ["-d", "../dist", "-s", "site", "-v", "--baseURL", "http://viveapp.com/"]
        );
    }

    #[test]
    fn test_development_mode_env() {
        let command = SiteBuild::new(&SiteConfig::default()).command();
        let envs: Vec<_> = command.as_std().get_envs().collect();
        assert_eq!(
            envs,
            [(OsStr::new("NODE_ENV"), Some(OsStr::new("development")))]
        );
    }

    #[cfg(unix)]
    #[tokio::test]
    async fn test_success_reloads_once() {
        let reload = LiveReload::new("dist");
        let mut rx = reload.subscribe();

        SiteBuild::new(&config("true")).run(&reload).await.unwrap();

        assert_eq!(rx.try_recv().unwrap(), Message::Reload);
        assert!(rx.try_recv().is_err());
    }

    #[cfg(unix)]
    #[tokio::test]
    async fn test_failure_notifies() {
        let reload = LiveReload::new("dist");
        let mut rx = reload.subscribe();

        let err = SiteBuild::new(&config("false")).run(&reload).await.unwrap_err();

        assert!(matches!(err, SiteError::Failed(status) if status.code() == Some(1)));
        assert!(err.to_string().starts_with("Hugo build failed"));
        assert_eq!(
            rx.try_recv().unwrap(),
            Message::Notify {
                message: FAILURE_NOTICE.into()
            }
        );
        assert!(rx.try_recv().is_err());
    }

    #[tokio::test]
    async fn test_missing_binary() {
        let reload = LiveReload::new("dist");
        let mut rx = reload.subscribe();

        let err = SiteBuild::new(&config("./definitely-not-hugo"))
            .run(&reload)
            .await
            .unwrap_err();

        assert!(matches!(err, SiteError::Spawn(..)));
        assert!(rx.try_recv().is_err());
    }
}
