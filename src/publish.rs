//! Builds the Python package and uploads it to the package registry.
use log::*;
use std::{
    fs,
    path::{Path, PathBuf},
};

use crate::{
    config::PublishConfig,
    error::{ReleaseError, Result},
    process::{Cmd, CommandRunner},
};

/// Drives pip, the build frontend and twine inside the working directory.
pub struct Publisher<'a> {
    runner: &'a dyn CommandRunner,
    config: &'a PublishConfig,
    workdir: &'a Path,
}

impl<'a> Publisher<'a> {
    pub fn new(
        runner: &'a dyn CommandRunner,
        config: &'a PublishConfig,
        workdir: &'a Path,
    ) -> Self {
        Self {
            runner,
            config,
            workdir,
        }
    }

    /// Install tooling, build into a fresh dist directory and upload every
    /// artifact. Returns the uploaded files.
    pub async fn publish(&self) -> Result<Vec<PathBuf>> {
        info!("installing build tooling");
        self.runner
            .run(&self.python(["-m", "pip", "install", "--upgrade", "pip"]))
            .await?;
        self.runner
            .run(&self.python([
                "-m", "pip", "install", "--upgrade", "build", "twine",
            ]))
            .await?;

        let dist = self.dist_dir();
        reset_dist_dir(&dist)?;

        info!("building package into {}", dist.display());
        self.runner
            .run(
                &self
                    .python(["-m", "build", "--outdir"])
                    .arg(dist.display().to_string()),
            )
            .await?;

        let artifacts = collect_artifacts(&dist)?;
        for artifact in &artifacts {
            debug!("built {}", artifact.display());
        }

        self.runner.run(&self.upload_cmd(&artifacts)).await?;
        info!("uploaded {} artifact(s)", artifacts.len());

        Ok(artifacts)
    }

    fn dist_dir(&self) -> PathBuf {
        if self.config.dist_dir.is_absolute() {
            self.config.dist_dir.clone()
        } else {
            self.workdir.join(&self.config.dist_dir)
        }
    }

    fn python<const N: usize>(&self, args: [&str; N]) -> Cmd {
        Cmd::new(&self.config.python)
            .args(args)
            .current_dir(self.workdir)
    }

    fn upload_cmd(&self, artifacts: &[PathBuf]) -> Cmd {
        let mut cmd =
            self.python(["-m", "twine", "upload", "--non-interactive"]);

        if let Some(url) = &self.config.repository_url {
            cmd = cmd.args(["--repository-url", url.as_str()]);
        }

        cmd = cmd.args(artifacts.iter().map(|p| p.display().to_string()));

        match &self.config.token {
            Some(token) => cmd
                .secret_env(
                    "TWINE_USERNAME",
                    self.config.username.clone().into(),
                )
                .secret_env("TWINE_PASSWORD", token.clone()),
            None => {
                warn!("no registry token configured, using twine defaults");
                cmd
            }
        }
    }
}

/// Remove `dir` if present and create it empty.
pub fn reset_dist_dir(dir: &Path) -> Result<()> {
    if dir.exists() {
        debug!("removing {}", dir.display());
        fs::remove_dir_all(dir)?;
    }
    fs::create_dir_all(dir)?;
    Ok(())
}

/// Files directly inside `dir`, sorted by path.
pub fn collect_artifacts(dir: &Path) -> Result<Vec<PathBuf>> {
    let mut files = vec![];

    for entry in fs::read_dir(dir)? {
        let entry = entry?;
        if entry.file_type()?.is_file() {
            files.push(entry.path());
        }
    }

    if files.is_empty() {
        return Err(ReleaseError::NoArtifacts(dir.to_path_buf()));
    }

    files.sort();
    Ok(files)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{process::MockCommandRunner, test_helpers::write_file};
    use mockall::Sequence;
    use secrecy::{ExposeSecret, SecretString};
    use tempfile::TempDir;

    fn is_build(cmd: &Cmd) -> bool {
        cmd.args.get(1).map(String::as_str) == Some("build")
    }

    fn is_upload(cmd: &Cmd) -> bool {
        cmd.args.get(1).map(String::as_str) == Some("twine")
    }

    fn env<'c>(cmd: &'c Cmd, key: &str) -> Option<&'c SecretString> {
        cmd.envs.iter().find(|(k, _)| k == key).map(|(_, v)| v)
    }

    #[test]
    fn reset_replaces_existing_contents() {
        let tmp = TempDir::new().unwrap();
        let dist = tmp.path().join("dist");
        write_file(&dist, "old-0.1.0.tar.gz", "stale");

        reset_dist_dir(&dist).unwrap();

        assert!(dist.is_dir());
        assert_eq!(fs::read_dir(&dist).unwrap().count(), 0);
    }

    #[test]
    fn collects_sorted_files_only() {
        let tmp = TempDir::new().unwrap();
        write_file(tmp.path(), "pkg-1.0.0.tar.gz", "");
        write_file(tmp.path(), "pkg-1.0.0-py3-none-any.whl", "");
        fs::create_dir(tmp.path().join("nested")).unwrap();

        let files = collect_artifacts(tmp.path()).unwrap();
        let names: Vec<_> = files
            .iter()
            .map(|p| p.file_name().unwrap().to_string_lossy().into_owned())
            .collect();

        assert_eq!(names, ["pkg-1.0.0-py3-none-any.whl", "pkg-1.0.0.tar.gz"]);
    }

    #[test]
    fn empty_dist_is_an_error() {
        let tmp = TempDir::new().unwrap();
        let err = collect_artifacts(tmp.path()).unwrap_err();
        assert!(matches!(err, ReleaseError::NoArtifacts(_)));
    }

    #[test_log::test(tokio::test)]
    async fn runs_steps_in_order_with_token_credentials() {
        let tmp = TempDir::new().unwrap();
        let workdir = tmp.path().to_path_buf();
        let dist = workdir.join("dist");
        write_file(&dist, "leftover.whl", "");

        let config = PublishConfig {
            token: Some(SecretString::from("pypi-secret".to_string())),
            repository_url: Some("https://test.pypi.org/legacy/".into()),
            ..PublishConfig::default()
        };

        let mut seq = Sequence::new();
        let mut runner = MockCommandRunner::new();
        runner
            .expect_run()
            .withf(|cmd| {
                cmd.is("python3", &["-m", "pip", "install", "--upgrade", "pip"])
            })
            .times(1)
            .in_sequence(&mut seq)
            .returning(|_| Ok(()));
        runner
            .expect_run()
            .withf(|cmd| {
                cmd.is(
                    "python3",
                    &["-m", "pip", "install", "--upgrade", "build", "twine"],
                )
            })
            .times(1)
            .in_sequence(&mut seq)
            .returning(|_| Ok(()));
        let build_dist = dist.clone();
        runner
            .expect_run()
            .withf(is_build)
            .times(1)
            .in_sequence(&mut seq)
            .returning(move |_| {
                assert_eq!(fs::read_dir(&build_dist).unwrap().count(), 0);
                write_file(&build_dist, "pkg-1.2.3.tar.gz", "");
                Ok(())
            });
        runner
            .expect_run()
            .withf(is_upload)
            .times(1)
            .in_sequence(&mut seq)
            .returning(|cmd| {
                assert_eq!(
                    &cmd.args[..6],
                    [
                        "-m",
                        "twine",
                        "upload",
                        "--non-interactive",
                        "--repository-url",
                        "https://test.pypi.org/legacy/",
                    ]
                );
                assert!(cmd.args[6].ends_with("pkg-1.2.3.tar.gz"));
                assert_eq!(
                    env(cmd, "TWINE_USERNAME").unwrap().expose_secret(),
                    "__token__"
                );
                assert_eq!(
                    env(cmd, "TWINE_PASSWORD").unwrap().expose_secret(),
                    "pypi-secret"
                );
                assert!(!cmd.to_string().contains("pypi-secret"));
                Ok(())
            });

        let publisher = Publisher::new(&runner, &config, &workdir);
        let uploaded = publisher.publish().await.unwrap();

        assert_eq!(uploaded, vec![dist.join("pkg-1.2.3.tar.gz")]);
    }

    #[tokio::test]
    async fn uploads_without_credentials_when_no_token() {
        let tmp = TempDir::new().unwrap();
        let workdir = tmp.path().to_path_buf();
        let dist = workdir.join("dist");
        let config = PublishConfig::default();

        let mut runner = MockCommandRunner::new();
        runner
            .expect_run()
            .withf(|cmd| !is_build(cmd) && !is_upload(cmd))
            .times(2)
            .returning(|_| Ok(()));
        runner
            .expect_run()
            .withf(is_build)
            .returning(move |_| {
                write_file(&dist, "pkg-1.2.3-py3-none-any.whl", "");
                Ok(())
            });
        runner
            .expect_run()
            .withf(is_upload)
            .times(1)
            .returning(|cmd| {
                assert!(cmd.envs.is_empty());
                assert!(!cmd.args.contains(&"--repository-url".to_string()));
                Ok(())
            });

        let publisher = Publisher::new(&runner, &config, &workdir);
        assert_eq!(publisher.publish().await.unwrap().len(), 1);
    }

    #[tokio::test]
    async fn build_failure_stops_before_upload() {
        let tmp = TempDir::new().unwrap();
        let config = PublishConfig::default();

        let mut runner = MockCommandRunner::new();
        runner
            .expect_run()
            .withf(|cmd| !is_build(cmd) && !is_upload(cmd))
            .returning(|_| Ok(()));
        runner.expect_run().withf(is_build).returning(|cmd| {
            Err(ReleaseError::CommandFailed {
                command: cmd.to_string(),
                code: Some(4),
            })
        });
        runner.expect_run().withf(is_upload).never();

        let publisher = Publisher::new(&runner, &config, tmp.path());
        let err = publisher.publish().await.unwrap_err();
        assert_eq!(err.exit_code(), 4);
    }

    #[tokio::test]
    async fn missing_artifacts_stop_before_upload() {
        let tmp = TempDir::new().unwrap();
        let config = PublishConfig::default();

        let mut runner = MockCommandRunner::new();
        runner
            .expect_run()
            .withf(|cmd| !is_upload(cmd))
            .times(3)
            .returning(|_| Ok(()));
        runner.expect_run().withf(is_upload).never();

        let publisher = Publisher::new(&runner, &config, tmp.path());
        let err = publisher.publish().await.unwrap_err();
        assert!(matches!(err, ReleaseError::NoArtifacts(_)));
    }
}
