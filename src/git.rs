//! Version-control capability used by the mirror saga.
//!
//! Every operation runs against a scoped [`WorkDir`]. [`GitCli`] shells out
//! to the `git` executable with a per-command timeout; tests substitute a
//! recording implementation of [`VersionControl`].

use std::fmt;
use std::path::Path;
use std::process::Stdio;
use std::time::Duration;

use async_trait::async_trait;
use regex::Regex;
use tempfile::TempDir;
use tokio::process::Command;

use crate::error::MirrorError;

/// A remote URL that carries an access token.
///
/// `Display` and `Debug` never print the token; use [`RemoteUrl::expose`]
/// only when handing the URL to git.
#[derive(Clone, PartialEq, Eq)]
pub struct RemoteUrl {
    host: String,
    token: String,
    owner: String,
    repo: String,
}

impl RemoteUrl {
    pub fn credentialed(host: &str, token: &str, owner: &str, repo: &str) -> Self {
        RemoteUrl {
            host: host.to_string(),
            token: token.to_string(),
            owner: owner.to_string(),
            repo: repo.to_string(),
        }
    }

    /// `https://<token>@host/<owner>/<repo>.git`
    pub fn expose(&self) -> String {
        format!(
            "https://{}@{}/{}/{}.git",
            self.token, self.host, self.owner, self.repo
        )
    }
}

impl fmt::Display for RemoteUrl {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "https://***@{}/{}/{}.git",
            self.host, self.owner, self.repo
        )
    }
}

impl fmt::Debug for RemoteUrl {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "RemoteUrl({})", self)
    }
}

/// Strips credentials from any `https://user@host` URL in `text`.
pub fn redact(text: &str) -> String {
    let credentials = Regex::new(r"https://[^@/\s]+@").expect("static regex is valid");
    credentials.replace_all(text, "https://***@").into_owned()
}

/// Commit identity configured on the local clone.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct CommitIdentity {
    pub name: String,
    pub email: String,
}

impl CommitIdentity {
    /// Bot identity whose email embeds the installation that produced the commits.
    pub fn bot(name: &str, email_domain: &str, installation_id: u64) -> Self {
        CommitIdentity {
            name: name.to_string(),
            email: format!("{}+{}@{}", installation_id, name, email_domain),
        }
    }
}

/// Temporary working directory, removed when dropped.
pub struct WorkDir {
    dir: TempDir,
}

impl WorkDir {
    pub fn new() -> Result<Self, MirrorError> {
        let dir = tempfile::Builder::new().prefix("forkmirror-").tempdir()?;
        Ok(WorkDir { dir })
    }

    pub fn path(&self) -> &Path {
        self.dir.path()
    }
}

#[async_trait]
pub trait VersionControl: Send + Sync {
    /// Clones `url` into the (empty) working directory.
    async fn clone_repository(&self, workdir: &Path, url: &RemoteUrl) -> Result<(), MirrorError>;

    async fn configure_identity(
        &self,
        workdir: &Path,
        identity: &CommitIdentity,
    ) -> Result<(), MirrorError>;

    async fn add_remote(&self, workdir: &Path, name: &str, url: &RemoteUrl)
        -> Result<(), MirrorError>;

    async fn push(&self, workdir: &Path, remote: &str, branch: &str) -> Result<(), MirrorError>;

    /// Creates `branch` from `base` and checks it out.
    async fn create_branch(&self, workdir: &Path, branch: &str, base: &str)
        -> Result<(), MirrorError>;
}

/// `VersionControl` implemented by running the git executable.
#[derive(Clone, Debug)]
pub struct GitCli {
    binary: String,
    timeout: Duration,
}

impl GitCli {
    pub fn new(binary: &str, timeout: Duration) -> Self {
        GitCli {
            binary: binary.to_string(),
            timeout,
        }
    }

    async fn run(&self, workdir: Option<&Path>, args: &[&str]) -> Result<String, MirrorError> {
        let command = redact(&args.join(" "));

        let mut cmd = Command::new(&self.binary);
        if let Some(dir) = workdir {
            cmd.arg("-C").arg(dir);
        }
        cmd.args(args)
            .env("GIT_TERMINAL_PROMPT", "0")
            .stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .kill_on_drop(true);

        tracing::debug!(command = %command, "Running git");

        let output = match tokio::time::timeout(self.timeout, cmd.output()).await {
            Ok(output) => output?,
            Err(_) => {
                return Err(MirrorError::Timeout {
                    command,
                    after: self.timeout,
                })
            }
        };

        if output.status.success() {
            Ok(String::from_utf8_lossy(&output.stdout).trim().to_string())
        } else {
            Err(MirrorError::VersionControl {
                command,
                stderr: redact(String::from_utf8_lossy(&output.stderr).trim()),
            })
        }
    }
}

impl Default for GitCli {
    fn default() -> Self {
        GitCli::new("git", Duration::from_secs(300))
    }
}

fn path_arg(path: &Path) -> String {
    path.to_string_lossy().into_owned()
}

#[async_trait]
impl VersionControl for GitCli {
    async fn clone_repository(&self, workdir: &Path, url: &RemoteUrl) -> Result<(), MirrorError> {
        let target = path_arg(workdir);
        self.run(None, &["clone", &url.expose(), &target]).await?;
        Ok(())
    }

    async fn configure_identity(
        &self,
        workdir: &Path,
        identity: &CommitIdentity,
    ) -> Result<(), MirrorError> {
        self.run(Some(workdir), &["config", "user.name", &identity.name])
            .await?;
        self.run(Some(workdir), &["config", "user.email", &identity.email])
            .await?;
        Ok(())
    }

    async fn add_remote(
        &self,
        workdir: &Path,
        name: &str,
        url: &RemoteUrl,
    ) -> Result<(), MirrorError> {
        self.run(Some(workdir), &["remote", "add", name, &url.expose()])
            .await?;
        Ok(())
    }

    async fn push(&self, workdir: &Path, remote: &str, branch: &str) -> Result<(), MirrorError> {
        self.run(Some(workdir), &["push", remote, branch]).await?;
        Ok(())
    }

    async fn create_branch(
        &self,
        workdir: &Path,
        branch: &str,
        base: &str,
    ) -> Result<(), MirrorError> {
        self.run(Some(workdir), &["checkout", "-b", branch, base])
            .await?;
        Ok(())
    }
}
