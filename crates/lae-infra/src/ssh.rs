use std::path::{Path, PathBuf};
use std::process::Stdio;
use std::time::Duration;

use tokio::io::AsyncWriteExt;
use tokio::net::TcpStream;
use tokio::process::Command;

use crate::{Error, Result};

const SSH_PORT: u16 = 22;
const CONNECT_TIMEOUT: Duration = Duration::from_secs(30);

/// Exit status `ssh` itself uses for transport failures.
const SSH_TRANSPORT_FAILURE: i32 = 255;

/// Check that `host` accepts TCP connections on the ssh port.
///
/// A refused or timed-out connection is reported as [`Error::NotListening`].
pub async fn probe(host: &str) -> Result<()> {
    probe_port(host, SSH_PORT).await
}

async fn probe_port(host: &str, port: u16) -> Result<()> {
    match tokio::time::timeout(CONNECT_TIMEOUT, TcpStream::connect((host, port))).await {
        Ok(Ok(_)) => Ok(()),
        Ok(Err(e))
            if matches!(
                e.kind(),
                std::io::ErrorKind::ConnectionRefused | std::io::ErrorKind::TimedOut
            ) =>
        {
            Err(Error::NotListening { host: host.into() })
        }
        Ok(Err(e)) => Err(Error::Io(e)),
        Err(_) => Err(Error::NotListening { host: host.into() }),
    }
}

/// A remote login: `user@host` authenticated with a private key file.
#[derive(Debug, Clone)]
pub struct SshTarget {
    program: PathBuf,
    host: String,
    user: String,
    key_path: PathBuf,
}

impl SshTarget {
    pub fn new(host: impl Into<String>, user: impl Into<String>, key_path: &Path) -> Self {
        Self {
            program: PathBuf::from("ssh"),
            host: host.into(),
            user: user.into(),
            key_path: key_path.to_path_buf(),
        }
    }

    /// Use a different ssh client binary.
    pub fn with_program(mut self, program: impl Into<PathBuf>) -> Self {
        self.program = program.into();
        self
    }

    pub fn host(&self) -> &str {
        &self.host
    }

    fn command(&self, remote: &str) -> Command {
        let mut cmd = Command::new(&self.program);
        cmd.arg("-i")
            .arg(&self.key_path)
            .args([
                "-o",
                "BatchMode=yes",
                "-o",
                "StrictHostKeyChecking=no",
                "-o",
                "UserKnownHostsFile=/dev/null",
                "-o",
                "ConnectTimeout=30",
            ])
            .arg(format!("{}@{}", self.user, self.host))
            .arg(remote)
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .kill_on_drop(true);
        cmd
    }

    /// Run a command remotely, failing on non-zero exit. Returns stdout.
    pub async fn exec_checked(&self, remote: &str) -> Result<String> {
        self.run(remote, None).await
    }

    /// Write `content` to `path` on the remote host, creating parent dirs.
    pub async fn write_file(&self, path: &str, content: &str) -> Result<()> {
        self.run(&write_command(path, ""), Some(content)).await.map(|_| ())
    }

    /// Like [`write_file`](Self::write_file), but through `sudo` for paths
    /// the login does not own.
    pub async fn write_file_privileged(&self, path: &str, content: &str) -> Result<()> {
        self.run(&write_command(path, "sudo "), Some(content))
            .await
            .map(|_| ())
    }

    async fn run(&self, remote: &str, stdin_body: Option<&str>) -> Result<String> {
        let mut cmd = self.command(remote);
        cmd.stdin(if stdin_body.is_some() {
            Stdio::piped()
        } else {
            Stdio::null()
        });

        let mut child = cmd.spawn()?;
        if let Some(body) = stdin_body
            && let Some(mut stdin) = child.stdin.take()
        {
            stdin.write_all(body.as_bytes()).await?;
            stdin.shutdown().await?;
        }

        let output = child.wait_with_output().await?;
        let exit_code = output.status.code().unwrap_or(-1);
        let stderr = String::from_utf8_lossy(&output.stderr).into_owned();

        if exit_code == SSH_TRANSPORT_FAILURE && is_refused(&stderr) {
            return Err(Error::NotListening {
                host: self.host.clone(),
            });
        }
        if exit_code != 0 {
            return Err(Error::Remote {
                host: self.host.clone(),
                command: remote.to_string(),
                exit_code,
                stderr,
            });
        }

        Ok(String::from_utf8_lossy(&output.stdout).into_owned())
    }
}

fn write_command(path: &str, sudo: &str) -> String {
    let target = shell_quote(path);
    match path.rsplit_once('/').map(|(p, _)| p) {
        Some(parent) if !parent.is_empty() => format!(
            "{sudo}mkdir -p {} && {sudo}tee {target} >/dev/null",
            shell_quote(parent)
        ),
        _ => format!("{sudo}tee {target} >/dev/null"),
    }
}

fn is_refused(stderr: &str) -> bool {
    stderr.contains("Connection refused") || stderr.contains("Connection timed out")
}

/// Quote a value for a POSIX shell.
pub fn shell_quote(value: &str) -> String {
    format!("'{}'", value.replace('\'', r"'\''"))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn quoting_survives_single_quotes() {
        assert_eq!(shell_quote("plain"), "'plain'");
        assert_eq!(shell_quote("it's"), r"'it'\''s'");
    }

    #[test]
    fn privileged_writes_use_sudo() {
        assert_eq!(
            write_command("/home/customer/introducer/tahoe.cfg", "sudo "),
            "sudo mkdir -p '/home/customer/introducer' && sudo tee '/home/customer/introducer/tahoe.cfg' >/dev/null"
        );
        assert_eq!(
            write_command("/tmp/batch.txt", ""),
            "mkdir -p '/tmp' && tee '/tmp/batch.txt' >/dev/null"
        );
    }

    #[test]
    fn refused_transport_is_recognised() {
        assert!(is_refused("ssh: connect to host 203.0.113.7 port 22: Connection refused\r\n"));
        assert!(!is_refused("Permission denied (publickey)."));
    }

    #[tokio::test]
    async fn probe_closed_port_is_not_listening() {
        // Bind then drop to get a local port nothing listens on.
        let listener = std::net::TcpListener::bind("127.0.0.1:0").unwrap();
        let port = listener.local_addr().unwrap().port();
        drop(listener);

        let err = probe_port("127.0.0.1", port).await.unwrap_err();
        assert!(err.is_not_listening(), "{err}");
    }

    #[tokio::test]
    async fn probe_open_port_succeeds() {
        let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
        let port = listener.local_addr().unwrap().port();

        probe_port("127.0.0.1", port).await.unwrap();
    }
}
