pub mod exec;
pub mod transfer;

use anyhow::{bail, Context, Result};
use openssh::{KnownHosts, Session, SessionBuilder};
use std::time::Duration;
use tracing::debug;

use crate::params::ConnectionParams;

/// Command execution on the deployment target.
#[allow(async_fn_in_trait)]
pub trait Remote {
    fn host(&self) -> &str;

    /// Execute a command and return stdout. Non-zero exit is an error.
    async fn exec(&self, cmd: &str) -> Result<String>;

    /// Execute a command, returning Ok(true) if exit 0, Ok(false) otherwise.
    async fn exec_ok(&self, cmd: &str) -> Result<bool>;

    async fn command_exists(&self, program: &str) -> Result<bool> {
        self.exec_ok(&format!("command -v {} >/dev/null 2>&1", program))
            .await
    }

    async fn sudo_exec(&self, cmd: &str) -> Result<String> {
        self.exec(&format!("sudo bash -c {}", shell_quote(cmd))).await
    }

    async fn sudo_write_file(&self, path: &str, content: &str) -> Result<()> {
        self.exec(&format!(
            "sudo tee {} > /dev/null << 'DOCKHAND_EOF'\n{}\nDOCKHAND_EOF",
            path, content
        ))
        .await?;
        Ok(())
    }
}

/// Wrap `value` in single quotes so the remote shell takes it as one word.
pub fn shell_quote(value: &str) -> String {
    format!("'{}'", value.replace('\'', "'\\''"))
}

pub struct SshSession {
    session: Session,
    host: String,
}

impl SshSession {
    pub async fn connect(conn: &ConnectionParams, connect_timeout: Duration) -> Result<Self> {
        debug!(
            "Connecting to {}@{} with key {} (timeout {:?})",
            conn.user,
            conn.host,
            conn.key_path.display(),
            connect_timeout
        );

        let mut builder = SessionBuilder::default();
        builder
            .known_hosts_check(KnownHosts::Add)
            .user(conn.user.clone())
            .keyfile(&conn.key_path)
            .connect_timeout(connect_timeout);

        let session = builder
            .connect(&conn.host)
            .await
            .with_context(|| format!("Failed to connect to {}@{}", conn.user, conn.host))?;

        Ok(Self {
            session,
            host: conn.host.clone(),
        })
    }

    pub async fn close(self) -> Result<()> {
        self.session
            .close()
            .await
            .with_context(|| format!("Failed to close SSH session to {}", self.host))?;
        Ok(())
    }
}

/// Round-trip a trivial command to prove the session works end to end.
pub async fn check_connectivity<R: Remote>(remote: &R) -> Result<()> {
    let echo = remote
        .exec("echo ok")
        .await
        .with_context(|| format!("Host {} did not answer", remote.host()))?;

    if echo.trim() != "ok" {
        bail!(
            "Unexpected reply from {}: '{}'",
            remote.host(),
            echo.trim()
        );
    }
    Ok(())
}

/// Absolute home directory of the session user.
pub async fn remote_home<R: Remote>(remote: &R) -> Result<String> {
    let home = remote
        .exec("printf '%s' \"$HOME\"")
        .await
        .context("Failed to resolve remote home directory")?;
    let home = home.trim();
    if !home.starts_with('/') {
        bail!("Remote home directory is not absolute: '{}'", home);
    }
    Ok(home.to_string())
}

#[cfg(test)]
pub mod testing {
    use anyhow::{bail, Result};
    use std::sync::Mutex;

    use super::Remote;

    /// Records every command. Commands containing a `fail_on` needle exit
    /// non-zero; `respond` needles return canned stdout.
    #[derive(Default)]
    pub struct FakeRemote {
        commands: Mutex<Vec<String>>,
        failing: Vec<String>,
        responses: Vec<(String, String)>,
    }

    impl FakeRemote {
        pub fn new() -> Self {
            Self::default()
        }

        pub fn fail_on(mut self, needle: &str) -> Self {
            self.failing.push(needle.to_string());
            self
        }

        pub fn respond(mut self, needle: &str, stdout: &str) -> Self {
            self.responses.push((needle.to_string(), stdout.to_string()));
            self
        }

        pub fn commands(&self) -> Vec<String> {
            self.commands.lock().expect("lock").clone()
        }

        pub fn ran(&self, needle: &str) -> bool {
            self.commands().iter().any(|c| c.contains(needle))
        }

        fn record(&self, cmd: &str) -> bool {
            self.commands.lock().expect("lock").push(cmd.to_string());
            !self.failing.iter().any(|n| cmd.contains(n.as_str()))
        }
    }

    impl Remote for FakeRemote {
        fn host(&self) -> &str {
            "fake-host"
        }

        async fn exec(&self, cmd: &str) -> Result<String> {
            if !self.record(cmd) {
                bail!("Command failed on fake-host: {}", cmd);
            }
            let stdout = self
                .responses
                .iter()
                .find(|(needle, _)| cmd.contains(needle.as_str()))
                .map(|(_, out)| out.clone())
                .unwrap_or_default();
            Ok(stdout)
        }

        async fn exec_ok(&self, cmd: &str) -> Result<bool> {
            Ok(self.record(cmd))
        }
    }
}
