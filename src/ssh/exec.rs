use anyhow::{bail, Context, Result};
use tracing::debug;

use super::{Remote, SshSession};

impl SshSession {
    async fn run(&self, cmd: &str) -> Result<std::process::Output> {
        self.session
            .command("bash")
            .arg("-c")
            .arg(cmd)
            .output()
            .await
            .with_context(|| format!("Failed to execute command on {}: {}", self.host, cmd))
    }
}

impl Remote for SshSession {
    fn host(&self) -> &str {
        &self.host
    }

    async fn exec(&self, cmd: &str) -> Result<String> {
        debug!("[{}] exec: {}", self.host, cmd);

        let output = self.run(cmd).await?;

        let stdout = String::from_utf8_lossy(&output.stdout).to_string();
        let stderr = String::from_utf8_lossy(&output.stderr).to_string();

        if !stdout.trim().is_empty() {
            debug!("[{}] stdout: {}", self.host, stdout.trim());
        }
        if !stderr.trim().is_empty() {
            debug!("[{}] stderr: {}", self.host, stderr.trim());
        }

        if !output.status.success() {
            bail!(
                "Command failed on {} (exit {}): {}\nstdout: {}\nstderr: {}",
                self.host,
                output.status,
                cmd,
                stdout.trim(),
                stderr.trim()
            );
        }

        Ok(stdout)
    }

    async fn exec_ok(&self, cmd: &str) -> Result<bool> {
        debug!("[{}] exec_ok: {}", self.host, cmd);

        let output = self.run(cmd).await?;
        debug!("[{}] exit: {}", self.host, output.status);

        Ok(output.status.success())
    }
}
