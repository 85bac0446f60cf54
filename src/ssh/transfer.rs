use anyhow::{bail, Context, Result};
use std::io::Read;
use std::path::Path;
use std::process::{Command, Stdio};
use std::thread;
use std::time::Duration;
use tracing::debug;

use super::shell_quote;
use crate::params::ConnectionParams;

/// Arguments for the `ssh` side of the pipe that unpacks into `remote_dir`.
pub fn ssh_unpack_args(conn: &ConnectionParams, timeout: Duration, remote_dir: &str) -> Vec<String> {
    vec![
        "-i".to_string(),
        conn.key_path.display().to_string(),
        "-o".to_string(),
        "BatchMode=yes".to_string(),
        "-o".to_string(),
        "StrictHostKeyChecking=accept-new".to_string(),
        "-o".to_string(),
        format!("ConnectTimeout={}", timeout.as_secs().max(1)),
        "-C".to_string(),
        format!("{}@{}", conn.user, conn.host),
        format!("tar -xzf - -C {}", shell_quote(remote_dir)),
    ]
}

/// Read `reader` to the end on its own thread, so a chatty child cannot
/// fill its stderr pipe and stall while we wait on something else.
fn drain<R: Read + Send + 'static>(mut reader: R) -> thread::JoinHandle<String> {
    thread::spawn(move || {
        let mut buf = String::new();
        let _ = reader.read_to_string(&mut buf);
        buf
    })
}

/// Stream `local_dir` (minus `.git`) to `remote_dir` via `tar | ssh tar`.
/// `remote_dir` must already exist.
pub fn upload_dir(
    local_dir: &Path,
    conn: &ConnectionParams,
    timeout: Duration,
    remote_dir: &str,
) -> Result<()> {
    for tool in ["tar", "ssh"] {
        which::which(tool).with_context(|| format!("{} is not installed or not on PATH", tool))?;
    }

    let mut tar_child = Command::new("tar")
        .arg("-C")
        .arg(local_dir)
        .args(["--exclude=.git", "-czf", "-", "."])
        .stdout(Stdio::piped())
        .stderr(Stdio::piped())
        .spawn()
        .context("Failed to spawn tar")?;

    let tar_stdout = tar_child
        .stdout
        .take()
        .context("Failed to capture tar stdout")?;
    let tar_stderr = drain(
        tar_child
            .stderr
            .take()
            .context("Failed to capture tar stderr")?,
    );

    let ssh_args = ssh_unpack_args(conn, timeout, remote_dir);
    debug!("ssh {}", ssh_args.join(" "));

    let unpack = Command::new("ssh")
        .args(&ssh_args)
        .stdin(tar_stdout)
        .output()
        .context("Failed to run ssh tar -x")?;

    let packed = tar_child.wait().context("Failed to wait for tar")?;
    let packed_err = tar_stderr.join().unwrap_or_default();
    if !packed_err.trim().is_empty() {
        debug!("tar stderr: {}", packed_err.trim());
    }

    let unpack_err = String::from_utf8_lossy(&unpack.stderr);
    if !unpack_err.trim().is_empty() {
        debug!("ssh stderr: {}", unpack_err.trim());
    }

    if !packed.success() {
        bail!(
            "tar of {} failed: {}",
            local_dir.display(),
            packed_err.trim()
        );
    }

    if !unpack.status.success() {
        bail!(
            "File transfer to {}:{} failed: {}",
            conn.host,
            remote_dir,
            unpack_err.trim()
        );
    }

    Ok(())
}
