use anyhow::{Context, Result};
use std::time::Duration;
use tracing::debug;

use crate::config::{DockhandConfig, RemoteConfig};
use crate::nginx;
use crate::output;
use crate::params::ConnectionParams;
use crate::prompt::Prompter;
use crate::ssh::{self, Remote, SshSession};

const CONFIRM_PROMPT: &str =
    "Remove the deployed container, image, nginx site and application directory?";

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CleanupOutcome {
    Aborted,
    Completed,
}

pub async fn run(prompter: &mut dyn Prompter, config: &DockhandConfig) -> Result<CleanupOutcome> {
    output::header("Cleaning up deployment");

    if !prompter.confirm(CONFIRM_PROMPT, false)? {
        output::info("Cleanup aborted. Nothing was changed.");
        return Ok(CleanupOutcome::Aborted);
    }

    let conn = ConnectionParams::gather(prompter, &config.defaults)?;
    let timeout = Duration::from_secs(config.remote.connect_timeout_secs);

    let session = SshSession::connect(&conn, timeout).await?;
    ssh::check_connectivity(&session).await?;

    teardown(&session, &config.remote).await?;

    session.close().await?;

    println!();
    output::success(&format!("Cleanup of {} complete", conn.host));
    Ok(CleanupOutcome::Completed)
}

/// Remove every resource a deploy creates. Resources that are already gone
/// are skipped.
pub async fn teardown<R: Remote>(remote: &R, config: &RemoteConfig) -> Result<()> {
    let home = ssh::remote_home(remote).await?;
    let app_path = format!("{}/{}", home, config.app_dir.trim_end_matches('/'));

    if remote.command_exists("docker").await? {
        output::info(&format!("Removing container {}", config.container_name));
        remote
            .sudo_exec(&format!(
                "docker rm -f {} >/dev/null 2>&1 || true",
                config.container_name
            ))
            .await
            .context("Failed to remove container")?;
        remote
            .sudo_exec(&format!(
                "docker ps -aq --filter label=com.docker.compose.project={} | xargs -r docker rm -f",
                config.container_name
            ))
            .await
            .context("Failed to remove compose containers")?;

        output::info(&format!("Removing image {}", config.image_name));
        remote
            .sudo_exec(&format!(
                "docker rmi -f {} >/dev/null 2>&1 || true",
                config.image_name
            ))
            .await
            .context("Failed to remove image")?;
    } else {
        debug!("docker not installed, skipping container removal");
    }

    output::info(&format!("Removing nginx site {}", config.nginx_site));
    nginx::remove(remote, &config.nginx_site).await?;

    output::info(&format!("Removing {}", app_path));
    remote
        .sudo_exec(&format!("rm -rf {}", ssh::shell_quote(&app_path)))
        .await
        .with_context(|| format!("Failed to remove {}", app_path))?;

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::prompt::testing::ScriptedPrompter;
    use crate::ssh::testing::FakeRemote;

    #[tokio::test]
    async fn declining_touches_nothing() {
        // No scripted answers: any further prompt would fail the run.
        let mut prompter = ScriptedPrompter::new(&[]).with_confirms(&[false]);

        let outcome = run(&mut prompter, &DockhandConfig::default())
            .await
            .expect("aborted cleanup succeeds");

        assert_eq!(outcome, CleanupOutcome::Aborted);
        assert_eq!(prompter.asked, vec![CONFIRM_PROMPT]);
    }

    #[tokio::test]
    async fn confirmation_defaults_to_no() {
        let mut prompter = ScriptedPrompter::new(&[]);

        let outcome = run(&mut prompter, &DockhandConfig::default())
            .await
            .expect("aborted cleanup succeeds");

        assert_eq!(outcome, CleanupOutcome::Aborted);
    }

    #[tokio::test]
    async fn teardown_removes_known_resources() {
        let remote = FakeRemote::new().respond("$HOME", "/home/ubuntu");

        teardown(&remote, &RemoteConfig::default())
            .await
            .expect("teardown");

        assert!(remote.ran("docker rm -f dockhand-app"));
        assert!(remote.ran("label=com.docker.compose.project=dockhand-app"));
        assert!(remote.ran("docker rmi -f dockhand-app"));
        assert!(remote.ran("/etc/nginx/sites-enabled/dockhand"));
        assert!(remote.ran("systemctl reload nginx"));
        assert_eq!(
            remote.commands().last().map(String::as_str),
            Some("sudo bash -c 'rm -rf '\\''/home/ubuntu/app'\\'''")
        );
    }

    #[tokio::test]
    async fn teardown_without_docker_still_cleans_files() {
        let remote = FakeRemote::new()
            .respond("$HOME", "/home/ubuntu")
            .fail_on("command -v docker");

        teardown(&remote, &RemoteConfig::default())
            .await
            .expect("teardown");

        assert!(!remote.ran("docker rm"));
        assert!(remote.ran("rm -rf '\\''/home/ubuntu/app'\\''"));
    }
}
