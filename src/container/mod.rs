use anyhow::{bail, Context, Result};
use serde::Deserialize;
use std::path::Path;

use crate::config::RemoteConfig;
use crate::ssh::{shell_quote, Remote};

const COMPOSE_FILES: [&str; 4] = [
    "compose.yaml",
    "compose.yml",
    "docker-compose.yaml",
    "docker-compose.yml",
];

/// How the checked-out project gets built into a running container.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum BuildKind {
    Dockerfile,
    Compose(String),
}

impl BuildKind {
    /// Prefer a compose file when one exists, otherwise a Dockerfile.
    pub fn detect(checkout: &Path) -> Result<Self> {
        if let Some(file) = COMPOSE_FILES.iter().find(|f| checkout.join(f).is_file()) {
            return Ok(BuildKind::Compose(file.to_string()));
        }
        if checkout.join("Dockerfile").is_file() {
            return Ok(BuildKind::Dockerfile);
        }
        bail!(
            "No Dockerfile or compose file found in {}",
            checkout.display()
        )
    }
}

/// Commands that replace the running container with a fresh build.
/// Docker runs through sudo because the docker group change only applies
/// to new login sessions.
pub fn run_commands(kind: &BuildKind, app_path: &str, remote: &RemoteConfig, port: u16) -> Vec<String> {
    match kind {
        BuildKind::Dockerfile => vec![
            format!("docker build -t {} {}", remote.image_name, shell_quote(app_path)),
            format!("docker rm -f {} >/dev/null 2>&1 || true", remote.container_name),
            format!(
                "docker run -d --name {} --restart unless-stopped -p 127.0.0.1:{port}:{port} -e PORT={port} {}",
                remote.container_name, remote.image_name
            ),
        ],
        BuildKind::Compose(file) => vec![format!(
            "cd {} && PORT={} docker compose -p {} -f {} up -d --build --remove-orphans",
            shell_quote(app_path),
            port,
            remote.container_name,
            file
        )],
    }
}

pub async fn build_and_run<R: Remote>(
    remote: &R,
    kind: &BuildKind,
    app_path: &str,
    config: &RemoteConfig,
    port: u16,
) -> Result<()> {
    for cmd in run_commands(kind, app_path, config, port) {
        remote
            .sudo_exec(&cmd)
            .await
            .with_context(|| format!("Container command failed: {}", cmd))?;
    }
    Ok(())
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub struct ContainerState {
    pub status: String,
    pub running: bool,
    #[serde(default)]
    pub exit_code: i64,
}

/// Fetch the state of the deployed container or of the compose project's containers.
pub async fn inspect<R: Remote>(
    remote: &R,
    kind: &BuildKind,
    config: &RemoteConfig,
) -> Result<Vec<ContainerState>> {
    let ids = match kind {
        BuildKind::Dockerfile => config.container_name.clone(),
        BuildKind::Compose(_) => {
            let ids = remote
                .sudo_exec(&format!(
                    "docker ps -aq --filter label=com.docker.compose.project={}",
                    config.container_name
                ))
                .await
                .context("Failed to list compose containers")?;
            let ids: Vec<&str> = ids.split_whitespace().collect();
            if ids.is_empty() {
                bail!("Compose project {} has no containers", config.container_name);
            }
            ids.join(" ")
        }
    };

    let out = remote
        .sudo_exec(&format!("docker inspect --format '{{{{json .State}}}}' {}", ids))
        .await
        .context("Failed to inspect container")?;

    parse_states(&out)
}

pub fn parse_states(out: &str) -> Result<Vec<ContainerState>> {
    out.lines()
        .filter(|l| !l.trim().is_empty())
        .map(|l| serde_json::from_str(l.trim()).context("Failed to parse docker inspect output"))
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ssh::testing::FakeRemote;

    #[test]
    fn compose_file_wins_over_dockerfile() {
        let dir = tempfile::tempdir().expect("tempdir");
        std::fs::write(dir.path().join("Dockerfile"), "FROM nginx").expect("write");
        assert_eq!(BuildKind::detect(dir.path()).unwrap(), BuildKind::Dockerfile);

        std::fs::write(dir.path().join("docker-compose.yml"), "services: {}").expect("write");
        assert_eq!(
            BuildKind::detect(dir.path()).unwrap(),
            BuildKind::Compose("docker-compose.yml".to_string())
        );
    }

    #[test]
    fn empty_checkout_cannot_be_built() {
        let dir = tempfile::tempdir().expect("tempdir");
        assert!(BuildKind::detect(dir.path()).is_err());
    }

    #[test]
    fn dockerfile_flow_replaces_container() {
        let cmds = run_commands(&BuildKind::Dockerfile, "/home/ubuntu/app", &RemoteConfig::default(), 3000);

        assert_eq!(cmds[0], "docker build -t dockhand-app '/home/ubuntu/app'");
        assert!(cmds[1].starts_with("docker rm -f dockhand-app"));
        assert!(cmds[2].contains("--name dockhand-app"));
        assert!(cmds[2].contains("-p 127.0.0.1:3000:3000"));
        assert!(cmds[2].ends_with(" dockhand-app"));
    }

    #[test]
    fn compose_flow_uses_fixed_project() {
        let cmds = run_commands(
            &BuildKind::Compose("compose.yml".into()),
            "/home/ubuntu/app",
            &RemoteConfig::default(),
            8080,
        );
        assert_eq!(
            cmds,
            vec!["cd '/home/ubuntu/app' && PORT=8080 docker compose -p dockhand-app -f compose.yml up -d --build --remove-orphans"]
        );
    }

    #[test]
    fn parses_inspect_lines() {
        let out = r#"{"Status":"running","Running":true,"Paused":false,"ExitCode":0}
{"Status":"exited","Running":false,"ExitCode":137}
"#;
        let states = parse_states(out).expect("states");
        assert_eq!(states.len(), 2);
        assert!(states[0].running);
        assert_eq!(states[1].status, "exited");
        assert_eq!(states[1].exit_code, 137);
    }

    #[tokio::test]
    async fn build_failure_stops_before_run() {
        let remote = FakeRemote::new().fail_on("docker build");
        let err = build_and_run(
            &remote,
            &BuildKind::Dockerfile,
            "/home/ubuntu/app",
            &RemoteConfig::default(),
            80,
        )
        .await
        .unwrap_err();

        assert!(format!("{:#}", err).contains("docker build"));
        assert!(!remote.ran("docker run"));
    }

    #[tokio::test]
    async fn compose_inspect_requires_containers() {
        let remote = FakeRemote::new();
        let kind = BuildKind::Compose("compose.yml".into());
        assert!(inspect(&remote, &kind, &RemoteConfig::default()).await.is_err());

        let remote = FakeRemote::new()
            .respond("docker ps -aq", "abc\ndef\n")
            .respond("docker inspect", "{\"Status\":\"running\",\"Running\":true}\n");
        let states = inspect(&remote, &kind, &RemoteConfig::default())
            .await
            .expect("states");
        assert_eq!(states.len(), 1);
        assert!(remote.ran("{{json .State}}"));
        assert!(remote.ran("abc def"));
    }
}
