use anyhow::{bail, Context, Result};
use tracing::debug;

use crate::output;
use crate::ssh::Remote;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum HostOs {
    /// Debian, Ubuntu and derivatives (apt).
    Debian,
    /// Fedora, RHEL, CentOS, Rocky, Alma (dnf).
    Rhel,
}

/// Software the host needs before a deploy, in install order.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Prerequisite {
    Curl,
    Docker,
    Nginx,
}

pub const PREREQUISITES: [Prerequisite; 3] =
    [Prerequisite::Curl, Prerequisite::Docker, Prerequisite::Nginx];

/// System services started and enabled after installation.
pub const SERVICES: [&str; 2] = ["docker", "nginx"];

impl Prerequisite {
    pub fn binary(&self) -> &'static str {
        match self {
            Prerequisite::Curl => "curl",
            Prerequisite::Docker => "docker",
            Prerequisite::Nginx => "nginx",
        }
    }
}

impl HostOs {
    /// Auto-detect OS by reading /etc/os-release via SSH.
    pub async fn detect<R: Remote>(remote: &R) -> Result<Self> {
        let content = remote
            .exec("cat /etc/os-release")
            .await
            .context("Failed to read /etc/os-release")?;
        Self::from_os_release(&content)
    }

    pub fn from_os_release(content: &str) -> Result<Self> {
        let mut ids = Vec::new();
        for line in content.lines() {
            let Some((key, value)) = line.split_once('=') else {
                continue;
            };
            if key == "ID" || key == "ID_LIKE" {
                let value = value.trim().trim_matches('"').trim_matches('\'');
                ids.extend(value.split_whitespace().map(str::to_string));
            }
        }

        for id in &ids {
            if let Some(os) = Self::from_id(id) {
                return Ok(os);
            }
        }

        bail!(
            "Unsupported OS (os-release ids: {}). Supported: debian, ubuntu, fedora, rhel, centos",
            if ids.is_empty() {
                "none".to_string()
            } else {
                ids.join(", ")
            }
        )
    }

    fn from_id(id: &str) -> Option<Self> {
        match id {
            "debian" | "ubuntu" => Some(HostOs::Debian),
            "fedora" | "rhel" | "centos" | "rocky" | "almalinux" => Some(HostOs::Rhel),
            _ => None,
        }
    }

    pub fn refresh_cmd(&self) -> &'static str {
        match self {
            HostOs::Debian => "apt-get update -qq",
            HostOs::Rhel => "dnf makecache -q",
        }
    }

    pub fn install_cmd(&self, prerequisite: Prerequisite) -> &'static str {
        match (self, prerequisite) {
            (HostOs::Debian, Prerequisite::Docker) => "curl -fsSL https://get.docker.com | sh",
            // get.docker.com refuses Rocky and Alma, so go through the docker-ce repo.
            (HostOs::Rhel, Prerequisite::Docker) => {
                "curl -fsSL https://download.docker.com/linux/centos/docker-ce.repo \
                 -o /etc/yum.repos.d/docker-ce.repo \
                 && dnf install -y -q docker-ce docker-ce-cli containerd.io docker-compose-plugin"
            }
            (HostOs::Debian, Prerequisite::Curl) => {
                "DEBIAN_FRONTEND=noninteractive apt-get install -y -qq curl"
            }
            (HostOs::Debian, Prerequisite::Nginx) => {
                "DEBIAN_FRONTEND=noninteractive apt-get install -y -qq nginx"
            }
            (HostOs::Rhel, Prerequisite::Curl) => "dnf install -y -q curl",
            (HostOs::Rhel, Prerequisite::Nginx) => "dnf install -y -q nginx",
        }
    }

    pub fn add_docker_group_cmd(&self, user: &str) -> String {
        format!("usermod -aG docker {}", user)
    }
}

/// Install whatever is missing, then make sure docker and nginx run at boot.
/// Tools already present are left alone.
pub async fn install_prerequisites<R: Remote>(remote: &R, os: HostOs, user: &str) -> Result<()> {
    let mut missing = Vec::new();
    for prerequisite in PREREQUISITES {
        if remote.command_exists(prerequisite.binary()).await? {
            output::success(&format!("{} already installed", prerequisite.binary()));
        } else {
            missing.push(prerequisite);
        }
    }

    if !missing.is_empty() {
        remote
            .sudo_exec(os.refresh_cmd())
            .await
            .context("Failed to refresh package index")?;

        for prerequisite in missing {
            let spinner =
                output::create_spinner(&format!("Installing {}...", prerequisite.binary()));
            let result = remote.sudo_exec(os.install_cmd(prerequisite)).await;
            spinner.finish_and_clear();
            result.with_context(|| format!("Failed to install {}", prerequisite.binary()))?;
            output::success(&format!("{} installed", prerequisite.binary()));
        }
    }

    remote
        .sudo_exec(&format!("systemctl enable --now {}", SERVICES.join(" ")))
        .await
        .context("Failed to start docker and nginx")?;
    output::success("docker and nginx enabled and running");

    if let Err(e) = remote.sudo_exec(&os.add_docker_group_cmd(user)).await {
        debug!("usermod failed (ignored): {:#}", e);
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ssh::testing::FakeRemote;

    #[test]
    fn detects_family_from_os_release() {
        let ubuntu = "NAME=\"Ubuntu\"\nID=ubuntu\nID_LIKE=debian\nVERSION_ID=\"24.04\"\n";
        assert_eq!(HostOs::from_os_release(ubuntu).unwrap(), HostOs::Debian);

        let rocky = "NAME=\"Rocky Linux\"\nID=\"rocky\"\nID_LIKE=\"rhel centos fedora\"\n";
        assert_eq!(HostOs::from_os_release(rocky).unwrap(), HostOs::Rhel);

        let mint = "ID=linuxmint\nID_LIKE=\"ubuntu debian\"\n";
        assert_eq!(HostOs::from_os_release(mint).unwrap(), HostOs::Debian);
    }

    #[test]
    fn rejects_unknown_os() {
        let err = HostOs::from_os_release("ID=alpine\n").unwrap_err();
        assert!(err.to_string().contains("alpine"));
        assert!(HostOs::from_os_release("").is_err());
    }

    #[tokio::test]
    async fn installed_host_skips_installation() {
        let remote = FakeRemote::new();

        install_prerequisites(&remote, HostOs::Debian, "ubuntu")
            .await
            .expect("prerequisites");

        assert!(!remote.ran("apt-get"));
        assert!(!remote.ran("get.docker.com"));
        assert!(remote.ran("systemctl enable --now docker nginx"));
        assert!(remote.ran("usermod -aG docker ubuntu"));
    }

    #[tokio::test]
    async fn installs_only_what_is_missing() {
        let remote = FakeRemote::new().fail_on("command -v nginx");

        install_prerequisites(&remote, HostOs::Debian, "ubuntu")
            .await
            .expect("prerequisites");

        assert!(remote.ran("apt-get update -qq"));
        assert!(remote.ran("apt-get install -y -qq nginx"));
        assert!(!remote.ran("apt-get install -y -qq curl"));
        assert!(!remote.ran("get.docker.com"));
    }

    #[tokio::test]
    async fn failed_install_aborts() {
        let remote = FakeRemote::new()
            .fail_on("command -v docker")
            .fail_on("dnf install -y -q docker-ce");

        let err = install_prerequisites(&remote, HostOs::Rhel, "deploy")
            .await
            .unwrap_err();

        assert!(format!("{:#}", err).contains("Failed to install docker"));
        assert!(!remote.ran("systemctl enable"));
    }

    #[tokio::test]
    async fn rhel_installs_docker_with_dnf() {
        let remote = FakeRemote::new().fail_on("command -v docker");

        install_prerequisites(&remote, HostOs::Rhel, "rocky")
            .await
            .expect("prerequisites");

        assert!(remote.ran("dnf makecache -q"));
        assert!(remote.ran("/etc/yum.repos.d/docker-ce.repo"));
        assert!(remote.ran("dnf install -y -q docker-ce"));
        assert!(!remote.ran("get.docker.com"));
    }

    #[tokio::test]
    async fn usermod_failure_is_ignored() {
        let remote = FakeRemote::new().fail_on("usermod");
        install_prerequisites(&remote, HostOs::Debian, "ubuntu")
            .await
            .expect("usermod failure ignored");
    }
}
