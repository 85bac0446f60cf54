use std::path::PathBuf;
use std::time::Duration;

use crate::config::DockhandConfig;
use crate::os::HostOs;
use crate::params::DeployParams;

pub struct DeployContext {
    pub params: DeployParams,
    pub config: DockhandConfig,
    pub log_path: PathBuf,
}

impl DeployContext {
    pub fn new(params: DeployParams, config: DockhandConfig, log_path: PathBuf) -> Self {
        Self {
            params,
            config,
            log_path,
        }
    }

    pub fn connect_timeout(&self) -> Duration {
        Duration::from_secs(self.config.remote.connect_timeout_secs)
    }

    pub fn settle_delay(&self) -> Duration {
        Duration::from_secs(self.config.remote.settle_secs)
    }

    pub fn public_url(&self) -> String {
        format!("http://{}", self.params.conn.host)
    }
}

/// Facts about the host learned once the session is up.
#[derive(Debug, Clone)]
pub struct RemoteTarget {
    pub os: HostOs,
    /// Absolute application directory (`$HOME/<app_dir>`).
    pub app_path: String,
}

impl RemoteTarget {
    pub fn new(os: HostOs, home: &str, app_dir: &str) -> Self {
        Self {
            os,
            app_path: format!(
                "{}/{}",
                home.trim_end_matches('/'),
                app_dir.trim_end_matches('/')
            ),
        }
    }
}
