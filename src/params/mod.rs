use anyhow::Result;
use std::fmt;
use std::path::{Path, PathBuf};

use crate::config::PromptDefaults;
use crate::prompt::Prompter;

/// Problems with operator input. Any of these ends the run with exit code 1.
#[derive(Debug, thiserror::Error, PartialEq, Eq)]
pub enum InputError {
    #[error("{0} is required")]
    Missing(&'static str),

    #[error("SSH key file not found: {0}")]
    KeyNotFound(String),

    #[error("application port must be a number between 1 and 65535 (got '{0}')")]
    InvalidPort(String),
}

/// Everything a deploy run needs, collected once at start-up.
#[derive(Clone)]
pub struct DeployParams {
    pub repository: String,
    pub token: String,
    pub branch: String,
    pub conn: ConnectionParams,
    pub app_port: u16,
}

/// How to reach the target host.
#[derive(Debug, Clone)]
pub struct ConnectionParams {
    pub user: String,
    pub host: String,
    pub key_path: PathBuf,
}

impl fmt::Debug for DeployParams {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("DeployParams")
            .field("repository", &self.repository)
            .field("token", &"***")
            .field("branch", &self.branch)
            .field("conn", &self.conn)
            .field("app_port", &self.app_port)
            .finish()
    }
}

impl DeployParams {
    /// Ask for every value in turn, then validate the answers.
    pub fn gather(prompter: &mut dyn Prompter, defaults: &PromptDefaults) -> Result<Self> {
        let repository = prompter.input("Git repository URL", defaults.repository.as_deref())?;
        let token = prompter.password("Personal access token")?;
        let branch = prompter.input(
            "Branch",
            Some(defaults.branch.as_deref().unwrap_or(crate::config::DEFAULT_BRANCH)),
        )?;
        let raw_conn = RawConnection::ask(prompter, defaults)?;
        let port_default = defaults.app_port.map(|p| p.to_string());
        let app_port = prompter.input("Application port", port_default.as_deref())?;

        let params = Self::from_answers(&repository, &token, &branch, raw_conn, &app_port)?;
        tracing::debug!("deploy parameters: {:?}", params);
        Ok(params)
    }

    fn from_answers(
        repository: &str,
        token: &str,
        branch: &str,
        raw_conn: RawConnection,
        app_port: &str,
    ) -> Result<Self, InputError> {
        let repository = required("Repository URL", repository)?;
        let token = required("Personal access token", token)?;
        let branch = required("Branch", branch)?;
        let conn = raw_conn.validate()?;
        let app_port = parse_port(app_port)?;

        Ok(Self {
            repository,
            token,
            branch,
            conn,
            app_port,
        })
    }
}

impl ConnectionParams {
    pub fn gather(prompter: &mut dyn Prompter, defaults: &PromptDefaults) -> Result<Self> {
        let conn = RawConnection::ask(prompter, defaults)?.validate()?;
        tracing::debug!("connection parameters: {:?}", conn);
        Ok(conn)
    }
}

struct RawConnection {
    user: String,
    host: String,
    key_path: String,
}

impl RawConnection {
    fn ask(prompter: &mut dyn Prompter, defaults: &PromptDefaults) -> Result<Self> {
        Ok(Self {
            user: prompter.input("SSH username", defaults.user.as_deref())?,
            host: prompter.input("Server IP or hostname", defaults.host.as_deref())?,
            key_path: prompter.input("SSH private key path", defaults.key_path.as_deref())?,
        })
    }

    fn validate(self) -> Result<ConnectionParams, InputError> {
        let user = required("SSH username", &self.user)?;
        let host = required("Server address", &self.host)?;
        let key = required("SSH key path", &self.key_path)?;

        let key_path = expand_home(&key);
        if !key_path.is_file() {
            return Err(InputError::KeyNotFound(key_path.display().to_string()));
        }

        Ok(ConnectionParams {
            user,
            host,
            key_path,
        })
    }
}

fn required(field: &'static str, value: &str) -> Result<String, InputError> {
    let value = value.trim();
    if value.is_empty() {
        return Err(InputError::Missing(field));
    }
    Ok(value.to_string())
}

fn parse_port(value: &str) -> Result<u16, InputError> {
    let value = required("Application port", value)?;
    match value.parse::<u16>() {
        Ok(port) if port > 0 => Ok(port),
        _ => Err(InputError::InvalidPort(value)),
    }
}

/// Expand a leading `~/` to the current user's home directory.
pub fn expand_home(path: &str) -> PathBuf {
    if path == "~" {
        if let Some(home) = dirs::home_dir() {
            return home;
        }
    }
    if let Some(rest) = path.strip_prefix("~/") {
        if let Some(home) = dirs::home_dir() {
            return home.join(rest);
        }
    }
    Path::new(path).to_path_buf()
}
